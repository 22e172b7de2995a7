//! One-Euro filter for jittery tracker signals
//!
//! Adaptive low-pass filter: the cutoff frequency rises with the speed of the
//! signal, so slow hand motion is smoothed heavily while fast sweeps keep
//! their responsiveness. Used per screen axis for wand pointers.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

/// Errors raised when building a filter from bad parameters
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("invalid filter parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// One-Euro tuning parameters
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    /// Nominal sampling rate (Hz), used until timestamps give a better estimate
    #[serde(default = "default_freq")]
    pub freq: f64,
    /// Minimum cutoff frequency (Hz)
    #[serde(default = "default_mincutoff")]
    pub mincutoff: f64,
    /// Speed coefficient: higher = less lag during fast motion
    #[serde(default)]
    pub beta: f64,
    /// Cutoff of the derivative filter (Hz)
    #[serde(default = "default_dcutoff")]
    pub dcutoff: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            freq: default_freq(),
            mincutoff: default_mincutoff(),
            beta: 0.0,
            dcutoff: default_dcutoff(),
        }
    }
}

impl FilterParams {
    /// Check every parameter is finite and in range
    pub fn validate(&self) -> Result<(), FilterError> {
        let positive = [
            ("freq", self.freq),
            ("mincutoff", self.mincutoff),
            ("dcutoff", self.dcutoff),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(FilterError::InvalidParameter { name, value });
            }
        }
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(FilterError::InvalidParameter {
                name: "beta",
                value: self.beta,
            });
        }
        Ok(())
    }
}

fn default_freq() -> f64 { 120.0 }
fn default_mincutoff() -> f64 { 1.0 }
fn default_dcutoff() -> f64 { 1.0 }

/// Exponential smoothing stage keeping the last raw and last smoothed value
#[derive(Debug, Clone, Default)]
pub struct LowPassFilter {
    y: Option<f64>,
    s: f64,
}

impl LowPassFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Smooth `value` with the given alpha; the first sample passes through
    pub fn filter_with_alpha(&mut self, value: f64, alpha: f64) -> f64 {
        let s = match self.y {
            None => value,
            Some(_) => alpha * value + (1.0 - alpha) * self.s,
        };
        self.y = Some(value);
        self.s = s;
        s
    }

    pub fn last_raw_value(&self) -> Option<f64> {
        self.y
    }

    pub fn last_value(&self) -> Option<f64> {
        self.y.map(|_| self.s)
    }

    pub fn reset(&mut self) {
        self.y = None;
        self.s = 0.0;
    }
}

/// Adaptive low-pass filter for one scalar axis
#[derive(Debug, Clone)]
pub struct OneEuroFilter {
    freq: f64,
    mincutoff: f64,
    beta: f64,
    dcutoff: f64,
    x: LowPassFilter,
    dx: LowPassFilter,
    last_time: Option<f64>,
}

impl OneEuroFilter {
    /// Create a filter, rejecting non-positive or non-finite parameters
    pub fn new(params: FilterParams) -> Result<Self, FilterError> {
        params.validate()?;
        Ok(Self {
            freq: params.freq,
            mincutoff: params.mincutoff,
            beta: params.beta,
            dcutoff: params.dcutoff,
            x: LowPassFilter::new(),
            dx: LowPassFilter::new(),
            last_time: None,
        })
    }

    /// Current sampling-rate estimate (Hz)
    pub fn frequency(&self) -> f64 {
        self.freq
    }

    fn alpha(&self, cutoff: f64) -> f64 {
        let te = 1.0 / self.freq;
        let tau = 1.0 / (2.0 * PI * cutoff);
        1.0 / (1.0 + tau / te)
    }

    /// Filter one sample, optionally stamped in seconds
    ///
    /// The first sample is returned unchanged. Non-finite samples leave the
    /// state untouched and yield the last filtered value.
    pub fn filter(&mut self, value: f64, timestamp: Option<f64>) -> f64 {
        if !value.is_finite() {
            return self.x.last_value().unwrap_or(value);
        }

        if let (Some(last), Some(now)) = (self.last_time, timestamp) {
            let dt = now - last;
            if dt.is_finite() && dt > 0.0 {
                self.freq = 1.0 / dt;
            }
        }
        if timestamp.is_some_and(f64::is_finite) {
            self.last_time = timestamp;
        }

        let prev = self.x.last_raw_value().unwrap_or(value);
        let dvalue = (value - prev) * self.freq;
        let edvalue = self.dx.filter_with_alpha(dvalue, self.alpha(self.dcutoff));
        let cutoff = self.mincutoff + self.beta * edvalue.abs();
        self.x.filter_with_alpha(value, self.alpha(cutoff))
    }

    pub fn reset(&mut self) {
        self.x.reset();
        self.dx.reset();
        self.last_time = None;
    }
}

/// Pair of One-Euro filters for a 2D screen position
#[derive(Debug, Clone)]
pub struct PointFilter {
    pub x: OneEuroFilter,
    pub y: OneEuroFilter,
}

impl PointFilter {
    pub fn new(params: FilterParams) -> Result<Self, FilterError> {
        Ok(Self {
            x: OneEuroFilter::new(params)?,
            y: OneEuroFilter::new(params)?,
        })
    }

    pub fn filter(&mut self, pos: (f64, f64), timestamp: Option<f64>) -> (f64, f64) {
        (self.x.filter(pos.0, timestamp), self.y.filter(pos.1, timestamp))
    }

    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
    }
}
