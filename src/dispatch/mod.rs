//! Dispatch module - Turns decoded Omicron events into pointer operations
//!
//! The Dispatcher owns every piece of per-source state:
//! - Touch pointers and two-finger gestures (zoom / window drag)
//! - Wand button trackers, smoothing filters and last projected position
//! - The pointer that last moved, used as the target for keyboard events
//!
//! It is driven by exactly one task; each packet is handled to completion
//! before the next one.

/// Log at info when `gestureDebug` is on, debug otherwise
macro_rules! gesture_log {
    ($dispatcher:expr, $($arg:tt)*) => {
        if $dispatcher.config.omicron.gesture_debug {
            tracing::info!($($arg)*);
        } else {
            tracing::debug!($($arg)*);
        }
    };
}

mod mocap;
mod touch;
mod wand;

pub use mocap::{skeleton_from_extra, JOINT_NAMES};
pub use wand::{EdgeKind, WandAction, WandEdge, WandState, WandTracker};

#[cfg(test)]
mod tests;

use crate::config::AppConfig;
use crate::projection::CoordinateCalculator;
use crate::protocol::{EventType, ExtraData, RawEvent, ServiceType};
use crate::sink::{deliver, InputSink};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Counters reported on shutdown
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// Datagrams handed to `handle_packet`
    pub packets: u64,
    /// Events routed to a service handler
    pub dispatched: u64,
    /// Truncated or unrecognized events
    pub ignored: u64,
}

/// Pointer that produced the latest position
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LastPointer {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

/// Main dispatcher translating Omicron events into sink calls
pub struct Dispatcher {
    pub(crate) config: AppConfig,
    pub(crate) sink: Arc<dyn InputSink>,
    pub(crate) calculator: CoordinateCalculator,
    /// Touch pointers and gestures by source id
    pub(crate) touches: HashMap<u32, touch::TouchPointer>,
    /// Wand trackers by source id
    pub(crate) wands: HashMap<u32, WandTracker>,
    pub(crate) last_pointer: Option<LastPointer>,
    pub(crate) stats: DispatchStats,
}

impl Dispatcher {
    /// Create a dispatcher for a validated configuration
    pub fn new(config: AppConfig, sink: Arc<dyn InputSink>) -> Result<Self> {
        config.validate()?;
        let calculator = CoordinateCalculator::new(config.geometry)
            .context("Failed to build coordinate calculator")?;

        Ok(Self {
            config,
            sink,
            calculator,
            touches: HashMap::new(),
            wands: HashMap::new(),
            last_pointer: None,
            stats: DispatchStats::default(),
        })
    }

    /// Apply a reloaded configuration
    ///
    /// Pointer state survives. Wand filters restart only when the wand
    /// settings changed; visible wands are re-shown in their new style.
    pub fn update_config(&mut self, config: AppConfig) -> Result<()> {
        config.validate()?;
        self.calculator = CoordinateCalculator::new(config.geometry)
            .context("Failed to build coordinate calculator")?;

        let wand_changed = config.wand != self.config.wand;
        for (&source_id, tracker) in self.wands.iter_mut() {
            if wand_changed {
                tracker.configure_filter(&config.wand);
            }
            for command in tracker.restyle(wand::wand_style(&config.omicron, source_id)) {
                deliver(self.sink.as_ref(), command);
            }
        }
        self.config = config;
        info!("🔄 Dispatcher configuration updated");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Decode and dispatch one datagram
    pub fn handle_packet(&mut self, data: &[u8]) {
        self.stats.packets += 1;
        let event = RawEvent::decode(data);
        self.handle_event(&event);
    }

    /// Dispatch one decoded event
    pub fn handle_event(&mut self, event: &RawEvent) {
        if self.config.omicron.event_debug {
            info!("📥 {}", event);
        } else {
            trace!("📥 {}", event);
        }

        let (Some(service), Some(event_type)) = (event.service_type, event.event_type) else {
            debug!("Ignoring truncated event: {}", event);
            self.stats.ignored += 1;
            return;
        };
        // sourceId precedes serviceType on the wire
        let source_id = event.source_id.unwrap_or_default();

        let handled = match service {
            ServiceType::Pointer => self.handle_touch(source_id, event_type, event),
            ServiceType::Wand => self.handle_wand(source_id, event),
            ServiceType::Mocap => self.handle_mocap(source_id, event),
            ServiceType::Keyboard => self.handle_keyboard(source_id, event_type),
            ServiceType::Speech => self.handle_speech(source_id, event),
            _ => false,
        };

        if handled {
            self.stats.dispatched += 1;
        } else {
            debug!(
                "Ignoring event: service={:?} type={:?} source={}",
                service, event_type, source_id
            );
            self.stats.ignored += 1;
        }
    }

    /// Keyboard keys go to whichever pointer moved last
    fn handle_keyboard(&mut self, source_id: u32, event_type: EventType) -> bool {
        let Some(last) = self.last_pointer.clone() else {
            debug!("Keyboard event {} without an active pointer", source_id);
            return false;
        };

        match event_type {
            EventType::Down => self.sink.key_down(&last.id, last.x, last.y, source_id),
            EventType::Up => self.sink.key_up(&last.id, last.x, last.y, source_id),
            _ => return false,
        }
        true
    }

    fn handle_speech(&mut self, source_id: u32, event: &RawEvent) -> bool {
        match &event.extra {
            ExtraData::KinectSpeech(text) | ExtraData::Text(text) => {
                info!("🗣️  Speech from {}: {}", source_id, text);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn remember_pointer(&mut self, id: &str, x: f64, y: f64) {
        match &mut self.last_pointer {
            Some(last) if last.id == id => {
                last.x = x;
                last.y = y;
            }
            _ => {
                self.last_pointer = Some(LastPointer {
                    id: id.to_string(),
                    x,
                    y,
                })
            }
        }
    }
}

/// Move `pos` away from `origin` by `scale` times its offset
pub(crate) fn accelerate(origin: (f64, f64), pos: (f64, f64), scale: f64) -> (f64, f64) {
    (
        pos.0 + (pos.0 - origin.0) * scale,
        pos.1 + (pos.1 - origin.1) * scale,
    )
}
