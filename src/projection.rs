//! Wand ray to wall projection
//!
//! Projects a tracked wand (position + orientation quaternion) onto a
//! cylindrical display wall and returns normalized wall coordinates, or
//! [`ScreenPosition::INVALID`] when the ray misses the usable surface.
//!
//! # Coordinate frame
//!
//! Tracker space is right-handed, meters, `y` up. The cylinder axis is the
//! vertical line through the origin. A user standing at the origin faces `-z`;
//! the door gap (the part of the circle without screens) is centered behind
//! them on `+z`.
//!
//! Wall coordinates: `x = 0` is the left edge next to the door, `x = 1` the
//! right edge; `y = 0` is the top of the wall.

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};
use thiserror::Error;
use tracing::trace;

/// Reference direction of an unrotated wand
const FORWARD: Vec3 = Vec3 { x: 0.0, y: 0.0, z: -1.0 };

/// Horizontal ray components below this are treated as purely vertical
const VERTICAL_EPSILON: f64 = 1e-12;

/// Distance from the Euler pole singularity treated as the pole itself
const POLE_EPSILON: f64 = 1e-12;

/// Errors from invalid installation geometry
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("wall radius must be positive, got {0}")]
    Radius(f64),
    #[error("wall height range is empty: min_y {min_y} >= max_y {max_y}")]
    HeightRange { min_y: f64, max_y: f64 },
    #[error("door gap must be within [0, 360) degrees, got {0}")]
    DoorGap(f64),
    #[error("projection tolerance must be non-negative, got {0}")]
    Tolerance(f64),
}

/// Physical layout of a cylindrical wall
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WallGeometry {
    /// Cylinder radius (meters)
    #[serde(default = "default_radius")]
    pub radius: f64,
    /// Angle of the opening without displays (degrees)
    #[serde(default = "default_door_gap")]
    pub door_gap_degrees: f64,
    /// Height of the bottom display edge (meters)
    #[serde(default = "default_min_y")]
    pub min_y: f64,
    /// Height of the top display edge (meters)
    #[serde(default = "default_max_y")]
    pub max_y: f64,
    /// Normalized overshoot still clamped onto the wall horizontally
    #[serde(default = "default_tolerance")]
    pub max_x_error: f64,
    /// Normalized overshoot still clamped onto the wall vertically
    #[serde(default = "default_tolerance")]
    pub max_y_error: f64,
}

impl Default for WallGeometry {
    fn default() -> Self {
        Self {
            radius: default_radius(),
            door_gap_degrees: default_door_gap(),
            min_y: default_min_y(),
            max_y: default_max_y(),
            max_x_error: default_tolerance(),
            max_y_error: default_tolerance(),
        }
    }
}

impl WallGeometry {
    pub fn validate(&self) -> Result<(), GeometryError> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(GeometryError::Radius(self.radius));
        }
        if !(self.min_y < self.max_y) {
            return Err(GeometryError::HeightRange {
                min_y: self.min_y,
                max_y: self.max_y,
            });
        }
        if !(0.0..360.0).contains(&self.door_gap_degrees) {
            return Err(GeometryError::DoorGap(self.door_gap_degrees));
        }
        for tolerance in [self.max_x_error, self.max_y_error] {
            if !(tolerance >= 0.0) {
                return Err(GeometryError::Tolerance(tolerance));
            }
        }
        Ok(())
    }

    fn door_radians(&self) -> f64 {
        self.door_gap_degrees.to_radians()
    }
}

// CAVE2 installation
fn default_radius() -> f64 { 3.240 }
fn default_door_gap() -> f64 { 36.0 }
fn default_min_y() -> f64 { 0.305 }
fn default_max_y() -> f64 { 2.625 }
fn default_tolerance() -> f64 { 0.02 }

/// 3D vector in tracker space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Orientation quaternion (`w` is the scalar part)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion { w: 1.0, x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// Rotation of `angle` radians around the vertical axis
    pub fn from_yaw(angle: f64) -> Self {
        let half = angle / 2.0;
        Self::new(half.cos(), 0.0, half.sin(), 0.0)
    }

    /// Rotation of `angle` radians around the lateral (`x`) axis
    pub fn from_pitch(angle: f64) -> Self {
        let half = angle / 2.0;
        Self::new(half.cos(), half.sin(), 0.0, 0.0)
    }

    fn normalized(&self) -> Option<Self> {
        let norm = (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        if !norm.is_finite() || norm < 1e-9 {
            return None;
        }
        Some(Self::new(self.w / norm, self.x / norm, self.y / norm, self.z / norm))
    }
}

/// Normalized wall position, or `(-1, -1)` when off the wall
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScreenPosition {
    pub x: f64,
    pub y: f64,
}

impl ScreenPosition {
    pub const INVALID: ScreenPosition = ScreenPosition { x: -1.0, y: -1.0 };

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

/// Forward direction of a wand with orientation `q`
///
/// Goes through heading/attitude/bank Euler angles. Returns `None` for a
/// degenerate quaternion and at the pole singularity (`x·y + z·w = ±0.5`).
pub fn quaternion_to_direction(q: Quaternion) -> Option<Vec3> {
    let q = q.normalized()?;
    let test = q.x * q.y + q.z * q.w;
    if test.abs() >= 0.5 - POLE_EPSILON {
        trace!(test, "wand orientation at Euler pole");
        return None;
    }

    let (sqx, sqy, sqz) = (q.x * q.x, q.y * q.y, q.z * q.z);
    let heading = (2.0 * q.y * q.w - 2.0 * q.x * q.z).atan2(1.0 - 2.0 * sqy - 2.0 * sqz);
    let attitude = (2.0 * test).asin();
    let bank = (2.0 * q.x * q.w - 2.0 * q.y * q.z).atan2(1.0 - 2.0 * sqx - 2.0 * sqz);

    let (sh, ch) = heading.sin_cos();
    let (sa, ca) = attitude.sin_cos();
    let (sb, cb) = bank.sin_cos();

    let m = [
        [ch * ca, sh * sb - ch * sa * cb, ch * sa * sb + sh * cb],
        [sa, ca * cb, -ca * sb],
        [-sh * ca, sh * sa * cb + ch * sb, -sh * sa * sb + ch * cb],
    ];

    let v = FORWARD;
    Some(Vec3::new(
        m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
        m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
        m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
    ))
}

/// Map `value` onto `[0, 1]`, clamping overshoot up to `tolerance`
fn clamp_with_tolerance(value: f64, tolerance: f64) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    if (0.0..=1.0).contains(&value) {
        Some(value)
    } else if value < 0.0 && value >= -tolerance {
        Some(0.0)
    } else if value > 1.0 && value <= 1.0 + tolerance {
        Some(1.0)
    } else {
        None
    }
}

/// Wand-to-wall projector for one installation
#[derive(Debug, Clone)]
pub struct CoordinateCalculator {
    geometry: WallGeometry,
}

impl CoordinateCalculator {
    pub fn new(geometry: WallGeometry) -> Result<Self, GeometryError> {
        geometry.validate()?;
        Ok(Self { geometry })
    }

    pub fn geometry(&self) -> &WallGeometry {
        &self.geometry
    }

    /// Project a wand ray onto the wall
    pub fn project(&self, position: Vec3, orientation: Quaternion) -> ScreenPosition {
        self.try_project(position, orientation)
            .unwrap_or(ScreenPosition::INVALID)
    }

    fn try_project(&self, p: Vec3, orientation: Quaternion) -> Option<ScreenPosition> {
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            return None;
        }
        let d = quaternion_to_direction(orientation)?;

        // Ray / vertical cylinder intersection
        let a = d.x * d.x + d.z * d.z;
        if a < VERTICAL_EPSILON {
            return None;
        }
        let b = 2.0 * d.x * p.x + 2.0 * d.z * p.z;
        let c = p.x * p.x + p.z * p.z - self.geometry.radius * self.geometry.radius;
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return None;
        }
        let root = discriminant.sqrt();
        let t1 = (-b - root) / (2.0 * a);
        let t2 = (-b + root) / (2.0 * a);
        let t = [t1, t2]
            .into_iter()
            .filter(|t| *t >= 0.0)
            .fold(None, |best: Option<f64>, t| Some(best.map_or(t, |b| b.min(t))))?;

        let hit = Vec3::new(p.x + t * d.x, p.y + t * d.y, p.z + t * d.z);

        let height = (hit.y - self.geometry.min_y) / (self.geometry.max_y - self.geometry.min_y);
        let y = clamp_with_tolerance(1.0 - height, self.geometry.max_y_error)?;

        let door = self.geometry.door_radians();
        let mut angle = hit.x.atan2(hit.z);
        if angle < 0.0 {
            angle += TAU;
        }
        let around = (angle - door / 2.0) / (2.0 * PI - door);
        let x = clamp_with_tolerance(1.0 - around, self.geometry.max_x_error)?;

        Some(ScreenPosition { x, y })
    }
}
