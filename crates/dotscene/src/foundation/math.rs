//! Math utilities and types
//!
//! Provides the math and value types shared by the document coercion layer,
//! the host object model and the exporter.

pub use nalgebra::{
    Vector3, Vector4,
    Matrix3,
    Quaternion,
    Unit, UnitQuaternion,
};

use serde::{Deserialize, Serialize};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// Quaternion type for rotations
pub type Quat = UnitQuaternion<f32>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position relative to the parent
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform from all three components
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self { position, rotation, scale }
    }

    /// Combine this transform (as parent) with a child transform
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * (self.scale.component_mul(&other.position)),
            rotation: self.rotation * other.rotation,
            scale: self.scale.component_mul(&other.scale),
        }
    }
}

/// RGBA colour with floating point channels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColourValue {
    /// Red channel
    pub r: f32,
    /// Green channel
    pub g: f32,
    /// Blue channel
    pub b: f32,
    /// Alpha channel
    pub a: f32,
}

impl ColourValue {
    /// Opaque white
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Opaque black
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Create a colour from all four channels
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque colour
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }
}

impl Default for ColourValue {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Plane in constant-normal form: `normal . p + d = 0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Plane normal (not necessarily normalized)
    pub normal: Vec3,
    /// Plane constant
    pub d: f32,
}

impl Plane {
    /// Create a plane from a normal and constant
    pub fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }
}

impl Default for Plane {
    fn default() -> Self {
        Self::new(Vec3::zeros(), 0.0)
    }
}

/// Axis-aligned rectangle with floating point edges
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FloatRect {
    /// Left edge
    pub left: f32,
    /// Top edge
    pub top: f32,
    /// Right edge
    pub right: f32,
    /// Bottom edge
    pub bottom: f32,
}

impl FloatRect {
    /// Create a rectangle from its edges
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self { left, top, right, bottom }
    }
}

/// Order in which Euler angle rotations are composed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EulerOrder {
    /// X, then Y, then Z
    Xyz,
    /// X, then Z, then Y
    Xzy,
    /// Y, then X, then Z
    Yxz,
    /// Y, then Z, then X
    Yzx,
    /// Z, then X, then Y
    Zxy,
    /// Z, then Y, then X
    Zyx,
}

impl EulerOrder {
    /// Build the rotation for angles given per axis (radians)
    ///
    /// Each angle always rotates about its own axis; the order only decides
    /// how the three axis rotations are multiplied together.
    pub fn to_quaternion(self, angles: Vec3) -> Quat {
        let rx = Quat::from_axis_angle(&Vec3::x_axis(), angles.x);
        let ry = Quat::from_axis_angle(&Vec3::y_axis(), angles.y);
        let rz = Quat::from_axis_angle(&Vec3::z_axis(), angles.z);

        match self {
            Self::Xyz => rx * ry * rz,
            Self::Xzy => rx * rz * ry,
            Self::Yxz => ry * rx * rz,
            Self::Yzx => ry * rz * rx,
            Self::Zxy => rz * rx * ry,
            Self::Zyx => rz * ry * rx,
        }
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Math utility functions
pub mod utils {
    use super::*;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }

    /// Whether `value` is a power of two (zero counts, matching the bit test)
    pub fn is_power_of_two(value: u32) -> bool {
        value & value.wrapping_sub(1) == 0
    }

    /// Largest power of two strictly below the next power of two at or above `value`
    ///
    /// For a non power of two this is the power of two just below `value`.
    pub fn next_smaller_power_of_two(value: u32) -> u32 {
        let ceiling = if is_power_of_two(value) {
            value
        } else {
            value.checked_next_power_of_two().unwrap_or(1 << 31)
        };
        ceiling >> 1
    }

    /// Orientation whose local -Z axis points along `direction`
    ///
    /// A zero direction yields the identity.
    pub fn orientation_facing(direction: Vec3) -> Quat {
        if direction.norm_squared() <= f32::EPSILON {
            return Quat::identity();
        }
        let forward = -Vec3::z();
        Quat::rotation_between(&forward, &direction.normalize())
            .unwrap_or_else(|| Quat::from_axis_angle(&Vec3::y_axis(), constants::PI))
    }

    /// The first local axis of an orientation
    pub fn local_x_axis(orientation: &Quat) -> Vec3 {
        orientation * Vec3::x()
    }
}
