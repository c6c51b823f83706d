//! Plain compound value types carried inside messages.
//!
//! These deliberately have no dependency on any host math library. Convert at
//! the boundary with the `From` impls for plain arrays/tuples, or with the
//! explicit `to_array`/`from_array` functions.

use serde::{Deserialize, Serialize};

/// Three-component float vector. Encoded as `x, y, z` with no padding.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn from_array(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<[f32; 3]> for Vector3 {
    fn from(v: [f32; 3]) -> Self {
        Self::from_array(v)
    }
}

impl From<Vector3> for [f32; 3] {
    fn from(v: Vector3) -> Self {
        v.to_array()
    }
}

/// Four-component rotation. Encoded as `x, y, z, w` with no padding.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    pub fn from_array(q: [f32; 4]) -> Self {
        Self::new(q[0], q[1], q[2], q[3])
    }
}

impl From<[f32; 4]> for Quaternion {
    fn from(q: [f32; 4]) -> Self {
        Self::from_array(q)
    }
}

impl From<Quaternion> for [f32; 4] {
    fn from(q: Quaternion) -> Self {
        q.to_array()
    }
}

/// Row-major 4x4 float matrix. Encoded as 16 floats, row by row.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Matrix4x4 {
    pub rows: [[f32; 4]; 4],
}

impl Matrix4x4 {
    pub const IDENTITY: Matrix4x4 = Matrix4x4 {
        rows: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.rows[row][col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.rows[row][col] = value;
    }
}

impl From<[[f32; 4]; 4]> for Matrix4x4 {
    fn from(rows: [[f32; 4]; 4]) -> Self {
        Self { rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_zero() {
        assert_eq!(Vector3::default(), Vector3::ZERO);
        assert_eq!(Quaternion::default().to_array(), [0.0; 4]);
        assert_eq!(Matrix4x4::default().get(3, 3), 0.0);
    }

    #[test]
    fn test_array_conversions() {
        let v: Vector3 = [1.0, 2.0, 3.0].into();
        assert_eq!(v, Vector3::new(1.0, 2.0, 3.0));
        let back: [f32; 3] = v.into();
        assert_eq!(back, [1.0, 2.0, 3.0]);

        let q = Quaternion::from([0.0, 0.0, 0.0, 1.0]);
        assert_eq!(q, Quaternion::IDENTITY);
    }

    #[test]
    fn test_bincode_layout_is_flat() {
        // no padding between components
        let bytes = bincode::serialize(&Vector3::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
        assert_eq!(bincode::serialize(&Matrix4x4::IDENTITY).unwrap().len(), 64);
    }
}
