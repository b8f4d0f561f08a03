//! Various geometry utilities that completes the `glam` math crate.

use glam::{DVec3, IVec3};


/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub min: DVec3,
    pub max: DVec3,
}

impl BoundingBox {

    /// The unit cube, from the origin to (1, 1, 1).
    pub const CUBE: Self = Self { min: DVec3::ZERO, max: DVec3::ONE };

    /// Construct a new bounding box from the minimum and maximum points.
    pub const fn new(min_x: f64, min_y: f64, min_z: f64, max_x: f64, max_y: f64, max_z: f64) -> Self {
        Self {
            min: DVec3::new(min_x, min_y, min_z),
            max: DVec3::new(max_x, max_y, max_z),
        }
    }

    /// Calculate the size of this bounding box.
    pub fn size(self) -> DVec3 {
        self.max - self.min
    }

    /// Offset this bounding box' coordinates by the given delta.
    pub fn offset(self, delta: DVec3) -> Self {
        Self {
            min: self.min + delta,
            max: self.max + delta,
        }
    }

    /// Return true if this bounding box contains the given point.
    pub fn contains(self, point: DVec3) -> bool {
        point.x > self.min.x && point.x < self.max.x &&
        point.y > self.min.y && point.y < self.max.y &&
        point.z > self.min.z && point.z < self.max.z
    }

    /// Return true if this bounding box intersects with the given one.
    pub fn intersects(self, other: Self) -> bool {
        other.max.x > self.min.x && other.min.x < self.max.x &&
        other.max.y > self.min.y && other.min.y < self.max.y &&
        other.max.z > self.min.z && other.min.z < self.max.z
    }

    /// Compute an intersection of a ray into this bounding box. The ray is given as an
    /// origin point and a displacement vector, only the segment between the origin and
    /// origin + ray is tested. If the segment enters the box, the entry point and the
    /// face it crosses are returned. A segment starting inside the box crosses no face
    /// and returns none.
    pub fn calc_ray_trace(self, origin: DVec3, ray: DVec3) -> Option<(DVec3, Face)> {

        let mut near = 0.0f64;
        let mut far = 1.0f64;
        let mut near_face = None;

        for axis in 0..3 {

            if ray[axis] * ray[axis] < 1e-14 {
                // The segment runs parallel to this axis' slab.
                if origin[axis] < self.min[axis] || origin[axis] > self.max[axis] {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / ray[axis];
            let mut entry = (self.min[axis] - origin[axis]) * inv;
            let mut exit = (self.max[axis] - origin[axis]) * inv;
            // A negative ray component crosses the maximum plane first.
            let entry_face = if ray[axis] > 0.0 { Face::NEG[axis] } else { Face::POS[axis] };

            if entry > exit {
                std::mem::swap(&mut entry, &mut exit);
            }

            if entry > near {
                near = entry;
                near_face = Some(entry_face);
            }

            far = far.min(exit);
            if near > far {
                return None;
            }

        }

        near_face.map(|face| (origin + ray * near, face))

    }

}


/// Represent a cube facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Face {
    NegY = 0,
    PosY = 1,
    NegZ = 2,
    PosZ = 3,
    NegX = 4,
    PosX = 5,
}

impl Face {

    /// Array containing all 6 faces.
    pub const ALL: [Self; 6] = [Self::NegY, Self::PosY, Self::NegZ, Self::PosZ, Self::NegX, Self::PosX];
    /// Negative faces by glam axis index.
    pub const NEG: [Self; 3] = [Self::NegX, Self::NegY, Self::NegZ];
    /// Positive faces by glam axis index.
    pub const POS: [Self; 3] = [Self::PosX, Self::PosY, Self::PosZ];

    #[inline]
    pub fn is_pos(self) -> bool {
        matches!(self, Face::PosX | Face::PosY | Face::PosZ)
    }

    #[inline]
    pub fn is_neg(self) -> bool {
        matches!(self, Face::NegX | Face::NegY | Face::NegZ)
    }

    #[inline]
    pub fn is_y(self) -> bool {
        matches!(self, Face::NegY | Face::PosY)
    }

    /// Get the axis (X, Y, Z) index for that face when using `glam` vectors.
    #[inline]
    pub fn axis_index(self) -> usize {
        match self {
            Face::NegY |
            Face::PosY => 1,
            Face::NegZ |
            Face::PosZ => 2,
            Face::NegX |
            Face::PosX => 0,
        }
    }

    /// Get the opposite face.
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Face::NegY => Face::PosY,
            Face::PosY => Face::NegY,
            Face::NegZ => Face::PosZ,
            Face::PosZ => Face::NegZ,
            Face::NegX => Face::PosX,
            Face::PosX => Face::NegX,
        }
    }

    /// Get the delta vector for this face.
    #[inline]
    pub fn delta(self) -> IVec3 {
        match self {
            Face::NegY => IVec3::NEG_Y,
            Face::PosY => IVec3::Y,
            Face::NegZ => IVec3::NEG_Z,
            Face::PosZ => IVec3::Z,
            Face::NegX => IVec3::NEG_X,
            Face::PosX => IVec3::X,
        }
    }

}


#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn ray_trace_faces() {

        let bb = BoundingBox::CUBE.offset(DVec3::new(2.0, 0.0, 0.0));

        // Straight along +X into the NegX face.
        let (point, face) = bb.calc_ray_trace(DVec3::new(0.0, 0.5, 0.5), DVec3::new(4.0, 0.0, 0.0)).unwrap();
        assert_eq!(face, Face::NegX);
        assert_eq!(point, DVec3::new(2.0, 0.5, 0.5));

        // Opposite direction into the PosX face.
        let (point, face) = bb.calc_ray_trace(DVec3::new(5.0, 0.5, 0.5), DVec3::new(-4.0, 0.0, 0.0)).unwrap();
        assert_eq!(face, Face::PosX);
        assert_eq!(point, DVec3::new(3.0, 0.5, 0.5));

        // Downward into the PosY face.
        let (point, face) = bb.calc_ray_trace(DVec3::new(2.5, 3.0, 0.5), DVec3::new(0.0, -4.0, 0.0)).unwrap();
        assert_eq!(face, Face::PosY);
        assert_eq!(point, DVec3::new(2.5, 1.0, 0.5));

    }

    #[test]
    fn ray_trace_miss() {

        let bb = BoundingBox::CUBE;

        // Parallel to the box but outside of it.
        assert_eq!(bb.calc_ray_trace(DVec3::new(2.0, 0.5, 0.5), DVec3::new(0.0, 0.0, 4.0)), None);
        // Too short to reach the box.
        assert_eq!(bb.calc_ray_trace(DVec3::new(-2.0, 0.5, 0.5), DVec3::new(1.0, 0.0, 0.0)), None);
        // Pointing away from the box.
        assert_eq!(bb.calc_ray_trace(DVec3::new(-2.0, 0.5, 0.5), DVec3::new(-4.0, 0.0, 0.0)), None);
        // Starting inside the box, no face is crossed.
        assert_eq!(bb.calc_ray_trace(DVec3::new(0.5, 0.5, 0.5), DVec3::new(4.0, 0.0, 0.0)), None);

    }

    #[test]
    fn face_delta() {
        for face in Face::ALL {
            assert_eq!(face.delta() + face.opposite().delta(), IVec3::ZERO);
            assert_eq!(face.delta()[face.axis_index()], if face.is_pos() { 1 } else { -1 });
        }
    }

}
