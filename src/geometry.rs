use std::ops::Add;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Vec3 {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) z: f32,
}

impl Vec3 {
    pub(crate) const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, o: Vec3) -> Vec3 {
        Vec3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

/// Axis-aligned box in world space. Touching faces count as overlap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Aabb {
    pub(crate) min: Vec3,
    pub(crate) max: Vec3,
}

impl Aabb {
    pub(crate) fn from_local(origin: Vec3, bounds: (Vec3, Vec3)) -> Self {
        Self {
            min: origin + bounds.0,
            max: origin + bounds.1,
        }
    }

    pub(crate) fn intersects(&self, o: &Aabb) -> bool {
        !(o.max.x < self.min.x
            || o.min.x > self.max.x
            || o.max.y < self.min.y
            || o.min.y > self.max.y
            || o.max.z < self.min.z
            || o.min.z > self.max.z)
    }
}

pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_at(x: f32, y: f32, z: f32) -> Aabb {
        Aabb::from_local(
            Vec3::new(x, y, z),
            (Vec3::new(-0.5, -0.5, -0.5), Vec3::new(0.5, 0.5, 0.5)),
        )
    }

    #[test]
    fn overlapping_boxes_intersect() {
        assert!(unit_at(0.0, 0.0, 0.0).intersects(&unit_at(0.5, 0.5, 0.5)));
    }

    #[test]
    fn touching_faces_count() {
        assert!(unit_at(0.0, 0.0, 0.0).intersects(&unit_at(1.0, 0.0, 0.0)));
    }

    #[test]
    fn separated_on_one_axis_is_clear() {
        assert!(!unit_at(0.0, 0.0, 0.0).intersects(&unit_at(0.0, 0.0, 1.5)));
        assert!(!unit_at(0.0, 0.0, 0.0).intersects(&unit_at(0.0, -2.0, 0.0)));
    }

    #[test]
    fn lerp_moves_fraction_of_gap() {
        assert_eq!(lerp(0.0, 10.0, 0.1), 1.0);
        assert_eq!(lerp(5.0, 5.0, 0.3), 5.0);
    }
}
