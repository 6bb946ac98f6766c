// Transform utilities for LDraw subfile matrices
//
// LDraw type-1 lines carry `x y z a b c d e f g h i`, meaning
//   x' = a*u + b*v + c*w + x
//   y' = d*u + e*v + f*w + y
//   z' = g*u + h*v + i*w + z
// so the 3x3 block arrives row by row and has to be transposed into glam's columns.

use glam::{Mat4, Vec3, Vec4};

use crate::Bounds;

/// Build a 4x4 affine transform from the twelve numeric fields of a subfile line.
pub fn ldraw_matrix(params: [f32; 12]) -> Mat4 {
    let [x, y, z, a, b, c, d, e, f, g, h, i] = params;
    Mat4::from_cols(
        Vec4::new(a, d, g, 0.0),
        Vec4::new(b, e, h, 0.0),
        Vec4::new(c, f, i, 0.0),
        Vec4::new(x, y, z, 1.0),
    )
}

/// Extension trait for Mat4 with the operations the geometry builder needs.
pub trait Mat4Ext {
    /// True when the transform mirrors space (negative determinant),
    /// which reverses the apparent winding of every polygon it touches.
    fn flips_winding(&self) -> bool;

    /// Transform a list of points in place.
    fn transform_points(&self, points: &mut [Vec3]);

    /// Transform an axis-aligned bounding box.
    /// Computes the bounds of all 8 transformed corners.
    fn transform_bounds(&self, bounds: &Bounds) -> Bounds;
}

impl Mat4Ext for Mat4 {
    fn flips_winding(&self) -> bool {
        self.determinant() < 0.0
    }

    fn transform_points(&self, points: &mut [Vec3]) {
        for point in points.iter_mut() {
            *point = self.transform_point3(*point);
        }
    }

    fn transform_bounds(&self, bounds: &Bounds) -> Bounds {
        if bounds.is_empty() {
            return *bounds;
        }

        let mut result = Bounds::empty();
        for corner in bounds.corners() {
            result.include(self.transform_point3(corner));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY_PARAMS: [f32; 12] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

    #[test]
    fn test_identity_params() {
        assert_eq!(ldraw_matrix(IDENTITY_PARAMS), Mat4::IDENTITY);
    }

    #[test]
    fn test_translation_from_first_three_params() {
        let mut params = IDENTITY_PARAMS;
        params[0] = 10.0;
        params[1] = -24.0;
        params[2] = 5.0;
        let m = ldraw_matrix(params);

        let p = m.transform_point3(Vec3::ZERO);
        assert_eq!(p, Vec3::new(10.0, -24.0, 5.0));
    }

    #[test]
    fn test_rotation_block_is_transposed() {
        // a b c / d e f / g h i = 0 0 1 / 0 1 0 / -1 0 0 (90 degrees about Y)
        let params = [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, -1.0, 0.0, 0.0];
        let m = ldraw_matrix(params);

        // x' = a*u + b*v + c*w = w, z' = g*u = -u
        let p = m.transform_point3(Vec3::new(1.0, 2.0, 3.0));
        assert!((p - Vec3::new(3.0, 2.0, -1.0)).length() < 1e-6);
    }

    #[test]
    fn test_mirror_flips_winding() {
        let mut params = IDENTITY_PARAMS;
        params[3] = -1.0;
        assert!(ldraw_matrix(params).flips_winding());
        assert!(!ldraw_matrix(IDENTITY_PARAMS).flips_winding());
    }

    #[test]
    fn test_transform_points() {
        let m = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let mut points = [Vec3::ZERO, Vec3::Y];
        m.transform_points(&mut points);
        assert_eq!(points, [Vec3::X, Vec3::new(1.0, 1.0, 0.0)]);
    }

    #[test]
    fn test_transform_bounds_translation() {
        let m = Mat4::from_translation(Vec3::new(5.0, 5.0, 5.0));
        let bounds = Bounds::from_points(Vec3::ZERO, Vec3::ONE);
        let transformed = m.transform_bounds(&bounds);

        assert!((transformed.min - Vec3::splat(5.0)).length() < 0.001);
        assert!((transformed.max - Vec3::splat(6.0)).length() < 0.001);
    }

    #[test]
    fn test_transform_empty_bounds_stays_empty() {
        let m = Mat4::from_scale(Vec3::splat(2.0));
        assert!(m.transform_bounds(&Bounds::empty()).is_empty());
    }
}
