// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Translation / rotation / scale decomposition of affine transforms
//!
//! Instance transforms are expected to be free of shear. Under shear, scale and
//! rotation alias and no exact TRS triple exists: [`decompose`] then returns the
//! closest rotation (polar decomposition after removing the column scales), which
//! reproduces the original matrix only approximately. Use [`decompose_checked`]
//! to reject such input.
//!
//! Precision: scales are column norms in f64, so relative error stays near
//! machine epsilon for well-conditioned input. Axes with a scale below
//! [`MIN_SCALE`] are considered collapsed and yield an identity rotation.

use crate::error::{Error, Result};
use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, UnitQuaternion, Vector3};

/// Scale magnitude below which an axis is treated as collapsed
pub const MIN_SCALE: f64 = 1e-12;

/// Default tolerance on the cosine between two transformed axes
pub const DEFAULT_SHEAR_TOLERANCE: f64 = 1e-4;

/// Translation, rotation and scale of an affine transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trs {
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub scale: Vector3<f64>,
}

impl Trs {
    /// Recompose into `T * R * S`
    pub fn to_matrix(&self) -> Matrix4<f64> {
        Matrix4::new_translation(&self.translation)
            * self.rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale)
    }

    /// Scale, rotate, then translate a point.
    ///
    /// Same arithmetic as the vertex-stage snippet in the edge generator:
    /// `p += 2 * cross(q.xyz, cross(q.xyz, p) + q.w * p)`.
    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        let mut p = point.coords.component_mul(&self.scale);
        let q = self.rotation.quaternion();
        let axis = q.imag();
        p += 2.0 * axis.cross(&(axis.cross(&p) + q.w * p));
        Point3::from(p + self.translation)
    }
}

/// Decompose an affine transform into translation, rotation and scale.
///
/// A negative determinant is folded into the X scale.
pub fn decompose(matrix: &Matrix4<f64>) -> Trs {
    let translation = Vector3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)]);
    let linear: Matrix3<f64> = matrix.fixed_view::<3, 3>(0, 0).into_owned();

    let mut scale = Vector3::new(
        linear.column(0).norm(),
        linear.column(1).norm(),
        linear.column(2).norm(),
    );
    if linear.determinant() < 0.0 {
        scale.x = -scale.x;
    }

    if scale.iter().any(|s| s.abs() < MIN_SCALE) {
        return Trs {
            translation,
            rotation: UnitQuaternion::identity(),
            scale,
        };
    }

    let mut unscaled = linear;
    for i in 0..3 {
        let s = scale[i];
        unscaled.column_mut(i).unscale_mut(s);
    }

    // Polar decomposition: the closest orthonormal matrix is U * V^T
    let svd = unscaled.svd(true, true);
    let orthonormal = match (svd.u, svd.v_t) {
        (Some(mut u), Some(v_t)) => {
            if (u * v_t).determinant() < 0.0 {
                u.column_mut(2).neg_mut();
            }
            u * v_t
        }
        _ => Matrix3::identity(),
    };
    let rotation = Rotation3::from_matrix_unchecked(orthonormal);

    Trs {
        translation,
        rotation: UnitQuaternion::from_rotation_matrix(&rotation),
        scale,
    }
}

/// Largest absolute cosine between any two transformed axes
pub fn max_axis_cosine(matrix: &Matrix4<f64>) -> f64 {
    let linear: Matrix3<f64> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
    let axes: Vec<Vector3<f64>> = (0..3)
        .filter_map(|i| linear.column(i).into_owned().try_normalize(MIN_SCALE))
        .collect();

    let mut worst: f64 = 0.0;
    for i in 0..axes.len() {
        for j in (i + 1)..axes.len() {
            worst = worst.max(axes[i].dot(&axes[j]).abs());
        }
    }
    worst
}

/// Reject transforms whose axes are not mutually orthogonal
pub fn check_no_shear(matrix: &Matrix4<f64>, tolerance: f64) -> Result<()> {
    let max_cosine = max_axis_cosine(matrix);
    if max_cosine > tolerance {
        return Err(Error::ShearedTransform { max_cosine });
    }
    Ok(())
}

/// [`decompose`] rejecting sheared or collapsed transforms
pub fn decompose_checked(matrix: &Matrix4<f64>, tolerance: f64) -> Result<Trs> {
    check_no_shear(matrix, tolerance)?;
    let trs = decompose(matrix);
    if trs.scale.iter().any(|s| s.abs() < MIN_SCALE) {
        return Err(Error::DegenerateTransform(format!(
            "collapsed axis, scale {:?}",
            trs.scale.as_slice()
        )));
    }
    Ok(trs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_3;

    fn sample() -> Matrix4<f64> {
        Matrix4::new_translation(&Vector3::new(4.0, -2.0, 9.5))
            * Matrix4::from_axis_angle(&Vector3::z_axis(), FRAC_PI_3)
            * Matrix4::new_nonuniform_scaling(&Vector3::new(2.0, 0.5, 3.0))
    }

    #[test]
    fn test_decompose_recovers_components() {
        let trs = decompose(&sample());
        assert_relative_eq!(trs.translation, Vector3::new(4.0, -2.0, 9.5), epsilon = 1e-12);
        assert_relative_eq!(trs.scale, Vector3::new(2.0, 0.5, 3.0), epsilon = 1e-12);
        assert_relative_eq!(trs.rotation.angle(), FRAC_PI_3, epsilon = 1e-9);
        assert_relative_eq!(trs.to_matrix(), sample(), epsilon = 1e-9);
    }

    #[test]
    fn test_apply_matches_matrix() {
        let m = sample();
        let trs = decompose(&m);
        let p = Point3::new(1.0, 2.0, -3.0);
        assert_relative_eq!(trs.apply(&p), m.transform_point(&p), epsilon = 1e-9);
    }

    #[test]
    fn test_mirrored_transform_folds_sign_into_x() {
        let m = Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, -1.0, 1.0));
        let trs = decompose(&m);
        assert!(trs.scale.x < 0.0);
        assert_relative_eq!(trs.to_matrix(), m, epsilon = 1e-9);
    }

    #[test]
    fn test_collapsed_axis_gives_identity_rotation() {
        let m = Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 0.0, 1.0));
        let trs = decompose(&m);
        assert_eq!(trs.rotation, UnitQuaternion::identity());
        assert!(matches!(
            decompose_checked(&m, DEFAULT_SHEAR_TOLERANCE),
            Err(Error::DegenerateTransform(_))
        ));
    }

    #[test]
    fn test_shear_is_detected() {
        let mut m = Matrix4::identity();
        m[(0, 1)] = 0.5;
        assert!(matches!(
            check_no_shear(&m, DEFAULT_SHEAR_TOLERANCE),
            Err(Error::ShearedTransform { .. })
        ));
        assert!(decompose_checked(&sample(), DEFAULT_SHEAR_TOLERANCE).is_ok());
    }
}
