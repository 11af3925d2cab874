//! Fixed isometric camera.

use crate::types::BoundingBox;
use glam::{Mat4, Vec3};

/// Rotation about the vertical axis, in degrees.
pub const YAW_DEGREES: f32 = -22.5;

/// Downward tilt about the horizontal axis, in degrees.
pub const PITCH_DEGREES: f32 = 45.0;

/// Framing parameters for the isometric view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Extra space around the model, as a fraction of its extent.
    pub padding: f32,
    /// Smallest extent the projection covers, so flat models stay visible.
    pub min_extent: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            padding: 0.1,
            min_extent: 1.0,
        }
    }
}

impl Camera {
    /// View matrix: move the box centre to the origin, turn about Y, then tilt about X.
    pub fn view(&self, bbox: &BoundingBox) -> Mat4 {
        let center = Vec3::from_array(bbox.center());
        Mat4::from_rotation_x(PITCH_DEGREES.to_radians())
            * Mat4::from_rotation_y(YAW_DEGREES.to_radians())
            * Mat4::from_translation(-center)
    }

    /// Orthographic projection that fits the rotated box.
    ///
    /// `aspect` is viewport width over height.
    pub fn projection(&self, bbox: &BoundingBox, view: &Mat4, aspect: f32) -> Mat4 {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for corner in bbox.corners() {
            let p = view.transform_point3(Vec3::from_array(corner));
            min = min.min(p);
            max = max.max(p);
        }
        let extent = max - min;
        let scale = 1.0 + self.padding;
        let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };

        let height = (extent.y.max(extent.x / aspect) * scale).max(self.min_extent);
        let width = height * aspect;
        let depth = (extent.z * scale).max(self.min_extent);

        // The box is centred on the origin after the view transform.
        let (hw, hh, hd) = (width * 0.5, height * 0.5, depth * 0.5);
        Mat4::orthographic_rh(-hw, hw, -hh, hh, -hd, hd)
    }

    pub fn view_projection(&self, bbox: &BoundingBox, aspect: f32) -> Mat4 {
        let view = self.view(bbox);
        self.projection(bbox, &view, aspect) * view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn project(m: &Mat4, p: [f32; 3]) -> Vec3 {
        let clip = *m * Vec4::new(p[0], p[1], p[2], 1.0);
        clip.truncate() / clip.w
    }

    #[test]
    fn test_center_maps_to_origin() {
        let bbox = BoundingBox::new([2.0, 0.0, 2.0], [6.0, 4.0, 8.0]);
        let vp = Camera::default().view_projection(&bbox, 1.0);
        let c = project(&vp, bbox.center());
        assert!(c.x.abs() < 1e-5 && c.y.abs() < 1e-5);
        assert!((c.z - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_corners_fit_with_padding() {
        let bbox = BoundingBox::new([-3.0, 0.0, -1.0], [3.0, 5.0, 1.0]);
        let vp = Camera::default().view_projection(&bbox, 1.0);
        let mut widest = 0.0f32;
        for corner in bbox.corners() {
            let p = project(&vp, corner);
            assert!(p.x.abs() <= 1.0 && p.y.abs() <= 1.0);
            assert!((0.0..=1.0).contains(&p.z));
            widest = widest.max(p.x.abs()).max(p.y.abs());
        }
        // 10% padding leaves the outermost corner at 1/1.1.
        assert!((widest - 1.0 / 1.1).abs() < 1e-4);
    }

    #[test]
    fn test_degenerate_box_uses_min_extent() {
        let bbox = BoundingBox::new([1.0, 1.0, 1.0], [1.0, 1.0, 1.0]);
        let vp = Camera::default().view_projection(&bbox, 1.0);
        assert!(vp.is_finite());
        let p = project(&vp, [1.0, 1.0, 1.0]);
        assert!(p.x.abs() < 1e-5 && p.y.abs() < 1e-5);
    }

    #[test]
    fn test_top_faces_toward_camera() {
        let bbox = BoundingBox::new([-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]);
        let vp = Camera::default().view_projection(&bbox, 1.0);
        let top = project(&vp, [0.0, 1.0, 0.0]);
        let bottom = project(&vp, [0.0, -1.0, 0.0]);
        assert!(top.z < bottom.z);
        assert!(top.y > bottom.y);
    }
}
