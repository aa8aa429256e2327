//! Planar geometry over keypoints.
//!
//! All helpers take `Option` inputs so a missing landmark flows through as
//! `None` instead of being checked at every call site.

use dpose_models::Keypoint;

/// Angle in degrees at vertex `b` between rays `b→a` and `b→c`.
///
/// Uses x/y only. `None` when a point is missing or either ray has zero
/// length.
pub fn angle_at(a: Option<&Keypoint>, b: Option<&Keypoint>, c: Option<&Keypoint>) -> Option<f32> {
    let (a, b, c) = (a?, b?, c?);
    angle_between((a.x_px, a.y_px), (b.x_px, b.y_px), (c.x_px, c.y_px))
}

/// Angle in degrees at `b` for raw coordinate pairs.
pub fn angle_between(a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> Option<f32> {
    let ab = ((a.0 - b.0) as f64, (a.1 - b.1) as f64);
    let cb = ((c.0 - b.0) as f64, (c.1 - b.1) as f64);

    let magnitude = ab.0.hypot(ab.1) * cb.0.hypot(cb.1);
    if magnitude == 0.0 || !magnitude.is_finite() {
        return None;
    }

    let cos = ((ab.0 * cb.0 + ab.1 * cb.1) / magnitude).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees() as f32)
}

/// Horizontal distance between two shoulders, in pixels.
pub fn shoulder_width(left: Option<&Keypoint>, right: Option<&Keypoint>) -> Option<f32> {
    Some((left?.x_px - right?.x_px).abs())
}

/// X coordinate halfway between two keypoints.
pub fn midpoint_x(a: Option<&Keypoint>, b: Option<&Keypoint>) -> Option<f32> {
    Some((a?.x_px + b?.x_px) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_right_angle() {
        let a = Keypoint::at(0.0, 1.0);
        let b = Keypoint::at(0.0, 0.0);
        let c = Keypoint::at(1.0, 0.0);
        let angle = angle_at(Some(&a), Some(&b), Some(&c)).unwrap();
        assert!(angle > 80.0 && angle < 100.0);
        assert!((angle - 90.0).abs() < 1e-4);
    }

    #[test]
    fn test_straight_and_folded() {
        let straight = angle_between((-1.0, 0.0), (0.0, 0.0), (1.0, 0.0)).unwrap();
        assert!((straight - 180.0).abs() < 1e-4);

        let folded = angle_between((1.0, 0.0), (0.0, 0.0), (2.0, 0.0)).unwrap();
        assert!(folded.abs() < 1e-4);
    }

    #[test]
    fn test_missing_point() {
        let p = Keypoint::at(1.0, 1.0);
        assert!(angle_at(None, Some(&p), Some(&p)).is_none());
        assert!(angle_at(Some(&p), None, Some(&p)).is_none());
        assert!(angle_at(Some(&p), Some(&p), None).is_none());
    }

    #[test]
    fn test_zero_length_ray() {
        let b = Keypoint::at(5.0, 5.0);
        let c = Keypoint::at(6.0, 5.0);
        assert!(angle_at(Some(&b), Some(&b), Some(&c)).is_none());
    }

    #[test]
    fn test_width_and_midpoint() {
        let l = Keypoint::at(300.0, 100.0);
        let r = Keypoint::at(200.0, 100.0);
        assert_eq!(shoulder_width(Some(&l), Some(&r)), Some(100.0));
        assert_eq!(midpoint_x(Some(&l), Some(&r)), Some(250.0));
        assert_eq!(shoulder_width(Some(&l), None), None);
    }
}
