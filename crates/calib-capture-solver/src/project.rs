//! Pinhole projection with plumb-bob distortion, used to recompute
//! per-junction re-projection errors for the report.

use nalgebra::{Matrix3, Point2, Point3, Vector3};

use crate::backend::CameraModel;

/// Rodrigues rotation vector to rotation matrix.
pub fn rodrigues(rvec: Vector3<f64>) -> Matrix3<f64> {
    let theta = rvec.norm();
    if theta < 1e-12 {
        return Matrix3::identity();
    }
    let axis = rvec / theta;
    let k = Matrix3::new(
        0.0, -axis.z, axis.y, //
        axis.z, 0.0, -axis.x, //
        -axis.y, axis.x, 0.0,
    );
    Matrix3::identity() + k * theta.sin() + k * k * (1.0 - theta.cos())
}

/// Project one board point into the image through the camera pose and
/// intrinsics, applying radial (k1..k3) and tangential (p1, p2) distortion.
pub fn project_point(
    camera: &CameraModel,
    rot: &Matrix3<f64>,
    tvec: &Vector3<f64>,
    board_point: Point3<f32>,
) -> Point2<f64> {
    let p = Vector3::new(
        board_point.x as f64,
        board_point.y as f64,
        board_point.z as f64,
    );
    let cam = rot * p + tvec;
    let x = cam.x / cam.z;
    let y = cam.y / cam.z;

    let [k1, k2, p1, p2, k3] = camera.dist;
    let r2 = x * x + y * y;
    let radial = 1.0 + k1 * r2 + k2 * r2 * r2 + k3 * r2 * r2 * r2;
    let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
    let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;

    Point2::new(
        camera.fx() * xd + camera.cx(),
        camera.fy() * yd + camera.cy(),
    )
}

/// Project a batch of board points through one view's pose.
pub fn project_points(
    camera: &CameraModel,
    rvec: &Vector3<f64>,
    tvec: &Vector3<f64>,
    board_points: &[Point3<f32>],
) -> Vec<Point2<f64>> {
    let rot = rodrigues(*rvec);
    board_points
        .iter()
        .map(|&p| project_point(camera, &rot, tvec, p))
        .collect()
}
