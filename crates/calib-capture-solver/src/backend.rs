//! External nonlinear intrinsics solver interface.

use nalgebra::{Matrix3, Point2, Point3, Vector3};

use crate::styles::CalibFlags;

/// Pinhole camera intrinsics with plumb-bob distortion
/// `[k1, k2, p1, p2, k3]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraModel {
    pub matrix: Matrix3<f64>,
    pub dist: [f64; 5],
}

impl CameraModel {
    #[inline]
    pub fn fx(&self) -> f64 {
        self.matrix[(0, 0)]
    }

    #[inline]
    pub fn fy(&self) -> f64 {
        self.matrix[(1, 1)]
    }

    #[inline]
    pub fn cx(&self) -> f64 {
        self.matrix[(0, 2)]
    }

    #[inline]
    pub fn cy(&self) -> f64 {
        self.matrix[(1, 2)]
    }
}

/// Per-view correspondences handed to the solver. `board_points[i]` and
/// `image_points[i]` have equal lengths for every view `i`.
#[derive(Clone, Copy, Debug)]
pub struct CalibViews<'a> {
    pub board_points: &'a [Vec<Point3<f32>>],
    pub image_points: &'a [Vec<Point2<f32>>],
}

/// Result of one calibration solve.
#[derive(Clone, Debug)]
pub struct SolveOutput {
    /// Overall RMS re-projection error in pixels.
    pub rms: f64,
    pub camera: CameraModel,
    /// Per-view board pose, Rodrigues rotation + translation.
    pub rvecs: Vec<Vector3<f64>>,
    pub tvecs: Vec<Vector3<f64>>,
    /// Standard deviations of fx, fy, cx, cy, k1, k2, p1, p2, k3.
    pub std_intrinsics: [f64; 9],
    pub per_view_rms: Vec<f64>,
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum SolverError {
    #[error("degenerate input: {0}")]
    Degenerate(String),
    #[error("solver backend failed: {0}")]
    Backend(String),
}

/// Nonlinear camera calibration backend. Implementations run the full
/// bundle-style intrinsics optimization; this crate only prepares the
/// correspondences and interprets the result.
pub trait IntrinsicsSolver: Send + Sync {
    fn solve(
        &self,
        views: CalibViews<'_>,
        image_size: (u32, u32),
        flags: CalibFlags,
        initial: Option<CameraModel>,
    ) -> Result<SolveOutput, SolverError>;
}
