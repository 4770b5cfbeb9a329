//! Camera calibration from captured fiducial-board frames.
//!
//! The pipeline crate hands over a set of captured frames; this crate
//! interpolates the board's checkerboard junctions from the detected markers,
//! sweeps a fixed table of calibration styles through an external nonlinear
//! solver on a background thread, and renders the deterministic report.

mod backend;
mod camera_file;
mod interpolate;
mod project;
mod report;
mod session;
mod styles;
mod task;
mod work;

pub use backend::{CalibViews, CameraModel, IntrinsicsSolver, SolveOutput, SolverError};
pub use camera_file::CameraCalibration;
pub use interpolate::{interpolate_junctions, FrameJunctions};
pub use project::{project_point, project_points, rodrigues};
pub use report::{build_report, format_stamp};
pub use session::{CalibrationSession, Command, SessionConfig, SessionError};
pub use styles::{
    seed_camera, style_table, CalibFlags, CalibrationStyle, IntrinsicSeed, PreliminaryStage,
    CUSTOM_SEED,
};
pub use task::CalibrationTask;
pub use work::{CalibrationWork, StyleOutcome, SweepResult};
