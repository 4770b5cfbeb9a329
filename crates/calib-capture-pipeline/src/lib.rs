//! Stationary-board capture pipeline.
//!
//! Incoming frames are tested by a small state machine that decides when the
//! calibration board has been held still long enough to capture a usable
//! frame. Captured frames accumulate in a [`CapturedImageSet`] which can be
//! persisted to disk and later handed to the calibration solver.

mod capture;
mod captured_set;
mod frame;
mod overlay;
mod projection;

pub use capture::{CaptureParams, CaptureState, CaptureStateMachine, Overlay, StepOutcome};
pub use captured_set::{CapturedImageSet, PersistenceError};
pub use frame::FiducialFrame;
pub use overlay::{draw_board_boundary, draw_line, RgbImage, COLOR_CAPTURED, COLOR_DONE, COLOR_PENDING};
pub use projection::{BoardProjection, StationaryBoardTracker};
