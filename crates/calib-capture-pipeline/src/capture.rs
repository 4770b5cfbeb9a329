//! Capture state machine.
//!
//! Decides when the board has been held still long enough to capture the
//! current frame. The state is an explicit enum and [`CaptureStateMachine::advance`]
//! is the single transition function; capture itself is reported through the
//! returned [`StepOutcome`] so the caller owns the side effect.

use log::info;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::frame::FiducialFrame;
use crate::projection::StationaryBoardTracker;

/// Timing and motion thresholds for the capture state machine.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CaptureParams {
    /// Minimum time the board must be visible before leaving Ready.
    pub ready_dwell_ms: u64,
    /// Time the board must stay stationary before a frame is captured.
    pub stationary_secs: f64,
    /// Normalized corner-motion threshold below which the board counts as
    /// stationary.
    pub delta_threshold: f64,
}

impl Default for CaptureParams {
    fn default() -> Self {
        Self {
            ready_dwell_ms: 500,
            stationary_secs: 4.0,
            delta_threshold: 5.0,
        }
    }
}

/// Capture state. `Ready` debounces board flicker; `Captured` blocks further
/// captures until the board leaves the view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CaptureState {
    Ready { last_empty_ns: u64 },
    Tracking,
    Stationary { since_ns: u64 },
    Captured,
}

/// Board-outline feedback to render for this frame.
#[derive(Clone, Copy, Debug)]
pub struct Overlay {
    pub corners: [Point2<f32>; 4],
    /// Fraction of each side drawn in the "done" color: stationary progress
    /// in `Stationary`, 1.0 in `Captured`, 0.0 elsewhere.
    pub done_fraction: f64,
}

/// Result of advancing the state machine by one frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepOutcome {
    /// The caller must append the current frame to the capture set.
    pub capture: bool,
    pub overlay: Option<Overlay>,
}

pub struct CaptureStateMachine {
    params: CaptureParams,
    state: CaptureState,
    tracker: Option<StationaryBoardTracker>,
    /// Outline recorded at capture time, rendered while in `Captured`.
    captured_corners: Option<[Point2<f32>; 4]>,
}

impl CaptureStateMachine {
    pub fn new(now_ns: u64, params: CaptureParams) -> Self {
        Self {
            params,
            state: CaptureState::Ready { last_empty_ns: now_ns },
            tracker: None,
            captured_corners: None,
        }
    }

    #[inline]
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Advance by one frame. Frames arrive in timestamp order.
    pub fn advance(&mut self, frame: &FiducialFrame) -> StepOutcome {
        let stamp_ns = frame.stamp_ns();

        // Losing the board always returns to Ready, from any state.
        let Some(projection) = frame.projection() else {
            if !matches!(self.state, CaptureState::Ready { .. }) {
                info!("board lost, back to ready");
            }
            self.state = CaptureState::Ready { last_empty_ns: stamp_ns };
            self.tracker = None;
            self.captured_corners = None;
            return StepOutcome::default();
        };

        let corners = *projection.corners();
        let mut outcome = StepOutcome {
            capture: false,
            overlay: Some(Overlay {
                corners,
                done_fraction: 0.0,
            }),
        };

        match self.state {
            CaptureState::Ready { last_empty_ns } => {
                // Debounce: the board must be visible for a minimum time.
                let dwell_ns = self.params.ready_dwell_ms * 1_000_000;
                if stamp_ns.saturating_sub(last_empty_ns) >= dwell_ns {
                    self.state = CaptureState::Tracking;
                    self.tracker = Some(StationaryBoardTracker::new(projection));
                }
            }
            CaptureState::Tracking => {
                let tracker = self
                    .tracker
                    .get_or_insert_with(|| StationaryBoardTracker::new(projection));
                if tracker.test_stationary(projection, self.params.delta_threshold) {
                    self.state = CaptureState::Stationary { since_ns: stamp_ns };
                    self.tracker = Some(StationaryBoardTracker::new(projection));
                }
            }
            CaptureState::Stationary { since_ns } => {
                let held_secs = stamp_ns.saturating_sub(since_ns) as f64 / 1e9;
                let tracker = self
                    .tracker
                    .get_or_insert_with(|| StationaryBoardTracker::new(projection));
                if !tracker.test_stationary(projection, self.params.delta_threshold) {
                    self.state = CaptureState::Tracking;
                    self.tracker = Some(StationaryBoardTracker::new(projection));
                } else if held_secs >= self.params.stationary_secs {
                    info!("board stationary for {:.1}s, capturing frame", held_secs);
                    self.state = CaptureState::Captured;
                    self.captured_corners = Some(corners);
                    outcome.capture = true;
                    outcome.overlay = Some(Overlay {
                        corners,
                        done_fraction: 1.0,
                    });
                } else {
                    outcome.overlay = Some(Overlay {
                        corners,
                        done_fraction: (held_secs / self.params.stationary_secs).clamp(0.0, 1.0),
                    });
                }
            }
            CaptureState::Captured => {
                // Render the captured outline until the board leaves the view.
                outcome.overlay = Some(Overlay {
                    corners: self.captured_corners.unwrap_or(corners),
                    done_fraction: 1.0,
                });
            }
        }

        outcome
    }
}
