//! End-to-end capture flow against a synthetic board scene.

use calib_capture_board::{BoardGeometryModel, BoardSpec};
use calib_capture_core::{GrayImage, GrayImageView, MarkerDetection, MarkerDetector, RefineQuality};
use calib_capture_pipeline::{CaptureParams, CaptureState, CaptureStateMachine, CapturedImageSet, FiducialFrame};
use nalgebra::Point2;

const WIDTH: usize = 64;
const HEIGHT: usize = 48;

fn board() -> BoardGeometryModel {
    BoardGeometryModel::new(BoardSpec {
        squares_x: 4,
        squares_y: 3,
        square_length: 0.03,
        marker_length: 0.02,
        origin_square_with_marker: false,
    })
    .expect("board")
}

/// Reports every board marker mapped through a fixed similarity transform,
/// regardless of image content.
struct SceneDetector {
    board: BoardGeometryModel,
    visible: bool,
    offset_px: f32,
}

impl MarkerDetector for SceneDetector {
    fn detect(&self, _image: &GrayImageView<'_>, _quality: RefineQuality) -> Vec<MarkerDetection> {
        if !self.visible {
            return Vec::new();
        }
        const SCALE: f32 = 300.0;
        (0..self.board.marker_count() as u32)
            .map(|id| {
                let facade = self.board.to_facade_corners(id).expect("marker on board");
                MarkerDetection {
                    id,
                    corners: facade.map(|p| {
                        Point2::new(p.x * SCALE + self.offset_px + 5.0, p.y * SCALE + 5.0)
                    }),
                }
            })
            .collect()
    }
}

/// Frame at time `ms`; `offset_px = None` simulates a frame with no board.
fn frame_at(board: &BoardGeometryModel, ms: u64, offset_px: Option<f32>) -> FiducialFrame {
    let detector = SceneDetector {
        board: board.clone(),
        visible: offset_px.is_some(),
        offset_px: offset_px.unwrap_or(0.0),
    };
    FiducialFrame::detect(
        GrayImage::new(WIDTH, HEIGHT),
        ms * 1_000_000,
        &detector,
        board,
        RefineQuality::Fast,
    )
}

#[test]
fn board_never_detected_stays_ready() {
    let board = board();
    let mut machine = CaptureStateMachine::new(0, CaptureParams::default());
    let mut set = CapturedImageSet::new(WIDTH as u32, HEIGHT as u32);

    for ms in (0..3000).step_by(100) {
        let frame = frame_at(&board, ms, None);
        let outcome = machine.advance(&frame);
        assert!(!outcome.capture);
        assert!(outcome.overlay.is_none());
        if outcome.capture {
            set.capture(frame);
        }
    }

    assert!(matches!(machine.state(), CaptureState::Ready { .. }));
    assert!(set.is_empty());
}

#[test]
fn stationary_board_is_captured_exactly_once() {
    let board = board();
    let mut machine = CaptureStateMachine::new(0, CaptureParams::default());
    let mut set = CapturedImageSet::new(WIDTH as u32, HEIGHT as u32);

    // One empty frame fixes the last-empty time, then the board appears and
    // never moves.
    machine.advance(&frame_at(&board, 0, None));
    for ms in (100..=6000).step_by(100) {
        let frame = frame_at(&board, ms, Some(0.0));
        let outcome = machine.advance(&frame);
        if outcome.capture {
            set.capture(frame);
        }
    }

    assert_eq!(machine.state(), CaptureState::Captured);
    assert_eq!(set.len(), 1);
    // The captured frame is the one that completed the 4 s stationary dwell:
    // tracking starts at 500 ms, stationary at 600 ms, capture at 4600 ms.
    assert_eq!(set.frames()[0].stamp_ns(), 4600 * 1_000_000);
}

#[test]
fn motion_before_dwell_completes_prevents_capture() {
    let board = board();
    let mut machine = CaptureStateMachine::new(0, CaptureParams::default());
    let mut captures = 0;

    machine.advance(&frame_at(&board, 0, None));
    for ms in (100..=4400).step_by(100) {
        // A 30 px jump at 2 s, well past the stationary threshold.
        let offset = if ms == 2000 { 30.0 } else { 0.0 };
        if machine.advance(&frame_at(&board, ms, Some(offset))).capture {
            captures += 1;
        }
    }

    // The jump at 2 s restarted the dwell; by 4.4 s nothing is captured yet.
    assert_eq!(captures, 0);
    assert!(matches!(
        machine.state(),
        CaptureState::Stationary { .. } | CaptureState::Tracking
    ));
}

#[test]
fn board_leaving_after_capture_returns_to_ready() {
    let board = board();
    let mut machine = CaptureStateMachine::new(0, CaptureParams::default());

    machine.advance(&frame_at(&board, 0, None));
    for ms in (100..=5000).step_by(100) {
        machine.advance(&frame_at(&board, ms, Some(0.0)));
    }
    assert_eq!(machine.state(), CaptureState::Captured);

    machine.advance(&frame_at(&board, 5100, None));
    assert!(matches!(machine.state(), CaptureState::Ready { .. }));
}

#[test]
fn save_then_load_restores_count_size_and_stamps() {
    let board = board();
    let dir = tempfile::tempdir().expect("tempdir");

    let mut set = CapturedImageSet::new(WIDTH as u32, HEIGHT as u32);
    for (i, ms) in [1200_u64, 3400, 7800].iter().enumerate() {
        // Each image gets distinct content so the PNG round trip is meaningful.
        let frame = FiducialFrame::detect(
            GrayImage::from_vec(WIDTH, HEIGHT, vec![i as u8 * 40; WIDTH * HEIGHT]),
            ms * 1_000_000,
            &SceneDetector {
                board: board.clone(),
                visible: true,
                offset_px: i as f32,
            },
            &board,
            RefineQuality::Fast,
        );
        set.capture(frame);
    }
    set.save(dir.path(), "calib").expect("save");

    let detector = SceneDetector {
        board: board.clone(),
        visible: true,
        offset_px: 0.0,
    };
    let loaded =
        CapturedImageSet::load(dir.path(), "calib", &detector, &board).expect("load");

    assert_eq!(loaded.len(), set.len());
    assert_eq!(loaded.width(), set.width());
    assert_eq!(loaded.height(), set.height());
    for (a, b) in loaded.frames().iter().zip(set.frames()) {
        assert_eq!(a.stamp_ns(), b.stamp_ns());
        assert_eq!(a.gray().data, b.gray().data);
    }
}

#[test]
fn loading_a_missing_header_fails() {
    let board = board();
    let dir = tempfile::tempdir().expect("tempdir");
    let detector = SceneDetector {
        board: board.clone(),
        visible: false,
        offset_px: 0.0,
    };
    assert!(CapturedImageSet::load(dir.path(), "nope", &detector, &board).is_err());
}
