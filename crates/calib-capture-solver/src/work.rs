//! The calibration sweep: junction interpolation once, then every style of
//! the table solved against the shared junction data.

use std::sync::Arc;

use calib_capture_board::BoardGeometryModel;
use calib_capture_core::{CornerRefiner, MarkerDetector, RefineQuality};
use calib_capture_pipeline::FiducialFrame;
use log::{info, warn};
use nalgebra::{Point2, Point3};

use crate::backend::{CalibViews, CameraModel, IntrinsicsSolver, SolveOutput, SolverError};
use crate::interpolate::{interpolate_junctions, FrameJunctions};
use crate::styles::{seed_camera, style_table, CalibrationStyle};

/// Result of one style's solve, with the frame index behind each solver view.
#[derive(Clone, Debug)]
pub struct StyleOutcome {
    pub style: CalibrationStyle,
    /// Frame index behind each view passed to the solver.
    pub view_frames: Vec<usize>,
    pub outcome: Result<SolveOutput, SolverError>,
}

/// Everything the sweep produced, consumed by the report generator.
#[derive(Clone, Debug)]
pub struct SweepResult {
    pub image_width: u32,
    pub image_height: u32,
    pub frame_stamps_ns: Vec<u64>,
    /// One entry per captured frame, empty where no junction was recovered.
    pub junctions: Vec<FrameJunctions>,
    /// One entry per style, in table order.
    pub outcomes: Vec<StyleOutcome>,
}

/// Snapshot of everything a calibration run needs. Built on the session
/// thread, moved into the worker, solved without further coordination.
pub struct CalibrationWork {
    board: BoardGeometryModel,
    frames: Vec<FiducialFrame>,
    image_size: (u32, u32),
    detector: Arc<dyn MarkerDetector>,
    refiner: Arc<dyn CornerRefiner>,
    solver: Arc<dyn IntrinsicsSolver>,
    styles: Vec<CalibrationStyle>,
}

impl CalibrationWork {
    pub fn new(
        board: BoardGeometryModel,
        frames: Vec<FiducialFrame>,
        image_size: (u32, u32),
        detector: Arc<dyn MarkerDetector>,
        refiner: Arc<dyn CornerRefiner>,
        solver: Arc<dyn IntrinsicsSolver>,
    ) -> Self {
        Self {
            board,
            frames,
            image_size,
            detector,
            refiner,
            solver,
            styles: style_table(),
        }
    }

    /// Replace the default style table. Used to restrict styles to frame
    /// subsets.
    pub fn with_styles(mut self, styles: Vec<CalibrationStyle>) -> Self {
        self.styles = styles;
        self
    }

    /// Run the full sweep. Interpolation happens once; each style then gets
    /// an independent solve so one style's numerical failure leaves the
    /// others intact.
    pub fn solve(mut self) -> SweepResult {
        info!("calibration sweep over {} frames starting", self.frames.len());

        for frame in &mut self.frames {
            frame.redetect(self.detector.as_ref(), &self.board, RefineQuality::Precise);
        }
        let junctions: Vec<FrameJunctions> = self
            .frames
            .iter()
            .map(|f| interpolate_junctions(f, &self.board, self.refiner.as_ref()))
            .collect();

        // Every frame keeps its view slot, even with an empty point set; a
        // degenerate system is the external solver's to report.
        let all_frames: Vec<usize> = (0..self.frames.len()).collect();

        let outcomes = self
            .styles
            .iter()
            .map(|style| self.solve_style(style, &junctions, &all_frames))
            .collect();

        SweepResult {
            image_width: self.image_size.0,
            image_height: self.image_size.1,
            frame_stamps_ns: self.frames.iter().map(|f| f.stamp_ns()).collect(),
            junctions,
            outcomes,
        }
    }

    fn solve_style(
        &self,
        style: &CalibrationStyle,
        junctions: &[FrameJunctions],
        all_frames: &[usize],
    ) -> StyleOutcome {
        let view_frames: Vec<usize> = match &style.frame_subset {
            Some(subset) => all_frames
                .iter()
                .copied()
                .filter(|i| subset.contains(i))
                .collect(),
            None => all_frames.to_vec(),
        };

        let outcome = self.run_solver(style, junctions, &view_frames);
        if let Err(e) = &outcome {
            warn!("style {} failed: {e}", style.name);
        }
        StyleOutcome {
            style: style.clone(),
            view_frames,
            outcome,
        }
    }

    fn run_solver(
        &self,
        style: &CalibrationStyle,
        junctions: &[FrameJunctions],
        view_frames: &[usize],
    ) -> Result<SolveOutput, SolverError> {
        if view_frames.is_empty() {
            return Err(SolverError::Degenerate("no frames to solve".to_owned()));
        }

        let board_points: Vec<Vec<Point3<f32>>> = view_frames
            .iter()
            .map(|&i| junctions[i].board_points.clone())
            .collect();
        let image_points: Vec<Vec<Point2<f32>>> = view_frames
            .iter()
            .map(|&i| junctions[i].image_points.clone())
            .collect();
        let views = CalibViews {
            board_points: &board_points,
            image_points: &image_points,
        };

        let initial: Option<CameraModel> = match &style.preliminary {
            Some(pre) => {
                let seeded = self.solver.solve(
                    views,
                    self.image_size,
                    pre.flags,
                    seed_camera(pre.seed, self.image_size),
                )?;
                Some(seeded.camera)
            }
            None => seed_camera(style.seed, self.image_size),
        };

        self.solver.solve(views, self.image_size, style.flags, initial)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Synthetic collaborators shared by the solver-side tests.

    use super::*;
    use calib_capture_board::BoardSpec;
    use calib_capture_core::{
        GrayImage, GrayImageView, MarkerDetection, TermCriteria,
    };
    use nalgebra::{Matrix3, Vector3};
    use std::sync::Mutex;

    pub const SCALE: f32 = 400.0;

    pub fn board() -> BoardGeometryModel {
        BoardGeometryModel::new(BoardSpec {
            squares_x: 4,
            squares_y: 3,
            square_length: 0.03,
            marker_length: 0.02,
            origin_square_with_marker: false,
        })
        .expect("board")
    }

    /// Similarity-transform scene detector.
    pub struct GridDetector {
        pub board: BoardGeometryModel,
    }

    impl MarkerDetector for GridDetector {
        fn detect(
            &self,
            _image: &GrayImageView<'_>,
            _quality: RefineQuality,
        ) -> Vec<MarkerDetection> {
            (0..self.board.marker_count() as u32)
                .map(|id| {
                    let facade = self.board.to_facade_corners(id).expect("marker");
                    MarkerDetection {
                        id,
                        corners: facade
                            .map(|p| Point2::new(p.x * SCALE + 8.0, p.y * SCALE + 8.0)),
                    }
                })
                .collect()
        }
    }

    pub struct IdentityRefiner;

    impl CornerRefiner for IdentityRefiner {
        fn refine(
            &self,
            _image: &GrayImageView<'_>,
            guess: Point2<f32>,
            _half_win: (u32, u32),
            _criteria: TermCriteria,
        ) -> Point2<f32> {
            guess
        }
    }

    /// Canned solver: returns a fixed camera, zero poses, and an RMS equal
    /// to 0.1 times the number of calls so far; fails on the call indices
    /// listed in `fail_on`.
    pub struct CannedSolver {
        pub calls: Mutex<usize>,
        pub fail_on: Vec<usize>,
    }

    impl CannedSolver {
        pub fn new(fail_on: Vec<usize>) -> Self {
            Self {
                calls: Mutex::new(0),
                fail_on,
            }
        }
    }

    impl IntrinsicsSolver for CannedSolver {
        fn solve(
            &self,
            views: CalibViews<'_>,
            image_size: (u32, u32),
            _flags: crate::styles::CalibFlags,
            initial: Option<CameraModel>,
        ) -> Result<SolveOutput, SolverError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let c = *calls;
                *calls += 1;
                c
            };
            if self.fail_on.contains(&call) {
                return Err(SolverError::Degenerate("singular normal matrix".into()));
            }
            let camera = initial.unwrap_or(CameraModel {
                matrix: Matrix3::new(
                    500.0,
                    0.0,
                    image_size.0 as f64 / 2.0,
                    0.0,
                    500.0,
                    image_size.1 as f64 / 2.0,
                    0.0,
                    0.0,
                    1.0,
                ),
                dist: [0.0; 5],
            });
            let n = views.board_points.len();
            Ok(SolveOutput {
                rms: 0.1 * (call + 1) as f64,
                camera,
                rvecs: vec![Vector3::zeros(); n],
                tvecs: vec![Vector3::new(0.0, 0.0, 1.0); n],
                std_intrinsics: [0.01; 9],
                per_view_rms: vec![0.05; n],
            })
        }
    }

    pub fn captured_frames(board: &BoardGeometryModel, stamps_ms: &[u64]) -> Vec<FiducialFrame> {
        let detector = GridDetector { board: board.clone() };
        stamps_ms
            .iter()
            .map(|&ms| {
                FiducialFrame::detect(
                    GrayImage::new(64, 48),
                    ms * 1_000_000,
                    &detector,
                    board,
                    RefineQuality::Fast,
                )
            })
            .collect()
    }

    pub fn work_with_solver(
        board: &BoardGeometryModel,
        stamps_ms: &[u64],
        solver: Arc<dyn IntrinsicsSolver>,
    ) -> CalibrationWork {
        CalibrationWork::new(
            board.clone(),
            captured_frames(board, stamps_ms),
            (64, 48),
            Arc::new(GridDetector { board: board.clone() }),
            Arc::new(IdentityRefiner),
            solver,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn sweep_yields_one_junction_entry_per_frame_and_nine_outcomes() {
        let board = board();
        let work = work_with_solver(&board, &[100, 200, 300], Arc::new(CannedSolver::new(vec![])));
        let result = work.solve();

        assert_eq!(result.junctions.len(), 3);
        assert_eq!(result.frame_stamps_ns, vec![100_000_000, 200_000_000, 300_000_000]);
        assert_eq!(result.outcomes.len(), 9);
        for (i, outcome) in result.outcomes.iter().enumerate() {
            assert_eq!(outcome.style.name, style_table()[i].name);
            assert!(outcome.outcome.is_ok(), "style {}", outcome.style.name);
            assert_eq!(outcome.view_frames, vec![0, 1, 2]);
        }
        for junctions in &result.junctions {
            assert_eq!(junctions.len(), board.junction_count() as usize);
        }
    }

    #[test]
    fn one_failing_style_leaves_the_others_intact() {
        let board = board();
        // Call 2 is the third style's solve (no preliminary stages before it).
        let work = work_with_solver(&board, &[100], Arc::new(CannedSolver::new(vec![2])));
        let result = work.solve();

        let failed: Vec<&str> = result
            .outcomes
            .iter()
            .filter(|o| o.outcome.is_err())
            .map(|o| o.style.name)
            .collect();
        assert_eq!(failed, ["k2_free"]);
    }

    #[test]
    fn preliminary_stage_feeds_the_final_solve() {
        let board = board();
        let solver = Arc::new(CannedSolver::new(vec![]));
        let work = work_with_solver(&board, &[100], solver.clone());
        let result = work.solve();

        // 7 plain styles + custom + (preliminary + final) for the last one.
        assert_eq!(*solver.calls.lock().unwrap(), 10);
        let last = result.outcomes.last().expect("outcome");
        let output = last.outcome.as_ref().expect("solve");
        // The final stage inherited the preliminary camera, which the canned
        // solver self-initializes at the image center.
        assert_eq!(output.camera.cx(), 32.0);
        assert_eq!(output.camera.cy(), 24.0);
    }

    #[test]
    fn preliminary_failure_fails_the_whole_style() {
        let board = board();
        // Call 8 is the last style's preliminary solve.
        let work = work_with_solver(&board, &[100], Arc::new(CannedSolver::new(vec![8])));
        let result = work.solve();
        let last = result.outcomes.last().expect("outcome");
        assert!(last.outcome.is_err());
        assert_eq!(
            result.outcomes.iter().filter(|o| o.outcome.is_err()).count(),
            1
        );
    }

    #[test]
    fn frame_subset_restricts_the_views() {
        let board = board();
        let mut styles = style_table();
        styles[3].frame_subset = Some(vec![0, 2]);
        let work = work_with_solver(&board, &[100, 200, 300], Arc::new(CannedSolver::new(vec![])))
            .with_styles(styles);
        let result = work.solve();

        assert_eq!(result.outcomes[3].view_frames, vec![0, 2]);
        let output = result.outcomes[3].outcome.as_ref().expect("solve");
        assert_eq!(output.per_view_rms.len(), 2);
    }
}
