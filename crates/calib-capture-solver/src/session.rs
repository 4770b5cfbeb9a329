//! Calibration session: the command surface tying capture and solving
//! together.
//!
//! One session owns the capture pipeline (created lazily when the first
//! frame fixes the image size), at most one background calibration task,
//! and the external collaborator handles. All commands return user-facing
//! text; errors are rendered, never propagated past this layer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use calib_capture_board::BoardGeometryModel;
use calib_capture_core::{CornerRefiner, GrayImage, MarkerDetector, RefineQuality};
use calib_capture_pipeline::{
    draw_board_boundary, CaptureParams, CaptureState, CaptureStateMachine, CapturedImageSet,
    FiducialFrame, RgbImage, COLOR_CAPTURED, COLOR_DONE, COLOR_PENDING,
};
use log::{debug, info};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::backend::IntrinsicsSolver;
use crate::task::CalibrationTask;
use crate::work::CalibrationWork;

/// Session configuration, JSON round-trippable.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub camera_name: String,
    /// Path stem for the captured image set: header at `{images_stem}.json`,
    /// frames at `{images_stem}_NNN.png`.
    pub images_stem: String,
    pub calibration_path: PathBuf,
    /// Index into the style table of the result to save and grid-report.
    pub style_to_save: usize,
    pub ready_dwell_ms: u64,
    pub stationary_secs: f64,
    pub delta_threshold: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let params = CaptureParams::default();
        Self {
            camera_name: "camera".to_owned(),
            images_stem: "calibration_images/image".to_owned(),
            calibration_path: PathBuf::from("camera_calibration.json"),
            style_to_save: 6,
            ready_dwell_ms: params.ready_dwell_ms,
            stationary_secs: params.stationary_secs,
            delta_threshold: params.delta_threshold,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn capture_params(&self) -> CaptureParams {
        CaptureParams {
            ready_dwell_ms: self.ready_dwell_ms,
            stationary_secs: self.stationary_secs,
            delta_threshold: self.delta_threshold,
        }
    }

    /// Split the image stem into (directory, file stem).
    fn images_location(&self) -> (PathBuf, String) {
        let p = Path::new(&self.images_stem);
        let dir = match p.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stem = p
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_owned());
        (dir, stem)
    }
}

/// Session commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Capture the next frame unconditionally.
    Capture,
    SaveImages,
    LoadImages,
    Calibrate,
    Status,
    Reset,
}

struct CapturePipeline {
    set: CapturedImageSet,
    machine: CaptureStateMachine,
    /// Outlines of already-captured boards, drawn on every overlay.
    captured_outlines: Vec<[Point2<f32>; 4]>,
}

pub struct CalibrationSession {
    config: SessionConfig,
    board: BoardGeometryModel,
    detector: Arc<dyn MarkerDetector>,
    refiner: Arc<dyn CornerRefiner>,
    solver: Arc<dyn IntrinsicsSolver>,
    pipeline: Option<CapturePipeline>,
    task: Option<CalibrationTask>,
    capture_next: bool,
}

impl CalibrationSession {
    pub fn new(
        config: SessionConfig,
        board: BoardGeometryModel,
        detector: Arc<dyn MarkerDetector>,
        refiner: Arc<dyn CornerRefiner>,
        solver: Arc<dyn IntrinsicsSolver>,
    ) -> Self {
        Self {
            config,
            board,
            detector,
            refiner,
            solver,
            pipeline: None,
            task: None,
            capture_next: false,
        }
    }

    #[inline]
    pub fn captured_count(&self) -> usize {
        self.pipeline.as_ref().map_or(0, |p| p.set.len())
    }

    /// Ingest one camera frame. The first frame fixes the image size for the
    /// session; later frames of a different size are ignored. When
    /// `annotate` is given, capture feedback is drawn into it.
    pub fn process_frame(
        &mut self,
        gray: GrayImage,
        stamp_ns: u64,
        annotate: Option<&mut RgbImage>,
    ) {
        let params = self.config.capture_params();
        let pipeline = self.pipeline.get_or_insert_with(|| CapturePipeline {
            set: CapturedImageSet::new(gray.width as u32, gray.height as u32),
            machine: CaptureStateMachine::new(stamp_ns, params),
            captured_outlines: Vec::new(),
        });
        if !pipeline.set.matches_size(&gray) {
            debug!(
                "ignoring {}x{} frame, session is {}x{}",
                gray.width,
                gray.height,
                pipeline.set.width(),
                pipeline.set.height()
            );
            return;
        }

        let frame = FiducialFrame::detect(
            gray,
            stamp_ns,
            self.detector.as_ref(),
            &self.board,
            RefineQuality::Fast,
        );
        let outcome = pipeline.machine.advance(&frame);

        let capture = outcome.capture || std::mem::take(&mut self.capture_next);
        if capture {
            if let Some(projection) = frame.projection() {
                pipeline.captured_outlines.push(*projection.corners());
            }
            info!("captured image {} at {}", pipeline.set.len(), stamp_ns);
            pipeline.set.capture(frame);
        }

        if let Some(img) = annotate {
            for outline in &pipeline.captured_outlines {
                draw_board_boundary(img, outline, 1.0, COLOR_CAPTURED, COLOR_CAPTURED);
            }
            if let Some(overlay) = &outcome.overlay {
                draw_board_boundary(
                    img,
                    &overlay.corners,
                    overlay.done_fraction,
                    COLOR_PENDING,
                    COLOR_DONE,
                );
            }
        }
    }

    /// Execute a command and return its user-facing text.
    pub fn command(&mut self, cmd: Command, now_ns: u64) -> String {
        match cmd {
            Command::Capture => {
                self.capture_next = true;
                "An image will be captured.".to_owned()
            }
            Command::SaveImages => self.save_images(),
            Command::LoadImages => self.load_images(now_ns),
            Command::Calibrate => self.calibrate(now_ns),
            Command::Status => self.status(),
            Command::Reset => {
                self.pipeline = None;
                self.task = None;
                self.capture_next = false;
                "Session reset.".to_owned()
            }
        }
    }

    /// Poll the background calibration task, if any.
    pub fn poll(&mut self, now_ns: u64) -> String {
        match &mut self.task {
            Some(task) => task.check_completion(now_ns),
            None => String::new(),
        }
    }

    fn save_images(&mut self) -> String {
        let Some(pipeline) = &self.pipeline else {
            return "No captured images to save.".to_owned();
        };
        if pipeline.set.is_empty() {
            return "No captured images to save.".to_owned();
        }
        let (dir, stem) = self.config.images_location();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            return format!("Failed to create {}: {e}", dir.display());
        }
        match pipeline.set.save(&dir, &stem) {
            Ok(()) => format!("Saved {} images to {}.", pipeline.set.len(), dir.display()),
            Err(e) => format!("Failed to save images: {e}"),
        }
    }

    fn load_images(&mut self, now_ns: u64) -> String {
        let (dir, stem) = self.config.images_location();
        match CapturedImageSet::load(&dir, &stem, self.detector.as_ref(), &self.board) {
            Ok(set) => {
                let count = set.len();
                self.pipeline = Some(CapturePipeline {
                    machine: CaptureStateMachine::new(now_ns, self.config.capture_params()),
                    captured_outlines: set
                        .frames()
                        .iter()
                        .filter_map(|f| f.projection().map(|p| *p.corners()))
                        .collect(),
                    set,
                });
                format!("Loaded {count} images from {}.", dir.display())
            }
            Err(e) => format!("Failed to load images: {e}"),
        }
    }

    fn calibrate(&mut self, now_ns: u64) -> String {
        if self.task.as_ref().is_some_and(|t| !t.is_complete()) {
            return "A calibration task is already in progress.".to_owned();
        }
        let Some(pipeline) = &self.pipeline else {
            return "Cannot calibrate with zero images.".to_owned();
        };
        if pipeline.set.is_empty() {
            return "Cannot calibrate with zero images.".to_owned();
        }

        // Snapshot: the task owns clones of the captured frames, so capture
        // can continue while the worker runs.
        let work = CalibrationWork::new(
            self.board.clone(),
            pipeline.set.frames().to_vec(),
            (pipeline.set.width(), pipeline.set.height()),
            Arc::clone(&self.detector),
            Arc::clone(&self.refiner),
            Arc::clone(&self.solver),
        );
        let mut task = CalibrationTask::new(
            self.board.clone(),
            &self.config.camera_name,
            self.config.calibration_path.clone(),
            self.config.style_to_save,
            work,
        );
        let text = task.check_completion(now_ns);
        self.task = Some(task);
        text
    }

    fn status(&self) -> String {
        let state = match &self.pipeline {
            None => "idle (no frames seen)".to_owned(),
            Some(p) => match p.machine.state() {
                CaptureState::Ready { .. } => "ready".to_owned(),
                CaptureState::Tracking => "tracking board".to_owned(),
                CaptureState::Stationary { .. } => "board stationary".to_owned(),
                CaptureState::Captured => "captured, move the board".to_owned(),
            },
        };
        let task = self.task.as_ref().map_or("none", |t| t.status());
        format!(
            "state: {state}; captured images: {}; calibrate task: {task}",
            self.captured_count()
        )
    }
}
