//! Background calibration task.
//!
//! One detached worker thread per task; results come back over a one-shot
//! mpsc channel. There is no cancellation: dropping the task orphans the
//! worker, which runs to completion and finds the channel closed.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use calib_capture_board::BoardGeometryModel;
use log::{error, info};

use crate::camera_file::CameraCalibration;
use crate::report::build_report;
use crate::work::{CalibrationWork, SweepResult};

enum WorkerMsg {
    Started,
    Finished(SweepResult),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TaskState {
    Pending,
    Queued,
    Running,
    Complete,
}

/// A scheduled calibration run. `check_completion` drives the whole
/// lifecycle and is idempotent: the completion text is returned exactly
/// once, every later call returns an empty string.
pub struct CalibrationTask {
    board: BoardGeometryModel,
    camera_name: String,
    calibration_path: PathBuf,
    style_to_save: usize,
    state: TaskState,
    work: Option<CalibrationWork>,
    rx: Option<Receiver<WorkerMsg>>,
}

impl CalibrationTask {
    pub fn new(
        board: BoardGeometryModel,
        camera_name: &str,
        calibration_path: PathBuf,
        style_to_save: usize,
        work: CalibrationWork,
    ) -> Self {
        Self {
            board,
            camera_name: camera_name.to_owned(),
            calibration_path,
            style_to_save,
            state: TaskState::Pending,
            work: Some(work),
            rx: None,
        }
    }

    /// One-word task status for the session's status text.
    pub fn status(&self) -> &'static str {
        match self.state {
            TaskState::Pending => "pending",
            TaskState::Queued | TaskState::Running => "working",
            TaskState::Complete => "done",
        }
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.state == TaskState::Complete
    }

    /// Poll the task. Spawns the worker on the first call, then returns an
    /// empty string until the sweep finishes; the first poll observing the
    /// finished sweep saves the selected style's calibration and returns the
    /// save message plus the report.
    pub fn check_completion(&mut self, now_ns: u64) -> String {
        match self.state {
            TaskState::Pending => self.spawn(),
            TaskState::Queued | TaskState::Running => self.poll(now_ns),
            TaskState::Complete => String::new(),
        }
    }

    fn spawn(&mut self) -> String {
        let Some(work) = self.work.take() else {
            self.state = TaskState::Complete;
            return String::new();
        };

        let (tx, rx) = mpsc::channel();
        self.rx = Some(rx);
        thread::spawn(move || {
            let _ = tx.send(WorkerMsg::Started);
            let result = work.solve();
            let _ = tx.send(WorkerMsg::Finished(result));
        });

        self.state = TaskState::Queued;
        info!("calibration task queued");
        "Calibrate camera task queued.".to_owned()
    }

    fn poll(&mut self, now_ns: u64) -> String {
        let Some(rx) = &self.rx else {
            self.state = TaskState::Complete;
            return String::new();
        };

        loop {
            match rx.try_recv() {
                Ok(WorkerMsg::Started) => {
                    self.state = TaskState::Running;
                }
                Ok(WorkerMsg::Finished(result)) => {
                    self.state = TaskState::Complete;
                    self.rx = None;
                    return self.complete(&result, now_ns);
                }
                Err(TryRecvError::Empty) => return String::new(),
                Err(TryRecvError::Disconnected) => {
                    error!("calibration worker exited without a result");
                    self.state = TaskState::Complete;
                    self.rx = None;
                    return "Calibration worker failed unexpectedly.".to_owned();
                }
            }
        }
    }

    fn complete(&self, result: &SweepResult, now_ns: u64) -> String {
        let mut text = match result
            .outcomes
            .get(self.style_to_save)
            .map(|o| o.outcome.as_ref())
        {
            Some(Ok(output)) => {
                let calibration = CameraCalibration::new(
                    &self.camera_name,
                    (result.image_width, result.image_height),
                    &output.camera,
                    output.rms,
                    now_ns,
                );
                match calibration.save(&self.calibration_path) {
                    Ok(()) => format!(
                        "Calibration saved to {}\n",
                        self.calibration_path.display()
                    ),
                    Err(e) => format!(
                        "Failed to save calibration to {}: {e}\n",
                        self.calibration_path.display()
                    ),
                }
            }
            Some(Err(e)) => format!(
                "Calibration style {} failed ({e}); nothing saved.\n",
                self.style_to_save
            ),
            None => format!(
                "Calibration style {} does not exist; nothing saved.\n",
                self.style_to_save
            ),
        };
        text.push_str(&build_report(result, &self.board, self.style_to_save, now_ns));
        text
    }
}
