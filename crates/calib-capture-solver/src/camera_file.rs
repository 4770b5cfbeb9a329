//! Saved camera calibration file (JSON).

use std::fs;
use std::path::Path;

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::backend::CameraModel;

/// On-disk form of one camera's calibration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CameraCalibration {
    pub camera_name: String,
    pub image_width: u32,
    pub image_height: u32,
    pub distortion_model: String,
    /// Row-major 3x3 intrinsic matrix.
    pub camera_matrix: [[f64; 3]; 3],
    /// k1, k2, p1, p2, k3.
    pub distortion: [f64; 5],
    pub calibrated_at_ns: u64,
    pub rms: f64,
}

impl CameraCalibration {
    pub fn new(
        camera_name: &str,
        image_size: (u32, u32),
        camera: &CameraModel,
        rms: f64,
        calibrated_at_ns: u64,
    ) -> Self {
        let m = &camera.matrix;
        Self {
            camera_name: camera_name.to_owned(),
            image_width: image_size.0,
            image_height: image_size.1,
            distortion_model: "plumb_bob".to_owned(),
            camera_matrix: [
                [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
                [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
                [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
            ],
            distortion: camera.dist,
            calibrated_at_ns,
            rms,
        }
    }

    pub fn camera_model(&self) -> CameraModel {
        CameraModel {
            matrix: Matrix3::from_fn(|r, c| self.camera_matrix[r][c]),
            dist: self.distortion,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, json)
    }

    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(std::io::Error::other)
    }
}
