//! Ordered set of captured frames with on-disk persistence.

use std::fs;
use std::path::{Path, PathBuf};

use calib_capture_board::BoardGeometryModel;
use calib_capture_core::{GrayImage, MarkerDetector, RefineQuality};
use log::info;
use serde::{Deserialize, Serialize};

use crate::frame::FiducialFrame;

/// Read/write errors for the captured image set.
#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("image {0} has size {1}x{2}, set is {3}x{4}")]
    SizeMismatch(String, usize, usize, u32, u32),
}

#[derive(Serialize, Deserialize)]
struct SetHeader {
    width: u32,
    height: u32,
    images: Vec<ImageEntry>,
}

#[derive(Serialize, Deserialize)]
struct ImageEntry {
    name: String,
    stamp_ns: u64,
}

/// Append-only collection of captured frames. All frames share the set's
/// image dimensions, fixed for the set's whole lifetime.
pub struct CapturedImageSet {
    width: u32,
    height: u32,
    frames: Vec<FiducialFrame>,
}

impl CapturedImageSet {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frames: Vec::new(),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn frames(&self) -> &[FiducialFrame] {
        &self.frames
    }

    /// Whether a gray image matches the set's dimensions.
    #[inline]
    pub fn matches_size(&self, gray: &GrayImage) -> bool {
        gray.width == self.width as usize && gray.height == self.height as usize
    }

    /// Append a frame. Frames of a different size must be rejected upstream.
    pub fn capture(&mut self, frame: FiducialFrame) {
        debug_assert!(self.matches_size(frame.gray()));
        self.frames.push(frame);
    }

    /// Write the header (`{stem}.json`) and one gray PNG per frame
    /// (`{stem}_NNN.png`) into `dir`.
    pub fn save(&self, dir: &Path, stem: &str) -> Result<(), PersistenceError> {
        let mut entries = Vec::with_capacity(self.frames.len());
        for (i, frame) in self.frames.iter().enumerate() {
            let name = format!("{stem}_{i:03}.png");
            let gray = frame.gray();
            let buffer = image::GrayImage::from_raw(
                gray.width as u32,
                gray.height as u32,
                gray.data.clone(),
            )
            .ok_or_else(|| {
                image::ImageError::Parameter(image::error::ParameterError::from_kind(
                    image::error::ParameterErrorKind::DimensionMismatch,
                ))
            })?;
            buffer.save(dir.join(&name))?;
            entries.push(ImageEntry {
                name,
                stamp_ns: frame.stamp_ns(),
            });
        }

        let header = SetHeader {
            width: self.width,
            height: self.height,
            images: entries,
        };
        let json = serde_json::to_string_pretty(&header)?;
        fs::write(Self::header_path(dir, stem), json)?;
        info!("saved {} captured images to {}", self.frames.len(), dir.display());
        Ok(())
    }

    /// Rebuild a set saved by [`CapturedImageSet::save`], re-running marker
    /// detection on every loaded frame.
    pub fn load(
        dir: &Path,
        stem: &str,
        detector: &dyn MarkerDetector,
        board: &BoardGeometryModel,
    ) -> Result<Self, PersistenceError> {
        let raw = fs::read_to_string(Self::header_path(dir, stem))?;
        let header: SetHeader = serde_json::from_str(&raw)?;

        let mut set = Self::new(header.width, header.height);
        for entry in &header.images {
            let buffer = image::open(dir.join(&entry.name))?.to_luma8();
            let gray = GrayImage::from_vec(
                buffer.width() as usize,
                buffer.height() as usize,
                buffer.into_raw(),
            );
            if !set.matches_size(&gray) {
                return Err(PersistenceError::SizeMismatch(
                    entry.name.clone(),
                    gray.width,
                    gray.height,
                    header.width,
                    header.height,
                ));
            }
            set.capture(FiducialFrame::detect(
                gray,
                entry.stamp_ns,
                detector,
                board,
                RefineQuality::Fast,
            ));
        }
        info!("loaded {} captured images from {}", set.len(), dir.display());
        Ok(set)
    }

    fn header_path(dir: &Path, stem: &str) -> PathBuf {
        dir.join(format!("{stem}.json"))
    }
}
