//! Core types for the board-capture calibration pipeline.
//!
//! This crate is intentionally small. It holds the gray image buffer types,
//! planar homography estimation, and the traits behind which the external
//! collaborators (marker detector, sub-pixel refiner) live. It does *not*
//! depend on any concrete detector or refiner implementation.

mod detect;
mod homography;
mod image;
mod logger;

pub use detect::{
    CornerRefiner, MarkerDetection, MarkerDetector, RefineQuality, TermCriteria,
};
pub use homography::{estimate_homography, homography_from_4pt, Homography};
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};
pub use logger::init_with_level;
