//! A single ingested camera frame with its detection results.

use std::sync::Arc;

use calib_capture_board::BoardGeometryModel;
use calib_capture_core::{
    estimate_homography, GrayImage, GrayImageView, MarkerDetection, MarkerDetector, RefineQuality,
};
use log::debug;
use nalgebra::Point2;

use crate::projection::BoardProjection;

/// One ingested frame: the owned gray buffer, its timestamp, the markers
/// detected in it, and (when any marker was found) the projected board
/// outline.
///
/// The image buffer is immutable after creation; the detection results are
/// replaced only by [`FiducialFrame::redetect`] when the solver re-runs the
/// detector at precise quality.
#[derive(Clone, Debug)]
pub struct FiducialFrame {
    gray: Arc<GrayImage>,
    stamp_ns: u64,
    markers: Vec<MarkerDetection>,
    projection: Option<BoardProjection>,
}

impl FiducialFrame {
    /// Run the detector on a fresh image and build the frame.
    pub fn detect(
        gray: GrayImage,
        stamp_ns: u64,
        detector: &dyn MarkerDetector,
        board: &BoardGeometryModel,
        quality: RefineQuality,
    ) -> Self {
        let gray = Arc::new(gray);
        let markers = detector.detect(&gray.view(), quality);
        let projection = project_board_outline(board, &markers, &gray);
        Self {
            gray,
            stamp_ns,
            markers,
            projection,
        }
    }

    /// Re-run detection (typically at `Precise` quality) and recompute the
    /// board projection. The image buffer is untouched.
    pub fn redetect(
        &mut self,
        detector: &dyn MarkerDetector,
        board: &BoardGeometryModel,
        quality: RefineQuality,
    ) {
        self.markers = detector.detect(&self.gray.view(), quality);
        self.projection = project_board_outline(board, &self.markers, &self.gray);
    }

    #[inline]
    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        self.gray.view()
    }

    #[inline]
    pub fn stamp_ns(&self) -> u64 {
        self.stamp_ns
    }

    #[inline]
    pub fn markers(&self) -> &[MarkerDetection] {
        &self.markers
    }

    #[inline]
    pub fn projection(&self) -> Option<&BoardProjection> {
        self.projection.as_ref()
    }
}

/// Estimate the global board-to-image homography from every detected marker
/// and project the board outline corners through it.
fn project_board_outline(
    board: &BoardGeometryModel,
    markers: &[MarkerDetection],
    gray: &GrayImage,
) -> Option<BoardProjection> {
    let mut board_pts: Vec<Point2<f32>> = Vec::with_capacity(markers.len() * 4);
    let mut image_pts: Vec<Point2<f32>> = Vec::with_capacity(markers.len() * 4);
    for marker in markers {
        let Some(facade) = board.to_facade_corners(marker.id) else {
            debug!("ignoring marker id {} not on the board", marker.id);
            continue;
        };
        board_pts.extend_from_slice(&facade);
        image_pts.extend_from_slice(&marker.corners);
    }
    if board_pts.len() < 4 {
        return None;
    }

    let homography = estimate_homography(&board_pts, &image_pts)?;
    let outline = board.board_outline_corners().map(|p| homography.apply(p));
    Some(BoardProjection::new(
        outline,
        gray.max_dimension() as u32,
    ))
}
