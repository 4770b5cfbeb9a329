//! Junction interpolation.
//!
//! Checkerboard junctions are not detected directly; each one is predicted
//! by projecting its board-plane location through the local homography of an
//! adjacent detected marker, then pinned down by the external sub-pixel
//! refiner. Using per-marker local homographies instead of the global board
//! homography keeps lens distortion from bending the prediction: over the
//! span of a single square the distortion is locally linear.

use std::collections::BTreeMap;

use calib_capture_board::{BoardGeometryModel, JunctionId};
use calib_capture_core::{homography_from_4pt, CornerRefiner, Homography, TermCriteria};
use calib_capture_pipeline::FiducialFrame;
use log::debug;
use nalgebra::{Point2, Point3};

/// Interpolated junctions of one frame, in board order. `id_index` maps a
/// junction id to its position in the parallel point vectors; junctions whose
/// adjacent markers were not detected are absent.
#[derive(Clone, Debug, Default)]
pub struct FrameJunctions {
    /// Board-plane locations, `z = 0`.
    pub board_points: Vec<Point3<f32>>,
    /// Refined image locations.
    pub image_points: Vec<Point2<f32>>,
    pub id_index: BTreeMap<JunctionId, usize>,
}

impl FrameJunctions {
    #[inline]
    pub fn len(&self) -> usize {
        self.board_points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.board_points.is_empty()
    }
}

/// Local board-to-image homography per detected marker, with the index of
/// the detection it came from.
fn marker_homographies(
    frame: &FiducialFrame,
    board: &BoardGeometryModel,
) -> BTreeMap<u32, (usize, Homography)> {
    let mut map = BTreeMap::new();
    for (idx, marker) in frame.markers().iter().enumerate() {
        let Some(facade) = board.to_facade_corners(marker.id) else {
            continue;
        };
        if let Some(h) = homography_from_4pt(&facade, &marker.corners) {
            map.insert(marker.id, (idx, h));
        } else {
            debug!("marker {} corners are degenerate, skipping", marker.id);
        }
    }
    map
}

/// Per-axis half window for sub-pixel refinement: stay inside the nearest
/// detected marker corners so the refiner never straddles a marker edge.
/// One pixel of safety margin, clamped to `[2, 10]`.
fn refine_half_window(guess: Point2<f32>, closest_corners: &[Point2<f32>]) -> (u32, u32) {
    let mut min_dx = f32::MAX;
    let mut min_dy = f32::MAX;
    for corner in closest_corners {
        min_dx = min_dx.min((corner.x - guess.x).abs());
        min_dy = min_dy.min((corner.y - guess.y).abs());
    }
    let clamp_axis = |d: f32| (d.floor() as i64 - 1).clamp(2, 10) as u32;
    (clamp_axis(min_dx), clamp_axis(min_dy))
}

/// Interpolate every recoverable junction of one frame.
pub fn interpolate_junctions(
    frame: &FiducialFrame,
    board: &BoardGeometryModel,
    refiner: &dyn CornerRefiner,
) -> FrameJunctions {
    let homographies = marker_homographies(frame, board);
    let view = frame.view();
    let mut result = FrameJunctions::default();

    for junction_id in 0..board.junction_count() {
        let Some(location) = board.junction_location(junction_id) else {
            continue;
        };

        // Predict through each detected adjacent marker; average when both
        // diagonal neighbors are available.
        let mut candidates: Vec<Point2<f32>> = Vec::with_capacity(2);
        let mut closest_corners: Vec<Point2<f32>> = Vec::with_capacity(2);
        for (which, marker_id) in board.adjacent_markers(junction_id).into_iter().enumerate() {
            let Some(&(detection_idx, ref h)) = homographies.get(&marker_id) else {
                continue;
            };
            candidates.push(h.apply(location));
            if let Some(corner_idx) = board.closest_corner_index(junction_id, which) {
                closest_corners.push(frame.markers()[detection_idx].corners[corner_idx]);
            }
        }
        if candidates.is_empty() {
            continue;
        }

        let n = candidates.len() as f32;
        let guess = Point2::new(
            candidates.iter().map(|p| p.x).sum::<f32>() / n,
            candidates.iter().map(|p| p.y).sum::<f32>() / n,
        );

        let half_win = refine_half_window(guess, &closest_corners);
        let refined = refiner.refine(&view, guess, half_win, TermCriteria::SUBPIX);

        let idx = result.board_points.len();
        result
            .board_points
            .push(Point3::new(location.x, location.y, 0.0));
        result.image_points.push(refined);
        result.id_index.insert(junction_id, idx);
    }

    debug!(
        "interpolated {}/{} junctions from {} markers",
        result.len(),
        board.junction_count(),
        frame.markers().len()
    );
    result
}
