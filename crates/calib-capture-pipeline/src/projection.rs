//! Board outline projection and the stationary-board heuristic.

use nalgebra::Point2;

/// Projection of the four board-outline corners into image space, plus a
/// normalization factor for the motion heuristic.
///
/// `delta_scale` is `max_image_dim / 4 / longest_outline_side`; multiplying
/// the summed per-corner pixel motion by it gives a measure that is roughly
/// independent of how large the board appears in the image.
#[derive(Clone, Copy, Debug)]
pub struct BoardProjection {
    corners: [Point2<f32>; 4],
    delta_scale: f64,
}

impl BoardProjection {
    pub fn new(corners: [Point2<f32>; 4], max_image_dim: u32) -> Self {
        let mut longest_side = 0.0_f64;
        for i in 0..4 {
            let side = (corners[(i + 1) % 4] - corners[i]).norm() as f64;
            longest_side = longest_side.max(side);
        }
        let delta_scale = if longest_side > 0.0 {
            max_image_dim as f64 / 4.0 / longest_side
        } else {
            0.0
        };
        Self {
            corners,
            delta_scale,
        }
    }

    #[inline]
    pub fn corners(&self) -> &[Point2<f32>; 4] {
        &self.corners
    }

    #[inline]
    pub fn delta_scale(&self) -> f64 {
        self.delta_scale
    }

    /// Summed corner motion against a reference corner set, normalized by
    /// this projection's `delta_scale`.
    pub fn delta_to(&self, reference: &[Point2<f32>; 4]) -> f64 {
        let mut delta = 0.0_f64;
        for i in 0..4 {
            delta += (self.corners[i] - reference[i]).norm() as f64;
        }
        delta * self.delta_scale
    }

    /// Normalized motion between two projections of the same board.
    pub fn corner_pixel_delta(&self, other: &BoardProjection) -> f64 {
        self.delta_to(other.corners())
    }
}

/// Heuristic "is the board moving" test between consecutive frames.
///
/// Holds the outline corners of the last tested frame. Must be re-created
/// (reset) on every transition into the Tracking or Stationary capture
/// states so the baseline matches the frame that caused the transition.
#[derive(Clone, Debug)]
pub struct StationaryBoardTracker {
    last_corners: [Point2<f32>; 4],
}

impl StationaryBoardTracker {
    pub fn new(projection: &BoardProjection) -> Self {
        Self {
            last_corners: *projection.corners(),
        }
    }

    /// Test the current frame against the last one, updating the baseline.
    ///
    /// Stationary iff the normalized corner delta stays below `threshold`.
    pub fn test_stationary(&mut self, projection: &BoardProjection, threshold: f64) -> bool {
        let delta = projection.delta_to(&self.last_corners);
        self.last_corners = *projection.corners();
        delta < threshold
    }
}
