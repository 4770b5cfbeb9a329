//! Board specification and layout queries.
//!
//! The board is a `squares_x` x `squares_y` checkerboard with a fiducial
//! marker centered in every square of one color. Junctions are the interior
//! grid intersections between squares; each junction touches exactly two
//! marker squares, diagonally.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Id of a marker on the board (row-major over marker-bearing squares).
pub type MarkerId = u32;

/// Id of an interior grid junction (row-major, stride `squares_x - 1`).
pub type JunctionId = u32;

/// Static board specification.
///
/// `squares_x`/`squares_y` are **square counts** (not junction counts).
/// Lengths are in board units (typically meters).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BoardSpec {
    pub squares_x: u32,
    pub squares_y: u32,
    pub square_length: f32,
    pub marker_length: f32,
    /// Whether the square at the board origin (top-left) carries a marker.
    /// Markers occupy every square of that color.
    #[serde(default)]
    pub origin_square_with_marker: bool,
}

/// Board specification validation errors.
#[derive(thiserror::Error, Debug)]
pub enum BoardGeometryError {
    #[error("squares_x and squares_y must be >= 2")]
    InvalidSize,
    #[error("square_length must be finite and > 0")]
    InvalidSquareLength,
    #[error("marker_length must be finite and in (0, square_length)")]
    InvalidMarkerLength,
}

/// Precomputed board layout helpers.
#[derive(Clone, Debug)]
pub struct BoardGeometryModel {
    spec: BoardSpec,
    /// marker id -> square cell (sx, sy)
    marker_squares: Vec<[u32; 2]>,
    /// square cell (row-major) -> marker id
    square_markers: Vec<Option<MarkerId>>,
}

impl BoardGeometryModel {
    /// Validate and create a model from a spec.
    pub fn new(spec: BoardSpec) -> Result<Self, BoardGeometryError> {
        if spec.squares_x < 2 || spec.squares_y < 2 {
            return Err(BoardGeometryError::InvalidSize);
        }
        if !spec.square_length.is_finite() || spec.square_length <= 0.0 {
            return Err(BoardGeometryError::InvalidSquareLength);
        }
        if !spec.marker_length.is_finite()
            || spec.marker_length <= 0.0
            || spec.marker_length >= spec.square_length
        {
            return Err(BoardGeometryError::InvalidMarkerLength);
        }

        let marker_parity = if spec.origin_square_with_marker { 0 } else { 1 };
        let mut marker_squares = Vec::new();
        let mut square_markers = vec![None; (spec.squares_x * spec.squares_y) as usize];
        for sy in 0..spec.squares_y {
            for sx in 0..spec.squares_x {
                if (sx + sy) % 2 == marker_parity {
                    let id = marker_squares.len() as MarkerId;
                    marker_squares.push([sx, sy]);
                    square_markers[(sy * spec.squares_x + sx) as usize] = Some(id);
                }
            }
        }

        Ok(Self {
            spec,
            marker_squares,
            square_markers,
        })
    }

    /// Return the underlying board specification.
    #[inline]
    pub fn spec(&self) -> BoardSpec {
        self.spec
    }

    /// Number of markers on the board.
    #[inline]
    pub fn marker_count(&self) -> usize {
        self.marker_squares.len()
    }

    /// Number of interior junctions.
    #[inline]
    pub fn junction_count(&self) -> u32 {
        (self.spec.squares_x - 1) * (self.spec.squares_y - 1)
    }

    /// Junctions per board row; the stride of the row-major junction grid.
    #[inline]
    pub fn junctions_per_row(&self) -> u32 {
        self.spec.squares_x - 1
    }

    /// Square cell (sx, sy) occupied by a marker, or `None` off the board.
    #[inline]
    pub fn marker_square(&self, marker_id: MarkerId) -> Option<[u32; 2]> {
        self.marker_squares.get(marker_id as usize).copied()
    }

    /// The marker's 4 corners on the board plane (TL, TR, BR, BL).
    ///
    /// The marker is centered in its square. `None` for ids off the board.
    pub fn to_facade_corners(&self, marker_id: MarkerId) -> Option<[Point2<f32>; 4]> {
        let [sx, sy] = self.marker_square(marker_id)?;
        let sq = self.spec.square_length;
        let m = self.spec.marker_length;
        let margin = (sq - m) / 2.0;
        let x0 = sx as f32 * sq + margin;
        let y0 = sy as f32 * sq + margin;
        Some([
            Point2::new(x0, y0),
            Point2::new(x0 + m, y0),
            Point2::new(x0 + m, y0 + m),
            Point2::new(x0, y0 + m),
        ])
    }

    /// Board-plane location of a junction, or `None` for ids out of range.
    pub fn junction_location(&self, junction_id: JunctionId) -> Option<Point2<f32>> {
        let (ix, iy) = self.junction_cell(junction_id)?;
        Some(Point2::new(
            ix as f32 * self.spec.square_length,
            iy as f32 * self.spec.square_length,
        ))
    }

    /// Marker ids of the two squares diagonally touching the junction,
    /// upper marker first. Empty for junction ids out of range.
    pub fn adjacent_markers(&self, junction_id: JunctionId) -> Vec<MarkerId> {
        self.adjacent_cells(junction_id)
            .into_iter()
            .filter_map(|(cell, _)| self.marker_at(cell))
            .collect()
    }

    /// Corner index (0..4, TL/TR/BR/BL) of the `which_adjacent`-th adjacent
    /// marker's corner closest to the junction.
    pub fn closest_corner_index(
        &self,
        junction_id: JunctionId,
        which_adjacent: usize,
    ) -> Option<usize> {
        self.adjacent_cells(junction_id)
            .get(which_adjacent)
            .map(|&(_, corner)| corner)
    }

    /// The 4 outline corners of the whole board on the board plane
    /// (TL, TR, BR, BL).
    pub fn board_outline_corners(&self) -> [Point2<f32>; 4] {
        let w = self.spec.squares_x as f32 * self.spec.square_length;
        let h = self.spec.squares_y as f32 * self.spec.square_length;
        [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ]
    }

    /// Corner coordinates (ix, iy) of a junction; both are in `1..squares`.
    fn junction_cell(&self, junction_id: JunctionId) -> Option<(u32, u32)> {
        if junction_id >= self.junction_count() {
            return None;
        }
        let stride = self.junctions_per_row();
        Some((1 + junction_id % stride, 1 + junction_id / stride))
    }

    fn marker_at(&self, cell: [u32; 2]) -> Option<MarkerId> {
        self.square_markers[(cell[1] * self.spec.squares_x + cell[0]) as usize]
    }

    /// The two marker squares touching a junction, each with the index of
    /// the marker corner closest to the junction. Upper square first.
    fn adjacent_cells(&self, junction_id: JunctionId) -> Vec<([u32; 2], usize)> {
        let Some((ix, iy)) = self.junction_cell(junction_id) else {
            return Vec::new();
        };
        let marker_parity = if self.spec.origin_square_with_marker { 0 } else { 1 };
        if (ix + iy) % 2 == marker_parity {
            // Markers up-left and down-right: closest corners BR and TL.
            vec![([ix - 1, iy - 1], 2), ([ix, iy], 0)]
        } else {
            // Markers up-right and down-left: closest corners BL and TR.
            vec![([ix, iy - 1], 3), ([ix - 1, iy], 1)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn build_board() -> BoardGeometryModel {
        BoardGeometryModel::new(BoardSpec {
            squares_x: 6,
            squares_y: 5,
            square_length: 0.03,
            marker_length: 0.02,
            origin_square_with_marker: false,
        })
        .expect("board")
    }

    #[test]
    fn rejects_bad_specs() {
        let base = build_board().spec();
        assert!(matches!(
            BoardGeometryModel::new(BoardSpec { squares_x: 1, ..base }),
            Err(BoardGeometryError::InvalidSize)
        ));
        assert!(matches!(
            BoardGeometryModel::new(BoardSpec {
                square_length: 0.0,
                ..base
            }),
            Err(BoardGeometryError::InvalidSquareLength)
        ));
        assert!(matches!(
            BoardGeometryModel::new(BoardSpec {
                marker_length: 0.03,
                ..base
            }),
            Err(BoardGeometryError::InvalidMarkerLength)
        ));
    }

    #[test]
    fn marker_ids_are_row_major_over_marker_squares() {
        let board = build_board();
        // 6x5 board, markers on squares with odd (sx+sy): 15 of 30 squares.
        assert_eq!(board.marker_count(), 15);
        assert_eq!(board.marker_square(0), Some([1, 0]));
        assert_eq!(board.marker_square(1), Some([3, 0]));
        assert_eq!(board.marker_square(3), Some([0, 1]));
        assert_eq!(board.marker_square(15), None);
    }

    #[test]
    fn facade_corners_are_centered_in_the_square() {
        let board = build_board();
        let corners = board.to_facade_corners(0).expect("corners");
        // Marker 0 sits in square (1, 0); margin is 5 mm.
        assert_relative_eq!(corners[0].x, 0.035, epsilon = 1e-6);
        assert_relative_eq!(corners[0].y, 0.005, epsilon = 1e-6);
        assert_relative_eq!(corners[2].x, 0.055, epsilon = 1e-6);
        assert_relative_eq!(corners[2].y, 0.025, epsilon = 1e-6);
        assert!(board.to_facade_corners(99).is_none());
    }

    #[test]
    fn junction_grid_is_row_major_with_stride() {
        let board = build_board();
        assert_eq!(board.junction_count(), 20);
        assert_eq!(board.junctions_per_row(), 5);
        let loc = board.junction_location(0).expect("loc");
        assert_relative_eq!(loc.x, 0.03, epsilon = 1e-6);
        assert_relative_eq!(loc.y, 0.03, epsilon = 1e-6);
        let loc = board.junction_location(6).expect("loc");
        assert_relative_eq!(loc.x, 0.06, epsilon = 1e-6);
        assert_relative_eq!(loc.y, 0.06, epsilon = 1e-6);
        assert!(board.junction_location(20).is_none());
    }

    #[test]
    fn every_junction_has_two_diagonal_markers() {
        let board = build_board();
        for jid in 0..board.junction_count() {
            let adjacent = board.adjacent_markers(jid);
            assert_eq!(adjacent.len(), 2, "junction {jid}");
            assert_ne!(adjacent[0], adjacent[1]);
        }
        assert!(board.adjacent_markers(20).is_empty());
    }

    #[test]
    fn closest_corner_is_nearest_to_the_junction() {
        let board = build_board();
        for jid in 0..board.junction_count() {
            let junction = board.junction_location(jid).expect("loc");
            let adjacent = board.adjacent_markers(jid);
            for (i, &marker_id) in adjacent.iter().enumerate() {
                let idx = board.closest_corner_index(jid, i).expect("corner idx");
                let corners = board.to_facade_corners(marker_id).expect("corners");
                let closest = corners[idx];
                for (c, corner) in corners.iter().enumerate() {
                    let d = (*corner - junction).norm();
                    let d_closest = (closest - junction).norm();
                    assert!(
                        d_closest <= d + 1e-6,
                        "junction {jid} marker {marker_id}: corner {c} closer than {idx}"
                    );
                }
            }
        }
    }

    #[test]
    fn spec_round_trips_through_json() {
        let spec = build_board().spec();
        let json = serde_json::to_string(&spec).expect("serialize");
        let back: BoardSpec = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.squares_x, spec.squares_x);
        assert_eq!(back.squares_y, spec.squares_y);
        assert_eq!(back.origin_square_with_marker, spec.origin_square_with_marker);
    }
}
