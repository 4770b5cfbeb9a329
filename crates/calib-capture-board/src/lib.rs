//! Static board layout for a ChArUco-style calibration target.
//!
//! Everything here is a deterministic function of the board spec; there is
//! no mutable state and no image-space data.

mod board;

pub use board::{BoardGeometryError, BoardGeometryModel, BoardSpec, JunctionId, MarkerId};
