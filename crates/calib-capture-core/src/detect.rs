//! Interfaces of the external detection collaborators.
//!
//! The pipeline never detects markers or refines corners itself; it drives
//! implementations of these traits. Production builds plug in a real
//! detector/refiner, tests plug in synthetic ones.

use nalgebra::Point2;

use crate::GrayImageView;

/// Corner refinement effort requested from the marker detector.
///
/// `Fast` is used on every live frame while tracking the board; `Precise`
/// is used once per captured frame before junction interpolation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefineQuality {
    Fast,
    Precise,
}

/// A detected fiducial marker: id plus 4 ordered image corners (TL, TR, BR,
/// BL in the marker frame).
#[derive(Clone, Copy, Debug)]
pub struct MarkerDetection {
    pub id: u32,
    pub corners: [Point2<f32>; 4],
}

/// External fiducial-marker detector.
pub trait MarkerDetector: Send + Sync {
    fn detect(&self, image: &GrayImageView<'_>, quality: RefineQuality) -> Vec<MarkerDetection>;
}

/// Convergence criteria for sub-pixel refinement.
#[derive(Clone, Copy, Debug)]
pub struct TermCriteria {
    pub max_iter: u32,
    pub eps: f64,
}

impl TermCriteria {
    /// Fixed criteria used for junction refinement: at most 30 iterations or
    /// a machine-epsilon position change.
    pub const SUBPIX: Self = Self {
        max_iter: 30,
        eps: f64::EPSILON,
    };
}

/// External sub-pixel corner refiner.
///
/// `half_win` is the search half-window in pixels per axis around `guess`;
/// the refined point is expected to stay within that window.
pub trait CornerRefiner: Send + Sync {
    fn refine(
        &self,
        image: &GrayImageView<'_>,
        guess: Point2<f32>,
        half_win: (u32, u32),
        criteria: TermCriteria,
    ) -> Point2<f32>;
}
