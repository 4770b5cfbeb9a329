//! Calibration style table.
//!
//! Each style is one row of a data table: a set of solver constraint flags,
//! an optional intrinsic seed, an optional preliminary solve whose result
//! seeds the final one, and an optional restriction to a subset of frames.
//! The sweep runs every style against the same interpolated junction data.

use nalgebra::Matrix3;

use crate::backend::CameraModel;

/// Constraint flags for one calibration solve. All default to `false`
/// (the corresponding parameter is optimized freely).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CalibFlags {
    /// Start the optimization from the provided initial camera model.
    pub use_intrinsic_guess: bool,
    /// Keep the principal point at its initial value (image center unless a
    /// guess is given).
    pub fix_principal_point: bool,
    /// Force `fx == fy`.
    pub fix_aspect_ratio: bool,
    pub fix_focal_length: bool,
    /// Force tangential distortion `p1 = p2 = 0`.
    pub zero_tangent_dist: bool,
    pub fix_k1: bool,
    pub fix_k2: bool,
    pub fix_k3: bool,
}

impl CalibFlags {
    /// Human-readable flag list for the report.
    pub fn describe(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if self.use_intrinsic_guess {
            parts.push("use_intrinsic_guess");
        }
        if self.fix_principal_point {
            parts.push("fix_principal_point");
        }
        if self.fix_aspect_ratio {
            parts.push("fix_aspect_ratio");
        }
        if self.fix_focal_length {
            parts.push("fix_focal_length");
        }
        if self.zero_tangent_dist {
            parts.push("zero_tangent_dist");
        }
        if self.fix_k1 {
            parts.push("fix_k1");
        }
        if self.fix_k2 {
            parts.push("fix_k2");
        }
        if self.fix_k3 {
            parts.push("fix_k3");
        }
        if parts.is_empty() {
            "no constraints".to_owned()
        } else {
            parts.join(", ")
        }
    }
}

/// Where a style's initial camera model comes from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IntrinsicSeed {
    /// No guess; the solver initializes itself.
    None,
    /// Unit focal length, principal point at the image center, no distortion.
    CenteredUnitFocal,
    /// A fixed camera known from a previous calibration of similar hardware.
    Fixed {
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
        k1: f64,
        k2: f64,
    },
}

/// A constrained solve run before the final one; its resulting intrinsics
/// become the final solve's initial guess.
#[derive(Clone, Copy, Debug)]
pub struct PreliminaryStage {
    pub flags: CalibFlags,
    pub seed: IntrinsicSeed,
}

/// One row of the style table.
#[derive(Clone, Debug)]
pub struct CalibrationStyle {
    pub name: &'static str,
    pub flags: CalibFlags,
    pub seed: IntrinsicSeed,
    pub preliminary: Option<PreliminaryStage>,
    /// Restrict the solve to these frame indices; `None` uses every frame.
    pub frame_subset: Option<Vec<usize>>,
}

/// Fixed intrinsics used by the `custom` style, measured on reference
/// hardware.
pub const CUSTOM_SEED: IntrinsicSeed = IntrinsicSeed::Fixed {
    fx: 699.3550,
    fy: 699.3550,
    cx: 650.0850,
    cy: 354.6600,
    k1: -0.1716,
    k2: 0.0246,
};

/// Build the sweep table. The order is fixed and part of the report format:
/// constraints are relaxed one at a time from `minimum_freedom` through
/// `k3_free`, followed by the two seeded styles.
pub fn style_table() -> Vec<CalibrationStyle> {
    let locked = CalibFlags {
        fix_principal_point: true,
        fix_aspect_ratio: true,
        zero_tangent_dist: true,
        fix_k1: true,
        fix_k2: true,
        fix_k3: true,
        ..CalibFlags::default()
    };

    let mut table = Vec::with_capacity(9);

    table.push(CalibrationStyle {
        name: "minimum_freedom",
        flags: locked,
        seed: IntrinsicSeed::None,
        preliminary: None,
        frame_subset: None,
    });
    table.push(CalibrationStyle {
        name: "k1_free",
        flags: CalibFlags { fix_k1: false, ..locked },
        seed: IntrinsicSeed::None,
        preliminary: None,
        frame_subset: None,
    });
    table.push(CalibrationStyle {
        name: "k2_free",
        flags: CalibFlags {
            fix_k1: false,
            fix_k2: false,
            ..locked
        },
        seed: IntrinsicSeed::None,
        preliminary: None,
        frame_subset: None,
    });
    table.push(CalibrationStyle {
        name: "principal_point_free",
        flags: CalibFlags {
            fix_principal_point: false,
            fix_k1: false,
            fix_k2: false,
            ..locked
        },
        seed: IntrinsicSeed::None,
        preliminary: None,
        frame_subset: None,
    });
    table.push(CalibrationStyle {
        name: "unequal_focal_lengths",
        flags: CalibFlags {
            fix_principal_point: false,
            fix_aspect_ratio: false,
            fix_k1: false,
            fix_k2: false,
            ..locked
        },
        seed: IntrinsicSeed::None,
        preliminary: None,
        frame_subset: None,
    });
    table.push(CalibrationStyle {
        name: "tangent_distortion",
        flags: CalibFlags {
            fix_principal_point: false,
            fix_aspect_ratio: false,
            zero_tangent_dist: false,
            fix_k1: false,
            fix_k2: false,
            ..locked
        },
        seed: IntrinsicSeed::None,
        preliminary: None,
        frame_subset: None,
    });
    table.push(CalibrationStyle {
        name: "k3_free",
        flags: CalibFlags::default(),
        seed: IntrinsicSeed::None,
        preliminary: None,
        frame_subset: None,
    });
    table.push(CalibrationStyle {
        name: "custom",
        // Every parameter stays fixed at the seed: this style evaluates the
        // known reference camera against the captures, it does not refit it.
        flags: CalibFlags {
            use_intrinsic_guess: true,
            fix_focal_length: true,
            ..locked
        },
        seed: CUSTOM_SEED,
        preliminary: None,
        frame_subset: None,
    });
    table.push(CalibrationStyle {
        name: "k1_free_then_principal_point_free",
        flags: CalibFlags {
            use_intrinsic_guess: true,
            fix_aspect_ratio: true,
            zero_tangent_dist: true,
            fix_k3: true,
            ..CalibFlags::default()
        },
        seed: IntrinsicSeed::None,
        // Stage A is a plain k1-free solve; the backend initializes itself
        // and only its resulting intrinsics are carried into stage B.
        preliminary: Some(PreliminaryStage {
            flags: CalibFlags { fix_k1: false, ..locked },
            seed: IntrinsicSeed::None,
        }),
        frame_subset: None,
    });

    table
}

/// Materialize a seed into a camera model, if the seed provides one.
pub fn seed_camera(seed: IntrinsicSeed, image_size: (u32, u32)) -> Option<CameraModel> {
    match seed {
        IntrinsicSeed::None => None,
        IntrinsicSeed::CenteredUnitFocal => Some(CameraModel {
            matrix: Matrix3::new(
                1.0,
                0.0,
                image_size.0 as f64 / 2.0,
                0.0,
                1.0,
                image_size.1 as f64 / 2.0,
                0.0,
                0.0,
                1.0,
            ),
            dist: [0.0; 5],
        }),
        IntrinsicSeed::Fixed { fx, fy, cx, cy, k1, k2 } => Some(CameraModel {
            matrix: Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0),
            dist: [k1, k2, 0.0, 0.0, 0.0],
        }),
    }
}
