//! Calibration report generation.
//!
//! The report is deterministic text: same sweep result, same string. One
//! block per style in table order, then the per-junction re-projection error
//! grid for the style selected for saving.

use std::fmt::Write as _;

use calib_capture_board::BoardGeometryModel;

use crate::project::project_points;
use crate::work::{StyleOutcome, SweepResult};

/// Re-projection errors above this many pixels are flagged in the report.
const BAD_JUNCTION_PX: f64 = 1.0;

/// Render the full report. `style_to_save` selects the style whose junction
/// error grid is appended; `completed_at_ns` is the wall-clock completion
/// time (Unix epoch).
pub fn build_report(
    result: &SweepResult,
    board: &BoardGeometryModel,
    style_to_save: usize,
    completed_at_ns: u64,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Camera calibration completed at {}",
        format_stamp(completed_at_ns)
    );
    let _ = writeln!(
        out,
        "Image size: {} x {}",
        result.image_width, result.image_height
    );

    for (index, outcome) in result.outcomes.iter().enumerate() {
        let _ = writeln!(out);
        style_block(&mut out, index, outcome, result);
    }

    if let Some(outcome) = result.outcomes.get(style_to_save) {
        if let Ok(output) = &outcome.outcome {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "Junction re-projection errors for style {} - {}",
                style_to_save, outcome.style.name
            );
            junction_grid(&mut out, outcome, output, result, board);
        }
    }

    out
}

fn style_block(out: &mut String, index: usize, outcome: &StyleOutcome, result: &SweepResult) {
    let _ = writeln!(out, "Style {} - {}", index, outcome.style.name);
    let _ = writeln!(out, " flags: {}", outcome.style.flags.describe());
    match &outcome.style.frame_subset {
        Some(subset) => {
            let list: Vec<String> = subset.iter().map(|i| i.to_string()).collect();
            let _ = writeln!(out, " Using images: {}", list.join(", "));
        }
        None => {
            let _ = writeln!(out, " Using all captured images");
        }
    }

    let output = match &outcome.outcome {
        Ok(output) => output,
        Err(e) => {
            let _ = writeln!(out, " calibration failed: {e}");
            return;
        }
    };

    let camera = &output.camera;
    let sd = &output.std_intrinsics;
    let _ = writeln!(
        out,
        " fx, fy, cx, cy: {:.4} ({:.4}), {:.4} ({:.4}), {:.4} ({:.4}), {:.4} ({:.4})",
        camera.fx(),
        sd[0],
        camera.fy(),
        sd[1],
        camera.cx(),
        sd[2],
        camera.cy(),
        sd[3]
    );
    let d = &camera.dist;
    let _ = writeln!(
        out,
        " k1, k2, p1, p2, k3: {:.4} ({:.4}), {:.4} ({:.4}), {:.4} ({:.4}), {:.4} ({:.4}), {:.4} ({:.4})",
        d[0], sd[4], d[1], sd[5], d[2], sd[6], d[3], sd[7], d[4], sd[8]
    );
    let _ = writeln!(out, " total RMS re-projection error: {:.4}", output.rms);
    for (view, &frame_idx) in outcome.view_frames.iter().enumerate() {
        let _ = writeln!(
            out,
            "  image {} ({}): RMS {:.4}",
            frame_idx,
            format_stamp(result.frame_stamps_ns[frame_idx]),
            output.per_view_rms.get(view).copied().unwrap_or(f64::NAN)
        );
    }
}

/// One grid per image: junction errors in board row-major order, "0.000"
/// where the junction was not observed.
fn junction_grid(
    out: &mut String,
    outcome: &StyleOutcome,
    output: &crate::backend::SolveOutput,
    result: &SweepResult,
    board: &BoardGeometryModel,
) {
    let per_row = board.junctions_per_row();
    let mut sum_sq = 0.0_f64;
    let mut observed = 0usize;
    let mut bad = 0usize;

    for (view, &frame_idx) in outcome.view_frames.iter().enumerate() {
        let junctions = &result.junctions[frame_idx];
        let projected = project_points(
            &output.camera,
            &output.rvecs[view],
            &output.tvecs[view],
            &junctions.board_points,
        );

        let _ = writeln!(
            out,
            " image {} ({}):",
            frame_idx,
            format_stamp(result.frame_stamps_ns[frame_idx])
        );
        let mut image_sum_sq = 0.0_f64;
        let mut image_observed = 0usize;
        let mut line = String::from("  ");
        for junction_id in 0..board.junction_count() {
            match junctions.id_index.get(&junction_id) {
                Some(&idx) => {
                    let dx = projected[idx].x - junctions.image_points[idx].x as f64;
                    let dy = projected[idx].y - junctions.image_points[idx].y as f64;
                    let err = (dx * dx + dy * dy).sqrt();
                    image_sum_sq += dx * dx + dy * dy;
                    image_observed += 1;
                    if err > BAD_JUNCTION_PX {
                        bad += 1;
                    }
                    let _ = write!(line, "{:5.3} ", err);
                }
                None => line.push_str("0.000 "),
            }
            if (junction_id + 1) % per_row == 0 {
                let _ = writeln!(out, "{}", line.trim_end());
                line = String::from("  ");
            }
        }
        if image_observed > 0 {
            let _ = writeln!(
                out,
                " recalculated RMS over {} junctions: {:.4}",
                image_observed,
                (image_sum_sq / image_observed as f64).sqrt()
            );
        }
        sum_sq += image_sum_sq;
        observed += image_observed;
    }

    if observed > 0 {
        let _ = writeln!(
            out,
            " RMS over {} observed junctions: {:.4}",
            observed,
            (sum_sq / observed as f64).sqrt()
        );
    }
    if bad > 0 {
        let _ = writeln!(out, "****** {bad} bad junction re-projection errors");
    }
}

/// Unix nanoseconds to `YYYY-MM-DD HH:MM:SS.mmm` UTC.
pub fn format_stamp(stamp_ns: u64) -> String {
    let secs = stamp_ns / 1_000_000_000;
    let millis = stamp_ns % 1_000_000_000 / 1_000_000;
    let (year, month, day) = civil_from_days((secs / 86_400) as i64);
    let rem = secs % 86_400;
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
        year,
        month,
        day,
        rem / 3600,
        rem % 3600 / 60,
        rem % 60,
        millis
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian (year, month, day).
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
