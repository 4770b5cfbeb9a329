//! RGB feedback overlay: board outlines colored by capture progress.

use calib_capture_core::GrayImage;
use nalgebra::Point2;

/// Outline color while capture progress is pending (red).
pub const COLOR_PENDING: [u8; 3] = [255, 0, 0];
/// Outline color for the completed fraction (green).
pub const COLOR_DONE: [u8; 3] = [0, 255, 0];
/// Outline color for previously captured frames (blue).
pub const COLOR_CAPTURED: [u8; 3] = [0, 0, 255];

/// Owned row-major 8-bit RGB image used for rendering feedback.
#[derive(Clone, Debug)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>, // row-major, len = 3*w*h
}

impl RgbImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; 3 * width * height],
        }
    }

    /// Expand a gray frame into RGB for annotation.
    pub fn from_gray(gray: &GrayImage) -> Self {
        let mut data = Vec::with_capacity(3 * gray.width * gray.height);
        for &v in &gray.data {
            data.extend_from_slice(&[v, v, v]);
        }
        Self {
            width: gray.width,
            height: gray.height,
            data,
        }
    }

    #[inline]
    pub fn set_pixel(&mut self, x: i32, y: i32, color: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = 3 * (y as usize * self.width + x as usize);
        self.data[idx..idx + 3].copy_from_slice(&color);
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let idx = 3 * (y * self.width + x);
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }
}

/// Draw a 3 px wide line segment (Bresenham core, thickened across the
/// minor axis).
pub fn draw_line(img: &mut RgbImage, a: Point2<f32>, b: Point2<f32>, color: [u8; 3]) {
    let (x0, y0) = (a.x.round() as i32, a.y.round() as i32);
    let (x1, y1) = (b.x.round() as i32, b.y.round() as i32);

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let steep = dy.abs() > dx;

    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);
    loop {
        for o in -1..=1 {
            if steep {
                img.set_pixel(x + o, y, color);
            } else {
                img.set_pixel(x, y + o, color);
            }
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Draw the board outline, coloring the leading `done_fraction` of its
/// perimeter in `done` and the rest in `pending`. Each side covers a quarter
/// of the perimeter; the side containing the boundary is split at the exact
/// fraction.
pub fn draw_board_boundary(
    img: &mut RgbImage,
    corners: &[Point2<f32>; 4],
    done_fraction: f64,
    pending: [u8; 3],
    done: [u8; 3],
) {
    let done_fraction = done_fraction.clamp(0.0, 1.0);

    for j in 0..4 {
        let beg_fraction = j as f64 / 4.0;
        let end_fraction = beg_fraction + 0.25;
        let p0 = corners[j];
        let p1 = corners[(j + 1) % 4];
        let pm = if end_fraction <= done_fraction {
            p1
        } else if beg_fraction >= done_fraction {
            p0
        } else {
            let t = (4.0 * (done_fraction - beg_fraction)) as f32;
            Point2::new(p0.x + (p1.x - p0.x) * t, p0.y + (p1.y - p0.y) * t)
        };
        if beg_fraction < done_fraction {
            draw_line(img, p0, pm, done);
        }
        if end_fraction > done_fraction {
            draw_line(img, pm, p1, pending);
        }
    }
}
