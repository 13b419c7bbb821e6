//! Framebuffer readback
//!
//! RGBA8 pixel reads, row flipping and coverage statistics

use glow::HasContext;

/// Read a `width`x`height` RGBA8 block from the bound read framebuffer.
///
/// Rows come back bottom-up (GL origin is bottom-left).
pub fn read_rgba(gl: &glow::Context, width: u32, height: u32) -> Vec<u8> {
    let mut pixels = vec![0u8; (width * height * 4) as usize];
    unsafe {
        gl.read_pixels(
            0,
            0,
            width as i32,
            height as i32,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            glow::PixelPackData::Slice(&mut pixels),
        );
    }
    pixels
}

/// Flip rows so the first row is the top of the image
pub fn flip_rows(pixels: &[u8], width: u32, height: u32) -> Vec<u8> {
    let row_size = (width * 4) as usize;
    let mut flipped = vec![0u8; pixels.len()];
    for y in 0..height as usize {
        let src_row = (height as usize - 1 - y) * row_size;
        let dst_row = y * row_size;
        flipped[dst_row..dst_row + row_size].copy_from_slice(&pixels[src_row..src_row + row_size]);
    }
    flipped
}

/// Summary of a readback, enough to tell "drew something" from "drew nothing"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelStats {
    pub total: usize,
    /// Pixels whose RGB is not black
    pub covered: usize,
    pub center: [u8; 4],
}

impl PixelStats {
    pub fn compute(pixels: &[u8], width: u32, height: u32) -> Self {
        let total = (width * height) as usize;
        let covered = pixels
            .chunks_exact(4)
            .take(total)
            .filter(|px| px[0] != 0 || px[1] != 0 || px[2] != 0)
            .count();

        let center_index = ((height / 2) * width + width / 2) as usize * 4;
        let mut center = [0u8; 4];
        if let Some(px) = pixels.get(center_index..center_index + 4) {
            center.copy_from_slice(px);
        }

        Self {
            total,
            covered,
            center,
        }
    }

    pub fn coverage_percent(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.covered as f32 * 100.0 / self.total as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip_rows() {
        // 1x3 image, one pixel per row
        let pixels = [1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3];
        assert_eq!(
            flip_rows(&pixels, 1, 3),
            vec![3, 3, 3, 3, 2, 2, 2, 2, 1, 1, 1, 1]
        );
    }

    #[test]
    fn test_stats_counts_rgb_only() {
        // Alpha alone does not count as coverage
        let pixels = [0, 0, 0, 255, 0, 255, 0, 0, 0, 0, 0, 0, 9, 0, 0, 0];
        let stats = PixelStats::compute(&pixels, 2, 2);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.covered, 2);
        assert_eq!(stats.center, [9, 0, 0, 0]);
        assert!((stats.coverage_percent() - 50.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_stats_short_buffer() {
        let stats = PixelStats::compute(&[], 4, 4);
        assert_eq!(stats.covered, 0);
        assert_eq!(stats.center, [0; 4]);
    }
}
