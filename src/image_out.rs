//! Frame dumps
//!
//! PNG (with an optional `Title` text chunk) and TIFF writers for RGBA8
//! buffers whose first row is the top of the image

use anyhow::{anyhow, Context, Result};
use image::ImageEncoder;
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

fn check_len(pixels: &[u8], width: u32, height: u32) -> Result<()> {
    let expected = width as usize * height as usize * 4;
    if pixels.len() != expected {
        return Err(anyhow!(
            "pixel buffer is {} bytes, {}x{} RGBA needs {}",
            pixels.len(),
            width,
            height,
            expected
        ));
    }
    Ok(())
}

/// Write an 8-bit RGBA PNG
pub fn write_png(
    path: &Path,
    pixels: &[u8],
    width: u32,
    height: u32,
    title: Option<&str>,
) -> Result<()> {
    check_len(pixels, width, height)?;

    let file = File::create(path)
        .with_context(|| format!("Could not open file {} for writing", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    if let Some(title) = title {
        encoder
            .add_text_chunk("Title".to_string(), title.to_string())
            .context("Could not add PNG title")?;
    }
    let mut writer = encoder.write_header().context("Error during png creation")?;
    writer
        .write_image_data(pixels)
        .context("Error during png creation")?;

    info!("PNG written: {}", path.display());
    Ok(())
}

/// Write an RGBA8 TIFF (4 samples per pixel, 8 bits each, top-left origin)
pub fn write_tiff(path: &Path, pixels: &[u8], width: u32, height: u32) -> Result<()> {
    check_len(pixels, width, height)?;

    let file = File::create(path)
        .with_context(|| format!("buffer_to_tiff: error opening {}", path.display()))?;
    let encoder = image::codecs::tiff::TiffEncoder::new(BufWriter::new(file));
    encoder
        .write_image(pixels, width, height, image::ColorType::Rgba8)
        .with_context(|| format!("buffer_to_tiff: failed writing {}", path.display()))?;

    info!("TIFF written: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_mismatch_rejected() {
        let err = check_len(&[0u8; 12], 2, 2).unwrap_err();
        assert!(err.to_string().contains("needs 16"));
        assert!(check_len(&[0u8; 16], 2, 2).is_ok());
    }

    #[test]
    fn test_png_title_chunk() {
        let dir = std::env::temp_dir().join(format!("glprobe-png-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("frame.png");

        let pixels: Vec<u8> = (0..4 * 4 * 4).map(|i| i as u8).collect();
        write_png(&path, &pixels, 4, 4, Some("egltri")).unwrap();

        let decoder = png::Decoder::new(File::open(&path).unwrap());
        let mut reader = decoder.read_info().unwrap();
        let texts = &reader.info().uncompressed_latin1_text;
        assert!(texts
            .iter()
            .any(|t| t.keyword == "Title" && t.text == "egltri"));

        let mut buf = vec![0u8; reader.output_buffer_size()];
        let frame = reader.next_frame(&mut buf).unwrap();
        assert_eq!((frame.width, frame.height), (4, 4));
        assert_eq!(&buf[..frame.buffer_size()], &pixels[..]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_tiff_rgba_samples() {
        let dir = std::env::temp_dir().join(format!("glprobe-tif-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("frame.tif");

        let pixels = [0, 0, 255, 255, 255, 0, 0, 128].repeat(2);
        write_tiff(&path, &pixels, 2, 2).unwrap();

        let img = image::open(&path).unwrap();
        assert_eq!(img.color(), image::ColorType::Rgba8);
        assert_eq!(img.to_rgba8().into_raw(), pixels);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
