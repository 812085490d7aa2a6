//! Decoded sprite texture

use std::path::Path;

use crate::AssetError;

/// Pixel layout of a decoded image. Only tightly packed 8-bit RGBA is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// The one texture every sprite samples.
#[derive(Debug, Clone)]
pub struct SpriteImage {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl SpriteImage {
    pub const PLACEHOLDER_WIDTH: u32 = 26;
    pub const PLACEHOLDER_HEIGHT: u32 = 37;

    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, AssetError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(AssetError::PixelSize {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            pixels,
            width,
            height,
            format: PixelFormat::Rgba8,
        })
    }

    /// Decode an image file, converting to RGBA8.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let decoded = image::open(path)
            .map_err(|source| match source {
                image::ImageError::IoError(io) => AssetError::Io {
                    path: path.to_path_buf(),
                    source: io,
                },
                other => AssetError::Decode {
                    path: path.to_path_buf(),
                    source: other,
                },
            })?
            .into_rgba8();

        let (width, height) = decoded.dimensions();
        tracing::info!("Loaded sprite {} ({}x{})", path.display(), width, height);
        Self::from_rgba8(width, height, decoded.into_raw())
    }

    /// Procedural stand-in used when no texture file is supplied: a white
    /// rounded body with two ears on a transparent background.
    pub fn placeholder() -> Self {
        let (w, h) = (Self::PLACEHOLDER_WIDTH, Self::PLACEHOLDER_HEIGHT);
        let mut pixels = vec![0u8; (w * h * 4) as usize];

        let body_center = (w as f32 / 2.0, h as f32 * 0.68);
        let body_radius = (w as f32 * 0.48, h as f32 * 0.32);
        let ears = [(w as f32 * 0.32, h as f32 * 0.2), (w as f32 * 0.68, h as f32 * 0.2)];
        let ear_radius = (w as f32 * 0.12, h as f32 * 0.2);

        let inside = |x: f32, y: f32, c: (f32, f32), r: (f32, f32)| {
            let dx = (x - c.0) / r.0;
            let dy = (y - c.1) / r.1;
            dx * dx + dy * dy <= 1.0
        };

        for y in 0..h {
            for x in 0..w {
                let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
                let filled = inside(px, py, body_center, body_radius)
                    || ears.iter().any(|&ear| inside(px, py, ear, ear_radius));
                if filled {
                    let i = ((y * w + x) * 4) as usize;
                    pixels[i..i + 4].copy_from_slice(&[255, 255, 255, 255]);
                }
            }
        }

        Self {
            pixels,
            width: w,
            height: h,
            format: PixelFormat::Rgba8,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes per row of tightly packed pixels.
    pub fn stride(&self) -> u32 {
        self.width * self.format.bytes_per_pixel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_has_bunny_dimensions() {
        let image = SpriteImage::placeholder();
        assert_eq!(image.width(), 26);
        assert_eq!(image.height(), 37);
        assert_eq!(image.pixels().len(), 26 * 37 * 4);
        assert_eq!(image.stride(), 26 * 4);
    }

    #[test]
    fn placeholder_has_opaque_and_clear_pixels() {
        let image = SpriteImage::placeholder();
        let alphas: Vec<u8> = image.pixels().chunks_exact(4).map(|p| p[3]).collect();
        assert!(alphas.contains(&255));
        assert!(alphas.contains(&0));
        // Top-left corner is background
        assert_eq!(alphas[0], 0);
    }

    #[test]
    fn rejects_mismatched_pixel_buffer() {
        let err = SpriteImage::from_rgba8(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(err, AssetError::PixelSize { expected: 16, actual: 15, .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = SpriteImage::load("definitely/not/here.png").unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
    }
}
