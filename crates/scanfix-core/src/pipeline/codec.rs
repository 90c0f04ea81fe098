//! TIFF and JPEG decoding/encoding with extension-based format detection.
//!
//! The format of a file is decided by its extension alone. Output is always
//! written in the same format as the input.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::compression::{Deflate, DeflateLevel};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::TiffResult;

use crate::error::PipelineError;

/// Extensions accepted by the codec, the watcher, and directory discovery.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["tiff", "tif", "jpg", "jpeg"];

/// Default JPEG output quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Raster formats the codec understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterFormat {
    Tiff,
    Jpeg,
}

impl RasterFormat {
    /// Detect the format from a path's extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "tif" | "tiff" => Some(Self::Tiff),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    /// Extensions that map to this format.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Tiff => &["tiff", "tif"],
            Self::Jpeg => &["jpg", "jpeg"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tiff => "tiff",
            Self::Jpeg => "jpeg",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            Self::Tiff => ImageFormat::Tiff,
            Self::Jpeg => ImageFormat::Jpeg,
        }
    }
}

impl std::fmt::Display for RasterFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check if a path has one of the supported image extensions.
pub fn is_supported(path: &Path) -> bool {
    RasterFormat::from_path(path).is_some()
}

/// Stateless image codec; the only setting is JPEG quality.
#[derive(Debug, Clone, Copy)]
pub struct ImageCodec {
    jpeg_quality: u8,
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl ImageCodec {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Resolve the format of `path` or fail with `UnsupportedFormat`.
    pub fn detect(path: &Path) -> Result<RasterFormat, PipelineError> {
        RasterFormat::from_path(path).ok_or_else(|| PipelineError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })
    }

    /// Read and decode an image from disk.
    pub fn decode(&self, path: &Path) -> Result<(DynamicImage, RasterFormat), PipelineError> {
        let format = Self::detect(path)?;
        let bytes = std::fs::read(path).map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot read file: {}", e),
        })?;
        let image = Self::decode_bytes(&bytes, format, path)?;
        Ok((image, format))
    }

    /// Decode an in-memory buffer as the given format.
    pub fn decode_bytes(
        bytes: &[u8],
        format: RasterFormat,
        path: &Path,
    ) -> Result<DynamicImage, PipelineError> {
        image::load_from_memory_with_format(bytes, format.image_format()).map_err(|e| {
            PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Failed to decode {}: {}", format, e),
            }
        })
    }

    /// Encode an image and write it to `path`.
    ///
    /// The image is encoded in memory first; if the write fails, any partial
    /// file is removed.
    pub fn encode(
        &self,
        image: &DynamicImage,
        path: &Path,
        format: RasterFormat,
    ) -> Result<(), PipelineError> {
        let bytes = self.encode_bytes(image, format, path)?;
        if let Err(e) = std::fs::write(path, &bytes) {
            let _ = std::fs::remove_file(path);
            return Err(PipelineError::Encode {
                path: path.to_path_buf(),
                message: format!("Cannot write file: {}", e),
            });
        }
        Ok(())
    }

    /// Encode an image into a byte buffer.
    pub fn encode_bytes(
        &self,
        image: &DynamicImage,
        format: RasterFormat,
        path: &Path,
    ) -> Result<Vec<u8>, PipelineError> {
        let result = match format {
            RasterFormat::Tiff => encode_tiff(image),
            RasterFormat::Jpeg => self.encode_jpeg(image),
        };
        result.map_err(|message| PipelineError::Encode {
            path: path.to_path_buf(),
            message,
        })
    }

    fn encode_jpeg(&self, image: &DynamicImage) -> Result<Vec<u8>, String> {
        // JPEG carries neither alpha nor 16-bit samples.
        let flattened = match image {
            DynamicImage::ImageLuma8(_) => image.clone(),
            DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLumaA16(_) => DynamicImage::ImageLuma8(image.to_luma8()),
            DynamicImage::ImageRgb8(_) => image.clone(),
            _ => DynamicImage::ImageRgb8(image.to_rgb8()),
        };

        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, self.jpeg_quality);
        flattened
            .write_with_encoder(encoder)
            .map_err(|e| format!("JPEG encoding failed: {}", e))?;
        Ok(buffer)
    }
}

/// Encode as Deflate-compressed TIFF, keeping 8/16-bit gray, RGB, and RGBA layouts.
fn encode_tiff(image: &DynamicImage) -> Result<Vec<u8>, String> {
    let mut cursor = Cursor::new(Vec::new());
    let (width, height) = (image.width(), image.height());
    {
        let mut encoder = TiffEncoder::new(&mut cursor)
            .map_err(|e| format!("TIFF encoder setup failed: {}", e))?;

        let written = match image {
            DynamicImage::ImageLuma8(buf) => {
                write_deflate::<colortype::Gray8, _>(&mut encoder, width, height, buf.as_raw())
            }
            DynamicImage::ImageLuma16(buf) => {
                write_deflate::<colortype::Gray16, _>(&mut encoder, width, height, buf.as_raw())
            }
            DynamicImage::ImageRgb8(buf) => {
                write_deflate::<colortype::RGB8, _>(&mut encoder, width, height, buf.as_raw())
            }
            DynamicImage::ImageRgb16(buf) => {
                write_deflate::<colortype::RGB16, _>(&mut encoder, width, height, buf.as_raw())
            }
            DynamicImage::ImageRgba8(buf) => {
                write_deflate::<colortype::RGBA8, _>(&mut encoder, width, height, buf.as_raw())
            }
            DynamicImage::ImageRgba16(buf) => {
                write_deflate::<colortype::RGBA16, _>(&mut encoder, width, height, buf.as_raw())
            }
            other if other.color().has_alpha() => {
                let rgba = other.to_rgba8();
                write_deflate::<colortype::RGBA8, _>(&mut encoder, width, height, rgba.as_raw())
            }
            other => {
                let rgb = other.to_rgb8();
                write_deflate::<colortype::RGB8, _>(&mut encoder, width, height, rgb.as_raw())
            }
        };
        written.map_err(|e| format!("TIFF encoding failed: {}", e))?;
    }
    Ok(cursor.into_inner())
}

fn write_deflate<C, W>(
    encoder: &mut TiffEncoder<W>,
    width: u32,
    height: u32,
    data: &[C::Inner],
) -> TiffResult<()>
where
    C: ColorType,
    W: Write + Seek,
    [C::Inner]: TiffValue,
{
    let compression = Deflate::with_level(DeflateLevel::Balanced);
    encoder.write_image_with_compression::<C, _>(width, height, compression, data)
}
