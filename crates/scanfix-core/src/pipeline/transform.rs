//! Color-correction transforms.
//!
//! The pipeline only depends on the [`Transform`] trait. [`SaturationContrast`]
//! is a placeholder adjustment standing in for real profile-driven color
//! management; a colorimetric implementation plugs in behind the same trait.

use image::{DynamicImage, ImageBuffer, Pixel};
use std::path::PathBuf;

use super::params::TransformParameters;
use crate::error::PipelineError;

/// Maps one decoded image to a corrected one. Must not mutate its input.
pub trait Transform: Send + Sync {
    fn apply(
        &self,
        image: &DynamicImage,
        params: &TransformParameters,
    ) -> Result<DynamicImage, PipelineError>;

    /// Name shown in logs.
    fn name(&self) -> &str;
}

/// Saturation then contrast nudge, applied per color channel.
///
/// Saturation is scaled in HSL space; contrast stretches each channel around
/// mid-gray. Alpha is left untouched and bit depth is preserved.
#[derive(Debug, Clone, Copy)]
pub struct SaturationContrast {
    /// Saturation change in percent (-100..=500)
    pub saturation: f32,
    /// Contrast change in percent (-100..=100)
    pub contrast: f32,
}

impl Default for SaturationContrast {
    fn default() -> Self {
        Self {
            saturation: 10.0,
            contrast: 5.0,
        }
    }
}

impl Transform for SaturationContrast {
    fn apply(
        &self,
        image: &DynamicImage,
        _params: &TransformParameters,
    ) -> Result<DynamicImage, PipelineError> {
        let saturation = 1.0 + self.saturation.clamp(-100.0, 500.0) / 100.0;
        let contrast = contrast_factor(self.contrast);

        let adjust = |rgb: &mut [f32]| {
            if rgb.len() == 3 {
                saturate(rgb, saturation);
            }
            for v in rgb.iter_mut() {
                *v = (0.5 + (*v - 0.5) * contrast).clamp(0.0, 1.0);
            }
        };

        let corrected = match image {
            DynamicImage::ImageLuma8(buf) => DynamicImage::ImageLuma8(remap8(buf, 1, &adjust)?),
            DynamicImage::ImageLumaA8(buf) => DynamicImage::ImageLumaA8(remap8(buf, 1, &adjust)?),
            DynamicImage::ImageRgb8(buf) => DynamicImage::ImageRgb8(remap8(buf, 3, &adjust)?),
            DynamicImage::ImageRgba8(buf) => DynamicImage::ImageRgba8(remap8(buf, 3, &adjust)?),
            DynamicImage::ImageLuma16(buf) => DynamicImage::ImageLuma16(remap16(buf, 1, &adjust)?),
            DynamicImage::ImageLumaA16(buf) => {
                DynamicImage::ImageLumaA16(remap16(buf, 1, &adjust)?)
            }
            DynamicImage::ImageRgb16(buf) => DynamicImage::ImageRgb16(remap16(buf, 3, &adjust)?),
            DynamicImage::ImageRgba16(buf) => {
                DynamicImage::ImageRgba16(remap16(buf, 3, &adjust)?)
            }
            other => DynamicImage::ImageRgba8(remap8(&other.to_rgba8(), 3, &adjust)?),
        };
        Ok(corrected)
    }

    fn name(&self) -> &str {
        "saturation-contrast"
    }
}

/// Contrast multiplier for a percentage; values past +100% saturate.
fn contrast_factor(percent: f32) -> f32 {
    let v = (100.0 + percent.clamp(-100.0, 100.0)) / 100.0;
    if v <= 1.0 {
        v
    } else if v < 2.0 {
        1.0 / (2.0 - v)
    } else {
        f32::MAX
    }
}

/// Scale the HSL saturation of a normalized RGB triple in place.
fn saturate(rgb: &mut [f32], multiplier: f32) {
    let (h, s, l) = rgb_to_hsl(rgb[0], rgb[1], rgb[2]);
    let (r, g, b) = hsl_to_rgb(h, (s * multiplier).clamp(0.0, 1.0), l);
    rgb[0] = r;
    rgb[1] = g;
    rgb[2] = b;
}

fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if max == min {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    (h / 6.0, s, l)
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s == 0.0 {
        return (l, l, l);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    (
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    )
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn remap8<P>(
    buf: &ImageBuffer<P, Vec<u8>>,
    color_channels: usize,
    adjust: &dyn Fn(&mut [f32]),
) -> Result<ImageBuffer<P, Vec<u8>>, PipelineError>
where
    P: Pixel<Subpixel = u8>,
{
    let samples = remap_samples(
        buf.as_raw().as_slice(),
        P::CHANNEL_COUNT as usize,
        color_channels,
        |v| v as f32 / 255.0,
        |v| (v * 255.0).round() as u8,
        adjust,
    );
    rebuild(buf.width(), buf.height(), samples)
}

fn remap16<P>(
    buf: &ImageBuffer<P, Vec<u16>>,
    color_channels: usize,
    adjust: &dyn Fn(&mut [f32]),
) -> Result<ImageBuffer<P, Vec<u16>>, PipelineError>
where
    P: Pixel<Subpixel = u16>,
{
    let samples = remap_samples(
        buf.as_raw().as_slice(),
        P::CHANNEL_COUNT as usize,
        color_channels,
        |v| v as f32 / 65535.0,
        |v| (v * 65535.0).round() as u16,
        adjust,
    );
    rebuild(buf.width(), buf.height(), samples)
}

/// Run `adjust` over the color channels of every pixel; extra channels are copied.
fn remap_samples<T: Copy>(
    samples: &[T],
    channel_count: usize,
    color_channels: usize,
    load: impl Fn(T) -> f32,
    store: impl Fn(f32) -> T,
    adjust: &dyn Fn(&mut [f32]),
) -> Vec<T> {
    let mut out = Vec::with_capacity(samples.len());
    let mut color = [0.0f32; 3];
    for pixel in samples.chunks_exact(channel_count) {
        for (slot, &v) in color.iter_mut().zip(&pixel[..color_channels]) {
            *slot = load(v);
        }
        adjust(&mut color[..color_channels]);
        out.extend(color[..color_channels].iter().map(|&v| store(v)));
        out.extend_from_slice(&pixel[color_channels..]);
    }
    out
}

fn rebuild<P: Pixel>(
    width: u32,
    height: u32,
    samples: Vec<P::Subpixel>,
) -> Result<ImageBuffer<P, Vec<P::Subpixel>>, PipelineError> {
    ImageBuffer::from_raw(width, height, samples).ok_or_else(|| PipelineError::Transform {
        path: PathBuf::new(),
        message: format!("sample buffer does not match {}x{}", width, height),
    })
}
