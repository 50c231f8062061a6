//! Image preprocessing module
//!
//! Deterministic normalization of a roster crop before recognition:
//! - Grayscale conversion
//! - Contrast and sharpness enhancement
//! - Median denoising
//! - Adaptive thresholding (with optional inversion)
//! - Stroke dilation
//! - Upscaling
//!
//! The order is fixed. Game text is small, anti-aliased and sits on a busy
//! background, so the stages are tuned for recognizer accuracy rather than
//! visual fidelity.

use crate::config::{NormalizationConfig, ThresholdMethod};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel};
use imageproc::distance_transform::Norm;
use imageproc::filter::{box_filter, median_filter, separable_filter_equal};
use imageproc::morphology::dilate;

/// Normalize an image for recognition.
///
/// Produces a single-channel image unless both `grayscale` and `binarize`
/// are off, in which case enhancement runs per channel on RGB.
///
/// Polarity: with `invert` on, pixels darker than their neighbourhood
/// (glyph strokes on a light field) come out as 255 on a 0 background.
pub fn normalize(image: &DynamicImage, config: &NormalizationConfig) -> DynamicImage {
    if config.grayscale || config.binarize {
        let gray = enhance(&image.to_luma8(), config);
        let gray = if config.binarize {
            binarize(&gray, config)
        } else {
            gray
        };
        DynamicImage::ImageLuma8(upscale(&gray, config.upscale_factor))
    } else {
        let rgb = enhance(&image.to_rgb8(), config);
        DynamicImage::ImageRgb8(upscale(&rgb, config.upscale_factor))
    }
}

/// Contrast, then sharpness, then median denoise
fn enhance<P>(
    img: &ImageBuffer<P, Vec<u8>>,
    config: &NormalizationConfig,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let contrasted = enhance_contrast(img, config.contrast_factor);
    let sharpened = enhance_sharpness(&contrasted, config.sharpness_factor);
    if config.denoise_radius == 0 {
        sharpened
    } else {
        median_filter(&sharpened, config.denoise_radius, config.denoise_radius)
    }
}

/// Move `value` away from (or towards) `degenerate` by `factor`
fn blend(degenerate: f32, value: f32, factor: f32) -> u8 {
    (degenerate + factor * (value - degenerate))
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Scale every channel's distance from the mean luminance by `factor`
fn enhance_contrast<P>(img: &ImageBuffer<P, Vec<u8>>, factor: f32) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let mut out = img.clone();
    let pixel_count = (img.width() as u64) * (img.height() as u64);
    if factor == 1.0 || pixel_count == 0 {
        return out;
    }

    let luma_sum: u64 = img.pixels().map(|p| p.to_luma()[0] as u64).sum();
    let mean = (luma_sum as f32 / pixel_count as f32).round();

    for px in out.pixels_mut() {
        px.apply_without_alpha(|c| blend(mean, c as f32, factor));
    }
    out
}

/// Blend against a 3x3 smoothed copy (`[[1,1,1],[1,5,1],[1,1,1]] / 13`).
///
/// Border pixels are left untouched.
fn enhance_sharpness<P>(img: &ImageBuffer<P, Vec<u8>>, factor: f32) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let mut out = img.clone();
    let (width, height) = img.dimensions();
    if factor == 1.0 || width < 3 || height < 3 {
        return out;
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut sums = [0f32; 4];
            for dy in 0..3 {
                for dx in 0..3 {
                    let weight = if dx == 1 && dy == 1 { 5.0 } else { 1.0 };
                    let neighbour = img.get_pixel(x + dx - 1, y + dy - 1);
                    for (sum, &c) in sums.iter_mut().zip(neighbour.channels()) {
                        *sum += c as f32 * weight;
                    }
                }
            }

            let original = img.get_pixel(x, y);
            let target = out.get_pixel_mut(x, y);
            for ((dst, &src), sum) in target
                .channels_mut()
                .iter_mut()
                .zip(original.channels())
                .zip(sums)
            {
                *dst = blend(sum / 13.0, src as f32, factor);
            }
        }
    }
    out
}

/// Gaussian sigma for a given window, matching the usual `0.3 * ((k - 1) / 2 - 1) + 0.8`
fn gaussian_sigma(block_size: u32) -> f32 {
    0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized Gaussian weights spanning exactly `block_size` samples
fn gaussian_kernel(block_size: u32) -> Vec<f32> {
    let sigma = gaussian_sigma(block_size);
    let center = (block_size / 2) as f32;
    let weights: Vec<f32> = (0..block_size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Weighted neighbourhood mean over a `block_size` square window
fn local_mean(gray: &GrayImage, config: &NormalizationConfig) -> GrayImage {
    match config.threshold_method {
        ThresholdMethod::Mean => {
            let radius = config.threshold_block_size / 2;
            box_filter(gray, radius, radius)
        }
        ThresholdMethod::Gaussian => {
            separable_filter_equal(gray, &gaussian_kernel(config.threshold_block_size))
        }
    }
}

/// Local adaptive threshold, optional inversion and dilation
fn binarize(gray: &GrayImage, config: &NormalizationConfig) -> GrayImage {
    let local_mean = local_mean(gray, config);

    let binary = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y)[0] as f32;
        let threshold = local_mean.get_pixel(x, y)[0] as f32 - config.threshold_constant;
        let above = value > threshold;
        if above != config.invert {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });

    if config.dilate {
        dilate(&binary, Norm::LInf, 1)
    } else {
        binary
    }
}

/// Resize by `factor` with bilinear interpolation
fn upscale<P>(img: &ImageBuffer<P, Vec<u8>>, factor: f32) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    if (factor - 1.0).abs() < f32::EPSILON {
        return img.clone();
    }
    let width = ((img.width() as f32) * factor).round().max(1.0) as u32;
    let height = ((img.height() as f32) * factor).round().max(1.0) as u32;
    imageops::resize(img, width, height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    fn field_with_dark_square(size: u32, square: u32) -> GrayImage {
        let start = (size - square) / 2;
        GrayImage::from_fn(size, size, |x, y| {
            let inside =
                (start..start + square).contains(&x) && (start..start + square).contains(&y);
            Luma([if inside { 20 } else { 200 }])
        })
    }

    fn binarize_only() -> NormalizationConfig {
        NormalizationConfig {
            binarize: true,
            threshold_constant: 2.0,
            invert: true,
            ..NormalizationConfig::passthrough()
        }
    }

    #[test]
    fn test_gaussian_kernel_spans_block() {
        for block in [3, 11, 31] {
            let kernel = gaussian_kernel(block);
            assert_eq!(kernel.len(), block as usize);
            assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-5);
            let mid = kernel.len() / 2;
            assert!(kernel.iter().all(|&w| w <= kernel[mid]));
            assert_eq!(kernel[0], kernel[kernel.len() - 1]);
        }
    }

    #[test]
    fn test_gaussian_window_follows_block_size() {
        let line = GrayImage::from_fn(15, 1, |x, _| Luma([if x == 7 { 255 } else { 0 }]));
        let config = |block| NormalizationConfig {
            threshold_method: ThresholdMethod::Gaussian,
            threshold_block_size: block,
            ..binarize_only()
        };

        let wide = local_mean(&line, &config(11));
        assert!(wide.get_pixel(12, 0)[0] > 0);
        assert_eq!(wide.get_pixel(13, 0)[0], 0);

        let narrow = local_mean(&line, &config(3));
        assert!(narrow.get_pixel(8, 0)[0] > 0);
        assert_eq!(narrow.get_pixel(9, 0)[0], 0);
    }

    #[test]
    fn test_passthrough_is_plain_luminance() {
        let img = RgbImage::from_fn(8, 6, |x, y| Rgb([(x * 30) as u8, (y * 40) as u8, 90]));
        let dynamic = DynamicImage::ImageRgb8(img);

        let result = normalize(&dynamic, &NormalizationConfig::passthrough());

        assert_eq!(result.to_luma8(), dynamic.to_luma8());
    }

    #[test]
    fn test_default_pipeline_is_two_level_and_upscaled() {
        let img = DynamicImage::ImageLuma8(field_with_dark_square(20, 6));

        let result = normalize(&img, &NormalizationConfig::default());

        assert_eq!(result.dimensions(), (40, 40));
        // bilinear upscaling of a two-level image may add intermediate
        // values; without upscaling the output is strictly two-level
        let config = NormalizationConfig {
            upscale_factor: 1.0,
            ..Default::default()
        };
        let flat = normalize(&img, &config).to_luma8();
        assert!(flat.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let img = DynamicImage::ImageLuma8(field_with_dark_square(16, 4));
        let config = NormalizationConfig::default();
        assert_eq!(normalize(&img, &config), normalize(&img, &config));
    }

    #[test]
    fn test_contrast_is_multiplicative_about_mean() {
        let img = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 100 } else { 150 }]));
        let result = enhance_contrast(&img, 2.0);
        assert_eq!(result.get_pixel(0, 0)[0], 75);
        assert_eq!(result.get_pixel(1, 0)[0], 175);
    }

    #[test]
    fn test_sharpness_keeps_border_and_boosts_center() {
        let img = GrayImage::from_fn(3, 3, |x, y| {
            Luma([if x == 1 && y == 1 { 130 } else { 0 }])
        });
        let result = enhance_sharpness(&img, 2.0);

        // smoothed centre = 130 * 5 / 13 = 50; 50 + 2 * (130 - 50) = 210
        assert_eq!(result.get_pixel(1, 1)[0], 210);
        assert_eq!(result.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_median_removes_speckle() {
        let img = GrayImage::from_fn(5, 5, |x, y| {
            Luma([if x == 2 && y == 2 { 255 } else { 0 }])
        });
        let config = NormalizationConfig {
            denoise_radius: 1,
            ..NormalizationConfig::passthrough()
        };
        let result = normalize(&DynamicImage::ImageLuma8(img), &config).to_luma8();
        assert_eq!(result.get_pixel(2, 2)[0], 0);
    }

    #[test]
    fn test_inverted_threshold_marks_dark_glyphs() {
        let img = DynamicImage::ImageLuma8(field_with_dark_square(21, 3));

        let result = normalize(&img, &binarize_only()).to_luma8();

        assert_eq!(result.get_pixel(10, 10)[0], 255, "glyph should be foreground");
        assert_eq!(result.get_pixel(0, 0)[0], 0, "flat background should be 0");
    }

    #[test]
    fn test_threshold_without_inversion_flips_polarity() {
        let img = DynamicImage::ImageLuma8(field_with_dark_square(21, 3));
        let config = NormalizationConfig {
            invert: false,
            threshold_method: ThresholdMethod::Mean,
            ..binarize_only()
        };

        let result = normalize(&img, &config).to_luma8();

        assert_eq!(result.get_pixel(10, 10)[0], 0);
        assert_eq!(result.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_dilation_thickens_strokes() {
        let img = DynamicImage::ImageLuma8(field_with_dark_square(21, 1));

        let thin = normalize(&img, &binarize_only()).to_luma8();
        let thick = normalize(
            &img,
            &NormalizationConfig {
                dilate: true,
                ..binarize_only()
            },
        )
        .to_luma8();

        assert_eq!(thin.get_pixel(11, 10)[0], 0);
        assert_eq!(thick.get_pixel(11, 10)[0], 255);
        assert_eq!(thick.get_pixel(10, 10)[0], 255);
    }

    #[test]
    fn test_fractional_upscale_dimensions() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(10, 4));
        let config = NormalizationConfig {
            upscale_factor: 1.5,
            ..NormalizationConfig::passthrough()
        };
        assert_eq!(normalize(&img, &config).dimensions(), (15, 6));
    }

    #[test]
    fn test_color_path_when_grayscale_and_binarize_off() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([10, 200, 30])));
        let config = NormalizationConfig {
            grayscale: false,
            ..NormalizationConfig::passthrough()
        };
        let result = normalize(&img, &config);
        assert!(matches!(result, DynamicImage::ImageRgb8(_)));
        assert_eq!(result.to_rgb8().get_pixel(0, 0), &Rgb([10, 200, 30]));
    }
}
