//! Region extraction
//!
//! Cuts named rectangles out of a full frame. Crops are pixel exact; a
//! rectangle reaching outside the frame is an error for that region only.

use crate::error::RegionError;
use crate::types::RegionSpec;
use image::{DynamicImage, GenericImageView};

/// Crop a single region out of `frame`.
///
/// Returns [`RegionError::OutOfBounds`] (naming the region) instead of a
/// clamped or partial image when the rectangle does not fit.
pub fn crop_region(frame: &DynamicImage, region: &RegionSpec) -> Result<DynamicImage, RegionError> {
    let (width, height) = frame.dimensions();
    let rect = region.rect;

    if !rect.fits_within(width, height) {
        return Err(RegionError::OutOfBounds {
            id: region.id.clone(),
            rect: rect.to_string(),
            frame_width: width,
            frame_height: height,
        });
    }

    Ok(frame.crop_imm(rect.left(), rect.top(), rect.width(), rect.height()))
}

/// Crop every region, keeping input order.
///
/// Each region succeeds or fails on its own.
pub fn extract_regions(
    frame: &DynamicImage,
    regions: &[RegionSpec],
) -> Vec<(String, Result<DynamicImage, RegionError>)> {
    regions
        .iter()
        .map(|region| (region.id.clone(), crop_region(frame, region)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RegionBox;
    use image::{ImageBuffer, Rgba};

    fn gradient_frame(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([x as u8, y as u8, 0, 255])
        }))
    }

    fn spec(id: &str, l: u32, t: u32, r: u32, b: u32) -> RegionSpec {
        RegionSpec::new(id, RegionBox::new(l, t, r, b).unwrap())
    }

    #[test]
    fn test_crop_has_exact_box_dimensions() {
        let frame = gradient_frame(100, 200);
        let region = spec("team", 10, 50, 60, 70);

        let cropped = crop_region(&frame, &region).unwrap();

        assert_eq!(cropped.dimensions(), (50, 20));
        // Top-left pixel should be (10, 50) from the frame
        let px = cropped.to_rgba8().get_pixel(0, 0).0;
        assert_eq!(px[0], 10);
        assert_eq!(px[1], 50);
    }

    #[test]
    fn test_crop_touching_frame_edge_is_in_bounds() {
        let frame = gradient_frame(100, 100);
        let cropped = crop_region(&frame, &spec("edge", 90, 90, 100, 100)).unwrap();
        assert_eq!(cropped.dimensions(), (10, 10));
    }

    #[test]
    fn test_partially_outside_region_fails() {
        let frame = gradient_frame(100, 100);
        let err = crop_region(&frame, &spec("enemy", 90, 90, 150, 150)).unwrap_err();

        let RegionError::OutOfBounds { id, .. } = &err;
        assert_eq!(id, "enemy");
        assert!(err.to_string().contains("enemy"));
    }

    #[test]
    fn test_fully_outside_region_fails() {
        let frame = gradient_frame(100, 100);
        assert!(crop_region(&frame, &spec("far", 200, 200, 300, 300)).is_err());
    }

    #[test]
    fn test_batch_isolates_failures() {
        let frame = gradient_frame(100, 100);
        let regions = vec![
            spec("team", 0, 0, 50, 50),
            spec("enemy", 80, 0, 120, 50),
        ];

        let results = extract_regions(&frame, &regions);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "team");
        assert!(results[0].1.is_ok());
        assert_eq!(results[1].0, "enemy");
        assert!(results[1].1.is_err());
    }
}
