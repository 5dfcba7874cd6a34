//! Checks that a resized background matches the backend's target resolution

use crate::error::{AppError, Result};
use crate::image::Dimensions;

/// Allowed difference on the shorter side, from integer rounding
const ROUNDING_TOLERANCE: usize = 1;

/// Verify that `resized` is `original` scaled so its longer side equals
/// `target`, keeping orientation and aspect ratio.
pub fn verify_resize(original: Dimensions, resized: Dimensions, target: u32) -> Result<()> {
    if original.width == 0 || original.height == 0 {
        return Err(AppError::InvalidRequest(format!(
            "original image has empty dimensions {}",
            original
        )));
    }

    let target = target as usize;
    if resized.longer_side() != target {
        return Err(AppError::InvalidResponse(format!(
            "resized image is {}, expected longer side {}",
            resized, target
        )));
    }

    let landscape = original.width >= original.height;
    if original.width != original.height && landscape != (resized.width >= resized.height) {
        return Err(AppError::InvalidResponse(format!(
            "resized image {} changed orientation of {}",
            resized, original
        )));
    }

    let (orig_long, orig_short, short) = if landscape {
        (original.width, original.height, resized.height)
    } else {
        (original.height, original.width, resized.width)
    };
    let expected_short = ((orig_short * target) as f64 / orig_long as f64).round() as usize;

    if short.abs_diff(expected_short) > ROUNDING_TOLERANCE {
        return Err(AppError::InvalidResponse(format!(
            "resized image {} does not keep the aspect ratio of {} (expected shorter side {})",
            resized, original, expected_short
        )));
    }

    Ok(())
}
