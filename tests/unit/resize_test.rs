//! Unit tests for background resize verification

use magic_quill_client::checklist::verify_resize;
use magic_quill_client::image::Dimensions;

fn dims(width: usize, height: usize) -> Dimensions {
    Dimensions { width, height }
}

#[test]
fn test_documented_resolutions() {
    let original = dims(1600, 1200);
    for target in [256u32, 512, 1024] {
        let t = target as usize;
        let resized = dims(t, t * 3 / 4);
        assert!(
            verify_resize(original, resized, target).is_ok(),
            "target {} should accept {}",
            target,
            resized
        );
    }
}

#[test]
fn test_resolution_mismatch() {
    let original = dims(1600, 1200);
    assert!(verify_resize(original, dims(512, 384), 1024).is_err());
    assert!(verify_resize(original, dims(1024, 768), 256).is_err());
}

#[test]
fn test_square_images() {
    assert!(verify_resize(dims(300, 300), dims(512, 512), 512).is_ok());
    assert!(verify_resize(dims(300, 300), dims(512, 500), 512).is_err());
}
