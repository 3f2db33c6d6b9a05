// tests/test_image.rs — Integration tests for RgbaImage.
//
// Only the public API is reachable from here, so these double as a check
// that the host-side image surface is usable on its own.

use gridcast::image::{RgbaImage, BLACK};

#[test]
fn image_new_zero_initialized() {
    let img = RgbaImage::new(100, 50);
    assert_eq!(img.width(), 100);
    assert_eq!(img.height(), 50);
    assert_eq!(img.byte_len(), 100 * 50 * 4);
    assert_eq!(img.pixel(0, 0), [0, 0, 0, 0]);
    assert_eq!(img.pixel(99, 49), [0, 0, 0, 0]);
}

#[test]
fn image_set_get_consistency() {
    let mut img = RgbaImage::new(10, 10);
    // Checkerboard of red and black.
    for y in 0..10 {
        for x in 0..10 {
            let px = if (x + y) % 2 == 0 { [255, 0, 0, 255] } else { BLACK };
            img.set_pixel(x, y, px);
        }
    }
    for y in 0..10 {
        for x in 0..10 {
            let expected = if (x + y) % 2 == 0 { [255, 0, 0, 255] } else { BLACK };
            assert_eq!(img.pixel(x, y), expected, "mismatch at ({x}, {y})");
        }
    }
}

#[test]
fn image_from_vec_layout() {
    // 2×2 image, row-major, 4 bytes per pixel:
    //  [p00, p10]
    //  [p01, p11]
    let data: Vec<u8> = (0u8..16).collect();
    let img = RgbaImage::from_vec(2, 2, data);
    assert_eq!(img.pixel(0, 0), [0, 1, 2, 3]);
    assert_eq!(img.pixel(1, 0), [4, 5, 6, 7]);
    assert_eq!(img.pixel(0, 1), [8, 9, 10, 11]);
    assert_eq!(img.pixel(1, 1), [12, 13, 14, 15]);
}

#[test]
#[should_panic(expected = "data length")]
fn image_from_vec_wrong_length_panics() {
    RgbaImage::from_vec(2, 2, vec![0; 15]);
}

#[test]
fn image_device_words_view_as_rgba() {
    // What the kernels write: one u32 per pixel, r in the low byte.
    let words: Vec<u32> = vec![0xff00_00ff, 0xff33_2211];
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    let img = RgbaImage::from_vec(2, 1, bytes);
    assert_eq!(img.pixel(0, 0), [255, 0, 0, 255]);
    assert_eq!(img.pixel(1, 0), [0x11, 0x22, 0x33, 255]);
}

#[test]
fn image_download_target_covers_every_pixel() {
    let mut img = RgbaImage::new(3, 3);
    img.as_bytes_mut().fill(7);
    assert!(img.pixels().all(|(_, _, p)| p == [7, 7, 7, 7]));
    assert_eq!(img.pixels().count(), 9);
}

#[test]
fn image_framebuffer_conversion() {
    let mut img = RgbaImage::new(2, 1);
    img.set_pixel(0, 0, [255, 0, 0, 255]);
    img.set_pixel(1, 0, [0x12, 0x34, 0x56, 255]);
    assert_eq!(img.to_rgb_u32(), vec![0x00ff_0000, 0x0012_3456]);
}
