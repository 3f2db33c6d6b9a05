// image.rs — host-side RGBA8 image buffer.
//
// The device writes one u32 per pixel, packed little-endian as
// r | g << 8 | b << 16 | a << 24. Viewed as bytes on the host that is
// exactly r, g, b, a, so a download lands directly in `data` without any
// repacking.
//
// Memory layout (width = 3):
//
//   byte index:  0 1 2 3   4 5 6 7   8 9 10 11   12 ...
//   channel:     r g b a   r g b a   r g b  a    r  ...
//   pixel:       |(0,0) |  |(1,0) |  |(2,0)  |   |(0,1) ...
//
// Pixel (x, y) starts at byte (x + y·width)·4. No stride padding: wgpu
// storage buffers have no row-alignment requirement, unlike textures.

use std::fmt;

/// One RGBA8 pixel.
pub type Rgba = [u8; 4];

/// Opaque black, the background of every payload.
pub const BLACK: Rgba = [0, 0, 0, 255];

/// A `width × height` RGBA8 image in row-major order.
#[derive(Clone, PartialEq, Eq)]
pub struct RgbaImage {
    /// Length = width * height * 4.
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl RgbaImage {
    /// Create an all-zero image (every channel 0, alpha included).
    pub fn new(width: usize, height: usize) -> Self {
        RgbaImage { data: vec![0; width * height * 4], width, height }
    }

    /// Create an image from raw RGBA bytes.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height * 4`.
    pub fn from_vec(width: usize, height: usize, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            width * height * 4,
            "data length ({}) must equal width * height * 4 ({})",
            data.len(),
            width * height * 4,
        );
        RgbaImage { data, width, height }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Size of the pixel buffer in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn offset(&self, x: usize, y: usize) -> usize {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) out of bounds for {}×{}",
            self.width,
            self.height
        );
        (x + y * self.width) * 4
    }

    /// The pixel at (x, y). x is column, y is row.
    ///
    /// # Panics
    /// Panics if (x, y) is out of bounds.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Rgba {
        let i = self.offset(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, value: Rgba) {
        let i = self.offset(x, y);
        self.data[i..i + 4].copy_from_slice(&value);
    }

    /// Iterate over `(x, y, pixel)` in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize, Rgba)> + '_ {
        let w = self.width.max(1);
        self.data
            .chunks_exact(4)
            .enumerate()
            .map(move |(i, p)| (i % w, i / w, [p[0], p[1], p[2], p[3]]))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable byte view, the target of a device download.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Pixels as `0x00RRGGBB` words, the framebuffer format of `minifb`.
    pub fn to_rgb_u32(&self) -> Vec<u32> {
        self.data
            .chunks_exact(4)
            .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32)
            .collect()
    }
}

impl fmt::Debug for RgbaImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RgbaImage {{ {}×{} }}", self.width, self.height)?;
        for y in 0..self.height.min(4) {
            write!(f, "  row {y}: [")?;
            for x in 0..self.width.min(4) {
                if x > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:?}", self.pixel(x, y))?;
            }
            if self.width > 4 {
                write!(f, ", ...")?;
            }
            writeln!(f, "]")?;
        }
        if self.height > 4 {
            writeln!(f, "  ...")?;
        }
        Ok(())
    }
}
