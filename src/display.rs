// display.rs — presenting a finished image.
//
// The pipeline hands over a complete RGBA buffer and is done with it;
// presenting is the caller's business. Two presenters:
//
//   WindowPresenter  minifb window, blocks until Escape or window close.
//   PngPresenter     writes a PNG, for headless machines and scripts.

use std::path::PathBuf;
use std::time::Duration;

use minifb::{Key, Window, WindowOptions};

use crate::image::RgbaImage;

/// Exit code for a failed presentation.
pub const PRESENT_EXIT_CODE: i32 = 9;

#[derive(Debug, thiserror::Error)]
pub enum PresentError {
    #[error("window: {0}")]
    Window(#[from] minifb::Error),

    #[error("writing {path}: {source}")]
    Png {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Something that can show or store a finished image.
pub trait Present {
    fn present(&mut self, image: &RgbaImage) -> Result<(), PresentError>;
}

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

pub struct WindowPresenter {
    title: String,
}

impl WindowPresenter {
    pub fn new(title: impl Into<String>) -> Self {
        WindowPresenter { title: title.into() }
    }
}

impl Present for WindowPresenter {
    fn present(&mut self, image: &RgbaImage) -> Result<(), PresentError> {
        let (w, h) = (image.width(), image.height());
        // minifb wants 0RGB u32; alpha is dropped (always opaque here).
        let fb = image.to_rgb_u32();

        let mut window = Window::new(
            &format!("{} (Esc to quit)", self.title),
            w,
            h,
            WindowOptions { resize: false, ..WindowOptions::default() },
        )?;
        window.set_target_fps(60);

        log::info!("presenting {w}×{h} in a window");
        while window.is_open() && !window.is_key_down(Key::Escape) {
            window.update_with_buffer(&fb, w, h)?;
        }
        // Let the window system process the close before returning.
        std::thread::sleep(Duration::from_millis(10));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PNG
// ---------------------------------------------------------------------------

pub struct PngPresenter {
    path: PathBuf,
}

impl PngPresenter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PngPresenter { path: path.into() }
    }
}

impl Present for PngPresenter {
    fn present(&mut self, image: &RgbaImage) -> Result<(), PresentError> {
        image::save_buffer_with_format(
            &self.path,
            image.as_bytes(),
            image.width() as u32,
            image.height() as u32,
            image::ExtendedColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|source| PresentError::Png { path: self.path.clone(), source })?;
        log::info!("wrote {}×{} PNG to {}", image.width(), image.height(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_presenter_writes_readable_file() {
        let mut img = RgbaImage::new(3, 2);
        img.set_pixel(1, 1, [255, 0, 0, 255]);
        let path = std::env::temp_dir().join(format!("gridcast-test-{}.png", std::process::id()));

        PngPresenter::new(&path).present(&img).unwrap();
        let back = image::open(&path).unwrap().to_rgba8();
        std::fs::remove_file(&path).ok();

        assert_eq!(back.dimensions(), (3, 2));
        assert_eq!(back.get_pixel(1, 1).0, [255, 0, 0, 255]);
        assert_eq!(back.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_png_presenter_reports_bad_path() {
        let img = RgbaImage::new(1, 1);
        let err = PngPresenter::new("/nonexistent-dir/x/out.png").present(&img).err().unwrap();
        assert!(matches!(err, PresentError::Png { .. }));
    }
}
