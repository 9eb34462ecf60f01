use std::path::PathBuf;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use image::imageops::{self, FilterType};
use image::RgbaImage;

use super::{Viewport, ViewportError};

// ── BackgroundBuffer ────────────────────────────────────────────────────────

/// Raw RGBA8 pixels covering exactly one viewport rectangle.
///
/// Handed to the engine by value; the session keeps no copy.
#[derive(Clone, PartialEq, Eq)]
pub struct BackgroundBuffer {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

impl BackgroundBuffer {
    /// Number of pixels (not bytes).
    pub fn sample_count(&self) -> usize {
        self.pixels.len() / 4
    }

    /// RGBA value at `(x, y)`, or `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels.get(i..i + 4).map(|p| [p[0], p[1], p[2], p[3]])
    }
}

impl std::fmt::Debug for BackgroundBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Width of the reference image once scaled to `viewport_height`, keeping
/// its aspect ratio. Never less than one pixel.
pub fn scaled_width(image_width: u32, image_height: u32, viewport_height: u32) -> u32 {
    if image_height == 0 {
        return 0;
    }
    let w = image_width as f64 * (viewport_height as f64 / image_height as f64);
    (w.round() as u32).max(1)
}

/// Source columns that end up inside a viewport once the image is scaled to
/// its height. Never more than the image has.
pub fn visible_columns(image_width: u32, image_height: u32, viewport: Viewport) -> u32 {
    if viewport.height == 0 {
        return 0;
    }
    let needed = (viewport.width as u64 * image_height as u64).div_ceil(viewport.height as u64);
    needed.min(image_width as u64) as u32
}

/// Rasterizes `image` into a buffer the size of `viewport`.
///
/// The image is scaled so its height matches the viewport height, anchored at
/// the origin, and cropped to the viewport. Columns the scaled image does not
/// reach stay fully transparent. Scaling is nearest-neighbour because the
/// viewport never smooths.
///
/// Only the source columns the viewport can show are scaled, so a very wide
/// image costs no more than the viewport it fills.
pub fn sync_background(viewport: Viewport, image: &RgbaImage) -> Result<BackgroundBuffer, ViewportError> {
    let (iw, ih) = image.dimensions();
    if iw == 0 || ih == 0 {
        return Err(ViewportError::EmptyImage);
    }

    let mut canvas = RgbaImage::new(viewport.width, viewport.height);
    let columns = visible_columns(iw, ih, viewport);
    if columns > 0 && viewport.width > 0 {
        let slice = imageops::crop_imm(image, 0, 0, columns, ih);
        let sw = scaled_width(columns, ih, viewport.height);
        let filter = if viewport.smoothing { FilterType::Triangle } else { FilterType::Nearest };
        let scaled = imageops::resize(&*slice, sw, viewport.height, filter);
        imageops::replace(&mut canvas, &scaled, 0, 0);
    }

    Ok(BackgroundBuffer {
        width: viewport.width,
        height: viewport.height,
        pixels: canvas.into_raw(),
    })
}

// ── BackgroundSource ────────────────────────────────────────────────────────

/// Asynchronous provider of the decoded reference image.
///
/// `load` may fetch and decode; the viewport sequencer awaits it before the
/// buffer is built, so the engine never sees a buffer older than the viewport
/// it is resized to.
pub trait BackgroundSource {
    fn load(&self) -> LocalBoxFuture<'static, Result<Rc<RgbaImage>, ViewportError>>;
}

/// Reference image from encoded bytes, a file, or pixels decoded up front.
#[derive(Clone)]
pub enum ImageBackground {
    Encoded(Rc<[u8]>),
    File(PathBuf),
    Decoded(Rc<RgbaImage>),
}

impl ImageBackground {
    pub fn from_memory(bytes: impl Into<Rc<[u8]>>) -> Self {
        Self::Encoded(bytes.into())
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self::Decoded(Rc::new(image))
    }
}

fn decode(bytes: &[u8]) -> Result<Rc<RgbaImage>, ViewportError> {
    image::load_from_memory(bytes)
        .map(|img| Rc::new(img.to_rgba8()))
        .map_err(|e| ViewportError::Decode(e.to_string()))
}

impl BackgroundSource for ImageBackground {
    fn load(&self) -> LocalBoxFuture<'static, Result<Rc<RgbaImage>, ViewportError>> {
        let source = self.clone();
        async move {
            match source {
                ImageBackground::Encoded(bytes) => decode(&bytes),
                ImageBackground::File(path) => {
                    let bytes = std::fs::read(&path).map_err(|e| ViewportError::Asset {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                    decode(&bytes)
                }
                ImageBackground::Decoded(img) => Ok(img),
            }
        }
        .boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn scaled_width_keeps_aspect() {
        assert_eq!(scaled_width(200, 100, 50), 100);
        assert_eq!(scaled_width(300, 200, 100), 150);
        assert_eq!(scaled_width(1, 1000, 10), 1);
    }

    #[test]
    fn visible_columns_cover_the_viewport() {
        assert_eq!(visible_columns(8000, 100, Viewport::new(1000, 720)), 139);
        assert_eq!(visible_columns(50, 100, Viewport::new(1000, 720)), 50);
        assert_eq!(visible_columns(10, 10, Viewport::new(10, 0)), 0);
    }

    #[test]
    fn pixel_index_does_not_overflow_u32() {
        let buf = BackgroundBuffer { width: 70_000, height: 70_000, pixels: Vec::new() };
        assert_eq!(buf.pixel(69_999, 69_999), None);
    }

    #[test]
    fn decode_garbage_is_an_error() {
        assert!(matches!(decode(&[1, 2, 3]), Err(ViewportError::Decode(_))));
    }

    #[test]
    fn pixel_lookup_is_bounds_checked() {
        let vp = Viewport::new(2, 2);
        let img = RgbaImage::from_pixel(2, 2, Rgba([9, 8, 7, 255]));
        let buf = sync_background(vp, &img).unwrap();
        assert_eq!(buf.pixel(1, 1), Some([9, 8, 7, 255]));
        assert_eq!(buf.pixel(2, 0), None);
    }
}
