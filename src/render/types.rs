//! Core types for page rendering

use std::ops::Range;

use super::decoder::RenderError;

/// Scale used by inline previews
pub const DEFAULT_SCALE: f32 = 1.0;
/// Scale used by the high-fidelity preview panel
pub const HIGH_FIDELITY_SCALE: f32 = 1.5;
/// Smallest accepted render scale
pub const MIN_SCALE: f32 = 0.1;
/// Largest accepted render scale
pub const MAX_SCALE: f32 = 8.0;
/// Upper bound on surface area, in pixels
pub const MAX_SURFACE_PIXELS: u64 = 40_000_000;

const BLANK: u8 = 0xFF;

/// Clamp a caller-supplied scale into the usable range
#[must_use]
pub fn sanitize_scale(scale: f32) -> f32 {
    if scale.is_finite() {
        scale.clamp(MIN_SCALE, MAX_SCALE)
    } else {
        DEFAULT_SCALE
    }
}

/// Pixel geometry of a rendered page.
///
/// Recomputed on every render; overlay positions are derived from it and
/// never cached.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Page number (1-based)
    pub page: usize,
    /// Width in pixels
    pub width: f32,
    /// Height in pixels
    pub height: f32,
    /// Scale factor used for rendering
    pub scale: f32,
}

impl Viewport {
    /// Viewport of a page whose unscaled size is `page_size` points
    #[must_use]
    pub fn for_page(page: usize, page_size: (f32, f32), scale: f32) -> Self {
        Self {
            page,
            width: page_size.0 * scale,
            height: page_size.1 * scale,
            scale,
        }
    }

    /// Whole-pixel surface dimensions covering the viewport
    #[must_use]
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            self.width.ceil().max(1.0) as u32,
            self.height.ceil().max(1.0) as u32,
        )
    }

    /// Fail if the surface for this viewport would exceed the pixel budget
    pub fn check_budget(&self) -> Result<(), RenderError> {
        let (width, height) = self.pixel_size();
        check_pixel_budget(width, height).map(|_| ())
    }
}

/// Byte length of a `width` x `height` RGB buffer, if within budget
fn check_pixel_budget(width: u32, height: u32) -> Result<usize, RenderError> {
    let too_large = RenderError::SurfaceTooLarge { width, height };
    let pixels = u64::from(width) * u64::from(height);
    if pixels > MAX_SURFACE_PIXELS {
        return Err(too_large);
    }
    usize::try_from(pixels)
        .ok()
        .and_then(|p| p.checked_mul(3))
        .ok_or(too_large)
}

/// Raw rasterized page before it is drawn onto a surface.
///
/// RGB, 3 bytes per pixel, rows tightly packed.
#[derive(Clone)]
pub struct Raster {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Raster {
    #[must_use]
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        let row_bytes = self.width as usize * 3;
        let start = y as usize * row_bytes;
        self.pixels.get(start..start + row_bytes)
    }
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Drawable RGB target owned by a render session
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Resize to `width` x `height` and blank the contents. A size over the
    /// pixel budget leaves the surface untouched.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        let len = check_pixel_budget(width, height)?;
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(len, BLANK);
        Ok(())
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]])
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        self.pixels[i..i + 3].copy_from_slice(&rgb);
    }

    /// Copy `rows` of `raster` onto the surface, clipped to both extents
    pub fn blit_rows(&mut self, raster: &Raster, rows: Range<u32>) {
        let copy_width = self.width.min(raster.width) as usize * 3;
        let dst_row_bytes = self.width as usize * 3;

        for y in rows {
            if y >= self.height {
                break;
            }
            let Some(src) = raster.row(y) else {
                break;
            };
            let dst_start = y as usize * dst_row_bytes;
            self.pixels[dst_start..dst_start + copy_width].copy_from_slice(&src[..copy_width]);
        }
    }

    /// Convert into an encodable image
    #[must_use]
    pub fn to_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.pixels.clone())
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}
