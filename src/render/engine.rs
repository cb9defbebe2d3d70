//! MuPDF-backed decoder

use mupdf::{Colorspace, Document, Matrix, Pixmap};

use super::decoder::{
    CancelToken, DecodeError, DecodedDocument, DocumentDecoder, RenderError, Rasterized,
};
use super::types::{Raster, Viewport};

const PDF_MAGIC: &str = "application/pdf";

impl From<mupdf::error::Error> for DecodeError {
    fn from(e: mupdf::error::Error) -> Self {
        Self::engine(e.to_string())
    }
}

impl From<mupdf::error::Error> for RenderError {
    fn from(e: mupdf::error::Error) -> Self {
        Self::engine(e.to_string())
    }
}

/// Decodes PDF bytes with MuPDF
#[derive(Clone, Copy, Debug, Default)]
pub struct MupdfDecoder;

impl DocumentDecoder for MupdfDecoder {
    fn decode(&self, bytes: Vec<u8>) -> Result<Box<dyn DecodedDocument>, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let doc = Document::from_bytes(&bytes, PDF_MAGIC)?;
        let page_count = usize::try_from(doc.page_count()?).unwrap_or(0);
        if page_count == 0 {
            return Err(DecodeError::NoPages);
        }

        Ok(Box::new(MupdfDocument { doc, page_count }))
    }
}

struct MupdfDocument {
    doc: Document,
    page_count: usize,
}

impl MupdfDocument {
    fn load(&self, page: usize) -> Result<mupdf::Page, RenderError> {
        if page == 0 || page > self.page_count {
            return Err(RenderError::PageOutOfRange {
                page,
                page_count: self.page_count,
            });
        }
        Ok(self.doc.load_page((page - 1) as i32)?)
    }
}

impl DecodedDocument for MupdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_size(&self, page: usize) -> Result<(f32, f32), RenderError> {
        let bounds = self.load(page)?.bounds()?;
        Ok((bounds.x1 - bounds.x0, bounds.y1 - bounds.y0))
    }

    fn rasterize(
        &self,
        page: usize,
        viewport: &Viewport,
        cancel: &CancelToken,
    ) -> Result<Rasterized, RenderError> {
        if cancel.is_cancelled() {
            return Ok(Rasterized::Cancelled);
        }

        let page = self.load(page)?;
        let transform = Matrix::new_scale(viewport.scale, viewport.scale);
        let pixmap = page.to_pixmap(&transform, &Colorspace::device_rgb(), false, false)?;

        if cancel.is_cancelled() {
            return Ok(Rasterized::Cancelled);
        }

        Ok(Rasterized::Done(pixmap_to_raster(&pixmap)?))
    }
}

fn pixmap_to_raster(pixmap: &Pixmap) -> Result<Raster, RenderError> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(RenderError::engine(format!(
            "Unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err(RenderError::engine("Pixmap buffer size mismatch"));
    }

    let mut pixels = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row = &samples[y * stride..y * stride + row_bytes];
        if n == 3 {
            pixels.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                pixels.extend_from_slice(&px[..3]);
            }
        }
    }

    Ok(Raster {
        pixels,
        width: width as u32,
        height: height as u32,
    })
}
