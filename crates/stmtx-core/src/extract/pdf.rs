//! PDF page images, with pdfium when available and lopdf otherwise.
//!
//! With the `pdfium` feature and a system pdfium library every page is
//! rasterized. Without it, a page's largest embedded raster image stands in
//! for the page, pages without one contribute their text layer, and PDFs
//! without any raster content fall back to pdf-extract text.

use std::io::Cursor;

use base64::Engine;
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, trace, warn};

use super::{ExtractedContent, FileExtractor, Result, SourceFile};
use crate::error::ExtractError;
use crate::models::config::PdfConfig;
use crate::models::statement::PageImage;

/// Renders PDF pages to images.
pub struct PdfExtractor {
    config: PdfConfig,
}

/// A loaded document plus the bytes pdf-extract should read.
struct LoadedPdf {
    document: Document,
    raw_data: Vec<u8>,
}

impl PdfExtractor {
    pub fn new(config: PdfConfig) -> Self {
        Self { config }
    }

    fn load(&self, file: &SourceFile) -> Result<LoadedPdf> {
        let mut document = Document::load_mem(&file.bytes)
            .map_err(|e| ExtractError::library(&file.name, e))?;

        // Statements are often "encrypted" with an empty user password.
        let raw_data = if document.is_encrypted() {
            if document.decrypt("").is_err() {
                return Err(ExtractError::Encrypted(file.name.clone()));
            }
            debug!("Decrypted {} with empty password", file.name);

            let mut decrypted = Vec::new();
            document
                .save_to(&mut decrypted)
                .map_err(|e| ExtractError::library(&file.name, format!("failed to save decrypted PDF: {}", e)))?;
            decrypted
        } else {
            file.bytes.clone()
        };

        if document.get_pages().is_empty() {
            return Err(ExtractError::Empty(file.name.clone()));
        }

        Ok(LoadedPdf { document, raw_data })
    }

    /// Number of pages to process, honoring `max_pages`.
    fn page_limit(&self, page_count: usize, file_name: &str) -> usize {
        let limit = match self.config.max_pages {
            0 => page_count,
            n => n.min(page_count),
        };
        if limit < page_count {
            warn!("{} has {} pages, rendering the first {}", file_name, page_count, limit);
        }
        limit
    }

    /// Rasterize every page with pdfium. `None` when the library cannot be
    /// bound, so callers fall back to embedded page images.
    #[cfg(feature = "pdfium")]
    fn render_with_pdfium(&self, pdf: &LoadedPdf, file_name: &str) -> Result<Option<Vec<PageImage>>> {
        use pdfium_render::prelude::*;

        let bindings = match Pdfium::bind_to_system_library() {
            Ok(bindings) => bindings,
            Err(e) => {
                warn!("pdfium not available ({:?}), using embedded page images", e);
                return Ok(None);
            }
        };
        let pdfium = Pdfium::new(bindings);
        let document = pdfium
            .load_pdf_from_byte_slice(&pdf.raw_data, None)
            .map_err(|e| ExtractError::library(file_name, format!("{:?}", e)))?;

        let max_dimension = self.config.max_image_dimension.min(i32::MAX as u32) as i32;
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.config.render_scale.max(0.1))
            .set_maximum_width(max_dimension)
            .set_maximum_height(max_dimension);

        let pages = document.pages();
        let limit = self.page_limit(pages.len() as usize, file_name);

        let mut images = Vec::with_capacity(limit);
        for (index, page) in pages.iter().take(limit).enumerate() {
            let page_num = index as u32 + 1;
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| ExtractError::library(file_name, format!("page {}: {:?}", page_num, e)))?;
            images.push(encode_page(&bitmap.as_image(), file_name, page_num)?);
        }

        Ok(Some(images))
    }

    /// Walk pages without a rasterizer: pages with a scanned image become
    /// page images, every other page contributes its text layer.
    fn scan_pages(&self, pdf: &LoadedPdf, file_name: &str) -> Result<ScannedPages> {
        let pages = pdf.document.get_pages();
        let limit = self.page_limit(pages.len(), file_name);

        let mut scanned = ScannedPages::default();
        for (&page_num, &page_id) in pages.iter().take(limit) {
            if let Some(page_image) = self.page_image(&pdf.document, page_id) {
                let scaled = self.scale(page_image);
                trace!("Page {} rendered at {}x{}", page_num, scaled.width(), scaled.height());
                scanned.images.push(encode_page(&scaled, file_name, page_num)?);
                continue;
            }

            match page_text(&pdf.document, page_num) {
                Some(text) => {
                    debug!("Page {} of {} has no raster content, keeping its text", page_num, file_name);
                    scanned.text_pages.push(text);
                }
                None => warn!("Page {} of {} has neither raster content nor text", page_num, file_name),
            }
        }

        Ok(scanned)
    }

    /// The largest raster image placed on a page.
    fn page_image(&self, doc: &Document, page_id: ObjectId) -> Option<DynamicImage> {
        let resources = get_page_resources(doc, page_id)?;
        let xobjects = resources.get(b"XObject").ok()?;
        let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) else {
            return None;
        };

        xobj_dict
            .iter()
            .filter_map(|(_name, obj_ref)| doc.dereference(obj_ref).ok())
            .filter_map(|(_, obj)| try_extract_image_from_object(doc, obj))
            .max_by_key(|img| u64::from(img.width()) * u64::from(img.height()))
    }

    /// Apply the render scale, keeping the longest side within bounds.
    fn scale(&self, img: DynamicImage) -> DynamicImage {
        let (width, height) = (img.width(), img.height());
        let longest = width.max(height).max(1) as f32;

        let factor = self
            .config
            .render_scale
            .max(0.1)
            .min(self.config.max_image_dimension as f32 / longest);

        if (factor - 1.0).abs() < f32::EPSILON {
            return img;
        }

        let new_width = ((width as f32 * factor).round() as u32).max(1);
        let new_height = ((height as f32 * factor).round() as u32).max(1);
        img.resize(new_width, new_height, FilterType::Lanczos3)
    }

    fn extract_text(&self, pdf: &LoadedPdf, file_name: &str) -> Result<String> {
        // pdf-extract can panic on malformed fonts.
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(&pdf.raw_data)
        })) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(ExtractError::library(file_name, e)),
            Err(_) => Err(ExtractError::library(
                file_name,
                "text extraction panicked, the PDF likely contains malformed fonts",
            )),
        }
    }
}

impl FileExtractor for PdfExtractor {
    fn extract(&self, file: &SourceFile) -> Result<ExtractedContent> {
        let pdf = self.load(file)?;

        #[cfg(feature = "pdfium")]
        {
            if let Some(images) = self.render_with_pdfium(&pdf, &file.name)? {
                debug!("Rendered {} page(s) of {} with pdfium", images.len(), file.name);
                return Ok(ExtractedContent::from_images(images));
            }
        }

        let scanned = self.scan_pages(&pdf, &file.name)?;

        if scanned.images.is_empty() {
            debug!("{} has no raster pages, using its text layer", file.name);
            // Per-page text stands in when pdf-extract fails or finds nothing.
            let text = match self.extract_text(&pdf, &file.name) {
                Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
                _ if !scanned.text_pages.is_empty() => scanned.text_pages.join("\n\n"),
                Ok(_) => return Err(ExtractError::library(&file.name, "no page images or text found")),
                Err(e) => return Err(e),
            };
            return Ok(ExtractedContent::from_text(text));
        }

        debug!(
            "{}: {} scanned page(s), {} text page(s)",
            file.name,
            scanned.images.len(),
            scanned.text_pages.len()
        );
        Ok(ExtractedContent {
            text: (!scanned.text_pages.is_empty()).then(|| scanned.text_pages.join("\n\n")),
            images: scanned.images,
        })
    }
}

/// Per-page results of a walk without a rasterizer.
#[derive(Default)]
struct ScannedPages {
    images: Vec<PageImage>,
    text_pages: Vec<String>,
}

/// Encode a page as a base64 PNG.
fn encode_page(image: &DynamicImage, file_name: &str, page_num: u32) -> Result<PageImage> {
    let mut data = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
        .map_err(|e| ExtractError::library(file_name, format!("page {}: {}", page_num, e)))?;

    Ok(PageImage {
        mime_type: "image/png".to_string(),
        data: base64::engine::general_purpose::STANDARD.encode(&data),
    })
}

/// Text layer of one page, if it has any.
fn page_text(doc: &Document, page_num: u32) -> Option<String> {
    let text = doc.extract_text(&[page_num]).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn try_extract_image_from_object(doc: &Document, obj: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = obj else {
        return None;
    };
    let dict = &stream.dict;

    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
    let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
    trace!("Found image object: {}x{}", width, height);

    if let Ok(filter) = dict.get(b"Filter") {
        let filter_name = match filter {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.last().and_then(|o| o.as_name().ok()),
            _ => None,
        };

        match filter_name {
            Some(b"DCTDecode") => {
                return image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg).ok();
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("Unsupported image filter {:?}", filter_name.map(String::from_utf8_lossy));
                return None;
            }
            _ => {}
        }
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8) as u8;

    image_from_raw(&data, width, height, color_space, bits)
}

fn image_from_raw(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: &[u8],
    bits_per_component: u8,
) -> Option<DynamicImage> {
    if bits_per_component != 8 {
        trace!("Unsupported bits per component: {}", bits_per_component);
        return None;
    }

    let pixels = (width as usize) * (height as usize);
    let channels = match color_space {
        b"DeviceRGB" | b"RGB" => 3,
        b"DeviceGray" | b"G" => 1,
        _ => return None,
    };
    if data.len() < pixels * channels {
        trace!("Short image data: {} < {}", data.len(), pixels * channels);
        return None;
    }

    let mut rgba = Vec::with_capacity(pixels * 4);
    for px in data[..pixels * channels].chunks(channels) {
        match px {
            [r, g, b] => rgba.extend_from_slice(&[*r, *g, *b, 255]),
            [gray] => rgba.extend_from_slice(&[*gray, *gray, *gray, 255]),
            _ => return None,
        }
    }

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}

/// Page resources, following `/Parent` inheritance.
fn get_page_resources(doc: &Document, node_id: ObjectId) -> Option<lopdf::Dictionary> {
    let Ok(Object::Dictionary(dict)) = doc.get_object(node_id) else {
        return None;
    };

    if let Ok(resources) = dict.get(b"Resources") {
        if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
            return Some(res_dict.clone());
        }
    }

    match dict.get(b"Parent") {
        Ok(Object::Reference(parent_id)) => get_page_resources(doc, *parent_id),
        _ => None,
    }
}
