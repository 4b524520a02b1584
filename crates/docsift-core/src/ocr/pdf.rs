//! PDF page access built on lopdf.
//!
//! The scanned-document corpora this pipeline targets store each page as an
//! embedded raster image; `page_image` pulls that image out of the page's
//! XObject resources and upscales it to the requested DPI when the embedded
//! scan is smaller.

use image::{DynamicImage, ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, trace};

use crate::error::PdfError;

/// An opened PDF document.
pub struct PdfDocument {
    document: Document,
}

impl PdfDocument {
    /// Parse a PDF from memory. Encrypted documents are tried with an empty
    /// password before giving up.
    pub fn load(data: &[u8]) -> Result<Self, PdfError> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");
        }

        if doc.get_pages().is_empty() {
            return Err(PdfError::NoPages);
        }

        Ok(Self { document: doc })
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Produce a raster image for a page (1-indexed) at roughly the given
    /// DPI. The embedded page scan is extracted and upscaled if it falls
    /// short of the target resolution.
    pub fn page_image(&self, page: u32, dpi: u32) -> Result<DynamicImage, PdfError> {
        let images = self.page_images(page)?;

        // The page scan is the largest image on the page.
        let scan = images
            .into_iter()
            .max_by_key(|img| (img.width() as u64) * (img.height() as u64))
            .ok_or(PdfError::PageRaster(page))?;

        Ok(self.scale_to_dpi(page, scan, dpi))
    }

    /// Upscale an extracted page image so its height matches the page's
    /// MediaBox height at the target DPI. Images already at or above the
    /// target are left alone.
    fn scale_to_dpi(&self, page: u32, image: DynamicImage, dpi: u32) -> DynamicImage {
        let Some(points_high) = self.media_box_height(page) else {
            return image;
        };

        let target_height = (points_high * dpi as f64 / 72.0).round() as u32;
        if target_height <= image.height() || image.height() == 0 {
            return image;
        }

        let scale = target_height as f64 / image.height() as f64;
        let target_width = (image.width() as f64 * scale).round() as u32;
        trace!(
            "Upscaling page {} scan {}x{} -> {}x{} for {} DPI",
            page,
            image.width(),
            image.height(),
            target_width,
            target_height,
            dpi
        );
        image.resize_exact(
            target_width,
            target_height,
            image::imageops::FilterType::Lanczos3,
        )
    }

    fn media_box_height(&self, page: u32) -> Option<f64> {
        let pages = self.document.get_pages();
        let page_id = pages.get(&page)?;
        let page_obj = self.document.get_object(*page_id).ok()?;
        let dict = page_obj.as_dict().ok()?;

        let media_box = match dict.get(b"MediaBox") {
            Ok(obj) => obj,
            // MediaBox may be inherited from the page tree.
            Err(_) => return None,
        };
        let media_box = match media_box {
            Object::Reference(r) => self.document.get_object(*r).ok()?,
            other => other,
        };
        let rect = media_box.as_array().ok()?;
        if rect.len() != 4 {
            return None;
        }
        let y0 = object_as_f64(&rect[1])?;
        let y1 = object_as_f64(&rect[3])?;
        Some((y1 - y0).abs())
    }

    /// All images embedded on a page, in resource order.
    fn page_images(&self, page: u32) -> Result<Vec<DynamicImage>, PdfError> {
        let pages = self.document.get_pages();
        let page_id = pages.get(&page).ok_or(PdfError::PageRaster(page))?;

        let mut images = Vec::new();

        if let Some(resources) = self.page_resources(*page_id) {
            if let Ok(xobjects) = resources.get(b"XObject") {
                if let Ok((_, Object::Dictionary(xobj_dict))) = self.document.dereference(xobjects)
                {
                    for (_name, obj_ref) in xobj_dict.iter() {
                        if let Ok((_, obj)) = self.document.dereference(obj_ref) {
                            if let Some(img) = self.decode_image_object(obj) {
                                images.push(img);
                            }
                        }
                    }
                }
            }
        }

        debug!("Extracted {} images from page {}", images.len(), page);
        Ok(images)
    }

    fn decode_image_object(&self, obj: &Object) -> Option<DynamicImage> {
        let Object::Stream(stream) = obj else {
            return None;
        };
        let dict = &stream.dict;

        let subtype = dict.get(b"Subtype").ok()?;
        if subtype.as_name().ok()? != b"Image" {
            return None;
        }

        let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
        let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
        trace!("Found image object: {}x{}", width, height);

        let data = match stream.decompressed_content() {
            Ok(d) => d,
            Err(_) => stream.content.clone(),
        };

        if let Ok(filter) = dict.get(b"Filter") {
            let filter_name = match filter {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) if !arr.is_empty() => {
                    arr.first().and_then(|o| o.as_name().ok())
                }
                _ => None,
            };

            match filter_name {
                Some(b"DCTDecode") => {
                    // JPEG stream: decode the raw (still-compressed) content.
                    return image::load_from_memory_with_format(
                        &stream.content,
                        image::ImageFormat::Jpeg,
                    )
                    .ok();
                }
                Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                    trace!("Unsupported image codec in PDF stream");
                    return None;
                }
                _ => {}
            }
        }

        let color_space = dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|o| match o {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                Object::Reference(r) => self
                    .document
                    .get_object(*r)
                    .ok()
                    .and_then(|o| o.as_name().ok()),
                _ => None,
            })
            .unwrap_or(b"DeviceRGB");

        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(8) as u8;

        decode_raw_image(&data, width, height, color_space, bits)
    }

    /// Resources dictionary for a page, following Parent links for
    /// inherited resources.
    fn page_resources(&self, page_id: ObjectId) -> Option<lopdf::Dictionary> {
        let mut node_id = page_id;
        loop {
            let node = self.document.get_object(node_id).ok()?;
            let dict = node.as_dict().ok()?;

            if let Ok(resources) = dict.get(b"Resources") {
                if let Ok((_, Object::Dictionary(res_dict))) = self.document.dereference(resources)
                {
                    return Some(res_dict.clone());
                }
            }

            match dict.get(b"Parent") {
                Ok(Object::Reference(parent_id)) => node_id = *parent_id,
                _ => return None,
            }
        }
    }
}

fn object_as_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn decode_raw_image(
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

    let expected_rgb = (width * height * 3) as usize;
    let expected_gray = (width * height) as usize;

    if color_space == b"DeviceRGB" || color_space == b"RGB" {
        if data.len() >= expected_rgb {
            let mut rgba_data = Vec::with_capacity((width * height * 4) as usize);
            for chunk in data[..expected_rgb].chunks(3) {
                rgba_data.extend_from_slice(chunk);
                rgba_data.push(255);
            }
            return ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba_data)
                .map(DynamicImage::ImageRgba8);
        }
    } else if color_space == b"DeviceGray" || color_space == b"G" {
        if data.len() >= expected_gray {
            let mut rgba_data = Vec::with_capacity((width * height * 4) as usize);
            for &gray in data[..expected_gray].iter() {
                rgba_data.extend_from_slice(&[gray, gray, gray, 255]);
            }
            return ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba_data)
                .map(DynamicImage::ImageRgba8);
        }
    }

    trace!(
        "Could not decode raw image: data_len={}, expected_rgb={}, expected_gray={}",
        data.len(),
        expected_rgb,
        expected_gray
    );
    None
}
