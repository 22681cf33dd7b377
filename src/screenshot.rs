use crate::blob::{screenshot_key, BlobStore};
use crate::error::{image_error, Result};
use crate::model::{FlowId, StepId, StepMeta};
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use sha2::{Digest, Sha256};
use std::io::Cursor;

/// Privileged viewport capture. Only the long-lived process has tab access,
/// so page agents reach this through the messaging transport.
pub trait CaptureBackend: Send + Sync + 'static {
    /// Returns the encoded pixel buffer of the tab's visible viewport.
    fn capture(&self, tab_id: crate::model::TabId) -> Result<Vec<u8>>;
}

/// Sizing and routing knobs for processed screenshots.
#[derive(Clone, Copy, Debug)]
pub struct ScreenshotConfig {
    /// Thumbnails are scaled down to at most this width.
    pub thumb_max_width: u32,
    /// JPEG quality for thumbnails.
    pub thumb_quality: u8,
    /// JPEG quality for the full-resolution image.
    pub full_quality: u8,
    /// Encoded full images at or above this size go to the blob store.
    pub inline_limit_kb: usize,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            thumb_max_width: 320,
            thumb_quality: 70,
            full_quality: 85,
            inline_limit_kb: 200,
        }
    }
}

/// Destination of the full-resolution image after routing.
#[derive(Clone, Debug, PartialEq)]
pub enum FullImage {
    /// Small enough to live inline with the step as a data URL.
    Inline(String),
    /// At or above the inline limit; the raw JPEG goes to the blob store.
    Oversize(Vec<u8>),
}

/// Result of running one raw capture through the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessedScreenshot {
    /// Thumbnail data URL, always stored inline with the step.
    pub thumb: String,
    pub full: FullImage,
    /// Hex SHA-256 of the encoded full-resolution JPEG.
    pub digest: String,
}

/// Turns raw viewport captures into a thumbnail plus a size-routed
/// full-resolution image.
///
/// Routing keeps small flows entirely in the fast key-value store and only
/// pays the blob-store cost for large images.
pub struct ScreenshotPipeline {
    config: ScreenshotConfig,
}

impl Default for ScreenshotPipeline {
    fn default() -> Self {
        Self::new(ScreenshotConfig::default())
    }
}

impl ScreenshotPipeline {
    pub fn new(config: ScreenshotConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScreenshotConfig {
        &self.config
    }

    /// Decodes a raw capture, derives the thumbnail, encodes the full image
    /// and decides its placement.
    pub fn process(&self, raw: &[u8]) -> Result<ProcessedScreenshot> {
        let img = image::load_from_memory(raw).map_err(image_error)?;

        let thumb_bytes = self.encode_thumbnail(&img)?;
        let full_bytes = encode_jpeg(&img, self.config.full_quality)?;
        let digest = hex::encode(Sha256::digest(&full_bytes));

        let full = if self.routes_inline(full_bytes.len()) {
            FullImage::Inline(data_url(&full_bytes))
        } else {
            FullImage::Oversize(full_bytes)
        };

        Ok(ProcessedScreenshot {
            thumb: data_url(&thumb_bytes),
            full,
            digest,
        })
    }

    /// Routing decision for an encoded full image of `encoded_len` bytes.
    pub fn routes_inline(&self, encoded_len: usize) -> bool {
        encoded_len < self.config.inline_limit_kb * 1024
    }

    fn encode_thumbnail(&self, img: &DynamicImage) -> Result<Vec<u8>> {
        let scaled = if img.width() > self.config.thumb_max_width {
            let height = (img.height() as u64 * self.config.thumb_max_width as u64
                / img.width() as u64)
                .max(1) as u32;
            img.resize_exact(self.config.thumb_max_width, height, FilterType::Triangle)
        } else {
            img.clone()
        };
        encode_jpeg(&scaled, self.config.thumb_quality)
    }
}

/// Writes a processed screenshot into step metadata, relocating an oversized
/// full image to the blob store under `{flow_id}_{step_id}`.
pub fn attach_to_meta(
    processed: ProcessedScreenshot,
    meta: &mut StepMeta,
    blobs: &dyn BlobStore,
    flow_id: &FlowId,
    step_id: &StepId,
) -> Result<()> {
    meta.screenshot_thumb = Some(processed.thumb);
    meta.screenshot_digest = Some(processed.digest);
    match processed.full {
        FullImage::Inline(reference) => {
            meta.screenshot_full = Some(reference);
            meta.screenshot_indexed_db = false;
        }
        FullImage::Oversize(bytes) => {
            blobs.put(&screenshot_key(flow_id, step_id), bytes)?;
            meta.screenshot_full = None;
            meta.screenshot_indexed_db = true;
        }
    }
    Ok(())
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    img.to_rgb8().write_with_encoder(encoder).map_err(image_error)?;
    Ok(buffer.into_inner())
}

/// Inline JPEG reference stored with a step.
pub fn data_url(bytes: &[u8]) -> String {
    format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_boundary_is_strict() {
        let pipeline = ScreenshotPipeline::default();
        assert!(pipeline.routes_inline(199 * 1024));
        assert!(!pipeline.routes_inline(200 * 1024));
        assert!(!pipeline.routes_inline(200 * 1024 + 1));
    }

    #[test]
    fn thumbnail_is_scaled_to_max_width() {
        let img = DynamicImage::new_rgb8(640, 480);
        let png = {
            let mut buffer = Cursor::new(Vec::new());
            img.write_to(&mut buffer, image::ImageFormat::Png)
                .expect("encode png");
            buffer.into_inner()
        };

        let processed = ScreenshotPipeline::default()
            .process(&png)
            .expect("process capture");
        let encoded = processed
            .thumb
            .strip_prefix("data:image/jpeg;base64,")
            .expect("data url prefix");
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .expect("valid base64");
        let thumb = image::load_from_memory(&bytes).expect("decode thumb");
        assert_eq!(thumb.width(), 320);
        assert_eq!(thumb.height(), 240);
        assert!(matches!(processed.full, FullImage::Inline(_)));
    }

    #[test]
    fn zero_limit_forces_blob_routing() {
        let img = DynamicImage::new_rgb8(32, 32);
        let png = {
            let mut buffer = Cursor::new(Vec::new());
            img.write_to(&mut buffer, image::ImageFormat::Png)
                .expect("encode png");
            buffer.into_inner()
        };

        let pipeline = ScreenshotPipeline::new(ScreenshotConfig {
            inline_limit_kb: 0,
            ..ScreenshotConfig::default()
        });
        let processed = pipeline.process(&png).expect("process capture");
        assert!(matches!(processed.full, FullImage::Oversize(_)));
    }
}
