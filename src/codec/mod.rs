//! Image codec capability.
//!
//! Abstracts decode/encode behind a trait so the pipeline logic runs
//! unchanged regardless of what backs the codec (a native image library
//! here, but the same seam fits a platform canvas or a server-side codec
//! binding). The shipped implementation decodes whatever
//! [`image::load_from_memory`] can sniff (PNG, JPEG, BMP, TIFF, GIF, ...)
//! and encodes lossy WebP at a fixed quality.

use async_trait::async_trait;
use bytes::Bytes;
use image::DynamicImage;

use crate::error::{Error, Result};

/// Fixed lossy quality for WebP output: 0.85 of the codec's 0-100 range.
/// Not user-configurable.
pub const WEBP_QUALITY: f32 = 85.0;

/// Decodes raw image bytes into a raster surface and re-encodes a raster
/// surface into target-codec bytes at a fixed quality.
#[async_trait]
pub trait ImageCodec: Send + Sync {
    /// Decode raw image bytes into a raster surface.
    ///
    /// Malformed or non-image input must fail with [`Error::Decode`]
    /// rather than producing a partial surface.
    async fn decode(&self, bytes: &[u8]) -> Result<DynamicImage>;

    /// Encode a raster surface into target-codec bytes.
    ///
    /// A refusal to produce output, including empty output, surfaces as
    /// [`Error::Encode`] instead of returning silently.
    async fn encode(&self, surface: &DynamicImage) -> Result<Bytes>;

    /// File extension of the target codec, without the leading dot.
    fn extension(&self) -> &'static str;
}

/// WebP codec backed by the `image` (decode) and `webp` (encode) crates.
///
/// Both stages are CPU-bound, so they run on the blocking pool; the caller
/// only awaits their completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebpCodec;

#[async_trait]
impl ImageCodec for WebpCodec {
    async fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        let bytes = bytes.to_vec();
        tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes).map_err(|e| Error::Decode(e.to_string()))
        })
        .await
        .map_err(|e| Error::Decode(e.to_string()))?
    }

    async fn encode(&self, surface: &DynamicImage) -> Result<Bytes> {
        let rgba = surface.to_rgba8();
        let (width, height) = rgba.dimensions();

        let encoded = tokio::task::spawn_blocking(move || {
            webp::Encoder::from_rgba(rgba.as_raw(), width, height)
                .encode(WEBP_QUALITY)
                .to_vec()
        })
        .await
        .map_err(|e| Error::Encode(e.to_string()))?;

        if encoded.is_empty() {
            return Err(Error::encode("codec produced no output"));
        }

        Ok(Bytes::from(encoded))
    }

    fn extension(&self) -> &'static str {
        "webp"
    }
}
