//! Decoders turning encoded bytes into RGB pixels.

use crate::error::{ErrorKind, Result};
use crate::{ImageDecoder, PixelBuffer, RawDecoder};
use exn::ResultExt;

/// Decodes whatever the `image` crate recognises from its magic bytes: PNG,
/// TIFF, WebP, BMP, GIF, JPEG and friends. Alpha is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDecoder;

impl ImageDecoder for StandardDecoder {
    fn decode(&self, data: &[u8]) -> Result<PixelBuffer> {
        let decoded = image::load_from_memory(data).or_raise(|| ErrorKind::Decode("image"))?;
        Ok(decoded.to_rgb8())
    }
}

/// Develops camera RAW files (DNG, NEF, CR2, ARW, RW2, ...) with default
/// settings: demosaic, white balance, sRGB gamma, 8 bits per channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct CameraRawDecoder;

#[cfg(feature = "raw")]
impl RawDecoder for CameraRawDecoder {
    fn decode(&self, data: &[u8]) -> Result<PixelBuffer> {
        let raw = rawloader::decode(&mut std::io::Cursor::new(data)).map_err(|e| {
            tracing::debug!(error = ?e, "RAW container rejected");
            ErrorKind::Decode("RAW")
        })?;
        tracing::trace!(make = %raw.clean_make, model = %raw.clean_model, "Developing RAW image");
        let mut pipeline = imagepipe::Pipeline::new_from_source(imagepipe::ImageSource::Raw(raw)).map_err(|e| {
            tracing::debug!(error = %e, "RAW pipeline setup failed");
            ErrorKind::Decode("RAW")
        })?;
        let developed = pipeline.output_8bit(None).map_err(|e| {
            tracing::debug!(error = %e, "RAW development failed");
            ErrorKind::Decode("RAW")
        })?;
        let (width, height) = (developed.width as u32, developed.height as u32);
        Ok(PixelBuffer::from_raw(width, height, developed.data).ok_or(ErrorKind::Decode("RAW"))?)
    }
}

#[cfg(not(feature = "raw"))]
impl RawDecoder for CameraRawDecoder {
    fn decode(&self, _data: &[u8]) -> Result<PixelBuffer> {
        exn::bail!(ErrorKind::Disabled("RAW"))
    }
}
