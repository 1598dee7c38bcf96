//! Image conversion to JPEG.
//!
//! Conversion happens in two steps: decode the source bytes into an 8-bit
//! RGB [`PixelBuffer`], then encode that buffer as JPEG. Each step sits
//! behind a trait so callers (and tests) can swap implementations:
//!
//! - [`RawDecoder`] for camera RAW files, backed by `rawloader` and
//!   `imagepipe` when the `raw` feature is enabled
//! - [`ImageDecoder`] for everything else, backed by the `image` crate
//! - [`JpegEncoder`], backed by the `image` crate
//!
//! [`Transforms`] bundles one of each. Decoding a 24 MP RAW file takes a
//! while, so async callers should use [`Transforms::to_jpeg_blocking`].
//!
//! # Examples
//!
//! ```
//! use mediamig_convert::{SourceFormat, Transforms};
//! use std::io::Cursor;
//!
//! let mut png = Vec::new();
//! image::RgbImage::new(4, 4).write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png).unwrap();
//! let jpeg = Transforms::default().to_jpeg(SourceFormat::Generic, &png, 90).unwrap();
//! assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
//! ```

mod decode;
mod encode;
pub mod error;

pub use crate::decode::{CameraRawDecoder, StandardDecoder};
pub use crate::encode::StandardEncoder;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::sync::Arc;

/// Decoded 8-bit RGB pixels.
pub type PixelBuffer = image::RgbImage;

/// Which decoder a source file needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    /// Camera RAW (DNG, NEF, CR2, ARW, RW2).
    Raw,
    /// Any other raster format the generic decoder understands.
    Generic,
}

pub trait RawDecoder: Send + Sync {
    /// Returns [`Decode`](ErrorKind::Decode) for corrupt or unsupported input.
    fn decode(&self, data: &[u8]) -> Result<PixelBuffer>;
}

pub trait ImageDecoder: Send + Sync {
    /// Returns [`Decode`](ErrorKind::Decode) for corrupt or unsupported input.
    fn decode(&self, data: &[u8]) -> Result<PixelBuffer>;
}

pub trait JpegEncoder: Send + Sync {
    /// `quality` is clamped to `1..=100`.
    fn encode(&self, pixels: &PixelBuffer, quality: u8) -> Result<Vec<u8>>;
}

/// One decoder per [`SourceFormat`] plus the JPEG encoder.
///
/// Cheap to clone; all parts are shared.
#[derive(Clone)]
pub struct Transforms {
    raw: Arc<dyn RawDecoder>,
    image: Arc<dyn ImageDecoder>,
    jpeg: Arc<dyn JpegEncoder>,
}
impl Default for Transforms {
    fn default() -> Self {
        Self::new(Arc::new(CameraRawDecoder), Arc::new(StandardDecoder), Arc::new(StandardEncoder))
    }
}
impl Transforms {
    pub fn new(raw: Arc<dyn RawDecoder>, image: Arc<dyn ImageDecoder>, jpeg: Arc<dyn JpegEncoder>) -> Self {
        Self { raw, image, jpeg }
    }

    /// Decode `data` and re-encode it as JPEG, on the current thread.
    pub fn to_jpeg(&self, format: SourceFormat, data: &[u8], quality: u8) -> Result<Vec<u8>> {
        let pixels = match format {
            SourceFormat::Raw => self.raw.decode(data)?,
            SourceFormat::Generic => self.image.decode(data)?,
        };
        let jpeg = self.jpeg.encode(&pixels, quality)?;
        tracing::trace!(
            ?format,
            width = pixels.width(),
            height = pixels.height(),
            input_size = data.len(),
            output_size = jpeg.len(),
            "Converted to JPEG"
        );
        Ok(jpeg)
    }

    /// Same as [`to_jpeg`](Self::to_jpeg), but on Tokio's blocking pool so
    /// the async workers stay responsive.
    pub async fn to_jpeg_blocking(&self, format: SourceFormat, data: Vec<u8>, quality: u8) -> Result<Vec<u8>> {
        let transforms = self.clone();
        tokio::task::spawn_blocking(move || transforms.to_jpeg(format, &data, quality))
            .await
            .or_raise(|| ErrorKind::Task)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut png = Vec::new();
        PixelBuffer::from_pixel(width, height, Rgb([200, 100, 50]))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        png
    }

    /// Pretends every input is a 2x2 RAW file and counts calls.
    #[derive(Default)]
    struct FakeRaw(AtomicUsize);
    impl RawDecoder for FakeRaw {
        fn decode(&self, _data: &[u8]) -> Result<PixelBuffer> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(PixelBuffer::new(2, 2))
        }
    }

    #[test]
    fn test_generic_to_jpeg() {
        let jpeg = Transforms::default().to_jpeg(SourceFormat::Generic, &png(8, 8), 90).unwrap();
        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
    }

    #[test]
    fn test_format_selects_decoder() {
        let raw = Arc::new(FakeRaw::default());
        let transforms = Transforms::new(raw.clone(), Arc::new(StandardDecoder), Arc::new(StandardEncoder));
        transforms.to_jpeg(SourceFormat::Raw, b"not even close", 90).unwrap();
        assert_eq!(raw.0.load(Ordering::SeqCst), 1);
        // The generic decoder must not be fooled into accepting RAW bytes.
        assert!(transforms.to_jpeg(SourceFormat::Generic, b"not even close", 90).is_err());
        assert_eq!(raw.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decode_error_propagates() {
        let err = Transforms::default().to_jpeg(SourceFormat::Generic, b"\x89PNG truncated", 90).unwrap_err();
        assert_eq!(*err, ErrorKind::Decode("image"));
    }

    #[tokio::test]
    async fn test_blocking_variant() {
        let jpeg = Transforms::default().to_jpeg_blocking(SourceFormat::Generic, png(4, 4), 75).await.unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }
}
