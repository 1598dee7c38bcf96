use crate::error::{ErrorKind, Result};
use crate::{JpegEncoder, PixelBuffer};
use exn::ResultExt;
use image::codecs::jpeg;

/// Baseline JPEG encoder from the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardEncoder;

impl JpegEncoder for StandardEncoder {
    fn encode(&self, pixels: &PixelBuffer, quality: u8) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        jpeg::JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100))
            .encode_image(pixels)
            .or_raise(|| ErrorKind::Encode)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn noise(size: u32) -> PixelBuffer {
        PixelBuffer::from_fn(size, size, |x, y| {
            let v = (x.wrapping_mul(7919) ^ y.wrapping_mul(104_729)) as u8;
            Rgb([v, v.wrapping_mul(3), v.wrapping_add(91)])
        })
    }

    #[test]
    fn test_encode_produces_jpeg() {
        let jpeg = StandardEncoder.encode(&noise(16), 90).unwrap();
        assert_eq!(&jpeg[..3], &[0xFF, 0xD8, 0xFF]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_quality_affects_size() {
        let pixels = noise(64);
        let low = StandardEncoder.encode(&pixels, 10).unwrap();
        let high = StandardEncoder.encode(&pixels, 95).unwrap();
        assert!(low.len() < high.len());
    }
}
