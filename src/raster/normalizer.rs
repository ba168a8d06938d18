// Image normalization: any supported raster payload -> RGBA8 PNG bytes.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};

use crate::error::PdfStampError;
use crate::overlay::ImagePayload;

/// 埋め込み可能な正規化済み画像（常にRGBA8のPNG）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// ペイロードをデコードし、RGBA8のPNGとして再エンコードする。
///
/// ピクセル寸法とアルファチャンネルは保持される。
/// 空のペイロード、壊れたデータ、未対応の形式は `ImageDecodeError` になる。
pub fn normalize(payload: &ImagePayload) -> crate::error::Result<NormalizedImage> {
    let encoded = payload.encoded_bytes()?;
    normalize_bytes(&encoded)
}

/// Same as [`normalize`], for bytes already unpacked from their payload.
pub fn normalize_bytes(encoded: &[u8]) -> crate::error::Result<NormalizedImage> {
    if encoded.is_empty() {
        return Err(PdfStampError::image_decode("image payload is empty"));
    }

    let decoded = decode(encoded)?;
    let (width, height) = (decoded.width(), decoded.height());
    if width == 0 || height == 0 {
        return Err(PdfStampError::image_decode(format!(
            "image has zero extent ({width}x{height})"
        )));
    }

    let rgba = DynamicImage::ImageRgba8(decoded.to_rgba8());
    let mut buf = Cursor::new(Vec::new());
    rgba.write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| PdfStampError::image_decode(format!("PNG encode error: {e}")))?;

    Ok(NormalizedImage {
        png: buf.into_inner(),
        width,
        height,
    })
}

fn decode(data: &[u8]) -> crate::error::Result<DynamicImage> {
    let reader = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| PdfStampError::image_decode(format!("cannot sniff image format: {e}")))?;
    if reader.format().is_none() {
        return Err(PdfStampError::image_decode("unrecognized image format"));
    }
    Ok(reader.decode()?)
}
