// Overlay data model: signatures and stamps positioned on document pages.

pub mod store;

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, FixedOffset};

use crate::error::PdfStampError;

/// オーバーレイの識別子。作成時に割り当てられ、以後変化しない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(String);

impl OverlayId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OverlayId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// ページ幅・高さに対するパーセンテージ座標（左上原点、0〜100）。
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// 各軸を [0, 100] に収める。NaN は 0 として扱う。
    pub fn clamped(self) -> Self {
        Self {
            x: clamp_percent(self.x),
            y: clamp_percent(self.y),
        }
    }

    /// パーセンテージ差分を加算してからクランプする。
    pub fn offset(self, delta: Position) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y).clamped()
    }

    /// Converts a pointer delta in on-screen pixels into a percentage delta
    /// relative to the rendered page view.
    ///
    /// A degenerate view (zero or negative extent) yields a zero delta on that axis.
    pub fn from_pixel_delta(dx: f64, dy: f64, view_width: f64, view_height: f64) -> Self {
        let axis = |d: f64, extent: f64| {
            if extent > 0.0 && d.is_finite() {
                d / extent * 100.0
            } else {
                0.0
            }
        };
        Self::new(axis(dx, view_width), axis(dy, view_height))
    }
}

fn clamp_percent(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) }
}

/// 出力座標系（ポイント）での寸法。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }

    fn is_finite(&self) -> bool {
        self.width.is_finite() && self.height.is_finite()
    }
}

/// Self-describing encoded image, either a `data:` URI or raw file bytes.
///
/// Cloning is cheap; the encoded data is shared.
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePayload {
    DataUri(Arc<str>),
    Bytes(Arc<[u8]>),
}

impl ImagePayload {
    pub fn from_data_uri(uri: impl Into<String>) -> Self {
        Self::DataUri(Arc::from(uri.into()))
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(Arc::from(bytes.into()))
    }

    /// Returns the encoded image bytes, unpacking a base64 `data:` URI if needed.
    pub fn encoded_bytes(&self) -> crate::error::Result<Cow<'_, [u8]>> {
        match self {
            ImagePayload::Bytes(bytes) => Ok(Cow::Borrowed(&bytes[..])),
            ImagePayload::DataUri(uri) => {
                let rest = uri.strip_prefix("data:").ok_or_else(|| {
                    PdfStampError::image_decode("payload is not a data: URI")
                })?;
                let (meta, data) = rest.split_once(',').ok_or_else(|| {
                    PdfStampError::image_decode("data: URI has no ',' separator")
                })?;
                if !meta.ends_with(";base64") {
                    return Err(PdfStampError::image_decode(
                        "only base64-encoded data: URIs are supported",
                    ));
                }
                Ok(Cow::Owned(STANDARD.decode(data.trim().as_bytes())?))
            }
        }
    }
}

/// 署名に付随するタイムスタンプ表示。
#[derive(Debug, Clone, PartialEq)]
pub struct Timestamp {
    /// 署名時刻。出力時の現在時刻とは独立。
    pub signed_at: DateTime<FixedOffset>,
    pub position: Position,
    pub font_size: f64,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayKind {
    Signature(Timestamp),
    Stamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub id: OverlayId,
    pub payload: ImagePayload,
    /// 1-based page number.
    pub page: u32,
    /// Top-left corner of the overlay, in page percentages.
    pub position: Position,
    pub size: Size,
    pub kind: OverlayKind,
}

impl Overlay {
    pub fn is_signature(&self) -> bool {
        matches!(self.kind, OverlayKind::Signature(_))
    }

    pub fn timestamp(&self) -> Option<&Timestamp> {
        match &self.kind {
            OverlayKind::Signature(ts) => Some(ts),
            OverlayKind::Stamp => None,
        }
    }
}
