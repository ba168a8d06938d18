// Document provider seam: what the composition engine needs from a PDF backend.

use crate::geometry::{PageSize, Rect};

/// 文書を開く際のオプション。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    /// 編集を実際には制限しない暗号化マーカーを無視して開く。
    pub tolerate_encryption_markers: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            tolerate_encryption_markers: true,
        }
    }
}

/// The base-14 fonts every PDF reader ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    TimesRoman,
    TimesBold,
    Courier,
    CourierBold,
}

impl StandardFont {
    pub fn base_font(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
        }
    }
}

/// RGB color with components in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }
}

impl From<[f64; 3]> for Rgb {
    fn from([r, g, b]: [f64; 3]) -> Self {
        Self::new(r, g, b)
    }
}

/// Handle to an image embedded in an open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageResource {
    pub key: usize,
    pub width: u32,
    pub height: u32,
}

/// Handle to a font embedded in an open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontResource {
    pub key: usize,
    pub font: StandardFont,
}

/// テキスト描画のパラメータ。`(x, y)` は出力座標系でのアンカー位置。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextRun {
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub font: FontResource,
    pub color: Rgb,
}

/// An open, in-progress document. Page numbers are 1-based.
pub trait DocumentHandle {
    fn page_count(&self) -> u32;

    fn page_size(&self, page: u32) -> crate::error::Result<PageSize>;

    /// Embeds normalized PNG bytes; fails with `ImageEmbedError`.
    fn embed_image(&mut self, png: &[u8]) -> crate::error::Result<ImageResource>;

    fn embed_standard_font(&mut self, font: StandardFont) -> crate::error::Result<FontResource>;

    fn draw_image(
        &mut self,
        page: u32,
        image: &ImageResource,
        rect: Rect,
    ) -> crate::error::Result<()>;

    fn draw_text(&mut self, page: u32, text: &str, run: &TextRun) -> crate::error::Result<()>;

    /// Finishes the document and returns its bytes.
    fn serialize(self) -> crate::error::Result<Vec<u8>>;
}

/// Opens source documents; fails with `SourceDocumentError` on invalid input.
pub trait DocumentProvider {
    type Handle: DocumentHandle;

    fn open(&self, bytes: &[u8], options: OpenOptions) -> crate::error::Result<Self::Handle>;
}
