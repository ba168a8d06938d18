use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfStampError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cannot read document: {0}")]
    SourceDocumentError(String),

    #[error("Overlay references page {page} but the document has {page_count} pages")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("Image decode error: {0}")]
    ImageDecodeError(String),

    #[error("Image embed error: {0}")]
    ImageEmbedError(String),

    #[error("PDF write error: {0}")]
    PdfWriteError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Generates factory methods for [`PdfStampError`] variants that wrap a `String`.
macro_rules! error_constructors {
    ($(
        $(#[doc = $doc:expr])*
        $method:ident => $variant:ident
    ),* $(,)?) => {
        impl PdfStampError {
            $(
                $(#[doc = $doc])*
                pub fn $method(msg: impl Into<String>) -> Self {
                    Self::$variant(msg.into())
                }
            )*
        }
    };
}

error_constructors! {
    /// Create a configuration error.
    config => ConfigError,
    /// Create a source document error.
    source_document => SourceDocumentError,
    /// Create an image decode error.
    image_decode => ImageDecodeError,
    /// Create an image embed error.
    image_embed => ImageEmbedError,
    /// Create a PDF write error.
    pdf_write => PdfWriteError,
}

impl PdfStampError {
    /// Create a page-out-of-range error.
    pub fn page_out_of_range(page: u32, page_count: u32) -> Self {
        Self::PageOutOfRange { page, page_count }
    }
}

impl From<lopdf::Error> for PdfStampError {
    fn from(e: lopdf::Error) -> Self {
        Self::SourceDocumentError(e.to_string())
    }
}

impl From<serde_yml::Error> for PdfStampError {
    fn from(e: serde_yml::Error) -> Self {
        Self::ConfigError(e.to_string())
    }
}

impl From<image::ImageError> for PdfStampError {
    fn from(e: image::ImageError) -> Self {
        Self::ImageDecodeError(e.to_string())
    }
}

impl From<base64::DecodeError> for PdfStampError {
    fn from(e: base64::DecodeError) -> Self {
        Self::ImageDecodeError(format!("invalid base64 payload: {e}"))
    }
}

/// 合成処理全体の失敗。原因となった [`PdfStampError`] を保持する。
#[derive(Debug, Error)]
#[error("Composition failed: {source}")]
pub struct CompositionError {
    #[source]
    source: PdfStampError,
}

impl CompositionError {
    /// 失敗の原因を返す。
    pub fn cause(&self) -> &PdfStampError {
        &self.source
    }

    pub fn into_cause(self) -> PdfStampError {
        self.source
    }
}

impl From<PdfStampError> for CompositionError {
    fn from(source: PdfStampError) -> Self {
        Self { source }
    }
}

pub type Result<T> = std::result::Result<T, PdfStampError>;
