// Composition engine: source PDF + overlay snapshot -> flattened PDF bytes.

use std::collections::{BTreeMap, HashMap};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::compose::timestamp::format_signed_on;
use crate::error::{CompositionError, PdfStampError};
use crate::geometry::{output_rect, to_output_origin_text};
use crate::overlay::store::OverlayStore;
use crate::overlay::{ImagePayload, Overlay};
use crate::pdf::document::LopdfProvider;
use crate::pdf::provider::{
    DocumentHandle, DocumentProvider, FontResource, ImageResource, OpenOptions, Rgb,
    StandardFont, TextRun,
};
use crate::raster::normalizer;

/// Presentation and open settings for a composition run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComposeOptions {
    pub open: OpenOptions,
    pub timestamp_font: StandardFont,
    pub timestamp_color: Rgb,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        ComposeOptions {
            open: OpenOptions::default(),
            timestamp_font: StandardFont::HelveticaBold,
            timestamp_color: Rgb::new(0.1, 0.1, 0.1),
        }
    }
}

/// Embeds overlays into documents opened through a [`DocumentProvider`].
#[derive(Debug, Clone)]
pub struct Composer<P> {
    provider: P,
    options: ComposeOptions,
}

impl Default for Composer<LopdfProvider> {
    fn default() -> Self {
        Self::new(LopdfProvider::default(), ComposeOptions::default())
    }
}

impl<P: DocumentProvider> Composer<P> {
    pub fn new(provider: P, options: ComposeOptions) -> Self {
        Self { provider, options }
    }

    /// Composes every overlay in `store` onto `source`.
    ///
    /// The store is snapshotted before any work starts and is never modified.
    /// Any failure aborts the whole run; no partial document is returned.
    pub fn compose(
        &self,
        source: &[u8],
        store: &OverlayStore,
    ) -> Result<Vec<u8>, CompositionError> {
        let snapshot = store.grouped_by_page();
        self.compose_snapshot(source, &snapshot)
    }

    /// Composes an already-grouped snapshot (page -> overlays in draw order).
    pub fn compose_snapshot(
        &self,
        source: &[u8],
        groups: &BTreeMap<u32, Vec<Overlay>>,
    ) -> Result<Vec<u8>, CompositionError> {
        Ok(self.run(source, groups)?)
    }

    fn run(
        &self,
        source: &[u8],
        groups: &BTreeMap<u32, Vec<Overlay>>,
    ) -> crate::error::Result<Vec<u8>> {
        let overlay_count: usize = groups.values().map(Vec::len).sum();
        info!(
            source_bytes = source.len(),
            pages_with_overlays = groups.len(),
            overlay_count,
            "composing document"
        );

        let mut doc = self.provider.open(source, self.options.open)?;
        let page_count = doc.page_count();

        // Reject the whole run before drawing anything.
        if let Some(&page) = groups.keys().find(|&&p| p == 0 || p > page_count) {
            return Err(PdfStampError::page_out_of_range(page, page_count));
        }

        let mut images: HashMap<String, ImageResource> = HashMap::new();
        let mut font: Option<FontResource> = None;

        // BTreeMap iteration gives ascending page order.
        for (&page, overlays) in groups {
            let page_size = doc.page_size(page)?;
            debug!(page, overlays = overlays.len(), ?page_size, "composing page");

            for overlay in overlays {
                let image = embed_payload(&mut doc, &mut images, &overlay.payload)?;
                let rect = output_rect(overlay.position, overlay.size, page_size);
                debug!(id = %overlay.id, page, ?rect, "drawing overlay");
                doc.draw_image(page, &image, rect)?;

                if let Some(ts) = overlay.timestamp()
                    && ts.visible
                {
                    let font = match font {
                        Some(f) => f,
                        None => {
                            let f = doc.embed_standard_font(self.options.timestamp_font)?;
                            font = Some(f);
                            f
                        }
                    };
                    let (x, y) = to_output_origin_text(ts.position, page_size);
                    let run = TextRun {
                        x,
                        y,
                        font_size: ts.font_size,
                        font,
                        color: self.options.timestamp_color,
                    };
                    doc.draw_text(page, &format_signed_on(&ts.signed_at), &run)?;
                }
            }
        }

        let bytes = doc.serialize()?;
        info!(output_bytes = bytes.len(), "composition finished");
        Ok(bytes)
    }
}

/// 画像を正規化して埋め込む。同一内容のペイロードは1度だけ埋め込む。
fn embed_payload<H: DocumentHandle>(
    doc: &mut H,
    images: &mut HashMap<String, ImageResource>,
    payload: &ImagePayload,
) -> crate::error::Result<ImageResource> {
    let encoded = payload.encoded_bytes()?;
    let key = hex::encode(Sha256::digest(&encoded));
    if let Some(image) = images.get(&key) {
        return Ok(*image);
    }

    let normalized = normalizer::normalize_bytes(&encoded)?;
    let image = doc.embed_image(&normalized.png)?;
    images.insert(key, image);
    Ok(image)
}

/// Composes with the lopdf provider and default presentation settings.
pub fn compose(source: &[u8], store: &OverlayStore) -> Result<Vec<u8>, CompositionError> {
    Composer::default().compose(source, store)
}
