// lopdf-backed document provider: image/font embedding and overlay drawing.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::ImageFormat;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use tracing::{debug, warn};

use crate::error::PdfStampError;
use crate::geometry::{PageSize, Rect};
use crate::pdf::provider::{
    DocumentHandle, DocumentProvider, FontResource, ImageResource, OpenOptions, StandardFont,
    TextRun,
};
use crate::pdf::reader;

/// [`LopdfDocument`] を開くプロバイダ。
#[derive(Debug, Clone, Copy)]
pub struct LopdfProvider {
    /// 追加するコンテンツストリームをFlateDecodeで圧縮する。
    pub compress: bool,
}

impl Default for LopdfProvider {
    fn default() -> Self {
        LopdfProvider { compress: true }
    }
}

impl DocumentProvider for LopdfProvider {
    type Handle = LopdfDocument;

    fn open(&self, bytes: &[u8], options: OpenOptions) -> crate::error::Result<LopdfDocument> {
        let mut doc = LopdfDocument::load(bytes, options)?;
        doc.compress = self.compress;
        Ok(doc)
    }
}

/// ページ単位で蓄積した描画内容。serialize時にページへ反映する。
#[derive(Debug, Default)]
struct PageOverlay {
    operations: Vec<Operation>,
    /// ページ上で予約済み（既存 + 今回追加）のリソース名。
    reserved: BTreeSet<Vec<u8>>,
    xobjects: BTreeMap<usize, String>,
    fonts: BTreeMap<usize, String>,
}

#[derive(Debug)]
pub struct LopdfDocument {
    doc: Document,
    pages: BTreeMap<u32, ObjectId>,
    images: Vec<ObjectId>,
    fonts: Vec<(StandardFont, ObjectId)>,
    pending: BTreeMap<u32, PageOverlay>,
    compress: bool,
}

impl LopdfDocument {
    /// PDFバイト列を読み込む。
    ///
    /// `tolerate_encryption_markers` が有効な場合、暗号化を解除した平文の文書として扱う。
    /// 無効な場合、暗号化されていた文書は `SourceDocumentError` になる。
    /// 構造的に壊れた文書は常にエラー。
    ///
    /// lopdfは空のユーザーパスワードで読める文書を読込時に復号し、
    /// トレーラーの `/Encrypt` を取り除く。そのため `encryption_state` も確認する。
    pub fn load(bytes: &[u8], options: OpenOptions) -> crate::error::Result<Self> {
        let mut doc = Document::load_mem(bytes)
            .map_err(|e| PdfStampError::source_document(e.to_string()))?;

        if doc.was_encrypted() || doc.is_encrypted() {
            if !options.tolerate_encryption_markers {
                return Err(PdfStampError::source_document("document is encrypted"));
            }
            warn!("ignoring encryption marker on source document");
            doc.trailer.remove(b"Encrypt");
            doc.encryption_state = None;
        }

        let pages = reader::page_ids(&doc);
        if pages.is_empty() {
            return Err(PdfStampError::source_document("document has no pages"));
        }

        Ok(Self {
            doc,
            pages,
            images: Vec::new(),
            fonts: Vec::new(),
            pending: BTreeMap::new(),
            compress: true,
        })
    }

    fn page_id(&self, page: u32) -> crate::error::Result<ObjectId> {
        self.pages
            .get(&page)
            .copied()
            .ok_or_else(|| PdfStampError::page_out_of_range(page, self.page_count()))
    }

    /// ページの描画バッファを返す。初回は既存リソース名を予約する。
    fn page_overlay(&mut self, page: u32) -> crate::error::Result<&mut PageOverlay> {
        let page_id = self.page_id(page)?;
        if !self.pending.contains_key(&page) {
            let resources = reader::page_resources(&self.doc, page_id)?;
            let mut reserved = BTreeSet::new();
            for key in [b"XObject".as_slice(), b"Font".as_slice()] {
                let sub = reader::resource_subdict(&self.doc, &resources, key)?;
                reserved.extend(sub.iter().map(|(name, _)| name.clone()));
            }
            self.pending.insert(
                page,
                PageOverlay {
                    reserved,
                    ..PageOverlay::default()
                },
            );
        }
        self.pending
            .get_mut(&page)
            .ok_or_else(|| PdfStampError::pdf_write("page overlay buffer missing"))
    }

    /// 未使用のリソース名を返す（既存名と衝突する場合は接尾辞を付ける）。
    fn unique_name(reserved: &mut BTreeSet<Vec<u8>>, base: String) -> String {
        let mut name = base.clone();
        let mut suffix = 1;
        while reserved.contains(name.as_bytes()) {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }
        reserved.insert(name.as_bytes().to_vec());
        name
    }

    /// 蓄積した描画内容を1ページに反映する。
    ///
    /// 元のコンテンツを `q ... Q` で囲み、その後ろにオーバーレイ用ストリームを追加する。
    fn apply_page(&mut self, page: u32, overlay: PageOverlay) -> crate::error::Result<()> {
        let page_id = self.page_id(page)?;

        let mut resources = reader::page_resources(&self.doc, page_id)?;
        if !overlay.xobjects.is_empty() {
            let mut xobjects = reader::resource_subdict(&self.doc, &resources, b"XObject")?;
            for (key, name) in &overlay.xobjects {
                xobjects.set(name.as_bytes(), Object::Reference(self.images[*key]));
            }
            resources.set("XObject", Object::Dictionary(xobjects));
        }
        if !overlay.fonts.is_empty() {
            let mut fonts = reader::resource_subdict(&self.doc, &resources, b"Font")?;
            for (key, name) in &overlay.fonts {
                fonts.set(name.as_bytes(), Object::Reference(self.fonts[*key].1));
            }
            resources.set("Font", Object::Dictionary(fonts));
        }

        // 間接参照された配列も展開し、ストリーム参照だけを並べる
        let existing: Vec<Object> = self
            .doc
            .get_page_contents(page_id)
            .into_iter()
            .map(Object::Reference)
            .collect();

        let mut contents = Vec::with_capacity(existing.len() + 2);
        let mut operations = Vec::with_capacity(overlay.operations.len() + 1);
        if !existing.is_empty() {
            let save = self.add_content_stream(b"q\n".to_vec())?;
            contents.push(Object::Reference(save));
            contents.extend(existing);
            operations.push(Operation::new("Q", vec![]));
        }
        operations.extend(overlay.operations);
        let encoded = Content { operations }
            .encode()
            .map_err(|e| PdfStampError::pdf_write(e.to_string()))?;
        let overlay_id = self.add_content_stream(encoded)?;
        contents.push(Object::Reference(overlay_id));

        let page_dict = self.doc.get_dictionary_mut(page_id)?;
        page_dict.set("Resources", Object::Dictionary(resources));
        page_dict.set("Contents", Object::Array(contents));
        Ok(())
    }

    fn add_content_stream(&mut self, content: Vec<u8>) -> crate::error::Result<ObjectId> {
        let stream = if self.compress {
            Stream::new(dictionary! { "Filter" => "FlateDecode" }, deflate(&content)?)
        } else {
            Stream::new(dictionary! {}, content)
        };
        Ok(self.doc.add_object(Object::Stream(stream)))
    }
}

impl DocumentHandle for LopdfDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page: u32) -> crate::error::Result<PageSize> {
        reader::page_size(&self.doc, self.page_id(page)?)
    }

    fn embed_image(&mut self, png: &[u8]) -> crate::error::Result<ImageResource> {
        let decoded = image::load_from_memory_with_format(png, ImageFormat::Png)
            .map_err(|e| PdfStampError::image_embed(format!("not a PNG image: {e}")))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();

        let pixel_count = (width as usize) * (height as usize);
        let mut rgb = Vec::with_capacity(pixel_count * 3);
        let mut alpha = Vec::with_capacity(pixel_count);
        for px in rgba.pixels() {
            rgb.extend_from_slice(&px.0[..3]);
            alpha.push(px.0[3]);
        }

        let mut dict = image_dict(width, height, "DeviceRGB");
        // 全画素が不透明ならSMaskは不要
        if alpha.iter().any(|&a| a != u8::MAX) {
            let smask = Stream::new(image_dict(width, height, "DeviceGray"), deflate(&alpha)?);
            let smask_id = self.doc.add_object(Object::Stream(smask));
            dict.set("SMask", Object::Reference(smask_id));
        }
        let image_id = self
            .doc
            .add_object(Object::Stream(Stream::new(dict, deflate(&rgb)?)));

        self.images.push(image_id);
        debug!(width, height, "embedded image XObject {:?}", image_id);
        Ok(ImageResource {
            key: self.images.len() - 1,
            width,
            height,
        })
    }

    fn embed_standard_font(&mut self, font: StandardFont) -> crate::error::Result<FontResource> {
        if let Some(key) = self.fonts.iter().position(|(f, _)| *f == font) {
            return Ok(FontResource { key, font });
        }
        let font_id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        self.fonts.push((font, font_id));
        Ok(FontResource {
            key: self.fonts.len() - 1,
            font,
        })
    }

    fn draw_image(
        &mut self,
        page: u32,
        image: &ImageResource,
        rect: Rect,
    ) -> crate::error::Result<()> {
        if image.key >= self.images.len() {
            return Err(PdfStampError::image_embed("unknown image resource"));
        }
        let overlay = self.page_overlay(page)?;
        let name = match overlay.xobjects.get(&image.key) {
            Some(name) => name.clone(),
            None => {
                let name = Self::unique_name(&mut overlay.reserved, format!("StampIm{}", image.key));
                overlay.xobjects.insert(image.key, name.clone());
                name
            }
        };

        overlay.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    real(rect.width),
                    0.into(),
                    0.into(),
                    real(rect.height),
                    real(rect.x),
                    real(rect.y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        Ok(())
    }

    fn draw_text(&mut self, page: u32, text: &str, run: &TextRun) -> crate::error::Result<()> {
        if run.font.key >= self.fonts.len() {
            return Err(PdfStampError::pdf_write("unknown font resource"));
        }
        let overlay = self.page_overlay(page)?;
        let name = match overlay.fonts.get(&run.font.key) {
            Some(name) => name.clone(),
            None => {
                let name = Self::unique_name(&mut overlay.reserved, format!("StampF{}", run.font.key));
                overlay.fonts.insert(run.font.key, name.clone());
                name
            }
        };

        overlay.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(name.into_bytes()), real(run.font_size)]),
            Operation::new(
                "rg",
                vec![real(run.color.r), real(run.color.g), real(run.color.b)],
            ),
            Operation::new("Td", vec![real(run.x), real(run.y)]),
            Operation::new(
                "Tj",
                vec![Object::String(win_ansi_bytes(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
        Ok(())
    }

    fn serialize(mut self) -> crate::error::Result<Vec<u8>> {
        let pending = std::mem::take(&mut self.pending);
        for (page, overlay) in pending {
            self.apply_page(page, overlay)?;
        }

        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| PdfStampError::pdf_write(e.to_string()))?;
        Ok(out)
    }
}

fn image_dict(width: u32, height: u32, color_space: &str) -> Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    }
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

fn deflate(data: &[u8]) -> crate::error::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// 標準フォントのWinAnsiEncoding用にエンコードする。Latin-1外の文字は `?` にする。
fn win_ansi_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u8::try_from(u32::from(c)) {
            Ok(b) if b >= 0x20 && !(0x7F..0xA0).contains(&b) => b,
            _ => b'?',
        })
        .collect()
}
