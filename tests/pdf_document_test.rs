// lopdfプロバイダのテスト（pub APIのみ）

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use pdf_stamping::error::PdfStampError;
use pdf_stamping::geometry::{PageSize, Rect};
use pdf_stamping::pdf::document::{LopdfDocument, LopdfProvider};
use pdf_stamping::pdf::provider::{
    DocumentHandle, DocumentProvider, OpenOptions, Rgb, StandardFont, TextRun,
};

// ============================================================
// Helpers
// ============================================================

/// MediaBoxとResourcesをPagesノードから継承する2ページのPDFを生成する。
///
/// 継承されるResourcesには既存フォント `/F1` と既存XObject `/StampIm0` を含める。
fn make_inherited_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let existing_image = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 1,
            "Height" => 1,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![0],
    ));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
        "XObject" => dictionary! { "StampIm0" => existing_image },
    });

    let mut kids: Vec<Object> = Vec::new();
    for _ in 0..2 {
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            b"BT /F1 12 Tf 72 720 Td (Hello) Tj ET".to_vec(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => 2,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        "Resources" => resources_id,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save test PDF");
    out
}

fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode PNG");
    buf.into_inner()
}

fn open(bytes: &[u8]) -> LopdfDocument {
    LopdfProvider { compress: false }
        .open(bytes, OpenOptions::default())
        .expect("open PDF")
}

fn page_dict(doc: &Document, page_num: u32) -> &Dictionary {
    let page_id = *doc.get_pages().get(&page_num).expect("page exists");
    doc.get_dictionary(page_id).expect("page dict")
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> &'a Dictionary {
    match obj {
        Object::Reference(id) => doc.get_dictionary(*id).expect("referenced dict"),
        Object::Dictionary(d) => d,
        other => panic!("expected dictionary, got {other:?}"),
    }
}

fn stream_of(doc: &Document, obj: &Object) -> Vec<u8> {
    let id: ObjectId = obj.as_reference().expect("reference");
    doc.get_object(id)
        .and_then(Object::as_stream)
        .expect("stream")
        .content
        .clone()
}

// ============================================================
// 1. 読み込み
// ============================================================

#[test]
fn test_page_count_and_inherited_size() {
    let doc = open(&make_inherited_pdf());
    assert_eq!(doc.page_count(), 2);
    assert_eq!(doc.page_size(1).expect("size"), PageSize::new(595.0, 842.0));
    assert_eq!(doc.page_size(2).expect("size"), PageSize::new(595.0, 842.0));
}

#[test]
fn test_page_size_out_of_range() {
    let doc = open(&make_inherited_pdf());
    let err = doc.page_size(3).expect_err("page 3 does not exist");
    assert!(matches!(
        err,
        PdfStampError::PageOutOfRange {
            page: 3,
            page_count: 2
        }
    ));
}

#[test]
fn test_open_rejects_garbage() {
    let err = LopdfProvider::default()
        .open(b"%PDF-1.4 garbage", OpenOptions::default())
        .expect_err("must fail");
    assert!(matches!(err, PdfStampError::SourceDocumentError(_)));
}

// ============================================================
// 2. 画像の埋め込み
// ============================================================

#[test]
fn test_embed_opaque_image_has_no_smask() {
    let mut doc = open(&make_inherited_pdf());
    let image = doc.embed_image(&png(4, 3, [10, 20, 30, 255])).expect("embed");
    assert_eq!((image.width, image.height), (4, 3));

    let bytes = {
        doc.draw_image(
            1,
            &image,
            Rect {
                x: 0.0,
                y: 0.0,
                width: 4.0,
                height: 3.0,
            },
        )
        .expect("draw");
        doc.serialize().expect("serialize")
    };
    let out = Document::load_mem(&bytes).expect("valid PDF");

    let resources = resolve_dict(&out, page_dict(&out, 1).get(b"Resources").expect("Resources"));
    let xobjects = resolve_dict(&out, resources.get(b"XObject").expect("XObject"));
    let new_image = xobjects.get(b"StampIm0_1").expect("renamed image resource");
    let stream = out
        .get_object(new_image.as_reference().expect("ref"))
        .and_then(Object::as_stream)
        .expect("image stream");
    assert!(stream.dict.get(b"SMask").is_err());
    assert_eq!(stream.dict.get(b"Width").and_then(Object::as_i64).expect("Width"), 4);
}

#[test]
fn test_embed_translucent_image_has_smask() {
    let mut doc = open(&make_inherited_pdf());
    let image = doc.embed_image(&png(2, 2, [0, 0, 0, 100])).expect("embed");
    doc.draw_image(
        1,
        &image,
        Rect {
            x: 10.0,
            y: 10.0,
            width: 20.0,
            height: 20.0,
        },
    )
    .expect("draw");
    let out = Document::load_mem(&doc.serialize().expect("serialize")).expect("valid PDF");

    let smask_count = out
        .objects
        .values()
        .filter_map(|o| o.as_stream().ok())
        .filter(|s| s.dict.get(b"SMask").is_ok())
        .count();
    assert_eq!(smask_count, 1);
}

#[test]
fn test_embed_non_png_is_embed_error() {
    let mut doc = open(&make_inherited_pdf());
    let err = doc.embed_image(b"GIF89a....").expect_err("must fail");
    assert!(matches!(err, PdfStampError::ImageEmbedError(_)));
}

// ============================================================
// 3. 描画とリソース
// ============================================================

#[test]
fn test_existing_resources_preserved_and_names_unique() {
    let mut doc = open(&make_inherited_pdf());
    let image = doc.embed_image(&png(1, 1, [0, 0, 0, 255])).expect("embed");
    let font = doc
        .embed_standard_font(StandardFont::HelveticaBold)
        .expect("font");
    doc.draw_image(
        2,
        &image,
        Rect {
            x: 1.0,
            y: 2.0,
            width: 3.0,
            height: 4.0,
        },
    )
    .expect("draw image");
    doc.draw_text(
        2,
        "Signed on: test",
        &TextRun {
            x: 100.0,
            y: 200.0,
            font_size: 10.0,
            font,
            color: Rgb::new(0.1, 0.1, 0.1),
        },
    )
    .expect("draw text");
    let out = Document::load_mem(&doc.serialize().expect("serialize")).expect("valid PDF");

    let resources = resolve_dict(&out, page_dict(&out, 2).get(b"Resources").expect("Resources"));
    let fonts = resolve_dict(&out, resources.get(b"Font").expect("Font"));
    assert!(fonts.get(b"F1").is_ok(), "existing font kept");
    let new_font = resolve_dict(&out, fonts.get(b"StampF0").expect("new font"));
    assert_eq!(
        new_font.get(b"BaseFont").and_then(Object::as_name).expect("BaseFont"),
        b"Helvetica-Bold"
    );

    let xobjects = resolve_dict(&out, resources.get(b"XObject").expect("XObject"));
    assert!(xobjects.get(b"StampIm0").is_ok(), "existing image kept");
    assert!(xobjects.get(b"StampIm0_1").is_ok(), "new image gets a fresh name");

    // 描画していないページはそのまま
    let untouched = page_dict(&out, 1);
    assert!(untouched.get(b"Resources").is_err(), "page 1 still inherits");
}

#[test]
fn test_original_content_wrapped_in_save_restore() {
    let mut doc = open(&make_inherited_pdf());
    let image = doc.embed_image(&png(1, 1, [0, 0, 0, 255])).expect("embed");
    doc.draw_image(
        1,
        &image,
        Rect {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        },
    )
    .expect("draw");
    let out = Document::load_mem(&doc.serialize().expect("serialize")).expect("valid PDF");

    let contents = page_dict(&out, 1)
        .get(b"Contents")
        .and_then(Object::as_array)
        .expect("Contents array")
        .clone();
    assert_eq!(contents.len(), 3);
    assert_eq!(stream_of(&out, &contents[0]), b"q\n");
    assert!(
        String::from_utf8_lossy(&stream_of(&out, &contents[1])).contains("(Hello) Tj"),
        "original content kept in the middle"
    );
    let overlay = String::from_utf8_lossy(&stream_of(&out, &contents[2])).into_owned();
    assert!(overlay.starts_with('Q'), "overlay stream restores state first: {overlay}");
    assert!(overlay.contains("/StampIm0_1 Do"));
}

#[test]
fn test_draw_on_missing_page_fails() {
    let mut doc = open(&make_inherited_pdf());
    let image = doc.embed_image(&png(1, 1, [0, 0, 0, 255])).expect("embed");
    let err = doc
        .draw_image(
            9,
            &image,
            Rect {
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
            },
        )
        .expect_err("page 9 does not exist");
    assert!(matches!(err, PdfStampError::PageOutOfRange { page: 9, .. }));
}

#[test]
fn test_standard_font_embedded_once() {
    let mut doc = open(&make_inherited_pdf());
    let a = doc.embed_standard_font(StandardFont::HelveticaBold).expect("font");
    let b = doc.embed_standard_font(StandardFont::HelveticaBold).expect("font");
    let c = doc.embed_standard_font(StandardFont::Courier).expect("font");
    assert_eq!(a, b);
    assert_ne!(a.key, c.key);
}

#[test]
fn test_compressed_overlay_stream_has_flate_filter() {
    let mut doc = LopdfProvider { compress: true }
        .open(&make_inherited_pdf(), OpenOptions::default())
        .expect("open");
    let image = doc.embed_image(&png(1, 1, [0, 0, 0, 255])).expect("embed");
    doc.draw_image(
        1,
        &image,
        Rect {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        },
    )
    .expect("draw");
    let out = Document::load_mem(&doc.serialize().expect("serialize")).expect("valid PDF");

    let contents = page_dict(&out, 1)
        .get(b"Contents")
        .and_then(Object::as_array)
        .expect("Contents array")
        .clone();
    let last = out
        .get_object(contents[2].as_reference().expect("ref"))
        .and_then(Object::as_stream)
        .expect("stream");
    assert_eq!(
        last.dict.get(b"Filter").and_then(Object::as_name).expect("Filter"),
        b"FlateDecode"
    );
}

#[test]
fn test_indirect_contents_array_is_flattened() {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let first = doc.add_object(Stream::new(dictionary! {}, b"0 0 m".to_vec()));
    let second = doc.add_object(Stream::new(dictionary! {}, b"10 10 l S".to_vec()));
    let contents_array = doc.add_object(Object::Array(vec![first.into(), second.into()]));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => contents_array,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut source = Vec::new();
    doc.save_to(&mut source).expect("save test PDF");

    let mut handle = open(&source);
    let image = handle.embed_image(&png(1, 1, [0, 0, 0, 255])).expect("embed");
    handle
        .draw_image(
            1,
            &image,
            Rect {
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
            },
        )
        .expect("draw");
    let out = Document::load_mem(&handle.serialize().expect("serialize")).expect("valid PDF");

    let contents = page_dict(&out, 1)
        .get(b"Contents")
        .and_then(Object::as_array)
        .expect("Contents array")
        .clone();
    assert_eq!(contents.len(), 4, "q + two original streams + overlay");
    for item in &contents {
        let id = item.as_reference().expect("every entry is a reference");
        assert!(
            out.get_object(id).and_then(Object::as_stream).is_ok(),
            "every entry resolves to a stream"
        );
    }
    assert_eq!(stream_of(&out, &contents[1]), b"0 0 m");
    assert_eq!(stream_of(&out, &contents[2]), b"10 10 l S");
}
