// Page tree helpers: page lookup and inheritable page attributes.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::PdfStampError;
use crate::geometry::PageSize;

/// Parentをたどる最大深さ（循環参照対策）。
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// PDFの一般的な上限（14,400 pt ≈ 200 in）。
const PDF_MAX_DIMENSION_PT: f64 = 14_400.0;

/// ページ番号(1-indexed)からObjectIdへの対応表を返す。
pub fn page_ids(doc: &Document) -> BTreeMap<u32, ObjectId> {
    doc.get_pages()
}

/// 参照を解決したオブジェクトを返す。
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> crate::error::Result<&'a Object> {
    match obj {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

/// ページ辞書から継承可能な属性を取得する（Parent経由の継承も考慮）。
fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> crate::error::Result<Option<&'a Object>> {
    let mut dict = doc.get_dictionary(page_id)?;
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        if let Ok(obj) = dict.get(key) {
            return Ok(Some(resolve(doc, obj)?));
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => dict = doc.get_dictionary(*parent_id)?,
            _ => return Ok(None),
        }
    }
    Err(PdfStampError::source_document("page tree is too deep or cyclic"))
}

/// 指定ページのMediaBoxからページ寸法を返す。
pub fn page_size(doc: &Document, page_id: ObjectId) -> crate::error::Result<PageSize> {
    let media_box = inherited_attribute(doc, page_id, b"MediaBox")?
        .ok_or_else(|| PdfStampError::source_document("MediaBox not found"))?;

    let media_box_array = media_box.as_array()?;
    if media_box_array.len() < 4 {
        return Err(PdfStampError::source_document("Invalid MediaBox"));
    }

    // MediaBoxの値は整数または実数の可能性がある
    let to_f64 = |obj: &Object| -> crate::error::Result<f64> {
        match resolve(doc, obj)? {
            Object::Integer(i) => Ok(*i as f64),
            Object::Real(f) => Ok(*f as f64),
            _ => Err(PdfStampError::source_document("Invalid MediaBox value")),
        }
    };

    let x0 = to_f64(&media_box_array[0])?;
    let y0 = to_f64(&media_box_array[1])?;
    let x1 = to_f64(&media_box_array[2])?;
    let y1 = to_f64(&media_box_array[3])?;

    let width = (x1 - x0).abs();
    let height = (y1 - y0).abs();

    if width <= 0.0 || height <= 0.0 {
        return Err(PdfStampError::source_document(
            "Invalid MediaBox: non-positive page dimensions",
        ));
    }
    if width > PDF_MAX_DIMENSION_PT || height > PDF_MAX_DIMENSION_PT {
        return Err(PdfStampError::source_document(
            "Invalid MediaBox: page dimensions exceed PDF limits",
        ));
    }

    Ok(PageSize::new(width, height))
}

/// ページに実際に適用されるResources辞書の複製を返す。
///
/// ページ自身がResourcesを持たない場合は祖先から継承したものを使う。
/// どこにもなければ空の辞書を返す。
pub fn page_resources(doc: &Document, page_id: ObjectId) -> crate::error::Result<Dictionary> {
    match inherited_attribute(doc, page_id, b"Resources")? {
        Some(obj) => Ok(obj.as_dict()?.clone()),
        None => Ok(Dictionary::new()),
    }
}

/// リソース辞書内のサブ辞書（XObject, Font など）を参照解決して複製する。
pub fn resource_subdict(
    doc: &Document,
    resources: &Dictionary,
    key: &[u8],
) -> crate::error::Result<Dictionary> {
    match resources.get(key) {
        Ok(obj) => Ok(resolve(doc, obj)?.as_dict()?.clone()),
        Err(_) => Ok(Dictionary::new()),
    }
}
