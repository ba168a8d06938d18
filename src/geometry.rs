// Coordinate mapping between page percentages (top-left origin) and PDF
// user space (bottom-left origin, points).

use crate::overlay::{Position, Size};

/// Physical page size in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Placement of an image in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Output-space origin (bottom-left corner) of a box whose top-left corner
/// sits at `position`.
///
/// Only the position's y term is flipped; the overlay's own height is then
/// subtracted so its visual top edge stays at the requested offset.
pub fn to_output_origin(position: Position, size: Size, page: PageSize) -> (f64, f64) {
    let x = position.x / 100.0 * page.width;
    let y = page.height - position.y / 100.0 * page.height - size.height;
    (x, y)
}

/// Output-space anchor for a text run. No height is subtracted.
pub fn to_output_origin_text(position: Position, page: PageSize) -> (f64, f64) {
    let x = position.x / 100.0 * page.width;
    let y = page.height - position.y / 100.0 * page.height;
    (x, y)
}

/// 画像描画用の矩形（原点 + サイズ）を返す。
pub fn output_rect(position: Position, size: Size, page: PageSize) -> Rect {
    let (x, y) = to_output_origin(position, size, page);
    Rect {
        x,
        y,
        width: size.width,
        height: size.height,
    }
}
