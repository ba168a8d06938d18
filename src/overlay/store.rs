// Overlay Store: authoritative, insertion-ordered collection of overlays.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use tracing::warn;

use super::{ImagePayload, Overlay, OverlayId, OverlayKind, Position, Size, Timestamp};

/// Resize bounds relative to the per-kind default size.
const MIN_SCALE: f64 = 0.5;
const MAX_SCALE: f64 = 2.0;

/// Timestamp font size bounds relative to the default font size.
const MIN_FONT_SCALE: f64 = 0.8;
const MAX_FONT_SCALE: f64 = 1.5;

const DEFAULT_POSITION: Position = Position::new(50.0, 50.0);
const DEFAULT_TIMESTAMP_POSITION: Position = Position::new(50.0, 60.0);

/// 新規オーバーレイの既定値。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayDefaults {
    pub signature_size: Size,
    pub stamp_size: Size,
    pub timestamp_font_size: f64,
}

impl Default for OverlayDefaults {
    fn default() -> Self {
        OverlayDefaults {
            signature_size: Size::new(200.0, 100.0),
            stamp_size: Size::new(100.0, 100.0),
            timestamp_font_size: 10.0,
        }
    }
}

impl OverlayDefaults {
    /// 正の有限値でない項目を組み込みの既定値に置き換える。
    fn sanitized(self) -> Self {
        let fallback = OverlayDefaults::default();
        let size = |size: Size, fallback: Size| {
            Size::new(
                positive_or(size.width, fallback.width),
                positive_or(size.height, fallback.height),
            )
        };
        OverlayDefaults {
            signature_size: size(self.signature_size, fallback.signature_size),
            stamp_size: size(self.stamp_size, fallback.stamp_size),
            timestamp_font_size: positive_or(
                self.timestamp_font_size,
                fallback.timestamp_font_size,
            ),
        }
    }

    fn default_size(&self, kind: &OverlayKind) -> Size {
        match kind {
            OverlayKind::Signature(_) => self.signature_size,
            OverlayKind::Stamp => self.stamp_size,
        }
    }

    /// 幅・高さをそれぞれ既定サイズの 0.5〜2 倍に収める。
    fn clamp_size(&self, kind: &OverlayKind, size: Size) -> Size {
        let base = self.default_size(kind);
        Size::new(
            scale_bounded(size.width, base.width, MIN_SCALE, MAX_SCALE),
            scale_bounded(size.height, base.height, MIN_SCALE, MAX_SCALE),
        )
    }

    fn clamp_font_size(&self, font_size: f64) -> f64 {
        scale_bounded(
            font_size,
            self.timestamp_font_size,
            MIN_FONT_SCALE,
            MAX_FONT_SCALE,
        )
    }
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

/// `value` を `[base * min_scale, base * max_scale]` に収める。`f64::clamp` と違い panic しない。
fn scale_bounded(value: f64, base: f64, min_scale: f64, max_scale: f64) -> f64 {
    value.max(base * min_scale).min(base * max_scale)
}

/// 署名・スタンプのインスタンスを挿入順に保持する。
///
/// 存在しないIDに対する変更操作は何もしない（UIイベントと削除の競合を許容する）。
#[derive(Debug, Clone, Default)]
pub struct OverlayStore {
    overlays: Vec<Overlay>,
    next_seq: u64,
    defaults: OverlayDefaults,
}

impl OverlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 既定値を指定してストアを作る。
    ///
    /// 正の有限値でない既定サイズ・フォントサイズは組み込みの既定値に置き換える。
    pub fn with_defaults(defaults: OverlayDefaults) -> Self {
        let sanitized = defaults.sanitized();
        if sanitized != defaults {
            warn!(?defaults, "invalid overlay defaults replaced with built-in values");
        }
        Self {
            overlays: Vec::new(),
            next_seq: 0,
            defaults: sanitized,
        }
    }

    pub fn defaults(&self) -> &OverlayDefaults {
        &self.defaults
    }

    /// 署名を追加し、新しいIDを返す。`signed_at` は呼び出し側が決める署名時刻。
    pub fn add_signature(
        &mut self,
        payload: ImagePayload,
        page: u32,
        signed_at: DateTime<FixedOffset>,
    ) -> OverlayId {
        let timestamp = Timestamp {
            signed_at,
            position: DEFAULT_TIMESTAMP_POSITION,
            font_size: self.defaults.timestamp_font_size,
            visible: true,
        };
        let size = self.defaults.signature_size;
        self.insert("sig", payload, page, size, OverlayKind::Signature(timestamp))
    }

    /// スタンプを追加し、新しいIDを返す。
    pub fn add_stamp(&mut self, payload: ImagePayload, page: u32) -> OverlayId {
        let size = self.defaults.stamp_size;
        self.insert("stamp", payload, page, size, OverlayKind::Stamp)
    }

    fn insert(
        &mut self,
        prefix: &str,
        payload: ImagePayload,
        page: u32,
        size: Size,
        kind: OverlayKind,
    ) -> OverlayId {
        // The sequence is shared by both kinds, so ids never collide across kinds.
        self.next_seq += 1;
        let id = OverlayId::new(format!("{prefix}-{}", self.next_seq));
        self.overlays.push(Overlay {
            id: id.clone(),
            payload,
            page: page.max(1),
            position: DEFAULT_POSITION,
            size,
            kind,
        });
        id
    }

    pub fn move_signature(&mut self, id: &OverlayId, position: Position) {
        if let Some(overlay) = self.signature_mut(id) {
            overlay.position = position.clamped();
        }
    }

    pub fn resize_signature(&mut self, id: &OverlayId, size: Size) {
        self.resize(id, size, true);
    }

    pub fn move_stamp(&mut self, id: &OverlayId, position: Position) {
        if let Some(overlay) = self.stamp_mut(id) {
            overlay.position = position.clamped();
        }
    }

    pub fn resize_stamp(&mut self, id: &OverlayId, size: Size) {
        self.resize(id, size, false);
    }

    fn resize(&mut self, id: &OverlayId, size: Size, signature: bool) {
        if !size.is_finite() {
            return;
        }
        let defaults = self.defaults;
        let overlay = if signature {
            self.signature_mut(id)
        } else {
            self.stamp_mut(id)
        };
        if let Some(overlay) = overlay {
            overlay.size = defaults.clamp_size(&overlay.kind, size);
        }
    }

    pub fn move_timestamp(&mut self, id: &OverlayId, position: Position) {
        if let Some(ts) = self.timestamp_mut(id) {
            ts.position = position.clamped();
        }
    }

    pub fn resize_timestamp(&mut self, id: &OverlayId, font_size: f64) {
        if !font_size.is_finite() {
            return;
        }
        let font_size = self.defaults.clamp_font_size(font_size);
        if let Some(ts) = self.timestamp_mut(id) {
            ts.font_size = font_size;
        }
    }

    pub fn update_timestamp(
        &mut self,
        id: &OverlayId,
        signed_at: DateTime<FixedOffset>,
        visible: bool,
    ) {
        if let Some(ts) = self.timestamp_mut(id) {
            ts.signed_at = signed_at;
            ts.visible = visible;
        }
    }

    /// ドラッグ操作のパーセンテージ差分を種類を問わず適用する。
    pub fn nudge(&mut self, id: &OverlayId, delta: Position) {
        if let Some(overlay) = self.get_mut(id) {
            overlay.position = overlay.position.offset(delta);
        }
    }

    pub fn nudge_timestamp(&mut self, id: &OverlayId, delta: Position) {
        if let Some(ts) = self.timestamp_mut(id) {
            ts.position = ts.position.offset(delta);
        }
    }

    /// オーバーレイを別ページへ移す。ページ0は無視する。
    pub fn reassign_page(&mut self, id: &OverlayId, page: u32) {
        if page == 0 {
            return;
        }
        if let Some(overlay) = self.get_mut(id) {
            overlay.page = page;
        }
    }

    /// 種類を問わず削除する。削除した場合は true。
    pub fn remove(&mut self, id: &OverlayId) -> bool {
        let before = self.overlays.len();
        self.overlays.retain(|o| &o.id != id);
        self.overlays.len() != before
    }

    pub fn get(&self, id: &OverlayId) -> Option<&Overlay> {
        self.overlays.iter().find(|o| &o.id == id)
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    /// All overlays in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Overlay> {
        self.overlays.iter()
    }

    /// 指定ページ(1-indexed)のオーバーレイを挿入順に返す。
    pub fn overlays_for_page(&self, page: u32) -> Vec<&Overlay> {
        self.overlays.iter().filter(|o| o.page == page).collect()
    }

    /// Snapshot of every overlay grouped by page, pages ascending and
    /// insertion order preserved inside each group.
    ///
    /// Only pages that carry at least one overlay appear as keys.
    pub fn grouped_by_page(&self) -> BTreeMap<u32, Vec<Overlay>> {
        let mut groups: BTreeMap<u32, Vec<Overlay>> = BTreeMap::new();
        for overlay in &self.overlays {
            groups.entry(overlay.page).or_default().push(overlay.clone());
        }
        groups
    }

    fn get_mut(&mut self, id: &OverlayId) -> Option<&mut Overlay> {
        self.overlays.iter_mut().find(|o| &o.id == id)
    }

    fn signature_mut(&mut self, id: &OverlayId) -> Option<&mut Overlay> {
        self.get_mut(id).filter(|o| o.is_signature())
    }

    fn stamp_mut(&mut self, id: &OverlayId) -> Option<&mut Overlay> {
        self.get_mut(id).filter(|o| !o.is_signature())
    }

    fn timestamp_mut(&mut self, id: &OverlayId) -> Option<&mut Timestamp> {
        match self.get_mut(id) {
            Some(Overlay {
                kind: OverlayKind::Signature(ts),
                ..
            }) => Some(ts),
            _ => None,
        }
    }
}
