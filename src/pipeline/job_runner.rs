// ジョブ単位: PDF読込 -> オーバーレイ構築 -> 合成 -> 出力

use std::path::{Path, PathBuf};

use tracing::info;

use crate::compose::Composer;
use crate::config::job::OverlayEntry;
use crate::config::merged::MergedConfig;
use crate::error::CompositionError;
use crate::overlay::store::OverlayStore;
use crate::overlay::{ImagePayload, OverlayId};
use crate::pdf::document::LopdfProvider;

/// Configuration for a single job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Directory that relative image paths are resolved against.
    pub base_dir: PathBuf,
    pub overlays: Vec<OverlayEntry>,
    pub merged: MergedConfig,
}

/// Result of processing a single job.
#[derive(Debug)]
pub struct JobResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub overlays_composed: usize,
    pub output_bytes: usize,
}

/// Run a single job: load the source PDF, build the overlay store from the
/// job's entries, compose, and write the output file.
///
/// Nothing is written when composition fails.
pub fn run_job(config: &JobConfig) -> crate::error::Result<JobResult> {
    let source = std::fs::read(&config.input_path)?;
    let store = build_store(config)?;

    let composer = Composer::new(
        LopdfProvider {
            compress: config.merged.compress,
        },
        config.merged.compose_options(),
    );
    let bytes = composer
        .compose(&source, &store)
        .map_err(CompositionError::into_cause)?;

    std::fs::write(&config.output_path, &bytes)?;
    info!(
        input = %config.input_path.display(),
        output = %config.output_path.display(),
        overlays = store.len(),
        "wrote composed document"
    );

    Ok(JobResult {
        input_path: config.input_path.clone(),
        output_path: config.output_path.clone(),
        overlays_composed: store.len(),
        output_bytes: bytes.len(),
    })
}

/// ジョブのオーバーレイ指定からストアを構築する（指定順 = 描画順）。
pub fn build_store(config: &JobConfig) -> crate::error::Result<OverlayStore> {
    let mut store = OverlayStore::with_defaults(config.merged.defaults);

    for entry in &config.overlays {
        let image_path = resolve_path(&config.base_dir, entry.image());
        let payload = ImagePayload::from_bytes(std::fs::read(&image_path)?);

        match entry {
            OverlayEntry::Signature {
                page,
                position,
                scale,
                signed_at,
                timestamp,
                ..
            } => {
                let id = store.add_signature(payload, *page, *signed_at);
                if let Some(position) = position {
                    store.move_signature(&id, *position);
                }
                if let Some(scale) = scale {
                    let size = store.defaults().signature_size.scaled(*scale);
                    store.resize_signature(&id, size);
                }
                if let Some(ts) = timestamp {
                    apply_timestamp(&mut store, &id, ts, *signed_at);
                }
            }
            OverlayEntry::Stamp {
                page,
                position,
                scale,
                ..
            } => {
                let id = store.add_stamp(payload, *page);
                if let Some(position) = position {
                    store.move_stamp(&id, *position);
                }
                if let Some(scale) = scale {
                    let size = store.defaults().stamp_size.scaled(*scale);
                    store.resize_stamp(&id, size);
                }
            }
        }
    }

    Ok(store)
}

fn apply_timestamp(
    store: &mut OverlayStore,
    id: &OverlayId,
    ts: &crate::config::job::TimestampEntry,
    signed_at: chrono::DateTime<chrono::FixedOffset>,
) {
    if let Some(position) = ts.position {
        store.move_timestamp(id, position);
    }
    if let Some(font_size) = ts.font_size {
        store.resize_timestamp(id, font_size);
    }
    store.update_timestamp(id, signed_at, ts.visible);
}

/// Resolve a potentially relative path against a base directory.
/// If the path is already absolute, return it as-is.
pub fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}
