pub mod job;
pub mod merged;
pub mod settings;

use std::path::Path;

use tracing::debug;

use crate::error::PdfStampError;
use settings::Settings;

/// 設定ファイル名。ジョブファイルと同じディレクトリから探す。
pub const SETTINGS_FILE_NAME: &str = "settings.yaml";

/// ジョブファイルの隣にある `settings.yaml` を読み込む。
///
/// 見つからなければ既定の設定（署名 200x100、スタンプ 100x100 など）を返す。
/// 存在するが不正な場合は `ConfigError`。
pub fn load_settings_for_job(job_file_path: &Path) -> crate::error::Result<Settings> {
    let dir = job_file_path
        .parent()
        .ok_or_else(|| PdfStampError::config("Cannot determine job file directory"))?;

    let settings_path = dir.join(SETTINGS_FILE_NAME);
    if !settings_path.is_file() {
        debug!(job = %job_file_path.display(), "no settings.yaml, using defaults");
        return Ok(Settings::default());
    }

    debug!(path = %settings_path.display(), "loading settings");
    Settings::from_file(&settings_path)
}
