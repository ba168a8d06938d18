use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use crate::error::PdfStampError;
use crate::overlay::Position;

#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub input: String,
    pub output: Option<String>,
    pub tolerate_encryption: Option<bool>,
    pub compress: Option<bool>,
    /// 描画順（挿入順）に並んだオーバーレイ。
    #[serde(default)]
    pub overlays: Vec<OverlayEntry>,
}

/// ジョブファイル内のオーバーレイ指定。`kind` で署名かスタンプかを区別する。
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OverlayEntry {
    Signature {
        image: String,
        #[serde(default = "first_page")]
        page: u32,
        position: Option<Position>,
        scale: Option<f64>,
        signed_at: DateTime<FixedOffset>,
        timestamp: Option<TimestampEntry>,
    },
    Stamp {
        image: String,
        #[serde(default = "first_page")]
        page: u32,
        position: Option<Position>,
        scale: Option<f64>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimestampEntry {
    pub position: Option<Position>,
    pub font_size: Option<f64>,
    #[serde(default = "visible_by_default")]
    pub visible: bool,
}

fn first_page() -> u32 {
    1
}

fn visible_by_default() -> bool {
    true
}

impl OverlayEntry {
    pub fn image(&self) -> &str {
        match self {
            OverlayEntry::Signature { image, .. } | OverlayEntry::Stamp { image, .. } => image,
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            OverlayEntry::Signature { page, .. } | OverlayEntry::Stamp { page, .. } => *page,
        }
    }

    fn scale(&self) -> Option<f64> {
        match self {
            OverlayEntry::Signature { scale, .. } | OverlayEntry::Stamp { scale, .. } => *scale,
        }
    }
}

impl JobFile {
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        let job_file: JobFile = serde_yml::from_str(yaml)
            .map_err(|e| PdfStampError::config(format!("Failed to parse job YAML: {e}")))?;
        for job in &job_file.jobs {
            job.validate()?;
        }
        Ok(job_file)
    }
}

impl Job {
    /// ページ番号とスケールの妥当性を検証する。
    ///
    /// ページ番号の上限は文書を開くまで分からないため、合成時に検証される。
    pub fn validate(&self) -> crate::error::Result<()> {
        for (i, entry) in self.overlays.iter().enumerate() {
            if entry.page() == 0 {
                return Err(PdfStampError::config(format!(
                    "{}: overlay #{} has page 0 (pages are 1-based)",
                    self.input,
                    i + 1
                )));
            }
            if let Some(scale) = entry.scale()
                && !(scale.is_finite() && scale > 0.0)
            {
                return Err(PdfStampError::config(format!(
                    "{}: overlay #{} has invalid scale {scale}",
                    self.input,
                    i + 1
                )));
            }
        }
        Ok(())
    }

    /// 出力パス。未指定なら入力ファイル名から導出する。
    pub fn output_or_default(&self) -> String {
        match &self.output {
            Some(output) => output.clone(),
            None => default_output_name(&self.input),
        }
    }
}

/// `contract.pdf` -> `contract_signed.pdf`。拡張子が `.pdf` でなければ末尾に付け足す。
pub fn default_output_name(input: &str) -> String {
    let stem = input.strip_suffix(".pdf").unwrap_or(input);
    format!("{stem}_signed.pdf")
}
