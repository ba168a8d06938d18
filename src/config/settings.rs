use std::path::Path;

use serde::Deserialize;

use crate::error::PdfStampError;
use crate::overlay::Size;
use crate::overlay::store::OverlayDefaults;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub signature_width: f64,
    pub signature_height: f64,
    pub stamp_width: f64,
    pub stamp_height: f64,
    pub timestamp_font_size: f64,
    pub timestamp_color: [f64; 3],
    pub tolerate_encryption: bool,
    pub compress: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            signature_width: 200.0,
            signature_height: 100.0,
            stamp_width: 100.0,
            stamp_height: 100.0,
            timestamp_font_size: 10.0,
            timestamp_color: [0.1, 0.1, 0.1],
            tolerate_encryption: true,
            compress: true,
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        let settings: Settings = serde_yml::from_str(yaml).map_err(|e| {
            PdfStampError::config(format!("Failed to parse settings YAML: {e}"))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// 既定サイズ・フォントサイズは正の有限値、色成分は 0〜1 でなければならない。
    fn validate(&self) -> crate::error::Result<()> {
        let dimensions = [
            ("signature_width", self.signature_width),
            ("signature_height", self.signature_height),
            ("stamp_width", self.stamp_width),
            ("stamp_height", self.stamp_height),
            ("timestamp_font_size", self.timestamp_font_size),
        ];
        for (key, value) in dimensions {
            if !(value.is_finite() && value > 0.0) {
                return Err(PdfStampError::config(format!(
                    "{key} must be a positive number, got {value}"
                )));
            }
        }
        if self
            .timestamp_color
            .iter()
            .any(|c| !(0.0..=1.0).contains(c))
        {
            return Err(PdfStampError::config(format!(
                "timestamp_color components must be within 0.0-1.0, got {:?}",
                self.timestamp_color
            )));
        }
        Ok(())
    }

    pub fn overlay_defaults(&self) -> OverlayDefaults {
        OverlayDefaults {
            signature_size: Size::new(self.signature_width, self.signature_height),
            stamp_size: Size::new(self.stamp_width, self.stamp_height),
            timestamp_font_size: self.timestamp_font_size,
        }
    }
}
