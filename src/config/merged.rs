use super::job::Job;
use super::settings::Settings;
use crate::compose::ComposeOptions;
use crate::overlay::store::OverlayDefaults;
use crate::pdf::provider::{OpenOptions, StandardFont};

#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub defaults: OverlayDefaults,
    pub timestamp_color: [f64; 3],
    pub tolerate_encryption: bool,
    pub compress: bool,
}

impl MergedConfig {
    /// JobのOption値がSomeならJobの値を、NoneならSettingsの値を使用する。
    pub fn new(settings: &Settings, job: &Job) -> Self {
        MergedConfig {
            defaults: settings.overlay_defaults(),
            timestamp_color: settings.timestamp_color,
            tolerate_encryption: job
                .tolerate_encryption
                .unwrap_or(settings.tolerate_encryption),
            compress: job.compress.unwrap_or(settings.compress),
        }
    }

    pub fn compose_options(&self) -> ComposeOptions {
        ComposeOptions {
            open: OpenOptions {
                tolerate_encryption_markers: self.tolerate_encryption,
            },
            timestamp_font: StandardFont::HelveticaBold,
            timestamp_color: self.timestamp_color.into(),
        }
    }
}
