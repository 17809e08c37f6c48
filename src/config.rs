use crate::vpaid::ViewMode;
use serde::Deserialize;
use std::time::Duration;

/// Playback driver settings supplied by the host
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// `apiFramework` a media file must declare to be playable
    pub api_framework: String,

    /// VPAID version proposed during the handshake; its major must match the unit's
    pub vpaid_version: String,

    /// Bitrate in kbps requested from the creative
    pub desired_bitrate: u32,

    pub view_mode: ViewMode,

    /// Skip delay for skippable-version ads that carry no `skipoffset`
    pub default_skip_delay_secs: Option<u32>,

    pub ad_request_timeout_ms: u64,

    pub creative_load_timeout_ms: u64,

    pub init_timeout_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            api_framework: "VPAID".to_string(),
            vpaid_version: "2.0".to_string(),
            desired_bitrate: 256,
            view_mode: ViewMode::Normal,
            default_skip_delay_secs: None,
            ad_request_timeout_ms: 3_000,
            creative_load_timeout_ms: 8_000,
            init_timeout_ms: 5_000,
        }
    }
}

impl DriverConfig {
    pub fn ad_request_timeout(&self) -> Duration {
        Duration::from_millis(self.ad_request_timeout_ms)
    }

    pub fn creative_load_timeout(&self) -> Duration {
        Duration::from_millis(self.creative_load_timeout_ms)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }
}
