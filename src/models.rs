use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A parsed ad-break response: one VAST document and its normalized ads
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct VastResponse {
    /// The VAST version (e.g., "2.0", "3.0")
    pub version: String,

    /// The ads that survived normalization, in document order
    pub ads: Vec<AdDefinition>,

    /// Root-level error URLs (sent by servers that have no ad to return)
    pub error_urls: Vec<String>,
}

/// Whether an ad carries its creative inline or points at another VAST document
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum AdKind {
    Inline,
    Wrapper,
}

/// One `<Ad>` element normalized into the driver's internal model.
///
/// Produced once per response by the parser and read-only afterwards.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AdDefinition {
    /// The ad ID
    pub id: Option<String>,

    /// Position within a pod; `None` means the ad is not podded
    pub sequence: Option<u32>,

    /// The VAST version of the response this ad came from
    pub version: String,

    pub kind: AdKind,

    pub linear: Option<LinearPayload>,

    pub non_linear: Option<NonLinearPayload>,

    pub companions: Vec<CompanionAd>,

    /// Impression tracking URLs
    pub impressions: Vec<String>,

    /// Error tracking URLs
    pub error_urls: Vec<String>,

    /// The ad title
    pub title: String,

    /// The VASTAdTagURI of a wrapper ad
    pub wrapper_redirect_url: Option<String>,
}

impl AdDefinition {
    pub fn is_linear(&self) -> bool {
        self.linear.is_some()
    }

    /// Duration of the linear creative, or the suggested display time of a non-linear one
    pub fn duration_seconds(&self) -> f64 {
        match (&self.linear, &self.non_linear) {
            (Some(linear), _) => linear.duration_seconds,
            (None, Some(non_linear)) => non_linear.min_suggested_duration.unwrap_or(0.0),
            (None, None) => 0.0,
        }
    }

    pub fn click_through(&self) -> Option<&str> {
        self.linear
            .as_ref()
            .and_then(|l| l.click_through.as_deref())
            .or_else(|| self.non_linear.as_ref().and_then(|n| n.click_through.as_deref()))
    }

    /// Id used when reporting this ad to the controller
    pub fn display_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.title)
    }
}

/// The playable part of a linear creative
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct LinearPayload {
    pub media_files: Vec<MediaFile>,

    /// `Duration` converted from `HH:MM:SS.mmm`
    pub duration_seconds: f64,

    pub click_through: Option<String>,

    pub click_tracking: Vec<String>,

    pub custom_click: Vec<String>,

    /// Tracking URLs keyed by event; several trackers per event are kept
    pub tracking: HashMap<EventKind, Vec<String>>,

    /// The raw `skipoffset` attribute, either a timecode or a percentage
    pub skip_offset_raw: Option<String>,

    /// `AdParameters` handed to the ad unit on init
    pub ad_parameters: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum ResourceKind {
    Static,
    IFrame,
    Html,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct NonLinearPayload {
    pub resource_kind: ResourceKind,

    /// Resource URL, or inline markup for HTML resources
    pub resource_data: String,

    /// `creativeType` of a static resource
    pub creative_type: Option<String>,

    pub api_framework: Option<String>,

    pub width: u32,

    pub height: u32,

    pub expanded_width: Option<u32>,

    pub expanded_height: Option<u32>,

    pub min_suggested_duration: Option<f64>,

    pub click_through: Option<String>,

    pub click_tracking: Vec<String>,

    pub tracking: HashMap<EventKind, Vec<String>>,

    pub ad_parameters: Option<String>,
}

/// Represents a media file
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct MediaFile {
    /// The media file URL
    pub url: String,

    /// The media file MIME type
    pub mime_type: String,

    /// Execution framework the file targets (e.g. "VPAID")
    pub api_framework: Option<String>,

    pub width: Option<u32>,

    pub height: Option<u32>,

    pub bitrate: Option<u32>,

    /// The media file delivery type (progressive or streaming)
    pub delivery: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct CompanionAd {
    pub resource_kind: ResourceKind,

    pub data: String,

    pub width: u32,

    pub height: u32,

    pub click_through: Option<String>,
}

/// A tracking event name from `Tracking@event`, plus the driver-level keys
/// (impression, error, click tracking) that share the same at-most-once table.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum EventKind {
    Impression,
    CreativeView,
    Start,
    FirstQuartile,
    Midpoint,
    ThirdQuartile,
    Complete,
    Mute,
    Unmute,
    Pause,
    Resume,
    Rewind,
    Fullscreen,
    ExitFullscreen,
    Expand,
    Collapse,
    AcceptInvitation,
    Close,
    Skip,
    Progress,
    ClickTracking,
    Error,
    Other(String),
}

impl EventKind {
    pub fn parse(name: &str) -> Self {
        match name {
            "impression" => EventKind::Impression,
            "creativeView" => EventKind::CreativeView,
            "start" => EventKind::Start,
            "firstQuartile" => EventKind::FirstQuartile,
            "midpoint" => EventKind::Midpoint,
            "thirdQuartile" => EventKind::ThirdQuartile,
            "complete" => EventKind::Complete,
            "mute" => EventKind::Mute,
            "unmute" => EventKind::Unmute,
            "pause" => EventKind::Pause,
            "resume" => EventKind::Resume,
            "rewind" => EventKind::Rewind,
            "fullscreen" => EventKind::Fullscreen,
            "exitFullscreen" => EventKind::ExitFullscreen,
            "expand" => EventKind::Expand,
            "collapse" => EventKind::Collapse,
            "acceptInvitation" | "acceptInvitationLinear" => EventKind::AcceptInvitation,
            "close" | "closeLinear" => EventKind::Close,
            "skip" => EventKind::Skip,
            "progress" => EventKind::Progress,
            "clickTracking" => EventKind::ClickTracking,
            "error" => EventKind::Error,
            other => EventKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Impression => "impression",
            EventKind::CreativeView => "creativeView",
            EventKind::Start => "start",
            EventKind::FirstQuartile => "firstQuartile",
            EventKind::Midpoint => "midpoint",
            EventKind::ThirdQuartile => "thirdQuartile",
            EventKind::Complete => "complete",
            EventKind::Mute => "mute",
            EventKind::Unmute => "unmute",
            EventKind::Pause => "pause",
            EventKind::Resume => "resume",
            EventKind::Rewind => "rewind",
            EventKind::Fullscreen => "fullscreen",
            EventKind::ExitFullscreen => "exitFullscreen",
            EventKind::Expand => "expand",
            EventKind::Collapse => "collapse",
            EventKind::AcceptInvitation => "acceptInvitation",
            EventKind::Close => "close",
            EventKind::Skip => "skip",
            EventKind::Progress => "progress",
            EventKind::ClickTracking => "clickTracking",
            EventKind::Error => "error",
            EventKind::Other(name) => name,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl From<String> for EventKind {
    fn from(name: String) -> Self {
        EventKind::parse(&name)
    }
}

/// Index of an ad inside the batch that owns it
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct AdIndex(pub usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_round_trip_through_strings() {
        for name in ["firstQuartile", "midpoint", "skip", "closeLinear", "otherEvent"] {
            let kind = EventKind::parse(name);
            assert_eq!(EventKind::parse(kind.as_str()), kind);
        }
        assert_eq!(EventKind::parse("closeLinear"), EventKind::Close);
        assert_eq!(
            EventKind::parse("loaded"),
            EventKind::Other("loaded".to_string())
        );
    }

    #[test]
    fn tracking_tables_serialize_with_string_keys() {
        let mut linear = LinearPayload::default();
        linear
            .tracking
            .insert(EventKind::Midpoint, vec!["https://t.example/mid".to_string()]);
        let json = serde_json::to_string(&linear).unwrap();
        assert!(json.contains("\"midpoint\""));
    }
}
