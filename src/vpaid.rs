//! The execution contract of a VPAID-style ad unit, and the host services the
//! driver needs to load one.

use crate::models::MediaFile;
use crate::tracking::InstanceId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Functions an ad unit must expose before any of its events are trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    HandshakeVersion,
    InitAd,
    StartAd,
    StopAd,
    SkipAd,
    ResizeAd,
    PauseAd,
    ResumeAd,
    ExpandAd,
    CollapseAd,
    Subscribe,
    Unsubscribe,
}

pub const REQUIRED_CAPABILITIES: [Capability; 12] = [
    Capability::HandshakeVersion,
    Capability::InitAd,
    Capability::StartAd,
    Capability::StopAd,
    Capability::SkipAd,
    Capability::ResizeAd,
    Capability::PauseAd,
    Capability::ResumeAd,
    Capability::ExpandAd,
    Capability::CollapseAd,
    Capability::Subscribe,
    Capability::Unsubscribe,
];

impl Capability {
    pub fn function_name(self) -> &'static str {
        match self {
            Capability::HandshakeVersion => "handshakeVersion",
            Capability::InitAd => "initAd",
            Capability::StartAd => "startAd",
            Capability::StopAd => "stopAd",
            Capability::SkipAd => "skipAd",
            Capability::ResizeAd => "resizeAd",
            Capability::PauseAd => "pauseAd",
            Capability::ResumeAd => "resumeAd",
            Capability::ExpandAd => "expandAd",
            Capability::CollapseAd => "collapseAd",
            Capability::Subscribe => "subscribe",
            Capability::Unsubscribe => "unsubscribe",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Normal,
    Fullscreen,
    Thumbnail,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViewMode::Normal => "normal",
            ViewMode::Fullscreen => "fullscreen",
            ViewMode::Thumbnail => "thumbnail",
        };
        f.write_str(name)
    }
}

/// Host handles given to the creative on init
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnvironmentVars {
    /// Element the creative may render into
    pub slot: String,

    /// The host video element the creative plays through
    pub video_slot: String,

    pub video_slot_can_autoplay: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreativeData {
    pub ad_parameters: String,
}

/// A loaded ad unit running in its own execution context.
///
/// Events raised by the unit reach the driver through
/// `PlaybackDriver::handle_event`, never from inside these calls.
pub trait AdUnit {
    /// Whether the unit exposes the given function
    fn supports(&self, capability: Capability) -> bool;

    fn handshake_version(&mut self, proposed: &str) -> String;

    fn init_ad(
        &mut self,
        width: u32,
        height: u32,
        view_mode: ViewMode,
        desired_bitrate: u32,
        environment: &EnvironmentVars,
        creative_data: &CreativeData,
    );

    fn start_ad(&mut self);

    fn stop_ad(&mut self);

    fn skip_ad(&mut self);

    fn resize_ad(&mut self, width: u32, height: u32, view_mode: ViewMode);

    fn pause_ad(&mut self);

    fn resume_ad(&mut self);

    fn expand_ad(&mut self);

    fn collapse_ad(&mut self);

    fn subscribe(&mut self, event: AdUnitEventKind);

    fn unsubscribe(&mut self, event: AdUnitEventKind);
}

/// Lifecycle signals raised by an ad unit
#[derive(Debug, Clone, PartialEq)]
pub enum AdUnitEvent {
    Loaded,
    Started,
    Stopped,
    Skipped,
    SkippableStateChange { skippable: bool },
    DurationChange { duration: f64 },
    SizeChange,
    LinearChange { linear: bool },
    Interaction { id: Option<String> },
    Impression,
    ClickThru {
        url: Option<String>,
        id: Option<String>,
        player_handles: bool,
    },
    Paused,
    Playing,
    VideoStart,
    VideoFirstQuartile,
    VideoMidpoint,
    VideoThirdQuartile,
    VideoComplete,
    Error { message: String },
    RemainingTimeChange { remaining: f64 },
    VolumeChange { volume: f64 },
    UserAcceptInvitation,
    UserMinimize,
    UserClose,
}

/// Event names used for subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdUnitEventKind {
    Loaded,
    Started,
    Stopped,
    Skipped,
    SkippableStateChange,
    DurationChange,
    SizeChange,
    LinearChange,
    Interaction,
    Impression,
    ClickThru,
    Paused,
    Playing,
    VideoStart,
    VideoFirstQuartile,
    VideoMidpoint,
    VideoThirdQuartile,
    VideoComplete,
    Error,
    RemainingTimeChange,
    VolumeChange,
    UserAcceptInvitation,
    UserMinimize,
    UserClose,
}

impl AdUnitEventKind {
    pub const ALL: [AdUnitEventKind; 24] = [
        AdUnitEventKind::Loaded,
        AdUnitEventKind::Started,
        AdUnitEventKind::Stopped,
        AdUnitEventKind::Skipped,
        AdUnitEventKind::SkippableStateChange,
        AdUnitEventKind::DurationChange,
        AdUnitEventKind::SizeChange,
        AdUnitEventKind::LinearChange,
        AdUnitEventKind::Interaction,
        AdUnitEventKind::Impression,
        AdUnitEventKind::ClickThru,
        AdUnitEventKind::Paused,
        AdUnitEventKind::Playing,
        AdUnitEventKind::VideoStart,
        AdUnitEventKind::VideoFirstQuartile,
        AdUnitEventKind::VideoMidpoint,
        AdUnitEventKind::VideoThirdQuartile,
        AdUnitEventKind::VideoComplete,
        AdUnitEventKind::Error,
        AdUnitEventKind::RemainingTimeChange,
        AdUnitEventKind::VolumeChange,
        AdUnitEventKind::UserAcceptInvitation,
        AdUnitEventKind::UserMinimize,
        AdUnitEventKind::UserClose,
    ];

    /// The VPAID event name
    pub fn name(self) -> &'static str {
        match self {
            AdUnitEventKind::Loaded => "AdLoaded",
            AdUnitEventKind::Started => "AdStarted",
            AdUnitEventKind::Stopped => "AdStopped",
            AdUnitEventKind::Skipped => "AdSkipped",
            AdUnitEventKind::SkippableStateChange => "AdSkippableStateChange",
            AdUnitEventKind::DurationChange => "AdDurationChange",
            AdUnitEventKind::SizeChange => "AdSizeChange",
            AdUnitEventKind::LinearChange => "AdLinearChange",
            AdUnitEventKind::Interaction => "AdInteraction",
            AdUnitEventKind::Impression => "AdImpression",
            AdUnitEventKind::ClickThru => "AdClickThru",
            AdUnitEventKind::Paused => "AdPaused",
            AdUnitEventKind::Playing => "AdPlaying",
            AdUnitEventKind::VideoStart => "AdVideoStart",
            AdUnitEventKind::VideoFirstQuartile => "AdVideoFirstQuartile",
            AdUnitEventKind::VideoMidpoint => "AdVideoMidpoint",
            AdUnitEventKind::VideoThirdQuartile => "AdVideoThirdQuartile",
            AdUnitEventKind::VideoComplete => "AdVideoComplete",
            AdUnitEventKind::Error => "AdError",
            AdUnitEventKind::RemainingTimeChange => "AdRemainingTimeChange",
            AdUnitEventKind::VolumeChange => "AdVolumeChange",
            AdUnitEventKind::UserAcceptInvitation => "AdUserAcceptInvitation",
            AdUnitEventKind::UserMinimize => "AdUserMinimize",
            AdUnitEventKind::UserClose => "AdUserClose",
        }
    }
}

impl AdUnitEvent {
    pub fn kind(&self) -> AdUnitEventKind {
        match self {
            AdUnitEvent::Loaded => AdUnitEventKind::Loaded,
            AdUnitEvent::Started => AdUnitEventKind::Started,
            AdUnitEvent::Stopped => AdUnitEventKind::Stopped,
            AdUnitEvent::Skipped => AdUnitEventKind::Skipped,
            AdUnitEvent::SkippableStateChange { .. } => AdUnitEventKind::SkippableStateChange,
            AdUnitEvent::DurationChange { .. } => AdUnitEventKind::DurationChange,
            AdUnitEvent::SizeChange => AdUnitEventKind::SizeChange,
            AdUnitEvent::LinearChange { .. } => AdUnitEventKind::LinearChange,
            AdUnitEvent::Interaction { .. } => AdUnitEventKind::Interaction,
            AdUnitEvent::Impression => AdUnitEventKind::Impression,
            AdUnitEvent::ClickThru { .. } => AdUnitEventKind::ClickThru,
            AdUnitEvent::Paused => AdUnitEventKind::Paused,
            AdUnitEvent::Playing => AdUnitEventKind::Playing,
            AdUnitEvent::VideoStart => AdUnitEventKind::VideoStart,
            AdUnitEvent::VideoFirstQuartile => AdUnitEventKind::VideoFirstQuartile,
            AdUnitEvent::VideoMidpoint => AdUnitEventKind::VideoMidpoint,
            AdUnitEvent::VideoThirdQuartile => AdUnitEventKind::VideoThirdQuartile,
            AdUnitEvent::VideoComplete => AdUnitEventKind::VideoComplete,
            AdUnitEvent::Error { .. } => AdUnitEventKind::Error,
            AdUnitEvent::RemainingTimeChange { .. } => AdUnitEventKind::RemainingTimeChange,
            AdUnitEvent::VolumeChange { .. } => AdUnitEventKind::VolumeChange,
            AdUnitEvent::UserAcceptInvitation => AdUnitEventKind::UserAcceptInvitation,
            AdUnitEvent::UserMinimize => AdUnitEventKind::UserMinimize,
            AdUnitEvent::UserClose => AdUnitEventKind::UserClose,
        }
    }
}

/// Correlates an asynchronous request with its completion and its timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RequestId(pub u64);

/// Host services for fetching responses, loading creatives and arming timers.
///
/// Completions are reported back through `PlaybackDriver::on_ad_response`,
/// `on_creative_loaded` and `on_timeout`.
pub trait ExecutionHost {
    fn fetch_vast(&mut self, request: RequestId, url: &str);

    /// Load the creative script into an isolated execution context
    fn load_creative(&mut self, request: RequestId, instance: InstanceId, media: &MediaFile);

    fn arm_timer(&mut self, request: RequestId, after: Duration);

    fn cancel_timer(&mut self, request: RequestId);
}

/// Major component of a VPAID version string
pub fn major_version(version: &str) -> Option<u32> {
    version.trim().split('.').next()?.parse().ok()
}
