use crate::models::AdDefinition;
use crate::timeline::TimelineEntry;
use crate::vpaid::EnvironmentVars;
use serde::Serialize;

/// What the controller learns when a linear ad starts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearAdInfo {
    pub name: String,
    pub duration: f64,
    pub has_click_url: bool,
    pub index_in_pod: usize,
    pub skippable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdType {
    Linear,
    NonLinear,
}

/// The player slot an ad unit is initialized into
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SlotInfo {
    pub width: u32,
    pub height: u32,
    pub environment: EnvironmentVars,
}

/// The host player receiving the timeline and playback notifications
pub trait Controller {
    fn append_to_timeline(&mut self, entries: Vec<TimelineEntry>);

    fn notify_pod_started(&mut self, pod_id: &str, ad_count: usize);

    fn notify_pod_ended(&mut self, pod_id: &str);

    fn notify_linear_ad_started(&mut self, ad_id: &str, info: &LinearAdInfo);

    fn notify_linear_ad_ended(&mut self, ad_id: &str);

    fn notify_nonlinear_ad_ended(&mut self, ad_id: &str);

    fn send_url_to_load_and_play_non_linear_ad(&mut self, ad: &AdDefinition, ad_id: &str, url: &str);

    fn show_skip_video_ad_button(&mut self, visible: bool, offset_seconds: Option<u32>);

    /// Switch the player into ad mode for a creative that changed linearity
    fn force_ad_to_play(&mut self, name: &str, ad: &AdDefinition, ad_type: AdType, streams: &[String]);

    fn raise_ad_error(&mut self, message: &str);

    fn open_click_through(&mut self, url: &str);

    /// Current slot size and environment handles
    fn slot(&self) -> SlotInfo;
}
