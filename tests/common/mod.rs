#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use vast_ad_driver::PlaybackDriver;
use vast_ad_driver::config::DriverConfig;
use vast_ad_driver::controller::{AdType, Controller, LinearAdInfo, SlotInfo};
use vast_ad_driver::models::{AdDefinition, MediaFile};
use vast_ad_driver::timeline::{BreakPosition, TimelineEntry};
use vast_ad_driver::tracking::{InstanceId, Pinger};
use vast_ad_driver::vpaid::{
    AdUnit, AdUnitEvent, AdUnitEventKind, Capability, CreativeData, EnvironmentVars,
    ExecutionHost, RequestId, ViewMode,
};

pub type Driver = PlaybackDriver<RecordingController, RecordingHost, RecordingPinger>;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Timeline(Vec<TimelineEntry>),
    PodStarted(String, usize),
    PodEnded(String),
    LinearStarted(String, LinearAdInfo),
    LinearEnded(String),
    NonLinearStarted { ad_id: String, url: String },
    NonLinearEnded(String),
    SkipButton(bool, Option<u32>),
    ForcePlay(String, AdType, Vec<String>),
    AdError(String),
    ClickThrough(String),
}

#[derive(Debug, Default)]
pub struct RecordingController {
    pub calls: Vec<Call>,
}

impl RecordingController {
    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| matches(call)).count()
    }

    pub fn pod_ends(&self) -> usize {
        self.count(|call| matches!(call, Call::PodEnded(_)))
    }

    pub fn errors(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::AdError(message) => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Controller for RecordingController {
    fn append_to_timeline(&mut self, entries: Vec<TimelineEntry>) {
        self.calls.push(Call::Timeline(entries));
    }

    fn notify_pod_started(&mut self, pod_id: &str, ad_count: usize) {
        self.calls.push(Call::PodStarted(pod_id.to_string(), ad_count));
    }

    fn notify_pod_ended(&mut self, pod_id: &str) {
        self.calls.push(Call::PodEnded(pod_id.to_string()));
    }

    fn notify_linear_ad_started(&mut self, ad_id: &str, info: &LinearAdInfo) {
        self.calls
            .push(Call::LinearStarted(ad_id.to_string(), info.clone()));
    }

    fn notify_linear_ad_ended(&mut self, ad_id: &str) {
        self.calls.push(Call::LinearEnded(ad_id.to_string()));
    }

    fn notify_nonlinear_ad_ended(&mut self, ad_id: &str) {
        self.calls.push(Call::NonLinearEnded(ad_id.to_string()));
    }

    fn send_url_to_load_and_play_non_linear_ad(&mut self, _ad: &AdDefinition, ad_id: &str, url: &str) {
        self.calls.push(Call::NonLinearStarted {
            ad_id: ad_id.to_string(),
            url: url.to_string(),
        });
    }

    fn show_skip_video_ad_button(&mut self, visible: bool, offset_seconds: Option<u32>) {
        self.calls.push(Call::SkipButton(visible, offset_seconds));
    }

    fn force_ad_to_play(&mut self, name: &str, _ad: &AdDefinition, ad_type: AdType, streams: &[String]) {
        self.calls
            .push(Call::ForcePlay(name.to_string(), ad_type, streams.to_vec()));
    }

    fn raise_ad_error(&mut self, message: &str) {
        self.calls.push(Call::AdError(message.to_string()));
    }

    fn open_click_through(&mut self, url: &str) {
        self.calls.push(Call::ClickThrough(url.to_string()));
    }

    fn slot(&self) -> SlotInfo {
        SlotInfo {
            width: 640,
            height: 360,
            environment: EnvironmentVars {
                slot: "ad-slot".to_string(),
                video_slot: "video".to_string(),
                video_slot_can_autoplay: true,
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingHost {
    pub fetches: Vec<(RequestId, String)>,
    pub loads: Vec<(RequestId, InstanceId, String)>,
    pub timers: Vec<(RequestId, Duration)>,
    pub cancelled: Vec<RequestId>,
}

impl ExecutionHost for RecordingHost {
    fn fetch_vast(&mut self, request: RequestId, url: &str) {
        self.fetches.push((request, url.to_string()));
    }

    fn load_creative(&mut self, request: RequestId, instance: InstanceId, media: &MediaFile) {
        self.loads.push((request, instance, media.url.clone()));
    }

    fn arm_timer(&mut self, request: RequestId, after: Duration) {
        self.timers.push((request, after));
    }

    fn cancel_timer(&mut self, request: RequestId) {
        self.cancelled.push(request);
    }
}

#[derive(Debug, Default)]
pub struct RecordingPinger {
    pub urls: Vec<String>,
}

impl RecordingPinger {
    pub fn count(&self, url: &str) -> usize {
        self.urls.iter().filter(|u| *u == url).count()
    }
}

impl Pinger for RecordingPinger {
    fn ping(&mut self, url: &str) {
        self.urls.push(url.to_string());
    }
}

/// What a mock ad unit was asked to do
#[derive(Debug, Default)]
pub struct UnitLog {
    pub calls: Vec<String>,
    pub subscribed: HashSet<AdUnitEventKind>,
    pub init: Option<(u32, u32, ViewMode, u32, String)>,
}

impl UnitLog {
    pub fn called(&self, name: &str) -> bool {
        self.calls.iter().any(|call| call == name)
    }
}

pub struct MockUnit {
    log: Rc<RefCell<UnitLog>>,
    version: String,
    missing: Vec<Capability>,
}

impl MockUnit {
    pub fn boxed(version: &str) -> (Box<dyn AdUnit>, Rc<RefCell<UnitLog>>) {
        Self::boxed_missing(version, Vec::new())
    }

    pub fn boxed_missing(
        version: &str,
        missing: Vec<Capability>,
    ) -> (Box<dyn AdUnit>, Rc<RefCell<UnitLog>>) {
        let log = Rc::new(RefCell::new(UnitLog::default()));
        let unit = MockUnit {
            log: Rc::clone(&log),
            version: version.to_string(),
            missing,
        };
        (Box::new(unit), log)
    }

    fn record(&self, call: &str) {
        self.log.borrow_mut().calls.push(call.to_string());
    }
}

impl AdUnit for MockUnit {
    fn supports(&self, capability: Capability) -> bool {
        !self.missing.contains(&capability)
    }

    fn handshake_version(&mut self, _proposed: &str) -> String {
        self.record("handshakeVersion");
        self.version.clone()
    }

    fn init_ad(
        &mut self,
        width: u32,
        height: u32,
        view_mode: ViewMode,
        desired_bitrate: u32,
        _environment: &EnvironmentVars,
        creative_data: &CreativeData,
    ) {
        self.record("initAd");
        self.log.borrow_mut().init = Some((
            width,
            height,
            view_mode,
            desired_bitrate,
            creative_data.ad_parameters.clone(),
        ));
    }

    fn start_ad(&mut self) {
        self.record("startAd");
    }

    fn stop_ad(&mut self) {
        self.record("stopAd");
    }

    fn skip_ad(&mut self) {
        self.record("skipAd");
    }

    fn resize_ad(&mut self, _width: u32, _height: u32, _view_mode: ViewMode) {
        self.record("resizeAd");
    }

    fn pause_ad(&mut self) {
        self.record("pauseAd");
    }

    fn resume_ad(&mut self) {
        self.record("resumeAd");
    }

    fn expand_ad(&mut self) {
        self.record("expandAd");
    }

    fn collapse_ad(&mut self) {
        self.record("collapseAd");
    }

    fn subscribe(&mut self, event: AdUnitEventKind) {
        self.log.borrow_mut().subscribed.insert(event);
    }

    fn unsubscribe(&mut self, event: AdUnitEventKind) {
        self.log.borrow_mut().subscribed.remove(&event);
    }
}

pub fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
    std::fs::read_to_string(path).unwrap()
}

/// A VAST 3 linear VPAID ad with start, complete and error tracking
pub fn vpaid_ad(id: &str, sequence: Option<u32>, duration: &str) -> String {
    let sequence = sequence
        .map(|s| format!(r#" sequence="{}""#, s))
        .unwrap_or_default();
    format!(
        r#"<Ad id="{id}"{sequence}><InLine><AdTitle>{id}</AdTitle>
            <Impression>https://track.example/{id}/impression</Impression>
            <Error>https://track.example/{id}/error?code=[ERRORCODE]</Error>
            <Creatives><Creative><Linear>
                <Duration>{duration}</Duration>
                <TrackingEvents>
                    <Tracking event="start">https://track.example/{id}/start</Tracking>
                    <Tracking event="complete">https://track.example/{id}/complete</Tracking>
                </TrackingEvents>
                <MediaFiles><MediaFile type="application/javascript" apiFramework="VPAID">https://cdn.example/{id}.js</MediaFile></MediaFiles>
            </Linear></Creative></Creatives></InLine></Ad>"#
    )
}

pub fn vast3(ads: &[String]) -> String {
    format!(r#"<VAST version="3.0">{}</VAST>"#, ads.concat())
}

pub fn driver() -> Driver {
    driver_with(DriverConfig::default())
}

pub fn driver_with(config: DriverConfig) -> Driver {
    PlaybackDriver::new(
        config,
        RecordingController::default(),
        RecordingHost::default(),
        RecordingPinger::default(),
    )
}

/// Schedule `xml` and start playing it; the head creative is left loading
pub fn play(driver: &mut Driver, xml: &str) {
    driver
        .schedule(xml, BreakPosition::Immediate)
        .expect("break should schedule");
    driver.play_next_break().unwrap();
}

/// The most recent creative load: request, instance and URL
pub fn last_load(driver: &Driver) -> (RequestId, InstanceId, String) {
    driver.host().loads.last().cloned().expect("a creative load")
}

/// Complete the most recent creative load with a mock unit
pub fn load_unit(driver: &mut Driver, version: &str) -> (InstanceId, Rc<RefCell<UnitLog>>) {
    let (request, instance, _) = last_load(driver);
    let (unit, log) = MockUnit::boxed(version);
    driver.on_creative_loaded(request, Ok(unit));
    (instance, log)
}

/// Load, initialize and start the current creative
pub fn start_current(driver: &mut Driver) -> (InstanceId, Rc<RefCell<UnitLog>>) {
    let (instance, log) = load_unit(driver, "2.0");
    driver.handle_event(instance, AdUnitEvent::Loaded);
    driver.handle_event(instance, AdUnitEvent::Started);
    (instance, log)
}
