//! Per-ad-break playback state machine.
//!
//! The driver is fed by three kinds of callbacks, each processed to completion
//! before the next: completions from the [`ExecutionHost`] (responses, loaded
//! creatives, timeouts), events from the current [`AdUnit`], and commands from
//! the controller. Nothing in here blocks or spawns.

use crate::config::DriverConfig;
use crate::controller::{AdType, Controller, LinearAdInfo};
use crate::error::{DriverError, ErrorCode, VastError};
use crate::models::{AdIndex, EventKind};
use crate::parser::parse_vast;
use crate::selector::select_creative;
use crate::session::{
    AdInstance, PlaybackSession, PlaybackState, RequestKind, RequestTimer, quartiles_reached,
    skip_offset_seconds,
};
use crate::timeline::{BreakPosition, ScheduledBreak, TimelineEntry, schedule_response};
use crate::tracking::{InstanceId, Pinger, expand_macros, tracking_table};
use crate::version::Capabilities;
use crate::vpaid::{
    AdUnit, AdUnitEvent, AdUnitEventKind, CreativeData, ExecutionHost, REQUIRED_CAPABILITIES,
    RequestId, ViewMode, major_version,
};
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::sync::Arc;

pub struct PlaybackDriver<C, H, P> {
    config: DriverConfig,
    controller: C,
    host: H,
    pinger: P,
    state: PlaybackState,
    session: Option<PlaybackSession>,
    ad_request: RequestTimer,
    request_position: Option<BreakPosition>,
    queue: VecDeque<ScheduledBreak>,
    next_request: u64,
    next_instance: u64,
    next_pod: u64,
}

impl<C: Controller, H: ExecutionHost, P: Pinger> PlaybackDriver<C, H, P> {
    pub fn new(config: DriverConfig, controller: C, host: H, pinger: P) -> Self {
        Self {
            config,
            controller,
            host,
            pinger,
            state: PlaybackState::Idle,
            session: None,
            ad_request: RequestTimer::default(),
            request_position: None,
            queue: VecDeque::new(),
            next_request: 0,
            next_instance: 0,
            next_pod: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn pinger(&self) -> &P {
        &self.pinger
    }

    /// Breaks scheduled but not yet played, oldest first
    pub fn queued_breaks(&self) -> impl Iterator<Item = &ScheduledBreak> {
        self.queue.iter()
    }

    /// Ask the host for a VAST response. Only one ad request may be outstanding.
    pub fn request_ad_break(
        &mut self,
        url: &str,
        position: BreakPosition,
    ) -> Result<RequestId, DriverError> {
        let request = self.next_request_id();
        self.ad_request.arm(request, RequestKind::AdResponse)?;
        self.request_position = Some(position);

        debug!("Requesting ad break {:?} from {}", request, url);
        self.host.arm_timer(request, self.config.ad_request_timeout());
        self.host.fetch_vast(request, url);
        Ok(request)
    }

    /// Give up on the outstanding ad request, if any
    pub fn cancel_ad_request(&mut self) {
        if let Some((request, _)) = self.ad_request.take() {
            debug!("Cancelling ad request {:?}", request);
            self.host.cancel_timer(request);
            self.request_position = None;
        }
    }

    pub fn on_ad_response(&mut self, request: RequestId, response: Result<String, String>) {
        if self.ad_request.complete(request).is_none() {
            debug!("Ignoring stale ad response {:?}", request);
            return;
        }
        self.host.cancel_timer(request);
        let position = self
            .request_position
            .take()
            .unwrap_or(BreakPosition::Immediate);

        match response {
            Ok(xml) => {
                self.schedule(&xml, position);
            }
            Err(message) => {
                warn!("Ad request {:?} failed: {}", request, message);
                self.controller
                    .raise_ad_error(&format!("No ads available: {}", message));
            }
        }
    }

    /// Resolve a VAST response into a timeline entry, hand it to the
    /// controller and queue it for playback
    pub fn schedule(&mut self, xml: &str, position: BreakPosition) -> Option<TimelineEntry> {
        let response = match parse_vast(xml) {
            Ok(response) => response,
            Err(e) => {
                self.reject_response(&e, &[]);
                return None;
            }
        };
        let error_urls = response.error_urls.clone();

        match schedule_response(response, position, &self.config.api_framework) {
            Ok(scheduled) => {
                let entry = scheduled.entry.clone();
                info!(
                    "Scheduled ad break at {:?} headed by {}",
                    entry.position,
                    scheduled.ad_break.ad(entry.head).display_id()
                );
                self.controller.append_to_timeline(vec![entry.clone()]);
                self.queue.push_back(scheduled);
                Some(entry)
            }
            Err(e) => {
                self.reject_response(&e, &error_urls);
                None
            }
        }
    }

    /// Report an unusable response, pinging its root error URLs
    fn reject_response(&mut self, e: &VastError, error_urls: &[String]) {
        warn!("Rejecting ad break response: {}", e);
        for url in error_urls {
            self.pinger.ping(&expand_macros(url, Some(e.code())));
        }

        let message = match e {
            VastError::NoAds => e.to_string(),
            _ => format!("No ads available: {}", e),
        };
        self.controller.raise_ad_error(&message);
    }

    /// Start the oldest queued break
    pub fn play_next_break(&mut self) -> Result<(), DriverError> {
        self.ensure_no_session()?;
        let scheduled = self.queue.pop_front().ok_or(DriverError::NothingScheduled)?;
        self.play(scheduled)
    }

    /// Start a new session for a scheduled break
    pub fn play(&mut self, scheduled: ScheduledBreak) -> Result<(), DriverError> {
        self.ensure_no_session()?;

        self.next_pod += 1;
        let head = scheduled.entry.head;
        let instance = AdInstance::new(self.next_instance_id(), head, head, false);
        let session = PlaybackSession::new(
            scheduled.ad_break,
            format!("pod-{}", self.next_pod),
            instance,
        );
        info!(
            "Starting {} with {} ({} ads)",
            session.pod_id,
            session.pod_primary_id,
            session.ad_break.pod_len(head)
        );

        self.session = Some(session);
        self.state = PlaybackState::Idle;
        self.load_current();
        Ok(())
    }

    /// Cancel the current session from any state. A no-op when idle.
    pub fn cancel(&mut self) {
        let Some(session) = self.session.as_ref() else {
            debug!("Cancel with no active session");
            return;
        };
        info!("Cancelling {} in state {}", session.pod_id, self.state);

        let stop = self.state.is_active();
        self.close_current(stop);
        self.end_pod();
        self.state = PlaybackState::Idle;
    }

    pub fn on_creative_loaded(
        &mut self,
        request: RequestId,
        result: Result<Box<dyn AdUnit>, String>,
    ) {
        let Some(session) = self.session.as_mut() else {
            debug!("Ignoring creative {:?} with no active session", request);
            return;
        };
        if session.timer.complete(request).is_none() {
            debug!("Ignoring stale creative load {:?}", request);
            return;
        }
        self.host.cancel_timer(request);

        match result {
            Ok(unit) => {
                session.current.unit = Some(unit);
                self.handshake();
            }
            Err(message) => self.escalate(
                ErrorCode::MediaUnplayable,
                format!("Creative failed to load: {}", message),
            ),
        }
    }

    pub fn on_timeout(&mut self, request: RequestId) {
        if self.ad_request.complete(request).is_some() {
            warn!("Ad request {:?} timed out", request);
            self.request_position = None;
            self.controller
                .raise_ad_error("No ads available: ad request timed out");
            return;
        }

        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.timer.complete(request) {
            Some(kind) => self.escalate(
                ErrorCode::Timeout,
                format!("Timed out waiting for {:?}", kind),
            ),
            None => debug!("Ignoring stale timeout {:?}", request),
        }
    }

    /// Dispatch an event raised by the ad unit of `instance`
    pub fn handle_event(&mut self, instance: InstanceId, event: AdUnitEvent) {
        let kind = event.kind();
        let Some(session) = self.session.as_ref() else {
            debug!("Ignoring {} with no active session", kind.name());
            return;
        };
        if session.current.id != instance || !session.current.subscriptions.contains(&kind) {
            debug!("Ignoring {} from {:?}", kind.name(), instance);
            return;
        }

        match event {
            AdUnitEvent::Loaded => self.on_loaded(),
            AdUnitEvent::Started => self.on_started(),
            AdUnitEvent::Stopped => self.on_stopped(),
            AdUnitEvent::Skipped => {
                if matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
                    self.finish_ad(PlaybackState::Skipped);
                }
            }
            AdUnitEvent::SkippableStateChange { skippable } => self.on_skippable_change(skippable),
            AdUnitEvent::DurationChange { duration } => {
                if let Some(session) = self.session.as_mut() {
                    if duration > 0.0 {
                        session.current.duration = duration;
                    }
                }
            }
            AdUnitEvent::RemainingTimeChange { remaining } => {
                let duration = session.current.duration;
                if duration > 0.0 && remaining >= 0.0 {
                    self.on_playhead_progress(duration - remaining);
                }
            }
            AdUnitEvent::LinearChange { linear } => self.on_linear_change(linear),
            AdUnitEvent::SizeChange => debug!("Ad unit resized"),
            AdUnitEvent::Interaction { id } => debug!("Ad interaction {:?}", id),
            AdUnitEvent::Impression => self.fire(EventKind::Impression),
            AdUnitEvent::ClickThru {
                url,
                player_handles,
                ..
            } => self.on_click(url, player_handles),
            AdUnitEvent::Paused => self.on_paused(),
            AdUnitEvent::Playing => self.on_resumed(),
            AdUnitEvent::VideoStart => self.fire(EventKind::Start),
            AdUnitEvent::VideoFirstQuartile => self.fire(EventKind::FirstQuartile),
            AdUnitEvent::VideoMidpoint => self.fire(EventKind::Midpoint),
            AdUnitEvent::VideoThirdQuartile => self.fire(EventKind::ThirdQuartile),
            AdUnitEvent::VideoComplete => self.fire(EventKind::Complete),
            AdUnitEvent::Error { message } => self.escalate(ErrorCode::VpaidError, message),
            AdUnitEvent::VolumeChange { volume } => self.on_volume_change(volume),
            AdUnitEvent::UserAcceptInvitation => self.fire(EventKind::AcceptInvitation),
            AdUnitEvent::UserMinimize => self.fire(EventKind::Collapse),
            AdUnitEvent::UserClose => self.fire(EventKind::Close),
        }
    }

    /// Playhead position of the current ad, in seconds
    pub fn on_playhead_progress(&mut self, current_secs: f64) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let duration = session.current.duration;
        if duration <= 0.0 || !current_secs.is_finite() {
            return;
        }

        for kind in quartiles_reached(current_secs / duration) {
            self.fire(kind);
        }
    }

    /// The controller finished handling the last click-through
    pub fn on_click_handled(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.current.handling_click = false;
        }
    }

    pub fn skip(&mut self) -> Result<(), DriverError> {
        self.require_state(
            &[PlaybackState::Playing, PlaybackState::Paused],
            PlaybackState::Skipped,
        )?;
        let skippable = self
            .session
            .as_ref()
            .is_some_and(|s| s.current.skip_offset.is_some());
        if !skippable {
            return Err(DriverError::NotSkippable);
        }

        if let Some(unit) = self.unit_mut() {
            unit.skip_ad();
        }
        self.finish_ad(PlaybackState::Skipped);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), DriverError> {
        self.require_state(&[PlaybackState::Playing], PlaybackState::Paused)?;
        if let Some(unit) = self.unit_mut() {
            unit.pause_ad();
        }
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), DriverError> {
        self.require_state(&[PlaybackState::Paused], PlaybackState::Playing)?;
        if let Some(unit) = self.unit_mut() {
            unit.resume_ad();
        }
        Ok(())
    }

    pub fn resize(&mut self, width: u32, height: u32, view_mode: ViewMode) -> Result<(), DriverError> {
        self.require_active()?;
        if let Some(unit) = self.unit_mut() {
            unit.resize_ad(width, height, view_mode);
        }
        match view_mode {
            ViewMode::Fullscreen => self.fire(EventKind::Fullscreen),
            ViewMode::Normal => {
                let was_fullscreen = self.session.as_ref().is_some_and(|s| {
                    s.fired.has_fired(s.current.id, &EventKind::Fullscreen)
                });
                if was_fullscreen {
                    self.fire(EventKind::ExitFullscreen);
                }
            }
            ViewMode::Thumbnail => (),
        }
        Ok(())
    }

    pub fn expand(&mut self) -> Result<(), DriverError> {
        self.require_active()?;
        if let Some(unit) = self.unit_mut() {
            unit.expand_ad();
        }
        self.fire(EventKind::Expand);
        Ok(())
    }

    pub fn collapse(&mut self) -> Result<(), DriverError> {
        self.require_active()?;
        if let Some(unit) = self.unit_mut() {
            unit.collapse_ad();
        }
        self.fire(EventKind::Collapse);
        Ok(())
    }

    fn load_current(&mut self) {
        if !self.transition(PlaybackState::Loading) {
            return;
        }
        let request = self.next_request_id();
        let timeout = self.config.creative_load_timeout();
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let ad_break = Arc::clone(&session.ad_break);
        let ad = ad_break.ad(session.current.ad);
        session.current.tracking = tracking_table(ad);
        session.current.duration = ad.duration_seconds();

        // Breaks built from a response are pre-filtered; hand-resolved ones are not
        let Some(selection) = select_creative(ad, &self.config.api_framework) else {
            let message = format!(
                "No playable {} creative for ad {}",
                self.config.api_framework,
                ad.display_id()
            );
            return self.escalate(ErrorCode::NoSupportedMedia, message);
        };

        if let Err(e) = session.timer.arm(request, RequestKind::CreativeLoad) {
            return self.escalate(ErrorCode::Undefined, e.to_string());
        }

        debug!(
            "Loading {} for ad {} ({:?})",
            selection.media_file.url,
            ad.display_id(),
            session.current.id
        );
        let instance = session.current.id;
        session.current.linear = selection.linear;
        self.host.arm_timer(request, timeout);
        self.host.load_creative(request, instance, &selection.media_file);
        session.current.selection = Some(selection);
    }

    fn handshake(&mut self) {
        if !self.transition(PlaybackState::Handshaking) {
            return;
        }
        let proposed = self.config.vpaid_version.clone();
        let Some(unit) = self.unit_mut() else {
            return;
        };

        let missing: Vec<&str> = REQUIRED_CAPABILITIES
            .iter()
            .filter(|capability| !unit.supports(**capability))
            .map(|capability| capability.function_name())
            .collect();
        if !missing.is_empty() {
            let message = format!("Ad unit is missing {}", missing.join(", "));
            return self.escalate(ErrorCode::VpaidError, message);
        }

        let version = unit.handshake_version(&proposed);
        if major_version(&version).is_none() || major_version(&version) != major_version(&proposed)
        {
            let message = format!("Unsupported VPAID version {:?}", version);
            return self.escalate(ErrorCode::VpaidError, message);
        }

        debug!("Handshake complete, ad unit speaks VPAID {}", version);
        self.initialize();
    }

    fn initialize(&mut self) {
        if !self.transition(PlaybackState::Initializing) {
            return;
        }
        let slot = self.controller.slot();
        let request = self.next_request_id();
        let timeout = self.config.init_timeout();
        let view_mode = self.config.view_mode;
        let bitrate = self.config.desired_bitrate;
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if let Err(e) = session.timer.arm(request, RequestKind::AdLoaded) {
            return self.escalate(ErrorCode::Undefined, e.to_string());
        }
        self.host.arm_timer(request, timeout);

        let current = &mut session.current;
        let (width, height) = if current.linear {
            (slot.width, slot.height)
        } else {
            current
                .selection
                .as_ref()
                .and_then(|selection| selection.dimensions)
                .unwrap_or((slot.width, slot.height))
        };
        let creative_data = CreativeData {
            ad_parameters: current
                .selection
                .as_ref()
                .map(|selection| selection.ad_parameters.clone())
                .unwrap_or_default(),
        };

        let Some(unit) = current.unit.as_mut() else {
            return;
        };
        for event in AdUnitEventKind::ALL {
            unit.subscribe(event);
            current.subscriptions.insert(event);
        }
        unit.init_ad(width, height, view_mode, bitrate, &slot.environment, &creative_data);
    }

    fn on_loaded(&mut self) {
        if self.state != PlaybackState::Initializing {
            debug!("Ignoring AdLoaded in state {}", self.state);
            return;
        }
        if let Some((request, _)) = self.session.as_mut().and_then(|s| s.timer.take()) {
            self.host.cancel_timer(request);
        }
        if !self.transition(PlaybackState::Ready) {
            return;
        }
        if let Some(unit) = self.unit_mut() {
            unit.start_ad();
        }
    }

    fn on_started(&mut self) {
        if self.state != PlaybackState::Ready || !self.transition(PlaybackState::Playing) {
            debug!("Ignoring AdStarted in state {}", self.state);
            return;
        }
        let default_delay = self.config.default_skip_delay_secs;
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let ad_break = Arc::clone(&session.ad_break);
        let current = &mut session.current;
        let ad = ad_break.ad(current.ad);
        if current.linear {
            let raw = ad.linear.as_ref().and_then(|l| l.skip_offset_raw.as_deref());
            current.skip_offset = skip_offset_seconds(
                raw,
                current.duration,
                Capabilities::for_version(&ad.version),
                default_delay,
            );
        }
        current.started_reported = true;

        let pod_start = (!session.pod_started)
            .then(|| (session.pod_id.clone(), ad_break.pod_len(current.pod_element)));
        session.pod_started = true;

        let ad_id = ad.display_id().to_string();
        let linear = current.linear;
        let skip_offset = current.skip_offset;
        let info = LinearAdInfo {
            name: ad.title.clone(),
            duration: current.duration,
            has_click_url: ad.click_through().is_some(),
            index_in_pod: ad_break.position_in_pod(current.pod_element),
            skippable: skip_offset.is_some(),
        };
        let creative_url = current
            .selection
            .as_ref()
            .map(|selection| selection.media_file.url.clone())
            .unwrap_or_default();

        if let Some((pod_id, ad_count)) = pod_start {
            info!("Pod {} started with {} ads", pod_id, ad_count);
            self.controller.notify_pod_started(&pod_id, ad_count);
        }
        if linear {
            info!("Linear ad {} started", ad_id);
            self.controller.notify_linear_ad_started(&ad_id, &info);
            if let Some(offset) = skip_offset {
                self.controller.show_skip_video_ad_button(true, Some(offset));
            }
        } else {
            info!("Non-linear ad {} started", ad_id);
            self.controller
                .send_url_to_load_and_play_non_linear_ad(ad, &ad_id, &creative_url);
        }

        self.fire(EventKind::Impression);
        self.fire(EventKind::CreativeView);
        self.fire(EventKind::Start);
    }

    fn on_stopped(&mut self) {
        match self.state {
            PlaybackState::Playing | PlaybackState::Paused => {
                self.finish_ad(PlaybackState::Completed)
            }
            _ => self.escalate(
                ErrorCode::VpaidError,
                "Ad unit stopped before starting".to_string(),
            ),
        }
    }

    fn on_paused(&mut self) {
        if self.state != PlaybackState::Playing || !self.transition(PlaybackState::Paused) {
            return;
        }
        self.on_click_handled();
        self.fire(EventKind::Pause);
    }

    fn on_resumed(&mut self) {
        if self.state != PlaybackState::Paused || !self.transition(PlaybackState::Playing) {
            return;
        }
        self.on_click_handled();
        self.fire(EventKind::Resume);
    }

    fn on_skippable_change(&mut self, skippable: bool) {
        if !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let ad = session.ad_break.ad(session.current.ad);
        if !session.current.linear || !Capabilities::for_version(&ad.version).skippable {
            return;
        }

        if skippable {
            if session.current.skip_offset.is_none() {
                session.current.skip_offset = Some(0);
            }
        } else {
            session.current.skip_offset = None;
        }
        self.controller.show_skip_video_ad_button(skippable, None);
    }

    fn on_linear_change(&mut self, linear: bool) {
        let active = self.state.is_active();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.current.linear == linear {
            return;
        }
        session.current.linear = linear;
        debug!("Ad unit switched to linear={}", linear);

        if linear && active {
            let ad = session.ad_break.ad(session.current.ad);
            let streams: Vec<String> = session
                .current
                .selection
                .iter()
                .map(|selection| selection.media_file.url.clone())
                .collect();
            self.controller
                .force_ad_to_play(&ad.title, ad, AdType::Linear, &streams);
        }
    }

    fn on_click(&mut self, url: Option<String>, player_handles: bool) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.current.handling_click {
            debug!("Dropping duplicate click on {:?}", session.current.id);
            return;
        }
        session.current.handling_click = true;

        let target = url.filter(|url| !url.trim().is_empty()).or_else(|| {
            session
                .ad_break
                .ad(session.current.ad)
                .click_through()
                .map(str::to_string)
        });

        self.fire(EventKind::ClickTracking);
        match target {
            Some(target) if player_handles => self.controller.open_click_through(&target),
            Some(_) => {
                debug!("Ad unit handles its own click-through");
                self.on_click_handled();
            }
            None => {
                debug!("Click without a click-through URL");
                self.on_click_handled();
            }
        }
    }

    fn on_volume_change(&mut self, volume: f64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let muted = volume <= 0.0;
        if muted == session.current.muted {
            return;
        }
        session.current.muted = muted;
        self.fire(if muted { EventKind::Mute } else { EventKind::Unmute });
    }

    /// End the current ad normally and move on through the pod
    fn finish_ad(&mut self, terminal: PlaybackState) {
        if !self.transition(terminal) {
            return;
        }
        if terminal == PlaybackState::Skipped {
            self.fire(EventKind::Skip);
        } else {
            self.fire(EventKind::Complete);
        }
        self.close_current(false);

        let next = self
            .session
            .as_ref()
            .and_then(|s| s.ad_break.next_in_pod(s.current.pod_element));
        match next {
            Some(next) => self.advance(next),
            None => self.end_pod(),
        }
    }

    fn advance(&mut self, next: AdIndex) {
        let id = self.next_instance_id();
        if let Some(session) = self.session.as_mut() {
            session.current = AdInstance::new(id, next, next, false);
        }
        self.load_current();
    }

    /// Tear down the failed ad, then play the pod's fallback or end the pod
    fn escalate(&mut self, code: ErrorCode, message: String) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        error!(
            "Ad {} failed in state {} ({}): {}",
            session.ad_break.ad(session.current.ad).display_id(),
            self.state,
            code.as_u16(),
            message
        );
        if !self.transition(PlaybackState::Errored) {
            self.state = PlaybackState::Errored;
        }

        self.fire_with_code(EventKind::Error, Some(code));
        self.close_current(false);

        let fallback = self.session.as_ref().and_then(|s| {
            if s.current.is_fallback || s.fallback_used {
                None
            } else {
                s.ad_break.fallback_for(s.current.pod_element)
            }
        });

        match fallback {
            Some(fallback) => {
                self.transition(PlaybackState::FallbackLoading);
                let id = self.next_instance_id();
                if let Some(session) = self.session.as_mut() {
                    session.fallback_used = true;
                    let pod_element = session.current.pod_element;
                    info!(
                        "Substituting fallback {} in {}",
                        session.ad_break.ad(fallback).display_id(),
                        session.pod_id
                    );
                    session.current = AdInstance::new(id, fallback, pod_element, true);
                }
                self.load_current();
            }
            None => {
                self.transition(PlaybackState::PodEnded);
                let report = self
                    .session
                    .as_mut()
                    .is_some_and(|s| !std::mem::replace(&mut s.error_reported, true));
                if report {
                    self.controller.raise_ad_error(&message);
                }
                self.end_pod();
            }
        }
    }

    /// Release the current ad unit and report the end of its ad if it started
    fn close_current(&mut self, stop: bool) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some((request, _)) = session.timer.take() {
            self.host.cancel_timer(request);
        }

        let ad_id = session.ad_break.ad(session.current.ad).display_id().to_string();
        let current = &mut session.current;
        current.release_unit(stop);
        current.handling_click = false;
        if !std::mem::replace(&mut current.started_reported, false) {
            return;
        }

        if current.linear {
            if current.skip_offset.is_some() {
                self.controller.show_skip_video_ad_button(false, None);
            }
            info!("Linear ad {} ended", ad_id);
            self.controller.notify_linear_ad_ended(&ad_id);
        } else {
            info!("Non-linear ad {} ended", ad_id);
            self.controller.notify_nonlinear_ad_ended(&ad_id);
        }
    }

    /// Drop the session, reporting the pod end exactly once
    fn end_pod(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.current.release_unit(false);
        if let Some((request, _)) = session.timer.take() {
            self.host.cancel_timer(request);
        }
        if !std::mem::replace(&mut session.pod_end_reported, true) {
            info!("Pod {} ended", session.pod_id);
            self.controller.notify_pod_ended(&session.pod_id);
        }
    }

    fn fire(&mut self, kind: EventKind) {
        self.fire_with_code(kind, None);
    }

    fn fire_with_code(&mut self, kind: EventKind, code: Option<ErrorCode>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let instance = session.current.id;
        session.fired.fire_with_code(
            &mut self.pinger,
            instance,
            kind,
            &session.current.tracking,
            code,
        );
    }

    fn transition(&mut self, next: PlaybackState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!("Ignoring transition {} -> {}", self.state, next);
            return false;
        }
        debug!("{} -> {}", self.state, next);
        self.state = next;
        true
    }

    fn require_state(
        &self,
        allowed: &[PlaybackState],
        to: PlaybackState,
    ) -> Result<(), DriverError> {
        if self.session.is_none() {
            return Err(DriverError::NoActiveSession);
        }
        if !allowed.contains(&self.state) {
            return Err(DriverError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    fn require_active(&self) -> Result<(), DriverError> {
        if self.session.is_none() || !self.state.is_active() {
            return Err(DriverError::NoActiveSession);
        }
        Ok(())
    }

    fn ensure_no_session(&self) -> Result<(), DriverError> {
        if self.session.is_some() {
            return Err(DriverError::InvalidTransition {
                from: self.state.to_string(),
                to: PlaybackState::Loading.to_string(),
            });
        }
        Ok(())
    }

    fn unit_mut(&mut self) -> Option<&mut (dyn AdUnit + 'static)> {
        self.session.as_mut()?.current.unit.as_deref_mut()
    }

    fn next_request_id(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    fn next_instance_id(&mut self) -> InstanceId {
        self.next_instance += 1;
        InstanceId(self.next_instance)
    }
}
