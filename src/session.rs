use crate::error::DriverError;
use crate::models::{AdIndex, EventKind};
use crate::parser::parse_timecode;
use crate::pod::AdBreak;
use crate::selector::CreativeSelection;
use crate::tracking::{InstanceId, TrackingPinger};
use crate::version::Capabilities;
use crate::vpaid::{AdUnit, AdUnitEventKind, RequestId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// States of the playback driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    Idle,
    Loading,
    Handshaking,
    Initializing,
    Ready,
    Playing,
    Paused,
    Completed,
    Skipped,
    Errored,
    FallbackLoading,
    PodEnded,
}

impl PlaybackState {
    pub fn can_transition_to(self, next: PlaybackState) -> bool {
        use PlaybackState::*;
        matches!(
            (self, next),
            (Idle, Loading)
                | (Loading, Handshaking)
                | (Handshaking, Initializing)
                | (Initializing, Ready)
                | (Ready, Playing)
                | (Playing, Paused)
                | (Paused, Playing)
                | (Playing | Paused, Completed | Skipped)
                | (Loading | Handshaking | Initializing | Ready | Playing | Paused, Errored)
                | (Errored, FallbackLoading | PodEnded)
                | (FallbackLoading, Loading)
                // next ad of the same pod
                | (Completed | Skipped, Loading)
        )
    }

    /// Whether an ad unit is loaded and its events are being trusted
    pub fn is_active(self) -> bool {
        matches!(
            self,
            PlaybackState::Initializing
                | PlaybackState::Ready
                | PlaybackState::Playing
                | PlaybackState::Paused
        )
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What an outstanding request is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    AdResponse,
    CreativeLoad,
    AdLoaded,
}

/// A single cancellable timer slot; at most one request may be outstanding
#[derive(Debug, Default)]
pub struct RequestTimer {
    pending: Option<(RequestId, RequestKind)>,
}

impl RequestTimer {
    pub fn arm(&mut self, request: RequestId, kind: RequestKind) -> Result<(), DriverError> {
        if let Some((pending, _)) = self.pending {
            return Err(DriverError::RequestPending(pending.0));
        }
        self.pending = Some((request, kind));
        Ok(())
    }

    /// Clear the slot if `request` is the outstanding one
    pub fn complete(&mut self, request: RequestId) -> Option<RequestKind> {
        match self.pending {
            Some((pending, kind)) if pending == request => {
                self.pending = None;
                Some(kind)
            }
            _ => None,
        }
    }

    pub fn take(&mut self) -> Option<(RequestId, RequestKind)> {
        self.pending.take()
    }

    pub fn pending(&self) -> Option<(RequestId, RequestKind)> {
        self.pending
    }
}

/// Skip offset in whole seconds, or `None` when no skip button is shown.
///
/// A trailing `%` is a share of `duration`; anything else is a timecode.
/// Versions without skip support never get an offset; supporting versions
/// without `skipoffset` use the host default.
pub fn skip_offset_seconds(
    raw: Option<&str>,
    duration: f64,
    capabilities: Capabilities,
    default_delay: Option<u32>,
) -> Option<u32> {
    if !capabilities.skippable {
        return None;
    }

    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return default_delay;
    };

    let seconds = match raw.strip_suffix('%') {
        Some(percent) => {
            let percent = percent.trim().parse::<f64>().ok()?;
            duration * percent / 100.0
        }
        None => parse_timecode(raw)?,
    };

    if seconds.is_finite() && seconds >= 0.0 {
        Some(seconds.round() as u32)
    } else {
        None
    }
}

/// Quartile keys passed by a progress ratio, highest first
pub fn quartiles_reached(ratio: f64) -> Vec<EventKind> {
    [
        (0.75, EventKind::ThirdQuartile),
        (0.50, EventKind::Midpoint),
        (0.25, EventKind::FirstQuartile),
    ]
    .into_iter()
    .filter(|(threshold, _)| ratio > *threshold)
    .map(|(_, kind)| kind)
    .collect()
}

/// One play attempt of one ad
pub struct AdInstance {
    pub id: InstanceId,

    /// The ad being played
    pub ad: AdIndex,

    /// The pod element this attempt fills; differs from `ad` for a fallback
    pub pod_element: AdIndex,

    pub is_fallback: bool,

    pub selection: Option<CreativeSelection>,

    pub unit: Option<Box<dyn AdUnit>>,

    /// Events subscribed on `unit`; released with the instance
    pub subscriptions: HashSet<AdUnitEventKind>,

    pub tracking: HashMap<EventKind, Vec<String>>,

    pub duration: f64,

    pub linear: bool,

    pub skip_offset: Option<u32>,

    pub started_reported: bool,

    /// Set while a click is being handled; duplicate clicks are dropped
    pub handling_click: bool,

    pub muted: bool,
}

impl AdInstance {
    pub fn new(id: InstanceId, ad: AdIndex, pod_element: AdIndex, is_fallback: bool) -> Self {
        Self {
            id,
            ad,
            pod_element,
            is_fallback,
            selection: None,
            unit: None,
            subscriptions: HashSet::new(),
            tracking: HashMap::new(),
            duration: 0.0,
            linear: true,
            skip_offset: None,
            started_reported: false,
            handling_click: false,
            muted: false,
        }
    }

    /// Unsubscribe everything and drop the unit, optionally stopping it first
    pub fn release_unit(&mut self, stop: bool) {
        if let Some(mut unit) = self.unit.take() {
            if stop {
                unit.stop_ad();
            }
            for event in self.subscriptions.drain() {
                unit.unsubscribe(event);
            }
        }
        self.subscriptions.clear();
    }
}

/// State of the ad break currently playing
pub struct PlaybackSession {
    pub ad_break: Arc<AdBreak>,

    pub pod_id: String,

    /// Id of the pod head, used when reporting the pod
    pub pod_primary_id: String,

    pub current: AdInstance,

    pub fired: TrackingPinger,

    /// Timer for the creative load or the wait for `AdLoaded`
    pub timer: RequestTimer,

    pub pod_started: bool,

    pub pod_end_reported: bool,

    pub error_reported: bool,

    pub fallback_used: bool,
}

impl PlaybackSession {
    pub fn new(ad_break: Arc<AdBreak>, pod_id: String, current: AdInstance) -> Self {
        let pod_primary_id = ad_break.ad(current.pod_element).display_id().to_string();
        Self {
            ad_break,
            pod_id,
            pod_primary_id,
            current,
            fired: TrackingPinger::new(),
            timer: RequestTimer::default(),
            pod_started: false,
            pod_end_reported: false,
            error_reported: false,
            fallback_used: false,
        }
    }
}
