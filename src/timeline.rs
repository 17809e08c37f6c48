use crate::error::{Result, VastError};
use crate::models::{AdIndex, VastResponse};
use crate::parser::parse_vast;
use crate::pod::AdBreak;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Where in the content an ad break is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BreakPosition {
    Seconds(f64),
    Immediate,
    End,
}

impl FromStr for BreakPosition {
    type Err = VastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "immediate" | "pre" => Ok(BreakPosition::Immediate),
            "end" | "post" => Ok(BreakPosition::End),
            other => other
                .parse::<f64>()
                .ok()
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(BreakPosition::Seconds)
                .ok_or_else(|| VastError::Other(format!("Invalid break position: {}", other))),
        }
    }
}

/// One scheduling slot handed to the controller.
///
/// Only the head ad is described here; the rest of a pod is reached through
/// `next_in_pod` links on the break.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub position: BreakPosition,
    pub duration_seconds: f64,
    pub head: AdIndex,
    pub is_linear: bool,
}

/// Collapse a resolved break into its single scheduling slot
pub fn build_entry(ad_break: &AdBreak, position: BreakPosition) -> Option<TimelineEntry> {
    let head = ad_break
        .podded()
        .first()
        .copied()
        .or_else(|| ad_break.schedulable_standalone().next())?;
    let ad = ad_break.ad(head);

    Some(TimelineEntry {
        position,
        duration_seconds: ad.duration_seconds(),
        head,
        is_linear: ad.is_linear(),
    })
}

/// A timeline entry together with the break that owns its ads
#[derive(Debug, Clone)]
pub struct ScheduledBreak {
    pub ad_break: Arc<AdBreak>,
    pub entry: TimelineEntry,
}

/// Parse, filter and resolve a VAST response into a scheduled break
pub fn schedule_ad_break(
    xml: &str,
    position: BreakPosition,
    framework: &str,
) -> Result<ScheduledBreak> {
    schedule_response(parse_vast(xml)?, position, framework)
}

/// Resolve an already parsed response into a scheduled break
pub fn schedule_response(
    response: VastResponse,
    position: BreakPosition,
    framework: &str,
) -> Result<ScheduledBreak> {
    let ad_break = AdBreak::from_response(response, framework)?;
    let entry = build_entry(&ad_break, position).ok_or(VastError::NoAds)?;

    Ok(ScheduledBreak {
        ad_break: Arc::new(ad_break),
        entry,
    })
}
