use crate::error::{ErrorCode, Result, VastError};
use crate::models::{AdDefinition, EventKind};
use log::{debug, warn};
use rand::{Rng, thread_rng};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Identifies one play attempt of one ad; a fallback replay gets a new id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InstanceId(pub u64);

/// Transport for tracking pings
pub trait Pinger {
    fn ping(&mut self, url: &str);
}

/// Fires pings over HTTP without waiting for the response
pub struct HttpPinger {
    client: reqwest::Client,
    runtime: tokio::runtime::Handle,
}

impl HttpPinger {
    pub fn new(runtime: tokio::runtime::Handle) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .map_err(|e| VastError::Other(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, runtime })
    }
}

impl Pinger for HttpPinger {
    fn ping(&mut self, url: &str) {
        let url = match url::Url::parse(url) {
            Ok(url) => url,
            Err(e) => {
                warn!("Not pinging invalid tracking URL {:?}: {}", url, e);
                return;
            }
        };

        let client = self.client.clone();
        self.runtime.spawn(async move {
            match client.get(url.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Pinged {}", url);
                }
                Ok(response) => warn!("Ping to {} returned {}", url, response.status()),
                Err(e) => warn!("Ping to {} failed: {}", url, e),
            }
        });
    }
}

/// At-most-once firing of tracking URLs per `(instance, kind)` key
#[derive(Debug, Default)]
pub struct TrackingPinger {
    fired: HashSet<(InstanceId, EventKind)>,
}

impl TrackingPinger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ping every URL registered for `kind` unless the key already fired.
    /// Returns true when this call fired the key.
    pub fn fire<P: Pinger + ?Sized>(
        &mut self,
        pinger: &mut P,
        instance: InstanceId,
        kind: EventKind,
        urls_by_kind: &HashMap<EventKind, Vec<String>>,
    ) -> bool {
        self.fire_with_code(pinger, instance, kind, urls_by_kind, None)
    }

    /// Like [`fire`](Self::fire), substituting `[ERRORCODE]` in the URLs
    pub fn fire_with_code<P: Pinger + ?Sized>(
        &mut self,
        pinger: &mut P,
        instance: InstanceId,
        kind: EventKind,
        urls_by_kind: &HashMap<EventKind, Vec<String>>,
        error_code: Option<ErrorCode>,
    ) -> bool {
        if self.fired.contains(&(instance, kind.clone())) {
            return false;
        }

        let urls = urls_by_kind.get(&kind).map(Vec::as_slice).unwrap_or_default();
        debug!("Firing {} for instance {:?} ({} urls)", kind, instance, urls.len());
        for url in urls {
            pinger.ping(&expand_macros(url, error_code));
        }

        self.fired.insert((instance, kind));
        true
    }

    pub fn has_fired(&self, instance: InstanceId, kind: &EventKind) -> bool {
        self.fired.contains(&(instance, kind.clone()))
    }
}

/// Replace the VAST macros this driver knows about
pub fn expand_macros(url: &str, error_code: Option<ErrorCode>) -> String {
    let mut expanded = url.to_string();
    if expanded.contains("[ERRORCODE]") {
        let code = error_code.unwrap_or(ErrorCode::Undefined).as_u16();
        expanded = expanded.replace("[ERRORCODE]", &code.to_string());
    }
    if expanded.contains("[CACHEBUSTING]") {
        let buster: u32 = thread_rng().gen_range(10_000_000..100_000_000);
        expanded = expanded.replace("[CACHEBUSTING]", &buster.to_string());
    }
    expanded
}

/// Every tracking URL of an ad keyed by the event that fires it
pub fn tracking_table(ad: &AdDefinition) -> HashMap<EventKind, Vec<String>> {
    let mut table: HashMap<EventKind, Vec<String>> = HashMap::new();

    let (tracking, click_tracking) = match (&ad.linear, &ad.non_linear) {
        (Some(linear), _) => (&linear.tracking, &linear.click_tracking),
        (None, Some(non_linear)) => (&non_linear.tracking, &non_linear.click_tracking),
        (None, None) => {
            table.insert(EventKind::Impression, ad.impressions.clone());
            table.insert(EventKind::Error, ad.error_urls.clone());
            return table;
        }
    };

    for (kind, urls) in tracking {
        table.entry(kind.clone()).or_default().extend(urls.iter().cloned());
    }
    table
        .entry(EventKind::Impression)
        .or_default()
        .extend(ad.impressions.iter().cloned());
    table
        .entry(EventKind::Error)
        .or_default()
        .extend(ad.error_urls.iter().cloned());
    table
        .entry(EventKind::ClickTracking)
        .or_default()
        .extend(click_tracking.iter().cloned());
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingPinger {
        urls: Vec<String>,
    }

    impl Pinger for RecordingPinger {
        fn ping(&mut self, url: &str) {
            self.urls.push(url.to_string());
        }
    }

    fn table() -> HashMap<EventKind, Vec<String>> {
        HashMap::from([
            (
                EventKind::Midpoint,
                vec!["https://a/mid".to_string(), "https://b/mid".to_string()],
            ),
            (EventKind::Error, vec!["https://a/err?c=[ERRORCODE]".to_string()]),
        ])
    }

    #[test]
    fn each_key_fires_once_with_all_its_urls() {
        let mut pinger = RecordingPinger::default();
        let mut tracking = TrackingPinger::new();
        let instance = InstanceId(1);

        assert!(tracking.fire(&mut pinger, instance, EventKind::Midpoint, &table()));
        assert!(!tracking.fire(&mut pinger, instance, EventKind::Midpoint, &table()));
        assert_eq!(pinger.urls, vec!["https://a/mid", "https://b/mid"]);
        assert!(tracking.has_fired(instance, &EventKind::Midpoint));
    }

    #[test]
    fn keys_are_scoped_to_the_instance() {
        let mut pinger = RecordingPinger::default();
        let mut tracking = TrackingPinger::new();

        tracking.fire(&mut pinger, InstanceId(1), EventKind::Midpoint, &table());
        tracking.fire(&mut pinger, InstanceId(2), EventKind::Midpoint, &table());
        assert_eq!(pinger.urls.len(), 4);
    }

    #[test]
    fn kinds_without_urls_still_count_as_fired() {
        let mut pinger = RecordingPinger::default();
        let mut tracking = TrackingPinger::new();

        assert!(tracking.fire(&mut pinger, InstanceId(1), EventKind::Skip, &table()));
        assert!(!tracking.fire(&mut pinger, InstanceId(1), EventKind::Skip, &table()));
        assert!(pinger.urls.is_empty());
    }

    #[test]
    fn error_codes_are_substituted() {
        let mut pinger = RecordingPinger::default();
        let mut tracking = TrackingPinger::new();

        tracking.fire_with_code(
            &mut pinger,
            InstanceId(7),
            EventKind::Error,
            &table(),
            Some(ErrorCode::VpaidError),
        );
        assert_eq!(pinger.urls, vec!["https://a/err?c=901"]);
    }

    #[test]
    fn cache_buster_is_eight_digits() {
        let url = expand_macros("https://t/x?cb=[CACHEBUSTING]&e=[ERRORCODE]", None);
        let buster = url
            .trim_start_matches("https://t/x?cb=")
            .split('&')
            .next()
            .unwrap();
        assert_eq!(buster.len(), 8);
        assert!(buster.chars().all(|c| c.is_ascii_digit()));
        assert!(url.ends_with("e=900"));
    }
}
