mod common;

use common::fixture;
use vast_ad_driver::error::VastError;
use vast_ad_driver::models::{AdKind, EventKind};
use vast_ad_driver::parser::parse_vast;
use vast_ad_driver::pod::AdBreak;
use vast_ad_driver::timeline::{BreakPosition, schedule_ad_break};

fn ids(ad_break: &AdBreak, mut next: Option<vast_ad_driver::models::AdIndex>) -> Vec<String> {
    let mut ids = Vec::new();
    while let Some(index) = next {
        ids.push(ad_break.ad(index).display_id().to_string());
        next = ad_break.next_in_pod(index);
    }
    ids
}

#[test]
fn pod_fixture_resolves_into_a_chain_with_one_fallback() {
    let scheduled = schedule_ad_break(&fixture("pod.xml"), BreakPosition::End, "VPAID").unwrap();
    let ad_break = &scheduled.ad_break;

    assert_eq!(scheduled.entry.position, BreakPosition::End);
    assert_eq!(ids(ad_break, Some(scheduled.entry.head)), vec!["first", "second"]);

    let spare = ad_break.fallback_for(scheduled.entry.head).unwrap();
    assert_eq!(ad_break.ad(spare).display_id(), "spare");
    assert_eq!(ad_break.claimed_fallback(), Some(spare));
    assert_eq!(ad_break.schedulable_standalone().count(), 0);
    for index in ad_break.podded() {
        assert_eq!(ad_break.fallback_for(*index), Some(spare));
    }
    assert_eq!(ad_break.pod_len(scheduled.entry.head), 2);
}

#[test]
fn vast_2_response_is_a_list_of_standalone_ads() {
    let scheduled =
        schedule_ad_break(&fixture("vast2.xml"), BreakPosition::Seconds(60.0), "VPAID").unwrap();
    let ad_break = &scheduled.ad_break;

    assert!(ad_break.podded().is_empty());
    assert_eq!(ad_break.standalone().len(), 2);
    assert_eq!(ad_break.ad(scheduled.entry.head).display_id(), "legacy");
    assert_eq!(ad_break.fallback_for(scheduled.entry.head), None);
    assert_eq!(ad_break.next_in_pod(scheduled.entry.head), None);
    assert_eq!(scheduled.entry.duration_seconds, 30.0);
}

#[test]
fn wrapper_only_response_has_nothing_to_play() {
    let response = parse_vast(&fixture("wrapper_only.xml")).unwrap();
    assert_eq!(response.ads.len(), 1);
    assert_eq!(response.ads[0].kind, AdKind::Wrapper);
    assert_eq!(
        response.ads[0].wrapper_redirect_url.as_deref(),
        Some("https://ads.example/next.xml")
    );

    assert!(matches!(
        schedule_ad_break(&fixture("wrapper_only.xml"), BreakPosition::Immediate, "VPAID"),
        Err(VastError::NoAds)
    ));
}

#[test]
fn overlay_is_scheduled_for_its_suggested_duration() {
    let scheduled =
        schedule_ad_break(&fixture("overlay.xml"), BreakPosition::Immediate, "VPAID").unwrap();
    let ad = scheduled.ad_break.ad(scheduled.entry.head);

    assert!(!scheduled.entry.is_linear);
    assert_eq!(scheduled.entry.duration_seconds, 12.0);
    let overlay = ad.non_linear.as_ref().unwrap();
    assert_eq!(overlay.resource_data, "https://cdn.example/banner.js");
    assert_eq!((overlay.width, overlay.height), (300, 50));
    assert_eq!(
        overlay.tracking.get(&EventKind::CreativeView),
        Some(&vec!["https://track.example/banner/view".to_string()])
    );
}

#[test]
fn unknown_framework_leaves_no_playable_ads() {
    assert!(matches!(
        schedule_ad_break(&fixture("pod.xml"), BreakPosition::Immediate, "SIMID"),
        Err(VastError::NoAds)
    ));
}

#[test]
fn malformed_responses_are_rejected() {
    assert!(matches!(
        parse_vast(r#"<VAST version="4.2"></VAST>"#),
        Err(VastError::InvalidVersion(_))
    ));
    assert!(matches!(parse_vast("<Nope/>"), Err(VastError::Other(_))));
    assert!(parse_vast(r#"<VAST version="3.0"><Ad id="x"><InLine>"#).is_err());
}
