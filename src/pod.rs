use crate::error::{Result, VastError};
use crate::models::{AdDefinition, AdIndex, VastResponse};
use crate::selector::select_creative;
use crate::version::Capabilities;
use log::{debug, warn};
use serde::Serialize;

/// Links out of one ad in a break
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PodLink {
    /// The ad that plays after this one in the pod
    pub next_in_pod: Option<AdIndex>,

    /// The shared substitute played if this ad fails
    pub fallback: Option<AdIndex>,
}

/// All ads of one ad-break response, with pod and fallback links by index.
///
/// The break owns every `AdDefinition`; pods and fallbacks refer to them by
/// `AdIndex` and are never duplicated. Read-only once resolved.
#[derive(Debug, Clone, Serialize)]
pub struct AdBreak {
    ads: Vec<AdDefinition>,
    links: Vec<PodLink>,
    podded: Vec<AdIndex>,
    standalone: Vec<AdIndex>,
}

impl AdBreak {
    /// Build a break from a parsed response, dropping ads the driver cannot play
    pub fn from_response(response: VastResponse, framework: &str) -> Result<Self> {
        let playable: Vec<AdDefinition> = response
            .ads
            .into_iter()
            .filter(|ad| {
                let ok = select_creative(ad, framework).is_some();
                if !ok {
                    warn!("Dropping ad {:?}: no {} creative", ad.id, framework);
                }
                ok
            })
            .collect();

        let ad_break = resolve(playable);
        if ad_break.is_empty() {
            return Err(VastError::NoAds);
        }
        Ok(ad_break)
    }

    /// Panics if `index` did not come from this break
    pub fn ad(&self, index: AdIndex) -> &AdDefinition {
        &self.ads[index.0]
    }

    pub fn ads(&self) -> &[AdDefinition] {
        &self.ads
    }

    pub fn link(&self, index: AdIndex) -> PodLink {
        self.links.get(index.0).copied().unwrap_or_default()
    }

    pub fn next_in_pod(&self, index: AdIndex) -> Option<AdIndex> {
        self.link(index).next_in_pod
    }

    pub fn fallback_for(&self, index: AdIndex) -> Option<AdIndex> {
        self.link(index).fallback
    }

    /// Podded ads in ascending sequence order
    pub fn podded(&self) -> &[AdIndex] {
        &self.podded
    }

    pub fn standalone(&self) -> &[AdIndex] {
        &self.standalone
    }

    /// The standalone ad claimed as fallback by the pod, if any
    pub fn claimed_fallback(&self) -> Option<AdIndex> {
        self.podded.first().and_then(|head| self.fallback_for(*head))
    }

    /// Standalone ads that may get their own timeline slot
    pub fn schedulable_standalone(&self) -> impl Iterator<Item = AdIndex> + '_ {
        let claimed = self.claimed_fallback();
        self.standalone
            .iter()
            .copied()
            .filter(move |index| Some(*index) != claimed)
    }

    pub fn is_empty(&self) -> bool {
        self.podded.is_empty() && self.standalone.is_empty()
    }

    /// Number of ads in the pod `index` belongs to; standalone ads form a pod of one
    pub fn pod_len(&self, index: AdIndex) -> usize {
        if self.podded.contains(&index) {
            self.podded.len()
        } else {
            1
        }
    }

    /// Zero-based position of `index` in its pod
    pub fn position_in_pod(&self, index: AdIndex) -> usize {
        self.podded.iter().position(|i| *i == index).unwrap_or(0)
    }
}

/// Partition ads into a sequenced pod and standalone ads, link the pod and
/// attach the shared fallback.
pub fn resolve(ads: Vec<AdDefinition>) -> AdBreak {
    let (mut podded, standalone): (Vec<AdIndex>, Vec<AdIndex>) = (0..ads.len())
        .map(AdIndex)
        .partition(|index| {
            let ad = &ads[index.0];
            ad.sequence.is_some() && Capabilities::for_version(&ad.version).podded
        });

    // Stable: ads sharing a sequence number keep arrival order
    podded.sort_by_key(|index| ads[index.0].sequence);

    let mut links = vec![PodLink::default(); ads.len()];
    for pair in podded.windows(2) {
        links[pair[0].0].next_in_pod = Some(pair[1]);
    }

    if let Some(head) = podded.first() {
        check_sequences(&ads, &podded);

        let fallback = standalone.first().copied();
        if Capabilities::for_version(&ads[head.0].version).fallback && fallback.is_some() {
            for index in &podded {
                links[index.0].fallback = fallback;
            }
            debug!(
                "Pod of {} ads claims fallback {:?}",
                podded.len(),
                fallback.map(|f| ads[f.0].id.clone())
            );
        }
    }

    AdBreak {
        ads,
        links,
        podded,
        standalone,
    }
}

fn check_sequences(ads: &[AdDefinition], podded: &[AdIndex]) {
    let gapless = podded
        .iter()
        .enumerate()
        .all(|(position, index)| ads[index.0].sequence == Some(position as u32 + 1));
    if !gapless {
        let sequences: Vec<Option<u32>> = podded.iter().map(|i| ads[i.0].sequence).collect();
        warn!("Pod sequences are not gapless from 1: {:?}", sequences);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AdKind;
    use proptest::prelude::*;

    fn ad(id: &str, sequence: Option<u32>, version: &str) -> AdDefinition {
        AdDefinition {
            id: Some(id.to_string()),
            sequence,
            version: version.to_string(),
            kind: AdKind::Inline,
            linear: None,
            non_linear: None,
            companions: Vec::new(),
            impressions: Vec::new(),
            error_urls: Vec::new(),
            title: id.to_string(),
            wrapper_redirect_url: None,
        }
    }

    fn ids(ad_break: &AdBreak, indices: &[AdIndex]) -> Vec<String> {
        indices
            .iter()
            .map(|i| ad_break.ad(*i).id.clone().unwrap())
            .collect()
    }

    #[test]
    fn pod_is_sorted_linked_and_shares_one_fallback() {
        let ad_break = resolve(vec![
            ad("second", Some(2), "3.0"),
            ad("first", Some(1), "3.0"),
            ad("spare", None, "3.0"),
        ]);

        assert_eq!(ids(&ad_break, ad_break.podded()), vec!["first", "second"]);
        let first = ad_break.podded()[0];
        let second = ad_break.podded()[1];
        let spare = ad_break.standalone()[0];

        assert_eq!(ad_break.next_in_pod(first), Some(second));
        assert_eq!(ad_break.next_in_pod(second), None);
        assert_eq!(ad_break.fallback_for(first), Some(spare));
        assert_eq!(ad_break.fallback_for(second), Some(spare));
        assert_eq!(ad_break.fallback_for(spare), None);
        assert_eq!(ad_break.claimed_fallback(), Some(spare));
        assert_eq!(ad_break.schedulable_standalone().count(), 0);
        assert_eq!(ad_break.pod_len(second), 2);
        assert_eq!(ad_break.position_in_pod(second), 1);
    }

    #[test]
    fn vast_2_never_pods_or_falls_back() {
        let ad_break = resolve(vec![
            ad("a", Some(1), "2.0"),
            ad("b", Some(2), "2.0"),
            ad("c", None, "2.0"),
        ]);
        assert!(ad_break.podded().is_empty());
        assert_eq!(ad_break.standalone().len(), 3);
        assert!(ad_break.ads().iter().enumerate().all(|(i, _)| {
            ad_break.link(AdIndex(i)) == PodLink::default()
        }));
    }

    #[test]
    fn no_fallback_without_standalone_ads() {
        let ad_break = resolve(vec![ad("a", Some(1), "3.0")]);
        assert_eq!(ad_break.fallback_for(ad_break.podded()[0]), None);
        assert_eq!(ad_break.claimed_fallback(), None);
    }

    #[test]
    fn only_the_first_standalone_ad_is_claimed() {
        let ad_break = resolve(vec![
            ad("x", None, "3.0"),
            ad("p", Some(1), "3.0"),
            ad("y", None, "3.0"),
        ]);
        let remaining: Vec<AdIndex> = ad_break.schedulable_standalone().collect();
        assert_eq!(ids(&ad_break, &remaining), vec!["y"]);
    }

    #[test]
    fn duplicate_sequences_keep_arrival_order() {
        let ad_break = resolve(vec![
            ad("late", Some(2), "3.0"),
            ad("dup-a", Some(1), "3.0"),
            ad("dup-b", Some(1), "3.0"),
        ]);
        assert_eq!(
            ids(&ad_break, ad_break.podded()),
            vec!["dup-a", "dup-b", "late"]
        );
    }

    #[test]
    fn empty_batch_is_empty() {
        assert!(resolve(Vec::new()).is_empty());
    }

    proptest! {
        #[test]
        fn podded_ads_come_out_sorted(sequences in proptest::collection::vec(1u32..20, 0..12)) {
            let ads = sequences
                .iter()
                .enumerate()
                .map(|(i, seq)| ad(&i.to_string(), Some(*seq), "3.0"))
                .collect();
            let ad_break = resolve(ads);
            let sorted: Vec<u32> = ad_break
                .podded()
                .iter()
                .filter_map(|i| ad_break.ad(*i).sequence)
                .collect();
            prop_assert_eq!(sorted.len(), sequences.len());
            prop_assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
