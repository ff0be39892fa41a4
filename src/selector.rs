//! Mirror selection
//!
//! Orders architecture-compatible mirrors for a client: mirrors in the
//! client's country come first, each group sorted by descending preference.
//! Equal preference keeps catalog order. Selection is a pure function of the
//! client origin, the candidates and the configured cap.

use crate::models::{CountryCode, Mirror, Protocol};
use std::cmp::Reverse;
use tracing::debug;

/// Keep only mirrors able to serve `arch`
///
/// Must run before [`MirrorSelector::select`]; the selector assumes every
/// candidate is architecture-compatible.
pub fn filter_by_arch(mirrors: Vec<Mirror>, arch: Option<&str>) -> Vec<Mirror> {
    let total = mirrors.len();
    let compatible: Vec<Mirror> = mirrors
        .into_iter()
        .filter(|mirror| mirror.serves_arch(arch))
        .collect();

    debug!(
        "Architecture filter: arch={:?}, kept {} of {} mirrors",
        arch,
        compatible.len(),
        total
    );
    compatible
}

/// One advertised (mirror, protocol) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advertised<'a> {
    pub mirror: &'a Mirror,
    pub protocol: Protocol,
}

impl Advertised<'_> {
    pub fn url(&self) -> String {
        self.mirror.resource_url(self.protocol)
    }
}

/// Ranks candidate mirrors for a client
#[derive(Debug, Clone, Copy, Default)]
pub struct MirrorSelector {
    max_mirrors: Option<usize>,
}

impl MirrorSelector {
    /// Create a selector that returns every candidate
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a selector that keeps at most `max_mirrors` mirrors
    pub fn with_max_mirrors(max_mirrors: Option<usize>) -> Self {
        MirrorSelector { max_mirrors }
    }

    /// Order `mirrors` for a client in `origin`
    ///
    /// With a known origin, same-country mirrors precede all others. Without
    /// one the result is a plain preference sort. The cap, if any, is applied
    /// after ordering so the best-ranked mirrors survive.
    pub fn select<'a>(
        &self,
        origin: Option<&CountryCode>,
        mirrors: &'a [Mirror],
    ) -> Vec<&'a Mirror> {
        let mut ranked: Vec<&Mirror> = mirrors.iter().collect();

        // sort_by_key is stable: equal keys keep catalog order
        match origin {
            Some(country) => {
                ranked.sort_by_key(|m| (!m.is_in(country), Reverse(m.preference)));
            }
            None => {
                ranked.sort_by_key(|m| Reverse(m.preference));
            }
        }

        if let Some(max) = self.max_mirrors {
            ranked.truncate(max);
        }

        debug!(
            "Selected {} of {} mirrors for origin={:?}",
            ranked.len(),
            mirrors.len(),
            origin.map(CountryCode::as_str)
        );
        ranked
    }
}

/// Expand selected mirrors into one entry per protocol, keeping their order
pub fn fan_out<'a>(selected: &[&'a Mirror]) -> Vec<Advertised<'a>> {
    selected
        .iter()
        .flat_map(|&mirror| {
            mirror
                .protocols
                .iter()
                .map(move |&protocol| Advertised { mirror, protocol })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirror(url: &str, country: &str, preference: i32) -> Mirror {
        Mirror::new(url, vec![Protocol::Https], preference).with_country(country)
    }

    fn urls(selected: &[&Mirror]) -> Vec<String> {
        selected.iter().map(|m| m.url.clone()).collect()
    }

    fn us() -> CountryCode {
        CountryCode::parse("US").unwrap()
    }

    #[test]
    fn test_empty_input() {
        let selector = MirrorSelector::new();
        assert!(selector.select(Some(&us()), &[]).is_empty());
        assert!(selector.select(None, &[]).is_empty());
    }

    #[test]
    fn test_locality_beats_preference() {
        let mirrors = vec![mirror("b.example", "DE", 100), mirror("a.example", "US", 1)];
        let selected = MirrorSelector::new().select(Some(&us()), &mirrors);
        assert_eq!(urls(&selected), vec!["a.example", "b.example"]);
    }

    #[test]
    fn test_preference_within_locality() {
        let mirrors = vec![
            mirror("a.example", "US", 5),
            mirror("b.example", "US", 10),
            mirror("c.example", "FR", 7),
            mirror("d.example", "DE", 9),
        ];
        let selected = MirrorSelector::new().select(Some(&us()), &mirrors);
        assert_eq!(
            urls(&selected),
            vec!["b.example", "a.example", "d.example", "c.example"]
        );
    }

    #[test]
    fn test_unknown_origin_sorts_by_preference() {
        let mirrors = vec![
            mirror("a.example", "US", 1),
            mirror("b.example", "DE", 30),
            mirror("c.example", "FR", 20),
        ];
        let selected = MirrorSelector::new().select(None, &mirrors);
        assert_eq!(urls(&selected), vec!["b.example", "c.example", "a.example"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let mirrors = vec![
            mirror("first.example", "US", 10),
            mirror("second.example", "US", 10),
            mirror("third.example", "US", 10),
        ];
        let selected = MirrorSelector::new().select(Some(&us()), &mirrors);
        assert_eq!(
            urls(&selected),
            vec!["first.example", "second.example", "third.example"]
        );
    }

    #[test]
    fn test_mirror_without_country_is_not_local() {
        let mirrors = vec![
            Mirror::new("nowhere.example", vec![Protocol::Https], 50),
            mirror("local.example", "US", 1),
        ];
        let selected = MirrorSelector::new().select(Some(&us()), &mirrors);
        assert_eq!(urls(&selected), vec!["local.example", "nowhere.example"]);
    }

    #[test]
    fn test_cap_applies_after_ordering() {
        let mirrors = vec![
            mirror("low.example", "DE", 1),
            mirror("mid.example", "DE", 5),
            mirror("local.example", "US", 0),
            mirror("high.example", "DE", 9),
        ];
        let selected = MirrorSelector::with_max_mirrors(Some(2)).select(Some(&us()), &mirrors);
        assert_eq!(urls(&selected), vec!["local.example", "high.example"]);
    }

    #[test]
    fn test_fan_out_protocols() {
        let mirrors = vec![
            Mirror::new("mirror1.example", vec![Protocol::Https], 10).with_country("US"),
            Mirror::new("mirror2.example", vec![Protocol::Https, Protocol::Http], 20)
                .with_country("DE"),
        ];
        let advertised = fan_out(&MirrorSelector::new().select(Some(&us()), &mirrors));
        let entries: Vec<String> = advertised.iter().map(Advertised::url).collect();
        assert_eq!(
            entries,
            vec![
                "https://mirror1.example/repodata/repomd.xml",
                "https://mirror2.example/repodata/repomd.xml",
                "http://mirror2.example/repodata/repomd.xml",
            ]
        );
    }

    #[test]
    fn test_filter_by_arch() {
        let mirrors = vec![
            Mirror::new("any.example", vec![Protocol::Https], 1),
            Mirror::new("x86.example", vec![Protocol::Https], 1).with_arch("x86_64"),
            Mirror::new("arm.example", vec![Protocol::Https], 1).with_arch("aarch64"),
        ];

        let kept = filter_by_arch(mirrors.clone(), Some("x86_64"));
        let kept: Vec<_> = kept.iter().map(|m| m.url.as_str()).collect();
        assert_eq!(kept, vec!["any.example", "x86.example"]);

        let kept = filter_by_arch(mirrors, None);
        let kept: Vec<_> = kept.iter().map(|m| m.url.as_str()).collect();
        assert_eq!(kept, vec!["any.example"]);
    }
}
