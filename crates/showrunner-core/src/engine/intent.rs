//! Navigation intents and the marker query parameters they carry.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::playlist::{Category, EpisodeEntry};

pub const AUTOPLAY_MARKER: &str = "wwe_autoplay";
pub const TYPE_MARKER: &str = "wwe_type";
pub const START_MARKER: &str = "wwe_start";
pub const RESUME_MARKER: &str = "wwe_resume";

/// Why the engine is navigating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Linear continuation after a confirmed completion.
    Continue,
    Start,
    Resume,
}

impl IntentKind {
    fn extra_marker(self) -> Option<&'static str> {
        match self {
            Self::Continue => None,
            Self::Start => Some(START_MARKER),
            Self::Resume => Some(RESUME_MARKER),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationIntent {
    pub kind: IntentKind,
    pub position: usize,
    pub category: Category,
    /// Entry URL with the marker parameters applied.
    pub target: String,
}

impl NavigationIntent {
    /// `None` if the entry URL cannot be parsed.
    pub fn for_entry(entry: &EpisodeEntry, position: usize, kind: IntentKind) -> Option<Self> {
        let mut url = Url::parse(&entry.url).ok()?;
        set_query_param(&mut url, AUTOPLAY_MARKER, "1");
        set_query_param(&mut url, TYPE_MARKER, entry.category.as_str());
        if let Some(marker) = kind.extra_marker() {
            set_query_param(&mut url, marker, "1");
        }
        Some(Self {
            kind,
            position,
            category: entry.category,
            target: url.into(),
        })
    }
}

/// Replace every `key` pair with a single `key=value`, keeping other pairs in order.
fn set_query_param(url: &mut Url, key: &str, value: &str) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    for (k, v) in &kept {
        pairs.append_pair(k, v);
    }
    pairs.append_pair(key, value);
}

fn marker_value(location: &str, key: &str) -> Option<String> {
    let url = Url::parse(location).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Location was reached through an engine navigation (autoplay, start or resume).
pub fn has_autoplay_marker(location: &str) -> bool {
    [AUTOPLAY_MARKER, RESUME_MARKER, START_MARKER]
        .iter()
        .any(|key| marker_value(location, key).as_deref() == Some("1"))
}

/// Category announced by the `wwe_type` marker, if any.
pub fn marker_category(location: &str) -> Option<Category> {
    marker_value(location, TYPE_MARKER).and_then(|v| Category::parse(&v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(url: &str, category: Category) -> EpisodeEntry {
        EpisodeEntry {
            date: NaiveDate::from_ymd_opt(2004, 1, 1).unwrap(),
            url: url.into(),
            category,
        }
    }

    #[test]
    fn continue_intent_carries_autoplay_and_type() {
        let intent = NavigationIntent::for_entry(
            &entry("https://www.netflix.com/watch/81000001?trackId=5", Category::Raw),
            3,
            IntentKind::Continue,
        )
        .unwrap();
        assert_eq!(
            intent.target,
            "https://www.netflix.com/watch/81000001?trackId=5&wwe_autoplay=1&wwe_type=RAW"
        );
        assert_eq!(intent.position, 3);
        assert!(has_autoplay_marker(&intent.target));
        assert_eq!(marker_category(&intent.target), Some(Category::Raw));
    }

    #[test]
    fn start_and_resume_add_their_marker() {
        let e = entry("https://www.peacocktv.com/watch/tok", Category::Heat);
        let start = NavigationIntent::for_entry(&e, 0, IntentKind::Start).unwrap();
        assert!(start.target.ends_with("wwe_autoplay=1&wwe_type=HEAT&wwe_start=1"));
        let resume = NavigationIntent::for_entry(&e, 0, IntentKind::Resume).unwrap();
        assert!(resume.target.ends_with("wwe_resume=1"));
    }

    #[test]
    fn existing_markers_are_replaced_not_duplicated() {
        let e = entry("https://a.example/x?wwe_type=SD&wwe_autoplay=0", Category::Ppv);
        let intent = NavigationIntent::for_entry(&e, 0, IntentKind::Continue).unwrap();
        assert_eq!(intent.target, "https://a.example/x?wwe_autoplay=1&wwe_type=PPV");
    }

    #[test]
    fn marker_detection_requires_value_one() {
        assert!(has_autoplay_marker("https://a.example/x?wwe_resume=1"));
        assert!(!has_autoplay_marker("https://a.example/x?wwe_resume=0"));
        assert!(!has_autoplay_marker("https://a.example/x?my_wwe_autoplay=1"));
        assert!(!has_autoplay_marker("garbage"));
        assert_eq!(marker_category("https://a.example/x?wwe_type=heat"), Some(Category::Heat));
        assert_eq!(marker_category("https://a.example/x"), None);
    }
}
