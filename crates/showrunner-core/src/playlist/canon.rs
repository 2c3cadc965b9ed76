//! Stable identity keys for provider URLs.
//!
//! Query strings, locale prefixes and trailing slashes churn between visits
//! to the same title. Only the provider's content id (or opaque watch token)
//! survives, so identity is built from that where one can be found and from
//! `host + path` otherwise. Nothing here fails: an unparseable input is its
//! own key.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

static NETFLIX_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(?:title|watch)/(\d{4,})").expect("netflix segment pattern is valid")
});

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4,}").expect("digit run pattern is valid"));

static PEACOCK_WATCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/watch/([^/]+)").expect("peacock watch pattern is valid")
});

/// Streaming providers with provider-specific identity rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Netflix,
    Peacock,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Netflix, Provider::Peacock];

    pub fn domain_token(self) -> &'static str {
        match self {
            Self::Netflix => "netflix.com",
            Self::Peacock => "peacocktv.com",
        }
    }

    /// Provider whose domain token appears in `host`.
    pub fn for_host(host: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| host.contains(p.domain_token()))
    }

    fn extract(self, path: &str) -> Option<String> {
        match self {
            Self::Netflix => NETFLIX_SEGMENT
                .captures(path)
                .map(|c| c[1].to_string())
                .or_else(|| DIGIT_RUN.find(path).map(|m| m.as_str().to_string())),
            Self::Peacock => PEACOCK_WATCH.captures(path).map(|c| c[1].to_string()),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Netflix => write!(f, "netflix"),
            Self::Peacock => write!(f, "peacock"),
        }
    }
}

/// Bare provider content id, without the host/key wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentToken {
    pub provider: Provider,
    pub token: String,
}

struct UrlParts {
    host: String,
    path: String,
}

fn split(url: &str) -> Option<UrlParts> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let host = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let path = parsed.path();
    let path = path.strip_suffix('/').unwrap_or(path).to_string();
    Some(UrlParts { host, path })
}

/// Canonical identity key for `url`.
///
/// Netflix: `host/id/<numeric id>`; Peacock: `host/watch/<token>`; anything
/// else (or a provider URL without an id) is `host + path`.
pub fn canonicalize(url: &str) -> String {
    let Some(parts) = split(url) else {
        return url.to_string();
    };

    match Provider::for_host(&parts.host) {
        Some(provider) => match (provider, provider.extract(&parts.path)) {
            (Provider::Netflix, Some(id)) => format!("{}/id/{}", parts.host, id),
            (Provider::Peacock, Some(token)) => format!("{}/watch/{}", parts.host, token),
            (_, None) => format!("{}{}", parts.host, parts.path),
        },
        None => format!("{}{}", parts.host, parts.path),
    }
}

/// Provider content token for `url`, or `None` for unknown hosts and
/// provider URLs that carry no id.
pub fn content_token(url: &str) -> Option<ContentToken> {
    let parts = split(url)?;
    let provider = Provider::for_host(&parts.host)?;
    let token = provider.extract(&parts.path)?;
    Some(ContentToken { provider, token })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn netflix_watch_id() {
        assert_eq!(
            canonicalize("https://www.netflix.com/watch/81234567?trackId=14170287&tctx=1"),
            "netflix.com/id/81234567"
        );
    }

    #[test]
    fn netflix_title_and_watch_share_identity() {
        assert_eq!(
            canonicalize("https://www.netflix.com/title/81234567"),
            canonicalize("https://www.netflix.com/watch/81234567")
        );
    }

    #[test]
    fn netflix_locale_prefix_falls_back_to_digit_run() {
        assert_eq!(
            canonicalize("https://www.netflix.com/gb/Title/81234567/"),
            "netflix.com/id/81234567"
        );
        assert_eq!(
            canonicalize("https://www.netflix.com/browse/m/xx81234567yy"),
            "netflix.com/id/81234567"
        );
    }

    #[test]
    fn netflix_without_id_uses_path() {
        assert_eq!(canonicalize("https://www.netflix.com/browse/"), "netflix.com/browse");
    }

    #[test]
    fn peacock_watch_token() {
        assert_eq!(
            canonicalize("https://www.peacocktv.com/watch/playback/vod/GMO_00000000224510_02/abc?x=1"),
            "peacocktv.com/watch/playback"
        );
        assert_eq!(
            canonicalize("https://WWW.PeacockTV.com/Watch/SmackDown-2004-01-01/"),
            "peacocktv.com/watch/SmackDown-2004-01-01"
        );
    }

    #[test]
    fn peacock_without_watch_segment_uses_path() {
        assert_eq!(
            canonicalize("https://www.peacocktv.com/stream-tv/wwe"),
            "peacocktv.com/stream-tv/wwe"
        );
    }

    #[test]
    fn other_hosts_use_host_and_path() {
        assert_eq!(
            canonicalize("http://p1.example/watch/abc?autoplay=1#t=5"),
            "p1.example/watch/abc"
        );
        assert_eq!(canonicalize("http://p1.example:8080/"), "p1.example:8080");
    }

    #[test]
    fn unparseable_input_is_returned_verbatim() {
        assert_eq!(canonicalize("not a url"), "not a url");
        assert_eq!(canonicalize(""), "");
    }

    #[test]
    fn query_parameters_never_change_the_key() {
        let urls = [
            "https://www.netflix.com/watch/81234567",
            "https://www.peacocktv.com/watch/abc",
            "http://p1.example/watch/abc",
        ];
        for url in urls {
            let base = canonicalize(url);
            for query in ["?a=1", "?wwe_autoplay=1&wwe_type=RAW", "?trackId=9&x=y&z"] {
                assert_eq!(canonicalize(&format!("{url}{query}")), base, "{url}{query}");
            }
        }
    }

    #[test]
    fn content_token_for_known_providers() {
        assert_eq!(
            content_token("https://www.netflix.com/de/title/70123456?x=1"),
            Some(ContentToken {
                provider: Provider::Netflix,
                token: "70123456".into()
            })
        );
        assert_eq!(
            content_token("https://www.peacocktv.com/watch/tok-1"),
            Some(ContentToken {
                provider: Provider::Peacock,
                token: "tok-1".into()
            })
        );
        assert_eq!(content_token("http://p1.example/watch/abc"), None);
        assert_eq!(content_token("https://www.netflix.com/browse"), None);
        assert_eq!(content_token("garbage"), None);
    }
}
