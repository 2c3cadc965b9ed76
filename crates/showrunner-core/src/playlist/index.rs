use std::collections::HashMap;

use serde::Serialize;

use super::canon::{canonicalize, content_token, ContentToken};
use super::EpisodeEntry;

/// How a location was matched against the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Strict,
    ContentToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexMatch {
    pub position: usize,
    pub kind: MatchKind,
}

/// Lookup tables from identity to sequence positions, rebuilt with the sequence.
///
/// Position lists are ascending, so the first element is the earliest
/// chronological occurrence of a re-aired or duplicated link.
#[derive(Debug, Clone, Default)]
pub struct SequenceIndex {
    by_key: HashMap<String, Vec<usize>>,
    by_token: HashMap<ContentToken, Vec<usize>>,
}

impl SequenceIndex {
    pub fn build(master: &[EpisodeEntry]) -> Self {
        let mut index = Self::default();
        for (position, entry) in master.iter().enumerate() {
            index
                .by_key
                .entry(canonicalize(&entry.url))
                .or_default()
                .push(position);
            if let Some(token) = content_token(&entry.url) {
                index.by_token.entry(token).or_default().push(position);
            }
        }
        index
    }

    pub fn positions_for_key(&self, key: &str) -> &[usize] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn positions_for_token(&self, token: &ContentToken) -> &[usize] {
        self.by_token.get(token).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Strict canonical match first, then the looser content-token match.
    pub fn lookup(&self, location: &str) -> Option<IndexMatch> {
        if let Some(&position) = self.positions_for_key(&canonicalize(location)).first() {
            return Some(IndexMatch {
                position,
                kind: MatchKind::Strict,
            });
        }
        let token = content_token(location)?;
        self.positions_for_token(&token)
            .first()
            .map(|&position| IndexMatch {
                position,
                kind: MatchKind::ContentToken,
            })
    }

    pub fn key_count(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::{build_master, CategoryLists};

    fn master() -> Vec<EpisodeEntry> {
        build_master(&CategoryLists {
            raw: vec![
                "2004-01-05 https://www.netflix.com/watch/81000001".into(),
                "2004-01-12 https://www.peacocktv.com/watch/raw-0112".into(),
            ],
            sd: vec![
                "2004-01-08 https://www.netflix.com/watch/81000002".into(),
                "2004-01-15 https://www.netflix.com/watch/81000001?rerun=1".into(),
            ],
            ppv: vec![],
            heat: vec![],
        })
    }

    #[test]
    fn strict_match_prefers_lowest_position() {
        let index = SequenceIndex::build(&master());
        let m = index.lookup("https://netflix.com/title/81000001?x=1").unwrap();
        assert_eq!(m.position, 0);
        assert_eq!(m.kind, MatchKind::Strict);
        assert_eq!(index.positions_for_key("netflix.com/id/81000001"), &[0, 3]);
    }

    #[test]
    fn token_match_catches_host_variants() {
        let index = SequenceIndex::build(&master());
        let m = index.lookup("https://de.peacocktv.com/watch/raw-0112").unwrap();
        assert_eq!(m.position, 2);
        assert_eq!(m.kind, MatchKind::ContentToken);
    }

    #[test]
    fn unknown_location_has_no_match() {
        let index = SequenceIndex::build(&master());
        assert!(index.lookup("https://www.netflix.com/browse").is_none());
        assert!(index.lookup("https://elsewhere.example/watch/81000001").is_none());
        assert!(index.lookup("nonsense").is_none());
    }

    #[test]
    fn empty_sequence_builds_empty_index() {
        let index = SequenceIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.lookup("https://www.netflix.com/watch/81000001").is_none());
    }
}
