//! Per-category episode lists and the merged, date-ordered master sequence.

pub mod canon;
pub mod index;

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use canon::{canonicalize, content_token, ContentToken, Provider};
pub use index::{IndexMatch, MatchKind, SequenceIndex};

static LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})\s+(https?://\S+)").expect("line pattern is valid")
});

/// Show category. Merge order is declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Raw,
    Sd,
    Ppv,
    Heat,
}

impl Category {
    pub const ALL: [Category; 4] = [Category::Raw, Category::Sd, Category::Ppv, Category::Heat];

    /// Field name of this category in the persisted and exported records.
    pub fn list_key(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Sd => "sd",
            Self::Ppv => "ppv",
            Self::Heat => "heat",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "RAW",
            Self::Sd => "SD",
            Self::Ppv => "PPV",
            Self::Heat => "HEAT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dated episode link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeEntry {
    pub date: NaiveDate,
    pub url: String,
    #[serde(rename = "type")]
    pub category: Category,
}

/// The four raw category lists, one line string per element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLists {
    #[serde(default)]
    pub raw: Vec<String>,
    #[serde(default)]
    pub sd: Vec<String>,
    #[serde(default)]
    pub ppv: Vec<String>,
    #[serde(default)]
    pub heat: Vec<String>,
}

impl CategoryLists {
    /// Build lists from editor text blocks, one block per category.
    pub fn from_texts(raw: &str, sd: &str, ppv: &str, heat: &str) -> Self {
        Self {
            raw: clean_lines(raw),
            sd: clean_lines(sd),
            ppv: clean_lines(ppv),
            heat: clean_lines(heat),
        }
    }

    pub fn get(&self, category: Category) -> &[String] {
        match category {
            Category::Raw => &self.raw,
            Category::Sd => &self.sd,
            Category::Ppv => &self.ppv,
            Category::Heat => &self.heat,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut Vec<String> {
        match category {
            Category::Raw => &mut self.raw,
            Category::Sd => &mut self.sd,
            Category::Ppv => &mut self.ppv,
            Category::Heat => &mut self.heat,
        }
    }

    /// Lines joined back into one text block, as shown in an editor.
    pub fn text(&self, category: Category) -> String {
        self.get(category).join("\n")
    }

    pub fn line_count(&self) -> usize {
        Category::ALL.iter().map(|c| self.get(*c).len()).sum()
    }
}

/// Split editor text into trimmed, non-empty lines.
pub fn clean_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `YYYY-MM-DD <url>` lines. Anything else is dropped without error.
pub fn parse_lines<S: AsRef<str>>(lines: &[S], category: Category) -> Vec<EpisodeEntry> {
    lines
        .iter()
        .filter_map(|line| parse_line(line.as_ref(), category))
        .collect()
}

fn parse_line(line: &str, category: Category) -> Option<EpisodeEntry> {
    let caps = LINE_RE.captures(line.trim())?;
    let date = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()?;
    Some(EpisodeEntry {
        date,
        url: caps[2].to_string(),
        category,
    })
}

/// Concatenate the categories in merge order and stable-sort by date.
pub fn build_master(lists: &CategoryLists) -> Vec<EpisodeEntry> {
    let mut master: Vec<EpisodeEntry> = Category::ALL
        .into_iter()
        .flat_map(|c| parse_lines(lists.get(c), c))
        .collect();
    master.sort_by_key(|e| e.date);
    master
}
