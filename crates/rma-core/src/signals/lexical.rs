//! Lexical marker scan.
//!
//! A cheap, explainable pre-filter: look for hedges, boilerplate refusals
//! and filler in the draft text and report the single worst match. It is
//! tolerant of false positives and is not a classifier.

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::clamp_unit;

/// What kind of failure a marker indicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerCategory {
    /// Speculative hedging ("maybe", "i think")
    Hedge,
    /// Boilerplate refusal ("as an ai", "i cannot")
    Refusal,
    /// Content-free padding
    Filler,
    /// Disallowed content; promoted to a fatal verdict
    Safety,
}

impl MarkerCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerCategory::Hedge => "hedge",
            MarkerCategory::Refusal => "refusal",
            MarkerCategory::Filler => "filler",
            MarkerCategory::Safety => "safety",
        }
    }
}

impl fmt::Display for MarkerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A marker phrase and the severity it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Phrase matched as a case-insensitive substring
    pub phrase: String,

    /// Severity in `[0, 1]`
    pub weight: f64,

    /// Failure class
    #[serde(default = "default_category")]
    pub category: MarkerCategory,
}

fn default_category() -> MarkerCategory {
    MarkerCategory::Hedge
}

impl Marker {
    pub fn new(phrase: impl Into<String>, weight: f64, category: MarkerCategory) -> Self {
        Self {
            phrase: phrase.into(),
            weight,
            category,
        }
    }
}

/// The strongest marker found in a text.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerMatch {
    pub phrase: String,
    pub weight: f64,
    pub category: MarkerCategory,
    /// Byte offset of the first occurrence in the scanned text
    pub offset: usize,
}

/// Errors building a scanner from a marker table.
#[derive(Error, Debug)]
pub enum MarkerError {
    #[error("Marker phrase at position {0} is empty")]
    EmptyPhrase(usize),

    #[error("Marker '{phrase}' has weight {weight}, expected a value in [0, 1]")]
    WeightOutOfRange { phrase: String, weight: f64 },

    #[error("Marker '{phrase}' failed to compile: {source}")]
    Compile {
        phrase: String,
        #[source]
        source: regex::Error,
    },
}

lazy_static! {
    /// Default marker table, in match-priority order.
    static ref DEFAULT_MARKERS: Vec<Marker> = vec![
        Marker::new("maybe", 0.15, MarkerCategory::Hedge),
        Marker::new("possibly", 0.20, MarkerCategory::Hedge),
        Marker::new("not sure", 0.30, MarkerCategory::Hedge),
        Marker::new("uncertain", 0.35, MarkerCategory::Hedge),
        Marker::new("i think", 0.10, MarkerCategory::Hedge),
        Marker::new("it seems", 0.12, MarkerCategory::Hedge),
        Marker::new("as an ai", 0.9, MarkerCategory::Refusal),
        Marker::new("i cannot", 0.9, MarkerCategory::Refusal),
    ];

    static ref DEFAULT_SCANNER: LexicalScanner =
        LexicalScanner::new(DEFAULT_MARKERS.clone()).unwrap();
}

/// The built-in marker table.
pub fn default_markers() -> Vec<Marker> {
    DEFAULT_MARKERS.clone()
}

#[derive(Debug, Clone)]
struct CompiledMarker {
    marker: Marker,
    pattern: Regex,
}

/// Scans text for configured markers and reports the worst severity.
///
/// The table is ordered. Severity is the maximum weight among matches, never
/// a sum: several weak hedges cannot outrank one strong refusal. On equal
/// weights the marker listed first wins.
#[derive(Debug, Clone)]
pub struct LexicalScanner {
    markers: Vec<CompiledMarker>,
}

impl LexicalScanner {
    /// Compile a marker table.
    pub fn new(markers: Vec<Marker>) -> Result<Self, MarkerError> {
        let mut compiled = Vec::with_capacity(markers.len());

        for (index, marker) in markers.into_iter().enumerate() {
            if marker.phrase.trim().is_empty() {
                return Err(MarkerError::EmptyPhrase(index));
            }
            if !(0.0..=1.0).contains(&marker.weight) {
                return Err(MarkerError::WeightOutOfRange {
                    phrase: marker.phrase,
                    weight: marker.weight,
                });
            }

            let pattern = RegexBuilder::new(&regex::escape(&marker.phrase))
                .case_insensitive(true)
                .build()
                .map_err(|source| MarkerError::Compile {
                    phrase: marker.phrase.clone(),
                    source,
                })?;

            compiled.push(CompiledMarker { marker, pattern });
        }

        Ok(Self { markers: compiled })
    }

    /// Severity of the worst marker in `text`, or `0.0` if none match.
    pub fn scan(&self, text: &str) -> f64 {
        self.strongest(text)
            .map(|m| clamp_unit(m.weight))
            .unwrap_or(0.0)
    }

    /// The worst marker in `text`, if any.
    pub fn strongest(&self, text: &str) -> Option<MarkerMatch> {
        self.strongest_where(text, |_| true)
    }

    /// The worst marker of one category in `text`, if any.
    pub fn strongest_in(&self, text: &str, category: MarkerCategory) -> Option<MarkerMatch> {
        self.strongest_where(text, |m| m.category == category)
    }

    fn strongest_where(&self, text: &str, keep: impl Fn(&Marker) -> bool) -> Option<MarkerMatch> {
        let mut best: Option<MarkerMatch> = None;

        for compiled in self.markers.iter().filter(|c| keep(&c.marker)) {
            let Some(found) = compiled.pattern.find(text) else {
                continue;
            };

            let stronger = best
                .as_ref()
                .map_or(true, |b| compiled.marker.weight > b.weight);

            if stronger {
                best = Some(MarkerMatch {
                    phrase: compiled.marker.phrase.clone(),
                    weight: compiled.marker.weight,
                    category: compiled.marker.category,
                    offset: found.start(),
                });
            }
        }

        best
    }

    /// The configured table, in order.
    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter().map(|c| &c.marker)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

impl Default for LexicalScanner {
    fn default() -> Self {
        DEFAULT_SCANNER.clone()
    }
}
