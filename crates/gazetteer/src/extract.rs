use std::collections::HashSet;
use std::sync::Arc;

use kompas_core::{detect_language, normalize, Language, LocationMatch, MatchConfidence};
use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

use crate::index::{AliasIndex, JurisdictionEntry};

/// Variants shorter than this many normalized chars only match on word
/// boundaries; short abbreviations otherwise collide with unrelated
/// substrings of ordinary words.
const DEFAULT_MIN_SUBSTRING_CHARS: usize = 5;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unknown jurisdiction code: {0}")]
    UnknownJurisdiction(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OccurrenceKind {
    WordBounded,
    Embedded,
}

struct Candidate<'a> {
    city: &'a str,
    jurisdiction: &'a str,
    language: Language,
    weight: usize,
    kind: OccurrenceKind,
    order: usize,
}

/// Scans normalized messages against the shared [`AliasIndex`]. Pure and
/// lock-free; one instance serves any number of concurrent requests.
#[derive(Clone)]
pub struct LocationExtractor {
    index: Arc<AliasIndex>,
    min_substring_chars: usize,
}

impl LocationExtractor {
    pub fn new(index: Arc<AliasIndex>) -> Self {
        Self {
            index,
            min_substring_chars: DEFAULT_MIN_SUBSTRING_CHARS,
        }
    }

    pub fn with_min_substring_chars(mut self, chars: usize) -> Self {
        self.min_substring_chars = chars;
        self
    }

    pub fn index(&self) -> &Arc<AliasIndex> {
        &self.index
    }

    /// The `extract_location` contract: best-matching canonical city for
    /// the message, or `Ok(None)` when no registered alias occurs. The
    /// latter is a valid "no location mentioned" outcome, not an error.
    pub fn extract(
        &self,
        message: &str,
        jurisdiction_hint: Option<&str>,
    ) -> Result<Option<LocationMatch>, ExtractError> {
        let language_hint = detect_language(None, message);
        self.extract_with_language(message, jurisdiction_hint, language_hint)
    }

    /// Same scan with an explicit language hint, used when the caller
    /// already knows the conversation language. The hint only breaks ties
    /// between equal-length variants; it never filters candidates.
    pub fn extract_with_language(
        &self,
        message: &str,
        jurisdiction_hint: Option<&str>,
        language_hint: Language,
    ) -> Result<Option<LocationMatch>, ExtractError> {
        let normalized = normalize(message);
        if normalized.is_empty() {
            return Ok(None);
        }
        let boundaries = word_boundaries(&normalized);

        let scan: Vec<&JurisdictionEntry> = match jurisdiction_hint {
            Some(code) => vec![self
                .index
                .entry(code)
                .ok_or_else(|| ExtractError::UnknownJurisdiction(code.to_string()))?],
            None => self.index.active_entries().collect(),
        };

        let mut candidates: Vec<Candidate<'_>> = Vec::new();
        let mut best_weight = 0usize;

        for (order, entry) in scan.iter().enumerate() {
            for alias in &entry.aliases {
                // Sorted heaviest-first, so nothing below the current best
                // can still win or tie.
                if alias.weight < best_weight {
                    break;
                }
                let Some(kind) = self.find_occurrence(&normalized, &boundaries, &alias.normalized)
                else {
                    continue;
                };
                best_weight = best_weight.max(alias.weight);
                candidates.push(Candidate {
                    city: &alias.city,
                    jurisdiction: &entry.profile.code,
                    language: alias.language,
                    weight: alias.weight,
                    kind,
                    order,
                });
            }
        }

        candidates.retain(|candidate| candidate.weight == best_weight);
        if candidates.is_empty() {
            return Ok(None);
        }

        let distinct_cities: HashSet<(&str, &str)> = candidates
            .iter()
            .map(|candidate| (candidate.jurisdiction, candidate.city))
            .collect();
        let contested = distinct_cities.len() > 1;

        let winner = candidates
            .iter()
            .min_by_key(|candidate| {
                let hint_miss =
                    language_hint == Language::Unknown || candidate.language != language_hint;
                (hint_miss, candidate.order)
            })
            .expect("candidate list is non-empty");

        let confidence = if contested {
            MatchConfidence::AmbiguousTieBroken
        } else {
            match winner.kind {
                OccurrenceKind::WordBounded => MatchConfidence::ExactWord,
                OccurrenceKind::Embedded => MatchConfidence::Substring,
            }
        };

        Ok(Some(LocationMatch {
            city: winner.city.to_string(),
            jurisdiction: winner.jurisdiction.to_string(),
            language: winner.language,
            confidence,
        }))
    }

    fn find_occurrence(
        &self,
        haystack: &str,
        boundaries: &HashSet<usize>,
        needle: &str,
    ) -> Option<OccurrenceKind> {
        let mut embedded = false;
        for (start, _) in haystack.match_indices(needle) {
            if boundaries.contains(&start) && boundaries.contains(&(start + needle.len())) {
                return Some(OccurrenceKind::WordBounded);
            }
            embedded = true;
        }

        if embedded && needle.chars().count() >= self.min_substring_chars {
            Some(OccurrenceKind::Embedded)
        } else {
            None
        }
    }
}

/// Byte offsets that UAX#29 word segmentation treats as word edges. An
/// alias occurrence counts as word-bounded when both its ends land on one.
fn word_boundaries(text: &str) -> HashSet<usize> {
    let mut offsets: HashSet<usize> = text
        .split_word_bound_indices()
        .map(|(offset, _)| offset)
        .collect();
    offsets.insert(text.len());
    offsets
}
