use std::collections::HashMap;

use kompas_core::{normalize, CityAlias, JurisdictionProfile, Language};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static JURISDICTION_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}$").expect("valid jurisdiction code regex"));

#[derive(Debug, Error)]
pub enum GazetteerError {
    #[error("invalid jurisdiction code {0:?}: expected ISO 3166-1 alpha-2")]
    InvalidJurisdictionCode(String),
    #[error("duplicate jurisdiction profile {0}")]
    DuplicateJurisdiction(String),
    #[error("empty alias variant for city {city:?} in jurisdiction {jurisdiction}")]
    EmptyAlias { jurisdiction: String, city: String },
    #[error(
        "alias {variant:?} in jurisdiction {jurisdiction} maps to both {existing:?} and {conflicting:?}"
    )]
    DuplicateAlias {
        jurisdiction: String,
        variant: String,
        existing: String,
        conflicting: String,
    },
    #[error("alias references unknown jurisdiction {0}")]
    UnknownJurisdiction(String),
    #[error("alias references city {city:?} outside the active set of jurisdiction {jurisdiction}")]
    UnknownCity { jurisdiction: String, city: String },
    #[error("failed reading gazetteer payload at {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed gazetteer payload at {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct AliasEntry {
    pub city: String,
    pub language: Language,
    pub normalized: String,
    /// Char count of `normalized`, precomputed for longest-match ordering.
    pub weight: usize,
}

#[derive(Debug)]
pub(crate) struct JurisdictionEntry {
    pub profile: JurisdictionProfile,
    /// Sorted by `weight` descending at build time so extraction applies
    /// longest-match-first without re-sorting per call.
    pub aliases: Vec<AliasEntry>,
}

/// Immutable jurisdiction-partitioned gazetteer. Built once at startup,
/// then shared (`Arc`) across all chat requests; nothing mutates it after
/// construction.
#[derive(Debug)]
pub struct AliasIndex {
    entries: Vec<JurisdictionEntry>,
    by_code: HashMap<String, usize>,
}

impl AliasIndex {
    /// Builds the index or fails on the configuration errors that must
    /// never reach serving traffic: empty variants, one normalized
    /// spelling claimed by two cities of the same jurisdiction, aliases
    /// pointing at unknown jurisdictions or inactive cities.
    pub fn build(
        profiles: Vec<JurisdictionProfile>,
        aliases: Vec<CityAlias>,
    ) -> Result<Self, GazetteerError> {
        let mut entries = Vec::with_capacity(profiles.len());
        let mut by_code = HashMap::new();

        for profile in profiles {
            if !JURISDICTION_CODE.is_match(&profile.code) {
                return Err(GazetteerError::InvalidJurisdictionCode(profile.code));
            }
            if by_code
                .insert(profile.code.clone(), entries.len())
                .is_some()
            {
                return Err(GazetteerError::DuplicateJurisdiction(profile.code));
            }
            entries.push(JurisdictionEntry {
                profile,
                aliases: Vec::new(),
            });
        }

        let mut claimed: HashMap<(usize, String), String> = HashMap::new();
        for alias in aliases {
            let slot = *by_code
                .get(&alias.jurisdiction_code)
                .ok_or_else(|| GazetteerError::UnknownJurisdiction(alias.jurisdiction_code.clone()))?;
            let entry = &mut entries[slot];

            if !entry.profile.active_cities.contains(&alias.city) {
                return Err(GazetteerError::UnknownCity {
                    jurisdiction: alias.jurisdiction_code,
                    city: alias.city,
                });
            }

            let normalized = normalize(&alias.variant);
            if normalized.is_empty() {
                return Err(GazetteerError::EmptyAlias {
                    jurisdiction: alias.jurisdiction_code,
                    city: alias.city,
                });
            }

            match claimed.entry((slot, normalized.clone())) {
                std::collections::hash_map::Entry::Occupied(existing) => {
                    if existing.get() != &alias.city {
                        return Err(GazetteerError::DuplicateAlias {
                            jurisdiction: alias.jurisdiction_code,
                            variant: alias.variant,
                            existing: existing.get().clone(),
                            conflicting: alias.city,
                        });
                    }
                }
                std::collections::hash_map::Entry::Vacant(vacant) => {
                    vacant.insert(alias.city.clone());
                }
            }

            let weight = normalized.chars().count();
            entry.aliases.push(AliasEntry {
                city: alias.city,
                language: alias.language,
                normalized,
                weight,
            });
        }

        for entry in &mut entries {
            entry.aliases.sort_by(|a, b| b.weight.cmp(&a.weight));
        }

        tracing::info!(
            jurisdictions = entries.len(),
            aliases = entries.iter().map(|e| e.aliases.len()).sum::<usize>(),
            "alias index built"
        );

        Ok(Self { entries, by_code })
    }

    pub fn jurisdiction(&self, code: &str) -> Option<&JurisdictionProfile> {
        self.by_code
            .get(code)
            .map(|slot| &self.entries[*slot].profile)
    }

    /// Jurisdictions in registration order; the order is the documented
    /// tie-break when a hint is absent.
    pub fn jurisdiction_codes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.profile.code.as_str())
    }

    pub(crate) fn entry(&self, code: &str) -> Option<&JurisdictionEntry> {
        self.by_code.get(code).map(|slot| &self.entries[*slot])
    }

    pub(crate) fn active_entries(&self) -> impl Iterator<Item = &JurisdictionEntry> {
        self.entries.iter().filter(|entry| entry.profile.is_active)
    }

    pub fn alias_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.aliases.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(code: &str, cities: &[&str]) -> JurisdictionProfile {
        JurisdictionProfile {
            code: code.to_string(),
            active_cities: cities.iter().map(ToString::to_string).collect(),
            supported_languages: vec![Language::Sk, Language::Uk, Language::En],
            is_active: true,
        }
    }

    fn alias(code: &str, city: &str, language: Language, variant: &str) -> CityAlias {
        CityAlias {
            jurisdiction_code: code.to_string(),
            city: city.to_string(),
            language,
            variant: variant.to_string(),
        }
    }

    #[test]
    fn rejects_conflicting_alias_within_jurisdiction() {
        let result = AliasIndex::build(
            vec![profile("SK", &["Košice", "Komárno"])],
            vec![
                alias("SK", "Košice", Language::Sk, "ke"),
                alias("SK", "Komárno", Language::Sk, "KE"),
            ],
        );
        assert!(matches!(result, Err(GazetteerError::DuplicateAlias { .. })));
    }

    #[test]
    fn allows_same_spelling_across_jurisdictions() {
        let index = AliasIndex::build(
            vec![profile("SK", &["Komárno"]), profile("HU", &["Komárom"])],
            vec![
                alias("SK", "Komárno", Language::Sk, "komarno"),
                alias("HU", "Komárom", Language::Hu, "komarno"),
            ],
        )
        .expect("cross-jurisdiction collision is legal");
        assert_eq!(index.alias_count(), 2);
    }

    #[test]
    fn rejects_empty_and_diacritic_only_variants() {
        let result = AliasIndex::build(
            vec![profile("SK", &["Košice"])],
            vec![alias("SK", "Košice", Language::Sk, "  ")],
        );
        assert!(matches!(result, Err(GazetteerError::EmptyAlias { .. })));
    }

    #[test]
    fn rejects_alias_for_unknown_jurisdiction() {
        let result = AliasIndex::build(
            vec![profile("SK", &["Košice"])],
            vec![alias("CZ", "Praha", Language::Cs, "praha")],
        );
        assert!(matches!(result, Err(GazetteerError::UnknownJurisdiction(_))));
    }

    #[test]
    fn rejects_malformed_jurisdiction_code() {
        let result = AliasIndex::build(vec![profile("SVK", &["Košice"])], Vec::new());
        assert!(matches!(
            result,
            Err(GazetteerError::InvalidJurisdictionCode(_))
        ));
    }
}
