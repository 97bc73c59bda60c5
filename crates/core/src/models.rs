use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Sk,
    Cs,
    Uk,
    Ru,
    Pl,
    Hu,
    De,
    En,
    Unknown,
}

impl Language {
    pub fn from_optional_str(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()) {
            Some(v) if v == "sk" || v == "sk-sk" || v == "slovak" => Self::Sk,
            Some(v) if v == "cs" || v == "cs-cz" || v == "czech" => Self::Cs,
            Some(v) if v == "uk" || v == "uk-ua" || v == "ukrainian" => Self::Uk,
            Some(v) if v == "ru" || v == "ru-ru" || v == "russian" => Self::Ru,
            Some(v) if v == "pl" || v == "pl-pl" || v == "polish" => Self::Pl,
            Some(v) if v == "hu" || v == "hu-hu" || v == "hungarian" => Self::Hu,
            Some(v) if v == "de" || v == "de-de" || v == "german" => Self::De,
            Some(v) if v == "en" || v == "en-us" || v == "english" => Self::En,
            _ => Self::Unknown,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            Self::Sk => "sk",
            Self::Cs => "cs",
            Self::Uk => "uk",
            Self::Ru => "ru",
            Self::Pl => "pl",
            Self::Hu => "hu",
            Self::De => "de",
            Self::En => "en",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Jobs,
    Housing,
    University,
}

#[derive(Debug, Clone, Error)]
#[error("unknown content domain: {0}")]
pub struct UnknownDomain(pub String);

impl Domain {
    pub fn parse(value: &str) -> Result<Self, UnknownDomain> {
        match value.trim().to_lowercase().as_str() {
            "jobs" | "job" | "work" => Ok(Self::Jobs),
            "housing" | "rent" => Ok(Self::Housing),
            "university" | "universities" | "study" => Ok(Self::University),
            other => Err(UnknownDomain(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jobs => "jobs",
            Self::Housing => "housing",
            Self::University => "university",
        }
    }

    /// Human label used when rendering context headers.
    pub fn label(self) -> &'static str {
        match self {
            Self::Jobs => "job agencies",
            Self::Housing => "housing agencies",
            Self::University => "universities",
        }
    }
}

/// One supported jurisdiction, loaded once at startup and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JurisdictionProfile {
    pub code: String,
    pub active_cities: Vec<String>,
    pub supported_languages: Vec<Language>,
    pub is_active: bool,
}

/// A recorded spelling of a canonical city in one language.
///
/// Identity of a city is `(jurisdiction_code, city)`; two jurisdictions may
/// use the same literal spelling for different cities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityAlias {
    pub jurisdiction_code: String,
    pub city: String,
    pub language: Language,
    pub variant: String,
}

/// A row owned by the persistence layer. Read-only in this workspace.
/// The original rows are domain-polymorphic (job agency, housing agency,
/// university record); `domain` is the discriminator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: String,
    pub domain: Domain,
    pub display_name: String,
    /// Free text as stored; not necessarily a canonical city name.
    pub city: String,
    pub jurisdiction_code: String,
    pub country_code: String,
    pub website_url: String,
    pub is_active: bool,
    pub content: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    ExactWord,
    Substring,
    AmbiguousTieBroken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationMatch {
    pub city: String,
    pub jurisdiction: String,
    pub language: Language,
    pub confidence: MatchConfidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackLevel {
    City,
    Jurisdiction,
}

/// Bounded grounding text handed to the language-model collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBlock {
    pub text: String,
    pub truncated: bool,
    pub fallback_level: FallbackLevel,
    pub listing_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub at: DateTime<Utc>,
    pub user_text: String,
    pub assistant_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatInput {
    pub session_id: Option<String>,
    pub text: String,
    pub language: Option<String>,
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub session_id: String,
    pub reply_text: String,
    pub domain: Domain,
    pub location: Option<LocationMatch>,
    pub fallback_level: Option<FallbackLevel>,
    /// False when the listing store was unreachable and the reply carries
    /// the "data unavailable" phrasing instead of grounded facts.
    pub grounded: bool,
}
