use std::path::Path;

use kompas_core::{CityAlias, JurisdictionProfile, Language};
use serde::Deserialize;
use walkdir::WalkDir;

use crate::index::{AliasIndex, GazetteerError};

/// One gazetteer payload file: a jurisdiction profile plus its alias
/// table. One file per jurisdiction under `config/gazetteer/`.
#[derive(Debug, Clone, Deserialize)]
pub struct GazetteerPayload {
    pub profile: JurisdictionProfile,
    pub aliases: Vec<AliasGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AliasGroup {
    pub city: String,
    pub language: Language,
    pub variants: Vec<String>,
}

/// The configuration the alias index is built from, loaded once at
/// process start. Any malformed payload is fatal; the process must not
/// serve with a corrupt gazetteer.
#[derive(Debug, Default)]
pub struct GazetteerConfig {
    pub profiles: Vec<JurisdictionProfile>,
    pub aliases: Vec<CityAlias>,
}

impl GazetteerConfig {
    /// Reads every `*.json` under `root`. Files are visited in sorted
    /// path order, which fixes jurisdiction registration order, the
    /// documented tie-break for hintless extraction.
    pub fn load_dir(root: impl AsRef<Path>) -> Result<Self, GazetteerError> {
        let mut config = Self::default();

        for entry in WalkDir::new(root.as_ref())
            .sort_by_file_name()
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry.path().extension().and_then(|ext| ext.to_str()) == Some("json")
            })
        {
            let path = entry.path();
            let raw = std::fs::read_to_string(path).map_err(|source| GazetteerError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let payload: GazetteerPayload =
                serde_json::from_str(&raw).map_err(|source| GazetteerError::Parse {
                    path: path.display().to_string(),
                    source,
                })?;

            tracing::debug!(
                path = %path.display(),
                jurisdiction = %payload.profile.code,
                "gazetteer payload loaded"
            );
            config.push_payload(payload);
        }

        Ok(config)
    }

    pub fn push_payload(&mut self, payload: GazetteerPayload) {
        let code = payload.profile.code.clone();
        self.profiles.push(payload.profile);
        for group in payload.aliases {
            for variant in group.variants {
                self.aliases.push(CityAlias {
                    jurisdiction_code: code.clone(),
                    city: group.city.clone(),
                    language: group.language,
                    variant,
                });
            }
        }
    }

    pub fn into_index(self) -> Result<AliasIndex, GazetteerError> {
        AliasIndex::build(self.profiles, self.aliases)
    }
}
