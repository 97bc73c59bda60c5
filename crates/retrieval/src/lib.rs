mod render;

use std::collections::BTreeMap;
use std::sync::Arc;

use kompas_core::{normalize, ContextBlock, Domain, FallbackLevel, ListingRecord};
use kompas_gazetteer::AliasIndex;
use kompas_storage::{ListingRepository, StoreError};
use thiserror::Error;

use render::{render_record, BoundedText};

/// Records shown in a jurisdiction-wide summary before the list is capped.
const DEFAULT_SAMPLE_CAP: usize = 8;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("unknown jurisdiction code: {0}")]
    UnknownJurisdiction(String),
    /// Store failure stays distinct from an empty result; the caller's
    /// phrasing differs between "nothing stored" and "store unreachable".
    #[error("listing store failed during context assembly")]
    Store(#[from] StoreError),
}

/// Assembles the bounded grounding block handed to the language model.
/// Stateless per call: every invocation reads the store fresh, nothing is
/// cached across requests.
#[derive(Clone)]
pub struct ContextAssembler<R> {
    index: Arc<AliasIndex>,
    repository: Arc<R>,
    sample_cap: usize,
}

impl<R: ListingRepository> ContextAssembler<R> {
    pub fn new(index: Arc<AliasIndex>, repository: Arc<R>) -> Self {
        Self {
            index,
            repository,
            sample_cap: DEFAULT_SAMPLE_CAP,
        }
    }

    pub fn with_sample_cap(mut self, cap: usize) -> Self {
        self.sample_cap = cap;
        self
    }

    /// The `build_context` contract. `city = None` yields a
    /// jurisdiction-wide summary; a known city with zero matching records
    /// falls back one level and flags it via `fallback_level`.
    pub async fn assemble(
        &self,
        city: Option<&str>,
        jurisdiction: &str,
        domain: Domain,
        max_chars: usize,
    ) -> Result<ContextBlock, AssembleError> {
        if self.index.jurisdiction(jurisdiction).is_none() {
            return Err(AssembleError::UnknownJurisdiction(jurisdiction.to_string()));
        }

        if let Some(city) = city {
            let mut records = self
                .repository
                .query_active_listings(jurisdiction, domain, Some(city))
                .await?;

            if !records.is_empty() {
                sort_records(&mut records);
                let block = self.render_city_block(city, jurisdiction, domain, &records, max_chars);
                tracing::debug!(
                    jurisdiction,
                    domain = domain.as_str(),
                    city,
                    records = records.len(),
                    truncated = block.truncated,
                    "city context assembled"
                );
                return Ok(block);
            }

            let block = self
                .render_jurisdiction_block(
                    jurisdiction,
                    domain,
                    max_chars,
                    Some(city),
                )
                .await?;
            tracing::debug!(
                jurisdiction,
                domain = domain.as_str(),
                city,
                "city empty, fell back to jurisdiction summary"
            );
            return Ok(block);
        }

        self.render_jurisdiction_block(jurisdiction, domain, max_chars, None)
            .await
    }

    fn render_city_block(
        &self,
        city: &str,
        jurisdiction: &str,
        domain: Domain,
        records: &[ListingRecord],
        max_chars: usize,
    ) -> ContextBlock {
        let mut text = BoundedText::new(max_chars);
        text.push_block(format!(
            "Active {} in {city}, {jurisdiction}: {} record(s).",
            domain.label(),
            records.len()
        ));
        for record in records {
            text.push_block(render_record(record));
        }

        let (rendered, truncated) = text.finish();
        ContextBlock {
            text: rendered,
            truncated,
            fallback_level: FallbackLevel::City,
            listing_count: records.len(),
        }
    }

    async fn render_jurisdiction_block(
        &self,
        jurisdiction: &str,
        domain: Domain,
        max_chars: usize,
        empty_city: Option<&str>,
    ) -> Result<ContextBlock, AssembleError> {
        let mut records = self
            .repository
            .query_active_listings(jurisdiction, domain, None)
            .await?;
        sort_records(&mut records);

        let mut text = BoundedText::new(max_chars);

        if let Some(city) = empty_city {
            text.push_block(format!(
                "No active {} matched {city} in {jurisdiction}; jurisdiction-wide summary follows.",
                domain.label()
            ));
        }

        if records.is_empty() {
            text.push_block(format!(
                "No active {} recorded for {jurisdiction}.",
                domain.label()
            ));
            let (rendered, truncated) = text.finish();
            return Ok(ContextBlock {
                text: rendered,
                truncated,
                fallback_level: FallbackLevel::Jurisdiction,
                listing_count: 0,
            });
        }

        // Group per city on normalized names so spelling noise in stored
        // rows does not split a city into two buckets.
        let mut by_city: BTreeMap<String, (String, usize)> = BTreeMap::new();
        for record in &records {
            let key = normalize(&record.city);
            let slot = by_city
                .entry(key)
                .or_insert_with(|| (record.city.clone(), 0));
            slot.1 += 1;
        }

        let mut counts: Vec<(String, usize)> = by_city.into_values().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let counts_line = counts
            .iter()
            .map(|(city, count)| format!("{city} ({count})"))
            .collect::<Vec<_>>()
            .join(", ");

        text.push_block(format!(
            "Active {} in {jurisdiction}: {} records across {} cities.",
            domain.label(),
            records.len(),
            counts.len()
        ));
        text.push_block(format!("By city: {counts_line}."));
        text.push_block("Sample:".to_string());
        for record in records.iter().take(self.sample_cap) {
            text.push_block(render_record(record));
        }

        let (rendered, truncated) = text.finish();
        Ok(ContextBlock {
            text: rendered,
            truncated,
            fallback_level: FallbackLevel::Jurisdiction,
            listing_count: records.len(),
        })
    }
}

fn sort_records(records: &mut [ListingRecord]) {
    records.sort_by(|a, b| {
        a.display_name
            .cmp(&b.display_name)
            .then_with(|| a.id.cmp(&b.id))
    });
}
