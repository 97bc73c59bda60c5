use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use kompas_core::{
    ChatInput, ChatReply, Domain, FallbackLevel, Language, LocationMatch,
};
use kompas_gazetteer::LocationExtractor;
use kompas_llm::{AssistantModel, CompletionRequest};
use kompas_observability::AppMetrics;
use kompas_retrieval::{AssembleError, ContextAssembler};
use kompas_storage::ListingRepository;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Grounding text cap handed to the assembler per chat turn.
const DEFAULT_CONTEXT_CHARS: usize = 2_000;

/// One domain's chat orchestrator: a thin caller that extracts a location,
/// assembles bounded grounding, and delegates the wording to the assistant
/// model. Holds no per-request state.
#[derive(Clone)]
pub struct DomainConcierge<R, M> {
    domain: Domain,
    extractor: LocationExtractor,
    assembler: ContextAssembler<R>,
    model: Arc<M>,
    metrics: Arc<AppMetrics>,
    max_context_chars: usize,
}

impl<R, M> DomainConcierge<R, M>
where
    R: ListingRepository,
    M: AssistantModel,
{
    pub fn new(
        domain: Domain,
        extractor: LocationExtractor,
        assembler: ContextAssembler<R>,
        model: Arc<M>,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            domain,
            extractor,
            assembler,
            model,
            metrics,
            max_context_chars: DEFAULT_CONTEXT_CHARS,
        }
    }

    pub fn jobs(
        extractor: LocationExtractor,
        assembler: ContextAssembler<R>,
        model: Arc<M>,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self::new(Domain::Jobs, extractor, assembler, model, metrics)
    }

    pub fn housing(
        extractor: LocationExtractor,
        assembler: ContextAssembler<R>,
        model: Arc<M>,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self::new(Domain::Housing, extractor, assembler, model, metrics)
    }

    pub fn university(
        extractor: LocationExtractor,
        assembler: ContextAssembler<R>,
        model: Arc<M>,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self::new(Domain::University, extractor, assembler, model, metrics)
    }

    pub fn with_max_context_chars(mut self, max_chars: usize) -> Self {
        self.max_context_chars = max_chars;
        self
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    #[instrument(skip(self, input), fields(domain = self.domain.as_str()))]
    pub async fn handle_chat(&self, input: ChatInput) -> Result<ChatReply> {
        let started = Instant::now();
        self.metrics.inc_request();

        let session_id = input
            .session_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let language_hint = Language::from_optional_str(input.language.as_deref());
        let location = self.extractor.extract_with_language(
            &input.text,
            input.jurisdiction.as_deref(),
            language_hint,
        )?;

        match &location {
            Some(_) => self.metrics.inc_location_hit(),
            None => self.metrics.inc_no_location(),
        }

        let jurisdiction = location
            .as_ref()
            .map(|hit| hit.jurisdiction.clone())
            .or_else(|| input.jurisdiction.clone());

        let Some(jurisdiction) = jurisdiction else {
            // No location in the message and no caller profile to scope
            // by; there is nothing to ground on yet.
            return Ok(self.ask_for_region(session_id, location));
        };

        let city = location.as_ref().map(|hit| hit.city.as_str());
        let context = match self
            .assembler
            .assemble(city, &jurisdiction, self.domain, self.max_context_chars)
            .await
        {
            Ok(block) => block,
            Err(AssembleError::Store(error)) => {
                self.metrics.inc_store_failure();
                warn!(%jurisdiction, error = %error, "listing store unavailable");
                return Ok(self.store_unavailable(session_id, jurisdiction, location));
            }
            Err(error @ AssembleError::UnknownJurisdiction(_)) => return Err(error.into()),
        };

        if context.truncated {
            self.metrics.inc_truncation();
        }
        if context.fallback_level == FallbackLevel::Jurisdiction {
            self.metrics.inc_jurisdiction_fallback();
        }

        let fallback_level = context.fallback_level;
        let reply_text = self
            .model
            .complete(CompletionRequest {
                domain: self.domain,
                jurisdiction: jurisdiction.clone(),
                context,
                history: input.history,
                user_message: input.text,
            })
            .await?;

        self.metrics.observe_latency(started.elapsed());
        info!(
            session_id = %session_id,
            jurisdiction = %jurisdiction,
            city = city.unwrap_or("-"),
            fallback = ?fallback_level,
            "chat handled"
        );

        Ok(ChatReply {
            session_id,
            reply_text,
            domain: self.domain,
            location,
            fallback_level: Some(fallback_level),
            grounded: true,
        })
    }

    fn ask_for_region(&self, session_id: String, location: Option<LocationMatch>) -> ChatReply {
        ChatReply {
            session_id,
            reply_text: format!(
                "Which city or country are you asking about? I can look up {} once I know the area.",
                self.domain.label()
            ),
            domain: self.domain,
            location,
            fallback_level: None,
            grounded: false,
        }
    }

    fn store_unavailable(
        &self,
        session_id: String,
        jurisdiction: String,
        location: Option<LocationMatch>,
    ) -> ChatReply {
        ChatReply {
            session_id,
            reply_text: format!(
                "I could not reach the {} listings for {jurisdiction} just now, so I will not guess. Please try again in a moment.",
                self.domain.label()
            ),
            domain: self.domain,
            location,
            fallback_level: None,
            grounded: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kompas_core::{CityAlias, JurisdictionProfile, ListingRecord};
    use kompas_gazetteer::AliasIndex;
    use kompas_llm::TemplateResponder;
    use kompas_storage::{MemoryStore, StoreError};

    fn index() -> Arc<AliasIndex> {
        let profile = JurisdictionProfile {
            code: "SK".to_string(),
            active_cities: vec!["Košice".to_string()],
            supported_languages: vec![Language::Sk, Language::Uk, Language::En],
            is_active: true,
        };
        let aliases = vec![
            CityAlias {
                jurisdiction_code: "SK".to_string(),
                city: "Košice".to_string(),
                language: Language::Sk,
                variant: "Košice".to_string(),
            },
            CityAlias {
                jurisdiction_code: "SK".to_string(),
                city: "Košice".to_string(),
                language: Language::Uk,
                variant: "Кошицях".to_string(),
            },
        ];
        Arc::new(AliasIndex::build(vec![profile], aliases).unwrap())
    }

    fn store_with_listing() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.insert_listing(ListingRecord {
            id: "agency-1".to_string(),
            domain: Domain::Jobs,
            display_name: "Východ Práca".to_string(),
            city: "Košice".to_string(),
            jurisdiction_code: "SK".to_string(),
            country_code: "SK".to_string(),
            website_url: "https://vychodpraca.sk".to_string(),
            is_active: true,
            content: None,
            updated_at: Utc::now(),
        });
        Arc::new(store)
    }

    fn concierge(
        store: Arc<MemoryStore>,
    ) -> DomainConcierge<MemoryStore, TemplateResponder> {
        let index = index();
        DomainConcierge::new(
            Domain::Jobs,
            LocationExtractor::new(index.clone()),
            ContextAssembler::new(index, store),
            Arc::new(TemplateResponder::new()),
            AppMetrics::shared(),
        )
    }

    fn input(text: &str, jurisdiction: Option<&str>) -> ChatInput {
        ChatInput {
            session_id: None,
            text: text.to_string(),
            language: None,
            jurisdiction: jurisdiction.map(ToString::to_string),
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn grounded_reply_for_located_message() {
        let concierge = concierge(store_with_listing());
        let reply = concierge
            .handle_chat(input("ladam brigadu v Košice", Some("SK")))
            .await
            .unwrap();

        assert!(reply.grounded);
        assert_eq!(reply.location.as_ref().unwrap().city, "Košice");
        assert_eq!(reply.fallback_level, Some(FallbackLevel::City));
        assert!(reply.reply_text.contains("Východ Práca"));
    }

    #[tokio::test]
    async fn missing_region_asks_instead_of_guessing() {
        let concierge = concierge(store_with_listing());
        let reply = concierge
            .handle_chat(input("hello there", None))
            .await
            .unwrap();

        assert!(!reply.grounded);
        assert!(reply.location.is_none());
        assert!(reply.reply_text.contains("Which city or country"));
    }

    struct BrokenStore;

    impl ListingRepository for BrokenStore {
        async fn query_active_listings(
            &self,
            _jurisdiction: &str,
            _domain: Domain,
            _city: Option<&str>,
        ) -> Result<Vec<ListingRecord>, StoreError> {
            Err(StoreError::Decode {
                id: "agency-1".to_string(),
                source: chrono::DateTime::parse_from_rfc3339("broken").unwrap_err(),
            })
        }
    }

    #[tokio::test]
    async fn store_outage_is_phrased_not_hidden() {
        let index = index();
        let concierge = DomainConcierge::new(
            Domain::Jobs,
            LocationExtractor::new(index.clone()),
            ContextAssembler::new(index, Arc::new(BrokenStore)),
            Arc::new(TemplateResponder::new()),
            AppMetrics::shared(),
        );

        let reply = concierge
            .handle_chat(input("ladam brigadu v Košice", Some("SK")))
            .await
            .unwrap();
        assert!(!reply.grounded);
        assert!(reply.reply_text.contains("could not reach"));
    }

    #[tokio::test]
    async fn unknown_jurisdiction_hint_is_an_error() {
        let concierge = concierge(store_with_listing());
        let result = concierge
            .handle_chat(input("ladam brigadu v Košice", Some("XX")))
            .await;
        assert!(result.is_err());
    }
}
