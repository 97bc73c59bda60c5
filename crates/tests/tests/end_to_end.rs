use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use kompas_agents::DomainConcierge;
use kompas_core::{ChatInput, Domain, FallbackLevel, ListingRecord, MatchConfidence};
use kompas_gazetteer::{AliasIndex, GazetteerConfig, LocationExtractor};
use kompas_llm::TemplateResponder;
use kompas_observability::AppMetrics;
use kompas_retrieval::ContextAssembler;
use kompas_storage::MemoryStore;

fn gazetteer_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/gazetteer")
}

fn index() -> Arc<AliasIndex> {
    let index = GazetteerConfig::load_dir(gazetteer_root())
        .and_then(GazetteerConfig::into_index)
        .expect("shipped gazetteer config is valid");
    Arc::new(index)
}

fn listing(id: &str, domain: Domain, name: &str, city: &str) -> ListingRecord {
    ListingRecord {
        id: id.to_string(),
        domain,
        display_name: name.to_string(),
        city: city.to_string(),
        jurisdiction_code: "SK".to_string(),
        country_code: "SK".to_string(),
        website_url: format!("https://{id}.sk"),
        is_active: true,
        content: Some("Support for newcomers settling in the region.".to_string()),
        updated_at: Utc::now(),
    }
}

fn seeded_store() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store.insert_listing(listing("vychod-praca", Domain::Jobs, "Východ Práca", "Košice"));
    store.insert_listing(listing("ke-jobs", Domain::Jobs, "KE Jobs Center", "Košice"));
    store.insert_listing(listing("ba-works", Domain::Jobs, "BA Works", "Bratislava"));
    store.insert_listing(listing("tuke", Domain::University, "Technická univerzita v Košiciach", "Košice"));
    Arc::new(store)
}

#[test]
fn every_alias_variant_extracts_its_own_city_exactly() {
    let config = GazetteerConfig::load_dir(gazetteer_root()).expect("config loads");
    let extractor = LocationExtractor::new(index());

    for alias in &config.aliases {
        let hit = extractor
            .extract(&alias.variant, Some(&alias.jurisdiction_code))
            .expect("registered jurisdiction")
            .unwrap_or_else(|| panic!("variant {:?} did not match", alias.variant));
        assert_eq!(hit.city, alias.city, "variant {:?}", alias.variant);
        assert_eq!(hit.jurisdiction, alias.jurisdiction_code);
        assert_eq!(hit.confidence, MatchConfidence::ExactWord, "variant {:?}", alias.variant);
    }
}

#[test]
fn multilingual_kosice_spellings_converge() {
    let extractor = LocationExtractor::new(index());

    for message in [
        "ladam brigadu v Košice",
        "Шукаю роботу в Кошицях",
        "praca w Koszycach",
        "Kassa környékén keresek munkát",
    ] {
        let hit = extractor
            .extract(message, Some("SK"))
            .unwrap()
            .unwrap_or_else(|| panic!("no match for {message:?}"));
        assert_eq!(hit.city, "Košice", "message {message:?}");
        assert_eq!(hit.jurisdiction, "SK");
        assert_eq!(hit.confidence, MatchConfidence::ExactWord);
    }
}

#[test]
fn plain_smalltalk_yields_no_location() {
    let extractor = LocationExtractor::new(index());
    assert!(extractor.extract("hello there", None).unwrap().is_none());
    assert!(extractor
        .extract("how do work permits generally work?", None)
        .unwrap()
        .is_none());
}

#[test]
fn short_abbreviations_do_not_fire_inside_words() {
    let extractor = LocationExtractor::new(index());
    // "ke" inside "market", "ba" inside "probably": embedded occurrences
    // of short variants must stay silent.
    assert!(extractor
        .extract("probably a market question", Some("SK"))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn context_is_bounded_and_truncation_is_visible() {
    let assembler = ContextAssembler::new(index(), seeded_store());

    let block = assembler
        .assemble(Some("Košice"), "SK", Domain::Jobs, 160)
        .await
        .unwrap();
    assert!(block.truncated);
    assert!(block.text.chars().count() <= 160);
    assert!(block.text.contains("[context truncated]"));

    let wide = assembler
        .assemble(None, "SK", Domain::Jobs, 4000)
        .await
        .unwrap();
    assert!(!wide.truncated);
    assert!(!wide.text.is_empty());
    assert_eq!(wide.fallback_level, FallbackLevel::Jurisdiction);
}

#[tokio::test]
async fn city_without_records_falls_back_to_jurisdiction() {
    let assembler = ContextAssembler::new(index(), seeded_store());
    let block = assembler
        .assemble(Some("Nitra"), "SK", Domain::Jobs, 4000)
        .await
        .unwrap();
    assert_eq!(block.fallback_level, FallbackLevel::Jurisdiction);
    assert!(block.text.contains("No active job agencies matched Nitra"));
}

#[tokio::test]
async fn chat_round_trip_grounds_the_reply() {
    let index = index();
    let concierge = DomainConcierge::new(
        Domain::Jobs,
        LocationExtractor::new(index.clone()),
        ContextAssembler::new(index, seeded_store()),
        Arc::new(TemplateResponder::new()),
        AppMetrics::shared(),
    );

    let reply = concierge
        .handle_chat(ChatInput {
            session_id: None,
            text: "Шукаю роботу в Кошицях".to_string(),
            language: Some("uk".to_string()),
            jurisdiction: Some("SK".to_string()),
            history: Vec::new(),
        })
        .await
        .unwrap();

    assert!(reply.grounded);
    assert_eq!(reply.location.as_ref().unwrap().city, "Košice");
    assert_eq!(reply.fallback_level, Some(FallbackLevel::City));
    assert!(reply.reply_text.contains("Východ Práca"));
    assert!(!reply.session_id.is_empty());
}

#[tokio::test]
async fn housing_concierge_reports_empty_jurisdiction_plainly() {
    let index = index();
    let concierge = DomainConcierge::housing(
        LocationExtractor::new(index.clone()),
        ContextAssembler::new(index, Arc::new(MemoryStore::new())),
        Arc::new(TemplateResponder::new()),
        AppMetrics::shared(),
    );

    let reply = concierge
        .handle_chat(ChatInput {
            session_id: None,
            text: "hladam byt v Bratislave".to_string(),
            language: Some("sk".to_string()),
            jurisdiction: None,
            history: Vec::new(),
        })
        .await
        .unwrap();

    assert!(reply.grounded);
    assert_eq!(reply.location.as_ref().unwrap().city, "Bratislava");
    assert_eq!(reply.fallback_level, Some(FallbackLevel::Jurisdiction));
    assert!(reply.reply_text.contains("No active housing agencies"));
}

#[tokio::test]
async fn university_domain_stays_separate_from_jobs() {
    let index = index();
    let assembler = ContextAssembler::new(index, seeded_store());

    let block = assembler
        .assemble(Some("Košice"), "SK", Domain::University, 4000)
        .await
        .unwrap();
    assert_eq!(block.listing_count, 1);
    assert!(block.text.contains("Technická univerzita"));
    assert!(!block.text.contains("Východ Práca"));
}
