use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kompas_agents::DomainConcierge;
use kompas_core::{ChatInput, Domain, ListingRecord};
use kompas_gazetteer::{AliasIndex, GazetteerConfig, LocationExtractor};
use kompas_llm::TemplateResponder;
use kompas_observability::{init_tracing, AppMetrics};
use kompas_retrieval::ContextAssembler;
use kompas_storage::Store;

#[derive(Debug, Parser)]
#[command(name = "kompas")]
#[command(about = "Kompas location routing and context assembly")]
struct Cli {
    /// Directory of per-jurisdiction gazetteer payloads.
    #[arg(long, default_value = "config/gazetteer")]
    gazetteer: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat against one content domain.
    Chat {
        #[arg(long, default_value = "jobs")]
        domain: String,
        /// Jurisdiction scope applied when the message names no city.
        #[arg(long)]
        jurisdiction: Option<String>,
    },
    /// One-shot location extraction.
    Extract {
        message: String,
        #[arg(long)]
        jurisdiction: Option<String>,
    },
    /// One-shot context assembly.
    Context {
        #[arg(long)]
        jurisdiction: String,
        #[arg(long, default_value = "jobs")]
        domain: String,
        #[arg(long)]
        city: Option<String>,
        #[arg(long, default_value_t = 2000)]
        max_chars: usize,
    },
    /// Validate the gazetteer configuration and print its shape.
    Check,
    /// Load listing records from a JSON file into the SQLite store.
    Seed { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("kompas_cli");
    let cli = Cli::parse();

    let index = load_index(&cli.gazetteer)?;

    match cli.command {
        Command::Chat {
            domain,
            jurisdiction,
        } => {
            let domain = Domain::parse(&domain).context("invalid --domain value")?;
            let metrics = AppMetrics::shared();
            let concierge = build_concierge(index, domain, metrics.clone()).await?;
            run_chat(concierge, jurisdiction).await?;
            println!(
                "session metrics: {}",
                serde_json::to_string_pretty(&metrics.snapshot())?
            );
        }
        Command::Extract {
            message,
            jurisdiction,
        } => {
            let extractor = LocationExtractor::new(index);
            let hit = extractor.extract(&message, jurisdiction.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&hit)?);
        }
        Command::Context {
            jurisdiction,
            domain,
            city,
            max_chars,
        } => {
            let domain = Domain::parse(&domain).context("invalid --domain value")?;
            let store = Arc::new(build_store().await?);
            let assembler = ContextAssembler::new(index, store);
            let block = assembler
                .assemble(city.as_deref(), &jurisdiction, domain, max_chars)
                .await?;
            println!("{}", serde_json::to_string_pretty(&block)?);
        }
        Command::Check => {
            println!(
                "gazetteer ok: {} jurisdiction(s), {} alias entries",
                index.jurisdiction_codes().count(),
                index.alias_count()
            );
            for code in index.jurisdiction_codes() {
                println!("- {code}");
            }
        }
        Command::Seed { file } => {
            seed_listings(&file).await?;
        }
    }

    Ok(())
}

fn load_index(gazetteer_root: &Path) -> Result<Arc<AliasIndex>> {
    let index = GazetteerConfig::load_dir(gazetteer_root)
        .and_then(GazetteerConfig::into_index)
        .with_context(|| {
            format!(
                "failed loading gazetteer from {}",
                gazetteer_root.display()
            )
        })?;
    Ok(Arc::new(index))
}

async fn build_store() -> Result<Store> {
    if let Ok(database_url) = env::var("KOMPAS_DATABASE_URL") {
        Ok(Store::sqlite(&database_url).await?)
    } else {
        Ok(Store::memory())
    }
}

async fn build_concierge(
    index: Arc<AliasIndex>,
    domain: Domain,
    metrics: Arc<AppMetrics>,
) -> Result<DomainConcierge<Store, TemplateResponder>> {
    let store = Arc::new(build_store().await?);

    Ok(DomainConcierge::new(
        domain,
        LocationExtractor::new(index.clone()),
        ContextAssembler::new(index, store),
        Arc::new(TemplateResponder::new()),
        metrics,
    ))
}

async fn run_chat(
    concierge: DomainConcierge<Store, TemplateResponder>,
    jurisdiction: Option<String>,
) -> Result<()> {
    let mut session_id: Option<String> = None;

    println!(
        "Kompas {} chat mode. type 'exit' to quit.",
        concierge.domain().as_str()
    );

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        io::stdin().read_line(&mut line)?;

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        if message.is_empty() {
            continue;
        }

        let reply = concierge
            .handle_chat(ChatInput {
                session_id: session_id.clone(),
                text: message.to_string(),
                language: None,
                jurisdiction: jurisdiction.clone(),
                history: Vec::new(),
            })
            .await?;

        session_id = Some(reply.session_id.clone());

        println!("\n{}\n", reply.reply_text);
        if let Some(hit) = &reply.location {
            println!(
                "[matched {} / {} via {} alias, {:?}]\n",
                hit.city,
                hit.jurisdiction,
                hit.language.as_code(),
                hit.confidence
            );
        }
    }

    Ok(())
}

async fn seed_listings(file: &Path) -> Result<()> {
    let Ok(database_url) = env::var("KOMPAS_DATABASE_URL") else {
        bail!("seed requires KOMPAS_DATABASE_URL to point at a SQLite database");
    };

    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed reading listings file {}", file.display()))?;
    let records: Vec<ListingRecord> =
        serde_json::from_str(&raw).context("listings file is not a JSON array of records")?;

    let store = kompas_storage::SqliteStore::connect(&database_url).await?;

    for record in &records {
        store.upsert_listing(record).await?;
    }

    println!("seeded {} listing(s)", records.len());
    Ok(())
}
