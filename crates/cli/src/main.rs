//! PetClinic indexer CLI
//!
//! Wires the Kafka change-event source, the two-level join pipeline
//! and the Elasticsearch sink together and runs them until the source
//! ends or the process receives ctrl-c.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use petclinic_indexer_processor::{
    ChangeEventSource, DocumentSink, ElasticSink, IndexerConfig, IndexingPipeline, RakeExtractor,
};

#[derive(Parser)]
#[command(
    name = "petclinic-indexer",
    version,
    about = "Streams PetClinic change records into denormalized owner documents"
)]
struct Cli {
    /// Kafka bootstrap brokers (comma-separated)
    #[arg(long, env = "PETCLINIC_BROKERS")]
    brokers: Option<String>,

    /// Kafka consumer group id
    #[arg(long, env = "PETCLINIC_GROUP_ID")]
    group_id: Option<String>,

    /// Topic carrying owner change records
    #[arg(long)]
    owners_topic: Option<String>,

    /// Topic carrying pet change records
    #[arg(long)]
    pets_topic: Option<String>,

    /// Topic carrying visit change records
    #[arg(long)]
    visits_topic: Option<String>,

    /// Elasticsearch base URL
    #[arg(long, env = "PETCLINIC_ELASTIC_URL")]
    elastic_url: Option<String>,

    /// Target Elasticsearch index
    #[arg(long, env = "PETCLINIC_ELASTIC_INDEX")]
    elastic_index: Option<String>,

    /// Join workers per hierarchy level
    #[arg(long)]
    parallelism: Option<usize>,

    /// Disable visit keyword enrichment
    #[arg(long)]
    no_enrichment: bool,

    /// Path to a JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    info!(
        brokers = %config.source.brokers,
        group_id = %config.source.group_id,
        index = %config.sink.index,
        parallelism = config.pipeline.parallelism,
        "starting petclinic indexer"
    );

    let source = ChangeEventSource::new(&config.source).context("creating kafka source")?;
    let sink: Arc<dyn DocumentSink> =
        Arc::new(ElasticSink::new(config.sink.clone()).context("creating elasticsearch sink")?);
    let pipeline = IndexingPipeline::new(
        config.pipeline.clone(),
        config.enrichment.clone(),
        Arc::new(RakeExtractor::new()),
        sink,
    );
    let stats = pipeline.stats();

    let (tx, rx) = mpsc::channel(config.pipeline.buffer_size);
    let mut source_task = tokio::spawn(source.run(tx));
    let mut pipeline_task = tokio::spawn(pipeline.run(rx));

    tokio::select! {
        result = &mut source_task => {
            result.context("source task panicked")??;
            info!("source ended, draining pipeline");
            (&mut pipeline_task).await.context("pipeline task panicked")??;
        }
        result = &mut pipeline_task => {
            result.context("pipeline task panicked")??;
            warn!("pipeline ended before the source");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    info!(
        events_processed = stats.events_processed(),
        documents_emitted = stats.documents_emitted(),
        sink_failures = stats.sink_failures(),
        "indexer stopped"
    );
    Ok(())
}

/// Load the configuration file if given, then apply flag overrides.
fn load_config(cli: &Cli) -> anyhow::Result<IndexerConfig> {
    let mut config = match &cli.config {
        Some(path) => IndexerConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => IndexerConfig::default(),
    };

    if let Some(brokers) = &cli.brokers {
        config.source.brokers = brokers.clone();
    }
    if let Some(group_id) = &cli.group_id {
        config.source.group_id = group_id.clone();
    }
    if let Some(topic) = &cli.owners_topic {
        config.source.owners_topic = topic.clone();
    }
    if let Some(topic) = &cli.pets_topic {
        config.source.pets_topic = topic.clone();
    }
    if let Some(topic) = &cli.visits_topic {
        config.source.visits_topic = topic.clone();
    }
    if let Some(url) = &cli.elastic_url {
        config.sink.url = url.clone();
    }
    if let Some(index) = &cli.elastic_index {
        config.sink.index = index.clone();
    }
    if let Some(parallelism) = cli.parallelism {
        config.pipeline.parallelism = parallelism;
    }
    if cli.no_enrichment {
        config.enrichment.enabled = false;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "petclinic_indexer_processor=debug,info"
    } else {
        "info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
