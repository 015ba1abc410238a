use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use onto_archive::{
    codec::TypeRegistry,
    config::Dataset,
    deploy::local::LocalDatabase,
    job::{ArchiveMode, JsonLinesSink, Pipeline, Rehydrator, RunOptions, sql::Identifier},
    progress::{RunPhase, create_reporter},
    schema::DatasetSchema,
    tag::TagResolver,
};
use tracing::{error, info};

#[derive(Parser)]
#[command(version, about = "Archive relational rows as tagged records")]
struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Archive every source row after the watermark
    Archive {
        source: String,
        destination: String,
        table: String,
        dictionary: String,
        /// Database holding the countries/institutes/terms tables (defaults to the dictionary)
        graph: Option<String>,
        /// Resume after this ordering value
        watermark: Option<String>,
        #[arg(short, long, env = "ONTO_ARCHIVE_MAPPING")]
        mapping: PathBuf,
        /// Count record-level failures instead of aborting
        #[arg(long)]
        keep_going: bool,
        /// Upsert even on a fresh run
        #[arg(long)]
        replace: bool,
    },
    /// Decode archived entries into a JSON lines file
    Rehydrate {
        destination: String,
        table: String,
        dictionary: String,
        #[arg(short, long, required = true)]
        mapping: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..))]
        page_size: u64,
    },
}

async fn open(dsn: &str) -> anyhow::Result<LocalDatabase> {
    LocalDatabase::open(dsn)
        .await
        .with_context(|| format!("open {dsn}"))
}

async fn load_schema(path: &Path) -> anyhow::Result<DatasetSchema> {
    let dataset = Dataset::load(path)
        .await
        .with_context(|| format!("load mapping {}", path.display()))?;
    DatasetSchema::compile(&dataset).with_context(|| format!("compile mapping {}", path.display()))
}

#[allow(clippy::too_many_arguments)]
async fn archive(
    source: String,
    destination: String,
    table: String,
    dictionary: String,
    graph: Option<String>,
    watermark: Option<String>,
    mapping: PathBuf,
    keep_going: bool,
    replace: bool,
) -> anyhow::Result<()> {
    let reporter = create_reporter();
    reporter.set_phase(RunPhase::LoadingMapping);
    let schema = load_schema(&mapping).await?;
    let table = Identifier::new(&table).context("destination table")?;

    let mut databases = Vec::new();
    let outcome = async {
        databases.push(open(&source).await?);
        databases.push(open(&destination).await?);
        databases.push(open(&dictionary).await?);
        if let Some(graph) = &graph {
            databases.push(open(graph).await?);
        }
        let [source_db, destination_db, dictionary_db, graph_db @ ..] = databases.as_slice() else {
            unreachable!("three databases are always opened");
        };

        reporter.set_phase(RunPhase::PrimingDictionary);
        let resolver = TagResolver::new(dictionary_db.dictionary());
        let primed = resolver.prime().await.context("load tag dictionary")?;
        info!(tags = primed, "tag dictionary loaded");
        let references = graph_db.first().unwrap_or(dictionary_db).references();

        let pipeline = Pipeline {
            schema: &schema,
            resolver: &resolver,
            references: &references,
            source: source_db.source().await?,
            archive: destination_db.archive(table).await?,
            reporter: reporter.as_ref(),
        };
        let options = RunOptions {
            watermark,
            mode: replace.then_some(ArchiveMode::Replace),
            abort_on_record_error: !keep_going,
        };
        let summary = pipeline.run(options).await?;
        info!(?summary, "archive run summary");
        if let Some(watermark) = &summary.watermark {
            println!("{watermark}");
        }
        anyhow::Ok(())
    }
    .await;

    LocalDatabase::close_all(databases).await;
    outcome
}


async fn rehydrate(
    destination: String,
    table: String,
    dictionary: String,
    mapping: Vec<PathBuf>,
    output: PathBuf,
    page_size: u64,
) -> anyhow::Result<()> {
    let reporter = create_reporter();
    reporter.set_phase(RunPhase::LoadingMapping);
    let mut registry = TypeRegistry::new();
    for path in &mapping {
        registry.register(load_schema(path).await?.kind);
    }
    let table = Identifier::new(&table).context("destination table")?;

    let mut databases = Vec::new();
    let outcome = async {
        databases.push(open(&destination).await?);
        databases.push(open(&dictionary).await?);
        let [destination_db, dictionary_db] = databases.as_slice() else {
            unreachable!("two databases are always opened");
        };

        reporter.set_phase(RunPhase::PrimingDictionary);
        let resolver = TagResolver::new(dictionary_db.dictionary());
        resolver.prime().await.context("load tag dictionary")?;

        let rehydrator = Rehydrator {
            source: destination_db.archive(table.clone()).await?,
            table,
            page_size,
            kinds: &resolver,
            registry: &registry,
            reporter: reporter.as_ref(),
        };
        let mut sink = JsonLinesSink::new(&output);
        let summary = rehydrator.run(&mut sink).await?;
        sink.flush()
            .await
            .with_context(|| format!("write {}", output.display()))?;
        info!(?summary, "rehydration summary");
        anyhow::Ok(())
    }
    .await;

    LocalDatabase::close_all(databases).await;
    outcome
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    match opts.command {
        Command::Archive {
            source,
            destination,
            table,
            dictionary,
            graph,
            watermark,
            mapping,
            keep_going,
            replace,
        } => {
            archive(
                source,
                destination,
                table,
                dictionary,
                graph,
                watermark,
                mapping,
                keep_going,
                replace,
            )
            .await
        }
        Command::Rehydrate {
            destination,
            table,
            dictionary,
            mapping,
            output,
            page_size,
        } => rehydrate(destination, table, dictionary, mapping, output, page_size).await,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    if let Err(e) = run(opts).await {
        error!("critical error: {e:#}");
        std::process::exit(1);
    }
}
