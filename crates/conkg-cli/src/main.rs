//! `conkg`: inventory, ingest and query construction project files from the shell.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use conkg_core::{AppConfig, Embedder, GraphStore, QaEngine, QaQuery, RetrievalMode, SchemaDescription, VectorStore};
use conkg_ingest::{
    confirm_by_content, execute_cleanup, find_duplicates, format_size, plan_cleanup, scan_directory,
    write_csv_file, CleanupOptions, CleanupPlan, IngestOptions, IngestPipeline, InventorySummary, ScanOptions,
};
use conkg_qa::HybridQaEngine;

#[derive(Parser)]
#[command(name = "conkg")]
#[command(author, version, about = "Construction project knowledge graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Hybrid,
    GraphOnly,
    VectorOnly,
}

impl From<ModeArg> for RetrievalMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Hybrid => RetrievalMode::Hybrid,
            ModeArg::GraphOnly => RetrievalMode::GraphOnly,
            ModeArg::VectorOnly => RetrievalMode::VectorOnly,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List every file under a directory with size and dates
    Inventory {
        dir: PathBuf,
        /// Write the full listing as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
        /// How many entries to show per summary table
        #[arg(long, default_value_t = 10)]
        top: usize,
        #[arg(long)]
        include_hidden: bool,
    },

    /// Find files sharing a name and size
    Duplicates {
        dir: PathBuf,
        /// Keep only groups whose contents hash identically
        #[arg(long)]
        confirm: bool,
        #[arg(long)]
        include_hidden: bool,
        /// Delete extra copies of content-identical files, keeping one per group
        #[arg(long)]
        cleanup: bool,
        /// Show the cleanup plan and write its log without deleting anything
        #[arg(long, requires = "cleanup")]
        dry_run: bool,
        /// Copy files into this directory before deleting them
        #[arg(long, value_name = "DIR", requires = "cleanup")]
        backup: Option<PathBuf>,
    },

    /// Ingest a file or directory into the graph and vector stores
    Ingest {
        path: PathBuf,
        /// Project id or name the documents belong to
        #[arg(short, long)]
        project: Option<String>,
        #[arg(long)]
        include_hidden: bool,
    },

    /// Store a JSON file of extraction records
    Records {
        file: PathBuf,
        /// Validate against the graph without storing
        #[arg(long)]
        check: bool,
    },

    /// Load the sample project
    Seed,

    /// Ask a question
    Ask {
        question: String,
        #[arg(short, long)]
        project: Option<String>,
        #[arg(long, value_enum, default_value = "hybrid")]
        mode: ModeArg,
        #[arg(long)]
        top_k: Option<usize>,
        /// Load the sample project first (useful with in-memory stores)
        #[arg(long)]
        seed: bool,
    },

    /// Entity counts, optionally for one project
    Overview {
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Print the graph schema
    Schema,
}

struct Backends {
    config: AppConfig,
    graph: Arc<dyn GraphStore>,
    vector: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl Backends {
    async fn connect() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();
        config.validate()?;
        let graph = conkg_graph::graph_store_from_config(&config).await;
        let vector = conkg_vector::vector_store_from_config(&config)?;
        let embedder = conkg_vector::embedder_from_config(&config)?;
        tracing::info!(
            graph = graph.backend(),
            vector = vector.backend(),
            embedder = embedder.name(),
            "Backends ready"
        );
        Ok(Self {
            config,
            graph,
            vector,
            embedder,
        })
    }

    fn pipeline(&self) -> IngestPipeline {
        IngestPipeline::new(
            self.graph.clone(),
            self.vector.clone(),
            self.embedder.clone(),
            &self.config,
        )
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn require_dir(dir: &Path) -> anyhow::Result<()> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    Ok(())
}

fn print_inventory(summary: &InventorySummary) {
    println!("Files:        {}", summary.total_files);
    println!("Directories:  {}", summary.directories);
    println!("Total size:   {}", summary.total_size_human);

    println!("\nMost common file types:");
    for t in &summary.top_types_by_count {
        println!("  {:<14} {:>8} files  {:>10}", t.file_type, t.count, format_size(t.size_bytes));
    }
    println!("\nLargest file types:");
    for t in &summary.top_types_by_size {
        println!("  {:<14} {:>10}  ({} files)", t.file_type, format_size(t.size_bytes), t.count);
    }
    println!("\nLargest files:");
    for f in &summary.largest {
        println!("  {:>10}  {}", f.size_human, f.full_path);
    }
    println!("\nMost recently modified:");
    for f in &summary.most_recent {
        println!("  {}  {}", f.modified_date, f.full_path);
    }
}

fn print_cleanup_plan(plan: &CleanupPlan) {
    println!("Files to delete:  {}", plan.files_to_delete());
    println!("Space to save:    {}", format_size(plan.space_to_save()));
    println!("Duplicate groups: {}", plan.items.len());
    for name in &plan.critical_skipped {
        println!("Skipping critical file {name}, review it by hand");
    }

    println!("\nTop space savers:");
    for (i, item) in plan.top_savers(10).into_iter().enumerate() {
        println!("{:>3}. {} ({})", i + 1, item.filename, format_size(item.space_saved()));
        println!("     keep    {}", item.keep.display());
        for p in &item.delete {
            println!("     delete  {}", p.display());
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let json = matches!(cli.format, OutputFormat::Json);

    match cli.command {
        Commands::Inventory {
            dir,
            csv,
            top,
            include_hidden,
        } => {
            require_dir(&dir)?;
            let records = scan_directory(&dir, &ScanOptions { include_hidden })?;
            if let Some(out) = &csv {
                write_csv_file(&records, out).with_context(|| format!("writing {}", out.display()))?;
                tracing::info!(path = %out.display(), rows = records.len(), "Inventory CSV written");
            }
            let summary = InventorySummary::from_records(&records, top);
            if json {
                print_json(&summary)?;
            } else {
                print_inventory(&summary);
            }
        }

        Commands::Duplicates {
            dir,
            confirm,
            include_hidden,
            cleanup,
            dry_run,
            backup,
        } => {
            require_dir(&dir)?;
            let mut report = find_duplicates(&dir, &ScanOptions { include_hidden })?;
            if confirm || cleanup {
                report = confirm_by_content(report);
            }
            if cleanup {
                let plan = plan_cleanup(&dir, &report);
                if !json {
                    print_cleanup_plan(&plan);
                }
                let log = execute_cleanup(
                    &plan,
                    &CleanupOptions {
                        dry_run,
                        backup_dir: backup,
                        log_dir: None,
                    },
                )?;
                if json {
                    print_json(&log)?;
                } else {
                    if log.dry_run {
                        println!("\nDry run, nothing deleted");
                    } else {
                        println!(
                            "\nDeleted {} files, freed {}",
                            log.deleted.len(),
                            format_size(log.bytes_freed())
                        );
                    }
                    for e in &log.errors {
                        println!("  error: {e}");
                    }
                    if let Some(path) = &log.log_path {
                        println!("Log written to {}", path.display());
                    }
                }
                return Ok(());
            }
            if json {
                print_json(&report)?;
            } else {
                println!(
                    "{} duplicate groups, {} extra copies, {} reclaimable",
                    report.groups.len(),
                    report.extra_copies(),
                    report.wasted_human()
                );
                for group in &report.groups {
                    println!("\n{} ({})", group.filename, format_size(group.size_bytes));
                    for p in &group.paths {
                        println!("  {}", p.display());
                    }
                }
            }
        }

        Commands::Ingest {
            path,
            project,
            include_hidden,
        } => {
            if !path.exists() {
                bail!("{} does not exist", path.display());
            }
            let backends = Backends::connect().await?;
            let options = IngestOptions {
                project_id: project,
                include_hidden,
            };
            let report = backends.pipeline().ingest_path(&path, &options).await?;
            if json {
                print_json(&report)?;
            } else {
                println!(
                    "Ingested {} of {} files ({} skipped), {} chunks",
                    report.files_ingested, report.files_seen, report.files_skipped, report.chunks_stored
                );
                println!(
                    "Entities: {} created, {} merged; relationships: {}",
                    report.store.entities_created, report.store.entities_merged, report.store.relationships_stored
                );
                for e in &report.errors {
                    println!("  error: {e}");
                }
            }
        }

        Commands::Records { file, check } => {
            let backends = Backends::connect().await?;
            if check {
                let raw = tokio::fs::read_to_string(&file)
                    .await
                    .with_context(|| format!("reading {}", file.display()))?;
                let report = backends
                    .pipeline()
                    .check_records(&raw, &file.to_string_lossy())
                    .await?;
                if json {
                    print_json(&report)?;
                } else {
                    println!(
                        "{} entities and {} relationships would be stored",
                        report.valid_entities, report.valid_relationships
                    );
                    for e in &report.errors {
                        println!("  error: {e}");
                    }
                    for w in &report.warnings {
                        println!("  warning: {w}");
                    }
                }
                if !report.is_valid() {
                    bail!("{} validation errors", report.errors.len());
                }
                return Ok(());
            }
            let outcome = backends.pipeline().ingest_records_file(&file).await?;
            if json {
                print_json(&outcome)?;
            } else {
                println!(
                    "Stored {} entities and {} relationships ({} skipped), {} chunks",
                    outcome.summary.entities_stored(),
                    outcome.summary.relationships_stored,
                    outcome.summary.entities_skipped + outcome.summary.relationships_skipped,
                    outcome.chunks_stored
                );
                for w in &outcome.summary.warnings {
                    println!("  warning: {w}");
                }
            }
        }

        Commands::Seed => {
            let backends = Backends::connect().await?;
            let outcome = backends.pipeline().seed().await?;
            if json {
                print_json(&outcome)?;
            } else {
                println!(
                    "Sample project loaded: {} entities, {} relationships, {} chunks",
                    outcome.entities, outcome.relationships, outcome.chunks_stored
                );
            }
        }

        Commands::Ask {
            question,
            project,
            mode,
            top_k,
            seed,
        } => {
            let backends = Backends::connect().await?;
            if seed {
                backends.pipeline().seed().await?;
            }
            let engine = HybridQaEngine::new(
                backends.graph.clone(),
                backends.vector.clone(),
                backends.embedder.clone(),
                &backends.config,
            );
            let query = QaQuery {
                question,
                project,
                mode: mode.into(),
                top_k,
            };
            let response = engine.ask(&query).await?;
            if json {
                print_json(&response)?;
            } else {
                println!("{}\n", response.answer);
                println!("Confidence: {:.2} ({})", response.confidence, response.intent);
                if !response.suggestions.is_empty() {
                    println!("\nYou could also ask:");
                    for s in &response.suggestions {
                        println!("  - {s}");
                    }
                }
            }
        }

        Commands::Overview { project } => {
            let backends = Backends::connect().await?;
            let overview = backends.graph.overview(project.as_deref()).await?;
            if json {
                print_json(&overview)?;
            } else {
                if let Some(p) = &overview.project {
                    println!("Project: {p}");
                }
                println!("Projects:   {}", overview.projects);
                println!("Documents:  {}", overview.documents);
                println!("People:     {}", overview.people);
                println!("Companies:  {}", overview.companies);
                println!("Issues:     {}", overview.issues);
                println!("Tasks:      {}", overview.tasks);
            }
        }

        Commands::Schema => {
            let schema = SchemaDescription::current();
            if json {
                print_json(&schema)?;
            } else {
                print!("{}", schema.render_text());
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("conkg=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask_with_mode() {
        let cli = Cli::try_parse_from([
            "conkg", "--format", "json", "ask", "Who is the PM?", "--mode", "graph-only", "--seed",
        ])
        .unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
        match cli.command {
            Commands::Ask { question, mode, seed, .. } => {
                assert_eq!(question, "Who is the PM?");
                assert_eq!(RetrievalMode::from(mode), RetrievalMode::GraphOnly);
                assert!(seed);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_records_check_flag() {
        let cli = Cli::try_parse_from(["conkg", "records", "batch.json", "--check"]).unwrap();
        match cli.command {
            Commands::Records { file, check } => {
                assert_eq!(file, PathBuf::from("batch.json"));
                assert!(check);
            }
            _ => panic!("expected records"),
        }
    }

    #[test]
    fn test_duplicates_cleanup_flags() {
        let cli = Cli::try_parse_from(["conkg", "duplicates", "/data", "--cleanup", "--dry-run", "--backup", "/safe"])
            .unwrap();
        match cli.command {
            Commands::Duplicates {
                cleanup,
                dry_run,
                backup,
                ..
            } => {
                assert!(cleanup);
                assert!(dry_run);
                assert_eq!(backup, Some(PathBuf::from("/safe")));
            }
            _ => panic!("expected duplicates"),
        }
        assert!(Cli::try_parse_from(["conkg", "duplicates", "/data", "--dry-run"]).is_err());
    }

    #[test]
    fn test_inventory_defaults() {
        let cli = Cli::try_parse_from(["conkg", "inventory", "/tmp"]).unwrap();
        match cli.command {
            Commands::Inventory { top, csv, include_hidden, .. } => {
                assert_eq!(top, 10);
                assert!(csv.is_none());
                assert!(!include_hidden);
            }
            _ => panic!("expected inventory"),
        }
    }
}
