//! Consistency Benchmark CLI
//!
//! Scores the consistency and quality of generative text responses captured
//! under load, from a JSONL file with one response record per line.
//!
//! ## Quick Start
//!
//! ```bash
//! # Heuristic analysis only (no network)
//! ./consistency-benchmark analyze --input responses.jsonl
//!
//! # Full quality report with embedding similarity and judge scores
//! export OPENAI_API_KEY=...
//! ./consistency-benchmark report --input responses.jsonl --seed 42
//!
//! # Compare against a previous run
//! ./consistency-benchmark report --input responses.jsonl \
//!     --baseline target/previous_report.json
//! ```
//!
//! ## Configuration
//!
//! Embedding and judge services are configured in `quality.toml`. The file is
//! optional; defaults use OpenAI endpoints with the key read from
//! `OPENAI_API_KEY`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use consistency_benchmark::anomaly::AnomalyReport;
use consistency_benchmark::config::{QualityConfig, DEFAULT_CONFIG_FILE};
use consistency_benchmark::embedders::create_embedder;
use consistency_benchmark::records::RecordStore;
use consistency_benchmark::report::{QualityReportGenerator, ReportHeadline, RunComparison};
use consistency_benchmark::scoring::{preview, ConsistencyReport};

/// Prompts listed in the weakest-prompts table
const WEAKEST_PROMPTS_SHOWN: usize = 10;

#[derive(Parser)]
#[command(name = "consistency-benchmark")]
#[command(about = "Consistency and quality scoring for responses captured under load")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the heuristic consistency analysis
    ///
    /// Scores completeness, structure, lexical similarity, ramp/steady
    /// degradation and category impact. No network access.
    Analyze {
        /// Path to the response records (JSONL)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the analysis (JSON)
        #[arg(short, long, default_value = "target/consistency_analysis.json")]
        output: PathBuf,
    },

    /// Generate the full quality report
    ///
    /// Adds embedding similarity and judge scores over a sample of prompts.
    Report {
        /// Path to the response records (JSONL)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the report (JSON)
        #[arg(short, long, default_value = "target/quality_report.json")]
        output: PathBuf,

        /// Path to the quality config file (TOML)
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Previous report to compare against
        #[arg(short, long)]
        baseline: Option<PathBuf>,

        /// Sampling seed (overrides the config file)
        #[arg(long)]
        seed: Option<u64>,

        /// Embedding backend: openai or fastembed (overrides the config file)
        #[arg(long)]
        backend: Option<String>,
    },

    /// Print groupings, truncation stats and anomalies
    Inspect {
        /// Path to the response records (JSONL)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Compare two saved quality reports
    Compare {
        /// Earlier report (JSON)
        #[arg(short, long)]
        baseline: PathBuf,

        /// Later report (JSON)
        #[arg(short, long)]
        current: PathBuf,
    },

    /// Check that the configured embedding service answers
    Check {
        /// Path to the quality config file (TOML)
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Embedding backend: openai or fastembed (overrides the config file)
        #[arg(long)]
        backend: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { input, output } => {
            run_analysis(&input, &output)?;
        }

        Commands::Report {
            input,
            output,
            config,
            baseline,
            seed,
            backend,
        } => {
            run_report(&input, &output, &config, baseline.as_deref(), seed, backend.as_deref()).await?;
        }

        Commands::Inspect { input } => {
            inspect_records(&input)?;
        }

        Commands::Compare { baseline, current } => {
            compare_reports(&baseline, &current)?;
        }

        Commands::Check { config, backend } => {
            check_connection(&config, backend.as_deref()).await?;
        }
    }

    Ok(())
}

/// Heuristic analysis of one record file
fn run_analysis(input: &Path, output: &Path) -> Result<()> {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              CONSISTENCY ANALYSIS                            ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let store = RecordStore::load(input)?;
    eprintln!(
        "  Loaded {} responses ({} unique prompts, {} lines skipped)",
        store.len(),
        store.unique_prompts(),
        store.skipped_lines()
    );

    let report = ConsistencyReport::analyze(&store);

    eprintln!("\n  Completeness issues: {}", report.completeness_analysis.issues.len());
    eprintln!("  Structural issues:   {}", report.structural_analysis.issues.len());
    eprintln!("  Semantic issues:     {}", report.semantic_analysis.issues.len());
    for issue in &report.structural_analysis.issues {
        eprintln!("    [{}] {}", issue.severity.name(), issue.description);
    }
    for issue in &report.semantic_analysis.issues {
        eprintln!("    [{}] {}", issue.severity.name(), issue.description);
    }

    report.save(output)?;
    eprintln!("\n  Saved analysis to {}", output.display());

    println!("\n{}", report.format_summary());
    println!("{}", report.summary);

    Ok(())
}

/// Full quality report with sampled embedding and judge analyses
async fn run_report(
    input: &Path,
    output: &Path,
    config_path: &Path,
    baseline: Option<&Path>,
    seed: Option<u64>,
    backend: Option<&str>,
) -> Result<()> {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              QUALITY REPORT                                  ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let mut config = QualityConfig::load_or_default(config_path)?;
    if let Some(name) = backend {
        config.override_backend(name)?;
    }
    eprintln!(
        "  Embedding: {} | Judge: {}",
        if config.embedding.enabled {
            format!("{} ({})", config.embedding.model, config.embedding.backend.name())
        } else {
            "disabled".to_string()
        },
        if config.judge.enabled {
            config.judge.model.clone()
        } else {
            "disabled".to_string()
        }
    );

    let mut generator = QualityReportGenerator::from_config(&config)?;
    if let Some(seed) = seed {
        generator = generator.with_seed(seed);
    }
    if let Some(path) = baseline {
        let headline = ReportHeadline::load(path)?;
        eprintln!("  Baseline: {} (score {:.3})", path.display(), headline.global_consistency_score);
        generator = generator.with_baseline(headline);
    }

    let report = generator.generate_from_path(input).await?;
    report.save(output)?;
    eprintln!("  Saved report to {}\n", output.display());

    let weakest = report.weakest_prompts(WEAKEST_PROMPTS_SHOWN);
    if !weakest.is_empty() {
        println!("┌─ WEAKEST PROMPTS ─────────────────────────────────────────────┐");
        for prompt in weakest {
            println!("  {}", prompt.format_line());
            for issue in &prompt.issues {
                println!("      - {}", issue);
            }
        }
        println!();
    }

    println!("{}", report.format_summary());

    Ok(())
}

/// Print groupings and anomalies without scoring
fn inspect_records(input: &Path) -> Result<()> {
    let store = RecordStore::load(input)?;

    println!("✓ Loaded {:?}", input);
    println!("  Responses: {}", store.len());
    println!("  Skipped lines: {}", store.skipped_lines());
    println!("  Truncation: {}", store.truncation_stats().format_summary());

    println!("\n  By prompt ({}):", store.unique_prompts());
    for (prompt, group) in store.by_prompt() {
        println!("    {:>4}  {}", group.len(), preview(&prompt, 60));
    }

    println!("\n  By category:");
    for (category, group) in store.by_category() {
        println!("    {:>4}  {}", group.len(), category);
    }

    println!("\n  By phase:");
    for (phase, group) in store.by_phase() {
        println!(
            "    {:>4}  {}",
            group.len(),
            phase.map(|p| p.name()).unwrap_or("unknown")
        );
    }

    let anomalies = AnomalyReport::from_records(store.records());
    println!("\n  {}", anomalies.format_summary());
    for anomaly in &anomalies.anomalies {
        println!("    {}", anomaly.format_line());
    }

    Ok(())
}

fn compare_reports(baseline: &Path, current: &Path) -> Result<()> {
    let baseline = ReportHeadline::load(baseline)?;
    let current = ReportHeadline::load(current)?;
    let comparison = RunComparison::between(&baseline, &current);

    println!("Baseline truncation: {:.1}%", comparison.baseline_truncation_rate * 100.0);
    println!("Current truncation:  {:.1}%", comparison.current_truncation_rate * 100.0);
    println!("Improvement:         {:+.1}%", comparison.improvement_percentage);
    println!("Baseline score:      {:.3}", comparison.baseline_score);
    println!("Current score:       {:.3}", comparison.current_score);
    println!("Score delta:         {:+.3}", comparison.score_delta);

    Ok(())
}

async fn check_connection(config_path: &Path, backend: Option<&str>) -> Result<()> {
    let mut config = QualityConfig::load_or_default(config_path)?;
    if let Some(name) = backend {
        config.override_backend(name)?;
    }
    let embedder = create_embedder(&config.embedding)?;

    println!("Testing {} ({})...", embedder.name(), config.embedding.model);
    let dimensions = embedder.test_connection().await?;
    println!("✓ Embedding service reachable ({} dimensions)", dimensions);

    Ok(())
}
