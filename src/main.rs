use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use formgeom::config::AnalysisConfig;
use formgeom::core::model::PageSnapshot;
use formgeom::export::{Exporter, HtmlDebugExporter, JsonExporter};
use formgeom::pipeline::{AnalysisResult, PipelineOrchestrator};
use formgeom::recognition::bridge::CommandRecognizer;
use formgeom::recognition::response::parse_model_response;
use formgeom::recognition::{SemanticRecognizer, StaticRecognizer};

#[derive(Parser, Debug)]
#[command(name = "formgeom")]
#[command(version, about = "Form layout analysis from element bounding boxes", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Analysis configuration (JSON, flat keys)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory (default: ./<snapshot_name>_analysis)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write layout.html
    #[arg(long)]
    html: bool,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full analysis: layout, recognition, matching and validation
    Analyze {
        /// Page snapshot (JSON with elements and viewport)
        snapshot: PathBuf,

        /// Pre-recognised labels (JSON object or model response text)
        #[arg(long, conflicts_with = "recognizer", required_unless_present = "recognizer")]
        labels: Option<PathBuf>,

        /// External recogniser program; reads the request on stdin
        #[arg(long)]
        recognizer: Option<PathBuf>,

        /// Extra argument passed to the recogniser program
        #[arg(long = "recognizer-arg", allow_hyphen_values = true)]
        recognizer_args: Vec<String>,

        /// Profile JSON forwarded to the recogniser
        #[arg(long)]
        profile: Option<PathBuf>,

        #[command(flatten)]
        out: OutputArgs,
    },

    /// Segment, fuse and group without label matching
    Segment {
        /// Page snapshot (JSON with elements and viewport)
        snapshot: PathBuf,

        #[command(flatten)]
        out: OutputArgs,
    },

    /// Show information about a page snapshot
    Info {
        /// Page snapshot (JSON with elements and viewport)
        snapshot: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Analyze {
            snapshot,
            labels,
            recognizer,
            recognizer_args,
            profile,
            out,
        } => {
            let recognizer: Box<dyn SemanticRecognizer> = match (labels, recognizer) {
                (Some(labels), _) => Box::new(load_labels(&labels)?),
                (None, Some(program)) => Box::new(CommandRecognizer::new(program).with_args(recognizer_args)),
                (None, None) => anyhow::bail!("either --labels or --recognizer is required"),
            };
            let profile = profile.map(|path| read_json(&path)).transpose()?;
            run_analysis(&snapshot, &out, recognizer, |orchestrator, page| {
                orchestrator.analyze(page, profile)
            })
        }
        Commands::Segment { snapshot, out } => run_analysis(
            &snapshot,
            &out,
            Box::new(StaticRecognizer::default()),
            |orchestrator, page| orchestrator.segment(page),
        ),
        Commands::Info { snapshot } => show_info(&snapshot),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn run_analysis<F>(
    snapshot_path: &Path,
    out: &OutputArgs,
    recognizer: Box<dyn SemanticRecognizer>,
    run: F,
) -> Result<()>
where
    F: FnOnce(&PipelineOrchestrator, &PageSnapshot) -> AnalysisResult,
{
    let snapshot = load_snapshot(snapshot_path)?;
    let config = match &out.config {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    let output_dir = out.output.clone().unwrap_or_else(|| default_output_dir(snapshot_path));

    if !out.quiet {
        println!("[*] Processing: {}", snapshot_path.display());
        println!("[*] Output: {}", output_dir.display());
        println!("[*] Elements: {}", snapshot.elements.len());
        println!("\n[+] Analyzing layout...");
    }

    let orchestrator = PipelineOrchestrator::new(config, recognizer);
    let result = run(&orchestrator, &snapshot);

    if !out.quiet {
        print_summary(&result);
        println!("[+] Exporting results...");
    }

    JsonExporter::new(output_dir.clone())
        .export(&result)
        .with_context(|| format!("Failed to export to: {}", output_dir.display()))?;
    if out.html {
        HtmlDebugExporter::new(output_dir.clone())
            .export(&result)
            .with_context(|| format!("Failed to export to: {}", output_dir.display()))?;
    }

    if !result.success {
        anyhow::bail!(
            "Analysis failed during {}: {}",
            result.failed_phase.map(|p| p.as_str()).unwrap_or("unknown"),
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    if !out.quiet {
        println!("\n[✓] Done! Results saved to: {}", output_dir.display());
    }
    Ok(())
}

fn print_summary(result: &AnalysisResult) {
    if let Some(stats) = &result.fusion {
        println!(
            "    regions: {} xy-cut + {} morphology -> {} fused",
            stats.xy_cut_regions, stats.morphology_regions, stats.output_regions
        );
    }
    if let Some(template) = &result.template {
        println!(
            "    groups: {} ({} repeatable), fields: {}",
            template.total_groups, template.repeatable_groups, template.total_fields
        );
    }
    if let Some(stats) = &result.statistics {
        println!(
            "    matched: {}/{} labels, {} fields left unmatched",
            stats.matched_fields, stats.total_labels, stats.unmatched_fields
        );
    }
    if let Some(quality) = &result.quality_assessment {
        println!("    quality: {:.2} ({:?})", quality.overall_score, quality.level);
    }
    if !result.issues.is_empty() {
        println!("    issues: {}", result.issues.len());
    }
}

fn default_output_dir(snapshot: &Path) -> PathBuf {
    let stem = snapshot
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    PathBuf::from(format!("{stem}_analysis"))
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON: {}", path.display()))
}

fn load_snapshot(path: &Path) -> Result<PageSnapshot> {
    if !path.is_file() {
        anyhow::bail!("Snapshot does not exist: {}", path.display());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid snapshot: {}", path.display()))
}

fn load_labels(path: &Path) -> Result<StaticRecognizer> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read: {}", path.display()))?;
    let recognition =
        parse_model_response(&raw).with_context(|| format!("Invalid labels: {}", path.display()))?;
    Ok(StaticRecognizer::new(recognition.labels))
}

fn show_info(path: &Path) -> Result<()> {
    let snapshot = load_snapshot(path)?;
    let (width, height) = snapshot.page_size();

    let mut kinds: BTreeMap<&str, usize> = BTreeMap::new();
    for element in &snapshot.elements {
        *kinds.entry(element.kind.as_str()).or_default() += 1;
    }
    let with_titles = snapshot
        .elements
        .iter()
        .filter(|e| e.container_title.is_some())
        .count();

    println!("Snapshot Information");
    println!("====================");
    println!("File: {}", path.display());
    println!("Viewport: {}x{}", snapshot.viewport.width, snapshot.viewport.height);
    println!("Page: {}x{}", width, height);
    println!("Elements: {}", snapshot.elements.len());
    println!("Required: {}", snapshot.elements.iter().filter(|e| e.required).count());
    println!("With container title: {}", with_titles);
    for (kind, count) in kinds {
        println!("  {kind}: {count}");
    }
    Ok(())
}
