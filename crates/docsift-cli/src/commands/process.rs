//! Process command - run the full pipeline on a single document.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use docsift_core::DocumentAnalysis;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = super::load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(120));

    pb.set_message("Loading pipeline models...");
    let pipeline = super::build_pipeline(&config)?;

    pb.set_message("Analyzing document...");
    let bytes = fs::read(&args.input)?;
    let filename = args
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string();

    let analysis = pipeline
        .analyze(bytes, filename)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    pb.finish_with_message("Done");

    let output = format_analysis(&analysis, args.format)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());
    Ok(())
}

fn format_analysis(analysis: &DocumentAnalysis, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(analysis)?),
        OutputFormat::Text => format_text(analysis),
    }
}

fn format_text(analysis: &DocumentAnalysis) -> anyhow::Result<String> {
    let mut output = String::new();

    output.push_str(&format!("Document type: {}\n", analysis.document_type));
    output.push_str(&format!("Confidence:    {:.2}\n", analysis.confidence));
    output.push('\n');

    if analysis.entities.is_empty() {
        output.push_str("No entities extracted.\n");
    } else {
        output.push_str("Entities:\n");
        for (field, entity) in &analysis.entities {
            let value = entity
                .value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "null".to_string());
            output.push_str(&format!(
                "  {}: {} (confidence {:.2})\n",
                field, value, entity.confidence
            ));
        }
    }

    Ok(output)
}
