//! Preprocess command - save every preprocessing variant of an image so an
//! operator can inspect which one helps a problematic scan.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;

use docsift_core::Preprocessing;

/// Arguments for the preprocess command.
#[derive(Args)]
pub struct PreprocessArgs {
    /// Input image
    #[arg(required = true)]
    input: PathBuf,

    /// Directory to write the variants into
    #[arg(short, long, default_value = "preprocessed")]
    output_dir: PathBuf,
}

pub async fn run(args: PreprocessArgs) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let image = image::open(&args.input)?;
    fs::create_dir_all(&args.output_dir)?;

    let stem = args
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");

    for variant in Preprocessing::ALL {
        let processed = variant.apply(&image);
        let path = args
            .output_dir
            .join(format!("{}_{}.png", stem, variant.label()));
        processed.save(&path)?;
        println!("{} Wrote {}", style("✓").green(), path.display());
    }

    Ok(())
}
