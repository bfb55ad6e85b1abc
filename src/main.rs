use clap::Parser;
use image::ImageReader;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use planscan::semantic::SemanticClassifier;
use planscan::{AnalysisConfig, AnalysisResult, ElementDetector, NullClassifier, StaticClassifier};

#[derive(Parser)]
#[command(name = "planscan")]
#[command(about = "Detect building elements in rasterized technical drawings")]
struct Cli {
    /// Path to input image file
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// TOML configuration file (defaults are used for missing keys)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Recorded semantic classifier response (JSON) to merge with geometry
    #[arg(long, value_name = "FILE")]
    semantic: Option<PathBuf>,

    /// Prompt context for the semantic classifier
    #[arg(long)]
    prompt: Option<String>,

    /// Override the foreground threshold
    #[arg(long)]
    threshold: Option<u8>,

    /// Override the structuring element size (odd)
    #[arg(long)]
    kernel_size: Option<u32>,

    /// Write the analysis result as JSON
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write the confidence map as PNG
    #[arg(long, value_name = "FILE")]
    confidence_map: Option<PathBuf>,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

async fn run<C: SemanticClassifier>(
    args: &Cli,
    config: AnalysisConfig,
    classifier: C,
    img: &image::DynamicImage,
) -> anyhow::Result<AnalysisResult> {
    let mut detector = ElementDetector::new(config, classifier)?;
    if let Some(debug_dir) = &args.debug_out {
        detector = detector.with_debug(debug_dir.clone())?;
    }
    Ok(detector.analyze(img).await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "planscan=debug" } else { "planscan=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_toml_file(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(kernel_size) = args.kernel_size {
        config.kernel_size = kernel_size;
    }
    if let Some(prompt) = &args.prompt {
        config.prompt = Some(prompt.clone());
    }
    let confidence_threshold = config.confidence_threshold;

    tracing::debug!("Loading image: {:?}", args.image_path);
    let img = ImageReader::open(&args.image_path)?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;
    tracing::debug!("Image loaded: {}x{}", img.width(), img.height());

    let result = match &args.semantic {
        Some(path) => run(&args, config, StaticClassifier::from_path(path)?, &img).await?,
        None => run(&args, config, NullClassifier, &img).await?,
    };

    let meta = &result.processing_metadata;
    println!("\n=== Element Detection Results ===");
    println!("Total elements: {}", result.elements.len());
    println!(
        "Average confidence: {:.1} ({} quality)",
        result.average_confidence, meta.quality_tier
    );
    println!(
        "Sources: {} semantic, {} morphological, {} merged",
        meta.semantic_count, meta.morphological_count, meta.merged_count
    );
    println!(
        "Discarded: {} components by size, {} low-confidence orphans",
        meta.components_filtered, meta.orphans_dropped
    );
    for warning in &meta.warnings {
        println!("Warning: {}", warning);
    }

    let confident: Vec<_> = result.confident_elements(confidence_threshold).collect();
    if !confident.is_empty() {
        println!("\nElements at or above {:.2} confidence:", confidence_threshold);
        for element in confident {
            let b = element.bbox;
            println!(
                "  {} ({}) at ({}, {}) {}x{} - confidence: {:.2}",
                element.element_type, element.category, b.x, b.y, b.width, b.height, element.confidence
            );
        }
    }

    if let Some(path) = &args.output {
        std::fs::write(path, result.to_json()?)?;
        println!("\nResult written to {}", path.display());
    }
    if let Some(path) = &args.confidence_map {
        result.confidence_map.save_with_format(path, image::ImageFormat::Png)?;
        println!("Confidence map written to {}", path.display());
    }

    Ok(())
}
