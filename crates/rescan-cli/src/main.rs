// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rescan command line.
//
// Entry point. Initialises logging, builds the pipeline from the selected
// configuration and text source, and runs one subcommand.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use rescan_core::human_errors::humanize_error;
use rescan_core::{AnalysisConfig, PaperSize, RescanError};
use rescan_document::persist::persist_payloads;
use rescan_document::{
    AnalyzedDocument, DocumentPipeline, ImageprocContours, PrecomputedBlocks, TextBlockDetector,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Rebuild a clean, editable page from a photograph of a paper document.
#[derive(Parser)]
#[command(name = "rescan", version)]
struct Cli {
    /// JSON analysis configuration (missing fields take defaults)
    #[arg(long, global = true, conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Named parameter set: strict or relaxed
    #[arg(long, global = true)]
    preset: Option<String>,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyse a photograph into a JSON document model
    Analyze {
        image: PathBuf,
        #[command(flatten)]
        text: TextSource,
        /// Where to write the document JSON
        #[arg(short, long)]
        out: PathBuf,
        /// Directory for extracted image payloads
        #[arg(long)]
        assets: PathBuf,
        /// Also write the layout grid as JSON
        #[arg(long)]
        grid: Option<PathBuf>,
    },
    /// Render a JSON document model as a one-page PDF
    Render {
        document: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
        /// a4, a3, a5, letter, legal or tabloid
        #[arg(long, default_value = "a4")]
        paper: String,
    },
    /// Photograph straight to PDF
    Convert {
        image: PathBuf,
        #[command(flatten)]
        text: TextSource,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, default_value = "a4")]
        paper: String,
    },
}

/// Where recognised text comes from.
#[derive(clap::Args)]
struct TextSource {
    /// Text blocks produced by an external OCR engine (JSON)
    #[arg(long)]
    blocks: Option<PathBuf>,

    /// Directory holding the ocrs detection and recognition models
    #[arg(long)]
    models: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<RescanError>() {
        Some(rescan) => {
            let human = humanize_error(rescan);
            eprintln!("error: {}", human.message);
            eprintln!("  {}", human.suggestion);
            eprintln!("  detail: {err:#}");
        }
        None => eprintln!("error: {err:#}"),
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref(), cli.preset.as_deref())?;

    match cli.command {
        Command::Analyze {
            image,
            text,
            out,
            assets,
            grid,
        } => {
            let pipeline = build_pipeline(config, &text)?;
            let mut document = pipeline.analyze_path(&image)?;

            let failed = persist_payloads(&mut document, &assets);
            if !failed.is_empty() {
                warn!(?failed, "Some image payloads could not be saved");
            }
            std::fs::write(&out, document.to_json()?)
                .with_context(|| format!("writing {}", out.display()))?;
            info!(path = %out.display(), elements = document.elements.len(), "Document written");

            if let Some(grid_path) = grid {
                let layout = pipeline.layout_grid(&document);
                std::fs::write(&grid_path, serde_json::to_string_pretty(&layout)?)
                    .with_context(|| format!("writing {}", grid_path.display()))?;
                info!(path = %grid_path.display(), "Layout grid written");
            }
        }

        Command::Render {
            document,
            out,
            paper,
        } => {
            let paper = parse_paper(&paper)?;
            let data = std::fs::read_to_string(&document)
                .with_context(|| format!("reading {}", document.display()))?;
            let document = AnalyzedDocument::from_json(&data)?;

            let pipeline = DocumentPipeline::new(
                config,
                Box::new(PrecomputedBlocks::new(0, 0, Vec::new())),
                Box::new(ImageprocContours),
            );
            write_pdf(&pipeline, &document, paper, &out)?;
        }

        Command::Convert {
            image,
            text,
            out,
            paper,
        } => {
            let paper = parse_paper(&paper)?;
            let pipeline = build_pipeline(config, &text)?;
            let document = pipeline.analyze_path(&image)?;
            write_pdf(&pipeline, &document, paper, &out)?;
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>, preset: Option<&str>) -> anyhow::Result<AnalysisConfig> {
    let config = match (path, preset) {
        (Some(path), _) => AnalysisConfig::from_json_file(path)?,
        (None, Some(name)) => match AnalysisConfig::preset(name) {
            Some(config) => config,
            None => bail!("unknown preset `{name}` (expected strict or relaxed)"),
        },
        (None, None) => AnalysisConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn parse_paper(name: &str) -> anyhow::Result<PaperSize> {
    PaperSize::from_name(name).with_context(|| format!("unknown paper size `{name}`"))
}

fn build_pipeline(config: AnalysisConfig, source: &TextSource) -> anyhow::Result<DocumentPipeline> {
    let text = text_detector(source)?;
    Ok(DocumentPipeline::new(config, text, Box::new(ImageprocContours)))
}

fn text_detector(source: &TextSource) -> anyhow::Result<Box<dyn TextBlockDetector>> {
    if let Some(path) = &source.blocks {
        let blocks = PrecomputedBlocks::from_json_file(path)?;
        info!(blocks = blocks.blocks.len(), path = %path.display(), "Using precomputed text blocks");
        return Ok(Box::new(blocks));
    }

    ocr_detector(source.models.as_deref())
}

#[cfg(feature = "ocr")]
fn ocr_detector(models: Option<&Path>) -> anyhow::Result<Box<dyn TextBlockDetector>> {
    let engine = match models {
        Some(dir) => rescan_document::OcrEngine::from_model_dir(dir)?,
        None => rescan_document::OcrEngine::with_defaults()?,
    };
    Ok(Box::new(engine))
}

#[cfg(not(feature = "ocr"))]
fn ocr_detector(models: Option<&Path>) -> anyhow::Result<Box<dyn TextBlockDetector>> {
    if models.is_some() {
        bail!("--models needs a build with the `ocr` feature");
    }
    bail!("no text source: pass --blocks <json> or build with the `ocr` feature")
}

fn write_pdf(
    pipeline: &DocumentPipeline,
    document: &AnalyzedDocument,
    paper: PaperSize,
    out: &Path,
) -> anyhow::Result<()> {
    let pdf = pipeline.render_pdf(document, paper)?;
    std::fs::write(out, &pdf).with_context(|| format!("writing {}", out.display()))?;
    info!(path = %out.display(), bytes = pdf.len(), ?paper, "PDF written");
    Ok(())
}
