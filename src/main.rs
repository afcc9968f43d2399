//! `leafscan` command line.
//!
//! Run detection on image files, inspect a model artifact, or scaffold an
//! untrained model to exercise the pipeline:
//!   leafscan init-model --out plant_disease_model.json --seed 7
//!   leafscan detect --model plant_disease_model.json leaf.jpg

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::error;

use leafscan::{
    logging, Config, Detector, ModelArtifact, ModelBody, ResampleFilter, ResizeStrategy, ScorePolicy,
    TensorShape,
};

/// Plant leaf disease checker.
#[derive(Parser, Debug)]
#[command(name = "leafscan")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON config file; command line flags override its values.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score one or more leaf photos with a single loaded model.
    Detect {
        /// Model artifact (defaults to the configured path).
        #[arg(long, value_name = "PATH")]
        model: Option<PathBuf>,

        /// Images to score, processed in order.
        #[arg(required = true, value_name = "IMAGE")]
        images: Vec<PathBuf>,

        /// stretch, center-crop or pad.
        #[arg(long)]
        resize: Option<ResizeStrategy>,

        /// triangle, catmull-rom, gaussian or lanczos3.
        #[arg(long)]
        filter: Option<ResampleFilter>,

        /// Treat scores outside [0, 1] as failures.
        #[arg(long)]
        reject_out_of_range: bool,

        /// Print one JSON object per image.
        #[arg(long)]
        json: bool,
    },

    /// Show the declared input shape, layers and metadata of a model artifact.
    Inspect {
        #[arg(long, value_name = "PATH")]
        model: Option<PathBuf>,
    },

    /// Write an untrained model artifact for demos and smoke tests.
    InitModel {
        #[arg(long, value_name = "PATH")]
        out: PathBuf,

        /// Hidden layer width.
        #[arg(long, default_value = "16", value_name = "INT")]
        hidden: usize,

        /// Random seed for reproducible weights.
        #[arg(long, value_name = "INT")]
        seed: Option<u64>,

        /// Write a constant-output model returning this score instead.
        #[arg(long, value_name = "FLOAT")]
        constant: Option<f32>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load_or_default(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Command::Detect { model, images, resize, filter, reject_out_of_range, json } => {
            if let Some(path) = model {
                config.model_path = path;
            }
            if let Some(resize) = resize {
                config.preprocess.resize = resize;
            }
            if let Some(filter) = filter {
                config.preprocess.filter = filter;
            }
            if reject_out_of_range {
                config.score_policy = ScorePolicy::Reject;
            }
            detect(&config, &images, json)
        }
        Command::Inspect { model } => {
            inspect(model.as_deref().unwrap_or(config.model_path.as_path()))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::InitModel { out, hidden, seed, constant } => {
            init_model(&out, hidden, seed, constant, config.preprocess.target)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn detect(config: &Config, images: &[PathBuf], json: bool) -> Result<ExitCode> {
    let detector = Detector::from_config(config).context("Failed to initialize detector")?;
    if let Err(e) = detector.model_state().model() {
        anyhow::bail!("{}", e);
    }

    let mut failures = 0usize;
    for path in images {
        match detector.detect_path(path) {
            Ok(detection) if json => {
                let line = serde_json::json!({
                    "image": path.display().to_string(),
                    "score": detection.score,
                    "elapsed_ms": detection.elapsed_ms,
                });
                println!("{}", line);
            }
            Ok(detection) => println!("{}: {}", path.display(), detection),
            Err(e) => {
                failures += 1;
                error!(image = %path.display(), error = %e, "detection failed");
                if json {
                    let line = serde_json::json!({
                        "image": path.display().to_string(),
                        "error": e.to_string(),
                    });
                    println!("{}", line);
                }
            }
        }
    }

    Ok(if failures == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn inspect(path: &Path) -> Result<()> {
    let artifact = ModelArtifact::load(path)?;

    println!("Model:          {}", path.display());
    println!("Format version: {}", artifact.format_version);
    println!("Input shape:    {} ({} values)", artifact.input, artifact.input.len());
    println!("Summary:        {}", artifact.summary());

    if let ModelBody::Dense { layers } = &artifact.body {
        for (i, layer) in layers.iter().enumerate() {
            println!("  layer {}: {} -> {} ({:?})", i, layer.input_size, layer.size, layer.activator);
        }
    }

    if let Some(meta) = &artifact.metadata {
        if let Some(description) = &meta.description {
            println!("Description:    {}", description);
        }
        if let Some(label) = &meta.output_label {
            println!("Output label:   {}", label);
        }
        if let Some(source) = &meta.source {
            println!("Source:         {}", source);
        }
    }
    Ok(())
}

fn init_model(
    out: &Path,
    hidden: usize,
    seed: Option<u64>,
    constant: Option<f32>,
    input: TensorShape,
) -> Result<()> {
    if hidden == 0 {
        anyhow::bail!("--hidden must be at least 1");
    }
    if input.is_empty() || input.checked_len().is_none() {
        anyhow::bail!("configured input shape {} is not usable", input);
    }

    let artifact = match constant {
        Some(value) => ModelArtifact::constant(value, input),
        None => {
            let mut rng = match seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_entropy(),
            };
            ModelArtifact::untrained(input, hidden, &mut rng)
        }
    };

    artifact
        .save_json(out)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Wrote {} to {}", artifact.summary(), out.display());
    Ok(())
}
