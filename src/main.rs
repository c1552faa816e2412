mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use haze_aqi_rs::aqi_pipeline::{
    AnalysisError, AnalysisResponse, AqiPipeline, AqiResult, CalibrationCurve, ErrorKind, ErrorResponse,
    PipelineConfig,
};
use haze_aqi_rs::logger;
use tracing::info;

use cli::{Cli, Commands};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logger::init(if cli.verbose { "debug" } else { "info" });

    if let Commands::Calibrate { anchors, output } = &cli.command {
        return calibrate(anchors.as_deref(), output.as_deref(), cli.json);
    }

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(weights) = &cli.weights {
        config.artifacts.dehaze_weights = weights.clone();
    }

    let pipeline = AqiPipeline::new(config);

    match cli.command {
        Commands::Status => status(&pipeline, cli.json),
        Commands::Calibrate { anchors, output } => calibrate(anchors.as_deref(), output.as_deref(), cli.json),
        Commands::Analyze {
            image,
            timings,
            dehazed_out,
            upload,
        } => analyze(&pipeline, &image, timings, dehazed_out, upload, cli.json),
    }
}

fn calibrate(anchors: Option<&Path>, output: Option<&Path>, json: bool) -> anyhow::Result<ExitCode> {
    let curve = match anchors {
        Some(path) => {
            CalibrationCurve::load(path).with_context(|| format!("fitting anchors from {}", path.display()))?
        }
        None => CalibrationCurve::default_anchors()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&curve.to_artifact())?);
    } else {
        println!("{curve}");
    }
    if let Some(path) = output {
        curve
            .save(path)
            .with_context(|| format!("writing calibration {}", path.display()))?;
    }
    Ok(ExitCode::SUCCESS)
}

fn status(pipeline: &AqiPipeline, json: bool) -> anyhow::Result<ExitCode> {
    let status = pipeline.status();
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else if status.ready {
        println!(
            "ready (estimator {:?}, features {}, channel order {})",
            status.estimator, status.feature_variant, status.channel_order
        );
    } else {
        println!("unavailable: {}", status.reason.as_deref().unwrap_or("unknown"));
    }
    Ok(if status.ready { ExitCode::SUCCESS } else { ExitCode::from(3) })
}

fn analyze(
    pipeline: &AqiPipeline,
    image: &Path,
    show_timings: bool,
    dehazed_out: Option<PathBuf>,
    upload: bool,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let outcome = if upload {
        let bytes = std::fs::read(image).with_context(|| format!("reading {}", image.display()))?;
        pipeline.analyze_upload(&bytes)
    } else if show_timings || dehazed_out.is_some() {
        let bytes = std::fs::read(image).with_context(|| format!("reading {}", image.display()))?;
        pipeline.analyze_with_timings(&bytes).and_then(|report| {
            if let Some(path) = &dehazed_out {
                let dehazed = report.dehazed.to_rgb_image(pipeline.config().channel_order)?;
                dehazed
                    .save(path)
                    .map_err(|e| AnalysisError::InferenceFailure(format!("writing dehazed scene: {e}")))?;
                info!(path = %path.display(), "Wrote dehazed scene");
            }
            if show_timings {
                eprintln!("{}", report.timings);
            }
            Ok(report.result)
        })
    } else {
        pipeline.analyze_file(image)
    };

    match outcome {
        Ok(result) => {
            print_result(&result, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&ErrorResponse::from(&e))?);
            } else {
                eprintln!("error: {}", e.public_message());
            }
            let code = match e.kind() {
                ErrorKind::InferenceFailure => 1,
                ErrorKind::InvalidImage | ErrorKind::UnsuitableImage => 2,
                ErrorKind::ModelUnavailable => 3,
            };
            Ok(ExitCode::from(code))
        }
    }
}

fn print_result(result: &AqiResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&AnalysisResponse::from(result))?);
    } else {
        println!("AQI:        {:.2}", result.value);
        println!("Category:   {} ({})", result.category, result.color);
        println!("Haze level: {}", result.haze_level);
        println!("Mean haze:  {:.4}", result.mean_haze);
    }
    Ok(())
}
