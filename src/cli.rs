use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "haze-aqi", version, about = "Estimate air quality from a sky photograph")]
pub struct Cli {
    #[arg(long, global = true, help = "Pipeline configuration JSON")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Dehazing weights, overriding the configuration")]
    pub weights: Option<PathBuf>,
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(short, long, global = true, help = "Log stage spans and debug details")]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze one photograph
    Analyze {
        image: PathBuf,
        #[arg(long, help = "Print per-stage timings to stderr")]
        timings: bool,
        #[arg(long, help = "Write the dehazed scene to this image file")]
        dehazed_out: Option<PathBuf>,
        #[arg(long, help = "Go through a staged temporary file like an upload would")]
        upload: bool,
    },
    /// Report whether the model artifacts loaded
    Status,
    /// Fit the calibration polynomial to anchor points and print it
    Calibrate {
        #[arg(long, help = "Anchor JSON {\"anchors\": [[haze, aqi], ...]}; built-in anchors when omitted")]
        anchors: Option<PathBuf>,
        #[arg(short, long, help = "Write {\"coefficients\": [c0, c1, c2]} to this file")]
        output: Option<PathBuf>,
    },
}
