// Command-line surface: argument parsing with `clap`, the usage line printed
// when no image is given, and the stderr logger.

use crate::api::Location;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

/// Upload an image to the local disaster prediction endpoint and print the
/// analysis.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Image file to upload.
    pub image_path: Option<PathBuf>,

    /// Latitude sent alongside the image (requires --longitude).
    #[arg(long, requires = "longitude", allow_negative_numbers = true)]
    pub latitude: Option<f64>,

    /// Longitude sent alongside the image (requires --latitude).
    #[arg(long, requires = "latitude", allow_negative_numbers = true)]
    pub longitude: Option<f64>,

    /// Print diagnostics to stderr; repeat for more detail.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Location form fields, present only when both coordinates were given.
    pub fn location(&self) -> Option<Location> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Location { latitude, longitude }),
            _ => None,
        }
    }
}

pub fn usage(program: &str) -> String {
    format!("Usage: {} <path_to_image>", program)
}

fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global `tracing` subscriber. Logs go to stderr so stdout only
/// carries the report.
pub fn init_tracing(verbose: u8) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(level_for(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}
