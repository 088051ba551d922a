// Entrypoint for the upload utility.
// - Keeps `main` small: parse arguments, build the API client, run one upload.
// - Every upload failure is printed by `ui::run`; the process exits normally.

use clap::Parser;
use disaster_upload_cli::{api::ApiClient, cli::Args, ui};
use std::io::Write;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    disaster_upload_cli::cli::init_tracing(args.verbose)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let Some(image_path) = args.image_path.as_deref() else {
        let program = std::env::args().next().unwrap_or_else(|| "disaster-upload-cli".into());
        writeln!(out, "{}", disaster_upload_cli::cli::usage(&program))?;
        return Ok(());
    };

    let api = match ApiClient::local() {
        Ok(api) => api,
        Err(e) => {
            writeln!(out, "Error: {}", ui::describe(&e))?;
            return Ok(());
        }
    };

    ui::run(&api, image_path, args.location(), &mut out)?;
    Ok(())
}
