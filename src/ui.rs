// UI layer: runs one upload and prints its outcome. All output goes through
// a caller-supplied writer so the binary can pass stdout and tests a buffer.

use crate::api::{ApiClient, Location, Prediction, PredictionResponse};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

const PLACEHOLDER: &str = "None";

/// Upload `image_path` and print the analysis, the server's rejection, or a
/// single `Error:` line. Upload failures never escape as `Err`; the only
/// error returned is a failure to write to `out`.
pub fn run<W: Write>(
    api: &ApiClient,
    image_path: &Path,
    location: Option<Location>,
    out: &mut W,
) -> io::Result<()> {
    if !image_path.is_file() {
        writeln!(out, "Error: File {} not found", image_path.display())?;
        return Ok(());
    }

    writeln!(out, "Uploading {} for disaster analysis...", image_path.display())?;

    let spinner = spinner("Waiting for prediction...");
    let outcome = api.predict(image_path, location);
    spinner.finish_and_clear();

    match outcome {
        Ok(Prediction::Analysed(result)) => {
            writeln!(out)?;
            render_analysis(&result, out)
        }
        Ok(Prediction::Rejected { status, body }) => {
            writeln!(out, "Error: API returned status code {}", status.as_u16())?;
            writeln!(out, "{}", body)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "upload failed");
            writeln!(out, "Error: {}", describe(&e))
        }
    }
}

/// Outermost context plus the root cause. Intermediate errors are skipped:
/// reqwest already folds its source into its own message.
pub fn describe(err: &anyhow::Error) -> String {
    if err.chain().count() > 1 {
        format!("{}: {}", err, err.root_cause())
    } else {
        err.to_string()
    }
}

/// Print the six analysis fields, then the response plan if the server sent
/// one.
pub fn render_analysis<W: Write>(result: &PredictionResponse, out: &mut W) -> io::Result<()> {
    writeln!(out, "Analysis Result:")?;
    writeln!(out, "Disaster Type: {}", shown(result.get("disaster_type")))?;
    writeln!(out, "Confidence: {}", shown(result.get("confidence")))?;
    writeln!(out, "Disaster Level (1-10): {}", shown(result.get("disaster_level")))?;
    writeln!(out, "Severity Category: {}", shown(result.get("severity_category")))?;
    writeln!(out, "File Processed: {}", shown(result.get("file_processed")))?;
    writeln!(out, "Status: {}", shown(result.get("status")))?;

    let plan = response_plan(result);
    if !plan.is_empty() {
        writeln!(out)?;
        writeln!(out, "Response Plan:")?;
        for line in plan {
            writeln!(out, "{}", line)?;
        }
    }
    Ok(())
}

/// Lines of the response plan. A field whose shape does not fit its line is
/// left out rather than failing the report.
fn response_plan(result: &PredictionResponse) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(size) = result.get("rescue_team_size").and_then(scalar) {
        lines.push(format!("Rescue Team Size: {}", size));
    }
    if let Some(details) = result.get("rescue_team_details").and_then(scalar) {
        lines.push(format!("Rescue Team Details: {}", details));
    }
    if let Some(eta) = result.get("estimated_response_time").and_then(scalar) {
        lines.push(format!("Estimated Response Time: {}", eta));
    }
    for (key, title) in [("equipment", "Equipment"), ("priority_actions", "Priority Actions")] {
        if let Some(items) = result.get(key).and_then(Value::as_array) {
            lines.push(format!("{}:", title));
            lines.extend(items.iter().filter_map(scalar).map(|item| format!("  - {}", item)));
        }
    }
    if let Some(center) = result.get("nearest_rescue_center").and_then(Value::as_object) {
        let name = center.get("name").and_then(scalar);
        let name = name.as_deref().unwrap_or(PLACEHOLDER);
        let lat = center.get("latitude").and_then(scalar);
        let lng = center.get("longitude").and_then(scalar);
        match (lat, lng) {
            (Some(lat), Some(lng)) => {
                lines.push(format!("Nearest Rescue Center: {} ({}, {})", name, lat, lng))
            }
            _ => lines.push(format!("Nearest Rescue Center: {}", name)),
        }
    }
    if let Some(route) = result.get("route_info").and_then(Value::as_object) {
        lines.push(format!(
            "Route: {}, {}",
            shown(route.get("distance")),
            shown(route.get("estimated_time"))
        ));
        let steps = route.get("instructions").and_then(Value::as_array);
        for (i, step) in steps.into_iter().flatten().filter_map(scalar).enumerate() {
            lines.push(format!("  {}. {}", i + 1, step));
        }
    }
    lines
}

/// Any JSON value as the report prints it: strings bare, numbers as sent,
/// arrays and objects as compact JSON, missing or `null` as the placeholder.
fn shown(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => PLACEHOLDER.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Strings, numbers and booleans; `None` for anything nested or `null`.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Spinner on stderr while the request is in flight. indicatif hides it when
/// stderr is not a terminal.
fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
