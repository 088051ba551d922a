// Library root
// -----------
// This crate exposes a small library surface for the upload CLI. The binary
// (`main.rs`) parses the command line and hands the image path to `ui::run`.
//
// Module responsibilities:
// - `api`: Encapsulates the HTTP interaction with the prediction endpoint
//   (multipart upload) and the response shapes it returns.
// - `ui`: Turns an upload into console output: the analysis report, the
//   non-200 report and the catch-all error line.
// - `cli`: Command-line arguments, usage text and logging setup.
pub mod api;
pub mod cli;
pub mod ui;
