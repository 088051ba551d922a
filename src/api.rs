// API client module: a small blocking HTTP client that uploads one image to
// the disaster prediction endpoint. Synchronous on purpose: one request per
// invocation, nothing to schedule.

use anyhow::{Context, Result};
use reqwest::blocking::{multipart, Client};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Fixed endpoint the utility targets.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/predict";

/// Multipart field carrying the image bytes.
pub const FILE_FIELD: &str = "file";

/// Blocking client bound to a single prediction endpoint.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    endpoint: String,
}

/// Optional coordinates the server uses to look up the nearest rescue center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Body of a successful `/predict` call, kept as loose JSON. The server may
/// omit any field or send it with an unexpected shape; the report prints
/// whatever arrived instead of rejecting the whole body.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(transparent)]
pub struct PredictionResponse {
    fields: Map<String, Value>,
}

impl PredictionResponse {
    /// Value for `key`, treating an explicit `null` the same as a missing key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }
}

impl From<Map<String, Value>> for PredictionResponse {
    fn from(fields: Map<String, Value>) -> Self {
        PredictionResponse { fields }
    }
}

/// Outcome of an upload that reached the server.
#[derive(Debug)]
pub enum Prediction {
    /// HTTP 200 with a decoded JSON body.
    Analysed(PredictionResponse),
    /// Any other status, with the raw body text.
    Rejected { status: StatusCode, body: String },
}

impl ApiClient {
    /// Client for the fixed local endpoint.
    pub fn local() -> Result<Self> {
        Self::new(DEFAULT_ENDPOINT)
    }

    /// Client for an arbitrary endpoint URL. The request has no timeout: it
    /// blocks until the server answers or the connection fails.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Open `path` and upload it. The file handle is moved into the request
    /// body and dropped when the request finishes, whatever the outcome.
    pub fn predict(&self, path: &Path, location: Option<Location>) -> Result<Prediction> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open image file {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("image.jpg");
        self.predict_reader(file_name, file, location)
    }

    /// Upload the bytes produced by `reader` as the `file` part.
    pub fn predict_reader<R>(
        &self,
        file_name: &str,
        reader: R,
        location: Option<Location>,
    ) -> Result<Prediction>
    where
        R: Read + Send + 'static,
    {
        let part = multipart::Part::reader(reader)
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))
            .context("Invalid image mime type")?;
        let mut form = multipart::Form::new().part(FILE_FIELD, part);
        if let Some(loc) = location {
            form = form
                .text("latitude", loc.latitude.to_string())
                .text("longitude", loc.longitude.to_string());
        }

        tracing::debug!(endpoint = %self.endpoint, file_name, "sending prediction request");
        let res = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .context("Failed to send prediction request")?;

        let status = res.status();
        tracing::info!(%status, "prediction endpoint answered");
        if status != StatusCode::OK {
            let body = res.text().context("Failed to read error response body")?;
            return Ok(Prediction::Rejected { status, body });
        }

        let resp: PredictionResponse = res.json().context("Parsing prediction response json")?;
        Ok(Prediction::Analysed(resp))
    }
}

/// Content type for the upload part, guessed from the file extension.
pub fn mime_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Reader that counts how many times it is dropped.
    struct Tracked {
        inner: Cursor<Vec<u8>>,
        drops: Arc<AtomicUsize>,
    }

    impl Read for Tracked {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tracked(bytes: &[u8]) -> (Tracked, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        let reader = Tracked {
            inner: Cursor::new(bytes.to_vec()),
            drops: drops.clone(),
        };
        (reader, drops)
    }

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_for("flood.JPG"), "image/jpeg");
        assert_eq!(mime_for("a.jpeg"), "image/jpeg");
        assert_eq!(mime_for("quake.png"), "image/png");
        assert_eq!(mime_for("storm.tiff"), "image/tiff");
        assert_eq!(mime_for("notes"), "application/octet-stream");
        assert_eq!(mime_for("archive.tar.gz"), "application/octet-stream");
    }

    #[test]
    fn null_reads_as_missing() {
        let resp: PredictionResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(resp, PredictionResponse::default());
        assert!(resp.get("status").is_none());

        let resp: PredictionResponse =
            serde_json::from_str(r#"{"disaster_type":null,"disaster_level":7.0,"extra":[1]}"#)
                .unwrap();
        assert!(resp.get("disaster_type").is_none());
        assert_eq!(resp.get("disaster_level"), Some(&serde_json::json!(7.0)));
        assert!(resp.get("extra").is_some());
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(serde_json::from_str::<PredictionResponse>("[1, 2]").is_err());
    }

    #[test]
    fn sends_file_part_and_decodes_ok() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/predict")
                .body_contains("name=\"file\"; filename=\"flood.jpg\"")
                .body_contains("image/jpeg")
                .body_contains("raw-image-bytes");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"disaster_type":"Flood","confidence":0.81,"disaster_level":5,"status":"success"}"#);
        });

        let api = ApiClient::new(server.url("/predict")).unwrap();
        let (reader, drops) = tracked(b"raw-image-bytes");
        let prediction = api.predict_reader("flood.jpg", reader, None).unwrap();

        mock.assert();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        match prediction {
            Prediction::Analysed(resp) => {
                assert_eq!(resp.get("disaster_type"), Some(&Value::from("Flood")));
                assert_eq!(resp.get("confidence"), Some(&Value::from(0.81)));
                assert_eq!(resp.get("disaster_level"), Some(&Value::from(5)));
                assert_eq!(resp.get("status"), Some(&Value::from("success")));
                assert!(resp.get("severity_category").is_none());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn location_fields_are_attached() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/predict")
                .body_contains("name=\"latitude\"")
                .body_contains("19.07")
                .body_contains("name=\"longitude\"")
                .body_contains("-72.85");
            then.status(200).body("{}");
        });

        let api = ApiClient::new(server.url("/predict")).unwrap();
        let location = Location {
            latitude: 19.07,
            longitude: -72.85,
        };
        let (reader, _) = tracked(b"img");
        api.predict_reader("a.png", reader, Some(location)).unwrap();
        mock.assert();
    }

    #[test]
    fn non_ok_status_is_rejected_with_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/predict");
            then.status(500).body("Internal Error");
        });

        let api = ApiClient::new(server.url("/predict")).unwrap();
        let (reader, drops) = tracked(b"img");
        match api.predict_reader("a.jpg", reader, None).unwrap() {
            Prediction::Rejected { status, body } => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(body, "Internal Error");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/predict");
            then.status(200).body("not json");
        });

        let api = ApiClient::new(server.url("/predict")).unwrap();
        let (reader, _) = tracked(b"img");
        let err = api.predict_reader("a.jpg", reader, None).unwrap_err();
        assert!(format!("{:#}", err).contains("Parsing prediction response json"));
    }

    #[test]
    fn connection_failure_releases_reader() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let api = ApiClient::new(format!("http://127.0.0.1:{}/predict", port)).unwrap();
        let (reader, drops) = tracked(b"img");
        assert!(api.predict_reader("a.jpg", reader, None).is_err());
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
