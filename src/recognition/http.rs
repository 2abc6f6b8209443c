//! HTTP client for a cloud-hosted recognition service.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use serde_json::Value;

use super::{RawEngineResult, RecognitionEngine, RecognitionError};
use crate::models::DocumentCategory;

/// Cloud recognizer speaking a small JSON protocol:
/// `GET /api/health` for the bind-time probe and
/// `POST /api/recognize` with `{category, image}` (base64) returning the
/// engine's raw payload plus a top-level `confidence`.
pub struct HttpRecognizer {
    name: String,
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct RecognizeRequest<'a> {
    category: &'a str,
    image: String,
}

impl HttpRecognizer {
    pub fn new(name: &str, base_url: &str, timeout_secs: u64) -> Result<Self, RecognitionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RecognitionError::Unavailable(e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> RecognitionError {
        if e.is_connect() {
            RecognitionError::Failed(format!("cannot reach {}", self.base_url))
        } else if e.is_timeout() {
            RecognitionError::Failed(format!(
                "request timed out after {}s",
                self.timeout_secs
            ))
        } else {
            RecognitionError::Failed(e.to_string())
        }
    }
}

impl RecognitionEngine for HttpRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn probe(&self) -> Result<(), RecognitionError> {
        let url = format!("{}/api/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| RecognitionError::Unavailable(format!("{}: {e}", self.name)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(RecognitionError::Unavailable(format!(
                "{}: health check returned {}",
                self.name,
                response.status()
            )))
        }
    }

    fn recognize(
        &self,
        category: DocumentCategory,
        image_path: &Path,
    ) -> Result<RawEngineResult, RecognitionError> {
        let bytes = std::fs::read(image_path).map_err(|e| {
            RecognitionError::Failed(format!("cannot read {}: {e}", image_path.display()))
        })?;

        let url = format!("{}/api/recognize", self.base_url);
        let body = RecognizeRequest {
            category: category.as_str(),
            image: BASE64.encode(&bytes),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RecognitionError::Failed(format!(
                "{} returned {status}: {body}",
                self.name
            )));
        }

        let payload: Value = response
            .json()
            .map_err(|e| RecognitionError::Failed(format!("bad response body: {e}")))?;

        let confidence = payload
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0) as f32;

        tracing::debug!(
            engine = %self.name,
            category = category.as_str(),
            confidence,
            "Recognition response received"
        );

        Ok(RawEngineResult { payload, confidence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let engine = HttpRecognizer::new("cloud", "http://localhost:8089/", 30).unwrap();
        assert_eq!(engine.base_url, "http://localhost:8089");
        assert_eq!(engine.name(), "cloud");
    }

    /// Compile-time check that the recognizer satisfies the engine seam.
    /// (Integration against a live service is out of unit-test scope.)
    #[test]
    fn satisfies_engine_trait() {
        fn _accepts_engine<E: RecognitionEngine>(_e: &E) {}
        let _: fn(&HttpRecognizer) = _accepts_engine;
    }
}
