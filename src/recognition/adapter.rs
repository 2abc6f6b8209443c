use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use super::parsers;
use super::{RawRecognition, RecognitionEngine, RecognitionError};
use crate::models::DocumentCategory;

/// Wraps an ordered list of candidate engines and binds to the first one
/// whose probe succeeds. All `recognize` calls target the bound engine;
/// deciding to retry elsewhere on low confidence is the caller's policy.
pub struct RecognitionAdapter {
    engine: Arc<dyn RecognitionEngine>,
    timeout: Duration,
}

impl std::fmt::Debug for RecognitionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionAdapter")
            .field("engine", &self.engine.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RecognitionAdapter {
    /// Probe candidates in order and bind the first healthy one.
    /// Fails with `Unavailable` when every candidate refuses to initialize.
    pub fn bind(
        candidates: Vec<Arc<dyn RecognitionEngine>>,
        timeout: Duration,
    ) -> Result<Self, RecognitionError> {
        if candidates.is_empty() {
            return Err(RecognitionError::Unavailable(
                "no candidate engines configured".into(),
            ));
        }

        let mut failures = Vec::new();
        for engine in candidates {
            match engine.probe() {
                Ok(()) => {
                    tracing::info!(engine = engine.name(), "Recognition engine bound");
                    return Ok(Self { engine, timeout });
                }
                Err(e) => {
                    tracing::debug!(engine = engine.name(), error = %e, "Engine probe failed, trying next");
                    failures.push(format!("{}: {e}", engine.name()));
                }
            }
        }
        Err(RecognitionError::Unavailable(failures.join("; ")))
    }

    /// The name of the engine this adapter bound to.
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Recognize one document image with the bound engine, normalized to
    /// flat field pairs. The engine call runs on a worker thread and is
    /// abandoned after the configured timeout, which reports as `Failed`.
    pub fn recognize(
        &self,
        category: DocumentCategory,
        image_path: &Path,
    ) -> Result<RawRecognition, RecognitionError> {
        let engine = Arc::clone(&self.engine);
        let path: PathBuf = image_path.to_path_buf();
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            let result = engine.recognize(category, &path);
            // Receiver may have timed out and gone away.
            let _ = tx.send(result);
        });

        let raw = match rx.recv_timeout(self.timeout) {
            Ok(result) => result?,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    engine = self.engine.name(),
                    category = category.as_str(),
                    timeout_secs = self.timeout.as_secs(),
                    "Recognition call timed out"
                );
                return Err(RecognitionError::Failed(format!(
                    "engine {} timed out after {}s",
                    self.engine.name(),
                    self.timeout.as_secs()
                )));
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(RecognitionError::Failed(
                    "recognition worker terminated without a result".into(),
                ));
            }
        };

        let (fields, parse_error) = parsers::parse(category, &raw.payload);
        if let Some(marker) = &parse_error {
            tracing::warn!(
                engine = self.engine.name(),
                category = category.as_str(),
                marker,
                "Engine payload unparseable, returning empty field map"
            );
        }

        Ok(RawRecognition {
            category,
            engine: self.engine.name().to_string(),
            fields,
            confidence: raw.confidence,
            parse_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::RawEngineResult;
    use serde_json::json;

    struct StaticEngine {
        name: &'static str,
        healthy: bool,
        payload: serde_json::Value,
        confidence: f32,
    }

    impl RecognitionEngine for StaticEngine {
        fn name(&self) -> &str {
            self.name
        }

        fn probe(&self) -> Result<(), RecognitionError> {
            if self.healthy {
                Ok(())
            } else {
                Err(RecognitionError::Unavailable(format!("{} offline", self.name)))
            }
        }

        fn recognize(
            &self,
            _category: DocumentCategory,
            _image_path: &Path,
        ) -> Result<RawEngineResult, RecognitionError> {
            Ok(RawEngineResult {
                payload: self.payload.clone(),
                confidence: self.confidence,
            })
        }
    }

    struct SlowEngine;

    impl RecognitionEngine for SlowEngine {
        fn name(&self) -> &str {
            "slow"
        }

        fn probe(&self) -> Result<(), RecognitionError> {
            Ok(())
        }

        fn recognize(
            &self,
            _category: DocumentCategory,
            _image_path: &Path,
        ) -> Result<RawEngineResult, RecognitionError> {
            std::thread::sleep(Duration::from_secs(5));
            Ok(RawEngineResult {
                payload: json!({}),
                confidence: 1.0,
            })
        }
    }

    fn engine(name: &'static str, healthy: bool) -> Arc<dyn RecognitionEngine> {
        Arc::new(StaticEngine {
            name,
            healthy,
            payload: json!({"姓名": "王伟"}),
            confidence: 0.9,
        })
    }

    #[test]
    fn binds_first_healthy_candidate() {
        let adapter = RecognitionAdapter::bind(
            vec![engine("cloud", false), engine("local", true)],
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(adapter.engine_name(), "local");
    }

    #[test]
    fn all_candidates_down_is_unavailable() {
        let err = RecognitionAdapter::bind(
            vec![engine("cloud", false), engine("local", false)],
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, RecognitionError::Unavailable(_)));
        assert!(err.to_string().contains("cloud"));
        assert!(err.to_string().contains("local"));
    }

    #[test]
    fn no_candidates_is_unavailable() {
        let err = RecognitionAdapter::bind(vec![], Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, RecognitionError::Unavailable(_)));
    }

    #[test]
    fn recognize_normalizes_payload() {
        let adapter =
            RecognitionAdapter::bind(vec![engine("cloud", true)], Duration::from_secs(1)).unwrap();
        let raw = adapter
            .recognize(DocumentCategory::Identity, Path::new("/tmp/id.jpg"))
            .unwrap();
        assert_eq!(raw.engine, "cloud");
        assert_eq!(raw.fields.get("姓名").map(String::as_str), Some("王伟"));
        assert!((raw.confidence - 0.9).abs() < f32::EPSILON);
        assert!(raw.parse_error.is_none());
    }

    #[test]
    fn timeout_reports_failed_not_unavailable() {
        let adapter = RecognitionAdapter::bind(vec![Arc::new(SlowEngine)], Duration::from_millis(50))
            .unwrap();
        let err = adapter
            .recognize(DocumentCategory::Identity, Path::new("/tmp/id.jpg"))
            .unwrap_err();
        assert!(matches!(err, RecognitionError::Failed(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn unparseable_payload_reports_marker() {
        let adapter = RecognitionAdapter::bind(
            vec![Arc::new(StaticEngine {
                name: "cloud",
                healthy: true,
                payload: json!(42),
                confidence: 0.2,
            })],
            Duration::from_secs(1),
        )
        .unwrap();
        let raw = adapter
            .recognize(DocumentCategory::License, Path::new("/tmp/lic.jpg"))
            .unwrap();
        assert!(raw.fields.is_empty());
        assert!(raw.parse_error.is_some());
    }
}
