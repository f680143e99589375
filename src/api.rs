use serde::{Deserialize, Serialize};
use std::io::Read;
use std::time::Duration;
use tracing::{debug, warn};

use crate::catalog::Severity;
use crate::error::ApiError;
use crate::geometry::{Annotation, AnnotationGeometry};

const API_PREFIX: &str = "/api/v1";
const FALLBACK_ERROR: &str = "Unexpected response from server. Please try again.";
const MAX_IMAGE_BYTES: u64 = 64 * 1024 * 1024;

// ── Records ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DefectRecord {
    pub id: i64,
    #[serde(default)]
    pub photo_id: Option<i64>,
    pub severity: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: i64,
    #[serde(default)]
    pub test_id: Option<i64>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewAnnotation {
    pub category_id: i64,
    pub geometry: AnnotationGeometry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DefectPayload {
    pub category_id: i64,
    pub severity: Severity,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<NewAnnotation>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AnnotationPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<AnnotationGeometry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

// ── Endpoints ───────────────────────────────────────────────────────────────

pub mod endpoints {
    use super::API_PREFIX;

    pub fn photo(photo_id: i64) -> String {
        format!("{API_PREFIX}/photos/{photo_id}")
    }

    /// Image bytes, cache-busted so a re-uploaded photo is never stale.
    pub fn photo_image(photo_id: i64, cache_bust: i64) -> String {
        format!("{API_PREFIX}/photos/{photo_id}/image?t={cache_bust}")
    }

    pub fn photo_defects(photo_id: i64) -> String {
        format!("{API_PREFIX}/defects/photo/{photo_id}")
    }

    pub fn defect(defect_id: i64) -> String {
        format!("{API_PREFIX}/defects/{defect_id}")
    }

    pub fn annotation(annotation_id: i64) -> String {
        format!("{API_PREFIX}/defects/annotations/{annotation_id}")
    }
}

// ── Client ──────────────────────────────────────────────────────────────────

pub trait DefectApi: Send {
    fn get_photo(&self, photo_id: i64) -> Result<PhotoRecord, ApiError>;
    fn get_photo_image(&self, photo_id: i64) -> Result<Vec<u8>, ApiError>;
    fn get_defects_by_photo(&self, photo_id: i64) -> Result<Vec<DefectRecord>, ApiError>;
    fn create_defect(&self, photo_id: i64, payload: &DefectPayload)
        -> Result<DefectRecord, ApiError>;
    fn update_defect(&self, defect_id: i64, payload: &DefectPayload)
        -> Result<DefectRecord, ApiError>;
    fn delete_defect(&self, defect_id: i64) -> Result<(), ApiError>;
    fn update_annotation(
        &self,
        annotation_id: i64,
        payload: &AnnotationPayload,
    ) -> Result<Annotation, ApiError>;
    fn delete_annotation(&self, annotation_id: i64) -> Result<(), ApiError>;
}

pub struct HttpDefectApi {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpDefectApi {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ureq::Response, ApiError> {
        debug!("{} {}", method, path);
        let request = self.agent.request(method, &self.url(path));
        let result = match body {
            Some(json) => request.send_json(json),
            None => request.call(),
        };
        match result {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                let message = error_message(&body);
                warn!("{} {} failed with {}: {}", method, path, status, message);
                Err(ApiError::Status { status, message })
            }
            Err(ureq::Error::Transport(e)) => {
                warn!("{} {} failed: {}", method, path, e);
                Err(ApiError::Transport(e.to_string()))
            }
        }
    }

    fn send_for<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let response = self.send(method, path, body)?;
        let text = response
            .into_string()
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        parse_body(&text)
    }
}

fn to_body(payload: &impl Serialize) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(payload).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Empty bodies decode as JSON `null`, which lets `()` and `Option` targets
/// accept 204 responses.
fn parse_body<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    let text = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Human-readable message from an error response body: `detail`, then
/// `message`, then the raw text.
pub fn error_message(body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "message"] {
            match map.get(key) {
                Some(serde_json::Value::String(s)) if !s.is_empty() => return s.clone(),
                Some(serde_json::Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        FALLBACK_ERROR.to_string()
    } else {
        trimmed.to_string()
    }
}

impl DefectApi for HttpDefectApi {
    fn get_photo(&self, photo_id: i64) -> Result<PhotoRecord, ApiError> {
        self.send_for("GET", &endpoints::photo(photo_id), None)
    }

    fn get_photo_image(&self, photo_id: i64) -> Result<Vec<u8>, ApiError> {
        let cache_bust = chrono::Utc::now().timestamp_millis();
        let response = self.send("GET", &endpoints::photo_image(photo_id, cache_bust), None)?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_IMAGE_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(bytes)
    }

    fn get_defects_by_photo(&self, photo_id: i64) -> Result<Vec<DefectRecord>, ApiError> {
        let defects: Option<Vec<DefectRecord>> =
            self.send_for("GET", &endpoints::photo_defects(photo_id), None)?;
        Ok(defects.unwrap_or_default())
    }

    fn create_defect(
        &self,
        photo_id: i64,
        payload: &DefectPayload,
    ) -> Result<DefectRecord, ApiError> {
        self.send_for(
            "POST",
            &endpoints::photo_defects(photo_id),
            Some(to_body(payload)?),
        )
    }

    fn update_defect(
        &self,
        defect_id: i64,
        payload: &DefectPayload,
    ) -> Result<DefectRecord, ApiError> {
        self.send_for("PUT", &endpoints::defect(defect_id), Some(to_body(payload)?))
    }

    fn delete_defect(&self, defect_id: i64) -> Result<(), ApiError> {
        self.send("DELETE", &endpoints::defect(defect_id), None)?;
        Ok(())
    }

    fn update_annotation(
        &self,
        annotation_id: i64,
        payload: &AnnotationPayload,
    ) -> Result<Annotation, ApiError> {
        self.send_for(
            "PUT",
            &endpoints::annotation(annotation_id),
            Some(to_body(payload)?),
        )
    }

    fn delete_annotation(&self, annotation_id: i64) -> Result<(), ApiError> {
        self.send("DELETE", &endpoints::annotation(annotation_id), None)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use serde_json::json;

    #[test]
    fn test_error_message_prefers_detail() {
        assert_eq!(
            error_message(r#"{"detail": "Defect not found", "message": "nope"}"#),
            "Defect not found"
        );
        assert_eq!(error_message(r#"{"message": "Bad severity"}"#), "Bad severity");
    }

    #[test]
    fn test_error_message_non_string_detail() {
        // FastAPI validation errors put a list under `detail`.
        let body = r#"{"detail": [{"loc": ["body", "severity"], "msg": "field required"}]}"#;
        let message = error_message(body);
        assert!(message.contains("field required"));
    }

    #[test]
    fn test_error_message_falls_back_to_text() {
        assert_eq!(error_message("Internal Server Error"), "Internal Server Error");
        assert_eq!(error_message(""), FALLBACK_ERROR);
        assert_eq!(error_message("   "), FALLBACK_ERROR);
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(endpoints::photo_defects(12), "/api/v1/defects/photo/12");
        assert_eq!(endpoints::defect(4), "/api/v1/defects/4");
        assert_eq!(endpoints::annotation(9), "/api/v1/defects/annotations/9");
        assert_eq!(
            endpoints::photo_image(3, 1700000000000),
            "/api/v1/photos/3/image?t=1700000000000"
        );
    }

    #[test]
    fn test_create_payload_shape() {
        let payload = DefectPayload {
            category_id: 2,
            severity: Severity::High,
            description: None,
            color: Some("#ef4444".to_string()),
            annotations: vec![NewAnnotation {
                category_id: 2,
                geometry: AnnotationGeometry::Circle {
                    center: Point::new(0.5, 0.5),
                    radius: 0.25,
                },
                color: None,
            }],
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "category_id": 2,
                "severity": "high",
                "description": null,
                "color": "#ef4444",
                "annotations": [{
                    "category_id": 2,
                    "geometry": {"type": "circle", "center": {"x": 0.5, "y": 0.5}, "radius": 0.25}
                }]
            })
        );
    }

    #[test]
    fn test_update_payload_omits_empty_annotations() {
        let payload = DefectPayload {
            category_id: 1,
            severity: Severity::Low,
            description: Some("scratch".to_string()),
            color: None,
            annotations: Vec::new(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("annotations").is_none());
        assert!(value.get("color").is_none());
    }

    #[test]
    fn test_defect_record_parses_server_response() {
        let json = r#"[{
            "id": 5,
            "photo_id": 3,
            "description": null,
            "severity": "medium",
            "created_at": "2025-03-01T10:15:00",
            "annotations": [{
                "id": 11,
                "defect_id": 5,
                "category_id": 1,
                "geometry": {"type": "rect", "x": 0.1, "y": 0.2, "width": 0.3, "height": 0.4},
                "created_at": "2025-03-01T10:15:00"
            }]
        }]"#;
        let defects: Vec<DefectRecord> = parse_body(json).unwrap();
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].annotations[0].geometry.kind_name(), "rect");
    }

    #[test]
    fn test_empty_body_parses_as_unit() {
        let unit: Result<(), ApiError> = parse_body("");
        assert!(unit.is_ok());
        let missing: Option<Vec<DefectRecord>> = parse_body("").unwrap();
        assert!(missing.is_none());
    }
}
