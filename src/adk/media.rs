// SPDX-License-Identifier: MIT

//! Media attachments passed alongside a workflow input

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

const SUPPORTED_TYPES: [&str; 4] = ["image", "audio", "video", "file"];

/// A reference to an external media resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Error, PartialEq)]
pub enum MediaError {
    #[error("media[{index}]: {message}")]
    InvalidEntry { index: usize, message: String },

    #[error("{0}")]
    Invalid(String),

    #[error("unsupported media payload: {0}")]
    UnsupportedPayload(String),
}

impl Attachment {
    pub fn image_url(url: impl Into<String>) -> Self {
        Self {
            kind: "image".to_string(),
            url: url.into(),
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.kind.is_empty() {
            return Err("type is required".to_string());
        }
        let kind = self.kind.to_lowercase();
        if !SUPPORTED_TYPES.contains(&kind.as_str()) {
            return Err(format!("unsupported type \"{}\"", self.kind));
        }
        if self.url.is_empty() && self.path.is_empty() {
            return Err("either url or path must be provided".to_string());
        }
        Ok(())
    }

    fn sanitized(mut self) -> Self {
        self.kind = self.kind.to_lowercase();
        self
    }
}

/// Validate and normalize a list of typed attachments
pub fn normalize_attachments(items: Vec<Attachment>) -> Result<Vec<Attachment>, MediaError> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            item.validate()
                .map(|_| item.sanitized())
                .map_err(|message| MediaError::InvalidEntry { index, message })
        })
        .collect()
}

/// Normalize a loosely shaped media payload into attachments.
///
/// Accepted shapes: `null`, an array of attachment objects, an object with a
/// `media` field holding any accepted shape, or a single attachment object.
pub fn normalize_media(payload: &Value) -> Result<Vec<Attachment>, MediaError> {
    match payload {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => {
            let mut normalized = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let attachment = entry_to_attachment(item)
                    .map_err(|message| MediaError::InvalidEntry { index, message })?;
                normalized.push(attachment);
            }
            Ok(normalized)
        }
        Value::Object(obj) => match obj.get("media") {
            Some(inner) => normalize_media(inner),
            None => entry_to_attachment(payload)
                .map(|a| vec![a])
                .map_err(MediaError::Invalid),
        },
        other => Err(MediaError::UnsupportedPayload(type_name(other).to_string())),
    }
}

fn entry_to_attachment(entry: &Value) -> Result<Attachment, String> {
    if !entry.is_object() {
        return Err(format!("unsupported entry type {}", type_name(entry)));
    }
    let attachment: Attachment = serde_json::from_value(entry.clone()).map_err(|e| e.to_string())?;
    attachment.validate()?;
    Ok(attachment.sanitized())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_payload_is_empty() {
        assert!(normalize_media(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_array_payload() {
        let payload = json!([
            {"type": "IMAGE", "url": "https://example.com/a.png"},
            {"type": "file", "path": "/tmp/report.pdf", "name": "report"}
        ]);
        let items = normalize_media(&payload).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, "image");
        assert_eq!(items[1].name, "report");
    }

    #[test]
    fn test_wrapped_media_field() {
        let payload = json!({"media": [{"type": "audio", "url": "https://x/a.mp3"}]});
        let items = normalize_media(&payload).unwrap();
        assert_eq!(items[0].kind, "audio");
    }

    #[test]
    fn test_single_object_payload() {
        let payload = json!({"type": "video", "path": "clip.mp4"});
        assert_eq!(normalize_media(&payload).unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_missing_location() {
        let err = normalize_media(&json!([{"type": "image"}])).unwrap_err();
        assert_eq!(
            err,
            MediaError::InvalidEntry {
                index: 0,
                message: "either url or path must be provided".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_unknown_type_and_scalar_payload() {
        assert!(normalize_media(&json!({"type": "hologram", "url": "x"})).is_err());
        assert!(matches!(
            normalize_media(&json!(42)),
            Err(MediaError::UnsupportedPayload(_))
        ));
    }

    #[test]
    fn test_rejects_non_string_fields() {
        let err = normalize_media(&json!([{"type": "image", "url": 5}])).unwrap_err();
        assert!(matches!(err, MediaError::InvalidEntry { index: 0, .. }));
        assert!(normalize_media(&json!({"type": ["image"], "url": "https://x/a.png"})).is_err());
    }

    #[test]
    fn test_missing_type_is_reported() {
        let err = normalize_media(&json!([{"url": "https://x/a.png"}])).unwrap_err();
        assert_eq!(
            err,
            MediaError::InvalidEntry {
                index: 0,
                message: "type is required".to_string()
            }
        );
    }

    #[test]
    fn test_normalize_typed_attachments() {
        let items = normalize_attachments(vec![Attachment::image_url("https://x/y.png")]).unwrap();
        assert_eq!(items[0].kind, "image");
        assert!(normalize_attachments(vec![Attachment::default()]).is_err());
    }
}
