use serde::{Deserialize, Serialize};

/// Preview card returned by `GET /preview` on success.
///
/// Every field is populated: missing page data is replaced by configured
/// defaults, so renderers never have to handle `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    pub success: bool,
    pub title: String,
    pub description: String,
    pub image: String,
    pub source_url: String,
}

impl PreviewResult {
    pub fn new(title: String, description: String, image: String, source_url: String) -> Self {
        PreviewResult {
            success: true,
            title,
            description,
            image,
            source_url,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewError {
    pub success: bool,
    pub error: String,
    pub message: String,
}

impl PreviewError {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        PreviewError {
            success: false,
            error: error.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_serializes_source_url_in_camel_case() {
        let result = PreviewResult::new(
            "T".into(),
            "D".into(),
            "https://example.com/i.png".into(),
            "https://example.com/s/1".into(),
        );
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "success": true,
                "title": "T",
                "description": "D",
                "image": "https://example.com/i.png",
                "sourceUrl": "https://example.com/s/1",
            })
        );
    }

    #[test]
    fn error_is_never_successful() {
        let err = PreviewError::new("InvalidUrl", "bad");
        assert!(!err.success);
        assert_eq!(err.error, "InvalidUrl");
    }
}
