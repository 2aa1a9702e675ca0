//! Data Transfer Objects for API requests and responses.

use serde::{Deserialize, Serialize};

use super::result::{ExamResult, ResultInput, Subject};

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Response code (0 = success, non-zero = error).
    pub code: i32,

    /// Human-readable message.
    pub message: String,

    /// Response data (null on error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create a success response.
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    /// Create a success response with a custom message.
    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            code: 0,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Create an error response.
    pub fn error(code: i32, message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// A list with its length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub count: usize,
    pub items: Vec<T>,
}

impl<T> ListResponse<T> {
    /// Wrap a list.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

/// Data attached to a failed result search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMiss {
    /// Whether any result has been published yet.
    pub is_published: bool,
}

/// Query for looking up an application by roll number.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RollLookupQuery {
    /// Date of birth the caller must match.
    #[serde(default)]
    pub dob: Option<String>,
}

/// Status update body shared by payment and admission review.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

/// Response for an uploaded image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: String,
    pub url: String,
}

/// Response for a delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: String,
}

/// Publish request: either everything or a list of roll numbers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    #[serde(default)]
    pub publish_all: bool,
    #[serde(default)]
    pub roll_numbers: Vec<String>,
}

/// Publish outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub modified_count: usize,
}

/// Bulk result upsert request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkCreateRequest {
    #[serde(default)]
    pub results: Vec<ResultInput>,
}

/// One rejected item of a bulk upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkError {
    pub index: usize,
    pub roll_number: Option<String>,
    pub error: String,
}

/// Bulk upsert outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkCreateResponse {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub errors: Vec<BulkError>,
}

/// Rank recalculation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculateRequest {
    #[serde(default)]
    pub published_only: bool,
}

/// A rank that moved during recalculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankChange {
    pub roll_number: String,
    pub name: String,
    pub marks: f64,
    pub old_rank: u32,
    pub new_rank: u32,
}

/// Rank recalculation outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecalculateResponse {
    /// Results considered.
    pub total: usize,
    pub changes: Vec<RankChange>,
}

/// Aggregates for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectStats {
    pub subject: Subject,
    pub total: usize,
    pub average: f64,
    pub highest: f64,
    pub lowest: f64,
    pub passed: usize,
}

/// Result statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultStats {
    pub total: usize,
    pub published: usize,
    pub unpublished: usize,
    pub subjects: Vec<SubjectStats>,
}

/// Projection of a result for leaderboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPerformer {
    pub name: String,
    pub father_name: String,
    pub roll_number: String,
    pub marks: f64,
    pub rank: u32,
    pub subject: Subject,
}

impl From<&ExamResult> for TopPerformer {
    fn from(result: &ExamResult) -> Self {
        Self {
            name: result.name.clone(),
            father_name: result.father_name.clone(),
            roll_number: result.roll_number.clone(),
            marks: result.marks,
            rank: result.rank,
            subject: result.subject,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,

    /// Service version.
    pub version: String,
}

/// Readiness check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyResponse {
    /// Overall readiness status.
    pub ready: bool,

    /// Individual component statuses.
    pub components: ReadyComponents,
}

/// Component readiness statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyComponents {
    /// Storage backend status.
    pub storage: bool,

    /// Storage backend name.
    pub backend: String,
}

/// Lenient field decoders for form input.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Integer(i64),
        Float(f64),
    }

    /// Accept a string or a bare number (phone numbers often arrive as
    /// numbers from form builders).
    pub fn opt_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(
            Option::<StringOrNumber>::deserialize(deserializer)?.map(|value| match value {
                StringOrNumber::String(s) => s,
                StringOrNumber::Integer(n) => n.to_string(),
                StringOrNumber::Float(n) => n.to_string(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success(vec![1, 2, 3]);
        assert_eq!(response.code, 0);
        assert_eq!(response.message, "success");
        assert_eq!(response.data, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_api_response_error() {
        let response = ApiResponse::<()>::error(4001, "result not found");
        assert_eq!(response.code, 4001);
        assert_eq!(response.message, "result not found");
        assert!(response.data.is_none());
    }

    #[test]
    fn test_lenient_phone() {
        let input: ResultInput =
            serde_json::from_str(r#"{"rollNumber": 1158, "phone": "9000000000"}"#).unwrap();
        assert_eq!(input.roll_number.as_deref(), Some("1158"));
        assert_eq!(input.phone.as_deref(), Some("9000000000"));

        let input: ResultInput = serde_json::from_str(r#"{"phone": null}"#).unwrap();
        assert!(input.phone.is_none());
    }

    #[test]
    fn test_publish_request_defaults() {
        let req: PublishRequest = serde_json::from_str("{}").unwrap();
        assert!(!req.publish_all);
        assert!(req.roll_numbers.is_empty());

        let req: PublishRequest =
            serde_json::from_str(r#"{"rollNumbers": ["SK1001"]}"#).unwrap();
        assert_eq!(req.roll_numbers, vec!["SK1001"]);
    }

    #[test]
    fn test_list_response_counts() {
        let list = ListResponse::new(vec!["a", "b"]);
        assert_eq!(list.count, 2);
    }
}
