use serde::{Deserialize, Serialize};

use crate::domain::{StationId, UserId};

/// One check-in submission: a mirrored JPEG frame in `data:image/jpeg;base64,`
/// form plus the operator-selected station name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckinRequest {
    pub image_b64: String,
    pub station: String,
}

/// Validation verdict for one submitted frame. `message` is the operator-facing
/// line; `reason` is a stable machine code such as `wrong_station` or
/// `no_match`. Everything but `success` is optional on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckinResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationSummary {
    pub station_id: StationId,
    pub station_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationsResponse {
    pub stations: Vec<StationSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkin_response_tolerates_missing_optional_fields() {
        let parsed: CheckinResponse =
            serde_json::from_str(r#"{"success":false,"reason":"no_match"}"#).expect("parse");
        assert!(!parsed.success);
        assert_eq!(parsed.reason.as_deref(), Some("no_match"));
        assert!(parsed.message.is_none());
        assert!(parsed.user_id.is_none());
    }

    #[test]
    fn checkin_request_serializes_wire_field_names() {
        let request = CheckinRequest {
            image_b64: "data:image/jpeg;base64,xxxx".to_string(),
            station: "Ben Thanh".to_string(),
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["image_b64"], "data:image/jpeg;base64,xxxx");
        assert_eq!(json["station"], "Ben Thanh");
    }
}
