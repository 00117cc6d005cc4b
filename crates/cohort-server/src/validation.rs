//! Inbound request validation.
//!
//! Requests are rejected here before any session state is created.

use serde::Deserialize;

use crate::errors::ApiError;

/// One prior conversation turn supplied by the client.
#[derive(Clone, Debug, Deserialize)]
pub struct InboundMessage {
    /// `user` or `assistant`.
    pub role: String,
    /// Plain text content.
    pub content: String,
}

/// The conversational turn request body.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    /// Prior turns, for clients that keep history locally.
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
    /// The user's query for this turn.
    pub query: String,
    /// Resume an existing session. Absent creates a new one.
    pub session_id: Option<String>,
    /// Initiating user. Absent falls back to `anonymous`.
    pub user_id: Option<String>,
}

/// Validate a turn request before any session work begins.
pub fn validate_turn_request(request: &TurnRequest) -> Result<(), ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::Validation("query is required".into()));
    }
    for message in &request.messages {
        match message.role.as_str() {
            "user" | "assistant" => {}
            other => {
                return Err(ApiError::Validation(format!(
                    "invalid message role: {other}"
                )));
            }
        }
    }
    if let Some(session_id) = &request.session_id {
        if session_id.trim().is_empty() {
            return Err(ApiError::Validation("sessionId must not be empty".into()));
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn request(query: &str) -> TurnRequest {
        TurnRequest {
            messages: Vec::new(),
            query: query.into(),
            session_id: None,
            user_id: None,
        }
    }

    #[test]
    fn valid_request_passes() {
        validate_turn_request(&request("find recent shoppers")).unwrap();
    }

    #[test]
    fn blank_query_rejected() {
        let err = validate_turn_request(&request("   ")).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn bad_role_rejected() {
        let mut req = request("ok");
        req.messages.push(InboundMessage {
            role: "system".into(),
            content: "sneaky".into(),
        });
        let err = validate_turn_request(&req).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn empty_session_id_rejected() {
        let mut req = request("ok");
        req.session_id = Some(String::new());
        let err = validate_turn_request(&req).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
