//! Request and response bodies
//!
//! Field names are camelCase on the wire. Request fields default to empty so
//! a missing field reaches validation instead of failing deserialization.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::intent::IntentAnalysis;
use crate::recommendation::Recommendation;
use crate::session::{Session, SessionState};

fn iso(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub user_task: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_id: String,
    pub message: String,
    pub iteration_count: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecommendRequest {
    pub session_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub session_id: String,
    pub user_feedback: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub should_continue: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<IntentAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration_count: Option<u32>,
    pub message: String,
}

/// `GET /api/session/{id}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub user_task: String,
    pub iteration_count: u32,
    pub recommendations: Vec<Recommendation>,
    pub conversation_history: String,
    pub state: SessionState,
    pub created_at: String,
}

impl From<Session> for SessionSnapshot {
    fn from(session: Session) -> Self {
        Self {
            created_at: iso(&session.created_at),
            session_id: session.id,
            user_task: session.user_task,
            iteration_count: session.iteration_count,
            recommendations: session.recommendations,
            conversation_history: session.conversation_log,
            state: session.state,
        }
    }
}

/// `GET /api/export/{sessionId}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    pub session_id: String,
    pub user_task: String,
    /// Last recommendation, or `{}` when there is none
    pub final_recommendation: serde_json::Value,
    pub all_recommendations: Vec<Recommendation>,
    pub conversation_history: String,
    pub iteration_count: u32,
    pub export_time: String,
}

impl SessionExport {
    pub fn new(session: Session, export_time: DateTime<Utc>) -> Self {
        let final_recommendation = session
            .final_recommendation()
            .and_then(|r| serde_json::to_value(r).ok())
            .unwrap_or_else(|| serde_json::json!({}));
        Self {
            session_id: session.id,
            user_task: session.user_task,
            final_recommendation,
            all_recommendations: session.recommendations,
            conversation_history: session.conversation_log,
            iteration_count: session.iteration_count,
            export_time: iso(&export_time),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSessionResponse {
    pub session_id: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_requests_tolerate_missing_fields() {
        let req: FeedbackRequest = serde_json::from_str(r#"{"sessionId": "1"}"#).unwrap();
        assert_eq!(req.session_id, "1");
        assert!(req.user_feedback.is_empty());

        let req: StartSessionRequest = serde_json::from_str("{}").unwrap();
        assert!(req.user_task.is_empty());
    }

    #[test]
    fn test_export_without_recommendations() {
        let session = Session::new("1", "task");
        let time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let value = serde_json::to_value(SessionExport::new(session, time)).unwrap();

        assert_eq!(value["finalRecommendation"], serde_json::json!({}));
        assert_eq!(value["allRecommendations"], serde_json::json!([]));
        assert_eq!(value["exportTime"], "2024-05-01T12:00:00.000Z");
    }

    #[test]
    fn test_feedback_response_omits_absent_fields() {
        let value = serde_json::to_value(FeedbackResponse {
            should_continue: false,
            analysis: None,
            iteration_count: None,
            message: "m".to_string(),
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({"shouldContinue": false, "message": "m"}));
    }
}
