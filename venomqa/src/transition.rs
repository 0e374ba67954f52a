//! Transition: an immutable `from-state -> action -> to-state` record.

use crate::action::ActionResult;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Transition {
    pub id: String,
    pub from_state_id: String,
    pub action_name: String,
    pub to_state_id: String,
    pub result: ActionResult,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub duration_ms: Option<f64>,
}

impl Transition {
    pub fn new(
        from_state_id: impl Into<String>,
        action_name: impl Into<String>,
        to_state_id: impl Into<String>,
        result: ActionResult,
    ) -> Self {
        let duration_ms = Some(result.duration_ms);
        Self {
            id: format!("t_{:.12}", uuid::Uuid::new_v4().simple().to_string()),
            from_state_id: from_state_id.into(),
            action_name: action_name.into(),
            to_state_id: to_state_id.into(),
            result,
            timestamp: chrono::Utc::now(),
            duration_ms,
        }
    }
}
