//! Generation task lifecycle and request validation.
//!
//! [`TaskStatus`] is the state machine shared by the worker (the only
//! writer) and the relay (a reader):
//!
//! ```text
//! queued --(worker starts)--> running --(success)--> completed [terminal]
//!                                     \--(failure)--> failed    [terminal]
//! ```
//!
//! [`GenerationRequest`] is the payload accepted by the enqueuer. It is
//! parsed and validated before any record exists, so a rejected request
//! leaves no partial state behind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum length of the natural-language `spec` field.
pub const MAX_SPEC_LEN: usize = 8_000;
/// Maximum length of the `language` / `framework` hints.
pub const MAX_HINT_LEN: usize = 64;
/// Maximum number of requested features.
pub const MAX_FEATURES: usize = 32;
/// Maximum length of a single feature name.
pub const MAX_FEATURE_LEN: usize = 128;
/// Maximum length of source code submitted for explain/debug.
pub const MAX_CODE_LEN: usize = 100_000;

// `validator` length bounds are `u64`; mirror the limits above for the derive.
const VALIDATE_MAX_SPEC_LEN: u64 = MAX_SPEC_LEN as u64;
const VALIDATE_MAX_HINT_LEN: u64 = MAX_HINT_LEN as u64;
const VALIDATE_MAX_FEATURES: u64 = MAX_FEATURES as u64;
const VALIDATE_MAX_CODE_LEN: u64 = MAX_CODE_LEN as u64;

// ---------------------------------------------------------------------------
// Task status
// ---------------------------------------------------------------------------

/// Lifecycle status of a generation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Queued,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ];

    /// Wire representation (`"queued"`, `"running"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// `completed` and `failed` are terminal: no further transitions occur.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Queued, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid task status '{s}'. Must be one of: queued, running, completed, failed"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Generation request
// ---------------------------------------------------------------------------

/// What the worker should ask the model to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    /// Code from a natural-language description.
    Generate,
    /// A complete multi-file project scaffold.
    Project,
    /// An explanation of supplied code.
    Explain,
    /// A diagnosis and fix for supplied code.
    Debug,
}

impl GenerationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationKind::Generate => "generate",
            GenerationKind::Project => "project",
            GenerationKind::Explain => "explain",
            GenerationKind::Debug => "debug",
        }
    }

    /// Explain and debug operate on existing code.
    pub fn requires_code(self) -> bool {
        matches!(self, GenerationKind::Explain | GenerationKind::Debug)
    }
}

/// Payload accepted by `POST /generation/tasks`.
///
/// ```json
/// { "type": "generate", "spec": "hello world app", "language": "python" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GenerationRequest {
    #[serde(rename = "type")]
    pub kind: GenerationKind,

    #[validate(length(min = 1, max = VALIDATE_MAX_SPEC_LEN))]
    pub spec: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = VALIDATE_MAX_HINT_LEN))]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = VALIDATE_MAX_HINT_LEN))]
    pub framework: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(length(max = VALIDATE_MAX_FEATURES))]
    pub features: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = VALIDATE_MAX_CODE_LEN))]
    pub code: Option<String>,
}

impl GenerationRequest {
    /// Build a minimal request of the given kind.
    pub fn new(kind: GenerationKind, spec: impl Into<String>) -> Self {
        Self {
            kind,
            spec: spec.into(),
            language: None,
            framework: None,
            features: Vec::new(),
            code: None,
        }
    }

    /// Parse and validate a raw request body.
    pub fn parse(body: &[u8]) -> Result<Self, CoreError> {
        let request: GenerationRequest = serde_json::from_slice(body)
            .map_err(|e| CoreError::Validation(format!("Malformed generation request: {e}")))?;
        request.validate_request()?;
        Ok(request)
    }

    /// Rehydrate a previously persisted request.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, CoreError> {
        let request = GenerationRequest::deserialize(value)
            .map_err(|e| CoreError::Validation(format!("Malformed generation request: {e}")))?;
        request.validate_request()?;
        Ok(request)
    }

    /// Serialize for persistence.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Run field-level and cross-field validation.
    pub fn validate_request(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(format!("Invalid generation request: {e}")))?;

        if self.spec.trim().is_empty() {
            return Err(CoreError::Validation("spec must not be blank".to_string()));
        }

        for feature in &self.features {
            validate_feature(feature)?;
        }

        match (&self.code, self.kind.requires_code()) {
            (None, true) => Err(CoreError::Validation(format!(
                "'{}' requests must include code",
                self.kind.as_str()
            ))),
            (Some(code), true) if code.trim().is_empty() => Err(CoreError::Validation(
                "code must not be blank".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Validate a single feature name: non-blank and within length limit.
fn validate_feature(feature: &str) -> Result<(), CoreError> {
    if feature.trim().is_empty() {
        return Err(CoreError::Validation(
            "Feature names must not be empty".to_string(),
        ));
    }
    let chars = feature.chars().count();
    if chars > MAX_FEATURE_LEN {
        return Err(CoreError::Validation(format!(
            "Feature name too long: {chars} chars (max {MAX_FEATURE_LEN})"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    // --- Status ---

    #[test]
    fn only_forward_transitions_are_allowed() {
        use TaskStatus::*;

        assert!(Queued.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));

        assert!(!Queued.can_transition_to(Completed));
        assert!(!Queued.can_transition_to(Failed));
        assert!(!Running.can_transition_to(Queued));
        assert!(!Running.can_transition_to(Running));
    }

    #[test]
    fn terminal_states_never_transition() {
        for terminal in [TaskStatus::Completed, TaskStatus::Failed] {
            assert!(terminal.is_terminal());
            for next in TaskStatus::ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    #[test]
    fn status_parses_from_wire_name() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert_matches!("done".parse::<TaskStatus>(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&TaskStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }

    // --- Request parsing ---

    #[test]
    fn parses_minimal_generate_request() {
        let req = GenerationRequest::parse(br#"{"type":"generate","spec":"hello world app"}"#)
            .unwrap();
        assert_eq!(req.kind, GenerationKind::Generate);
        assert_eq!(req.spec, "hello world app");
        assert!(req.features.is_empty());
    }

    #[test]
    fn rejects_malformed_json() {
        let err = GenerationRequest::parse(b"{not json").unwrap_err();
        assert!(err.to_string().contains("Malformed generation request"));
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = GenerationRequest::parse(br#"{"type":"compile","spec":"x"}"#).unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[test]
    fn rejects_unknown_fields() {
        let err =
            GenerationRequest::parse(br#"{"type":"generate","spec":"x","priority":3}"#).unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[test]
    fn rejects_blank_spec() {
        let err = GenerationRequest::parse(br#"{"type":"generate","spec":"   "}"#).unwrap_err();
        assert!(err.to_string().contains("blank"));

        let err = GenerationRequest::parse(br#"{"type":"generate","spec":""}"#).unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[test]
    fn rejects_oversized_spec() {
        let body = serde_json::json!({"type": "generate", "spec": "x".repeat(MAX_SPEC_LEN + 1)});
        let err = GenerationRequest::parse(body.to_string().as_bytes()).unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[test]
    fn explain_requires_code() {
        let err = GenerationRequest::parse(br#"{"type":"explain","spec":"what does it do"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("must include code"));

        let ok = GenerationRequest::parse(
            br#"{"type":"explain","spec":"what does it do","code":"print(1)"}"#,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn rejects_too_many_features() {
        let mut req = GenerationRequest::new(GenerationKind::Project, "todo app");
        req.features = (0..=MAX_FEATURES).map(|i| format!("f{i}")).collect();
        assert_matches!(req.validate_request(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn rejects_empty_feature_name() {
        let mut req = GenerationRequest::new(GenerationKind::Project, "todo app");
        req.features = vec!["auth".into(), " ".into()];
        let err = req.validate_request().unwrap_err();
        assert!(err.to_string().contains("Feature names"));
    }

    #[test]
    fn feature_length_counts_characters() {
        let mut req = GenerationRequest::new(GenerationKind::Project, "todo app");
        req.features = vec!["é".repeat(MAX_FEATURE_LEN)];
        assert!(req.validate_request().is_ok());

        req.features = vec!["é".repeat(MAX_FEATURE_LEN + 1)];
        let err = req.validate_request().unwrap_err();
        assert!(err.to_string().contains("129 chars"));
    }

    #[test]
    fn hint_and_code_limits_apply() {
        let mut req = GenerationRequest::new(GenerationKind::Generate, "cli tool");
        req.language = Some("r".repeat(MAX_HINT_LEN + 1));
        assert_matches!(req.validate_request(), Err(CoreError::Validation(_)));

        let mut req = GenerationRequest::new(GenerationKind::Debug, "why does it crash");
        req.code = Some("x".repeat(MAX_CODE_LEN + 1));
        assert_matches!(req.validate_request(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn persisted_value_rehydrates() {
        let mut req = GenerationRequest::new(GenerationKind::Project, "blog");
        req.framework = Some("axum".into());
        req.features = vec!["auth".into()];

        let value = req.to_value();
        assert_eq!(value["type"], "project");
        assert!(value.get("code").is_none());

        let back = GenerationRequest::from_value(&value).unwrap();
        assert_eq!(back, req);
    }
}
