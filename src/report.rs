use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};
use crate::sections::ReportTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDirection {
    Up,
    Down,
    Flat,
}

/// One KPI-style metric attached to a section. Field names follow the wire
/// shape the narrative model is instructed to emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionMetric {
    pub label: String,
    pub value: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_direction: Option<ChangeDirection>,

    #[serde(default, alias = "vsbudget", skip_serializing_if = "Option::is_none")]
    pub vs_budget: Option<String>,
}

/// The Call-2 output unit and the unit of persistence and regeneration.
/// Sections are keyed by `id`; position in the stored list is not identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSection {
    pub id: String,
    pub title: String,
    /// Markdown (with occasional inline HTML) narrative body.
    pub content: String,

    #[serde(default)]
    pub metrics: Vec<SectionMetric>,

    #[serde(default = "default_included")]
    pub included: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

fn default_included() -> bool {
    true
}

/// Replace a section in place by id match. Returns false if no section with
/// that id exists; the list is never reordered.
pub fn replace_section(sections: &mut [GeneratedSection], replacement: GeneratedSection) -> bool {
    match sections.iter_mut().find(|s| s.id == replacement.id) {
        Some(slot) => {
            *slot = replacement;
            true
        }
        None => false,
    }
}

/// Generation lifecycle. Strictly sequential; the only conditional branch is
/// into `Error`, reachable from any non-terminal state (validation failure,
/// stream failure, watchdog reaping). A terminal state can only be left by
/// restarting the run from the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    Idle,
    Extracting,
    Validating,
    Narrating,
    Parsing,
    Completed,
    Error,
}

impl GenerationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationState::Idle => "idle",
            GenerationState::Extracting => "extracting",
            GenerationState::Validating => "validating",
            GenerationState::Narrating => "narrating",
            GenerationState::Parsing => "parsing",
            GenerationState::Completed => "completed",
            GenerationState::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationState::Completed | GenerationState::Error)
    }

    pub fn can_transition(self, next: GenerationState) -> bool {
        use GenerationState::*;
        match (self, next) {
            (Idle, Extracting) => true,
            (Extracting, Validating) => true,
            (Validating, Narrating) => true,
            (Narrating, Parsing) => true,
            (Parsing, Completed) => true,
            // A finished or failed run can be superseded by a fresh one.
            (Completed, Extracting) | (Error, Extracting) => true,
            (from, Error) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn transition(self, next: GenerationState) -> Result<GenerationState> {
        if self.can_transition(next) {
            Ok(next)
        } else {
            Err(ReportError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub tier: ReportTier,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The only state handed back to the caller's store: the section list plus
/// the generation bookkeeping around it. `version` guards the section list
/// against stale concurrent writes (compare-and-swap on write).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedReport {
    pub generation_status: GenerationState,

    #[serde(default)]
    pub generation_started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub generation_completed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub generated_sections: Vec<GeneratedSection>,

    #[serde(default)]
    pub generation_config: Option<GenerationConfig>,

    #[serde(default)]
    pub version: u64,
}

impl Default for PersistedReport {
    fn default() -> Self {
        Self {
            generation_status: GenerationState::Idle,
            generation_started_at: None,
            generation_completed_at: None,
            generated_sections: Vec::new(),
            generation_config: None,
            version: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, content: &str) -> GeneratedSection {
        GeneratedSection {
            id: id.to_string(),
            title: id.to_string(),
            content: content.to_string(),
            metrics: Vec::new(),
            included: true,
            skip_reason: None,
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        use GenerationState::*;
        let mut state = Idle;
        for next in [Extracting, Validating, Narrating, Parsing, Completed] {
            state = state.transition(next).unwrap();
        }
        assert_eq!(state, Completed);
    }

    #[test]
    fn test_no_skipping_ahead() {
        use GenerationState::*;
        assert!(Idle.transition(Narrating).is_err());
        assert!(Extracting.transition(Parsing).is_err());
        assert!(Narrating.transition(Completed).is_err());
    }

    #[test]
    fn test_error_reachable_from_non_terminal_only() {
        use GenerationState::*;
        for state in [Idle, Extracting, Validating, Narrating, Parsing] {
            assert!(state.can_transition(Error), "{state} should reach error");
        }
        assert!(!Completed.can_transition(Error));
        assert!(!Error.can_transition(Error));
    }

    #[test]
    fn test_terminal_states_restart_from_extracting() {
        use GenerationState::*;
        assert!(Error.can_transition(Extracting));
        assert!(Completed.can_transition(Extracting));
        assert!(!Error.can_transition(Validating));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&GenerationState::Narrating).unwrap();
        assert_eq!(json, "\"narrating\"");
    }

    #[test]
    fn test_replace_section_by_id_not_position() {
        let mut sections = vec![section("a", "one"), section("b", "two")];
        let replaced = replace_section(&mut sections, section("b", "rewritten"));

        assert!(replaced);
        assert_eq!(sections[0].content, "one");
        assert_eq!(sections[1].content, "rewritten");
        assert!(!replace_section(&mut sections, section("c", "nope")));
    }

    #[test]
    fn test_included_defaults_true_and_metric_aliases() {
        let parsed: GeneratedSection = serde_json::from_str(
            r#"{
                "id": "noi_analysis",
                "title": "NOI Analysis",
                "content": "NOI held flat.",
                "metrics": [
                    {"label": "NOI", "value": "$200,000", "vsbudget": "+2.0%"}
                ]
            }"#,
        )
        .unwrap();

        assert!(parsed.included);
        assert_eq!(parsed.metrics[0].vs_budget.as_deref(), Some("+2.0%"));

        // Round-trip uses the canonical camelCase spelling.
        let json = serde_json::to_string(&parsed).unwrap();
        assert!(json.contains("vsBudget"));
    }
}
