use std::sync::Arc;

use chrono::{Duration, Utc};
use log::{debug, info, warn};
use tokio::sync::mpsc::Sender;

use crate::error::{ReportError, Result};
use crate::llm::client::TextGenerator;
use crate::llm::parser::{parse_extraction, parse_sections};
use crate::llm::prompts::{build_extraction_prompt, build_narrative_prompt};
use crate::llm::types::{GenerationRequest, StreamEvent};
use crate::report::{GeneratedSection, GenerationConfig, GenerationState, PersistedReport};
use crate::sections::{
    self, section_definition, sections_for_tier, EXTRACTION_MAX_TOKENS, EXTRACTION_TEMPERATURE,
    NARRATIVE_TEMPERATURE,
};
use crate::stores::{DocumentStore, FileKind, ReportSettings, ReportStore};
use crate::validation::{validate, SectionSkip};

/// Sequences one report generation run: fetch documents, extract, validate,
/// narrate (optionally streamed), parse, persist. Owns no cross-request
/// state; every run is independently reproducible from its inputs.
pub struct ReportPipeline {
    generator: Arc<dyn TextGenerator>,
    documents: Arc<dyn DocumentStore>,
    reports: Arc<dyn ReportStore>,
}

impl ReportPipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        documents: Arc<dyn DocumentStore>,
        reports: Arc<dyn ReportStore>,
    ) -> Self {
        Self {
            generator,
            documents,
            reports,
        }
    }

    /// Run the full pipeline for one report. When `stream` is provided the
    /// narrative call streams and its events are re-emitted on the channel;
    /// the caller encodes them as SSE frames for the UI.
    pub async fn run(
        &self,
        report_id: &str,
        settings: &ReportSettings,
        stream: Option<Sender<StreamEvent>>,
    ) -> Result<PersistedReport> {
        match self.run_inner(report_id, settings, stream.as_ref()).await {
            Ok(report) => Ok(report),
            Err(err) => {
                if let Some(events) = &stream {
                    let _ = events
                        .send(StreamEvent::Error {
                            message: err.to_string(),
                        })
                        .await;
                }
                // Leave an inspectable error state behind; the original
                // failure still propagates even if this write fails too.
                if let Err(save_err) = self
                    .reports
                    .save_status(report_id, GenerationState::Error)
                    .await
                {
                    warn!(
                        "could not persist error status for report {}: {}",
                        report_id, save_err
                    );
                }
                Err(err)
            }
        }
    }

    async fn run_inner(
        &self,
        report_id: &str,
        settings: &ReportSettings,
        stream: Option<&Sender<StreamEvent>>,
    ) -> Result<PersistedReport> {
        info!(
            "starting report generation for {} at {} tier",
            report_id, settings.tier
        );

        self.reports
            .save_status(report_id, GenerationState::Extracting)
            .await?;

        let documents = self.documents.fetch_documents(report_id).await?;
        if !documents.iter().any(|d| d.kind == FileKind::T12) {
            // Halt before any generation cost is incurred.
            return Err(ReportError::MissingT12);
        }

        let extraction_request = GenerationRequest {
            prompt: build_extraction_prompt(&documents)?,
            max_tokens: EXTRACTION_MAX_TOKENS,
            temperature: EXTRACTION_TEMPERATURE,
        };
        let extraction = self.generator.generate(&extraction_request).await?;
        let extracted = parse_extraction(&extraction.content)?;

        self.reports
            .save_status(report_id, GenerationState::Validating)
            .await?;

        let catalog = sections_for_tier(settings.tier);
        let validation = validate(&extracted, &catalog);
        for warning in &validation.warnings {
            warn!("validation [{}]: {}", report_id, warning);
        }
        if !validation.valid {
            // The only hard validation failure is a missing operating
            // statement; short-circuit before the narrative call.
            return Err(ReportError::MissingT12);
        }

        self.reports
            .save_status(report_id, GenerationState::Narrating)
            .await?;

        let narrative_request = GenerationRequest {
            prompt: build_narrative_prompt(
                &validation.corrected,
                &validation.sections_to_skip,
                &documents,
                settings,
            )?,
            max_tokens: sections::narrative_token_budget(settings.tier),
            temperature: NARRATIVE_TEMPERATURE,
        };
        let narrative = match stream {
            Some(events) => {
                self.generator
                    .generate_stream(&narrative_request, events.clone())
                    .await?
            }
            None => self.generator.generate(&narrative_request).await?,
        };
        debug!(
            "narrative call finished: {} input tokens, {} output tokens",
            narrative.usage.input_tokens, narrative.usage.output_tokens
        );

        self.reports
            .save_status(report_id, GenerationState::Parsing)
            .await?;

        let mut generated = parse_sections(&narrative.content)?;
        enforce_skips(&mut generated, &validation.sections_to_skip);

        let config = GenerationConfig {
            tier: settings.tier,
            model: self.generator.model().to_string(),
            input_tokens: extraction.usage.input_tokens + narrative.usage.input_tokens,
            output_tokens: extraction.usage.output_tokens + narrative.usage.output_tokens,
        };
        self.reports
            .save_completed(report_id, generated, config)
            .await?;

        info!("report {} completed", report_id);
        self.reports.load(report_id).await
    }
}

/// The validator's skip decisions win over whatever the model produced: a
/// skipped section is forced to `included=false` with the recorded reason,
/// and a section the model dropped entirely is restored as a skipped stub.
fn enforce_skips(sections: &mut Vec<GeneratedSection>, skips: &[SectionSkip]) {
    for skip in skips {
        match sections.iter_mut().find(|s| s.id == skip.section_id) {
            Some(section) => {
                if section.included {
                    section.included = false;
                    section.skip_reason = Some(skip.reason.clone());
                    section.content.clear();
                }
            }
            None => {
                let title = section_definition(&skip.section_id)
                    .map(|d| d.title.to_string())
                    .unwrap_or_else(|| skip.section_id.clone());
                sections.push(GeneratedSection {
                    id: skip.section_id.clone(),
                    title,
                    content: String::new(),
                    metrics: Vec::new(),
                    included: false,
                    skip_reason: Some(skip.reason.clone()),
                });
            }
        }
    }
}

/// Watchdog for runs that died without reaching a terminal state (a
/// cancelled stream leaves `generation_status` mid-pipeline). Any report
/// generating for longer than `max_age` is transitioned to `Error`, from
/// which a retried run can cleanly supersede it.
pub async fn reap_stale_generations(
    store: &dyn ReportStore,
    max_age: Duration,
) -> Result<Vec<String>> {
    let now = Utc::now();
    let mut reaped = Vec::new();

    for (report_id, started_at) in store.list_generating().await? {
        if now.signed_duration_since(started_at) > max_age {
            warn!(
                "report {} stuck in a generating state since {}; marking as error",
                report_id, started_at
            );
            store
                .save_status(&report_id, GenerationState::Error)
                .await?;
            reaped.push(report_id);
        }
    }

    Ok(reaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, included: bool) -> GeneratedSection {
        GeneratedSection {
            id: id.to_string(),
            title: id.to_string(),
            content: "body".to_string(),
            metrics: Vec::new(),
            included,
            skip_reason: None,
        }
    }

    #[test]
    fn test_enforce_skips_overrides_model_output() {
        let mut sections = vec![
            section("executive_summary", true),
            section("rent_roll_insights", true),
        ];
        let skips = vec![SectionSkip {
            section_id: "rent_roll_insights".to_string(),
            reason: "no rent roll".to_string(),
        }];

        enforce_skips(&mut sections, &skips);

        assert!(sections[0].included);
        assert!(!sections[1].included);
        assert_eq!(sections[1].skip_reason.as_deref(), Some("no rent roll"));
        assert!(sections[1].content.is_empty());
    }

    #[test]
    fn test_enforce_skips_restores_dropped_section() {
        let mut sections = vec![section("executive_summary", true)];
        let skips = vec![SectionSkip {
            section_id: "budget_variance".to_string(),
            reason: "no budget".to_string(),
        }];

        enforce_skips(&mut sections, &skips);

        assert_eq!(sections.len(), 2);
        let stub = &sections[1];
        assert_eq!(stub.id, "budget_variance");
        assert_eq!(stub.title, "Budget Variance");
        assert!(!stub.included);
    }

    #[test]
    fn test_enforce_skips_respects_model_self_skip() {
        // The model already skipped it with its own reason; keep that.
        let mut sections = vec![GeneratedSection {
            skip_reason: Some("model reason".to_string()),
            included: false,
            ..section("leasing_activity", false)
        }];
        let skips = vec![SectionSkip {
            section_id: "leasing_activity".to_string(),
            reason: "validator reason".to_string(),
        }];

        enforce_skips(&mut sections, &skips);
        assert_eq!(sections[0].skip_reason.as_deref(), Some("model reason"));
    }
}
