use std::sync::Arc;

use log::{info, warn};

use crate::error::{ReportError, Result};
use crate::llm::client::TextGenerator;
use crate::llm::parser::parse_single_section;
use crate::llm::prompts::build_regeneration_prompt;
use crate::llm::types::GenerationRequest;
use crate::report::{replace_section, GeneratedSection};
use crate::sections::{section_definition, NARRATIVE_TEMPERATURE, REGENERATION_MAX_TOKENS};
use crate::stores::{ReportSettings, ReportStore};

/// Re-runs the narrative step for one section and splices the result back
/// into the persisted list by id. Full extraction is bypassed; no
/// cross-section context is sent.
pub struct SectionRegenerator {
    generator: Arc<dyn TextGenerator>,
    reports: Arc<dyn ReportStore>,
}

impl SectionRegenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, reports: Arc<dyn ReportStore>) -> Self {
        Self { generator, reports }
    }

    pub async fn regenerate_section(
        &self,
        report_id: &str,
        section_id: &str,
        feedback: &str,
        settings: &ReportSettings,
    ) -> Result<GeneratedSection> {
        let report = self.reports.load(report_id).await?;
        let version = report.version;

        let current = report
            .generated_sections
            .iter()
            .find(|s| s.id == section_id)
            .cloned()
            .ok_or_else(|| ReportError::UnknownSection(section_id.to_string()))?;
        let definition = section_definition(section_id)
            .ok_or_else(|| ReportError::UnknownSection(section_id.to_string()))?;

        info!("regenerating section {} of report {}", section_id, report_id);

        let request = GenerationRequest {
            prompt: build_regeneration_prompt(definition, &current, feedback, settings)?,
            max_tokens: REGENERATION_MAX_TOKENS,
            temperature: NARRATIVE_TEMPERATURE,
        };
        let outcome = self.generator.generate(&request).await?;

        let replacement = match parse_single_section(&outcome.content) {
            Ok(mut section) => {
                // The splice is keyed by id; the model does not get to move
                // the section.
                section.id = current.id.clone();
                section
            }
            Err(err) => {
                // Safe no-op: a bad rewrite must not corrupt the report.
                warn!(
                    "regeneration output for section {} unusable ({}); keeping existing content",
                    section_id, err
                );
                return Ok(current);
            }
        };

        let mut sections = report.generated_sections;
        replace_section(&mut sections, replacement.clone());
        self.reports
            .swap_sections(report_id, version, sections)
            .await?;

        Ok(replacement)
    }
}
