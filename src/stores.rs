use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};
use crate::report::{GeneratedSection, GenerationConfig, GenerationState, PersistedReport};
use crate::sections::ReportTier;

/// Declared type of an uploaded file. The out-of-scope upload path parses
/// raw bytes into plain text per file; the pipeline only ever sees text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    T12,
    RentRoll,
    LeasingActivity,
    Budget,
    Additional,
}

impl FileKind {
    pub fn label(&self) -> &'static str {
        match self {
            FileKind::T12 => "T-12 operating statement",
            FileKind::RentRoll => "rent roll",
            FileKind::LeasingActivity => "leasing activity report",
            FileKind::Budget => "budget",
            FileKind::Additional => "additional document",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub kind: FileKind,
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorNote {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandColors {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
}

impl Default for BrandColors {
    fn default() -> Self {
        Self {
            primary: "#1a3a5c".to_string(),
            secondary: "#4a7ba6".to_string(),
            accent: "#c9a227".to_string(),
        }
    }
}

/// Everything the settings collaborator supplies for one report run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    pub tier: ReportTier,
    pub property_name: String,

    #[serde(default)]
    pub property_address: Option<String>,

    #[serde(default)]
    pub unit_count: Option<u32>,

    #[serde(default)]
    pub brand_colors: BrandColors,

    #[serde(default)]
    pub investment_strategy: Option<String>,

    #[serde(default)]
    pub operator_notes: Vec<OperatorNote>,
}

/// Read-only document collaborator.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch_documents(&self, report_id: &str) -> Result<Vec<SourceDocument>>;
}

/// Persistence collaborator. Status writes are atomic per transition and
/// validated against the state machine; section-list writes bump `version`
/// and regeneration must present the version it read (compare-and-swap).
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn load(&self, report_id: &str) -> Result<PersistedReport>;

    /// Persist a state transition. Entering `Extracting` stamps
    /// `generation_started_at`; an illegal transition is rejected.
    async fn save_status(&self, report_id: &str, status: GenerationState) -> Result<()>;

    /// Persist the finished section list, config and completion timestamp,
    /// transitioning `Parsing -> Completed`.
    async fn save_completed(
        &self,
        report_id: &str,
        sections: Vec<GeneratedSection>,
        config: GenerationConfig,
    ) -> Result<()>;

    /// Replace the section list if and only if the stored version still
    /// matches `expected_version`. Returns the new version.
    async fn swap_sections(
        &self,
        report_id: &str,
        expected_version: u64,
        sections: Vec<GeneratedSection>,
    ) -> Result<u64>;

    /// Reports currently in a non-terminal generating state, with the time
    /// generation started. Used by the stale-generation watchdog.
    async fn list_generating(&self) -> Result<Vec<(String, DateTime<Utc>)>>;
}

/// In-memory document store, used by tests and local tooling.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, Vec<SourceDocument>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, report_id: impl Into<String>, documents: Vec<SourceDocument>) {
        self.documents
            .lock()
            .expect("document store lock poisoned")
            .insert(report_id.into(), documents);
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn fetch_documents(&self, report_id: &str) -> Result<Vec<SourceDocument>> {
        self.documents
            .lock()
            .expect("document store lock poisoned")
            .get(report_id)
            .cloned()
            .ok_or_else(|| ReportError::UnknownReport(report_id.to_string()))
    }
}

/// In-memory report store with the same atomicity guarantees the real
/// persistence collaborator is expected to provide.
#[derive(Default)]
pub struct MemoryReportStore {
    reports: Mutex<HashMap<String, PersistedReport>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn load(&self, report_id: &str) -> Result<PersistedReport> {
        self.reports
            .lock()
            .expect("report store lock poisoned")
            .get(report_id)
            .cloned()
            .ok_or_else(|| ReportError::UnknownReport(report_id.to_string()))
    }

    async fn save_status(&self, report_id: &str, status: GenerationState) -> Result<()> {
        let mut reports = self.reports.lock().expect("report store lock poisoned");
        let report = reports.entry(report_id.to_string()).or_default();

        report.generation_status = report.generation_status.transition(status)?;
        if status == GenerationState::Extracting {
            report.generation_started_at = Some(Utc::now());
            report.generation_completed_at = None;
        }
        Ok(())
    }

    async fn save_completed(
        &self,
        report_id: &str,
        sections: Vec<GeneratedSection>,
        config: GenerationConfig,
    ) -> Result<()> {
        let mut reports = self.reports.lock().expect("report store lock poisoned");
        let report = reports
            .get_mut(report_id)
            .ok_or_else(|| ReportError::UnknownReport(report_id.to_string()))?;

        report.generation_status = report
            .generation_status
            .transition(GenerationState::Completed)?;
        report.generation_completed_at = Some(Utc::now());
        report.generated_sections = sections;
        report.generation_config = Some(config);
        report.version += 1;
        Ok(())
    }

    async fn swap_sections(
        &self,
        report_id: &str,
        expected_version: u64,
        sections: Vec<GeneratedSection>,
    ) -> Result<u64> {
        let mut reports = self.reports.lock().expect("report store lock poisoned");
        let report = reports
            .get_mut(report_id)
            .ok_or_else(|| ReportError::UnknownReport(report_id.to_string()))?;

        if report.version != expected_version {
            return Err(ReportError::VersionConflict {
                expected: expected_version,
                actual: report.version,
            });
        }

        report.generated_sections = sections;
        report.version += 1;
        Ok(report.version)
    }

    async fn list_generating(&self) -> Result<Vec<(String, DateTime<Utc>)>> {
        let reports = self.reports.lock().expect("report store lock poisoned");
        Ok(reports
            .iter()
            .filter(|(_, r)| {
                !r.generation_status.is_terminal() && r.generation_status != GenerationState::Idle
            })
            .filter_map(|(id, r)| r.generation_started_at.map(|at| (id.clone(), at)))
            .collect())
    }
}
