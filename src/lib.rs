//! # Investor Report Builder
//!
//! A library for turning raw property-financial documents (operating
//! statements, rent rolls, budgets) into a validated, structured, narrative
//! investor report via a two-stage LLM pipeline.
//!
//! ## Core Concepts
//!
//! - **Extraction (Call 1)**: a deterministic, temperature-zero call that
//!   pulls a typed tree of nullable financial figures out of the documents.
//!   Missing values stay null - the schema has no default-zero fallback.
//! - **Validation**: a pure, idempotent pass that reconciles NOI, clamps
//!   occupancy, strips below-NOI line items and decides which sections the
//!   source data cannot support.
//! - **Narrative (Call 2)**: a tiered synthesis call, optionally streamed
//!   to the caller as server-sent events, producing one independently
//!   regeneratable section per catalog entry.
//! - **Regeneration**: re-runs the narrative step for a single section and
//!   splices it back into the persisted list by id, guarded by a
//!   compare-and-swap version check.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use investor_report_builder::*;
//!
//! let generator = Arc::new(GeminiClient::new(api_key, "gemini-2.5-pro"));
//! let documents = Arc::new(MemoryDocumentStore::new());
//! let reports = Arc::new(MemoryReportStore::new());
//!
//! let pipeline = ReportPipeline::new(generator, documents, reports);
//! let report = pipeline.run("report-1", &settings, None).await?;
//! ```

pub mod error;
pub mod llm;
pub mod pipeline;
pub mod regenerate;
pub mod report;
pub mod schema;
pub mod sections;
pub mod stores;
pub mod validation;

pub use error::{ReportError, Result};
pub use llm::client::{GeminiClient, TextGenerator};
pub use llm::parser::{parse_extraction, parse_sections, parse_single_section};
pub use llm::prompts::{
    build_extraction_prompt, build_narrative_prompt, build_regeneration_prompt,
};
pub use llm::types::{
    sse_frame, GenerationOutcome, GenerationRequest, Prompt, StreamEvent, TokenUsage,
};
pub use pipeline::{reap_stale_generations, ReportPipeline};
pub use regenerate::SectionRegenerator;
pub use report::*;
pub use schema::*;
pub use sections::*;
pub use stores::*;
pub use validation::{validate, SectionSkip, ValidationResult};
