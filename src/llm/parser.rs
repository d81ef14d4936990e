use log::warn;
use serde::Deserialize;

use crate::error::{ReportError, Result};
use crate::report::GeneratedSection;
use crate::schema::ExtractedFinancialData;

#[derive(Deserialize)]
struct SectionEnvelope {
    sections: Vec<GeneratedSection>,
}

/// Interior of the first fenced code block, if any. The info string
/// (```json etc.) is skipped.
fn extract_fenced(raw: &str) -> Option<&str> {
    let start = raw.find("```")?;
    let after = &raw[start + 3..];
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// First balanced `{...}` span, tracking strings and escapes so braces
/// inside JSON string values do not throw off the depth count.
fn extract_braced(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in raw[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Locate the JSON object inside a free-form model response: fenced block
/// interior first, then brace matching on that (or on the raw text when
/// there is no fence).
pub fn extract_json_span(raw: &str) -> Option<&str> {
    let candidate = extract_fenced(raw).unwrap_or(raw);
    extract_braced(candidate)
}

fn catch_all_section(raw: &str) -> GeneratedSection {
    GeneratedSection {
        id: "executive_summary".to_string(),
        title: "Executive Summary".to_string(),
        content: raw.trim().to_string(),
        metrics: Vec::new(),
        included: true,
        skip_reason: None,
    }
}

/// Parse the narrative response into a section list.
///
/// Two failure modes, handled differently:
/// - the response contains no JSON at all: the reader still gets the text,
///   as a single catch-all executive summary (availability over strictness);
/// - the response is JSON but not a section list: that is a real contract
///   violation and surfaces as [`ReportError::MalformedSections`].
pub fn parse_sections(raw: &str) -> Result<Vec<GeneratedSection>> {
    let Some(span) = extract_json_span(raw) else {
        warn!("narrative response contained no JSON; returning it as a single section");
        return Ok(vec![catch_all_section(raw)]);
    };

    let value: serde_json::Value = match serde_json::from_str(span) {
        Ok(value) => value,
        Err(err) => {
            warn!(
                "narrative response looked like JSON but did not parse ({}); returning it \
                 as a single section",
                err
            );
            return Ok(vec![catch_all_section(raw)]);
        }
    };

    let envelope: SectionEnvelope = serde_json::from_value(value)
        .map_err(|err| ReportError::MalformedSections(err.to_string()))?;

    if envelope.sections.is_empty() {
        return Err(ReportError::MalformedSections(
            "sections array is empty".to_string(),
        ));
    }

    Ok(envelope.sections)
}

/// Parse a regeneration response: a single section object, with a
/// 1-element `sections` wrapper tolerated.
pub fn parse_single_section(raw: &str) -> Result<GeneratedSection> {
    let span = extract_json_span(raw).ok_or_else(|| {
        ReportError::MalformedSections("no JSON object in regeneration response".to_string())
    })?;

    let value: serde_json::Value = serde_json::from_str(span)
        .map_err(|err| ReportError::MalformedSections(err.to_string()))?;

    if value.get("sections").is_some() {
        let envelope: SectionEnvelope = serde_json::from_value(value)
            .map_err(|err| ReportError::MalformedSections(err.to_string()))?;
        return envelope.sections.into_iter().next().ok_or_else(|| {
            ReportError::MalformedSections("sections array is empty".to_string())
        });
    }

    serde_json::from_value(value).map_err(|err| ReportError::MalformedSections(err.to_string()))
}

/// Parse the extraction response. Call 1 is strict: there is no meaningful
/// fallback for structured data, so any failure is an extraction failure.
pub fn parse_extraction(raw: &str) -> Result<ExtractedFinancialData> {
    let span = extract_json_span(raw).ok_or_else(|| {
        ReportError::ExtractionFailed("no JSON object in extraction response".to_string())
    })?;

    serde_json::from_str(span)
        .map_err(|err| ReportError::ExtractionFailed(format!("extraction JSON invalid: {}", err)))
}
