use crate::error::Result;
use crate::llm::types::Prompt;
use crate::report::GeneratedSection;
use crate::schema::ExtractedFinancialData;
use crate::sections::{
    charts_for_section, section_length, sections_for_tier, SectionDefinition,
};
use crate::stores::{ReportSettings, SourceDocument};
use crate::validation::SectionSkip;

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"
You are a Property Financial Data Extraction Specialist.

## YOUR MISSION
Extract structured financial data from the attached property documents
(operating statements, rent rolls, budgets, leasing reports) into a single
JSON object matching the schema below.

## CRITICAL RULES - READ CAREFULLY

### 1. Null Means Missing
- Every numeric field is nullable. If a value is not explicitly stated in
  the documents, output null.
- NEVER output zero for a missing value. An absent number and an actual
  zero are different facts, and a fabricated zero poisons every downstream
  calculation.
- NEVER calculate values the documents do not state. The only exception is
  reading a clearly labeled total row.

### 2. What to Extract
- Income lines: gross potential rent, vacancy loss, loss to lease,
  concessions, bad debt, net rental income, other income, total revenue.
- Expense categories exactly as the statement breaks them down, with the
  statement's own labels.
- Net operating income (NOI).
- Occupancy counts and percentages.
- Leasing activity counts, if a leasing report is present.
- Unit-mix table, if a rent roll is present.
- The trailing twelve month series, if the T-12 presents monthly columns.

### 3. Stay Above the NOI Line
Operating expenses only.
- DO NOT extract: debt service, mortgage or loan payments, capital
  expenditures, reserves, distributions, or anything below NOI.
- These are excluded from analysis by policy, not by accident.

### 4. Columns
Each value is a triple: current period, prior period, budget.
- "prior" is whichever comparison column the statement presents
  (previous month or same month last year).
- "budget" is only populated from an actual budget document or a budget
  column on the statement.

### 5. Data Quality Flags
Set each data_quality flag to true ONLY if you actually found and used
that document type. These flags drive which report sections can be
generated, so an optimistic flag produces a broken report.

## OUTPUT FORMAT
Return ONLY the JSON object. No commentary, no code fences.
"#;

pub const NARRATIVE_SYSTEM_PROMPT: &str = r#"
You are an institutional real-estate analyst writing an investor report.

## NON-NEGOTIABLE DATA RULES
1. Use ONLY the numbers provided in the structured data and documents.
   Exact figures, never rounded guesses, never invented.
2. When a value is null, write "data not available" - do not estimate,
   do not interpolate, do not fill in typical market figures.
3. Never discuss debt service, capital expenditures, distributions, loan
   or mortgage payments, or anything else below the NOI line, unless the
   operator notes explicitly supply those figures.
4. Dollar figures keep their stated precision. Percentages to one decimal.

## OUTPUT FORMAT
Return a single JSON object:

{
  "sections": [
    {
      "id": "<section id exactly as given>",
      "title": "<section title exactly as given>",
      "content": "<markdown narrative>",
      "metrics": [
        {"label": "...", "value": "...", "change": "...",
         "changeDirection": "up|down|flat", "vsBudget": "..."}
      ],
      "included": true,
      "skipReason": null
    }
  ]
}

- Every section listed in the request MUST appear in the output, in the
  same order.
- A section you are told to skip, or whose required operator notes are
  absent, is emitted with "included": false, a short "skipReason", and
  empty "content".
- Sentence and paragraph bounds given per section are hard limits, not
  suggestions.
- Metrics carry headline figures only; 3 to 5 per included section.
- Return ONLY the JSON object. No commentary outside it.
"#;

pub const REGENERATION_SYSTEM_PROMPT: &str = r#"
You are an institutional real-estate analyst revising ONE section of an
investor report based on reader feedback.

## RULES
1. Rewrite only this section. You have no other sections and must not
   reference or invent them.
2. The data rules are unchanged: exact provided numbers only, "data not
   available" for nulls, nothing below the NOI line.
3. Apply the feedback faithfully; keep everything the feedback does not
   touch as close to the current version as the rewrite allows.
4. Respect the sentence and paragraph bounds given in the request.

## OUTPUT FORMAT
Return ONLY a single JSON object for the section - the same shape it
already has (id, title, content, metrics, included, skipReason). Not an
array, no wrapper, no commentary.
"#;

/// Assemble the extraction prompt. Deterministic: the system half embeds
/// the generated JSON Schema, the user half carries the document manifest
/// and each document's text.
pub fn build_extraction_prompt(documents: &[SourceDocument]) -> Result<Prompt> {
    let schema = ExtractedFinancialData::schema_as_json()?;
    let system = format!(
        "{}\n## OUTPUT SCHEMA\nThe JSON object must match this schema exactly:\n\n{}\n",
        EXTRACTION_SYSTEM_PROMPT, schema
    );

    let mut user = String::from("### DOCUMENT MANIFEST\n");
    for (i, doc) in documents.iter().enumerate() {
        user.push_str(&format!(
            "{}. [{}] \"{}\"\n",
            i + 1,
            doc.kind.label(),
            doc.name
        ));
    }
    user.push_str("\nExtract the financial data from the documents below.\n");

    for doc in documents {
        user.push_str(&format!(
            "\n===== BEGIN {} ({}) =====\n{}\n===== END {} =====\n",
            doc.name,
            doc.kind.label(),
            doc.text,
            doc.name
        ));
    }

    Ok(Prompt { system, user })
}

/// Assemble the narrative prompt from the corrected extraction, the
/// validator's skip list, the raw documents and the tier policy.
pub fn build_narrative_prompt(
    corrected: &ExtractedFinancialData,
    skips: &[SectionSkip],
    documents: &[SourceDocument],
    settings: &ReportSettings,
) -> Result<Prompt> {
    let tier = settings.tier;

    let mut system = String::from(NARRATIVE_SYSTEM_PROMPT);
    system.push_str(&format!(
        "\n## REPORT TIER\nThis is a \"{}\" tier report.\n\
         Brand colors for any visual references: primary {}, secondary {}, accent {}.\n",
        tier,
        settings.brand_colors.primary,
        settings.brand_colors.secondary,
        settings.brand_colors.accent
    ));

    let mut user = String::new();

    user.push_str(&format!("### PROPERTY\nName: {}\n", settings.property_name));
    if let Some(address) = &settings.property_address {
        user.push_str(&format!("Address: {}\n", address));
    }
    if let Some(units) = settings.unit_count {
        user.push_str(&format!("Units: {}\n", units));
    }

    user.push_str("\n### SECTIONS TO WRITE (in this order)\n");
    for definition in sections_for_tier(tier) {
        user.push_str(&render_section_instruction(&definition, tier, skips));
    }

    if let Some(strategy) = &settings.investment_strategy {
        user.push_str(&format!("\n### INVESTMENT STRATEGY\n{}\n", strategy));
    }

    if !settings.operator_notes.is_empty() {
        user.push_str("\n### OPERATOR NOTES\n");
        for note in &settings.operator_notes {
            user.push_str(&format!("Q: {}\nA: {}\n", note.question, note.answer));
        }
    }

    user.push_str("\n### STRUCTURED FINANCIAL DATA (validated)\n");
    user.push_str(&serde_json::to_string_pretty(corrected)?);
    user.push('\n');

    if !documents.is_empty() {
        user.push_str("\n### SOURCE DOCUMENTS\n");
        for doc in documents {
            user.push_str(&format!(
                "\n===== BEGIN {} ({}) =====\n{}\n===== END {} =====\n",
                doc.name,
                doc.kind.label(),
                doc.text,
                doc.name
            ));
        }
    }

    Ok(Prompt { system, user })
}

fn render_section_instruction(
    definition: &SectionDefinition,
    tier: crate::sections::ReportTier,
    skips: &[SectionSkip],
) -> String {
    let length = section_length(definition.id, tier);
    let mut block = format!(
        "\n#### {} (id: {})\nLength: {}-{} sentences, at most {} paragraph(s). Hard limits.\n",
        definition.title,
        definition.id,
        length.min_sentences,
        length.max_sentences,
        length.max_paragraphs
    );

    if let Some(skip) = skips.iter().find(|s| s.section_id == definition.id) {
        block.push_str(&format!(
            "SKIP THIS SECTION: {}. Emit it with \"included\": false, this reason as \
             \"skipReason\", and empty content.\n",
            skip.reason
        ));
        return block;
    }

    block.push_str(&format!("Guidance: {}\n", definition.guidance));

    if definition.is_conditional {
        block.push_str(&format!(
            "Conditional: only include if the operator notes address {}. Otherwise emit \
             \"included\": false with a short skipReason.\n",
            definition.required_questions.join(", ")
        ));
    }

    let charts = charts_for_section(definition.id, tier);
    if !charts.is_empty() {
        let names: Vec<&str> = charts.iter().map(|c| c.as_str()).collect();
        block.push_str(&format!(
            "Visuals available to reference: {}.\n",
            names.join(", ")
        ));
    }

    block
}

/// Assemble the single-section regeneration prompt. Deliberately narrow:
/// no cross-section context is sent.
pub fn build_regeneration_prompt(
    definition: &SectionDefinition,
    current: &GeneratedSection,
    feedback: &str,
    settings: &ReportSettings,
) -> Result<Prompt> {
    let length = section_length(definition.id, settings.tier);

    let mut user = format!(
        "### SECTION TO REVISE\nid: {}\ntitle: {}\nGuidance: {}\n\
         Length: {}-{} sentences, at most {} paragraph(s). Hard limits.\n",
        definition.id,
        definition.title,
        definition.guidance,
        length.min_sentences,
        length.max_sentences,
        length.max_paragraphs
    );

    user.push_str("\n### CURRENT VERSION\n");
    user.push_str(&serde_json::to_string_pretty(current)?);
    user.push_str("\n\n### READER FEEDBACK\n");
    user.push_str(feedback);
    user.push('\n');

    Ok(Prompt {
        system: REGENERATION_SYSTEM_PROMPT.to_string(),
        user,
    })
}
