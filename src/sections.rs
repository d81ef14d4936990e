use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::stores::FileKind;

/// Product packaging level. Each tier unlocks more sections, longer
/// per-section narratives and more chart types, but the section sets are
/// not strict supersets of one another: Foundational carries a combined
/// `financial_performance` section that the higher tiers replace with
/// separate income and expense analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportTier {
    Foundational,
    Professional,
    Institutional,
}

impl ReportTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportTier::Foundational => "foundational",
            ReportTier::Professional => "professional",
            ReportTier::Institutional => "institutional",
        }
    }
}

impl fmt::Display for ReportTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportTier {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "foundational" => Ok(ReportTier::Foundational),
            "professional" => Ok(ReportTier::Professional),
            "institutional" => Ok(ReportTier::Institutional),
            other => Err(ReportError::InvalidTier(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisualizationTier {
    None,
    KpiCards,
    Charts,
    Premium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    KpiCards,
    RevenueTrend,
    ExpenseBreakdown,
    NoiBridge,
    OccupancyTrend,
    UnitMixTable,
    RentGapAnalysis,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::KpiCards => "kpi_cards",
            ChartType::RevenueTrend => "revenue_trend",
            ChartType::ExpenseBreakdown => "expense_breakdown",
            ChartType::NoiBridge => "noi_bridge",
            ChartType::OccupancyTrend => "occupancy_trend",
            ChartType::UnitMixTable => "unit_mix_table",
            ChartType::RentGapAnalysis => "rent_gap_analysis",
        }
    }
}

/// One titled unit of the final report. Static catalog data only - the
/// generated content lives in [`crate::report::GeneratedSection`].
#[derive(Debug, Clone, Copy)]
pub struct SectionDefinition {
    pub id: &'static str,
    pub title: &'static str,
    /// Source files that must have been found for the section to be
    /// generatable at all. Checked against `data_quality` by the validator.
    pub required_files: &'static [FileKind],
    /// Operator-notes questions the section depends on. Availability for
    /// these is decided by the narrative model, not the validator.
    pub required_questions: &'static [&'static str],
    pub is_conditional: bool,
    pub visualization: VisualizationTier,
    /// Prompt guidance carried verbatim into the narrative call.
    pub guidance: &'static str,
}

/// Hard numeric bounds carried into the narrative prompt. Without explicit
/// sentence counts, narrative length is the single biggest source of output
/// variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionLength {
    pub min_sentences: u32,
    pub max_sentences: u32,
    pub max_paragraphs: u32,
}

pub const SECTION_CATALOG: &[SectionDefinition] = &[
    SectionDefinition {
        id: "executive_summary",
        title: "Executive Summary",
        required_files: &[FileKind::T12],
        required_questions: &[],
        is_conditional: false,
        visualization: VisualizationTier::KpiCards,
        guidance: "Open with the property's headline performance for the period: revenue, NOI, \
                   occupancy. State the single most important development and whether the period \
                   was ahead of or behind the prior period.",
    },
    SectionDefinition {
        id: "financial_performance",
        title: "Financial Performance",
        required_files: &[FileKind::T12],
        required_questions: &[],
        is_conditional: false,
        visualization: VisualizationTier::Charts,
        guidance: "Combined income and expense review: walk from gross potential rent through \
                   vacancy and credit losses to total revenue, then summarize the major expense \
                   categories and land on NOI.",
    },
    SectionDefinition {
        id: "income_analysis",
        title: "Income Analysis",
        required_files: &[FileKind::T12],
        required_questions: &[],
        is_conditional: false,
        visualization: VisualizationTier::Charts,
        guidance: "Decompose revenue: gross potential rent, vacancy loss, loss to lease, \
                   concessions, bad debt, other income. Quantify each drag on GPR and note \
                   which moved most against the prior period.",
    },
    SectionDefinition {
        id: "expense_analysis",
        title: "Expense Analysis",
        required_files: &[FileKind::T12],
        required_questions: &[],
        is_conditional: false,
        visualization: VisualizationTier::Charts,
        guidance: "Review operating expense categories by size. Call out categories with \
                   notable movement against prior period or budget. Do not discuss anything \
                   below the NOI line.",
    },
    SectionDefinition {
        id: "noi_analysis",
        title: "NOI Analysis",
        required_files: &[FileKind::T12],
        required_questions: &[],
        is_conditional: false,
        visualization: VisualizationTier::Charts,
        guidance: "Net operating income as the floor of the analysis: level, margin against \
                   total revenue, and the revenue or expense drivers behind any change.",
    },
    SectionDefinition {
        id: "budget_variance",
        title: "Budget Variance",
        required_files: &[FileKind::T12, FileKind::Budget],
        required_questions: &[],
        is_conditional: false,
        visualization: VisualizationTier::Charts,
        guidance: "Compare actuals to budget line by line where budget figures exist. Flag \
                   variances a lender or investor would ask about.",
    },
    SectionDefinition {
        id: "occupancy_trends",
        title: "Occupancy Trends",
        required_files: &[FileKind::T12],
        required_questions: &[],
        is_conditional: false,
        visualization: VisualizationTier::Charts,
        guidance: "Physical and economic occupancy, direction of travel across the trailing \
                   months if available, and unit counts behind the percentages.",
    },
    SectionDefinition {
        id: "leasing_activity",
        title: "Leasing Activity",
        required_files: &[FileKind::LeasingActivity],
        required_questions: &[],
        is_conditional: false,
        visualization: VisualizationTier::KpiCards,
        guidance: "New leases, renewals, move-ins, move-outs and notices to vacate. Net the \
                   activity out and say what it implies for near-term occupancy.",
    },
    SectionDefinition {
        id: "rent_roll_insights",
        title: "Rent Roll Insights",
        required_files: &[FileKind::RentRoll],
        required_questions: &[],
        is_conditional: false,
        visualization: VisualizationTier::Charts,
        guidance: "Unit mix overview from the rent roll: unit types, counts, market versus \
                   in-place rents, and the aggregate rent gap.",
    },
    SectionDefinition {
        id: "rent_roll_deep_dive",
        title: "Rent Roll Deep Dive",
        required_files: &[FileKind::RentRoll],
        required_questions: &[],
        is_conditional: false,
        visualization: VisualizationTier::Premium,
        guidance: "Per-unit-type economics: rent per square foot, spread between market and \
                   actual rent by type, and where the loss-to-lease concentrates.",
    },
    SectionDefinition {
        id: "lease_expiration_rollover",
        title: "Lease Expiration & Rollover",
        required_files: &[FileKind::RentRoll],
        required_questions: &[],
        is_conditional: false,
        visualization: VisualizationTier::Charts,
        guidance: "Lease expiration exposure visible in the rent roll and the rollover risk it \
                   implies. If expiration dates are not in the data, say so explicitly.",
    },
    SectionDefinition {
        id: "trailing_twelve_review",
        title: "Trailing Twelve Review",
        required_files: &[FileKind::T12],
        required_questions: &[],
        is_conditional: false,
        visualization: VisualizationTier::Charts,
        guidance: "Twelve-month shape of revenue, expenses, NOI and occupancy. Identify \
                   seasonality, one-off spikes and the overall trend line.",
    },
    SectionDefinition {
        id: "market_outlook",
        title: "Market Outlook",
        required_files: &[],
        required_questions: &["market_outlook"],
        is_conditional: true,
        visualization: VisualizationTier::None,
        guidance: "Only write this section if the operator notes describe market conditions or \
                   outlook. Base it strictly on those notes - never invent market data.",
    },
    SectionDefinition {
        id: "investment_strategy_alignment",
        title: "Investment Strategy Alignment",
        required_files: &[],
        required_questions: &["investment_strategy"],
        is_conditional: true,
        visualization: VisualizationTier::None,
        guidance: "Only write this section if an investment strategy was supplied. Assess how \
                   the period's results track against that stated strategy.",
    },
];

const FOUNDATIONAL_SECTIONS: &[&str] = &[
    "executive_summary",
    "financial_performance",
    "noi_analysis",
    "occupancy_trends",
    "rent_roll_insights",
];

const PROFESSIONAL_SECTIONS: &[&str] = &[
    "executive_summary",
    "income_analysis",
    "expense_analysis",
    "noi_analysis",
    "budget_variance",
    "occupancy_trends",
    "leasing_activity",
    "rent_roll_insights",
    "lease_expiration_rollover",
    "trailing_twelve_review",
];

const INSTITUTIONAL_SECTIONS: &[&str] = &[
    "executive_summary",
    "income_analysis",
    "expense_analysis",
    "noi_analysis",
    "budget_variance",
    "occupancy_trends",
    "leasing_activity",
    "rent_roll_insights",
    "rent_roll_deep_dive",
    "lease_expiration_rollover",
    "trailing_twelve_review",
    "market_outlook",
    "investment_strategy_alignment",
];

pub fn tier_section_ids(tier: ReportTier) -> &'static [&'static str] {
    match tier {
        ReportTier::Foundational => FOUNDATIONAL_SECTIONS,
        ReportTier::Professional => PROFESSIONAL_SECTIONS,
        ReportTier::Institutional => INSTITUTIONAL_SECTIONS,
    }
}

pub fn section_definition(id: &str) -> Option<&'static SectionDefinition> {
    SECTION_CATALOG.iter().find(|s| s.id == id)
}

/// Ordered section definitions for a tier. Ids in the tier tables are
/// guaranteed to resolve against the catalog (enforced by tests).
pub fn sections_for_tier(tier: ReportTier) -> Vec<SectionDefinition> {
    tier_section_ids(tier)
        .iter()
        .filter_map(|id| section_definition(id))
        .copied()
        .collect()
}

pub fn section_length(section_id: &str, tier: ReportTier) -> SectionLength {
    // The executive summary gets extra room at every tier; the deep dive
    // always runs long.
    match (section_id, tier) {
        ("executive_summary", ReportTier::Foundational) => SectionLength {
            min_sentences: 4,
            max_sentences: 6,
            max_paragraphs: 1,
        },
        ("executive_summary", ReportTier::Professional) => SectionLength {
            min_sentences: 6,
            max_sentences: 10,
            max_paragraphs: 2,
        },
        ("executive_summary", ReportTier::Institutional) => SectionLength {
            min_sentences: 10,
            max_sentences: 16,
            max_paragraphs: 4,
        },
        ("rent_roll_deep_dive", _) => SectionLength {
            min_sentences: 10,
            max_sentences: 18,
            max_paragraphs: 4,
        },
        (_, ReportTier::Foundational) => SectionLength {
            min_sentences: 3,
            max_sentences: 5,
            max_paragraphs: 1,
        },
        (_, ReportTier::Professional) => SectionLength {
            min_sentences: 5,
            max_sentences: 8,
            max_paragraphs: 2,
        },
        (_, ReportTier::Institutional) => SectionLength {
            min_sentences: 8,
            max_sentences: 14,
            max_paragraphs: 3,
        },
    }
}

const FOUNDATIONAL_CHARTS: &[ChartType] = &[ChartType::KpiCards];

const PROFESSIONAL_CHARTS: &[ChartType] = &[
    ChartType::KpiCards,
    ChartType::RevenueTrend,
    ChartType::ExpenseBreakdown,
    ChartType::OccupancyTrend,
];

const INSTITUTIONAL_CHARTS: &[ChartType] = &[
    ChartType::KpiCards,
    ChartType::RevenueTrend,
    ChartType::ExpenseBreakdown,
    ChartType::NoiBridge,
    ChartType::OccupancyTrend,
    ChartType::UnitMixTable,
    ChartType::RentGapAnalysis,
];

pub fn available_charts(tier: ReportTier) -> &'static [ChartType] {
    match tier {
        ReportTier::Foundational => FOUNDATIONAL_CHARTS,
        ReportTier::Professional => PROFESSIONAL_CHARTS,
        ReportTier::Institutional => INSTITUTIONAL_CHARTS,
    }
}

fn natural_charts(section_id: &str) -> &'static [ChartType] {
    match section_id {
        "executive_summary" => &[ChartType::KpiCards],
        "financial_performance" => &[ChartType::RevenueTrend, ChartType::ExpenseBreakdown],
        "income_analysis" => &[ChartType::RevenueTrend],
        "expense_analysis" => &[ChartType::ExpenseBreakdown],
        "noi_analysis" => &[ChartType::NoiBridge, ChartType::RevenueTrend],
        "budget_variance" => &[ChartType::ExpenseBreakdown],
        "occupancy_trends" => &[ChartType::OccupancyTrend],
        "leasing_activity" => &[ChartType::KpiCards],
        "rent_roll_insights" => &[ChartType::UnitMixTable],
        "rent_roll_deep_dive" => &[ChartType::UnitMixTable, ChartType::RentGapAnalysis],
        "lease_expiration_rollover" => &[ChartType::OccupancyTrend],
        "trailing_twelve_review" => &[ChartType::RevenueTrend, ChartType::OccupancyTrend],
        _ => &[],
    }
}

/// Charts a section may carry at a tier: the intersection of the section's
/// natural charts with the tier's allowance, gated by the section's
/// visualization level.
pub fn charts_for_section(section_id: &str, tier: ReportTier) -> Vec<ChartType> {
    let Some(definition) = section_definition(section_id) else {
        return Vec::new();
    };
    match definition.visualization {
        VisualizationTier::None => Vec::new(),
        VisualizationTier::KpiCards => {
            if available_charts(tier).contains(&ChartType::KpiCards) {
                vec![ChartType::KpiCards]
            } else {
                Vec::new()
            }
        }
        VisualizationTier::Charts | VisualizationTier::Premium => natural_charts(section_id)
            .iter()
            .filter(|c| available_charts(tier).contains(c))
            .copied()
            .collect(),
    }
}

// Call-type budgets. Extraction is deterministic and cheap; narrative cost
// scales with the tier's section count and length allowances.
pub const EXTRACTION_MAX_TOKENS: u32 = 8_192;
pub const EXTRACTION_TEMPERATURE: f32 = 0.0;
pub const NARRATIVE_TEMPERATURE: f32 = 0.7;
pub const REGENERATION_MAX_TOKENS: u32 = 2_048;

pub fn narrative_token_budget(tier: ReportTier) -> u32 {
    match tier {
        ReportTier::Foundational => 8_192,
        ReportTier::Professional => 16_384,
        ReportTier::Institutional => 32_768,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tier_id_resolves() {
        for tier in [
            ReportTier::Foundational,
            ReportTier::Professional,
            ReportTier::Institutional,
        ] {
            for id in tier_section_ids(tier) {
                assert!(
                    section_definition(id).is_some(),
                    "tier {} references unknown section {}",
                    tier,
                    id
                );
            }
            assert_eq!(sections_for_tier(tier).len(), tier_section_ids(tier).len());
        }
    }

    #[test]
    fn test_tier_enrichment_is_not_strict_superset() {
        let foundational = tier_section_ids(ReportTier::Foundational);
        let institutional = tier_section_ids(ReportTier::Institutional);

        assert!(institutional.len() > foundational.len());
        // Foundational's combined section is replaced, not inherited.
        assert!(foundational.contains(&"financial_performance"));
        assert!(!institutional.contains(&"financial_performance"));
        assert!(institutional.contains(&"income_analysis"));
    }

    #[test]
    fn test_tier_parsing() {
        assert_eq!(
            "Professional".parse::<ReportTier>().unwrap(),
            ReportTier::Professional
        );
        assert!("premium".parse::<ReportTier>().is_err());
    }

    #[test]
    fn test_lengths_grow_with_tier() {
        let f = section_length("noi_analysis", ReportTier::Foundational);
        let p = section_length("noi_analysis", ReportTier::Professional);
        let i = section_length("noi_analysis", ReportTier::Institutional);

        assert!(f.max_sentences < p.max_sentences);
        assert!(p.max_sentences < i.max_sentences);
        assert!(f.max_paragraphs <= p.max_paragraphs);
    }

    #[test]
    fn test_chart_access_gated_by_tier() {
        // Foundational never sees real charts, only KPI cards.
        assert_eq!(
            charts_for_section("noi_analysis", ReportTier::Foundational),
            Vec::<ChartType>::new()
        );
        assert_eq!(
            charts_for_section("executive_summary", ReportTier::Foundational),
            vec![ChartType::KpiCards]
        );

        // The NOI bridge is institutional-only.
        assert!(!charts_for_section("noi_analysis", ReportTier::Professional)
            .contains(&ChartType::NoiBridge));
        assert!(charts_for_section("noi_analysis", ReportTier::Institutional)
            .contains(&ChartType::NoiBridge));
    }

    #[test]
    fn test_conditional_sections_have_questions() {
        for section in SECTION_CATALOG {
            if section.is_conditional {
                assert!(
                    !section.required_questions.is_empty(),
                    "conditional section {} needs at least one question",
                    section.id
                );
            }
        }
    }

    #[test]
    fn test_narrative_budget_grows_with_tier() {
        assert!(
            narrative_token_budget(ReportTier::Foundational)
                < narrative_token_budget(ReportTier::Institutional)
        );
    }
}
