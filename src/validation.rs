use log::debug;
use serde::{Deserialize, Serialize};

use crate::schema::{ExtractedFinancialData, TripleColumn};
use crate::sections::SectionDefinition;
use crate::stores::FileKind;

/// Tolerance for derived-value reconciliation, as a fraction of the base
/// figure's magnitude.
const RECONCILE_TOLERANCE_RATIO: f64 = 0.02;

/// Occupied + vacant may drift from the stated total by this many units
/// (model units, down units) before we flag it.
const UNIT_COUNT_TOLERANCE: i64 = 2;

/// Below-NOI concepts stripped from the corrected extraction. The narrative
/// must never discuss anything below the NOI line unless the operator
/// supplied it in free-text notes, so the boundary is enforced structurally
/// here rather than only by prompting.
const BELOW_NOI_KEYWORDS: &[&str] = &[
    "debt service",
    "capex",
    "capital expenditure",
    "distribution",
    "loan payment",
    "mortgage",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSkip {
    pub section_id: String,
    pub reason: String,
}

/// Produced once per extraction. `corrected` is a copy of the input with
/// the safe self-healing corrections applied; the input is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub corrected: ExtractedFinancialData,
    pub sections_to_skip: Vec<SectionSkip>,
}

/// Validate an extraction against the given section catalog. Pure function:
/// no I/O, deterministic, idempotent.
pub fn validate(
    extracted: &ExtractedFinancialData,
    catalog: &[SectionDefinition],
) -> ValidationResult {
    let mut warnings = Vec::new();
    let mut corrected = extracted.clone();

    // Everything downstream depends on having at least one operating
    // statement, so this is the one hard failure: stop before any other
    // check and before any narrative cost is incurred.
    if !extracted.data_quality.t12_found {
        return ValidationResult {
            valid: false,
            warnings,
            errors: vec![
                "T-12 operating statement not found in the uploaded documents; at least one \
                 operating statement is required to generate a report"
                    .to_string(),
            ],
            corrected,
            sections_to_skip: Vec::new(),
        };
    }

    reconcile_noi(&mut corrected, &mut warnings);
    check_revenue_decomposition(&corrected, &mut warnings);
    clamp_occupancy(&mut corrected, &mut warnings);
    check_unit_counts(&corrected, &mut warnings);
    strip_below_noi(&mut corrected, &mut warnings);

    let sections_to_skip = section_availability(catalog, extracted);

    debug!(
        "validation finished: {} warnings, {} sections to skip",
        warnings.len(),
        sections_to_skip.len()
    );

    ValidationResult {
        valid: true,
        warnings,
        errors: Vec::new(),
        corrected,
        sections_to_skip,
    }
}

/// NOI is a derived figure, so when it disagrees with revenue minus
/// expenses the derived value wins: warn and overwrite. Applied to each
/// column of the triple independently.
fn reconcile_noi(data: &mut ExtractedFinancialData, warnings: &mut Vec<String>) {
    for column in TripleColumn::ALL {
        let (Some(revenue), Some(expenses), Some(noi)) = (
            data.income.total_revenue.get(column),
            data.total_operating_expenses.get(column),
            data.noi.get(column),
        ) else {
            continue;
        };

        let derived = revenue - expenses;
        let tolerance = RECONCILE_TOLERANCE_RATIO * revenue.abs();
        if (noi - derived).abs() > tolerance {
            warnings.push(format!(
                "NOI ({}) of {:.2} does not reconcile with revenue minus expenses ({:.2} - \
                 {:.2} = {:.2}); using the derived value",
                column.label(),
                noi,
                revenue,
                expenses,
                derived
            ));
            data.noi.set(column, Some(derived));
        }
    }
}

/// Net rental income should equal GPR minus the four rent drags. Too many
/// independent inputs to pick a winner, so violations are warnings only.
fn check_revenue_decomposition(data: &ExtractedFinancialData, warnings: &mut Vec<String>) {
    for column in TripleColumn::ALL {
        let income = &data.income;
        let (Some(gpr), Some(vacancy), Some(ltl), Some(concessions), Some(bad_debt), Some(nri)) = (
            income.gross_potential_rent.get(column),
            income.vacancy_loss.get(column),
            income.loss_to_lease.get(column),
            income.concessions.get(column),
            income.bad_debt.get(column),
            income.net_rental_income.get(column),
        ) else {
            continue;
        };

        let derived = gpr - (vacancy + ltl + concessions + bad_debt);
        let tolerance = RECONCILE_TOLERANCE_RATIO * gpr.abs();
        if (nri - derived).abs() > tolerance {
            warnings.push(format!(
                "net rental income ({}) of {:.2} does not decompose from GPR {:.2} minus \
                 vacancy/loss-to-lease/concessions/bad debt (expected {:.2})",
                column.label(),
                nri,
                gpr,
                derived
            ));
        }
    }
}

fn clamp_occupancy(data: &mut ExtractedFinancialData, warnings: &mut Vec<String>) {
    let occupancy = &mut data.occupancy;
    for (label, value) in [
        ("physical", &mut occupancy.physical_percent),
        ("economic", &mut occupancy.economic_percent),
    ] {
        if let Some(percent) = *value {
            if !(0.0..=100.0).contains(&percent) {
                let clamped = percent.clamp(0.0, 100.0);
                warnings.push(format!(
                    "{} occupancy of {:.2}% is outside 0-100%; clamped to {:.2}%",
                    label, percent, clamped
                ));
                *value = Some(clamped);
            }
        }
    }
}

fn check_unit_counts(data: &ExtractedFinancialData, warnings: &mut Vec<String>) {
    let occupancy = &data.occupancy;
    let (Some(occupied), Some(vacant), Some(total)) = (
        occupancy.occupied_units,
        occupancy.vacant_units,
        occupancy.total_units,
    ) else {
        return;
    };

    let drift = i64::from(occupied) + i64::from(vacant) - i64::from(total);
    if drift.abs() > UNIT_COUNT_TOLERANCE {
        warnings.push(format!(
            "occupied ({}) plus vacant ({}) units differ from the stated total ({}) by {}",
            occupied,
            vacant,
            total,
            drift.abs()
        ));
    }
}

fn is_below_noi(name: &str) -> bool {
    let normalized = name.to_ascii_lowercase().replace(['_', '-'], " ");
    BELOW_NOI_KEYWORDS
        .iter()
        .any(|keyword| normalized.contains(keyword))
}

fn strip_below_noi(data: &mut ExtractedFinancialData, warnings: &mut Vec<String>) {
    data.expenses.retain(|category| {
        if is_below_noi(&category.name) {
            warnings.push(format!(
                "removed below-NOI line item '{}' from the expense categories; items below \
                 the NOI line are excluded unless supplied in operator notes",
                category.name
            ));
            false
        } else {
            true
        }
    });
}

/// Skip eligibility from `data_quality` flags only. Sections conditional on
/// operator notes are left to the narrative stage, which is instructed to
/// self-report `included=false` with a reason.
fn section_availability(
    catalog: &[SectionDefinition],
    extracted: &ExtractedFinancialData,
) -> Vec<SectionSkip> {
    let quality = &extracted.data_quality;
    let mut skips = Vec::new();

    for section in catalog {
        if section.is_conditional {
            continue;
        }

        let missing = section.required_files.iter().find(|kind| match kind {
            FileKind::T12 => !quality.t12_found,
            FileKind::RentRoll => !quality.rent_roll_found,
            FileKind::LeasingActivity => !quality.leasing_found,
            FileKind::Budget => !quality.budget_found,
            FileKind::Additional => false,
        });

        if let Some(kind) = missing {
            skips.push(SectionSkip {
                section_id: section.id.to_string(),
                reason: format!(
                    "{} requires a {}, which was not found in the uploaded documents",
                    section.title,
                    kind.label()
                ),
            });
        }
    }

    skips
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataQuality, ExpenseCategory, FinancialTriple};
    use crate::sections::SECTION_CATALOG;

    fn full_quality() -> DataQuality {
        DataQuality {
            t12_found: true,
            rent_roll_found: true,
            leasing_found: true,
            budget_found: true,
            month_match_confirmed: true,
            notes: None,
        }
    }

    fn base_extraction() -> ExtractedFinancialData {
        ExtractedFinancialData {
            data_quality: full_quality(),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_t12_is_fatal_and_early() {
        let extraction = ExtractedFinancialData {
            data_quality: DataQuality {
                t12_found: false,
                ..full_quality()
            },
            ..Default::default()
        };

        let result = validate(&extraction, SECTION_CATALOG);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("T-12 operating statement not found"));
        // Early return: no section scan is performed and nothing is corrected.
        assert!(result.sections_to_skip.is_empty());
        assert_eq!(result.corrected, extraction);
    }

    #[test]
    fn test_noi_mismatch_warns_and_self_heals() {
        let mut extraction = base_extraction();
        extraction.income.total_revenue.current = Some(500_000.0);
        extraction.total_operating_expenses.current = Some(300_000.0);
        extraction.noi.current = Some(150_000.0);

        let result = validate(&extraction, SECTION_CATALOG);
        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.contains("NOI")));
        // Derived value wins: 500,000 - 300,000, a $50,000 diff against the
        // $10,000 tolerance (2% of revenue).
        assert_eq!(result.corrected.noi.current, Some(200_000.0));
        // The input is untouched.
        assert_eq!(extraction.noi.current, Some(150_000.0));
    }

    #[test]
    fn test_noi_within_tolerance_untouched() {
        let mut extraction = base_extraction();
        extraction.income.total_revenue.current = Some(500_000.0);
        extraction.total_operating_expenses.current = Some(300_000.0);
        extraction.noi.current = Some(195_000.0); // off by 5k, inside 10k

        let result = validate(&extraction, SECTION_CATALOG);
        assert_eq!(result.corrected.noi.current, Some(195_000.0));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_noi_reconciles_prior_column_too() {
        let mut extraction = base_extraction();
        extraction.income.total_revenue.prior = Some(400_000.0);
        extraction.total_operating_expenses.prior = Some(250_000.0);
        extraction.noi.prior = Some(100_000.0);

        let result = validate(&extraction, SECTION_CATALOG);
        assert_eq!(result.corrected.noi.prior, Some(150_000.0));
        assert!(result.warnings.iter().any(|w| w.contains("prior")));
    }

    #[test]
    fn test_decomposition_warns_without_correcting() {
        let mut extraction = base_extraction();
        extraction.income.gross_potential_rent.current = Some(600_000.0);
        extraction.income.vacancy_loss.current = Some(30_000.0);
        extraction.income.loss_to_lease.current = Some(10_000.0);
        extraction.income.concessions.current = Some(5_000.0);
        extraction.income.bad_debt.current = Some(5_000.0);
        // Expected 550,000; report 500,000 - a 50k gap against 12k tolerance.
        extraction.income.net_rental_income.current = Some(500_000.0);

        let result = validate(&extraction, SECTION_CATALOG);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("does not decompose")));
        assert_eq!(
            result.corrected.income.net_rental_income.current,
            Some(500_000.0)
        );
    }

    #[test]
    fn test_occupancy_clamped_to_range() {
        let mut extraction = base_extraction();
        extraction.occupancy.physical_percent = Some(104.5);
        extraction.occupancy.economic_percent = Some(-2.0);

        let result = validate(&extraction, SECTION_CATALOG);
        assert_eq!(result.corrected.occupancy.physical_percent, Some(100.0));
        assert_eq!(result.corrected.occupancy.economic_percent, Some(0.0));
        assert_eq!(
            result
                .warnings
                .iter()
                .filter(|w| w.contains("occupancy"))
                .count(),
            2
        );
    }

    #[test]
    fn test_unit_count_drift_warns_beyond_tolerance() {
        let mut extraction = base_extraction();
        extraction.occupancy.occupied_units = Some(110);
        extraction.occupancy.vacant_units = Some(5);
        extraction.occupancy.total_units = Some(120);

        let result = validate(&extraction, SECTION_CATALOG);
        assert!(result.warnings.iter().any(|w| w.contains("stated total")));

        // A 2-unit drift is tolerated.
        extraction.occupancy.vacant_units = Some(8);
        let result = validate(&extraction, SECTION_CATALOG);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_below_noi_items_stripped() {
        let mut extraction = base_extraction();
        extraction.expenses = vec![
            ExpenseCategory {
                name: "Repairs & Maintenance".to_string(),
                amounts: FinancialTriple {
                    current: Some(20_000.0),
                    prior: None,
                    budget: None,
                },
            },
            ExpenseCategory {
                name: "Debt Service".to_string(),
                amounts: FinancialTriple {
                    current: Some(80_000.0),
                    prior: None,
                    budget: None,
                },
            },
            ExpenseCategory {
                name: "capital_expenditures".to_string(),
                amounts: FinancialTriple {
                    current: Some(15_000.0),
                    prior: None,
                    budget: None,
                },
            },
        ];

        let result = validate(&extraction, SECTION_CATALOG);
        let names: Vec<&str> = result
            .corrected
            .expenses
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["Repairs & Maintenance"]);
        assert_eq!(
            result
                .warnings
                .iter()
                .filter(|w| w.contains("below-NOI"))
                .count(),
            2
        );
    }

    #[test]
    fn test_rent_roll_absent_skips_dependent_sections() {
        let mut extraction = base_extraction();
        extraction.data_quality.rent_roll_found = false;

        let result = validate(&extraction, SECTION_CATALOG);
        let skipped: Vec<&str> = result
            .sections_to_skip
            .iter()
            .map(|s| s.section_id.as_str())
            .collect();

        for id in [
            "rent_roll_insights",
            "rent_roll_deep_dive",
            "lease_expiration_rollover",
        ] {
            assert!(skipped.contains(&id), "{id} should be skipped");
        }
        assert!(result
            .sections_to_skip
            .iter()
            .all(|s| s.reason.contains("rent roll")));
    }

    #[test]
    fn test_budget_absent_skips_budget_sections() {
        let mut extraction = base_extraction();
        extraction.data_quality.budget_found = false;

        let result = validate(&extraction, SECTION_CATALOG);
        assert!(result
            .sections_to_skip
            .iter()
            .any(|s| s.section_id == "budget_variance" && s.reason.contains("budget")));
    }

    #[test]
    fn test_conditional_sections_never_skipped_here() {
        let mut extraction = base_extraction();
        extraction.data_quality.rent_roll_found = false;
        extraction.data_quality.budget_found = false;
        extraction.data_quality.leasing_found = false;

        let result = validate(&extraction, SECTION_CATALOG);
        assert!(!result
            .sections_to_skip
            .iter()
            .any(|s| s.section_id == "market_outlook"
                || s.section_id == "investment_strategy_alignment"));
    }

    #[test]
    fn test_validation_is_idempotent() {
        let mut extraction = base_extraction();
        extraction.income.total_revenue.current = Some(500_000.0);
        extraction.total_operating_expenses.current = Some(300_000.0);
        extraction.noi.current = Some(150_000.0);
        extraction.occupancy.physical_percent = Some(104.5);
        extraction.data_quality.rent_roll_found = false;

        let first = validate(&extraction, SECTION_CATALOG);
        let second = validate(&extraction, SECTION_CATALOG);
        assert_eq!(first, second);

        // Re-validating the corrected output produces no new corrections.
        let third = validate(&first.corrected, SECTION_CATALOG);
        assert!(third.warnings.is_empty());
        assert_eq!(third.corrected, first.corrected);
    }
}
