use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Column selector for a [`FinancialTriple`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripleColumn {
    Current,
    Prior,
    Budget,
}

impl TripleColumn {
    pub const ALL: [TripleColumn; 3] = [
        TripleColumn::Current,
        TripleColumn::Prior,
        TripleColumn::Budget,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TripleColumn::Current => "current",
            TripleColumn::Prior => "prior",
            TripleColumn::Budget => "budget",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FinancialTriple {
    #[schemars(
        description = "Value for the current reporting period. Null when the documents do not state it. NEVER substitute zero for a missing value - an absent number and an actual zero are different facts."
    )]
    pub current: Option<f64>,

    #[schemars(
        description = "Value for the comparable prior period (previous month or same month last year, whichever the statement presents). Null when not stated."
    )]
    pub prior: Option<f64>,

    #[schemars(
        description = "Budgeted value for the current period. Null unless a budget document was provided and states it."
    )]
    pub budget: Option<f64>,
}

impl FinancialTriple {
    pub fn get(&self, column: TripleColumn) -> Option<f64> {
        match column {
            TripleColumn::Current => self.current,
            TripleColumn::Prior => self.prior,
            TripleColumn::Budget => self.budget,
        }
    }

    pub fn set(&mut self, column: TripleColumn, value: Option<f64>) {
        match column {
            TripleColumn::Current => self.current = value,
            TripleColumn::Prior => self.prior = value,
            TripleColumn::Budget => self.budget = value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PropertyIdentity {
    #[schemars(description = "Property name exactly as it appears on the statements.")]
    #[serde(default)]
    pub name: Option<String>,

    #[schemars(description = "Total unit count of the property, if stated.")]
    #[serde(default)]
    pub unit_count: Option<u32>,

    #[schemars(
        description = "The reporting period the statements cover, e.g. 'June 2025' or '2025-06'. Null if no period is identifiable."
    )]
    #[serde(default)]
    pub period: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IncomeLines {
    #[schemars(description = "Gross potential rent (GPR): maximum rent at full occupancy with no loss.")]
    #[serde(default)]
    pub gross_potential_rent: FinancialTriple,

    #[schemars(description = "Vacancy loss. Report as a positive amount of lost rent.")]
    #[serde(default)]
    pub vacancy_loss: FinancialTriple,

    #[schemars(description = "Loss to lease: gap between market rent and in-place lease rent.")]
    #[serde(default)]
    pub loss_to_lease: FinancialTriple,

    #[schemars(description = "Concessions granted to tenants, as a positive amount.")]
    #[serde(default)]
    pub concessions: FinancialTriple,

    #[schemars(description = "Bad debt / uncollected rent, as a positive amount.")]
    #[serde(default)]
    pub bad_debt: FinancialTriple,

    #[schemars(
        description = "Net rental income: GPR minus vacancy, loss to lease, concessions and bad debt."
    )]
    #[serde(default)]
    pub net_rental_income: FinancialTriple,

    #[schemars(description = "Other income: fees, laundry, parking, utility reimbursements, etc.")]
    #[serde(default)]
    pub other_income: FinancialTriple,

    #[schemars(description = "Total revenue: net rental income plus other income.")]
    #[serde(default)]
    pub total_revenue: FinancialTriple,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExpenseCategory {
    #[schemars(
        description = "Expense category name exactly as the statement labels it, e.g. 'Repairs & Maintenance', 'Payroll', 'Property Taxes'."
    )]
    pub name: String,

    #[schemars(description = "Amounts for this category.")]
    #[serde(default)]
    pub amounts: FinancialTriple,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Occupancy {
    #[schemars(description = "Number of occupied units, if stated.")]
    #[serde(default)]
    pub occupied_units: Option<u32>,

    #[schemars(description = "Number of vacant units, if stated.")]
    #[serde(default)]
    pub vacant_units: Option<u32>,

    #[schemars(description = "Total unit count used by the occupancy figures, if stated.")]
    #[serde(default)]
    pub total_units: Option<u32>,

    #[schemars(description = "Physical occupancy percentage (0-100), if stated.")]
    #[serde(default)]
    pub physical_percent: Option<f64>,

    #[schemars(description = "Economic occupancy percentage (0-100), if stated.")]
    #[serde(default)]
    pub economic_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LeasingActivity {
    #[schemars(description = "New leases signed in the period.")]
    #[serde(default)]
    pub new_leases: Option<u32>,

    #[schemars(description = "Lease renewals signed in the period.")]
    #[serde(default)]
    pub renewals: Option<u32>,

    #[schemars(description = "Move-ins during the period.")]
    #[serde(default)]
    pub move_ins: Option<u32>,

    #[schemars(description = "Move-outs during the period.")]
    #[serde(default)]
    pub move_outs: Option<u32>,

    #[schemars(description = "Notices to vacate received during the period.")]
    #[serde(default)]
    pub notices_to_vacate: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UnitMixRow {
    #[schemars(description = "Unit type label from the rent roll, e.g. '1BR/1BA', '2BR/2BA'.")]
    pub unit_type: String,

    #[schemars(description = "Number of units of this type.")]
    #[serde(default)]
    pub unit_count: Option<u32>,

    #[schemars(description = "Average square footage for this unit type.")]
    #[serde(default)]
    pub avg_square_feet: Option<f64>,

    #[schemars(description = "Average market rent for this unit type.")]
    #[serde(default)]
    pub avg_market_rent: Option<f64>,

    #[schemars(description = "Average in-place (actual) rent for this unit type.")]
    #[serde(default)]
    pub avg_actual_rent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrailingMonth {
    #[schemars(description = "Month in YYYY-MM format.")]
    pub month: String,

    #[schemars(description = "Total revenue for the month.")]
    #[serde(default)]
    pub revenue: Option<f64>,

    #[schemars(description = "Total operating expenses for the month.")]
    #[serde(default)]
    pub expenses: Option<f64>,

    #[schemars(description = "Net operating income for the month.")]
    #[serde(default)]
    pub noi: Option<f64>,

    #[schemars(description = "Physical occupancy percentage for the month (0-100).")]
    #[serde(default)]
    pub occupancy_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DataQuality {
    #[schemars(
        description = "True only if at least one T-12 / operating statement was identified among the documents."
    )]
    #[serde(default)]
    pub t12_found: bool,

    #[schemars(description = "True only if a rent roll was identified among the documents.")]
    #[serde(default)]
    pub rent_roll_found: bool,

    #[schemars(description = "True only if a leasing activity report was identified.")]
    #[serde(default)]
    pub leasing_found: bool,

    #[schemars(description = "True only if a budget was identified among the documents.")]
    #[serde(default)]
    pub budget_found: bool,

    #[schemars(
        description = "True only if all documents confirmably cover the same reporting month."
    )]
    #[serde(default)]
    pub month_match_confirmed: bool,

    #[schemars(
        description = "Free-text notes on anything ambiguous, conflicting or unreadable in the documents."
    )]
    #[serde(default)]
    pub notes: Option<String>,
}

/// The complete Call-1 output: everything the extraction pass pulls out of
/// the uploaded documents. Every numeric leaf is either a real extracted
/// value or null - the schema has no default-zero fallback, because a
/// silent zero is indistinguishable from a value that is actually zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedFinancialData {
    #[schemars(description = "Property identity as stated on the documents.")]
    #[serde(default)]
    pub property: PropertyIdentity,

    #[schemars(description = "Income statement line items.")]
    #[serde(default)]
    pub income: IncomeLines,

    #[schemars(
        description = "Operating expense categories as the statement breaks them down. Operating expenses only - nothing below the NOI line (no debt service, no capital expenditures, no distributions)."
    )]
    #[serde(default)]
    pub expenses: Vec<ExpenseCategory>,

    #[schemars(description = "Total operating expenses.")]
    #[serde(default)]
    pub total_operating_expenses: FinancialTriple,

    #[schemars(description = "Net operating income: total revenue minus total operating expenses.")]
    #[serde(default)]
    pub noi: FinancialTriple,

    #[schemars(description = "Occupancy counts and percentages.")]
    #[serde(default)]
    pub occupancy: Occupancy,

    #[schemars(description = "Leasing activity counts for the period.")]
    #[serde(default)]
    pub leasing: LeasingActivity,

    #[schemars(description = "Unit-mix table from the rent roll. Empty if no rent roll was found.")]
    #[serde(default)]
    pub unit_mix: Vec<UnitMixRow>,

    #[schemars(
        description = "Trailing twelve month series, oldest month first. Empty if the T-12 does not present monthly columns."
    )]
    #[serde(default)]
    pub trailing_twelve: Vec<TrailingMonth>,

    #[schemars(description = "Which source documents were actually found and usable.")]
    #[serde(default)]
    pub data_quality: DataQuality,
}

impl ExtractedFinancialData {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ExtractedFinancialData)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_generation() {
        let schema_json = ExtractedFinancialData::schema_as_json().unwrap();
        assert!(schema_json.contains("gross_potential_rent"));
        assert!(schema_json.contains("data_quality"));
        assert!(schema_json.contains("trailing_twelve"));
        assert!(schema_json.contains("NEVER substitute zero"));
    }

    #[test]
    fn test_missing_leaves_stay_null() {
        // A minimal model response must deserialize without inventing zeros.
        let parsed: ExtractedFinancialData = serde_json::from_str(
            r#"{"data_quality":{"t12_found":true},"noi":{"current":12500.0}}"#,
        )
        .unwrap();

        assert_eq!(parsed.noi.current, Some(12500.0));
        assert_eq!(parsed.noi.prior, None);
        assert_eq!(parsed.income.total_revenue.current, None);
        assert!(parsed.expenses.is_empty());
        assert!(parsed.data_quality.t12_found);
        assert!(!parsed.data_quality.budget_found);
    }

    #[test]
    fn test_triple_column_accessors() {
        let mut triple = FinancialTriple {
            current: Some(100.0),
            prior: None,
            budget: Some(90.0),
        };

        assert_eq!(triple.get(TripleColumn::Current), Some(100.0));
        assert_eq!(triple.get(TripleColumn::Prior), None);

        triple.set(TripleColumn::Prior, Some(80.0));
        assert_eq!(triple.prior, Some(80.0));
    }

    #[test]
    fn test_serialization_round_trip() {
        let data = ExtractedFinancialData {
            property: PropertyIdentity {
                name: Some("Maple Court Apartments".to_string()),
                unit_count: Some(120),
                period: Some("2025-06".to_string()),
            },
            expenses: vec![ExpenseCategory {
                name: "Repairs & Maintenance".to_string(),
                amounts: FinancialTriple {
                    current: Some(18000.0),
                    prior: Some(17250.0),
                    budget: None,
                },
            }],
            ..Default::default()
        };

        let json = serde_json::to_string_pretty(&data).unwrap();
        let back: ExtractedFinancialData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }
}
