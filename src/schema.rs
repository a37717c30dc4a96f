use crate::error::{Result, TaxEngineError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
pub enum Province {
    #[serde(rename = "AB", alias = "ab")]
    Alberta,
    #[serde(rename = "BC", alias = "bc")]
    BritishColumbia,
    #[serde(rename = "MB", alias = "mb")]
    Manitoba,
    #[serde(rename = "NB", alias = "nb")]
    NewBrunswick,
    #[serde(rename = "NL", alias = "nl")]
    NewfoundlandAndLabrador,
    #[serde(rename = "NS", alias = "ns")]
    NovaScotia,
    #[serde(rename = "NT", alias = "nt")]
    NorthwestTerritories,
    #[serde(rename = "NU", alias = "nu")]
    Nunavut,
    #[serde(rename = "ON", alias = "on")]
    Ontario,
    #[serde(rename = "PE", alias = "pe")]
    PrinceEdwardIsland,
    #[serde(rename = "QC", alias = "qc")]
    Quebec,
    #[serde(rename = "SK", alias = "sk")]
    Saskatchewan,
    #[serde(rename = "YT", alias = "yt")]
    Yukon,
}

impl Province {
    pub const ALL: [Province; 13] = [
        Province::Alberta,
        Province::BritishColumbia,
        Province::Manitoba,
        Province::NewBrunswick,
        Province::NewfoundlandAndLabrador,
        Province::NovaScotia,
        Province::NorthwestTerritories,
        Province::Nunavut,
        Province::Ontario,
        Province::PrinceEdwardIsland,
        Province::Quebec,
        Province::Saskatchewan,
        Province::Yukon,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Province::Alberta => "AB",
            Province::BritishColumbia => "BC",
            Province::Manitoba => "MB",
            Province::NewBrunswick => "NB",
            Province::NewfoundlandAndLabrador => "NL",
            Province::NovaScotia => "NS",
            Province::NorthwestTerritories => "NT",
            Province::Nunavut => "NU",
            Province::Ontario => "ON",
            Province::PrinceEdwardIsland => "PE",
            Province::Quebec => "QC",
            Province::Saskatchewan => "SK",
            Province::Yukon => "YT",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Province::Alberta => "Alberta",
            Province::BritishColumbia => "British Columbia",
            Province::Manitoba => "Manitoba",
            Province::NewBrunswick => "New Brunswick",
            Province::NewfoundlandAndLabrador => "Newfoundland and Labrador",
            Province::NovaScotia => "Nova Scotia",
            Province::NorthwestTerritories => "Northwest Territories",
            Province::Nunavut => "Nunavut",
            Province::Ontario => "Ontario",
            Province::PrinceEdwardIsland => "Prince Edward Island",
            Province::Quebec => "Quebec",
            Province::Saskatchewan => "Saskatchewan",
            Province::Yukon => "Yukon",
        }
    }
}

impl fmt::Display for Province {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Province {
    type Err = TaxEngineError;

    /// Accepts a two-letter code or a full name, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim();
        Province::ALL
            .iter()
            .copied()
            .find(|p| p.code().eq_ignore_ascii_case(needle) || p.name().eq_ignore_ascii_case(needle))
            .ok_or_else(|| TaxEngineError::UnknownProvince(s.to_string()))
    }
}

/// Self-reported answers for a single tax year, collected by the intake wizard.
///
/// Every field is optional: an unanswered question is `None`. The detection
/// rules substitute conservative defaults for missing amounts rather than
/// refusing to run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct TaxpayerYearProfile {
    #[serde(default)]
    pub worked_from_home: Option<bool>,
    #[serde(default)]
    #[schemars(description = "Number of days worked from home during the year")]
    pub work_from_home_days: Option<u32>,

    #[serde(default)]
    pub had_medical_expenses: Option<bool>,
    #[serde(default)]
    #[schemars(description = "Total eligible medical expenses paid for the household")]
    pub medical_expenses: Option<f64>,

    #[serde(default)]
    pub made_donations: Option<bool>,
    #[serde(default)]
    pub donation_amount: Option<f64>,

    #[serde(default)]
    pub paid_childcare: Option<bool>,
    #[serde(default)]
    pub childcare_expenses: Option<f64>,
    #[serde(default)]
    pub number_of_children: Option<u32>,

    #[serde(default)]
    pub paid_student_loan_interest: Option<bool>,
    #[serde(default)]
    pub student_loan_interest: Option<f64>,

    #[serde(default)]
    pub moved_for_work: Option<bool>,
    #[serde(default)]
    #[schemars(description = "How much closer (in km) the new home is to the new work or school location")]
    pub moving_distance_km: Option<f64>,
    #[serde(default)]
    pub moving_expenses: Option<f64>,

    #[serde(default)]
    pub has_disability: Option<bool>,
    #[serde(default)]
    pub is_caregiver: Option<bool>,

    #[serde(default)]
    pub net_income: Option<f64>,
    #[serde(default)]
    pub province: Option<Province>,
}

impl TaxpayerYearProfile {
    pub fn answered_field_count(&self) -> usize {
        let flags = [
            self.worked_from_home,
            self.had_medical_expenses,
            self.made_donations,
            self.paid_childcare,
            self.paid_student_loan_interest,
            self.moved_for_work,
            self.has_disability,
            self.is_caregiver,
        ];
        let amounts = [
            self.medical_expenses,
            self.donation_amount,
            self.childcare_expenses,
            self.student_loan_interest,
            self.moving_distance_km,
            self.moving_expenses,
            self.net_income,
        ];
        let counts = [self.work_from_home_days, self.number_of_children];

        flags.iter().filter(|v| v.is_some()).count()
            + amounts.iter().filter(|v| v.is_some()).count()
            + counts.iter().filter(|v| v.is_some()).count()
            + usize::from(self.province.is_some())
    }

    /// More than five answered questions.
    pub fn is_substantially_answered(&self) -> bool {
        self.answered_field_count() > 5
    }

    pub fn validate(&self, year: i32) -> Result<()> {
        let amounts = [
            ("medical_expenses", self.medical_expenses),
            ("donation_amount", self.donation_amount),
            ("childcare_expenses", self.childcare_expenses),
            ("student_loan_interest", self.student_loan_interest),
            ("moving_distance_km", self.moving_distance_km),
            ("moving_expenses", self.moving_expenses),
        ];
        for (field, value) in amounts {
            check_amount(field, year, value)?;
        }

        // Net income can legitimately be negative (business losses), but never NaN.
        if let Some(value) = self.net_income {
            if !value.is_finite() {
                return Err(TaxEngineError::InvalidAmount {
                    field: "net_income".to_string(),
                    year,
                    value,
                });
            }
        }

        Ok(())
    }
}

/// Structured extraction of an uploaded Notice of Assessment.
///
/// Produced by an external document-extraction step and treated as read-only
/// evidence. `line_amounts` is keyed by CRA line number (e.g. `"33099"`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct NoaData {
    #[serde(default)]
    #[schemars(description = "Amounts claimed on the return, keyed by the five-digit CRA line number as a string (e.g. \"33099\" for medical expenses)")]
    pub line_amounts: BTreeMap<String, f64>,

    #[serde(default)]
    #[schemars(description = "RRSP deduction limit for the following year as printed on the notice")]
    pub rrsp_deduction_limit: Option<f64>,

    #[serde(default)]
    #[schemars(description = "Net income (line 23600)")]
    pub net_income: Option<f64>,

    #[serde(default)]
    #[schemars(description = "Taxable income (line 26000)")]
    pub taxable_income: Option<f64>,

    #[serde(default)]
    #[schemars(description = "Refund (positive) or balance owing (negative)")]
    pub refund_or_balance: Option<f64>,
}

impl NoaData {
    /// Amount claimed on `line`, or zero when the line is absent.
    pub fn claimed(&self, line: &str) -> f64 {
        self.line_amounts.get(line).copied().unwrap_or(0.0)
    }

    pub fn with_line(mut self, line: impl Into<String>, amount: f64) -> Self {
        self.line_amounts.insert(line.into(), amount);
        self
    }

    pub fn validate(&self, year: i32) -> Result<()> {
        for (line, amount) in &self.line_amounts {
            check_amount(&format!("NOA line {}", line), year, Some(*amount))?;
        }
        check_amount("rrsp_deduction_limit", year, self.rrsp_deduction_limit)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(NoaData)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

fn check_amount(field: &str, year: i32, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(TaxEngineError::InvalidAmount {
            field: field.to_string(),
            year,
            value: v,
        }),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FindingType {
    HomeOffice,
    MedicalExpenses,
    RrspRoom,
    Childcare,
    MovingExpenses,
    Donations,
    StudentLoanInterest,
    DisabilityTaxCredit,
    CaregiverCredit,
    TuitionCredit,
    UnionDues,
    CanadaWorkersBenefit,
    PensionSplitting,
    FirstTimeHomeBuyer,
    Other,
}

impl FindingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingType::HomeOffice => "home_office",
            FindingType::MedicalExpenses => "medical_expenses",
            FindingType::RrspRoom => "rrsp_room",
            FindingType::Childcare => "childcare",
            FindingType::MovingExpenses => "moving_expenses",
            FindingType::Donations => "donations",
            FindingType::StudentLoanInterest => "student_loan_interest",
            FindingType::DisabilityTaxCredit => "disability_tax_credit",
            FindingType::CaregiverCredit => "caregiver_credit",
            FindingType::TuitionCredit => "tuition_credit",
            FindingType::UnionDues => "union_dues",
            FindingType::CanadaWorkersBenefit => "canada_workers_benefit",
            FindingType::PensionSplitting => "pension_splitting",
            FindingType::FirstTimeHomeBuyer => "first_time_home_buyer",
            FindingType::Other => "other",
        }
    }
}

impl fmt::Display for FindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared three-level tier, used both for finding confidence and retrieval confidence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordering is `High < Medium < Low` so that an ascending sort puts the most
/// actionable findings first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Evidence {
    /// Profile answers that triggered the rule, by field name.
    pub profile_answers: BTreeMap<String, serde_json::Value>,
    /// NOA lines consulted, with the amount found (zero when absent).
    pub noa_lines: BTreeMap<String, f64>,
    /// Human readable arithmetic behind the estimate.
    pub calculation: String,
}

impl Evidence {
    pub fn answer(mut self, field: &str, value: impl Into<serde_json::Value>) -> Self {
        self.profile_answers.insert(field.to_string(), value.into());
        self
    }

    pub fn noa_line(mut self, line: &str, amount: f64) -> Self {
        self.noa_lines.insert(line.to_string(), amount);
        self
    }

    pub fn calculation(mut self, calculation: impl Into<String>) -> Self {
        self.calculation = calculation.into();
        self
    }
}

/// One potential missed deduction or credit for one tax year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct DetectionResult {
    pub finding_type: FindingType,
    pub tax_year: i32,
    pub title: String,
    pub description: String,
    pub potential_recovery_min: f64,
    pub potential_recovery_max: f64,
    pub confidence: ConfidenceLevel,
    pub priority: Priority,
    pub evidence: Evidence,
    /// Steps the taxpayer must take to actually amend the return.
    pub requirements: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FindingStatus {
    New,
    Reviewed,
    Claimed,
    Dismissed,
}

/// Storage shape of a finding, consumed by the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct TimeMachineFinding {
    pub user_id: String,
    pub tax_year: i32,
    pub finding_type: FindingType,
    pub title: String,
    pub description: String,
    pub potential_recovery_min: f64,
    pub potential_recovery_max: f64,
    pub confidence: ConfidenceLevel,
    pub priority: Priority,
    pub evidence: serde_json::Value,
    pub requirements: Vec<String>,
    pub status: FindingStatus,
}

impl DetectionResult {
    pub fn to_record(&self, user_id: &str) -> Result<TimeMachineFinding> {
        Ok(TimeMachineFinding {
            user_id: user_id.to_string(),
            tax_year: self.tax_year,
            finding_type: self.finding_type,
            title: self.title.clone(),
            description: self.description.clone(),
            potential_recovery_min: self.potential_recovery_min,
            potential_recovery_max: self.potential_recovery_max,
            confidence: self.confidence,
            priority: self.priority,
            evidence: serde_json::to_value(&self.evidence)?,
            requirements: self.requirements.clone(),
            status: FindingStatus::New,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_province_parsing() {
        assert_eq!("on".parse::<Province>().unwrap(), Province::Ontario);
        assert_eq!("Quebec".parse::<Province>().unwrap(), Province::Quebec);
        assert_eq!(
            " british columbia ".parse::<Province>().unwrap(),
            Province::BritishColumbia
        );
        assert!("XX".parse::<Province>().is_err());
    }

    #[test]
    fn test_province_serializes_as_code() {
        let json = serde_json::to_string(&Province::NovaScotia).unwrap();
        assert_eq!(json, "\"NS\"");
        let parsed: Province = serde_json::from_str("\"sk\"").unwrap();
        assert_eq!(parsed, Province::Saskatchewan);
    }

    #[test]
    fn test_answered_field_count() {
        let mut profile = TaxpayerYearProfile::default();
        assert_eq!(profile.answered_field_count(), 0);
        assert!(!profile.is_substantially_answered());

        profile.worked_from_home = Some(false);
        profile.work_from_home_days = Some(0);
        profile.net_income = Some(70_000.0);
        profile.province = Some(Province::Ontario);
        profile.has_disability = Some(false);
        assert_eq!(profile.answered_field_count(), 5);
        assert!(!profile.is_substantially_answered());

        profile.is_caregiver = Some(true);
        assert!(profile.is_substantially_answered());
    }

    #[test]
    fn test_profile_deserializes_sparse_json() {
        let profile: TaxpayerYearProfile =
            serde_json::from_str(r#"{"worked_from_home": true, "province": "ON"}"#).unwrap();
        assert_eq!(profile.worked_from_home, Some(true));
        assert_eq!(profile.province, Some(Province::Ontario));
        assert_eq!(profile.work_from_home_days, None);
    }

    #[test]
    fn test_negative_amount_rejected() {
        let profile = TaxpayerYearProfile {
            donation_amount: Some(-5.0),
            ..Default::default()
        };
        assert!(profile.validate(2023).is_err());

        let business_loss = TaxpayerYearProfile {
            net_income: Some(-12_000.0),
            ..Default::default()
        };
        assert!(business_loss.validate(2023).is_ok());
    }

    #[test]
    fn test_noa_claimed_defaults_to_zero() {
        let noa = NoaData::default().with_line("33099", 1_250.0);
        assert_eq!(noa.claimed("33099"), 1_250.0);
        assert_eq!(noa.claimed("34900"), 0.0);
    }

    #[test]
    fn test_noa_schema_generation() {
        let schema_json = NoaData::schema_as_json().unwrap();
        assert!(schema_json.contains("line_amounts"));
        assert!(schema_json.contains("rrsp_deduction_limit"));
    }

    #[test]
    fn test_priority_ordering() {
        let mut priorities = vec![Priority::Low, Priority::High, Priority::Medium];
        priorities.sort();
        assert_eq!(priorities, vec![Priority::High, Priority::Medium, Priority::Low]);
    }

    #[test]
    fn test_record_conversion() {
        let result = DetectionResult {
            finding_type: FindingType::Donations,
            tax_year: 2022,
            title: "Unclaimed donations".to_string(),
            description: String::new(),
            potential_recovery_min: 75.0,
            potential_recovery_max: 150.0,
            confidence: ConfidenceLevel::High,
            priority: Priority::Medium,
            evidence: Evidence::default().answer("made_donations", true),
            requirements: vec!["Gather receipts".to_string()],
        };

        let record = result.to_record("user-42").unwrap();
        assert_eq!(record.user_id, "user-42");
        assert_eq!(record.status, FindingStatus::New);
        assert_eq!(record.evidence["profile_answers"]["made_donations"], true);

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"finding_type\":\"donations\""));
        assert!(json.contains("\"status\":\"new\""));
    }
}
