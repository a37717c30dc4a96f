use crate::detection::run_detection_with_rates;
use crate::error::{Result, TaxEngineError};
use crate::rates::{default_rates, TaxRateTable};
use crate::schema::{DetectionResult, NoaData, TaxpayerYearProfile, TimeMachineFinding};
use chrono::{DateTime, Utc};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// CRA accepts adjustment requests for the previous ten years.
pub const EARLIEST_SUPPORTED_YEAR: i32 = 2014;
/// Latest year covered by the built-in rate tables.
pub const LATEST_SUPPORTED_YEAR: i32 = 2024;

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TimeMachineInput {
    #[schemars(description = "Tax years selected for scanning, in any order")]
    pub years: Vec<i32>,

    #[serde(default)]
    #[schemars(description = "Wizard answers keyed by tax year. Years without answers are scanned with an empty profile.")]
    pub profiles: BTreeMap<i32, TaxpayerYearProfile>,

    #[serde(default)]
    #[schemars(description = "Notice of Assessment extractions keyed by tax year")]
    pub noa_data: BTreeMap<i32, NoaData>,
}

impl TimeMachineInput {
    pub fn new(years: impl IntoIterator<Item = i32>) -> Self {
        Self {
            years: years.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn with_profile(mut self, year: i32, profile: TaxpayerYearProfile) -> Self {
        self.profiles.insert(year, profile);
        self
    }

    pub fn with_noa(mut self, year: i32, noa: NoaData) -> Self {
        self.noa_data.insert(year, noa);
        self
    }

    /// Selected years, most recent first, without duplicates.
    pub fn years_descending(&self) -> Vec<i32> {
        let mut years = self.years.clone();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        years
    }

    pub fn validate(&self) -> Result<()> {
        if self.years.is_empty() {
            return Err(TaxEngineError::NoYearsSelected);
        }

        for &year in &self.years {
            if !(EARLIEST_SUPPORTED_YEAR..=LATEST_SUPPORTED_YEAR).contains(&year) {
                return Err(TaxEngineError::UnsupportedTaxYear {
                    year,
                    earliest: EARLIEST_SUPPORTED_YEAR,
                    latest: LATEST_SUPPORTED_YEAR,
                });
            }
        }

        for (year, profile) in &self.profiles {
            profile.validate(*year)?;
        }
        for (year, noa) in &self.noa_data {
            noa.validate(*year)?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct YearAnalysisBreakdown {
    pub tax_year: i32,
    pub findings_count: usize,
    pub recovery_min: f64,
    pub recovery_max: f64,
    pub has_noa: bool,
    /// More than five profile questions answered for the year.
    pub profile_complete: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TimeMachineAnalysis {
    pub years_analyzed: Vec<i32>,
    pub findings: Vec<DetectionResult>,
    pub total_findings: usize,
    pub total_recovery_min: f64,
    pub total_recovery_max: f64,
    pub year_breakdown: Vec<YearAnalysisBreakdown>,
    pub status: AnalysisStatus,
    pub analyzed_at: DateTime<Utc>,
}

impl TimeMachineAnalysis {
    pub fn findings_for_year(&self, year: i32) -> impl Iterator<Item = &DetectionResult> {
        self.findings.iter().filter(move |f| f.tax_year == year)
    }

    pub fn to_records(&self, user_id: &str) -> Result<Vec<TimeMachineFinding>> {
        self.findings
            .iter()
            .map(|finding| finding.to_record(user_id))
            .collect()
    }
}

/// Scans every requested year and rolls the findings up.
///
/// Years are processed most recent first. Each year is independent: findings
/// are not de-duplicated across years.
pub fn run_full_analysis(input: &TimeMachineInput) -> TimeMachineAnalysis {
    run_full_analysis_with_rates(default_rates(), input)
}

pub fn run_full_analysis_with_rates(
    rates: &TaxRateTable,
    input: &TimeMachineInput,
) -> TimeMachineAnalysis {
    let empty_profile = TaxpayerYearProfile::default();
    let years = input.years_descending();

    let mut findings = Vec::new();
    let mut year_breakdown = Vec::with_capacity(years.len());
    let mut total_recovery_min = 0.0;
    let mut total_recovery_max = 0.0;

    for &year in &years {
        let profile = input.profiles.get(&year).unwrap_or(&empty_profile);
        let noa = input.noa_data.get(&year);

        let year_findings = run_detection_with_rates(rates, profile, noa, year);

        let recovery_min: f64 = year_findings.iter().map(|f| f.potential_recovery_min).sum();
        let recovery_max: f64 = year_findings.iter().map(|f| f.potential_recovery_max).sum();
        total_recovery_min += recovery_min;
        total_recovery_max += recovery_max;

        debug!(
            "Year {}: {} findings, recovery ${:.0}-${:.0}",
            year,
            year_findings.len(),
            recovery_min,
            recovery_max
        );

        year_breakdown.push(YearAnalysisBreakdown {
            tax_year: year,
            findings_count: year_findings.len(),
            recovery_min,
            recovery_max,
            has_noa: noa.is_some(),
            profile_complete: profile.is_substantially_answered(),
        });

        findings.extend(year_findings);
    }

    TimeMachineAnalysis {
        years_analyzed: years,
        total_findings: findings.len(),
        findings,
        total_recovery_min,
        total_recovery_max,
        year_breakdown,
        status: AnalysisStatus::Completed,
        analyzed_at: Utc::now(),
    }
}

pub struct TimeMachineAnalyzer<'a> {
    rates: &'a TaxRateTable,
}

impl Default for TimeMachineAnalyzer<'static> {
    fn default() -> Self {
        Self::new(default_rates())
    }
}

impl<'a> TimeMachineAnalyzer<'a> {
    pub fn new(rates: &'a TaxRateTable) -> Self {
        Self { rates }
    }

    /// Validates the input, then runs [`run_full_analysis_with_rates`].
    pub fn analyze(&self, input: &TimeMachineInput) -> Result<TimeMachineAnalysis> {
        input.validate()?;

        info!(
            "Running time machine analysis for {} year(s)",
            input.years_descending().len()
        );

        let analysis = run_full_analysis_with_rates(self.rates, input);

        info!(
            "Analysis complete: {} findings, potential recovery ${:.0}-${:.0}",
            analysis.total_findings, analysis.total_recovery_min, analysis.total_recovery_max
        );

        Ok(analysis)
    }
}
