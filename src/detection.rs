use crate::rates::{default_rates, TaxRateTable};
use crate::rules::{RuleContext, DETECTION_RULES};
use crate::schema::{DetectionResult, NoaData, TaxpayerYearProfile};
use log::debug;
use std::cmp::Ordering;

/// Runs every applicable rule for one tax year using the built-in rate tables.
///
/// Findings are ordered most actionable first: by priority (high, medium,
/// low), then by descending `potential_recovery_max`.
pub fn run_detection(
    profile: &TaxpayerYearProfile,
    noa: Option<&NoaData>,
    year: i32,
) -> Vec<DetectionResult> {
    run_detection_with_rates(default_rates(), profile, noa, year)
}

pub fn run_detection_with_rates(
    rates: &TaxRateTable,
    profile: &TaxpayerYearProfile,
    noa: Option<&NoaData>,
    year: i32,
) -> Vec<DetectionResult> {
    let ctx = RuleContext::new(profile, noa, year, rates);

    let mut findings: Vec<DetectionResult> = DETECTION_RULES
        .iter()
        .filter(|rule| rule.applies_to_year(year))
        .filter(|rule| (rule.should_check)(&ctx))
        .filter_map(|rule| {
            let result = (rule.detect)(&ctx);
            if result.is_none() {
                debug!("Rule {} produced no finding for {}", rule.name, year);
            }
            result
        })
        .collect();

    sort_findings(&mut findings);

    debug!("{} findings detected for {}", findings.len(), year);
    findings
}

pub fn sort_findings(findings: &mut [DetectionResult]) {
    findings.sort_by(|a, b| {
        a.priority.cmp(&b.priority).then_with(|| {
            b.potential_recovery_max
                .partial_cmp(&a.potential_recovery_max)
                .unwrap_or(Ordering::Equal)
        })
    });
}
