//! Detection rules for missed deductions and credits.
//!
//! Each rule is a pair of plain functions: a cheap `should_check` gate and a
//! `detect` step that performs the materiality check and estimates recovery.
//! Rules are registered in [`DETECTION_RULES`] and dispatched by
//! [`crate::detection::run_detection`].
//!
//! Recovery is always a range. Deductions are valued between a conservative
//! 20% and the taxpayer's marginal rate; credits between the 15% federal rate
//! and the federal + provincial credit rate.

use crate::rates::{
    caregiver_amount, disability_amount, medical_expense_threshold, round_dollars,
    TaxRateTable, CONSERVATIVE_DEDUCTION_RATE, DEFAULT_NET_INCOME, FEDERAL_CREDIT_RATE,
};
use crate::schema::{
    ConfidenceLevel, DetectionResult, Evidence, FindingType, NoaData, Priority,
    TaxpayerYearProfile,
};

pub mod lines {
    pub const OTHER_EMPLOYMENT_EXPENSES: &str = "22900";
    pub const MEDICAL_EXPENSES: &str = "33099";
    pub const RRSP_DEDUCTION: &str = "20800";
    pub const DONATIONS: &str = "34900";
    pub const CHILDCARE_EXPENSES: &str = "21400";
    pub const STUDENT_LOAN_INTEREST: &str = "31900";
    pub const MOVING_EXPENSES: &str = "21900";
    pub const DISABILITY_AMOUNT: &str = "31600";
    pub const CAREGIVER_AMOUNT: &str = "30450";
}

/// Inputs shared by every rule for one tax year.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub profile: &'a TaxpayerYearProfile,
    pub noa: Option<&'a NoaData>,
    pub year: i32,
    pub rates: &'a TaxRateTable,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        profile: &'a TaxpayerYearProfile,
        noa: Option<&'a NoaData>,
        year: i32,
        rates: &'a TaxRateTable,
    ) -> Self {
        Self {
            profile,
            noa,
            year,
            rates,
        }
    }

    pub fn claimed(&self, line: &str) -> f64 {
        self.noa.map_or(0.0, |noa| noa.claimed(line))
    }

    /// Net income from the profile, then the NOA, then a fixed default.
    /// The flag reports whether a real figure was available.
    pub fn net_income(&self) -> (f64, bool) {
        self.profile
            .net_income
            .or_else(|| self.noa.and_then(|n| n.net_income))
            .map(|v| (v, true))
            .unwrap_or((DEFAULT_NET_INCOME, false))
    }

    pub fn marginal_rate(&self) -> f64 {
        let (income, _) = self.net_income();
        self.rates.marginal_rate(income, self.profile.province)
    }

    pub fn credit_rate(&self) -> f64 {
        self.rates.credit_rate(self.profile.province)
    }

    fn deduction_range(&self, amount: f64) -> (f64, f64) {
        recovery_range(amount, CONSERVATIVE_DEDUCTION_RATE, self.marginal_rate())
    }

    fn credit_range(&self, amount: f64) -> (f64, f64) {
        recovery_range(amount, FEDERAL_CREDIT_RATE, self.credit_rate())
    }
}

pub type ShouldCheckFn = fn(&RuleContext<'_>) -> bool;
pub type DetectFn = fn(&RuleContext<'_>) -> Option<DetectionResult>;

pub struct DetectionRule {
    pub finding_type: FindingType,
    pub name: &'static str,
    /// `None` means the rule applies to every year.
    pub applicable_years: Option<&'static [i32]>,
    pub should_check: ShouldCheckFn,
    pub detect: DetectFn,
}

impl DetectionRule {
    pub fn applies_to_year(&self, year: i32) -> bool {
        self.applicable_years
            .map_or(true, |years| years.contains(&year))
    }
}

pub static DETECTION_RULES: &[DetectionRule] = &[
    DetectionRule {
        finding_type: FindingType::HomeOffice,
        name: "home_office",
        applicable_years: Some(&[2020, 2021, 2022, 2023]),
        should_check: home_office_should_check,
        detect: home_office_detect,
    },
    DetectionRule {
        finding_type: FindingType::MedicalExpenses,
        name: "medical_expenses",
        applicable_years: None,
        should_check: medical_should_check,
        detect: medical_detect,
    },
    DetectionRule {
        finding_type: FindingType::RrspRoom,
        name: "rrsp_room",
        applicable_years: None,
        should_check: rrsp_should_check,
        detect: rrsp_detect,
    },
    DetectionRule {
        finding_type: FindingType::Donations,
        name: "donations",
        applicable_years: None,
        should_check: donations_should_check,
        detect: donations_detect,
    },
    DetectionRule {
        finding_type: FindingType::Childcare,
        name: "childcare",
        applicable_years: None,
        should_check: childcare_should_check,
        detect: childcare_detect,
    },
    DetectionRule {
        finding_type: FindingType::StudentLoanInterest,
        name: "student_loan_interest",
        applicable_years: None,
        should_check: student_loan_should_check,
        detect: student_loan_detect,
    },
    DetectionRule {
        finding_type: FindingType::MovingExpenses,
        name: "moving_expenses",
        applicable_years: None,
        should_check: moving_should_check,
        detect: moving_detect,
    },
    DetectionRule {
        finding_type: FindingType::DisabilityTaxCredit,
        name: "disability_tax_credit",
        applicable_years: None,
        should_check: disability_should_check,
        detect: disability_detect,
    },
    DetectionRule {
        finding_type: FindingType::CaregiverCredit,
        name: "caregiver_credit",
        applicable_years: None,
        should_check: caregiver_should_check,
        detect: caregiver_detect,
    },
];

pub fn rule_for(finding_type: FindingType) -> Option<&'static DetectionRule> {
    DETECTION_RULES
        .iter()
        .find(|rule| rule.finding_type == finding_type)
}

/// Mirrors `value || fallback`: unanswered and zero both fall back.
fn answered_amount(value: Option<f64>, fallback: f64) -> (f64, bool) {
    match value {
        Some(v) if v > 0.0 => (v, true),
        _ => (fallback, false),
    }
}

fn answered_count(value: Option<u32>, fallback: u32) -> (u32, bool) {
    match value {
        Some(v) if v > 0 => (v, true),
        _ => (fallback, false),
    }
}

fn recovery_range(amount: f64, conservative_rate: f64, upper_rate: f64) -> (f64, f64) {
    let min = round_dollars(amount * conservative_rate).max(0.0);
    let max = round_dollars(amount * upper_rate).max(min);
    (min, max)
}

fn money(value: f64) -> String {
    format!("${:.0}", value)
}

// ---------------------------------------------------------------------------
// Home office (temporary flat rate method)
// ---------------------------------------------------------------------------

const HOME_OFFICE_DAILY_RATE: f64 = 2.0;
const HOME_OFFICE_DEFAULT_DAYS: u32 = 200;
const HOME_OFFICE_FLOOR: f64 = 100.0;

fn home_office_cap(year: i32) -> f64 {
    if year <= 2020 {
        400.0
    } else {
        500.0
    }
}

fn home_office_should_check(ctx: &RuleContext<'_>) -> bool {
    ctx.profile.worked_from_home == Some(true)
}

fn home_office_detect(ctx: &RuleContext<'_>) -> Option<DetectionResult> {
    let (days, days_known) =
        answered_count(ctx.profile.work_from_home_days, HOME_OFFICE_DEFAULT_DAYS);
    let cap = home_office_cap(ctx.year);
    let expected = (f64::from(days) * HOME_OFFICE_DAILY_RATE).min(cap);

    let claimed = ctx.claimed(lines::OTHER_EMPLOYMENT_EXPENSES);
    if claimed >= expected || expected < HOME_OFFICE_FLOOR {
        return None;
    }

    let (min, max) = ctx.deduction_range(expected);

    Some(DetectionResult {
        finding_type: FindingType::HomeOffice,
        tax_year: ctx.year,
        title: format!("Home office expenses ({})", ctx.year),
        description: format!(
            "You worked from home {} days in {} but no home office deduction appears on your return. \
             The temporary flat rate method allows {} per day up to {}.",
            days,
            ctx.year,
            money(HOME_OFFICE_DAILY_RATE),
            money(cap)
        ),
        potential_recovery_min: min,
        potential_recovery_max: max,
        confidence: if days_known {
            ConfidenceLevel::High
        } else {
            ConfidenceLevel::Medium
        },
        priority: Priority::Medium,
        evidence: Evidence::default()
            .answer("worked_from_home", true)
            .answer("work_from_home_days", days)
            .noa_line(lines::OTHER_EMPLOYMENT_EXPENSES, claimed)
            .calculation(format!(
                "min({} days x {}, {}) = {}",
                days,
                money(HOME_OFFICE_DAILY_RATE),
                money(cap),
                money(expected)
            )),
        requirements: vec![
            "Count the days you worked from home more than 50% of the time for at least four consecutive weeks".to_string(),
            "Complete Form T777S using the temporary flat rate method".to_string(),
            format!("Request a change to your {} return (ReFILE or My Account)", ctx.year),
        ],
    })
}

// ---------------------------------------------------------------------------
// Medical expenses
// ---------------------------------------------------------------------------

const MEDICAL_DEFAULT_TOTAL: f64 = 3_000.0;
const MEDICAL_INCOME_PERCENT: f64 = 0.03;
const MEDICAL_FLOOR: f64 = 100.0;
const ALREADY_CLAIMED_RATIO: f64 = 0.8;

fn medical_should_check(ctx: &RuleContext<'_>) -> bool {
    ctx.profile.had_medical_expenses == Some(true)
}

fn medical_detect(ctx: &RuleContext<'_>) -> Option<DetectionResult> {
    let (total, total_known) = answered_amount(ctx.profile.medical_expenses, MEDICAL_DEFAULT_TOTAL);
    let (income, income_known) = ctx.net_income();
    let threshold = (income.max(0.0) * MEDICAL_INCOME_PERCENT).min(medical_expense_threshold(ctx.year));
    let eligible = total - threshold;
    if eligible < MEDICAL_FLOOR {
        return None;
    }

    let claimed = ctx.claimed(lines::MEDICAL_EXPENSES);
    if claimed >= eligible * ALREADY_CLAIMED_RATIO {
        return None;
    }

    let (min, max) = ctx.credit_range(eligible);

    Some(DetectionResult {
        finding_type: FindingType::MedicalExpenses,
        tax_year: ctx.year,
        title: format!("Medical expense tax credit ({})", ctx.year),
        description: format!(
            "You reported {} in medical expenses for {}. After the {} threshold, {} may qualify for the medical expense tax credit.",
            money(total),
            ctx.year,
            money(threshold),
            money(eligible)
        ),
        potential_recovery_min: min,
        potential_recovery_max: max,
        confidence: if total_known && income_known {
            ConfidenceLevel::High
        } else {
            ConfidenceLevel::Medium
        },
        priority: Priority::Medium,
        evidence: Evidence::default()
            .answer("had_medical_expenses", true)
            .answer("medical_expenses", total)
            .answer("net_income", income)
            .noa_line(lines::MEDICAL_EXPENSES, claimed)
            .calculation(format!(
                "{} - min(3% of {}, {}) = {}",
                money(total),
                money(income),
                money(medical_expense_threshold(ctx.year)),
                money(eligible)
            )),
        requirements: vec![
            "Collect receipts for all eligible medical expenses in any 12-month period ending in the year".to_string(),
            "Claim the expenses on the return of the lower-income spouse if that produces a larger credit".to_string(),
            format!("Request a change to your {} return", ctx.year),
        ],
    })
}

// ---------------------------------------------------------------------------
// RRSP contribution room
// ---------------------------------------------------------------------------

const RRSP_ROOM_THRESHOLD: f64 = 10_000.0;
const RRSP_CONSERVATIVE_CONTRIBUTION: f64 = 5_000.0;

fn unused_rrsp_room(ctx: &RuleContext<'_>) -> Option<(f64, f64, f64)> {
    let limit = ctx.noa?.rrsp_deduction_limit?;
    let claimed = ctx.claimed(lines::RRSP_DEDUCTION);
    Some((limit, claimed, limit - claimed))
}

fn rrsp_should_check(ctx: &RuleContext<'_>) -> bool {
    unused_rrsp_room(ctx).is_some_and(|(_, _, room)| room > RRSP_ROOM_THRESHOLD)
}

fn rrsp_detect(ctx: &RuleContext<'_>) -> Option<DetectionResult> {
    let (limit, claimed, room) = unused_rrsp_room(ctx)?;
    if room <= RRSP_ROOM_THRESHOLD {
        return None;
    }

    let conservative = room.min(RRSP_CONSERVATIVE_CONTRIBUTION);
    let min = round_dollars(conservative * CONSERVATIVE_DEDUCTION_RATE);
    let max = round_dollars(room * ctx.marginal_rate()).max(min);

    Some(DetectionResult {
        finding_type: FindingType::RrspRoom,
        tax_year: ctx.year,
        title: format!("Unused RRSP room ({})", ctx.year),
        description: format!(
            "Your notice of assessment shows {} of unused RRSP deduction room. Contributions can be deducted against income taxed at your marginal rate.",
            money(room)
        ),
        potential_recovery_min: min,
        potential_recovery_max: max,
        confidence: ConfidenceLevel::High,
        priority: Priority::Low,
        evidence: Evidence::default()
            .noa_line(lines::RRSP_DEDUCTION, claimed)
            .noa_line("rrsp_deduction_limit", limit)
            .calculation(format!(
                "{} limit - {} deducted = {} room",
                money(limit),
                money(claimed),
                money(room)
            )),
        requirements: vec![
            "Contribute to an RRSP before the deadline (60 days after year end) to deduct in the current year".to_string(),
            "Unused contributions can be carried forward and deducted in a higher-income year".to_string(),
        ],
    })
}

// ---------------------------------------------------------------------------
// Charitable donations
// ---------------------------------------------------------------------------

const DONATIONS_DEFAULT_AMOUNT: f64 = 500.0;
const DONATIONS_LOW_TIER: f64 = 200.0;
const DONATIONS_LOW_RATE: f64 = 0.15;
const DONATIONS_HIGH_RATE: f64 = 0.29;
const DONATIONS_FLOOR: f64 = 100.0;

fn donations_should_check(ctx: &RuleContext<'_>) -> bool {
    ctx.profile.made_donations == Some(true)
}

fn donations_detect(ctx: &RuleContext<'_>) -> Option<DetectionResult> {
    let (amount, amount_known) =
        answered_amount(ctx.profile.donation_amount, DONATIONS_DEFAULT_AMOUNT);
    let claimed = ctx.claimed(lines::DONATIONS);
    if claimed >= amount * ALREADY_CLAIMED_RATIO || amount < DONATIONS_FLOOR {
        return None;
    }

    let federal = amount.min(DONATIONS_LOW_TIER) * DONATIONS_LOW_RATE
        + (amount - DONATIONS_LOW_TIER).max(0.0) * DONATIONS_HIGH_RATE;
    let provincial = amount * ctx.rates.provincial_credit_rate(ctx.profile.province);

    let min = round_dollars(amount * FEDERAL_CREDIT_RATE);
    let max = round_dollars(federal + provincial).max(min);

    Some(DetectionResult {
        finding_type: FindingType::Donations,
        tax_year: ctx.year,
        title: format!("Unclaimed charitable donations ({})", ctx.year),
        description: format!(
            "You reported {} in donations for {} but {} was claimed. Donations over $200 earn a 29% federal credit.",
            money(amount),
            ctx.year,
            money(claimed)
        ),
        potential_recovery_min: min,
        potential_recovery_max: max,
        confidence: if amount_known {
            ConfidenceLevel::High
        } else {
            ConfidenceLevel::Medium
        },
        priority: Priority::Medium,
        evidence: Evidence::default()
            .answer("made_donations", true)
            .answer("donation_amount", amount)
            .noa_line(lines::DONATIONS, claimed)
            .calculation(format!(
                "federal {} + provincial {}",
                money(federal),
                money(provincial)
            )),
        requirements: vec![
            "Gather official donation receipts from registered charities".to_string(),
            "Unclaimed donations can also be carried forward up to five years".to_string(),
            format!("Request a change to your {} return", ctx.year),
        ],
    })
}

// ---------------------------------------------------------------------------
// Childcare expenses
// ---------------------------------------------------------------------------

const CHILDCARE_DEFAULT_EXPENSES: f64 = 5_000.0;
const CHILDCARE_LIMIT_PER_CHILD: f64 = 8_000.0;
const CHILDCARE_INCOME_FRACTION: f64 = 2.0 / 3.0;
const CHILDCARE_FLOOR: f64 = 500.0;

fn childcare_should_check(ctx: &RuleContext<'_>) -> bool {
    ctx.profile.paid_childcare == Some(true)
}

fn childcare_detect(ctx: &RuleContext<'_>) -> Option<DetectionResult> {
    let (expenses, expenses_known) =
        answered_amount(ctx.profile.childcare_expenses, CHILDCARE_DEFAULT_EXPENSES);
    let (children, children_known) = answered_count(ctx.profile.number_of_children, 1);
    let (income, _) = ctx.net_income();

    let deduction = expenses
        .min(CHILDCARE_LIMIT_PER_CHILD * f64::from(children))
        .min(income.max(0.0) * CHILDCARE_INCOME_FRACTION);

    let claimed = ctx.claimed(lines::CHILDCARE_EXPENSES);
    if claimed >= deduction || deduction < CHILDCARE_FLOOR {
        return None;
    }

    let (min, max) = ctx.deduction_range(deduction);

    Some(DetectionResult {
        finding_type: FindingType::Childcare,
        tax_year: ctx.year,
        title: format!("Childcare expense deduction ({})", ctx.year),
        description: format!(
            "You paid {} in childcare for {} child(ren) in {}. Up to {} may be deductible.",
            money(expenses),
            children,
            ctx.year,
            money(deduction)
        ),
        potential_recovery_min: min,
        potential_recovery_max: max,
        confidence: if expenses_known && children_known {
            ConfidenceLevel::High
        } else {
            ConfidenceLevel::Medium
        },
        priority: Priority::High,
        evidence: Evidence::default()
            .answer("paid_childcare", true)
            .answer("childcare_expenses", expenses)
            .answer("number_of_children", children)
            .noa_line(lines::CHILDCARE_EXPENSES, claimed)
            .calculation(format!(
                "min({}, {} x {}, 2/3 of {}) = {}",
                money(expenses),
                children,
                money(CHILDCARE_LIMIT_PER_CHILD),
                money(income),
                money(deduction)
            )),
        requirements: vec![
            "Obtain receipts from the daycare, camp or caregiver including their SIN or business number".to_string(),
            "Complete Form T778 (generally claimed by the lower-income spouse)".to_string(),
            format!("Request a change to your {} return", ctx.year),
        ],
    })
}

// ---------------------------------------------------------------------------
// Student loan interest
// ---------------------------------------------------------------------------

const STUDENT_LOAN_DEFAULT_INTEREST: f64 = 600.0;
const STUDENT_LOAN_FLOOR: f64 = 100.0;

fn student_loan_should_check(ctx: &RuleContext<'_>) -> bool {
    ctx.profile.paid_student_loan_interest == Some(true)
}

fn student_loan_detect(ctx: &RuleContext<'_>) -> Option<DetectionResult> {
    let (interest, interest_known) =
        answered_amount(ctx.profile.student_loan_interest, STUDENT_LOAN_DEFAULT_INTEREST);
    let claimed = ctx.claimed(lines::STUDENT_LOAN_INTEREST);
    if claimed >= interest || interest < STUDENT_LOAN_FLOOR {
        return None;
    }

    let (min, max) = ctx.credit_range(interest);

    Some(DetectionResult {
        finding_type: FindingType::StudentLoanInterest,
        tax_year: ctx.year,
        title: format!("Student loan interest credit ({})", ctx.year),
        description: format!(
            "You paid about {} of interest on a government student loan in {} that was not claimed.",
            money(interest),
            ctx.year
        ),
        potential_recovery_min: min,
        potential_recovery_max: max,
        confidence: if interest_known {
            ConfidenceLevel::High
        } else {
            ConfidenceLevel::Medium
        },
        priority: Priority::Medium,
        evidence: Evidence::default()
            .answer("paid_student_loan_interest", true)
            .answer("student_loan_interest", interest)
            .noa_line(lines::STUDENT_LOAN_INTEREST, claimed)
            .calculation(format!("{} of interest at credit rates", money(interest))),
        requirements: vec![
            "Download the interest statement from your National Student Loans Service Centre account".to_string(),
            "Only loans under the Canada Student Loans Act or provincial equivalents qualify".to_string(),
            "Unclaimed interest can be carried forward up to five years".to_string(),
        ],
    })
}

// ---------------------------------------------------------------------------
// Moving expenses
// ---------------------------------------------------------------------------

const MOVING_MIN_DISTANCE_KM: f64 = 40.0;
const MOVING_DEFAULT_DISTANCE_KM: f64 = 50.0;
const MOVING_DEFAULT_EXPENSES: f64 = 3_000.0;
const MOVING_FLOOR: f64 = 500.0;

fn moving_should_check(ctx: &RuleContext<'_>) -> bool {
    ctx.profile.moved_for_work == Some(true)
}

fn moving_detect(ctx: &RuleContext<'_>) -> Option<DetectionResult> {
    let (distance, distance_known) =
        answered_amount(ctx.profile.moving_distance_km, MOVING_DEFAULT_DISTANCE_KM);
    if distance < MOVING_MIN_DISTANCE_KM {
        return None;
    }

    let (expenses, expenses_known) =
        answered_amount(ctx.profile.moving_expenses, MOVING_DEFAULT_EXPENSES);
    let claimed = ctx.claimed(lines::MOVING_EXPENSES);
    if claimed >= expenses || expenses < MOVING_FLOOR {
        return None;
    }

    let (min, max) = ctx.deduction_range(expenses);
    let confidence = match (distance_known, expenses_known) {
        (true, true) => ConfidenceLevel::High,
        (false, false) => ConfidenceLevel::Low,
        _ => ConfidenceLevel::Medium,
    };

    Some(DetectionResult {
        finding_type: FindingType::MovingExpenses,
        tax_year: ctx.year,
        title: format!("Moving expenses ({})", ctx.year),
        description: format!(
            "You moved at least {:.0} km closer to a new work location in {}. Eligible moving costs of about {} can be deducted.",
            distance,
            ctx.year,
            money(expenses)
        ),
        potential_recovery_min: min,
        potential_recovery_max: max,
        confidence,
        priority: Priority::High,
        evidence: Evidence::default()
            .answer("moved_for_work", true)
            .answer("moving_distance_km", distance)
            .answer("moving_expenses", expenses)
            .noa_line(lines::MOVING_EXPENSES, claimed)
            .calculation(format!("{} of eligible moving costs", money(expenses))),
        requirements: vec![
            "Confirm the new home is at least 40 km closer to the new work or school location".to_string(),
            "Complete Form T1-M with receipts for transport, storage and travel costs".to_string(),
            "The deduction is limited to income earned at the new location".to_string(),
        ],
    })
}

// ---------------------------------------------------------------------------
// Disability tax credit
// ---------------------------------------------------------------------------

fn disability_should_check(ctx: &RuleContext<'_>) -> bool {
    ctx.profile.has_disability == Some(true)
}

fn disability_detect(ctx: &RuleContext<'_>) -> Option<DetectionResult> {
    let amount = disability_amount(ctx.year);
    let claimed = ctx.claimed(lines::DISABILITY_AMOUNT);
    if claimed >= amount * ALREADY_CLAIMED_RATIO {
        return None;
    }

    let (min, max) = ctx.credit_range(amount);

    Some(DetectionResult {
        finding_type: FindingType::DisabilityTaxCredit,
        tax_year: ctx.year,
        title: format!("Disability tax credit ({})", ctx.year),
        description: format!(
            "You indicated a disability in {}. The disability amount for that year is {}, and approved applicants can have prior years reassessed.",
            ctx.year,
            money(amount)
        ),
        potential_recovery_min: min,
        potential_recovery_max: max,
        confidence: ConfidenceLevel::Medium,
        priority: Priority::High,
        evidence: Evidence::default()
            .answer("has_disability", true)
            .noa_line(lines::DISABILITY_AMOUNT, claimed)
            .calculation(format!("{} disability amount at credit rates", money(amount))),
        requirements: vec![
            "Have a medical practitioner certify Form T2201".to_string(),
            "Wait for CRA approval before claiming the credit".to_string(),
            "Ask CRA to adjust up to ten prior years once approved".to_string(),
        ],
    })
}

// ---------------------------------------------------------------------------
// Canada caregiver credit
// ---------------------------------------------------------------------------

fn caregiver_should_check(ctx: &RuleContext<'_>) -> bool {
    ctx.profile.is_caregiver == Some(true)
}

fn caregiver_detect(ctx: &RuleContext<'_>) -> Option<DetectionResult> {
    let amount = caregiver_amount(ctx.year);
    let claimed = ctx.claimed(lines::CAREGIVER_AMOUNT);
    if claimed >= amount * ALREADY_CLAIMED_RATIO {
        return None;
    }

    let (min, max) = ctx.credit_range(amount);

    Some(DetectionResult {
        finding_type: FindingType::CaregiverCredit,
        tax_year: ctx.year,
        title: format!("Canada caregiver credit ({})", ctx.year),
        description: format!(
            "You supported an infirm dependant in {}. The Canada caregiver amount of up to {} may apply depending on their net income.",
            ctx.year,
            money(amount)
        ),
        potential_recovery_min: min,
        potential_recovery_max: max,
        confidence: ConfidenceLevel::Low,
        priority: Priority::Medium,
        evidence: Evidence::default()
            .answer("is_caregiver", true)
            .noa_line(lines::CAREGIVER_AMOUNT, claimed)
            .calculation(format!("{} caregiver amount at credit rates", money(amount))),
        requirements: vec![
            "Confirm the dependant relied on you for support and has an impairment".to_string(),
            "Obtain a signed statement from a medical practitioner if the impairment is not obvious".to_string(),
            "Check the dependant's net income against the reduction threshold".to_string(),
        ],
    })
}
