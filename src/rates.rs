//! Rate tables used by the detection rules.
//!
//! Federal brackets are the 2024 thresholds. Provincial values are a single
//! constant per province: an "adder" approximating the provincial share of a
//! typical marginal rate, and the lowest provincial bracket rate used for
//! non-refundable credits.

use crate::schema::Province;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const FEDERAL_CREDIT_RATE: f64 = 0.15;
pub const CONSERVATIVE_DEDUCTION_RATE: f64 = 0.20;
pub const DEFAULT_NET_INCOME: f64 = 60_000.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FederalBracket {
    /// Inclusive upper bound of the bracket; `None` for the top bracket.
    pub up_to: Option<f64>,
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxRateTable {
    pub federal_brackets: Vec<FederalBracket>,
    pub provincial_adders: BTreeMap<Province, f64>,
    pub provincial_credit_rates: BTreeMap<Province, f64>,
    /// Used for both maps when the province is unknown or unlisted.
    pub fallback_provincial_rate: f64,
}

impl Default for TaxRateTable {
    fn default() -> Self {
        let federal_brackets = vec![
            FederalBracket { up_to: Some(55_867.0), rate: 0.15 },
            FederalBracket { up_to: Some(111_733.0), rate: 0.205 },
            FederalBracket { up_to: Some(173_205.0), rate: 0.26 },
            FederalBracket { up_to: Some(246_752.0), rate: 0.29 },
            FederalBracket { up_to: None, rate: 0.33 },
        ];

        let provincial_adders = BTreeMap::from([
            (Province::Alberta, 0.10),
            (Province::BritishColumbia, 0.077),
            (Province::Manitoba, 0.1275),
            (Province::NewBrunswick, 0.14),
            (Province::NewfoundlandAndLabrador, 0.145),
            (Province::NovaScotia, 0.1495),
            (Province::NorthwestTerritories, 0.086),
            (Province::Nunavut, 0.07),
            (Province::Ontario, 0.0915),
            (Province::PrinceEdwardIsland, 0.138),
            (Province::Quebec, 0.19),
            (Province::Saskatchewan, 0.125),
            (Province::Yukon, 0.09),
        ]);

        let provincial_credit_rates = BTreeMap::from([
            (Province::Alberta, 0.10),
            (Province::BritishColumbia, 0.0506),
            (Province::Manitoba, 0.108),
            (Province::NewBrunswick, 0.094),
            (Province::NewfoundlandAndLabrador, 0.087),
            (Province::NovaScotia, 0.0879),
            (Province::NorthwestTerritories, 0.059),
            (Province::Nunavut, 0.04),
            (Province::Ontario, 0.0505),
            (Province::PrinceEdwardIsland, 0.0965),
            (Province::Quebec, 0.14),
            (Province::Saskatchewan, 0.105),
            (Province::Yukon, 0.064),
        ]);

        Self {
            federal_brackets,
            provincial_adders,
            provincial_credit_rates,
            fallback_provincial_rate: 0.10,
        }
    }
}

impl TaxRateTable {
    pub fn federal_rate(&self, net_income: f64) -> f64 {
        self.federal_brackets
            .iter()
            .find(|b| b.up_to.map_or(true, |limit| net_income <= limit))
            .or_else(|| self.federal_brackets.last())
            .map(|b| b.rate)
            .unwrap_or(FEDERAL_CREDIT_RATE)
    }

    pub fn provincial_adder(&self, province: Option<Province>) -> f64 {
        province
            .and_then(|p| self.provincial_adders.get(&p).copied())
            .unwrap_or(self.fallback_provincial_rate)
    }

    pub fn marginal_rate(&self, net_income: f64, province: Option<Province>) -> f64 {
        self.federal_rate(net_income) + self.provincial_adder(province)
    }

    pub fn provincial_credit_rate(&self, province: Option<Province>) -> f64 {
        province
            .and_then(|p| self.provincial_credit_rates.get(&p).copied())
            .unwrap_or(self.fallback_provincial_rate)
    }

    /// Combined federal + provincial rate applied to non-refundable credits.
    pub fn credit_rate(&self, province: Option<Province>) -> f64 {
        FEDERAL_CREDIT_RATE + self.provincial_credit_rate(province)
    }
}

pub fn default_rates() -> &'static TaxRateTable {
    static RATES: OnceLock<TaxRateTable> = OnceLock::new();
    RATES.get_or_init(TaxRateTable::default)
}

pub fn get_marginal_rate(net_income: f64, province: Option<Province>) -> f64 {
    default_rates().marginal_rate(net_income, province)
}

pub fn get_provincial_credit_rate(province: Option<Province>) -> f64 {
    default_rates().provincial_credit_rate(province)
}

const FIRST_INDEXED_YEAR: i32 = 2014;

// Indexed by year - 2014, through 2024.
const MEDICAL_EXPENSE_THRESHOLDS: [f64; 11] = [
    2_171.0, 2_208.0, 2_237.0, 2_268.0, 2_302.0, 2_352.0, 2_397.0, 2_421.0, 2_479.0, 2_635.0,
    2_759.0,
];

const DISABILITY_AMOUNTS: [f64; 11] = [
    7_766.0, 7_899.0, 8_001.0, 8_113.0, 8_235.0, 8_416.0, 8_576.0, 8_662.0, 8_870.0, 9_428.0,
    9_872.0,
];

// The Canada caregiver amount replaced the older caregiver credits in 2017;
// earlier years reuse the 2017 figure.
const CAREGIVER_AMOUNTS: [f64; 11] = [
    6_883.0, 6_883.0, 6_883.0, 6_883.0, 6_986.0, 7_140.0, 7_276.0, 7_348.0, 7_525.0, 7_999.0,
    8_375.0,
];

fn indexed(table: &[f64; 11], year: i32) -> f64 {
    let idx = year
        .saturating_sub(FIRST_INDEXED_YEAR)
        .clamp(0, table.len() as i32 - 1) as usize;
    table[idx]
}

/// Fixed dollar cap on the 3%-of-net-income medical expense threshold.
pub fn medical_expense_threshold(year: i32) -> f64 {
    indexed(&MEDICAL_EXPENSE_THRESHOLDS, year)
}

pub fn disability_amount(year: i32) -> f64 {
    indexed(&DISABILITY_AMOUNTS, year)
}

pub fn caregiver_amount(year: i32) -> f64 {
    indexed(&CAREGIVER_AMOUNTS, year)
}

pub fn round_dollars(value: f64) -> f64 {
    value.round()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_federal_bracket_boundaries() {
        let rates = TaxRateTable::default();
        assert_eq!(rates.federal_rate(0.0), 0.15);
        assert_eq!(rates.federal_rate(55_867.0), 0.15);
        assert_eq!(rates.federal_rate(55_868.0), 0.205);
        assert_eq!(rates.federal_rate(111_733.0), 0.205);
        assert_eq!(rates.federal_rate(150_000.0), 0.26);
        assert_eq!(rates.federal_rate(200_000.0), 0.29);
        assert_eq!(rates.federal_rate(1_000_000.0), 0.33);
    }

    #[test]
    fn test_marginal_rate_adds_provincial_share() {
        let rate = get_marginal_rate(60_000.0, Some(Province::Ontario));
        assert!((rate - 0.2965).abs() < 1e-9);

        let unknown = get_marginal_rate(60_000.0, None);
        assert!((unknown - 0.305).abs() < 1e-9);
    }

    #[test]
    fn test_provincial_credit_rate() {
        assert_eq!(get_provincial_credit_rate(Some(Province::Quebec)), 0.14);
        assert_eq!(get_provincial_credit_rate(Some(Province::Nunavut)), 0.04);
        assert_eq!(get_provincial_credit_rate(None), 0.10);
    }

    #[test]
    fn test_every_province_has_rates() {
        let rates = TaxRateTable::default();
        for province in Province::ALL {
            assert!(rates.provincial_adders.contains_key(&province));
            assert!(rates.provincial_credit_rates.contains_key(&province));
        }
    }

    #[test]
    fn test_year_tables_clamp() {
        assert_eq!(medical_expense_threshold(2023), 2_635.0);
        assert_eq!(medical_expense_threshold(2030), 2_759.0);
        assert_eq!(disability_amount(2010), 7_766.0);
        assert_eq!(caregiver_amount(2024), 8_375.0);
    }

    #[test]
    fn test_year_tables_accept_extreme_years() {
        assert_eq!(disability_amount(i32::MIN), 7_766.0);
        assert_eq!(caregiver_amount(i32::MAX), 8_375.0);
        assert_eq!(medical_expense_threshold(i32::MIN), 2_171.0);
    }

    #[test]
    fn test_rate_table_round_trips_through_json() {
        let rates = TaxRateTable::default();
        let json = serde_json::to_string(&rates).unwrap();
        assert!(json.contains("\"ON\""));
        let parsed: TaxRateTable = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, rates);
    }
}
