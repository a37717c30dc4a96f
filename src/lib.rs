//! # Tax Time Machine
//!
//! Rule-based detection of missed Canadian tax deductions and credits, plus
//! confidence-aware prompt assembly for a retrieval-backed tax assistant.
//!
//! ## Core Concepts
//!
//! - **Taxpayer Year Profile**: self-reported answers for one tax year
//! - **Notice of Assessment (NOA)**: amounts CRA actually assessed, used to
//!   rule out items that were already claimed
//! - **Finding**: a potential missed deduction or credit with a `[min, max]`
//!   recovery range, never a point estimate
//! - **Time Machine Analysis**: findings for several prior years rolled up,
//!   most recent year first
//! - **Retrieval Confidence**: a `high | medium | low` grade for search
//!   results that decides how the assistant's system prompt is built
//!
//! ## Example
//!
//! ```rust
//! use tax_time_machine::*;
//!
//! let profile = TaxpayerYearProfile {
//!     worked_from_home: Some(true),
//!     work_from_home_days: Some(150),
//!     province: Some(Province::Ontario),
//!     ..Default::default()
//! };
//!
//! let input = TimeMachineInput::new([2022, 2023]).with_profile(2023, profile);
//! let analysis = TimeMachineAnalyzer::default().analyze(&input).unwrap();
//!
//! assert_eq!(analysis.years_analyzed, vec![2023, 2022]);
//! assert_eq!(analysis.total_findings, 1);
//! assert!(analysis.total_recovery_min <= analysis.total_recovery_max);
//! ```

pub mod analyzer;
pub mod config;
pub mod detection;
pub mod error;
pub mod rag;
pub mod rates;
pub mod rules;
pub mod schema;
pub mod stream;

#[cfg(feature = "openrouter")]
pub mod llm;

pub use analyzer::{
    run_full_analysis, run_full_analysis_with_rates, AnalysisStatus, TimeMachineAnalysis,
    TimeMachineAnalyzer, TimeMachineInput, YearAnalysisBreakdown, EARLIEST_SUPPORTED_YEAR,
    LATEST_SUPPORTED_YEAR,
};
pub use config::LlmConfig;
pub use detection::{run_detection, run_detection_with_rates};
pub use error::{Result, TaxEngineError};
pub use rag::{
    build_system_prompt, calculate_confidence, calculate_profile_relevance,
    enrich_query_with_profile, generate_profile_context, get_response_strategy,
    ConfidenceResult, EmploymentType, MaritalStatus, PromptContext, ResponseStrategy,
    SearchResult, UserProfile,
};
pub use rates::{get_marginal_rate, get_provincial_credit_rate, TaxRateTable};
pub use rules::{DetectionRule, RuleContext, DETECTION_RULES};
pub use schema::*;
pub use stream::{Citation, StreamEvent, TokenUsage};
