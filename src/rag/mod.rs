//! Retrieval confidence scoring and system prompt assembly for the tax
//! assistant.
//!
//! Flow: [`calculate_confidence`] scores the search results (nudged by
//! [`calculate_profile_relevance`]), [`get_response_strategy`] turns the tier
//! into prompt switches, and [`build_system_prompt`] renders the prompt.

pub mod confidence;
pub mod profile;
pub mod prompt;
pub mod types;

pub use confidence::*;
pub use profile::*;
pub use prompt::*;
pub use types::*;
