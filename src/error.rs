use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaxEngineError {
    #[error("No tax years selected for analysis")]
    NoYearsSelected,

    #[error("Unsupported tax year {year}: must be between {earliest} and {latest}")]
    UnsupportedTaxYear { year: i32, earliest: i32, latest: i32 },

    #[error("Invalid amount for {field} in {year}: {value}")]
    InvalidAmount { field: String, year: i32, value: f64 },

    #[error("Unknown province or territory: {0}")]
    UnknownProvince(String),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Invalid configuration value for {key}: {details}")]
    InvalidConfig { key: String, details: String },

    #[error("LLM API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected LLM response: {0}")]
    InvalidResponse(String),

    #[cfg(feature = "openrouter")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TaxEngineError>;
