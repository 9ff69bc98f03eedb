use serde::Deserialize;
use thiserror::Error;

/// Error body returned by the Jupiter API on a failed quote or swap request,
/// e.g. `{"error":"Could not find any route","errorCode":"COULD_NOT_FIND_ANY_ROUTE"}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorError {
    pub error: String,
    #[serde(default)]
    pub error_code: Option<String>,
}

impl std::fmt::Display for AggregatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_code {
            Some(code) => write!(f, "{} ({})", self.error, code),
            None => f.write_str(&self.error),
        }
    }
}

#[derive(Error, Debug)]
pub enum SwapError {
    /// Structured error reported by the aggregator. Surfaced to quote state.
    #[error("aggregator error: {0}")]
    Aggregator(AggregatorError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response whose body is not a structured aggregator error.
    #[error("unexpected response ({status}): {body}")]
    UnexpectedResponse { status: u16, body: String },

    #[error("Solana RPC error: {0}")]
    Rpc(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("missing field in response: {0}")]
    MissingField(&'static str),
}

impl From<solana_client::client_error::ClientError> for SwapError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        SwapError::Rpc(err.to_string())
    }
}

pub type Result<T, E = SwapError> = std::result::Result<T, E>;
