use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Exchange API error: {0}")]
    Exchange(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Malformed market data: {0}")]
    MalformedData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Insufficient price history: need {required} closes, got {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("Order rejected: {0}")]
    OrderRejected(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
