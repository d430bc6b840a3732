//! Error types.
//!
//! Almost everything in this client is silent by design (dropped sends,
//! malformed inbound frames, reconnects), so only configuration problems
//! surface as errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid configuration: {0}")]
    Config(#[from] figment::Error),

    #[error("relay endpoint is not a websocket url: {0}")]
    BadEndpoint(String),
}
