use thiserror::Error;

/// Failures that end a webhook delivery before the per-event loop runs.
/// None of these ever surface as an HTTP error; the webhook contract is
/// an unconditional 200 back to the platform.
#[derive(Debug, Error)]
pub enum DeliverySkip {
    #[error("tenant not found")]
    TenantNotFound,
    #[error("LINE credentials not configured")]
    CredentialsMissing,
    #[error("credential lookup failed")]
    CredentialLookupFailed,
    #[error("signature invalid or missing")]
    SignatureInvalid,
    #[error("payload malformed")]
    PayloadMalformed,
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("body is not valid JSON: {0}")]
    Malformed(String),
    #[error("payload has no events array")]
    MissingEvents,
}
