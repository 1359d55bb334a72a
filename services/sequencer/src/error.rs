/// Sequencer service domain error variants.
///
/// Rate-limit and cooldown gating are not errors; see
/// [`crate::usecase::rate_limit::RateLimitDecision`].
#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("sequence not found")]
    SequenceNotFound,
    #[error("contact not found")]
    ContactNotFound,
    #[error("step {order} not found")]
    StepNotFound { order: i32 },
    #[error("mailbox credential expired or revoked")]
    CredentialExpired,
    #[error("thread resolution failed: {0}")]
    ThreadResolutionFailed(String),
    #[error("provider send failed: {0}")]
    ProviderSendFailed(String),
    #[error("invalid business hours: {0}")]
    InvalidBusinessHours(String),
    #[error("invalid step delay: {0}")]
    InvalidStepDelay(String),
    #[error("storage unavailable")]
    Storage(#[from] anyhow::Error),
}

impl SequencerError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SequenceNotFound => "SEQUENCE_NOT_FOUND",
            Self::ContactNotFound => "CONTACT_NOT_FOUND",
            Self::StepNotFound { .. } => "STEP_NOT_FOUND",
            Self::CredentialExpired => "CREDENTIAL_EXPIRED",
            Self::ThreadResolutionFailed(_) => "THREAD_RESOLUTION_FAILED",
            Self::ProviderSendFailed(_) => "PROVIDER_SEND_FAILED",
            Self::InvalidBusinessHours(_) => "INVALID_BUSINESS_HOURS",
            Self::InvalidStepDelay(_) => "INVALID_STEP_DELAY",
            Self::Storage(_) => "STORAGE_UNAVAILABLE",
        }
    }

    /// Whether the job runtime should re-attempt the unit of work.
    ///
    /// Missing data will not appear on retry, and an expired credential needs
    /// an out-of-band refresh first.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SequenceNotFound
            | Self::ContactNotFound
            | Self::StepNotFound { .. }
            | Self::CredentialExpired
            | Self::InvalidBusinessHours(_)
            | Self::InvalidStepDelay(_) => false,
            Self::ThreadResolutionFailed(_) | Self::ProviderSendFailed(_) | Self::Storage(_) => {
                true
            }
        }
    }
}
