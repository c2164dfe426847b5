#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent binary '{binary}' is not installed")]
    NotInstalled { binary: String },
    #[error("invalid launch request: {message}")]
    InvalidRequest { message: String },
    #[error("agent spawn failed: {message}")]
    Spawn { message: String },
}
