use dash_agents::AgentError;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("invalid request: {message}")]
    InvalidArgument { message: String },
    #[error("no agent with id '{id}'")]
    NotFound { id: String },
    #[error("agent id '{id}' is already in use")]
    Conflict { id: String },
    #[error("agent binary '{binary}' is not installed")]
    NotInstalled { binary: String },
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl From<AgentError> for SupervisorError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::NotInstalled { binary } => SupervisorError::NotInstalled { binary },
            AgentError::InvalidRequest { message } => SupervisorError::InvalidArgument { message },
            AgentError::Spawn { message } => SupervisorError::Internal { message },
        }
    }
}
