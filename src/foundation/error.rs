pub type MoshResult<T> = Result<T, MoshError>;

#[derive(thiserror::Error, Debug)]
pub enum MoshError {
    /// The requested run cannot produce an effect (bad window, trim or fps options).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An external tool (`ffmpeg`, `ffprobe`) could not be run or exited non-zero.
    #[error("{tool} failed: {message}")]
    Collaborator { tool: String, message: String },

    /// A library call got malformed input, such as an empty terminator pattern.
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MoshError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn collaborator(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
