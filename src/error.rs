use thiserror::Error;

/// Result alias used by every pipeline stage
pub type Result<T> = std::result::Result<T, PipelineError>;

/// The single failure type of a pipeline run.
///
/// Any stage may raise it; it travels unchanged through every enclosing
/// `generate` call and aborts the whole run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}{}", stage_prefix(.stage), .cause)]
pub struct PipelineError {
    pub cause: String,
    pub stage: Option<String>,
}

fn stage_prefix(stage: &Option<String>) -> String {
    match stage {
        Some(stage) => format!("{stage}: "),
        None => String::new(),
    }
}

impl PipelineError {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
            stage: None,
        }
    }

    pub fn in_stage(stage: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
            stage: Some(stage.into()),
        }
    }

    /// Attribute the error to `stage` unless an inner stage already claimed it
    pub fn at_stage(mut self, stage: &str) -> Self {
        if self.stage.is_none() {
            self.stage = Some(stage.to_string());
        }
        self
    }
}

impl From<ureq::Error> for PipelineError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, response) => {
                let body = response.into_string().unwrap_or_default();
                Self::new(format!("HTTP {code}: {body}"))
            }
            ureq::Error::Transport(transport) => {
                Self::new(format!("HTTP request failed: {transport}"))
            }
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::new(format!("I/O error: {err}"))
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("invalid JSON: {err}"))
    }
}
