//! Error taxonomy for pipeline runs.
//!
//! Pure functions in `trendline-core` return [`ValidationError`]. Stages and
//! storage work in `anyhow::Result`; the orchestrator wraps whatever they
//! return into a [`PipelineError`] that names where it happened.

use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;
use trendline_core::ValidationError;

/// Failure of a [`Collector`](crate::traits::Collector).
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("collector root does not exist: {0}")]
    MissingRoot(PathBuf),

    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid collector pattern")]
    Pattern(#[from] globset::Error),

    #[error("all {attempted} sources failed")]
    AllSourcesFailed {
        attempted: usize,
        #[source]
        last: Box<CollectionError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Error surfaced by the orchestrator.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input")]
    Validation(#[from] ValidationError),

    #[error("stage '{stage}' failed")]
    Stage {
        stage: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{context}")]
    Infrastructure {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("run {run_id} is not running")]
    InvalidTransition { run_id: String },
}

impl PipelineError {
    pub fn infrastructure(context: impl Into<String>, source: anyhow::Error) -> Self {
        PipelineError::Infrastructure {
            context: context.into(),
            source,
        }
    }

    /// Name of the stage that raised this error, if any.
    pub fn stage(&self) -> Option<&str> {
        match self {
            PipelineError::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

/// Every message in the `source()` chain, outermost first.
pub fn error_chain(err: &(dyn StdError + 'static)) -> Vec<String> {
    let mut messages = vec![err.to_string()];
    let mut current = err.source();
    while let Some(cause) = current {
        messages.push(cause.to_string());
        current = cause.source();
    }
    messages
}

/// One-line summary: the chain joined with `": "`.
pub fn error_message(err: &(dyn StdError + 'static)) -> String {
    error_chain(err).join(": ")
}

/// Multi-line trace: one numbered cause per line.
pub fn error_trace(err: &(dyn StdError + 'static)) -> String {
    error_chain(err)
        .iter()
        .enumerate()
        .map(|(i, msg)| format!("{}: {}", i, msg))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_stage_error_chain() {
        let source = Err::<(), _>(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ))
        .context("embedding request")
        .unwrap_err();
        let err = PipelineError::Stage {
            stage: "embed".into(),
            source,
        };

        assert_eq!(
            error_chain(&err),
            vec![
                "stage 'embed' failed".to_string(),
                "embedding request".to_string(),
                "connection refused".to_string(),
            ]
        );
        assert_eq!(
            error_message(&err),
            "stage 'embed' failed: embedding request: connection refused"
        );
        assert_eq!(
            error_trace(&err),
            "0: stage 'embed' failed\n1: embedding request\n2: connection refused"
        );
        assert_eq!(err.stage(), Some("embed"));
    }

    #[test]
    fn test_validation_error_wraps() {
        let err: PipelineError = ValidationError::EmptyFieldName.into();
        assert_eq!(error_chain(&err).len(), 2);
        assert!(err.stage().is_none());
    }

    #[test]
    fn test_all_sources_failed_keeps_last_cause() {
        let err = CollectionError::AllSourcesFailed {
            attempted: 2,
            last: Box::new(CollectionError::MissingRoot(PathBuf::from("/nope"))),
        };
        assert_eq!(
            error_message(&err),
            "all 2 sources failed: collector root does not exist: /nope"
        );
    }
}
