use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unable to parse artifact reference {reference:?}: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("unable to resolve artifact {reference}: {message}")]
    Resolution { reference: String, message: String },

    #[error("unable to list routing rules in namespace {namespace}: {message}")]
    RuleListing { namespace: String, message: String },

    #[error("unable to create pipeline in namespace {namespace}: {message}")]
    Submission { namespace: String, message: String },

    #[error(transparent)]
    Submissions(#[from] SubmissionErrors),

    #[error("event bus closed: dispatcher is not accepting requests")]
    BusClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RouteError {
    pub fn invalid_reference(
        reference: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        RouteError::InvalidReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}

/// Every failure collected while submitting the execution requests for one
/// analysis request.
#[derive(Debug, Default)]
pub struct SubmissionErrors {
    errors: Vec<RouteError>,
}

impl SubmissionErrors {
    pub fn push(&mut self, error: RouteError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[RouteError] {
        &self.errors
    }
}

impl fmt::Display for SubmissionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [single] => write!(f, "1 submission failed: {single}"),
            errors => {
                write!(f, "{} submissions failed:", errors.len())?;
                for error in errors {
                    write!(f, "\n\t* {error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for SubmissionErrors {}

pub type Result<T> = std::result::Result<T, RouteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_lists_every_cause() {
        let mut errors = SubmissionErrors::default();
        errors.push(RouteError::Submission {
            namespace: "ns1".into(),
            message: "forbidden".into(),
        });
        errors.push(RouteError::Submission {
            namespace: "ns1".into(),
            message: "quota exceeded".into(),
        });

        let rendered = RouteError::from(errors).to_string();
        assert!(rendered.starts_with("2 submissions failed:"));
        assert!(rendered.contains("forbidden"));
        assert!(rendered.contains("quota exceeded"));
    }
}
