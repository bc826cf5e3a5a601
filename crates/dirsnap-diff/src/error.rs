//! Error types for snapshot comparison.

use thiserror::Error;

/// Errors that abort a comparison.
#[derive(Debug, Error)]
pub enum CompareError {
    /// Neither side of a comparison was given.
    #[error("at least one of the old and current nodes must be present")]
    BothAbsent,

    /// The same name is a file on one side and a directory on the other.
    #[error("cannot compare a file with a directory: {path}")]
    KindMismatch { path: String },
}

impl CompareError {
    /// Prefix the path of a kind mismatch with its parent directory's name.
    pub(crate) fn within(self, parent: &str) -> Self {
        match self {
            Self::KindMismatch { path } => Self::KindMismatch {
                path: format!("{parent}/{path}"),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_path_grows_outwards() {
        let err = CompareError::KindMismatch {
            path: "x".to_string(),
        }
        .within("b")
        .within("a");
        assert_eq!(err.to_string(), "cannot compare a file with a directory: a/b/x");
    }

    #[test]
    fn test_both_absent_is_untouched() {
        assert!(matches!(
            CompareError::BothAbsent.within("a"),
            CompareError::BothAbsent
        ));
    }
}
