use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrcError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A record that does not match `KEY;VALUE` with VALUE as `-?\d+\.\d`.
    /// `line` is 1-based within the chunk that held it.
    #[error("malformed record at chunk line {line} (key {key:?}): {reason}")]
    MalformedRecord { line: usize, key: String, reason: String },

    #[error("input ends with {bytes} bytes after the last newline")]
    UnterminatedInput { bytes: usize },

    #[error("worker failure: {0}")]
    Worker(String),
}

impl BrcError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        BrcError::Io { context: context.into(), source }
    }

    pub fn malformed(line: usize, key: &[u8], reason: impl Into<String>) -> Self {
        BrcError::MalformedRecord { line, key: String::from_utf8_lossy(key).into_owned(), reason: reason.into() }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, BrcError::MalformedRecord { .. })
    }
}

pub type Result<T> = std::result::Result<T, BrcError>;
