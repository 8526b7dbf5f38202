use thiserror::Error;

/// Errors that can occur while reading or writing a PDF document.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PdfError {
    /// Underlying read/write/seek failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed token, bad number, missing keyword.
    #[error("syntax error at offset {offset}: {message}")]
    Syntax {
        /// Byte offset in the file where the error was detected.
        offset: u64,
        /// Human-readable error description.
        message: String,
    },

    /// Missing Root, recursive Prev chain, oversized object stream,
    /// page tree too deep, unsupported filter.
    #[error("structural error: {0}")]
    Structure(String),

    /// Unsupported security handler, wrong password, bad key material.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// API misuse. The call fails but the document stays usable.
    #[error("contract violation: {0}")]
    Contract(String),

    /// An implementation limit was exceeded.
    #[error("resource limit exceeded: {0}")]
    Resource(String),

    /// The error sink asked to stop the current operation.
    #[error("operation aborted by error handler")]
    Aborted,
}

impl PdfError {
    /// Shorthand for a syntax error at a known file offset.
    pub fn syntax(offset: u64, message: impl Into<String>) -> Self {
        PdfError::Syntax {
            offset,
            message: message.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PdfError>;

/// How severe a reported condition is.
///
/// Only [`Severity::Warning`] conditions honor a request to continue;
/// fatal conditions abort regardless of what the sink returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Recoverable; message text carries the `WARNING:` prefix.
    Warning,
    /// Not recoverable for the current operation.
    Fatal,
}

/// What the caller wants done after a reported condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Keep going if the condition is documented as recoverable.
    Continue,
    /// Abort the current operation.
    Abort,
}

/// Receives every distinct error or warning raised while loading a
/// document, exactly once each.
///
/// Returning [`ErrorAction::Continue`] for a warning lets tolerant
/// paths (duplicate dictionary keys, xref repair) proceed.
pub trait ErrorSink {
    fn on_error(&mut self, message: &str, severity: Severity) -> ErrorAction;
}

/// Default sink: warnings are logged and continued, errors abort.
#[derive(Debug, Default, Clone, Copy)]
pub struct LenientSink;

impl ErrorSink for LenientSink {
    fn on_error(&mut self, message: &str, severity: Severity) -> ErrorAction {
        match severity {
            Severity::Warning => {
                log::warn!("{message}");
                ErrorAction::Continue
            }
            Severity::Fatal => ErrorAction::Abort,
        }
    }
}

/// Sink that aborts on everything, warnings included.
#[derive(Debug, Default, Clone, Copy)]
pub struct StrictSink;

impl ErrorSink for StrictSink {
    fn on_error(&mut self, _message: &str, _severity: Severity) -> ErrorAction {
        ErrorAction::Abort
    }
}
