//! Error types for Yamlet decoding.

use thiserror::Error;

/// Result type for Yamlet decoding operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Parse context carrying filename for error reporting.
#[derive(Clone, Debug, Default)]
pub struct ParseContext {
    pub filename: Option<String>,
}

impl ParseContext {
    /// Create a new parse context.
    pub fn new(filename: Option<&str>) -> Self {
        Self {
            filename: filename.map(String::from),
        }
    }

    /// Format a location suffix for error messages. `line` and `col` are
    /// zero-based; the rendered position is one-based.
    pub fn loc_suffix(&self, line: usize, col: usize) -> String {
        match &self.filename {
            Some(name) => format!(" at {}:{} of <{}>", line + 1, col + 1, name),
            None => format!(" at {}:{}", line + 1, col + 1),
        }
    }
}

/// Error type for Yamlet decoding.
///
/// Every variant except `Io` ends with a location suffix produced by
/// [`ParseContext::loc_suffix`]. Errors raised below the parser start with an
/// empty suffix and are located with [`ParseError::with_location`].
#[derive(Error, Debug)]
pub enum ParseError {
    /// The stream ended in the middle of a construct.
    #[error("Premature end of input in {0}{1}")]
    PrematureEnd(String, String),

    /// A token did not match what the grammar requires here.
    #[error("Unexpected {found}, expected {expected}{loc}")]
    UnexpectedToken {
        expected: String,
        found: String,
        loc: String,
    },

    /// A quoted string was still open at end of input. Carries the text read so far.
    #[error("Unterminated string {0:?}{1}")]
    UnterminatedString(String, String),

    /// Flow collections, complex keys and unknown explicit types.
    #[error("Unsupported {0}{1}")]
    Unsupported(String, String),

    /// A scalar could not be read as the explicitly requested type.
    #[error("Invalid {type_name} {text:?}{loc}")]
    NumericFormat {
        type_name: String,
        text: String,
        loc: String,
    },

    /// Malformed `\u` escape or unpaired UTF-16 surrogate.
    #[error("Bad escape sequence \"\\{0}\"{1}")]
    BadEscape(String, String),

    /// The input bytes are not valid UTF-8.
    #[error("Invalid UTF-8{0}")]
    InvalidUtf8(String),

    /// Failure of the underlying reader.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// Create an error with location information.
    pub fn with_location(self, ctx: &ParseContext, line: usize, col: usize) -> Self {
        let suffix = ctx.loc_suffix(line, col);
        match self {
            ParseError::PrematureEnd(what, _) => ParseError::PrematureEnd(what, suffix),
            ParseError::UnexpectedToken {
                expected, found, ..
            } => ParseError::UnexpectedToken {
                expected,
                found,
                loc: suffix,
            },
            ParseError::UnterminatedString(partial, _) => {
                ParseError::UnterminatedString(partial, suffix)
            }
            ParseError::Unsupported(what, _) => ParseError::Unsupported(what, suffix),
            ParseError::NumericFormat {
                type_name, text, ..
            } => ParseError::NumericFormat {
                type_name,
                text,
                loc: suffix,
            },
            ParseError::BadEscape(seq, _) => ParseError::BadEscape(seq, suffix),
            ParseError::InvalidUtf8(_) => ParseError::InvalidUtf8(suffix),
            ParseError::Io(err) => ParseError::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loc_suffix_with_and_without_filename() {
        assert_eq!(ParseContext::new(None).loc_suffix(0, 4), " at 1:5");
        assert_eq!(
            ParseContext::new(Some("conf.yamlet")).loc_suffix(2, 0),
            " at 3:1 of <conf.yamlet>"
        );
    }

    #[test]
    fn test_with_location_replaces_suffix() {
        let err = ParseError::Unsupported("inline sequence".into(), String::new())
            .with_location(&ParseContext::new(Some("x")), 1, 6);
        assert_eq!(err.to_string(), "Unsupported inline sequence at 2:7 of <x>");
    }

    #[test]
    fn test_unexpected_token_message() {
        let err = ParseError::UnexpectedToken {
            expected: "\":\"".into(),
            found: "Newline".into(),
            loc: " at 1:4".into(),
        };
        assert_eq!(err.to_string(), "Unexpected Newline, expected \":\" at 1:4");
    }
}
