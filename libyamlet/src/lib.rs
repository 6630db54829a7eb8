//! Yamlet: a small, predictable subset of YAML.
//!
//! Yamlet documents are block-structured maps, sequences and scalars. Flow
//! collections, anchors and multiple documents are not part of the format.
//! Plain scalars are typed on read: `null`, booleans, integers of any size
//! and floats, everything else a string.
//!
//! # Decoding Pipeline
//!
//! 1. **Character source**: decodes UTF-8 from any reader with lookahead and
//!    line/column tracking.
//!
//! 2. **Tokenizer**: groups characters into typed tokens, hiding comments,
//!    directives and blank lines, with pushback for the parser's lookahead.
//!
//! 3. **Parser**: recursive descent over the tokens, with a stack of
//!    indentation levels deciding where each collection ends.
//!
//! Encoding walks a [`Value`] and writes column-aligned block output that
//! decodes back to the same value.

pub mod coerce;
mod encode;
mod error;
mod lexer;
mod parser;
mod source;
mod value;

pub use encode::{EncodeOptions, Emitter, REFERENCE_CARD};
pub use error::{ParseContext, ParseError, Result};
pub use lexer::{tokenize, BlockIndicator, Token, TokenType};
pub use parser::ExplicitType;
pub use value::{Map, Value};

use std::io::{self, BufReader, Read, Write};

/// Parse a Yamlet document from a string.
///
/// # Example
///
/// ```
/// use libyamlet::{parse, Value};
///
/// let value = parse("name: Steve\nage: 24\n").unwrap();
/// assert_eq!(value.get("age"), Some(&Value::from(24)));
/// ```
pub fn parse(input: &str) -> Result<Value> {
    parse_with_filename(input, None)
}

/// Parse a Yamlet document from a string with a filename for error messages.
pub fn parse_with_filename(input: &str, filename: Option<&str>) -> Result<Value> {
    let ctx = ParseContext::new(filename);
    parser::Parser::new(input.as_bytes(), ctx).read_document()
}

/// Parse a Yamlet document from any reader.
pub fn from_reader<R: Read>(reader: R, filename: Option<&str>) -> Result<Value> {
    let ctx = ParseContext::new(filename);
    parser::Parser::new(BufReader::new(reader), ctx).read_document()
}

/// Encode a value with default options.
pub fn to_string(value: &Value) -> String {
    encode::encode_with(value, &EncodeOptions::default())
}

/// Encode a value with the given options.
pub fn to_string_with(value: &Value, options: &EncodeOptions) -> String {
    encode::encode_with(value, options)
}

/// Encode a value with default options into `writer`.
pub fn to_writer<W: Write>(writer: W, value: &Value) -> io::Result<()> {
    to_writer_with(writer, value, &EncodeOptions::default())
}

/// Encode a value into `writer`, which is flushed before returning.
pub fn to_writer_with<W: Write>(
    writer: W,
    value: &Value,
    options: &EncodeOptions,
) -> io::Result<()> {
    let mut emitter = Emitter::new(options.clone());
    emitter.value(value);
    emitter.write_to(writer)
}
