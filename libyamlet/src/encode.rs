//! Encode values as Yamlet text.
//!
//! Output is collected as lines grouped into block scopes, one scope per
//! nesting level. A scope's values start at a shared column, the widest
//! key-and-separator prefix among its lines, so siblings line up:
//!
//! ```text
//! name: Steve
//! age:  24
//! tags:
//!   - a
//!   - b
//! ```

use crate::coerce::{double_quote, quote_key, quote_string};
use crate::Value;
use std::env;
use std::io::{self, Write};
use tracing::debug;

/// Header line written before the document body.
pub const REFERENCE_CARD: &str = "%YAML 1.1";

const DEFAULT_INDENT: usize = 2;

/// Encoder settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Spaces per nesting level.
    pub indent: usize,
    /// Whether to start the document with [`REFERENCE_CARD`].
    pub header: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            indent: DEFAULT_INDENT,
            header: true,
        }
    }
}

impl EncodeOptions {
    /// Defaults, with the indentation taken from `YAMLET_INDENT` when it
    /// holds a number from 1 to 8.
    pub fn from_env() -> Self {
        let indent = env::var("YAMLET_INDENT")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .filter(|n| (1..=8).contains(n))
            .unwrap_or(DEFAULT_INDENT);
        Self {
            indent,
            ..Self::default()
        }
    }
}

// =============================================================================
// Scalars
// =============================================================================

/// The text form of a scalar.
#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Inline(String),
    /// `|` or `|-` followed by the given lines, one level deeper.
    Block(&'static str, Vec<String>),
}

fn encode_float(f: f64) -> String {
    if f.is_nan() {
        return ".NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { ".Inf" } else { "-.Inf" }.to_string();
    }
    let magnitude = f.abs();
    if magnitude != 0.0 && !(1e-5..1e16).contains(&magnitude) {
        return format!("{:e}", f);
    }
    let s = f.to_string();
    if s.contains('.') {
        s
    } else {
        format!("{}.0", s)
    }
}

/// Split a multi-line string into literal block lines, or `None` when the
/// block form would not read back as the same string.
fn literal_block(s: &str) -> Option<Scalar> {
    let (header, body) = match s.strip_suffix('\n') {
        Some(body) if body.ends_with('\n') => return None,
        Some(body) => ("|", body),
        None => ("|-", s),
    };
    if body.chars().any(|c| (c.is_control() && c != '\n') || c == '\u{feff}') {
        return None;
    }
    let lines: Vec<String> = body.split('\n').map(str::to_string).collect();
    let first = lines.first()?;
    if first.is_empty() || first.starts_with(char::is_whitespace) {
        return None;
    }
    if lines.iter().any(|line| {
        (!line.is_empty() && line.trim().is_empty()) || line.starts_with(['|', '>'])
    }) {
        return None;
    }
    Some(Scalar::Block(header, lines))
}

fn encode_scalar(value: &Value) -> Scalar {
    match value {
        Value::Null => Scalar::Inline("null".to_string()),
        Value::Bool(true) => Scalar::Inline("true".to_string()),
        Value::Bool(false) => Scalar::Inline("false".to_string()),
        Value::Integer(n) => Scalar::Inline(n.to_string()),
        Value::Float(f) => Scalar::Inline(encode_float(*f)),
        Value::String(s) if s.contains('\n') => {
            literal_block(s).unwrap_or_else(|| Scalar::Inline(double_quote(s)))
        }
        Value::String(s) => Scalar::Inline(quote_string(s)),
        Value::Sequence(_) => Scalar::Inline("!!seq".to_string()),
        Value::Map(_) => Scalar::Inline("!!map".to_string()),
    }
}

// =============================================================================
// Emitter
// =============================================================================

/// A nesting level of output.
#[derive(Debug)]
struct BlockScope {
    indent: String,
}

/// One output line. The value, when present, starts at the scope's value
/// column.
#[derive(Debug)]
struct Line {
    scope: usize,
    prefix: String,
    value: Option<String>,
    comment: Option<String>,
}

#[derive(Debug)]
enum Frame {
    Map {
        scope: usize,
        owner: Option<usize>,
        key: Option<String>,
        entries: usize,
    },
    Sequence {
        scope: usize,
        owner: Option<usize>,
        entries: usize,
    },
}

impl Frame {
    fn scope(&self) -> usize {
        match self {
            Frame::Map { scope, .. } | Frame::Sequence { scope, .. } => *scope,
        }
    }

    /// The line holding the collection's key or marker.
    fn owner(&self) -> Option<usize> {
        match self {
            Frame::Map { owner, .. } | Frame::Sequence { owner, .. } => *owner,
        }
    }
}

/// Builds a document one value at a time.
///
/// Collections are opened with [`begin_map`](Emitter::begin_map) or
/// [`begin_sequence`](Emitter::begin_sequence) and closed with
/// [`end`](Emitter::end). Inside a map, each value is preceded by
/// [`key`](Emitter::key).
///
/// # Panics
///
/// Emitter methods panic when called out of order: a map value without a
/// key, a key outside a map, `end` with nothing open, or a second root value.
#[derive(Debug)]
pub struct Emitter {
    options: EncodeOptions,
    scopes: Vec<BlockScope>,
    lines: Vec<Line>,
    frames: Vec<Frame>,
    root_written: bool,
    last_value_line: Option<usize>,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new(EncodeOptions::default())
    }
}

impl Emitter {
    pub fn new(options: EncodeOptions) -> Self {
        Self {
            options,
            scopes: vec![BlockScope {
                indent: String::new(),
            }],
            lines: Vec::new(),
            frames: Vec::new(),
            root_written: false,
            last_value_line: None,
        }
    }

    fn child_scope(&mut self, parent: usize) -> usize {
        let indent = format!(
            "{}{}",
            self.scopes[parent].indent,
            " ".repeat(self.options.indent)
        );
        self.scopes.push(BlockScope { indent });
        self.scopes.len() - 1
    }

    fn push_line(&mut self, scope: usize, prefix: String, value: Option<String>) -> usize {
        self.lines.push(Line {
            scope,
            prefix,
            value,
            comment: None,
        });
        self.lines.len() - 1
    }

    /// Claim the position for the next value: its scope and the key or
    /// marker prefix, or `None` at the document root.
    fn next_slot(&mut self) -> Option<(usize, String)> {
        match self.frames.last_mut() {
            None => {
                assert!(!self.root_written, "document already has a root value");
                self.root_written = true;
                None
            }
            Some(Frame::Map {
                scope, key, entries, ..
            }) => {
                let Some(key) = key.take() else {
                    panic!("map value emitted without a key");
                };
                *entries += 1;
                Some((*scope, format!("{}:", quote_key(&key))))
            }
            Some(Frame::Sequence { scope, entries, .. }) => {
                *entries += 1;
                Some((*scope, "-".to_string()))
            }
        }
    }

    fn open(&mut self, map: bool) -> &mut Self {
        let (scope, owner) = match self.next_slot() {
            None => (0, None),
            Some((parent, prefix)) => {
                let owner = self.push_line(parent, prefix, None);
                self.last_value_line = Some(owner);
                (self.child_scope(parent), Some(owner))
            }
        };
        debug!(
            "Open {} scope {} at indent {:?}",
            if map { "map" } else { "sequence" },
            scope,
            self.scopes[scope].indent
        );
        let frame = if map {
            Frame::Map {
                scope,
                owner,
                key: None,
                entries: 0,
            }
        } else {
            Frame::Sequence {
                scope,
                owner,
                entries: 0,
            }
        };
        self.frames.push(frame);
        self
    }

    /// Open a map in the current position.
    pub fn begin_map(&mut self) -> &mut Self {
        self.open(true)
    }

    /// Open a sequence in the current position.
    pub fn begin_sequence(&mut self) -> &mut Self {
        self.open(false)
    }

    /// Set the key for the next value of the innermost map.
    pub fn key(&mut self, key: &str) -> &mut Self {
        match self.frames.last_mut() {
            Some(Frame::Map { key: slot, .. }) => {
                *slot = Some(key.to_string());
            }
            _ => panic!("key {:?} emitted outside a map", key),
        }
        self
    }

    /// Close the innermost collection. An empty collection is written as
    /// `!!map` or `!!seq`.
    pub fn end(&mut self) -> &mut Self {
        let Some(frame) = self.frames.pop() else {
            panic!("end emitted with no open collection");
        };
        debug!("Close scope {}", frame.scope());
        if let Some(line) = frame.owner() {
            self.last_value_line = Some(line);
        }
        let (owner, empty, tag) = match frame {
            Frame::Map {
                owner,
                key,
                mut entries,
                scope,
            } => {
                if let Some(key) = key {
                    // A key left without a value reads back as an empty string.
                    let prefix = format!("{}:", quote_key(&key));
                    self.push_line(scope, prefix, None);
                    entries += 1;
                }
                (owner, entries == 0, "!!map")
            }
            Frame::Sequence { owner, entries, .. } => (owner, entries == 0, "!!seq"),
        };
        if empty {
            match owner {
                Some(line) => {
                    let line = &mut self.lines[line];
                    line.prefix.push(' ');
                    line.value = Some(tag.to_string());
                }
                // An empty document is already an empty map.
                None if tag == "!!seq" => {
                    let line = self.push_line(0, String::new(), Some(tag.to_string()));
                    self.last_value_line = Some(line);
                }
                None => {}
            }
        }
        self
    }

    /// Emit any value in the current position.
    pub fn value(&mut self, value: &Value) -> &mut Self {
        match value {
            Value::Map(map) => {
                self.begin_map();
                for (key, item) in map {
                    self.key(key).value(item);
                }
                self.end()
            }
            Value::Sequence(items) => {
                self.begin_sequence();
                for item in items {
                    self.value(item);
                }
                self.end()
            }
            scalar => self.scalar(scalar),
        }
    }

    /// Emit a `key: value` pair into the innermost map.
    pub fn entry(&mut self, key: &str, value: &Value) -> &mut Self {
        self.key(key).value(value)
    }

    /// Emit an element into the innermost sequence.
    pub fn item(&mut self, value: &Value) -> &mut Self {
        assert!(
            matches!(self.frames.last(), Some(Frame::Sequence { .. })),
            "item emitted outside a sequence"
        );
        self.value(value)
    }

    fn scalar(&mut self, value: &Value) -> &mut Self {
        let slot = self.next_slot();
        let scalar = match (&slot, encode_scalar(value)) {
            // A block scalar needs a key or marker to hang from.
            (None, Scalar::Block(..)) => match value {
                Value::String(s) => Scalar::Inline(double_quote(s)),
                _ => encode_scalar(value),
            },
            (_, scalar) => scalar,
        };
        let (scope, prefix) = match slot {
            Some((scope, prefix)) => (scope, format!("{} ", prefix)),
            None => (0, String::new()),
        };
        match scalar {
            Scalar::Inline(text) => {
                let line = self.push_line(scope, prefix, Some(text));
                self.last_value_line = Some(line);
            }
            Scalar::Block(header, lines) => {
                let line = self.push_line(scope, prefix, Some(header.to_string()));
                self.last_value_line = Some(line);
                let child = self.child_scope(scope);
                for text in lines {
                    self.push_line(child, String::new(), Some(text));
                }
            }
        }
        self
    }

    /// Emit comment lines in the current scope, one per line of `text`.
    pub fn comment(&mut self, text: &str) -> &mut Self {
        let scope = self.frames.last().map(Frame::scope).unwrap_or(0);
        for line in text.lines() {
            self.lines.push(Line {
                scope,
                prefix: String::new(),
                value: None,
                comment: Some(line.to_string()),
            });
        }
        self
    }

    /// Attach a comment to the end of the line holding the last value.
    /// Further lines of `text` follow as comment lines.
    pub fn line_comment(&mut self, text: &str) -> &mut Self {
        let mut parts = text.lines();
        let target = self
            .last_value_line
            .filter(|i| self.lines[*i].comment.is_none());
        match (target, parts.next()) {
            (Some(i), Some(first)) => {
                self.lines[i].comment = Some(first.to_string());
                let rest: Vec<&str> = parts.collect();
                if !rest.is_empty() {
                    self.comment(&rest.join("\n"));
                }
                self
            }
            _ => self.comment(text),
        }
    }

    /// Render the document, closing any collection left open.
    pub fn render(&mut self) -> String {
        while !self.frames.is_empty() {
            self.end();
        }

        let mut value_start = vec![0usize; self.scopes.len()];
        for line in self.lines.iter().filter(|line| line.value.is_some()) {
            let width = line.prefix.chars().count();
            value_start[line.scope] = value_start[line.scope].max(width);
        }
        let body_width = |line: &Line| match &line.value {
            Some(value) => {
                line.prefix.chars().count().max(value_start[line.scope]) + value.chars().count()
            }
            None => line.prefix.chars().count(),
        };
        let mut comment_start = vec![0usize; self.scopes.len()];
        for line in &self.lines {
            if line.comment.is_some() && (line.value.is_some() || !line.prefix.is_empty()) {
                let width = body_width(line) + 1;
                comment_start[line.scope] = comment_start[line.scope].max(width);
            }
        }

        let mut out = String::new();
        if self.options.header {
            out.push_str(REFERENCE_CARD);
            out.push('\n');
        }
        for line in &self.lines {
            let mut text = line.prefix.clone();
            if let Some(value) = &line.value {
                pad_to(&mut text, value_start[line.scope]);
                text.push_str(value);
            }
            if let Some(comment) = &line.comment {
                if text.is_empty() {
                    pad_to(&mut text, value_start[line.scope]);
                } else {
                    pad_to(&mut text, comment_start[line.scope]);
                }
                text.push_str("# ");
                text.push_str(comment);
            }
            if !text.is_empty() {
                out.push_str(&self.scopes[line.scope].indent);
                out.push_str(&text);
            }
            out.push('\n');
        }
        out
    }

    /// Write the document to `writer` and flush it.
    pub fn write_to<W: Write>(&mut self, mut writer: W) -> io::Result<()> {
        writer.write_all(self.render().as_bytes())?;
        writer.flush()
    }
}

fn pad_to(text: &mut String, column: usize) {
    let width = text.chars().count();
    text.extend(std::iter::repeat(' ').take(column.saturating_sub(width)));
}

/// Encode a value with the given options.
pub fn encode_with(value: &Value, options: &EncodeOptions) -> String {
    let mut emitter = Emitter::new(options.clone());
    emitter.value(value);
    emitter.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Map;
    use pretty_assertions::assert_eq;

    fn bare() -> EncodeOptions {
        EncodeOptions {
            header: false,
            ..EncodeOptions::default()
        }
    }

    fn encode(value: &Value) -> String {
        encode_with(value, &bare())
    }

    #[test]
    fn test_aligned_map_with_sequence() {
        let value: Value = [
            ("name", Value::from("Steve")),
            ("age", Value::from(24)),
            ("tags", Value::from(vec![Value::from("a"), Value::from("b")])),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            encode(&value),
            "name: Steve\nage:  24\ntags:\n  - a\n  - b\n"
        );
    }

    #[test]
    fn test_header_is_written_by_default() {
        let value: Value = [("a", 1)].into_iter().collect();
        assert_eq!(
            encode_with(&value, &EncodeOptions::default()),
            "%YAML 1.1\na: 1\n"
        );
    }

    #[test]
    fn test_nested_scopes_indent_by_unit() {
        let inner: Value = [("x", 1)].into_iter().collect();
        let value: Value = [("outer", inner)].into_iter().collect();
        let options = EncodeOptions {
            indent: 4,
            header: false,
        };
        assert_eq!(encode_with(&value, &options), "outer:\n    x: 1\n");
    }

    #[test]
    fn test_sequence_of_maps() {
        let item: Value = [("k", "v")].into_iter().collect();
        let value = Value::Sequence(vec![item, Value::Null]);
        assert_eq!(encode(&value), "-\n  k: v\n- null\n");
    }

    #[test]
    fn test_scalars() {
        let value = Value::Sequence(vec![
            Value::Bool(true),
            Value::Float(1.0),
            Value::Float(0.1),
            Value::Float(1e20),
            Value::Float(-2.5e-7),
            Value::Float(f64::NEG_INFINITY),
            Value::Float(f64::NAN),
            Value::from("yes"),
            Value::from("0x1F"),
            Value::from(""),
        ]);
        assert_eq!(
            encode(&value),
            "- true\n- 1.0\n- 0.1\n- 1e20\n- -2.5e-7\n- -.Inf\n- .NaN\n- \"yes\"\n- \"0x1F\"\n- \"\"\n"
        );
    }

    #[test]
    fn test_empty_collections() {
        let value: Value = [
            ("m", Value::Map(Map::new())),
            ("s", Value::Sequence(vec![])),
        ]
        .into_iter()
        .collect();
        assert_eq!(encode(&value), "m: !!map\ns: !!seq\n");
        assert_eq!(encode(&Value::Map(Map::new())), "");
        assert_eq!(encode(&Value::Sequence(vec![])), "!!seq\n");
    }

    #[test]
    fn test_multiline_strings() {
        let value: Value = [
            ("keep", "one\ntwo\n"),
            ("strip", "one\n\ntwo"),
            ("quoted", "\n lead"),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            encode(&value),
            "keep:   |\n  one\n  two\nstrip:  |-\n  one\n\n  two\nquoted: \"\\n lead\"\n"
        );
    }

    #[test]
    fn test_root_multiline_string_is_quoted() {
        assert_eq!(encode(&Value::from("a\nb")), "\"a\\nb\"\n");
    }

    #[test]
    fn test_key_quoting() {
        let value: Value = [("a b", 1), ("-foo", 2), ("foo-bar", 3)]
            .into_iter()
            .collect();
        assert_eq!(
            encode(&value),
            "\"a b\":     1\n?-foo:     2\n\"foo-bar\": 3\n"
        );
    }

    #[test]
    fn test_streaming_with_comments() {
        let mut emitter = Emitter::new(bare());
        emitter
            .begin_map()
            .comment("settings")
            .entry("width", &Value::from(80))
            .line_comment("columns")
            .key("names")
            .begin_sequence()
            .item(&Value::from("x"))
            .end()
            .line_comment("all of them")
            .end();
        assert_eq!(
            emitter.render(),
            "       # settings\nwidth: 80 # columns\nnames:    # all of them\n  - x\n"
        );
    }

    #[test]
    fn test_multiline_comment_is_split() {
        let mut emitter = Emitter::new(bare());
        emitter.begin_map().entry("a", &Value::from(1)).comment("one\ntwo");
        assert_eq!(emitter.render(), "a: 1\n   # one\n   # two\n");
    }

    #[test]
    fn test_from_env_ignores_out_of_range() {
        // Only checks the defaulting path; the variable is not set in tests.
        if env::var("YAMLET_INDENT").is_err() {
            assert_eq!(EncodeOptions::from_env(), EncodeOptions::default());
        }
    }

    #[test]
    #[should_panic(expected = "without a key")]
    fn test_map_value_requires_key() {
        Emitter::default().begin_map().value(&Value::Null);
    }
}
