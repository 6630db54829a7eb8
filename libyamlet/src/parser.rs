//! Value Parser
//!
//! A recursive-descent reader over the token stream. Block structure is
//! tracked with a stack of indentation strings: a block continues only while
//! the next line's leading whitespace equals the top of the stack exactly.
//!
//! Every value reader returns with the stream positioned at the end of the
//! value's last line, so the next structural token is a newline or the end
//! of input. Collection readers start on their first member with their
//! indentation already pushed.

use crate::coerce::{self, Unescaper};
use crate::error::{ParseContext, ParseError, Result};
use crate::lexer::{BlockIndicator, Token, TokenType, Tokenizer};
use crate::value::{Map, Value};
use num_traits::ToPrimitive;
use std::io::BufRead;
use tracing::debug;

/// Types that can be forced with a `!!name` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplicitType {
    Map,
    Sequence,
    /// A sequence without duplicates, written with `?` markers.
    Set,
    Str,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    Long,
    /// 16-bit integer.
    Short,
    /// 8-bit integer.
    Byte,
    /// Single-precision float.
    Float,
    Double,
    Bool,
}

impl ExplicitType {
    /// Resolve a tag name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name.to_ascii_lowercase().as_str() {
            "map" | "obj" | "omap" => ExplicitType::Map,
            "array" | "arr" | "seq" | "pairs" => ExplicitType::Sequence,
            "set" => ExplicitType::Set,
            "str" | "string" => ExplicitType::Str,
            "int" | "integer" => ExplicitType::Int,
            "long" => ExplicitType::Long,
            "short" => ExplicitType::Short,
            "byte" => ExplicitType::Byte,
            "float" => ExplicitType::Float,
            "double" => ExplicitType::Double,
            "bool" | "boolean" => ExplicitType::Bool,
            _ => return None,
        };
        Some(ty)
    }

    /// Whether the type introduces an indented block.
    pub fn is_block(self) -> bool {
        matches!(
            self,
            ExplicitType::Map | ExplicitType::Sequence | ExplicitType::Set
        )
    }

    fn name(self) -> &'static str {
        match self {
            ExplicitType::Map => "map",
            ExplicitType::Sequence => "seq",
            ExplicitType::Set => "set",
            ExplicitType::Str => "str",
            ExplicitType::Int => "int",
            ExplicitType::Long => "long",
            ExplicitType::Short => "short",
            ExplicitType::Byte => "byte",
            ExplicitType::Float => "float",
            ExplicitType::Double => "double",
            ExplicitType::Bool => "bool",
        }
    }
}

/// One level of the indentation stack.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Indent {
    Fixed(String),
    /// A map opened mid-line (`- a: 1`). Its indentation is taken from the
    /// first continuation line.
    Pending,
}

/// What a continuation line must start with to belong to the current block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Member {
    Key,
    SequenceItem,
    SetItem,
}

fn is_deeper(indent: &str, than: &str) -> bool {
    indent.len() > than.len() && indent.starts_with(than)
}

fn starts_key(token: &Token) -> bool {
    matches!(token.typ, TokenType::Text | TokenType::Quote)
        || token.is_key_indicator()
        || token.is(TokenType::ModeChange, "[")
        || token.is(TokenType::ModeChange, "{")
}

pub struct Parser<R> {
    tokens: Tokenizer<R>,
    indents: Vec<Indent>,
}

impl<R: BufRead> Parser<R> {
    pub fn new(reader: R, ctx: ParseContext) -> Self {
        Self {
            tokens: Tokenizer::new(reader, ctx),
            indents: Vec::new(),
        }
    }

    // ========================================================================
    // Errors
    // ========================================================================

    fn locate(&self, err: ParseError, token: &Token) -> ParseError {
        err.with_location(self.tokens.context(), token.line_num, token.col)
    }

    fn unexpected(&self, token: &Token, expected: &str) -> ParseError {
        self.locate(
            ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: token.to_string(),
                loc: String::new(),
            },
            token,
        )
    }

    fn premature_end(&self, token: &Token, construct: &str) -> ParseError {
        self.locate(
            ParseError::PrematureEnd(construct.to_string(), String::new()),
            token,
        )
    }

    fn unsupported(&self, token: &Token, construct: &str) -> ParseError {
        self.locate(
            ParseError::Unsupported(construct.to_string(), String::new()),
            token,
        )
    }

    // ========================================================================
    // Indentation
    // ========================================================================

    /// Run `f` with `indent` pushed. The level is popped whether or not `f`
    /// succeeds.
    fn scoped<T>(
        &mut self,
        indent: Indent,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        debug!("Push indent {:?} at depth {}", indent, self.indents.len());
        self.indents.push(indent);
        let result = f(self);
        let popped = self.indents.pop();
        debug!("Pop indent {:?} at depth {}", popped, self.indents.len());
        result
    }

    /// Nearest fixed indentation, skipping a pending top.
    fn effective_indent(&self) -> String {
        self.indents
            .iter()
            .rev()
            .find_map(|indent| match indent {
                Indent::Fixed(s) => Some(s.clone()),
                Indent::Pending => None,
            })
            .unwrap_or_default()
    }

    fn top_is_fixed(&self) -> bool {
        matches!(self.indents.last(), Some(Indent::Fixed(_)) | None)
    }

    /// Split the start of a line into its indentation and first token.
    fn read_line_start(&mut self) -> Result<(Option<Token>, Token)> {
        let token = self.tokens.read_token()?;
        if token.typ == TokenType::Whitespace {
            let first = self.tokens.read_token()?;
            Ok((Some(token), first))
        } else {
            Ok((None, token))
        }
    }

    /// Undo `read_line_start` and the newline before it.
    fn push_back_line(&mut self, newline: Token, ws: Option<Token>, first: Token) {
        self.tokens.push_back(first);
        if let Some(ws) = ws {
            self.tokens.push_back(ws);
        }
        self.tokens.push_back(newline);
    }

    /// Decide whether the next line continues the current block.
    fn next_member(&mut self, member: Member) -> Result<bool> {
        let newline = self.tokens.read_token()?;
        if newline.is_end() {
            self.tokens.push_back(newline);
            return Ok(false);
        }
        if !newline.is_newline() {
            return Err(self.unexpected(&newline, "end of line"));
        }

        let (ws, first) = self.read_line_start()?;
        let indent = ws.as_ref().map(|t| t.text.as_str()).unwrap_or("");
        let starts_member = match member {
            Member::Key => starts_key(&first),
            Member::SequenceItem => first.is_sequence_marker(),
            Member::SetItem => first.is_set_marker(),
        };
        let continues = starts_member
            && match self.indents.last() {
                Some(Indent::Fixed(top)) => top == indent,
                Some(Indent::Pending) => is_deeper(indent, &self.effective_indent()),
                None => indent.is_empty(),
            };

        if continues {
            if let Some(top) = self.indents.last_mut() {
                if *top == Indent::Pending {
                    debug!("Adopt indent {:?}", indent);
                    *top = Indent::Fixed(indent.to_string());
                }
            }
            self.tokens.push_back(first);
            Ok(true)
        } else {
            self.push_back_line(newline, ws, first);
            Ok(false)
        }
    }

    /// Look ahead through the raw tokens of the current line for a `key:`
    /// separator outside quotes. Everything read is pushed back.
    fn line_has_key(&mut self) -> Result<bool> {
        let mut seen = Vec::new();
        let first = self.tokens.next_token()?;
        let quote = (first.typ == TokenType::Quote).then(|| first.text.clone());
        seen.push(first);

        let found = match quote {
            Some(q) => {
                let mut after = None;
                let mut closed = false;
                loop {
                    let token = self.tokens.next_token()?;
                    if token.is_newline() || token.is_end() {
                        seen.push(token);
                        break;
                    }
                    if q == "\"" && token.is_escape() {
                        seen.push(token);
                        let escaped = self.tokens.next_token()?;
                        let stop = escaped.is_newline() || escaped.is_end();
                        seen.push(escaped);
                        if stop {
                            break;
                        }
                        continue;
                    }
                    if token.is(TokenType::Quote, &q) {
                        seen.push(token);
                        if q == "'" {
                            let next = self.tokens.next_token()?;
                            if next.is(TokenType::Quote, &q) {
                                seen.push(next);
                                continue;
                            }
                            after = Some(next);
                        }
                        closed = true;
                        break;
                    }
                    seen.push(token);
                }
                if closed {
                    let mut token = match after {
                        Some(token) => token,
                        None => self.tokens.next_token()?,
                    };
                    while token.typ == TokenType::Whitespace {
                        seen.push(token);
                        token = self.tokens.next_token()?;
                    }
                    let found = token.is_key_separator();
                    seen.push(token);
                    found
                } else {
                    false
                }
            }
            None => loop {
                let token = self.tokens.next_token()?;
                let after_space = seen
                    .last()
                    .is_some_and(|t| t.typ == TokenType::Whitespace);
                let stop = token.is_newline()
                    || token.is_end()
                    || (token.is_comment_begin() && after_space);
                let found = token.is_key_separator();
                seen.push(token);
                if found {
                    break true;
                }
                if stop {
                    break false;
                }
            },
        };

        for token in seen.into_iter().rev() {
            self.tokens.push_back(token);
        }
        Ok(found)
    }

    // ========================================================================
    // Documents and collections
    // ========================================================================

    /// Read one complete document.
    pub fn read_document(&mut self) -> Result<Value> {
        while self.tokens.skip_token(TokenType::Newline)? {}
        let mut first = self.tokens.read_token()?;
        let root = if first.typ == TokenType::Whitespace {
            let indent = first.text.clone();
            first = self.tokens.read_token()?;
            indent
        } else {
            String::new()
        };
        if first.is_end() {
            return Ok(Value::Map(Map::new()));
        }

        let value = self.scoped(Indent::Fixed(root), |p| {
            p.tokens.push_back(first.clone());
            if first.is_sequence_marker() {
                p.read_sequence(true)
            } else if first.is_set_marker() {
                p.read_sequence(false)
            } else if first.is_key_indicator() || p.line_has_key()? {
                p.read_object()
            } else {
                p.read_value(false)
            }
        })?;
        self.expect_end()?;
        Ok(value)
    }

    fn expect_end(&mut self) -> Result<()> {
        loop {
            let token = self.tokens.read_token()?;
            if token.is_end() {
                return Ok(());
            }
            if !token.is_newline() {
                return Err(self.unexpected(&token, "end of document"));
            }
        }
    }

    /// Read the members of a map whose first key is next.
    fn read_object(&mut self) -> Result<Value> {
        let mut map = Map::new();
        loop {
            let key = self.read_key()?;
            let value = self.read_value(true)?;
            map.insert(key, value);
            if !self.next_member(Member::Key)? {
                return Ok(Value::Map(map));
            }
        }
    }

    /// Read a key and its `:` separator.
    fn read_key(&mut self) -> Result<String> {
        let mut token = self.tokens.read_token()?;
        while matches!(token.typ, TokenType::Whitespace | TokenType::Newline) {
            token = self.tokens.read_token()?;
        }
        let key = match token.typ {
            TokenType::End => return Err(self.premature_end(&token, "map key")),
            TokenType::Quote => self.read_quoted_string(&token)?,
            TokenType::ModeChange if token.text == "[" || token.text == "{" => {
                return Err(self.unsupported(&token, "complex key"))
            }
            TokenType::ModeChange | TokenType::Separator => {
                return Err(self.unexpected(&token, "map key"))
            }
            _ if token.is_key_indicator() => self.read_unquoted_string(false, true)?,
            _ => {
                self.tokens.push_back(token);
                self.read_unquoted_string(true, true)?
            }
        };

        self.tokens.skip_token(TokenType::Whitespace)?;
        let separator = self.tokens.read_token()?;
        if !separator.is_key_separator() {
            return Err(self.unexpected(&separator, "\":\" after key"));
        }
        Ok(key)
    }

    /// Read `- ` (or `? ` for sets) items. Sets drop items equal to one
    /// already read.
    fn read_sequence(&mut self, allow_duplicates: bool) -> Result<Value> {
        let member = if allow_duplicates {
            Member::SequenceItem
        } else {
            Member::SetItem
        };
        let mut items: Vec<Value> = Vec::new();
        loop {
            let marker = self.tokens.read_token()?;
            let is_marker = if allow_duplicates {
                marker.is_sequence_marker()
            } else {
                marker.is_set_marker()
            };
            if !is_marker {
                let expected = if allow_duplicates { "\"- \"" } else { "\"? \"" };
                return Err(self.unexpected(&marker, expected));
            }
            let value = self.read_value(false)?;
            if allow_duplicates || !items.iter().any(|item| item.same_value(&value)) {
                items.push(value);
            }
            if !self.next_member(member)? {
                return Ok(Value::Sequence(items));
            }
        }
    }

    // ========================================================================
    // Values
    // ========================================================================

    /// Read the value after a key separator, a sequence marker or at the
    /// start of a document. `in_map` allows a sequence at the same
    /// indentation as its key.
    fn read_value(&mut self, in_map: bool) -> Result<Value> {
        let mut token = self.tokens.read_token()?;
        while token.typ == TokenType::Whitespace {
            token = self.tokens.read_token()?;
        }

        match token.typ {
            TokenType::End => {
                self.tokens.push_back(token);
                Ok(Value::String(String::new()))
            }
            TokenType::Newline => self.read_indented_value(token, in_map),
            TokenType::Separator => Err(self.unexpected(&token, "value")),
            TokenType::Text | TokenType::Quote => {
                self.tokens.push_back(token.clone());
                if self.line_has_key()? {
                    return self.scoped(Indent::Pending, |p| p.read_object());
                }
                let token = self.tokens.read_token()?;
                if token.typ == TokenType::Quote {
                    return Ok(Value::String(self.read_quoted_string(&token)?));
                }
                self.tokens.push_back(token);
                Ok(coerce::value_of(&self.read_unquoted_string(false, false)?))
            }
            TokenType::ModeChange => {
                self.tokens.push_back(token.clone());
                if self.line_has_key()? {
                    return Err(self.unsupported(&token, "complex key"));
                }
                match token.text.as_str() {
                    "[" => Err(self.unsupported(&token, "inline sequence")),
                    "{" => Err(self.unsupported(&token, "inline map")),
                    _ => Err(self.unexpected(&token, "value")),
                }
            }
            _ if token.is_key_indicator() => {
                self.tokens.push_back(token);
                self.scoped(Indent::Pending, |p| p.read_object())
            }
            _ if token.is_tag_indicator() => self.read_tagged(in_map),
            _ => match token.block_scalar() {
                Some(indicator) => {
                    Ok(Value::String(self.read_multiline_string(indicator)?))
                }
                None => {
                    self.tokens.push_back(token);
                    Ok(coerce::value_of(&self.read_unquoted_string(false, false)?))
                }
            },
        }
    }

    /// A value that starts on the line after its key or marker. Without
    /// deeper content the value is an empty string.
    fn read_indented_value(&mut self, newline: Token, in_map: bool) -> Result<Value> {
        let (ws, first) = self.read_line_start()?;
        let indent = ws.as_ref().map(|t| t.text.clone()).unwrap_or_default();
        if first.is_end() {
            self.tokens.push_back(first);
            return Ok(Value::String(String::new()));
        }

        let effective = self.effective_indent();
        if is_deeper(&indent, &effective) {
            return self.scoped(Indent::Fixed(indent), |p| {
                p.tokens.push_back(first.clone());
                if first.is_sequence_marker() {
                    p.read_sequence(true)
                } else if first.is_set_marker() {
                    p.read_sequence(false)
                } else if first.is_key_indicator() || p.line_has_key()? {
                    p.read_object()
                } else {
                    p.read_value(false)
                }
            });
        }
        if indent == effective && in_map && first.is_sequence_marker() && self.top_is_fixed() {
            self.tokens.push_back(first);
            return self.read_sequence(true);
        }
        self.push_back_line(newline, ws, first);
        Ok(Value::String(String::new()))
    }

    /// Read `!!name` and the value it types.
    fn read_tagged(&mut self, in_map: bool) -> Result<Value> {
        let name = self.tokens.next_token()?;
        if name.typ != TokenType::Text {
            if name.is_end() {
                return Err(self.premature_end(&name, "type name"));
            }
            return Err(self.unexpected(&name, "type name"));
        }
        let ty = ExplicitType::from_name(&name.text)
            .ok_or_else(|| self.unsupported(&name, &format!("type !!{}", name.text)))?;
        debug!("Explicit type !!{} resolved to {:?}", name.text, ty);

        if ty.is_block() {
            self.read_tagged_block(ty, in_map)
        } else {
            self.read_tagged_scalar(ty)
        }
    }

    fn empty_of(ty: ExplicitType) -> Value {
        match ty {
            ExplicitType::Map => Value::Map(Map::new()),
            _ => Value::Sequence(Vec::new()),
        }
    }

    fn read_tagged_block(&mut self, ty: ExplicitType, in_map: bool) -> Result<Value> {
        let newline = self.tokens.read_token()?;
        if newline.is_end() {
            self.tokens.push_back(newline);
            return Ok(Self::empty_of(ty));
        }
        if !newline.is_newline() {
            return Err(self.unexpected(&newline, "end of line after block type"));
        }

        let (ws, first) = self.read_line_start()?;
        let indent = ws.as_ref().map(|t| t.text.clone()).unwrap_or_default();
        let effective = self.effective_indent();
        let fits = |token: &Token| match ty {
            ExplicitType::Map => starts_key(token),
            ExplicitType::Set => token.is_set_marker(),
            _ => token.is_sequence_marker(),
        };

        if !first.is_end() && is_deeper(&indent, &effective) {
            if !fits(&first) {
                return Err(self.unexpected(&first, &format!("!!{} content", ty.name())));
            }
            return self.scoped(Indent::Fixed(indent), |p| {
                p.tokens.push_back(first);
                match ty {
                    ExplicitType::Map => p.read_object(),
                    ExplicitType::Set => p.read_sequence(false),
                    _ => p.read_sequence(true),
                }
            });
        }
        if indent == effective
            && in_map
            && ty == ExplicitType::Sequence
            && first.is_sequence_marker()
            && self.top_is_fixed()
        {
            self.tokens.push_back(first);
            return self.read_sequence(true);
        }
        self.push_back_line(newline, ws, first);
        Ok(Self::empty_of(ty))
    }

    fn read_tagged_scalar(&mut self, ty: ExplicitType) -> Result<Value> {
        let mut token = self.tokens.read_token()?;
        while token.typ == TokenType::Whitespace {
            token = self.tokens.read_token()?;
        }
        if ty == ExplicitType::Str {
            if token.typ == TokenType::Quote {
                return Ok(Value::String(self.read_quoted_string(&token)?));
            }
            self.tokens.push_back(token);
            return Ok(Value::String(self.read_unquoted_string(false, false)?));
        }
        if token.is_end() || token.is_newline() {
            return Err(self.premature_end(&token, &format!("!!{} value", ty.name())));
        }

        let text = token.text.as_str();
        let value = match ty {
            ExplicitType::Int | ExplicitType::Long | ExplicitType::Short | ExplicitType::Byte => {
                coerce::parse_integer(text)
                    .filter(|n| match ty {
                        ExplicitType::Byte => n.to_i8().is_some(),
                        ExplicitType::Short => n.to_i16().is_some(),
                        ExplicitType::Int => n.to_i32().is_some(),
                        _ => n.to_i64().is_some(),
                    })
                    .map(Value::Integer)
            }
            ExplicitType::Float => coerce::parse_float(text).map(|f| Value::Float(f as f32 as f64)),
            ExplicitType::Double => coerce::parse_float(text).map(Value::Float),
            ExplicitType::Bool if coerce::is_true(text) => Some(Value::Bool(true)),
            ExplicitType::Bool if coerce::is_false(text) => Some(Value::Bool(false)),
            _ => None,
        };
        let value = match value {
            Some(value) if token.typ == TokenType::Text => value,
            _ => {
                return Err(self.locate(
                    ParseError::NumericFormat {
                        type_name: ty.name().to_string(),
                        text: token.text.clone(),
                        loc: String::new(),
                    },
                    &token,
                ))
            }
        };
        Ok(value)
    }

    // ========================================================================
    // Strings
    // ========================================================================

    /// Read the rest of a string whose opening quote was `open`. Line breaks
    /// fold to a space; each blank line inside the quotes is a newline.
    fn read_quoted_string(&mut self, open: &Token) -> Result<String> {
        let q = open.text.as_str();
        let mut text = Unescaper::new();
        loop {
            let token = self.tokens.next_token()?;
            match token.typ {
                TokenType::End => {
                    return Err(self.locate(
                        ParseError::UnterminatedString(text.as_str().to_string(), String::new()),
                        open,
                    ))
                }
                TokenType::Quote if token.text == q => {
                    if q == "\"" {
                        break;
                    }
                    let next = self.tokens.next_token()?;
                    if next.is(TokenType::Quote, q) {
                        text.push_str(q).map_err(|e| self.locate(e, &token))?;
                    } else {
                        self.tokens.push_back(next);
                        break;
                    }
                }
                TokenType::ControlCharacter if q == "\"" && token.is_escape() => {
                    let escaped = self.tokens.next_token()?;
                    match escaped.typ {
                        TokenType::End => {
                            return Err(self.locate(
                                ParseError::UnterminatedString(
                                    text.as_str().to_string(),
                                    String::new(),
                                ),
                                open,
                            ))
                        }
                        TokenType::Newline => {
                            text.push_str("\n").map_err(|e| self.locate(e, &token))?;
                            let indent = self.tokens.next_token()?;
                            if indent.typ != TokenType::Whitespace {
                                self.tokens.push_back(indent);
                            }
                        }
                        _ => text
                            .push_escape(&escaped.text)
                            .map_err(|e| self.locate(e, &token))?,
                    }
                }
                TokenType::Whitespace => {
                    let next = self.tokens.next_token()?;
                    let line_end = next.is_newline();
                    self.tokens.push_back(next);
                    if !line_end {
                        text.push_str(&token.text).map_err(|e| self.locate(e, &token))?;
                    }
                }
                TokenType::Newline => {
                    let mut blank_lines = 0;
                    loop {
                        let next = self.tokens.next_token()?;
                        match next.typ {
                            TokenType::Whitespace => {}
                            TokenType::Newline => blank_lines += 1,
                            _ => {
                                self.tokens.push_back(next);
                                break;
                            }
                        }
                    }
                    let fold = if blank_lines == 0 {
                        " ".to_string()
                    } else {
                        "\n".repeat(blank_lines)
                    };
                    text.push_str(&fold).map_err(|e| self.locate(e, &token))?;
                }
                _ => text.push_str(&token.text).map_err(|e| self.locate(e, &token))?,
            }
        }
        text.finish().map_err(|e| self.locate(e, open))
    }

    /// Read a plain scalar through the end of the line, trimmed.
    fn read_unquoted_string(
        &mut self,
        stop_on_mode_change: bool,
        stop_on_delimiter: bool,
    ) -> Result<String> {
        let mut text = String::new();
        loop {
            let token = self.tokens.read_token()?;
            let stop = match token.typ {
                TokenType::End | TokenType::Newline => true,
                TokenType::ModeChange => {
                    stop_on_mode_change && (token.text == "]" || token.text == "}")
                }
                TokenType::Separator => stop_on_delimiter && token.is_key_separator(),
                _ => {
                    token.is_comment_begin()
                        && (text.is_empty() || text.ends_with(|c: char| c == ' ' || c == '\t'))
                }
            };
            if stop {
                self.tokens.push_back(token);
                break;
            }
            text.push_str(&token.text);
        }
        Ok(text.trim().to_string())
    }

    /// Read the header remainder and indented lines of a `|` or `>` block.
    fn read_multiline_string(&mut self, indicator: BlockIndicator) -> Result<String> {
        let parent = self.effective_indent();
        let mut base: Option<String> = None;

        let mut token = self.tokens.next_token()?;
        if token.typ == TokenType::Text {
            let hint = token
                .text
                .parse::<usize>()
                .ok()
                .filter(|n| (1..=9).contains(n))
                .ok_or_else(|| self.unexpected(&token, "indentation indicator"))?;
            base = Some(format!("{}{}", parent, " ".repeat(hint)));
            token = self.tokens.next_token()?;
        }
        if token.typ == TokenType::Whitespace {
            token = self.tokens.next_token()?;
        }
        if token.is_comment_begin() {
            while !(token.is_newline() || token.is_end()) {
                token = self.tokens.next_token()?;
            }
        }
        if token.is_end() {
            self.tokens.push_back(token);
            return Ok(String::new());
        }
        if !token.is_newline() {
            return Err(self.unexpected(&token, "end of line after block indicator"));
        }
        debug!(
            "Block scalar literal={} keep_trailing_newline={} base={:?}",
            indicator.literal, indicator.keep_trailing_newline, base
        );

        let mut last_newline = token;
        let mut lines: Vec<String> = Vec::new();
        loop {
            let mut raw = Vec::new();
            let terminator = loop {
                let token = self.tokens.next_token()?;
                if token.is_newline() || token.is_end() {
                    break token;
                }
                raw.push(token);
            };

            if raw.iter().all(|t| t.typ == TokenType::Whitespace) {
                if terminator.is_end() {
                    self.tokens.push_back(terminator);
                    break;
                }
                lines.push(String::new());
                last_newline = terminator;
                continue;
            }

            let indent = match raw.first() {
                Some(t) if t.typ == TokenType::Whitespace => t.text.clone(),
                _ => String::new(),
            };
            let base = base.get_or_insert_with(|| indent.clone());
            if !is_deeper(base, &parent) || !indent.starts_with(base.as_str()) {
                self.tokens.push_back(terminator);
                for token in raw.into_iter().rev() {
                    self.tokens.push_back(token);
                }
                self.tokens.push_back(last_newline);
                break;
            }

            let mut line = indent[base.len()..].to_string();
            raw.iter().skip(1).for_each(|t| line.push_str(&t.text));
            lines.push(line);
            if terminator.is_end() {
                self.tokens.push_back(terminator);
                break;
            }
            last_newline = terminator;
        }

        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }

        let mut text = if indicator.literal {
            lines.join("\n")
        } else {
            let mut folded = String::new();
            for (i, line) in lines.iter().enumerate() {
                if line.is_empty() {
                    folded.push('\n');
                } else {
                    if i > 0 && !lines[i - 1].is_empty() {
                        folded.push(' ');
                    }
                    folded.push_str(line);
                }
            }
            folded
        };
        if indicator.keep_trailing_newline && !text.is_empty() {
            text.push('\n');
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Result<Value> {
        Parser::new(input.as_bytes(), ParseContext::default()).read_document()
    }

    fn map(entries: Vec<(&str, Value)>) -> Value {
        entries.into_iter().collect()
    }

    fn seq(items: Vec<Value>) -> Value {
        Value::Sequence(items)
    }

    fn s(text: &str) -> Value {
        Value::from(text)
    }

    #[test]
    fn test_flat_map_with_sequence() {
        let input = "name: Steve\nage: 24\ntags:\n- a\n- b\n";
        assert_eq!(
            parse(input).unwrap(),
            map(vec![
                ("name", s("Steve")),
                ("age", Value::from(24)),
                ("tags", seq(vec![s("a"), s("b")])),
            ])
        );
    }

    #[test]
    fn test_nested_maps() {
        let input = "outer:\n  inner:\n    leaf: 1\n  other: x\ntop: y";
        assert_eq!(
            parse(input).unwrap(),
            map(vec![
                (
                    "outer",
                    map(vec![
                        ("inner", map(vec![("leaf", Value::from(1))])),
                        ("other", s("x")),
                    ])
                ),
                ("top", s("y")),
            ])
        );
    }

    #[test]
    fn test_indentation_must_match_exactly() {
        // One space less ends the inner block and the stray line is rejected.
        let input = "outer:\n  a: 1\n b: 2\n";
        assert!(matches!(parse(input), Err(ParseError::UnexpectedToken { .. })));
        // One space more is not a continuation either.
        let input = "outer:\n  a: 1\n   b: 2\n";
        assert!(matches!(parse(input), Err(ParseError::UnexpectedToken { .. })));
    }

    #[test]
    fn test_inline_map_in_sequence() {
        let input = "- a: 1\n  b: 2\n- c: 3\n";
        assert_eq!(
            parse(input).unwrap(),
            seq(vec![
                map(vec![("a", Value::from(1)), ("b", Value::from(2))]),
                map(vec![("c", Value::from(3))]),
            ])
        );
    }

    #[test]
    fn test_set_drops_equal_values() {
        let input = "? 0x10\n? 16\n? x\n";
        assert_eq!(parse(input).unwrap(), seq(vec![Value::from(16), s("x")]));
    }

    #[test]
    fn test_set_treats_nan_as_one_member() {
        let value = parse("? .NaN\n? .nan\n").unwrap();
        let items = value.as_sequence().unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].as_float().unwrap().is_nan());
    }

    #[test]
    fn test_set_compares_numbers_by_value() {
        assert_eq!(parse("? 16\n? 16.0\n? 0x10\n").unwrap(), seq(vec![Value::from(16)]));
        assert_eq!(
            parse("? 1.5\n? 1\n").unwrap(),
            seq(vec![Value::Float(1.5), Value::from(1)])
        );
    }

    #[test]
    fn test_tagged_set_in_map() {
        let input = "letters: !!set\n  ? a\n  ? a\n";
        assert_eq!(
            parse(input).unwrap(),
            map(vec![("letters", seq(vec![s("a")]))])
        );
    }

    #[test]
    fn test_block_scalars() {
        let input = "lit: |\n  one\n  two\nfold: >-\n  one\n  two\n";
        assert_eq!(
            parse(input).unwrap(),
            map(vec![("lit", s("one\ntwo\n")), ("fold", s("one two"))])
        );
    }

    #[test]
    fn test_block_scalar_keeps_comments_and_inner_indent() {
        let input = "code: |-\n  # not a comment\n    indented\n\n  last\nnext: 1";
        assert_eq!(
            parse(input).unwrap(),
            map(vec![
                ("code", s("# not a comment\n  indented\n\nlast")),
                ("next", Value::from(1)),
            ])
        );
    }

    #[test]
    fn test_block_scalar_indent_hint() {
        let input = "k: |1\n   two spaces kept\n";
        assert_eq!(
            parse(input).unwrap(),
            map(vec![("k", s("  two spaces kept\n"))])
        );
    }

    #[test]
    fn test_quoted_strings() {
        let input = "a: \"x # y\"\nb: 'it''s'\nc: \"tab\\tand \\u00e9\"\n\"key: q\": \" pad \"";
        assert_eq!(
            parse(input).unwrap(),
            map(vec![
                ("a", s("x # y")),
                ("b", s("it's")),
                ("c", s("tab\tand \u{e9}")),
                ("key: q", s(" pad ")),
            ])
        );
    }

    #[test]
    fn test_space_before_separator_and_leading_blank_lines() {
        let input = "\n\n\"k\" : 1\n'q'\t: 2\n";
        assert_eq!(
            parse(input).unwrap(),
            map(vec![("k", Value::from(1)), ("q", Value::from(2))])
        );
    }

    #[test]
    fn test_quoted_string_folding() {
        let input = "a: \"one\n  two\n\n  three\"";
        assert_eq!(parse(input).unwrap(), map(vec![("a", s("one two\nthree"))]));
    }

    #[test]
    fn test_comments_are_invisible() {
        let input = "# leading\na: 1 # trailing\n\n# between\nb: two words # note\n";
        assert_eq!(
            parse(input).unwrap(),
            map(vec![("a", Value::from(1)), ("b", s("two words"))])
        );
    }

    #[test]
    fn test_key_indicator() {
        let input = "?-foo: 1\n?[x: 2\n";
        assert_eq!(
            parse(input).unwrap(),
            map(vec![("-foo", Value::from(1)), ("[x", Value::from(2))])
        );
    }

    #[test]
    fn test_explicit_scalars() {
        let input = "a: !!str 42\nb: !!int 0x10\nc: !!float 0.1\nd: !!bool yes\ne: !!double 2";
        assert_eq!(
            parse(input).unwrap(),
            map(vec![
                ("a", s("42")),
                ("b", Value::from(16)),
                ("c", Value::Float(0.1f32 as f64)),
                ("d", Value::Bool(true)),
                ("e", Value::Float(2.0)),
            ])
        );
    }

    #[test]
    fn test_explicit_width_is_checked() {
        assert!(matches!(
            parse("a: !!byte 128"),
            Err(ParseError::NumericFormat { .. })
        ));
        assert!(parse("a: !!short -32768").is_ok());
        assert!(matches!(
            parse("a: !!bool maybe"),
            Err(ParseError::NumericFormat { .. })
        ));
    }

    #[test]
    fn test_empty_tagged_collections() {
        let input = "m: !!map\ns: !!seq\nt: x";
        assert_eq!(
            parse(input).unwrap(),
            map(vec![
                ("m", map(vec![])),
                ("s", seq(vec![])),
                ("t", s("x")),
            ])
        );
    }

    #[test]
    fn test_missing_value_is_empty_string() {
        assert_eq!(
            parse("a:\nb:").unwrap(),
            map(vec![("a", s("")), ("b", s(""))])
        );
    }

    #[test]
    fn test_root_scalars_and_empty_document() {
        assert_eq!(parse("").unwrap(), map(vec![]));
        assert_eq!(parse("# only a comment\n").unwrap(), map(vec![]));
        assert_eq!(parse("0o17").unwrap(), Value::from(15));
        assert_eq!(parse("\"quoted\"").unwrap(), s("quoted"));
    }

    #[test]
    fn test_unsupported_constructs() {
        for input in ["a: [1, 2]", "a: {b: 1}", "[a]: 1", "!!tuple x"] {
            assert!(
                matches!(parse(input), Err(ParseError::Unsupported(..))),
                "{input}"
            );
        }
    }

    #[test]
    fn test_unterminated_string_keeps_partial_text() {
        match parse("a: \"abc") {
            Err(ParseError::UnterminatedString(partial, loc)) => {
                assert_eq!(partial, "abc");
                assert_eq!(loc, " at 1:4");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_trailing_content_is_rejected() {
        assert!(matches!(
            parse("a: \"x\" y"),
            Err(ParseError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            parse("scalar\nmore"),
            Err(ParseError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_indent_stack_is_empty_after_failure() {
        let mut parser = Parser::new("a:\n  b:\n    c: [".as_bytes(), ParseContext::default());
        assert!(parser.read_document().is_err());
        assert!(parser.indents.is_empty());
    }

    #[test]
    fn test_explicit_type_names() {
        assert_eq!(ExplicitType::from_name("OMAP"), Some(ExplicitType::Map));
        assert_eq!(ExplicitType::from_name("pairs"), Some(ExplicitType::Sequence));
        assert_eq!(ExplicitType::from_name("boolean"), Some(ExplicitType::Bool));
        assert_eq!(ExplicitType::from_name("binary"), None);
        assert!(ExplicitType::Set.is_block());
        assert!(!ExplicitType::Long.is_block());
    }
}
