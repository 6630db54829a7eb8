//! Tokenizer
//!
//! Splits the character stream into typed tokens. Two layers are exposed:
//! - `next_token`: raw tokens, exactly as they appear in the source. Quoted
//!   strings and block scalars are read at this layer because comments and
//!   blank lines are content there.
//! - `read_token`: raw tokens with comments, directives, blank lines and
//!   trailing whitespace removed, used for structure.
//!
//! Both layers deliver pushed-back tokens first, most recently pushed first.

use crate::error::{ParseContext, Result};
use crate::source::CharSource;
use std::collections::VecDeque;
use std::fmt;
use std::io::BufRead;
use tracing::trace;

/// Token type in the tokenizer output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// Plain scalar fragment.
    Text,
    /// Indentation or inline spacing.
    Whitespace,
    /// Line break (CR, LF or CRLF).
    Newline,
    /// `"` or `'`.
    Quote,
    /// `:`, `-` or `?` followed by whitespace or a line break.
    Separator,
    /// `#`, `%`, `\`, `?`, `!!` and block-scalar indicators.
    ControlCharacter,
    /// `[`, `]`, `{` or `}`.
    ModeChange,
    /// End of input. Repeats forever once reached.
    End,
}

/// A single token. `text` is the exact source slice, except that every line
/// break reads as `"\n"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub typ: TokenType,
    pub text: String,
    pub line_num: usize,
    pub col: usize,
}

/// Block-scalar header flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockIndicator {
    /// `|` keeps line breaks, `>` folds them.
    pub literal: bool,
    /// Without a `-` chomping indicator the value ends with one line break.
    pub keep_trailing_newline: bool,
}

impl Token {
    fn new(typ: TokenType, text: impl Into<String>, line_num: usize, col: usize) -> Self {
        Self {
            typ,
            text: text.into(),
            line_num,
            col,
        }
    }

    pub fn is(&self, typ: TokenType, text: &str) -> bool {
        self.typ == typ && self.text == text
    }

    pub fn is_end(&self) -> bool {
        self.typ == TokenType::End
    }

    pub fn is_newline(&self) -> bool {
        self.typ == TokenType::Newline
    }

    /// `key: value` separator.
    pub fn is_key_separator(&self) -> bool {
        self.is(TokenType::Separator, ":")
    }

    /// `- item` marker.
    pub fn is_sequence_marker(&self) -> bool {
        self.is(TokenType::Separator, "-")
    }

    /// `? item` set element marker.
    pub fn is_set_marker(&self) -> bool {
        self.is(TokenType::Separator, "?")
    }

    /// `?key` explicit key prefix.
    pub fn is_key_indicator(&self) -> bool {
        self.is(TokenType::ControlCharacter, "?")
    }

    pub fn is_tag_indicator(&self) -> bool {
        self.is(TokenType::ControlCharacter, "!!")
    }

    pub fn is_escape(&self) -> bool {
        self.is(TokenType::ControlCharacter, "\\")
    }

    pub fn is_comment_begin(&self) -> bool {
        self.is(TokenType::ControlCharacter, "#")
    }

    pub fn is_directive_begin(&self) -> bool {
        self.is(TokenType::ControlCharacter, "%")
    }

    /// Header flags if this is a block-scalar indicator such as `" |"` or `" >-"`.
    pub fn block_scalar(&self) -> Option<BlockIndicator> {
        if self.typ != TokenType::ControlCharacter {
            return None;
        }
        let indicator = self.text.trim_start();
        let literal = match indicator.chars().next()? {
            '|' => true,
            '>' => false,
            _ => return None,
        };
        Some(BlockIndicator {
            literal,
            keep_trailing_newline: !indicator.ends_with('-'),
        })
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.typ {
            TokenType::End => write!(f, "end of input"),
            TokenType::Newline => write!(f, "newline"),
            typ => write!(f, "{:?} {:?}", typ, self.text),
        }
    }
}

fn is_space(c: Option<char>) -> bool {
    matches!(c, Some(' ' | '\t'))
}

/// Whitespace, a line break or end of input.
fn is_blank(c: Option<char>) -> bool {
    matches!(c, None | Some(' ' | '\t' | '\r' | '\n'))
}

fn ends_text(c: char) -> bool {
    matches!(
        c,
        '\r' | '\n' | '"' | '\'' | '\\' | ':' | ']' | '}' | ' ' | '\t'
    )
}

/// Token stream over a character source, with unlimited pushback.
pub struct Tokenizer<R> {
    source: CharSource<R>,
    ctx: ParseContext,
    pushed: VecDeque<Token>,
    started: bool,
}

impl<R: BufRead> Tokenizer<R> {
    pub fn new(reader: R, ctx: ParseContext) -> Self {
        Self {
            source: CharSource::new(reader),
            ctx,
            pushed: VecDeque::new(),
            started: false,
        }
    }

    pub fn context(&self) -> &ParseContext {
        &self.ctx
    }

    /// Re-deliver `token` before anything else. The last token pushed is the
    /// first one read.
    pub fn push_back(&mut self, token: Token) {
        self.pushed.push_front(token);
    }

    /// Next raw token.
    pub fn next_token(&mut self) -> Result<Token> {
        if let Some(token) = self.pushed.pop_front() {
            return Ok(token);
        }
        let (line, col) = self.source.position();
        let (typ, text) = self
            .scan()
            .map_err(|err| err.with_location(&self.ctx, line, col))?;
        trace!("Token {:?} at {}:{}: {:?}", typ, line + 1, col + 1, text);
        Ok(Token::new(typ, text, line, col))
    }

    /// Next structural token: comments and directives are dropped, runs of
    /// blank lines collapse into one newline and trailing whitespace is
    /// removed.
    pub fn read_token(&mut self) -> Result<Token> {
        let mut token = self.next_token()?;
        if !self.started {
            self.started = true;
            if token.is_comment_begin() || token.is_directive_begin() {
                token = self.skip_comment()?;
            }
        }
        loop {
            match token.typ {
                TokenType::Whitespace => {
                    let next = self.next_token()?;
                    if next.is_comment_begin() {
                        token = self.skip_comment()?;
                    } else if next.is_newline() || next.is_end() {
                        token = next;
                    } else {
                        self.push_back(next);
                        return Ok(token);
                    }
                }
                TokenType::Newline => {
                    let next = self.next_token()?;
                    match next.typ {
                        TokenType::Newline => {}
                        TokenType::Whitespace => {
                            let after = self.next_token()?;
                            if after.is_comment_begin() {
                                let end = self.skip_comment()?;
                                if end.is_end() {
                                    self.push_back(end);
                                    return Ok(token);
                                }
                            } else if after.is_end() {
                                self.push_back(after);
                                return Ok(token);
                            } else if !after.is_newline() {
                                self.push_back(after);
                                self.push_back(next);
                                return Ok(token);
                            }
                        }
                        _ if next.is_comment_begin() || next.is_directive_begin() => {
                            let end = self.skip_comment()?;
                            if end.is_end() {
                                self.push_back(end);
                                return Ok(token);
                            }
                        }
                        _ => {
                            self.push_back(next);
                            return Ok(token);
                        }
                    }
                }
                _ => return Ok(token),
            }
        }
    }

    /// Structural token without consuming it.
    #[cfg(test)]
    pub fn peek_token(&mut self) -> Result<Token> {
        let token = self.read_token()?;
        self.push_back(token.clone());
        Ok(token)
    }

    /// Consume the next structural token if it has type `typ`.
    pub fn skip_token(&mut self, typ: TokenType) -> Result<bool> {
        let token = self.read_token()?;
        if token.typ == typ {
            Ok(true)
        } else {
            self.push_back(token);
            Ok(false)
        }
    }

    /// Discard raw tokens through the end of the line, returning the
    /// newline or end token that stopped it.
    fn skip_comment(&mut self) -> Result<Token> {
        loop {
            let token = self.next_token()?;
            if token.is_newline() || token.is_end() {
                return Ok(token);
            }
        }
    }

    fn peek(&mut self, n: usize) -> Result<Option<char>> {
        self.source.peek(n)
    }

    fn take(&mut self, text: &mut String) -> Result<()> {
        if let Some(c) = self.source.read()? {
            text.push(c);
        }
        Ok(())
    }

    /// Classify and consume one raw token.
    fn scan(&mut self) -> Result<(TokenType, String)> {
        let Some(c) = self.peek(0)? else {
            return Ok((TokenType::End, String::new()));
        };
        let mut text = String::new();
        let typ = match c {
            '\r' | '\n' => {
                self.source.read()?;
                if c == '\r' && self.peek(0)? == Some('\n') {
                    self.source.read()?;
                }
                text.push('\n');
                TokenType::Newline
            }
            ':' | '-' if is_blank(self.peek(1)?) => {
                self.take(&mut text)?;
                TokenType::Separator
            }
            '?' => {
                let blank = is_blank(self.peek(1)?);
                self.take(&mut text)?;
                if blank {
                    TokenType::Separator
                } else {
                    TokenType::ControlCharacter
                }
            }
            '#' | '%' | '\\' => {
                self.take(&mut text)?;
                TokenType::ControlCharacter
            }
            '!' if self.peek(1)? == Some('!') && !is_blank(self.peek(2)?) => {
                self.take(&mut text)?;
                self.take(&mut text)?;
                TokenType::ControlCharacter
            }
            '"' | '\'' => {
                self.take(&mut text)?;
                TokenType::Quote
            }
            '[' | ']' | '{' | '}' => {
                self.take(&mut text)?;
                TokenType::ModeChange
            }
            ' ' | '\t' => {
                if matches!(self.peek(1)?, Some('|' | '>')) {
                    self.take(&mut text)?;
                    self.take(&mut text)?;
                    if self.peek(0)? == Some('-') {
                        self.take(&mut text)?;
                    }
                    TokenType::ControlCharacter
                } else {
                    self.take(&mut text)?;
                    while is_space(self.peek(0)?) && !matches!(self.peek(1)?, Some('|' | '>')) {
                        self.take(&mut text)?;
                    }
                    TokenType::Whitespace
                }
            }
            _ => {
                self.take(&mut text)?;
                while let Some(next) = self.peek(0)? {
                    if ends_text(next) {
                        break;
                    }
                    self.take(&mut text)?;
                }
                TokenType::Text
            }
        };
        Ok((typ, text))
    }
}

/// Tokenize `input` into raw tokens, ending with the `End` token.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokenizer = Tokenizer::new(input.as_bytes(), ParseContext::default());
    let mut tokens = Vec::new();
    loop {
        let token = tokenizer.next_token()?;
        let done = token.is_end();
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}
