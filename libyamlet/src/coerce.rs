//! Scalar typing and quoting.
//!
//! Decoding maps a plain scalar to null, a boolean, a number or a string.
//! Encoding runs the same classification in reverse: any string that would
//! read back as something else is written in double quotes.

use crate::error::{ParseError, Result};
use crate::value::Value;
use num_bigint::BigInt;
use num_traits::Num;

/// Characters that make a bare key ambiguous.
const INVALID_KEY_CHARS: [char; 5] = ['-', '[', ']', '{', '}'];

/// Characters that change the meaning of a plain scalar when they lead it.
const STRUCTURAL_LEADS: &str = "-?:,[]{}#&*!|>'\"%@`";

pub fn is_null(s: &str) -> bool {
    let s = s.trim();
    s == "~" || s.eq_ignore_ascii_case("null")
}

pub fn is_true(s: &str) -> bool {
    let s = s.trim();
    ["true", "yes", "on", "y"]
        .iter()
        .any(|word| s.eq_ignore_ascii_case(word))
}

pub fn is_false(s: &str) -> bool {
    let s = s.trim();
    ["false", "no", "off", "n"]
        .iter()
        .any(|word| s.eq_ignore_ascii_case(word))
}

pub fn is_number(s: &str) -> bool {
    number_form(s).is_some()
}

/// Shape of a numeric scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberForm {
    Hex,
    Octal,
    /// Digits with optional `_`/`,` thousands grouping.
    Integer,
    /// A fraction or an exponent is present.
    Float,
    Infinity,
    NaN,
}

fn split_sign(s: &str) -> (bool, &str) {
    match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    }
}

fn all_digits(s: &str, radix: u32) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_digit(radix))
}

fn number_form(s: &str) -> Option<NumberForm> {
    let lower = s.trim().to_ascii_lowercase();
    let (_, body) = split_sign(&lower);
    if let Some(hex) = body.strip_prefix("0x") {
        return all_digits(hex, 16).then_some(NumberForm::Hex);
    }
    if let Some(oct) = body.strip_prefix("0o") {
        return all_digits(oct, 8).then_some(NumberForm::Octal);
    }
    match body {
        ".inf" => return Some(NumberForm::Infinity),
        ".nan" => return Some(NumberForm::NaN),
        _ => {}
    }
    decimal_form(body.as_bytes())
}

/// `digits([_,]ddd)*(.digits*)?(e[+-]?digits)?`
fn decimal_form(bytes: &[u8]) -> Option<NumberForm> {
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == 0 {
        return None;
    }
    while i < bytes.len() && (bytes[i] == b'_' || bytes[i] == b',') {
        let group = bytes.get(i + 1..i + 4)?;
        if !group.iter().all(u8::is_ascii_digit) {
            return None;
        }
        i += 4;
    }
    let mut form = NumberForm::Integer;
    if bytes.get(i) == Some(&b'.') {
        form = NumberForm::Float;
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if bytes.get(i) == Some(&b'e') {
        form = NumberForm::Float;
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == start {
            return None;
        }
    }
    (i == bytes.len()).then_some(form)
}

fn parse_radix(digits: &str, radix: u32, negative: bool) -> Option<BigInt> {
    let n = BigInt::from_str_radix(digits, radix).ok()?;
    Some(if negative { -n } else { n })
}

/// Type a plain scalar.
pub fn value_of(s: &str) -> Value {
    if is_null(s) {
        return Value::Null;
    }
    if is_true(s) {
        return Value::Bool(true);
    }
    if is_false(s) {
        return Value::Bool(false);
    }
    let trimmed = s.trim();
    let Some(form) = number_form(trimmed) else {
        return Value::String(s.to_string());
    };
    let (negative, body) = split_sign(trimmed);
    let parsed = match form {
        NumberForm::Hex => parse_radix(&body[2..], 16, negative).map(Value::Integer),
        NumberForm::Octal => parse_radix(&body[2..], 8, negative).map(Value::Integer),
        NumberForm::Integer => parse_radix(&strip_grouping(body), 10, negative).map(Value::Integer),
        NumberForm::Float => strip_grouping(trimmed).parse::<f64>().ok().map(Value::Float),
        NumberForm::Infinity if negative => Some(Value::Float(f64::NEG_INFINITY)),
        NumberForm::Infinity => Some(Value::Float(f64::INFINITY)),
        NumberForm::NaN => Some(Value::Float(f64::NAN)),
    };
    parsed.unwrap_or_else(|| Value::String(s.to_string()))
}

fn strip_grouping(s: &str) -> String {
    s.chars().filter(|c| *c != '_' && *c != ',').collect()
}

/// Parse an integer under an explicit integer tag, in any of the integer
/// notations plain scalars accept.
pub fn parse_integer(s: &str) -> Option<BigInt> {
    match value_of(s) {
        Value::Integer(n) => Some(n),
        _ => None,
    }
}

/// Parse a float under an explicit `!!float`/`!!double` tag. Integers are
/// accepted and widened.
pub fn parse_float(s: &str) -> Option<f64> {
    match value_of(s) {
        Value::Float(f) => Some(f),
        Value::Integer(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

// ============================================================================
// Escapes
// ============================================================================

/// Accumulates the body of a double-quoted string, decoding backslash
/// escapes. UTF-16 surrogate halves from consecutive `\u` escapes are paired.
#[derive(Debug, Default)]
pub struct Unescaper {
    out: String,
    high_surrogate: Option<(u16, String)>,
}

impl Unescaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text read so far.
    pub fn as_str(&self) -> &str {
        &self.out
    }

    /// Append literal text.
    pub fn push_str(&mut self, s: &str) -> Result<()> {
        if s.is_empty() {
            return Ok(());
        }
        self.check_unpaired()?;
        self.out.push_str(s);
        Ok(())
    }

    /// Decode the escape whose text follows a backslash. Only the first
    /// escape is interpreted; anything after it is literal.
    pub fn push_escape(&mut self, body: &str) -> Result<()> {
        let mut chars = body.chars();
        let Some(lead) = chars.next() else {
            return Err(ParseError::BadEscape(String::new(), String::new()));
        };
        if lead != 'u' {
            self.check_unpaired()?;
            self.out.push(simple_escape(lead));
            return self.push_str(chars.as_str());
        }

        let rest = chars.as_str();
        let unit = rest
            .get(..4)
            .filter(|hex| hex.chars().all(|c| c.is_ascii_hexdigit()))
            .and_then(|hex| u16::from_str_radix(hex, 16).ok())
            .ok_or_else(|| ParseError::BadEscape(body.to_string(), String::new()))?;
        let remainder = &rest[4..];

        match (self.high_surrogate.take(), unit) {
            (Some((high, _)), 0xdc00..=0xdfff) => {
                let code = 0x10000 + ((u32::from(high) - 0xd800) << 10) + (u32::from(unit) - 0xdc00);
                let ch = char::from_u32(code)
                    .ok_or_else(|| ParseError::BadEscape(body.to_string(), String::new()))?;
                self.out.push(ch);
            }
            (Some((_, seq)), _) => return Err(ParseError::BadEscape(seq, String::new())),
            (None, 0xd800..=0xdbff) => self.high_surrogate = Some((unit, body.to_string())),
            (None, 0xdc00..=0xdfff) => {
                return Err(ParseError::BadEscape(body.to_string(), String::new()))
            }
            (None, _) => {
                let ch = char::from_u32(u32::from(unit))
                    .ok_or_else(|| ParseError::BadEscape(body.to_string(), String::new()))?;
                self.out.push(ch);
            }
        }
        self.push_str(remainder)
    }

    /// The decoded string. Fails on a dangling high surrogate.
    pub fn finish(mut self) -> Result<String> {
        self.check_unpaired()?;
        Ok(self.out)
    }

    fn check_unpaired(&mut self) -> Result<()> {
        match self.high_surrogate.take() {
            Some((_, seq)) => Err(ParseError::BadEscape(seq, String::new())),
            None => Ok(()),
        }
    }
}

fn simple_escape(c: char) -> char {
    match c {
        'r' | 'n' => '\n',
        't' => '\t',
        'b' => '\u{8}',
        'f' => '\u{c}',
        '0' => '\0',
        '1'..='9' => char::from(c as u8 - b'0'),
        other => other,
    }
}

// ============================================================================
// Quoting
// ============================================================================

/// Write `s` as a double-quoted scalar.
pub fn double_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if c.is_control() || c == '\u{feff}' => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn needs_quotes(s: &str) -> bool {
    let Some(first) = s.chars().next() else {
        return true;
    };
    let last = s.chars().next_back().unwrap_or(first);
    first.is_whitespace()
        || last.is_whitespace()
        || STRUCTURAL_LEADS.contains(first)
        || s.contains(": ")
        || s.contains(" #")
        || last == ':'
        || s.chars().any(|c| c.is_control() || c == '\u{feff}')
}

/// Quote a string scalar if its plain form would read back as a different
/// value.
pub fn quote_string(s: &str) -> String {
    if needs_quotes(s) || !matches!(value_of(s), Value::String(_)) {
        double_quote(s)
    } else {
        s.to_string()
    }
}

/// Quote a map key. Keys whose only ambiguous character leads them get the
/// `?` key indicator instead.
pub fn quote_key(key: &str) -> String {
    if key.contains([' ', '?', '\\'])
        || key.ends_with(':')
        || key.chars().any(|c| c.is_control() || c == '\u{feff}')
    {
        return double_quote(key);
    }
    if INVALID_KEY_CHARS
        .iter()
        .any(|c| key.rfind(*c).is_some_and(|i| i != 0))
    {
        return double_quote(key);
    }
    if key.starts_with(&INVALID_KEY_CHARS[..]) {
        return format!("?{}", key);
    }
    if needs_quotes(key) {
        return double_quote(key);
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn int(n: i64) -> Value {
        Value::from(n)
    }

    #[test]
    fn test_keywords() {
        for s in ["true", "Yes", "ON", "y", " TRUE "] {
            assert_eq!(value_of(s), Value::Bool(true), "{s}");
        }
        for s in ["false", "No", "off", "N"] {
            assert_eq!(value_of(s), Value::Bool(false), "{s}");
        }
        assert_eq!(value_of("null"), Value::Null);
        assert_eq!(value_of("NULL"), Value::Null);
        assert_eq!(value_of("~"), Value::Null);
    }

    #[test]
    fn test_integers() {
        assert_eq!(value_of("0x1F"), int(31));
        assert_eq!(value_of("-0x10"), int(-16));
        assert_eq!(value_of("0o17"), int(15));
        assert_eq!(value_of("+0O7"), int(7));
        assert_eq!(value_of("24"), int(24));
        assert_eq!(value_of("-1_000_000"), int(-1_000_000));
        assert_eq!(value_of("1,234"), int(1234));
        assert_eq!(
            value_of("123456789012345678901234567890"),
            Value::Integer("123456789012345678901234567890".parse().unwrap())
        );
    }

    #[test]
    fn test_floats() {
        assert_eq!(value_of("1.5"), Value::Float(1.5));
        assert_eq!(value_of("3."), Value::Float(3.0));
        assert_eq!(value_of("1e+3"), Value::Float(1000.0));
        assert_eq!(value_of("2.5E-2"), Value::Float(0.025));
        assert_eq!(value_of("1_000.25"), Value::Float(1000.25));
        assert_eq!(value_of(".Inf"), Value::Float(f64::INFINITY));
        assert_eq!(value_of("-.Inf"), Value::Float(f64::NEG_INFINITY));
        assert!(value_of(".NaN").as_float().unwrap().is_nan());
    }

    #[test]
    fn test_non_numbers_stay_strings() {
        for s in ["0x", "0o8", "1,23", "1_2345", ".5", "1e", "12abc", "Steve", "-", "+"] {
            assert_eq!(value_of(s), Value::from(s), "{s}");
        }
    }

    #[test]
    fn test_is_number() {
        assert!(is_number("0xff"));
        assert!(is_number("-.inf"));
        assert!(is_number("1e5"));
        assert!(!is_number("one"));
    }

    #[test]
    fn test_explicit_parsers() {
        assert_eq!(parse_integer("0x10"), Some(BigInt::from(16)));
        assert_eq!(parse_integer("1.5"), None);
        assert_eq!(parse_float("7"), Some(7.0));
        assert_eq!(parse_float("x"), None);
    }

    fn unescape(parts: &[&str]) -> Result<String> {
        let mut u = Unescaper::new();
        for part in parts {
            u.push_escape(part)?;
        }
        u.finish()
    }

    #[test]
    fn test_simple_escapes() {
        assert_eq!(unescape(&["n", "r", "t", "0"]).unwrap(), "\n\n\t\0");
        assert_eq!(unescape(&["3"]).unwrap(), "\u{3}");
        assert_eq!(unescape(&["\"rest"]).unwrap(), "\"rest");
        assert_eq!(unescape(&["q"]).unwrap(), "q");
    }

    #[test]
    fn test_unicode_escapes() {
        assert_eq!(unescape(&["u00e9t\u{e9}"]).unwrap(), "\u{e9}t\u{e9}");
        assert_eq!(unescape(&["uD83D", "uDE00"]).unwrap(), "\u{1f600}");
        assert!(matches!(unescape(&["u12"]), Err(ParseError::BadEscape(..))));
        assert!(matches!(unescape(&["uD83D"]), Err(ParseError::BadEscape(..))));
        assert!(matches!(unescape(&["uDE00"]), Err(ParseError::BadEscape(..))));
        assert!(matches!(unescape(&["uD83Dx"]), Err(ParseError::BadEscape(..))));
    }

    #[test]
    fn test_quote_string() {
        assert_eq!(quote_string("plain words"), "plain words");
        assert_eq!(quote_string("true"), "\"true\"");
        assert_eq!(quote_string("n"), "\"n\"");
        assert_eq!(quote_string("42"), "\"42\"");
        assert_eq!(quote_string("~"), "\"~\"");
        assert_eq!(quote_string(""), "\"\"");
        assert_eq!(quote_string(" pad"), "\" pad\"");
        assert_eq!(quote_string("a: b"), "\"a: b\"");
        assert_eq!(quote_string("- item"), "\"- item\"");
        assert_eq!(quote_string("x #y"), "\"x #y\"");
        assert_eq!(quote_string("bell\u{7}"), "\"bell\\u0007\"");
        assert_eq!(quote_string("cr\r"), "\"cr\\u000D\"");
        assert_eq!(quote_string("say \"hi\""), "say \"hi\"");
    }

    #[test]
    fn test_quote_key() {
        assert_eq!(quote_key("name"), "name");
        assert_eq!(quote_key("a b"), "\"a b\"");
        assert_eq!(quote_key("why?"), "\"why?\"");
        assert_eq!(quote_key("-foo"), "?-foo");
        assert_eq!(quote_key("[x"), "?[x");
        assert_eq!(quote_key("foo-bar"), "\"foo-bar\"");
        assert_eq!(quote_key("-a-"), "\"-a-\"");
        assert_eq!(quote_key(""), "\"\"");
        assert_eq!(quote_key("#tag"), "\"#tag\"");
    }
}
