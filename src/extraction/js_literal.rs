//! Recursive-descent reader for JavaScript object/array literals as they
//! appear inline in server-rendered pages.
//!
//! Accepts the JSON superset that page bootstrap code actually emits:
//! unquoted and single-quoted keys, single-quoted and backtick strings
//! (without interpolation), trailing commas, array holes, `undefined`,
//! `void 0`, `NaN`/`Infinity`, hex/octal/binary numbers, numeric separators,
//! comments, and `new Date(..)` / `new Map(..)` / `new Set(..)` constructor
//! calls. Nothing is evaluated.

use std::borrow::Cow;

use serde_json::{Map, Number, Value};

const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at byte {position}")]
pub struct JsParseError {
    pub position: usize,
    pub message: String,
}

/// Parse a complete literal. Trailing whitespace, comments and semicolons
/// are allowed; anything else after the value is an error.
pub fn parse_js_value(src: &str) -> Result<Value, JsParseError> {
    let mut parser = Parser::new(src);
    let value = parser.value()?;
    parser.skip_trivia();
    while parser.eat(b';') {
        parser.skip_trivia();
    }
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing characters"));
    }
    Ok(value)
}

/// Parse one literal from the start of `src`, returning it with the number of
/// bytes consumed.
pub fn parse_js_prefix(src: &str) -> Result<(Value, usize), JsParseError> {
    let mut parser = Parser::new(src);
    let value = parser.value()?;
    Ok((value, parser.pos))
}

/// Index of the bracket closing the one at `open`, skipping over string
/// literals and comments. `None` when `open` is not `[`/`{`/`(` or the text
/// ends first.
pub fn balanced_end(src: &str, open: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut stack: Vec<u8> = vec![closer(*bytes.get(open)?)?];
    let mut i = open + 1;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'' | b'`') => {
                i = skip_string(bytes, i, quote)?;
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let rest = src.get(i + 2..)?;
                i += 2 + rest.find("*/")? + 2;
                continue;
            }
            b @ (b'[' | b'{' | b'(') => stack.push(closer(b)?),
            b @ (b']' | b'}' | b')') => {
                if stack.pop()? != b {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// Split the top-level elements of the array whose `[` is at `open`,
/// returning byte ranges of each non-empty element.
pub fn array_element_spans(src: &str, open: usize) -> Option<Vec<(usize, usize)>> {
    let end = balanced_end(src, open)?;
    let bytes = src.as_bytes();
    if bytes[open] != b'[' {
        return None;
    }

    let mut spans = Vec::new();
    let mut start = open + 1;
    let mut i = open + 1;

    while i < end {
        match bytes[i] {
            quote @ (b'"' | b'\'' | b'`') => {
                i = skip_string(bytes, i, quote)?;
                continue;
            }
            b'[' | b'{' | b'(' => {
                i = balanced_end(src, i)? + 1;
                continue;
            }
            b',' => {
                push_span(src, &mut spans, start, i);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    push_span(src, &mut spans, start, end);

    Some(spans)
}

/// Replace every `clip_embedding: [..]` array in raw script text with `null`
/// so the vectors never get parsed.
pub fn strip_embedding_literals(src: &str) -> Cow<'_, str> {
    const KEY: &str = "clip_embedding";
    if !src.contains(KEY) {
        return Cow::Borrowed(src);
    }

    let mut out = String::with_capacity(src.len());
    let mut cursor = 0;
    let mut search = 0;

    while let Some(found) = src[search..].find(KEY) {
        let key_end = search + found + KEY.len();
        search = key_end;

        let mut i = key_end;
        let bytes = src.as_bytes();
        if matches!(bytes.get(i), Some(b'"') | Some(b'\'')) {
            i += 1;
        }
        while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
            i += 1;
        }
        if bytes.get(i) != Some(&b':') {
            continue;
        }
        i += 1;
        while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
            i += 1;
        }
        if bytes.get(i) != Some(&b'[') {
            continue;
        }
        let Some(end) = balanced_end(src, i) else {
            continue;
        };

        out.push_str(&src[cursor..i]);
        out.push_str("null");
        cursor = end + 1;
        search = end + 1;
    }

    if cursor == 0 {
        return Cow::Borrowed(src);
    }
    out.push_str(&src[cursor..]);
    Cow::Owned(out)
}

fn push_span(src: &str, spans: &mut Vec<(usize, usize)>, start: usize, end: usize) {
    let piece = &src[start..end];
    let trimmed = piece.trim();
    if trimmed.is_empty() {
        return;
    }
    let lead = piece.len() - piece.trim_start().len();
    spans.push((start + lead, start + lead + trimmed.len()));
}

fn closer(open: u8) -> Option<u8> {
    match open {
        b'[' => Some(b']'),
        b'{' => Some(b'}'),
        b'(' => Some(b')'),
        _ => None,
    }
}

/// Returns the index just past the closing quote.
fn skip_string(bytes: &[u8], open: usize, quote: u8) -> Option<usize> {
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            depth: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> JsParseError {
        JsParseError {
            position: self.pos,
            message: message.into(),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, b: u8) -> Result<(), JsParseError> {
        self.skip_trivia();
        if self.eat(b) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", b as char)))
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => self.pos += c.len_utf8(),
                Some('/') if self.bytes.get(self.pos + 1) == Some(&b'/') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some('/') if self.bytes.get(self.pos + 1) == Some(&b'*') => {
                    match self.src[self.pos + 2..].find("*/") {
                        Some(off) => self.pos += 2 + off + 2,
                        None => self.pos = self.bytes.len(),
                    }
                }
                _ => return,
            }
        }
    }

    fn value(&mut self) -> Result<Value, JsParseError> {
        self.skip_trivia();
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }

        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some(b'{') => self.nested(Self::object),
            Some(b'[') => self.nested(Self::array),
            Some(q @ (b'"' | b'\'' | b'`')) => self.string(q).map(Value::String),
            Some(b) if b == b'-' || b == b'+' || b == b'.' || b.is_ascii_digit() => self.number(),
            Some(_) if self.peek_char().is_some_and(is_ident_start) => self.word(),
            Some(_) => Err(self.error("unexpected character")),
        }
    }

    fn nested(
        &mut self,
        f: fn(&mut Self) -> Result<Value, JsParseError>,
    ) -> Result<Value, JsParseError> {
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn object(&mut self) -> Result<Value, JsParseError> {
        self.pos += 1;
        let mut map = Map::new();

        loop {
            self.skip_trivia();
            if self.eat(b'}') {
                return Ok(Value::Object(map));
            }

            let key = match self.peek() {
                Some(q @ (b'"' | b'\'' | b'`')) => self.string(q)?,
                Some(b) if b.is_ascii_digit() => match self.number()? {
                    Value::Number(n) => n.to_string(),
                    _ => return Err(self.error("invalid numeric key")),
                },
                _ if self.peek_char().is_some_and(is_ident_start) => self.identifier().to_string(),
                _ => return Err(self.error("expected object key")),
            };

            self.expect(b':')?;
            let value = self.value()?;
            map.insert(key, value);

            self.skip_trivia();
            if self.eat(b',') {
                continue;
            }
            if self.eat(b'}') {
                return Ok(Value::Object(map));
            }
            return Err(self.error("expected ',' or '}'"));
        }
    }

    fn array(&mut self) -> Result<Value, JsParseError> {
        self.pos += 1;
        let mut items = Vec::new();

        loop {
            self.skip_trivia();
            if self.eat(b']') {
                return Ok(Value::Array(items));
            }
            if self.eat(b',') {
                items.push(Value::Null);
                continue;
            }

            items.push(self.value()?);

            self.skip_trivia();
            if self.eat(b',') {
                continue;
            }
            if self.eat(b']') {
                return Ok(Value::Array(items));
            }
            return Err(self.error("expected ',' or ']'"));
        }
    }

    fn string(&mut self, quote: u8) -> Result<String, JsParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();

        loop {
            let Some(c) = self.peek_char() else {
                self.pos = start;
                return Err(self.error("unterminated string"));
            };
            self.pos += c.len_utf8();

            match c {
                c if c as u32 == quote as u32 => return Ok(out),
                '\\' => self.escape(&mut out)?,
                '$' if quote == b'`' && self.peek() == Some(b'{') => {
                    return Err(self.error("template interpolation is not a literal"));
                }
                '\n' if quote != b'`' => return Err(self.error("newline in string")),
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), JsParseError> {
        let Some(c) = self.peek_char() else {
            return Err(self.error("unterminated escape"));
        };
        self.pos += c.len_utf8();

        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !self.peek().is_some_and(|b| b.is_ascii_digit()) => out.push('\0'),
            'x' => {
                let code = self.hex_digits(2)?;
                out.push(char::from_u32(code).ok_or_else(|| self.error("bad \\x escape"))?);
            }
            'u' => {
                let ch = self.unicode_escape()?;
                out.push(ch);
            }
            '\r' => {
                self.eat(b'\n');
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            other => out.push(other),
        }
        Ok(())
    }

    fn unicode_escape(&mut self) -> Result<char, JsParseError> {
        if self.eat(b'{') {
            let start = self.pos;
            while self.peek().is_some_and(|b| b.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let code = u32::from_str_radix(&self.src[start..self.pos], 16)
                .map_err(|_| self.error("bad \\u{} escape"))?;
            if !self.eat(b'}') {
                return Err(self.error("unterminated \\u{} escape"));
            }
            return char::from_u32(code).ok_or_else(|| self.error("invalid code point"));
        }

        let high = self.hex_digits(4)?;
        if (0xD800..0xDC00).contains(&high) && self.src[self.pos..].starts_with("\\u") {
            let save = self.pos;
            self.pos += 2;
            if let Ok(low) = self.hex_digits(4) {
                if (0xDC00..0xE000).contains(&low) {
                    let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    return char::from_u32(code).ok_or_else(|| self.error("invalid surrogate pair"));
                }
            }
            self.pos = save;
        }
        Ok(char::from_u32(high).unwrap_or('\u{FFFD}'))
    }

    fn hex_digits(&mut self, n: usize) -> Result<u32, JsParseError> {
        let digits = self
            .src
            .get(self.pos..self.pos + n)
            .filter(|d| d.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| self.error("bad hex escape"))?;
        self.pos += n;
        u32::from_str_radix(digits, 16).map_err(|_| self.error("bad hex escape"))
    }

    fn number(&mut self) -> Result<Value, JsParseError> {
        let start = self.pos;
        let negative = if self.eat(b'-') {
            true
        } else {
            self.eat(b'+');
            false
        };

        if self.src[self.pos..].starts_with("Infinity") {
            self.pos += "Infinity".len();
            return Ok(Value::Null);
        }

        if self.peek() == Some(b'0') {
            let radix = match self.bytes.get(self.pos + 1) {
                Some(b'x' | b'X') => Some(16),
                Some(b'o' | b'O') => Some(8),
                Some(b'b' | b'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                let digits_start = self.pos;
                while self
                    .peek()
                    .is_some_and(|b| b == b'_' || (b as char).is_digit(radix))
                {
                    self.pos += 1;
                }
                let digits = self.src[digits_start..self.pos].replace('_', "");
                self.eat(b'n');
                let n = i64::from_str_radix(&digits, radix)
                    .map_err(|_| self.error("bad radix literal"))?;
                return Ok(Value::from(if negative { -n } else { n }));
            }
        }

        let digits_start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit() || b == b'_') {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.peek() == Some(b'.') {
            is_float = true;
            self.pos += 1;
            while self.peek().is_some_and(|b| b.is_ascii_digit() || b == b'_') {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            is_float = true;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
        }

        let text = self.src[digits_start..self.pos].replace('_', "");
        if text.is_empty() || text == "." {
            self.pos = start;
            return Err(self.error("invalid number"));
        }
        if !is_float {
            // BigInt suffix
            self.eat(b'n');
        }

        let signed = if negative { format!("-{text}") } else { text };
        if !is_float {
            if let Ok(n) = signed.parse::<i64>() {
                return Ok(Value::from(n));
            }
            if let Ok(n) = signed.parse::<u64>() {
                return Ok(Value::from(n));
            }
        }
        let f: f64 = signed.parse().map_err(|_| self.error("invalid number"))?;
        Ok(Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null))
    }

    fn identifier(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c == '$' || c == '_' || c.is_alphanumeric() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        &self.src[start..self.pos]
    }

    fn word(&mut self) -> Result<Value, JsParseError> {
        let start = self.pos;
        match self.identifier() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "null" | "undefined" | "NaN" | "Infinity" => Ok(Value::Null),
            "void" => {
                self.value()?;
                Ok(Value::Null)
            }
            "new" => self.constructor(),
            other => {
                let message = format!("unexpected identifier '{other}'");
                self.pos = start;
                Err(self.error(message))
            }
        }
    }

    /// `new Date(..)`, `new Map([[k, v], ..])`, `new Set([..])`; anything
    /// else collapses to its first argument.
    fn constructor(&mut self) -> Result<Value, JsParseError> {
        self.skip_trivia();
        let name = self.identifier();
        if name.is_empty() {
            return Err(self.error("expected constructor name"));
        }
        self.expect(b'(')?;

        let mut args = Vec::new();
        loop {
            self.skip_trivia();
            if self.eat(b')') {
                break;
            }
            args.push(self.value()?);
            self.skip_trivia();
            if self.eat(b',') {
                continue;
            }
            self.expect(b')')?;
            break;
        }

        let first = args.into_iter().next().unwrap_or(Value::Null);
        Ok(match name {
            "Date" => date_value(first),
            "Map" => map_value(first),
            _ => first,
        })
    }
}

fn is_ident_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_alphabetic()
}

fn date_value(arg: Value) -> Value {
    match arg {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(chrono::DateTime::from_timestamp_millis)
            .map(|dt| Value::String(dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)))
            .unwrap_or(Value::Null),
        other => other,
    }
}

fn map_value(arg: Value) -> Value {
    let Value::Array(entries) = arg else {
        return Value::Object(Map::new());
    };
    let mut map = Map::new();
    for entry in entries {
        if let Value::Array(pair) = entry {
            let mut pair = pair.into_iter();
            if let (Some(k), Some(v)) = (pair.next(), pair.next()) {
                let key = match k {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                map.insert(key, v);
            }
        }
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json_passes_through() {
        let v = parse_js_value(r#"{"a": [1, 2.5, "x"], "b": null, "c": true}"#).unwrap();
        assert_eq!(v, json!({ "a": [1, 2.5, "x"], "b": null, "c": true }));
    }

    #[test]
    fn test_js_only_syntax() {
        let src = r#"{
            // bootstrap payload
            type: 'data',
            $id: 0x1F,
            count: 1_000,
            missing: undefined,
            gone: void 0,
            list: [1, , 3,],
            note: `multi
line`,
        };"#;
        let v = parse_js_value(src).unwrap();
        assert_eq!(v["type"], "data");
        assert_eq!(v["$id"], 31);
        assert_eq!(v["count"], 1000);
        assert_eq!(v["missing"], Value::Null);
        assert_eq!(v["gone"], Value::Null);
        assert_eq!(v["list"], json!([1, null, 3]));
        assert_eq!(v["note"], "multi\nline");
    }

    #[test]
    fn test_constructors_are_flattened() {
        let v = parse_js_value(
            r#"{created: new Date(0), named: new Date("2024-05-01"), m: new Map([["k", 1]]), s: new Set([1,2])}"#,
        )
        .unwrap();
        assert_eq!(v["created"], "1970-01-01T00:00:00.000Z");
        assert_eq!(v["named"], "2024-05-01");
        assert_eq!(v["m"], json!({ "k": 1 }));
        assert_eq!(v["s"], json!([1, 2]));
    }

    #[test]
    fn test_string_escapes() {
        let v = parse_js_value(r#"['it\'s', "é\x41", "😀", "\u{1F600}"]"#).unwrap();
        assert_eq!(v, json!(["it's", "éA", "😀", "😀"]));
    }

    #[test]
    fn test_numbers() {
        let v = parse_js_value("[-1, .5, 5., 1e3, -Infinity, NaN, 10n, 18446744073709551615]").unwrap();
        assert_eq!(v[0], -1);
        assert_eq!(v[1], 0.5);
        assert_eq!(v[2], 5.0);
        assert_eq!(v[3], 1000.0);
        assert_eq!(v[4], Value::Null);
        assert_eq!(v[5], Value::Null);
        assert_eq!(v[6], 10);
        assert_eq!(v[7], json!(u64::MAX));
    }

    #[test]
    fn test_malformed_inputs_are_errors() {
        for bad in [
            "{a: 1",
            "{a 1}",
            "[1 2]",
            "'unterminated",
            "{a: someVariable}",
            "`${x}`",
            "\"line\nbreak\"",
            "{a: 1} extra",
            "new (1)",
            "-",
            "",
        ] {
            assert!(parse_js_value(bad).is_err(), "should reject {bad:?}");
        }
    }

    #[test]
    fn test_nesting_limit() {
        let deep = "[".repeat(MAX_DEPTH + 1) + &"]".repeat(MAX_DEPTH + 1);
        assert!(parse_js_value(&deep).is_err());
    }

    #[test]
    fn test_prefix_reports_consumed_bytes() {
        let (v, used) = parse_js_prefix("[1,2],form:null").unwrap();
        assert_eq!(v, json!([1, 2]));
        assert_eq!(used, 5);
    }

    #[test]
    fn test_balanced_end_skips_strings_and_comments() {
        let src = r#"x = {a: "}", b: [1, ']'], /* } */ c: {d: 1}} tail"#;
        let open = src.find('{').unwrap();
        let end = balanced_end(src, open).unwrap();
        assert_eq!(&src[end + 1..], " tail");

        assert_eq!(balanced_end("{ [ }", 0), None);
        assert_eq!(balanced_end("{ open", 0), None);
        assert_eq!(balanced_end("abc", 0), None);
    }

    #[test]
    fn test_array_element_spans() {
        let src = r#"[{a: [1, 2]}, "x,y" , {b: 2},]"#;
        let spans = array_element_spans(src, 0).unwrap();
        let pieces: Vec<&str> = spans.iter().map(|(s, e)| &src[*s..*e]).collect();
        assert_eq!(pieces, vec!["{a: [1, 2]}", r#""x,y""#, "{b: 2}"]);
    }

    #[test]
    fn test_strip_embedding_literals() {
        let src = r#"{card: {id: 1, clip_embedding: [0.1, [0.2], 0.3], name: "a"}, "clip_embedding" : [1]}"#;
        let stripped = strip_embedding_literals(src);
        assert_eq!(
            stripped,
            r#"{card: {id: 1, clip_embedding: null, name: "a"}, "clip_embedding" : null}"#
        );

        let untouched = "{clip_embedding: null}";
        assert!(matches!(strip_embedding_literals(untouched), Cow::Borrowed(_)));
    }
}
