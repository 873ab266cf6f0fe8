//! JSON parse mode.
//!
//! `EvalFlags::JSON` treats the whole source as one JSON value instead of a
//! program. The grammar here is standard JSON; the result is a plain tree
//! the evaluation boundary turns into engine values.

use super::ParseError;

#[derive(Clone, Debug, PartialEq)]
pub enum JsonValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<JsonValue>),
    Object(Vec<(String, JsonValue)>),
}

struct JsonParser<'a> {
    src: &'a [u8],
    pos: usize,
}

pub(crate) fn parse_json(source: &[u8]) -> Result<JsonValue, ParseError> {
    let mut parser = JsonParser { src: source, pos: 0 };
    parser.skip_ws();
    let value = parser.parse_value(0)?;
    parser.skip_ws();
    if parser.pos != parser.src.len() {
        return Err(parser.error("unexpected trailing characters"));
    }
    Ok(value)
}

const MAX_JSON_DEPTH: u32 = 256;

impl<'a> JsonParser<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self
            .peek()
            .is_some_and(|c| matches!(c, b' ' | b'\t' | b'\n' | b'\r'))
        {
            self.pos += 1;
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        // Line/column bookkeeping is coarse for JSON mode: report the byte
        // position's line.
        let upto = &self.src[..self.pos.min(self.src.len())];
        let line = upto.iter().filter(|&&c| c == b'\n').count() as u32;
        let column = upto
            .iter()
            .rev()
            .take_while(|&&c| c != b'\n')
            .count() as u32;
        ParseError {
            message: message.into(),
            line,
            column,
        }
    }

    fn expect_literal(&mut self, text: &str, value: JsonValue) -> Result<JsonValue, ParseError> {
        if self.src[self.pos..].starts_with(text.as_bytes()) {
            self.pos += text.len();
            Ok(value)
        } else {
            Err(self.error("invalid JSON literal"))
        }
    }

    fn parse_value(&mut self, depth: u32) -> Result<JsonValue, ParseError> {
        if depth > MAX_JSON_DEPTH {
            return Err(self.error("JSON nests too deeply"));
        }
        match self.peek() {
            Some(b'n') => self.expect_literal("null", JsonValue::Null),
            Some(b't') => self.expect_literal("true", JsonValue::Bool(true)),
            Some(b'f') => self.expect_literal("false", JsonValue::Bool(false)),
            Some(b'"') => Ok(JsonValue::String(self.parse_string()?)),
            Some(b'[') => self.parse_array(depth),
            Some(b'{') => self.parse_object(depth),
            Some(c) if c == b'-' || c.is_ascii_digit() => self.parse_number(),
            _ => Err(self.error("unexpected character in JSON")),
        }
    }

    fn parse_number(&mut self) -> Result<JsonValue, ParseError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text = &self.src[start..self.pos];
        match lexical_core::parse::<f64>(text) {
            Ok(value) => Ok(JsonValue::Number(value)),
            Err(_) => Err(self.error("invalid JSON number")),
        }
    }

    fn parse_string(&mut self) -> Result<String, ParseError> {
        self.bump();
        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("unterminated JSON string"));
            };
            match c {
                b'"' => return Ok(out),
                b'\\' => {
                    let Some(esc) = self.bump() else {
                        return Err(self.error("unterminated JSON string"));
                    };
                    match esc {
                        b'"' => out.push('"'),
                        b'\\' => out.push('\\'),
                        b'/' => out.push('/'),
                        b'n' => out.push('\n'),
                        b't' => out.push('\t'),
                        b'r' => out.push('\r'),
                        b'b' => out.push('\u{8}'),
                        b'f' => out.push('\u{c}'),
                        b'u' => {
                            let mut code = 0u32;
                            for _ in 0..4 {
                                let digit = self
                                    .bump()
                                    .and_then(|d| (d as char).to_digit(16))
                                    .ok_or_else(|| self.error("invalid \\u escape"))?;
                                code = code * 16 + digit;
                            }
                            match char::from_u32(code) {
                                Some(ch) => out.push(ch),
                                None => return Err(self.error("invalid \\u escape")),
                            }
                        }
                        _ => return Err(self.error("invalid JSON escape")),
                    }
                }
                _ if c < 0x20 => return Err(self.error("control character in JSON string")),
                _ => {
                    // UTF-8 sequences pass through byte for byte.
                    let start = self.pos - 1;
                    let len = match c {
                        0xf0..=0xf7 => 4,
                        0xe0..=0xef => 3,
                        0xc0..=0xdf => 2,
                        _ => 1,
                    };
                    for _ in 1..len {
                        self.bump();
                    }
                    out.push_str(&String::from_utf8_lossy(&self.src[start..self.pos]));
                }
            }
        }
    }

    fn parse_array(&mut self, depth: u32) -> Result<JsonValue, ParseError> {
        self.bump();
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.bump();
            return Ok(JsonValue::Array(items));
        }
        loop {
            self.skip_ws();
            items.push(self.parse_value(depth + 1)?);
            self.skip_ws();
            match self.bump() {
                Some(b',') => continue,
                Some(b']') => return Ok(JsonValue::Array(items)),
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn parse_object(&mut self, depth: u32) -> Result<JsonValue, ParseError> {
        self.bump();
        let mut props = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.bump();
            return Ok(JsonValue::Object(props));
        }
        loop {
            self.skip_ws();
            if self.peek() != Some(b'"') {
                return Err(self.error("expected JSON object key"));
            }
            let key = self.parse_string()?;
            self.skip_ws();
            if self.bump() != Some(b':') {
                return Err(self.error("expected ':'"));
            }
            self.skip_ws();
            let value = self.parse_value(depth + 1)?;
            props.push((key, value));
            self.skip_ws();
            match self.bump() {
                Some(b',') => continue,
                Some(b'}') => return Ok(JsonValue::Object(props)),
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalars() {
        assert_eq!(parse_json(b"null").expect("json"), JsonValue::Null);
        assert_eq!(parse_json(b"true").expect("json"), JsonValue::Bool(true));
        assert_eq!(parse_json(b"42").expect("json"), JsonValue::Number(42.0));
        assert_eq!(parse_json(b"-1.5e2").expect("json"), JsonValue::Number(-150.0));
        assert_eq!(
            parse_json(br#""a\nb""#).expect("json"),
            JsonValue::String("a\nb".into())
        );
    }

    #[test]
    fn parses_nested_structures() {
        let value = parse_json(br#"{"xs": [1, 2], "s": "hi"}"#).expect("json");
        match value {
            JsonValue::Object(props) => {
                assert_eq!(props.len(), 2);
                assert_eq!(props[0].0, "xs");
                assert_eq!(
                    props[0].1,
                    JsonValue::Array(vec![JsonValue::Number(1.0), JsonValue::Number(2.0)])
                );
                assert_eq!(props[1].1, JsonValue::String("hi".into()));
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse_json(b"1 2").is_err());
        assert!(parse_json(b"{").is_err());
        assert!(parse_json(b"[1,]").is_err());
    }
}
