//! Line-oriented record codec shared by the coordinator, the workers and the client.
//!
//! Every message is one line holding a flat object:
//!
//! ```text
//! {"type":"PREPARE_TRANSFER","tx_id":"tx_3f2c...","from":7,"to":9,"amount":30.00}
//! ```
//!
//! Values that read as a signed decimal number are written bare, everything else
//! is written between double quotes. There is no escaping, so values must not
//! contain `"`, `,`, `{`, `}`, `[` or `]`. The single exception to flatness is a
//! list of flat records (`"data":[{...},{...}]`), used by history and loan
//! responses.
//!
//! Decoding keeps every scalar as text; typed accessors parse on demand.

use crate::common::{AccountId, Amount, Error, ErrorCode, Result};
use std::fmt;

/// Request types understood by workers and the coordinator.
pub mod kind {
    pub const QUERY_ACCOUNT: &str = "CONSULTAR_CUENTA";
    pub const SUM_PARTITION: &str = "SUM_PARTITION";
    pub const PREPARE_TRANSFER: &str = "PREPARE_TRANSFER";
    pub const PREPARE_CREATE: &str = "PREPARE_CREATE";
    pub const PREPARE_DELETE: &str = "PREPARE_DELETE";
    pub const COMMIT: &str = "COMMIT";
    pub const ABORT: &str = "ABORT";
    pub const LOAN_STATUS: &str = "ESTADO_PAGO_PRESTAMO";
    pub const TRANSFER: &str = "TRANSFERIR_CUENTA";
    pub const CREATE_ACCOUNT: &str = "CREAR_CUENTA";
    pub const DELETE_ACCOUNT: &str = "ELIMINAR_CUENTA";
    pub const HISTORY: &str = "CONSULTAR_TRANSACCIONES";
    pub const RECONCILE: &str = "ARQUEO";
}

/// Response status carried in the `"status"` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Ready,
    Committed,
    Aborted,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Ready => "READY",
            Status::Committed => "COMMITTED",
            Status::Aborted => "ABORTED",
            Status::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OK" => Some(Status::Ok),
            "READY" => Some(Status::Ready),
            "COMMITTED" => Some(Status::Committed),
            "ABORTED" => Some(Status::Aborted),
            "ERROR" => Some(Status::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    List(Vec<Record>),
}

/// An ordered set of key/value pairs. Later keys shadow earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// A request of the given type.
    pub fn request(kind: &str) -> Self {
        Self::new().with("type", kind)
    }

    /// A response with the given status.
    pub fn status(status: Status) -> Self {
        Self::new().with("status", status.as_str())
    }

    pub fn ok() -> Self {
        Self::status(Status::Ok)
    }

    pub fn error(code: ErrorCode) -> Self {
        Self::status(Status::Error).with("error", code.as_str())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    pub fn with_list(mut self, key: &str, items: Vec<Record>) -> Self {
        self.put(key, Value::List(items));
        self
    }

    pub fn set(&mut self, key: &str, value: impl ToString) {
        self.put(key, Value::Text(value.to_string()));
    }

    fn put(&mut self, key: &str, value: Value) {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match self.value(key)? {
            Value::Text(s) => Some(s.as_str()),
            Value::List(_) => None,
        }
    }

    pub fn list(&self, key: &str) -> Option<&[Record]> {
        match self.value(key)? {
            Value::List(items) => Some(items.as_slice()),
            Value::Text(_) => None,
        }
    }

    fn value(&self, key: &str) -> Option<&Value> {
        self.fields.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Upper-cased `"type"` field.
    pub fn kind(&self) -> Option<String> {
        self.get("type").map(|t| t.trim().to_ascii_uppercase())
    }

    pub fn response_status(&self) -> Option<Status> {
        self.get("status").and_then(Status::parse)
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.get("error").and_then(ErrorCode::parse)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::MissingField(key.to_string()))
    }

    pub fn require_i64(&self, key: &str) -> Result<i64> {
        let raw = self.require(key)?;
        raw.trim()
            .parse()
            .map_err(|_| Error::Validation(format!("field {} is not an integer: {:?}", key, raw)))
    }

    pub fn require_account(&self, key: &str) -> Result<AccountId> {
        self.require_i64(key)
    }

    pub fn require_amount(&self, key: &str) -> Result<Amount> {
        self.require(key)?.parse()
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        out.push('{');
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push('"');
            out.push_str(key);
            out.push_str("\":");
            match value {
                Value::Text(text) if is_decimal(text) => out.push_str(text),
                Value::Text(text) => {
                    out.push('"');
                    out.push_str(text);
                    out.push('"');
                }
                Value::List(items) => {
                    out.push('[');
                    for (j, item) in items.iter().enumerate() {
                        if j > 0 {
                            out.push(',');
                        }
                        item.write_to(out);
                    }
                    out.push(']');
                }
            }
        }
        out.push('}');
    }

    pub fn decode(line: &str) -> Result<Record> {
        let mut parser = Parser { src: line.as_bytes(), pos: 0, line };
        parser.skip_ws();
        let record = parser.record()?;
        parser.skip_ws();
        if parser.pos != parser.src.len() {
            return Err(parser.fail("trailing characters after record"));
        }
        Ok(record)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// `[+-]?digits[.digits]`, also accepting `.5` and `5.`.
pub fn is_decimal(s: &str) -> bool {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
    (!whole.is_empty() || !frac.is_empty())
        && whole.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b.is_ascii_digit())
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    line: &'a str,
}

impl<'a> Parser<'a> {
    fn fail(&self, what: &str) -> Error {
        Error::Codec(format!("{} at byte {} in {:?}", what, self.pos, self.line))
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.fail(&format!("expected '{}'", byte as char)))
        }
    }

    fn record(&mut self) -> Result<Record> {
        self.expect(b'{')?;
        let mut record = Record::new();
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(record);
        }
        loop {
            self.skip_ws();
            let key = self.quoted()?;
            self.skip_ws();
            self.expect(b':')?;
            self.skip_ws();
            let value = self.value()?;
            record.put(&key, value);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(record);
                }
                _ => return Err(self.fail("expected ',' or '}'")),
            }
        }
    }

    fn value(&mut self) -> Result<Value> {
        match self.peek() {
            Some(b'"') => Ok(Value::Text(self.quoted()?)),
            Some(b'[') => self.list(),
            Some(b'{') => Err(self.fail("nested records are not supported")),
            _ => self.bare(),
        }
    }

    fn list(&mut self) -> Result<Value> {
        self.expect(b'[')?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(Value::List(items));
        }
        loop {
            self.skip_ws();
            items.push(self.record()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Value::List(items));
                }
                _ => return Err(self.fail("expected ',' or ']'")),
            }
        }
    }

    fn quoted(&mut self) -> Result<String> {
        self.expect(b'"')?;
        let start = self.pos;
        let len = self.src[start..]
            .iter()
            .position(|&b| b == b'"')
            .ok_or_else(|| self.fail("unterminated string"))?;
        self.pos = start + len + 1;
        Ok(self.line[start..start + len].to_string())
    }

    fn bare(&mut self) -> Result<Value> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b',' || b == b'}' || b == b']' || b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.fail("missing value"));
        }
        Ok(Value::Text(self.line[start..self.pos].to_string()))
    }
}
