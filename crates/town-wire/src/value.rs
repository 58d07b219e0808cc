//! API value wire format (spec.md §4.2).
//!
//! A payload carrying "N values" is a concatenation of N tagged entries;
//! `N` travels out-of-band in the owning message's `status` byte. Modeled
//! on `snow-rt::dist::wire`'s self-describing tag-prefixed STF encoding,
//! narrowed to the tag set this spec defines.

use std::fmt;

/// One decoded API value.
///
/// `Table` has no populated encoder in the original service (spec.md §9
/// Open Questions); it decodes to this empty marker rather than a guessed
/// layout. `MiniTilemap` is likewise a marker — its payload shape is an
/// external-collaborator concern (graphics helpers, out of scope per §1).
#[derive(Debug, Clone, PartialEq)]
pub enum ApiValue {
    Nil,
    Bool(bool),
    Integer(i32),
    Str(Vec<u8>),
    Json(String),
    Table,
    MiniTilemap,
}

const TAG_NIL: u8 = 0;
const TAG_FALSE: u8 = 1;
const TAG_TRUE: u8 = 2;
const TAG_INTEGER: u8 = 3;
const TAG_STRING: u8 = 4;
const TAG_JSON: u8 = 5;
const TAG_TABLE: u8 = 6;
const TAG_MINI_TILEMAP: u8 = 7;

/// Errors from encoding/decoding API values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    UnknownTag(u8),
    InvalidUtf8,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTag(t) => write!(f, "unknown API value tag {t}"),
            Self::InvalidUtf8 => write!(f, "JSON value payload was not valid UTF-8"),
        }
    }
}

impl std::error::Error for WireError {}

impl ApiValue {
    fn tag(&self) -> u8 {
        match self {
            ApiValue::Nil => TAG_NIL,
            ApiValue::Bool(false) => TAG_FALSE,
            ApiValue::Bool(true) => TAG_TRUE,
            ApiValue::Integer(_) => TAG_INTEGER,
            ApiValue::Str(_) => TAG_STRING,
            ApiValue::Json(_) => TAG_JSON,
            ApiValue::Table => TAG_TABLE,
            ApiValue::MiniTilemap => TAG_MINI_TILEMAP,
        }
    }

    /// Append this value's wire encoding to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.tag());
        match self {
            ApiValue::Nil | ApiValue::Bool(_) | ApiValue::Table | ApiValue::MiniTilemap => {}
            ApiValue::Integer(n) => out.extend_from_slice(&n.to_le_bytes()),
            ApiValue::Str(bytes) => {
                out.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
                out.extend_from_slice(bytes);
            }
            ApiValue::Json(s) => {
                out.extend_from_slice(&(s.len() as i32).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
        }
    }
}

/// Encode a full argument/result list. The caller is responsible for
/// placing `values.len()` in the owning message's `status` byte.
pub fn encode_values(values: &[ApiValue]) -> Vec<u8> {
    let mut out = Vec::new();
    for v in values {
        v.encode_into(&mut out);
    }
    out
}

/// Decode up to `count` values from `data`.
///
/// Per spec.md §4.2, decoding stops when either `count` is exhausted or the
/// buffer ends; a truncated final entry silently ends decoding rather than
/// erroring ("overruns truncate silently").
pub fn decode_values(data: &[u8], count: usize) -> Vec<ApiValue> {
    let mut out = Vec::with_capacity(count.min(data.len()));
    let mut pos = 0usize;

    for _ in 0..count {
        let Some(&tag) = data.get(pos) else { break };
        pos += 1;

        let value = match tag {
            TAG_NIL => ApiValue::Nil,
            TAG_FALSE => ApiValue::Bool(false),
            TAG_TRUE => ApiValue::Bool(true),
            TAG_INTEGER => {
                let Some(bytes) = data.get(pos..pos + 4) else {
                    break;
                };
                pos += 4;
                ApiValue::Integer(i32::from_le_bytes(bytes.try_into().unwrap()))
            }
            TAG_STRING | TAG_JSON => {
                let Some(len_bytes) = data.get(pos..pos + 4) else {
                    break;
                };
                let len = i32::from_le_bytes(len_bytes.try_into().unwrap()).max(0) as usize;
                pos += 4;
                let Some(bytes) = data.get(pos..pos + len) else {
                    break;
                };
                pos += len;
                if tag == TAG_STRING {
                    ApiValue::Str(bytes.to_vec())
                } else {
                    match std::str::from_utf8(bytes) {
                        Ok(s) => ApiValue::Json(s.to_string()),
                        Err(_) => break,
                    }
                }
            }
            TAG_TABLE => ApiValue::Table,
            TAG_MINI_TILEMAP => ApiValue::MiniTilemap,
            _ => break,
        };
        out.push(value);
    }

    out
}

/// One character of an API call's "argument signature" (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Entity,
    Bool,
    Str,
    Number,
    Integer,
    IntegerOrString,
    Table,
    OptionalFunction,
    Function,
    Stringifiable,
}

impl ParamKind {
    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'E' => ParamKind::Entity,
            'b' => ParamKind::Bool,
            's' => ParamKind::Str,
            'n' => ParamKind::Number,
            'i' => ParamKind::Integer,
            'I' => ParamKind::IntegerOrString,
            't' => ParamKind::Table,
            'F' => ParamKind::OptionalFunction,
            'f' => ParamKind::Function,
            '$' => ParamKind::Stringifiable,
            _ => return None,
        })
    }

    /// Whether `value` is an acceptable wire representation for this kind.
    /// Function/entity parameters are interpreter-side concepts with no
    /// wire representation of their own, so they accept any value that
    /// reaches here; the scheduler layer is not responsible for validating
    /// the catalog of API calls (spec.md §1 Non-goals).
    fn accepts(self, value: &ApiValue) -> bool {
        match self {
            ParamKind::Bool => matches!(value, ApiValue::Bool(_)),
            ParamKind::Str => matches!(value, ApiValue::Str(_)),
            ParamKind::Integer | ParamKind::Entity => matches!(value, ApiValue::Integer(_)),
            ParamKind::IntegerOrString => {
                matches!(value, ApiValue::Integer(_) | ApiValue::Str(_))
            }
            ParamKind::Table => matches!(value, ApiValue::Table),
            ParamKind::Number
            | ParamKind::OptionalFunction
            | ParamKind::Function
            | ParamKind::Stringifiable => true,
        }
    }
}

/// A parsed argument signature, e.g. `"Es"` (entity, then string).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSignature {
    pub params: Vec<ParamKind>,
}

impl ArgSignature {
    /// Parse a signature string, skipping characters outside the known set
    /// (callers control this string; it is never attacker-controlled wire
    /// data, so parsing is lenient rather than erroring).
    pub fn parse(sig: &str) -> Self {
        ArgSignature {
            params: sig.chars().filter_map(ParamKind::from_char).collect(),
        }
    }

    /// Whether `values` satisfies this signature: enough values of
    /// compatible kinds. A negative `declared_count` means "at least
    /// `|declared_count|` values" (spec.md §4.2); a non-negative count
    /// means exactly that many.
    pub fn matches(&self, values: &[ApiValue], declared_count: i32) -> bool {
        let required = declared_count.unsigned_abs() as usize;
        let count_ok = if declared_count < 0 {
            values.len() >= required
        } else {
            values.len() == required
        };
        if !count_ok {
            return false;
        }
        self.params
            .iter()
            .zip(values.iter())
            .all(|(kind, value)| kind.accepts(value))
    }
}
