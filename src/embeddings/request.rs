//! Request and response shapes for the embedding API.
//!
//! `input` is loosely typed on the wire: a single string, a list of
//! arbitrary JSON values, or any other value. [`EmbeddingInput::into_texts`]
//! turns all three into the ordered list of texts handed to the model.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Batch size used when the request does not carry a positive one.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Text input of an embedding request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    /// A single text.
    Text(String),
    /// An ordered list; each element is coerced to text.
    Batch(Vec<Value>),
    /// Any other value, coerced to a single text.
    Other(Value),
}

impl EmbeddingInput {
    /// Coerce into the canonical ordered list of texts.
    #[must_use]
    pub fn into_texts(self) -> Vec<String> {
        match self {
            Self::Text(text) => vec![text],
            Self::Batch(items) => items.into_iter().map(value_to_text).collect(),
            Self::Other(value) => vec![value_to_text(value)],
        }
    }
}

/// Strings pass through unchanged; everything else takes the form Python's
/// `str()` gives the decoded value (`True`, `None`, `{'k': 'v'}`, `[1, 2]`).
fn value_to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => {
            let mut out = String::new();
            write_repr(&other, &mut out);
            out
        }
    }
}

fn write_repr(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Number(n) => out.push_str(&number_repr(n)),
        Value::String(s) => write_str_repr(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_repr(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_str_repr(key, out);
                out.push_str(": ");
                write_repr(item, out);
            }
            out.push('}');
        }
    }
}

fn number_repr(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    n.as_f64().map_or_else(|| n.to_string(), float_repr)
}

/// Shortest round-trip digits, positional for exponents in `-4..16` and
/// scientific with a signed two-digit exponent otherwise.
fn float_repr(x: f64) -> String {
    let scientific = format!("{x:e}");
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if (-4..16).contains(&exponent) {
        let fixed = x.to_string();
        if fixed.contains('.') {
            fixed
        } else {
            format!("{fixed}.0")
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs())
    }
}

/// Quoted string literal: single quotes unless only double quotes avoid escaping.
fn write_str_repr(s: &str, out: &mut String) {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };

    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

/// Body of `POST /embeddings`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddingRequest {
    /// Text(s) to embed. `None` when absent or `null`.
    #[serde(default)]
    pub input: Option<EmbeddingInput>,

    /// Return unit-length vectors.
    #[serde(default)]
    pub normalize: Option<bool>,

    /// Number of texts the model processes per internal pass.
    #[serde(default)]
    pub batch_size: Option<i64>,
}

impl EmbeddingRequest {
    /// Request for the given texts with default options.
    #[must_use]
    pub fn new(input: EmbeddingInput) -> Self {
        Self {
            input: Some(input),
            ..Self::default()
        }
    }

    /// Whether output vectors should be L2-normalized.
    #[must_use]
    pub fn normalize(&self) -> bool {
        self.normalize.unwrap_or(false)
    }

    /// Requested batch size, falling back to [`DEFAULT_BATCH_SIZE`] when
    /// absent or not positive. No upper bound is applied.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
            .and_then(|n| usize::try_from(n).ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_BATCH_SIZE)
    }
}

/// Body returned by `POST /embeddings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// One vector per input text, in input order.
    pub embedding: Vec<Vec<f32>>,
    /// Number of texts processed.
    pub input_count: usize,
}

/// Body returned by `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
    pub model: String,
}
