//! Field templates
//!
//! Every output field of a record is configured as a template string. Plain
//! text is copied as is; `{{ ... }}` blocks are expressions over the
//! extraction context:
//!
//! ```text
//! {{ .title | trim }}
//! https://example.com{{ .href }}
//! {{ .date | timeFromStr "Y-m-d H:M" }}
//! {{ .posted | relativeTime | timeToStr "RFC3339" }}
//! ```
//!
//! A pipeline starts with a field reference, a quoted literal or a function
//! call. Each `| func args...` stage calls `func` with its arguments followed
//! by the value of the previous stage. Templates are parsed once at config
//! load and evaluated directly to typed values.

mod functions;
mod parser;
mod time;

pub use functions::Func;
pub use time::{format_time, parse_compact_time, parse_relative_time, parse_timestamp};

use crate::extract::{ExtractionContext, FieldValue};
use chrono::{DateTime, FixedOffset};
use std::fmt;
use thiserror::Error;

/// Errors raised while parsing a template
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unclosed '{{{{' at byte {0}")]
    Unclosed(usize),

    #[error("empty expression at byte {0}")]
    EmptyExpression(usize),

    #[error("unterminated string literal in '{0}'")]
    UnterminatedString(String),

    #[error("unexpected token '{token}' in '{expr}'")]
    UnexpectedToken { token: String, expr: String },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' takes {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },
}

/// Errors raised while evaluating a template against a context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("{func}: expected {expected}, got {got}")]
    Type {
        func: &'static str,
        expected: &'static str,
        got: &'static str,
    },

    #[error("{func}: cannot parse time '{input}' with format '{format}'")]
    TimeParse {
        func: &'static str,
        input: String,
        format: String,
    },

    #[error("relativeTime: unrecognised phrase '{0}'")]
    RelativeTime(String),

    #[error("index {index} out of range for list of {len}")]
    Index { index: i64, len: usize },
}

/// A value produced by template evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    List(Vec<String>),
    Int(i64),
    Time(DateTime<FixedOffset>),
}

impl Value {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Int(_) => "integer",
            Self::Time(_) => "time",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::List(items) => write!(f, "[{}]", items.join(" ")),
            Self::Int(n) => write!(f, "{}", n),
            Self::Time(t) => f.write_str(&t.to_rfc3339()),
        }
    }
}

impl From<&FieldValue> for Value {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::Text(s) => Self::Text(s.clone()),
            FieldValue::List(items) => Self::List(items.clone()),
        }
    }
}

/// An operand inside an expression
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Field(String),
    Str(String),
    Int(i64),
}

/// One stage of a pipeline
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Operand(Operand),
    Call { func: Func, args: Vec<Operand> },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment {
    Literal(String),
    Pipeline(Vec<Command>),
}

/// A parsed template
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parses a template string
    ///
    /// # Errors
    ///
    /// Returns a `TemplateError` for unbalanced delimiters, bad literals,
    /// unknown functions or wrong argument counts.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            segments: parser::parse_segments(source)?,
        })
    }

    /// Returns true when the template has no content at all
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Names of every context field the template references
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        for segment in &self.segments {
            if let Segment::Pipeline(commands) = segment {
                for command in commands {
                    let operands: &[Operand] = match command {
                        Command::Operand(op) => std::slice::from_ref(op),
                        Command::Call { args, .. } => args,
                    };
                    for op in operands {
                        if let Operand::Field(name) = op {
                            fields.push(name.as_str());
                        }
                    }
                }
            }
        }
        fields
    }

    /// Evaluates the template to a typed value
    ///
    /// A template made of a single expression yields that expression's value
    /// unchanged (so a time stays a time). Anything else is concatenated
    /// into text.
    pub fn evaluate(&self, ctx: &ExtractionContext) -> Result<Value, EvalError> {
        if let [Segment::Pipeline(commands)] = self.segments.as_slice() {
            return eval_pipeline(commands, ctx);
        }

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Pipeline(commands) => {
                    out.push_str(&eval_pipeline(commands, ctx)?.to_string())
                }
            }
        }
        Ok(Value::Text(out))
    }

    /// Evaluates the template and renders the result as text
    pub fn render(&self, ctx: &ExtractionContext) -> Result<String, EvalError> {
        Ok(self.evaluate(ctx)?.to_string())
    }
}

fn resolve(operand: &Operand, ctx: &ExtractionContext) -> Value {
    match operand {
        // Missing fields render as empty text
        Operand::Field(name) => ctx
            .get(name)
            .map(Value::from)
            .unwrap_or_else(|| Value::Text(String::new())),
        Operand::Str(s) => Value::Text(s.clone()),
        Operand::Int(n) => Value::Int(*n),
    }
}

fn eval_pipeline(commands: &[Command], ctx: &ExtractionContext) -> Result<Value, EvalError> {
    let mut piped: Option<Value> = None;
    for command in commands {
        let value = match command {
            Command::Operand(op) => resolve(op, ctx),
            Command::Call { func, args } => {
                let mut values: Vec<Value> = args.iter().map(|a| resolve(a, ctx)).collect();
                if let Some(prev) = piped.take() {
                    values.push(prev);
                }
                func.apply(values)?
            }
        };
        piped = Some(value);
    }
    Ok(piped.unwrap_or_else(|| Value::Text(String::new())))
}
