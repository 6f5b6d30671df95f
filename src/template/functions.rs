//! Helper functions available inside template expressions

use crate::extract::{escape_markup, unescape_markup};
use crate::template::time::{format_time, parse_compact_time, parse_relative_time, parse_timestamp};
use crate::template::{EvalError, Value};
use chrono::Local;

/// A template helper function
///
/// Arguments are positional; in a pipeline the previous value is appended as
/// the last argument, so every function takes its subject last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Trim,
    Upper,
    Lower,
    Title,
    TrimPrefix,
    TrimSuffix,
    Replace,
    Default,
    Join,
    First,
    Last,
    Index,
    Trunc,
    TimeFromStr,
    TimeToStr,
    RelativeTime,
    Now,
    Escape,
    Unescape,
}

impl Func {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "trim" => Self::Trim,
            "upper" => Self::Upper,
            "lower" => Self::Lower,
            "title" => Self::Title,
            "trimPrefix" => Self::TrimPrefix,
            "trimSuffix" => Self::TrimSuffix,
            "replace" => Self::Replace,
            "default" => Self::Default,
            "join" => Self::Join,
            "first" => Self::First,
            "last" => Self::Last,
            "index" => Self::Index,
            "trunc" | "truncate" => Self::Trunc,
            "timeFromStr" => Self::TimeFromStr,
            "timeToStr" => Self::TimeToStr,
            "relativeTime" => Self::RelativeTime,
            "now" => Self::Now,
            "escape" => Self::Escape,
            "unescape" => Self::Unescape,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Trim => "trim",
            Self::Upper => "upper",
            Self::Lower => "lower",
            Self::Title => "title",
            Self::TrimPrefix => "trimPrefix",
            Self::TrimSuffix => "trimSuffix",
            Self::Replace => "replace",
            Self::Default => "default",
            Self::Join => "join",
            Self::First => "first",
            Self::Last => "last",
            Self::Index => "index",
            Self::Trunc => "trunc",
            Self::TimeFromStr => "timeFromStr",
            Self::TimeToStr => "timeToStr",
            Self::RelativeTime => "relativeTime",
            Self::Now => "now",
            Self::Escape => "escape",
            Self::Unescape => "unescape",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Self::Now => 0,
            Self::Trim
            | Self::Upper
            | Self::Lower
            | Self::Title
            | Self::First
            | Self::Last
            | Self::RelativeTime
            | Self::Escape
            | Self::Unescape => 1,
            Self::TrimPrefix
            | Self::TrimSuffix
            | Self::Default
            | Self::Join
            | Self::Index
            | Self::Trunc
            | Self::TimeFromStr
            | Self::TimeToStr => 2,
            Self::Replace => 3,
        }
    }

    /// Applies the function; `args.len()` has been checked against `arity`
    pub(crate) fn apply(&self, mut args: Vec<Value>) -> Result<Value, EvalError> {
        let name = self.name();
        match self {
            Self::Now => Ok(Value::Time(Local::now().fixed_offset())),
            Self::Trim => map_text(name, pop(&mut args), |s| s.trim().to_string()),
            Self::Upper => map_text(name, pop(&mut args), on_decoded(|s| s.to_uppercase())),
            Self::Lower => map_text(name, pop(&mut args), on_decoded(|s| s.to_lowercase())),
            Self::Title => map_text(name, pop(&mut args), on_decoded(title_case)),
            Self::Escape => map_text(name, pop(&mut args), escape_markup),
            Self::Unescape => map_text(name, pop(&mut args), |s| {
                unescape_markup(s).unwrap_or_else(|_| s.to_string())
            }),
            Self::TrimPrefix => {
                let subject = pop(&mut args);
                let prefix = text(name, pop(&mut args))?;
                map_text(name, subject, |s| {
                    s.strip_prefix(prefix.as_str()).unwrap_or(s).to_string()
                })
            }
            Self::TrimSuffix => {
                let subject = pop(&mut args);
                let suffix = text(name, pop(&mut args))?;
                map_text(name, subject, |s| {
                    s.strip_suffix(suffix.as_str()).unwrap_or(s).to_string()
                })
            }
            Self::Replace => {
                let subject = pop(&mut args);
                let new = text(name, pop(&mut args))?;
                let old = text(name, pop(&mut args))?;
                map_text(name, subject, |s| s.replace(old.as_str(), new.as_str()))
            }
            Self::Default => {
                let subject = pop(&mut args);
                let fallback = pop(&mut args);
                let empty = match &subject {
                    Value::Text(s) => s.is_empty(),
                    Value::List(items) => items.is_empty(),
                    _ => false,
                };
                Ok(if empty { fallback } else { subject })
            }
            Self::Join => {
                let subject = pop(&mut args);
                let sep = text(name, pop(&mut args))?;
                match subject {
                    Value::List(items) => Ok(Value::Text(items.join(&sep))),
                    other => Ok(Value::Text(text(name, other)?)),
                }
            }
            Self::First => match pop(&mut args) {
                Value::List(items) => Ok(Value::Text(items.into_iter().next().unwrap_or_default())),
                other => Ok(other),
            },
            Self::Last => match pop(&mut args) {
                Value::List(items) => Ok(Value::Text(items.into_iter().last().unwrap_or_default())),
                other => Ok(other),
            },
            Self::Index => {
                let subject = pop(&mut args);
                let index = int(name, pop(&mut args))?;
                match subject {
                    Value::List(items) => usize::try_from(index)
                        .ok()
                        .and_then(|i| items.get(i).cloned())
                        .map(Value::Text)
                        .ok_or(EvalError::Index {
                            index,
                            len: items.len(),
                        }),
                    Value::Text(s) if index == 0 => Ok(Value::Text(s)),
                    Value::Text(_) => Err(EvalError::Index { index, len: 1 }),
                    other => Err(EvalError::Type {
                        func: name,
                        expected: "list",
                        got: other.kind(),
                    }),
                }
            }
            Self::Trunc => {
                let subject = pop(&mut args);
                let n = int(name, pop(&mut args))?.max(0) as usize;
                map_text(name, subject, on_decoded(move |s| s.chars().take(n).collect()))
            }
            Self::TimeFromStr => {
                let subject = pop(&mut args);
                let format = text(name, pop(&mut args))?;
                match subject {
                    Value::Time(t) => Ok(Value::Time(t)),
                    other => {
                        let input = text(name, other)?;
                        parse_compact_time(&format, input.trim())
                            .map(Value::Time)
                            .ok_or(EvalError::TimeParse {
                                func: "timeFromStr",
                                input,
                                format,
                            })
                    }
                }
            }
            Self::TimeToStr => {
                let subject = pop(&mut args);
                let format = text(name, pop(&mut args))?;
                let time = match subject {
                    Value::Time(t) => t,
                    other => {
                        let input = text(name, other)?;
                        parse_timestamp(input.trim()).ok_or(EvalError::TimeParse {
                            func: "timeToStr",
                            input,
                            format: format.clone(),
                        })?
                    }
                };
                Ok(Value::Text(format_time(&format, &time)))
            }
            Self::RelativeTime => {
                let input = text(name, pop(&mut args))?;
                parse_relative_time(&input, Local::now().fixed_offset())
                    .map(Value::Time)
                    .ok_or(EvalError::RelativeTime(input))
            }
        }
    }
}

fn pop(args: &mut Vec<Value>) -> Value {
    args.pop().unwrap_or_else(|| Value::Text(String::new()))
}

fn text(func: &'static str, value: Value) -> Result<String, EvalError> {
    match value {
        Value::Text(s) => Ok(s),
        Value::Int(n) => Ok(n.to_string()),
        Value::Time(t) => Ok(t.to_rfc3339()),
        other => Err(EvalError::Type {
            func,
            expected: "text",
            got: other.kind(),
        }),
    }
}

fn int(func: &'static str, value: Value) -> Result<i64, EvalError> {
    match value {
        Value::Int(n) => Ok(n),
        Value::Text(s) => s.trim().parse().map_err(|_| EvalError::Type {
            func,
            expected: "integer",
            got: "text",
        }),
        other => Err(EvalError::Type {
            func,
            expected: "integer",
            got: other.kind(),
        }),
    }
}

/// Applies a string transform to text, or to every item of a list
fn map_text(
    func: &'static str,
    value: Value,
    f: impl Fn(&str) -> String,
) -> Result<Value, EvalError> {
    match value {
        Value::List(items) => Ok(Value::List(items.iter().map(|s| f(s.as_str())).collect())),
        other => Ok(Value::Text(f(&text(func, other)?))),
    }
}

/// Applies `f` to decoded character data and escapes the result again
///
/// Values that do not decode, such as raw markup, are transformed as is.
fn on_decoded(f: impl Fn(&str) -> String) -> impl Fn(&str) -> String {
    move |s: &str| match unescape_markup(s) {
        Ok(plain) => escape_markup(&f(&plain)),
        Err(_) => f(s),
    }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.push(c);
        }
    }
    out
}
