//! Scripting hooks
//!
//! A hook receives one string argument describing a candidate and answers
//! with a flat map of fields to merge into its extraction context.

mod command;

pub use command::CommandHook;

use crate::extract::FieldValue;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by a scripting hook
#[derive(Debug, Error)]
pub enum HookError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("hook output is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("hook output must be a flat object: {0}")]
    Shape(String),
}

/// A hook computing extra fields for a candidate
#[async_trait]
pub trait ScriptHook: Send + Sync {
    async fn call(&self, argument: &str) -> Result<HashMap<String, FieldValue>, HookError>;
}

/// Converts a hook's JSON answer into context fields
///
/// Scalars become text and arrays of scalars become lists. Nested objects,
/// nested arrays and nulls are rejected.
pub fn fields_from_json(value: serde_json::Value) -> Result<HashMap<String, FieldValue>, HookError> {
    let object = match value {
        serde_json::Value::Object(object) => object,
        other => return Err(HookError::Shape(format!("expected an object, got {other}"))),
    };

    object
        .into_iter()
        .map(|(key, value)| {
            let field = match value {
                serde_json::Value::Array(items) => FieldValue::List(
                    items
                        .into_iter()
                        .map(|item| scalar(&key, item))
                        .collect::<Result<Vec<_>, _>>()?,
                ),
                other => FieldValue::Text(scalar(&key, other)?),
            };
            Ok((key, field))
        })
        .collect()
}

fn scalar(key: &str, value: serde_json::Value) -> Result<String, HookError> {
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(HookError::Shape(format!("unsupported value for '{key}': {other}"))),
    }
}
