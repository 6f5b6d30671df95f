use crate::extract::FieldValue;
use crate::hook::{fields_from_json, HookError, ScriptHook};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::process::Command;

/// Runs an external program per candidate
///
/// The argument is appended as the last command-line argument and the
/// program's stdout is read as a JSON object.
#[derive(Debug, Clone)]
pub struct CommandHook {
    program: String,
    args: Vec<String>,
}

impl CommandHook {
    /// Builds a hook from `[program, args...]`
    pub fn new(command: &[String]) -> Result<Self, HookError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| HookError::Shape("empty hook command".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl ScriptHook for CommandHook {
    async fn call(&self, argument: &str) -> Result<HashMap<String, FieldValue>, HookError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(argument)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| HookError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(HookError::Exit {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        fields_from_json(value)
    }
}
