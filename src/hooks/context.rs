use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::types::HookType;

const ENV_PREFIX: &str = "HOOK_";

/// Snapshot handed to a hook command and to reviewers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookContext {
    pub hook_type: HookType,
    pub timestamp: DateTime<Utc>,
    pub environment: String,
    pub user: String,
    pub working_dir: PathBuf,
    /// Domain fields flattened to primitive key/value pairs
    pub fields: BTreeMap<String, String>,
}

impl HookContext {
    pub fn build(hook_type: HookType, environment: &str, data: &Value) -> Self {
        let mut fields = BTreeMap::new();
        flatten_into(&mut fields, None, data);

        Self {
            hook_type,
            timestamp: Utc::now(),
            environment: environment.to_string(),
            user: acting_user(),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            fields,
        }
    }

    /// Feature or job id carried by the payload, if any
    pub fn feature_id(&self) -> Option<&str> {
        ["feature_id", "job_id", "id"]
            .iter()
            .find_map(|key| self.fields.get(*key))
            .map(String::as_str)
    }

    /// Worker ids carried by the payload
    pub fn agents(&self) -> Vec<String> {
        ["agents", "workers"]
            .iter()
            .find_map(|key| self.fields.get(*key))
            .map(|joined| {
                joined
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Environment variables exported to the hook command
    pub fn to_env(&self) -> Vec<(String, String)> {
        let agents = self.agents();
        let mut env = vec![
            (format!("{ENV_PREFIX}TYPE"), self.hook_type.to_string()),
            (format!("{ENV_PREFIX}TIMESTAMP"), self.timestamp.to_rfc3339()),
            (format!("{ENV_PREFIX}ENVIRONMENT"), self.environment.clone()),
            (format!("{ENV_PREFIX}USER"), self.user.clone()),
            (
                format!("{ENV_PREFIX}CWD"),
                self.working_dir.display().to_string(),
            ),
            (
                format!("{ENV_PREFIX}FEATURE_ID"),
                self.feature_id().unwrap_or_default().to_string(),
            ),
            (format!("{ENV_PREFIX}AGENTS"), agents.join(",")),
            (format!("{ENV_PREFIX}AGENT_COUNT"), agents.len().to_string()),
            (
                format!("{ENV_PREFIX}CONTEXT"),
                serde_json::to_string(self).unwrap_or_default(),
            ),
        ];

        env.extend(self.fields.iter().map(|(key, value)| {
            (
                format!("{ENV_PREFIX}DATA_{}", env_key(key)),
                value.clone(),
            )
        }));
        env
    }
}

fn acting_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|u| !u.is_empty())
        .or_else(|| {
            hostname::get()
                .ok()
                .map(|h| format!("unknown@{}", h.to_string_lossy()))
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn env_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

/// Nested keys are joined with `_`; arrays of primitives are joined with `,`.
fn flatten_into(out: &mut BTreeMap<String, String>, prefix: Option<&str>, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let full = match prefix {
                    Some(p) => format!("{p}_{key}"),
                    None => key.clone(),
                };
                flatten_into(out, Some(&full), nested);
            }
        }
        Value::Array(items) => {
            let Some(key) = prefix else { return };
            if items.iter().all(|item| !item.is_object() && !item.is_array()) {
                let joined = items.iter().map(primitive).collect::<Vec<_>>().join(",");
                out.insert(key.to_string(), joined);
            } else {
                for (index, item) in items.iter().enumerate() {
                    flatten_into(out, Some(&format!("{key}_{index}")), item);
                }
            }
        }
        other => {
            if let Some(key) = prefix {
                out.insert(key.to_string(), primitive(other));
            }
        }
    }
}

fn primitive(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
