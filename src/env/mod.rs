//! Env file materialization.
//!
//! Each declared field is resolved from the deployment-scoped variable
//! (`<prefix><FIELD>`), then the bare variable, then the operator. Values
//! that are blank after trimming are left out.

pub mod prompt;

use crate::observer::{DeployEvent, DeployObserver};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub use prompt::{DialoguerPrompt, NonInteractivePrompt, PromptError, PromptProvider, ScriptedPrompt};

/// Variable lookup used during resolution.
pub trait EnvSource: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
}

/// The invoking process's environment.
#[derive(Debug, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_string(), value.to_string());
        self
    }
}

impl EnvSource for MapEnv {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for MapEnv {
    fn from(vars: [(&str, &str); N]) -> Self {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvValueSource {
    /// `<prefix><FIELD>` in the environment.
    Scoped,
    /// `<FIELD>` in the environment.
    Bare,
    Prompt,
    /// Blank after trimming; no line written.
    Omitted,
}

impl fmt::Display for EnvValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnvValueSource::Scoped => "deployment-scoped variable",
            EnvValueSource::Bare => "environment",
            EnvValueSource::Prompt => "prompt",
            EnvValueSource::Omitted => "nowhere (omitted)",
        };
        f.write_str(name)
    }
}

/// A resolved `KEY=VALUE` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvLine {
    pub key: String,
    pub value: String,
}

impl fmt::Display for EnvLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

pub struct EnvResolver<'a> {
    prefix: &'a str,
    env: &'a dyn EnvSource,
    prompt: &'a dyn PromptProvider,
}

impl<'a> EnvResolver<'a> {
    pub fn new(prefix: &'a str, env: &'a dyn EnvSource, prompt: &'a dyn PromptProvider) -> Self {
        Self {
            prefix,
            env,
            prompt,
        }
    }

    /// Resolve one field. Each source is consulted only when every earlier
    /// one is unset or empty.
    pub async fn resolve_field(
        &self,
        field: &str,
    ) -> Result<(Option<EnvLine>, EnvValueSource), PromptError> {
        let scoped = format!("{}{}", self.prefix, field);
        let (value, source) = if let Some(value) = non_empty(self.env.get(&scoped)) {
            (value, EnvValueSource::Scoped)
        } else if let Some(value) = non_empty(self.env.get(field)) {
            (value, EnvValueSource::Bare)
        } else {
            (self.prompt.ask(field).await?, EnvValueSource::Prompt)
        };

        let value = value.trim();
        if value.is_empty() {
            return Ok((None, EnvValueSource::Omitted));
        }
        Ok((
            Some(EnvLine {
                key: field.to_string(),
                value: value.to_string(),
            }),
            source,
        ))
    }

    /// Resolve every field in declaration order.
    pub async fn resolve_all(
        &self,
        fields: &[String],
        observer: &dyn DeployObserver,
    ) -> Result<Vec<EnvLine>, PromptError> {
        let mut lines = Vec::with_capacity(fields.len());
        for field in fields {
            let (line, source) = self.resolve_field(field).await?;
            observer.on_event(&DeployEvent::EnvResolved {
                field: field.clone(),
                source,
            });
            lines.extend(line);
        }
        Ok(lines)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Newline-joined env file body, no trailing newline.
pub fn render(lines: &[EnvLine]) -> String {
    lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
