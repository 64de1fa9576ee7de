use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Failed to read value for {field}: {reason}")]
    Input { field: String, reason: String },

    #[error("Prompt task for {field} did not complete: {reason}")]
    Interrupted { field: String, reason: String },
}

/// Asks the operator for a single-line value.
#[async_trait]
pub trait PromptProvider: Send + Sync {
    async fn ask(&self, field: &str) -> Result<String, PromptError>;
}

/// Terminal prompt backed by `dialoguer`. Empty answers are accepted.
#[derive(Debug, Default)]
pub struct DialoguerPrompt;

#[async_trait]
impl PromptProvider for DialoguerPrompt {
    async fn ask(&self, field: &str) -> Result<String, PromptError> {
        let name = field.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            dialoguer::Input::<String>::new()
                .with_prompt(&name)
                .allow_empty(true)
                .interact_text()
        })
        .await
        .map_err(|e| PromptError::Interrupted {
            field: field.to_string(),
            reason: e.to_string(),
        })?;

        answer.map_err(|e| PromptError::Input {
            field: field.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Answers every question with an empty value, so unresolved fields are
/// left out of the env file.
#[derive(Debug, Default)]
pub struct NonInteractivePrompt;

#[async_trait]
impl PromptProvider for NonInteractivePrompt {
    async fn ask(&self, field: &str) -> Result<String, PromptError> {
        tracing::warn!("No value for {} and prompting is disabled", field);
        Ok(String::new())
    }
}

/// Fixed answers; remembers which fields were asked for.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: HashMap<String, String>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, field: &str, value: &str) -> Self {
        self.answers.insert(field.to_string(), value.to_string());
        self
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked
            .lock()
            .map(|asked| asked.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PromptProvider for ScriptedPrompt {
    async fn ask(&self, field: &str) -> Result<String, PromptError> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(field.to_string());
        }
        Ok(self.answers.get(field).cloned().unwrap_or_default())
    }
}
