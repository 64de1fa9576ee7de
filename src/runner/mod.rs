//! Post-deploy command execution.
//!
//! Commands run one at a time: the next command is spawned only after the
//! previous stream delivered its completion event. Failures of a single
//! command are reported and do not stop the sequence.

use crate::observer::{DeployEvent, DeployObserver, Phase};
use crate::transport::{CommandTransport, StreamEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub command: String,
    /// Exit status reported with the completion event, if any.
    pub exit_code: Option<i32>,
    /// Spawn failures and stream-level errors.
    pub errors: Vec<String>,
    /// Whether a completion event was observed.
    pub completed: bool,
}

impl CommandOutcome {
    fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            exit_code: None,
            errors: Vec::new(),
            completed: false,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.completed && self.errors.is_empty() && self.exit_code == Some(0)
    }
}

pub struct CommandRunner<'a> {
    observer: &'a dyn DeployObserver,
}

impl<'a> CommandRunner<'a> {
    pub fn new(observer: &'a dyn DeployObserver) -> Self {
        Self { observer }
    }

    /// Run `commands` in order over an already connected transport.
    pub async fn run_all(
        &self,
        transport: &mut dyn CommandTransport,
        commands: &[String],
    ) -> Vec<CommandOutcome> {
        self.observer.on_event(&DeployEvent::PhaseStarted {
            phase: Phase::Commands,
        });

        let mut outcomes = Vec::with_capacity(commands.len());
        for command in commands {
            outcomes.push(self.run_one(transport, command).await);
        }
        outcomes
    }

    async fn run_one(&self, transport: &mut dyn CommandTransport, command: &str) -> CommandOutcome {
        let mut outcome = CommandOutcome::new(command);
        self.observer.on_event(&DeployEvent::CommandStarted {
            command: command.to_string(),
        });

        let mut stream = match transport.spawn(command).await {
            Ok(stream) => stream,
            Err(e) => {
                self.observer
                    .error(format!("failed to start command {command}: {e}"));
                outcome.errors.push(e.to_string());
                return outcome;
            }
        };

        loop {
            match stream.next_event().await {
                Some(StreamEvent::Data { stream, chunk }) => {
                    self.observer.on_event(&DeployEvent::CommandOutput {
                        command: command.to_string(),
                        stream,
                        chunk,
                    });
                }
                Some(StreamEvent::Error(message)) => {
                    self.observer.error(format!("command {command}: {message}"));
                    outcome.errors.push(message);
                }
                Some(StreamEvent::Closed { exit_code }) => {
                    outcome.exit_code = exit_code;
                    outcome.completed = true;
                    break;
                }
                None => {
                    self.observer.warn(format!(
                        "output of command {command} ended without a completion event"
                    ));
                    break;
                }
            }
        }

        self.observer.on_event(&DeployEvent::CommandFinished {
            command: command.to_string(),
            exit_code: outcome.exit_code,
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::RecordingObserver;
    use crate::transport::{CommandCall, MemoryCommandTransport, OutputStream};

    fn commands(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_commands_wait_for_completion() {
        let mut transport = MemoryCommandTransport::new();
        transport.connect().await.unwrap();
        let observer = RecordingObserver::new();

        let outcomes = CommandRunner::new(&observer)
            .run_all(&mut transport, &commands(&["c1", "c2", "c3"]))
            .await;

        assert!(outcomes.iter().all(CommandOutcome::succeeded));
        assert_eq!(
            transport.calls(),
            vec![
                CommandCall::Connect,
                CommandCall::Spawn("c1".to_string()),
                CommandCall::Completed("c1".to_string()),
                CommandCall::Spawn("c2".to_string()),
                CommandCall::Completed("c2".to_string()),
                CommandCall::Spawn("c3".to_string()),
                CommandCall::Completed("c3".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_sequence() {
        let mut transport = MemoryCommandTransport::new()
            .script(
                "false",
                vec![
                    StreamEvent::Error("channel reset".to_string()),
                    StreamEvent::Closed { exit_code: Some(1) },
                ],
            )
            .refuse_spawn("missing");
        transport.connect().await.unwrap();
        let observer = RecordingObserver::new();

        let outcomes = CommandRunner::new(&observer)
            .run_all(&mut transport, &commands(&["false", "missing", "echo ok"]))
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].exit_code, Some(1));
        assert_eq!(outcomes[0].errors, vec!["channel reset"]);
        assert!(outcomes[0].completed);
        assert!(!outcomes[1].completed);
        assert_eq!(outcomes[1].errors.len(), 1);
        assert!(outcomes[2].succeeded());
        assert_eq!(observer.errors().len(), 2);
    }

    #[tokio::test]
    async fn test_output_is_forwarded() {
        let mut transport = MemoryCommandTransport::new().script(
            "echo hi",
            vec![
                StreamEvent::Data {
                    stream: OutputStream::Stdout,
                    chunk: "hi".to_string(),
                },
                StreamEvent::Data {
                    stream: OutputStream::Stderr,
                    chunk: "warning".to_string(),
                },
            ],
        );
        transport.connect().await.unwrap();
        let observer = RecordingObserver::new();

        CommandRunner::new(&observer)
            .run_all(&mut transport, &commands(&["echo hi"]))
            .await;

        assert_eq!(observer.command_output("echo hi"), vec!["hi", "warning"]);
        assert!(observer.errors().is_empty());
    }
}
