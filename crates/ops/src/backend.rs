//! Command-execution backend

use rscoop_errors::{BackendError, Error};
use rscoop_events::{BackendEvent, BackendSender};
use rscoop_types::{OperationId, OperationType, OutputSource, StartRequest};
use std::fmt;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

/// Launches package-manager commands.
///
/// `start_operation` must return as soon as the command is launched. Output
/// and completion are reported later as [`BackendEvent`]s carrying the id.
pub trait CommandBackend: Send + Sync + fmt::Debug {
    /// # Errors
    ///
    /// Returns an error if the command could not be launched at all.
    fn start_operation(&self, id: &OperationId, request: &StartRequest) -> Result<(), Error>;
}

/// Runs the package manager as a child process
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    program: String,
    events: BackendSender,
}

impl ProcessBackend {
    #[must_use]
    pub fn new(program: impl Into<String>, events: BackendSender) -> Self {
        Self {
            program: program.into(),
            events,
        }
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl CommandBackend for ProcessBackend {
    fn start_operation(&self, id: &OperationId, request: &StartRequest) -> Result<(), Error> {
        if self.events.is_closed() {
            return Err(BackendError::EventChannelClosed.into());
        }

        let args = command_args(request);
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BackendError::LaunchFailed {
                operation: request.title(),
                message: e.to_string(),
            })?;

        let echo = std::iter::once(self.program.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(operation_id = %id, command = %echo, "launched command");
        let echoed = self.events.send(BackendEvent::output(
            id.as_str(),
            echo,
            OutputSource::CommandEcho.as_str(),
        ));
        if echoed.is_err() {
            // nobody would ever see its output or completion
            if let Err(e) = child.start_kill() {
                tracing::warn!(operation_id = %id, error = %e, "failed to kill orphaned command");
            }
            return Err(BackendError::EventChannelClosed.into());
        }

        tokio::spawn(forward(id.to_string(), child, self.events.clone()));
        Ok(())
    }
}

/// Package-manager arguments for a request
#[must_use]
pub fn command_args(request: &StartRequest) -> Vec<String> {
    let package = request.package_name.clone().unwrap_or_default();
    let mut args: Vec<String> = match request.effective_type() {
        OperationType::Install => {
            let target = match &request.bucket {
                Some(bucket) => format!("{bucket}/{package}"),
                None => package,
            };
            vec!["install".into(), target]
        }
        OperationType::Uninstall => vec!["uninstall".into(), package],
        OperationType::Update => vec!["update".into(), package],
        OperationType::ForceUpdate => vec!["update".into(), package, "--force".into()],
        OperationType::ClearCache => vec!["cache".into(), "rm".into(), package],
        OperationType::UpdateAll => vec!["update".into(), "*".into()],
        OperationType::Cleanup => vec!["cleanup".into(), "--all".into()],
        OperationType::CleanupCache => {
            vec!["cleanup".into(), "--all".into(), "--cache".into()]
        }
        OperationType::UpdateBuckets => vec!["update".into()],
    };
    args.retain(|arg| !arg.is_empty());
    args
}

async fn forward(id: String, mut child: Child, events: BackendSender) {
    let stdout = pump(child.stdout.take(), OutputSource::Stdout, &id, &events);
    let stderr = pump(child.stderr.take(), OutputSource::Stderr, &id, &events);
    tokio::join!(stdout, stderr);

    let finished = match child.wait().await {
        Ok(status) if status.success() => {
            BackendEvent::finished(&id, true, "Operation completed successfully")
        }
        Ok(status) => {
            let message = match status.code() {
                Some(code) => format!("Command exited with code {code}"),
                None => "Command was terminated by a signal".to_string(),
            };
            BackendEvent::finished(&id, false, message)
        }
        Err(e) => BackendEvent::finished(&id, false, format!("Failed to wait for command: {e}")),
    };

    if events.send(finished).is_err() {
        tracing::debug!(operation_id = %id, "completion dropped, event channel closed");
    }
}

async fn pump<R>(reader: Option<R>, source: OutputSource, id: &str, events: &BackendSender)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if events
                    .send(BackendEvent::output(id, line, source.as_str()))
                    .is_err()
                {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(operation_id = %id, error = %e, "failed to read command output");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rscoop_events::backend_channel;

    #[test]
    fn test_command_args() {
        let install = StartRequest::for_package(OperationType::Install, "git").with_bucket("main");
        assert_eq!(command_args(&install), ["install", "main/git"]);

        let force = StartRequest::for_package(OperationType::Update, "git").with_force(true);
        assert_eq!(command_args(&force), ["update", "git", "--force"]);

        let cache = StartRequest::for_package(OperationType::ClearCache, "7zip");
        assert_eq!(command_args(&cache), ["cache", "rm", "7zip"]);

        let all = StartRequest::new(OperationType::UpdateAll);
        assert_eq!(command_args(&all), ["update", "*"]);

        let buckets = StartRequest::new(OperationType::UpdateBuckets);
        assert_eq!(command_args(&buckets), ["update"]);
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_launch() {
        let (tx, mut rx) = backend_channel();
        let backend = ProcessBackend::new("rscoop-definitely-missing-binary", tx);
        let id = OperationId::from("install-1-abc");
        let err = backend
            .start_operation(&id, &StartRequest::for_package(OperationType::Install, "git"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Backend(BackendError::LaunchFailed { .. })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_channel_launches_nothing() {
        let (tx, rx) = backend_channel();
        drop(rx);
        // a program that would linger if it were started
        let backend = ProcessBackend::new("sleep", tx);
        let err = backend
            .start_operation(
                &OperationId::from("update-buckets-1-abc"),
                &StartRequest::new(OperationType::UpdateBuckets),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Backend(BackendError::EventChannelClosed)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_echo_streams_output_and_finishes() {
        let (tx, mut rx) = backend_channel();
        let backend = ProcessBackend::new("echo", tx);
        let id = OperationId::from("install-1-abc");
        backend
            .start_operation(&id, &StartRequest::for_package(OperationType::Install, "git"))
            .unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = matches!(event, BackendEvent::Finished(_));
            events.push(event);
            if done {
                break;
            }
        }

        assert_eq!(
            events[0],
            BackendEvent::output("install-1-abc", "echo install git", "command-echo")
        );
        assert!(events.contains(&BackendEvent::output("install-1-abc", "install git", "stdout")));
        assert!(matches!(
            events.last(),
            Some(BackendEvent::Finished(finished)) if finished.success
        ));
    }
}
