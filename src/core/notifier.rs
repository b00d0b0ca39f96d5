use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

use crate::core::config::NotifyConfig;

/// Out-of-band message delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, target: &str, message: &str) -> Result<()>;
}

/// Delivers messages by running an external messaging command, e.g.
/// `openclaw message send --channel whatsapp --target <addr> --message <text>`.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    channel: String,
    timeout: Duration,
}

impl CommandNotifier {
    pub fn new(program: impl Into<String>, channel: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            channel: channel.into(),
            timeout,
        }
    }

    pub fn from_config(config: &NotifyConfig) -> Self {
        Self::new(
            config.program.clone(),
            config.channel.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn args<'a>(&'a self, target: &'a str, message: &'a str) -> Vec<&'a str> {
        vec![
            "message",
            "send",
            "--channel",
            self.channel.as_str(),
            "--target",
            target,
            "--message",
            message,
        ]
    }

    /// Run the messaging program once. A non-zero exit is an error carrying
    /// its stderr; the child is killed when `timeout` elapses.
    async fn run(&self, args: &[&str]) -> Result<()> {
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.program)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .with_context(|| format!("`{}` timed out after {:?}", self.program, self.timeout))?
        .with_context(|| format!("Failed to execute `{}`", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "`{}` exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn notify(&self, target: &str, message: &str) -> Result<()> {
        self.run(&self.args(target, message)).await?;
        tracing::debug!("`{}` delivered message to {}", self.program, target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_follow_message_send_shape() {
        let notifier = CommandNotifier::new("openclaw", "whatsapp", Duration::from_secs(30));
        assert_eq!(
            notifier.args("+15550100", "hello"),
            vec![
                "message",
                "send",
                "--channel",
                "whatsapp",
                "--target",
                "+15550100",
                "--message",
                "hello"
            ]
        );
    }

    #[test]
    fn from_config_uses_configured_program() {
        let config = NotifyConfig {
            program: "/usr/local/bin/notify".to_string(),
            channel: "signal".to_string(),
            ..Default::default()
        };
        let notifier = CommandNotifier::from_config(&config);
        assert_eq!(notifier.program, "/usr/local/bin/notify");
        assert_eq!(notifier.channel, "signal");
        assert_eq!(notifier.timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn notify_succeeds_when_command_succeeds() {
        // `echo` accepts any arguments and exits 0.
        let notifier = CommandNotifier::new("echo", "whatsapp", Duration::from_secs(5));
        assert!(notifier.notify("+15550100", "hello").await.is_ok());
    }

    #[tokio::test]
    async fn notify_reports_missing_program() {
        let notifier = CommandNotifier::new(
            "totally_nonexistent_binary_xyz",
            "whatsapp",
            Duration::from_secs(5),
        );
        let err = notifier.notify("+15550100", "hello").await.unwrap_err();
        assert!(err.to_string().contains("Failed to execute"));
    }

    #[tokio::test]
    async fn notify_reports_non_zero_exit() {
        // `false` ignores its arguments and exits 1.
        let notifier = CommandNotifier::new("false", "whatsapp", Duration::from_secs(5));
        let err = notifier.notify("+15550100", "hello").await.unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }

    #[tokio::test]
    async fn notify_times_out_on_hung_command() {
        let notifier = CommandNotifier::new("sh", "whatsapp", Duration::from_millis(100));
        let err = notifier.run(&["-c", "sleep 5"]).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
