//! External executable notification channel
//!
//! Runs `<program> <mirror> <UP|DOWN>` for every transition. The child is
//! killed when it outlives the timeout.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{DeliveryStatus, Notifier, NotifyError, NotifyResult};
use crate::models::MirrorTransition;

pub struct ExecNotifier {
    program: PathBuf,
    timeout: Duration,
}

impl ExecNotifier {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn run(&self, transition: &MirrorTransition) -> NotifyResult<String> {
        let child = Command::new(&self.program)
            .arg(&transition.mirror)
            .arg(transition.event.as_str())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| NotifyError::Timeout(self.timeout))??;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let combined = combined.trim().to_string();

        if !output.status.success() {
            return Err(NotifyError::ExitStatus {
                status: output.status.to_string(),
                output: combined,
            });
        }
        Ok(combined)
    }
}

#[async_trait]
impl Notifier for ExecNotifier {
    fn name(&self) -> &str {
        "exec"
    }

    async fn send(&self, transition: &MirrorTransition) -> NotifyResult<DeliveryStatus> {
        let output = self.run(transition).await?;
        tracing::info!(
            program = %self.program.display(),
            mirror = %transition.mirror,
            event = %transition.event,
            output = %output,
            "Executed notify command"
        );
        Ok(DeliveryStatus::success_with_message(self.name(), output))
    }
}
