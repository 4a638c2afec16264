//! Opaque asset transforms

use std::process::Stdio;

use async_trait::async_trait;
use squish_core::Buffer;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Environment variable carrying the asset name for command transforms
pub const ASSET_NAME_ENV: &str = "SQUISH_ASSET";

/// Transform failures
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// IO error talking to the transform
    #[error("Transform IO error: {0}")]
    Io(#[from] std::io::Error),

    /// External command exited unsuccessfully
    #[error("Command exited with code {code}: {stderr}")]
    CommandFailed { code: i32, stderr: String },

    /// Any other failure reported by a transform
    #[error("{0}")]
    Failed(String),
}

impl TransformError {
    /// Create a generic failure with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// A slow, untrusted byte-buffer transform (e.g. an image optimizer).
///
/// Implementations may take arbitrarily long or fail; callers wrap them in
/// a [`GuardedTransform`](crate::guard::GuardedTransform).
#[async_trait]
pub trait Transform: Send + Sync {
    /// Short identifier used in logs
    fn id(&self) -> &str;

    /// Transform `input`, the content of the asset called `name`
    async fn transform(&self, name: &str, input: Buffer) -> Result<Vec<u8>, TransformError>;
}

/// Pipes each asset through `sh -c <command>`, stdin to stdout
#[derive(Debug, Clone)]
pub struct CommandTransform {
    command: String,
}

impl CommandTransform {
    /// Create a transform running `command`
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Transform for CommandTransform {
    fn id(&self) -> &str {
        &self.command
    }

    async fn transform(&self, name: &str, input: Buffer) -> Result<Vec<u8>, TransformError> {
        debug!(asset = %name, command = %self.command, "running transform command");

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env(ASSET_NAME_ENV, name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransformError::failed("child stdin unavailable"))?;

        // Feed stdin concurrently so a command that streams output before
        // consuming all input cannot deadlock on a full pipe.
        let writer = tokio::spawn(async move {
            let written = stdin.write_all(&input).await;
            drop(stdin);
            written
        });

        let output = child.wait_with_output().await?;

        match writer.await {
            Ok(Ok(())) => {}
            // Commands are free to stop reading early.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(e) => return Err(TransformError::failed(format!("stdin writer failed: {}", e))),
        }

        if !output.status.success() {
            return Err(TransformError::CommandFailed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}
