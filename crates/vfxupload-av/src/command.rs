//! Builder for running external tools with a timeout.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use vfxupload_core::{Error, Result};

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for one external tool invocation.
///
/// ```no_run
/// use vfxupload_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> vfxupload_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "quiet", "-of", "json"])
///     .arg("-show_streams")
///     .arg("/renders/MyShow_201_052_vfx_v001.mov")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            envs: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child only.
    pub fn env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Set the maximum execution time. The child is killed when it expires.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// File name of the program, used as the tool name in errors.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Space-joined command line for logging.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.to_string_lossy().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn spawn(&self) -> Result<Child> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(command = %self.command_line(), "spawning tool");
        cmd.spawn()
            .map_err(|e| Error::tool(self.program_name(), format!("failed to spawn: {e}")))
    }

    /// Run to completion, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// [`Error::Tool`] when the process cannot be spawned, exits non-zero
    /// (message carries stderr), or outlives the timeout.
    pub async fn execute(&self) -> Result<ToolOutput> {
        self.execute_streaming(|_| {}).await
    }

    /// Run to completion without judging the exit status. Callers that
    /// treat some non-zero exits as answers (an empty listing, a missing
    /// object) inspect [`ToolOutput::status`] themselves.
    pub async fn output(&self) -> Result<ToolOutput> {
        self.run_streaming(|_| {}).await
    }

    /// Run to completion, handing every output line to `on_line` as it
    /// arrives.
    ///
    /// Lines from stdout and stderr are interleaved in arrival order. A
    /// carriage return also ends a line, so in-place progress updates are
    /// reported one by one.
    pub async fn execute_streaming<F>(&self, on_line: F) -> Result<ToolOutput>
    where
        F: FnMut(&str) + Send,
    {
        let output = self.run_streaming(on_line).await?;
        if !output.status.success() {
            return Err(Error::tool(
                self.program_name(),
                format!("exited with status {}: {}", output.status, output.stderr.trim()),
            ));
        }
        Ok(output)
    }

    async fn run_streaming<F>(&self, mut on_line: F) -> Result<ToolOutput>
    where
        F: FnMut(&str) + Send,
    {
        let tool = self.program_name();
        let mut child = self.spawn()?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::tool(&tool, "stdout was not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::tool(&tool, "stderr was not captured"))?;

        let run = async {
            let mut out_lines = LineSplitter::default();
            let mut err_lines = LineSplitter::default();
            let mut out_buf = [0u8; 4096];
            let mut err_buf = [0u8; 4096];
            let mut captured_out = Vec::new();
            let mut captured_err = Vec::new();
            let (mut out_open, mut err_open) = (true, true);

            while out_open || err_open {
                tokio::select! {
                    n = stdout.read(&mut out_buf), if out_open => {
                        let n = n?;
                        if n == 0 {
                            out_open = false;
                        } else {
                            captured_out.extend_from_slice(&out_buf[..n]);
                            out_lines.push(&out_buf[..n], &mut on_line);
                        }
                    }
                    n = stderr.read(&mut err_buf), if err_open => {
                        let n = n?;
                        if n == 0 {
                            err_open = false;
                        } else {
                            captured_err.extend_from_slice(&err_buf[..n]);
                            err_lines.push(&err_buf[..n], &mut on_line);
                        }
                    }
                }
            }
            out_lines.finish(&mut on_line);
            err_lines.finish(&mut on_line);

            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, captured_out, captured_err))
        };

        let result = tokio::time::timeout(self.timeout, run).await;

        match result {
            Ok(Ok((status, out, err))) => Ok(ToolOutput {
                status,
                stdout: String::from_utf8_lossy(&out).to_string(),
                stderr: String::from_utf8_lossy(&err).to_string(),
            }),
            Ok(Err(e)) => Err(Error::tool(tool, format!("I/O error waiting for process: {e}"))),
            Err(_elapsed) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(tool = %tool, "failed to kill timed-out process: {e}");
                }
                Err(Error::tool(tool, format!("timed out after {:?}", self.timeout)))
            }
        }
    }
}

/// Splits a byte stream on `\n` and `\r`, skipping blank segments.
#[derive(Default)]
struct LineSplitter {
    pending: String,
}

impl LineSplitter {
    fn push<F: FnMut(&str)>(&mut self, chunk: &[u8], on_line: &mut F) {
        self.pending.push_str(&String::from_utf8_lossy(chunk));
        while let Some(idx) = self.pending.find(['\n', '\r']) {
            let line: String = self.pending.drain(..=idx).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if !line.trim().is_empty() {
                on_line(line);
            }
        }
    }

    fn finish<F: FnMut(&str)>(&mut self, on_line: &mut F) {
        if !self.pending.trim().is_empty() {
            on_line(&self.pending);
        }
        self.pending.clear();
    }
}
