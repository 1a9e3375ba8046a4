//! External command execution for CLI-backed engines.
//!
//! [`CommandRunner`] abstracts process spawning so the Docker CLI engine
//! can be exercised in tests without a container runtime.
//! [`SystemRunner`] is the production implementation.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of executing a command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether command succeeded (exit code 0).
    pub success: bool,
}

impl CommandResult {
    /// Create a success result.
    pub fn success(stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            exit_code: Some(0),
            stdout,
            stderr,
            duration,
            success: true,
        }
    }

    /// Create a failure result.
    pub fn failure(
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        duration: Duration,
    ) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration,
            success: false,
        }
    }

    /// The most useful diagnostic text: stderr, else stdout.
    pub fn message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Options for command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Environment variables (merged with system env).
    pub env: BTreeMap<String, String>,

    /// Data written to the child's stdin, which is then closed.
    pub stdin: Option<String>,
}

/// Output line from command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

impl OutputLine {
    pub fn text(&self) -> &str {
        match self {
            OutputLine::Stdout(s) | OutputLine::Stderr(s) => s,
        }
    }
}

/// Trait for abstracting external command execution.
pub trait CommandRunner {
    /// Run a command to completion and capture stdout and stderr.
    fn run(&self, program: &str, args: &[String], options: &CommandOptions) -> Result<CommandResult>;

    /// Run a command, passing every output line to `on_line` as it arrives.
    fn run_streaming(
        &self,
        program: &str,
        args: &[String],
        options: &CommandOptions,
        on_line: &dyn Fn(OutputLine),
    ) -> Result<CommandResult>;
}

/// Production implementation that spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(program: &str, args: &[String], options: &CommandOptions) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &options.env {
            cmd.env(key, value);
        }
        cmd.stdin(if options.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd
    }

    fn feed_stdin(child: &mut std::process::Child, options: &CommandOptions) -> Result<()> {
        if let (Some(input), Some(mut stdin)) = (&options.stdin, child.stdin.take()) {
            stdin
                .write_all(input.as_bytes())
                .context("Failed to write to child stdin")?;
        }
        Ok(())
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String], options: &CommandOptions) -> Result<CommandResult> {
        let start = Instant::now();

        let mut cmd = Self::command(program, args, options);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to run '{program}'"))?;
        Self::feed_stdin(&mut child, options)?;

        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for '{program}'"))?;

        let duration = start.elapsed();
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            Ok(CommandResult::success(stdout, stderr, duration))
        } else {
            Ok(CommandResult::failure(
                output.status.code(),
                stdout,
                stderr,
                duration,
            ))
        }
    }

    fn run_streaming(
        &self,
        program: &str,
        args: &[String],
        options: &CommandOptions,
        on_line: &dyn Fn(OutputLine),
    ) -> Result<CommandResult> {
        let start = Instant::now();

        let mut cmd = Self::command(program, args, options);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to run '{program}'"))?;
        Self::feed_stdin(&mut child, options)?;

        let stdout = child.stdout.take().context("Child stdout not captured")?;
        let stderr = child.stderr.take().context("Child stderr not captured")?;

        let (tx, rx) = mpsc::channel();
        let tx_stdout = tx.clone();
        let tx_stderr = tx;

        let stdout_handle = thread::spawn(move || {
            let reader = BufReader::new(stdout);
            let mut output = String::new();
            for line in reader.lines().map_while(std::result::Result::ok) {
                output.push_str(&line);
                output.push('\n');
                let _ = tx_stdout.send(OutputLine::Stdout(line));
            }
            output
        });

        let stderr_handle = thread::spawn(move || {
            let reader = BufReader::new(stderr);
            let mut output = String::new();
            for line in reader.lines().map_while(std::result::Result::ok) {
                output.push_str(&line);
                output.push('\n');
                let _ = tx_stderr.send(OutputLine::Stderr(line));
            }
            output
        });

        for line in rx {
            on_line(line);
        }

        let stdout_output = stdout_handle.join().unwrap_or_default();
        let stderr_output = stderr_handle.join().unwrap_or_default();

        let status = child
            .wait()
            .with_context(|| format!("Failed to wait for '{program}'"))?;

        let duration = start.elapsed();

        if status.success() {
            Ok(CommandResult::success(
                stdout_output,
                stderr_output,
                duration,
            ))
        } else {
            Ok(CommandResult::failure(
                status.code(),
                stdout_output,
                stderr_output,
                duration,
            ))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn run_captures_stdout() {
        let result = SystemRunner
            .run("echo", &args(&["hello"]), &CommandOptions::default())
            .unwrap();

        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[test]
    fn run_reports_failure() {
        let result = SystemRunner
            .run("sh", &args(&["-c", "echo oops >&2; exit 3"]), &CommandOptions::default())
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.message(), "oops");
    }

    #[test]
    fn run_feeds_stdin() {
        let options = CommandOptions {
            stdin: Some("secret\n".to_string()),
            ..Default::default()
        };
        let result = SystemRunner.run("cat", &[], &options).unwrap();
        assert_eq!(result.stdout, "secret\n");
    }

    #[test]
    fn run_with_env_and_cwd() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut options = CommandOptions {
            cwd: Some(temp.path().to_path_buf()),
            ..Default::default()
        };
        options.env.insert("MY_VAR".to_string(), "my_value".to_string());

        let result = SystemRunner
            .run("sh", &args(&["-c", "echo $MY_VAR; pwd"]), &options)
            .unwrap();

        assert!(result.stdout.contains("my_value"));
    }

    #[test]
    fn run_missing_program_is_an_error() {
        let result = SystemRunner.run(
            "definitely-not-a-real-program-xyz",
            &[],
            &CommandOptions::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn run_streaming_delivers_lines() {
        let lines = Mutex::new(Vec::new());
        let result = SystemRunner
            .run_streaming(
                "sh",
                &args(&["-c", "echo line1; echo line2; echo err >&2"]),
                &CommandOptions::default(),
                &|line| lines.lock().unwrap().push(line),
            )
            .unwrap();

        assert!(result.success);
        let captured = lines.lock().unwrap();
        assert!(captured.contains(&OutputLine::Stdout("line1".to_string())));
        assert!(captured.contains(&OutputLine::Stdout("line2".to_string())));
        assert!(captured.contains(&OutputLine::Stderr("err".to_string())));
    }
}
