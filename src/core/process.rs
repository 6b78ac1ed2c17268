use serde::Serialize;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use crate::error::{Error, Result, ToolFailureDetails};

/// Lines of stderr kept for failure reports.
pub const STDERR_TAIL_LINES: usize = 40;

/// Captured output of a child process that exited successfully.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    pub exit_code: i32,
}

/// Executes one external command, blocking until it exits.
///
/// Implementations must return `Err` (code `process.tool_failed`) for a
/// non-zero exit so the orchestrator can halt.
pub trait CommandRunner {
    fn run(&self, label: &str, command: &str, working_dir: Option<&Path>) -> Result<CommandOutput>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Runs commands through the platform shell and streams their output to stderr.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    /// Suppress line streaming (output is still captured).
    pub quiet: bool,
}

impl ShellRunner {
    pub fn quiet() -> Self {
        Self { quiet: true }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, label: &str, command: &str, working_dir: Option<&Path>) -> Result<CommandOutput> {
        #[cfg(windows)]
        let mut cmd = {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        };

        #[cfg(not(windows))]
        let mut cmd = {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        };

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let failure = |exit_code: i32, stderr_tail: String| {
            Error::tool_failed(ToolFailureDetails {
                task: Some(label.to_string()),
                command: command.to_string(),
                working_dir: working_dir.map(|d| d.display().to_string()),
                exit_code,
                stderr_tail,
            })
        };

        let mut child = cmd
            .spawn()
            .map_err(|e| failure(-1, format!("Command error: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::internal_unexpected("child stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::internal_unexpected("child stderr was not piped"))?;

        let out_label = label.to_string();
        let err_label = label.to_string();
        let quiet = self.quiet;
        let out_pump = thread::spawn(move || pump(stdout, Stream::Stdout, &out_label, quiet));
        let err_pump = thread::spawn(move || pump(stderr, Stream::Stderr, &err_label, quiet));

        let status = child
            .wait()
            .map_err(|e| failure(-1, format!("Failed waiting for command: {}", e)))?;

        let stdout = out_pump
            .join()
            .map_err(|_| Error::internal_unexpected("stdout reader thread panicked"))?;
        let stderr = err_pump
            .join()
            .map_err(|_| Error::internal_unexpected("stderr reader thread panicked"))?;

        let exit_code = status.code().unwrap_or(-1);
        if !status.success() {
            return Err(failure(exit_code, failure_tail(&stderr, &stdout)));
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}

/// Forward each line to the log sink as it arrives while accumulating it.
fn pump<R: Read>(reader: R, stream: Stream, label: &str, quiet: bool) -> String {
    let mut captured = String::new();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                if !quiet {
                    let text = line.trim_end_matches(['\r', '\n']);
                    match stream {
                        Stream::Stdout => eprintln!("[exec:{}] {}", label, text),
                        Stream::Stderr => eprintln!("[exec:{}!] {}", label, text),
                    }
                }
                captured.push_str(&line);
            }
            Err(_) => break,
        }
    }

    captured
}

/// Last lines of stderr, or of stdout when stderr is empty.
pub fn failure_tail(stderr: &str, stdout: &str) -> String {
    let source = if stderr.trim().is_empty() { stdout } else { stderr };
    tail_lines(source, STDERR_TAIL_LINES)
}

fn tail_lines(text: &str, max: usize) -> String {
    let mut tail: VecDeque<&str> = VecDeque::with_capacity(max);
    for line in text.lines() {
        if tail.len() == max {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into_iter().collect::<Vec<_>>().join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_last_lines() {
        let text = (1..=50).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let tail = tail_lines(&text, 3);
        assert_eq!(tail, "line 48\nline 49\nline 50");
    }

    #[test]
    fn failure_tail_prefers_stderr() {
        assert_eq!(failure_tail("boom\n", "noise"), "boom");
        assert_eq!(failure_tail("  \n", "only stdout"), "only stdout");
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_on_success() {
        let out = ShellRunner::quiet()
            .run("echo-0", "echo hello && echo warn >&2", None)
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "warn");
        assert_eq!(out.exit_code, 0);
    }

    #[cfg(unix)]
    #[test]
    fn empty_output_is_not_an_error() {
        let out = ShellRunner::quiet().run("true-0", "true", None).unwrap();
        assert!(out.stdout.is_empty());
        assert!(out.stderr.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn runs_in_working_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let out = ShellRunner::quiet()
            .run("cat-0", "cat marker.txt", Some(dir.path()))
            .unwrap();
        assert_eq!(out.stdout, "here");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_surfaces_stderr() {
        let err = ShellRunner::quiet()
            .run("fail-0", "echo compiling; echo 'error: missing ref' >&2; exit 1", None)
            .unwrap_err();
        assert_eq!(err.code.as_str(), "process.tool_failed");
        assert_eq!(err.details["exitCode"], 1);
        assert_eq!(err.details["stderrTail"], "error: missing ref");
        assert_eq!(err.details["task"], "fail-0");
    }

    #[test]
    fn missing_working_dir_is_a_tool_failure() {
        let err = ShellRunner::quiet()
            .run("x-0", "echo hi", Some(Path::new("/definitely/not/here")))
            .unwrap_err();
        assert_eq!(err.code.as_str(), "process.tool_failed");
        assert_eq!(err.details["exitCode"], -1);
    }
}
