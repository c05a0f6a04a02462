//! # Process Runner Module / 进程运行器模块
//!
//! Launches a single external command and waits for it under a hard deadline.
//! When the deadline elapses the child (and on POSIX its whole process group)
//! is terminated and reaped before `run` returns.
//!
//! 启动单个外部命令并在硬性截止时间内等待其完成。
//! 超时后，子进程（在 POSIX 上包括其整个进程组）会在 `run` 返回前被终止并回收。

use colored::*;
use serde::{Serialize, Serializer};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::infra::t;

/// Exit code reported for a process that was killed because it overran its deadline.
/// 因超出截止时间而被终止的进程所报告的退出码。
pub const TIMEOUT_EXIT_CODE: i32 = 255;

/// Default time a signalled process is given to be reaped before escalating.
/// 发送信号后，在升级终止手段之前等待进程被回收的默认时间。
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Upper bound for collecting captured output once the child is gone.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// The command line itself: either an argument vector or a line for the platform shell.
/// 命令行本身：参数向量，或交给平台 shell 执行的一行命令。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CommandLine {
    /// Program followed by its arguments, executed without a shell.
    /// 程序及其参数，不经过 shell 直接执行。
    Argv(Vec<String>),
    /// A line run through `sh -c` (or `cmd /C` on Windows).
    /// 通过 `sh -c`（Windows 上为 `cmd /C`）执行的一行命令。
    Shell(String),
}

/// An immutable description of one process invocation.
/// 对一次进程调用的不可变描述。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    line: CommandLine,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
    capture_output: bool,
}

impl Command {
    /// Creates a command from a program and its arguments.
    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_line(CommandLine::Argv(args.into_iter().map(Into::into).collect()))
    }

    /// Creates a command that is interpreted by the platform shell.
    pub fn shell(line: impl Into<String>) -> Self {
        Self::from_line(CommandLine::Shell(line.into()))
    }

    fn from_line(line: CommandLine) -> Self {
        Self {
            line,
            cwd: None,
            env: Vec::new(),
            capture_output: false,
        }
    }

    /// Overrides the working directory of the child.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Adds one environment variable on top of the inherited environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// When `true`, stdout and stderr are collected into [`RunOutcome::output`]
    /// instead of being inherited from the harness.
    pub fn capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    pub fn line(&self) -> &CommandLine {
        &self.line
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn env_vars(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn captures_output(&self) -> bool {
        self.capture_output
    }

    /// A command with no program (or a blank shell line) cannot be started.
    pub fn is_empty(&self) -> bool {
        match &self.line {
            CommandLine::Argv(args) => args.first().is_none_or(|p| p.trim().is_empty()),
            CommandLine::Shell(line) => line.trim().is_empty(),
        }
    }

    /// The executable that will actually be spawned.
    /// 实际会被启动的可执行文件。
    pub fn program(&self) -> &str {
        match &self.line {
            CommandLine::Argv(args) => args.first().map(String::as_str).unwrap_or(""),
            CommandLine::Shell(_) if cfg!(windows) => "cmd",
            CommandLine::Shell(_) => "sh",
        }
    }

    fn to_tokio(&self) -> Result<tokio::process::Command, SpawnError> {
        if self.is_empty() {
            return Err(SpawnError::EmptyCommand);
        }

        let mut cmd = match &self.line {
            CommandLine::Argv(args) => {
                let mut c = tokio::process::Command::new(&args[0]);
                c.args(&args[1..]);
                c
            }
            CommandLine::Shell(line) => shell_command(line),
        };

        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        Ok(cmd)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.line {
            CommandLine::Argv(args) => {
                let joined = shlex::try_join(args.iter().map(String::as_str))
                    .unwrap_or_else(|_| args.join(" "));
                f.write_str(&joined)
            }
            CommandLine::Shell(line) => f.write_str(line),
        }
    }
}

fn shell_command(line: &str) -> tokio::process::Command {
    if cfg!(windows) {
        let mut c = tokio::process::Command::new("cmd");
        c.arg("/C").arg(line);
        c
    } else {
        let mut c = tokio::process::Command::new("sh");
        c.arg("-c").arg(line);
        c
    }
}

/// The result of one bounded execution attempt.
///
/// Only two constructors exist, so a timed-out outcome always carries
/// `completed == false` and [`TIMEOUT_EXIT_CODE`].
///
/// 一次有界执行尝试的结果。
/// 只有两个构造函数，因此超时结果总是 `completed == false` 且退出码为 [`TIMEOUT_EXIT_CODE`]。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    completed: bool,
    exit_code: i32,
    timed_out: bool,
    #[serde(rename = "duration_secs", serialize_with = "serialize_secs")]
    duration: Duration,
    #[serde(skip_serializing_if = "String::is_empty")]
    output: String,
}

impl RunOutcome {
    /// The process ran to completion with `exit_code`.
    pub fn exited(exit_code: i32, duration: Duration) -> Self {
        Self {
            completed: true,
            exit_code,
            timed_out: false,
            duration,
            output: String::new(),
        }
    }

    /// The process overran its deadline and was terminated.
    pub fn timeout(duration: Duration) -> Self {
        Self {
            completed: false,
            exit_code: TIMEOUT_EXIT_CODE,
            timed_out: true,
            duration,
            output: String::new(),
        }
    }

    pub fn with_output(mut self, output: String) -> Self {
        self.output = output;
        self
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    /// Completed with exit code zero.
    pub fn is_success(&self) -> bool {
        self.completed && self.exit_code == 0
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Captured stdout and stderr; empty when output was inherited.
    pub fn output(&self) -> &str {
        &self.output
    }
}

pub(crate) fn serialize_secs<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(duration.as_secs_f64())
}

/// Reasons a command could not be started (or waited on) at all.
/// This is distinct from a timeout and from a non-zero exit code.
///
/// 命令根本无法启动（或无法等待）的原因。
/// 这与超时以及非零退出码都不同。
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("command line is empty")]
    EmptyCommand,
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
    #[error("failed to spawn `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to wait for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Executes commands under a deadline.
/// 在截止时间内执行命令。
#[derive(Debug, Clone, Copy)]
pub struct ProcessRunner {
    kill_grace: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how long a signalled process may take to be reaped before the
    /// runner escalates, and again before it gives up waiting.
    pub fn with_kill_grace(kill_grace: Duration) -> Self {
        Self { kill_grace }
    }

    pub fn kill_grace(&self) -> Duration {
        self.kill_grace
    }

    /// Runs `command` and waits at most `timeout` for it to exit.
    ///
    /// On timeout the child is terminated and a [`RunOutcome::timeout`] is returned.
    /// The call never waits longer than `timeout` plus two kill-grace periods
    /// plus the output drain bound.
    ///
    /// 运行 `command` 并最多等待 `timeout`。
    /// 超时后终止子进程并返回 [`RunOutcome::timeout`]。
    pub async fn run(&self, command: &Command, timeout: Duration) -> Result<RunOutcome, SpawnError> {
        if timeout.is_zero() {
            return Err(SpawnError::ZeroTimeout);
        }

        let started = Instant::now();
        let mut handle = ProcessHandle::spawn(command)?;

        let outcome = match handle.wait_for(timeout).await {
            Ok(Some(status)) => RunOutcome::exited(exit_code_of(status), started.elapsed()),
            Ok(None) => {
                handle.terminate(self.kill_grace).await;
                RunOutcome::timeout(started.elapsed())
            }
            Err(source) => {
                handle.terminate(self.kill_grace).await;
                return Err(SpawnError::Wait {
                    program: handle.program,
                    source,
                });
            }
        };

        let output = handle.finish().await;
        Ok(outcome.with_output(output))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    Graceful,
    Forced,
}

/// Exclusive ownership of one live child for the duration of a `run` call.
struct ProcessHandle {
    child: Child,
    program: String,
    output: Option<OutputCapture>,
}

impl ProcessHandle {
    fn spawn(command: &Command) -> Result<Self, SpawnError> {
        let mut cmd = command.to_tokio()?;
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        if command.captures_output() {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
        // Own process group, so a shell's grandchildren are signalled together with it.
        #[cfg(unix)]
        cmd.process_group(0);

        let program = command.program().to_string();
        let mut child = cmd.spawn().map_err(|source| SpawnError::Io {
            program: program.clone(),
            source,
        })?;

        let output = command
            .captures_output()
            .then(|| OutputCapture::attach(&mut child));

        Ok(Self {
            child,
            program,
            output,
        })
    }

    /// `Ok(None)` means the deadline fired first.
    async fn wait_for(&mut self, timeout: Duration) -> io::Result<Option<ExitStatus>> {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => status.map(Some),
            Err(_elapsed) => Ok(None),
        }
    }

    /// Signals the child, escalating once if it is not reaped within `grace`.
    /// Returns whether the reap was observed.
    async fn terminate(&mut self, grace: Duration) -> bool {
        self.signal(Termination::Graceful);
        if self.reap_within(grace).await {
            return true;
        }

        eprintln!(
            "{}",
            t!("runner.kill_escalated", program = &self.program, grace = grace.as_secs_f64()).yellow()
        );
        self.signal(Termination::Forced);
        if self.reap_within(grace).await {
            return true;
        }

        eprintln!(
            "{}",
            t!("runner.reap_not_observed", program = &self.program).red()
        );
        false
    }

    async fn reap_within(&mut self, grace: Duration) -> bool {
        matches!(tokio::time::timeout(grace, self.child.wait()).await, Ok(Ok(_)))
    }

    /// Errors are ignored: the child may already have exited between the
    /// deadline firing and the signal being sent.
    #[cfg(unix)]
    fn signal(&mut self, termination: Termination) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let signal = match termination {
            Termination::Graceful => Signal::SIGTERM,
            Termination::Forced => Signal::SIGKILL,
        };
        if let Some(pid) = self.child.id() {
            if let Ok(pid) = i32::try_from(pid) {
                let _ = killpg(Pid::from_raw(pid), signal);
            }
        }
        if termination == Termination::Forced {
            let _ = self.child.start_kill();
        }
    }

    #[cfg(not(unix))]
    fn signal(&mut self, _termination: Termination) {
        let _ = self.child.start_kill();
    }

    async fn finish(self) -> String {
        match self.output {
            Some(capture) => capture.collect().await,
            None => String::new(),
        }
    }
}

fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Concurrent readers for stdout and stderr, merged line by line into one buffer.
/// 并发读取 stdout 和 stderr，并逐行合并到同一个缓冲区。
struct OutputCapture {
    buffer: Arc<Mutex<String>>,
    readers: Vec<JoinHandle<()>>,
}

impl OutputCapture {
    fn attach(child: &mut Child) -> Self {
        let buffer = Arc::new(Mutex::new(String::new()));
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, Arc::clone(&buffer)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, Arc::clone(&buffer)));
        }
        Self { buffer, readers }
    }

    /// A grandchild may still hold the pipes open, so the readers only get a
    /// bounded amount of time before they are aborted.
    async fn collect(self) -> String {
        let deadline = tokio::time::Instant::now() + OUTPUT_DRAIN_TIMEOUT;
        for reader in self.readers {
            let abort = reader.abort_handle();
            if tokio::time::timeout_at(deadline, reader).await.is_err() {
                abort.abort();
            }
        }
        self.buffer.lock().await.clone()
    }
}

fn spawn_reader<R>(stream: R, buffer: Arc<Mutex<String>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        // Drain to EOF: closing the pipe early would hand the child a SIGPIPE.
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => buffer.lock().await.push_str(&String::from_utf8_lossy(&line)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => {
                    // Keep the read end open until the child closes its side.
                    let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
                    break;
                }
            }
        }
    })
}
