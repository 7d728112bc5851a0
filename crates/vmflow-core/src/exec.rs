//! External process execution
//!
//! Every collaborator wrapper (terraform, wg-quick, ansible) spawns its
//! tool through a [`CommandRunner`], so wrappers can be exercised against
//! scripted fakes instead of real binaries.

use crate::error::{CoreError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// A single program invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Wrap this invocation in `sudo` when `enabled`.
    pub fn sudo_if(self, enabled: bool) -> Self {
        if !enabled {
            return self;
        }
        let mut args = vec![self.program];
        args.extend(self.args);
        Self {
            program: "sudo".to_string(),
            args,
            cwd: self.cwd,
            envs: self.envs,
        }
    }

    /// `program arg1 arg2 ...` for log lines
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// stderr if non-empty, stdout otherwise
    pub fn message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion and capture output. A non-zero exit is *not* an
    /// error here; callers decide what a failure means for their tool.
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;

    /// Whether `program` can be found on PATH
    async fn is_installed(&self, program: &str) -> bool;
}

/// Runner backed by real processes
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        if let Some(cwd) = &invocation.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &invocation.envs {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: {}", invocation.display());

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::ProgramNotFound(invocation.program.clone())
            } else {
                CoreError::Io(e)
            }
        })?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn is_installed(&self, program: &str) -> bool {
        Command::new("which")
            .arg(program)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

/// Scripted runner for tests
#[cfg(any(test, feature = "test-util"))]
pub mod fake {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    type Handler = Box<dyn Fn(&Invocation) -> CommandOutput + Send + Sync>;

    /// Records every invocation and answers with a handler closure.
    pub struct FakeRunner {
        handler: Handler,
        installed: HashSet<String>,
        calls: Mutex<Vec<Invocation>>,
    }

    impl FakeRunner {
        pub fn new(handler: impl Fn(&Invocation) -> CommandOutput + Send + Sync + 'static) -> Self {
            Self {
                handler: Box::new(handler),
                installed: HashSet::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Every command succeeds with empty output
        pub fn succeeding() -> Self {
            Self::new(|_| CommandOutput::ok(""))
        }

        pub fn with_installed(mut self, programs: &[&str]) -> Self {
            self.installed
                .extend(programs.iter().map(|p| p.to_string()));
            self
        }

        pub fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().unwrap().clone()
        }

        /// Calls rendered as `program args...`
        pub fn command_lines(&self) -> Vec<String> {
            self.calls().iter().map(Invocation::display).collect()
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push(invocation.clone());
            Ok((self.handler)(invocation))
        }

        async fn is_installed(&self, program: &str) -> bool {
            self.installed.contains(program)
        }
    }
}
