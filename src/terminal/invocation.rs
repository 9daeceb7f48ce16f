//! Launch plans and their execution.
//!
//! Every terminal turns a target into a [`LaunchPlan`] first. Building the
//! plan is pure, so the exact command line can be checked without starting
//! anything; [`LaunchPlan::execute`] then talks to the OS.
//!
//! The target never ends up inside a string that is parsed as code without
//! being quoted: it is a discrete process argument, a shell word quoted by
//! `shell-words`, or a script argument quoted by AppleScript itself.

use std::process::{Command, Stdio};

use arboard::Clipboard;
use tracing::{debug, info, warn};

use super::{Result, TerminalError};
use crate::link::ConnectionTarget;

/// How the launched process is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnMode {
    /// Spawn and return immediately (new terminal windows)
    Detached,
    /// Run to completion and check the exit status (osascript, open)
    Wait,
}

/// A single process to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub mode: SpawnMode,
}

impl Invocation {
    pub fn new(program: impl Into<String>, mode: SpawnMode) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            mode,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Start the process; `terminal` names it in errors
    pub fn run(&self, terminal: &str) -> Result<()> {
        debug!("Running {} {:?}", self.program, self.args);
        let launch_failed = |source| TerminalError::LaunchFailed {
            terminal: terminal.to_string(),
            source,
        };

        match self.mode {
            SpawnMode::Detached => {
                let child = self
                    .command()
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()
                    .map_err(launch_failed)?;
                info!("Spawned {} (pid {})", self.program, child.id());
                Ok(())
            }
            SpawnMode::Wait => {
                let output = self.command().output().map_err(launch_failed)?;
                if !output.status.success() {
                    return Err(TerminalError::ExitStatus {
                        terminal: terminal.to_string(),
                        status: output.status,
                        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    });
                }
                Ok(())
            }
        }
    }
}

/// Everything a terminal does to open one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    /// Text placed on the clipboard before launching, if any
    pub clipboard: Option<String>,
    pub invocation: Invocation,
}

impl LaunchPlan {
    pub fn new(invocation: Invocation) -> Self {
        Self {
            clipboard: None,
            invocation,
        }
    }

    pub fn with_clipboard(mut self, text: impl Into<String>) -> Self {
        self.clipboard = Some(text.into());
        self
    }

    pub fn execute(&self, terminal: &str) -> Result<()> {
        if let Some(text) = &self.clipboard {
            // The user can still type the command, so this is not fatal
            match copy_to_clipboard(text) {
                Ok(()) => {
                    println!("Copied to clipboard: {}", text);
                    println!("Paste it into the new {} window to connect", terminal);
                }
                Err(e) => {
                    warn!("Could not copy to clipboard: {}", e);
                    println!("Could not copy to clipboard ({}), run: {}", e, text);
                }
            }
        }
        self.invocation.run(terminal)
    }
}

fn copy_to_clipboard(text: &str) -> std::result::Result<(), arboard::Error> {
    let mut clipboard = Clipboard::new()?;
    clipboard.set_text(text)
}

/// `ssh` argument vector for a target.
///
/// A `--` is inserted when the target looks like an option, so a link such
/// as `sshlink://-oProxyCommand=...` cannot smuggle options into ssh.
pub fn ssh_args(target: &ConnectionTarget) -> Vec<String> {
    let target = target.as_str();
    if target.starts_with('-') {
        vec!["ssh".to_string(), "--".to_string(), target.to_string()]
    } else {
        vec!["ssh".to_string(), target.to_string()]
    }
}

/// `ssh` command line quoted for a POSIX shell
pub fn ssh_command_line(target: &ConnectionTarget) -> String {
    shell_words::join(ssh_args(target))
}
