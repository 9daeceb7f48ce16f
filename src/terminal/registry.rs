//! Terminal lookup by operating system and name.
//!
//! Each supported OS has a fixed table mapping a lower-case terminal name to
//! the way that terminal is driven. Users can add argument-based terminals
//! in `terminals.toml` (see [`crate::config::custom`]); those are consulted
//! after the built-in table and cannot replace a built-in name.

use std::fmt;

use tracing::debug;

use super::app::{ScriptFlavor, TerminalApp, TerminalKind};
use super::{Result, Terminal, TerminalError};
use crate::config::custom::CustomTerminal;

/// Name used when neither the command line nor the preferences pick one
pub const DEFAULT_TERMINAL: &str = "terminal";

/// Operating system the terminal tables are keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    MacOs,
    Linux,
    Windows,
    Other(&'static str),
}

impl Platform {
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map a `std::env::consts::OS` value
    pub fn from_os(os: &'static str) -> Self {
        match os {
            "macos" => Self::MacOs,
            "linux" => Self::Linux,
            "windows" => Self::Windows,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MacOs => f.write_str("macos"),
            Self::Linux => f.write_str("linux"),
            Self::Windows => f.write_str("windows"),
            Self::Other(os) => f.write_str(os),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Builtin {
    Scriptable(&'static str, ScriptFlavor),
    ClipboardRelay(&'static str),
    Generic(&'static str, &'static [&'static str]),
    ShellWrapped(&'static str, &'static [&'static str]),
    CommandPrompt(&'static str, &'static [&'static str]),
    WindowsTerminal(&'static str, &'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
struct BuiltinTerminal {
    key: &'static str,
    display: &'static str,
    driver: Builtin,
}

const fn entry(key: &'static str, display: &'static str, driver: Builtin) -> BuiltinTerminal {
    BuiltinTerminal { key, display, driver }
}

const MACOS_TERMINALS: &[BuiltinTerminal] = &[
    entry("terminal", "Terminal", Builtin::Scriptable("Terminal", ScriptFlavor::TerminalApp)),
    entry("iterm", "iTerm", Builtin::Scriptable("iTerm", ScriptFlavor::ITerm)),
    entry("iterm2", "iTerm2", Builtin::Scriptable("iTerm", ScriptFlavor::ITerm)),
    entry("warp", "Warp", Builtin::ClipboardRelay("Warp")),
    entry("kitty", "kitty", Builtin::Generic("kitty", &["-e"])),
    entry("alacritty", "alacritty", Builtin::Generic("alacritty", &["-e"])),
    entry("wezterm", "wezterm", Builtin::Generic("wezterm", &["start"])),
];

const LINUX_TERMINALS: &[BuiltinTerminal] = &[
    entry("terminal", "gnome-terminal", Builtin::ShellWrapped("gnome-terminal", &["--tab", "--"])),
    entry("gnome-terminal", "gnome-terminal", Builtin::ShellWrapped("gnome-terminal", &["--tab", "--"])),
    entry("kitty", "kitty", Builtin::Generic("kitty", &["-e"])),
    entry("alacritty", "alacritty", Builtin::Generic("alacritty", &["-e"])),
    entry("wezterm", "wezterm", Builtin::Generic("wezterm", &["start"])),
    entry("konsole", "konsole", Builtin::Generic("konsole", &["-e"])),
    entry("xterm", "xterm", Builtin::Generic("xterm", &["-e"])),
];

const WINDOWS_TERMINALS: &[BuiltinTerminal] = &[
    entry("terminal", "cmd", Builtin::CommandPrompt("cmd", &["/c", "start", "cmd", "/k"])),
    entry("cmd", "cmd", Builtin::CommandPrompt("cmd", &["/c", "start", "cmd", "/k"])),
    entry("wt", "Windows Terminal", Builtin::WindowsTerminal("wt", &["new-tab"])),
];

fn builtin_table(platform: Platform) -> Option<&'static [BuiltinTerminal]> {
    match platform {
        Platform::MacOs => Some(MACOS_TERMINALS),
        Platform::Linux => Some(LINUX_TERMINALS),
        Platform::Windows => Some(WINDOWS_TERMINALS),
        Platform::Other(_) => None,
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

impl BuiltinTerminal {
    fn build(&self, shell: &str) -> TerminalApp {
        let kind = match self.driver {
            Builtin::Scriptable(app, flavor) => TerminalKind::Scriptable {
                app: app.to_string(),
                flavor,
            },
            Builtin::ClipboardRelay(app) => TerminalKind::ClipboardRelay {
                app: app.to_string(),
            },
            Builtin::Generic(program, prefix) => TerminalKind::Generic {
                program: program.to_string(),
                prefix: owned(prefix),
            },
            Builtin::ShellWrapped(program, prefix) => TerminalKind::ShellWrapped {
                program: program.to_string(),
                prefix: owned(prefix),
                shell: shell.to_string(),
            },
            Builtin::CommandPrompt(program, prefix) => TerminalKind::CommandPrompt {
                program: program.to_string(),
                prefix: owned(prefix),
            },
            Builtin::WindowsTerminal(program, prefix) => TerminalKind::WindowsTerminal {
                program: program.to_string(),
                prefix: owned(prefix),
            },
        };
        TerminalApp::new(self.display, kind)
    }
}

/// Creates terminals by name.
///
/// The launcher only sees this trait, so tests can hand it terminals that
/// record calls instead of starting processes.
pub trait TerminalFactory {
    fn create(&self, name: &str) -> Result<Box<dyn Terminal>>;
}

/// Built-in and user-defined terminals for one platform
#[derive(Debug, Clone)]
pub struct Registry {
    platform: Platform,
    shell: String,
    custom: Vec<CustomTerminal>,
}

impl Registry {
    /// `shell` is used by shell-wrapped terminals
    pub fn new(platform: Platform, shell: impl Into<String>) -> Self {
        Self {
            platform,
            shell: shell.into(),
            custom: Vec::new(),
        }
    }

    pub fn with_custom(mut self, custom: Vec<CustomTerminal>) -> Self {
        self.custom = custom;
        self
    }

    /// Find a terminal by name (case-insensitive)
    pub fn lookup(&self, name: &str) -> Result<TerminalApp> {
        let key = name.trim().to_ascii_lowercase();
        let table = builtin_table(self.platform);

        if let Some(found) = table.and_then(|t| t.iter().find(|e| e.key == key)) {
            debug!("Terminal {:?} is built-in {:?}", name, found.driver);
            return Ok(found.build(&self.shell));
        }

        if let Some(custom) = self.custom.iter().find(|c| c.name.eq_ignore_ascii_case(&key)) {
            debug!("Terminal {:?} is user-defined ({})", name, custom.program);
            return Ok(custom.to_app(&self.shell));
        }

        match table {
            Some(_) => Err(TerminalError::UnsupportedTerminal(name.to_string())),
            None => Err(TerminalError::UnsupportedOs(self.platform.to_string())),
        }
    }

    /// Names accepted by [`Registry::lookup`]: built-in (sorted), then custom
    pub fn names(&self) -> Vec<String> {
        let mut builtin: Vec<String> = builtin_table(self.platform)
            .unwrap_or_default()
            .iter()
            .map(|e| e.key.to_string())
            .collect();
        builtin.sort();

        let custom = self
            .custom
            .iter()
            .map(|c| c.name.to_ascii_lowercase())
            .filter(|name| !builtin.contains(name));

        let mut names = builtin.clone();
        for name in custom {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

impl TerminalFactory for Registry {
    fn create(&self, name: &str) -> Result<Box<dyn Terminal>> {
        Ok(Box::new(self.lookup(name)?))
    }
}
