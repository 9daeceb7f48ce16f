//! User-defined terminals.
//!
//! Terminals missing from the built-in tables can be declared in
//! `terminals.toml` next to the preferences:
//!
//! ```toml
//! [[terminal]]
//! name = "foot"
//! program = "foot"
//!
//! [[terminal]]
//! name = "tilix"
//! program = "tilix"
//! args = ["-e"]
//! shell_wrapped = true   # run "ssh target; exec $SHELL" so the tab stays open
//! ```

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::terminal::{TerminalApp, TerminalKind};

/// File name inside the config directory
pub const FILE_NAME: &str = "terminals.toml";

/// One argument-based terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTerminal {
    /// Name given to `--terminal`
    pub name: String,
    /// Executable, looked up on PATH
    pub program: String,
    /// Arguments placed before the ssh command
    #[serde(default)]
    pub args: Vec<String>,
    /// Wrap ssh in `<shell> -c` and keep the shell open afterwards
    #[serde(default)]
    pub shell_wrapped: bool,
}

impl CustomTerminal {
    pub fn to_app(&self, shell: &str) -> TerminalApp {
        let kind = if self.shell_wrapped {
            TerminalKind::ShellWrapped {
                program: self.program.clone(),
                prefix: self.args.clone(),
                shell: shell.to_string(),
            }
        } else {
            TerminalKind::Generic {
                program: self.program.clone(),
                prefix: self.args.clone(),
            }
        };
        TerminalApp::new(self.name.clone(), kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomTerminals {
    #[serde(rename = "terminal")]
    pub terminals: Vec<CustomTerminal>,
}

impl CustomTerminals {
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load from `path`. A missing or malformed file yields no terminals.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                warn!("Ignoring {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!("Could not read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load from the default location
    pub fn load() -> Self {
        match super::config_dir() {
            Some(dir) => Self::load_from(&dir.join(FILE_NAME)),
            None => Self::default(),
        }
    }
}
