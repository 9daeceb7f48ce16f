//! Persisted preferences.
//!
//! The installer records which terminal (and on Linux which shell) to use;
//! every launch reads it back. The file format follows the platform:
//!
//! - **macOS**: XML property list at
//!   `~/Library/Preferences/io.sshlink.handler.plist`. Installs made before
//!   the identifier change wrote `com.icanhazstring.sshlink.plist`, which is
//!   still read when the new file is missing. Binary property lists are not
//!   understood and are treated as empty.
//! - **everything else**: `key=value` lines in `~/.config/sshlink/config`
//!   (or the platform's config directory)
//!
//! ```text
//! # ~/.config/sshlink/config
//! terminal=kitty
//! shell=/usr/bin/zsh
//! ```
//!
//! User-defined terminals live in [`custom`].

pub mod custom;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::terminal::Platform;

/// Bundle identifier used for the macOS preference domain
pub const BUNDLE_ID: &str = "io.sshlink.handler";

/// Preference domain used by older releases
const LEGACY_BUNDLE_ID: &str = "com.icanhazstring.sshlink";

const BINARY_PLIST_MAGIC: &[u8] = b"bplist";

const TERMINAL_KEY: &str = "terminal";
const SHELL_KEY: &str = "shell";
const PLIST_TERMINAL_KEY: &str = "defaultTerminal";

/// Directory holding the key=value preferences and `terminals.toml`
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sshlink"))
}

/// Terminal and shell chosen at install time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences {
    pub terminal: Option<String>,
    pub shell: Option<String>,
}

impl Preferences {
    pub fn new(terminal: impl Into<String>, shell: Option<String>) -> Self {
        Self {
            terminal: Some(terminal.into()),
            shell,
        }
    }

    fn set(&mut self, key: &str, value: &str) {
        let value = value.trim();
        let value = (!value.is_empty()).then(|| value.to_string());
        match key {
            TERMINAL_KEY | PLIST_TERMINAL_KEY => self.terminal = value,
            SHELL_KEY => self.shell = value,
            _ => {}
        }
    }
}

/// On-disk encoding of [`Preferences`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceFormat {
    KeyValue,
    Plist,
}

impl PreferenceFormat {
    pub fn parse(self, content: &str) -> Preferences {
        match self {
            Self::KeyValue => parse_key_value(content),
            Self::Plist => parse_plist(content),
        }
    }

    pub fn render(self, prefs: &Preferences) -> String {
        match self {
            Self::KeyValue => render_key_value(prefs),
            Self::Plist => render_plist(prefs),
        }
    }
}

fn parse_key_value(content: &str) -> Preferences {
    let mut prefs = Preferences::default();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            prefs.set(key.trim(), value);
        }
    }
    prefs
}

fn render_key_value(prefs: &Preferences) -> String {
    let mut out = String::new();
    if let Some(terminal) = &prefs.terminal {
        out.push_str(&format!("{}={}\n", TERMINAL_KEY, terminal));
    }
    if let Some(shell) = &prefs.shell {
        out.push_str(&format!("{}={}\n", SHELL_KEY, shell));
    }
    out
}

fn plist_entry_regex() -> &'static Regex {
    static ENTRY: OnceLock<Regex> = OnceLock::new();
    ENTRY.get_or_init(|| {
        Regex::new(r"<key>\s*([^<]*?)\s*</key>\s*<string>([^<]*)</string>")
            .expect("Failed to compile plist entry regex")
    })
}

fn parse_plist(content: &str) -> Preferences {
    let mut prefs = Preferences::default();
    for caps in plist_entry_regex().captures_iter(content) {
        prefs.set(&xml_unescape(&caps[1]), &xml_unescape(&caps[2]));
    }
    prefs
}

fn render_plist(prefs: &Preferences) -> String {
    let mut entries = String::new();
    let pairs = [
        (PLIST_TERMINAL_KEY, prefs.terminal.as_deref()),
        (SHELL_KEY, prefs.shell.as_deref()),
    ];
    for (key, value) in pairs {
        if let Some(value) = value {
            entries.push_str(&format!(
                "\t<key>{}</key>\n\t<string>{}</string>\n",
                key,
                xml_escape(value)
            ));
        }
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
         <plist version=\"1.0\">\n\
         <dict>\n\
         {}</dict>\n\
         </plist>\n",
        entries
    )
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Where and how preferences are stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceStore {
    path: PathBuf,
    format: PreferenceFormat,
    /// Read when `path` does not exist
    fallback: Option<PathBuf>,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>, format: PreferenceFormat) -> Self {
        Self {
            path: path.into(),
            format,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, path: impl Into<PathBuf>) -> Self {
        self.fallback = Some(path.into());
        self
    }

    /// Default location for `platform`, `None` without a home directory
    pub fn for_platform(platform: Platform) -> Option<Self> {
        match platform {
            Platform::MacOs => {
                let dir = dirs::home_dir()?.join("Library").join("Preferences");
                Some(
                    Self::new(dir.join(format!("{}.plist", BUNDLE_ID)), PreferenceFormat::Plist)
                        .with_fallback(dir.join(format!("{}.plist", LEGACY_BUNDLE_ID))),
                )
            }
            _ => Some(Self::new(config_dir()?.join("config"), PreferenceFormat::KeyValue)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read preferences. Missing or unreadable files give the defaults.
    pub fn load(&self) -> Preferences {
        if let Some(prefs) = self.read(&self.path) {
            return prefs;
        }
        let Some(legacy) = self.fallback.as_deref() else {
            return Preferences::default();
        };
        match self.read(legacy) {
            Some(prefs) => {
                info!("Using preferences from {}", legacy.display());
                prefs
            }
            None => Preferences::default(),
        }
    }

    /// `None` when `path` does not exist
    fn read(&self, path: &Path) -> Option<Preferences> {
        match fs::read(path) {
            Ok(bytes) if bytes.starts_with(BINARY_PLIST_MAGIC) => {
                warn!("{} is a binary property list, ignoring it", path.display());
                Some(Preferences::default())
            }
            Ok(bytes) => {
                let prefs = self.format.parse(&String::from_utf8_lossy(&bytes));
                debug!("Loaded preferences from {}: {:?}", path.display(), prefs);
                Some(prefs)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Could not read {}: {}", path.display(), e);
                Some(Preferences::default())
            }
        }
    }

    /// Write preferences, creating the parent directory if needed
    pub fn save(&self, prefs: &Preferences) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, self.format.render(prefs))
    }

    /// Delete the file and any fallback. Returns whether anything was removed.
    pub fn remove(&self) -> io::Result<bool> {
        let mut removed = remove_if_present(&self.path)?;
        if let Some(legacy) = &self.fallback {
            removed |= remove_if_present(legacy)?;
        }
        Ok(removed)
    }
}

fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
