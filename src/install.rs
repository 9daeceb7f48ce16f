//! Handler registration.
//!
//! `--install` validates the terminal, saves the preferences and, on Linux,
//! registers a desktop entry for `x-scheme-handler/sshlink`. `--uninstall`
//! undoes that. macOS and Windows need a platform shim to receive URL
//! events; there only the preferences are managed.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{PreferenceStore, Preferences};
use crate::shell;
use crate::terminal::{Platform, Registry, Terminal};

pub const DESKTOP_FILE: &str = "sshlink.desktop";
pub const MIME_TYPE: &str = "x-scheme-handler/sshlink";

/// Desktop database refresh and default-handler registration
pub trait DesktopRegistrar {
    /// Refresh the desktop database for `dir`. Failures are only reported.
    fn refresh(&self, dir: &Path);

    /// Make `sshlink.desktop` the default handler for the scheme
    fn set_default(&self) -> Result<()>;
}

/// `update-desktop-database` and `xdg-mime` from xdg-utils
pub struct XdgUtils;

impl DesktopRegistrar for XdgUtils {
    fn refresh(&self, dir: &Path) {
        match Command::new("update-desktop-database").arg(dir).status() {
            Ok(status) if status.success() => {
                info!("Updated desktop database in {}", dir.display())
            }
            Ok(status) => println!("Warning: update-desktop-database exited with {}", status),
            Err(e) => println!("Warning: could not update desktop database: {}", e),
        }
    }

    fn set_default(&self) -> Result<()> {
        let status = Command::new("xdg-mime")
            .args(["default", DESKTOP_FILE, MIME_TYPE])
            .status()
            .context("Failed to run xdg-mime (make sure xdg-utils is installed)")?;
        if !status.success() {
            anyhow::bail!("xdg-mime failed to register {}: {}", MIME_TYPE, status);
        }

        // Verification is informational only
        match Command::new("xdg-mime").args(["query", "default", MIME_TYPE]).output() {
            Ok(output) => {
                let handler = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if handler == DESKTOP_FILE {
                    println!("Protocol handler registered");
                } else {
                    println!("Warning: expected {} as handler, got {:?}", DESKTOP_FILE, handler);
                }
            }
            Err(e) => warn!("Could not verify registration: {}", e),
        }
        Ok(())
    }
}

/// Everything install/uninstall touches
pub struct Installer {
    platform: Platform,
    store: PreferenceStore,
    applications_dir: Option<PathBuf>,
    executable: PathBuf,
    registrar: Box<dyn DesktopRegistrar>,
}

impl Installer {
    pub fn new(
        platform: Platform,
        store: PreferenceStore,
        applications_dir: Option<PathBuf>,
        executable: PathBuf,
    ) -> Self {
        Self {
            platform,
            store,
            applications_dir,
            executable,
            registrar: Box::new(XdgUtils),
        }
    }

    pub fn with_registrar(mut self, registrar: Box<dyn DesktopRegistrar>) -> Self {
        self.registrar = registrar;
        self
    }

    pub fn install(&self, registry: &Registry, terminal: &str) -> Result<()> {
        // Fail on an unknown name before anything is written
        let app = registry.lookup(terminal)?;
        let key = terminal.trim().to_ascii_lowercase();
        println!("Installing sshlink handler for {} on {}...", app.name(), self.platform);

        let shell = match self.platform {
            Platform::Linux => {
                let shell = shell::detect_user_shell();
                println!("Detected shell: {}", shell);
                Some(shell)
            }
            _ => None,
        };

        let prefs = Preferences::new(key.clone(), shell);
        self.store
            .save(&prefs)
            .with_context(|| format!("Failed to save preferences to {}", self.store.path().display()))?;
        info!("Saved preferences {:?} to {}", prefs, self.store.path().display());
        println!("Saved preferences: {}", self.store.path().display());

        match self.platform {
            Platform::Linux => self.register_linux(&key)?,
            Platform::MacOs | Platform::Windows => {
                println!(
                    "Note: receiving sshlink:// URLs on {} needs the platform URL handler shim;",
                    self.platform
                );
                println!("      only the terminal preference was recorded.");
            }
            Platform::Other(os) => {
                println!("Note: no URL scheme registration is available for {}", os);
            }
        }

        println!("sshlink installed. Default terminal: {}", app.name());
        println!("Test it with: {} sshlink://user@example.com", self.executable.display());
        Ok(())
    }

    pub fn uninstall(&self) -> Result<()> {
        println!("Uninstalling sshlink handler on {}...", self.platform);

        if self.platform == Platform::Linux {
            if let Some(dir) = &self.applications_dir {
                let desktop_file = dir.join(DESKTOP_FILE);
                if desktop_file.exists() {
                    fs::remove_file(&desktop_file).with_context(|| {
                        format!("Failed to remove desktop file {}", desktop_file.display())
                    })?;
                    println!("Removed desktop file: {}", desktop_file.display());
                }
                self.registrar.refresh(dir);
            }
        }

        let removed = self
            .store
            .remove()
            .with_context(|| format!("Failed to remove preferences {}", self.store.path().display()))?;
        if removed {
            println!("Removed preferences: {}", self.store.path().display());
        }
        // Drop the config directory too when nothing else is left in it
        if let Some(parent) = self.store.path().parent() {
            if parent.file_name().is_some_and(|name| name == "sshlink") {
                let _ = fs::remove_dir(parent);
            }
        }

        println!("sshlink uninstalled. You may need to restart your browser.");
        Ok(())
    }

    fn register_linux(&self, terminal: &str) -> Result<()> {
        let dir = self
            .applications_dir
            .as_deref()
            .context("Could not determine the applications directory")?;
        let desktop_file = write_desktop_file(dir, &self.executable, terminal)?;
        println!("Created desktop file: {}", desktop_file.display());

        self.registrar.refresh(dir);
        self.registrar.set_default()
    }
}

/// Write the desktop entry into `dir`, returning its path
pub fn write_desktop_file(dir: &Path, executable: &Path, terminal: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(DESKTOP_FILE);
    fs::write(&path, desktop_entry(executable, terminal))
        .with_context(|| format!("Failed to write {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .with_context(|| format!("Failed to make {} executable", path.display()))?;
    }

    Ok(path)
}

/// Contents of `sshlink.desktop`
pub fn desktop_entry(executable: &Path, terminal: &str) -> String {
    let exec = format!(
        "{} {} %u",
        desktop_exec_arg(&executable.to_string_lossy()),
        desktop_exec_arg(&format!("--terminal={}", terminal))
    );
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name=SSH Link Handler\n\
         Comment=Handle sshlink:// URLs\n\
         Exec={}\n\
         Icon=utilities-terminal\n\
         StartupNotify=false\n\
         NoDisplay=true\n\
         MimeType={};\n\
         Categories=Network;\n\
         Terminal=false\n",
        exec, MIME_TYPE
    )
}

/// Quote one `Exec=` argument following the desktop entry rules
fn desktop_exec_arg(arg: &str) -> String {
    const RESERVED: &[char] = &[
        ' ', '\t', '\n', '"', '\'', '\\', '>', '<', '~', '|', '&', ';', '$', '*', '?', '#', '(',
        ')', '`',
    ];
    let arg = arg.replace('%', "%%");
    if !arg.contains(RESERVED) {
        return arg;
    }

    // Inside quotes `"`, `` ` ``, `$` and `\` take a backslash, and the
    // value itself is a string where a backslash is written twice
    let mut out = String::from("\"");
    for c in arg.chars() {
        match c {
            '\\' => out.push_str(r"\\\\"),
            '"' | '`' | '$' => {
                out.push_str(r"\\");
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
