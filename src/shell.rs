//! Login shell detection.

use std::env;
use std::process::Command;

use tracing::debug;

/// Used when nothing better is known
pub const FALLBACK_SHELL: &str = "/bin/bash";

/// Detect the user's login shell.
///
/// `$SHELL` first, then the passwd entry via `getent`, then `/bin/bash`.
pub fn detect_user_shell() -> String {
    if let Some(shell) = env::var("SHELL").ok().filter(|s| !s.trim().is_empty()) {
        return shell;
    }

    if let Some(shell) = current_user().and_then(|user| passwd_shell(&user)) {
        debug!("Shell from passwd entry: {}", shell);
        return shell;
    }

    FALLBACK_SHELL.to_string()
}

/// Shell to use for a launch: the saved one, else detection
pub fn effective_shell(saved: Option<&str>) -> String {
    match saved.map(str::trim).filter(|s| !s.is_empty()) {
        Some(shell) => shell.to_string(),
        None => detect_user_shell(),
    }
}

fn current_user() -> Option<String> {
    env::var("USER")
        .or_else(|_| env::var("LOGNAME"))
        .ok()
        .filter(|u| !u.is_empty())
}

fn passwd_shell(user: &str) -> Option<String> {
    let output = Command::new("getent").args(["passwd", user]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    shell_from_passwd_line(&String::from_utf8_lossy(&output.stdout))
}

/// Seventh field of `name:x:uid:gid:gecos:home:shell`
fn shell_from_passwd_line(line: &str) -> Option<String> {
    let fields: Vec<&str> = line.trim().split(':').collect();
    fields
        .get(6)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_from_passwd_line() {
        assert_eq!(
            shell_from_passwd_line("alice:x:1000:1000:Alice,,,:/home/alice:/usr/bin/zsh\n"),
            Some("/usr/bin/zsh".to_string())
        );
        assert_eq!(shell_from_passwd_line("bob:x:1001:1001::/home/bob:"), None);
        assert_eq!(shell_from_passwd_line("short:x:1"), None);
    }

    #[test]
    fn test_effective_shell_prefers_saved() {
        assert_eq!(effective_shell(Some("/bin/fish")), "/bin/fish");
        assert!(!effective_shell(Some("  ")).is_empty());
        assert!(!effective_shell(None).is_empty());
    }
}
