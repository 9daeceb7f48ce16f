//! Concrete terminal applications.

use std::path::PathBuf;

use tracing::{info, warn};

use super::invocation::{ssh_args, ssh_command_line, Invocation, LaunchPlan, SpawnMode};
use super::{Result, Terminal, TerminalError};
use crate::link::ConnectionTarget;

/// Characters cmd.exe treats as syntax when it re-parses `/k` commands
const CMD_METACHARACTERS: &[char] = &[
    '&', '|', '<', '>', '^', '%', '(', ')', '"', '!', ',', ';', '=',
];

/// AppleScript dialect of a scriptable terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFlavor {
    /// Terminal.app: `do script`
    TerminalApp,
    /// iTerm2 (installed as iTerm.app): new window, `write text`
    ITerm,
}

/// How a terminal is driven
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalKind {
    /// macOS application driven through AppleScript
    Scriptable { app: String, flavor: ScriptFlavor },
    /// Application without usable automation: the command goes to the
    /// clipboard and the user pastes it
    ClipboardRelay { app: String },
    /// `<program> <prefix..> ssh <target>`
    Generic { program: String, prefix: Vec<String> },
    /// `<program> <prefix..> <shell> -c "ssh <target>; exec <shell>"`,
    /// keeps a shell open after the session ends
    ShellWrapped {
        program: String,
        prefix: Vec<String>,
        shell: String,
    },
    /// `cmd /c start cmd /k ssh <target>`. cmd.exe parses the command line
    /// again, so targets containing its metacharacters are refused.
    CommandPrompt { program: String, prefix: Vec<String> },
    /// Windows Terminal, which splits its arguments into subcommands on `;`
    WindowsTerminal { program: String, prefix: Vec<String> },
}

/// A terminal application with a display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalApp {
    name: String,
    kind: TerminalKind,
}

impl TerminalApp {
    pub fn new(name: impl Into<String>, kind: TerminalKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn kind(&self) -> &TerminalKind {
        &self.kind
    }

    /// Build the launch plan for `target` without running anything
    pub fn plan(&self, target: &ConnectionTarget) -> Result<LaunchPlan> {
        let plan = match &self.kind {
            TerminalKind::Scriptable { app, flavor } => {
                let script = apple_script(app, *flavor, target);
                // `--` keeps osascript from reading a target like `-x` as an option
                LaunchPlan::new(
                    Invocation::new("osascript", SpawnMode::Wait)
                        .args(["-e", script.as_str(), "--", target.as_str()]),
                )
            }
            TerminalKind::ClipboardRelay { app } => LaunchPlan::new(
                Invocation::new("open", SpawnMode::Wait).args(["-a", app.as_str()]),
            )
            .with_clipboard(ssh_command_line(target)),
            TerminalKind::Generic { program, prefix } => LaunchPlan::new(
                Invocation::new(program.as_str(), SpawnMode::Detached)
                    .args(prefix.iter().cloned())
                    .args(ssh_args(target)),
            ),
            TerminalKind::ShellWrapped {
                program,
                prefix,
                shell,
            } => {
                let command = format!(
                    "{}; exec {}",
                    ssh_command_line(target),
                    shell_words::quote(shell)
                );
                LaunchPlan::new(
                    Invocation::new(program.as_str(), SpawnMode::Detached)
                        .args(prefix.iter().cloned())
                        .args([shell.as_str(), "-c", command.as_str()]),
                )
            }
            TerminalKind::CommandPrompt { program, prefix } => {
                if is_unsafe_for_cmd(target.as_str()) {
                    warn!("Refusing to pass {:?} through cmd.exe", target.as_str());
                    return Err(TerminalError::UnsafeTarget {
                        terminal: self.name.clone(),
                        target: target.to_string(),
                    });
                }
                LaunchPlan::new(
                    Invocation::new(program.as_str(), SpawnMode::Detached)
                        .args(prefix.iter().cloned())
                        .args(ssh_args(target)),
                )
            }
            TerminalKind::WindowsTerminal { program, prefix } => LaunchPlan::new(
                Invocation::new(program.as_str(), SpawnMode::Detached)
                    .args(prefix.iter().cloned())
                    .args(ssh_args(target).iter().map(|arg| arg.replace(';', r"\;"))),
            ),
        };
        Ok(plan)
    }
}

impl Terminal for TerminalApp {
    fn open(&self, target: &ConnectionTarget) -> Result<()> {
        info!("Opening {} in {}", target, self.name);
        self.plan(target)?.execute(&self.name)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        match self.kind() {
            TerminalKind::Scriptable { app, .. } | TerminalKind::ClipboardRelay { app } => {
                app_bundle_exists(app)
            }
            TerminalKind::Generic { program, .. }
            | TerminalKind::ShellWrapped { program, .. }
            | TerminalKind::CommandPrompt { program, .. }
            | TerminalKind::WindowsTerminal { program, .. } => which::which(program).is_ok(),
        }
    }
}

fn is_unsafe_for_cmd(target: &str) -> bool {
    target.contains(CMD_METACHARACTERS) || target.chars().any(char::is_whitespace)
}

/// AppleScript run as `osascript -e <script> -- <target>`.
///
/// The target only ever arrives as `item 1 of argv` and is shell-quoted by
/// `quoted form of`; the script text itself is fixed per app.
fn apple_script(app: &str, flavor: ScriptFlavor, target: &ConnectionTarget) -> String {
    let app = apple_script_quote(app);
    // Everything ssh_args puts before the target, e.g. "ssh -- "
    let mut words = ssh_args(target);
    words.pop();
    let ssh = apple_script_quote(&format!("{} ", words.join(" ")));
    let command = format!("{} & quoted form of (item 1 of argv)", ssh);
    match flavor {
        ScriptFlavor::TerminalApp => format!(
            "on run argv\n\
             \ttell application {app}\n\
             \t\tactivate\n\
             \t\tdo script {command}\n\
             \tend tell\n\
             end run"
        ),
        ScriptFlavor::ITerm => format!(
            "on run argv\n\
             \ttell application {app}\n\
             \t\tactivate\n\
             \t\tcreate window with default profile\n\
             \t\ttell current session of current window\n\
             \t\t\twrite text {command}\n\
             \t\tend tell\n\
             \tend tell\n\
             end run"
        ),
    }
}

/// Quote a string as an AppleScript string literal
fn apple_script_quote(s: &str) -> String {
    // Backslashes first, then double quotes
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

fn app_bundle_exists(app: &str) -> bool {
    let bundle = format!("{}.app", app);
    let mut roots = vec![
        PathBuf::from("/Applications"),
        PathBuf::from("/System/Applications"),
        PathBuf::from("/System/Applications/Utilities"),
        PathBuf::from("/Applications/Utilities"),
    ];
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join("Applications"));
    }
    roots.iter().any(|root| root.join(&bundle).exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(s: &str) -> ConnectionTarget {
        ConnectionTarget::new(s).unwrap()
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn cmd() -> TerminalApp {
        TerminalApp::new(
            "cmd",
            TerminalKind::CommandPrompt {
                program: "cmd".to_string(),
                prefix: strings(&["/c", "start", "cmd", "/k"]),
            },
        )
    }

    fn wt() -> TerminalApp {
        TerminalApp::new(
            "Windows Terminal",
            TerminalKind::WindowsTerminal {
                program: "wt".to_string(),
                prefix: strings(&["new-tab"]),
            },
        )
    }

    #[test]
    fn test_generic_plan() {
        let kitty = TerminalApp::new(
            "kitty",
            TerminalKind::Generic {
                program: "kitty".to_string(),
                prefix: strings(&["-e"]),
            },
        );
        let plan = kitty.plan(&target("user@example.com:2222")).unwrap();
        assert_eq!(plan.clipboard, None);
        assert_eq!(plan.invocation.program, "kitty");
        assert_eq!(plan.invocation.args, strings(&["-e", "ssh", "user@example.com:2222"]));
        assert_eq!(plan.invocation.mode, SpawnMode::Detached);
    }

    #[test]
    fn test_generic_plan_keeps_target_as_one_argument() {
        let term = TerminalApp::new(
            "wezterm",
            TerminalKind::Generic {
                program: "wezterm".to_string(),
                prefix: strings(&["start"]),
            },
        );
        let plan = term.plan(&target("host; rm -rf ~")).unwrap();
        assert_eq!(plan.invocation.args, strings(&["start", "ssh", "host; rm -rf ~"]));
    }

    #[test]
    fn test_shell_wrapped_plan() {
        let gnome = TerminalApp::new(
            "gnome-terminal",
            TerminalKind::ShellWrapped {
                program: "gnome-terminal".to_string(),
                prefix: strings(&["--tab", "--"]),
                shell: "/bin/zsh".to_string(),
            },
        );
        let plan = gnome.plan(&target("user@host")).unwrap();
        assert_eq!(plan.invocation.program, "gnome-terminal");
        assert_eq!(
            plan.invocation.args,
            strings(&["--tab", "--", "/bin/zsh", "-c", "ssh user@host; exec /bin/zsh"])
        );
    }

    #[test]
    fn test_shell_wrapped_plan_quotes_target() {
        let gnome = TerminalApp::new(
            "gnome-terminal",
            TerminalKind::ShellWrapped {
                program: "gnome-terminal".to_string(),
                prefix: strings(&["--"]),
                shell: "/bin/bash".to_string(),
            },
        );
        let plan = gnome.plan(&target("host;touch pwned")).unwrap();
        let command = plan.invocation.args.last().unwrap();
        assert_eq!(command, "ssh 'host;touch pwned'; exec /bin/bash");
    }

    #[test]
    fn test_scriptable_plan_passes_target_as_argument() {
        let iterm = TerminalApp::new(
            "iTerm2",
            TerminalKind::Scriptable {
                app: "iTerm".to_string(),
                flavor: ScriptFlavor::ITerm,
            },
        );
        let plan = iterm.plan(&target("evil\"host")).unwrap();
        let inv = &plan.invocation;
        assert_eq!(inv.program, "osascript");
        assert_eq!(inv.mode, SpawnMode::Wait);
        assert_eq!(inv.args.len(), 4);
        assert_eq!(inv.args[0], "-e");
        assert_eq!(&inv.args[2..], strings(&["--", "evil\"host"]).as_slice());

        let script = &inv.args[1];
        assert!(script.starts_with("on run argv\n\ttell application \"iTerm\""));
        assert!(script.contains("write text \"ssh \" & quoted form of (item 1 of argv)"));
        assert!(!script.contains("evil"));
    }

    #[test]
    fn test_terminal_app_script() {
        let script = apple_script("Terminal", ScriptFlavor::TerminalApp, &target("host"));
        assert_eq!(
            script,
            "on run argv\n\
             \ttell application \"Terminal\"\n\
             \t\tactivate\n\
             \t\tdo script \"ssh \" & quoted form of (item 1 of argv)\n\
             \tend tell\n\
             end run"
        );
    }

    #[test]
    fn test_script_keeps_option_like_target_away_from_ssh_options() {
        let script = apple_script("Terminal", ScriptFlavor::TerminalApp, &target("-oProxyCommand=x"));
        assert!(script.contains("do script \"ssh -- \" & quoted form of (item 1 of argv)"));
    }

    #[test]
    fn test_clipboard_relay_plan() {
        let warp = TerminalApp::new(
            "Warp",
            TerminalKind::ClipboardRelay {
                app: "Warp".to_string(),
            },
        );
        let plan = warp.plan(&target("deploy@staging")).unwrap();
        assert_eq!(plan.clipboard.as_deref(), Some("ssh deploy@staging"));
        assert_eq!(plan.invocation.program, "open");
        assert_eq!(plan.invocation.args, strings(&["-a", "Warp"]));
    }

    #[test]
    fn test_command_prompt_plan() {
        let plan = cmd().plan(&target("admin@[2001:db8::1]:2222")).unwrap();
        assert_eq!(plan.invocation.program, "cmd");
        assert_eq!(
            plan.invocation.args,
            strings(&["/c", "start", "cmd", "/k", "ssh", "admin@[2001:db8::1]:2222"])
        );
    }

    #[test]
    fn test_command_prompt_refuses_cmd_metacharacters() {
        for raw in ["x&calc.exe", "x|calc", "h>out", "a^b", "%PATH%", "(x)", "a\"b", "h;x", "h,x", "a b"] {
            let err = cmd().plan(&target(raw)).unwrap_err();
            assert!(
                matches!(&err, TerminalError::UnsafeTarget { target, .. } if target == raw),
                "{raw}: {err}"
            );
        }
    }

    #[test]
    fn test_windows_terminal_escapes_subcommand_separator() {
        let plan = wt().plan(&target("h;nt")).unwrap();
        assert_eq!(plan.invocation.program, "wt");
        assert_eq!(plan.invocation.args, strings(&["new-tab", "ssh", "h\\;nt"]));

        let plan = wt().plan(&target("user@host")).unwrap();
        assert_eq!(plan.invocation.args, strings(&["new-tab", "ssh", "user@host"]));
    }

    #[test]
    fn test_apple_script_quote() {
        assert_eq!(apple_script_quote("iTerm"), "\"iTerm\"");
        assert_eq!(apple_script_quote("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }

    #[test]
    fn test_name_and_availability() {
        let term = TerminalApp::new(
            "missing",
            TerminalKind::Generic {
                program: "sshlink-no-such-terminal-binary".to_string(),
                prefix: Vec::new(),
            },
        );
        assert_eq!(term.name(), "missing");
        assert!(!term.is_available());
    }
}
