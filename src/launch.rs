//! URL → terminal dispatch.
//!
//! ```text
//! raw URL ──resolve──▶ ConnectionTarget
//! --terminal / preference / default ──factory──▶ Terminal
//! Terminal::open(target)
//! ```
//!
//! Nothing is retried: the first error ends the launch.

use thiserror::Error;
use tracing::info;

use crate::config::Preferences;
use crate::link::{self, ConnectionTarget, ResolveError};
use crate::terminal::registry::DEFAULT_TERMINAL;
use crate::terminal::{TerminalError, TerminalFactory};

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Terminal(#[from] TerminalError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Terminal name for a launch: the explicit choice, else the saved
/// preference, else [`DEFAULT_TERMINAL`]
pub fn choose_terminal<'a>(explicit: Option<&'a str>, prefs: &'a Preferences) -> &'a str {
    let usable = |name: &'a str| Some(name.trim()).filter(|name| !name.is_empty());
    explicit
        .and_then(usable)
        .or_else(|| prefs.terminal.as_deref().and_then(usable))
        .unwrap_or(DEFAULT_TERMINAL)
}

/// Open an SSH session for `raw_url`
pub fn launch(
    raw_url: &str,
    explicit_terminal: Option<&str>,
    prefs: &Preferences,
    factory: &dyn TerminalFactory,
) -> Result<ConnectionTarget> {
    let target = link::resolve(raw_url)?;
    let name = choose_terminal(explicit_terminal, prefs);
    info!("Resolved {} -> {} (terminal {})", raw_url, target, name);

    let terminal = factory.create(name)?;
    if !terminal.is_available() {
        info!("{} does not look installed, trying anyway", terminal.name());
    }

    println!("Opening SSH connection to {} using {}", target, terminal.name());
    terminal.open(&target)?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::{self, Terminal};
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    #[derive(Default)]
    struct Calls {
        created: Vec<String>,
        opened: Vec<String>,
    }

    struct MockTerminal {
        calls: Rc<RefCell<Calls>>,
        fail: bool,
    }

    impl Terminal for MockTerminal {
        fn open(&self, target: &ConnectionTarget) -> terminal::Result<()> {
            self.calls.borrow_mut().opened.push(target.as_str().to_string());
            if self.fail {
                return Err(TerminalError::LaunchFailed {
                    terminal: "mock".to_string(),
                    source: io::Error::new(io::ErrorKind::NotFound, "mock error"),
                });
            }
            Ok(())
        }

        fn name(&self) -> &str {
            "mock"
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct MockFactory {
        calls: Rc<RefCell<Calls>>,
        fail_open: bool,
    }

    impl TerminalFactory for MockFactory {
        fn create(&self, name: &str) -> terminal::Result<Box<dyn Terminal>> {
            self.calls.borrow_mut().created.push(name.to_string());
            if name == "nonexistent" {
                return Err(TerminalError::UnsupportedTerminal(name.to_string()));
            }
            Ok(Box::new(MockTerminal {
                calls: Rc::clone(&self.calls),
                fail: self.fail_open,
            }))
        }
    }

    #[test]
    fn test_launch_opens_resolved_target_once() {
        let factory = MockFactory::default();
        let target = launch(
            "sshlink://user@example.com:2222?x=1",
            Some("kitty"),
            &Preferences::default(),
            &factory,
        )
        .unwrap();

        assert_eq!(target.as_str(), "user@example.com:2222");
        let calls = factory.calls.borrow();
        assert_eq!(calls.created, vec!["kitty"]);
        assert_eq!(calls.opened, vec!["user@example.com:2222"]);
    }

    #[test]
    fn test_resolver_error_stops_before_terminal() {
        let factory = MockFactory::default();
        let err = launch("sshlink://", None, &Preferences::default(), &factory).unwrap_err();
        assert!(matches!(err, Error::Resolve(ResolveError::EmptyTarget)));
        assert_eq!(err.to_string(), "no target specified");
        assert!(factory.calls.borrow().created.is_empty());

        let err = launch("https://example.com", None, &Preferences::default(), &factory).unwrap_err();
        assert!(matches!(err, Error::Resolve(ResolveError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_unsupported_terminal_is_propagated() {
        let factory = MockFactory::default();
        let err = launch(
            "sshlink://192.168.1.1",
            Some("nonexistent"),
            &Preferences::default(),
            &factory,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Terminal(TerminalError::UnsupportedTerminal(_))));
        assert!(err.to_string().contains("unsupported terminal"));
        assert!(factory.calls.borrow().opened.is_empty());
    }

    #[test]
    fn test_open_failure_is_propagated_without_retry() {
        let factory = MockFactory {
            fail_open: true,
            ..Default::default()
        };
        let err = launch("sshlink://host", None, &Preferences::default(), &factory).unwrap_err();
        assert!(matches!(err, Error::Terminal(TerminalError::LaunchFailed { .. })));
        assert_eq!(factory.calls.borrow().opened.len(), 1);
    }

    #[test]
    fn test_saved_preference_is_used_when_no_choice_given() {
        let factory = MockFactory::default();
        let prefs = Preferences::new("iterm", None);
        launch("sshlink://host", None, &prefs, &factory).unwrap();
        launch("sshlink://host", Some("warp"), &prefs, &factory).unwrap();
        assert_eq!(factory.calls.borrow().created, vec!["iterm", "warp"]);
    }

    #[test]
    fn test_choose_terminal() {
        let none = Preferences::default();
        let saved = Preferences::new("kitty", None);
        assert_eq!(choose_terminal(None, &none), "terminal");
        assert_eq!(choose_terminal(None, &saved), "kitty");
        assert_eq!(choose_terminal(Some("xterm"), &saved), "xterm");
        assert_eq!(choose_terminal(Some("  "), &saved), "kitty");
        assert_eq!(choose_terminal(Some(" wezterm "), &none), "wezterm");
    }
}
