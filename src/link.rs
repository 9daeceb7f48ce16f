//! `sshlink://` URL resolution.
//!
//! Turns the raw string handed over by the browser (or the desktop
//! environment) into a [`ConnectionTarget`] that can be given to `ssh`.
//!
//! # Accepted forms
//!
//! ```text
//! sshlink://host
//! sshlink://user@host
//! sshlink://user@host:2222
//! sshlink://user@[2001:db8::1]:22
//! sshlink://ssh+user@host        (legacy, prefix is stripped)
//! ```
//!
//! Paths, query strings and fragments are dropped. The authority is passed
//! through verbatim; hostnames, user names and ports are not validated
//! beyond what URI syntax requires.

use std::fmt;

use thiserror::Error;
use url::Url;

/// Scheme handled by this program
pub const SCHEME: &str = "sshlink";

/// Authority prefix used by older links (`sshlink://ssh+host`)
const LEGACY_PREFIX: &str = "ssh+";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[source] url::ParseError),

    #[error("unsupported scheme: {0:?} (expected sshlink://)")]
    UnsupportedScheme(String),

    #[error("no target specified")]
    EmptyTarget,
}

pub type Result<T> = std::result::Result<T, ResolveError>;

/// SSH destination in `[user@]host[:port]` form.
///
/// Never empty and never carries the scheme prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionTarget(String);

impl ConnectionTarget {
    pub fn new(target: impl Into<String>) -> Result<Self> {
        let target = target.into();
        if target.is_empty() {
            return Err(ResolveError::EmptyTarget);
        }
        Ok(Self(target))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve a raw `sshlink://` URL into a connection target
pub fn resolve(raw_url: &str) -> Result<ConnectionTarget> {
    // Same normalisation the URL parser applies before looking at the input:
    // C0 controls and spaces at either end, tabs and newlines anywhere
    let cleaned: String = raw_url
        .trim_matches(|c: char| c <= ' ' || c.is_whitespace())
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect();

    let url = match Url::parse(&cleaned) {
        Ok(url) => url,
        // No scheme at all: a relative reference rather than a broken URI
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            return Err(ResolveError::UnsupportedScheme(String::new()));
        }
        Err(url::ParseError::EmptyHost) if has_scheme(&cleaned) => {
            return Err(ResolveError::EmptyTarget);
        }
        Err(e) => return Err(ResolveError::InvalidUrl(e)),
    };

    if url.scheme() != SCHEME {
        return Err(ResolveError::UnsupportedScheme(url.scheme().to_string()));
    }

    // Scheme is ASCII, so its length in the input matches the parsed one
    let after_scheme = &cleaned[url.scheme().len()..];
    let Some(rest) = after_scheme.strip_prefix("://") else {
        return Err(ResolveError::EmptyTarget);
    };

    let authority = rest
        .find(['/', '?', '#'])
        .map_or(rest, |end| &rest[..end]);
    let authority = authority.strip_prefix(LEGACY_PREFIX).unwrap_or(authority);

    ConnectionTarget::new(authority)
}

fn has_scheme(raw: &str) -> bool {
    raw.get(..SCHEME.len() + 1)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("sshlink:"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(raw: &str) -> String {
        resolve(raw).expect("should resolve").as_str().to_string()
    }

    #[test]
    fn test_plain_targets() {
        assert_eq!(target("sshlink://192.168.1.1"), "192.168.1.1");
        assert_eq!(target("sshlink://user@example.com"), "user@example.com");
        assert_eq!(target("sshlink://user@example.com:2222"), "user@example.com:2222");
        assert_eq!(
            target("sshlink://deploy@staging-server:2200"),
            "deploy@staging-server:2200"
        );
    }

    #[test]
    fn test_ipv6_literal_is_preserved() {
        assert_eq!(
            target("sshlink://user@[2001:db8::1]:22"),
            "user@[2001:db8::1]:22"
        );
        assert_eq!(target("sshlink://[::1]"), "[::1]");
    }

    #[test]
    fn test_query_fragment_and_path_are_dropped() {
        assert_eq!(target("sshlink://server?x=1"), "server");
        assert_eq!(target("sshlink://server#fragment"), "server");
        assert_eq!(target("sshlink://server/"), "server");
        assert_eq!(target("sshlink://user@server:22/some/path?a=b#c"), "user@server:22");
    }

    #[test]
    fn test_case_of_authority_is_kept() {
        // The URL parser may normalise hosts, the target must not change
        assert_eq!(target("sshlink://Admin@MyHost"), "Admin@MyHost");
        assert_eq!(target("SSHLINK://host"), "host");
    }

    #[test]
    fn test_legacy_prefix_is_stripped() {
        assert_eq!(target("sshlink://ssh+host"), "host");
        assert_eq!(target("sshlink://ssh+user@host:2222"), "user@host:2222");
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert_eq!(target("  sshlink://host\n"), "host");
    }

    #[test]
    fn test_surrounding_control_characters_are_ignored() {
        assert_eq!(target("\u{1f}sshlink://host"), "host");
        assert_eq!(target("\u{0}\u{7} sshlink://user@host:22\u{1b}"), "user@host:22");
        assert_eq!(target("sshlink://ho\tst"), "host");
    }

    #[test]
    fn test_empty_target() {
        assert_eq!(resolve("sshlink://"), Err(ResolveError::EmptyTarget));
        assert_eq!(resolve("sshlink://?x=1"), Err(ResolveError::EmptyTarget));
        assert_eq!(resolve("sshlink://ssh+"), Err(ResolveError::EmptyTarget));
        assert_eq!(resolve("sshlink:host"), Err(ResolveError::EmptyTarget));
    }

    #[test]
    fn test_unsupported_scheme() {
        for raw in ["http://example.com", "ssh://host", "mailto:me@example.com"] {
            assert!(
                matches!(resolve(raw), Err(ResolveError::UnsupportedScheme(_))),
                "{raw} should be rejected by scheme"
            );
        }
        assert_eq!(
            resolve("ssh://host"),
            Err(ResolveError::UnsupportedScheme("ssh".to_string()))
        );
    }

    #[test]
    fn test_missing_scheme() {
        for raw in ["", "server", "user@host", "//host"] {
            assert_eq!(
                resolve(raw),
                Err(ResolveError::UnsupportedScheme(String::new())),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn test_invalid_url() {
        for raw in ["sshlink://[::1", "sshlink://host name", "sshlink://host:99999999"] {
            assert!(
                matches!(resolve(raw), Err(ResolveError::InvalidUrl(_))),
                "{raw} should be an invalid URL"
            );
        }
    }

    #[test]
    fn test_connection_target_rejects_empty() {
        assert_eq!(ConnectionTarget::new(""), Err(ResolveError::EmptyTarget));
        assert_eq!(ConnectionTarget::new("host").unwrap().to_string(), "host");
    }
}
