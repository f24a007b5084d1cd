//! The `[PII:<vault_id>:<entry_id>]` token grammar.

use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Matches a well-formed token embedded anywhere in a string.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[PII:([A-Za-z0-9_\-]+):([A-Za-z0-9_\-]+)\]").expect("invalid token pattern")
});

/// A structural reference to a vaulted value.
///
/// Tokens stand in for protected values everywhere outside the vault's
/// encrypted log. Parsing is total: malformed strings parse to "no
/// match", never to an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PiiToken {
    /// The vault holding the value.
    pub vault_id: String,

    /// The entry within that vault.
    pub entry_id: String,
}

impl PiiToken {
    /// Creates a token from its parts.
    #[must_use]
    pub fn new(vault_id: impl Into<String>, entry_id: impl Into<String>) -> Self {
        Self {
            vault_id: vault_id.into(),
            entry_id: entry_id.into(),
        }
    }

    /// Parses a string that is exactly one token.
    ///
    /// Returns `None` for anything else: wrong delimiters, missing
    /// parts, embedded text, or illegal characters.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let captures = TOKEN_RE.captures(raw)?;
        // The token must span the whole string, not merely occur in it.
        if captures.get(0)?.as_str() != raw {
            return None;
        }
        Some(Self::new(&captures[1], &captures[2]))
    }

    /// Collects every well-formed token embedded in a string.
    #[must_use]
    pub fn find_all(text: &str) -> Vec<Self> {
        TOKEN_RE
            .captures_iter(text)
            .map(|captures| Self::new(&captures[1], &captures[2]))
            .collect()
    }
}

impl fmt::Display for PiiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[PII:{}:{}]", self.vault_id, self.entry_id)
    }
}

/// Replaces every embedded token the resolver can answer for.
///
/// Tokens the resolver returns `None` for are left exactly as written —
/// a value is never fabricated for an unresolvable token.
pub fn replace_embedded<F>(text: &str, resolve: F) -> String
where
    F: Fn(&PiiToken) -> Option<String>,
{
    TOKEN_RE
        .replace_all(text, |captures: &Captures<'_>| {
            let token = PiiToken::new(&captures[1], &captures[2]);
            resolve(&token).unwrap_or_else(|| captures[0].to_string())
        })
        .into_owned()
}
