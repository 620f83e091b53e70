use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Key, Modifier, Modifiers};

/// Reasons a key-combination string is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The string was empty or whitespace only.
    #[error("empty key combination")]
    Empty,
    /// Only modifier tokens were present.
    #[error("key combination has no base key: {0}")]
    MissingKey(String),
    /// More than one non-modifier token was present.
    #[error("key combination has more than one base key: {first} and {second}")]
    MultipleKeys {
        /// The first base-key token seen.
        first: String,
        /// The offending additional token.
        second: String,
    },
    /// A token was neither a modifier nor a known key.
    #[error("unknown key: {0}")]
    UnknownKey(String),
}

/// A hotkey: a set of modifiers plus a single base key.
///
/// Two combinations are equal when their modifier bits and base keys match,
/// regardless of how they were spelled.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyCombination {
    /// Modifier bits held down for this combination.
    pub modifiers: Modifiers,
    /// The non-modifier key.
    pub key: Key,
}

impl KeyCombination {
    /// Builds a combination from parts.
    pub fn new(modifiers: Modifiers, key: Key) -> Self {
        Self { modifiers, key }
    }

    /// Parses a combination of the form `"Ctrl+Shift+A"`.
    ///
    /// - Tokens are separated by `+`, trimmed, and matched case-insensitively.
    /// - Empty tokens are skipped; modifier tokens may repeat and appear in any order.
    /// - Exactly one base key from the key table is required.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        if s.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let mut modifiers = Modifiers::empty();
        let mut base: Option<(&str, Key)> = None;
        for token in s.split('+').map(str::trim).filter(|t| !t.is_empty()) {
            if let Some(m) = Modifier::from_spec(token) {
                modifiers |= m.flag();
                continue;
            }
            if let Some((first, _)) = base {
                return Err(ParseError::MultipleKeys {
                    first: first.to_string(),
                    second: token.to_string(),
                });
            }
            let key =
                Key::from_spec(token).ok_or_else(|| ParseError::UnknownKey(token.to_string()))?;
            base = Some((token, key));
        }

        let (_, key) = base.ok_or_else(|| ParseError::MissingKey(s.trim().to_string()))?;
        Ok(Self { modifiers, key })
    }

    /// The base key's virtual key code.
    pub fn vk_code(&self) -> u32 {
        self.key.vk_code()
    }

    /// The base key's canonical name.
    pub fn key_name(&self) -> &'static str {
        self.key.name()
    }

    /// Canonical string: present modifiers in the order Ctrl, Alt, Shift, then
    /// the upper-cased base key name.
    pub fn to_string_canonical(&self) -> String {
        let mut out: Vec<String> = self.modifiers.spec_names().map(str::to_string).collect();
        out.push(self.key.to_spec());
        out.join("+")
    }

    /// Whether a key-down of `vk_code` with exactly `modifiers` held matches this combination.
    pub fn matches(&self, vk_code: u32, modifiers: Modifiers) -> bool {
        self.vk_code() == vk_code && self.modifiers == modifiers
    }
}

impl fmt::Display for KeyCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_canonical())
    }
}

impl FromStr for KeyCombination {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for KeyCombination {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<KeyCombination> for String {
    fn from(c: KeyCombination) -> Self {
        c.to_string_canonical()
    }
}
