//! Pair codes: short human-shareable tokens linking a shift to its live view

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Characters a pair code may contain. Visually similar glyphs
/// (`0 O 1 I L`) are left out so codes survive being read aloud or retyped.
pub const PAIR_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Number of characters in a pair code.
pub const PAIR_CODE_LENGTH: usize = 6;

/// A pair code. Anyone holding it can read the shift's remote projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PairCode(String);

impl PairCode {
    /// Draw a fresh random code from [`PAIR_CODE_ALPHABET`].
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code = (0..PAIR_CODE_LENGTH)
            .map(|_| char::from(PAIR_CODE_ALPHABET[rng.random_range(0..PAIR_CODE_ALPHABET.len())]))
            .collect();
        Self(code)
    }

    /// Parse user or wire input. Surrounding whitespace is ignored and
    /// lowercase letters are accepted.
    pub fn parse(raw: &str) -> Result<Self> {
        let candidate = raw.trim().to_ascii_uppercase();
        if pair_code_pattern().is_match(&candidate) {
            Ok(Self(candidate))
        } else {
            Err(Error::validation(format!(
                "pair code must be {PAIR_CODE_LENGTH} characters from {}",
                String::from_utf8_lossy(PAIR_CODE_ALPHABET)
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn pair_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-HJKMNP-Z2-9]{6}$").expect("Invalid regex"))
}

impl fmt::Display for PairCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PairCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PairCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PairCode> for String {
    fn from(value: PairCode) -> Self {
        value.0
    }
}
