//! Sequential human-readable identifiers
//!
//! Identifiers have the form `PREFIX-LETTERS+NUMBERS`, e.g. `PUR-AAA0001`:
//! - `LETTERS`: uppercase run advanced base-26 (AAA, AAB, ..., ZZZ, AAAA)
//! - `NUMBERS`: zero-padded run counted up at its current width
//!
//! When the numeric run is all nines the letters advance and the numbers
//! start over at [`DEFAULT_NUMBERS`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Starting letters for new sequences
pub const DEFAULT_LETTERS: &str = "AAA";

/// Starting numbers for new sequences, also used after numeric overflow
pub const DEFAULT_NUMBERS: &str = "0001";

/// Separates the prefix from the letter and numeric runs
pub const SEPARATOR: char = '-';

/// Errors raised while reading a stored identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("Invalid ID format for prefix {prefix}: {id}")]
    InvalidFormat { id: String, prefix: String },

    #[error("Invalid letter run: {0}")]
    InvalidLetters(String),
}

/// First identifier of every sequence: `{prefix}-AAA0001`
pub fn initial_identifier(prefix: &str) -> String {
    format!("{prefix}{SEPARATOR}{DEFAULT_LETTERS}{DEFAULT_NUMBERS}")
}

/// Decomposed identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceParts {
    pub prefix: String,
    /// Letter run, normalized to uppercase
    pub letters: String,
    /// Numeric run as stored, including its zero padding
    pub numbers: String,
}

impl SequenceParts {
    /// Parse `latest_id`, which must read `{expected_prefix}-[A-Za-z]+[0-9]+`.
    ///
    /// The prefix is compared literally, so prefixes containing `-` or
    /// regex metacharacters are handled like any other string.
    pub fn parse(latest_id: &str, expected_prefix: &str) -> Result<Self, SequenceError> {
        let invalid = || SequenceError::InvalidFormat {
            id: latest_id.to_string(),
            prefix: expected_prefix.to_string(),
        };

        let sequence = latest_id
            .strip_prefix(expected_prefix)
            .and_then(|rest| rest.strip_prefix(SEPARATOR))
            .ok_or_else(invalid)?;

        let split = sequence
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(sequence.len());
        let (letters, numbers) = sequence.split_at(split);

        if letters.is_empty()
            || numbers.is_empty()
            || !numbers.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        Ok(Self {
            prefix: expected_prefix.to_string(),
            letters: letters.to_ascii_uppercase(),
            numbers: numbers.to_string(),
        })
    }

    /// The identifier following this one
    pub fn advance(&self) -> Self {
        match increment_digits(&self.numbers) {
            Some(numbers) => Self {
                prefix: self.prefix.clone(),
                letters: self.letters.clone(),
                numbers,
            },
            None => Self {
                prefix: self.prefix.clone(),
                letters: carry_letters(&self.letters),
                numbers: DEFAULT_NUMBERS.to_string(),
            },
        }
    }
}

impl std::fmt::Display for SequenceParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}{}", self.prefix, SEPARATOR, self.letters, self.numbers)
    }
}

/// Increment a letter run with right-to-left carry over `A..=Z`
///
/// Lowercase input is uppercased first. Anything other than ASCII letters
/// is rejected.
///
/// Examples:
/// - `A` -> `B`
/// - `Z` -> `AA`
/// - `AZ` -> `BA`
/// - `ZZZ` -> `AAAA`
/// - empty -> `A`
pub fn increment_letters(letters: &str) -> Result<String, SequenceError> {
    if !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(SequenceError::InvalidLetters(letters.to_string()));
    }
    Ok(carry_letters(&letters.to_ascii_uppercase()))
}

/// Base-26 successor of an uppercase ASCII run
fn carry_letters(letters: &str) -> String {
    let mut chars: Vec<char> = letters.chars().collect();

    for i in (0..chars.len()).rev() {
        match chars[i] {
            c @ 'A'..='Y' => {
                chars[i] = char::from(c as u8 + 1);
                return chars.into_iter().collect();
            }
            _ => chars[i] = 'A',
        }
    }

    // Every position carried out
    "A".repeat(chars.len() + 1)
}

/// Increment a decimal run keeping its width; `None` once it is all nines.
fn increment_digits(numbers: &str) -> Option<String> {
    if numbers.chars().all(|c| c == '9') {
        return None;
    }

    let mut digits: Vec<char> = numbers.chars().collect();
    for i in (0..digits.len()).rev() {
        if digits[i] != '9' {
            digits[i] = char::from(digits[i] as u8 + 1);
            break;
        }
        digits[i] = '0';
    }
    Some(digits.into_iter().collect())
}

/// Next identifier after `latest_id` in the sequence of `expected_prefix`
pub fn next_identifier(latest_id: &str, expected_prefix: &str) -> Result<String, SequenceError> {
    SequenceParts::parse(latest_id, expected_prefix).map(|parts| parts.advance().to_string())
}

/// What the next allocation for a stored value will return
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencePreview {
    pub next_id: String,
    /// The stored value is corrupt and the sequence will restart
    pub reset: bool,
}

/// Preview the next allocation, including the reset a corrupt value triggers
pub fn preview_next(latest_id: &str, prefix: &str) -> SequencePreview {
    match next_identifier(latest_id, prefix) {
        Ok(next_id) => SequencePreview {
            next_id,
            reset: false,
        },
        Err(_) => SequencePreview {
            next_id: initial_identifier(prefix),
            reset: true,
        },
    }
}
