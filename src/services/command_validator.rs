//! Operator command gate.
//!
//! Free text typed by an operator is checked here before it can reach the
//! limiter's stdin. The accepted grammar is exactly `<verb> <id>`; anything the
//! rules do not positively allow is rejected.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Longest command accepted, in bytes.
pub const MAX_COMMAND_LENGTH: usize = 50;

/// Verbs an operator may send to the limiter.
pub const ALLOWED_VERBS: [&str; 4] = ["check", "status", "clear", "sniff"];

/// Why a command was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    TooLong,
    WrongTokenCount,
    UnknownVerb,
    InvalidIdentifier,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Empty => "command is empty",
            Self::TooLong => "command exceeds maximum length",
            Self::WrongTokenCount => "expected exactly `<verb> <id>`",
            Self::UnknownVerb => "verb is not allowed",
            Self::InvalidIdentifier => "identifier may only contain letters, digits, `_` and `.`",
        };
        f.write_str(reason)
    }
}

/// A command that passed validation. Only [`check`] constructs one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCommand {
    text: String,
}

impl ValidatedCommand {
    pub fn verb(&self) -> &str {
        self.text.split(' ').next().unwrap_or_default()
    }

    pub fn identifier(&self) -> &str {
        self.text.split(' ').nth(1).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for ValidatedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Whether `command` may be forwarded to the limiter.
pub fn validate(command: &str) -> bool {
    check(command).is_ok()
}

/// Validate `command`, returning the normalized form or the first rule it broke.
pub fn check(command: &str) -> Result<ValidatedCommand, Rejection> {
    if command.is_empty() {
        return Err(Rejection::Empty);
    }
    if command.len() > MAX_COMMAND_LENGTH {
        return Err(Rejection::TooLong);
    }

    let trimmed = command.trim();
    let mut parts = trimmed.split(' ');
    let (Some(verb), Some(id), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Rejection::WrongTokenCount);
    };

    if !ALLOWED_VERBS.contains(&verb) {
        return Err(Rejection::UnknownVerb);
    }
    if !is_identifier(id) {
        return Err(Rejection::InvalidIdentifier);
    }

    Ok(ValidatedCommand {
        text: trimmed.to_string(),
    })
}

/// User names and dotted IPv4-style addresses.
fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_.]+$")
            .unwrap_or_else(|e| panic!("identifier pattern is invalid: {e}"))
    })
}

fn is_identifier(token: &str) -> bool {
    identifier_pattern().is_match(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_accepts_allowed_verbs() {
        for verb in ALLOWED_VERBS {
            assert!(validate(&format!("{verb} alice")), "{verb} should be accepted");
        }
        assert!(validate("check 192.168.0.1"));
        assert!(validate("status user_42"));
    }

    #[test]
    fn test_rejects_unknown_verb() {
        assert_eq!(check("drop alice"), Err(Rejection::UnknownVerb));
        assert_eq!(check("throttle 0.2"), Err(Rejection::UnknownVerb));
        assert_eq!(check("CHECK alice"), Err(Rejection::UnknownVerb));
    }

    #[test]
    fn test_rejects_wrong_token_count() {
        assert_eq!(check("check"), Err(Rejection::WrongTokenCount));
        assert_eq!(check("check alice bob"), Err(Rejection::WrongTokenCount));
        assert_eq!(check("check  alice"), Err(Rejection::WrongTokenCount));
        assert_eq!(check("check\talice"), Err(Rejection::WrongTokenCount));
        assert_eq!(check("   "), Err(Rejection::WrongTokenCount));
    }

    #[test]
    fn test_rejects_injection_attempts() {
        assert_eq!(check("check alice;rm"), Err(Rejection::InvalidIdentifier));
        assert_eq!(check("check alice\nclear bob"), Err(Rejection::WrongTokenCount));
        assert_eq!(check("check alice\nclear"), Err(Rejection::InvalidIdentifier));
        assert_eq!(check("check $(id)"), Err(Rejection::InvalidIdentifier));
        assert_eq!(check("check ali-ce"), Err(Rejection::InvalidIdentifier));
        assert_eq!(check("check élise"), Err(Rejection::InvalidIdentifier));
    }

    #[test]
    fn test_length_bound_is_inclusive() {
        let at_limit = format!("check {}", "a".repeat(MAX_COMMAND_LENGTH - 6));
        assert_eq!(at_limit.len(), MAX_COMMAND_LENGTH);
        assert!(validate(&at_limit));

        let over = format!("check {}", "a".repeat(MAX_COMMAND_LENGTH - 5));
        assert_eq!(check(&over), Err(Rejection::TooLong));
    }

    #[test]
    fn test_surrounding_whitespace_is_trimmed() {
        let cmd = check("  clear bob ").unwrap();
        assert_eq!(cmd.as_str(), "clear bob");
        assert_eq!(cmd.verb(), "clear");
        assert_eq!(cmd.identifier(), "bob");
    }

    #[test]
    fn test_identifier_pattern_is_anchored() {
        assert!(is_identifier("alice"));
        assert!(is_identifier("10.0.0.7"));
        assert!(is_identifier("user_42"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("alice\n"));
        assert!(!is_identifier("x;alice"));
        assert!(!is_identifier("alice bob"));
    }

    #[test]
    fn test_empty_is_rejected() {
        assert_eq!(check(""), Err(Rejection::Empty));
    }

    proptest! {
        #[test]
        fn prop_validate_is_total_and_deterministic(input in "\\PC{0,80}") {
            prop_assert_eq!(validate(&input), validate(&input));
        }

        #[test]
        fn prop_accepts_exactly_the_grammar(
            verb in "[a-z]{1,8}",
            id in "[A-Za-z0-9_.]{1,30}",
        ) {
            let command = format!("{verb} {id}");
            let expected = ALLOWED_VERBS.contains(&verb.as_str()) && command.len() <= MAX_COMMAND_LENGTH;
            prop_assert_eq!(validate(&command), expected);
        }

        #[test]
        fn prop_accepted_commands_never_carry_shell_metacharacters(input in "\\PC{0,60}") {
            if let Ok(cmd) = check(&input) {
                prop_assert!(!cmd.as_str().contains(|c: char| ";|&$`<>\n\r\t".contains(c)));
            }
        }
    }
}
