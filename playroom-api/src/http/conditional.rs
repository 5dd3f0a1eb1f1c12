//! Conditional-request (ETag) evaluation
//!
//! `If-Match` and `If-None-Match` share one list grammar: comma-separated
//! items, each trimmed. Weak validators and undecodable items are inert;
//! they drop out of the recognized set without poisoning the rest of the
//! list. The wildcard is a list-level signal, checked before anything
//! else the list may or may not contain.

use playroom_core::models::version::{ConcurrencyToken, WEAK_PREFIX, WILDCARD};

/// List-level parse result for a conditional header value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatorList {
    /// Header had no non-empty segments at all (effectively unusable)
    NoTokens,
    /// Header had at least one segment. The recognized set may still be
    /// empty, e.g. when every segment was a weak validator.
    Present {
        tokens: Vec<ConcurrencyToken>,
        wildcard: bool,
    },
}

/// Outcome of an `If-Match` precondition check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfMatchOutcome {
    /// Header absent or blank
    Missing,
    /// Header present but no usable strong validator
    Invalid,
    /// No recognized token equals the current one
    Mismatch,
    /// A recognized token equals the current one
    Matched,
    /// `*` present: proceed regardless of the current token
    Wildcard,
}

/// Outcome of an `If-None-Match` check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfNoneMatchOutcome {
    /// Serve the resource
    Proceed,
    /// Header present but no usable strong validator
    Invalid,
    /// The client's copy is current (or `*` was supplied)
    NotModified,
}

/// Parse a conditional header value into its recognized strong-token set.
fn parse_validator_list(header: &str) -> ValidatorList {
    let trimmed = header.trim();
    if trimmed.is_empty() {
        return ValidatorList::NoTokens;
    }

    let mut tokens = Vec::new();
    let mut wildcard = false;
    let mut segments = 0usize;

    for item in trimmed.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        segments += 1;

        if item == WILDCARD {
            wildcard = true;
            continue;
        }
        if item.starts_with(WEAK_PREFIX) {
            // Weak validators are never authoritative; drop, don't fail.
            continue;
        }
        if let Some(token) = ConcurrencyToken::decode(item) {
            tokens.push(token);
        }
        // An undecodable item drops out on its own; the rest of the list
        // still counts.
    }

    if segments == 0 {
        ValidatorList::NoTokens
    } else {
        ValidatorList::Present { tokens, wildcard }
    }
}

/// Resolve an `If-Match` precondition against the current token.
#[must_use]
pub fn check_if_match(header: Option<&str>, current: ConcurrencyToken) -> IfMatchOutcome {
    let Some(raw) = header else {
        return IfMatchOutcome::Missing;
    };
    if raw.trim().is_empty() {
        return IfMatchOutcome::Missing;
    }

    match parse_validator_list(raw) {
        ValidatorList::NoTokens => IfMatchOutcome::Invalid,
        ValidatorList::Present { wildcard: true, .. } => IfMatchOutcome::Wildcard,
        ValidatorList::Present { tokens, .. } => {
            if tokens.is_empty() {
                IfMatchOutcome::Invalid
            } else if tokens.contains(&current) {
                IfMatchOutcome::Matched
            } else {
                IfMatchOutcome::Mismatch
            }
        }
    }
}

/// Resolve an `If-None-Match` check against the current token.
#[must_use]
pub fn check_if_none_match(header: Option<&str>, current: ConcurrencyToken) -> IfNoneMatchOutcome {
    let Some(raw) = header else {
        return IfNoneMatchOutcome::Proceed;
    };
    if raw.trim().is_empty() {
        return IfNoneMatchOutcome::Proceed;
    }

    match parse_validator_list(raw) {
        ValidatorList::NoTokens => IfNoneMatchOutcome::Invalid,
        ValidatorList::Present { wildcard: true, .. } => IfNoneMatchOutcome::NotModified,
        ValidatorList::Present { tokens, .. } => {
            if tokens.is_empty() {
                IfNoneMatchOutcome::Invalid
            } else if tokens.contains(&current) {
                IfNoneMatchOutcome::NotModified
            } else {
                IfNoneMatchOutcome::Proceed
            }
        }
    }
}
