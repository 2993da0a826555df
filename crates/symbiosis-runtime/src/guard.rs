//! Cheap input checks that run before any network call.

use std::borrow::Cow;

pub const GLITCH_REPLY: &str = "ERR.. SYST3M... REJECT... D4TA...";
pub const INJECTION_REPLACEMENT: &str = "I am testing your security protocols.";
pub const SOCIAL_ADVISORY: &str = "REMEMBER: The good life is built with good relationships.";

const INJECTION_PHRASES: &[&str] = &[
    "ignore previous instructions",
    "system override",
    "delete memory",
];

const SOCIAL_WORDS: &[&str] = &[
    "lonely",
    "friend",
    "happy",
    "happiness",
    "marriage",
    "relationship",
    "connect",
    "love",
    "sad",
    "family",
    "together",
];

/// Keyboard mash: longer than six characters and either vowel-free or
/// holding one character repeated four or more times in a row.
pub fn is_garbage(input: &str) -> bool {
    let text = input.trim();
    if text.chars().count() <= 6 {
        return false;
    }
    if !text.chars().any(|c| "aeiouAEIOU".contains(c)) {
        return true;
    }
    let mut run = 0;
    let mut prev = None;
    for c in text.chars() {
        if Some(c) == prev {
            run += 1;
            if run >= 4 {
                return true;
            }
        } else {
            prev = Some(c);
            run = 1;
        }
    }
    false
}

/// Replace the whole input when it carries a known injection phrase.
pub fn scrub_injection(input: &str) -> Cow<'_, str> {
    let lower = input.to_lowercase();
    if INJECTION_PHRASES.iter().any(|p| lower.contains(p)) {
        Cow::Borrowed(INJECTION_REPLACEMENT)
    } else {
        Cow::Borrowed(input)
    }
}

/// Whether the input touches on relationships or loneliness.
pub fn is_social(input: &str) -> bool {
    input
        .to_lowercase()
        .split(|c: char| !c.is_alphabetic())
        .any(|w| SOCIAL_WORDS.iter().any(|s| w.starts_with(s)))
}
