//! Line classification for safe shell scripts.
//!
//! Scripts are line oriented: every line after the header is exactly one of
//! the kinds in [`Line`]. Classification never fails; deciding whether an
//! assignment name or a command name is acceptable is the parser's job.

/// The kind of a single script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    /// Empty, or only whitespace.
    Blank,
    /// First character is `#`.
    Comment,
    /// Starts with a space or tab. Such lines are inert.
    Disabled,
    /// `NAME=value`. `name` is only guaranteed to be alphanumeric/underscore.
    Assignment { name: &'a str, value: &'a str },
    /// `name arg1 arg2 ...`, split on whitespace. Arguments are still raw.
    Invocation { name: &'a str, args: Vec<&'a str> },
}

/// Classify one line of a script (not the header).
pub fn classify(raw: &str) -> Line<'_> {
    if raw.starts_with([' ', '\t']) {
        return if raw.trim().is_empty() {
            Line::Blank
        } else {
            Line::Disabled
        };
    }

    let line = raw.trim_end();
    if line.is_empty() {
        return Line::Blank;
    }
    if line.starts_with('#') {
        return Line::Comment;
    }

    if let Some((name, value)) = split_assignment(line) {
        return Line::Assignment { name, value };
    }

    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some(name) => Line::Invocation {
            name,
            args: tokens.collect(),
        },
        None => Line::Blank,
    }
}

/// Split `NAME=value` when the text before the first `=` is a non-empty run of
/// alphanumerics/underscores and `=` is not followed by whitespace.
fn split_assignment(line: &str) -> Option<(&str, &str)> {
    let eq = line.find('=')?;
    let (name, rest) = line.split_at(eq);
    let value = &rest[1..];

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    if value.starts_with(char::is_whitespace) {
        return None;
    }
    Some((name, value))
}
