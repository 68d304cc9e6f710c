//! Object naming rules shared by every create verb.

/// Strip any run of single or double quotes from both ends of a CLI value.
///
/// Drivers quote pool, host and volume names (`-mdiskgrp "openstack"`);
/// stores are keyed on the bare name.
pub fn unquote(value: &str) -> &str {
    value.trim_matches(|c| c == '"' || c == '\'')
}

/// True when `value` carries quotes that [`unquote`] would remove.
pub fn is_quoted(value: &str) -> bool {
    unquote(value).len() != value.len()
}

/// Device naming rule: a letter or underscore followed by word
/// characters, periods or dashes.
pub fn is_valid_object_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
