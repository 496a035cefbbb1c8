//! Release name rules.

/// Longest accepted release name. Leaves room for suffixes on generated resource names.
pub const MAX_RELEASE_NAME_LEN: usize = 53;

/// Check that `name` is a lowercase DNS-style label of at most 53 characters.
pub fn validate_release_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("release name must not be empty".to_string());
    }
    if name.len() > MAX_RELEASE_NAME_LEN {
        return Err(format!(
            "release name {name:?} exceeds max length of {MAX_RELEASE_NAME_LEN}"
        ));
    }

    let valid_char = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.';
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    let starts_ok = name.chars().next().is_some_and(alnum);
    let ends_ok = name.chars().last().is_some_and(alnum);

    if !name.chars().all(valid_char) || !starts_ok || !ends_ok {
        return Err(format!(
            "invalid release name {name:?}: must consist of lower case alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character"
        ));
    }
    Ok(())
}
