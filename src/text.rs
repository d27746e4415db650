//! Display-name and request text helpers.

use url::{ParseError, Url};

/// Returns the first value that is not blank, trimmed
pub fn first_non_empty<'a, I>(values: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    values
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Picks the display name to store for a user
///
/// The preferred name wins, then the name already on record, then a name
/// derived from the email address.
pub fn resolve_display_name(
    preferred_display_name: Option<&str>,
    existing_display_name: Option<&str>,
    email: &str,
) -> String {
    let preferred = normalize_display_name(preferred_display_name);
    if !preferred.is_empty() {
        return preferred;
    }

    let existing = normalize_display_name(existing_display_name);
    if !existing.is_empty() {
        return existing;
    }

    display_name_from_email(email)
}

/// Derives a readable name from the local part of an email address
pub fn display_name_from_email(email: &str) -> String {
    if email.trim().is_empty() {
        return "User".to_string();
    }

    let local_part = match email.find('@') {
        Some(at) if at > 0 => &email[..at],
        _ => email,
    };
    let spaced: String = local_part
        .chars()
        .map(|c| if matches!(c, '.' | '_' | '-') { ' ' } else { c })
        .collect();
    let tokens: Vec<&str> = spaced.split_whitespace().collect();

    if tokens.is_empty() {
        return "User".to_string();
    }

    normalize_display_name(Some(&tokens.join(" ")))
}

/// Trims, collapses spaces and name-cases every word
pub fn normalize_display_name(value: Option<&str>) -> String {
    let Some(value) = value else {
        return String::new();
    };

    value
        .split_whitespace()
        .map(to_name_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn to_name_case(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first
            .to_uppercase()
            .chain(chars.as_str().to_lowercase().chars())
            .collect(),
    }
}

/// Masks an email for logging: `jane@example.com` becomes `j***@example.com`
pub fn mask_email(email: &str) -> String {
    if email.trim().is_empty() {
        return "(empty)".to_string();
    }

    let at_char = email.chars().position(|c| c == '@');
    match (at_char, email.find('@'), email.chars().next()) {
        (Some(at), Some(at_byte), Some(first)) if at > 1 => {
            format!("{first}***{}", &email[at_byte..])
        }
        _ => "***".to_string(),
    }
}

/// Only relative return urls are honoured; anything else goes home
pub fn sanitize_return_url(return_url: Option<&str>) -> String {
    let Some(value) = return_url.map(str::trim).filter(|v| !v.is_empty()) else {
        return "/".to_string();
    };

    if value.starts_with("//") || value.starts_with("\\\\") || value.starts_with("/\\") {
        return "/".to_string();
    }

    match Url::parse(value) {
        Err(ParseError::RelativeUrlWithoutBase) => value.to_string(),
        _ => "/".to_string(),
    }
}

/// Lowercase ascii slug joined by single hyphens
pub fn slugify(value: &str) -> String {
    value
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}
