//! Phone number normalization
//!
//! Every phone number stored or compared by Fairway is in the canonical
//! North American E.164 form `+1XXXXXXXXXX`.

/// Normalize a user-supplied phone number to `+1XXXXXXXXXX`
///
/// Accepts any punctuation. Returns `None` unless exactly 10 digits remain,
/// or 11 digits with a leading country code of `1`.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.len() {
        10 => Some(format!("+1{}", digits)),
        11 if digits.starts_with('1') => Some(format!("+{}", digits)),
        _ => None,
    }
}

/// Format a canonical phone number for listings: `(555) 123-4567`
///
/// Anything that is not canonical is returned unchanged.
pub fn display_phone(canonical: &str) -> String {
    match canonical.strip_prefix("+1") {
        Some(rest) if rest.len() == 10 && rest.chars().all(|c| c.is_ascii_digit()) => {
            format!("({}) {}-{}", &rest[..3], &rest[3..6], &rest[6..])
        }
        _ => canonical.to_string(),
    }
}
