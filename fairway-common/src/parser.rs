//! Inbound text parsing
//!
//! Pure functions, no I/O. Three grammars are recognized:
//!
//! - **Announcement** from the manager: `Golf M-D-YYYY` / course / tee times
//! - **Reply** from a golfer: IN (optionally with guests) or OUT
//! - **Manager command**: STATUS, CLOSED, LIST, ADD, HELP
//!
//! A failed parse is `None`, never an error. Callers turn it into a prompt.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static ANNOUNCE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^golf\s+(\d{1,2})-(\d{1,2})-(\d{4})$").unwrap());

static ADD_COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^add\s+(.*?[^\d\s().+-])\s+([+(]?\d[\d\s().+-]*)$").unwrap()
});

/// Most guests one golfer may bring
pub const MAX_GUESTS: u32 = 3;

/// Affirmative phrases, longest first so `i'm in` wins over `in`
const AFFIRMATIVE: &[&str] = &[
    "count me in",
    "i am in",
    "i'm in",
    "im in",
    "yes",
    "in",
    "y",
];

const NEGATIVE: &[&str] = &[
    "can't make it",
    "cant make it",
    "count me out",
    "i am out",
    "i'm out",
    "im out",
    "out",
    "no",
    "n",
];

/// A parsed tee-time announcement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub date: NaiveDate,
    pub course: String,
    /// Display strings such as `8:08 AM`, in announcement order
    pub tee_times: Vec<String>,
    /// Free text after the times line (e.g. "In or out")
    pub note: Option<String>,
}

/// A parsed golfer reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Reply {
    In { guests: u32 },
    Out,
}

/// A parsed text from a manager number
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerCommand {
    Announce(Announcement),
    Status,
    Close,
    List,
    Add { name: String, phone: String },
    Help,
    Unrecognized,
}

/// Parse a manager announcement
///
/// Needs at least three non-blank lines: `golf <M-D-YYYY>`, the course
/// name, and `/`-delimited time tokens. Returns `None` on a malformed date
/// or when no time token is valid.
pub fn parse_announcement(text: &str) -> Option<Announcement> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if lines.len() < 3 {
        return None;
    }

    let caps = ANNOUNCE_DATE.captures(lines[0])?;
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let tee_times = parse_tee_times(lines[2]);
    if tee_times.is_empty() {
        return None;
    }

    let note = if lines.len() > 3 {
        Some(lines[3..].join("\n"))
    } else {
        None
    };

    Some(Announcement {
        date,
        course: lines[1].to_string(),
        tee_times,
        note,
    })
}

/// Convert a `/`-delimited raw time string (`808/1015`) to display strings
///
/// Invalid tokens are skipped.
pub fn parse_tee_times(raw: &str) -> Vec<String> {
    raw.split('/').filter_map(parse_tee_time).collect()
}

/// Convert one raw time token to `H:MM AM/PM`
///
/// 3 digits are `HMM`, 4 digits are `HHMM`. Hours 12-23 are PM, hour 0 is
/// shown as 12 AM.
pub fn parse_tee_time(token: &str) -> Option<String> {
    let token = token.trim();
    if !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let (hour, minute): (u32, u32) = match token.len() {
        3 => (token[..1].parse().ok()?, token[1..].parse().ok()?),
        4 => (token[..2].parse().ok()?, token[2..].parse().ok()?),
        _ => return None,
    };

    if hour > 23 || minute > 59 {
        return None;
    }

    let suffix = if hour >= 12 { "PM" } else { "AM" };
    let display_hour = match hour {
        0 => 12,
        h if h > 12 => h - 12,
        h => h,
    };

    Some(format!("{}:{:02} {}", display_hour, minute, suffix))
}

/// Parse a golfer's IN/OUT reply
pub fn parse_reply(text: &str) -> Option<Reply> {
    let text = normalize_reply(text);

    if NEGATIVE.contains(&text.as_str()) {
        return Some(Reply::Out);
    }

    for phrase in AFFIRMATIVE {
        if text == *phrase {
            return Some(Reply::In { guests: 0 });
        }
        if let Some(rest) = text.strip_prefix(phrase) {
            if rest.starts_with(' ') || rest.starts_with('+') {
                return parse_guest_suffix(rest.trim()).map(|guests| Reply::In { guests });
            }
        }
    }

    None
}

/// Lowercase, collapse whitespace, straighten apostrophes, drop trailing
/// punctuation
fn normalize_reply(text: &str) -> String {
    let lowered = text.trim().to_lowercase().replace(['\u{2019}', '\u{2018}'], "'");
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(|c| matches!(c, '.' | '!' | ','))
        .trim_end()
        .to_string()
}

/// Guest quantifier after an affirmative phrase
///
/// `+2`, `+ 2`, `plus 2`, `plus guest`, `plus a guest`, `two`, `a guest`,
/// `one`, each optionally followed by `guest`/`guests`. Digits need `+` or
/// `plus`; counts above [`MAX_GUESTS`] are rejected.
fn parse_guest_suffix(suffix: &str) -> Option<u32> {
    let (explicit, rest) = if let Some(rest) = suffix.strip_prefix('+') {
        (true, rest.trim_start())
    } else if let Some(rest) = suffix.strip_prefix("plus ") {
        (true, rest.trim_start())
    } else {
        (false, suffix)
    };

    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let (count, used) = match tokens.first().copied() {
        Some("guest") if explicit => (1, 1),
        Some(word) => (quantity(word, explicit)?, 1),
        None => return None,
    };

    if count > MAX_GUESTS {
        return None;
    }

    match &tokens[used..] {
        [] => Some(count),
        ["guest"] | ["guests"] if used == 1 && tokens[0] != "guest" => Some(count),
        _ => None,
    }
}

fn quantity(word: &str, explicit: bool) -> Option<u32> {
    match word {
        "a" | "an" | "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        digits if explicit && !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
            digits.parse().ok()
        }
        _ => None,
    }
}

/// Classify a text sent from a manager number
pub fn parse_manager_command(text: &str) -> ManagerCommand {
    let trimmed = text.trim();

    if let Some(announcement) = parse_announcement(trimmed) {
        return ManagerCommand::Announce(announcement);
    }

    match trimmed.to_uppercase().as_str() {
        "STATUS" => return ManagerCommand::Status,
        "CLOSED" | "CLOSE" => return ManagerCommand::Close,
        "LIST" => return ManagerCommand::List,
        "HELP" | "?" => return ManagerCommand::Help,
        _ => {}
    }

    if let Some(caps) = ADD_COMMAND.captures(trimmed) {
        return ManagerCommand::Add {
            name: caps[1].trim().to_string(),
            phone: caps[2].trim().to_string(),
        };
    }

    ManagerCommand::Unrecognized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_announcement_example() {
        let parsed = parse_announcement("Golf 11-30-2025\nRed\n808/1015\nIn or out").unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2025, 11, 30).unwrap());
        assert_eq!(parsed.course, "Red");
        assert_eq!(parsed.tee_times, vec!["8:08 AM", "10:15 AM"]);
        assert_eq!(parsed.note.as_deref(), Some("In or out"));
    }

    #[test]
    fn test_announcement_ignores_blank_lines_and_case() {
        let parsed = parse_announcement("  GOLF 4-5-2026 \n\n Blue Course \n1230/1300/002\n").unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2026, 4, 5).unwrap());
        assert_eq!(parsed.course, "Blue Course");
        assert_eq!(parsed.tee_times, vec!["12:30 PM", "1:00 PM", "12:02 AM"]);
        assert_eq!(parsed.note, None);
    }

    #[test]
    fn test_announcement_failures() {
        // too few lines
        assert_eq!(parse_announcement("Golf 11-30-2025\nRed"), None);
        // impossible calendar date
        assert_eq!(parse_announcement("Golf 2-30-2025\nRed\n808"), None);
        // wrong keyword
        assert_eq!(parse_announcement("Tennis 11-30-2025\nRed\n808"), None);
        // no valid times
        assert_eq!(parse_announcement("Golf 11-30-2025\nRed\nearly/late"), None);
    }

    #[test]
    fn test_tee_time_tokens() {
        assert_eq!(parse_tee_time("808").as_deref(), Some("8:08 AM"));
        assert_eq!(parse_tee_time("1015").as_deref(), Some("10:15 AM"));
        assert_eq!(parse_tee_time("1200").as_deref(), Some("12:00 PM"));
        assert_eq!(parse_tee_time("1345").as_deref(), Some("1:45 PM"));
        assert_eq!(parse_tee_time("0005").as_deref(), Some("12:05 AM"));
        assert_eq!(parse_tee_time("2460"), None);
        assert_eq!(parse_tee_time("860"), None);
        assert_eq!(parse_tee_time("80"), None);
        assert_eq!(parse_tee_time("8:08"), None);
        assert_eq!(parse_tee_times("808/x/1015/"), vec!["8:08 AM", "10:15 AM"]);
    }

    #[test]
    fn test_affirmative_replies() {
        for text in ["in", "IN", "I'm in", "im in", "Yes!", "y", "count me in", "I am in.", "i\u{2019}m in"] {
            assert_eq!(parse_reply(text), Some(Reply::In { guests: 0 }), "{}", text);
        }
    }

    #[test]
    fn test_guest_quantifiers() {
        let cases = [
            ("in +2", 2),
            ("in+1", 1),
            ("in + 3", 3),
            ("in plus 2", 2),
            ("in plus guest", 1),
            ("in plus a guest", 1),
            ("yes two", 2),
            ("in three guests", 3),
            ("in a guest", 1),
            ("I'm in plus one", 1),
            ("count me in +1", 1),
        ];
        for (text, guests) in cases {
            assert_eq!(parse_reply(text), Some(Reply::In { guests }), "{}", text);
        }
    }

    #[test]
    fn test_guest_count_limits() {
        assert_eq!(parse_reply("in +3"), Some(Reply::In { guests: MAX_GUESTS }));
        for text in ["in +4", "in plus 10", "in +4294967295", "in +99999999999", "in 500", "yes 2"] {
            assert_eq!(parse_reply(text), None, "{}", text);
        }
    }

    #[test]
    fn test_negative_replies() {
        for text in ["out", "OUT", "i'm out", "im out", "no", "n", "count me out", "I am out", "can't make it", "Cant make it!"] {
            assert_eq!(parse_reply(text), Some(Reply::Out), "{}", text);
        }
    }

    #[test]
    fn test_unrecognized_replies() {
        for text in ["banana", "inn", "yes please maybe", "in +", "in plus", "maybe", ""] {
            assert_eq!(parse_reply(text), None, "{}", text);
        }
    }

    #[test]
    fn test_manager_commands() {
        assert_eq!(parse_manager_command("status"), ManagerCommand::Status);
        assert_eq!(parse_manager_command("CLOSED"), ManagerCommand::Close);
        assert_eq!(parse_manager_command("List "), ManagerCommand::List);
        assert_eq!(parse_manager_command("help"), ManagerCommand::Help);
        assert_eq!(
            parse_manager_command("ADD Jim Smith (555) 123-4567"),
            ManagerCommand::Add {
                name: "Jim Smith".to_string(),
                phone: "(555) 123-4567".to_string(),
            }
        );
        assert_eq!(
            parse_manager_command("add Bo 15551234567"),
            ManagerCommand::Add {
                name: "Bo".to_string(),
                phone: "15551234567".to_string(),
            }
        );
        assert_eq!(parse_manager_command("add 5551234567"), ManagerCommand::Unrecognized);
        assert_eq!(parse_manager_command("hello there"), ManagerCommand::Unrecognized);
        assert!(matches!(
            parse_manager_command("Golf 11-30-2025\nRed\n808/1015"),
            ManagerCommand::Announce(_)
        ));
    }
}
