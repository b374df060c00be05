//! Heuristic parsing of a result card's visible text.
//!
//! Cards render as loose lines: title, company, location, then assorted
//! badges ("Promoted", "3 days ago", ...). Parsing is table-driven: badge
//! lines are dropped first, then the remaining lines are matched in order
//! against [`FIELD_RULES`].

use thiserror::Error;

/// Substrings marking a line as a badge rather than data.
pub const BADGE_MARKERS: &[&str] = &[
    "Easy Apply",
    "Promoted",
    "Actively recruiting",
    "Be an early applicant",
    "1 week ago",
    "2 weeks ago",
    "days ago",
    "hours ago",
];

/// Marker of a card that applies through the site's own flow.
pub const EASY_APPLY_MARKER: &str = "Easy Apply";

/// Suffixes cut from the company line.
const COMPANY_SUFFIXES: &[&str] = &[" with verification"];

/// Substrings meaning a line is a relative time or apply status, not a place.
const NOT_A_LOCATION: &[&str] = &["ago", "Apply"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardField {
    Title,
    Company,
    Location,
}

/// One positional rule: the field the next clean line fills, whether the
/// line is acceptable for it, and how it is cleaned.
pub struct FieldRule {
    pub field: CardField,
    pub accepts: fn(&str) -> bool,
    pub clean: fn(&str) -> String,
}

pub const FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        field: CardField::Title,
        accepts: any_line,
        clean: keep,
    },
    FieldRule {
        field: CardField::Company,
        accepts: any_line,
        clean: strip_company_suffixes,
    },
    FieldRule {
        field: CardField::Location,
        accepts: looks_like_location,
        clean: keep,
    },
];

fn any_line(_: &str) -> bool {
    true
}

fn keep(line: &str) -> String {
    line.trim().to_string()
}

fn strip_company_suffixes(line: &str) -> String {
    let mut company = line;
    for suffix in COMPANY_SUFFIXES {
        if let Some(idx) = company.find(suffix) {
            company = &company[..idx];
        }
    }
    company.replace('\n', " ").trim().to_string()
}

fn looks_like_location(line: &str) -> bool {
    !NOT_A_LOCATION.iter().any(|marker| line.contains(marker))
}

/// Fields recovered from a card's text. `location` is `None` when the card
/// did not yield one and the search term must stand in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialPosting {
    pub title: String,
    pub company: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardError {
    #[error("card has no text lines besides badges")]
    NoTitle,
}

pub fn is_badge(line: &str) -> bool {
    BADGE_MARKERS.iter().any(|marker| line.contains(marker))
}

pub fn is_easy_apply<S: AsRef<str>>(lines: &[S]) -> bool {
    lines.iter().any(|l| l.as_ref().contains(EASY_APPLY_MARKER))
}

/// Splits raw element text into trimmed, non-empty lines.
pub fn card_lines(text: &str) -> Vec<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
}

pub fn parse_card<S: AsRef<str>>(lines: &[S]) -> Result<PartialPosting, CardError> {
    let clean: Vec<&str> = lines
        .iter()
        .map(|l| l.as_ref().trim())
        .filter(|l| !l.is_empty() && !is_badge(l))
        .collect();

    let mut title = None;
    let mut company = None;
    let mut location = None;
    for (rule, line) in FIELD_RULES.iter().zip(clean.iter()) {
        if !(rule.accepts)(line) {
            continue;
        }
        let value = (rule.clean)(line);
        match rule.field {
            CardField::Title => title = Some(value),
            CardField::Company => company = Some(value),
            CardField::Location => location = Some(value),
        }
    }

    let title = title.ok_or(CardError::NoTitle)?;
    Ok(PartialPosting {
        title,
        company: company
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "Unknown".to_string()),
        location,
    })
}
