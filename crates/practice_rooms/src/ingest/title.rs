//! Parsing of reservation post titles.
//!
//! Titles look like `20231234/홍길동/6.15/23-02`: student id, name,
//! `month.day`, then a two-digit start and end hour. Anything after the end
//! hour is ignored.

use super::error::IngestError;
use super::types::ParsedTitle;
use regex::Regex;
use std::sync::LazyLock;

static TITLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)/([^/]+)/(\d{1,2})\.(\d{1,2})/(\d{2})-(\d{2})").unwrap()
});

/// Parses a post title into its reservation fields.
///
/// Hours outside 0-23 are rejected along with anything that doesn't match
/// the grammar.
pub fn parse_title(title: &str) -> Result<ParsedTitle, IngestError> {
    let mismatch = || IngestError::TitleParseMismatch {
        title: title.to_string(),
    };

    let caps = TITLE_REGEX.captures(title).ok_or_else(mismatch)?;

    let month: u32 = caps[3].parse().map_err(|_| mismatch())?;
    let day: u32 = caps[4].parse().map_err(|_| mismatch())?;
    let start_hour: u8 = caps[5].parse().map_err(|_| mismatch())?;
    let end_hour: u8 = caps[6].parse().map_err(|_| mismatch())?;

    if start_hour > 23 || end_hour > 23 {
        return Err(mismatch());
    }

    Ok(ParsedTitle {
        student_id: caps[1].to_string(),
        student_name: caps[2].to_string(),
        month,
        day,
        start_hour,
        end_hour,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_midnight_title() {
        let parsed = parse_title("123/Jane Doe/6.15/23-02").unwrap();
        assert_eq!(parsed.student_id, "123");
        assert_eq!(parsed.student_name, "Jane Doe");
        assert_eq!((parsed.month, parsed.day), (6, 15));
        assert_eq!((parsed.start_hour, parsed.end_hour), (23, 2));
    }

    #[test]
    fn test_parse_single_digit_month_day() {
        let parsed = parse_title("45/Bob/3.2/10-12").unwrap();
        assert_eq!((parsed.month, parsed.day), (3, 2));
        assert_eq!((parsed.start_hour, parsed.end_hour), (10, 12));
    }

    #[test]
    fn test_trailing_text_is_ignored() {
        let parsed = parse_title("20231234/홍길동/12.31/09-11 (드럼 A)").unwrap();
        assert_eq!(parsed.student_name, "홍길동");
        assert_eq!((parsed.month, parsed.day), (12, 31));
    }

    #[test]
    fn test_mismatches() {
        for title in [
            "not a valid title",
            "",
            "abc/Bob/3.2/10-12",
            " 45/Bob/3.2/10-12",
            "45/Bob/3.2/1-12",
            "45/Bob/3/10-12",
            "45//3.2/10-12",
        ] {
            assert!(
                matches!(parse_title(title), Err(IngestError::TitleParseMismatch { .. })),
                "{title:?} should not parse"
            );
        }
    }

    #[test]
    fn test_rejects_out_of_range_hours() {
        assert!(parse_title("45/Bob/3.2/22-24").is_err());
        assert!(parse_title("45/Bob/3.2/25-02").is_err());
    }
}
