//! National ID parsing
//!
//! Mainland resident IDs encode birth date and gender. Both the 18-digit and
//! the legacy 15-digit formats are supported; anything else parses to
//! `unknown`. Parsing is total: malformed input never produces an error.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Man,
    Female,
    Other,
    Unknown,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Man => "man",
            Gender::Female => "female",
            Gender::Other => "other",
            Gender::Unknown => "unknown",
        }
    }
}

/// Fields derivable from an ID number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdCardInfo {
    pub gender: Gender,
    pub birth: Option<DateTime<Utc>>,
}

impl IdCardInfo {
    fn unknown() -> Self {
        Self { gender: Gender::Unknown, birth: None }
    }
}

/// Extracts gender and birth date from an ID number.
///
/// 18-digit IDs carry the birth date at positions 7..=14 (`YYYYMMDD`) and the
/// gender digit at position 17 (odd is man, even is female). 15-digit IDs
/// carry a two-digit year at positions 7..=12, interpreted as 19xx, with the
/// gender digit last. Any other length yields `unknown` with no birth date.
pub fn parse_id_card(id_no: &str) -> IdCardInfo {
    let chars: Vec<char> = id_no.chars().collect();
    let (birth_str, gender_idx) = match chars.len() {
        18 => (chars[6..14].iter().collect::<String>(), 16),
        15 => (format!("19{}", chars[6..12].iter().collect::<String>()), 14),
        _ => return IdCardInfo::unknown(),
    };

    let gender = match chars[gender_idx].to_digit(10) {
        Some(d) if d % 2 == 1 => Gender::Man,
        Some(_) => Gender::Female,
        None => Gender::Unknown,
    };

    let birth = NaiveDate::parse_from_str(&birth_str, "%Y%m%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc());

    IdCardInfo { gender, birth }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_18_digit_id() {
        let info = parse_id_card("110101199006154213");
        assert_eq!(info.gender, Gender::Man);
        assert_eq!(
            info.birth,
            Some(Utc.with_ymd_and_hms(1990, 6, 15, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn parses_18_digit_even_gender_digit_as_female() {
        let info = parse_id_card("110101198512304528");
        assert_eq!(info.gender, Gender::Female);
        assert_eq!(
            info.birth,
            Some(Utc.with_ymd_and_hms(1985, 12, 30, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn parses_15_digit_id_with_19xx_year() {
        let info = parse_id_card("110101900615421");
        assert_eq!(info.gender, Gender::Man);
        assert_eq!(
            info.birth,
            Some(Utc.with_ymd_and_hms(1990, 6, 15, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn wrong_length_yields_unknown() {
        let info = parse_id_card("12345");
        assert_eq!(info.gender, Gender::Unknown);
        assert_eq!(info.birth, None);
        assert_eq!(parse_id_card("").gender, Gender::Unknown);
    }

    #[test]
    fn garbage_birth_digits_yield_no_birth() {
        let info = parse_id_card("110101XXXXXXXX4213");
        assert_eq!(info.gender, Gender::Man);
        assert_eq!(info.birth, None);
    }
}
