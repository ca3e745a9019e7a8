//! Unit tests for calendar arithmetic and identity parsing
//!
//! Covers unit truncation, relative-duration application across month
//! boundaries, whole-year ages, and ID-card derived fields.

use chrono::{DateTime, TimeZone, Utc};
use core_kernel::temporal::{whole_days_between, whole_years_between};
use core_kernel::{parse_id_card, Gender, RelativeDuration, TimeUnit};

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

mod truncation {
    use super::*;

    #[test]
    fn day_granularity_yields_midnight() {
        let dt = at(2026, 7, 4, 18, 30, 59);
        assert_eq!(TimeUnit::Day.correct_to(dt), at(2026, 7, 4, 0, 0, 0));
    }

    #[test]
    fn second_granularity_is_identity() {
        let dt = at(2026, 7, 4, 18, 30, 59);
        assert_eq!(TimeUnit::Second.correct_to(dt), dt);
    }

    #[test]
    fn year_granularity_resets_month_and_day() {
        let dt = at(2026, 7, 4, 18, 30, 59);
        assert_eq!(TimeUnit::Year.correct_to(dt), at(2026, 1, 1, 0, 0, 0));
    }

    #[test]
    fn truncating_twice_equals_truncating_once() {
        let dt = at(2026, 12, 31, 23, 59, 59);
        let once = TimeUnit::Month.correct_to(dt);
        assert_eq!(TimeUnit::Month.correct_to(once), once);
    }
}

mod relative_durations {
    use super::*;

    #[test]
    fn thirty_days_after_crosses_month_boundary() {
        let base = at(2026, 1, 15, 12, 0, 0);
        let bound = RelativeDuration::after(30, TimeUnit::Day).apply(base);
        assert_eq!(bound, at(2026, 2, 14, 12, 0, 0));
    }

    #[test]
    fn one_year_after_lands_on_same_date() {
        let base = at(2026, 3, 10, 0, 0, 0);
        let bound = RelativeDuration::after(1, TimeUnit::Year).apply(base);
        assert_eq!(bound, at(2027, 3, 10, 0, 0, 0));
    }

    #[test]
    fn sixty_years_before_for_age_window() {
        let effective = at(2026, 5, 1, 0, 0, 0);
        let oldest = RelativeDuration::before(60, TimeUnit::Year).apply(effective);
        assert_eq!(oldest, at(1966, 5, 1, 0, 0, 0));
    }
}

mod ages {
    use super::*;

    #[test]
    fn age_increments_on_anniversary() {
        let birth = at(2000, 2, 29, 0, 0, 0);
        assert_eq!(whole_years_between(at(2026, 2, 28, 0, 0, 0), birth), 25);
        assert_eq!(whole_years_between(at(2026, 3, 1, 0, 0, 0), birth), 26);
    }

    #[test]
    fn day_distance_is_symmetric() {
        let a = at(2026, 1, 1, 0, 0, 0);
        let b = at(2026, 12, 31, 0, 0, 0);
        assert_eq!(whole_days_between(a, b), whole_days_between(b, a));
    }
}

mod id_cards {
    use super::*;

    #[test]
    fn birth_and_gender_round_trip() {
        let info = parse_id_card("440301197712014835");
        assert_eq!(info.gender, Gender::Man);
        assert_eq!(info.birth, Some(at(1977, 12, 1, 0, 0, 0)));
    }

    #[test]
    fn unrecognized_length_never_errors() {
        for id in ["", "1", "1234567890123456789012"] {
            let info = parse_id_card(id);
            assert_eq!(info.gender, Gender::Unknown);
            assert!(info.birth.is_none());
        }
    }
}
