use chrono::{Months, NaiveDate};
use rand::Rng;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

const HISTORICAL_EARLIEST: (i32, u32, u32) = (1950, 1, 1);
const HISTORICAL_YEARS_BACK: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateChoice {
    Latest,
    Explicit(NaiveDate),
    RandomNineties,
    RandomHistorical,
}

impl DateChoice {
    /// Resolves the choice to a concrete chart date. `Latest` stays `None` so the
    /// fetcher asks for the current chart.
    pub fn resolve(self, today: NaiveDate, rng: &mut impl Rng) -> Option<NaiveDate> {
        match self {
            Self::Latest => None,
            Self::Explicit(date) => Some(date),
            Self::RandomNineties => Some(random_nineties_date(rng)),
            Self::RandomHistorical => Some(random_historical_date(today, rng)),
        }
    }

    pub const fn is_random(self) -> bool {
        matches!(self, Self::RandomNineties | Self::RandomHistorical)
    }
}

/// Uniform draw over the inclusive day range `[start, end]`.
pub fn random_date_between(start: NaiveDate, end: NaiveDate, rng: &mut impl Rng) -> NaiveDate {
    let (start, end) = if start <= end {
        (start, end)
    } else {
        (end, start)
    };
    let span = (end - start).num_days();
    let offset = rng.random_range(0..=span);
    start + chrono::Duration::days(offset)
}

pub fn random_nineties_date(rng: &mut impl Rng) -> NaiveDate {
    random_date_between(ymd(1990, 1, 1), ymd(1999, 12, 31), rng)
}

pub fn random_historical_date(today: NaiveDate, rng: &mut impl Rng) -> NaiveDate {
    let (year, month, day) = HISTORICAL_EARLIEST;
    let earliest = ymd(year, month, day);
    let latest = today
        .checked_sub_months(Months::new(12 * HISTORICAL_YEARS_BACK))
        .unwrap_or(earliest);
    random_date_between(earliest, latest, rng)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|err| format!("expected a date in YYYY-MM-DD format ({err})"))
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn nineties_dates_stay_in_the_decade() {
        let mut rng = StdRng::seed_from_u64(90);
        let first = ymd(1990, 1, 1);
        let last = ymd(1999, 12, 31);
        for _ in 0..2_000 {
            let date = random_nineties_date(&mut rng);
            assert!(date >= first && date <= last, "{date} outside the 90s");
            let formatted = format_date(date);
            assert_eq!(formatted.len(), 10);
            assert!(formatted.starts_with("199"));
            assert_eq!(parse_date(&formatted), Ok(date));
        }
    }

    #[test]
    fn historical_dates_end_five_years_before_today() {
        let mut rng = StdRng::seed_from_u64(7);
        let today = ymd(2026, 10, 18);
        let latest = ymd(2021, 10, 18);
        for _ in 0..2_000 {
            let date = random_historical_date(today, &mut rng);
            assert!(date >= ymd(1950, 1, 1));
            assert!(date <= latest, "{date} is newer than {latest}");
        }
    }

    #[test]
    fn historical_range_clamps_leap_day() {
        let mut rng = StdRng::seed_from_u64(29);
        let today = ymd(2024, 2, 29);
        for _ in 0..500 {
            assert!(random_historical_date(today, &mut rng) <= ymd(2019, 2, 28));
        }
    }

    #[test]
    fn single_day_range_returns_that_day() {
        let mut rng = StdRng::seed_from_u64(1);
        let day = ymd(1995, 6, 15);
        assert_eq!(random_date_between(day, day, &mut rng), day);
    }

    #[test]
    fn latest_resolves_to_no_date() {
        let mut rng = StdRng::seed_from_u64(3);
        let today = ymd(2026, 10, 18);
        assert_eq!(DateChoice::Latest.resolve(today, &mut rng), None);
        let explicit = ymd(2001, 9, 8);
        assert_eq!(
            DateChoice::Explicit(explicit).resolve(today, &mut rng),
            Some(explicit)
        );
    }

    #[test]
    fn parse_date_rejects_other_formats() {
        assert!(parse_date("08/09/2001").is_err());
        assert!(parse_date("2001-13-01").is_err());
        assert_eq!(parse_date(" 2001-09-08 "), Ok(ymd(2001, 9, 8)));
    }
}
