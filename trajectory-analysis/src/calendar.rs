//! Epoch-second to calendar-bucket conversion, shared by trip
//! construction's `date_bucket` column and the bucketed-statistic
//! family's year/month/day buckets (spec.md §4.5.5, §4.5.7).

use time::OffsetDateTime;

fn at(ts: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(ts).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

/// `YYYY-MM-DD`, used as the `trips.date_bucket` column and the `day`
/// bucket key.
pub fn day_bucket(ts: i64) -> String {
    let d = at(ts);
    format!("{:04}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day())
}

/// `YYYY-MM`.
pub fn month_bucket(ts: i64) -> String {
    let d = at(ts);
    format!("{:04}-{:02}", d.year(), u8::from(d.month()))
}

/// `YYYY`.
pub fn year_bucket(ts: i64) -> String {
    at(ts).year().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_bucket_formats_as_iso_date() {
        // 2021-06-15T00:00:00Z
        assert_eq!(day_bucket(1623715200), "2021-06-15");
    }

    #[test]
    fn month_and_year_buckets_truncate() {
        assert_eq!(month_bucket(1623715200), "2021-06");
        assert_eq!(year_bucket(1623715200), "2021");
    }
}
