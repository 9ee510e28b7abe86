use chrono::TimeDelta;

/// Formats a number of seconds as `H:MM:SS.ffffff`, rounded to the microsecond.
///
/// Hours are not folded into days, so a long running function reads `27:03:00.000000`.
pub fn format_seconds(seconds: f64) -> String {
    let delta = TimeDelta::microseconds((seconds * 1_000_000.0).round() as i64);
    let sign = if delta < TimeDelta::zero() { "-" } else { "" };
    let delta = delta.abs();
    format!(
        "{sign}{}:{:02}:{:02}.{:06}",
        delta.num_hours(),
        delta.num_minutes() % 60,
        delta.num_seconds() % 60,
        delta.subsec_nanos() / 1_000
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_fractions() {
        assert_eq!(format_seconds(0.0), "0:00:00.000000");
        assert_eq!(format_seconds(1.0 / 3.0), "0:00:00.333333");
        assert_eq!(format_seconds(5.0 / 3.0), "0:00:01.666667");
        assert_eq!(format_seconds(3.0), "0:00:03.000000");
    }

    #[test]
    fn formats_hours() {
        assert_eq!(format_seconds(3725.5), "1:02:05.500000");
        assert_eq!(format_seconds(27.0 * 3600.0 + 180.0), "27:03:00.000000");
    }

    #[test]
    fn keeps_sign() {
        assert_eq!(format_seconds(-1.5), "-0:00:01.500000");
    }
}
