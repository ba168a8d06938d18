use chrono::{DateTime, FixedOffset};

/// 署名時刻の表示文字列を返す。
///
/// 例: `Signed on: March 5, 2024, 02:07:09 PM, GMT+9`
pub fn format_signed_on(signed_at: &DateTime<FixedOffset>) -> String {
    format!(
        "Signed on: {}, {}, {}",
        signed_at.format("%B %-d, %Y"),
        signed_at.format("%I:%M:%S %p"),
        zone_label(signed_at.offset()),
    )
}

/// UTCオフセットの短い表記。0なら `UTC`、それ以外は `GMT+H` / `GMT-H:MM`。
fn zone_label(offset: &FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    if seconds == 0 {
        return "UTC".to_string();
    }
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.unsigned_abs() / 60;
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if minutes == 0 {
        format!("GMT{sign}{hours}")
    } else {
        format!("GMT{sign}{hours}:{minutes:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).expect("valid RFC 3339")
    }

    #[test]
    fn test_format_utc() {
        assert_eq!(
            format_signed_on(&parse("2024-03-05T14:07:09Z")),
            "Signed on: March 5, 2024, 02:07:09 PM, UTC"
        );
    }

    #[test]
    fn test_format_positive_offset() {
        assert_eq!(
            format_signed_on(&parse("2024-12-25T09:30:00+09:00")),
            "Signed on: December 25, 2024, 09:30:00 AM, GMT+9"
        );
    }

    #[test]
    fn test_format_fractional_negative_offset() {
        assert_eq!(
            format_signed_on(&parse("2023-07-01T00:00:00-03:30")),
            "Signed on: July 1, 2023, 12:00:00 AM, GMT-3:30"
        );
    }
}
