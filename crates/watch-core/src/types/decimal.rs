//! 문자열 필드 파싱 유틸리티.
//!
//! 거래소 응답의 숫자 필드는 모두 문자열로 도착합니다.
//! 여기의 함수들은 실패하지 않으며, 비어 있거나 해석할 수 없는 값은 `None`("알 수 없음")이 됩니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// 문자열에서 Decimal 파싱.
///
/// 지수 표기(`1e-5`)도 허용합니다.
pub fn parse_decimal(raw: Option<&str>) -> Option<Decimal> {
    let s = raw?.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(s).ok())
}

/// 밀리초 유닉스 타임스탬프 문자열 파싱.
pub fn parse_timestamp_ms(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let millis: i64 = raw?.trim().parse().ok()?;
    DateTime::from_timestamp_millis(millis)
}

/// 정수 필드 파싱.
pub fn parse_integer(raw: Option<&str>) -> Option<i64> {
    raw?.trim().parse().ok()
}

/// 0/1 또는 true/false 플래그 파싱.
pub fn parse_flag(raw: Option<&str>) -> Option<bool> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

/// 비율(0.0125)을 퍼센트(1.25)로 변환합니다. 범위를 넘으면 `None`.
pub fn rate_to_percent(rate: Option<Decimal>) -> Option<Decimal> {
    rate?.checked_mul(Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal(Some("12.5")), Some(dec!(12.5)));
        assert_eq!(parse_decimal(Some(" -3.25 ")), Some(dec!(-3.25)));
        assert_eq!(parse_decimal(Some("1e-5")), Some(dec!(0.00001)));
        assert_eq!(parse_decimal(Some("")), None);
        assert_eq!(parse_decimal(Some("n/a")), None);
        assert_eq!(parse_decimal(None), None);
    }

    #[test]
    fn test_parse_timestamp_ms() {
        let ts = parse_timestamp_ms(Some("1676538056258")).unwrap();
        assert_eq!(ts.timestamp_millis(), 1676538056258);
        assert!(parse_timestamp_ms(Some("")).is_none());
        assert!(parse_timestamp_ms(Some("yesterday")).is_none());
    }

    #[test]
    fn test_parse_flag_and_rate() {
        assert_eq!(parse_flag(Some("1")), Some(true));
        assert_eq!(parse_flag(Some("0")), Some(false));
        assert_eq!(parse_flag(Some("maybe")), None);
        assert_eq!(rate_to_percent(Some(dec!(0.0125))), Some(dec!(1.25)));
        assert_eq!(parse_integer(Some("2")), Some(2));
    }

    #[test]
    fn test_rate_to_percent_out_of_range() {
        assert_eq!(rate_to_percent(Some(Decimal::MAX)), None);
        assert_eq!(rate_to_percent(None), None);
    }
}
