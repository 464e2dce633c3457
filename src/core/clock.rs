//! 时间基换算
//!
//! 后端以微秒为单位携带时间戳，播放器内部使用 DVD 时间基。

/// 播放器内部时间基（每秒单位数）
pub const DVD_TIME_BASE: f64 = 1_000_000.0;

/// "未知时间戳" 哨兵值，绝不能与 0 混淆
pub const NOPTS_VALUE: f64 = -4_503_599_627_370_496.0; // -(1 << 52)

/// 后端时间单位（每秒）
const TVH_TIME_BASE: f64 = 1_000_000.0;

/// 后端时间（微秒）转播放器时间基
pub fn tvh_to_dvd_time(value: i64) -> f64 {
    value as f64 * DVD_TIME_BASE / TVH_TIME_BASE
}

/// 可选时间戳转换，缺失时返回 NOPTS_VALUE
pub fn timestamp_or_nopts(value: Option<i64>) -> f64 {
    value.map(tvh_to_dvd_time).unwrap_or(NOPTS_VALUE)
}

/// 判断是否为有效时间戳
pub fn is_valid_timestamp(ts: f64) -> bool {
    ts != NOPTS_VALUE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tvh_to_dvd_time() {
        assert_eq!(tvh_to_dvd_time(1_000_000), DVD_TIME_BASE);
        assert_eq!(tvh_to_dvd_time(0), 0.0);
        assert_eq!(tvh_to_dvd_time(-40_000), -40_000.0);
    }

    #[test]
    fn test_missing_timestamp_is_nopts() {
        assert_eq!(timestamp_or_nopts(None), NOPTS_VALUE);
        assert!(!is_valid_timestamp(timestamp_or_nopts(None)));
        assert!(is_valid_timestamp(timestamp_or_nopts(Some(0))));
    }
}
