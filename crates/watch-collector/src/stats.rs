//! 폴링 사이클 통계.

use std::time::Duration;

use serde::Serialize;
use watch_core::WatchError;

/// 스케줄러 수명 동안의 사이클 통계
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleStats {
    /// 총 사이클 수
    pub total: usize,
    /// 성공한 사이클 수
    pub success: usize,
    /// 실패한 사이클 수
    pub errors: usize,
    /// 요청 한도 초과로 실패한 사이클 수
    pub rate_limited: usize,
    /// 일부 데이터가 빈 값으로 대체된 성공 사이클 수
    pub degraded: usize,
    /// 마지막 사이클 소요 시간
    #[serde(skip)]
    pub last_elapsed: Duration,
}

impl CycleStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 성공한 사이클 기록
    pub fn record_success(&mut self, degraded: bool, elapsed: Duration) {
        self.total += 1;
        self.success += 1;
        if degraded {
            self.degraded += 1;
        }
        self.last_elapsed = elapsed;
    }

    /// 실패한 사이클 기록
    pub fn record_failure(&mut self, error: &WatchError, elapsed: Duration) {
        self.total += 1;
        self.errors += 1;
        if error.is_rate_limited() {
            self.rate_limited += 1;
        }
        self.last_elapsed = elapsed;
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            errors = self.errors,
            rate_limited = self.rate_limited,
            degraded = self.degraded,
            success_rate = format!("{:.1}%", self.success_rate()),
            last_elapsed = format!("{:.1}s", self.last_elapsed.as_secs_f64()),
            "폴링 통계"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_rate() {
        let mut stats = CycleStats::new();
        assert_eq!(stats.success_rate(), 0.0);

        stats.record_success(false, Duration::from_millis(120));
        stats.record_success(true, Duration::from_millis(80));
        stats.record_failure(
            &WatchError::RateLimitExceeded {
                code: 10006,
                message: "Too many visits!".to_string(),
            },
            Duration::from_millis(40),
        );
        stats.record_failure(&WatchError::cannot_connect("timeout"), Duration::ZERO);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.success, 2);
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.rate_limited, 1);
        assert_eq!(stats.degraded, 1);
        assert_eq!(stats.success_rate(), 50.0);
    }
}
