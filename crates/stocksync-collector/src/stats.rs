//! 동기화 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 동기화 실행 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStats {
    /// 유니버스 전체 종목 수
    pub total: usize,
    /// 이번 호출에서 처리한 종목 수
    pub processed: usize,
    /// 성공 수 (스킵 포함)
    pub successful: usize,
    /// 실패 수
    pub failed: usize,
    /// 기존 데이터가 충분해 건너뛴 수
    pub skipped: usize,
    /// 저장된 총 레코드 수
    pub records_written: usize,
    /// 취소 신호로 중단되었는지 여부
    pub interrupted: bool,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl SyncStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            (self.successful as f64 / self.processed as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            processed = self.processed,
            successful = self.successful,
            failed = self.failed,
            skipped = self.skipped,
            records_written = self.records_written,
            interrupted = self.interrupted,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "동기화 완료"
        );
    }
}
