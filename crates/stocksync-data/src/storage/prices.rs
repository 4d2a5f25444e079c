//! 일별 시세 저장소.
//!
//! `stock_prices` 테이블에 대한 멱등 쓰기와, 갭 분석기가 사용하는
//! 커버리지/갭 조회를 제공합니다.
//!
//! # 쓰기 의미론
//!
//! 모든 쓰기는 (stock_code, date) 키 Upsert입니다. 재시도나 중복 실행으로
//! 같은 레코드를 다시 써도 행이 늘어나지 않고 마지막 값이 남습니다.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use tracing::{debug, info};

use stocksync_core::{Coverage, GapPeriod, PricePoint};

use crate::error::{DataError, Result};

/// 일별 시세 저장소.
#[derive(Clone)]
pub struct PriceStore {
    pool: PgPool,
}

impl PriceStore {
    /// 새로운 시세 저장소 생성.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 시세 레코드 일괄 Upsert.
    ///
    /// UNNEST 패턴으로 500건 단위 일괄 삽입하며, (stock_code, date) 충돌 시
    /// 새 값으로 덮어씁니다. 각 청크는 독립 트랜잭션입니다.
    ///
    /// # Returns
    /// 영향을 받은 행 수 (신규 + 갱신).
    pub async fn upsert_prices(&self, prices: &[PricePoint]) -> Result<usize> {
        if prices.is_empty() {
            return Ok(0);
        }

        let mut written = 0;

        for chunk in prices.chunks(500) {
            let codes: Vec<&str> = chunk.iter().map(|p| p.stock_code.as_str()).collect();
            let dates: Vec<NaiveDate> = chunk.iter().map(|p| p.date).collect();
            let opens: Vec<Decimal> = chunk.iter().map(|p| p.open).collect();
            let highs: Vec<Decimal> = chunk.iter().map(|p| p.high).collect();
            let lows: Vec<Decimal> = chunk.iter().map(|p| p.low).collect();
            let closes: Vec<Decimal> = chunk.iter().map(|p| p.close).collect();
            let adjusted: Vec<Decimal> = chunk.iter().map(|p| p.adjusted_close).collect();
            let volumes: Vec<i64> = chunk.iter().map(|p| p.volume).collect();

            let result = sqlx::query(
                r#"
                INSERT INTO stock_prices
                    (stock_code, date, open, high, low, close, adjusted_close, volume, fetched_at)
                SELECT *, NOW() FROM UNNEST(
                    $1::text[], $2::date[],
                    $3::numeric[], $4::numeric[], $5::numeric[], $6::numeric[], $7::numeric[],
                    $8::bigint[]
                )
                ON CONFLICT (stock_code, date) DO UPDATE SET
                    open = EXCLUDED.open,
                    high = EXCLUDED.high,
                    low = EXCLUDED.low,
                    close = EXCLUDED.close,
                    adjusted_close = EXCLUDED.adjusted_close,
                    volume = EXCLUDED.volume,
                    fetched_at = NOW()
                "#,
            )
            .bind(&codes)
            .bind(&dates)
            .bind(&opens)
            .bind(&highs)
            .bind(&lows)
            .bind(&closes)
            .bind(&adjusted)
            .bind(&volumes)
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::InsertError(e.to_string()))?;

            written += result.rows_affected() as usize;
        }

        info!(
            stock_code = %prices[0].stock_code,
            written = written,
            "시세 레코드 저장 완료"
        );

        Ok(written)
    }

    /// 종목의 저장 커버리지 조회 (최소/최대 거래일, 행 수).
    ///
    /// 저장된 행이 없으면 `None`.
    pub async fn get_coverage(&self, stock_code: &str) -> Result<Option<Coverage>> {
        let row: (Option<NaiveDate>, Option<NaiveDate>, i64) = sqlx::query_as(
            r#"
            SELECT MIN(date), MAX(date), COUNT(*)
            FROM stock_prices
            WHERE stock_code = $1
            "#,
        )
        .bind(stock_code)
        .fetch_one(&self.pool)
        .await?;

        match row {
            (Some(earliest), Some(latest), rows) if rows > 0 => Ok(Some(Coverage {
                earliest,
                latest,
                rows,
            })),
            _ => Ok(None),
        }
    }

    /// 종목의 시계열 갭 조회.
    ///
    /// 인접한 저장 거래일 간 간격이 `threshold_days` 달력일을 초과하는
    /// 구간을 LAG 윈도우 쿼리로 찾아, 저장일을 제외한 누락 구간으로
    /// 변환해 반환합니다.
    pub async fn get_gaps(&self, stock_code: &str, threshold_days: i32) -> Result<Vec<GapPeriod>> {
        let rows: Vec<(NaiveDate, NaiveDate)> = sqlx::query_as(
            r#"
            SELECT prev_date, date
            FROM (
                SELECT date, LAG(date) OVER (ORDER BY date) AS prev_date
                FROM stock_prices
                WHERE stock_code = $1
            ) t
            WHERE prev_date IS NOT NULL AND date - prev_date > $2
            ORDER BY prev_date
            "#,
        )
        .bind(stock_code)
        .bind(threshold_days)
        .fetch_all(&self.pool)
        .await?;

        let gaps: Vec<GapPeriod> = rows
            .into_iter()
            .map(|(prev, next)| GapPeriod::between(prev, next))
            .collect();

        if !gaps.is_empty() {
            debug!(
                stock_code = stock_code,
                gap_count = gaps.len(),
                "시계열 갭 감지"
            );
        }

        Ok(gaps)
    }
}
