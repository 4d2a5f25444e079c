//! 종목 유니버스 결정 모듈.
//!
//! 외부 협력자가 제공하는 안정적이고 결정적인 순서의 종목 목록을
//! 만듭니다. 소스 우선순위:
//!
//! 1. `UNIVERSE_FILE` 환경변수로 지정한 목록 파일
//! 2. `stock_master` 테이블의 활성 종목
//! 3. 이미 `stock_prices`에 저장된 종목 (fallback)
//!
//! 우선순위 종목이 앞에 오도록 정렬하지만, 재개 경로는 종목코드 기반이라
//! 순서 변화가 재개를 어긋나게 하지는 않습니다.

use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::UniverseConfig;
use crate::{CollectorError, Result};

/// 유니버스 항목.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniverseEntry {
    /// 종목코드
    pub stock_code: String,
    /// 우선 처리 대상 여부
    pub is_priority: bool,
}

/// 유니버스 결정.
pub async fn resolve_universe(
    pool: &PgPool,
    config: &UniverseConfig,
) -> Result<Vec<UniverseEntry>> {
    // 1. 목록 파일
    if let Some(path) = &config.file {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            CollectorError::Config(format!("유니버스 파일 읽기 실패 ({}): {}", path, e))
        })?;
        let entries = order_universe(parse_universe_file(&content));
        info!(path = %path, count = entries.len(), "유니버스 파일 로드 완료");
        return Ok(entries);
    }

    // 2. stock_master 테이블
    let rows: Vec<(String, bool)> = sqlx::query_as(
        r#"
        SELECT code, is_priority
        FROM stock_master
        WHERE is_active = true
        ORDER BY code
        "#,
    )
    .fetch_all(pool)
    .await?;

    if !rows.is_empty() {
        let entries = order_universe(
            rows.into_iter()
                .map(|(stock_code, is_priority)| UniverseEntry {
                    stock_code,
                    is_priority,
                })
                .collect(),
        );
        info!(count = entries.len(), "stock_master에서 유니버스 조회 완료");
        return Ok(entries);
    }

    // 3. 이미 저장된 종목으로 fallback
    warn!("stock_master가 비어 있어 저장된 시세 데이터에서 유니버스를 유도합니다");
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT DISTINCT stock_code
        FROM stock_prices
        ORDER BY stock_code
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(stock_code,)| UniverseEntry {
            stock_code,
            is_priority: false,
        })
        .collect())
}

/// 유니버스 파일 내용 파싱.
///
/// 한 줄에 한 종목: `CODE` 또는 `CODE,priority`. 빈 줄과 `#` 주석은 무시.
fn parse_universe_file(content: &str) -> Vec<UniverseEntry> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let mut parts = line.splitn(2, ',');
            let stock_code = parts.next().unwrap_or_default().trim().to_string();
            let is_priority = parts
                .next()
                .map(|flag| matches!(flag.trim(), "priority" | "true" | "1"))
                .unwrap_or(false);
            UniverseEntry {
                stock_code,
                is_priority,
            }
        })
        .filter(|entry| !entry.stock_code.is_empty())
        .collect()
}

/// 우선순위 종목이 앞에 오도록 안정 정렬.
fn order_universe(mut entries: Vec<UniverseEntry>) -> Vec<UniverseEntry> {
    entries.sort_by(|a, b| {
        b.is_priority
            .cmp(&a.is_priority)
            .then_with(|| a.stock_code.cmp(&b.stock_code))
    });
    entries
}
