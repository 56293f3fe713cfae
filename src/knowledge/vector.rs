//! Vector Index - 벡터 인덱스 트레이트 및 유틸리티
//!
//! 컬렉션 단위로 (id, 벡터, payload)를 저장하고
//! 유사도 하한(score threshold)이 있는 최근접 이웃 검색을 제공합니다.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 청크 메타데이터 (JSON 객체)
pub type Metadata = Map<String, Value>;

// ============================================================================
// Types
// ============================================================================

/// 거리 척도
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Distance {
    /// 코사인 유사도 (기본값)
    #[default]
    Cosine,
    /// 내적
    Dot,
}

/// 포인트에 함께 저장되는 payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// 청크 텍스트
    pub text: String,
    /// 청크 메타데이터
    #[serde(default)]
    pub metadata: Metadata,
}

/// 인덱스에 저장되는 포인트
#[derive(Debug, Clone)]
pub struct IndexedPoint {
    /// 고유 ID (UUID v4 문자열)
    pub id: String,
    /// 임베딩 벡터
    pub vector: Vec<f32>,
    /// 텍스트 + 메타데이터
    pub payload: ChunkPayload,
}

/// 검색 결과 (payload + 유사도)
#[derive(Debug, Clone)]
pub struct ScoredPayload {
    /// 포인트 ID
    pub id: String,
    /// 텍스트 + 메타데이터
    pub payload: ChunkPayload,
    /// 유사도 스코어 (높을수록 유사)
    pub score: f32,
}

// ============================================================================
// VectorIndex Trait
// ============================================================================

/// 벡터 인덱스 트레이트 (async)
///
/// 벡터 DB의 공통 인터페이스입니다.
/// 연결/인증 실패는 에러로 그대로 전파하며 자동 재시도하지 않습니다.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// 컬렉션이 없으면 생성 (이미 있으면 no-op)
    ///
    /// 같은 이름의 컬렉션이 다른 차원으로 존재하면 `RagError::DimensionMismatch`.
    async fn ensure_collection(&self, name: &str, dimension: usize, distance: Distance)
        -> Result<()>;

    /// 포인트 삽입 또는 덮어쓰기 (id 기준), 저장된 id 목록 반환
    async fn upsert(&self, name: &str, points: Vec<IndexedPoint>) -> Result<Vec<String>>;

    /// 최근접 이웃 검색
    ///
    /// 최대 `k`개, `score >= score_threshold`, 스코어 내림차순.
    /// 임계값을 넘는 결과가 없으면 빈 목록 (에러 아님).
    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredPayload>>;

    /// 컬렉션의 포인트 개수
    async fn count(&self, name: &str) -> Result<usize>;

    /// 컬렉션 삭제 (없으면 no-op)
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// 존재하는 컬렉션 이름 목록
    async fn collection_names(&self) -> Result<Vec<String>>;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 영벡터면 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// 내적
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// 임계값 필터 + 내림차순 정렬 + top-k
///
/// 인덱스 구현체들이 공통으로 사용하는 후처리입니다.
pub fn rank_results(
    mut results: Vec<ScoredPayload>,
    k: usize,
    score_threshold: f32,
) -> Vec<ScoredPayload> {
    results.retain(|r| r.score >= score_threshold);
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(k);
    results
}

// ============================================================================
// Tests
// ============================================================================
