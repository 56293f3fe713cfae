//! 에러 타입
//!
//! 대부분의 경로는 `anyhow::Result`로 전파합니다.
//! 호출자가 구분해야 하는 설정/초기화 에러만 타입으로 정의합니다.
//! (`err.downcast_ref::<RagError>()`로 확인)

use thiserror::Error;

/// 설정 및 초기화 에러
#[derive(Debug, Error, PartialEq)]
pub enum RagError {
    /// 임베딩 차원이 컬렉션 차원과 다름 (복구 불가)
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// API 키 등 자격 증명 누락
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// 잘못된 설정 값
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// 컬렉션이 존재하지 않음 (ensure_collection 이전 접근)
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
}
