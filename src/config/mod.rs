//! 설정 모듈
//!
//! 기본값 + 환경변수 오버라이드 방식의 런타임 설정입니다.
//!
//! ## 환경변수
//! - `RAG_COLLECTION_NAME`, `RAG_EMBEDDING_DIMENSION`
//! - `RAG_SIMILARITY_THRESHOLD`, `RAG_MAX_CONTEXT_LENGTH`, `RAG_TOP_K`
//! - `RAG_CHUNK_SIZE`, `RAG_CHUNK_OVERLAP`
//! - `RAG_DATA_DIR`, `RAG_GENERATION_MODEL`, `RAG_ANSWER_STRATEGY`

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;

use crate::error::RagError;
use crate::knowledge::ChunkConfig;

/// 기본 컬렉션 이름
pub const DEFAULT_COLLECTION_NAME: &str = "book_content_embeddings";

/// 기본 생성 모델
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.0-flash";

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.book-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".book-rag")
}

// ============================================================================
// Answer Strategy Kind
// ============================================================================

/// 답변 생성 전략 선택
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    /// API 키가 있으면 생성 모델, 없으면 휴리스틱
    #[default]
    Auto,
    /// 항상 생성 모델 (API 키 필수)
    Generative,
    /// 항상 휴리스틱 추출기
    Heuristic,
}

impl FromStr for StrategyKind {
    type Err = RagError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "generative" | "llm" => Ok(Self::Generative),
            "heuristic" => Ok(Self::Heuristic),
            other => Err(RagError::InvalidConfig(format!(
                "unknown answer strategy '{}' (expected auto, generative or heuristic)",
                other
            ))),
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// 런타임 설정
#[derive(Debug, Clone)]
pub struct Settings {
    /// 벡터 컬렉션 이름
    pub collection_name: String,
    /// 임베딩 차원 (모델과 컬렉션이 동일해야 함)
    pub embedding_dimension: usize,
    /// 최소 유사도 (이 값 미만의 검색 결과는 버림)
    pub similarity_threshold: f32,
    /// 생성 단계에 넘기는 컨텍스트 최대 길이 (문자 수)
    pub max_context_length: usize,
    /// 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 청크 간 오버랩 (문자 수)
    pub chunk_overlap: usize,
    /// 전역 검색 시 가져올 청크 수
    pub top_k: usize,
    /// LanceDB 등 데이터 저장 디렉토리
    pub data_dir: PathBuf,
    /// 생성 모델 이름
    pub generation_model: String,
    /// 답변 전략
    pub answer_strategy: StrategyKind,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            embedding_dimension: 1536,
            similarity_threshold: 0.7,
            max_context_length: 3000,
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 4,
            data_dir: get_data_dir(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            answer_strategy: StrategyKind::Auto,
        }
    }
}

impl Settings {
    /// 기본값에 환경변수 오버라이드 적용
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 키 조회 함수로부터 설정 생성
    ///
    /// 테스트에서 프로세스 환경변수를 건드리지 않도록 분리되어 있습니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("RAG_COLLECTION_NAME") {
            settings.collection_name = v.trim().to_string();
        }
        if let Some(v) = get("RAG_EMBEDDING_DIMENSION") {
            settings.embedding_dimension = parse_var("RAG_EMBEDDING_DIMENSION", &v)?;
        }
        if let Some(v) = get("RAG_SIMILARITY_THRESHOLD") {
            settings.similarity_threshold = parse_var("RAG_SIMILARITY_THRESHOLD", &v)?;
        }
        if let Some(v) = get("RAG_MAX_CONTEXT_LENGTH") {
            settings.max_context_length = parse_var("RAG_MAX_CONTEXT_LENGTH", &v)?;
        }
        if let Some(v) = get("RAG_CHUNK_SIZE") {
            settings.chunk_size = parse_var("RAG_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = get("RAG_CHUNK_OVERLAP") {
            settings.chunk_overlap = parse_var("RAG_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = get("RAG_TOP_K") {
            settings.top_k = parse_var("RAG_TOP_K", &v)?;
        }
        if let Some(v) = get("RAG_DATA_DIR") {
            settings.data_dir = PathBuf::from(v.trim());
        }
        if let Some(v) = get("RAG_GENERATION_MODEL") {
            settings.generation_model = v.trim().to_string();
        }
        if let Some(v) = get("RAG_ANSWER_STRATEGY") {
            settings.answer_strategy = v.parse()?;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// 설정 값 검증
    pub fn validate(&self) -> Result<()> {
        if self.collection_name.is_empty() {
            return Err(RagError::InvalidConfig("collection name must not be empty".into()).into());
        }
        if self.embedding_dimension == 0 {
            return Err(RagError::InvalidConfig("embedding dimension must be positive".into()).into());
        }
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(RagError::InvalidConfig(format!(
                "similarity threshold {} is outside [-1.0, 1.0]",
                self.similarity_threshold
            ))
            .into());
        }
        if self.top_k == 0 {
            return Err(RagError::InvalidConfig("top_k must be positive".into()).into());
        }
        self.chunk_config().validate()
    }

    /// 청킹 설정
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            ..ChunkConfig::default()
        }
    }

    /// LanceDB 디렉토리 경로
    pub fn lance_path(&self) -> PathBuf {
        self.data_dir.join("vectors.lance")
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| {
        RagError::InvalidConfig(format!("{}='{}': {}", key, value, e)).into()
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.collection_name, "book_content_embeddings");
        assert_eq!(settings.embedding_dimension, 1536);
        assert!((settings.similarity_threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(settings.max_context_length, 3000);
        assert_eq!(settings.chunk_size, 500);
        assert_eq!(settings.chunk_overlap, 50);
        assert_eq!(settings.top_k, 4);
        assert_eq!(settings.answer_strategy, StrategyKind::Auto);
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("RAG_COLLECTION_NAME", "novel"),
            ("RAG_SIMILARITY_THRESHOLD", "0.5"),
            ("RAG_CHUNK_SIZE", "800"),
            ("RAG_TOP_K", "6"),
            ("RAG_ANSWER_STRATEGY", "heuristic"),
            ("RAG_DATA_DIR", "/tmp/book"),
        ]))
        .unwrap();

        assert_eq!(settings.collection_name, "novel");
        assert!((settings.similarity_threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(settings.chunk_size, 800);
        assert_eq!(settings.top_k, 6);
        assert_eq!(settings.answer_strategy, StrategyKind::Heuristic);
        assert_eq!(settings.lance_path(), PathBuf::from("/tmp/book/vectors.lance"));
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let settings = Settings::from_lookup(lookup_from(&[("RAG_TOP_K", "  ")])).unwrap();
        assert_eq!(settings.top_k, 4);
    }

    #[test]
    fn test_unparseable_value_is_config_error() {
        let err = Settings::from_lookup(lookup_from(&[("RAG_MAX_CONTEXT_LENGTH", "lots")]))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let err = Settings::from_lookup(lookup_from(&[
            ("RAG_CHUNK_SIZE", "100"),
            ("RAG_CHUNK_OVERLAP", "100"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_strategy_kind_parse() {
        assert_eq!("AUTO".parse::<StrategyKind>().unwrap(), StrategyKind::Auto);
        assert_eq!("llm".parse::<StrategyKind>().unwrap(), StrategyKind::Generative);
        assert!("magic".parse::<StrategyKind>().is_err());
    }
}
