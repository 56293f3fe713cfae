//! book-rag - 책 본문 기반 질의응답 RAG 시스템
//!
//! 책 원고를 청크로 나눠 임베딩하고 LanceDB에 저장한 뒤,
//! 질문과 유사한 청크만 근거로 답변합니다.
//! 사용자가 선택한 텍스트만으로 답하는 모드도 지원합니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod knowledge;
pub mod rag;

#[cfg(test)]
mod test_support;

// Re-exports
pub use config::{get_data_dir, Settings, StrategyKind};
pub use embedding::{get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding};
pub use error::RagError;
pub use generation::{AnswerStrategy, GeminiGenerator, HeuristicExtractor, LanguageModel};
pub use knowledge::{
    default_chunker, preprocess, BookIndex, ChunkConfig, Chunker, IngestReport, Ingestor,
    LanceVectorIndex, MemoryVectorIndex, RecursiveChunker, RetrievedChunk, VectorIndex,
};
pub use rag::{AnswerEnvelope, ChatMode, ChatRequest, RagService};
