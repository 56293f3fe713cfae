//! Knowledge 모듈 - 책 콘텐츠 벡터 지식 저장소
//!
//! - Preprocess: 정규화 + 재귀 경계 탐색 청킹
//! - Vector: 벡터 인덱스 트레이트 (LanceDB / 인메모리 구현)
//! - Index: 지연 초기화되는 책 인덱스 (임베딩 + 검색)
//! - Ingest: 원문 → 청크 → 인덱스 파이프라인

mod index;
mod ingest;
mod lance;
mod memory;
mod preprocess;
mod vector;

// Re-exports
pub use index::{
    BookIndex, IndexBackend, IndexConnector, IndexSettings, LanceGeminiConnector,
    RetrievedChunk, StaticConnector,
};
pub use ingest::{Chunk, DirectoryReport, IngestReport, Ingestor};
pub use lance::LanceVectorIndex;
pub use memory::MemoryVectorIndex;
pub use preprocess::{
    default_chunker, preprocess, recursive_chunker, ChunkConfig, Chunker, RecursiveChunker,
    PARAGRAPH_SEPARATOR,
};
pub use vector::{
    cosine_similarity, dot_product, rank_results, ChunkPayload, Distance, IndexedPoint, Metadata,
    ScoredPayload, VectorIndex,
};
