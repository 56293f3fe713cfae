//! Book Index - 지연 초기화되는 벡터 인덱스 + 임베딩 클라이언트
//!
//! 생성 시점에는 어떤 I/O도 하지 않습니다.
//! 첫 사용 시 한 번만 연결 → 차원 확인 → 컬렉션 보장을 수행하고,
//! 동시에 들어온 첫 요청들은 같은 초기화 결과를 기다렸다가 공유합니다.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::config::Settings;
use crate::embedding::{check_dimension, EmbeddingProvider, GeminiEmbedding};
use crate::error::RagError;

use super::lance::LanceVectorIndex;
use super::vector::{ChunkPayload, Distance, IndexedPoint, Metadata, VectorIndex};

// ============================================================================
// Types
// ============================================================================

/// 인덱스 설정
#[derive(Debug, Clone)]
pub struct IndexSettings {
    /// 컬렉션 이름
    pub collection_name: String,
    /// 벡터 차원
    pub dimension: usize,
    /// 최소 유사도
    pub similarity_threshold: f32,
}

impl From<&Settings> for IndexSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            collection_name: settings.collection_name.clone(),
            dimension: settings.embedding_dimension,
            similarity_threshold: settings.similarity_threshold,
        }
    }
}

/// 검색된 청크
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    /// 포인트 ID
    pub id: String,
    /// 청크 텍스트
    pub text: String,
    /// 청크 메타데이터
    pub metadata: Metadata,
    /// 유사도 스코어
    pub score: f32,
}

/// 초기화가 끝난 백엔드 (인덱스 + 임베딩)
#[derive(Clone)]
pub struct IndexBackend {
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn EmbeddingProvider>,
}

// ============================================================================
// Connectors
// ============================================================================

/// 백엔드 연결 트레이트
///
/// `BookIndex` 첫 사용 시 정확히 한 번 호출됩니다.
#[async_trait]
pub trait IndexConnector: Send + Sync {
    async fn connect(&self) -> Result<IndexBackend>;
}

/// LanceDB + Gemini 임베딩 커넥터
pub struct LanceGeminiConnector {
    lance_path: PathBuf,
    dimension: usize,
}

impl LanceGeminiConnector {
    pub fn new(lance_path: PathBuf, dimension: usize) -> Self {
        Self {
            lance_path,
            dimension,
        }
    }
}

#[async_trait]
impl IndexConnector for LanceGeminiConnector {
    async fn connect(&self) -> Result<IndexBackend> {
        // 자격 증명 누락은 설정 에러 (요청마다 복구 불가)
        let embedder = GeminiEmbedding::from_env_with_dimension(self.dimension)?;
        let index = LanceVectorIndex::open(&self.lance_path)
            .await
            .context("Failed to open vector store")?;

        tracing::info!(
            "Connected vector index at {} (embedder: {})",
            self.lance_path.display(),
            embedder.name()
        );

        Ok(IndexBackend {
            index: Arc::new(index),
            embedder: Arc::new(embedder),
        })
    }
}

/// 이미 만들어진 백엔드를 그대로 넘기는 커넥터
pub struct StaticConnector {
    backend: IndexBackend,
}

impl StaticConnector {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            backend: IndexBackend { index, embedder },
        }
    }
}

#[async_trait]
impl IndexConnector for StaticConnector {
    async fn connect(&self) -> Result<IndexBackend> {
        Ok(self.backend.clone())
    }
}

// ============================================================================
// BookIndex
// ============================================================================

/// 책 콘텐츠 벡터 인덱스
pub struct BookIndex {
    settings: IndexSettings,
    connector: Box<dyn IndexConnector>,
    backend: OnceCell<IndexBackend>,
}

impl BookIndex {
    /// 커넥터를 주입하여 생성 (연결은 첫 사용 시)
    pub fn new(settings: IndexSettings, connector: impl IndexConnector + 'static) -> Self {
        Self {
            settings,
            connector: Box::new(connector),
            backend: OnceCell::new(),
        }
    }

    /// 설정으로부터 LanceDB + Gemini 인덱스 생성
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            IndexSettings::from(settings),
            LanceGeminiConnector::new(settings.lance_path(), settings.embedding_dimension),
        )
    }

    /// 인덱스 설정
    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    /// 초기화 완료 여부
    pub fn is_initialized(&self) -> bool {
        self.backend.initialized()
    }

    /// 백엔드 (첫 호출 시 초기화)
    ///
    /// 실패한 초기화는 캐시되지 않으므로 다음 호출에서 다시 시도합니다.
    async fn backend(&self) -> Result<&IndexBackend> {
        self.backend
            .get_or_try_init(|| async {
                let backend = self.connector.connect().await?;

                let embedder_dim = backend.embedder.dimension();
                if embedder_dim != self.settings.dimension {
                    return Err(RagError::DimensionMismatch {
                        expected: self.settings.dimension,
                        actual: embedder_dim,
                    }
                    .into());
                }

                backend
                    .index
                    .ensure_collection(
                        &self.settings.collection_name,
                        self.settings.dimension,
                        Distance::Cosine,
                    )
                    .await?;

                tracing::info!(
                    "Book index ready (collection={}, dim={})",
                    self.settings.collection_name,
                    self.settings.dimension
                );
                Ok::<_, anyhow::Error>(backend)
            })
            .await
    }

    /// 텍스트 임베딩 후 저장, 저장된 ID 반환
    ///
    /// # Arguments
    /// * `texts` - 청크 텍스트
    /// * `metadatas` - 청크별 메타데이터 (없으면 빈 객체)
    /// * `ids` - 청크별 ID (없으면 UUID v4 생성)
    pub async fn add_texts(
        &self,
        texts: &[String],
        metadatas: Option<Vec<Metadata>>,
        ids: Option<Vec<String>>,
    ) -> Result<Vec<String>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let ids = ids.unwrap_or_else(|| {
            texts
                .iter()
                .map(|_| uuid::Uuid::new_v4().to_string())
                .collect()
        });
        let metadatas = metadatas.unwrap_or_else(|| vec![Metadata::new(); texts.len()]);

        if ids.len() != texts.len() || metadatas.len() != texts.len() {
            anyhow::bail!(
                "texts ({}), ids ({}) and metadatas ({}) must have the same length",
                texts.len(),
                ids.len(),
                metadatas.len()
            );
        }

        let backend = self.backend().await?;
        let vectors = backend
            .embedder
            .embed_documents(texts)
            .await
            .context("Failed to embed documents")?;

        if vectors.len() != texts.len() {
            anyhow::bail!(
                "Embedding provider returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            );
        }

        let mut points = Vec::with_capacity(texts.len());
        for (((id, vector), text), metadata) in ids.into_iter().zip(vectors).zip(texts).zip(metadatas)
        {
            check_dimension(&vector, self.settings.dimension)?;
            points.push(IndexedPoint {
                id,
                vector,
                payload: ChunkPayload {
                    text: text.clone(),
                    metadata,
                },
            });
        }

        let stored = backend
            .index
            .upsert(&self.settings.collection_name, points)
            .await
            .context("Failed to upsert points")?;

        tracing::debug!("Upserted {} points", stored.len());
        Ok(stored)
    }

    /// 유사도 검색
    ///
    /// 최대 `k`개, 유사도 임계값 이상, 스코어 내림차순.
    pub async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let backend = self.backend().await?;

        let query_vector = backend
            .embedder
            .embed_query(query)
            .await
            .context("Failed to embed query")?;
        check_dimension(&query_vector, self.settings.dimension)?;

        let threshold = self.settings.similarity_threshold;
        let results = backend
            .index
            .query(&self.settings.collection_name, &query_vector, k, threshold)
            .await
            .context("Vector search failed")?;

        let chunks: Vec<RetrievedChunk> = results
            .into_iter()
            .filter(|r| r.score >= threshold)
            .map(|r| RetrievedChunk {
                id: r.id,
                text: r.payload.text,
                metadata: r.payload.metadata,
                score: r.score,
            })
            .collect();

        tracing::debug!(
            "Retrieved {} chunks (k={}, threshold={})",
            chunks.len(),
            k,
            threshold
        );
        Ok(chunks)
    }

    /// 저장된 청크 개수
    pub async fn count(&self) -> Result<usize> {
        let backend = self.backend().await?;
        backend.index.count(&self.settings.collection_name).await
    }
}

// ============================================================================
// Tests
// ============================================================================
