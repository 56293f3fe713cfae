//! 인제스트 파이프라인
//!
//! 원문 → 정규화 → 청킹 → 메타데이터 부착 → 임베딩 + 저장.
//! 청크 ID는 저장 시점에 UUID v4로 새로 발급됩니다.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::collector::{CollectorConfig, FileCollector};

use super::index::BookIndex;
use super::preprocess::{default_chunker, Chunker};
use super::vector::Metadata;

// ============================================================================
// Types
// ============================================================================

/// 인덱싱 단위 청크
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 청크 텍스트
    pub text: String,
    /// 원문 내 순서 (0부터)
    pub sequence_index: usize,
    /// 원문 식별자 (보통 파일 이름)
    pub source_identifier: String,
    /// 저장될 메타데이터
    pub metadata: Metadata,
}

/// 단일 텍스트 인제스트 결과
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// 저장된 청크 수
    pub chunks: usize,
    /// 저장된 포인트 ID
    pub ids: Vec<String>,
}

/// 폴더 인제스트 결과
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryReport {
    /// 처리에 성공한 파일 수
    pub files_ingested: usize,
    /// 실패한 파일 수
    pub files_failed: usize,
    /// 저장된 청크 총합
    pub chunks: usize,
}

// ============================================================================
// Ingestor
// ============================================================================

/// 책 콘텐츠 인제스터
pub struct Ingestor {
    index: Arc<BookIndex>,
    chunker: Box<dyn Chunker>,
}

impl Ingestor {
    pub fn new(index: Arc<BookIndex>, chunker: Box<dyn Chunker>) -> Self {
        Self { index, chunker }
    }

    /// 기본 청커(500/50)로 생성
    pub fn with_default_chunker(index: Arc<BookIndex>) -> Self {
        Self::new(index, default_chunker())
    }

    /// 텍스트를 청크로 만들고 메타데이터 부착
    ///
    /// `chunk_id`와 `source_file`이 `extra`보다 먼저 들어가므로
    /// `extra`에 같은 키가 있으면 `extra` 값이 우선합니다.
    pub fn build_chunks(&self, text: &str, source_identifier: &str, extra: &Metadata) -> Vec<Chunk> {
        self.chunker
            .chunk(text)
            .into_iter()
            .enumerate()
            .map(|(i, chunk_text)| {
                let mut metadata = Metadata::new();
                metadata.insert("chunk_id".to_string(), Value::from(i));
                metadata.insert("source_file".to_string(), Value::from(source_identifier));
                for (key, value) in extra {
                    metadata.insert(key.clone(), value.clone());
                }

                Chunk {
                    text: chunk_text,
                    sequence_index: i,
                    source_identifier: source_identifier.to_string(),
                    metadata,
                }
            })
            .collect()
    }

    /// 텍스트 인제스트
    pub async fn ingest_text(
        &self,
        text: &str,
        source_identifier: &str,
        extra: &Metadata,
    ) -> Result<IngestReport> {
        let chunks = self.build_chunks(text, source_identifier, extra);

        if chunks.is_empty() {
            tracing::warn!("No chunks produced from '{}', skipping", source_identifier);
            return Ok(IngestReport::default());
        }

        let (texts, metadatas): (Vec<String>, Vec<Metadata>) =
            chunks.into_iter().map(|c| (c.text, c.metadata)).unzip();

        let ids = self
            .index
            .add_texts(&texts, Some(metadatas), None)
            .await
            .with_context(|| format!("Failed to index chunks of '{}'", source_identifier))?;

        tracing::info!(
            "Ingested '{}' ({} chunks, chunker: {})",
            source_identifier,
            ids.len(),
            self.chunker.name()
        );

        Ok(IngestReport {
            chunks: ids.len(),
            ids,
        })
    }

    /// 파일 인제스트 (UTF-8)
    pub async fn ingest_file(&self, path: &Path, extra: &Metadata) -> Result<IngestReport> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read file: {:?}", path))?;

        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        self.ingest_text(&text, &source, extra).await
    }

    /// 폴더 인제스트
    ///
    /// 파일 단위 실패는 경고 후 집계만 하고 계속 진행합니다.
    pub async fn ingest_directory(&self, dir: &Path, extensions: &[String]) -> Result<DirectoryReport> {
        let mut config = CollectorConfig::default();
        if !extensions.is_empty() {
            config = config.with_extensions(extensions);
        }
        let files = FileCollector::new(config).collect_directory(dir)?;

        let directory_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());

        let mut report = DirectoryReport::default();
        for file in &files {
            let mut extra = Metadata::new();
            extra.insert("source_directory".to_string(), Value::from(directory_name.as_str()));
            extra.insert(
                "file_path".to_string(),
                Value::from(file.path.display().to_string()),
            );

            match self.ingest_file(&file.path, &extra).await {
                Ok(file_report) => {
                    report.files_ingested += 1;
                    report.chunks += file_report.chunks;
                }
                Err(e) => {
                    tracing::warn!("Failed to ingest {:?}: {:#}", file.path, e);
                    report.files_failed += 1;
                }
            }
        }

        tracing::info!(
            "Ingested directory {:?}: {} files, {} failed, {} chunks",
            dir,
            report.files_ingested,
            report.files_failed,
            report.chunks
        );
        Ok(report)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{IndexSettings, MemoryVectorIndex, StaticConnector, VectorIndex};
    use crate::test_support::KeywordEmbedding;
    use serde_json::json;
    use tempfile::TempDir;

    const VOCAB: &[&str] = &["paris", "capital", "france", "dragon"];

    fn setup() -> (Arc<MemoryVectorIndex>, Ingestor) {
        let memory = Arc::new(MemoryVectorIndex::new());
        let connector = StaticConnector::new(memory.clone(), Arc::new(KeywordEmbedding::new(VOCAB)));
        let index = BookIndex::new(
            IndexSettings {
                collection_name: "book".to_string(),
                dimension: VOCAB.len(),
                similarity_threshold: 0.7,
            },
            connector,
        );
        (memory, Ingestor::with_default_chunker(Arc::new(index)))
    }

    #[test]
    fn test_build_chunks_metadata() {
        let (_memory, ingestor) = setup();
        let mut extra = Metadata::new();
        extra.insert("source".to_string(), json!("manual_ingestion"));

        let text = format!("{}\n\n{}", "Paris is the capital. ".repeat(20), "Dragons live far away. ".repeat(20));
        let chunks = ingestor.build_chunks(&text, "geo.txt", &extra);

        assert!(chunks.len() >= 2);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_index, i);
            assert_eq!(chunk.source_identifier, "geo.txt");
            assert_eq!(chunk.metadata["chunk_id"], json!(i));
            assert_eq!(chunk.metadata["source_file"], json!("geo.txt"));
            assert_eq!(chunk.metadata["source"], json!("manual_ingestion"));
            assert!(chunk.text.chars().count() <= 500);
        }
    }

    #[tokio::test]
    async fn test_ingest_text_stores_chunks() {
        let (memory, ingestor) = setup();
        let report = ingestor
            .ingest_text("Paris is the capital of France and a lovely city.", "geo.txt", &Metadata::new())
            .await
            .unwrap();

        assert_eq!(report.chunks, 1);
        assert_eq!(report.ids.len(), 1);
        assert_eq!(memory.count("book").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ingest_short_text_is_skipped() {
        let (memory, ingestor) = setup();
        let report = ingestor.ingest_text("Too short.", "x.txt", &Metadata::new()).await.unwrap();

        assert_eq!(report, IngestReport::default());
        // 인덱스는 초기화조차 되지 않음
        assert!(memory.collection_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("one.txt"), "Paris is the capital of France, said the guide.").unwrap();
        std::fs::write(dir.path().join("two.md"), "The dragon slept beneath the capital for a century.").unwrap();
        std::fs::write(dir.path().join("skip.csv"), "a,b,c").unwrap();
        std::fs::write(dir.path().join("bad.txt"), [0xffu8, 0xfe, 0x00, 0x80]).unwrap();

        let (memory, ingestor) = setup();
        let report = ingestor.ingest_directory(dir.path(), &[]).await.unwrap();

        assert_eq!(report.files_ingested, 2);
        assert_eq!(report.files_failed, 1);
        assert_eq!(report.chunks, 2);
        assert_eq!(memory.count("book").await.unwrap(), 2);
    }
}
