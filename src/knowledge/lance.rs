//! LanceDB Vector Index - 디스크 기반 벡터 인덱스
//!
//! 컬렉션 하나를 LanceDB 테이블 하나로 저장합니다.
//! 컬럼: `id`, `text`, `metadata`(JSON 문자열), `vector`(FixedSizeList<f32>)
//!
//! ref: https://lancedb.github.io/lancedb/

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::table::Table;
use lancedb::DistanceType;
use tokio::sync::RwLock;

use crate::error::RagError;

use super::vector::{
    rank_results, ChunkPayload, Distance, IndexedPoint, Metadata, ScoredPayload, VectorIndex,
};

const ID_COLUMN: &str = "id";
const TEXT_COLUMN: &str = "text";
const METADATA_COLUMN: &str = "metadata";
const VECTOR_COLUMN: &str = "vector";
/// LanceDB가 검색 결과에 자동으로 추가하는 거리 컬럼
const DISTANCE_COLUMN: &str = "_distance";

// ============================================================================
// LanceVectorIndex
// ============================================================================

/// LanceDB 벡터 인덱스 구현
///
/// Apache Arrow 기반 columnar 저장소로 로컬 디렉토리에 영속화됩니다.
pub struct LanceVectorIndex {
    db: Connection,
    /// 컬렉션별 거리 척도 (LanceDB는 테이블에 저장하지 않음)
    distances: RwLock<HashMap<String, Distance>>,
}

impl LanceVectorIndex {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    pub async fn open(path: &Path) -> Result<Self> {
        // 부모 디렉토리 생성
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self {
            db,
            distances: RwLock::new(HashMap::new()),
        })
    }

    /// 컬렉션 테이블 스키마
    fn create_schema(dimension: usize) -> Result<Schema> {
        let dimension = i32::try_from(dimension)
            .map_err(|_| RagError::InvalidConfig(format!("dimension {} too large", dimension)))?;

        Ok(Schema::new(vec![
            Field::new(ID_COLUMN, DataType::Utf8, false),
            Field::new(TEXT_COLUMN, DataType::Utf8, false),
            Field::new(METADATA_COLUMN, DataType::Utf8, false),
            Field::new(
                VECTOR_COLUMN,
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension,
                ),
                false,
            ),
        ]))
    }

    /// 포인트들을 Arrow RecordBatch로 변환
    fn points_to_batch(points: &[IndexedPoint], dimension: usize) -> Result<RecordBatch> {
        if points.is_empty() {
            anyhow::bail!("Cannot create batch from empty points");
        }

        if let Some(bad) = points.iter().find(|p| p.vector.len() != dimension) {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: bad.vector.len(),
            }
            .into());
        }

        let ids: Vec<&str> = points.iter().map(|p| p.id.as_str()).collect();
        let texts: Vec<&str> = points.iter().map(|p| p.payload.text.as_str()).collect();
        let metadata: Vec<String> = points
            .iter()
            .map(|p| serde_json::to_string(&p.payload.metadata))
            .collect::<std::result::Result<_, _>>()
            .context("Failed to serialize chunk metadata")?;

        // 임베딩을 FixedSizeList로 변환
        let vectors_flat: Vec<f32> = points
            .iter()
            .flat_map(|p| p.vector.iter().copied())
            .collect();

        let schema = Self::create_schema(dimension)?;
        let values = Float32Array::from(vectors_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vectors = FixedSizeListArray::try_new(
            field,
            dimension as i32,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create vector array")?;

        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(metadata)),
                Arc::new(vectors),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// 검색 결과 RecordBatch를 ScoredPayload로 변환
    fn batch_to_results(batch: &RecordBatch) -> Result<Vec<ScoredPayload>> {
        let ids = string_column(batch, ID_COLUMN)?;
        let texts = string_column(batch, TEXT_COLUMN)?;
        let metadata = string_column(batch, METADATA_COLUMN)?;
        let distances = batch
            .column_by_name(DISTANCE_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| anyhow::anyhow!("Missing {} column", DISTANCE_COLUMN))?;

        let mut results = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            let metadata: Metadata = serde_json::from_str(metadata.value(i))
                .context("Failed to parse stored chunk metadata")?;

            results.push(ScoredPayload {
                id: ids.value(i).to_string(),
                payload: ChunkPayload {
                    text: texts.value(i).to_string(),
                    metadata,
                },
                // cosine/dot 거리 = 1 - 유사도
                score: 1.0 - distances.value(i),
            });
        }

        Ok(results)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self, name: &str) -> Result<bool> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .context("Failed to list LanceDB tables")?;
        Ok(names.iter().any(|n| n == name))
    }

    /// 기존 테이블 열기 (없으면 CollectionNotFound)
    async fn open_table(&self, name: &str) -> Result<Table> {
        if !self.table_exists(name).await? {
            return Err(RagError::CollectionNotFound(name.to_string()).into());
        }

        self.db
            .open_table(name)
            .execute()
            .await
            .with_context(|| format!("Failed to open table '{}'", name))
    }

    /// 테이블의 벡터 차원
    async fn table_dimension(table: &Table) -> Result<usize> {
        let schema = table.schema().await.context("Failed to read table schema")?;
        let field = schema
            .field_with_name(VECTOR_COLUMN)
            .context("Table has no vector column")?;

        match field.data_type() {
            DataType::FixedSizeList(_, size) => Ok(*size as usize),
            other => anyhow::bail!("Unexpected vector column type: {:?}", other),
        }
    }

    /// 기존 테이블의 차원이 요청과 같은지 확인
    async fn check_existing(&self, name: &str, dimension: usize) -> Result<()> {
        let table = self.open_table(name).await?;
        let existing = Self::table_dimension(&table).await?;
        if existing != dimension {
            return Err(RagError::DimensionMismatch {
                expected: existing,
                actual: dimension,
            }
            .into());
        }
        Ok(())
    }

    async fn distance_for(&self, name: &str) -> Distance {
        self.distances
            .read()
            .await
            .get(name)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<()> {
        if self.table_exists(name).await? {
            self.check_existing(name, dimension).await?;
        } else {
            let schema = Arc::new(Self::create_schema(dimension)?);
            let created = self.db.create_empty_table(name, schema).execute().await;

            if let Err(e) = created {
                // 다른 프로세스가 먼저 만든 경우는 정상
                if !self.table_exists(name).await? {
                    return Err(anyhow::Error::new(e)
                        .context(format!("Failed to create table '{}'", name)));
                }
                self.check_existing(name, dimension).await?;
            } else {
                tracing::info!("Created LanceDB collection '{}' (dim={})", name, dimension);
            }
        }

        self.distances
            .write()
            .await
            .insert(name.to_string(), distance);
        Ok(())
    }

    async fn upsert(&self, name: &str, points: Vec<IndexedPoint>) -> Result<Vec<String>> {
        if points.is_empty() {
            return Ok(vec![]);
        }

        let table = self.open_table(name).await?;
        let dimension = Self::table_dimension(&table).await?;
        let batch = Self::points_to_batch(&points, dimension)?;
        let schema = batch.schema();

        // id 기준 merge: 있으면 덮어쓰기, 없으면 삽입
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
        let mut merge = table.merge_insert(&[ID_COLUMN]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge
            .execute(Box::new(batches))
            .await
            .context("Failed to upsert vectors")?;

        Ok(points.into_iter().map(|p| p.id).collect())
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredPayload>> {
        let table = self.open_table(name).await?;
        let dimension = Self::table_dimension(&table).await?;
        if vector.len() != dimension {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            }
            .into());
        }

        let distance_type = match self.distance_for(name).await {
            Distance::Cosine => DistanceType::Cosine,
            Distance::Dot => DistanceType::Dot,
        };

        let stream = table
            .vector_search(vector.to_vec())
            .context("Failed to create vector search")?
            .column(VECTOR_COLUMN)
            .distance_type(distance_type)
            .limit(k)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .context("Failed to read vector search results")?;

        let mut results = Vec::new();
        for batch in &batches {
            results.extend(Self::batch_to_results(batch)?);
        }

        Ok(rank_results(results, k, score_threshold))
    }

    async fn count(&self, name: &str) -> Result<usize> {
        if !self.table_exists(name).await? {
            return Ok(0);
        }

        let table = self.open_table(name).await?;
        let count = table.count_rows(None).await.context("Failed to count rows")?;
        Ok(count)
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        if self.table_exists(name).await? {
            self.db
                .drop_table(name)
                .await
                .with_context(|| format!("Failed to drop table '{}'", name))?;
            tracing::info!("Dropped LanceDB collection '{}'", name);
        }

        self.distances.write().await.remove(name);
        Ok(())
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        self.db
            .table_names()
            .execute()
            .await
            .context("Failed to list LanceDB tables")
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
}

// ============================================================================
// Tests
// ============================================================================
