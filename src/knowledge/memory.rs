//! In-Memory Vector Index
//!
//! 프로세스 내부에서 동작하는 브루트포스 벡터 인덱스입니다.
//! 네트워크/디스크 없이 파이프라인 전체를 구동할 때 사용합니다.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::RagError;

use super::vector::{
    cosine_similarity, dot_product, rank_results, Distance, IndexedPoint, ScoredPayload,
    VectorIndex,
};

#[derive(Debug)]
struct Collection {
    dimension: usize,
    distance: Distance,
    /// 삽입 순서 유지 (id → 위치)
    positions: HashMap<String, usize>,
    points: Vec<IndexedPoint>,
}

impl Collection {
    fn new(dimension: usize, distance: Distance) -> Self {
        Self {
            dimension,
            distance,
            positions: HashMap::new(),
            points: Vec::new(),
        }
    }

    fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.distance {
            Distance::Cosine => cosine_similarity(a, b),
            Distance::Dot => dot_product(a, b),
        }
    }
}

/// 메모리 벡터 인덱스
#[derive(Debug, Default)]
pub struct MemoryVectorIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryVectorIndex {
    /// 빈 인덱스 생성
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;

        if let Some(existing) = collections.get(name) {
            if existing.dimension != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: existing.dimension,
                    actual: dimension,
                }
                .into());
            }
            return Ok(());
        }

        collections.insert(name.to_string(), Collection::new(dimension, distance));
        tracing::debug!("Created in-memory collection '{}' (dim={})", name, dimension);
        Ok(())
    }

    async fn upsert(&self, name: &str, points: Vec<IndexedPoint>) -> Result<Vec<String>> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| RagError::CollectionNotFound(name.to_string()))?;

        // 전체 검증 후 삽입 (부분 삽입 방지)
        if let Some(bad) = points.iter().find(|p| p.vector.len() != collection.dimension) {
            return Err(RagError::DimensionMismatch {
                expected: collection.dimension,
                actual: bad.vector.len(),
            }
            .into());
        }

        let mut ids = Vec::with_capacity(points.len());
        for point in points {
            ids.push(point.id.clone());
            let existing = collection.positions.get(&point.id).copied();
            match existing {
                Some(pos) => collection.points[pos] = point,
                None => {
                    collection
                        .positions
                        .insert(point.id.clone(), collection.points.len());
                    collection.points.push(point);
                }
            }
        }

        Ok(ids)
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredPayload>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| RagError::CollectionNotFound(name.to_string()))?;

        if vector.len() != collection.dimension {
            return Err(RagError::DimensionMismatch {
                expected: collection.dimension,
                actual: vector.len(),
            }
            .into());
        }

        let scored = collection
            .points
            .iter()
            .map(|p| ScoredPayload {
                id: p.id.clone(),
                payload: p.payload.clone(),
                score: collection.score(vector, &p.vector),
            })
            .collect();

        Ok(rank_results(scored, k, score_threshold))
    }

    async fn count(&self, name: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        Ok(collections.get(name).map(|c| c.points.len()).unwrap_or(0))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.write().await.remove(name);
        Ok(())
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

// ============================================================================
// Tests
// ============================================================================
