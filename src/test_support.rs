//! 테스트 전용 대역 (임베딩, 언어 모델, 커넥터)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::generation::LanguageModel;
use crate::knowledge::{IndexBackend, IndexConnector, VectorIndex};

/// 고정 어휘 기반 임베딩
///
/// 어휘의 i번째 단어가 텍스트에 등장하면 i번째 성분이 1.0.
/// 결과가 완전히 예측 가능하므로 유사도 임계값 테스트에 사용합니다.
pub struct KeywordEmbedding {
    vocabulary: Vec<String>,
}

impl KeywordEmbedding {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        self.vocabulary
            .iter()
            .map(|v| if words.contains(v) { 1.0 } else { 0.0 })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedding {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.vocabulary.len()
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// 받은 프롬프트를 기록하고 고정 답변을 돌려주는 언어 모델
pub struct RecordingModel {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl RecordingModel {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for RecordingModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// 연결 횟수를 세는 커넥터 (연결 시 약간 지연)
pub struct CountingConnector {
    backend: IndexBackend,
    connects: Arc<AtomicUsize>,
}

impl CountingConnector {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            backend: IndexBackend { index, embedder },
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn connects(&self) -> Arc<AtomicUsize> {
        self.connects.clone()
    }
}

#[async_trait]
impl IndexConnector for CountingConnector {
    async fn connect(&self) -> Result<IndexBackend> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(self.backend.clone())
    }
}
