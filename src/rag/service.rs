//! RAG 답변 서비스
//!
//! 검색 → 컨텍스트 조립 → 답변 생성 파이프라인.
//! 컨텍스트가 비면 생성 단계를 건너뛰고 고정 거절 문구를 돌려줍니다.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Settings;
use crate::generation::{AnswerStrategy, PromptTemplate, GLOBAL_REFUSAL};
use crate::knowledge::{BookIndex, Metadata, RetrievedChunk};

/// 선택 텍스트 모드에 필요한 입력이 없을 때의 안내 문구
pub const SELECTED_TEXT_REQUIRED: &str =
    "Selected text and a question are required for 'selected_text_only' mode.";

/// 컨텍스트 조각 구분자
const CONTEXT_SEPARATOR: &str = "\n\n";

// ============================================================================
// AnswerEnvelope
// ============================================================================

/// 답변 + 근거 메타데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEnvelope {
    /// 답변 텍스트
    pub response: String,
    /// 답변에 사용된 청크의 메타데이터 (컨텍스트 순서)
    pub sources: Vec<Metadata>,
    /// 요청의 세션 ID (그대로 전달)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<i64>,
}

impl AnswerEnvelope {
    fn new(response: impl Into<String>, sources: Vec<Metadata>) -> Self {
        Self {
            response: response.into(),
            sources,
            session_id: None,
        }
    }

    /// 근거 없는 고정 응답
    fn bare(response: impl Into<String>) -> Self {
        Self::new(response, Vec::new())
    }

    /// 세션 ID 부착
    pub fn with_session(mut self, session_id: Option<i64>) -> Self {
        self.session_id = session_id;
        self
    }
}

// ============================================================================
// RagService
// ============================================================================

/// 검색 증강 답변 서비스
pub struct RagService {
    index: Arc<BookIndex>,
    strategy: AnswerStrategy,
    max_context_length: usize,
    top_k: usize,
}

impl RagService {
    /// 새 서비스
    ///
    /// # Arguments
    /// * `index` - 공유 책 인덱스
    /// * `strategy` - 답변 생성 전략
    /// * `max_context_length` - 컨텍스트 최대 길이 (문자 수)
    /// * `top_k` - 기본 검색 개수
    pub fn new(
        index: Arc<BookIndex>,
        strategy: AnswerStrategy,
        max_context_length: usize,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            strategy,
            max_context_length,
            top_k,
        }
    }

    /// 설정으로부터 생성 (전략은 설정에 따라 선택)
    pub fn from_settings(settings: &Settings, index: Arc<BookIndex>) -> Result<Self> {
        Ok(Self::new(
            index,
            AnswerStrategy::from_settings(settings)?,
            settings.max_context_length,
            settings.top_k,
        ))
    }

    pub fn index(&self) -> &Arc<BookIndex> {
        &self.index
    }

    pub fn strategy(&self) -> &AnswerStrategy {
        &self.strategy
    }

    /// 기본 검색 개수
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// 책 전체에서 검색해 답변
    pub async fn answer_global(&self, query: &str, k: usize) -> Result<AnswerEnvelope> {
        let chunks = self.index.similarity_search(query, k).await?;
        let context = build_context(&chunks, self.max_context_length);

        if context.trim().is_empty() {
            tracing::debug!("No relevant context for query, refusing");
            return Ok(AnswerEnvelope::bare(GLOBAL_REFUSAL));
        }

        tracing::debug!(
            "Answering with {} chunks ({} chars of context)",
            chunks.len(),
            context.chars().count()
        );

        let response = self
            .strategy
            .generate(PromptTemplate::GlobalContext, query, &context)
            .await?;
        let sources = chunks.into_iter().map(|c| c.metadata).collect();

        Ok(AnswerEnvelope::new(response, sources))
    }

    /// 사용자가 선택한 텍스트만 근거로 답변 (검색 없음)
    pub async fn answer_selected_text(
        &self,
        query: &str,
        selected_text: &str,
    ) -> Result<AnswerEnvelope> {
        if selected_text.trim().is_empty() || query.trim().is_empty() {
            return Ok(AnswerEnvelope::bare(SELECTED_TEXT_REQUIRED));
        }

        let response = self
            .strategy
            .generate(PromptTemplate::SelectedText, query, selected_text)
            .await?;

        let mut source = Metadata::new();
        source.insert("source".to_string(), Value::from("selected_text"));
        source.insert("content".to_string(), Value::from(selected_text));

        Ok(AnswerEnvelope::new(response, vec![source]))
    }
}

/// 청크 텍스트를 순서대로 이어 붙이고 최대 길이에서 자름
fn build_context(chunks: &[RetrievedChunk], max_chars: usize) -> String {
    let joined = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    if joined.chars().count() > max_chars {
        joined.chars().take(max_chars).collect()
    } else {
        joined
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::SELECTED_TEXT_REFUSAL;
    use crate::knowledge::{IndexSettings, MemoryVectorIndex, StaticConnector};
    use crate::test_support::{KeywordEmbedding, RecordingModel};
    use serde_json::json;

    const VOCAB: &[&str] = &["paris", "capital", "france", "eiffel", "tower"];

    fn book_index() -> Arc<BookIndex> {
        let connector = StaticConnector::new(
            Arc::new(MemoryVectorIndex::new()),
            Arc::new(KeywordEmbedding::new(VOCAB)),
        );
        Arc::new(BookIndex::new(
            IndexSettings {
                collection_name: "book".to_string(),
                dimension: VOCAB.len(),
                similarity_threshold: 0.7,
            },
            connector,
        ))
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_index_refuses_without_generation() {
        let model = Arc::new(RecordingModel::new("should not be used"));
        let service = RagService::new(book_index(), AnswerStrategy::generative(model.clone()), 3000, 4);

        let envelope = service.answer_global("What is the capital of France?", 4).await.unwrap();

        assert_eq!(envelope.response, "I cannot answer based on the provided content.");
        assert!(envelope.sources.is_empty());
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_unrelated_chunks_below_threshold_refuse() {
        let index = book_index();
        index
            .add_texts(&texts(&["It is known for the Eiffel Tower."]), None, None)
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 1);

        let model = Arc::new(RecordingModel::new("should not be used"));
        let service = RagService::new(index, AnswerStrategy::generative(model.clone()), 3000, 4);
        let envelope = service.answer_global("What is the capital of France?", 4).await.unwrap();

        assert_eq!(envelope.response, GLOBAL_REFUSAL);
        assert!(envelope.sources.is_empty());
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_global_answer_with_heuristic() {
        let index = book_index();
        let mut meta = Metadata::new();
        meta.insert("chunk_id".to_string(), json!(0));
        meta.insert("source_file".to_string(), json!("geo.txt"));
        index
            .add_texts(
                &texts(&["Paris is the capital of France.", "It is known for the Eiffel Tower."]),
                Some(vec![meta.clone(), Metadata::new()]),
                None,
            )
            .await
            .unwrap();

        let service = RagService::new(index, AnswerStrategy::heuristic(), 3000, 4);
        let envelope = service.answer_global("What is the capital of France?", 4).await.unwrap();

        assert_eq!(envelope.response, "According to the book: Paris is the capital of France.");
        assert_eq!(envelope.sources, vec![meta]);
    }

    #[tokio::test]
    async fn test_context_truncated_to_max_length() {
        let index = book_index();
        let long_text = format!("paris capital france {}", "x".repeat(4000));
        index.add_texts(&[long_text.clone()], None, None).await.unwrap();

        let model = Arc::new(RecordingModel::new("Paris."));
        let service = RagService::new(index, AnswerStrategy::generative(model.clone()), 3000, 4);
        let envelope = service.answer_global("capital of france", 4).await.unwrap();
        assert_eq!(envelope.response, "Paris.");

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        let expected: String = long_text.chars().take(3000).collect();
        assert!(prompts[0].contains(&format!("Context: {}\n", expected)));
        assert!(!prompts[0].contains(&long_text.chars().take(3001).collect::<String>()));
    }

    #[tokio::test]
    async fn test_context_joins_chunks_in_score_order() {
        let index = book_index();
        index
            .add_texts(
                &texts(&["The capital is Paris.", "Paris is the capital of France."]),
                None,
                None,
            )
            .await
            .unwrap();

        let model = Arc::new(RecordingModel::new("ok"));
        let service = RagService::new(index, AnswerStrategy::generative(model.clone()), 3000, 4);
        service.answer_global("Paris capital of France", 4).await.unwrap();

        let prompts = model.prompts();
        assert!(prompts[0].contains(
            "Context: Paris is the capital of France.\n\nThe capital is Paris.\n"
        ));
    }

    #[tokio::test]
    async fn test_selected_text_answer() {
        let model = Arc::new(RecordingModel::new("Blue."));
        let service = RagService::new(book_index(), AnswerStrategy::generative(model.clone()), 10, 4);

        let selected = "The sky is blue. The grass is green and very long indeed.";
        let envelope = service
            .answer_selected_text("What color is the sky?", selected)
            .await
            .unwrap();

        assert_eq!(envelope.response, "Blue.");
        assert_eq!(
            serde_json::to_value(&envelope.sources).unwrap(),
            json!([{"source": "selected_text", "content": selected}])
        );
        // 선택 텍스트는 길이 제한 없이 그대로 전달
        assert!(model.prompts()[0].contains(&format!("Selected Text: {}\n", selected)));
        assert!(model.prompts()[0].contains(SELECTED_TEXT_REFUSAL));
    }

    #[tokio::test]
    async fn test_selected_text_requires_inputs() {
        let model = Arc::new(RecordingModel::new("unused"));
        let service = RagService::new(book_index(), AnswerStrategy::generative(model.clone()), 3000, 4);

        for (query, selected) in [("Why?", "   "), ("", "Some text."), ("Why?", "")] {
            let envelope = service.answer_selected_text(query, selected).await.unwrap();
            assert_eq!(envelope.response, SELECTED_TEXT_REQUIRED);
            assert!(envelope.sources.is_empty());
        }
        assert!(model.prompts().is_empty());
        assert!(!service.index().is_initialized());
    }

    #[test]
    fn test_envelope_serialization() {
        let envelope = AnswerEnvelope::bare("hi");
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"response": "hi", "sources": []})
        );
        let envelope = envelope.with_session(Some(7));
        assert_eq!(serde_json::to_value(&envelope).unwrap()["session_id"], 7);
    }

    #[test]
    fn test_build_context_multibyte_truncation() {
        let chunks = vec![RetrievedChunk {
            id: "a".to_string(),
            text: "가나다라마".to_string(),
            metadata: Metadata::new(),
            score: 1.0,
        }];
        assert_eq!(build_context(&chunks, 3), "가나다");
        assert_eq!(build_context(&chunks, 10), "가나다라마");
    }
}
