//! 답변 생성 모듈
//!
//! 같은 입력(질문 + 컨텍스트)에 대해 바꿔 끼울 수 있는 두 전략을 제공합니다.
//! - Generative: 외부 언어 모델 호출
//! - Heuristic: 생성 모델 없이 컨텍스트에서 결정적으로 추출
//!
//! 전략은 생성 시점에 한 번 정해집니다.

mod gemini;
mod heuristic;
mod prompt;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{Settings, StrategyKind};
use crate::embedding::has_api_key;

// Re-exports
pub use gemini::GeminiGenerator;
pub use heuristic::{is_yes_no_question, snippet, HeuristicExtractor};
pub use prompt::{PromptTemplate, GLOBAL_REFUSAL, SELECTED_TEXT_REFUSAL};

// ============================================================================
// LanguageModel Trait
// ============================================================================

/// 생성 언어 모델 트레이트
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 프롬프트 완성
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// AnswerStrategy
// ============================================================================

/// 답변 생성 전략
#[derive(Clone)]
pub enum AnswerStrategy {
    /// 외부 언어 모델 + 고정 템플릿
    Generative(Arc<dyn LanguageModel>),
    /// 결정적 휴리스틱 추출
    Heuristic(HeuristicExtractor),
}

impl AnswerStrategy {
    /// 휴리스틱 전략
    pub fn heuristic() -> Self {
        Self::Heuristic(HeuristicExtractor::new())
    }

    /// 생성 모델 전략
    pub fn generative(model: Arc<dyn LanguageModel>) -> Self {
        Self::Generative(model)
    }

    /// 설정에 따라 전략 선택
    ///
    /// - `Auto`: API 키가 있으면 Gemini, 없으면 휴리스틱
    /// - `Generative`: API 키 필수 (없으면 MissingCredentials)
    /// - `Heuristic`: 항상 휴리스틱
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let strategy = match settings.answer_strategy {
            StrategyKind::Heuristic => Self::heuristic(),
            StrategyKind::Generative => Self::generative(Arc::new(GeminiGenerator::from_env(
                &settings.generation_model,
            )?)),
            StrategyKind::Auto if has_api_key() => Self::generative(Arc::new(
                GeminiGenerator::from_env(&settings.generation_model)?,
            )),
            StrategyKind::Auto => Self::heuristic(),
        };

        tracing::info!("Answer strategy: {}", strategy.name());
        Ok(strategy)
    }

    /// 전략 이름
    pub fn name(&self) -> &str {
        match self {
            Self::Generative(model) => model.name(),
            Self::Heuristic(_) => "heuristic",
        }
    }

    /// 컨텍스트만 근거로 답변 생성
    ///
    /// 빈 컨텍스트 처리는 호출자가 담당합니다.
    pub async fn generate(
        &self,
        template: PromptTemplate,
        question: &str,
        context: &str,
    ) -> Result<String> {
        match self {
            Self::Generative(model) => {
                let prompt = template.render(context, question);
                let answer = model.complete(&prompt).await?;
                let answer = answer.trim();

                if answer.is_empty() {
                    tracing::warn!("Language model returned an empty answer");
                    return Ok(template.refusal().to_string());
                }
                Ok(answer.to_string())
            }
            Self::Heuristic(extractor) => Ok(extractor.answer(question, context)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
