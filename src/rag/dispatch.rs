//! 요청 모드 분기
//!
//! `mode` 문자열에 따라 전역 검색 또는 선택 텍스트 답변으로 보냅니다.
//! 알 수 없는 모드는 에러가 아니라 전역 검색으로 처리합니다.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::service::{AnswerEnvelope, RagService, SELECTED_TEXT_REQUIRED};

/// 채팅 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatMode {
    /// 책 전체 검색
    #[default]
    Global,
    /// 선택 텍스트만 사용
    SelectedTextOnly,
}

impl ChatMode {
    /// 모드 문자열 해석 (인식하지 못한 값은 Global)
    pub fn parse(mode: &str) -> Self {
        match mode {
            "selected_text_only" => Self::SelectedTextOnly,
            "global" => Self::Global,
            other => {
                tracing::debug!("Unknown chat mode '{}', falling back to global", other);
                Self::Global
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::SelectedTextOnly => "selected_text_only",
        }
    }
}

fn default_mode() -> String {
    ChatMode::Global.as_str().to_string()
}

/// 채팅 요청
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub selected_text: Option<String>,
    #[serde(default)]
    pub session_id: Option<i64>,
}

impl ChatRequest {
    /// 전역 모드 요청
    pub fn global(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: default_mode(),
            selected_text: None,
            session_id: None,
        }
    }

    /// 선택 텍스트 모드 요청
    pub fn selected_text(query: impl Into<String>, selected_text: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: ChatMode::SelectedTextOnly.as_str().to_string(),
            selected_text: Some(selected_text.into()),
            session_id: None,
        }
    }

    pub fn chat_mode(&self) -> ChatMode {
        ChatMode::parse(&self.mode)
    }
}

impl RagService {
    /// 모드에 맞는 답변 경로로 요청 처리
    pub async fn process(&self, request: &ChatRequest) -> Result<AnswerEnvelope> {
        let envelope = match request.chat_mode() {
            ChatMode::SelectedTextOnly => match request.selected_text.as_deref() {
                Some(selected) => self.answer_selected_text(&request.query, selected).await?,
                None => AnswerEnvelope {
                    response: SELECTED_TEXT_REQUIRED.to_string(),
                    sources: Vec::new(),
                    session_id: None,
                },
            },
            ChatMode::Global => self.answer_global(&request.query, self.top_k()).await?,
        };

        Ok(envelope.with_session(request.session_id))
    }
}

// ============================================================================
// Tests
// ============================================================================
