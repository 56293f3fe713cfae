//! RAG 모듈 - 검색 증강 답변 + 요청 모드 분기

mod dispatch;
mod service;

// Re-exports
pub use dispatch::{ChatMode, ChatRequest};
pub use service::{AnswerEnvelope, RagService, SELECTED_TEXT_REQUIRED};
