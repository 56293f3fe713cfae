//! 프롬프트 템플릿
//!
//! 생성 모델이 주어진 텍스트 안에서만 답하도록 제한하는 고정 템플릿입니다.

/// 전역 검색 컨텍스트가 부족할 때의 거절 문구
pub const GLOBAL_REFUSAL: &str = "I cannot answer based on the provided content.";

/// 선택 텍스트가 부족할 때의 거절 문구
pub const SELECTED_TEXT_REFUSAL: &str = "I cannot answer based on the selected text.";

const GLOBAL_TEMPLATE: &str = "You are an assistant helping users understand a published book.
Please answer the user's question based ONLY on the provided context.
If the answer is not in the provided context, say \"{refusal}\"

Context: {context}

Question: {question}

Answer:";

const SELECTED_TEXT_TEMPLATE: &str = "You are an assistant helping users understand a published book.
Please answer the user's question based ONLY on the selected text provided.
If the answer is not in the selected text, say \"{refusal}\"

Selected Text: {context}

Question: {question}

Answer:";

/// 프롬프트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    /// 검색된 책 전체 컨텍스트
    GlobalContext,
    /// 사용자가 선택한 텍스트
    SelectedText,
}

impl PromptTemplate {
    /// 컨텍스트와 질문을 채운 프롬프트
    pub fn render(&self, context: &str, question: &str) -> String {
        let template = match self {
            PromptTemplate::GlobalContext => GLOBAL_TEMPLATE,
            PromptTemplate::SelectedText => SELECTED_TEXT_TEMPLATE,
        };

        // 삽입된 컨텍스트/질문 안의 "{...}"는 다시 치환하지 않음
        let template = template.replace("{refusal}", self.refusal());
        match template.split_once("{context}") {
            Some((head, tail)) => format!(
                "{}{}{}",
                head.replace("{question}", question),
                context,
                tail.replace("{question}", question)
            ),
            None => template.replace("{question}", question),
        }
    }

    /// 답할 수 없을 때 모델이 내야 하는 문구
    pub fn refusal(&self) -> &'static str {
        match self {
            PromptTemplate::GlobalContext => GLOBAL_REFUSAL,
            PromptTemplate::SelectedText => SELECTED_TEXT_REFUSAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_render() {
        let prompt = PromptTemplate::GlobalContext.render("Paris is the capital.", "What is the capital?");
        assert!(prompt.contains("Context: Paris is the capital."));
        assert!(prompt.contains("Question: What is the capital?"));
        assert!(prompt.contains(GLOBAL_REFUSAL));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn test_selected_text_render() {
        let prompt = PromptTemplate::SelectedText.render("The sky is blue.", "What color is the sky?");
        assert!(prompt.contains("Selected Text: The sky is blue."));
        assert!(prompt.contains(SELECTED_TEXT_REFUSAL));
        assert!(!prompt.contains("{context}"));
    }

    #[test]
    fn test_braces_in_question_survive() {
        let prompt = PromptTemplate::GlobalContext.render("ctx", "What does {context} mean?");
        assert!(prompt.contains("Question: What does {context} mean?"));
    }
}
