//! 휴리스틱 답변 추출기
//!
//! 생성 모델 없이 컨텍스트에서 답을 뽑아내는 결정적 전략입니다.
//! - 예/아니오 질문: 긍정/부정 표지어 탐색
//! - 서술형 질문: 질문 단어가 들어 있는 문장 인용
//!
//! 문장 분리는 "." 기준이라 약어나 소수점에서 잘못 나뉠 수 있습니다.

/// 예/아니오 질문을 시작하는 조동사
const AUXILIARY_VERBS: &[&str] = &[
    "is", "are", "was", "were", "can", "could", "will", "would", "do", "does", "did", "have",
    "has", "had",
];

const AFFIRMATION_MARKERS: &[&str] = &[
    "yes", "true", "correct", "indeed", "certainly", "definitely", "exactly",
];

const NEGATION_MARKERS: &[&str] = &["no", "false", "incorrect", "not", "never", "none"];

/// 예/아니오 답변에 붙이는 컨텍스트 길이
const YES_NO_SNIPPET_CHARS: usize = 200;
/// 요약 답변 길이
const SUMMARY_CHARS: usize = 300;
/// 인용할 최대 문장 수
const MAX_QUOTED_SENTENCES: usize = 2;
/// 이 길이 이하의 질문 단어는 무시 (문자 수)
const MIN_TERM_CHARS: usize = 3;

/// 휴리스틱 추출기
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicExtractor;

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 컨텍스트만으로 답변 생성
    pub fn answer(&self, question: &str, context: &str) -> String {
        if is_yes_no_question(question) {
            self.answer_yes_no(context)
        } else {
            self.answer_open_ended(question, context)
        }
    }

    fn answer_yes_no(&self, context: &str) -> String {
        let words = lowercase_words(context);
        let has_any = |markers: &[&str]| words.iter().any(|w| markers.contains(&w.as_str()));

        if has_any(AFFIRMATION_MARKERS) {
            format!(
                "Based on the book, the answer appears to be yes. {}",
                snippet(context, YES_NO_SNIPPET_CHARS)
            )
        } else if has_any(NEGATION_MARKERS) {
            format!(
                "Based on the book, the answer appears to be no. {}",
                snippet(context, YES_NO_SNIPPET_CHARS)
            )
        } else {
            summary(context)
        }
    }

    fn answer_open_ended(&self, question: &str, context: &str) -> String {
        let terms: Vec<String> = question
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| w.chars().count() > MIN_TERM_CHARS)
            .collect();

        let matched: Vec<&str> = context
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter(|s| {
                let lower = s.to_lowercase();
                terms.iter().any(|t| lower.contains(t.as_str()))
            })
            .collect();

        if matched.is_empty() {
            return summary(context);
        }

        let quoted = matched[..matched.len().min(MAX_QUOTED_SENTENCES)].join(". ");
        if matched.len() > MAX_QUOTED_SENTENCES {
            format!("According to the book: {}...", quoted)
        } else {
            format!("According to the book: {}.", quoted)
        }
    }
}

/// 조동사로 시작하는 질문인지
pub fn is_yes_no_question(question: &str) -> bool {
    question
        .split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .map(|w| AUXILIARY_VERBS.contains(&w.as_str()))
        .unwrap_or(false)
}

/// 앞에서 `max_chars`자, 잘렸으면 "..." 추가
pub fn snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

fn summary(context: &str) -> String {
    format!("Here is what the book says: {}", snippet(context, SUMMARY_CHARS))
}

fn lowercase_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
