//! Text Preprocessing & Chunking Module
//!
//! 원문 텍스트를 정규화하고 임베딩에 적합한 크기의 청크로 나눕니다.
//!
//! - 정규화: 공백 연속을 하나로 줄이되 문단 경계(빈 줄)는 유지
//! - 분할: 문단 → 문장 → 단어 → 문자 순으로 경계를 찾는 재귀 분할
//! - 오버랩: 이전 청크 끝부분을 다음 청크 앞에 반복
//! - 필터: 20자 이하의 조각은 버림

use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::error::RagError;

/// 두 개 이상의 줄바꿈 (사이의 가로 공백 포함) = 문단 경계
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[^\S\n]*\n\s*").expect("Invalid regex"));

/// 분할 경계 (큰 구조부터): 문단, 문장, 단어, 문자
const SEPARATORS: [&str; 4] = ["\n\n", ". ", " ", ""];

/// 문단 구분자 (정규화 결과에 사용)
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 오버랩 크기 (문자 수)
    pub chunk_overlap: usize,
    /// 이 길이 이하(trim 기준)의 청크는 버림
    pub min_chunk_chars: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            min_chunk_chars: 20,
        }
    }
}

impl ChunkConfig {
    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidConfig("chunk size must be positive".into()).into());
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            ))
            .into());
        }
        Ok(())
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 원문 텍스트를 정규화 후 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// Normalization
// ============================================================================

/// 텍스트 정규화
///
/// 모든 공백 연속을 공백 하나로 바꾸고, 문단 경계는 `"\n\n"`으로 남깁니다.
/// 줄 바꿈으로 인한 단순 개행은 제거됩니다.
pub fn preprocess(raw: &str) -> String {
    PARAGRAPH_BREAK
        .split(raw)
        .map(|para| para.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|para| !para.is_empty())
        .collect::<Vec<_>>()
        .join(PARAGRAPH_SEPARATOR)
}

// ============================================================================
// RecursiveChunker
// ============================================================================

/// 재귀 경계 탐색 청커
///
/// 가장 큰 구조 경계(문단)부터 시도해서 `chunk_size` 이하가 될 때까지
/// 더 작은 경계(문장, 단어, 문자)로 내려갑니다.
/// 구분자는 조각 끝에 붙여 두므로 공백 외의 내용은 잃지 않습니다.
pub struct RecursiveChunker {
    config: ChunkConfig,
}

impl RecursiveChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 기본 설정으로 생성 (500자, 오버랩 50자)
    pub fn with_defaults() -> Self {
        Self {
            config: ChunkConfig::default(),
        }
    }

    /// 현재 설정
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// 정규화된 텍스트를 청크로 분할 (짧은 조각 필터 포함)
    pub fn split(&self, normalized: &str) -> Vec<String> {
        if normalized.trim().is_empty() {
            return vec![];
        }

        let mut chunks = self.split_recursive(normalized, &SEPARATORS);
        chunks.retain(|c| char_len(c.trim()) > self.config.min_chunk_chars);
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // 텍스트에 존재하는 가장 큰 경계 선택 ("" 는 항상 매치)
        let mut separator = "";
        let mut finer: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() || text.contains(sep) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        for piece in split_keep_separator(text, separator) {
            if char_len(&piece) <= self.config.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge_pieces(&pending));
                pending.clear();
            }

            if finer.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_recursive(&piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_pieces(&pending));
        }

        chunks
    }

    /// 작은 조각들을 `chunk_size` 이하로 병합하면서 오버랩 적용
    ///
    /// 남길 조각이 오버랩보다 길어 창이 비면, 직전 청크의 끝
    /// `chunk_overlap`자 이내를 단어 경계에서 잘라 다음 청크 앞에 둡니다.
    fn merge_pieces(&self, pieces: &[String]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut merged = Vec::new();
        let mut window: VecDeque<Cow<'_, str>> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);

            if total + len > size && !window.is_empty() {
                let emitted = push_joined(&window, &mut merged);

                // 오버랩 크기만큼만 남기고 앞에서부터 제거
                while total > overlap || (total + len > size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(&front),
                        None => break,
                    }
                }

                if window.is_empty() && overlap > 0 {
                    if let Some(emitted) = emitted {
                        let tail = overlap_tail(&emitted, overlap);
                        let seed_len = char_len(tail) + 1;
                        if !tail.is_empty() && seed_len + len <= size {
                            window.push_back(Cow::Owned(format!("{} ", tail)));
                            total = seed_len;
                        }
                    }
                }
            }

            window.push_back(Cow::Borrowed(piece.as_str()));
            total += len;
        }

        push_joined(&window, &mut merged);
        merged
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        self.split(&preprocess(text))
    }

    fn name(&self) -> &'static str {
        "RecursiveChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 문자 수 (바이트가 아님)
#[inline]
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// 구분자를 앞 조각 끝에 유지하며 분할. 빈 구분자는 문자 단위 분할.
fn split_keep_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    text.split_inclusive(separator)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

/// 창의 조각들을 이어 붙여 출력에 추가하고, 추가된 청크를 반환
fn push_joined(window: &VecDeque<Cow<'_, str>>, out: &mut Vec<String>) -> Option<String> {
    let joined: String = window.iter().map(|p| p.as_ref()).collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        return None;
    }
    out.push(trimmed.to_string());
    Some(trimmed.to_string())
}

/// 끝에서 최대 `max_chars`자, 단어 중간에서 시작하지 않도록 자름
///
/// 그 범위에 단어 경계가 없으면 빈 문자열.
fn overlap_tail(text: &str, max_chars: usize) -> &str {
    let total = char_len(text);
    if total <= max_chars {
        return text;
    }

    let start = text
        .char_indices()
        .nth(total - max_chars)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let tail = &text[start..];

    if text[..start].ends_with(char::is_whitespace) {
        return tail.trim_start();
    }
    match tail.find(char::is_whitespace) {
        Some(pos) => tail[pos..].trim_start(),
        None => "",
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(RecursiveChunker::with_defaults())
}

/// 설정을 지정한 청커 생성
pub fn recursive_chunker(config: ChunkConfig) -> Result<Box<dyn Chunker>> {
    Ok(Box::new(RecursiveChunker::new(config)?))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_words(count: usize) -> String {
        (0..count)
            .map(|i| format!("w{:04}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn non_whitespace(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_preprocess_collapses_whitespace() {
        assert_eq!(preprocess("Hello   world\nagain\t here "), "Hello world again here");
    }

    #[test]
    fn test_preprocess_preserves_paragraphs() {
        let raw = "Para one\nwrapped line\n\n\n   Para two\r\n \r\nPara three";
        assert_eq!(
            preprocess(raw),
            "Para one wrapped line\n\nPara two\n\nPara three"
        );
    }

    #[test]
    fn test_preprocess_empty() {
        assert_eq!(preprocess(""), "");
        assert_eq!(preprocess(" \n\n \t"), "");
    }

    #[test]
    fn test_split_empty() {
        let chunker = RecursiveChunker::with_defaults();
        assert!(chunker.split("").is_empty());
        assert!(chunker.chunk("   ").is_empty());
    }

    #[test]
    fn test_short_fragments_are_dropped() {
        let chunker = RecursiveChunker::with_defaults();
        // 정확히 20자는 버림
        assert!(chunker.split("twenty chars exactly").is_empty());
        assert_eq!(
            chunker.split("twenty-one characters"),
            vec!["twenty-one characters".to_string()]
        );
    }

    #[test]
    fn test_chunks_respect_size_and_minimum() {
        let chunker = RecursiveChunker::with_defaults();
        let text = (0..60)
            .map(|i| format!("Sentence number {} talks about chapter {} of the book.", i, i / 10))
            .collect::<Vec<_>>()
            .join(" ");

        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 500, "chunk too long: {}", char_len(chunk));
            assert!(char_len(chunk.trim()) > 20);
        }
    }

    #[test]
    fn test_paragraph_boundaries_preferred() {
        let config = ChunkConfig {
            chunk_size: 60,
            chunk_overlap: 0,
            min_chunk_chars: 20,
        };
        let chunker = RecursiveChunker::new(config).unwrap();
        let text = "The first paragraph is short enough.\n\nThe second paragraph is also short.";

        let chunks = chunker.split(text);
        assert_eq!(
            chunks,
            vec![
                "The first paragraph is short enough.".to_string(),
                "The second paragraph is also short.".to_string(),
            ]
        );
    }

    #[test]
    fn test_overlap_repeats_trailing_content() {
        let config = ChunkConfig {
            chunk_size: 100,
            chunk_overlap: 30,
            min_chunk_chars: 20,
        };
        let chunker = RecursiveChunker::new(config).unwrap();
        let chunks = chunker.split(&numbered_words(80));

        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let first_word = pair[1].split_whitespace().next().unwrap();
            assert!(
                pair[0].contains(first_word),
                "'{}' should overlap with previous chunk",
                first_word
            );
        }
    }

    #[test]
    fn test_overlap_carried_between_sentence_chunks() {
        let chunker = RecursiveChunker::with_defaults();
        let text = (0..40)
            .map(|i| format!("Sentence number {} describes the harbour town and its long quiet winter.", i))
            .collect::<Vec<_>>()
            .join(" ");

        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            assert!(char_len(&pair[1]) <= 500);
            let opening = pair[1].split_whitespace().take(3).collect::<Vec<_>>().join(" ");
            let previous_end: String = {
                let skip = char_len(&pair[0]).saturating_sub(50);
                pair[0].chars().skip(skip).collect()
            };
            assert!(
                previous_end.contains(&opening),
                "'{}' should repeat the end of the previous chunk",
                opening
            );
        }
    }

    #[test]
    fn test_overlap_tail_starts_on_word() {
        assert_eq!(overlap_tail("alpha beta gamma", 8), "gamma");
        assert_eq!(overlap_tail("alpha beta gamma", 10), "beta gamma");
        assert_eq!(overlap_tail("short", 10), "short");
        assert_eq!(overlap_tail("unbrokenrun", 4), "");
    }

    #[test]
    fn test_no_content_lost_without_overlap() {
        let config = ChunkConfig {
            chunk_size: 120,
            chunk_overlap: 0,
            min_chunk_chars: 20,
        };
        let chunker = RecursiveChunker::new(config).unwrap();
        let raw = format!(
            "{}.\n\n{}. {}",
            numbered_words(30),
            numbered_words(25),
            numbered_words(40)
        );
        let normalized = preprocess(&raw);

        let chunks = chunker.split(&normalized);
        assert_eq!(non_whitespace(&chunks.concat()), non_whitespace(&normalized));
    }

    #[test]
    fn test_no_content_lost_with_overlap() {
        let chunker = RecursiveChunker::with_defaults();
        let text = numbered_words(400);

        let chunks = chunker.chunk(&text);
        for word in text.split_whitespace() {
            assert!(chunks.iter().any(|c| c.contains(word)), "missing {}", word);
        }
    }

    #[test]
    fn test_unbreakable_run_split_by_character() {
        let chunker = RecursiveChunker::with_defaults();
        let text = "a".repeat(1200);

        let chunks = chunker.split(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(char_len(&chunks[0]), 500);
        assert_eq!(char_len(&chunks[1]), 500);
        assert_eq!(char_len(&chunks[2]), 300);
    }

    #[test]
    fn test_multibyte_lengths_counted_in_chars() {
        let config = ChunkConfig {
            chunk_size: 50,
            chunk_overlap: 10,
            min_chunk_chars: 5,
        };
        let chunker = RecursiveChunker::new(config).unwrap();
        let text = "안녕하세요 세계입니다. ".repeat(20);

        let chunks = chunker.chunk(&text);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(char_len(chunk) <= 50);
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ChunkConfig {
            chunk_size: 10,
            chunk_overlap: 10,
            min_chunk_chars: 0,
        };
        assert!(RecursiveChunker::new(config).is_err());
    }
}
