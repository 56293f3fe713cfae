//! CLI 모듈
//!
//! book-rag CLI 명령어 정의 및 구현

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::collector::{CollectionStats, CollectorConfig, FileCollector};
use crate::config::{Settings, StrategyKind};
use crate::embedding::has_api_key;
use crate::knowledge::{
    recursive_chunker, BookIndex, Ingestor, LanceVectorIndex, Metadata, VectorIndex,
};
use crate::rag::{AnswerEnvelope, ChatRequest, RagService};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "book-rag")]
#[command(version, about = "책 본문 기반 질의응답 RAG 시스템", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 책 원고 파일 또는 폴더를 인덱스에 추가
    Ingest {
        /// 인제스트할 파일 경로
        #[arg(short, long, conflicts_with = "dir", required_unless_present = "dir")]
        file: Option<PathBuf>,

        /// 인제스트할 폴더 경로 (재귀)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// 폴더 인제스트 시 확장자 (쉼표 구분)
        #[arg(short, long, value_delimiter = ',', default_value = "txt,md")]
        extensions: Vec<String>,
    },

    /// 책 내용에 대해 질문
    Ask {
        /// 질문
        query: String,

        /// 모드 (global | selected_text_only)
        #[arg(short, long, default_value = "global")]
        mode: String,

        /// 선택 텍스트 (selected_text_only 모드)
        #[arg(short, long)]
        selected_text: Option<String>,

        /// 검색할 청크 수
        #[arg(short, long)]
        k: Option<usize>,

        /// 세션 ID (응답에 그대로 포함)
        #[arg(long)]
        session_id: Option<i64>,

        /// 답변 전략 (auto | generative | heuristic)
        #[arg(long)]
        strategy: Option<StrategyKind>,

        /// JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 상태 확인
    Status,

    /// 컬렉션 전체 삭제
    Reset {
        /// 확인 없이 삭제
        #[arg(long)]
        yes: bool,
    },
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env().context("설정 로드 실패")?;

    match cli.command {
        Commands::Ingest {
            file,
            dir,
            extensions,
        } => cmd_ingest(&settings, file, dir, extensions).await,
        Commands::Ask {
            query,
            mode,
            selected_text,
            k,
            session_id,
            strategy,
            json,
        } => {
            let request = ChatRequest {
                query,
                mode,
                selected_text,
                session_id,
            };
            cmd_ask(settings, request, k, strategy, json).await
        }
        Commands::Status => cmd_status(&settings).await,
        Commands::Reset { yes } => cmd_reset(&settings, yes).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn require_api_key() -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }
    Ok(())
}

/// 인제스트 명령어 (ingest)
///
/// 파일 또는 폴더의 텍스트를 청크로 나눠 벡터 인덱스에 저장합니다.
async fn cmd_ingest(
    settings: &Settings,
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    extensions: Vec<String>,
) -> Result<()> {
    require_api_key()?;

    let index = Arc::new(BookIndex::from_settings(settings));
    let chunker = recursive_chunker(settings.chunk_config())?;
    let ingestor = Ingestor::new(index, chunker);

    if let Some(ref file_path) = file {
        println!("[*] 파일 인제스트 중: {}", file_path.display());

        let mut extra = Metadata::new();
        extra.insert("source".to_string(), Value::from("manual_ingestion"));

        let report = ingestor
            .ingest_file(file_path, &extra)
            .await
            .context("파일 인제스트 실패")?;

        if report.chunks == 0 {
            println!("[!] 저장할 청크가 없습니다 (내용이 너무 짧음).");
        } else {
            println!("[OK] {} 청크 저장됨", report.chunks);
        }
        return Ok(());
    }

    let Some(dir_path) = dir else {
        bail!("--file 또는 --dir 중 하나를 지정해야 합니다");
    };

    // 대상 미리보기
    let config = CollectorConfig::default().with_extensions(&extensions);
    let files = FileCollector::new(config).collect_directory(&dir_path)?;
    if files.is_empty() {
        println!("[!] 수집할 파일이 없습니다.");
        return Ok(());
    }

    let stats = CollectionStats::from_files(&files);
    println!("[*] 수집 대상: {} 파일", stats.total_files);
    println!("    총 크기: {}", format_bytes(stats.total_size as usize));
    println!();

    let report = ingestor
        .ingest_directory(&dir_path, &extensions)
        .await
        .context("폴더 인제스트 실패")?;

    println!(
        "[OK] 완료: 성공 {}, 실패 {}, 청크 {}",
        report.files_ingested, report.files_failed, report.chunks
    );

    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(
    mut settings: Settings,
    request: ChatRequest,
    k: Option<usize>,
    strategy: Option<StrategyKind>,
    json: bool,
) -> Result<()> {
    if let Some(strategy) = strategy {
        settings.answer_strategy = strategy;
    }
    if let Some(k) = k {
        if k == 0 {
            bail!("--k는 1 이상이어야 합니다");
        }
        settings.top_k = k;
    }

    let index = Arc::new(BookIndex::from_settings(&settings));
    let service = RagService::from_settings(&settings, index).context("답변 서비스 초기화 실패")?;

    tracing::debug!(
        "Asking in mode '{}' with strategy '{}'",
        request.mode,
        service.strategy().name()
    );

    let envelope = service.process(&request).await.context("답변 생성 실패")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        print_envelope(&envelope);
    }

    Ok(())
}

fn print_envelope(envelope: &AnswerEnvelope) {
    println!("{}", envelope.response);

    if envelope.sources.is_empty() {
        return;
    }

    println!("\n[*] 출처 ({} 건):", envelope.sources.len());
    for (i, source) in envelope.sources.iter().enumerate() {
        println!("  {}. {}", i + 1, describe_source(source));
    }
}

/// 출처 메타데이터 한 줄 요약
fn describe_source(source: &Metadata) -> String {
    if let Some(content) = source.get("content").and_then(Value::as_str) {
        return format!("선택 텍스트: {}", truncate_text(content, 80));
    }

    let file = source
        .get("source_file")
        .and_then(Value::as_str)
        .unwrap_or("-");
    match source.get("chunk_id") {
        Some(chunk_id) => format!("{} (chunk {})", file, chunk_id),
        None => file.to_string(),
    }
}

/// 상태 명령어 (status)
async fn cmd_status(settings: &Settings) -> Result<()> {
    println!("book-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", settings.data_dir.display());
    println!("[*] 컬렉션: {}", settings.collection_name);
    println!(
        "[*] 임베딩 차원: {} / 유사도 임계값: {}",
        settings.embedding_dimension, settings.similarity_threshold
    );
    println!(
        "[*] 청크: {}자 (오버랩 {}자) / 컨텍스트 최대 {}자",
        settings.chunk_size, settings.chunk_overlap, settings.max_context_length
    );

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정 (휴리스틱 답변만 가능, 인제스트/검색 불가)");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    // 벡터 저장소는 API 키 없이도 열 수 있음
    match LanceVectorIndex::open(&settings.lance_path()).await {
        Ok(store) => match store.count(&settings.collection_name).await {
            Ok(count) => println!("[OK] 벡터 인덱스: {} 청크", count),
            Err(e) => println!("[!] 벡터 인덱스 조회 실패: {}", e),
        },
        Err(e) => {
            println!("[!] 벡터 저장소 열기 실패: {}", e);
        }
    }

    Ok(())
}

/// 초기화 명령어 (reset)
async fn cmd_reset(settings: &Settings, yes: bool) -> Result<()> {
    if !yes {
        bail!(
            "컬렉션 '{}'의 모든 청크가 삭제됩니다. 계속하려면 --yes를 지정하세요",
            settings.collection_name
        );
    }

    let store = LanceVectorIndex::open(&settings.lance_path())
        .await
        .context("벡터 저장소 열기 실패")?;
    store
        .delete_collection(&settings.collection_name)
        .await
        .context("컬렉션 삭제 실패")?;

    println!("[OK] 컬렉션 '{}' 삭제됨", settings.collection_name);
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
