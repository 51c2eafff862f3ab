use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_rag_core::models::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_EMBEDDING_MODEL, DEFAULT_GENERATION_MODEL,
    DEFAULT_GENERATION_TIMEOUT_SECS, DEFAULT_GENERATION_URL, DEFAULT_OCR_DPI, DEFAULT_TOP_K,
};
use pdf_rag_core::{
    build_index, context_preview, select_recognizer, Answer, AnswerEngine, BuildReport,
    CharacterNgramEmbedder, GenerationOptions, LopdfExtractor, OcrEndpointConfig,
    OllamaGenerator, PipelineOptions, StackCell, CONTEXT_PREVIEW_CHARS,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Engine = AnswerEngine<CharacterNgramEmbedder, OllamaGenerator>;

#[derive(Parser)]
#[command(name = "pdf-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding index.bin and chunks.json
    #[arg(long, env = "PDF_RAG_INDEX_DIR", default_value = "data/indexes")]
    index_dir: PathBuf,

    /// Embedding model identifier; must match the one the index was built with
    #[arg(long, env = "PDF_RAG_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Number of chunks retrieved per question
    #[arg(long, env = "PDF_RAG_TOP_K", default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Base URL of the Ollama-compatible generation backend
    #[arg(long, env = "PDF_RAG_OLLAMA_URL", default_value = DEFAULT_GENERATION_URL)]
    ollama_url: String,

    /// Generation model name
    #[arg(long, env = "PDF_RAG_OLLAMA_MODEL", default_value = DEFAULT_GENERATION_MODEL)]
    ollama_model: String,

    /// Generation request timeout in seconds
    #[arg(long, env = "PDF_RAG_TIMEOUT_SECS", default_value_t = DEFAULT_GENERATION_TIMEOUT_SECS)]
    timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk and embed one PDF, then write the index artifacts.
    Build {
        /// PDF to index.
        #[arg(long)]
        pdf: PathBuf,
        /// Maximum characters per chunk.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Characters shared by consecutive chunks of a page.
        #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
        chunk_overlap: usize,
        /// Raster resolution for pages without a text layer.
        #[arg(long, default_value_t = DEFAULT_OCR_DPI)]
        ocr_dpi: u32,
        /// Tesseract language.
        #[arg(long, default_value = "eng")]
        ocr_language: String,
        /// Remote OCR endpoint; local tesseract is used when unset.
        #[arg(long, env = "PDF_RAG_OCR_ENDPOINT")]
        ocr_endpoint: Option<String>,
        /// Bearer token for the OCR endpoint.
        #[arg(long, env = "PDF_RAG_OCR_API_KEY", hide_env_values = true)]
        ocr_api_key: Option<String>,
    },
    /// Answer one question from the indexed PDF.
    Ask {
        /// Question to answer.
        #[arg(long)]
        question: String,
        /// Also print the retrieved context.
        #[arg(long, default_value_t = false)]
        show_context: bool,
    },
    /// Read questions from stdin, one per line, until EOF.
    Chat {
        /// Also print the retrieved context.
        #[arg(long, default_value_t = false)]
        show_context: bool,
    },
}

impl Cli {
    fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            embedding_model: self.embedding_model.clone(),
            top_k: self.top_k,
            ..PipelineOptions::default()
        }
        .with_index_dir(&self.index_dir)
    }

    fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            base_url: self.ollama_url.clone(),
            model: self.ollama_model.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

fn load_engine(options: &PipelineOptions, generation: &GenerationOptions) -> anyhow::Result<Engine> {
    let embedder = CharacterNgramEmbedder::from_model_id(&options.embedding_model)?;
    let generator = OllamaGenerator::new(generation)?;
    Ok(AnswerEngine::load(options, embedder, generator)?)
}

/// Extraction, OCR and embedding are blocking, so the build leaves the async
/// runtime's worker threads alone.
async fn run_build(
    pdf: PathBuf,
    options: PipelineOptions,
    embedder: CharacterNgramEmbedder,
    endpoint: Option<OcrEndpointConfig>,
    ocr_language: String,
) -> anyhow::Result<BuildReport> {
    let report = tokio::task::spawn_blocking(move || {
        let recognizer = select_recognizer(endpoint, options.ocr_dpi, &ocr_language);
        let extractor = LopdfExtractor::new(recognizer);
        build_index(&pdf, &extractor, &embedder, &options)
    })
    .await??;
    Ok(report)
}

fn print_answer(answer: &Answer, show_context: bool) {
    println!("{}", answer.text.trim());

    let mut pages = answer
        .retrieved
        .iter()
        .map(|hit| hit.page_number())
        .collect::<Vec<_>>();
    pages.sort_unstable();
    pages.dedup();
    let pages = pages
        .iter()
        .map(|page| page.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    println!("retrieved pages: {pages}");

    if show_context {
        println!("--- context ---");
        println!("{}", context_preview(&answer.context, CONTEXT_PREVIEW_CHARS));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-rag boot"
    );

    let options = cli.pipeline_options();
    let generation = cli.generation_options();

    match cli.command {
        Command::Build {
            pdf,
            chunk_size,
            chunk_overlap,
            ocr_dpi,
            ocr_language,
            ocr_endpoint,
            ocr_api_key,
        } => {
            let embedder = CharacterNgramEmbedder::from_model_id(&options.embedding_model)?;
            let options = PipelineOptions {
                chunk_size,
                chunk_overlap,
                ocr_dpi,
                ..options
            };
            let endpoint =
                OcrEndpointConfig::from_parts(ocr_endpoint.as_deref(), ocr_api_key.as_deref());

            info!(pdf = %pdf.display(), index_dir = %options.index_dir.display(), "building index");
            let report = run_build(pdf, options, embedder, endpoint, ocr_language).await?;

            if !report.dropped_pages.is_empty() {
                warn!(pages = ?report.dropped_pages, "pages without any text were skipped");
            }

            println!(
                "Index complete: {} chunks from {} pages ({} via OCR, {} dropped) at {}",
                report.chunk_count,
                report.total_pages,
                report.recognized_pages.len(),
                report.dropped_pages.len(),
                Utc::now().to_rfc3339()
            );
            println!("  index={}", report.index_path.display());
            println!("  metadata={}", report.metadata_path.display());
        }
        Command::Ask {
            question,
            show_context,
        } => {
            let engine = load_engine(&options, &generation)?;
            let answer = engine.answer(&question).await?;
            print_answer(&answer, show_context);
        }
        Command::Chat { show_context } => {
            let stack: StackCell<Engine> = StackCell::new();
            let mut lines = BufReader::new(tokio::io::stdin()).lines();

            while let Some(line) = lines.next_line().await? {
                let question = line.trim();
                if question.is_empty() {
                    continue;
                }

                let engine = stack.get_or_load(|| load_engine(&options, &generation))?;
                match engine.answer(question).await {
                    Ok(answer) => print_answer(&answer, show_context),
                    Err(error) => {
                        warn!(%error, "question failed");
                        eprintln!("error: {error}");
                    }
                }
            }
        }
    }

    Ok(())
}
