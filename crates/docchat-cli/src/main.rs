//! Docchat CLI
//!
//! Usage:
//!   docchat ingest <path> [--ask <question>]
//!   docchat chat <question> [--conversation <id>] [--ingest <path>]
//!   docchat documents list
//!
//! The CLI mirrors the server pipeline against the configured vector
//! index. With the default in-memory index nothing survives the process,
//! so `chat --ingest` ingests and asks in one run; a Qdrant index keeps
//! chunks across invocations.

use anyhow::Context;
use clap::{Parser, Subcommand};
use docchat_chat::{create_classifier, create_llm_client, ChatOrchestrator};
use docchat_core::config::AppConfig;
use docchat_core::{ChatRequest, DocumentRegistry, EmbeddingClient, LlmClient};
use docchat_ingest::{detect_kind, extract_text, TextChunker};
use docchat_vector::{create_embedding_client, create_index, CachedEmbedding, VectorIndex};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "docchat")]
#[command(about = "Chat with your documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a document or a directory of documents
    Ingest {
        /// File or directory to ingest
        path: PathBuf,
        /// Ask a question right after ingesting
        #[arg(long)]
        ask: Option<String>,
    },
    /// Ask a question
    Chat {
        /// Question to ask
        question: String,
        /// Conversation id to continue
        #[arg(long)]
        conversation: Option<String>,
        /// Ingest a file or directory before asking
        #[arg(long)]
        ingest: Option<PathBuf>,
    },
    /// Manage ingested documents
    Documents {
        #[command(subcommand)]
        action: DocumentsAction,
    },
}

#[derive(Subcommand)]
enum DocumentsAction {
    /// List documents known to this process
    List,
    /// Delete a document and purge its chunks
    Delete {
        /// Document id (as printed by `documents list`)
        id: Uuid,
    },
}

/// The wired pipeline shared by all commands
struct Pipeline {
    registry: Arc<DocumentRegistry>,
    index: Arc<dyn VectorIndex>,
    orchestrator: ChatOrchestrator,
    chunker: TextChunker,
}

impl Pipeline {
    async fn from_env() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let embedder: Arc<dyn EmbeddingClient> = Arc::from(create_embedding_client(&config.llm)?);
        let embedder: Arc<dyn EmbeddingClient> = Arc::new(CachedEmbedding::new(embedder, 4096));
        let index = create_index(&config.index, embedder).await?;
        let llm: Arc<dyn LlmClient> = Arc::from(create_llm_client(&config.llm)?);
        let classifier = create_classifier(&config.chat.classifier, Arc::clone(&llm));
        let registry = Arc::new(DocumentRegistry::new());

        let orchestrator = ChatOrchestrator::new(
            Arc::clone(&index),
            llm,
            classifier,
            Arc::clone(&registry),
            config.chat.clone(),
        );
        let chunker = TextChunker::new(config.chat.chunk_size, config.chat.chunk_overlap)?;

        Ok(Self {
            registry,
            index,
            orchestrator,
            chunker,
        })
    }

    /// Ingest one file; returns the number of chunks indexed
    async fn ingest_file(&self, path: &Path) -> anyhow::Result<usize> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("invalid file name: {}", path.display()))?;
        let kind = detect_kind(name)?;
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let text = extract_text(&data, kind)?;
        let chunks = self.chunker.split(&text);

        let record = self.registry.create(name, kind, text);
        match self.index.add(record.index_id, &record.name, &chunks).await {
            Ok(count) => Ok(count),
            Err(e) => {
                let _ = self.registry.delete(record.id);
                Err(e.into())
            }
        }
    }

    /// Ingest a file or every supported file in a directory
    async fn ingest_path(&self, path: &Path) -> anyhow::Result<()> {
        if path.is_dir() {
            let mut ingested = 0usize;
            for entry in std::fs::read_dir(path)
                .with_context(|| format!("failed to read directory {}", path.display()))?
            {
                let entry = entry?;
                let file = entry.path();
                if !file.is_file() {
                    continue;
                }
                let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if detect_kind(name).is_err() {
                    tracing::debug!(file = %file.display(), "skipping unsupported file");
                    continue;
                }
                let chunks = self.ingest_file(&file).await?;
                println!("Ingested {} ({} chunks)", file.display(), chunks);
                ingested += 1;
            }
            if ingested == 0 {
                println!("No supported documents found in {}", path.display());
            }
        } else {
            let chunks = self.ingest_file(path).await?;
            println!("Ingested {} ({} chunks)", path.display(), chunks);
        }
        Ok(())
    }

    /// Ask a question, streaming the answer to stdout
    async fn ask(&self, question: String, conversation: Option<String>) -> anyhow::Result<()> {
        let request = ChatRequest {
            query: question,
            conversation_id: conversation.unwrap_or_else(|| Uuid::new_v4().to_string()),
            history: None,
            model: None,
            force_context: None,
        };

        let mut rx = self.orchestrator.chat_stream(&request).await?;
        while let Some(item) = rx.next().await {
            match item {
                Ok(fragment) => {
                    use std::io::Write;
                    print!("{fragment}");
                    let _ = std::io::stdout().flush();
                }
                Err(e) => anyhow::bail!("generation failed: {e}"),
            }
        }
        println!();
        println!("[conversation: {}]", request.conversation_id);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docchat=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let pipeline = Pipeline::from_env().await?;

    match cli.command {
        Commands::Ingest { path, ask } => {
            pipeline.ingest_path(&path).await?;
            if let Some(question) = ask {
                pipeline.ask(question, None).await?;
            }
        }
        Commands::Chat {
            question,
            conversation,
            ingest,
        } => {
            if let Some(path) = ingest {
                pipeline.ingest_path(&path).await?;
            }
            pipeline.ask(question, conversation).await?;
        }
        Commands::Documents { action } => match action {
            DocumentsAction::List => {
                let documents = pipeline.registry.list();
                if documents.is_empty() {
                    println!("No documents ingested in this session.");
                } else {
                    for doc in documents {
                        println!("{}  {}  ({})", doc.id, doc.name, doc.kind);
                    }
                }
            }
            DocumentsAction::Delete { id } => {
                let record = pipeline.registry.get(id)?;
                let removed = pipeline.index.delete(record.index_id).await?;
                let _ = pipeline.registry.delete(id);
                println!("Deleted {} ({} chunks purged)", record.name, removed);
            }
        },
    }

    Ok(())
}
