//! Docchat Chat - Response orchestration
//!
//! Drives a conversation turn end to end: validate, apply caller history,
//! decide whether retrieval is warranted, assemble context, prompt, and
//! generate. Turns on the same conversation are serialized by a per-id
//! mutex; turns on different conversations run concurrently.

use docchat_core::{
    ChatConfig, ChatError, ChatOutcome, ChatRequest, DocumentRegistry, EmptyRetrievalPolicy,
    LlmClient, Result,
};
use docchat_vector::VectorIndex;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OwnedMutexGuard;

pub mod classifier;
pub mod context;
pub mod history;
pub mod llm;

pub use classifier::{create_classifier, LexicalClassifier, ModelClassifier, RelevanceClassifier};
pub use context::{AssembledContext, ContextAssembler};
pub use history::ConversationStore;
pub use llm::{create_llm_client, OllamaClient, OpenAiClient};

/// Answer returned when retrieval was requested but produced nothing and
/// the policy forbids falling back to general knowledge.
const INSUFFICIENT_CONTEXT_ANSWER: &str =
    "The available documents do not contain enough information to answer this question.";

// ============================================================================
// Turn lifecycle
// ============================================================================

/// Lifecycle of one conversation turn, logged per transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Received,
    HistoryApplied,
    Classified,
    Retrieving,
    ContextAssembled,
    NoContext,
    Prompted,
    Generating,
    Completed,
    Failed,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// A turn that has been validated and prepared up to the generation step
struct PreparedTurn {
    conversation_id: String,
    query: String,
    prompt: String,
    grounded: bool,
    sources: Vec<String>,
    /// Some when the policy short-circuits generation entirely
    canned_answer: Option<String>,
    guard: OwnedMutexGuard<()>,
}

/// Orchestrates retrieval-augmented conversation turns
pub struct ChatOrchestrator {
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn LlmClient>,
    classifier: Arc<dyn RelevanceClassifier>,
    registry: Arc<DocumentRegistry>,
    conversations: Arc<ConversationStore>,
    assembler: ContextAssembler,
    config: ChatConfig,
}

impl ChatOrchestrator {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LlmClient>,
        classifier: Arc<dyn RelevanceClassifier>,
        registry: Arc<DocumentRegistry>,
        config: ChatConfig,
    ) -> Self {
        Self {
            index,
            llm,
            classifier,
            registry,
            conversations: Arc::new(ConversationStore::new()),
            assembler: ContextAssembler::new(&config),
            config,
        }
    }

    /// Conversation state, shared with callers that need transcripts
    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    fn phase(&self, conversation_id: &str, phase: TurnPhase) {
        tracing::debug!(conversation = %conversation_id, phase = ?phase, "turn transition");
    }

    /// Run a turn to completion and return the full answer
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatOutcome> {
        let start = Instant::now();
        let prepared = self.prepare(request).await?;
        let id = prepared.conversation_id.clone();

        let answer = match prepared.canned_answer {
            Some(answer) => answer,
            None => {
                self.phase(&id, TurnPhase::Generating);
                match self.llm.generate(&prepared.prompt, request.model.as_deref()).await {
                    Ok(answer) => answer,
                    Err(e) => {
                        self.phase(&id, TurnPhase::Failed);
                        tracing::error!(conversation = %id, "generation failed: {e}");
                        return Err(e);
                    }
                }
            }
        };

        self.conversations.append_exchange(&id, &prepared.query, &answer);
        self.phase(&id, TurnPhase::Completed);
        drop(prepared.guard);

        Ok(ChatOutcome {
            answer,
            grounded: prepared.grounded,
            sources: prepared.sources,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Run a turn, yielding answer fragments as they arrive
    ///
    /// The turn guard is released while fragments are in flight and
    /// re-acquired for the final history append. A dropped receiver stops
    /// generation and the exchange is not recorded.
    pub async fn chat_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<mpsc::Receiver<Result<String>>> {
        let prepared = self.prepare(request).await?;
        let id = prepared.conversation_id.clone();
        let (mut tx, rx) = mpsc::channel::<Result<String>>(16);

        if let Some(answer) = prepared.canned_answer {
            self.conversations.append_exchange(&id, &prepared.query, &answer);
            self.phase(&id, TurnPhase::Completed);
            drop(prepared.guard);
            tokio::spawn(async move {
                let _ = tx.send(Ok(answer)).await;
            });
            return Ok(rx);
        }

        self.phase(&id, TurnPhase::Generating);
        let mut stream = match self
            .llm
            .generate_stream(&prepared.prompt, request.model.as_deref())
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                self.phase(&id, TurnPhase::Failed);
                tracing::error!(conversation = %id, "stream start failed: {e}");
                return Err(e);
            }
        };

        let conversations = Arc::clone(&self.conversations);
        let query = prepared.query;
        drop(prepared.guard);

        tokio::spawn(async move {
            let mut answer = String::new();
            let mut completed = true;

            while let Some(item) = stream.next().await {
                match item {
                    Ok(fragment) => {
                        answer.push_str(&fragment);
                        if tx.send(Ok(fragment)).await.is_err() {
                            // receiver gone: stop generating, record nothing
                            tracing::info!(conversation = %id, "stream receiver dropped");
                            completed = false;
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(conversation = %id, "stream failed: {e}");
                        let _ = tx.send(Err(e)).await;
                        completed = false;
                        break;
                    }
                }
            }

            if completed {
                let _guard = conversations.turn_guard(&id).await;
                conversations.append_exchange(&id, &query, &answer);
                tracing::debug!(conversation = %id, phase = ?TurnPhase::Completed, "turn transition");
            } else {
                tracing::debug!(conversation = %id, phase = ?TurnPhase::Failed, "turn transition");
            }
        });

        Ok(rx)
    }

    /// Validate, serialize, classify, retrieve, and build the prompt
    async fn prepare(&self, request: &ChatRequest) -> Result<PreparedTurn> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(ChatError::Validation("query must not be empty".to_string()));
        }
        let conversation_id = request.conversation_id.trim();
        if conversation_id.is_empty() {
            return Err(ChatError::Validation(
                "conversation_id must not be empty".to_string(),
            ));
        }
        self.phase(conversation_id, TurnPhase::Received);

        let guard = self.conversations.turn_guard(conversation_id).await;

        if let Some(history) = &request.history {
            self.conversations.replace(conversation_id, history.clone());
        }
        self.phase(conversation_id, TurnPhase::HistoryApplied);

        let document_names = self.registry.list_names();
        let needs_context = match request.force_context {
            Some(forced) => forced,
            None => self.classifier.needs_context(query, &document_names).await,
        };
        self.phase(conversation_id, TurnPhase::Classified);

        let assembled = if needs_context {
            self.phase(conversation_id, TurnPhase::Retrieving);
            let fragments = match self.index.search(query, self.config.top_k).await {
                Ok(fragments) => fragments,
                Err(e) => {
                    self.phase(conversation_id, TurnPhase::Failed);
                    tracing::error!(conversation = %conversation_id, "retrieval failed: {e}");
                    return Err(e);
                }
            };
            self.assembler.assemble(query, fragments)
        } else {
            None
        };

        let transcript = self.conversations.render(conversation_id);

        let (prompt, grounded, sources, canned_answer) = match assembled {
            Some(context) => {
                self.phase(conversation_id, TurnPhase::ContextAssembled);
                (
                    build_grounded_prompt(&context.block, &transcript, query),
                    true,
                    context.sources,
                    None,
                )
            }
            None => {
                self.phase(conversation_id, TurnPhase::NoContext);
                if needs_context
                    && self.config.empty_retrieval == EmptyRetrievalPolicy::ReportInsufficient
                {
                    tracing::info!(
                        conversation = %conversation_id,
                        "retrieval produced no usable context, reporting insufficiency"
                    );
                    (
                        String::new(),
                        false,
                        Vec::new(),
                        Some(INSUFFICIENT_CONTEXT_ANSWER.to_string()),
                    )
                } else {
                    (
                        build_ungrounded_prompt(&transcript, query),
                        false,
                        Vec::new(),
                        None,
                    )
                }
            }
        };
        self.phase(conversation_id, TurnPhase::Prompted);

        Ok(PreparedTurn {
            conversation_id: conversation_id.to_string(),
            query: query.to_string(),
            prompt,
            grounded,
            sources,
            canned_answer,
            guard,
        })
    }
}

// ============================================================================
// Prompts
// ============================================================================

fn build_grounded_prompt(context: &str, transcript: &str, query: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str("You are an assistant answering questions about a document library.\n");
    prompt.push_str("Use only the context below; do not invent facts beyond it.\n");
    prompt.push_str("Answer in the same language as the question.\n\n");
    prompt.push_str("Context:\n");
    prompt.push_str(context);
    prompt.push_str("\n\n");
    if !transcript.is_empty() {
        prompt.push_str("Conversation so far:\n");
        prompt.push_str(transcript);
        prompt.push('\n');
    }
    prompt.push_str("Question: ");
    prompt.push_str(query);
    prompt.push_str("\nAnswer:");
    prompt
}

fn build_ungrounded_prompt(transcript: &str, query: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str("You are a helpful assistant.\n");
    prompt.push_str("Answer in the same language as the question.\n\n");
    if !transcript.is_empty() {
        prompt.push_str("Conversation so far:\n");
        prompt.push_str(transcript);
        prompt.push('\n');
    }
    prompt.push_str("Question: ");
    prompt.push_str(query);
    prompt.push_str("\nAnswer:");
    prompt
}

// ============================================================================
// Tests
// ============================================================================
