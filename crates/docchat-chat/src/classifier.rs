//! Relevance classification
//!
//! Decides whether a query should trigger document retrieval at all.
//! Two strategies: a lexical overlap check against known document names,
//! and a model-backed strict YES/NO decision. The model variant fails
//! closed: anything it cannot parse means "no retrieval".

use async_trait::async_trait;
use docchat_core::{ClassifierKind, LlmClient, Result};
use regex::Regex;
use std::sync::Arc;

/// Decides whether a query needs document context
#[async_trait]
pub trait RelevanceClassifier: Send + Sync {
    /// `true` if the query should be answered against the indexed documents
    async fn needs_context(&self, query: &str, document_names: &[String]) -> bool;
}

/// Create a classifier from config
pub fn create_classifier(
    kind: &ClassifierKind,
    llm: Arc<dyn LlmClient>,
) -> Arc<dyn RelevanceClassifier> {
    match kind {
        ClassifierKind::Lexical => Arc::new(LexicalClassifier::new()),
        ClassifierKind::Model => Arc::new(ModelClassifier::new(llm)),
    }
}

// ============================================================================
// Lexical classifier
// ============================================================================

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "what", "which", "who",
    "whom", "this", "that", "these", "those", "and", "but", "or", "nor", "for", "yet", "so", "in",
    "on", "at", "to", "from", "by", "with", "about", "into", "through", "of", "how", "when",
    "where", "why", "does", "did", "do", "can", "could", "should", "would", "will", "shall", "not",
    "you", "your", "its", "their", "our", "has", "have", "had", "there", "here", "than", "then",
    "tell", "about", "please", "show",
];

fn keywords(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2 && !STOP_WORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

/// Keyword overlap between the query and known document names
pub struct LexicalClassifier;

impl LexicalClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LexicalClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelevanceClassifier for LexicalClassifier {
    async fn needs_context(&self, query: &str, document_names: &[String]) -> bool {
        if document_names.is_empty() {
            return false;
        }

        let query_keywords = keywords(query);
        if query_keywords.is_empty() {
            return false;
        }

        for name in document_names {
            for token in keywords(name) {
                if query_keywords.contains(&token) {
                    tracing::debug!(%name, %token, "query overlaps document name");
                    return true;
                }
            }
        }
        false
    }
}

// ============================================================================
// Model classifier
// ============================================================================

/// LLM-backed YES/NO relevance decision
pub struct ModelClassifier {
    llm: Arc<dyn LlmClient>,
    decision_re: Regex,
}

impl ModelClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            // anchored so trailing chatter after the decision word is ignored
            decision_re: Regex::new(r"(?i)^\s*(yes|no)\b")
                .unwrap_or_else(|_| Regex::new("yes|no").unwrap()),
        }
    }

    fn build_prompt(&self, query: &str, document_names: &[String]) -> String {
        let mut prompt = String::new();
        prompt.push_str(
            "You decide whether a question should be answered using a document library.\n",
        );
        prompt.push_str("Available documents:\n");
        for name in document_names {
            prompt.push_str("- ");
            prompt.push_str(name);
            prompt.push('\n');
        }
        prompt.push_str("\nQuestion: ");
        prompt.push_str(query);
        prompt.push_str(
            "\n\nAnswer with a single word on the first line: YES if the documents are \
             likely relevant to the question, NO otherwise. Do not explain.\n",
        );
        prompt
    }

    /// Parse the first well-formed decision line; `None` if there is none
    fn parse_decision(&self, output: &str) -> Option<bool> {
        for line in output.lines() {
            if line.trim().is_empty() {
                continue;
            }
            return self
                .decision_re
                .captures(line)
                .and_then(|cap| cap.get(1))
                .map(|m| m.as_str().eq_ignore_ascii_case("yes"));
        }
        None
    }
}

#[async_trait]
impl RelevanceClassifier for ModelClassifier {
    async fn needs_context(&self, query: &str, document_names: &[String]) -> bool {
        if document_names.is_empty() {
            return false;
        }

        let prompt = self.build_prompt(query, document_names);
        let output = match self.llm.generate(&prompt, None).await {
            Ok(out) => out,
            Err(e) => {
                tracing::warn!("relevance model call failed, skipping retrieval: {e}");
                return false;
            }
        };

        match self.parse_decision(&output) {
            Some(decision) => decision,
            None => {
                tracing::warn!(
                    output = %output.chars().take(120).collect::<String>(),
                    "unparseable relevance decision, skipping retrieval"
                );
                false
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use docchat_core::{ChatError, Result};
    use futures::stream::BoxStream;

    struct CannedLlm {
        output: Result<String>,
    }

    impl CannedLlm {
        fn ok(s: &str) -> Arc<Self> {
            Arc::new(Self {
                output: Ok(s.to_string()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                output: Err(ChatError::Generation("model down".to_string())),
            })
        }
    }

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn generate(&self, _prompt: &str, _model: Option<&str>) -> Result<String> {
            match &self.output {
                Ok(s) => Ok(s.clone()),
                Err(_) => Err(ChatError::Generation("model down".to_string())),
            }
        }

        async fn generate_stream(
            &self,
            _prompt: &str,
            _model: Option<&str>,
        ) -> Result<BoxStream<'static, Result<String>>> {
            Err(ChatError::Generation("not used".to_string()))
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_lexical_overlap_triggers_retrieval() {
        let c = LexicalClassifier::new();
        let docs = names(&["alpha-manual.pdf", "billing-policy.md"]);
        assert!(c.needs_context("How does the alpha system boot?", &docs).await);
        assert!(c.needs_context("Explain the billing rules", &docs).await);
    }

    #[tokio::test]
    async fn test_lexical_no_overlap() {
        let c = LexicalClassifier::new();
        let docs = names(&["alpha-manual.pdf"]);
        assert!(!c.needs_context("What is 2+2?", &docs).await);
        assert!(!c.needs_context("the a is", &docs).await);
    }

    #[tokio::test]
    async fn test_lexical_empty_library() {
        let c = LexicalClassifier::new();
        assert!(!c.needs_context("alpha manual", &[]).await);
    }

    #[tokio::test]
    async fn test_model_yes_and_no() {
        let docs = names(&["alpha-manual.pdf"]);
        let yes = ModelClassifier::new(CannedLlm::ok("YES"));
        assert!(yes.needs_context("q", &docs).await);

        let no = ModelClassifier::new(CannedLlm::ok("No, not relevant."));
        assert!(!no.needs_context("q", &docs).await);
    }

    #[tokio::test]
    async fn test_model_skips_leading_blank_lines() {
        let docs = names(&["alpha-manual.pdf"]);
        let c = ModelClassifier::new(CannedLlm::ok("\n\n  yes\nbecause..."));
        assert!(c.needs_context("q", &docs).await);
    }

    #[tokio::test]
    async fn test_model_fails_closed_on_garbage() {
        let docs = names(&["alpha-manual.pdf"]);
        let c = ModelClassifier::new(CannedLlm::ok("Maybe? It depends."));
        assert!(!c.needs_context("q", &docs).await);
    }

    #[tokio::test]
    async fn test_model_fails_closed_on_error() {
        let docs = names(&["alpha-manual.pdf"]);
        let c = ModelClassifier::new(CannedLlm::failing());
        assert!(!c.needs_context("q", &docs).await);
    }
}
