//! Context assembly
//!
//! Turns retrieved fragments into a single context block for the prompt.
//! Fragments can be re-ranked lexically against the query before
//! concatenation; the block is bounded by dropping the lowest-ranked
//! fragments first so the strongest evidence always survives truncation.

use docchat_core::{ChatConfig, RetrievedFragment};
use std::collections::HashSet;

/// Weight of query-keyword coverage in the re-rank score
const COVERAGE_WEIGHT: f32 = 0.6;
/// Weight of capped keyword density in the re-rank score
const DENSITY_WEIGHT: f32 = 0.4;
/// Density above this contributes nothing extra (keyword-stuffed chunks)
const DENSITY_CAP: f32 = 0.2;

/// A fully assembled context block plus the document names that fed it
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub block: String,
    pub sources: Vec<String>,
}

/// Assembles retrieved fragments into prompt context
pub struct ContextAssembler {
    rerank: bool,
    min_relevance: f32,
    max_context_chars: usize,
}

impl ContextAssembler {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            rerank: config.rerank,
            min_relevance: config.min_relevance,
            max_context_chars: config.max_context_chars,
        }
    }

    /// Build a context block; `None` when nothing survives filtering
    pub fn assemble(
        &self,
        query: &str,
        fragments: Vec<RetrievedFragment>,
    ) -> Option<AssembledContext> {
        let mut ranked: Vec<(f32, RetrievedFragment)> = fragments
            .into_iter()
            .filter(|f| f.score >= self.min_relevance && !f.content.trim().is_empty())
            .map(|f| (f.score, f))
            .collect();

        if self.rerank {
            let query_keywords = tokens(query);
            if !query_keywords.is_empty() {
                for (score, fragment) in ranked.iter_mut() {
                    *score = lexical_score(&query_keywords, &fragment.content);
                }
            }
        }

        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.seq.cmp(&b.1.seq))
        });

        // Budget is a strict cutoff from the bottom of the ranking: once a
        // fragment does not fit, nothing ranked below it is admitted either.
        let mut block = String::new();
        let mut sources = Vec::new();
        for (_, fragment) in &ranked {
            let section = format!("[source: {}]\n{}", fragment.source_name, fragment.content);
            let delimiter_len = if block.is_empty() { 0 } else { 5 }; // "\n---\n"
            if block.len() + delimiter_len + section.len() > self.max_context_chars {
                break;
            }
            if !block.is_empty() {
                block.push_str("\n---\n");
            }
            block.push_str(&section);
            if !sources.contains(&fragment.source_name) {
                sources.push(fragment.source_name.clone());
            }
        }

        if block.is_empty() {
            None
        } else {
            Some(AssembledContext { block, sources })
        }
    }
}

fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(|t| t.to_string())
        .collect()
}

/// Coverage of query keywords plus capped keyword density
fn lexical_score(query_keywords: &HashSet<String>, content: &str) -> f32 {
    let content_lower = content.to_lowercase();
    let content_tokens: Vec<&str> = content_lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    if content_tokens.is_empty() {
        return 0.0;
    }

    let matched = query_keywords
        .iter()
        .filter(|kw| content_tokens.contains(&kw.as_str()))
        .count();
    let coverage = matched as f32 / query_keywords.len() as f32;

    let hits = content_tokens
        .iter()
        .filter(|t| query_keywords.contains(**t))
        .count();
    let density = (hits as f32 / content_tokens.len() as f32).min(DENSITY_CAP) / DENSITY_CAP;

    COVERAGE_WEIGHT * coverage + DENSITY_WEIGHT * density
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(content: &str, source: &str, score: f32, seq: u32) -> RetrievedFragment {
        RetrievedFragment {
            content: content.to_string(),
            source_name: source.to_string(),
            score,
            seq,
        }
    }

    fn assembler(rerank: bool, max_chars: usize) -> ContextAssembler {
        ContextAssembler::new(&ChatConfig {
            rerank,
            min_relevance: 0.1,
            max_context_chars: max_chars,
            ..Default::default()
        })
    }

    #[test]
    fn test_empty_input_yields_none() {
        let a = assembler(false, 8000);
        assert!(a.assemble("query", Vec::new()).is_none());
    }

    #[test]
    fn test_below_threshold_filtered_out() {
        let a = assembler(false, 8000);
        let frags = vec![fragment("irrelevant noise", "doc", 0.05, 0)];
        assert!(a.assemble("query", frags).is_none());
    }

    #[test]
    fn test_sections_headed_and_delimited() {
        let a = assembler(false, 8000);
        let frags = vec![
            fragment("first chunk", "alpha.md", 0.9, 0),
            fragment("second chunk", "beta.md", 0.8, 0),
        ];
        let ctx = a.assemble("query", frags).unwrap();
        assert!(ctx.block.starts_with("[source: alpha.md]\nfirst chunk"));
        assert!(ctx.block.contains("\n---\n[source: beta.md]\nsecond chunk"));
        assert_eq!(ctx.sources, vec!["alpha.md", "beta.md"]);
    }

    #[test]
    fn test_rerank_prefers_keyword_coverage() {
        let a = assembler(true, 8000);
        let frags = vec![
            // higher vector score but no query keywords
            fragment("completely unrelated text about weather", "weather.md", 0.95, 0),
            fragment("the alpha system boots in three seconds", "alpha.md", 0.5, 0),
        ];
        let ctx = a.assemble("how does the alpha system boot time work", frags).unwrap();
        assert!(ctx.block.starts_with("[source: alpha.md]"));
    }

    #[test]
    fn test_budget_drops_lowest_ranked_first() {
        let a = assembler(false, 60);
        let frags = vec![
            fragment("top ranked chunk", "a.md", 0.9, 0),
            fragment("this lower ranked chunk does not fit in the remaining budget", "b.md", 0.3, 0),
        ];
        let ctx = a.assemble("query", frags).unwrap();
        assert!(ctx.block.contains("top ranked chunk"));
        assert!(!ctx.block.contains("lower ranked"));
        assert_eq!(ctx.sources, vec!["a.md"]);
    }

    #[test]
    fn test_budget_cutoff_admits_nothing_below_a_dropped_fragment() {
        let a = assembler(false, 60);
        let frags = vec![
            fragment(
                "this top ranked chunk is far too large to fit the configured ceiling",
                "a.md",
                0.9,
                0,
            ),
            fragment("tiny", "b.md", 0.3, 0),
        ];
        // the smaller lower-ranked fragment must not leapfrog the cutoff
        assert!(a.assemble("query", frags).is_none());
    }

    #[test]
    fn test_duplicate_sources_listed_once() {
        let a = assembler(false, 8000);
        let frags = vec![
            fragment("chunk one", "same.md", 0.9, 0),
            fragment("chunk two", "same.md", 0.8, 1),
        ];
        let ctx = a.assemble("query", frags).unwrap();
        assert_eq!(ctx.sources, vec!["same.md"]);
    }
}
