//! Budgeted context assembly and grounded prompt rendering.
//!
//! The assembler takes evidence in relevance order, drops duplicates, and
//! packs whole items into a character budget; the renderer turns the result
//! into a deterministic prompt that restricts the model to the supplied
//! context and mandates an exact fallback sentence when the context is
//! insufficient.

use std::collections::HashSet;

use crate::types::Evidence;

/// Fixed sentence the model must emit verbatim when the context cannot
/// answer the question. Downstream answer-quality checks depend on this
/// exact wording; never reformat it.
pub const GROUNDING_FALLBACK: &str =
    "The provided context does not contain enough information to answer this question.";

const ITEM_SEPARATOR: &str = "\n---\n";

/// Ordered evidence selected for a single query.
#[derive(Debug, Clone, Default)]
pub struct Context {
    items: Vec<Evidence>,
}

impl Context {
    pub fn items(&self) -> &[Evidence] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Selects evidence under a size budget and renders grounded prompts.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    budget: usize,
    truncate_to_fit: bool,
}

impl ContextAssembler {
    /// Creates an assembler with a character budget for the context block.
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            truncate_to_fit: false,
        }
    }

    /// Clip the final item to fill the remaining budget instead of dropping
    /// it. Default policy drops whole items.
    #[must_use]
    pub fn with_truncate_to_fit(mut self, truncate_to_fit: bool) -> Self {
        self.truncate_to_fit = truncate_to_fit;
        self
    }

    /// Accepts evidence in relevance order and accumulates items until the
    /// next one would exceed the budget.
    ///
    /// Exact duplicates (same source and content) are skipped. Selection
    /// stops at the first item that does not fit; it never reorders to
    /// squeeze in a later, smaller item, so the kept prefix is always the
    /// most relevant one.
    pub fn assemble(&self, evidence: &[Evidence]) -> Context {
        let mut items: Vec<Evidence> = Vec::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut used = 0usize;

        for item in evidence {
            if !seen.insert((item.source_id.clone(), item.content.clone())) {
                continue;
            }
            let separator = if items.is_empty() {
                0
            } else {
                ITEM_SEPARATOR.chars().count()
            };
            let cost = separator + rendered_item_len(item);
            if used + cost > self.budget {
                if self.truncate_to_fit {
                    let remaining = self.budget.saturating_sub(used + cost - item.content.chars().count());
                    if remaining > 0 {
                        let mut clipped = item.clone();
                        clipped.content = item.content.chars().take(remaining).collect();
                        items.push(clipped);
                    }
                }
                break;
            }
            used += cost;
            items.push(item.clone());
        }
        Context { items }
    }

    /// Renders the grounded prompt for one question.
    ///
    /// Deterministic template: each item as `Source: <id>\nContent: <text>`,
    /// items joined by a fixed separator, wrapped in an instruction that
    /// restricts the model to the context and mandates
    /// [`GROUNDING_FALLBACK`] verbatim. An empty context still renders a
    /// valid prompt; the instruction then steers the model straight to the
    /// fallback sentence.
    pub fn render(&self, context: &Context, question: &str) -> String {
        let context_block = context
            .items
            .iter()
            .map(render_item)
            .collect::<Vec<_>>()
            .join(ITEM_SEPARATOR);

        format!(
            "You are an expert Q&A assistant. Your task is to answer the user's question \
             based *only* on the provided context.\n\
             If the context does not contain the information needed to answer the question, \
             you must state: \"{GROUNDING_FALLBACK}\"\n\
             \n\
             CONTEXT:\n\
             {context_block}\n\
             \n\
             QUESTION:\n\
             {question}\n\
             \n\
             ANSWER:\n"
        )
    }
}

fn render_item(item: &Evidence) -> String {
    format!("Source: {}\nContent: {}", item.source_id, item.content)
}

fn rendered_item_len(item: &Evidence) -> usize {
    render_item(item).chars().count()
}
