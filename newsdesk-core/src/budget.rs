//! Context budgeting: keeps prompt plus search context inside a model window.
//!
//! The prompt is never touched. Search context is cut at line boundaries
//! from the end until the remainder fits the budget left after the prompt.

use crate::brain::TokenCounter;
use tracing::{info, warn};

/// Trims search context to fit a fraction of a model's context window.
pub struct ContextTrimmer {
    counter: TokenCounter,
}

impl ContextTrimmer {
    /// Create a trimmer counting tokens the way `model` does.
    pub fn for_model(model: &str) -> Self {
        Self {
            counter: TokenCounter::for_model(model),
        }
    }

    pub fn count(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    /// Tokens left for context once `prompt` is placed in
    /// `floor(max_total_tokens * max_fraction)`. Zero or negative means none.
    pub fn available(&self, prompt: &str, max_fraction: f64, max_total_tokens: usize) -> i64 {
        let budget = (max_total_tokens as f64 * max_fraction).floor() as i64;
        budget - self.counter.count(prompt) as i64
    }

    /// Return the longest whole-line prefix of `context` that fits the budget.
    ///
    /// Returns `context` unchanged when it already fits, and an empty string
    /// when the prompt alone exhausts the budget. Lines are never split.
    pub fn trim(
        &self,
        prompt: &str,
        context: &str,
        max_fraction: f64,
        max_total_tokens: usize,
    ) -> String {
        let available = self.available(prompt, max_fraction, max_total_tokens);
        if available <= 0 {
            warn!(
                prompt_tokens = self.counter.count(prompt),
                max_total_tokens, max_fraction, "Prompt alone exceeds token budget"
            );
            return String::new();
        }
        let available = available as usize;

        let context_tokens = self.counter.count(context);
        if context_tokens <= available {
            return context.to_string();
        }

        info!(
            from = context_tokens,
            to = available,
            "Trimming search context"
        );

        let mut kept: Vec<&str> = Vec::new();
        let mut running = 0;
        for line in context.split('\n') {
            // Separator newline counts against the budget too.
            let cost = self.counter.count(line) + usize::from(!kept.is_empty());
            if running + cost > available {
                break;
            }
            kept.push(line);
            running += cost;
        }

        // BPE merges across line joins can shift the count; drop trailing
        // lines until the joined text itself fits.
        let mut trimmed = kept.join("\n");
        while !kept.is_empty() && self.counter.count(&trimmed) > available {
            kept.pop();
            trimmed = kept.join("\n");
        }
        trimmed
    }
}

/// Trim `context` with a one-off trimmer for `model`.
pub fn trim_context(
    prompt: &str,
    context: &str,
    max_fraction: f64,
    max_total_tokens: usize,
    model: &str,
) -> String {
    ContextTrimmer::for_model(model).trim(prompt, context, max_fraction, max_total_tokens)
}
