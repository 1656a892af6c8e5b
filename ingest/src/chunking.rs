//! Deterministic window plan over whitespace-split words.
//!
//! The window size is fixed; the stride adapts to an approximate
//! tokens-per-word ratio derived from the text itself, so denser prose
//! advances in smaller word steps. Callers may override the stride, clamped
//! to `[1, max_stride]`.

/// Fixed extraction window size, in words.
pub const WINDOW_WORDS: usize = 134;

/// Token budget one stride should advance by.
const STRIDE_TOKENS: f64 = 100.0;

/// Tokens-per-word assumed for empty input.
const DEFAULT_TOKENS_PER_WORD: f64 = 1.3;

/// Default upper clamp for stride overrides (`MAX_CHUNK_SIZE`).
pub const DEFAULT_MAX_STRIDE: usize = 12_000;

/// Precomputed windowing parameters for one ingest run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPlan {
    /// Total whitespace-separated words.
    pub total_words: usize,
    /// Newline count plus one (0 for empty text).
    pub total_lines: usize,
    /// Estimated tokens per word, clamped to `[0.5, 2.0]`.
    pub tokens_per_word: f64,
    /// Window size in words.
    pub window_words: usize,
    /// Stride in words.
    pub stride_words: usize,
    /// Number of extraction steps.
    pub total_steps: usize,
    /// Estimated total tokens.
    pub approx_tokens: usize,
}

impl WindowPlan {
    /// Builds a plan for `text` with an optional stride override.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn new(text: &str, stride_override: Option<usize>, max_stride: usize) -> Self {
        let total_words = text.split_whitespace().count();
        let total_lines = if text.is_empty() {
            0
        } else {
            text.matches('\n').count() + 1
        };

        let tokens_per_word = if total_words == 0 {
            DEFAULT_TOKENS_PER_WORD
        } else {
            let chars = text.chars().count();
            ((chars as f64 / 4.0) / total_words.max(1) as f64).clamp(0.5, 2.0)
        };

        let stride_words = stride_override.map_or_else(
            || ((STRIDE_TOKENS / tokens_per_word) as usize).max(1),
            |stride| stride.clamp(1, max_stride.max(1)),
        );

        let overflow = total_words.saturating_sub(WINDOW_WORDS);
        let total_steps = (overflow.div_ceil(stride_words) + 1).max(1);
        let approx_tokens = (total_words as f64 * tokens_per_word).round() as usize;

        Self {
            total_words,
            total_lines,
            tokens_per_word,
            window_words: WINDOW_WORDS,
            stride_words,
            total_steps,
            approx_tokens,
        }
    }

    /// Word index range `[start, end)` covered by a step.
    #[must_use]
    pub fn window_range(&self, step: usize) -> (usize, usize) {
        let start = step * self.stride_words;
        let end = (start + self.window_words).min(self.total_words);
        (start.min(self.total_words), end)
    }

    /// Words consumed after completing a step (for progress reporting).
    #[must_use]
    pub fn consumed_after(&self, step: usize) -> usize {
        ((step + 1) * self.stride_words).min(self.total_words)
    }
}
