//! Context building for summaries and question answering.
//!
//! A [`ContextBlock`] is the self-contained prompt fragment derived from one
//! session: its cached summary when one exists, otherwise the head of the raw
//! content cut at a fixed character budget.

use crate::store::Session;
use chrono::{DateTime, Utc};
use tracing::debug;

/// What a context block was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSource {
    /// The session's cached summary.
    Summary,
    /// A prefix (or all) of the raw content.
    Content,
}

/// Bounded prompt fragment for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextBlock {
    pub session_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub source: BlockSource,
    pub text: String,
    /// The raw content was longer than the budget and was cut.
    pub truncated: bool,
}

impl ContextBlock {
    /// Size of the block text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Format the block for inclusion in a prompt.
    pub fn to_prompt(&self) -> String {
        let label = match self.source {
            BlockSource::Summary => "Summary",
            BlockSource::Content => "Content",
        };
        let note = if self.truncated {
            "\n[content truncated]"
        } else {
            ""
        };

        format!(
            "--- {} ({}) ---\n{}:\n{}{}",
            self.title,
            self.created_at.format("%Y-%m-%d %H:%M"),
            label,
            self.text,
            note
        )
    }
}

/// Blocks selected for a cross-session prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedContext {
    /// Selected blocks, oldest first.
    pub blocks: Vec<ContextBlock>,
    /// Older sessions left out to stay within the cap.
    pub excluded: usize,
}

impl BoundedContext {
    /// Format all blocks plus an omission note for a prompt.
    pub fn to_prompt(&self) -> String {
        let mut out = format_blocks_for_prompt(&self.blocks);
        if self.excluded > 0 {
            out.push_str(&format!(
                "\n\n[{} earlier session(s) omitted to fit the context limit]",
                self.excluded
            ));
        }
        out
    }
}

/// Builds context blocks from sessions.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    char_budget: usize,
}

impl ContextBuilder {
    /// Create a builder with a per-session character budget.
    pub fn new(char_budget: usize) -> Self {
        Self { char_budget }
    }

    /// Character budget for raw content.
    pub fn char_budget(&self) -> usize {
        self.char_budget
    }

    /// Build the context block for one session.
    pub fn build_single_session_context(&self, session: &Session) -> ContextBlock {
        let (source, text, truncated) = match &session.summary {
            Some(summary) if !summary.is_empty() => {
                (BlockSource::Summary, summary.to_markdown(), false)
            }
            _ => {
                let (text, truncated) = truncate_chars(&session.content, self.char_budget);
                (BlockSource::Content, text.to_string(), truncated)
            }
        };

        if truncated {
            debug!(
                "Truncated session {} to {} chars",
                session.id, self.char_budget
            );
        }

        ContextBlock {
            session_id: session.id.clone(),
            title: session.title.clone(),
            created_at: session.created_at,
            source,
            text,
            truncated,
        }
    }

    /// Build one block per session, ordered by creation time ascending.
    pub fn build_cross_class_context(&self, sessions: &[Session]) -> Vec<ContextBlock> {
        let mut ordered: Vec<&Session> = sessions.iter().collect();
        ordered.sort_by_key(|s| s.created_at);

        ordered
            .into_iter()
            .map(|s| self.build_single_session_context(s))
            .collect()
    }
}

/// Keep blocks within `max_chars` total.
///
/// All blocks are kept when they fit. Otherwise the most recent blocks that
/// fit are kept (always at least one) and the rest are counted as excluded.
/// `blocks` must be ordered oldest first; the result keeps that order.
pub fn bound_blocks(blocks: Vec<ContextBlock>, max_chars: usize) -> BoundedContext {
    let total: usize = blocks.iter().map(ContextBlock::char_len).sum();
    if total <= max_chars {
        return BoundedContext {
            blocks,
            excluded: 0,
        };
    }

    let mut used = 0;
    let mut keep = 0;
    for block in blocks.iter().rev() {
        let len = block.char_len();
        if keep > 0 && used + len > max_chars {
            break;
        }
        used += len;
        keep += 1;
    }

    let excluded = blocks.len() - keep;
    debug!(
        "Context of {} chars exceeds cap {}, keeping {} most recent blocks",
        total, max_chars, keep
    );

    BoundedContext {
        blocks: blocks.into_iter().skip(excluded).collect(),
        excluded,
    }
}

/// Take at most `max_chars` characters from the start of `text`.
///
/// Cuts on a character boundary; returns whether anything was removed.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => (&text[..byte_index], true),
        None => (text, false),
    }
}

/// Split `text` into consecutive parts of at most `max_chars` characters,
/// preferring to break at a newline or space near the end of each part.
pub fn split_chars(text: &str, max_chars: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let (head, truncated) = truncate_chars(rest, max_chars);
        if !truncated {
            parts.push(head);
            break;
        }

        // Break at whitespace in the last fifth of the part, if there is any
        let min_break = head.len() - head.len() / 5;
        let cut = head
            .rfind('\n')
            .filter(|&i| i >= min_break && i > 0)
            .or_else(|| head.rfind(' ').filter(|&i| i >= min_break && i > 0))
            .map(|i| i + 1)
            .unwrap_or(head.len());

        parts.push(&rest[..cut]);
        rest = &rest[cut..];
    }

    parts
}

/// Format blocks for a prompt, separated by blank lines.
pub fn format_blocks_for_prompt(blocks: &[ContextBlock]) -> String {
    blocks
        .iter()
        .map(ContextBlock::to_prompt)
        .collect::<Vec<_>>()
        .join("\n\n")
}
