//! Part headers, "reply for more" hints, and the split plan that leaves room for them.

use crate::{base::types::MessagePart, delivery::chunker};

/// Renders `(i/total)` headers and, for pull delivery, a hint telling the recipient how
/// to fetch the next part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartRenderer {
    hint_keyword: Option<String>,
}

impl PartRenderer {
    /// Headers only; used when every part is delivered without a pull.
    pub fn plain() -> Self {
        Self { hint_keyword: None }
    }

    /// Headers plus a hint naming `keyword` on every part but the last.
    pub fn with_hint(keyword: &str) -> Self {
        Self {
            hint_keyword: Some(keyword.to_string()),
        }
    }

    /// Character count a part of a `total`-part split must leave free for decoration.
    ///
    /// Every numeric slot is filled with `total`, which has at least as many digits as any
    /// index or remaining count in the split.
    pub fn reserve(&self, total: usize) -> usize {
        if total <= 1 {
            return 0;
        }

        let hint = self.hint_keyword.as_deref().map(|k| hint_text(k, total, total, total)).unwrap_or_default();

        header_text(total, total).chars().count() + hint.chars().count()
    }

    /// Renders the payload of part `index` (1-based) of `total`.
    ///
    /// A single-part message is sent as-is.
    pub fn render(&self, index: usize, total: usize, body: &str) -> String {
        if total <= 1 {
            return body.to_string();
        }

        let hint = match &self.hint_keyword {
            Some(keyword) if index < total => hint_text(keyword, index + 1, total, total - index),
            _ => String::new(),
        };

        format!("{}{body}{hint}", header_text(index, total))
    }

    /// Splits `text` so that every rendered part fits in `limit` characters.
    ///
    /// The header margin depends on how many digits the part count has, so the split is
    /// redone with a wider margin until the count stops growing past the assumed width.
    pub fn plan(&self, text: &str, limit: usize) -> Vec<MessagePart> {
        let mut chunks = chunker::split(text, limit);

        if chunks.len() > 1 {
            let mut assumed = chunks.len();

            loop {
                chunks = chunker::split(text, limit.saturating_sub(self.reserve(assumed)));

                if digits(chunks.len()) <= digits(assumed) {
                    break;
                }

                assumed = chunks.len();
            }
        }

        let total = chunks.len();

        chunks
            .iter()
            .enumerate()
            .map(|(i, body)| MessagePart {
                index: i + 1,
                total,
                payload: self.render(i + 1, total, body),
            })
            .collect()
    }
}

fn header_text(index: usize, total: usize) -> String {
    format!("({index}/{total}) ")
}

fn hint_text(keyword: &str, next: usize, total: usize, remaining: usize) -> String {
    format!("\n\nReply \"{keyword}\" for part {next}/{total} ({remaining} left).")
}

fn digits(n: usize) -> usize {
    n.to_string().len()
}
