//! Digest builder: folds one run's `(Message, Analysis)` pairs into text.
//!
//! Pure and deterministic: the check time is passed in, so identical inputs
//! always produce identical output. Formatting uses the `*bold*`/`_italic_`
//! markup understood by both WhatsApp and Telegram Markdown.

use std::fmt::Write as _;

use chrono::NaiveTime;

use crate::pipeline::types::{Analysis, Category, Importance, Message};

/// Maximum entries listed under "attention required".
pub const MAX_ATTENTION_ITEMS: usize = 5;

/// Longest summary shown per attention item, in characters.
pub const MAX_SUMMARY_CHARS: usize = 160;

/// Sent when the mailbox had no unprocessed messages.
pub const NO_MAIL_TEXT: &str =
    "🌅 *Good morning!* No new mail today. Perfect to focus on your projects! 💪";

/// Digest text for an empty batch.
pub const NO_IMPORTANT_TEXT: &str = "🌅 *Good morning!* No important new emails today.";

/// Text of the best-effort notification sent when a run aborts.
pub fn error_text(error: &dyn std::fmt::Display) -> String {
    format!("🚨 Mail digest agent error: {error}")
}

/// Symbol shown next to a category in the rollup.
pub fn category_symbol(category: Category) -> &'static str {
    match category {
        Category::Work => "💼",
        Category::Client => "👤",
        Category::Personal => "🏠",
        Category::Vendor => "🏢",
        Category::Marketing => "📢",
        Category::Spam => "🗑️",
    }
}

/// Human display name of a `From` header: the part before the angle-bracket
/// address, with whitespace and surrounding quotes removed.
pub fn display_name(sender: &str) -> &str {
    let name = sender.split('<').next().unwrap_or(sender);
    name.trim().trim_matches('"')
}

/// Summary clipped to `MAX_SUMMARY_CHARS`, with an ellipsis when cut.
fn clip_summary(summary: &str) -> String {
    let summary = summary.trim();
    match summary.char_indices().nth(MAX_SUMMARY_CHARS) {
        Some((end, _)) => format!("{}…", summary[..end].trim_end()),
        None => summary.to_string(),
    }
}

/// Category counts in first-seen order.
pub fn category_rollup<'a>(analyses: impl IntoIterator<Item = &'a Analysis>) -> Vec<(Category, usize)> {
    let mut rollup: Vec<(Category, usize)> = Vec::new();
    for analysis in analyses {
        match rollup.iter_mut().find(|(c, _)| *c == analysis.category) {
            Some((_, count)) => *count += 1,
            None => rollup.push((analysis.category, 1)),
        }
    }
    rollup
}

/// Build the digest for one run.
pub fn build_digest(pairs: &[(Message, Analysis)], checked_at: NaiveTime) -> String {
    if pairs.is_empty() {
        return NO_IMPORTANT_TEXT.to_string();
    }

    let high = count_importance(pairs, Importance::High);
    let medium = count_importance(pairs, Importance::Medium);

    let mut out = String::with_capacity(256 + pairs.len() * 96);
    out.push_str("🌅 *Good morning!*\n");
    let _ = writeln!(out, "📧 You have *{}* new emails:", pairs.len());
    let _ = writeln!(out, "🔴 {high} high priority");
    let _ = writeln!(out, "🟡 {medium} medium priority\n");

    out.push_str("🚨 *REQUIRE ATTENTION:*\n\n");
    let attention: Vec<&(Message, Analysis)> =
        pairs.iter().filter(|(_, a)| a.needs_attention()).collect();

    for (message, analysis) in attention.iter().take(MAX_ATTENTION_ITEMS) {
        let _ = writeln!(out, "📌 *{}*", display_name(&message.sender));
        let _ = writeln!(out, "   _{}_", clip_summary(&analysis.summary));
        if analysis.requires_action {
            out.push_str("   ⚡ Action required\n");
        }
        out.push('\n');
    }

    if attention.is_empty() {
        out.push_str("✅ No urgent emails\n\n");
    } else if attention.len() > MAX_ATTENTION_ITEMS {
        let _ = writeln!(
            out,
            "... and {} more urgent\n",
            attention.len() - MAX_ATTENTION_ITEMS
        );
    }

    out.push_str("📊 *BY CATEGORY:*\n");
    for (category, count) in category_rollup(pairs.iter().map(|(_, a)| a)) {
        let _ = writeln!(
            out,
            "{} {}: {count}",
            category_symbol(category),
            category.label()
        );
    }

    let _ = write!(out, "\n🕐 Checked: {}", checked_at.format("%H:%M"));
    out
}

fn count_importance(pairs: &[(Message, Analysis)], importance: Importance) -> usize {
    pairs
        .iter()
        .filter(|(_, a)| a.importance == importance)
        .count()
}
