//! CLI output formatting utilities.

use crate::store::{Class, SessionMeta, Summary};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print one line of a class listing.
    pub fn class_info(class: &Class) {
        let last = class
            .last_session_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "no sessions".to_string());
        println!(
            "  {} {} [{}] ({}, {} sessions, {})",
            style("*").cyan(),
            style(&class.name).bold(),
            class.code,
            style(&class.id).dim(),
            class.session_ids.len(),
            last
        );
    }

    /// Print one line of a session listing.
    pub fn session_info(session: &SessionMeta) {
        let marker = if session.has_summary {
            style("summarized").green()
        } else {
            style("no summary").dim()
        };
        println!(
            "  {} {} ({}, {}, {} chars, {})",
            style("*").cyan(),
            style(&session.title).bold(),
            style(&session.id).dim(),
            session.created_at.format("%Y-%m-%d %H:%M"),
            session.content_chars,
            marker
        );
    }

    /// Print a summary section by section.
    pub fn summary(summary: &Summary) {
        let sections = [
            ("Key Points", &summary.key_points),
            ("Details", &summary.details),
            ("Action Items", &summary.action_items),
            ("Open Questions", &summary.open_questions),
            ("Vocabulary", &summary.vocabulary),
        ];

        for (heading, items) in sections {
            if items.is_empty() {
                continue;
            }
            println!("\n{}", style(heading).bold());
            for item in items {
                Self::list_item(item);
            }
        }

        println!(
            "\n  {}",
            style(format!(
                "Generated {} by {} ({})",
                summary.generated_at.format("%Y-%m-%d %H:%M"),
                summary.provider,
                summary.model
            ))
            .dim()
        );
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Single-line preview of content, cut on a character boundary.
pub fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    match content.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}...", &content[..index]),
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_preview() {
        assert_eq!(content_preview("short", 10), "short");
        assert_eq!(content_preview("line one\nline two", 8), "line one...");
        assert_eq!(content_preview("ååååå", 2), "åå...");
    }
}
