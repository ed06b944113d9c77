//! Result renderers
//!
//! Every renderer consumes the same ordered result list; which one is used
//! is a configuration choice.

use std::fmt::Write as _;

use relinfer_core::Error;
use relinfer_core::domain::{InferenceResult, RelationType, Term};

/// Hard cap on a single chat message
pub const CHAT_MESSAGE_LIMIT: usize = 2000;

/// The question being answered
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub source: Term,
    pub relation: RelationType,
    pub target: Term,
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.source, self.relation, self.target)
    }
}

/// Confidence band used for highlighting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Strong,
    Medium,
    Weak,
}

impl Band {
    pub fn of(certainty: f64) -> Self {
        if certainty >= 0.7 {
            Self::Strong
        } else if certainty >= 0.5 {
            Self::Medium
        } else {
            Self::Weak
        }
    }

    fn ansi(self) -> &'static str {
        match self {
            Self::Strong => "\x1b[32m",
            Self::Medium => "\x1b[33m",
            Self::Weak => "\x1b[31m",
        }
    }
}

/// Turns results into printable messages
pub trait Renderer {
    /// One or more messages, printed or sent in order
    fn render(&self, query: &Query, results: &[InferenceResult]) -> Vec<String>;

    fn render_error(&self, error: &Error) -> String {
        match error.suggestion() {
            Some(hint) => format!("error[{}]: {}\n  hint: {}", error.code(), error, hint),
            None => format!("error[{}]: {}", error.code(), error),
        }
    }
}

/// Select a renderer by configuration name
pub fn renderer_by_name(name: &str, color: bool) -> anyhow::Result<Box<dyn Renderer>> {
    match name {
        "terminal" => Ok(Box::new(TerminalRenderer { color })),
        "chat" => Ok(Box::new(ChatRenderer::default())),
        other => anyhow::bail!("Unknown renderer '{}'. Valid options: terminal, chat", other),
    }
}

/// Numbered lines for an interactive terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalRenderer {
    pub color: bool,
}

impl Renderer for TerminalRenderer {
    fn render(&self, query: &Query, results: &[InferenceResult]) -> Vec<String> {
        if results.is_empty() {
            return vec![format!("{} : no", query)];
        }

        let mut out = format!("{} : yes ({} justification", query, results.len());
        out.push_str(if results.len() == 1 { ")\n" } else { "s)\n" });

        for result in results {
            let score = format!("{:.2}", result.certainty);
            let score = if self.color {
                format!("{}{}\x1b[0m", Band::of(result.certainty).ansi(), score)
            } else {
                score
            };
            let _ = writeln!(
                out,
                "{:>3}. [{}] {:<12} {}",
                result.rank,
                score,
                result.kind.as_str(),
                result.path
            );
        }

        vec![out.trim_end().to_string()]
    }
}

/// Markdown blocks sized for a chat service
#[derive(Debug, Clone, Copy)]
pub struct ChatRenderer {
    pub limit: usize,
}

impl Default for ChatRenderer {
    fn default() -> Self {
        Self {
            limit: CHAT_MESSAGE_LIMIT,
        }
    }
}

impl ChatRenderer {
    fn block(result: &InferenceResult) -> String {
        let band = match Band::of(result.certainty) {
            Band::Strong => "+",
            Band::Medium => "~",
            Band::Weak => "-",
        };
        format!(
            "```diff\n{} {}. [{:.2}] {}\n{}\n```",
            band, result.rank, result.certainty, result.kind, result.path
        )
    }

    /// Cut `text` to at most `limit` bytes on a char boundary
    fn clip(&self, text: String) -> String {
        if text.len() <= self.limit {
            return text;
        }
        let suffix = "\n...```";
        let mut end = self.limit.saturating_sub(suffix.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}{}", &text[..end], suffix)
    }
}

impl Renderer for ChatRenderer {
    fn render(&self, query: &Query, results: &[InferenceResult]) -> Vec<String> {
        let header = if results.is_empty() {
            format!("**{}** : no", query)
        } else {
            format!("**{}** : yes", query)
        };

        let mut messages = Vec::new();
        let mut current = self.clip(header);

        for block in results.iter().map(Self::block).map(|b| self.clip(b)) {
            if current.len() + 1 + block.len() <= self.limit {
                current.push('\n');
                current.push_str(&block);
            } else {
                messages.push(std::mem::replace(&mut current, block));
            }
        }
        messages.push(current);
        messages
    }
}
