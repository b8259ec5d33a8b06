//! Result formatting for display
//!
//! Presentation only: the registry stores raw output in `ToolResult`, and
//! these helpers shape it for a terminal. All cuts are by `char`.

use toolgate_foundation::{OutputFilterConfig, ToolResult};

/// Inline preview length
pub const INLINE_PREVIEW_CHARS: usize = 200;

/// Filters from the `[output]` config section
#[derive(Debug, Clone)]
pub struct OutputFilter {
    max_chars: usize,
    strip_ansi: bool,
    strip_control: bool,
}

impl From<&OutputFilterConfig> for OutputFilter {
    fn from(config: &OutputFilterConfig) -> Self {
        Self {
            max_chars: config.max_chars,
            strip_ansi: config.strip_ansi,
            strip_control: config.strip_control,
        }
    }
}

impl Default for OutputFilter {
    fn default() -> Self {
        Self::from(&OutputFilterConfig::default())
    }
}

impl OutputFilter {
    pub fn apply(&self, output: &str) -> String {
        let mut text = if self.strip_ansi {
            let stripped = strip_ansi_escapes::strip(output.as_bytes());
            String::from_utf8_lossy(&stripped).into_owned()
        } else {
            output.to_string()
        };

        if self.strip_control {
            text.retain(|c| !c.is_control() || c == '\n' || c == '\t');
        }

        truncate_with_note(&text, self.max_chars)
    }
}

/// Cut to `max_chars`, noting how much was dropped
pub fn truncate_with_note(s: &str, max_chars: usize) -> String {
    let total = s.chars().count();
    if total <= max_chars {
        return s.to_string();
    }

    let kept: String = s.chars().take(max_chars).collect();
    format!("{}\n... [truncated {} chars]", kept, total - max_chars)
}

/// Flatten to one line and cut with a trailing `...`
pub fn truncate_inline(s: &str, max_chars: usize) -> String {
    let flat: String = s
        .trim()
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();

    if flat.chars().count() <= max_chars {
        flat
    } else {
        let kept: String = flat.chars().take(max_chars).collect();
        format!("{}...", kept)
    }
}

/// One-line summary: `✓ name: output`, `✗ name: error`, `⚠ name: awaiting approval`
pub fn format_inline(result: &ToolResult) -> String {
    if let Some(request) = &result.approval {
        return format!(
            "⚠ {}: awaiting approval ({})",
            result.function,
            request.reason.description()
        );
    }

    match &result.error {
        None => format!(
            "✓ {}: {}",
            result.function,
            truncate_inline(&result.result, INLINE_PREVIEW_CHARS)
        ),
        Some(error) => format!(
            "✗ {}: {}",
            result.function,
            truncate_inline(&error.to_string(), INLINE_PREVIEW_CHARS)
        ),
    }
}

/// Multi-line block for full display: status line, then filtered output
pub fn format_block(result: &ToolResult, filter: &OutputFilter) -> String {
    let mut out = format!("{} ({}ms)", format_status(result), result.duration_ms);
    if !result.result.is_empty() {
        out.push('\n');
        out.push_str(&filter.apply(&result.result));
    }
    out
}

fn format_status(result: &ToolResult) -> String {
    if let Some(request) = &result.approval {
        format!("⚠ {} [{}]", result.function, request.reason.description())
    } else if let Some(error) = &result.error {
        format!("✗ {} [{}] {}", result.function, error.kind(), error)
    } else {
        format!("✓ {}", result.function)
    }
}
