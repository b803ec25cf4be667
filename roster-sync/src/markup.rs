//! Styled labels and the markup renderer seam.
//!
//! The engine treats labels as opaque: it only needs a renderer that turns a
//! template string into a [`StyledLabel`] or fails with a [`RenderError`].
//! [`TagMarkup`] is the bundled renderer for MiniMessage-style markup:
//!
//! ```text
//! "<gold>Online:</gold> <green>12"
//!   → [ {"Online:", [gold]}, {" ", []}, {"12", [green]} ]
//! ```
//!
//! Unclosed tags are closed implicitly at the end of input. A closing tag
//! that does not match the innermost open tag is an error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One run of text sharing the same stack of style tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledSpan {
    pub text: String,
    /// Active tags, outermost first (e.g. `["bold", "color:#ff0000"]`).
    pub styles: Vec<String>,
}

/// Rendered label payload carried by every roster row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledLabel {
    spans: Vec<StyledSpan>,
}

impl StyledLabel {
    /// The invisible label used by padding rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Unstyled text. Used as the fallback when markup fails to render.
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return Self::empty();
        }
        Self {
            spans: vec![StyledSpan { text, styles: Vec::new() }],
        }
    }

    pub fn from_spans(spans: Vec<StyledSpan>) -> Self {
        let mut label = Self::empty();
        for span in spans {
            label.push(span.text, &span.styles);
        }
        label
    }

    pub fn spans(&self) -> &[StyledSpan] {
        &self.spans
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Concatenated text with all styling stripped.
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// Append text, merging into the previous span when styles match.
    fn push(&mut self, text: String, styles: &[String]) {
        if text.is_empty() {
            return;
        }
        if let Some(last) = self.spans.last_mut() {
            if last.styles == styles {
                last.text.push_str(&text);
                return;
            }
        }
        self.spans.push(StyledSpan {
            text,
            styles: styles.to_vec(),
        });
    }
}

/// Markup that could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("closing tag </{0}> has no matching open tag")]
    UnexpectedClose(String),
    #[error("closing tag </{found}> does not match open tag <{expected}>")]
    MismatchedClose { expected: String, found: String },
    #[error("empty tag at byte {0}")]
    EmptyTag(usize),
}

/// Turns a raw template string into a styled label.
pub trait MarkupRenderer: Send + Sync {
    fn render(&self, raw: &str) -> Result<StyledLabel, RenderError>;
}

/// Bundled MiniMessage-style renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagMarkup;

impl TagMarkup {
    pub fn new() -> Self {
        Self
    }

    /// A tag body is `name` or `name:args`; anything else is literal text.
    fn is_tag_body(body: &str) -> bool {
        !body.is_empty()
            && body
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '#' | '/' | '!'))
    }

    fn tag_name(body: &str) -> &str {
        body.split(':').next().unwrap_or(body)
    }
}

impl MarkupRenderer for TagMarkup {
    fn render(&self, raw: &str) -> Result<StyledLabel, RenderError> {
        let mut label = StyledLabel::empty();
        let mut stack: Vec<String> = Vec::new();
        let mut text = String::new();
        let mut rest = raw;
        let mut offset = 0;

        while let Some(open) = rest.find('<') {
            text.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find(|c| c == '<' || c == '>') else {
                // No terminator: the rest is literal.
                text.push_str(&rest[open..]);
                rest = "";
                break;
            };
            if after[close..].starts_with('<') {
                // Another `<` before any `>`: this one is literal.
                text.push('<');
                rest = after;
                offset += open + 1;
                continue;
            }
            let body = &after[..close];
            let consumed = open + close + 2;

            if body.is_empty() {
                return Err(RenderError::EmptyTag(offset + open));
            }

            if !Self::is_tag_body(body) {
                text.push_str(&rest[open..consumed]);
            } else if let Some(name) = body.strip_prefix('/') {
                label.push(std::mem::take(&mut text), &stack);
                match stack.last() {
                    None => return Err(RenderError::UnexpectedClose(name.to_string())),
                    Some(top) if Self::tag_name(top) != name => {
                        return Err(RenderError::MismatchedClose {
                            expected: Self::tag_name(top).to_string(),
                            found: name.to_string(),
                        });
                    }
                    Some(_) => {
                        stack.pop();
                    }
                }
            } else {
                label.push(std::mem::take(&mut text), &stack);
                match body {
                    "reset" => stack.clear(),
                    "br" | "newline" => label.push("\n".to_string(), &stack),
                    _ => stack.push(body.to_string()),
                }
            }

            rest = &rest[consumed..];
            offset += consumed;
        }

        text.push_str(rest);
        label.push(text, &stack);
        Ok(label)
    }
}
