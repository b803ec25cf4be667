//! Header and footer text above and below the roster.
//!
//! Stateless: rendered fresh for every refresh and sent unconditionally.

use std::sync::Arc;

use crate::config::RosterConfig;
use crate::markup::{MarkupRenderer, StyledLabel, TagMarkup};
use crate::placeholder::{BuiltinSubstitutor, Substitutor};
use crate::protocol::HeaderFooter;
use crate::viewer::ViewerContext;

pub struct HeaderFooterRenderer {
    markup: Arc<dyn MarkupRenderer>,
    substitutor: Arc<dyn Substitutor>,
}

impl Default for HeaderFooterRenderer {
    fn default() -> Self {
        Self::new(Arc::new(TagMarkup::new()), Arc::new(BuiltinSubstitutor::new()))
    }
}

impl HeaderFooterRenderer {
    pub fn new(markup: Arc<dyn MarkupRenderer>, substitutor: Arc<dyn Substitutor>) -> Self {
        Self { markup, substitutor }
    }

    pub fn render(&self, viewer: &ViewerContext, config: &RosterConfig) -> HeaderFooter {
        HeaderFooter {
            header: self.block(viewer, &config.header, "header"),
            footer: self.block(viewer, &config.footer, "footer"),
        }
    }

    /// Join lines with `\n`, substitute, render.
    fn block(&self, viewer: &ViewerContext, lines: &[String], which: &str) -> StyledLabel {
        if lines.is_empty() {
            return StyledLabel::empty();
        }
        let joined = lines.join("\n");
        let processed = self.substitutor.substitute(viewer, &joined);
        self.markup.render(&processed).unwrap_or_else(|e| {
            log::warn!(
                "Failed to render {which} for {}: {e}; using plain text",
                viewer.session().name
            );
            StyledLabel::plain(processed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::ViewerSession;

    fn ctx() -> ViewerContext {
        ViewerContext::for_session(ViewerSession::new("Alice")).with_participants(4)
    }

    fn config(header: &[&str], footer: &[&str]) -> RosterConfig {
        RosterConfig {
            header: header.iter().map(|s| s.to_string()).collect(),
            footer: footer.iter().map(|s| s.to_string()).collect(),
            ..RosterConfig::default()
        }
    }

    #[test]
    fn test_header_lines_joined_with_newline() {
        let out = HeaderFooterRenderer::default().render(&ctx(), &config(&["<gold>Welcome {player}", "{online}/{max}"], &[]));
        assert_eq!(out.header.plain_text(), "Welcome Alice\n4/100");
        assert!(out.footer.is_empty());
    }

    #[test]
    fn test_style_carries_across_lines() {
        let out = HeaderFooterRenderer::default().render(&ctx(), &config(&["<gold>a", "b"], &[]));
        assert_eq!(out.header.spans().len(), 1);
        assert_eq!(out.header.spans()[0].styles, vec!["gold"]);
    }

    #[test]
    fn test_footer_fallback_on_bad_markup() {
        let out = HeaderFooterRenderer::default().render(&ctx(), &config(&[], &["{online} </red>"]));
        assert_eq!(out.footer, StyledLabel::plain("4 </red>"));
    }

    #[test]
    fn test_empty_config() {
        let out = HeaderFooterRenderer::default().render(&ctx(), &RosterConfig::default());
        assert_eq!(out, HeaderFooter::default());
    }
}
