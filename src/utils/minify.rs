//! HTML minification.
//!
//! Enabled or disabled through `[build].minify` in `SiteConfig`.

use crate::config::SiteConfig;
use std::borrow::Cow;

/// Minify HTML if enabled in config.
///
/// Returns `Cow::Borrowed` if minify disabled, `Cow::Owned` if minified.
pub fn minify_html<'a>(html: &'a [u8], config: &SiteConfig) -> Cow<'a, [u8]> {
    if !config.build.minify {
        return Cow::Borrowed(html);
    }

    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    Cow::Owned(minify_html::minify(html, &cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_minify(enabled: bool) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.build.minify = enabled;
        config
    }

    #[test]
    fn test_minify_disabled_returns_borrowed() {
        let config = config_with_minify(false);
        let html = b"<p>  hello  </p>\n\n";
        let result = minify_html(html, &config);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(&*result, html);
    }

    #[test]
    fn test_minify_enabled_shrinks_output() {
        let config = config_with_minify(true);
        let html = b"<div>\n    <p>hello</p>\n\n    <!-- note -->\n</div>\n";
        let result = minify_html(html, &config);
        assert!(matches!(result, Cow::Owned(_)));
        assert!(result.len() < html.len());

        let text = String::from_utf8_lossy(&result);
        assert!(text.contains("hello"));
        assert!(!text.contains("note"));
    }
}
