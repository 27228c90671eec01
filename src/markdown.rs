//! Converts article bodies from Markdown to HTML.

use pulldown_cmark::{html, Event, Options, Parser};

/// Converts markdown to HTML, appending the result to `w`. Raw HTML in the
/// source is escaped rather than passed through, so the output can be
/// embedded in a page as-is. Templates render with `gtmpl`, which doesn't
/// escape, so this is the only place article markup is made safe; the plain
/// text fields still need the `html` builtin in templates.
pub fn to_html(w: &mut String, markdown: &str) {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    html::push_html(w, Parser::new_ext(markdown, options).map(escape_raw_html));
}

fn escape_raw_html(ev: Event<'_>) -> Event<'_> {
    match ev {
        // `push_html` escapes text events, so raw HTML comes out as literal
        // markup instead of live elements.
        Event::Html(html) => Event::Text(html),
        _ => ev,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn render(markdown: &str) -> String {
        let mut out = String::new();
        to_html(&mut out, markdown);
        out
    }

    #[test]
    fn test_paragraph() {
        assert_eq!(render("Hello!").trim(), "<p>Hello!</p>");
    }

    #[test]
    fn test_extensions() {
        let out = render("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~\n");
        assert!(out.contains("<table>"));
        assert!(out.contains("<del>gone</del>"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let out = render(concat!(
            "<div onclick=\"x()\">hi</div>\n\n",
            "some <script>alert(1)</script> text\n",
        ));
        assert!(!out.contains("<div"));
        assert!(!out.contains("<script>"));
        assert!(out.contains("&lt;div"));
        assert!(out.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_markdown_still_renders_around_html() {
        let out = render("*kept* <b>escaped</b> [link](/x)\n");
        assert!(out.contains("<em>kept</em>"));
        assert!(out.contains("&lt;b&gt;escaped&lt;/b&gt;"));
        assert!(out.contains("<a href=\"/x\">link</a>"));
    }
}
