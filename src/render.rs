//! Turn a completed job's markup into HTML.
//!
//! Markdown goes through `pulldown-cmark` with math enabled, so `$…$` and
//! `$$…$$` come out as `<span class="math math-inline">` /
//! `<span class="math math-display">` elements for KaTeX to typeset in the
//! browser. HTML results pass through untouched; plain text is escaped into a
//! `<pre>` block.

use crate::job::{JobResult, MarkupFormat};
use pulldown_cmark::{html, Options, Parser};

const KATEX_VERSION: &str = "0.16.11";

/// Render the result as an HTML fragment.
pub fn render_html(result: &JobResult) -> String {
    let source = normalise(&result.content);
    match result.format {
        MarkupFormat::Markdown => markdown_to_html(&source),
        MarkupFormat::Html => source,
        MarkupFormat::Text => format!("<pre>{}</pre>\n", escape_html(&source)),
    }
}

/// Render the result as a standalone HTML page that typesets math with KaTeX.
pub fn render_document(result: &JobResult, title: &str) -> String {
    let body = render_html(result);
    let title = escape_html(title);
    let cdn = format!("https://cdn.jsdelivr.net/npm/katex@{KATEX_VERSION}/dist");
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<link rel="stylesheet" href="{cdn}/katex.min.css">
<script defer src="{cdn}/katex.min.js"></script>
<script>
document.addEventListener("DOMContentLoaded", function () {{
  document.querySelectorAll("span.math").forEach(function (el) {{
    katex.render(el.textContent, el, {{
      displayMode: el.classList.contains("math-display"),
      throwOnError: false
    }});
  }});
}});
</script>
</head>
<body>
<article>
{body}</article>
</body>
</html>
"#
    )
}

fn markdown_to_html(source: &str) -> String {
    let options = Options::ENABLE_MATH
        | Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH;
    let parser = Parser::new_ext(source, options);
    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// CRLF → LF and strip zero-width / BOM characters that OCR output picks up.
fn normalise(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace(
            [
                '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
            ],
            "",
        )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markdown(s: &str) -> JobResult {
        JobResult {
            format: MarkupFormat::Markdown,
            content: s.into(),
        }
    }

    #[test]
    fn heading() {
        assert_eq!(render_html(&markdown("# Result")), "<h1>Result</h1>\n");
    }

    #[test]
    fn inline_and_display_math_become_spans() {
        let html = render_html(&markdown("Energy $E = mc^2$.\n\n$$\\int_0^1 x\\,dx$$\n"));
        assert!(html.contains(r#"<span class="math math-inline">E = mc^2</span>"#), "{html}");
        assert!(html.contains(r#"class="math math-display""#), "{html}");
    }

    #[test]
    fn tables_are_rendered() {
        let html = render_html(&markdown("| a | b |\n|---|---|\n| 1 | 2 |\n"));
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>2</td>"));
    }

    #[test]
    fn crlf_and_invisible_chars_are_normalised() {
        let html = render_html(&markdown("\u{FEFF}# Ti\u{200B}tle\r\n\r\nbody\r\n"));
        assert_eq!(html, "<h1>Title</h1>\n<p>body</p>\n");
    }

    #[test]
    fn html_passes_through() {
        let r = JobResult {
            format: MarkupFormat::Html,
            content: "<p>ready</p>".into(),
        };
        assert_eq!(render_html(&r), "<p>ready</p>");
    }

    #[test]
    fn text_is_escaped() {
        let r = JobResult {
            format: MarkupFormat::Text,
            content: "a < b && c".into(),
        };
        assert_eq!(render_html(&r), "<pre>a &lt; b &amp;&amp; c</pre>\n");
    }

    #[test]
    fn document_wraps_fragment_and_escapes_title() {
        let doc = render_document(&markdown("# Result"), "scan <1>.pdf");
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<title>scan &lt;1&gt;.pdf</title>"));
        assert!(doc.contains("<h1>Result</h1>"));
        assert!(doc.contains("katex.min.js"));
    }
}
