use crate::summarize::SummaryFormat;

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Converts the final summary into publisher storage markup.
pub fn storage_html(summary: &str, format: SummaryFormat) -> String {
    match format {
        SummaryFormat::Xhtml => summary.to_string(),
        SummaryFormat::Markdown | SummaryFormat::Table => {
            format!("<pre>{}</pre>", escape_html(summary))
        }
    }
}

pub fn page_title(epic_id: &str, epic_title: &str) -> String {
    format!("{epic_id} - {epic_title}: Engineering Changelog")
}

pub fn completed_preview(url: &str) -> String {
    let url = escape_html(url);
    format!(
        "<html><body><h2>Changelog Generated!</h2>\
         <p>View on Confluence: <a href=\"{url}\" target=\"_blank\">{url}</a></p></body></html>"
    )
}

pub fn completed_without_url_preview() -> String {
    "<html><body><h2>Completed</h2>\
     <p>Changelog process finished, but no Confluence URL was returned.</p></body></html>"
        .to_string()
}

pub fn error_preview() -> String {
    "<html><body><h2>Error</h2>\
     <p>Failed to generate changelog. Check activity logs for more details.</p></body></html>"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_formats_are_escaped_and_preformatted() {
        let html = storage_html("a < b & \"c\"", SummaryFormat::Markdown);
        assert_eq!(html, "<pre>a &lt; b &amp; &quot;c&quot;</pre>");
        assert!(storage_html("| x |", SummaryFormat::Table).starts_with("<pre>"));
    }

    #[test]
    fn xhtml_passes_through() {
        assert_eq!(storage_html("<h2>Hi</h2>", SummaryFormat::Xhtml), "<h2>Hi</h2>");
    }

    #[test]
    fn completed_preview_links_the_page() {
        let html = completed_preview("https://wiki/x?a=1&b=2");
        assert!(html.contains("href=\"https://wiki/x?a=1&amp;b=2\""));
        assert!(html.contains("Changelog Generated!"));
    }

    #[test]
    fn title_names_the_epic() {
        assert_eq!(
            page_title("EPIC-1", "Payments"),
            "EPIC-1 - Payments: Engineering Changelog"
        );
    }
}
