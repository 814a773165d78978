//! Plain HTML index of the feed's articles.

use chrono::FixedOffset;
use quick_xml::escape::escape;
use std::fmt::Write;

use crate::models::Article;

/// One `<li>` per article: linked title plus publication date in the site's timezone.
pub fn render_index(title: &str, articles: &[Article], site_offset: FixedOffset) -> String {
    let title = escape(title);
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>{title}</title>");
    html.push_str("</head>\n<body>\n");
    let _ = writeln!(html, "<h1>{title}</h1>");
    html.push_str("<ul>\n");

    for article in articles {
        let date = article
            .published_at
            .map(|d| d.with_timezone(&site_offset).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let _ = writeln!(
            html,
            "  <li><a href=\"{}\">{}</a> <small>{}</small></li>",
            escape(&article.url),
            escape(&article.title),
            date
        );
    }

    html.push_str("</ul>\n</body>\n</html>\n");
    html
}
