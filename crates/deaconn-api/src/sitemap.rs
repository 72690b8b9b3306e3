use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};

use deaconn_db::models::SitemapEntry;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_db;

const STATIC_ROUTES: &[&str] = &[
    "",
    "/about",
    "/blog",
    "/service",
    "/request",
    "/partners",
    "/team",
    "/updates",
];

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn push_url(xml: &mut String, loc: &str, lastmod: Option<&str>) {
    xml.push_str("  <url>\n    <loc>");
    xml.push_str(&escape_xml(loc));
    xml.push_str("</loc>\n");
    if let Some(lastmod) = lastmod {
        // Stored timestamps are "YYYY-MM-DD HH:MM:SS"; the date is enough.
        let date = lastmod.split_whitespace().next().unwrap_or(lastmod);
        xml.push_str("    <lastmod>");
        xml.push_str(&escape_xml(date));
        xml.push_str("</lastmod>\n");
    }
    xml.push_str("  </url>\n");
}

pub fn render(base: &str, articles: &[SitemapEntry], services: &[SitemapEntry]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for route in STATIC_ROUTES {
        push_url(&mut xml, &format!("{base}{route}"), None);
    }
    for entry in articles {
        push_url(&mut xml, &format!("{base}/blog/view/{}", entry.url), Some(&entry.updated_at));
    }
    for entry in services {
        push_url(&mut xml, &format!("{base}/service/view/{}", entry.url), Some(&entry.updated_at));
    }
    xml.push_str("</urlset>\n");
    xml
}

/// GET /sitemap.xml
pub async fn sitemap(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let (articles, services) =
        run_db(&state, |db| Ok((db.article_sitemap()?, db.service_sitemap()?))).await?;
    let xml = render(&state.config.public_url, &articles, &services);
    Ok(([(header::CONTENT_TYPE, "application/xml; charset=utf-8")], xml))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_static_and_content_routes() {
        let articles = vec![SitemapEntry {
            url: "hello-world".into(),
            updated_at: "2024-03-01 12:00:00".into(),
        }];
        let xml = render("https://deaconn.net", &articles, &[]);

        assert!(xml.contains("<loc>https://deaconn.net</loc>"));
        assert!(xml.contains("<loc>https://deaconn.net/blog</loc>"));
        assert!(xml.contains("<loc>https://deaconn.net/blog/view/hello-world</loc>"));
        assert!(xml.contains("<lastmod>2024-03-01</lastmod>"));
        assert!(xml.ends_with("</urlset>\n"));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_xml("a&b<c>"), "a&amp;b&lt;c&gt;");
    }
}
