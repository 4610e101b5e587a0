//! Whole-site output artifacts generated after every page has rendered:
//! `sitemap.xml`, `rss.xml`, and a Netlify-style `_redirects` file.

use std::path::Path;

use chrono::Utc;

use crate::config::{RedirectsSection, RssSection, SitemapSection};
use crate::model::Site;

pub fn write_sitemap(site: &Site, output_dir: &Path, config: &SitemapSection) -> std::io::Result<()> {
    if !config.enabled {
        return Ok(());
    }
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");
    for id in site.page_ids() {
        let page = site.page(id);
        if page.is_generated() && page.kind == crate::model::page::PageKind::Archive {
            continue;
        }
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", xml_escape(&page.href)));
        if let Some(date) = page.date {
            xml.push_str(&format!("    <lastmod>{}</lastmod>\n", date.format("%Y-%m-%d")));
        }
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    std::fs::write(output_dir.join("sitemap.xml"), xml)
}

pub fn write_rss(
    site: &Site,
    output_dir: &Path,
    site_title: &str,
    baseurl: &str,
    config: &RssSection,
) -> std::io::Result<()> {
    if !config.enabled {
        return Ok(());
    }
    let mut entries: Vec<_> = site
        .page_ids()
        .filter(|id| !site.page(*id).is_generated() && site.page(*id).date.is_some())
        .collect();
    entries.sort_by_key(|id| std::cmp::Reverse(site.page(*id).date));
    entries.truncate(config.limit);

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\">\n<channel>\n");
    xml.push_str(&format!("  <title>{}</title>\n", xml_escape(site_title)));
    xml.push_str(&format!("  <link>{}</link>\n", xml_escape(baseurl)));
    xml.push_str(&format!("  <lastBuildDate>{}</lastBuildDate>\n", Utc::now().to_rfc2822()));
    for id in entries {
        let page = site.page(id);
        xml.push_str("  <item>\n");
        xml.push_str(&format!("    <title>{}</title>\n", xml_escape(&page.title())));
        xml.push_str(&format!("    <link>{}</link>\n", xml_escape(&page.href)));
        if let Some(date) = page.date {
            xml.push_str(&format!("    <pubDate>{}</pubDate>\n", date.to_rfc2822()));
        }
        if let Some(html) = &page.rendered_html {
            xml.push_str(&format!(
                "    <description>{}</description>\n",
                xml_escape(html)
            ));
        }
        xml.push_str("  </item>\n");
    }
    xml.push_str("</channel>\n</rss>\n");
    std::fs::write(output_dir.join("rss.xml"), xml)
}

/// Writes `_redirects` from each page's `aliases` front matter, one alias
/// per line in the Netlify/Vercel `FROM TO 301` convention.
pub fn write_redirects(site: &Site, output_dir: &Path, config: &RedirectsSection) -> std::io::Result<()> {
    if !config.enabled {
        return Ok(());
    }
    let mut body = String::new();
    for id in site.page_ids() {
        let page = site.page(id);
        if let Some(aliases) = page.metadata.get("aliases").as_list() {
            for alias in aliases {
                if let Some(from) = alias.as_str() {
                    body.push_str(&format!("{from} {} 301\n", page.href));
                }
            }
        }
    }
    if body.is_empty() {
        return Ok(());
    }
    std::fs::write(output_dir.join("_redirects"), body)
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::page::PageKind;
    use crate::model::{Page, Value};
    use tempfile::TempDir;

    fn page(path: &str, href: &str) -> Page {
        Page {
            source_path: std::path::PathBuf::from("x.md"),
            metadata: Value::Map(Default::default()),
            content: String::new(),
            parsed_ast: None,
            rendered_html: Some("<p>hi</p>".to_string()),
            section: None,
            href: href.to_string(),
            path: path.to_string(),
            absolute_href: None,
            tags: Default::default(),
            draft: false,
            date: Some(Utc::now()),
            output_path: std::path::PathBuf::new(),
            kind: PageKind::Regular,
            weight: None,
        }
    }

    #[test]
    fn writes_sitemap_with_every_page() {
        let tmp = TempDir::new().unwrap();
        let mut site = Site::new();
        site.push_page(page("/a/", "/a/"));
        write_sitemap(&site, tmp.path(), &SitemapSection { enabled: true }).unwrap();
        let xml = std::fs::read_to_string(tmp.path().join("sitemap.xml")).unwrap();
        assert!(xml.contains("/a/"));
    }

    #[test]
    fn disabled_sitemap_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let site = Site::new();
        write_sitemap(&site, tmp.path(), &SitemapSection { enabled: false }).unwrap();
        assert!(!tmp.path().join("sitemap.xml").exists());
    }

    #[test]
    fn writes_rss_limited_to_configured_count() {
        let tmp = TempDir::new().unwrap();
        let mut site = Site::new();
        for i in 0..5 {
            site.push_page(page(&format!("/p{i}/"), &format!("/p{i}/")));
        }
        let config = RssSection { enabled: true, limit: 2 };
        write_rss(&site, tmp.path(), "My Site", "", &config).unwrap();
        let xml = std::fs::read_to_string(tmp.path().join("rss.xml")).unwrap();
        assert_eq!(xml.matches("<item>").count(), 2);
    }
}
