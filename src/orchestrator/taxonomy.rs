//! Synthesizes per-term and overview pages for each configured taxonomy,
//! mirroring the shape `discovery` gives authored pages so the renderer
//! doesn't need to special-case them.

use crate::model::page::PageKind;
use crate::model::{Page, Site, Value};

const PAGE_SIZE: usize = 20;

/// Build taxonomy term/overview pages and push them into `site`, returning
/// the number of pages synthesized. `output_dir` must be the same root
/// `discovery::output_path_for` writes authored pages under, so synthesized
/// taxonomy pages land in the real, possibly `--output`-overridden, output
/// tree instead of a stray default-named one.
pub fn synthesize(site: &mut Site, baseurl: &str, output_dir: &str) -> usize {
    let mut created = 0;
    let tax_names: Vec<String> = site.taxonomies.keys().cloned().collect();
    for name in tax_names {
        let terms: Vec<(String, usize)> = {
            let tax = site.taxonomies.get(&name).expect("just listed");
            tax.terms().map(|t| (t.term.clone(), t.page_count())).collect()
        };

        created += push_generated(
            site,
            baseurl,
            output_dir,
            &format!("/{name}/"),
            PageKind::TaxonomyOverview,
            &format!("{name}:overview"),
            overview_metadata(&name, &terms),
        );

        for (term, count) in &terms {
            let pages_for_term: Vec<crate::model::PageId> = {
                let tax = site.taxonomies.get(&name).expect("just listed");
                tax.term(term)
                    .map(|r| r.page_ids.iter().copied().collect())
                    .unwrap_or_default()
            };
            let total_pages = count.div_ceil(PAGE_SIZE).max(1);
            for page_num in 1..=total_pages {
                let path = if page_num == 1 {
                    format!("/{name}/{term}/")
                } else {
                    format!("/{name}/{term}/page/{page_num}/")
                };
                created += push_generated(
                    site,
                    baseurl,
                    output_dir,
                    &path,
                    PageKind::TaxonomyTerm,
                    &format!("{name}:{term}:{page_num}"),
                    term_metadata(&name, term, *count, page_num, total_pages, &pages_for_term),
                );
            }
        }
    }
    created
}

fn overview_metadata(name: &str, terms: &[(String, usize)]) -> Value {
    let mut map = std::collections::BTreeMap::new();
    map.insert("title".to_string(), Value::String(name.to_string()));
    map.insert("_generated".to_string(), Value::Bool(true));
    map.insert(
        "terms".to_string(),
        Value::List(
            terms
                .iter()
                .map(|(t, c)| {
                    let mut m = std::collections::BTreeMap::new();
                    m.insert("name".to_string(), Value::String(t.clone()));
                    m.insert("count".to_string(), Value::Int(*c as i64));
                    Value::Map(m)
                })
                .collect(),
        ),
    );
    Value::Map(map)
}

fn term_metadata(
    name: &str,
    term: &str,
    count: usize,
    page_num: usize,
    total_pages: usize,
    page_ids: &[crate::model::PageId],
) -> Value {
    let mut map = std::collections::BTreeMap::new();
    map.insert("title".to_string(), Value::String(term.to_string()));
    map.insert("taxonomy".to_string(), Value::String(name.to_string()));
    map.insert("term".to_string(), Value::String(term.to_string()));
    map.insert("count".to_string(), Value::Int(count as i64));
    map.insert("page_num".to_string(), Value::Int(page_num as i64));
    map.insert("total_pages".to_string(), Value::Int(total_pages as i64));
    map.insert("_generated".to_string(), Value::Bool(true));
    map.insert(
        "page_ids".to_string(),
        Value::List(page_ids.iter().map(|p| Value::Int(p.0 as i64)).collect()),
    );
    Value::Map(map)
}

fn push_generated(
    site: &mut Site,
    baseurl: &str,
    output_dir: &str,
    path: &str,
    kind: PageKind,
    virtual_key: &str,
    metadata: Value,
) -> usize {
    let href = if baseurl.is_empty() {
        path.to_string()
    } else {
        format!("{}{}", baseurl.trim_end_matches('/'), path)
    };
    let output_rel = format!("{}/index.html", path.trim_start_matches('/').trim_end_matches('/'));
    site.push_page(Page {
        source_path: std::path::PathBuf::from(format!("<taxonomy:{virtual_key}>")),
        metadata,
        content: String::new(),
        parsed_ast: None,
        rendered_html: None,
        section: None,
        href,
        path: path.to_string(),
        absolute_href: None,
        tags: Default::default(),
        draft: false,
        date: None,
        output_path: std::path::Path::new(output_dir).join(output_rel),
        kind,
        weight: None,
    });
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PageId;

    #[test]
    fn synthesizes_overview_and_term_pages() {
        let mut site = Site::new();
        let mut tax = crate::model::Taxonomy::new("tags");
        tax.insert("rust", PageId(0));
        tax.insert("web", PageId(0));
        site.taxonomies.insert("tags".to_string(), tax);
        let created = synthesize(&mut site, "", "public");
        assert_eq!(created, 3); // overview + 2 terms
        assert!(site.page_ids().any(|id| site.page(id).path == "/tags/"));
        assert!(site.page_ids().any(|id| site.page(id).path == "/tags/rust/"));
    }

    #[test]
    fn respects_a_non_default_output_dir() {
        let mut site = Site::new();
        let mut tax = crate::model::Taxonomy::new("tags");
        tax.insert("rust", PageId(0));
        site.taxonomies.insert("tags".to_string(), tax);
        synthesize(&mut site, "", "dist");
        let term_page = site
            .page_ids()
            .find(|id| site.page(*id).path == "/tags/rust/")
            .expect("term page created");
        assert_eq!(
            site.page(term_page).output_path,
            std::path::Path::new("dist/tags/rust/index.html")
        );
    }

    #[test]
    fn paginates_large_terms() {
        let mut site = Site::new();
        let mut tax = crate::model::Taxonomy::new("tags");
        for i in 0..45 {
            tax.insert("big", PageId(i));
        }
        site.taxonomies.insert("tags".to_string(), tax);
        synthesize(&mut site, "", "public");
        let page2 = site
            .page_ids()
            .find(|id| site.page(*id).path == "/tags/big/page/2/");
        assert!(page2.is_some());
    }
}
