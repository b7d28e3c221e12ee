//! Preview extraction from raw HTML.
//!
//! Each field is derived from an ordered chain of candidate lookups; the first
//! one that yields a non-blank value wins. Nothing here fails: missing data
//! degrades to the configured defaults.

use scraper::{Html, Selector};
use url::Url;

use crate::config::ExtractConfig;
use crate::models::PreviewResult;

type Candidate = fn(&Html) -> Option<String>;

const TITLE_CHAIN: &[Candidate] = &[og_title, twitter_title, title_tag];
const DESCRIPTION_CHAIN: &[Candidate] = &[og_description, twitter_description, meta_description];
const IMAGE_CHAIN: &[Candidate] = &[og_image, twitter_image, image_src_link, first_body_image];

const TITLE_SEPARATORS: &[&str] = &["-", "|", "–", "—", "·"];

/// Build a preview card from `html`. `base_url` is the page URL after
/// redirects; `source_url` is echoed back unchanged.
pub fn extract(
    html: &str,
    base_url: &Url,
    source_url: &str,
    config: &ExtractConfig,
) -> PreviewResult {
    let document = Html::parse_document(html);

    let title = first_non_empty(&document, TITLE_CHAIN)
        .map(|t| collapse_whitespace(&t))
        .map(|t| {
            let site_name = meta_content(&document, "og:site_name");
            let names = config
                .title_suffixes
                .iter()
                .map(String::as_str)
                .chain(site_name.as_deref());
            strip_site_suffix(&t, names)
        })
        .unwrap_or_else(|| config.default_title.clone());

    let description = first_non_empty(&document, DESCRIPTION_CHAIN)
        .map(|d| collapse_whitespace(&d))
        .unwrap_or_else(|| config.default_description.clone());

    // The placeholder is substituted after resolution, never joined to the base.
    let image = first_non_empty(&document, IMAGE_CHAIN)
        .and_then(|raw| resolve_image(&raw, base_url))
        .unwrap_or_else(|| config.placeholder_image.clone());

    PreviewResult::new(title, description, image, source_url.to_string())
}

fn first_non_empty(doc: &Html, chain: &[Candidate]) -> Option<String> {
    chain.iter().find_map(|candidate| {
        candidate(doc)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

// ── Candidates ─────────────────────────────────────────────────────────────

fn og_title(doc: &Html) -> Option<String> {
    meta_content(doc, "og:title")
}

fn twitter_title(doc: &Html) -> Option<String> {
    meta_content(doc, "twitter:title")
}

fn title_tag(doc: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    doc.select(&selector)
        .next()
        .map(|el| el.text().collect::<String>())
}

fn og_description(doc: &Html) -> Option<String> {
    meta_content(doc, "og:description")
}

fn twitter_description(doc: &Html) -> Option<String> {
    meta_content(doc, "twitter:description")
}

fn meta_description(doc: &Html) -> Option<String> {
    meta_content(doc, "description")
}

fn og_image(doc: &Html) -> Option<String> {
    meta_content(doc, "og:image")
}

fn twitter_image(doc: &Html) -> Option<String> {
    meta_content(doc, "twitter:image").or_else(|| meta_content(doc, "twitter:image:src"))
}

fn image_src_link(doc: &Html) -> Option<String> {
    let selector = Selector::parse(r#"link[rel~="image_src"]"#).ok()?;
    doc.select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .map(str::to_string)
}

fn first_body_image(doc: &Html) -> Option<String> {
    let selector = Selector::parse("body img[src]").ok()?;
    doc.select(&selector)
        .filter_map(|el| el.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())
        .map(str::to_string)
}

/// `content` of the first non-blank `<meta>` keyed by `key`, matched against
/// either `property` or `name` since sites use both for OG and Twitter tags.
fn meta_content(doc: &Html, key: &str) -> Option<String> {
    let selector =
        Selector::parse(&format!(r#"meta[property="{key}"], meta[name="{key}"]"#)).ok()?;
    doc.select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

// ── Post-processing ────────────────────────────────────────────────────────

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop a trailing " - SiteName" (or `|`, `–`, `—`, `·`) from `title`.
/// Comparison is ASCII case-insensitive. A title made only of the site name
/// is returned unchanged.
fn strip_site_suffix<'a>(title: &str, site_names: impl IntoIterator<Item = &'a str>) -> String {
    for name in site_names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        for sep in TITLE_SEPARATORS {
            let suffix = format!(" {sep} {name}");
            if title.len() <= suffix.len() {
                continue;
            }
            let cut = title.len() - suffix.len();
            if title.is_char_boundary(cut) && title[cut..].eq_ignore_ascii_case(&suffix) {
                let stripped = title[..cut].trim_end();
                if !stripped.is_empty() {
                    return stripped.to_string();
                }
            }
        }
    }
    title.to_string()
}

/// Make `raw` absolute against `base`. Absolute http(s) values are returned
/// verbatim; anything that cannot be resolved to http(s) yields `None`.
fn resolve_image(raw: &str, base: &Url) -> Option<String> {
    match Url::parse(raw) {
        Ok(absolute) => match absolute.scheme() {
            "http" | "https" => Some(raw.to_string()),
            _ => None,
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let joined = base.join(raw).ok()?;
            match joined.scheme() {
                "http" | "https" => Some(joined.to_string()),
                _ => None,
            }
        }
        Err(_) => None,
    }
}
