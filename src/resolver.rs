use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::domain::{DownloadLink, Jurisdiction};
use crate::error::PipelineError;

const LISTING_SELECTOR: &str = "ul.resource-list";
const ITEM_SELECTOR: &str = "li.resource-item";
const TITLE_SELECTOR: &str = "a.heading";
const DOWNLOAD_SELECTOR: &str = "a.resource-url-analytics";

fn selector(css: &str) -> Result<Selector, PipelineError> {
    Selector::parse(css).map_err(|err| PipelineError::ListingParse(format!("{css}: {err}")))
}

/// Finds the download link for `jurisdiction` on a TSE results listing page.
///
/// Entries are matched by the title of their heading anchor, which must start with
/// `"{UF} - "`. The first matching entry wins; if it has no download anchor the result
/// is `None`, as it is when the page has no resource list or nothing matches.
/// Relative hrefs are joined against `page_url`.
pub fn resolve_download_link(
    html: &str,
    jurisdiction: &Jurisdiction,
    page_url: &str,
) -> Result<Option<DownloadLink>, PipelineError> {
    if html.trim().is_empty() {
        return Err(PipelineError::ListingParse("empty listing document".to_string()));
    }

    let document = Html::parse_document(html);
    let listing_selector = selector(LISTING_SELECTOR)?;
    let item_selector = selector(ITEM_SELECTOR)?;

    let Some(listing) = document.select(&listing_selector).next() else {
        warn!(page = %page_url, "listing page has no resource list");
        return Ok(None);
    };

    let prefix = format!("{} - ", jurisdiction.as_str());
    let title_selector = selector(TITLE_SELECTOR)?;
    let download_selector = selector(DOWNLOAD_SELECTOR)?;

    let mut matches = listing
        .select(&item_selector)
        .filter(|item| entry_title(item, &title_selector).trim_start().starts_with(&prefix));
    let Some(item) = matches.next() else {
        return Ok(None);
    };
    for extra in matches {
        warn!(
            entry = %entry_title(&extra, &title_selector).trim(),
            "multiple matching resources, using first"
        );
    }

    let title = entry_title(&item, &title_selector);
    info!(title = %title.trim(), "resource found");

    let href = item
        .select(&download_selector)
        .next()
        .and_then(|anchor| anchor.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty());
    let Some(href) = href else {
        warn!(title = %title.trim(), "matching resource has no download anchor");
        return Ok(None);
    };

    let url = absolute_url(href, page_url);
    debug!(url = %url, "resolved download url");
    DownloadLink::from_url(&url).map(Some)
}

fn entry_title(item: &ElementRef<'_>, title_selector: &Selector) -> String {
    item.select(title_selector)
        .next()
        .and_then(|anchor| anchor.value().attr("title"))
        .unwrap_or_default()
        .to_string()
}

fn absolute_url(href: &str, page_url: &str) -> String {
    if Url::parse(href).is_ok() {
        return href.to_string();
    }
    Url::parse(page_url)
        .and_then(|base| base.join(href))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://dadosabertos.tse.jus.br/dataset/resultados-2022";

    #[test]
    fn relative_href_is_joined() {
        let html = r#"<ul class="resource-list">
            <li class="resource-item">
              <a class="heading" title="CE - Votação por seção eleitoral - 2022">CE</a>
              <a class="resource-url-analytics" href="/files/votacao_secao_2022_CE.zip">Baixar</a>
            </li></ul>"#;
        let uf: Jurisdiction = "CE".parse().unwrap();
        let link = resolve_download_link(html, &uf, PAGE).unwrap().unwrap();
        assert_eq!(
            link.url,
            "https://dadosabertos.tse.jus.br/files/votacao_secao_2022_CE.zip"
        );
        assert_eq!(link.file_name, "votacao_secao_2022_CE.zip");
    }

    #[test]
    fn empty_document_is_a_parse_error() {
        let uf: Jurisdiction = "CE".parse().unwrap();
        let err = resolve_download_link("  \n", &uf, PAGE).unwrap_err();
        assert!(matches!(err, PipelineError::ListingParse(_)));
    }
}
