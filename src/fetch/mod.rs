// src/fetch/mod.rs
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

/// Table selectors in order of preference.
static TABLE_SELECTORS: Lazy<[Selector; 2]> = Lazy::new(|| {
    [
        Selector::parse("table.wikitable").expect("CSS selector for wikitable should be valid"),
        Selector::parse("table.sortable").expect("CSS selector for sortable should be valid"),
    ]
});

/// Build the shared HTTP client.
pub fn build_client(user_agent: &str) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .gzip(true)
        .build()
        .context("building HTTP client")
}

/// GET `url` and return the body text. No retries.
///
/// An error status is not a failure: its page goes through table lookup like any other,
/// which normally ends at the fallback table.
#[tracing::instrument(level = "info", skip(client, url), fields(url = %url))]
pub async fn fetch_page(client: &Client, url: &Url) -> Result<String> {
    let resp = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {}", url))?;
    let status = resp.status();
    if !status.is_success() {
        warn!(%status, "non-success status, parsing the page anyway");
    }
    let html = resp
        .text()
        .await
        .with_context(|| format!("reading body from {}", url))?;
    info!(%status, bytes = html.len(), "fetched page");
    Ok(html)
}

/// First `table.wikitable`, else first `table.sortable`, else `None`.
pub fn select_table(doc: &Html) -> Option<ElementRef<'_>> {
    let found = TABLE_SELECTORS
        .iter()
        .find_map(|sel| doc.select(sel).next());
    debug!(found = found.is_some(), "table lookup");
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_wikitable_over_sortable() {
        let doc = Html::parse_document(
            r#"<html><body>
                <table class="sortable" id="s"><tr><td>a</td></tr></table>
                <table class="wikitable sortable" id="w"><tr><td>b</td></tr></table>
            </body></html>"#,
        );
        let table = select_table(&doc).expect("a table");
        assert_eq!(table.value().attr("id"), Some("w"));
    }

    #[test]
    fn falls_back_to_sortable_then_none() {
        let doc = Html::parse_document(
            r#"<table class="plain"></table><table class="sortable" id="s"></table>"#,
        );
        assert_eq!(
            select_table(&doc).and_then(|t| t.value().attr("id")),
            Some("s")
        );

        let doc = Html::parse_document(r#"<table class="plain"></table>"#);
        assert!(select_table(&doc).is_none());
    }

    #[tokio::test]
    async fn error_status_page_is_still_returned() -> anyhow::Result<()> {
        use warp::{http::StatusCode, Filter};

        let gone = warp::path("gone").map(|| {
            warp::reply::with_status(warp::reply::html("<p>no such page</p>"), StatusCode::NOT_FOUND)
        });
        let (addr, server) = warp::serve(gone).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let url = Url::parse(&format!("http://{}/gone", addr))?;
        let html = fetch_page(&Client::new(), &url).await?;
        assert!(html.contains("no such page"));
        assert!(select_table(&Html::parse_document(&html)).is_none());
        Ok(())
    }

    #[test]
    fn client_builds_with_custom_agent() {
        assert!(build_client("tablescout-test/0.0").is_ok());
    }
}
