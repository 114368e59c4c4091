//! Send questions to a running service and print the replies.
//!
//! ```text
//! ask [BASE_URL] [QUESTION_FILE]
//! ```
//! Without a question file the two sample questions are sent after a health check.

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::{env, fs};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

const FILMS_QUESTION: &str = r#"
Scrape the list of highest grossing films from Wikipedia. It is at the URL:
https://en.wikipedia.org/wiki/List_of_highest-grossing_films

Answer the following questions and respond with a JSON array of strings containing the answer.

1. How many $2 bn movies were released before 2020?
2. Which is the earliest film that grossed over $1.5 bn?
3. What's the correlation between the Rank and Peak?
4. Draw a scatterplot of Rank and Peak along with a dotted red regression line through it.
   Return as a base-64 encoded data URI, `"data:image/png;base64,iVBORw0KG..."` under 100,000 bytes.
"#;

const COURTS_QUESTION: &str = r#"
The Indian high court judgement dataset contains judgements from the Indian High Courts, downloaded from ecourts website.

Answer the following questions and respond with a JSON object containing the answer.

{
  "Which high court disposed the most cases from 2019 - 2022?": "...",
  "What's the regression slope of the date_of_registration - decision_date by year in the court=33_10?": "...",
  "Plot the year and # of days of delay from the above question as a scatterplot with a regression line. Encode as a base64 data URI under 100,000 characters": "data:image/webp:base64,..."
}
"#;

async fn health(client: &Client, base: &str) -> Result<Value> {
    let url = format!("{}/health", base);
    client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("GET {}", url))?
        .json()
        .await
        .context("decoding health reply")
}

async fn ask(client: &Client, base: &str, question: &str) -> Result<Value> {
    let url = format!("{}/api/", base);
    let resp = client
        .post(&url)
        .body(question.to_string())
        .send()
        .await
        .with_context(|| format!("POST {}", url))?;
    info!(status = %resp.status(), "reply");
    resp.json().await.context("decoding analysis reply")
}

fn print(label: &str, value: &Value) -> Result<()> {
    println!("{}:", label);
    println!("{}", serde_json::to_string_pretty(value)?);
    println!("\n{}\n", "=".repeat(50));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut args = env::args().skip(1);
    let base = args.next().unwrap_or_else(|| {
        let port = env::var("PORT").unwrap_or_else(|_| "5000".into());
        format!("http://localhost:{}", port)
    });
    let base = base.trim_end_matches('/').to_string();
    let client = Client::new();

    if let Some(path) = args.next() {
        let question =
            fs::read_to_string(&path).with_context(|| format!("reading question file {}", path))?;
        return print("Response", &ask(&client, &base, &question).await?);
    }

    let run = async {
        print("Health Check Response", &health(&client, &base).await?)?;
        print("Films Example Response", &ask(&client, &base, FILMS_QUESTION).await?)?;
        print("Courts Example Response", &ask(&client, &base, COURTS_QUESTION).await?)?;
        Ok::<_, anyhow::Error>(())
    };

    if let Err(e) = run.await {
        error!("{:#}", e);
        eprintln!(
            "Error: could not talk to {} ({:#}). Make sure the service is running.",
            base, e
        );
        std::process::exit(1);
    }
    Ok(())
}
