// src/analysis/mod.rs
use crate::{
    config::Config,
    fetch,
    llm::{CompletionService, OpenAiClient},
    plot::PlotOptions,
};
use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::{fmt, sync::Arc};
use tracing::info;
use url::Url;

pub mod courts;
pub mod films;
pub mod generic;

/// The kinds of question the service knows how to answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    /// Scrape the highest-grossing films table and answer the four fixed questions.
    HighestGrossingFilms,
    /// Indian high court judgements. Answered by a stub with fixed values.
    IndianHighCourts,
    /// Anything else; forwarded to the completion service when one is configured.
    /// This is the default when no other kind matches.
    Generic,
}

impl AnalysisKind {
    /// Classify a free-text question (case-insensitive).
    ///
    /// - mentions both "wikipedia" and "highest-grossing" → [`HighestGrossingFilms`](Self::HighestGrossingFilms)
    /// - mentions "indian high court" or "ecourts" → [`IndianHighCourts`](Self::IndianHighCourts)
    /// - otherwise → [`Generic`](Self::Generic)
    pub fn classify(question: &str) -> Self {
        let q = question.to_lowercase();
        if q.contains("wikipedia") && q.contains("highest-grossing") {
            AnalysisKind::HighestGrossingFilms
        } else if q.contains("indian high court") || q.contains("ecourts") {
            AnalysisKind::IndianHighCourts
        } else {
            AnalysisKind::Generic
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AnalysisKind::HighestGrossingFilms => "highest_grossing_films",
            AnalysisKind::IndianHighCourts => "indian_high_courts",
            AnalysisKind::Generic => "generic",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a request needs, built once at startup and shared read-only.
#[derive(Clone)]
pub struct Analyzer {
    client: Client,
    films_url: Url,
    completion: Option<Arc<dyn CompletionService>>,
    plot: PlotOptions,
}

impl Analyzer {
    pub fn new(
        client: Client,
        films_url: Url,
        completion: Option<Arc<dyn CompletionService>>,
        plot: PlotOptions,
    ) -> Self {
        Self {
            client,
            films_url,
            completion,
            plot,
        }
    }

    /// Wire up the HTTP client, the optional OpenAI client and plot options from `cfg`.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client = fetch::build_client(&cfg.user_agent)?;
        let completion = cfg.openai.as_ref().map(|o| {
            info!(model = %o.model, "completion service enabled");
            Arc::new(OpenAiClient::new(client.clone(), &o.base_url, &o.api_key, &o.model))
                as Arc<dyn CompletionService>
        });
        if completion.is_none() {
            info!("OPENAI_API_KEY not set; generic questions get the fallback message");
        }
        let plot = PlotOptions {
            font_path: cfg.plot_font.clone(),
            ..PlotOptions::default()
        };
        Ok(Self::new(client, cfg.films_url.clone(), completion, plot))
    }

    pub fn has_completion(&self) -> bool {
        self.completion.is_some()
    }

    /// Classify `question` and run the matching handler.
    #[tracing::instrument(level = "info", skip_all, fields(kind = tracing::field::Empty))]
    pub async fn process(&self, question: &str) -> Result<Value> {
        let kind = AnalysisKind::classify(question);
        tracing::Span::current().record("kind", kind.as_str());
        info!(chars = question.len(), "processing question");

        let answer = match kind {
            AnalysisKind::HighestGrossingFilms => {
                films::run(&self.client, &self.films_url, &self.plot).await
            }
            AnalysisKind::IndianHighCourts => {
                let question = question.to_string();
                let plot = self.plot.clone();
                tokio::task::spawn_blocking(move || courts::run(&question, &plot))
                    .await
                    .context("courts analysis task")?
            }
            AnalysisKind::Generic => generic::run(self.completion.as_deref(), question).await,
        };
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_keywords() {
        assert_eq!(
            AnalysisKind::classify(
                "Scrape the list of highest-grossing films from Wikipedia."
            ),
            AnalysisKind::HighestGrossingFilms
        );
        assert_eq!(
            AnalysisKind::classify("The INDIAN HIGH COURT judgement dataset"),
            AnalysisKind::IndianHighCourts
        );
        assert_eq!(
            AnalysisKind::classify("downloaded from ecourts website"),
            AnalysisKind::IndianHighCourts
        );
    }

    #[test]
    fn needs_both_film_keywords() {
        assert_eq!(
            AnalysisKind::classify("Open wikipedia and summarise it"),
            AnalysisKind::Generic
        );
        assert_eq!(
            AnalysisKind::classify("highest-grossing films of 2020"),
            AnalysisKind::Generic
        );
        assert_eq!(AnalysisKind::classify(""), AnalysisKind::Generic);
    }

    #[test]
    fn films_take_precedence_over_courts() {
        assert_eq!(
            AnalysisKind::classify("wikipedia highest-grossing ecourts"),
            AnalysisKind::HighestGrossingFilms
        );
    }

    #[test]
    fn from_default_config_has_no_completion() -> Result<()> {
        let analyzer = Analyzer::from_config(&Config::default())?;
        assert!(!analyzer.has_completion());
        Ok(())
    }
}
