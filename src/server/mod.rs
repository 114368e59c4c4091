// src/server/mod.rs
use crate::analysis::Analyzer;
use anyhow::{anyhow, Context};
use futures::TryStreamExt;
use serde::Serialize;
use std::{convert::Infallible, sync::Arc, time::Instant};
use tracing::{debug, error, info};
use warp::{
    http::StatusCode,
    hyper::body::{Buf, Bytes},
    multipart::{FormData, Part},
    reject::{self, Reject, Rejection},
    reply::Reply,
    Filter,
};

/// Largest accepted question body or upload.
pub const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;
/// Multipart field holding an uploaded question.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Any failure while reading or answering a question; rendered as a 500.
#[derive(Debug)]
struct AnalysisFailed(String);

impl Reject for AnalysisFailed {}

/// Declared `Content-Length` above [`MAX_BODY_BYTES`].
#[derive(Debug)]
struct BodyTooLarge;

impl Reject for BodyTooLarge {}

impl AnalysisFailed {
    fn from_error(err: anyhow::Error) -> Rejection {
        reject::custom(AnalysisFailed(format!("{:#}", err)))
    }
}

/// `GET /health` and `POST /api/`, with rejections turned into JSON errors.
pub fn routes(
    analyzer: Arc<Analyzer>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(health_check);

    let api = warp::path("api")
        .and(warp::path::end())
        .and(warp::post())
        .and(question())
        .and(with_analyzer(analyzer))
        .and_then(analyze);

    health.or(api).recover(handle_rejection)
}

fn with_analyzer(
    analyzer: Arc<Analyzer>,
) -> impl Filter<Extract = (Arc<Analyzer>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&analyzer))
}

/// The question text: the `file` part of a multipart upload, else the raw body.
fn question() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    let upload = warp::multipart::form()
        .max_length(MAX_BODY_BYTES)
        .and_then(question_from_form);

    // a request without a body (and so without a length) is an empty question
    let raw = warp::header::optional::<u64>("content-length")
        .and_then(|len: Option<u64>| async move {
            match len {
                Some(n) if n > MAX_BODY_BYTES => Err(reject::custom(BodyTooLarge)),
                _ => Ok(()),
            }
        })
        .untuple_one()
        .and(warp::body::bytes())
        .map(|body: Bytes| String::from_utf8_lossy(&body).into_owned());

    upload.or(raw).unify()
}

async fn question_from_form(form: FormData) -> Result<String, Rejection> {
    let parts: Vec<Part> = form
        .try_collect()
        .await
        .map_err(|e| AnalysisFailed::from_error(anyhow!("reading multipart form: {}", e)))?;

    for part in parts {
        if part.name() != UPLOAD_FIELD {
            continue;
        }
        let bytes = read_part(part).await.map_err(AnalysisFailed::from_error)?;
        let text = String::from_utf8(bytes)
            .context("uploaded question is not valid UTF-8")
            .map_err(AnalysisFailed::from_error)?;
        debug!(bytes = text.len(), "question from upload");
        return Ok(text);
    }

    debug!("multipart form without a `{}` part", UPLOAD_FIELD);
    Ok(String::new())
}

async fn read_part(part: Part) -> anyhow::Result<Vec<u8>> {
    part.stream()
        .try_fold(Vec::new(), |mut acc, mut buf| async move {
            while buf.has_remaining() {
                let chunk = buf.chunk();
                let n = chunk.len();
                acc.extend_from_slice(chunk);
                buf.advance(n);
            }
            Ok(acc)
        })
        .await
        .map_err(|e| anyhow!("reading upload: {}", e))
}

async fn health_check() -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&serde_json::json!({ "status": "healthy" })))
}

async fn analyze(question: String, analyzer: Arc<Analyzer>) -> Result<impl Reply, Rejection> {
    let start = Instant::now();
    match analyzer.process(&question).await {
        Ok(answer) => {
            info!(elapsed = ?start.elapsed(), "answered");
            Ok(warp::reply::json(&answer))
        }
        Err(e) => {
            error!(elapsed = ?start.elapsed(), "analysis failed: {:#}", e);
            Err(AnalysisFailed::from_error(e))
        }
    }
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(AnalysisFailed(msg)) = err.find() {
        (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else if err.find::<BodyTooLarge>().is_some()
        || err.find::<reject::PayloadTooLarge>().is_some()
    {
        (StatusCode::PAYLOAD_TOO_LARGE, "payload too large".to_string())
    } else {
        error!("unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "request could not be processed".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorResponse { error: message }),
        status,
    ))
}
