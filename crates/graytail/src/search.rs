//! Client for the log server's universal search REST API.

use base64::Engine;
use eyre::{bail, Result, WrapErr};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::{self, Write};
use std::time::Duration;
use ureq::typestate::WithoutBody;
use ureq::RequestBuilder;

use crate::config::{Credentials, Settings};
use crate::{LogMessage, StreamsJson};

pub const DEFAULT_LIMIT: u32 = 100;

const RESPONSE_LIMIT_BYTES: u64 = 64 * 1024 * 1024;
const JSON: &str = "application/json";

/// Time span a search covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeWindow {
    /// The last `n` seconds.
    Relative(Duration),
    /// Server-side timestamps, passed through verbatim.
    Absolute { from: String, to: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub application: Option<String>,
    /// Stream ids, already resolved.
    pub streams: Vec<String>,
    pub window: TimeWindow,
    pub limit: u32,
    /// Field list, only used for CSV exports.
    pub fields: Vec<String>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: None,
            application: None,
            streams: Vec::new(),
            window: TimeWindow::Relative(Duration::from_secs(300)),
            limit: DEFAULT_LIMIT,
            fields: Vec::new(),
        }
    }
}

impl SearchQuery {
    /// Full query string, `*` when nothing was given.
    pub fn query_string(&self) -> String {
        let query = self
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty());

        match (query, self.application.as_deref()) {
            (Some(q), Some(app)) => format!("({}) AND application:{}", q, app),
            (Some(q), None) => q.to_string(),
            (None, Some(app)) => format!("application:{}", app),
            (None, None) => "*".to_string(),
        }
    }

    /// `streams:<id> OR streams:<id> ...`, if any streams were selected.
    pub fn filter(&self) -> Option<String> {
        if self.streams.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .streams
            .iter()
            .map(|id| format!("streams:{}", id))
            .collect();
        Some(parts.join(" OR "))
    }

    pub fn path(&self) -> &'static str {
        match self.window {
            TimeWindow::Relative(_) => "/search/universal/relative",
            TimeWindow::Absolute { .. } => "/search/universal/absolute",
        }
    }

    /// Query parameters of a message search.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("query", self.query_string())];
        match &self.window {
            TimeWindow::Relative(range) => {
                params.push(("range", range.as_secs().max(1).to_string()));
            }
            TimeWindow::Absolute { from, to } => {
                params.push(("from", from.clone()));
                params.push(("to", to.clone()));
            }
        }
        params.push(("limit", self.limit.to_string()));
        // newest first, so `limit` keeps the most recent messages
        params.push(("sort", "timestamp:desc".to_string()));
        if let Some(filter) = self.filter() {
            params.push(("filter", filter));
        }
        params
    }

    /// Query parameters of a CSV export. Needs an absolute window and fields.
    pub fn export_params(&self) -> Result<Vec<(&'static str, String)>> {
        let TimeWindow::Absolute { from, to } = &self.window else {
            bail!("exporting requires an absolute time range");
        };
        if self.fields.is_empty() {
            bail!("exporting requires at least one field");
        }

        let mut params = vec![
            ("query", self.query_string()),
            ("from", from.clone()),
            ("to", to.clone()),
            ("fields", self.fields.join(",")),
            ("limit", self.limit.to_string()),
        ];
        if let Some(filter) = self.filter() {
            params.push(("filter", filter));
        }
        Ok(params)
    }
}

/// Anything that can run a message search.
pub trait MessageSource {
    fn fetch_messages(&self, query: &SearchQuery) -> Result<Vec<LogMessage>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    messages: Vec<Envelope>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    message: Map<String, Value>,
}

/// Parses a search response body into messages sorted oldest first.
/// Entries without an id or a valid timestamp are skipped.
pub fn parse_search_response(body: &str) -> Result<Vec<LogMessage>> {
    let response: SearchResponse =
        serde_json::from_str(body).wrap_err("invalid search response")?;

    let mut messages: Vec<LogMessage> = response
        .messages
        .into_iter()
        .filter_map(|envelope| match LogMessage::from_fields(envelope.message) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!(error = %e, "skipping message");
                None
            }
        })
        .collect();

    messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    Ok(messages)
}

pub struct SearchClient {
    agent: ureq::Agent,
    base_uri: String,
    authorization: Option<String>,
}

impl SearchClient {
    pub fn new(base_uri: &str, credentials: Option<&Credentials>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(Duration::from_secs(5)))
            .timeout_recv_response(Some(Duration::from_secs(60)))
            .build();

        let authorization = credentials.map(|c| {
            let token = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", c.username, c.password));
            format!("Basic {}", token)
        });

        Self {
            agent: config.into(),
            base_uri: base_uri.trim_end_matches('/').to_string(),
            authorization,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let Some(uri) = settings.uri() else {
            bail!("missing 'uri' in the [server] section");
        };
        Ok(Self::new(uri, settings.credentials().as_ref()))
    }

    fn get(
        &self,
        path: &str,
        params: &[(&'static str, String)],
        accept: &str,
    ) -> RequestBuilder<WithoutBody> {
        let url = format!("{}{}", self.base_uri, path);
        tracing::debug!(%url, ?params, "GET");

        let mut request = self.agent.get(&url).header("Accept", accept);
        for (key, value) in params {
            request = request.query(*key, value);
        }
        if let Some(auth) = &self.authorization {
            request = request.header("Authorization", auth);
        }
        request
    }

    fn call(
        &self,
        request: RequestBuilder<WithoutBody>,
        path: &str,
    ) -> Result<ureq::http::Response<ureq::Body>> {
        let response = request
            .call()
            .wrap_err_with(|| format!("request to {}{} failed", self.base_uri, path))?;

        let status = response.status();
        if status != 200 {
            bail!(
                "{}{} returned HTTP {}",
                self.base_uri,
                path,
                status.as_u16()
            );
        }
        Ok(response)
    }

    /// Fetches all streams defined on the server.
    pub fn fetch_streams(&self) -> Result<StreamsJson> {
        let mut response = self.call(self.get("/streams", &[], JSON), "/streams")?;
        let streams: StreamsJson = response
            .body_mut()
            .read_json()
            .wrap_err("invalid streams response")?;
        Ok(streams)
    }

    /// Streams a CSV export into `writer`, returning the number of bytes written.
    pub fn export_csv<W: Write>(&self, query: &SearchQuery, writer: &mut W) -> Result<u64> {
        const PATH: &str = "/search/universal/absolute/export";

        let params = query.export_params()?;
        let mut response = self.call(self.get(PATH, &params, "text/csv"), PATH)?;

        let written = io::copy(&mut response.body_mut().as_reader(), writer)
            .wrap_err("failed to write export")?;
        writer.flush()?;
        Ok(written)
    }
}

impl MessageSource for SearchClient {
    fn fetch_messages(&self, query: &SearchQuery) -> Result<Vec<LogMessage>> {
        let path = query.path();
        let mut response = self.call(self.get(path, &query.params(), JSON), path)?;
        let body = response
            .body_mut()
            .with_config()
            .limit(RESPONSE_LIMIT_BYTES)
            .read_to_string()
            .wrap_err("failed to read search response")?;
        parse_search_response(&body)
    }
}
