//! Rendering of log messages for the terminal.

use chrono::Local;
use regex::Regex;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::sync::LazyLock;

use crate::{LogMessage, StreamDirectory};

static RE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").unwrap());

const NESTED_EXCEPTION: &str = "; nested exception ";

pub const COLOR_DEBUG: &str = "\x1b[34m";
pub const COLOR_INFO: &str = "\x1b[32m";
pub const COLOR_WARN: &str = "\x1b[33m";
pub const COLOR_ERROR: &str = "\x1b[31m";
pub const COLOR_RESET: &str = "\x1b[0m";

pub const FIELD_LONG_TIMESTAMP: &str = "_long_timestamp";
pub const FIELD_SHORT_CLASSNAME: &str = "_short_classname";
pub const FIELD_LEVEL: &str = "_level";
pub const FIELD_LEVEL_COLOR: &str = "_level_color";
pub const FIELD_RESET: &str = "_reset";
pub const FIELD_MESSAGE: &str = "_message";
pub const FIELD_STREAMS: &str = "_streams";

/// Templates used when the configuration has no `[formats]` section.
pub const DEFAULT_TEMPLATES: &[&str] = &[
    "{_long_timestamp} {_level_color}{_level}{_reset} [{_streams}] {_short_classname}: {_message}",
    "{_long_timestamp} {_level_color}{_level}{_reset} {_message}",
    "{_long_timestamp} {source} {_message}",
];

/// Least specific templates, always tried last.
pub const FALLBACK_TEMPLATES: &[&str] = &["{_message}", "{message}"];

/// A format string with `{field}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    fields: Vec<String>,
}

impl Template {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let fields = RE_PLACEHOLDER
            .captures_iter(&source)
            .map(|caps| caps[1].to_string())
            .collect();
        Self { source, fields }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Names of the fields referenced by this template.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn references(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Renders the template, or `None` if any referenced field is missing.
    pub fn render<'a, F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<Cow<'a, str>>,
    {
        if !self.fields.iter().all(|f| lookup(f).is_some()) {
            return None;
        }
        let rendered = RE_PLACEHOLDER.replace_all(&self.source, |caps: &regex::Captures| {
            lookup(&caps[1]).unwrap_or_default().into_owned()
        });
        Some(rendered.into_owned())
    }
}

/// Turns log messages into display text.
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    templates: Vec<Template>,
    streams: Option<StreamDirectory>,
    json: bool,
}

impl Formatter {
    pub fn new(templates: Vec<Template>) -> Self {
        Self {
            templates,
            streams: None,
            json: false,
        }
    }

    pub fn with_streams(mut self, streams: StreamDirectory) -> Self {
        self.streams = Some(streams);
        self
    }

    /// Always print the raw JSON dump instead of templates.
    pub fn json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Whether any template needs the stream directory.
    pub fn needs_streams(&self) -> bool {
        !self.json && self.templates.iter().any(|t| t.references(FIELD_STREAMS))
    }

    pub fn format(&self, message: &LogMessage) -> String {
        if self.json {
            return raw_dump(message);
        }

        let derived = derive_fields(message, self.streams.as_ref());
        let lookup = |key: &str| {
            derived
                .get(key)
                .or_else(|| message.fields.get(key))
                .and_then(value_text)
        };

        self.templates
            .iter()
            .find_map(|template| template.render(lookup))
            .unwrap_or_else(|| raw_dump(message))
    }
}

/// Computes display-only fields for a message. These never overwrite the
/// server fields, they shadow them during lookup.
pub fn derive_fields(message: &LogMessage, streams: Option<&StreamDirectory>) -> Map<String, Value> {
    let mut derived = Map::new();

    let local = message.timestamp.with_timezone(&Local);
    derived.insert(
        FIELD_LONG_TIMESTAMP.into(),
        format!("{}Z", local.format("%Y-%m-%dT%H:%M:%S%.3f")).into(),
    );

    if let Some(short) = message.get_str("classname").and_then(short_classname) {
        derived.insert(FIELD_SHORT_CLASSNAME.into(), short.into());
    }

    if let Some((level, color)) = message.get_str("level").and_then(level_color) {
        derived.insert(FIELD_LEVEL.into(), level.into());
        derived.insert(FIELD_LEVEL_COLOR.into(), color.into());
        derived.insert(FIELD_RESET.into(), COLOR_RESET.into());
    }

    if let Some(text) = merged_message(message) {
        derived.insert(FIELD_MESSAGE.into(), text.into());
    }

    if let (Some(dir), Some(Value::Array(ids))) = (streams, message.fields.get("streams")) {
        let titles = dir.titles_of(ids.iter().filter_map(Value::as_str));
        derived.insert(FIELD_STREAMS.into(), titles.into());
    }

    if let Some(page) = message.get_str("request_page") {
        if !page.starts_with('/') {
            derived.insert("request_page".into(), format!("/{}", page).into());
        }
    }

    derived
}

/// Last dot-delimited segment of a class name.
pub fn short_classname(classname: &str) -> Option<&str> {
    classname.rsplit('.').next().filter(|s| !s.is_empty())
}

/// Normalized level name and its color escape.
pub fn level_color(level: &str) -> Option<(&'static str, &'static str)> {
    match level.trim().to_uppercase().as_str() {
        "DEBUG" => Some(("DEBUG", COLOR_DEBUG)),
        "TRACE" => Some(("TRACE", COLOR_DEBUG)),
        "INFO" => Some(("INFO", COLOR_INFO)),
        "WARN" | "WARNING" => Some(("WARN", COLOR_WARN)),
        "ERROR" => Some(("ERROR", COLOR_ERROR)),
        "FATAL" => Some(("FATAL", COLOR_ERROR)),
        _ => None,
    }
}

/// Message text with nested exceptions split onto their own line and the
/// stack trace lines recovered from `full_message` / `original_message`.
pub fn merged_message(message: &LogMessage) -> Option<String> {
    let (primary_key, primary) = ["message", "original_message", "full_message"]
        .iter()
        .find_map(|key| message.get_str(key).map(|text| (*key, text)))?;

    let mut text = primary.replace(NESTED_EXCEPTION, ";\nnested exception ");

    let alternate = ["full_message", "original_message"]
        .iter()
        .filter(|key| **key != primary_key)
        .find_map(|key| message.get_str(key));

    if let Some(alternate) = alternate {
        let lines: Vec<&str> = alternate.lines().collect();
        if lines.len() > 1 && alternate != primary {
            let continuation = if lines.len() == 2 {
                &lines[1..]
            } else {
                &lines[1..lines.len() - 1]
            };
            text.push('\n');
            text.push_str(&continuation.join("\n"));
        }
    }

    Some(text)
}

fn value_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(Cow::Borrowed(s)),
        other => Some(Cow::Owned(other.to_string())),
    }
}

/// Pretty-printed, key-sorted dump of the server fields.
pub fn raw_dump(message: &LogMessage) -> String {
    let sorted: std::collections::BTreeMap<&String, &Value> = message.fields.iter().collect();
    serde_json::to_string_pretty(&sorted).unwrap_or_else(|_| format!("{:?}", message.fields))
}
