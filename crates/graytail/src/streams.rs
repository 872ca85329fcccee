use eyre::{bail, Result};
use prettytable::{format, row, Table};
use std::collections::HashMap;

use crate::{Stream, StreamsJson};

/// Lookup of the server's streams by id, loaded once per invocation.
#[derive(Debug, Clone, Default)]
pub struct StreamDirectory {
    streams: Vec<Stream>,
    titles: HashMap<String, String>,
}

impl From<StreamsJson> for StreamDirectory {
    fn from(json: StreamsJson) -> Self {
        Self::new(json.streams)
    }
}

impl StreamDirectory {
    pub fn new(mut streams: Vec<Stream>) -> Self {
        streams.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        let titles = streams
            .iter()
            .map(|s| (s.id.clone(), s.title.clone()))
            .collect();
        Self { streams, titles }
    }

    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    pub fn title(&self, id: &str) -> Option<&str> {
        self.titles.get(id).map(String::as_str)
    }

    /// Resolves user supplied stream names to stream ids.
    ///
    /// A name matches a stream id exactly, a title case-insensitively, or
    /// failing both, a single title containing it.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<String>> {
        let mut ids: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let id = self.resolve_one(name.as_ref())?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn resolve_one(&self, name: &str) -> Result<String> {
        if self.titles.contains_key(name) {
            return Ok(name.to_string());
        }

        let needle = name.to_lowercase();
        if let Some(stream) = self
            .streams
            .iter()
            .find(|s| s.title.to_lowercase() == needle)
        {
            return Ok(stream.id.clone());
        }

        let candidates: Vec<&Stream> = self
            .streams
            .iter()
            .filter(|s| s.title.to_lowercase().contains(&needle))
            .collect();

        match candidates.as_slice() {
            [] => bail!("unknown stream '{}'", name),
            [stream] => Ok(stream.id.clone()),
            many => {
                let titles: Vec<&str> = many.iter().map(|s| s.title.as_str()).collect();
                bail!(
                    "ambiguous stream '{}', candidates: {}",
                    name,
                    titles.join(", ")
                )
            }
        }
    }

    /// Space-joined titles of the given stream ids; unknown ids are skipped.
    pub fn titles_of<'a, I>(&self, ids: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        ids.into_iter()
            .filter_map(|id| self.title(id))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.set_titles(row!["Id", "Title", "Description", "Disabled"]);

        for stream in &self.streams {
            let disabled = if stream.disabled { "yes" } else { "no" };
            table.add_row(row![
                stream.id,
                stream.title,
                stream.description.as_deref().unwrap_or(""),
                disabled
            ]);
        }
        table
    }
}
