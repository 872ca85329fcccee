use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use eyre::{Result, WrapErr};
use graytail::config;
use graytail::range::{parse_range, DEFAULT_RANGE};
use graytail::search::{MessageSource, SearchClient, DEFAULT_LIMIT};
use graytail::{Formatter, SearchQuery, StreamDirectory, Tailer, TimeWindow};
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use super::output::{export_to_file, print_streams, write_message};

#[derive(Debug, Parser)]
#[command(
    name = "graytail",
    version,
    about = "Search and tail log messages from a Graylog server"
)]
pub struct SearchArgs {
    /// List the available streams and exit
    #[arg(long)]
    pub list_streams: bool,

    /// Search query, e.g. 'level:ERROR AND source:web01'
    #[arg(short, long)]
    pub query: Option<String>,

    /// Only show messages of this application
    #[arg(short, long)]
    pub application: Option<String>,

    /// Export the comma-separated fields to export.csv (requires --absolute)
    #[arg(
        short,
        long,
        value_name = "FIELDS",
        value_delimiter = ',',
        requires = "absolute",
        conflicts_with_all = ["tail", "json"]
    )]
    pub export: Option<Vec<String>>,

    /// Maximum number of messages per search
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_LIMIT,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub limit: u32,

    /// Only show messages of these streams (titles or ids)
    #[arg(short, long, value_name = "NAMES", num_args = 1..)]
    pub stream: Vec<String>,

    /// Keep polling for new messages
    #[arg(short, long, conflicts_with = "absolute")]
    pub tail: bool,

    /// Configuration files to try, in order
    #[arg(short, long, value_name = "PATHS", num_args = 1..)]
    pub config: Vec<PathBuf>,

    /// Relative time range, e.g. 2h, 30m or 4d30m
    #[arg(short, long, default_value = DEFAULT_RANGE, value_parser = parse_range)]
    pub range: Duration,

    /// Absolute time range, passed to the server as is
    #[arg(long, num_args = 2, value_names = ["FROM", "TO"])]
    pub absolute: Option<Vec<String>>,

    /// Print messages as JSON
    #[arg(short, long)]
    pub json: bool,
}

impl SearchArgs {
    pub fn run(&self) -> Result<()> {
        let paths = if self.config.is_empty() {
            config::default_paths()
        } else {
            self.config.clone()
        };
        let (settings, path) = config::load(&paths)?;
        tracing::debug!(config = %path.display(), "loaded configuration");

        let client = SearchClient::from_settings(&settings)?;

        if self.list_streams {
            let directory = StreamDirectory::from(client.fetch_streams()?);
            return print_streams(&directory);
        }

        let mut formatter = Formatter::new(settings.templates()).json(self.json);
        let mut query = self.search_query();

        // stream titles are only decoration, the export never formats anything
        let wants_titles = self.export.is_none() && formatter.needs_streams();

        if !self.stream.is_empty() {
            let directory = StreamDirectory::from(
                client
                    .fetch_streams()
                    .wrap_err("failed to fetch the stream list")?,
            );
            query.streams = directory
                .resolve(self.stream.as_slice())
                .unwrap_or_else(|e| usage_error(ErrorKind::InvalidValue, e));
            if wants_titles {
                formatter = formatter.with_streams(directory);
            }
        } else if wants_titles {
            match client.fetch_streams() {
                Ok(streams) => formatter = formatter.with_streams(StreamDirectory::from(streams)),
                Err(e) => tracing::warn!(
                    error = %format!("{:#}", e),
                    "stream list unavailable, printing without stream titles"
                ),
            }
        }

        if let Some(fields) = &self.export {
            query.fields = fields.clone();
            if query.export_params().is_err() {
                usage_error(
                    ErrorKind::MissingRequiredArgument,
                    "--export needs a field list and --absolute <FROM> <TO>",
                );
            }
            return export_to_file(&client, &query);
        }

        if self.tail {
            let mut stdout = io::stdout().lock();
            return Tailer::new(client, query)
                .run(|message| write_message(&mut stdout, &formatter, message));
        }

        let messages = client.fetch_messages(&query)?;
        let mut stdout = io::stdout().lock();
        for message in &messages {
            write_message(&mut stdout, &formatter, message)?;
        }
        Ok(())
    }

    fn search_query(&self) -> SearchQuery {
        let window = match self.absolute.as_deref() {
            Some([from, to]) => TimeWindow::Absolute {
                from: from.clone(),
                to: to.clone(),
            },
            _ => TimeWindow::Relative(self.range),
        };

        SearchQuery {
            query: self.query.clone(),
            application: self.application.clone(),
            streams: Vec::new(),
            window,
            limit: self.limit,
            fields: Vec::new(),
        }
    }
}

/// Reports an argument problem found after parsing, with clap's usage hint.
fn usage_error(kind: ErrorKind, message: impl std::fmt::Display) -> ! {
    SearchArgs::command().error(kind, message).exit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<SearchArgs, clap::Error> {
        SearchArgs::try_parse_from(std::iter::once("graytail").chain(args.iter().copied()))
    }

    #[test]
    fn test_args_are_consistent() {
        SearchArgs::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.limit, DEFAULT_LIMIT);
        assert_eq!(args.range, Duration::from_secs(300));
        assert!(!args.tail && !args.json && !args.list_streams);
        assert_eq!(
            args.search_query().window,
            TimeWindow::Relative(Duration::from_secs(300))
        );
    }

    #[test]
    fn test_short_flags() {
        let args = parse(&[
            "-q", "level:ERROR", "-a", "shop", "-l", "10", "-s", "Web", "Jobs", "-r", "4d30m",
            "-t", "-j",
        ])
        .unwrap();

        assert_eq!(args.stream, ["Web", "Jobs"]);
        assert_eq!(args.range, Duration::from_secs(4 * 86400 + 1800));
        let query = args.search_query();
        assert_eq!(query.query_string(), "(level:ERROR) AND application:shop");
        assert_eq!(query.limit, 10);
    }

    #[test]
    fn test_absolute_window() {
        let args = parse(&["--absolute", "2020-01-01 00:00:00", "2020-01-02 00:00:00"]).unwrap();
        assert_eq!(
            args.search_query().window,
            TimeWindow::Absolute {
                from: "2020-01-01 00:00:00".into(),
                to: "2020-01-02 00:00:00".into(),
            }
        );
    }

    #[test]
    fn test_export_fields() {
        let args = parse(&["--absolute", "a", "b", "-e", "timestamp,message"]).unwrap();
        assert_eq!(
            args.export.as_deref(),
            Some(&["timestamp".to_string(), "message".to_string()][..])
        );
    }

    #[test]
    fn test_invalid_combinations() {
        let cases: &[&[&str]] = &[
            &["-e", "message"],
            &["-t", "--absolute", "a", "b"],
            &["--absolute", "a", "b", "-e", "message", "-j"],
            &["-r", "2x"],
            &["-l", "0"],
            &["-l", "many"],
            &["--absolute", "a"],
        ];
        for case in cases {
            assert!(parse(case).is_err(), "{case:?} should be rejected");
        }
    }
}
