use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{error, info, info_span, warn};
use tracing_error::{ErrorLayer, SpanTrace};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod column;
mod controller;
mod domain;
mod inputter;
mod model;
mod record;
mod renderer;
mod schema;
mod source;
mod ui;

use column::ColumnDef;
use controller::Controller;
use domain::{TVConfig, TVError};
use model::{Model, Status};
use renderer::TableRenderer;
use source::{Endpoint, ReportApi, Source};
use ui::TableUI;

/// Browse brand-audit report collections in the terminal.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// A json, csv, parquet or arrow file, or the base url of the report api
    source: String,
    /// Report api collection to fetch when SOURCE is an url
    #[arg(long, value_enum, default_value_t = Endpoint::Pages)]
    endpoint: Endpoint,
    /// Persona id for the persona-pages endpoint
    #[arg(long)]
    persona: Option<String>,
    /// Name of the payload field holding the rows
    #[arg(long)]
    collection: Option<String>,
    /// Comma separated list of columns to show, in order. `key=Label` sets a header
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,
    /// Comma separated list of columns searched by the filter
    #[arg(long, value_delimiter = ',')]
    filter_columns: Vec<String>,
    /// Initial filter
    #[arg(long, default_value = "")]
    filter: String,
    #[arg(long, default_value_t = 40)]
    max_column_width: usize,
    #[arg(long, default_value = "atv.log")]
    log_file: PathBuf,
    /// Event poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

impl Args {
    fn to_source(&self, cfg: &TVConfig) -> Result<Source, TVError> {
        let is_url = self.source.starts_with("http://") || self.source.starts_with("https://");
        let persona_pages = self.endpoint == Endpoint::PersonaPages;
        let invalid = match (is_url, persona_pages, self.persona.is_some()) {
            (false, _, true) => Some("--persona needs a report api url"),
            (true, true, false) => Some("--endpoint persona-pages needs --persona"),
            (true, false, true) => Some("--persona only applies to --endpoint persona-pages"),
            _ => None,
        };
        if let Some(reason) = invalid {
            return Err(TVError::InvalidArguments(reason.to_string()));
        }

        if !is_url {
            return Ok(Source::File {
                path: PathBuf::from(&self.source),
                collection: self.collection.clone(),
            });
        }
        Ok(Source::Http {
            api: ReportApi::new(&self.source, cfg.http_timeout_secs)?,
            endpoint: self.endpoint,
            persona: self.persona.clone(),
            collection: self.collection.clone(),
        })
    }

    fn to_config(&self) -> TVConfig {
        TVConfig::default()
            .with_event_poll_time(self.poll_ms)
            .with_max_column_width(self.max_column_width)
            .with_http_timeout_secs(self.timeout_secs)
            .with_log_file(self.log_file.clone())
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

/// Log to a file, the terminal belongs to the ui.
fn start_logging(path: &Path) -> Result<(), TVError> {
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(filter),
        )
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| TVError::LoadingFailed(format!("Unable to start logging: {e}")))
}

fn build_columns(args: &Args, source: &Source, rows: &[record::Row]) -> Vec<ColumnDef> {
    let filter_keys = if args.filter_columns.is_empty() {
        source.filter_keys()
    } else {
        args.filter_columns.clone()
    };
    let columns = if args.columns.is_empty() {
        schema::infer_columns(rows, &filter_keys)
    } else {
        let (keys, labels): (Vec<String>, Vec<Option<String>>) = args
            .columns
            .iter()
            .map(|spec| match spec.split_once('=') {
                Some((key, label)) => (key.to_string(), Some(label.to_string())),
                None => (spec.clone(), None),
            })
            .unzip();
        schema::select_columns(rows, &keys, &filter_keys)
            .into_iter()
            .zip(labels)
            .map(|(column, label)| match label {
                Some(label) => column.label(label),
                None => column,
            })
            .collect()
    };
    if columns.is_empty() {
        warn!("No columns found in {}, showing raw values", source.describe());
        return vec![ColumnDef::new("value")];
    }
    columns
}

fn run(args: &Args) -> Result<(), TVError> {
    let cfg = args.to_config();
    start_logging(&cfg.log_file)?;
    info!("Starting atv {} ...", env!("CARGO_PKG_VERSION"));

    let source = args.to_source(&cfg)?;
    let rows = {
        let _span = info_span!("load", source = %source.describe()).entered();
        source
            .fetch()
            .inspect_err(|e| error!("Loading failed: {e}\n{}", SpanTrace::capture()))?
    };
    let columns = build_columns(args, &source, &rows);
    let mut renderer = TableRenderer::new(Arc::new(rows), columns)?;
    renderer.set_filter(&args.filter);

    let mut terminal = ratatui::init();
    let result = run_tui(&mut terminal, &cfg, renderer, source);
    ratatui::restore();
    info!("Bye");
    result
}

fn run_tui(
    terminal: &mut DefaultTerminal,
    cfg: &TVConfig,
    renderer: TableRenderer,
    source: Source,
) -> Result<(), TVError> {
    let size = terminal.size()?;
    let mut model = Model::init(
        cfg,
        source.describe(),
        renderer,
        Some(source),
        size.width as usize,
        size.height as usize,
    );
    let mut ui = TableUI::new();
    let controller = Controller::new(cfg);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["atv"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    fn file_source(args: &Args) -> Source {
        args.to_source(&args.to_config()).unwrap()
    }

    #[test]
    fn url_sources_use_the_api() {
        let args = args(&["http://localhost:5000", "--endpoint", "gap-analysis"]);
        match args.to_source(&args.to_config()).unwrap() {
            Source::Http { endpoint, .. } => assert_eq!(endpoint, Endpoint::GapAnalysis),
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn paths_are_file_sources() {
        let args = args(&["~/reports/pages.json", "--collection", "pages"]);
        assert!(matches!(
            args.to_source(&args.to_config()).unwrap(),
            Source::File { collection: Some(c), .. } if c == "pages"
        ));
    }

    #[test]
    fn config_from_args() {
        let cfg = args(&["x.csv", "--max-column-width", "12", "--poll-ms", "50"]).to_config();
        assert_eq!(cfg.max_column_width, 12);
        assert_eq!(cfg.event_poll_time, 50);
        assert_eq!(cfg.http_timeout_secs, 30);
    }

    #[test]
    fn columns_from_args_and_endpoint_hints() {
        let rows: Vec<record::Row> = vec![
            json!({"title": "Home", "url": "/", "score": 3})
                .as_object()
                .cloned()
                .unwrap(),
        ];
        let args = args(&["http://localhost:5000", "--columns", "url,title"]);
        let source = args.to_source(&args.to_config()).unwrap();
        let columns = build_columns(&args, &source, &rows);
        let keys: Vec<_> = columns.iter().map(|c| c.key()).collect();
        assert_eq!(keys, vec!["url", "title"]);
        assert!(columns.iter().all(|c| c.is_filterable()));

        let args = self::args(&["data.json", "--filter-columns", "score"]);
        let columns = build_columns(&args, &file_source(&args), &rows);
        let flagged: Vec<_> = columns
            .iter()
            .filter(|c| c.is_filterable())
            .map(|c| c.key())
            .collect();
        assert_eq!(flagged, vec!["score"]);
    }

    #[test]
    fn empty_collections_get_a_placeholder_column() {
        let args = args(&["data.json"]);
        let columns = build_columns(&args, &file_source(&args), &[]);
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].key(), "value");
    }

    #[test]
    fn column_labels_from_args() {
        let rows: Vec<record::Row> = vec![
            json!({"title": "Home", "url": "/"})
                .as_object()
                .cloned()
                .unwrap(),
        ];
        let args = args(&["data.json", "--columns", "url=Address,title"]);
        let columns = build_columns(&args, &file_source(&args), &rows);
        let headers: Vec<_> = columns.iter().map(|c| c.header_text()).collect();
        assert_eq!(headers, vec!["Address", "title"]);
        assert_eq!(columns[0].key(), "url");
    }

    #[test]
    fn persona_is_checked_against_the_endpoint() {
        let invalid = [
            vec!["http://localhost:5000", "--endpoint", "persona-pages"],
            vec!["http://localhost:5000", "--persona", "cfo"],
            vec!["pages.json", "--persona", "cfo"],
        ];
        for argv in invalid {
            let args = args(&argv);
            assert!(matches!(
                args.to_source(&args.to_config()),
                Err(TVError::InvalidArguments(_))
            ));
        }

        let args = args(&[
            "http://localhost:5000",
            "--endpoint",
            "persona-pages",
            "--persona",
            "cfo",
        ]);
        let source = args.to_source(&args.to_config()).unwrap();
        assert_eq!(source.describe(), "/api/persona-pages?persona=cfo");
    }
}
