//! Loading of row collections from files and from the report API.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use polars::prelude::*;
use rayon::prelude::*;
use reqwest::Url;
use reqwest::blocking::Client;
use serde_json::{Map, Number, Value};
use tracing::{debug, info, trace};

use crate::domain::TVError;
use crate::record::Row;

// A struct with different types
#[derive(Debug, PartialEq)]
enum FileType {
    JSON,
    CSV,
    PARQUET,
    ARROW,
}

/// Collections served by the report API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Endpoint {
    Pages,
    GapAnalysis,
    Methodology,
    PersonaInsights,
    PersonaPages,
    Recommendations,
    HtmlReports,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Pages => "/api/pages",
            Endpoint::GapAnalysis => "/api/gap-analysis",
            Endpoint::Methodology => "/api/methodology",
            Endpoint::PersonaInsights => "/api/persona-insights",
            Endpoint::PersonaPages => "/api/persona-pages",
            Endpoint::Recommendations => "/api/recommendations",
            Endpoint::HtmlReports => "/api/html-reports",
        }
    }

    /// Where the rows sit in the response.
    pub fn collection(&self) -> Collection<'static> {
        match self {
            Endpoint::Pages | Endpoint::PersonaPages => Collection::Field("pages"),
            Endpoint::GapAnalysis => Collection::Field("items"),
            Endpoint::Methodology => Collection::Whole,
            Endpoint::PersonaInsights => Collection::Field("personas"),
            Endpoint::Recommendations => Collection::Field("recommendations"),
            Endpoint::HtmlReports => Collection::Field("reports"),
        }
    }

    /// Columns searched by default. Empty means every field.
    pub fn filter_keys(&self) -> &'static [&'static str] {
        match self {
            Endpoint::Pages | Endpoint::PersonaPages => &["title", "url"],
            Endpoint::HtmlReports => &["name", "path"],
            _ => &[],
        }
    }
}

/// How the rows are taken out of a json payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection<'a> {
    /// The array (or object) under this field.
    Field(&'a str),
    /// The whole payload object is one record.
    Whole,
    /// The single array field of the payload, or the payload itself.
    Detect,
}

impl<'a> Collection<'a> {
    fn named_or(name: Option<&'a str>, fallback: Collection<'a>) -> Self {
        name.map(Collection::Field).unwrap_or(fallback)
    }
}

/// Blocking client for the report api, built once per source.
#[derive(Debug, Clone)]
pub struct ReportApi {
    client: Client,
    base_url: String,
}

impl ReportApi {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, TVError> {
        let client = Client::builder()
            .user_agent(concat!("audit-tv/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(ReportApi {
            client,
            base_url: base_url.into(),
        })
    }

    fn endpoint_url(&self, endpoint: Endpoint, persona: Option<&str>) -> Result<Url, TVError> {
        let raw = format!("{}{}", self.base_url.trim_end_matches('/'), endpoint.path());
        let url = match persona {
            Some(id) => Url::parse_with_params(&raw, &[("persona", id)]),
            None => Url::parse(&raw),
        };
        url.map_err(|e| TVError::LoadingFailed(format!("invalid url {raw}: {e}")))
    }

    fn get(&self, endpoint: Endpoint, persona: Option<&str>) -> Result<String, TVError> {
        let url = self.endpoint_url(endpoint, persona)?;
        debug!("GET {url}");
        let response = self.client.get(url.clone()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(TVError::FetchFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text()?)
    }
}

#[derive(Debug, Clone)]
pub enum Source {
    File {
        path: PathBuf,
        collection: Option<String>,
    },
    Http {
        api: ReportApi,
        endpoint: Endpoint,
        persona: Option<String>,
        collection: Option<String>,
    },
}

impl Source {
    pub fn describe(&self) -> String {
        match self {
            Source::File { path, .. } => path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("???")
                .to_string(),
            Source::Http { endpoint, persona, .. } => match persona {
                Some(p) => format!("{}?persona={p}", endpoint.path()),
                None => endpoint.path().to_string(),
            },
        }
    }

    pub fn filter_keys(&self) -> Vec<String> {
        match self {
            Source::File { .. } => Vec::new(),
            Source::Http { endpoint, .. } => {
                endpoint.filter_keys().iter().map(|k| k.to_string()).collect()
            }
        }
    }

    pub fn fetch(&self) -> Result<Vec<Row>, TVError> {
        let start_time = Instant::now();
        let rows = match self {
            Source::File { path, collection } => {
                Self::load_file(path.clone(), collection.as_deref())?
            }
            Source::Http {
                api,
                endpoint,
                persona,
                collection,
            } => {
                let body = api.get(*endpoint, persona.as_deref())?;
                let payload: Value = serde_json::from_str(&body)?;
                let collection =
                    Collection::named_or(collection.as_deref(), endpoint.collection());
                rows_from_payload(payload, collection)?
            }
        };
        info!(
            "Fetched {} rows from {} in {}ms",
            rows.len(),
            self.describe(),
            start_time.elapsed().as_millis()
        );
        Ok(rows)
    }

    fn load_file(path: PathBuf, collection: Option<&str>) -> Result<Vec<Row>, TVError> {
        let path = Self::expand_path(&path)?;
        Self::check_file(&path)?;
        let frame = match Self::detect_file_type(&path)? {
            FileType::JSON => {
                let payload: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
                let collection = Collection::named_or(collection, Collection::Detect);
                return rows_from_payload(payload, collection);
            }
            FileType::CSV => Self::load_csv(&path)?,
            FileType::PARQUET => Self::load_parquet(&path)?,
            FileType::ARROW => Self::load_arrow(&path)?,
        };
        Self::load_frame(frame)
    }

    fn expand_path(path: &Path) -> Result<PathBuf, TVError> {
        let raw = path.to_string_lossy();
        let expanded =
            shellexpand::full(&raw).map_err(|e| TVError::LoadingFailed(e.to_string()))?;
        Ok(PathBuf::from(expanded.as_ref()))
    }

    fn check_file(path: &Path) -> Result<(), TVError> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TVError::FileNotFound,
            ErrorKind::PermissionDenied => TVError::PermissionDenied,
            _ => TVError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(TVError::LoadingFailed("Not a file!".into()));
        }
        debug!("Loading {:?} ({} bytes)", path, metadata.len());
        Ok(())
    }

    fn detect_file_type(path: &Path) -> Result<FileType, TVError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("JSON") => Ok(FileType::JSON),
            Some("CSV") => Ok(FileType::CSV),
            Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
            _ => Err(TVError::UnknownFileType),
        }
    }

    // Each column is converted in its own rayon task, rows are assembled afterwards.
    fn load_frame(frame: LazyFrame) -> Result<Vec<Row>, TVError> {
        let df = frame.collect()?;
        let c_: Result<Vec<(String, Vec<Value>)>, PolarsError> = df
            .get_column_names()
            .par_iter()
            .map(|name| Self::load_column(&df, name))
            .collect();
        let columns = c_?;

        let rows = (0..df.height())
            .map(|ridx| {
                columns
                    .iter()
                    .map(|(name, data)| (name.clone(), data[ridx].clone()))
                    .collect::<Map<String, Value>>()
            })
            .collect();
        Ok(rows)
    }

    fn load_column(df: &DataFrame, col_name: &str) -> Result<(String, Vec<Value>), PolarsError> {
        let original_dtype = df.column(col_name)?.dtype().clone();
        let col = df.column(col_name)?.cast(&DataType::String)?;
        let series = col.str()?;
        let data = series
            .into_iter()
            .map(|value| match value {
                Some(s) => typed_value(s, &original_dtype),
                None => Value::Null,
            })
            .collect();
        trace!("Loaded column {col_name} as {original_dtype:?}");
        Ok((col_name.to_string(), data))
    }

    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .finish()
    }

    fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
    }

    fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }
}

fn is_numeric_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn typed_value(s: &str, dtype: &DataType) -> Value {
    if matches!(dtype, DataType::Boolean) {
        if let Ok(b) = s.parse::<bool>() {
            return Value::Bool(b);
        }
    } else if is_numeric_type(dtype) {
        if let Ok(i) = s.parse::<i64>() {
            return Value::from(i);
        }
        if let Some(n) = s.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(s.to_string())
}

/// Extract the row collection of a json payload.
///
/// A bare array is the collection. For an object, `Field` takes the named
/// field, `Whole` keeps the object as one record and `Detect` looks for the
/// single array field. An object without any array field is one record.
pub fn rows_from_payload(
    payload: Value,
    collection: Collection<'_>,
) -> Result<Vec<Row>, TVError> {
    let mut map = match payload {
        Value::Array(items) => return Ok(items_to_rows(items)),
        Value::Object(map) => map,
        other => return Ok(vec![wrap(other)]),
    };

    match collection {
        Collection::Whole => Ok(vec![map]),
        Collection::Field(name) => match map.remove(name) {
            Some(Value::Array(items)) => Ok(items_to_rows(items)),
            Some(Value::Object(record)) => Ok(vec![record]),
            _ => Err(TVError::CollectionNotFound(name.to_string())),
        },
        Collection::Detect => {
            let arrays: Vec<String> = map
                .iter()
                .filter(|(_, v)| v.is_array())
                .map(|(k, _)| k.clone())
                .collect();
            match arrays.as_slice() {
                [] => Ok(vec![map]),
                [name] => match map.remove(name) {
                    Some(Value::Array(items)) => Ok(items_to_rows(items)),
                    _ => Err(TVError::CollectionNotFound(name.clone())),
                },
                names => Err(TVError::AmbiguousCollection(names.join(", "))),
            }
        }
    }
}

fn items_to_rows(items: Vec<Value>) -> Vec<Row> {
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(row) => row,
            other => wrap(other),
        })
        .collect()
}

fn wrap(value: Value) -> Row {
    let mut row = Map::new();
    row.insert("value".to_string(), value);
    row
}
