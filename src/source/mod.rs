//! Dataset acquisition.
//!
//! A [`Fetcher`] produces the raw CSV text, a [`DatasetLoader`] wraps it
//! with an optional [`DatasetCache`] and parses the result into a
//! [`RawTable`].

pub mod cache;
pub mod table;

pub use cache::DatasetCache;
pub use table::{extract_records, parse_csv, ColumnMap, RawTable};

use crate::config::SourceConfig;
use crate::error::SourceError;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Anything that can produce the survey CSV text.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    /// Identifier of what is fetched (URL or path); also the cache key.
    fn describe(&self) -> String;

    /// Fetch the full CSV text.
    async fn fetch(&self) -> Result<String, SourceError>;
}

/// Built-in data sources.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// CSV over HTTP.
    Http {
        url: String,
        timeout_seconds: u64,
        show_progress: bool,
    },
    /// Local CSV file.
    File(PathBuf),
}

impl DataSource {
    /// Pick the source from configuration: file, then URL, then sheet ID.
    pub fn from_config(config: &SourceConfig, show_progress: bool) -> Result<Self, SourceError> {
        if let Some(ref file) = config.file {
            return Ok(DataSource::File(file.clone()));
        }

        let url = match (&config.url, &config.sheet_id) {
            (Some(url), _) => normalize_sheet_url(url),
            (None, Some(id)) if !id.trim().is_empty() => sheet_export_url(id),
            _ => return Err(SourceError::NotConfigured),
        };

        Ok(DataSource::Http {
            url,
            timeout_seconds: config.timeout_seconds,
            show_progress,
        })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, DataSource::Http { .. })
    }
}

impl Fetcher for DataSource {
    fn describe(&self) -> String {
        match self {
            DataSource::Http { url, .. } => url.clone(),
            DataSource::File(path) => path.display().to_string(),
        }
    }

    async fn fetch(&self) -> Result<String, SourceError> {
        match self {
            DataSource::File(path) => {
                debug!("Reading {}", path.display());
                Ok(tokio::fs::read_to_string(path).await?)
            }
            DataSource::Http {
                url,
                timeout_seconds,
                show_progress,
            } => {
                let spinner = show_progress.then(|| {
                    let pb = ProgressBar::new_spinner();
                    pb.set_style(
                        ProgressStyle::with_template("{spinner:.green} {msg}")
                            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                    );
                    pb.set_message("Downloading dataset...");
                    pb.enable_steady_tick(Duration::from_millis(100));
                    pb
                });

                let client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(*timeout_seconds))
                    .build()?;
                let result = async {
                    let response = client.get(url).send().await?.error_for_status()?;
                    response.text().await
                }
                .await;

                if let Some(pb) = spinner {
                    pb.finish_and_clear();
                }

                let text = result?;
                debug!("Downloaded {} bytes from {}", text.len(), url);
                Ok(text)
            }
        }
    }
}

/// CSV export URL for a spreadsheet identifier.
pub fn sheet_export_url(sheet_id: &str) -> String {
    format!(
        "https://docs.google.com/spreadsheets/d/{}/export?format=csv",
        sheet_id.trim()
    )
}

/// Rewrite a spreadsheet share URL (`.../edit?...`) to its CSV export URL.
/// Other URLs are returned unchanged.
pub fn normalize_sheet_url(url: &str) -> String {
    let url = url.trim();
    match url.find("/edit") {
        Some(pos) if url.contains("docs.google.com/spreadsheets/") => {
            format!("{}/export?format=csv", &url[..pos])
        }
        _ => url.to_string(),
    }
}

/// A parsed dataset and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub table: RawTable,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    pub from_cache: bool,
}

/// Loads the dataset through a fetcher, consulting the cache first.
pub struct DatasetLoader<F> {
    fetcher: F,
    cache: Option<DatasetCache>,
}

impl<F: Fetcher> DatasetLoader<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: DatasetCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Drop the cached entry so the next load fetches again.
    pub fn invalidate_cache(&self) -> Result<(), SourceError> {
        match self.cache {
            Some(ref cache) => cache.invalidate(),
            None => Ok(()),
        }
    }

    /// Load and parse the dataset.
    pub async fn load(&self) -> Result<LoadedDataset, SourceError> {
        let source = self.fetcher.describe();

        if let Some(ref cache) = self.cache {
            let cached = cache.get(&source).unwrap_or_else(|e| {
                warn!("Could not read dataset cache: {}", e);
                None
            });
            if let Some(cached) = cached {
                info!(
                    "Using cached dataset fetched at {}",
                    cached.fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
                return Ok(LoadedDataset {
                    table: parse_csv(&cached.text)?,
                    source,
                    fetched_at: cached.fetched_at,
                    from_cache: true,
                });
            }
        }

        let text = self.fetcher.fetch().await?;
        let fetched_at = Utc::now();
        let table = parse_csv(&text)?;

        if let Some(ref cache) = self.cache {
            if let Err(e) = cache.store(&source, &text, fetched_at) {
                warn!("Could not cache dataset: {}", e);
            }
        }

        info!("Loaded {} rows from {}", table.len(), source);
        Ok(LoadedDataset {
            table,
            source,
            fetched_at,
            from_cache: false,
        })
    }
}
