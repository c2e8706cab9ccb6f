use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::error::CatalogError;
use super::tle::{parse_tle_bulk, Tle};
use crate::predict::Sgp4Predictor;
use crate::utils::url_to_filename;

pub const DEFAULT_SOURCES: &[&str] =
    &["https://celestrak.org/NORAD/elements/gp.php?GROUP=active&FORMAT=tle"];
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);
const FILE_SCHEME: &str = "file://";

/// Freshness of one source's local copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceState {
    Missing,
    Current { age: Duration },
    OutOfDate { age: Duration },
    /// `file://` sources are never downloaded.
    Local,
}

#[derive(Debug, Clone)]
pub struct SourceStatus {
    pub url: String,
    pub path: PathBuf,
    pub state: SourceState,
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ago = |age: &Duration| humantime::format_duration(Duration::from_secs(age.as_secs()));
        match &self.state {
            SourceState::Missing => write!(f, "{} - Not downloaded", self.url),
            SourceState::Current { age } => write!(f, "{} - Current: {} ago", self.url, ago(age)),
            SourceState::OutOfDate { age } => {
                write!(f, "{} - Out-of-date: {} ago", self.url, ago(age))
            }
            SourceState::Local => write!(f, "{} - Local file {}", self.url, self.path.display()),
        }
    }
}

/// TLE data gathered from remote sources and local files, cached on disk.
///
/// Lookups only see what was added with [`OrbitDatabase::add_tle`] or loaded
/// by [`OrbitDatabase::refresh`].
pub struct OrbitDatabase {
    cache_dir: PathBuf,
    sources: Vec<String>,
    max_age: Duration,
    by_name: HashMap<String, Tle>,
    by_norad: HashMap<u64, Tle>,
}

impl OrbitDatabase {
    pub fn new(cache_dir: impl Into<PathBuf>, sources: Vec<String>, max_age: Duration) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            sources,
            max_age,
            by_name: HashMap::new(),
            by_norad: HashMap::new(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn add_tle(&mut self, line1: &str, line2: &str, name: &str) -> Result<&Tle, CatalogError> {
        let tle = Tle::new(line1, line2, name)?;
        let id = tle.norad_id;
        if !tle.name.is_empty() {
            self.by_name.insert(tle.name.clone(), tle.clone());
        }
        self.by_norad.insert(id, tle);
        Ok(&self.by_norad[&id])
    }

    pub fn get_name(&self, name: &str) -> Result<&Tle, CatalogError> {
        self.by_name
            .get(name)
            .ok_or_else(|| CatalogError::UnknownName(name.to_string()))
    }

    pub fn get_norad(&self, id: u64) -> Result<&Tle, CatalogError> {
        self.by_norad.get(&id).ok_or(CatalogError::UnknownNorad(id))
    }

    pub fn get_name_by_norad(&self, id: u64) -> Result<&str, CatalogError> {
        Ok(&self.get_norad(id)?.name)
    }

    pub fn count(&self) -> usize {
        self.by_norad.len()
    }

    pub fn predictor(&self, name: &str) -> Result<Sgp4Predictor, CatalogError> {
        Ok(Sgp4Predictor::from_tle(self.get_name(name)?)?)
    }

    /// Brings every source up to date and loads its TLEs.
    ///
    /// Cached downloads younger than the maximum age are reused unless
    /// `force` is set. When a download fails, an older cached copy is used
    /// instead, again unless `force` is set. Returns the number of TLEs loaded.
    pub async fn refresh(&mut self, force: bool) -> Result<usize, CatalogError> {
        let mut loaded = 0;
        for url in self.sources.clone() {
            let path = self.current_file(&url, force).await?;
            let content = fs::read_to_string(&path).map_err(CatalogError::io(&path))?;
            loaded += self.load_bulk(&content);
        }
        log::info!("Loaded {} TLEs, {} satellites known", loaded, self.count());
        Ok(loaded)
    }

    /// Downloads every source again and returns the ids from `norad_ids`
    /// that none of them carries.
    pub async fn refresh_satellites(&mut self, norad_ids: &[u64]) -> Result<Vec<u64>, CatalogError> {
        self.refresh(true).await?;
        let missing: Vec<u64> = norad_ids
            .iter()
            .copied()
            .filter(|id| !self.by_norad.contains_key(id))
            .collect();
        if !missing.is_empty() {
            log::warn!("No TLE found for NORAD ids {:?}", missing);
        }
        Ok(missing)
    }

    pub fn status(&self) -> Vec<SourceStatus> {
        self.sources
            .iter()
            .map(|url| {
                let path = self.local_path(url);
                let state = if url.starts_with(FILE_SCHEME) {
                    SourceState::Local
                } else {
                    match file_age(&path) {
                        None => SourceState::Missing,
                        Some(age) if age > self.max_age => SourceState::OutOfDate { age },
                        Some(age) => SourceState::Current { age },
                    }
                };
                SourceStatus {
                    url: url.clone(),
                    path,
                    state,
                }
            })
            .collect()
    }

    fn load_bulk(&mut self, content: &str) -> usize {
        let mut loaded = 0;
        for (name, line1, line2) in parse_tle_bulk(content) {
            match self.add_tle(&line1, &line2, &name) {
                Ok(_) => loaded += 1,
                Err(e) => log::warn!("Skipping TLE {:?}: {}", name, e),
            }
        }
        loaded
    }

    /// Where the data of `url` lives locally. Relative `file://` paths are
    /// taken from the cache directory.
    fn local_path(&self, url: &str) -> PathBuf {
        match url.strip_prefix(FILE_SCHEME) {
            Some(path) => self.cache_dir.join(path),
            None => self.cache_dir.join(url_to_filename(url)),
        }
    }

    async fn current_file(&self, url: &str, force: bool) -> Result<PathBuf, CatalogError> {
        let path = self.local_path(url);
        if url.starts_with(FILE_SCHEME) {
            log::debug!("Reading local TLE file {}", path.display());
            return Ok(path);
        }

        let age = file_age(&path);
        if !force && age.is_some_and(|age| age <= self.max_age) {
            log::info!("{} is up-to-date, skipping download", path.display());
            return Ok(path);
        }

        match download(url, &path).await {
            Ok(()) => Ok(path),
            Err(e) if !force && age.is_some() => {
                log::warn!("{}, using cached copy {}", e, path.display());
                Ok(path)
            }
            Err(e) => Err(e),
        }
    }
}

fn file_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(SystemTime::now().duration_since(modified).unwrap_or_default())
}

/// Downloads into a temporary file first so a failed transfer never
/// clobbers the cached copy.
async fn download(url: &str, path: &Path) -> Result<(), CatalogError> {
    log::info!("Downloading {} to {}", url, path.display());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(CatalogError::io(parent))?;
    }

    let request_failed = |source| CatalogError::Download {
        url: url.to_string(),
        source,
    };
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(request_failed)?;
    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "text/plain")
        .send()
        .await
        .map_err(request_failed)?;
    if !response.status().is_success() {
        return Err(CatalogError::HttpStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    let body = response.text().await.map_err(request_failed)?;

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, body.as_bytes()).map_err(CatalogError::io(&temp_path))?;
    fs::rename(&temp_path, path).map_err(CatalogError::io(path))?;
    log::debug!("Saved {} bytes to {}", body.len(), path.display());
    Ok(())
}
