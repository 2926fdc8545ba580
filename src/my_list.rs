use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};

use crate::models::{Movie, MyListEntry};

/// Fixed storage key; the file-backed store appends `.json`.
pub const STORAGE_KEY: &str = "movieflix-mylist";

pub trait ListStorage: Send + Sync {
    /// Raw stored document, `None` when nothing was saved yet.
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, contents: &str) -> Result<()>;
}

/// One JSON array on disk, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(format!("{}.json", STORAGE_KEY)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ListStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    fn save(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    contents: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn with_contents(contents: &str) -> Self {
        Self {
            contents: Mutex::new(Some(contents.to_string())),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().ok().and_then(|c| c.clone())
    }
}

impl ListStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.contents())
    }

    fn save(&self, contents: &str) -> Result<()> {
        let mut guard = self
            .contents
            .lock()
            .map_err(|_| anyhow::anyhow!("storage lock poisoned"))?;
        *guard = Some(contents.to_string());
        Ok(())
    }
}

/// Personal list, unique by movie id, written through to storage.
pub struct MyList {
    movies: Vec<MyListEntry>,
    storage: Box<dyn ListStorage>,
}

impl MyList {
    /// Anything unreadable starts the list empty.
    pub fn load(storage: Box<dyn ListStorage>) -> Self {
        let movies = match storage.load() {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<MyListEntry>>(&raw) {
                Ok(movies) => movies,
                Err(e) => {
                    warn!("Stored list is not valid JSON, starting empty: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Could not read stored list, starting empty: {:#}", e);
                Vec::new()
            }
        };
        info!("Loaded {} movies into My List", movies.len());
        Self { movies, storage }
    }

    pub fn entries(&self) -> &[MyListEntry] {
        &self.movies
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.movies.iter().any(|m| m.movie.id == id)
    }

    /// Returns false when the id is already listed.
    pub fn add(&mut self, movie: Movie) -> bool {
        self.add_at(movie, Utc::now().timestamp_millis())
    }

    fn add_at(&mut self, movie: Movie, added_at: i64) -> bool {
        if self.contains(&movie.id) {
            return false;
        }
        self.movies.push(MyListEntry { movie, added_at });
        self.persist();
        true
    }

    pub fn remove(&mut self, id: &str) {
        self.movies.retain(|m| m.movie.id != id);
        self.persist();
    }

    pub fn clear(&mut self) {
        self.movies.clear();
        self.persist();
    }

    /// Adds or removes; returns whether the movie is listed afterwards.
    pub fn toggle(&mut self, movie: Movie) -> bool {
        if self.contains(&movie.id) {
            self.remove(&movie.id);
            false
        } else {
            self.add(movie)
        }
    }

    fn persist(&self) {
        let result = serde_json::to_string(&self.movies)
            .context("serializing list")
            .and_then(|raw| self.storage.save(&raw));
        if let Err(e) = result {
            error!("Error saving My List: {:#}", e);
        }
    }
}
