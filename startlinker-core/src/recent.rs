use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use crate::{error::Error, util::mkdir_if_not_exists};

pub const MAX_RECENT_SEARCHES: usize = 5;

/// Most-recent-first list of search terms, persisted as a JSON array.
pub struct RecentSearches {
    path: PathBuf,
    items: Vec<String>,
    limit: usize,
}

impl RecentSearches {
    /// Load the list stored at `path`.  A missing or unreadable file yields an
    /// empty list.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        Self::load_with_limit(path, MAX_RECENT_SEARCHES)
    }

    pub fn load_with_limit(path: impl Into<PathBuf>, limit: usize) -> Self {
        let path = path.into();
        let mut items = match Self::read(&path) {
            Ok(items) => items,
            Err(Error::IoError(err)) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                log::error!("failed to load recent searches from {:?}: {}", path, err);
                Vec::new()
            }
        };
        items.truncate(limit);
        Self { path, items, limit }
    }

    fn read(path: &Path) -> Result<Vec<String>, Error> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Put `term` in front of the list.  Blank terms are ignored.
    pub fn record(&mut self, term: &str) -> Result<(), Error> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(());
        }
        self.items.retain(|item| item != term);
        self.items.insert(0, term.to_owned());
        self.items.truncate(self.limit);
        self.save()
    }

    pub fn clear(&mut self) -> Result<(), Error> {
        self.items.clear();
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn save(&self) -> Result<(), Error> {
        if let Some(dir) = self.path.parent() {
            mkdir_if_not_exists(dir)?;
        }
        let file = File::create(&self.path)?;
        serde_json::to_writer(file, &self.items)?;
        Ok(())
    }
}
