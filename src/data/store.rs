use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::loader::{load_file, LoadError};
use super::model::Dataset;

/// Holds the currently loaded dataset.
///
/// `load` is single-flight per source: the lock is held across the read, so
/// concurrent callers for the same path wait and receive the same instance.
/// Loading a different path (or calling `reload`) replaces the dataset and
/// therefore its identity.
#[derive(Default)]
pub struct DatasetStore {
    current: Mutex<Option<Arc<Dataset>>>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `source`, reusing the current dataset when it came from the same path.
    pub fn load(&self, source: &Path) -> Result<Arc<Dataset>, LoadError> {
        let source = source_identity(source);
        let mut current = self.current.lock();
        if let Some(dataset) = current.as_ref() {
            if dataset.source() == source {
                return Ok(Arc::clone(dataset));
            }
        }
        Self::read_into(&mut current, &source)
    }

    /// Re-read `source` unconditionally, producing a new dataset identity.
    pub fn reload(&self, source: &Path) -> Result<Arc<Dataset>, LoadError> {
        let source = source_identity(source);
        let mut current = self.current.lock();
        Self::read_into(&mut current, &source)
    }

    pub fn current(&self) -> Option<Arc<Dataset>> {
        self.current.lock().clone()
    }

    fn read_into(slot: &mut Option<Arc<Dataset>>, source: &Path) -> Result<Arc<Dataset>, LoadError> {
        let dataset = Arc::new(load_file(source).inspect_err(|e| {
            log::error!("Failed to load {}: {e}", source.display());
        })?);
        log::info!(
            "Dataset {} ready: {} listings from {}",
            dataset.id(),
            dataset.len(),
            source.display()
        );
        *slot = Some(Arc::clone(&dataset));
        Ok(dataset)
    }
}

/// Canonical path when it resolves, the given path otherwise.
fn source_identity(source: &Path) -> PathBuf {
    std::fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv_file(rows: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(
            file,
            "id,host_name,neighbourhood_group,neighbourhood,room_type,price,minimum_nights,number_of_reviews,availability_365"
        )
        .unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        file
    }

    #[test]
    fn same_source_returns_same_instance() {
        let file = csv_file(&["1,Ann,Queens,Astoria,Private room,60,1,2,100"]);
        let store = DatasetStore::new();
        let a = store.load(file.path()).unwrap();
        let b = store.load(file.path()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn reload_and_new_source_change_identity() {
        let first = csv_file(&["1,Ann,Queens,Astoria,Private room,60,1,2,100"]);
        let second = csv_file(&["2,Bob,Bronx,Fordham,Shared room,40,1,0,0"]);
        let store = DatasetStore::new();
        let a = store.load(first.path()).unwrap();
        let reread = store.reload(first.path()).unwrap();
        assert_ne!(a.id(), reread.id());
        let b = store.load(second.path()).unwrap();
        assert_ne!(reread.id(), b.id());
        assert_eq!(store.current().map(|d| d.id()), Some(b.id()));
    }

    #[test]
    fn failed_load_keeps_previous_dataset() {
        let file = csv_file(&["1,Ann,Queens,Astoria,Private room,60,1,2,100"]);
        let store = DatasetStore::new();
        let a = store.load(file.path()).unwrap();
        assert!(store.load(Path::new("/missing/listings.csv")).is_err());
        assert_eq!(store.current().map(|d| d.id()), Some(a.id()));
    }
}
