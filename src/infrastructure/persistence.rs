use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::PersistedStates;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Stores the fetched state list between runs.
pub struct StatesRepository {
    path: PathBuf,
}

impl StatesRepository {
    pub const FILE_NAME: &'static str = "states-storage.json";

    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(Self::FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when nothing has been stored yet.
    pub fn load(&self) -> Result<Option<PersistedStates>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, states: &PersistedStates) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(states)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Writes user-facing output files: downloaded PDFs and summary exports.
pub struct FileRepository;

impl FileRepository {
    /// Saves `bytes` under `dir`, keeping only the final component of `file_name`.
    pub fn save_download(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let name = Path::new(file_name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "document.pdf".into());
        fs::create_dir_all(dir)?;
        let path = dir.join(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Exports `(label, value)` rows as a two-column CSV file.
    pub fn export_summary_csv(rows: &[(String, String)], path: &Path) -> Result<PathBuf, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["Field", "Value"])?;
        for (label, value) in rows {
            writer.write_record([label, value])?;
        }
        writer.flush()?;
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StateData;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let repository = StatesRepository::new(dir.path());
        assert!(repository.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load_states() {
        let dir = TempDir::new().unwrap();
        let repository = StatesRepository::new(dir.path().join("nested"));
        let states = vec![StateData::new("Utah", "UT"), StateData::new("Iowa", "IA")];
        let persisted = PersistedStates {
            popular_states: states.clone(),
            states,
            initialized: true,
        };

        repository.save(&persisted).unwrap();

        assert_eq!(repository.load().unwrap(), Some(persisted));
        let raw = fs::read_to_string(repository.path()).unwrap();
        assert!(raw.contains("popularStates"));
        assert!(raw.contains("initialized"));
    }

    #[test]
    fn test_load_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let repository = StatesRepository::new(dir.path());
        fs::write(repository.path(), "{ not json").unwrap();

        assert!(matches!(repository.load(), Err(StorageError::Json(_))));
    }

    #[test]
    fn test_save_download_strips_directories() {
        let dir = TempDir::new().unwrap();
        let path = FileRepository::save_download(dir.path(), "../../etc/form.pdf", b"%PDF-1.7").unwrap();

        assert_eq!(path, dir.path().join("form.pdf"));
        assert_eq!(fs::read(path).unwrap(), b"%PDF-1.7");
    }

    #[test]
    fn test_export_summary_csv() {
        let dir = TempDir::new().unwrap();
        let rows = vec![
            ("First Name".to_string(), "Ada".to_string()),
            ("Note".to_string(), "a, b".to_string()),
        ];

        let path = FileRepository::export_summary_csv(&rows, &dir.path().join("summary.csv")).unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content, "Field,Value\nFirst Name,Ada\nNote,\"a, b\"\n");
    }
}
