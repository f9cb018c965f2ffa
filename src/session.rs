//! Draft persistence — `session.json` in the work dir.
//!
//! Saved on every generation and at shutdown so a crash never loses more
//! than the current keystrokes. The trailing newline the console loop
//! leaves on the buffer is stripped on save, matching what the user typed.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const SESSION_FILENAME: &str = "session.json";

/// On-disk shape of `session.json`.
#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    text: String,
}

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(work_dir: &Path) -> Self {
        Self { path: work_dir.join(SESSION_FILENAME) }
    }

    /// Persist the draft, stripping one trailing newline.
    pub fn save(&self, text: &str) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::Session(format!("cannot create {}: {e}", parent.display())))?;
        }
        let file = SessionFile { text: text.strip_suffix('\n').unwrap_or(text).to_string() };
        let data = serde_json::to_string(&file)
            .map_err(|e| AppError::Session(format!("serialise session: {e}")))?;
        fs::write(&self.path, data)
            .map_err(|e| AppError::Session(format!("cannot write {}: {e}", self.path.display())))
    }

    /// Load the last saved draft; a missing file is an empty draft.
    pub fn load(&self) -> Result<String, AppError> {
        match fs::read_to_string(&self.path) {
            Ok(data) => {
                let file: SessionFile = serde_json::from_str(&data).map_err(|e| {
                    AppError::Session(format!("malformed {}: {e}", self.path.display()))
                })?;
                Ok(file.text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(AppError::Session(format!(
                "cannot read {}: {e}",
                self.path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());

        store.save("Once upon a time").unwrap();
        assert_eq!(store.load().unwrap(), "Once upon a time");
    }

    #[test]
    fn trailing_newline_stripped_once() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());

        store.save("line one\nline two\n").unwrap();
        assert_eq!(store.load().unwrap(), "line one\nline two");
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        assert_eq!(store.load().unwrap(), "");
    }

    #[test]
    fn malformed_file_errors() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SESSION_FILENAME), "{broken").unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load().is_err());
    }

    #[test]
    fn work_dir_created_on_save() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("deeper");
        let store = SessionStore::new(&nested);
        store.save("x").unwrap();
        assert_eq!(store.load().unwrap(), "x");
    }
}
