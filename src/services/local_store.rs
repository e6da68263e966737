use std::fs;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::models::{AccountProfile, FormState, IngestionForm};

pub const ACCOUNT_KEY: &str = "account";
pub const FORM_DATA_KEY: &str = "form_data";
pub const INGESTION_FORM_KEY: &str = "data_ingestion_form";

pub fn get_app_data_dir() -> AppResult<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| AppError::Config("Could not find data directory".to_string()))?
        .join("Vartik");

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)?;
    }

    Ok(data_dir)
}

/// Key/value store of JSON blobs, one file per key. No schema versioning:
/// a blob that is missing or fails to parse reads as the default value.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root)?;
        }
        Ok(Self { root })
    }

    pub fn open_default() -> AppResult<Self> {
        Self::new(get_app_data_dir()?.join("state"))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    pub fn get<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let path = self.path_for(key);
        if !path.exists() {
            return T::default();
        }
        match fs::read_to_string(&path)
            .map_err(AppError::from)
            .and_then(|content| serde_json::from_str(&content).map_err(AppError::from))
        {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "unreadable local blob, using defaults");
                T::default()
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        let content = serde_json::to_string(value)?;
        fs::write(self.path_for(key), content)?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> AppResult<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    pub fn form_state(&self) -> FormState {
        self.get(FORM_DATA_KEY)
    }

    pub fn save_form_state(&self, form: &FormState) -> AppResult<()> {
        self.set(FORM_DATA_KEY, form)
    }

    /// Reads the form mirror, applies `edit` and writes it back.
    pub fn update_form_state(&self, edit: impl FnOnce(&mut FormState)) -> AppResult<FormState> {
        let mut form = self.form_state();
        edit(&mut form);
        self.save_form_state(&form)?;
        Ok(form)
    }

    pub fn account(&self) -> AccountProfile {
        self.get(ACCOUNT_KEY)
    }

    pub fn save_account(&self, account: &AccountProfile) -> AppResult<()> {
        self.set(ACCOUNT_KEY, account)
    }

    pub fn ingestion_form(&self) -> IngestionForm {
        self.get(INGESTION_FORM_KEY)
    }

    pub fn save_ingestion_form(&self, form: &IngestionForm) -> AppResult<()> {
        self.set(INGESTION_FORM_KEY, form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_and_corrupt_blobs_read_as_defaults() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        assert_eq!(store.form_state(), FormState::default());

        fs::write(dir.path().join("form_data.json"), "{not json").unwrap();
        assert_eq!(store.form_state(), FormState::default());
    }

    #[test]
    fn update_persists_edits() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path().join("nested")).unwrap();
        store
            .update_form_state(|form| {
                form.user_id = 4;
                form.vector_store = "Qdrant".into();
            })
            .unwrap();
        let reopened = LocalStore::new(dir.path().join("nested")).unwrap();
        let form = reopened.form_state();
        assert_eq!(form.user_id, 4);
        assert_eq!(form.vector_store, "Qdrant");

        reopened.remove(FORM_DATA_KEY).unwrap();
        assert_eq!(reopened.form_state(), FormState::default());
        reopened.remove(FORM_DATA_KEY).unwrap();
    }
}
