//! Hidden-stacks preference.
//!
//! A set of stack ids the user does not want listed, stored as a sorted JSON
//! array (`{"hidden_stacks": [1, 4, 7]}`). Every change is written through.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;
use crate::util::write_atomic;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Persisted {
    #[serde(default)]
    hidden_stacks: BTreeSet<u64>,
}

pub struct HiddenStacks {
    path: PathBuf,
    ids: BTreeSet<u64>,
}

impl HiddenStacks {
    /// Load from `path`. A missing file hides nothing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let ids = match std::fs::read_to_string(&path) {
            Ok(content) => {
                serde_json::from_str::<Persisted>(&content)
                    .map_err(|source| ConfigError::Json {
                        path: path.clone(),
                        source,
                    })?
                    .hidden_stacks
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No hidden stacks at {}", path.display());
                BTreeSet::new()
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        Ok(Self { path, ids })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_hidden(&self, stack_id: u64) -> bool {
        self.ids.contains(&stack_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.ids.iter().copied()
    }

    pub fn hide(&mut self, stack_id: u64) -> Result<(), ConfigError> {
        if self.ids.insert(stack_id) {
            self.save()?;
        }
        Ok(())
    }

    pub fn show(&mut self, stack_id: u64) -> Result<(), ConfigError> {
        if self.ids.remove(&stack_id) {
            self.save()?;
        }
        Ok(())
    }

    /// Flip visibility. Returns `true` if the stack is now hidden.
    pub fn toggle(&mut self, stack_id: u64) -> Result<bool, ConfigError> {
        if self.is_hidden(stack_id) {
            self.show(stack_id)?;
            Ok(false)
        } else {
            self.hide(stack_id)?;
            Ok(true)
        }
    }

    fn save(&self) -> Result<(), ConfigError> {
        let persisted = Persisted {
            hidden_stacks: self.ids.clone(),
        };
        let json = serde_json::to_vec_pretty(&persisted).map_err(|source| ConfigError::Json {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, &json).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hide_show_toggle_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/hidden_stacks.json");

        let mut hidden = HiddenStacks::open(&path).unwrap();
        assert!(!hidden.is_hidden(4));
        hidden.hide(7).unwrap();
        hidden.hide(4).unwrap();
        assert!(hidden.toggle(1).unwrap());
        assert!(!hidden.toggle(7).unwrap());

        let reopened = HiddenStacks::open(&path).unwrap();
        assert_eq!(reopened.ids().collect::<Vec<_>>(), [1, 4]);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["hidden_stacks"], serde_json::json!([1, 4]));
    }

    #[test]
    fn show_unknown_id_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hidden.json");
        let mut hidden = HiddenStacks::open(&path).unwrap();
        hidden.show(9).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn duplicate_ids_in_file_collapse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hidden.json");
        std::fs::write(&path, r#"{"hidden_stacks": [3, 3, 2]}"#).unwrap();
        let hidden = HiddenStacks::open(&path).unwrap();
        assert_eq!(hidden.ids().collect::<Vec<_>>(), [2, 3]);
    }
}
