//! Durable session state: the id of the conversation the user last had
//! open. Read once at startup, written on every change, cleared on
//! "new chat". A missing or corrupt cache is worth a warning, never a
//! startup failure — the reconciler falls back to the most recent thread.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::AppError;

pub trait SessionCache {
    fn active_conversation_id(&self) -> Result<Option<String>, AppError>;
    fn set_active_conversation_id(&mut self, id: Option<&str>) -> Result<(), AppError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionState {
    active_conversation_id: Option<String>,
}

/// File-backed [`SessionCache`] storing a small JSON document.
pub struct FileSessionCache {
    path: PathBuf,
}

impl FileSessionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<SessionState, AppError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SessionState::default());
            }
            Err(e) => {
                return Err(AppError::session_cache(
                    self.path.display().to_string(),
                    "Failed to read session state",
                    e,
                ));
            }
        };

        match serde_json::from_str(&contents) {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!("Session cache at {} is corrupt, ignoring it: {e}", self.path.display());
                Ok(SessionState::default())
            }
        }
    }

    fn store(&self, state: &SessionState) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    AppError::session_cache(
                        self.path.display().to_string(),
                        "Failed to create session directory",
                        e,
                    )
                })?;
            }
        }
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| AppError::Unexpected(format!("Failed to serialize session state: {e}")))?;
        fs::write(&self.path, json).map_err(|e| {
            AppError::session_cache(
                self.path.display().to_string(),
                "Failed to write session state",
                e,
            )
        })
    }
}

impl SessionCache for FileSessionCache {
    fn active_conversation_id(&self) -> Result<Option<String>, AppError> {
        Ok(self.load()?.active_conversation_id)
    }

    fn set_active_conversation_id(&mut self, id: Option<&str>) -> Result<(), AppError> {
        self.store(&SessionState { active_conversation_id: id.map(str::to_string) })
    }
}
