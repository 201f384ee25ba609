//! Per-session credential metadata
//!
//! The durable authentication material in each session directory belongs to
//! the transport; the core only owns the small `meta.json` record next to it
//! and updates it in place (load, modify, save).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::jid::phone_digits;

/// Metadata file name inside each session directory
pub const META_FILE: &str = "meta.json";

/// Session directories are named `auth_info<N>`
pub const AUTH_FOLDER_PREFIX: &str = "auth_info";

/// The metadata sub-record the core owns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Millisecond timestamps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_phone: Option<String>,
}

impl SessionMeta {
    /// Load the metadata record from a session directory.
    ///
    /// A missing file yields the default (empty) record; an unreadable or
    /// malformed file is an error.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(META_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write the record back, creating the directory if needed
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(META_FILE), raw)?;
        Ok(())
    }

    /// Preconfigured owner number in digits-only form
    pub fn owner_digits(&self) -> Option<String> {
        let phone = self.phone.as_deref()?;
        let digits = phone_digits(phone);
        if digits.is_empty() { None } else { Some(digits) }
    }
}

/// Current time in milliseconds since the epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Next free `auth_info<N>` folder name under `base`
pub fn next_auth_folder(base: &Path) -> Result<String> {
    let max = list_session_dirs(base)?
        .iter()
        .filter_map(|name| name[AUTH_FOLDER_PREFIX.len()..].parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    Ok(format!("{AUTH_FOLDER_PREFIX}{}", max + 1))
}

/// Session directory names under `base`, unordered
pub fn list_session_dirs(base: &Path) -> Result<Vec<String>> {
    if !base.exists() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(base)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(AUTH_FOLDER_PREFIX) && entry.file_type()?.is_dir() {
            dirs.push(name);
        }
    }
    Ok(dirs)
}

/// Delete a session directory and everything in it
pub fn remove_session_dir(base: &Path, folder: &str) -> Result<()> {
    let full = base.join(folder);
    if full.exists() {
        fs::remove_dir_all(&full)
            .map_err(|e| Error::Other(format!("failed to remove {}: {e}", full.display())))?;
    }
    Ok(())
}

/// One row of the `sessions_list` response: on-disk metadata merged with
/// in-memory liveness
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub folder: String,
    pub meta: SessionMeta,
    pub online: bool,
    pub last_seen: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_is_default() {
        let tmp = TempDir::new().unwrap();
        let meta = SessionMeta::load(tmp.path()).unwrap();
        assert_eq!(meta, SessionMeta::default());
    }

    #[test]
    fn test_save_load_roundtrip_updates_in_place() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("auth_info1");

        let mut meta = SessionMeta {
            session_id: Some("abc".into()),
            folder_name: Some("auth_info1".into()),
            phone: Some("+509 1234".into()),
            created_at: Some(1000),
            ..Default::default()
        };
        meta.save(&dir).unwrap();

        // connect-time update must not clobber creation fields
        let mut loaded = SessionMeta::load(&dir).unwrap();
        loaded.connected_at = Some(2000);
        loaded.owner_phone = Some("5091234".into());
        loaded.save(&dir).unwrap();

        let fin = SessionMeta::load(&dir).unwrap();
        assert_eq!(fin.session_id.as_deref(), Some("abc"));
        assert_eq!(fin.created_at, Some(1000));
        assert_eq!(fin.connected_at, Some(2000));
    }

    #[test]
    fn test_meta_is_camel_case_on_disk() {
        let tmp = TempDir::new().unwrap();
        let meta = SessionMeta {
            owner_phone: Some("123".into()),
            created_at: Some(5),
            ..Default::default()
        };
        meta.save(tmp.path()).unwrap();

        let raw = fs::read_to_string(tmp.path().join(META_FILE)).unwrap();
        assert!(raw.contains("ownerPhone"));
        assert!(raw.contains("createdAt"));
    }

    #[test]
    fn test_next_auth_folder_numbering() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(next_auth_folder(tmp.path()).unwrap(), "auth_info1");

        fs::create_dir(tmp.path().join("auth_info1")).unwrap();
        fs::create_dir(tmp.path().join("auth_info7")).unwrap();
        fs::create_dir(tmp.path().join("unrelated")).unwrap();
        assert_eq!(next_auth_folder(tmp.path()).unwrap(), "auth_info8");
    }

    #[test]
    fn test_owner_digits() {
        let meta = SessionMeta {
            phone: Some("+1 (509) 123".into()),
            ..Default::default()
        };
        assert_eq!(meta.owner_digits().as_deref(), Some("1509123"));

        let empty = SessionMeta::default();
        assert!(empty.owner_digits().is_none());
    }

    #[test]
    fn test_remove_session_dir_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("auth_info1")).unwrap();

        remove_session_dir(tmp.path(), "auth_info1").unwrap();
        assert!(!tmp.path().join("auth_info1").exists());
        // removing again is fine
        remove_session_dir(tmp.path(), "auth_info1").unwrap();
    }
}
