//! Draft persistence for the panel's input area.
//!
//! The panel keeps whatever the operator last typed in a small RON file next
//! to the working directory, so an accidentally closed panel does not lose
//! the pasted list. Drafts older than a day are considered abandoned and are
//! deleted on load.

use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use pilot_logging::{pilot_info, pilot_warn};
use serde::{Deserialize, Serialize};

const DRAFT_MAX_AGE_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DraftFile {
    items: String,
    saved_at_ms: i64,
}

/// Loads a fresh draft, or `None`. Stale and unreadable drafts are removed.
pub(crate) fn load_draft(path: &Path) -> Option<String> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            pilot_warn!("Failed to read draft from {path:?}: {err}");
            return None;
        }
    };

    let draft: DraftFile = match ron::from_str(&content) {
        Ok(draft) => draft,
        Err(err) => {
            pilot_warn!("Discarding unparsable draft at {path:?}: {err}");
            let _ = fs::remove_file(path);
            return None;
        }
    };

    let age_ms = Utc::now().timestamp_millis() - draft.saved_at_ms;
    if age_ms > DRAFT_MAX_AGE_MS {
        pilot_info!("Removing stale draft at {path:?}");
        let _ = fs::remove_file(path);
        return None;
    }
    Some(draft.items)
}

/// Writes the draft atomically (write-then-rename). Errors are logged, not
/// surfaced; losing a draft must never break the panel.
pub(crate) fn save_draft(path: &Path, items: &str) {
    let draft = DraftFile {
        items: items.to_owned(),
        saved_at_ms: Utc::now().timestamp_millis(),
    };
    let content = match ron::ser::to_string_pretty(&draft, ron::ser::PrettyConfig::new()) {
        Ok(text) => text,
        Err(err) => {
            pilot_warn!("Failed to serialize draft: {err}");
            return;
        }
    };

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let result = tempfile::NamedTempFile::new_in(parent)
        .and_then(|mut file| {
            file.write_all(content.as_bytes())?;
            Ok(file)
        })
        .and_then(|file| file.persist(path).map_err(|e| e.error));
    if let Err(err) = result {
        pilot_warn!("Failed to write draft to {path:?}: {err}");
    }
}

pub(crate) fn clear_draft(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            pilot_warn!("Failed to remove draft at {path:?}: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draft.ron");

        save_draft(&path, "CKT-100\nCKT-200");
        assert_eq!(load_draft(&path).as_deref(), Some("CKT-100\nCKT-200"));
        // Loading a fresh draft leaves the file in place.
        assert!(path.exists());
    }

    #[test]
    fn missing_draft_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_draft(&dir.path().join("draft.ron")), None);
    }

    #[test]
    fn stale_draft_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draft.ron");
        let old = DraftFile {
            items: "CKT-100".to_string(),
            saved_at_ms: Utc::now().timestamp_millis() - DRAFT_MAX_AGE_MS - 1,
        };
        fs::write(&path, ron::to_string(&old).unwrap()).unwrap();

        assert_eq!(load_draft(&path), None);
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_draft_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draft.ron");
        fs::write(&path, "not ron at all (").unwrap();

        assert_eq!(load_draft(&path), None);
        assert!(!path.exists());
    }

    #[test]
    fn clear_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draft.ron");
        save_draft(&path, "x");

        clear_draft(&path);
        assert!(!path.exists());
        // Clearing again is a quiet no-op.
        clear_draft(&path);
    }
}
