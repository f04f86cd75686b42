//! File outputs beyond the schedule document.

pub mod export;

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use crate::error::PlanError;

/// Opens `path` for writing. Without `overwrite` an existing file is left
/// untouched and reported as [`PlanError::WriteConflict`].
///
/// # Errors
///
/// Returns [`PlanError::WriteConflict`] or [`PlanError::Io`].
pub fn open_output(path: &Path, overwrite: bool) -> Result<File, PlanError> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    options.open(path).map_err(|source| {
        if source.kind() == io::ErrorKind::AlreadyExists {
            PlanError::WriteConflict {
                path: path.to_path_buf(),
            }
        } else {
            PlanError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn existing_file_needs_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small_0.periods.csv");
        fs::write(&path, "keep me").unwrap();

        let err = open_output(&path, false).unwrap_err();
        assert!(matches!(err, PlanError::WriteConflict { .. }), "{err}");
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me");

        open_output(&path, true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn missing_directory_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir.csv");
        assert!(matches!(open_output(&path, false), Err(PlanError::Io { .. })));
    }
}
