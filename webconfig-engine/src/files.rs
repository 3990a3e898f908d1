use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Temporary path for safe saves of `config_path`: its file name inside
/// `temp_dir`, with a `.tmp` suffix when that would be the config file itself.
pub fn temp_path_for(config_path: &Path, temp_dir: &Path) -> PathBuf {
    let file_name = config_path
        .file_name()
        .map_or_else(|| OsString::from("Web.config"), ToOwned::to_owned);
    let temp_path = temp_dir.join(&file_name);
    if !is_same_location(&temp_path, config_path) {
        return temp_path;
    }

    let mut renamed = file_name;
    renamed.push(".tmp");
    temp_dir.join(renamed)
}

fn is_same_location(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    a.file_name() == b.file_name()
        && matches!((resolved_parent(a), resolved_parent(b)), (Some(x), Some(y)) if x == y)
}

fn resolved_parent(path: &Path) -> Option<PathBuf> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::canonicalize(parent).ok()
}

/// Moves `source` over `target`.
///
/// Returns `Ok(false)` when `source` does not exist. When the rename fails
/// (read-only file, different volume) the source is copied over the target,
/// which is never deleted first.
pub fn replace_file(source: &Path, target: &Path) -> io::Result<bool> {
    if !source.exists() {
        debug!(source = %source.display(), "Nothing to move");
        return Ok(false);
    }

    match fs::rename(source, target) {
        Ok(()) => return Ok(true),
        Err(e) => warn!(
            source = %source.display(),
            target = %target.display(),
            error = %e,
            "Rename failed, replacing target by copy"
        ),
    }

    copy_over(source, target)?;
    fs::remove_file(source)?;
    Ok(true)
}

/// Copies `source` onto `target`, clearing a read-only flag and retrying once.
fn copy_over(source: &Path, target: &Path) -> io::Result<()> {
    let Err(e) = fs::copy(source, target) else {
        return Ok(());
    };
    if !clear_readonly(target)? {
        return Err(e);
    }
    fs::copy(source, target)?;
    Ok(())
}

/// Returns whether a read-only flag was cleared.
fn clear_readonly(path: &Path) -> io::Result<bool> {
    let Ok(metadata) = fs::metadata(path) else {
        return Ok(false);
    };
    let mut permissions = metadata.permissions();
    if !permissions.readonly() {
        return Ok(false);
    }
    #[allow(clippy::permissions_set_readonly_false)]
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions)?;
    debug!(path = %path.display(), "Cleared read-only flag");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_source_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let moved = replace_file(&dir.path().join("absent"), &dir.path().join("target")).unwrap();
        assert!(!moved);
        assert!(!dir.path().join("target").exists());
    }

    #[test]
    fn test_replaces_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.config");
        let target = dir.path().join("Web.config");
        fs::write(&source, "new").unwrap();
        fs::write(&target, "old").unwrap();

        assert!(replace_file(&source, &target).unwrap());
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
        assert!(!source.exists());
    }

    #[test]
    fn test_copy_over_readonly_target() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.config");
        let target = dir.path().join("Web.config");
        fs::write(&source, "new").unwrap();
        fs::write(&target, "old").unwrap();
        let mut permissions = fs::metadata(&target).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&target, permissions).unwrap();

        copy_over(&source, &target).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn test_failed_copy_keeps_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("Web.config");
        fs::write(&target, "old").unwrap();

        assert!(copy_over(&dir.path().join("absent"), &target).is_err());
        assert_eq!(fs::read_to_string(&target).unwrap(), "old");
    }

    #[test]
    fn test_temp_path_avoids_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("Web.config");
        fs::write(&config, "<configuration />").unwrap();

        let elsewhere = dir.path().join("tmp");
        fs::create_dir(&elsewhere).unwrap();
        assert_eq!(temp_path_for(&config, &elsewhere), elsewhere.join("Web.config"));

        assert_eq!(temp_path_for(&config, dir.path()), dir.path().join("Web.config.tmp"));
        let nested = dir.path().join("tmp").join("..");
        assert_eq!(temp_path_for(&config, &nested), nested.join("Web.config.tmp"));
    }
}
