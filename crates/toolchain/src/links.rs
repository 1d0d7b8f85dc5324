//! POSIX permission and symlink bookkeeping for downloaded toolchains.

use noderig_core::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Apply `mode` to `path`.
#[cfg(unix)]
pub(crate) fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| Error::io(e, Some(path.to_path_buf()), "set permissions"))
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Err(Error::configuration(
        "POSIX permissions are not supported on this platform",
    ))
}

/// Link `<bin_dir>/<command>` to `script` and apply `mode` to both.
///
/// An existing entry at the link location is removed first, so repeated
/// calls leave exactly one link behind.
#[cfg(unix)]
pub(crate) fn link_script(bin_dir: &Path, command: &str, script: &Path, mode: u32) -> Result<PathBuf> {
    let link = bin_dir.join(command);

    if std::fs::symlink_metadata(&link).is_ok() {
        std::fs::remove_file(&link)
            .map_err(|e| Error::io(e, Some(link.clone()), "remove existing link"))?;
    }

    set_mode(script, mode)?;
    let target = relative_path(bin_dir, script);
    std::os::unix::fs::symlink(&target, &link)
        .map_err(|e| Error::io(e, Some(link.clone()), "create symlink"))?;
    set_mode(&link, mode)?;

    tracing::info!(link = %link.display(), target = %target.display(), "Linked packager script");
    Ok(link)
}

#[cfg(not(unix))]
pub(crate) fn link_script(_bin_dir: &Path, _command: &str, _script: &Path, _mode: u32) -> Result<PathBuf> {
    Err(Error::configuration(
        "Script links are not supported on this platform",
    ))
}

/// Path of `target` relative to the directory `from_dir`.
///
/// Both paths are expected to be absolute and free of `..` components.
pub(crate) fn relative_path(from_dir: &Path, target: &Path) -> PathBuf {
    let from: Vec<Component<'_>> = from_dir.components().collect();
    let to: Vec<Component<'_>> = target.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut relative = PathBuf::new();
    for _ in common..from.len() {
        relative.push("..");
    }
    for component in &to[common..] {
        relative.push(component.as_os_str());
    }
    relative
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path_climbs_to_common_ancestor() {
        let rel = relative_path(
            Path::new("/tools/node-v12.16.3-linux-x64/bin"),
            Path::new("/tools/node-v12.16.3-linux-x64/lib/node_modules/npm/bin/npm-cli.js"),
        );
        assert_eq!(rel, PathBuf::from("../lib/node_modules/npm/bin/npm-cli.js"));
    }

    #[test]
    fn test_relative_path_inside_directory() {
        let rel = relative_path(Path::new("/a/b"), Path::new("/a/b/c/d.js"));
        assert_eq!(rel, PathBuf::from("c/d.js"));
    }

    #[cfg(unix)]
    #[test]
    fn test_link_script_replaces_existing_link() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let bin = temp.path().join("bin");
        let script = temp.path().join("lib/npm/bin/npm-cli.js");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::create_dir_all(script.parent().unwrap()).unwrap();
        std::fs::write(&script, "#!/usr/bin/env node\n").unwrap();

        let first = link_script(&bin, "npm", &script, 0o755).unwrap();
        let second = link_script(&bin, "npm", &script, 0o755).unwrap();
        assert_eq!(first, second);

        let target = std::fs::read_link(&second).unwrap();
        assert_eq!(target, PathBuf::from("../lib/npm/bin/npm-cli.js"));
        assert_eq!(std::fs::canonicalize(&second).unwrap(), std::fs::canonicalize(&script).unwrap());

        let mode = std::fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(std::fs::read_dir(&bin).unwrap().count(), 1);
    }
}
