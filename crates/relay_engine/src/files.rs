use std::io;
use std::path::Path;

use relay_core::LocalFile;
use walkdir::WalkDir;

use crate::RelayError;

/// Every regular file under `root`, sorted by path, named relative to `root`
/// with `/` separators. Symlinks are not followed.
pub fn collect_local_files(root: &Path) -> Result<Vec<LocalFile>, RelayError> {
    let root = root.canonicalize()?;
    if !root.is_dir() {
        return Err(RelayError::InvalidParameter(format!(
            "{} is not a directory",
            root.display()
        )));
    }
    let mut paths = Vec::new();
    for entry in WalkDir::new(&root).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            paths.push(entry.into_path());
        }
    }
    paths.sort();

    Ok(paths
        .into_iter()
        .map(|path| {
            let display_name: String = path
                .strip_prefix(&root)
                .unwrap_or(&path)
                .components()
                .map(|part| part.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            LocalFile::new(path, display_name)
        })
        .collect())
}
