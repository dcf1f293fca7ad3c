//! Shared temp-file + rename write discipline.
//!
//! Every persisted artifact — plan records, the plan index, git session
//! state, the config file — goes through this so "interrupted write never
//! leaves a corrupt file" only has to be gotten right once.

use std::path::Path;

pub fn atomic_write(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    let tmp_path = tmp_path_for(path);
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".tmp");
    path.with_file_name(name)
}
