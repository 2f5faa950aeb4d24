use bytes::Bytes;
use std::io;
use std::path::Path;
use tokio::fs;

/// Writes through a temporary sibling and renames it into place, so readers never see a
/// partial file.
pub(crate) async fn atomic_write(path: &Path, data: Bytes) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp_path = tmp_path(path);
    fs::write(&tmp_path, data).await?;
    fs::rename(&tmp_path, path).await
}

/// Blocking variant for configuration files written outside a runtime.
pub(crate) fn atomic_write_blocking(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = tmp_path(path);
    std::fs::write(&tmp_path, data)?;
    std::fs::rename(&tmp_path, path)
}

fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
