use anyhow::Context as _;
use std::path::Path;

/// Write `contents` to `path`, creating parent directories.
///
/// Unless `overwrite` is set an existing file is an error.
pub(crate) async fn write_file(
    path: &Path,
    contents: impl AsRef<[u8]>,
    overwrite: bool,
) -> anyhow::Result<()> {
    if !overwrite
        && tokio::fs::try_exists(path)
            .await
            .with_context(|| format!("failed to check file existence: {}", path.display()))?
    {
        anyhow::bail!(
            "refusing to overwrite existing file (use --force): {}",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create dir: {}", parent.display()))?;
    }

    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("failed to write file: {}", path.display()))
}
