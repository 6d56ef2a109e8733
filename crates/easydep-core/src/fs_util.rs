//! Recursive filesystem helpers shared by the stages that stand up
//! and tear down per-release working copies.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Recursively copies `from` into `to`, creating `to` if absent.
/// Preserves each entry's permission bits.
pub fn copy_dir_recursive(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)
        .with_context(|| format!("failed to create directory {}", to.display()))?;

    for entry in fs::read_dir(from)
        .with_context(|| format!("failed to read directory {}", from.display()))?
    {
        let entry = entry.with_context(|| format!("failed to read entry under {}", from.display()))?;
        let src_path = entry.path();
        let dst_path = to.join(entry.file_name());
        let file_type = entry
            .file_type()
            .with_context(|| format!("failed to stat {}", src_path.display()))?;

        if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(&src_path)
                .with_context(|| format!("failed to read symlink {}", src_path.display()))?;
            symlink(&target, &dst_path)
                .with_context(|| format!("failed to recreate symlink {}", dst_path.display()))?;
        } else {
            fs::copy(&src_path, &dst_path)
                .with_context(|| format!("failed to copy {} to {}", src_path.display(), dst_path.display()))?;
            let permissions = entry
                .metadata()
                .with_context(|| format!("failed to stat {}", src_path.display()))?
                .permissions();
            fs::set_permissions(&dst_path, permissions)
                .with_context(|| format!("failed to set permissions on {}", dst_path.display()))?;
        }
    }

    Ok(())
}

/// Recursively removes `path`, clearing read-only bits along the way
/// so a checked-out working copy (which may contain read-only
/// packed-refs or vendored files) can always be torn down.
pub fn remove_dir_all_writable(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    clear_readonly_recursive(path)?;
    fs::remove_dir_all(path).with_context(|| format!("failed to remove directory {}", path.display()))
}

fn clear_readonly_recursive(path: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?;

    if metadata.is_symlink() {
        return Ok(());
    }

    if metadata.permissions().readonly() {
        let mut permissions = metadata.permissions();
        permissions.set_readonly(false);
        fs::set_permissions(path, permissions)
            .with_context(|| format!("failed to clear readonly bit on {}", path.display()))?;
    }

    if metadata.is_dir() {
        for entry in fs::read_dir(path)
            .with_context(|| format!("failed to read directory {}", path.display()))?
        {
            let entry = entry.with_context(|| format!("failed to read entry under {}", path.display()))?;
            clear_readonly_recursive(&entry.path())?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

/// Removes whatever (if anything) is at `link`, then points a fresh
/// symlink at `target`. Used by `SymlinkFlip` for `current_link` and
/// each configured auxiliary symlink.
pub fn replace_symlink(target: &Path, link: &Path) -> Result<()> {
    if link.symlink_metadata().is_ok() {
        fs::remove_file(link).with_context(|| format!("failed to remove old symlink {}", link.display()))?;
    }
    symlink(target, link)
        .with_context(|| format!("failed to create symlink {} -> {}", link.display(), target.display()))
}
