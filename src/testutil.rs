use anyhow::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use zip::write::FileOptions;

pub fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("bin").join(name);
    write_file(&path, &format!("#!/bin/sh\n{body}"))?;
    let mut perms = fs::metadata(&path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms)?;
    Ok(path)
}

pub fn write_jar(path: &Path, entries: &[&str]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for name in entries {
        zip.start_file(*name, options)?;
        zip.write_all(b"")?;
    }
    zip.finish()?;
    Ok(())
}

/// Moves the modification time of `path` to `ts`.
pub fn set_mtime(path: &Path, ts: SystemTime) -> Result<()> {
    let file = fs::OpenOptions::new().write(true).open(path)?;
    file.set_modified(ts)?;
    Ok(())
}

/// Pushes the modification time of `path` one minute into the future.
pub fn touch_forward(path: &Path) -> Result<()> {
    set_mtime(path, SystemTime::now() + Duration::from_secs(60))
}
