//! Archive extraction into the dependency cache.

use std::io::{Cursor, Read};
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive entry `{name}` escapes the extraction directory")]
    UnsafeEntry { name: String },
}

/// Unpack a zip archive into `dest`, creating it if needed.
///
/// Entry names are validated against directory traversal before any file is
/// written.
pub fn unpack_zip(data: &[u8], dest: &Path) -> Result<(), ArchiveError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
    std::fs::create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let rel = entry
            .enclosed_name()
            .ok_or_else(|| ArchiveError::UnsafeEntry {
                name: entry.name().to_string(),
            })?;
        let out_path = dest.join(rel);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut contents = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut contents)?;
        std::fs::write(&out_path, contents)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn sample_zip() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(&mut buf);
        let opts = SimpleFileOptions::default();
        writer.start_file("zargo.toml", opts).unwrap();
        writer
            .write_all(b"[package]\nname = \"x\"\nversion = \"0.1.0\"\n")
            .unwrap();
        writer.start_file("src/main.zig", opts).unwrap();
        writer.write_all(b"pub fn main() void {}\n").unwrap();
        writer.finish().unwrap();
        buf.into_inner()
    }

    #[test]
    fn unpack_creates_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("pkg");
        unpack_zip(&sample_zip(), &dest).unwrap();
        assert!(dest.join("zargo.toml").is_file());
        assert!(dest.join("src").join("main.zig").is_file());
    }

    #[test]
    fn garbage_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(unpack_zip(b"not a zip", &tmp.path().join("x")).is_err());
    }
}
