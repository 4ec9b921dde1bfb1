//! Gzip compression of rotated backups

use flate2::write::GzEncoder;
use flate2::Compression;
use logroll_core::{Result, COMPRESS_SUFFIX};
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::fs::FileSystem;

/// Compress `src` into `<src>.gz` and remove `src`.
///
/// On failure the partial `.gz` is removed and `src` is left in place.
pub fn compress_file(fs: &dyn FileSystem, src: &Path) -> Result<PathBuf> {
    let mut name = OsString::from(src.as_os_str());
    name.push(COMPRESS_SUFFIX);
    let dst = PathBuf::from(name);

    if let Err(e) = write_gzip(fs, src, &dst) {
        let _ = fs.remove(&dst);
        return Err(e.into());
    }

    fs.remove(src)?;
    Ok(dst)
}

fn write_gzip(fs: &dyn FileSystem, src: &Path, dst: &Path) -> io::Result<()> {
    let mut reader = fs.open_read(src)?;
    let mut encoder = GzEncoder::new(fs.create(dst)?, Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    let mut out = encoder.finish()?;
    out.flush()
}
