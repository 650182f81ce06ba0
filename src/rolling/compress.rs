//! Backup compression.
//!
//! The appender never links a codec directly; it drives a [`Compress`]
//! implementation supplied at construction time. The `gzip` feature provides
//! [`GzipCompress`], a ready-made implementation over `flate2`.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

#[cfg(feature = "gzip")]
use flate2::{write::GzEncoder, Compression};

/// Compresses rotated-out backup files.
///
/// Implementations **must not** log through the appender they are installed
/// in (directly or via a shared logging pipeline): the rotation lock is held
/// while `compress` runs, and re-entering the appender deadlocks on it.
pub trait Compress: Send + Sync {
    /// The path the compressed artifact for `src` will be written to.
    fn target(&self, src: &Path) -> PathBuf;

    /// Compresses `src` into `dst`, creating `dst`. The appender deletes
    /// `src` afterwards on success, and deletes a partially written `dst` on
    /// failure.
    fn compress(&self, src: &Path, dst: &Path) -> io::Result<()>;
}

/// Runs the configured compressor over a freshly rotated backup and returns
/// the path the backup ends up at.
///
/// With no compressor the backup is left as-is. On success the uncompressed
/// source is removed; on failure the partial artifact is removed and the
/// uncompressed backup is kept, so rotation always leaves exactly one file.
pub(crate) fn compress_backup(compressor: Option<&dyn Compress>, path: PathBuf) -> PathBuf {
    let compressor = match compressor {
        Some(compressor) => compressor,
        None => return path,
    };

    let target = compressor.target(&path);
    match compressor.compress(&path, &target) {
        Ok(()) => {
            if let Err(err) = fs::remove_file(&path) {
                eprintln!(
                    "Couldn't remove log file {} after compressing it: {}",
                    path.display(),
                    err
                );
            }
            target
        }
        Err(err) => {
            eprintln!("Couldn't compress log file {}: {}", path.display(), err);
            if target.exists() {
                if let Err(err) = fs::remove_file(&target) {
                    eprintln!(
                        "Couldn't remove partial compressed file {}: {}",
                        target.display(),
                        err
                    );
                }
            }
            path
        }
    }
}

/// Gzip compression for backups, producing `<backup>.gz`.
#[cfg(feature = "gzip")]
#[derive(Debug, Clone)]
pub struct GzipCompress {
    level: Compression,
}

#[cfg(feature = "gzip")]
impl GzipCompress {
    /// A gzip compressor at the given `flate2` level.
    pub fn new(level: Compression) -> Self {
        Self { level }
    }
}

#[cfg(feature = "gzip")]
impl Default for GzipCompress {
    fn default() -> Self {
        Self::new(Compression::default())
    }
}

#[cfg(feature = "gzip")]
impl Compress for GzipCompress {
    fn target(&self, src: &Path) -> PathBuf {
        add_extension(src, "gz")
    }

    fn compress(&self, src: &Path, dst: &Path) -> io::Result<()> {
        use std::io::{BufReader, BufWriter, Write};

        let mut reader = BufReader::new(fs::File::open(src)?);
        let writer = BufWriter::new(fs::File::create(dst)?);
        let mut encoder = GzEncoder::new(writer, self.level);
        io::copy(&mut reader, &mut encoder)?;
        encoder.finish()?.flush()
    }
}

#[cfg(feature = "gzip")]
fn add_extension(path: &Path, ext: &'static str) -> PathBuf {
    let mut path = std::ffi::OsString::from(path);
    path.push(".");
    path.push(ext);
    path.into()
}

#[cfg(test)]
mod test {
    use super::*;

    struct FailingCompress {
        write_partial: bool,
    }

    impl Compress for FailingCompress {
        fn target(&self, src: &Path) -> PathBuf {
            let mut target = src.to_path_buf();
            target.set_extension("part");
            target
        }

        fn compress(&self, _src: &Path, dst: &Path) -> io::Result<()> {
            if self.write_partial {
                fs::write(dst, b"partial")?;
            }
            Err(io::Error::new(io::ErrorKind::Other, "codec failure"))
        }
    }

    #[test]
    fn no_compressor_leaves_the_backup_alone() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let backup = dir.path().join("app.log.20240115T120000Z");
        fs::write(&backup, b"contents").unwrap();

        assert_eq!(compress_backup(None, backup.clone()), backup);
        assert!(backup.exists());
    }

    #[test]
    fn failure_keeps_the_source_and_removes_the_partial_artifact() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let backup = dir.path().join("app.log.20240115T120000Z");
        fs::write(&backup, b"contents").unwrap();

        let compressor = FailingCompress {
            write_partial: true,
        };
        let kept = compress_backup(Some(&compressor), backup.clone());

        assert_eq!(kept, backup);
        assert!(backup.exists());
        assert!(!compressor.target(&backup).exists());
    }

    #[test]
    fn failure_without_partial_output_is_tolerated() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let backup = dir.path().join("app.log.20240115T120000Z");
        fs::write(&backup, b"contents").unwrap();

        let compressor = FailingCompress {
            write_partial: false,
        };
        assert_eq!(compress_backup(Some(&compressor), backup.clone()), backup);
        assert!(backup.exists());
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn gzip_replaces_the_backup_with_a_decodable_artifact() {
        use flate2::read::GzDecoder;
        use std::io::Read;

        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let backup = dir.path().join("app.log.20240115T120000Z");
        fs::write(&backup, b"hello backup").unwrap();

        let compressor = GzipCompress::default();
        let produced = compress_backup(Some(&compressor), backup.clone());

        assert_eq!(produced, dir.path().join("app.log.20240115T120000Z.gz"));
        assert!(!backup.exists());

        let bytes = fs::read(&produced).unwrap();
        let mut decoded = String::new();
        GzDecoder::new(&bytes[..])
            .read_to_string(&mut decoded)
            .expect("cannot decode compressed backup");
        assert_eq!(decoded, "hello backup");
    }
}
