//! Output path derivation.
//!
//! - input `dir/name.ext` deduplicates to `dir/name.bin`
//! - container `dir/name.bin` restores to `dir/name.restored.ext`

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::{EngineError, InputKind};

/// Extension of a container file.
pub const CONTAINER_EXTENSION: &str = "bin";

/// Infix inserted before the original extension of a restored file.
pub const RESTORED_INFIX: &str = ".restored";

/// Returns the dotted extension of `path`, or an empty string.
///
/// Non UTF-8 extensions are converted lossily.
pub fn original_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Container path for `input`.
pub fn container_path(input: &Path) -> PathBuf {
    input.with_extension(CONTAINER_EXTENSION)
}

/// Restored file path for `container` and the original `extension`.
pub fn restored_path(container: &Path, extension: &str) -> PathBuf {
    let mut name = container
        .file_stem()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(RESTORED_INFIX);
    name.push(extension);
    container.with_file_name(name)
}

/// Directory that receives files written next to `path`.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Fails unless `path` is an existing regular file.
pub(crate) fn require_file(path: &Path, kind: InputKind) -> Result<(), EngineError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(EngineError::InvalidConfiguration(format!(
            "{kind} {} is not a regular file",
            path.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(EngineError::MissingInput {
            path: path.to_path_buf(),
            kind,
        }),
        Err(source) => Err(EngineError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `dest` through a temporary file in the same directory.
///
/// The temporary file only replaces `dest` once `write` succeeds; on error it
/// is removed and `dest` is left untouched.
pub(crate) fn write_atomically<F>(dest: &Path, write: F) -> Result<(), EngineError>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<(), EngineError>,
{
    let dir = parent_dir(dest);
    let mut tmp = NamedTempFile::new_in(dir).map_err(EngineError::io(dir))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush().map_err(EngineError::io(dest))?;
    }
    tmp.persist(dest).map_err(|e| EngineError::Io {
        path: dest.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_includes_dot() {
        assert_eq!(original_extension(Path::new("a/b.txt")), ".txt");
        assert_eq!(original_extension(Path::new("a/b.tar.gz")), ".gz");
        assert_eq!(original_extension(Path::new("a/noext")), "");
        assert_eq!(original_extension(Path::new(".hidden")), "");
    }

    #[test]
    fn test_container_path() {
        assert_eq!(container_path(Path::new("d/file.txt")), PathBuf::from("d/file.bin"));
        assert_eq!(container_path(Path::new("d/noext")), PathBuf::from("d/noext.bin"));
        assert_eq!(container_path(Path::new("a.tar.gz")), PathBuf::from("a.tar.bin"));
    }

    #[test]
    fn test_restored_path() {
        assert_eq!(
            restored_path(Path::new("d/file.bin"), ".txt"),
            PathBuf::from("d/file.restored.txt")
        );
        assert_eq!(
            restored_path(Path::new("d/noext.bin"), ""),
            PathBuf::from("d/noext.restored")
        );
    }

    #[test]
    fn test_require_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        assert!(matches!(
            require_file(&missing, InputKind::File),
            Err(EngineError::MissingInput { kind: InputKind::File, .. })
        ));
        assert!(matches!(
            require_file(dir.path(), InputKind::File),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_failed_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");

        let result = write_atomically(&dest, |w| {
            w.write_all(b"partial").map_err(EngineError::io("out.bin"))?;
            Err(EngineError::InvalidConfiguration("boom".to_string()))
        });

        assert!(result.is_err());
        assert!(!dest.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir(Path::new("file.bin")), Path::new("."));
        assert_eq!(parent_dir(Path::new("d/file.bin")), Path::new("d"));
    }
}
