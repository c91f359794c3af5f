//! Path helpers and the scoped file writer.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use kestrel_buffer::Loc;
use regex::Regex;

static CURSOR_SUFFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(.+?):(\d+)(?::(\d+))?$").ok());

/// Splits a trailing `:line[:column]` suffix off `path`.
///
/// Line and column are 1-based in the input; the returned location is
/// 0-based with a missing column meaning the start of the line.
pub fn split_cursor_suffix(path: &str) -> (String, Option<Loc>) {
    let Some(caps) = CURSOR_SUFFIX.as_ref().and_then(|re| re.captures(path)) else {
        return (path.to_string(), None);
    };

    let number = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .map(|n| n.saturating_sub(1))
    };
    let Some(line) = number(2) else {
        return (path.to_string(), None);
    };
    let column = number(3).unwrap_or(0);

    (caps[1].to_string(), Some(Loc::new(column, line)))
}

/// Expands a leading `~` to the home directory.
pub fn replace_home(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return path.to_string(),
    };
    match dirs::home_dir() {
        Some(home) => format!("{}{}", home.display(), rest),
        None => path.to_string(),
    }
}

/// Absolute form of `path`; returned unchanged if it cannot be resolved.
pub fn absolute(path: &str) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| PathBuf::from(path))
}

/// Encodes an absolute path as a single file name.
///
/// `%` is escaped first so the mapping stays reversible.
pub fn escape_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => {
                out.push_str(&format!("%{:02X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

/// Last modification time of `path`, if it can be read.
pub fn mod_time(path: impl AsRef<Path>) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Truncates or creates `path` and hands a buffered writer to `f`.
///
/// The writer is flushed and the file synced on every path. The first error
/// wins: a flush or sync failure is only reported if `f` succeeded.
pub fn overwrite_file<F>(path: impl AsRef<Path>, f: F) -> std::io::Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    let file = options.open(path)?;

    let mut writer = BufWriter::new(file);
    let result = f(&mut writer);
    let close = writer
        .flush()
        .and_then(|()| writer.into_inner().map_err(std::io::IntoInnerError::into_error))
        .and_then(|file| file.sync_data());

    result.and(close)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_cursor_suffix() {
        assert_eq!(
            split_cursor_suffix("src/main.rs:3:2"),
            ("src/main.rs".to_string(), Some(Loc::new(1, 2)))
        );
        assert_eq!(
            split_cursor_suffix("notes.txt:10"),
            ("notes.txt".to_string(), Some(Loc::new(0, 9)))
        );
        assert_eq!(split_cursor_suffix("plain.txt"), ("plain.txt".to_string(), None));
        assert_eq!(split_cursor_suffix("odd:name"), ("odd:name".to_string(), None));
    }

    #[test]
    fn test_replace_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(replace_home("~/x"), format!("{}/x", home.display()));
        assert_eq!(replace_home("~"), home.display().to_string());
        assert_eq!(replace_home("~user/x"), "~user/x");
        assert_eq!(replace_home("/tmp/~"), "/tmp/~");
    }

    #[test]
    fn test_escape_path() {
        assert_eq!(escape_path(Path::new("/home/a%b/c:d")), "%2Fhome%2Fa%25b%2Fc%3Ad");
        assert_ne!(escape_path(Path::new("/a/b")), escape_path(Path::new("/a%2Fb")));
    }

    #[test]
    fn test_overwrite_file_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "much longer old content").unwrap();

        overwrite_file(&path, |w| w.write_all(b"new")).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_overwrite_file_reports_callback_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let err = overwrite_file(&path, |w| {
            w.write_all(b"partial")?;
            Err(std::io::Error::other("boom"))
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "boom");
        // Buffered data is still flushed
        assert_eq!(std::fs::read(&path).unwrap(), b"partial");
    }

    #[test]
    fn test_overwrite_file_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.txt");
        assert!(overwrite_file(&path, |_| Ok(())).is_err());
    }

    #[test]
    fn test_mod_time() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(mod_time(file.path()).is_some());
        assert!(mod_time("/definitely/not/here").is_none());
    }
}
