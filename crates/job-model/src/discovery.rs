//! Input clip discovery.
//!
//! Directory listing order is not stable across filesystems, so discovered
//! files are always sorted with a digit-aware comparison on their names
//! (`2.mp4` before `10.mp4`).

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use clipchain_common::error::{ClipchainError, ClipchainResult};

/// List files in `dir` whose extension matches one of `extensions`
/// (case-insensitive, without the dot), in natural name order.
pub fn discover_inputs(dir: &Path, extensions: &[String]) -> ClipchainResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| ClipchainError::filesystem(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ClipchainError::filesystem(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if matches {
            files.push(path);
        }
    }

    files.sort_by(|a, b| natural_cmp(&file_name_of(a), &file_name_of(b)));
    tracing::debug!(dir = %dir.display(), count = files.len(), "Discovered input clips");
    Ok(files)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Compare two strings treating runs of ASCII digits as numbers.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let na = take_digits(&mut ai);
                let nb = take_digits(&mut bi);
                let ta = na.trim_start_matches('0');
                let tb = nb.trim_start_matches('0');
                let ord = ta.len().cmp(&tb.len()).then_with(|| ta.cmp(tb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                let ord = ca.cmp(&cb);
                if ord != Ordering::Equal {
                    return ord;
                }
                ai.next();
                bi.next();
            }
        }
    }
}

fn take_digits(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = it.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        it.next();
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_order() {
        let mut names = vec!["10.mp4", "2.mp4", "1.mp4", "clip-03.mp4", "clip-1.mp4"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(
            names,
            vec!["1.mp4", "2.mp4", "10.mp4", "clip-1.mp4", "clip-03.mp4"]
        );
    }

    #[test]
    fn test_leading_zeros_fall_back_to_total_order() {
        assert_eq!(natural_cmp("01.mp4", "1.mp4"), "01.mp4".cmp("1.mp4"));
        assert_eq!(natural_cmp("a", "a"), Ordering::Equal);
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["10.mp4", "2.MP4", "1.mp4", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("3.mp4")).unwrap();

        let found = discover_inputs(dir.path(), &["mp4".to_string()]).unwrap();
        let names: Vec<_> = found.iter().map(|p| file_name_of(p)).collect();
        assert_eq!(names, vec!["1.mp4", "2.MP4", "10.mp4"]);
    }

    #[test]
    fn test_discover_missing_dir_is_filesystem_error() {
        let err = discover_inputs(Path::new("/no/such/dir"), &["mp4".to_string()]).unwrap_err();
        assert!(matches!(err, ClipchainError::Filesystem { .. }));
    }
}
