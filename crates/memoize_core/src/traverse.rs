//! Directory traversal that seeds a context from files on disk.

use std::collections::BTreeMap;
use std::path::Path;

use crate::context::BuildContext;
use crate::error::MemoizeError;
use crate::file_info::{normalize_path, FileInfo};

/// Directory names never picked up by traversal.
const SKIP_DIRS: &[&str] = &[".git", ".svn"];

/// Recursively loads every file under the context's base directory into
/// the context, resolving each file's encoding from the context's
/// encoding table.
///
/// VCS metadata directories and the context's configured skip entries
/// are left out.
pub fn traverse(ctx: &mut BuildContext) -> Result<(), MemoizeError> {
    let base = ctx.base_dir().to_path_buf();
    walk(&base, &base, ctx)
}

fn walk(base: &Path, dir: &Path, ctx: &mut BuildContext) -> Result<(), MemoizeError> {
    let entries = std::fs::read_dir(dir).map_err(|e| MemoizeError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| MemoizeError::io(dir, e))?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if path.is_dir() {
            if SKIP_DIRS.contains(&name.as_ref()) || is_skipped(base, &path, ctx) {
                continue;
            }
            walk(base, &path, ctx)?;
        } else {
            if is_skipped(base, &path, ctx) {
                continue;
            }
            let rel = relative_path(base, &path);
            let content = std::fs::read(&path).map_err(|e| MemoizeError::io(&path, e))?;
            let mut info = FileInfo::new(base, &rel, content);
            if let Some(encoding) = resolve_encoding(ctx.file_encodings(), &rel) {
                info.set_encoding(encoding);
            }
            ctx.add_file(info);
        }
    }
    Ok(())
}

/// Whether the entry's first base-relative path component is in the
/// context's skip list.
fn is_skipped(base: &Path, path: &Path, ctx: &BuildContext) -> bool {
    let rel = relative_path(base, path);
    match rel.split('/').next() {
        Some(first) => ctx.skips().iter().any(|s| s == first),
        None => false,
    }
}

fn relative_path(base: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    normalize_path(&rel.to_string_lossy())
}

/// Returns the encoding for `path` from the first matching pattern in
/// the encoding table.
pub fn resolve_encoding(encodings: &BTreeMap<String, String>, path: &str) -> Option<String> {
    encodings
        .iter()
        .find(|(pattern, _)| pattern_matches(pattern, path))
        .map(|(_, encoding)| encoding.clone())
}

/// Matches a `*`-wildcard pattern against a slash-normalized path.
///
/// `*` matches any run of characters, including slashes; everything
/// else matches literally.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    fn matches(pattern: &[u8], path: &[u8]) -> bool {
        match pattern.first() {
            None => path.is_empty(),
            Some(b'*') => {
                matches(&pattern[1..], path) || (!path.is_empty() && matches(pattern, &path[1..]))
            }
            Some(c) => path.first() == Some(c) && matches(&pattern[1..], &path[1..]),
        }
    }
    matches(pattern.as_bytes(), path.as_bytes())
}
