//! Test fixtures: SSE bodies, build event payloads and on-disk file trees.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::json;

/// Serialise a build event with the given component changes.
///
/// Each change is `(component, name, subject, state)`.
#[must_use]
pub fn build_event_json(id: &str, subject: &str, changes: &[(&str, &str, &str, &str)]) -> String {
    let changes: Vec<_> = changes
        .iter()
        .map(|(component, name, change_subject, state)| {
            json!({
                "_component_id": format!("{component}::{name}"),
                "_component": component,
                "_subject": change_subject,
                "_state": state,
                "name": name,
            })
        })
        .collect();

    json!({
        "id": id,
        "name": "fixture",
        "_subject": subject,
        "changes": changes,
    })
    .to_string()
}

/// Render `(id, data)` pairs as a `text/event-stream` body.
#[must_use]
pub fn sse_body(frames: &[(&str, &str)]) -> String {
    frames
        .iter()
        .map(|(id, data)| format!("id: {id}\ndata: {data}\n\n"))
        .collect()
}

/// Write `(relative path, contents)` pairs under `root`, creating directories.
///
/// # Errors
///
/// Returns the first IO error encountered.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) -> io::Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(files.len());
    for (relative, contents) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_body_frames_each_event() {
        let body = sse_body(&[("1", "{}"), ("2", "{\"a\":1}")]);
        assert_eq!(body, "id: 1\ndata: {}\n\nid: 2\ndata: {\"a\":1}\n\n");
    }

    #[test]
    fn build_event_json_contains_changes() {
        let raw = build_event_json("b", "build.create.done", &[("vpc", "main", "vpc.create", "completed")]);
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value["_subject"], "build.create.done");
        assert_eq!(value["changes"][0]["_component_id"], "vpc::main");
    }

    #[test]
    fn write_tree_creates_nested_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let written = write_tree(dir.path(), &[("a/b/c.yml", "x: 1\n")]).expect("write");
        assert_eq!(fs::read_to_string(&written[0]).expect("read"), "x: 1\n");
    }
}
