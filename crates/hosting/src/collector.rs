//! Build directory collection.
//!
//! The collector is content-agnostic: it returns every regular file inside of
//! the build directory. Files that are used for local bookkeeping only must be
//! removed by the caller with [`exclude`] before anything is uploaded.

use std::{
    fs, io,
    path::{Component, Path, StripPrefixError},
};

use derive_more::{Display, Error, From};
use walkdir::WalkDir;

/// A single file of a rendered site build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildArtifact {
    /// POSIX-style path relative to the build root, without a leading slash.
    pub relative_path: String,

    /// Raw file contents.
    pub content: Vec<u8>,
}

/// Errors that may occur during build directory collection.
#[derive(Debug, Display, From, Error)]
pub enum CollectError {
    /// [`walkdir`]-crate specific error.
    WalkDir(walkdir::Error),

    /// IO error.
    Io(io::Error),

    /// Unable to strip build root prefix from path.
    StripPrefix(StripPrefixError),

    /// File path can not be represented as a portable relative path.
    #[from(ignore)]
    #[display(fmt = "unsupported file path {}", path)]
    UnsupportedPath { path: String },
}

/// Recursively collect all regular files inside of the `root` directory.
///
/// Directories are traversed but never emitted, symbolic links are neither
/// followed nor emitted. Any unreadable entry aborts the whole collection.
///
/// Returned artifacts are sorted by their relative path.
pub fn collect(root: &Path) -> Result<Vec<BuildArtifact>, CollectError> {
    let mut artifacts = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry?;

        if !entry.file_type().is_file() {
            continue;
        }

        let relative_path = relative_path(entry.path().strip_prefix(root)?)
            .ok_or_else(|| CollectError::UnsupportedPath {
                path: entry.path().display().to_string(),
            })?;

        artifacts.push(BuildArtifact {
            relative_path,
            content: fs::read(entry.path())?,
        });
    }

    artifacts.sort_by(|left, right| left.relative_path.cmp(&right.relative_path));

    Ok(artifacts)
}

/// Remove artifacts whose file name or relative path matches one of the `names`.
pub fn exclude<S: AsRef<str>>(artifacts: Vec<BuildArtifact>, names: &[S]) -> Vec<BuildArtifact> {
    artifacts
        .into_iter()
        .filter(|artifact| {
            let file_name = artifact
                .relative_path
                .rsplit('/')
                .next()
                .unwrap_or(&artifact.relative_path);

            !names.iter().any(|name| {
                let name = name.as_ref();
                name == file_name || name == artifact.relative_path
            })
        })
        .collect()
}

/// Convert a path relative to the build root into a POSIX-style string.
///
/// Returns [`None`] for paths that contain non-unicode symbols or
/// components that point outside of the build root.
fn relative_path(path: &Path) -> Option<String> {
    let mut segments = Vec::new();

    for component in path.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }

    if segments.is_empty() {
        return None;
    }

    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn collects_nested_files() {
        let dir = tempfile::tempdir().unwrap();

        fs::create_dir_all(dir.path().join("assets/css")).unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        fs::write(dir.path().join("index.html"), "<h1>Hello</h1>").unwrap();
        fs::write(dir.path().join("assets/css/site.css"), "body {}").unwrap();
        fs::write(dir.path().join("assets/logo.svg"), "<svg/>").unwrap();

        let artifacts = collect(dir.path()).unwrap();

        let paths: Vec<_> = artifacts
            .iter()
            .map(|artifact| artifact.relative_path.as_str())
            .collect();

        assert_eq!(
            paths,
            ["assets/css/site.css", "assets/logo.svg", "index.html"]
        );
        assert_eq!(artifacts[2].content, b"<h1>Hello</h1>");
    }

    #[test]
    fn empty_directory() {
        let dir = tempfile::tempdir().unwrap();

        assert!(collect(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_directory() {
        let dir = tempfile::tempdir().unwrap();

        assert!(collect(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn excludes_sidecar_files() {
        let artifacts = vec![
            BuildArtifact {
                relative_path: String::from("index.html"),
                content: Vec::new(),
            },
            BuildArtifact {
                relative_path: String::from("config.schema.json"),
                content: Vec::new(),
            },
            BuildArtifact {
                relative_path: String::from("nested/config.schema.json"),
                content: Vec::new(),
            },
            BuildArtifact {
                relative_path: String::from("drafts/notes.txt"),
                content: Vec::new(),
            },
        ];

        let artifacts = exclude(artifacts, &["config.schema.json", "drafts/notes.txt"]);

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].relative_path, "index.html");
    }

    #[test]
    fn rejects_parent_components() {
        assert_eq!(relative_path(Path::new("../secret")), None);
        assert_eq!(
            relative_path(Path::new("./a/b.html")),
            Some(String::from("a/b.html"))
        );
    }
}
