//! Content digests used as the provider-side deduplication key.

use common::hash;
use serde::Serialize;

use crate::collector::BuildArtifact;

/// Content digest of a single build artifact.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct FileDigest {
    /// POSIX-style path relative to the build root.
    pub relative_path: String,

    /// Lowercase hex-encoded SHA-1 digest of the file contents.
    pub sha1: String,

    /// File size, in bytes.
    pub size: u64,
}

/// Compute the digest of an artifact.
///
/// Only the artifact's own bytes are hashed.
pub fn digest(artifact: &BuildArtifact) -> FileDigest {
    let content = &artifact.content[..];

    FileDigest {
        relative_path: artifact.relative_path.clone(),
        sha1: hash::sha1_hex(content),
        size: content.len() as u64,
    }
}

/// Build artifact paired with its digest, ready to be uploaded.
#[derive(Clone, Debug)]
pub struct SiteFile {
    /// File digest.
    pub digest: FileDigest,

    /// Raw file contents.
    pub content: Vec<u8>,
}

impl SiteFile {
    /// Hash the provided artifact.
    pub fn new(artifact: BuildArtifact) -> Self {
        let digest = digest(&artifact);

        Self {
            digest,
            content: artifact.content,
        }
    }

    /// File path relative to the build root.
    pub fn path(&self) -> &str {
        &self.digest.relative_path
    }
}
