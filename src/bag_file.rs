use crate::{Algorithm, Checksum, KeyValueCollection};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Role a file plays inside a bag, derived from its path relative to the
/// bag root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Content file under `data/`
    Payload,
    /// `manifest-<algorithm>.txt` at the bag root
    PayloadManifest,
    /// `tagmanifest-<algorithm>.txt` at the bag root
    TagManifest,
    /// Any other file (`bagit.txt`, `bag-info.txt`, ...)
    TagFile,
}

impl FileType {
    /// Classify a path relative to the bag root.
    pub fn classify(dest_path: &str) -> FileType {
        if dest_path == "data" || dest_path.starts_with("data/") {
            return FileType::Payload;
        }
        if manifest_algorithm(dest_path, "tagmanifest-").is_some() {
            return FileType::TagManifest;
        }
        if manifest_algorithm(dest_path, "manifest-").is_some() {
            return FileType::PayloadManifest;
        }
        FileType::TagFile
    }
}

/// Algorithm name from a `<prefix><algorithm>.txt` file name at the bag
/// root, or `None` if the name does not match.
pub(crate) fn manifest_algorithm<'a>(dest_path: &'a str, prefix: &str) -> Option<&'a str> {
    if dest_path.contains('/') {
        return None;
    }
    let algorithm = dest_path.strip_prefix(prefix)?.strip_suffix(".txt")?;
    if algorithm.is_empty()
        || !algorithm
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }
    Some(algorithm)
}

/// Best-effort file attributes, carried into tar headers.
#[derive(Debug, Clone, Copy)]
pub struct FileMeta {
    pub mode: u32,
    pub uid: u64,
    pub gid: u64,
    /// Seconds since the Unix epoch
    pub mtime: u64,
}

impl Default for FileMeta {
    fn default() -> Self {
        Self {
            mode: 0o644,
            uid: 0,
            gid: 0,
            mtime: 0,
        }
    }
}

impl FileMeta {
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Self {
                mode: metadata.mode() & 0o7777,
                uid: metadata.uid() as u64,
                gid: metadata.gid() as u64,
                mtime: metadata.mtime().max(0) as u64,
            }
        }
        #[cfg(not(unix))]
        {
            let mtime = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);
            Self {
                mtime,
                ..Self::default()
            }
        }
    }
}

/// One file's identity inside a bag: where it came from, where it sits in
/// the bag, what role it plays, and the digests collected over its content.
#[derive(Debug)]
pub struct BagItFile {
    /// Original location on disk, or the tar entry name when read from an
    /// archive
    pub source_path: PathBuf,
    /// Path relative to the bag root, `/`-separated
    pub dest_path: String,
    pub file_type: FileType,
    pub size_bytes: u64,
    pub meta: FileMeta,
    /// Populated incrementally as the content stream is consumed
    pub checksums: BTreeMap<Algorithm, Checksum<'static>>,
    /// Parsed entries, populated only for manifests and tag files during
    /// validation
    pub parsed: Option<KeyValueCollection>,
}

impl BagItFile {
    pub fn new(source_path: impl AsRef<Path>, dest_path: impl Into<String>) -> Self {
        let dest_path = dest_path.into();
        let file_type = FileType::classify(&dest_path);
        Self {
            source_path: source_path.as_ref().to_path_buf(),
            dest_path,
            file_type,
            size_bytes: 0,
            meta: FileMeta::default(),
            checksums: BTreeMap::new(),
            parsed: None,
        }
    }

    pub fn checksum(&self, algorithm: Algorithm) -> Option<&Checksum<'static>> {
        self.checksums.get(&algorithm)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classify_payload() {
        assert_eq!(FileType::classify("data/x"), FileType::Payload);
        assert_eq!(FileType::classify("data/sub/deep/file.bin"), FileType::Payload);
        assert_eq!(FileType::classify("data"), FileType::Payload);
    }

    #[test]
    fn classify_manifests() {
        assert_eq!(
            FileType::classify("manifest-sha256.txt"),
            FileType::PayloadManifest
        );
        assert_eq!(
            FileType::classify("manifest-md5.txt"),
            FileType::PayloadManifest
        );
        assert_eq!(
            FileType::classify("tagmanifest-md5.txt"),
            FileType::TagManifest
        );
        assert_eq!(
            FileType::classify("tagmanifest-sha512.txt"),
            FileType::TagManifest
        );
    }

    #[test]
    fn classify_tag_files() {
        assert_eq!(FileType::classify("bag-info.txt"), FileType::TagFile);
        assert_eq!(FileType::classify("bagit.txt"), FileType::TagFile);
        // Not at the bag root, so not a manifest
        assert_eq!(
            FileType::classify("misc/manifest-sha256.txt"),
            FileType::TagFile
        );
        // Malformed algorithm segments
        assert_eq!(FileType::classify("manifest-.txt"), FileType::TagFile);
        assert_eq!(FileType::classify("manifest-sha 256.txt"), FileType::TagFile);
        assert_eq!(FileType::classify("manifest-sha256.csv"), FileType::TagFile);
        // Payload prefix must be a whole path segment
        assert_eq!(FileType::classify("database.txt"), FileType::TagFile);
    }
}
