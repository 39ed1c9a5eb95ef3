use crate::bag_file::{manifest_algorithm, BagItFile, FileType};
use crate::checksum::DigestPipeline;
use crate::events::{BagEvent, EventSender};
use crate::parse::StreamParser;
use crate::profile::{BagItProfile, Serialization, BAGIT_TXT, TAG_VERSION};
use crate::{Algorithm, OperationResult};
use futures::StreamExt;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

const READ_CHUNK: usize = 32 * 1024;

/// Unrecoverable problems that stop a validation run. Structural and
/// content findings are never errors of this type; they accumulate in the
/// result's ordered list instead.
#[derive(thiserror::Error, Debug)]
pub enum ValidateError {
    #[error("Bag not found at `{0}`")]
    NotFound(PathBuf),
    #[error("Failed to open bag: {0}")]
    Open(io::ErrorKind),
    #[error("Failed to read archive: {0}")]
    ReadArchive(io::ErrorKind),
    #[error("Failed to read `{path}` from bag: {kind}")]
    ReadFile { path: String, kind: io::ErrorKind },
    #[error("Failed to walk bag directory: {0}")]
    Walk(io::ErrorKind),
}

/// Everything observed while streaming the bag once.
#[derive(Debug, Default)]
struct ReadState {
    files: Vec<BagItFile>,
    structural_errors: Vec<String>,
    /// Once the tar folder-name invariant is broken there is no point
    /// hashing the rest of the archive
    skip_checksums: bool,
    top_level_dirs: Vec<String>,
    was_tar: bool,
}

/// Validation engine: streams a bag (tar archive or directory), classifies
/// and checksums every entry, then cross-checks manifests against the
/// observed file set and the profile's requirements.
pub struct Validator {
    bag_path: PathBuf,
    profile: BagItProfile,
    events: EventSender,
}

impl Validator {
    pub fn new(bag_path: impl AsRef<Path>, profile: BagItProfile) -> Self {
        Self {
            bag_path: bag_path.as_ref().to_path_buf(),
            profile,
            events: EventSender::default(),
        }
    }

    /// Subscribe to progress events. Call before [`Validator::run`].
    pub fn subscribe(&mut self) -> tokio::sync::mpsc::UnboundedReceiver<BagEvent> {
        self.events.subscribe()
    }

    /// Validate the bag. The bag is valid iff the returned result's error
    /// list is empty; every finding is reported, none are collapsed.
    pub async fn run(mut self) -> OperationResult {
        let mut result = OperationResult::new("validation", "bagit_engine");
        result.start();
        result.filepath = Some(self.bag_path.clone());

        self.events
            .start(format!("Validating {}", self.bag_path.display()));
        info!(bag = %self.bag_path.display(), "validation started");

        match self.execute().await {
            Ok((errors, filesize)) => {
                result.filesize = filesize;
                for error in errors {
                    result.add_error(error);
                }
            }
            Err(error) => {
                self.events.error(error.to_string());
                result.add_error(error.to_string());
            }
        }

        result.finish();
        info!(
            valid = result.succeeded,
            errors = result.errors.len(),
            "validation finished"
        );
        self.events.completed(
            result.succeeded,
            if result.succeeded {
                "Bag is valid"
            } else {
                "Bag is not valid"
            },
        );
        result
    }

    async fn execute(&mut self) -> Result<(Vec<String>, u64), ValidateError> {
        let metadata = fs::metadata(&self.bag_path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ValidateError::NotFound(self.bag_path.clone())
            } else {
                ValidateError::Open(e.kind())
            }
        })?;

        let state = if metadata.is_dir() {
            self.read_directory().await?
        } else {
            self.read_tar().await?
        };
        debug!(files = state.files.len(), "reading phase complete");

        let mut errors = state.structural_errors.clone();
        // A structurally broken archive was not fully checksummed; the
        // cross-check would only pile on misleading findings.
        if !state.skip_checksums {
            errors.extend(self.cross_check(&state));
        }

        Ok((errors, metadata.len()))
    }

    /// Stream every entry out of a tar bag. Every entry name must live
    /// under a single top-level folder matching the bag name.
    async fn read_tar(&mut self) -> Result<ReadState, ValidateError> {
        let bag_name = self
            .bag_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string();

        let file = fs::File::open(&self.bag_path)
            .await
            .map_err(|e| ValidateError::Open(e.kind()))?;
        let mut archive = tokio_tar::Archive::new(file);
        let mut entries = archive
            .entries()
            .map_err(|e| ValidateError::ReadArchive(e.kind()))?;

        let mut state = ReadState {
            was_tar: true,
            ..ReadState::default()
        };

        while let Some(next) = entries.next().await {
            let mut entry = match next {
                Ok(entry) => entry,
                Err(e) => {
                    // Malformed header: report and stop reading, the rest
                    // of the archive cannot be framed reliably
                    state
                        .structural_errors
                        .push(format!("Unreadable archive entry: {e}"));
                    state.skip_checksums = true;
                    break;
                }
            };

            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let name = name.trim_end_matches('/').to_string();
            if name.is_empty() {
                continue;
            }

            let (top, dest) = match name.split_once('/') {
                Some((top, rest)) => (top.to_string(), rest.to_string()),
                None => (name.clone(), String::new()),
            };
            let is_dir = entry.header().entry_type().is_dir();

            if top != bag_name {
                if !state.skip_checksums {
                    state.structural_errors.push(format!(
                        "Archive must untar to a single directory named '{bag_name}', found top-level entry '{top}'."
                    ));
                    state.skip_checksums = true;
                    warn!(found = %top, expected = %bag_name, "tar folder-name invariant broken");
                }
                continue;
            }

            if is_dir {
                if !dest.is_empty() && !dest.contains('/') {
                    state.top_level_dirs.push(dest);
                }
                continue;
            }
            if dest.is_empty() {
                state.structural_errors.push(format!(
                    "Archive must untar to a single directory named '{bag_name}', found top-level entry '{top}'."
                ));
                state.skip_checksums = true;
                continue;
            }
            if let Some((dir, _)) = dest.split_once('/') {
                if !state.top_level_dirs.iter().any(|d| d == dir) {
                    state.top_level_dirs.push(dir.to_string());
                }
            }

            if state.skip_checksums {
                continue;
            }

            let mut file = BagItFile::new(PathBuf::from(&name), dest);
            file.size_bytes = entry.header().size().unwrap_or(0);

            let algorithms = self.algorithms_for(file.file_type);
            let parser = parser_for(&file);
            consume_entry(&mut entry, &mut file, &algorithms, parser)
                .await
                .map_err(|e| ValidateError::ReadFile {
                    path: file.dest_path.clone(),
                    kind: e.kind(),
                })?;

            self.events.checksum(&file.dest_path);
            state.files.push(file);
        }

        Ok(state)
    }

    /// Walk an unserialized bag directory with semantics equivalent to the
    /// tar path: same classification, hashing and parsing per entry.
    async fn read_directory(&mut self) -> Result<ReadState, ValidateError> {
        let mut state = ReadState::default();
        let root = self.bag_path.clone();

        let mut stack = vec![root.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| ValidateError::Walk(e.kind()))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| ValidateError::Walk(e.kind()))?
            {
                let path = entry.path();
                let metadata = entry
                    .metadata()
                    .await
                    .map_err(|e| ValidateError::Walk(e.kind()))?;

                let dest = path
                    .strip_prefix(&root)
                    .unwrap_or(&path)
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");

                if metadata.is_dir() {
                    if !dest.contains('/') {
                        state.top_level_dirs.push(dest);
                    }
                    stack.push(path);
                    continue;
                }

                let mut file = BagItFile::new(&path, dest);
                file.size_bytes = metadata.len();

                let algorithms = self.algorithms_for(file.file_type);
                let parser = parser_for(&file);
                let mut reader = fs::File::open(&path).await.map_err(|e| {
                    ValidateError::ReadFile {
                        path: file.dest_path.clone(),
                        kind: e.kind(),
                    }
                })?;
                consume_entry(&mut reader, &mut file, &algorithms, parser)
                    .await
                    .map_err(|e| ValidateError::ReadFile {
                        path: file.dest_path.clone(),
                        kind: e.kind(),
                    })?;

                self.events.checksum(&file.dest_path);
                state.files.push(file);
            }
        }

        Ok(state)
    }

    fn algorithms_for(&self, file_type: FileType) -> Vec<Algorithm> {
        match file_type {
            FileType::Payload => self.profile.manifests_required.clone(),
            FileType::TagFile | FileType::PayloadManifest => {
                self.profile.tag_manifests_required.clone()
            }
            // Nothing cross-checks a tag-manifest's own digests
            FileType::TagManifest => Vec::new(),
        }
    }

    /// Cross-checking phase: manifests against observed files and digests,
    /// then the profile's structural and tag requirements.
    fn cross_check(&self, state: &ReadState) -> Vec<String> {
        let mut errors = Vec::new();
        let files = &state.files;

        // Required manifests must exist
        for algorithm in &self.profile.manifests_required {
            let name = format!("manifest-{algorithm}.txt");
            if !files.iter().any(|f| f.dest_path == name) {
                errors.push(format!("Bag is missing required manifest {name}."));
            }
        }
        for algorithm in &self.profile.tag_manifests_required {
            let name = format!("tagmanifest-{algorithm}.txt");
            if !files.iter().any(|f| f.dest_path == name) {
                errors.push(format!("Bag is missing required tag-manifest {name}."));
            }
        }

        // Manifests present must be allowed
        if !self.profile.manifests_allowed.is_empty() {
            let allowed: Vec<String> = self
                .profile
                .manifests_allowed
                .iter()
                .map(|a| format!("manifest-{a}.txt"))
                .collect();
            for file in files.iter().filter(|f| f.file_type == FileType::PayloadManifest) {
                if !allowed.iter().any(|name| *name == file.dest_path) {
                    errors.push(format!(
                        "Bag contains manifest {} which is not in the list of allowed manifests.",
                        file.dest_path
                    ));
                }
            }
        }
        if !self.profile.tag_manifests_allowed.is_empty() {
            let allowed: Vec<String> = self
                .profile
                .tag_manifests_allowed
                .iter()
                .map(|a| format!("tagmanifest-{a}.txt"))
                .collect();
            for file in files.iter().filter(|f| f.file_type == FileType::TagManifest) {
                if !allowed.iter().any(|name| *name == file.dest_path) {
                    errors.push(format!(
                        "Bag contains tag-manifest {} which is not in the list of allowed tag-manifests.",
                        file.dest_path
                    ));
                }
            }
        }

        let payload: Vec<&BagItFile> = files
            .iter()
            .filter(|f| f.file_type == FileType::Payload)
            .collect();
        let tag_targets: Vec<&BagItFile> = files
            .iter()
            .filter(|f| {
                f.file_type == FileType::TagFile || f.file_type == FileType::PayloadManifest
            })
            .collect();

        // Payload manifests against payload files, both directions
        for manifest in files.iter().filter(|f| f.file_type == FileType::PayloadManifest) {
            self.check_manifest(manifest, "manifest-", &payload, true, &mut errors);
        }
        // Tag-manifests against tag files and payload manifests
        for manifest in files.iter().filter(|f| f.file_type == FileType::TagManifest) {
            self.check_manifest(manifest, "tagmanifest-", &tag_targets, false, &mut errors);
        }

        self.check_tags(files, &mut errors);
        self.check_structure(state, &mut errors);

        errors
    }

    /// One manifest, both directions: every listed path must exist with a
    /// matching digest, and every observed candidate must be listed.
    fn check_manifest(
        &self,
        manifest: &BagItFile,
        prefix: &str,
        candidates: &[&BagItFile],
        is_payload: bool,
        errors: &mut Vec<String>,
    ) {
        let observed: HashMap<&str, &BagItFile> = candidates
            .iter()
            .map(|f| (f.dest_path.as_str(), *f))
            .collect();
        let algorithm: Option<Algorithm> = manifest_algorithm(&manifest.dest_path, prefix)
            .and_then(|name| name.parse().ok());
        let Some(entries) = &manifest.parsed else {
            return;
        };
        let manifest_name = &manifest.dest_path;

        for path in entries.keys() {
            let Some(listed_digest) = entries.first(path) else {
                continue;
            };
            match observed.get(path) {
                None => {
                    if is_payload {
                        errors.push(format!(
                            "File {path} in {manifest_name} is missing from payload."
                        ));
                    } else {
                        errors.push(format!(
                            "File {path} in {manifest_name} is missing from bag."
                        ));
                    }
                }
                Some(file) => {
                    let computed = algorithm.and_then(|a| file.checksum(a));
                    if let Some(computed) = computed {
                        if computed.as_ref() != listed_digest {
                            errors.push(format!(
                                "Checksum for '{path}': expected {listed_digest}, got {computed}."
                            ));
                        }
                    }
                }
            }
        }

        for file in candidates {
            if !entries.contains(&file.dest_path) {
                let path = &file.dest_path;
                if is_payload {
                    errors.push(format!(
                        "Payload file {path} not found in {manifest_name}."
                    ));
                } else {
                    errors.push(format!("File {path} not found in {manifest_name}."));
                }
            }
        }
    }

    /// Profile-driven tag checks: required tag files and tags, empty
    /// values, allowed values, allowed tag files, accepted BagIt version.
    fn check_tags(&self, files: &[BagItFile], errors: &mut Vec<String>) {
        let tag_files: HashMap<&str, &BagItFile> = files
            .iter()
            .filter(|f| f.file_type == FileType::TagFile)
            .map(|f| (f.dest_path.as_str(), f))
            .collect();

        let mut missing_tag_files: Vec<&str> = Vec::new();
        for tag in &self.profile.tags {
            let Some(file) = tag_files.get(tag.tag_file.as_str()) else {
                if tag.required && !missing_tag_files.contains(&tag.tag_file.as_str()) {
                    missing_tag_files.push(&tag.tag_file);
                    errors.push(format!("Required tag file {} is missing.", tag.tag_file));
                }
                continue;
            };
            let Some(parsed) = &file.parsed else {
                continue;
            };

            match parsed.all(&tag.tag_name) {
                None => {
                    if tag.required {
                        errors.push(format!(
                            "Required tag {} is missing from {}.",
                            tag.tag_name, tag.tag_file
                        ));
                    }
                }
                Some(values) => {
                    for value in values {
                        if value.is_empty() && !tag.empty_ok {
                            errors.push(format!(
                                "Value for tag {} in {} is empty.",
                                tag.tag_name, tag.tag_file
                            ));
                        } else if !tag.allowed_values.is_empty()
                            && !tag.allowed_values.iter().any(|v| v == value)
                        {
                            errors.push(format!(
                                "Tag {} in {} has value '{}' which is not in the list of allowed values.",
                                tag.tag_name, tag.tag_file, value
                            ));
                        }
                    }
                }
            }
        }

        // Accepted BagIt versions
        if !self.profile.accepted_bagit_versions.is_empty() {
            if let Some(bagit) = tag_files.get(BAGIT_TXT) {
                if let Some(parsed) = &bagit.parsed {
                    if let Some(version) = parsed.first(TAG_VERSION) {
                        if !self
                            .profile
                            .accepted_bagit_versions
                            .iter()
                            .any(|v| v == version)
                        {
                            errors.push(format!(
                                "BagIt-Version {version} is not in the list of accepted versions."
                            ));
                        }
                    }
                }
            }
        }

        // Allowed tag files
        for file in files.iter().filter(|f| f.file_type == FileType::TagFile) {
            if !self.profile.tag_file_allowed(&file.dest_path) {
                errors.push(format!(
                    "Tag file {} is not in the list of allowed tag files.",
                    file.dest_path
                ));
            }
        }
    }

    /// Serialization rule and top-level layout checks.
    fn check_structure(&self, state: &ReadState, errors: &mut Vec<String>) {
        if state.was_tar {
            if self.profile.serialization == Serialization::Forbidden {
                errors.push("Profile forbids serialization but bag is a tar archive.".to_string());
            } else if !self.profile.accepted_serializations.is_empty()
                && !self.profile.accepts_tar()
            {
                errors.push(
                    "Bag serialization application/tar is not in the list of accepted serializations."
                        .to_string(),
                );
            }
        } else if self.profile.requires_tar() {
            errors.push(
                "Profile requires serialization as application/tar but bag is a directory."
                    .to_string(),
            );
        }

        for dir in &state.top_level_dirs {
            if dir == "data" {
                continue;
            }
            // A directory is expected when some allowed tag-file pattern
            // lives under it
            let allowed = self.profile.tag_files_allowed.iter().any(|pattern| {
                pattern == "*" || pattern.starts_with(&format!("{dir}/"))
            });
            if !allowed {
                errors.push(format!(
                    "Bag contains unexpected top-level directory '{dir}'."
                ));
            }
        }
    }
}

fn parser_for(file: &BagItFile) -> Option<StreamParser> {
    match file.file_type {
        FileType::PayloadManifest | FileType::TagManifest => Some(StreamParser::manifest()),
        FileType::TagFile if file.dest_path.ends_with(".txt") => Some(StreamParser::tag_file()),
        _ => None,
    }
}

/// Single read pass over one entry: hash every chunk, and feed the same
/// chunks to the line parser when the entry is a manifest or tag file.
async fn consume_entry<R: AsyncRead + Unpin>(
    reader: &mut R,
    file: &mut BagItFile,
    algorithms: &[Algorithm],
    parser: Option<StreamParser>,
) -> io::Result<()> {
    let mut pipeline = DigestPipeline::new(algorithms);
    let mut parser = parser;
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        pipeline.update(&buf[..n]);
        if let Some(parser) = parser.as_mut() {
            parser.feed(&buf[..n]);
        }
    }

    file.checksums = pipeline.finalize();
    if let Some(parser) = parser {
        file.parsed = Some(parser.finish());
    }
    Ok(())
}
