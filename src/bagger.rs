mod target;

use crate::bag_file::{BagItFile, FileMeta, FileType};
use crate::checksum::DigestPipeline;
use crate::events::{BagEvent, EventSender};
use crate::profile::{
    BagItProfile, BAG_INFO_TXT, TAG_BAGGING_DATE, TAG_BAG_SIZE, TAG_OXUM,
};
use crate::{Algorithm, OperationResult};
use futures::StreamExt;
use std::io;
use std::path::{Path, PathBuf};
use target::BagTarget;
use tokio::fs;
use tracing::{debug, info};

/// Bounded concurrency for directory-target payload copies. Tar targets are
/// always single-writer.
const MAX_CONCURRENT_COPIES: usize = 4;

/// File names never worth preserving
const JUNK_FILES: [&str; 3] = [".DS_Store", "Thumbs.db", "desktop.ini"];

#[derive(thiserror::Error, Debug)]
pub enum BagError {
    #[error("Failed to read source `{path}`: {kind}")]
    ReadSource { path: PathBuf, kind: io::ErrorKind },
    #[error("Failed to create bag target `{path}`: {kind}")]
    InitTarget { path: PathBuf, kind: io::ErrorKind },
    #[error("Failed to write `{path}` into bag: {kind}")]
    WriteTarget { path: String, kind: io::ErrorKind },
    #[error("Source paths `{first}` and `{second}` both map to {dest} in the bag.")]
    DestinationCollision {
        first: PathBuf,
        second: PathBuf,
        dest: String,
    },
    #[error("Failed to finalize bag: {0}")]
    Finalize(io::ErrorKind),
}

/// What to package: source files, where the bag goes, per-run filters.
#[derive(Debug, Clone)]
pub struct BagJob {
    /// Files and directories to place under `data/`
    pub source_paths: Vec<PathBuf>,
    /// Output directory, or a `.tar` path for a serialized bag
    pub output_path: PathBuf,
    /// Bag name; defaults to the output path's file stem
    pub bag_name: Option<String>,
    /// Skip dotfiles and dot-directories
    pub skip_hidden: bool,
    /// Skip OS junk files (`.DS_Store`, `Thumbs.db`, ...)
    pub skip_junk: bool,
}

impl BagJob {
    pub fn new(source_paths: Vec<PathBuf>, output_path: impl AsRef<Path>) -> Self {
        Self {
            source_paths,
            output_path: output_path.as_ref().to_path_buf(),
            bag_name: None,
            skip_hidden: false,
            skip_junk: true,
        }
    }

    /// Does the output path name a tar archive?
    pub fn is_tar_target(&self) -> bool {
        self.output_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("tar"))
            .unwrap_or(false)
    }

    pub fn bag_name(&self) -> String {
        if let Some(name) = &self.bag_name {
            return name.clone();
        }
        self.output_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("bag")
            .to_string()
    }

    /// Pre-flight checks; no filesystem writes happen before these pass.
    fn validate(&self, profile: &BagItProfile) -> Vec<String> {
        let mut errors = Vec::new();

        if self.source_paths.is_empty() {
            errors.push("Job has no source files.".to_string());
        }
        for source in &self.source_paths {
            if !source.exists() {
                errors.push(format!("Source path {} does not exist.", source.display()));
            }
        }
        if self.output_path.as_os_str().is_empty() {
            errors.push("Job has no output path.".to_string());
        }
        if profile.requires_tar() && !self.is_tar_target() {
            errors.push(
                "Profile requires serialization as application/tar; output path must end in .tar."
                    .to_string(),
            );
        }
        if self.is_tar_target()
            && !profile.accepted_serializations.is_empty()
            && !profile.accepts_tar()
        {
            errors.push(
                "Profile does not accept application/tar serialization.".to_string(),
            );
        }

        errors
    }
}

/// One payload file scheduled for copying.
#[derive(Debug, Clone)]
struct PlannedFile {
    source: PathBuf,
    dest: String,
    size: u64,
    meta: FileMeta,
}

/// Packaging engine: streams a file set into a conformant bag in strict
/// phase order — payload, tag files, payload manifests, tag-manifests,
/// finalize. Each phase drains before the next starts.
pub struct Bagger {
    job: BagJob,
    profile: BagItProfile,
    events: EventSender,
}

impl Bagger {
    pub fn new(job: BagJob, profile: BagItProfile) -> Self {
        Self {
            job,
            profile,
            events: EventSender::default(),
        }
    }

    /// Subscribe to progress events. Call before [`Bagger::run`].
    pub fn subscribe(&mut self) -> tokio::sync::mpsc::UnboundedReceiver<BagEvent> {
        self.events.subscribe()
    }

    /// Build the bag. All outcomes, including pre-flight failures, are
    /// reported through the returned result's ordered error list.
    pub async fn run(mut self) -> OperationResult {
        let mut result = OperationResult::new("bagging", "bagit_engine");
        result.start();

        let mut preflight = self.profile.validate();
        preflight.extend(self.job.validate(&self.profile));
        if !preflight.is_empty() {
            for error in preflight {
                result.add_error(error);
            }
            result.finish();
            self.events
                .completed(false, "Bagging aborted: job failed pre-flight validation");
            return result;
        }

        self.events
            .start(format!("Bagging {}", self.job.output_path.display()));
        info!(output = %self.job.output_path.display(), "bagging started");

        match self.execute().await {
            Ok(payload_bytes) => {
                result.filepath = Some(self.job.output_path.clone());
                result.filesize = if self.job.is_tar_target() {
                    fs::metadata(&self.job.output_path)
                        .await
                        .map(|m| m.len())
                        .unwrap_or(payload_bytes)
                } else {
                    payload_bytes
                };
                result.add_info(format!("Bag written to {}", self.job.output_path.display()));
            }
            Err(error) => {
                self.events.error(error.to_string());
                result.add_error(error.to_string());
            }
        }

        result.finish();
        self.events.completed(
            result.succeeded,
            if result.succeeded {
                "Bagging completed"
            } else {
                "Bagging failed"
            },
        );
        result
    }

    /// Phases 2–7. Returns total payload bytes on success.
    async fn execute(&mut self) -> Result<u64, BagError> {
        let bag_name = self.job.bag_name();
        let planned = self.plan_payload().await?;
        let total_files = planned.len();
        let payload_algorithms = self.profile.manifests_required.clone();
        let tag_algorithms = self.profile.tag_manifests_required.clone();

        let mut target = if self.job.is_tar_target() {
            BagTarget::init_tar(&self.job.output_path, &bag_name).await
        } else {
            BagTarget::init_directory(&self.job.output_path).await
        }
        .map_err(|e| BagError::InitTarget {
            path: self.job.output_path.clone(),
            kind: e.kind(),
        })?;

        // Phase: payload
        let mut files = self
            .copy_payload(&mut target, planned, &payload_algorithms)
            .await?;
        debug!(files = total_files, "payload phase complete");

        // Inject system-managed tags before any tag file is rendered
        let payload_bytes: u64 = files.iter().map(|f| f.size_bytes).sum();
        let payload_count = files.len();
        self.profile.set_tag_value(
            BAG_INFO_TXT,
            TAG_OXUM,
            &format!("{payload_bytes}.{payload_count}"),
        );
        self.profile
            .set_tag_value(BAG_INFO_TXT, TAG_BAG_SIZE, &human_size(payload_bytes));
        self.profile.set_tag_value(
            BAG_INFO_TXT,
            TAG_BAGGING_DATE,
            &jiff::Timestamp::now()
                .to_zoned(jiff::tz::TimeZone::UTC)
                .date()
                .to_string(),
        );

        // Phase: tag files
        for name in self
            .profile
            .tag_file_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
        {
            let content = self.render_tag_file(&name);
            let file = write_generated(&mut target, &name, content.as_bytes(), &tag_algorithms)
                .await?;
            self.events.checksum(&name);
            files.push(file);
        }
        debug!("tag file phase complete");

        // Phase: payload manifests
        for algorithm in &payload_algorithms {
            let name = format!("manifest-{algorithm}.txt");
            let content = manifest_content(&files, &[FileType::Payload], *algorithm);
            let file =
                write_generated(&mut target, &name, content.as_bytes(), &tag_algorithms).await?;
            self.events.checksum(&name);
            files.push(file);
        }
        debug!("payload manifest phase complete");

        // Phase: tag-manifests
        for algorithm in &tag_algorithms {
            let name = format!("tagmanifest-{algorithm}.txt");
            let content = manifest_content(
                &files,
                &[FileType::TagFile, FileType::PayloadManifest],
                *algorithm,
            );
            let file = write_generated(&mut target, &name, content.as_bytes(), &[]).await?;
            self.events.checksum(&name);
            files.push(file);
        }
        debug!("tag-manifest phase complete");

        // Phase: finalize
        target
            .finish()
            .await
            .map_err(|e| BagError::Finalize(e.kind()))?;
        info!(
            payload_bytes,
            payload_count, "bag finalized at {}", self.job.output_path.display()
        );

        Ok(payload_bytes)
    }

    /// Walk the job's sources into a flat copy plan, applying per-run
    /// filters. Directories keep their own name under `data/`.
    async fn plan_payload(&self) -> Result<Vec<PlannedFile>, BagError> {
        let mut planned = Vec::new();

        for source in &self.job.source_paths {
            let read_error = |e: io::Error| BagError::ReadSource {
                path: source.clone(),
                kind: e.kind(),
            };
            let metadata = fs::metadata(source).await.map_err(read_error)?;

            if metadata.is_file() {
                if self.keep(source) {
                    planned.push(PlannedFile {
                        dest: format!("data/{}", file_name(source)),
                        size: metadata.len(),
                        meta: FileMeta::from_metadata(&metadata),
                        source: source.clone(),
                    });
                }
                continue;
            }

            // Directory: recurse, preserving structure relative to the
            // directory's parent so the directory name itself is kept.
            let base = source.parent().map(Path::to_path_buf).unwrap_or_default();
            let mut stack = vec![source.clone()];
            while let Some(dir) = stack.pop() {
                let mut entries = fs::read_dir(&dir).await.map_err(read_error)?;
                while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
                    let path = entry.path();
                    if !self.keep(&path) {
                        continue;
                    }
                    let metadata = entry.metadata().await.map_err(read_error)?;
                    if metadata.is_dir() {
                        stack.push(path);
                        continue;
                    }
                    let relative = path
                        .strip_prefix(&base)
                        .unwrap_or(&path)
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    planned.push(PlannedFile {
                        dest: format!("data/{relative}"),
                        size: metadata.len(),
                        meta: FileMeta::from_metadata(&metadata),
                        source: path,
                    });
                }
            }
        }

        // Stable order regardless of directory read order
        planned.sort_by(|a, b| a.dest.cmp(&b.dest));

        // Two sources landing on one destination would leave the bag
        // disagreeing with its own manifest; refuse before writing anything
        for pair in planned.windows(2) {
            if pair[0].dest == pair[1].dest {
                return Err(BagError::DestinationCollision {
                    first: pair[0].source.clone(),
                    second: pair[1].source.clone(),
                    dest: pair[0].dest.clone(),
                });
            }
        }

        Ok(planned)
    }

    fn keep(&self, path: &Path) -> bool {
        let name = file_name(path);
        if self.job.skip_junk && (JUNK_FILES.contains(&name.as_str()) || name.starts_with("._")) {
            return false;
        }
        if self.job.skip_hidden && name.starts_with('.') {
            return false;
        }
        true
    }

    /// Copy all payload files into the target. Directory targets copy with
    /// bounded concurrency; tar targets append strictly one at a time.
    async fn copy_payload(
        &mut self,
        target: &mut BagTarget,
        planned: Vec<PlannedFile>,
        algorithms: &[Algorithm],
    ) -> Result<Vec<BagItFile>, BagError> {
        let total = planned.len();
        let mut files = Vec::with_capacity(total);

        match target {
            BagTarget::Directory { root } => {
                let root = root.clone();
                let algorithms = algorithms.to_vec();
                let mut stream = futures::stream::iter(planned.into_iter().map(|plan| {
                    let root = root.clone();
                    let algorithms = algorithms.clone();
                    async move { copy_one_into_directory(root, plan, algorithms).await }
                }))
                .buffer_unordered(MAX_CONCURRENT_COPIES);

                while let Some(copied) = stream.next().await {
                    let file = copied?;
                    let dest = file.dest_path.clone();
                    self.events.checksum(&dest);
                    files.push(file);
                    self.events.file_added(&dest, files.len(), total);
                }
                // Completion order is not meaningful; restore plan order
                files.sort_by(|a, b| a.dest_path.cmp(&b.dest_path));
            }
            BagTarget::Tar { .. } => {
                for plan in planned {
                    let pipeline = DigestPipeline::new(algorithms);
                    let pipeline = target
                        .write_file(&plan.dest, &plan.source, plan.size, &plan.meta, pipeline)
                        .await
                        .map_err(|e| BagError::WriteTarget {
                            path: plan.dest.clone(),
                            kind: e.kind(),
                        })?;

                    let mut file = BagItFile::new(&plan.source, plan.dest);
                    file.size_bytes = plan.size;
                    file.meta = plan.meta;
                    file.checksums = pipeline.finalize();
                    let dest = file.dest_path.clone();
                    self.events.checksum(&dest);
                    files.push(file);
                    self.events.file_added(&dest, files.len(), total);
                }
            }
        }

        Ok(files)
    }

    /// Render one tag file: `Tag-Name: value` lines in declaration order.
    fn render_tag_file(&self, name: &str) -> String {
        let mut lines = Vec::new();
        for tag in self.profile.tags_for_file(name) {
            match tag.effective_value() {
                Some(value) => lines.push(format!("{}: {}", tag.tag_name, value)),
                None if tag.empty_ok => lines.push(format!("{}: ", tag.tag_name)),
                None => {}
            }
        }
        let mut content = lines.join("\n");
        content.push('\n');
        content
    }
}

/// Write generated content (tag file or manifest) into the target and
/// return its `BagItFile` with digests for `algorithms`.
async fn write_generated(
    target: &mut BagTarget,
    dest_path: &str,
    bytes: &[u8],
    algorithms: &[Algorithm],
) -> Result<BagItFile, BagError> {
    let meta = FileMeta {
        mtime: now_epoch_seconds(),
        ..FileMeta::default()
    };
    target
        .write_bytes(dest_path, bytes, &meta)
        .await
        .map_err(|e| BagError::WriteTarget {
            path: dest_path.to_string(),
            kind: e.kind(),
        })?;

    let mut file = BagItFile::new(dest_path, dest_path.to_string());
    file.size_bytes = bytes.len() as u64;
    file.meta = meta;
    file.checksums = DigestPipeline::digest(algorithms, bytes);
    Ok(file)
}

async fn copy_one_into_directory(
    root: PathBuf,
    plan: PlannedFile,
    algorithms: Vec<Algorithm>,
) -> Result<BagItFile, BagError> {
    let pipeline = DigestPipeline::new(&algorithms);
    let pipeline = target::copy_into_directory(&root, &plan.dest, &plan.source, pipeline)
        .await
        .map_err(|e| BagError::WriteTarget {
            path: plan.dest.clone(),
            kind: e.kind(),
        })?;

    let mut file = BagItFile::new(&plan.source, plan.dest);
    file.size_bytes = plan.size;
    file.meta = plan.meta;
    file.checksums = pipeline.finalize();
    Ok(file)
}

/// `<digest> <path>` lines for every file matching one of `types`, in
/// current (stable) file order.
fn manifest_content(files: &[BagItFile], types: &[FileType], algorithm: Algorithm) -> String {
    let mut content = String::new();
    for file in files {
        if !types.contains(&file.file_type) {
            continue;
        }
        if let Some(checksum) = file.checksum(algorithm) {
            content.push_str(checksum.as_ref());
            content.push(' ');
            content.push_str(&file.dest_path);
            content.push('\n');
        }
    }
    content
}

/// Human-readable payload size for the `Bag-Size` tag.
pub(crate) fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} bytes");
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.2} {}", UNITS[unit])
}

fn now_epoch_seconds() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::profile::{BAGIT_TXT, TAG_ENCODING, TAG_VERSION};
    use crate::BagItProfile;
    use tokio::io::AsyncReadExt;

    async fn write_sources(dir: &Path) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for (name, content) in [("a.txt", "hello"), ("b.txt", "world"), ("c.txt", "")] {
            let path = dir.join(name);
            fs::write(&path, content).await.unwrap();
            paths.push(path);
        }
        paths
    }

    #[tokio::test]
    async fn three_file_tar_bag_md5() {
        let workdir = tempfile::tempdir().unwrap();
        let sources = write_sources(workdir.path()).await;
        let output = workdir.path().join("sample_bag.tar");

        let profile = BagItProfile::minimal(&[Algorithm::Md5]);
        let bagger = Bagger::new(BagJob::new(sources, &output), profile);
        let result = bagger.run().await;

        assert_eq!(result.errors, Vec::<String>::new());
        assert!(result.succeeded);
        assert_eq!(result.filepath.as_deref(), Some(output.as_path()));
        assert!(result.filesize > 0);

        // Pull the bag apart and check the wire format
        let mut entries = std::collections::BTreeMap::new();
        let archive_file = fs::File::open(&output).await.unwrap();
        let mut archive = tokio_tar::Archive::new(archive_file);
        let mut stream = archive.entries().unwrap();
        while let Some(entry) = StreamExt::next(&mut stream).await {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            let mut content = String::new();
            entry.read_to_string(&mut content).await.unwrap();
            entries.insert(path, content);
        }

        let manifest = &entries["sample_bag/manifest-md5.txt"];
        assert_eq!(manifest.lines().count(), 3);
        assert!(manifest.contains("5d41402abc4b2a76b9719d911017c592 data/a.txt"));
        assert!(manifest.contains("7d793037a0760186574b0282f2f435e7 data/b.txt"));
        assert!(manifest.contains("d41d8cd98f00b204e9800998ecf8427e data/c.txt"));

        let bagit = &entries["sample_bag/bagit.txt"];
        assert!(bagit.contains("BagIt-Version: 0.97"));
        assert!(bagit.contains("Tag-File-Character-Encoding: UTF-8"));

        // 5 + 5 + 0 bytes over 3 files
        let bag_info = &entries["sample_bag/bag-info.txt"];
        assert!(bag_info.contains("Payload-Oxum: 10.3"));
        assert!(bag_info.contains("Bag-Size: 10 bytes"));

        // No tag-manifest algorithm was required
        assert!(!entries.keys().any(|k| k.contains("tagmanifest-")));
    }

    #[tokio::test]
    async fn directory_bag_with_tag_manifest() {
        let workdir = tempfile::tempdir().unwrap();
        let sources = write_sources(workdir.path()).await;
        let output = workdir.path().join("dirbag");

        let mut profile = BagItProfile::minimal(&[Algorithm::Sha256]);
        profile.tag_manifests_required = vec![Algorithm::Sha256];
        let result = Bagger::new(BagJob::new(sources, &output), profile)
            .run()
            .await;
        assert!(result.succeeded, "{:?}", result.errors);

        for name in [
            "bagit.txt",
            "bag-info.txt",
            "manifest-sha256.txt",
            "tagmanifest-sha256.txt",
            "data/a.txt",
            "data/b.txt",
            "data/c.txt",
        ] {
            assert!(output.join(name).is_file(), "missing {name}");
        }

        // Tag-manifest covers tag files and the payload manifest, never itself
        let tagmanifest = fs::read_to_string(output.join("tagmanifest-sha256.txt"))
            .await
            .unwrap();
        assert!(tagmanifest.contains(" bagit.txt"));
        assert!(tagmanifest.contains(" bag-info.txt"));
        assert!(tagmanifest.contains(" manifest-sha256.txt"));
        assert!(!tagmanifest.contains("tagmanifest-sha256.txt"));
    }

    #[tokio::test]
    async fn preflight_failures_touch_nothing() {
        let workdir = tempfile::tempdir().unwrap();
        let output = workdir.path().join("never_built");

        // Empty profile and no sources: everything is wrong at once
        let result = Bagger::new(BagJob::new(vec![], &output), BagItProfile::empty())
            .run()
            .await;

        assert!(!result.succeeded);
        assert!(result.errors.len() >= 4);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn colliding_source_basenames_are_rejected() {
        let workdir = tempfile::tempdir().unwrap();
        for dir in ["p", "q"] {
            fs::create_dir_all(workdir.path().join(dir)).await.unwrap();
        }
        fs::write(workdir.path().join("p/x.txt"), "first contents")
            .await
            .unwrap();
        fs::write(workdir.path().join("q/x.txt"), "second contents")
            .await
            .unwrap();

        let output = workdir.path().join("collision.tar");
        let job = BagJob::new(
            vec![workdir.path().join("p/x.txt"), workdir.path().join("q/x.txt")],
            &output,
        );
        let result = Bagger::new(job, BagItProfile::minimal(&[Algorithm::Md5]))
            .run()
            .await;

        assert!(!result.succeeded);
        assert_eq!(result.errors.len(), 1, "{:?}", result.errors);
        assert!(result.errors[0].contains("data/x.txt"));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn tar_required_profile_rejects_directory_output() {
        let workdir = tempfile::tempdir().unwrap();
        let sources = write_sources(workdir.path()).await;

        let mut profile = BagItProfile::minimal(&[Algorithm::Md5]);
        profile.serialization = crate::profile::Serialization::Required;
        profile.accepted_serializations = vec![crate::profile::TAR_MIME.to_string()];

        let result = Bagger::new(
            BagJob::new(sources, workdir.path().join("plain_dir")),
            profile,
        )
        .run()
        .await;

        assert!(!result.succeeded);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("application/tar"));
    }

    #[tokio::test]
    async fn junk_and_hidden_filters() {
        let workdir = tempfile::tempdir().unwrap();
        let source_dir = workdir.path().join("stuff");
        fs::create_dir_all(source_dir.join("nested")).await.unwrap();
        fs::write(source_dir.join("keep.txt"), "k").await.unwrap();
        fs::write(source_dir.join(".DS_Store"), "junk").await.unwrap();
        fs::write(source_dir.join(".hidden"), "h").await.unwrap();
        fs::write(source_dir.join("nested/inner.txt"), "i")
            .await
            .unwrap();

        let mut job = BagJob::new(vec![source_dir], workdir.path().join("filtered"));
        job.skip_hidden = true;
        let result = Bagger::new(job, BagItProfile::minimal(&[Algorithm::Md5]))
            .run()
            .await;
        assert!(result.succeeded, "{:?}", result.errors);

        let manifest =
            fs::read_to_string(workdir.path().join("filtered/manifest-md5.txt"))
                .await
                .unwrap();
        assert!(manifest.contains("data/stuff/keep.txt"));
        assert!(manifest.contains("data/stuff/nested/inner.txt"));
        assert!(!manifest.contains(".DS_Store"));
        assert!(!manifest.contains(".hidden"));
    }

    #[tokio::test]
    async fn events_are_ordered_and_terminate_once() {
        let workdir = tempfile::tempdir().unwrap();
        let sources = write_sources(workdir.path()).await;

        let mut bagger = Bagger::new(
            BagJob::new(sources, workdir.path().join("events_bag")),
            BagItProfile::minimal(&[Algorithm::Md5]),
        );
        let mut rx = bagger.subscribe();
        let result = bagger.run().await;
        assert!(result.succeeded);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert!(matches!(events.first(), Some(BagEvent::Start { .. })));
        assert!(matches!(
            events.last(),
            Some(BagEvent::Completed {
                succeeded: true,
                ..
            })
        ));
        let terminal_count = events
            .iter()
            .filter(|e| matches!(e, BagEvent::Completed { .. } | BagEvent::Error { .. }))
            .count();
        assert_eq!(terminal_count, 1);
        assert!(events
            .iter()
            .any(|e| matches!(e, BagEvent::FileAdded { path, .. } if path == "data/a.txt")));
    }

    #[test]
    fn human_sizes() {
        assert_eq!(human_size(10), "10 bytes");
        assert_eq!(human_size(1023), "1023 bytes");
        assert_eq!(human_size(1024), "1.00 KB");
        assert_eq!(human_size(1536), "1.50 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn profile_keeps_user_tags_in_declared_file() {
        let mut profile = BagItProfile::minimal(&[Algorithm::Md5]);
        profile.set_tag_value(BAGIT_TXT, TAG_VERSION, "1.0");
        let bagger = Bagger::new(BagJob::new(vec![], "x"), profile);
        let content = bagger.render_tag_file(BAGIT_TXT);
        assert_eq!(
            content,
            format!("{TAG_VERSION}: 1.0\n{TAG_ENCODING}: UTF-8\n")
        );
    }
}
