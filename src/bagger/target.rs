use crate::bag_file::FileMeta;
use crate::checksum::{DigestPipeline, HashingReader};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio_tar::Header;

/// Where a bag is being written: a plain directory or a single tar archive.
///
/// Tar framing is sequential, so all tar writes go through `&mut self` and
/// complete one at a time. Directory copies have no ordering constraint;
/// [`copy_into_directory`] is a free function so the payload phase can run
/// several copies concurrently.
pub(super) enum BagTarget {
    Directory {
        root: PathBuf,
    },
    Tar {
        builder: tokio_tar::Builder<fs::File>,
        bag_name: String,
    },
}

impl BagTarget {
    pub async fn init_directory(root: &Path) -> io::Result<Self> {
        fs::create_dir_all(root.join("data")).await?;
        Ok(BagTarget::Directory {
            root: root.to_path_buf(),
        })
    }

    pub async fn init_tar(output: &Path, bag_name: &str) -> io::Result<Self> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let file = fs::File::create(output).await?;
        Ok(BagTarget::Tar {
            builder: tokio_tar::Builder::new(file),
            bag_name: bag_name.to_string(),
        })
    }

    /// Stream a source file into the bag at `dest_path`, hashing as it goes.
    pub async fn write_file(
        &mut self,
        dest_path: &str,
        source: &Path,
        size: u64,
        meta: &FileMeta,
        pipeline: DigestPipeline,
    ) -> io::Result<DigestPipeline> {
        match self {
            BagTarget::Directory { root } => {
                copy_into_directory(root, dest_path, source, pipeline).await
            }
            BagTarget::Tar { builder, bag_name } => {
                let file = fs::File::open(source).await?;
                let mut reader = HashingReader::new(BufReader::new(file), pipeline);
                let mut header = tar_header(size, meta);
                builder
                    .append_data(&mut header, format!("{bag_name}/{dest_path}"), &mut reader)
                    .await?;
                Ok(reader.into_pipeline())
            }
        }
    }

    /// Write an in-memory buffer (tag file or manifest content) at
    /// `dest_path`. The caller digests the bytes itself.
    pub async fn write_bytes(
        &mut self,
        dest_path: &str,
        bytes: &[u8],
        meta: &FileMeta,
    ) -> io::Result<()> {
        match self {
            BagTarget::Directory { root } => {
                let path = root.join(dest_path);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).await?;
                }
                fs::write(path, bytes).await
            }
            BagTarget::Tar { builder, bag_name } => {
                let mut header = tar_header(bytes.len() as u64, meta);
                builder
                    .append_data(
                        &mut header,
                        format!("{bag_name}/{dest_path}"),
                        std::io::Cursor::new(bytes.to_vec()),
                    )
                    .await
            }
        }
    }

    /// Close the target. For tar this writes the end-of-archive marker and
    /// flushes the file; a directory needs nothing.
    pub async fn finish(self) -> io::Result<()> {
        match self {
            BagTarget::Directory { .. } => Ok(()),
            BagTarget::Tar { builder, .. } => {
                let mut file = builder.into_inner().await?;
                file.flush().await
            }
        }
    }
}

fn tar_header(size: u64, meta: &FileMeta) -> Header {
    let mut header = Header::new_gnu();
    header.set_size(size);
    header.set_mode(meta.mode);
    header.set_uid(meta.uid);
    header.set_gid(meta.gid);
    header.set_mtime(meta.mtime);
    header
}

/// Copy one file into a directory-target bag, hashing as it streams.
/// Safe to run concurrently for distinct `dest_path`s.
pub(super) async fn copy_into_directory(
    root: &Path,
    dest_path: &str,
    source: &Path,
    pipeline: DigestPipeline,
) -> io::Result<DigestPipeline> {
    let target = root.join(dest_path);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }

    let file = fs::File::open(source).await?;
    let mut reader = HashingReader::new(BufReader::new(file), pipeline);
    let mut out = fs::File::create(&target).await?;
    tokio::io::copy(&mut reader, &mut out).await?;
    out.flush().await?;

    Ok(reader.into_pipeline())
}
