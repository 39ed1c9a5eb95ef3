use crate::algorithm::{Algorithm, Hasher};
use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::{borrow::Cow, fmt::Display};
use tokio::io::{AsyncRead, ReadBuf};

/// Hex-encoded digest of one file under one algorithm
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Checksum<'a>(Cow<'a, str>);

impl From<&[u8]> for Checksum<'_> {
    fn from(value: &[u8]) -> Self {
        Self(Cow::Owned(hex::encode(value)))
    }
}

impl From<Vec<u8>> for Checksum<'_> {
    fn from(value: Vec<u8>) -> Self {
        Self(Cow::Owned(hex::encode(value)))
    }
}

impl<'a> From<&'a str> for Checksum<'a> {
    fn from(value: &'a str) -> Checksum<'a> {
        Self(Cow::Borrowed(value))
    }
}

impl From<String> for Checksum<'_> {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl Display for Checksum<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Checksum<'_> {
    fn as_ref(&self) -> &str {
        match &self.0 {
            Cow::Borrowed(borrowed) => borrowed,
            Cow::Owned(owned) => owned.as_ref(),
        }
    }
}

/// Fans a single byte stream out to one incremental hasher per algorithm.
///
/// Every chunk passed to [`DigestPipeline::update`] reaches every hasher
/// exactly once, in order, so one read pass over a file produces all the
/// digests a profile requires.
#[derive(Debug, Default)]
pub struct DigestPipeline {
    sinks: Vec<(Algorithm, Hasher)>,
}

impl DigestPipeline {
    pub fn new(algorithms: &[Algorithm]) -> Self {
        Self {
            sinks: algorithms
                .iter()
                .map(|algorithm| (*algorithm, Hasher::new(*algorithm)))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for (_, hasher) in &mut self.sinks {
            hasher.update(bytes);
        }
    }

    /// Finalize all hashers into hex digests, keyed by algorithm.
    pub fn finalize(self) -> BTreeMap<Algorithm, Checksum<'static>> {
        self.sinks
            .into_iter()
            .map(|(algorithm, hasher)| (algorithm, Checksum::from(hasher.finalize())))
            .collect()
    }

    /// Digest an in-memory buffer in one shot.
    pub fn digest(
        algorithms: &[Algorithm],
        bytes: &[u8],
    ) -> BTreeMap<Algorithm, Checksum<'static>> {
        let mut pipeline = Self::new(algorithms);
        pipeline.update(bytes);
        pipeline.finalize()
    }
}

/// `AsyncRead` adapter feeding every byte it passes through into a
/// [`DigestPipeline`].
///
/// Used to hash a file while it streams into a tar entry or a directory
/// copy, so the data is read from disk only once.
pub(crate) struct HashingReader<R> {
    inner: R,
    pipeline: DigestPipeline,
}

impl<R> HashingReader<R> {
    pub fn new(inner: R, pipeline: DigestPipeline) -> Self {
        Self { inner, pipeline }
    }

    pub fn into_pipeline(self) -> DigestPipeline {
        self.pipeline
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for HashingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let me = self.get_mut();
        let already_filled = buf.filled().len();
        match Pin::new(&mut me.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                me.pipeline.update(&buf.filled()[already_filled..]);
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compare() {
        let bytes: &[u8; 32] = &[
            214, 211, 134, 26, 157, 177, 72, 1, 68, 222, 226, 175, 114, 10, 93, 79, 34, 48, 98,
            18, 108, 223, 93, 138, 125, 83, 191, 237, 98, 51, 186, 189,
        ];

        let left =
            Checksum::from("d6d3861a9db1480144dee2af720a5d4f223062126cdf5d8a7d53bfed6233babd");
        let right = Checksum::from(bytes.as_ref());
        assert_eq!(left, right);
    }

    #[test]
    fn known_digests() {
        let digests = DigestPipeline::digest(
            &[Algorithm::Md5, Algorithm::Sha256],
            b"hello",
        );
        assert_eq!(
            digests.get(&Algorithm::Md5),
            Some(&Checksum::from("5d41402abc4b2a76b9719d911017c592"))
        );
        assert_eq!(
            digests.get(&Algorithm::Sha256),
            Some(&Checksum::from(
                "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
            ))
        );
    }

    #[test]
    fn chunk_boundaries_do_not_change_digests() {
        let content = b"the quick brown fox jumps over the lazy dog, repeatedly";
        let whole = DigestPipeline::digest(&[Algorithm::Sha256, Algorithm::Md5], content);

        for split in 0..content.len() {
            let mut pipeline = DigestPipeline::new(&[Algorithm::Sha256, Algorithm::Md5]);
            pipeline.update(&content[..split]);
            pipeline.update(&content[split..]);
            assert_eq!(pipeline.finalize(), whole, "split at {split}");
        }
    }

    #[tokio::test]
    async fn hashing_reader_sees_every_byte() {
        use tokio::io::AsyncReadExt;

        let content = b"stream me through the adapter".to_vec();
        let mut reader = HashingReader::new(
            std::io::Cursor::new(content.clone()),
            DigestPipeline::new(&[Algorithm::Sha256]),
        );

        let mut sink = Vec::new();
        reader.read_to_end(&mut sink).await.unwrap();
        assert_eq!(sink, content);

        let digests = reader.into_pipeline().finalize();
        assert_eq!(
            digests,
            DigestPipeline::digest(&[Algorithm::Sha256], &content)
        );
    }
}
