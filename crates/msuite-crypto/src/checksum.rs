use std::fmt;
use std::io::{self, Read, Write};

/// Default read size for streaming digests (16 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Digest algorithms recognized in fixity entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Md5,
}

impl DigestAlgorithm {
    /// The label used in PREMIS `messageDigestAlgorithm`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
        }
    }

    /// Look up an algorithm by fixity label, ignoring ASCII case.
    pub fn from_label(label: &str) -> Result<Self, ChecksumError> {
        if label.trim().eq_ignore_ascii_case("md5") {
            Ok(Self::Md5)
        } else {
            Err(ChecksumError::UnsupportedAlgorithm(label.to_string()))
        }
    }

    fn start(self) -> StreamHasher {
        match self {
            Self::Md5 => StreamHasher::Md5(md5::Context::new()),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

enum StreamHasher {
    Md5(md5::Context),
}

impl StreamHasher {
    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(ctx) => ctx.consume(data),
        }
    }

    fn finalize(self) -> DigestValue {
        match self {
            Self::Md5(ctx) => DigestValue::from_bytes(&ctx.compute().0),
        }
    }
}

/// A digest as lowercase hex.
///
/// Values taken from metadata are trimmed and lowercased on construction, so
/// comparison is insensitive to how the declaring party cased the hex.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DigestValue(String);

impl DigestValue {
    pub fn new(hex_digest: impl AsRef<str>) -> Self {
        Self(hex_digest.as_ref().trim().to_ascii_lowercase())
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DigestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Streaming digest computation and comparison.
///
/// Reads at most `chunk_size` bytes at a time; the payload is never held in
/// memory as a whole.
#[derive(Clone, Debug)]
pub struct ChecksumVerifier {
    chunk_size: usize,
}

impl ChecksumVerifier {
    pub fn new(chunk_size: usize) -> Result<Self, ChecksumError> {
        if chunk_size == 0 {
            return Err(ChecksumError::ZeroChunkSize);
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Digest everything `reader` yields.
    pub fn digest<R: Read + ?Sized>(
        &self,
        reader: &mut R,
        algorithm: DigestAlgorithm,
    ) -> io::Result<DigestValue> {
        self.digest_into(reader, &mut io::sink(), algorithm)
            .map(|(digest, _)| digest)
    }

    /// Digest everything `reader` yields while copying it into `writer`.
    ///
    /// Returns the digest and the number of bytes copied.
    pub fn digest_into<R: Read + ?Sized, W: Write + ?Sized>(
        &self,
        reader: &mut R,
        writer: &mut W,
        algorithm: DigestAlgorithm,
    ) -> io::Result<(DigestValue, u64)> {
        let mut hasher = algorithm.start();
        let mut buf = vec![0u8; self.chunk_size];
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
            writer.write_all(&buf[..n])?;
            total += n as u64;
        }
        writer.flush()?;
        Ok((hasher.finalize(), total))
    }

    /// `true` when the computed digest equals the declared one.
    pub fn verify(computed: &DigestValue, expected: &DigestValue) -> bool {
        computed == expected
    }
}

impl Default for ChecksumVerifier {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Errors from checksum configuration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,
}
