use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use crc32fast::Hasher as Crc32;
use md5::{Digest as Md5Digest, Md5};
use sha1_smol::Sha1;
use sha2::Sha256;

use crate::cancel::CancelToken;
use crate::error::{Result, VerifyError};
use crate::types::DigestAlgorithm;

const STREAM_CHUNK_SIZE: usize = 512 * 1024;

enum Hasher {
    Crc32(Crc32),
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
}

impl Hasher {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Crc32 => Hasher::Crc32(Crc32::new()),
            DigestAlgorithm::Md5 => Hasher::Md5(Md5::new()),
            DigestAlgorithm::Sha1 => Hasher::Sha1(Sha1::new()),
            DigestAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, slice: &[u8]) {
        match self {
            Hasher::Crc32(h) => h.update(slice),
            Hasher::Md5(h) => h.update(slice),
            Hasher::Sha1(h) => h.update(slice),
            Hasher::Sha256(h) => h.update(slice),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Hasher::Crc32(h) => h.finalize().to_be_bytes().to_vec(),
            Hasher::Md5(h) => h.finalize().to_vec(),
            Hasher::Sha1(h) => h.digest().bytes().to_vec(),
            Hasher::Sha256(h) => h.finalize().to_vec(),
        }
    }
}

/// Stream `reader` through `algorithm`, checking `cancel` before every chunk.
///
/// `on_chunk` receives the byte count of each chunk as it is consumed. Read
/// errors are reported against `origin`.
pub fn digest_reader<R, F>(
    mut reader: R,
    algorithm: DigestAlgorithm,
    cancel: &CancelToken,
    origin: &Path,
    mut on_chunk: F,
) -> Result<Vec<u8>>
where
    R: Read,
    F: FnMut(u64),
{
    let mut hasher = Hasher::new(algorithm);
    let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
    loop {
        cancel.check()?;
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(VerifyError::io(origin, e)),
        };
        hasher.update(&buf[..n]);
        on_chunk(n as u64);
    }
    Ok(hasher.finalize())
}

pub fn digest_file<F>(
    path: &Path,
    algorithm: DigestAlgorithm,
    cancel: &CancelToken,
    on_chunk: F,
) -> Result<Vec<u8>>
where
    F: FnMut(u64),
{
    cancel.check()?;
    let file = File::open(path).map_err(|e| VerifyError::io(path, e))?;
    digest_reader(file, algorithm, cancel, path, on_chunk)
}

pub fn digest_bytes(buf: &[u8], algorithm: DigestAlgorithm) -> Vec<u8> {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(buf);
    hasher.finalize()
}

/// An absent expected digest never matches.
pub fn digests_match(local: &[u8], expected: Option<&[u8]>) -> bool {
    expected.is_some_and(|e| e == local)
}
