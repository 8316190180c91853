//! ---
//! cupang_section: "01-artifact-identity"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Content identity of artifact files."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! Content identity for artifacts.
//!
//! A [`FileHash`] computes md5, sha1, sha256 and sha512 lazily. The first
//! request for any digest computes every digest still missing in one pass over
//! the file, so asking for all four costs a single read.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 4] = [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha512,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        }
    }
}

/// Lowercase hex digests, as stored under `hashes` in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHashes {
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
    pub sha512: Option<String>,
}

impl ContentHashes {
    /// Read a `hashes` mapping. Missing, null and empty digests become `None`.
    pub fn from_value(value: Option<&Value>) -> Self {
        let read = |key: &str| {
            value
                .and_then(|v| v.get(key))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|digest| !digest.is_empty())
                .map(str::to_ascii_lowercase)
        };
        Self {
            md5: read("md5"),
            sha1: read("sha1"),
            sha256: read("sha256"),
            sha512: read("sha512"),
        }
    }

    /// Manifest representation with all four keys, missing digests as null.
    pub fn to_value(&self) -> Value {
        let mut map = Mapping::new();
        for algorithm in HashAlgorithm::ALL {
            let digest = self
                .get(algorithm)
                .map(|d| Value::String(d.to_owned()))
                .unwrap_or(Value::Null);
            map.insert(Value::from(algorithm.as_str()), digest);
        }
        Value::Mapping(map)
    }

    pub fn get(&self, algorithm: HashAlgorithm) -> Option<&str> {
        match algorithm {
            HashAlgorithm::Md5 => self.md5.as_deref(),
            HashAlgorithm::Sha1 => self.sha1.as_deref(),
            HashAlgorithm::Sha256 => self.sha256.as_deref(),
            HashAlgorithm::Sha512 => self.sha512.as_deref(),
        }
    }

    fn slot(&mut self, algorithm: HashAlgorithm) -> &mut Option<String> {
        match algorithm {
            HashAlgorithm::Md5 => &mut self.md5,
            HashAlgorithm::Sha1 => &mut self.sha1,
            HashAlgorithm::Sha256 => &mut self.sha256,
            HashAlgorithm::Sha512 => &mut self.sha512,
        }
    }

    pub fn is_complete(&self) -> bool {
        HashAlgorithm::ALL.iter().all(|a| self.get(*a).is_some())
    }
}

/// Memoising digest calculator for one file.
#[derive(Debug)]
pub struct FileHash {
    path: PathBuf,
    cache: Mutex<ContentHashes>,
}

impl FileHash {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_known_hashes(path, ContentHashes::default())
    }

    /// Seed the cache with digests recorded earlier. They are trusted until
    /// [`FileHash::recompute`] is called.
    pub fn with_known_hashes(path: impl Into<PathBuf>, known: ContentHashes) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(known),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn digest(&self, algorithm: HashAlgorithm) -> io::Result<String> {
        let mut cache = self.cache.lock();
        if let Some(digest) = cache.get(algorithm) {
            return Ok(digest.to_owned());
        }
        compute_missing(&self.path, &mut cache)?;
        cache
            .get(algorithm)
            .map(str::to_owned)
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "digest missing after hashing"))
    }

    pub fn md5(&self) -> io::Result<String> {
        self.digest(HashAlgorithm::Md5)
    }

    pub fn sha1(&self) -> io::Result<String> {
        self.digest(HashAlgorithm::Sha1)
    }

    pub fn sha256(&self) -> io::Result<String> {
        self.digest(HashAlgorithm::Sha256)
    }

    pub fn sha512(&self) -> io::Result<String> {
        self.digest(HashAlgorithm::Sha512)
    }

    /// All four digests.
    pub fn hashes(&self) -> io::Result<ContentHashes> {
        let mut cache = self.cache.lock();
        if !cache.is_complete() {
            compute_missing(&self.path, &mut cache)?;
        }
        Ok(cache.clone())
    }

    /// Drop cached and seeded digests and hash the file again.
    pub fn recompute(&self) -> io::Result<ContentHashes> {
        let mut cache = self.cache.lock();
        *cache = ContentHashes::default();
        compute_missing(&self.path, &mut cache)?;
        Ok(cache.clone())
    }

    /// True when the digest of the file equals `expected` (case-insensitive).
    /// An unreadable file never matches.
    pub fn matches(&self, algorithm: HashAlgorithm, expected: &str) -> bool {
        self.digest(algorithm)
            .map(|digest| digest.eq_ignore_ascii_case(expected.trim()))
            .unwrap_or(false)
    }
}

fn compute_missing(path: &Path, cache: &mut ContentHashes) -> io::Result<()> {
    let mut md5 = cache.md5.is_none().then(Md5::new);
    let mut sha1 = cache.sha1.is_none().then(Sha1::new);
    let mut sha256 = cache.sha256.is_none().then(Sha256::new);
    let mut sha512 = cache.sha512.is_none().then(Sha512::new);

    let mut file = File::open(path)?;
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        let chunk = &buffer[..read];
        if let Some(h) = md5.as_mut() {
            h.update(chunk);
        }
        if let Some(h) = sha1.as_mut() {
            h.update(chunk);
        }
        if let Some(h) = sha256.as_mut() {
            h.update(chunk);
        }
        if let Some(h) = sha512.as_mut() {
            h.update(chunk);
        }
    }

    if let Some(h) = md5 {
        *cache.slot(HashAlgorithm::Md5) = Some(hex::encode(h.finalize()));
    }
    if let Some(h) = sha1 {
        *cache.slot(HashAlgorithm::Sha1) = Some(hex::encode(h.finalize()));
    }
    if let Some(h) = sha256 {
        *cache.slot(HashAlgorithm::Sha256) = Some(hex::encode(h.finalize()));
    }
    if let Some(h) = sha512 {
        *cache.slot(HashAlgorithm::Sha512) = Some(hex::encode(h.finalize()));
    }
    Ok(())
}
