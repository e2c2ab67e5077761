use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use sha2::{Digest, Sha256};

use crate::storage::ObjectMetadata;

const HASH_CHUNK_SIZE: usize = 8192;
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const CONTENT_TYPES: &[(&str, &str)] = &[
    ("dmg", "application/x-apple-diskimage"),
    ("exe", "application/x-msdownload"),
    ("msi", "application/x-msi"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tgz", "application/gzip"),
    ("json", "application/json"),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Platform {
    #[value(name = "macos")]
    MacOs,
    #[value(name = "windows")]
    Windows,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::MacOs => "macos",
            Platform::Windows => "windows",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Arch {
    #[value(name = "arm64")]
    Arm64,
    #[value(name = "x64")]
    X64,
}

impl Arch {
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::Arm64 => "arm64",
            Arch::X64 => "x64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one invocation publishes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRequest {
    pub file: PathBuf,
    pub version: String,
    pub platform: Platform,
    pub arch: Arch,
    pub signed: bool,
    /// Only recorded for macOS builds.
    pub notarized: bool,
    pub commit_sha: Option<String>,
    /// Prefix of the "latest" file name, e.g. `Ami-latest-macos-arm64.dmg`.
    pub product_name: String,
}

impl UploadRequest {
    /// `{platform}-{arch}`, used as a key segment and as the manifest entry name.
    pub fn platform_arch(&self) -> String {
        format!("{}-{}", self.platform, self.arch)
    }

    pub fn file_name(&self) -> String {
        file_name(&self.file)
    }

    /// Metadata attached to both uploads of the artifact.
    pub fn object_metadata(&self, digest: &FileDigest, build_date: &str) -> ObjectMetadata {
        let mut metadata = ObjectMetadata::new();
        metadata.insert("version".into(), self.version.clone());
        metadata.insert("platform".into(), self.platform.to_string());
        metadata.insert("arch".into(), self.arch.to_string());
        metadata.insert("build-date".into(), build_date.to_owned());
        metadata.insert("sha256".into(), digest.sha256.clone());
        metadata.insert("signed".into(), self.signed.to_string());
        if self.platform == Platform::MacOs {
            metadata.insert("notarized".into(), self.notarized.to_string());
        }
        if let Some(sha) = self.commit_sha.as_deref().filter(|sha| !sha.is_empty()) {
            metadata.insert("commit-sha".into(), sha.to_owned());
        }
        metadata
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileDigest {
    pub sha256: String,
    pub size: u64,
}

/// Hash a file with SHA-256, reading it in fixed-size chunks.
pub fn hash_file(path: &Path) -> io::Result<FileDigest> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_CHUNK_SIZE];
    let mut size = 0u64;
    loop {
        let read = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&buf[..read]);
        size += read as u64;
    }
    Ok(FileDigest {
        sha256: format!("{:x}", hasher.finalize()),
        size,
    })
}

/// The two locations every artifact is written to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectKeys {
    /// Permanent: `releases/v{version}/{platform}-{arch}/{file name}`.
    pub versioned: String,
    /// Moving pointer: `releases/latest/{platform}-{arch}/{product}-latest-{platform}-{arch}{ext}`.
    pub latest: String,
}

impl ObjectKeys {
    pub fn for_request(request: &UploadRequest) -> Self {
        let platform_arch = request.platform_arch();
        let versioned = format!(
            "releases/v{}/{}/{}",
            request.version,
            platform_arch,
            request.file_name()
        );
        let latest = format!(
            "releases/latest/{platform_arch}/{}-latest-{platform_arch}{}",
            request.product_name,
            dotted_extension(&request.file)
        );
        Self { versioned, latest }
    }
}

/// MIME type for a file name, by extension only.
pub fn content_type(file_name: &str) -> &'static str {
    let Some(ext) = Path::new(file_name).extension().and_then(|ext| ext.to_str()) else {
        return DEFAULT_CONTENT_TYPE;
    };
    CONTENT_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map_or(DEFAULT_CONTENT_TYPE, |&(_, mime)| mime)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) fn sample_request(file: PathBuf) -> UploadRequest {
    UploadRequest {
        file,
        version: "1.1.0".into(),
        platform: Platform::MacOs,
        arch: Arch::Arm64,
        signed: false,
        notarized: true,
        commit_sha: None,
        product_name: "Ami".into(),
    }
}
