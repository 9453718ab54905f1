//! Interchangeable extract/build back ends.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::Result;
use crate::package::PackageArchive;
use crate::zip::{self, BuildOptions};

use super::fallback::RemoteCompressor;

#[async_trait]
pub trait PackageCodec: Send + Sync {
    async fn extract(&self, data: &[u8]) -> Result<PackageArchive>;

    async fn build(&self, archive: &mut PackageArchive, options: &BuildOptions) -> Result<Vec<u8>>;
}

/// The in-process ZIP codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCodec;

#[async_trait]
impl PackageCodec for LocalCodec {
    async fn extract(&self, data: &[u8]) -> Result<PackageArchive> {
        zip::extract(data)
    }

    async fn build(&self, archive: &mut PackageArchive, options: &BuildOptions) -> Result<Vec<u8>> {
        zip::build(archive, options)
    }
}

/// Delegates both directions to the remote service. The compression level
/// is the service's choice.
pub struct RemoteCodec {
    compressor: RemoteCompressor,
}

impl RemoteCodec {
    pub fn new(compressor: RemoteCompressor) -> Self {
        Self { compressor }
    }
}

#[async_trait]
impl PackageCodec for RemoteCodec {
    async fn extract(&self, data: &[u8]) -> Result<PackageArchive> {
        let files = self.compressor.remote_extract(data).await?;
        let mut archive = PackageArchive::new();
        for (path, content) in files {
            archive.set(&path, content)?;
        }
        Ok(archive)
    }

    async fn build(&self, archive: &mut PackageArchive, _options: &BuildOptions) -> Result<Vec<u8>> {
        let files: BTreeMap<String, Vec<u8>> = archive
            .entries()
            .iter()
            .map(|e| (e.path().to_string(), e.data().to_vec()))
            .collect();
        self.compressor.remote_compress(&files).await
    }
}

/// Local first; the remote service only when local decoding or encoding
/// fails in a way another implementation could get past (an unsupported
/// compression method or a deflate stream error). Every other failure,
/// such as a corrupt directory or a CRC mismatch, is returned as is.
pub struct FallbackCodec {
    local: LocalCodec,
    remote: Option<RemoteCodec>,
}

impl FallbackCodec {
    pub fn new(remote: Option<RemoteCodec>) -> Self {
        Self {
            local: LocalCodec,
            remote,
        }
    }

    pub fn local_only() -> Self {
        Self::new(None)
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }
}

#[async_trait]
impl PackageCodec for FallbackCodec {
    async fn extract(&self, data: &[u8]) -> Result<PackageArchive> {
        match self.local.extract(data).await {
            Err(e) if e.is_compression_failure() => match &self.remote {
                Some(remote) => {
                    warn!(code = e.code(), error = %e, "local extract failed, using remote service");
                    let archive = remote.extract(data).await?;
                    info!(entries = archive.len(), "remote extract succeeded");
                    Ok(archive)
                },
                None => Err(e),
            },
            other => other,
        }
    }

    async fn build(&self, archive: &mut PackageArchive, options: &BuildOptions) -> Result<Vec<u8>> {
        match self.local.build(archive, options).await {
            Err(e) if e.is_compression_failure() => match &self.remote {
                Some(remote) => {
                    warn!(code = e.code(), error = %e, "local build failed, using remote service");
                    remote.build(archive, options).await
                },
                None => Err(e),
            },
            other => other,
        }
    }
}
