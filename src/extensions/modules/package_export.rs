//! Export module: the built archive as base64, for callers that move
//! packages over text channels.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::extensions::operation::{BoundMethod, OperationContext};
use crate::extensions::registry::{ExtensionKind, ExtensionMetadata};
use crate::extensions::{Extension, ModuleCatalog, Operation};
use crate::zip::{BuildOptions, DEFAULT_COMPRESSION_LEVEL};

pub const ID: &str = "package-export";

#[derive(Default)]
pub struct PackageExport;

impl PackageExport {
    fn export_package(&self, ctx: &mut OperationContext<'_>, args: &Value) -> Result<Value> {
        let level = match args.get("level") {
            None | Some(Value::Null) => DEFAULT_COMPRESSION_LEVEL,
            Some(value) => value
                .as_u64()
                .filter(|level| *level <= 9)
                .map(|level| level as u32)
                .ok_or_else(|| Error::InvalidArgument(format!("level must be 0-9, got {}", value)))?,
        };
        let package = ctx.package()?;
        let bytes = package.to_bytes(&BuildOptions::with_level(level))?;
        Ok(json!({
            "size": bytes.len(),
            "entries": package.archive().len(),
            "data": BASE64.encode(&bytes),
        }))
    }
}

impl Extension for PackageExport {
    fn metadata(&self) -> Option<ExtensionMetadata> {
        Some(ExtensionMetadata {
            name: ID.to_string(),
            kind: ExtensionKind::Export,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    fn methods(self: Arc<Self>) -> Vec<Arc<dyn Operation>> {
        vec![Arc::new(BoundMethod::new(&self, "exportPackage", Self::export_package))]
    }
}

pub fn register(catalog: &mut ModuleCatalog) {
    catalog.provide(ID, || Arc::new(PackageExport));
}
