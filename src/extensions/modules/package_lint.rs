//! Validation module: structural lint of the loaded package.

use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::extensions::operation::{BoundMethod, OperationContext, to_json};
use crate::extensions::registry::{ExtensionKind, ExtensionMetadata};
use crate::extensions::{Extension, ModuleCatalog, Operation};

pub const ID: &str = "package-lint";

#[derive(Default)]
pub struct PackageLint;

impl PackageLint {
    /// Returns the report. With `{"strict": true}` the first finding is
    /// raised as an error instead.
    fn validate_package(&self, ctx: &mut OperationContext<'_>, args: &Value) -> Result<Value> {
        let report = ctx.package()?.lint();
        let strict = args.get("strict").and_then(Value::as_bool).unwrap_or(false);
        if strict {
            report.clone().into_result()?;
        }
        to_json(&report)
    }
}

impl Extension for PackageLint {
    fn metadata(&self) -> Option<ExtensionMetadata> {
        Some(ExtensionMetadata {
            name: ID.to_string(),
            kind: ExtensionKind::Validation,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    fn methods(self: Arc<Self>) -> Vec<Arc<dyn Operation>> {
        vec![Arc::new(BoundMethod::new(&self, "validatePackage", Self::validate_package))]
    }
}

pub fn register(catalog: &mut ModuleCatalog) {
    catalog.provide(ID, || Arc::new(PackageLint));
}
