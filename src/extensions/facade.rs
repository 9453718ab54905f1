//! The package façade: operations addressed by name.
//!
//! Built-in semantic operations are installed first on every registration
//! pass and extension modules are merged over them, so a module may replace
//! a built-in.

use std::sync::{Arc, LazyLock};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::RwLock;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Error, Result};
use crate::opc::OoxmlPackage;

use super::catalog::ModuleCatalog;
use super::operation::{FnOperation, Operation, OperationContext, arg_str, opt_str, opt_str_list, to_json};
use super::registry::{ExtensionRegistry, ModuleFilter, RegistrationReport};

fn get_theme(ctx: &mut OperationContext<'_>, _args: &Value) -> Result<Value> {
    let theme = ctx.package()?.theme()?;
    to_json(&theme)
}

fn set_colors(ctx: &mut OperationContext<'_>, args: &Value) -> Result<Value> {
    let colors = opt_str_list(args, "colors")?
        .ok_or_else(|| Error::InvalidArgument("missing list argument 'colors'".to_string()))?;
    let theme = ctx.package()?.set_colors(&colors)?;
    to_json(&theme)
}

fn set_fonts(ctx: &mut OperationContext<'_>, args: &Value) -> Result<Value> {
    let major = arg_str(args, "major")?;
    let minor = arg_str(args, "minor")?;
    let theme = ctx.package()?.set_fonts(major, minor)?;
    to_json(&theme)
}

fn add_part(ctx: &mut OperationContext<'_>, args: &Value) -> Result<Value> {
    let path = arg_str(args, "path")?;
    let content = match (opt_str(args, "content")?, opt_str(args, "contentBase64")?) {
        (Some(text), None) => text.as_bytes().to_vec(),
        (None, Some(encoded)) => BASE64
            .decode(encoded)
            .map_err(|e| Error::InvalidArgument(format!("contentBase64: {}", e)))?,
        _ => {
            return Err(Error::InvalidArgument(
                "exactly one of 'content' or 'contentBase64' is required".to_string(),
            ));
        },
    };
    let rel_type = arg_str(args, "relationshipType")?;
    let from = opt_str(args, "from")?.unwrap_or("");
    let content_type = opt_str(args, "contentType")?;
    let id = ctx
        .package()?
        .add_part(path, content, content_type, rel_type, from)?;
    Ok(json!({ "id": id }))
}

fn remove_part(ctx: &mut OperationContext<'_>, args: &Value) -> Result<Value> {
    let path = arg_str(args, "path")?;
    let removed = ctx.package()?.remove_part(path)?;
    Ok(json!({ "removedRelationships": removed }))
}

fn validate_package(ctx: &mut OperationContext<'_>, _args: &Value) -> Result<Value> {
    let report = ctx.package()?.lint();
    to_json(&report)
}

/// Operations the package layer contributes on its own.
pub fn builtin_operations() -> Vec<Arc<dyn Operation>> {
    vec![
        Arc::new(FnOperation::new("getTheme", get_theme)),
        Arc::new(FnOperation::new("setColors", set_colors)),
        Arc::new(FnOperation::new("setFonts", set_fonts)),
        Arc::new(FnOperation::new("addPart", add_part)),
        Arc::new(FnOperation::new("removePart", remove_part)),
        Arc::new(FnOperation::new("validatePackage", validate_package)),
    ]
}

/// Summary of one table entry, for listings.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OperationInfo {
    pub name: String,
    pub provider: String,
    pub is_static: bool,
}

pub struct Facade {
    registry: ExtensionRegistry,
    last_report: RegistrationReport,
}

impl Facade {
    /// Build the façade and run the first registration pass.
    pub fn new(catalog: ModuleCatalog, filter: ModuleFilter) -> Self {
        let mut registry = ExtensionRegistry::new(catalog, filter).with_baseline(builtin_operations());
        let last_report = registry.register_all();
        Self {
            registry,
            last_report,
        }
    }

    /// Every built-in module, no filter.
    pub fn builtin() -> Self {
        Self::new(ModuleCatalog::builtin(), ModuleFilter::default())
    }

    fn lookup(&self, name: &str, want_static: bool) -> Result<&Arc<dyn Operation>> {
        let op = self
            .registry
            .get(name)
            .ok_or_else(|| Error::OperationNotFound(name.to_string()))?;
        match (op.is_static(), want_static) {
            (true, false) => Err(Error::InvalidArgument(format!(
                "{} is a static operation and takes no package",
                name
            ))),
            (false, true) => Err(Error::InvalidArgument(format!(
                "{} operates on a loaded package",
                name
            ))),
            _ => Ok(op),
        }
    }

    /// Run an instance operation against `package`.
    pub fn call(&self, name: &str, package: &mut OoxmlPackage, args: &Value) -> Result<Value> {
        let op = self.lookup(name, false)?;
        debug!(operation = name, "invoking");
        let mut ctx = OperationContext::instance(package);
        op.invoke(&mut ctx, args)
    }

    /// Run a static operation. A package it creates is returned alongside
    /// the result value.
    pub fn call_static(&self, name: &str, args: &Value) -> Result<(Value, Option<OoxmlPackage>)> {
        let op = self.lookup(name, true)?;
        debug!(operation = name, "invoking static");
        let mut ctx = OperationContext::detached();
        let value = op.invoke(&mut ctx, args)?;
        Ok((value, ctx.into_produced()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.registry.get(name).is_some()
    }

    pub fn operations(&self) -> Vec<OperationInfo> {
        self.registry
            .operations()
            .iter()
            .map(|(name, entry)| OperationInfo {
                name: name.to_string(),
                provider: entry.provider.clone(),
                is_static: entry.operation.is_static(),
            })
            .collect()
    }

    pub fn reload(&mut self) -> RegistrationReport {
        self.last_report = self.registry.reload();
        self.last_report.clone()
    }

    pub fn last_report(&self) -> &RegistrationReport {
        &self.last_report
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.registry
    }
}

static GLOBAL: LazyLock<RwLock<Facade>> = LazyLock::new(|| RwLock::new(Facade::builtin()));

/// The process-wide façade.
///
/// Calls hold the read lock for their whole duration and [`Facade::reload`]
/// needs the write lock, so a reload waits for in-flight calls to finish and
/// no call ever runs against a half-rebuilt table.
pub fn global() -> &'static RwLock<Facade> {
    &GLOBAL
}
