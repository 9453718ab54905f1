//! Discovery, validation and merging of extension modules.
//!
//! Lifecycle of a module per pass:
//!
//! ```text
//! DISCOVERED -> VALIDATED -> REGISTERED
//!           \-> REJECTED
//! ```
//!
//! Every pass starts from scratch: descriptors and the operation table are
//! cleared and fresh instances are created from the catalogue's factories.
//! A rejected module never prevents the others from registering.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Error;

use super::catalog::ModuleCatalog;
use super::operation::{CORE_PROVIDER, Operation, OperationTable};
use super::Extension;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExtensionKind {
    Theme,
    Template,
    Validation,
    Content,
    Export,
}

/// Methods a module of each kind must expose to pass validation.
pub const REQUIRED_METHODS: [(ExtensionKind, &[&str]); 5] = [
    (ExtensionKind::Theme, &["applyTheme", "setColors", "setFonts"]),
    (ExtensionKind::Template, &["createFromTemplate"]),
    (ExtensionKind::Validation, &["validatePackage"]),
    (ExtensionKind::Content, &["replaceText"]),
    (ExtensionKind::Export, &["exportPackage"]),
];

/// Method name prefixes that are merged onto the façade. Other methods stay
/// private to their module.
pub const ALLOW_PREFIXES: [&str; 9] = [
    "create", "apply", "set", "transform", "replace", "validate", "export", "add", "remove",
];

impl ExtensionKind {
    pub fn required_methods(&self) -> &'static [&'static str] {
        REQUIRED_METHODS
            .iter()
            .find(|(kind, _)| kind == self)
            .map(|(_, methods)| *methods)
            .unwrap_or_default()
    }
}

/// Whether a method name qualifies for the façade.
pub fn is_exposed(method: &str) -> bool {
    ALLOW_PREFIXES.iter().any(|prefix| {
        method
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.chars().next().is_none_or(|c| !c.is_ascii_lowercase()))
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionMetadata {
    pub name: String,
    pub kind: ExtensionKind,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reasons", rename_all = "camelCase")]
pub enum ValidationResult {
    Pending,
    Passed,
    /// Names of what is missing: `metadata` or required method names.
    Rejected(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModuleState {
    Discovered,
    Validated,
    Registered,
    Rejected,
}

/// One module as seen by the registry during a pass.
#[derive(Clone, Serialize)]
pub struct ExtensionDescriptor {
    /// Catalogue identifier.
    pub id: String,
    /// Name from the module's metadata, or the identifier if it has none.
    pub name: String,
    pub kind: Option<ExtensionKind>,
    pub version: Option<String>,
    pub methods: Vec<String>,
    pub validation: ValidationResult,
    pub state: ModuleState,
    #[serde(skip)]
    operations: Vec<Arc<dyn Operation>>,
}

impl std::fmt::Debug for ExtensionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("methods", &self.methods)
            .field("state", &self.state)
            .finish()
    }
}

impl ExtensionDescriptor {
    fn from_instance(id: &str, instance: Arc<dyn Extension>) -> Self {
        let metadata = instance.metadata();
        let operations = instance.methods();
        Self {
            id: id.to_string(),
            name: metadata.as_ref().map(|m| m.name.clone()).unwrap_or_else(|| id.to_string()),
            kind: metadata.as_ref().map(|m| m.kind),
            version: metadata.map(|m| m.version),
            methods: operations.iter().map(|op| op.name().to_string()).collect(),
            validation: ValidationResult::Pending,
            state: ModuleState::Discovered,
            operations,
        }
    }

    fn validate(&mut self) {
        let result = match self.kind {
            None => ValidationResult::Rejected(vec!["metadata".to_string()]),
            Some(kind) => {
                let missing: Vec<String> = kind
                    .required_methods()
                    .iter()
                    .filter(|required| !self.methods.iter().any(|m| m == *required))
                    .map(|m| m.to_string())
                    .collect();
                if missing.is_empty() {
                    ValidationResult::Passed
                } else {
                    ValidationResult::Rejected(missing)
                }
            },
        };
        self.state = match result {
            ValidationResult::Rejected(_) => ModuleState::Rejected,
            _ => ModuleState::Validated,
        };
        self.validation = result;
    }
}

/// Allow/deny filter applied to catalogue identifiers before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleFilter {
    /// When set, only these identifiers are candidates.
    pub allow: Option<Vec<String>>,
    pub deny: Vec<String>,
}

impl ModuleFilter {
    pub fn admits(&self, id: &str) -> bool {
        let allowed = self
            .allow
            .as_ref()
            .is_none_or(|allow| allow.iter().any(|a| a == id));
        allowed && !self.deny.iter().any(|d| d == id)
    }
}

/// Outcome of a registration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationReport {
    pub registered: Vec<String>,
    pub rejected: Vec<(String, Vec<String>)>,
    /// Operation names that a later registration replaced.
    pub overwritten: Vec<String>,
}

pub struct ExtensionRegistry {
    catalog: ModuleCatalog,
    filter: ModuleFilter,
    baseline: Vec<Arc<dyn Operation>>,
    descriptors: Vec<ExtensionDescriptor>,
    operations: OperationTable,
}

impl ExtensionRegistry {
    pub fn new(catalog: ModuleCatalog, filter: ModuleFilter) -> Self {
        Self {
            catalog,
            filter,
            baseline: Vec::new(),
            descriptors: Vec::new(),
            operations: OperationTable::new(),
        }
    }

    /// Operations installed at the start of every pass, before any module.
    /// Modules may replace them.
    pub fn with_baseline(mut self, operations: Vec<Arc<dyn Operation>>) -> Self {
        self.baseline = operations;
        self
    }

    /// Instantiate every available, admitted module in catalogue order.
    pub fn discover(&self) -> Vec<ExtensionDescriptor> {
        self.catalog
            .known()
            .iter()
            .filter(|id| {
                let admitted = self.filter.admits(id);
                if !admitted {
                    debug!(module = %id, "filtered out");
                }
                admitted
            })
            .filter_map(|id| {
                let factory = self.catalog.factory(id)?;
                Some(ExtensionDescriptor::from_instance(id, factory()))
            })
            .collect()
    }

    /// Run a full pass: discover, validate, merge.
    pub fn register_all(&mut self) -> RegistrationReport {
        self.descriptors.clear();
        self.operations.clear();
        let mut report = RegistrationReport::default();

        for op in &self.baseline {
            self.operations.insert(CORE_PROVIDER, Arc::clone(op));
        }

        let mut descriptors = self.discover();
        for descriptor in &mut descriptors {
            descriptor.validate();
            if let ValidationResult::Rejected(missing) = &descriptor.validation {
                let err = Error::ExtensionRejected {
                    name: descriptor.name.clone(),
                    missing: missing.clone(),
                };
                warn!(module = %descriptor.id, code = err.code(), "{}", err);
                report.rejected.push((descriptor.name.clone(), missing.clone()));
                continue;
            }
            self.merge(descriptor, &mut report);
            descriptor.state = ModuleState::Registered;
            report.registered.push(descriptor.name.clone());
        }
        self.descriptors = descriptors;

        info!(
            registered = report.registered.len(),
            rejected = report.rejected.len(),
            operations = self.operations.len(),
            "extension registration complete"
        );
        report
    }

    fn merge(&mut self, descriptor: &ExtensionDescriptor, report: &mut RegistrationReport) {
        for op in descriptor.operations.iter().filter(|op| is_exposed(op.name())) {
            let Some(previous) = self.operations.insert(&descriptor.name, Arc::clone(op)) else {
                continue;
            };
            // Last registration wins.
            if previous.provider == CORE_PROVIDER {
                debug!(operation = op.name(), module = %descriptor.name, "module replaces built-in operation");
            } else {
                warn!(
                    operation = op.name(),
                    previous = %previous.provider,
                    module = %descriptor.name,
                    "operation overwritten by later registration"
                );
            }
            report.overwritten.push(op.name().to_string());
        }
    }

    /// Clear everything and register again with fresh module instances.
    pub fn reload(&mut self) -> RegistrationReport {
        info!("reloading extensions");
        self.register_all()
    }

    pub fn descriptors(&self) -> &[ExtensionDescriptor] {
        &self.descriptors
    }

    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Operation>> {
        self.operations.get(name).map(|entry| &entry.operation)
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    pub fn set_filter(&mut self, filter: ModuleFilter) {
        self.filter = filter;
    }
}
