//! Pluggable transformation modules.
//!
//! ## Architecture
//!
//! - [`operation`]: the [`Operation`] contract and the dispatch table
//! - [`catalog`]: the closed set of module identifiers and their factories
//! - [`registry`]: discovery, validation and merging into the table
//! - [`facade`]: dispatch by name, plus the operations built into the
//!   package layer
//! - [`modules`]: the built-in modules
//!
//! Modules are plain Rust types implementing [`Extension`]. Their methods
//! are bound to the instance that produced them, so a stateful module keeps
//! its state across calls until the next reload replaces it.

use std::sync::Arc;

pub mod catalog;
pub mod facade;
pub mod modules;
pub mod operation;
pub mod registry;

pub use catalog::{KNOWN_MODULES, ModuleCatalog};
pub use facade::{Facade, global};
pub use operation::{BoundMethod, Operation, OperationContext, OperationTable};
pub use registry::{
    ExtensionDescriptor, ExtensionKind, ExtensionMetadata, ExtensionRegistry, ModuleFilter,
    ModuleState, RegistrationReport, ValidationResult,
};

/// A transformation module.
pub trait Extension: Send + Sync + 'static {
    /// `None` means the module does not describe itself and will be rejected.
    fn metadata(&self) -> Option<ExtensionMetadata>;

    /// Every method the module implements, bound to this instance.
    fn methods(self: Arc<Self>) -> Vec<Arc<dyn Operation>>;
}
