//! The operation contract and the name → operation table the façade
//! dispatches through.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::opc::OoxmlPackage;

/// Provider name recorded for operations built into the façade.
pub const CORE_PROVIDER: &str = "core";

/// A named capability exposed on the package façade.
///
/// Instance operations act on a loaded package passed through the
/// [`OperationContext`]; static operations run without one and may produce a
/// new package instead.
pub trait Operation: Send + Sync {
    fn name(&self) -> &str;

    fn is_static(&self) -> bool;

    fn invoke(&self, ctx: &mut OperationContext<'_>, args: &Value) -> Result<Value>;
}

/// What an operation runs against.
pub struct OperationContext<'a> {
    package: Option<&'a mut OoxmlPackage>,
    produced: Option<OoxmlPackage>,
}

impl<'a> OperationContext<'a> {
    pub fn instance(package: &'a mut OoxmlPackage) -> Self {
        Self {
            package: Some(package),
            produced: None,
        }
    }

    pub fn detached() -> Self {
        Self {
            package: None,
            produced: None,
        }
    }

    /// The loaded package. Fails for static invocations.
    pub fn package(&mut self) -> Result<&mut OoxmlPackage> {
        self.package
            .as_deref_mut()
            .ok_or_else(|| Error::InvalidArgument("operation requires a loaded package".to_string()))
    }

    /// Hand a newly created package back to the caller.
    pub fn produce(&mut self, package: OoxmlPackage) {
        self.produced = Some(package);
    }

    pub fn into_produced(self) -> Option<OoxmlPackage> {
        self.produced
    }
}

/// Handler signature for a method bound to an extension instance.
pub type MethodHandler<M> = fn(&M, &mut OperationContext<'_>, &Value) -> Result<Value>;

/// A method bound to its owning instance, so every call sees that
/// instance's state.
pub struct BoundMethod<M> {
    name: &'static str,
    is_static: bool,
    instance: Arc<M>,
    handler: MethodHandler<M>,
}

impl<M> BoundMethod<M> {
    pub fn new(instance: &Arc<M>, name: &'static str, handler: MethodHandler<M>) -> Self {
        Self {
            name,
            is_static: false,
            instance: Arc::clone(instance),
            handler,
        }
    }

    pub fn new_static(instance: &Arc<M>, name: &'static str, handler: MethodHandler<M>) -> Self {
        Self {
            is_static: true,
            ..Self::new(instance, name, handler)
        }
    }
}

impl<M: Send + Sync> Operation for BoundMethod<M> {
    fn name(&self) -> &str {
        self.name
    }

    fn is_static(&self) -> bool {
        self.is_static
    }

    fn invoke(&self, ctx: &mut OperationContext<'_>, args: &Value) -> Result<Value> {
        (self.handler)(&self.instance, ctx, args)
    }
}

/// Stateless instance operation backed by a plain function.
pub struct FnOperation {
    name: &'static str,
    handler: fn(&mut OperationContext<'_>, &Value) -> Result<Value>,
}

impl FnOperation {
    pub const fn new(name: &'static str, handler: fn(&mut OperationContext<'_>, &Value) -> Result<Value>) -> Self {
        Self { name, handler }
    }
}

impl Operation for FnOperation {
    fn name(&self) -> &str {
        self.name
    }

    fn is_static(&self) -> bool {
        false
    }

    fn invoke(&self, ctx: &mut OperationContext<'_>, args: &Value) -> Result<Value> {
        (self.handler)(ctx, args)
    }
}

#[derive(Clone)]
pub struct OperationEntry {
    /// Module name that contributed the operation, or [`CORE_PROVIDER`].
    pub provider: String,
    pub operation: Arc<dyn Operation>,
}

/// Operation name → implementation. Inserting an existing name replaces the
/// previous entry and hands it back.
#[derive(Clone, Default)]
pub struct OperationTable {
    entries: BTreeMap<String, OperationEntry>,
}

impl OperationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, provider: &str, operation: Arc<dyn Operation>) -> Option<OperationEntry> {
        self.entries.insert(
            operation.name().to_string(),
            OperationEntry {
                provider: provider.to_string(),
                operation,
            },
        )
    }

    pub fn get(&self, name: &str) -> Option<&OperationEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entries sorted by operation name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OperationEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for OperationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, &v.provider)))
            .finish()
    }
}

/// Encode an operation result.
pub fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Required string argument.
pub fn arg_str<'v>(args: &'v Value, key: &str) -> Result<&'v str> {
    opt_str(args, key)?.ok_or_else(|| Error::InvalidArgument(format!("missing string argument '{}'", key)))
}

/// Optional string argument; present but non-string is an error.
pub fn opt_str<'v>(args: &'v Value, key: &str) -> Result<Option<&'v str>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(Error::InvalidArgument(format!(
            "argument '{}' must be a string, got {}",
            key, other
        ))),
    }
}

/// Optional list of strings.
pub fn opt_str_list<'v>(args: &'v Value, key: &str) -> Result<Option<Vec<&'v str>>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().ok_or_else(|| {
                    Error::InvalidArgument(format!("argument '{}' must contain only strings", key))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some),
        Some(other) => Err(Error::InvalidArgument(format!(
            "argument '{}' must be a list of strings, got {}",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_json_reports_encoding_failure() {
        let mut keyed_by_pair = BTreeMap::new();
        keyed_by_pair.insert((1u8, 2u8), "x");
        let err = to_json(&keyed_by_pair).unwrap_err();
        assert_eq!(err.code(), "RESULT_ENCODING");

        assert_eq!(to_json(&vec!["a"]).unwrap(), json!(["a"]));
    }

    struct Counter {
        calls: parking_lot::Mutex<u32>,
    }

    fn bump(counter: &Counter, _ctx: &mut OperationContext<'_>, _args: &Value) -> Result<Value> {
        let mut calls = counter.calls.lock();
        *calls += 1;
        Ok(json!(*calls))
    }

    #[test]
    fn test_bound_method_keeps_instance_state() {
        let counter = Arc::new(Counter {
            calls: parking_lot::Mutex::new(0),
        });
        let op = BoundMethod::new_static(&counter, "bump", bump);
        let mut ctx = OperationContext::detached();
        op.invoke(&mut ctx, &Value::Null).unwrap();
        assert_eq!(op.invoke(&mut ctx, &Value::Null).unwrap(), json!(2));
        assert_eq!(*counter.calls.lock(), 2);
    }

    #[test]
    fn test_table_insert_returns_replaced_entry() {
        let counter = Arc::new(Counter {
            calls: parking_lot::Mutex::new(0),
        });
        let mut table = OperationTable::new();
        assert!(table.insert("a", Arc::new(BoundMethod::new(&counter, "bump", bump))).is_none());
        let previous = table.insert("b", Arc::new(BoundMethod::new(&counter, "bump", bump)));
        assert_eq!(previous.map(|e| e.provider).as_deref(), Some("a"));
        assert_eq!(table.get("bump").unwrap().provider, "b");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_detached_context_has_no_package() {
        let mut ctx = OperationContext::detached();
        assert!(matches!(ctx.package(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_argument_helpers() {
        let args = json!({"path": "a.xml", "n": 3, "colors": ["FF0000", "00FF00"]});
        assert_eq!(arg_str(&args, "path").unwrap(), "a.xml");
        assert!(arg_str(&args, "n").is_err());
        assert!(arg_str(&args, "missing").is_err());
        assert_eq!(opt_str(&args, "missing").unwrap(), None);
        assert_eq!(opt_str_list(&args, "colors").unwrap().unwrap(), vec!["FF0000", "00FF00"]);
        assert!(opt_str_list(&args, "path").is_err());
    }
}
