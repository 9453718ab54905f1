use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};

use ooxpack::Error;
use ooxpack::extensions::{
    BoundMethod, Extension, ExtensionKind, ExtensionMetadata, Facade, ModuleCatalog, ModuleFilter,
    ModuleState, Operation, OperationContext, global,
};
use ooxpack::opc::blank_presentation;

/// Content module that tags its results with its own name.
struct Styler {
    name: &'static str,
}

impl Styler {
    fn apply_style(&self, _ctx: &mut OperationContext<'_>, _args: &Value) -> ooxpack::Result<Value> {
        Ok(json!({ "by": self.name }))
    }

    fn replace_text(&self, _ctx: &mut OperationContext<'_>, _args: &Value) -> ooxpack::Result<Value> {
        Ok(json!({ "replacements": 0, "by": self.name }))
    }
}

impl Extension for Styler {
    fn metadata(&self) -> Option<ExtensionMetadata> {
        Some(ExtensionMetadata {
            name: self.name.to_string(),
            kind: ExtensionKind::Content,
            version: "1.0.0".to_string(),
        })
    }

    fn methods(self: Arc<Self>) -> Vec<Arc<dyn Operation>> {
        vec![
            Arc::new(BoundMethod::new(&self, "applyStyle", Self::apply_style)),
            Arc::new(BoundMethod::new(&self, "replaceText", Self::replace_text)),
        ]
    }
}

/// Validation module that counts calls on its instance.
#[derive(Default)]
struct Counter {
    calls: AtomicUsize,
}

impl Counter {
    fn add_call(&self, _ctx: &mut OperationContext<'_>, _args: &Value) -> ooxpack::Result<Value> {
        Ok(json!(self.calls.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn validate_package(&self, ctx: &mut OperationContext<'_>, _args: &Value) -> ooxpack::Result<Value> {
        let report = ctx.package()?.lint();
        Ok(json!({ "clean": report.is_clean() }))
    }
}

impl Extension for Counter {
    fn metadata(&self) -> Option<ExtensionMetadata> {
        Some(ExtensionMetadata {
            name: "counter".to_string(),
            kind: ExtensionKind::Validation,
            version: "0.1.0".to_string(),
        })
    }

    fn methods(self: Arc<Self>) -> Vec<Arc<dyn Operation>> {
        vec![
            Arc::new(BoundMethod::new(&self, "addCall", Self::add_call)),
            Arc::new(BoundMethod::new(&self, "validatePackage", Self::validate_package)),
        ]
    }
}

/// Describes itself as a theme module but only implements one method.
struct HalfTheme;

impl HalfTheme {
    fn set_colors(&self, _ctx: &mut OperationContext<'_>, _args: &Value) -> ooxpack::Result<Value> {
        Ok(Value::Null)
    }
}

impl Extension for HalfTheme {
    fn metadata(&self) -> Option<ExtensionMetadata> {
        Some(ExtensionMetadata {
            name: "half-theme".to_string(),
            kind: ExtensionKind::Theme,
            version: "0.0.1".to_string(),
        })
    }

    fn methods(self: Arc<Self>) -> Vec<Arc<dyn Operation>> {
        vec![Arc::new(BoundMethod::new(&self, "setColors", Self::set_colors))]
    }
}

/// No metadata at all.
struct Anonymous;

impl Anonymous {
    fn create_thing(&self, _ctx: &mut OperationContext<'_>, _args: &Value) -> ooxpack::Result<Value> {
        Ok(Value::Null)
    }
}

impl Extension for Anonymous {
    fn metadata(&self) -> Option<ExtensionMetadata> {
        None
    }

    fn methods(self: Arc<Self>) -> Vec<Arc<dyn Operation>> {
        vec![Arc::new(BoundMethod::new(&self, "createThing", Self::create_thing))]
    }
}

fn styler_a() -> Arc<dyn Extension> {
    Arc::new(Styler { name: "styler-a" })
}

fn styler_b() -> Arc<dyn Extension> {
    Arc::new(Styler { name: "styler-b" })
}

fn half_theme() -> Arc<dyn Extension> {
    Arc::new(HalfTheme)
}

fn anonymous() -> Arc<dyn Extension> {
    Arc::new(Anonymous)
}

fn counter() -> Arc<dyn Extension> {
    Arc::new(Counter::default())
}

fn catalog_with(modules: &[(&str, fn() -> Arc<dyn Extension>)]) -> ModuleCatalog {
    let mut catalog = ModuleCatalog::builtin();
    for (id, factory) in modules {
        catalog.declare(id);
        catalog.provide(id, *factory);
    }
    catalog
}

#[test]
fn test_later_registration_wins() {
    let catalog = catalog_with(&[
        ("styler-a", styler_a as fn() -> Arc<dyn Extension>),
        ("styler-b", styler_b),
    ]);
    let facade = Facade::new(catalog, ModuleFilter::default());
    let report = facade.last_report();

    assert!(report.registered.iter().any(|n| n == "styler-a"));
    assert!(report.registered.iter().any(|n| n == "styler-b"));
    assert_eq!(report.overwritten.iter().filter(|n| *n == "applyStyle").count(), 1);
    // xml-text's replaceText, then styler-a's, then styler-b's
    assert_eq!(report.overwritten.iter().filter(|n| *n == "replaceText").count(), 2);

    let mut package = blank_presentation().unwrap();
    let result = facade.call("applyStyle", &mut package, &Value::Null).unwrap();
    assert_eq!(result, json!({ "by": "styler-b" }));
    let result = facade.call("replaceText", &mut package, &json!({})).unwrap();
    assert_eq!(result["by"], json!("styler-b"));

    let info = facade.operations().into_iter().find(|op| op.name == "applyStyle").unwrap();
    assert_eq!(info.provider, "styler-b");
}

#[test]
fn test_rejected_modules_do_not_block_others() {
    let catalog = catalog_with(&[
        ("half-theme", half_theme as fn() -> Arc<dyn Extension>),
        ("anonymous", anonymous),
        ("styler-a", styler_a),
    ]);
    let facade = Facade::new(catalog, ModuleFilter::default());
    let report = facade.last_report();

    assert!(report.rejected.contains(&(
        "half-theme".to_string(),
        vec!["applyTheme".to_string(), "setFonts".to_string()]
    )));
    assert!(report.rejected.contains(&("anonymous".to_string(), vec!["metadata".to_string()])));
    assert_eq!(report.registered.len(), 6);

    assert!(!facade.has("createThing"));
    assert!(facade.has("applyStyle"));
    // the rejected module's setColors never reached the table
    let info = facade.operations().into_iter().find(|op| op.name == "setColors").unwrap();
    assert_eq!(info.provider, "theme-palette");

    let states: Vec<(String, ModuleState)> = facade
        .registry()
        .descriptors()
        .iter()
        .map(|d| (d.id.clone(), d.state))
        .collect();
    assert!(states.contains(&("half-theme".to_string(), ModuleState::Rejected)));
    assert!(states.contains(&("styler-a".to_string(), ModuleState::Registered)));
}

#[test]
fn test_reload_replaces_module_instances() {
    let catalog = catalog_with(&[("counter", counter as fn() -> Arc<dyn Extension>)]);
    let mut facade = Facade::new(catalog, ModuleFilter::default());
    let mut package = blank_presentation().unwrap();

    assert_eq!(facade.call("addCall", &mut package, &Value::Null).unwrap(), json!(1));
    assert_eq!(facade.call("addCall", &mut package, &Value::Null).unwrap(), json!(2));

    let report = facade.reload();
    assert!(report.rejected.is_empty());
    assert_eq!(facade.call("addCall", &mut package, &Value::Null).unwrap(), json!(1));
    assert_eq!(
        facade.call("validatePackage", &mut package, &Value::Null).unwrap(),
        json!({ "clean": true })
    );
}

#[test]
fn test_filter_limits_discovery() {
    let mut facade = Facade::new(
        ModuleCatalog::builtin(),
        ModuleFilter {
            allow: None,
            deny: vec!["xml-text".to_string()],
        },
    );
    assert!(!facade.has("replaceText"));
    assert!(facade.has("applyTheme"));

    facade.registry_mut().set_filter(ModuleFilter {
        allow: Some(vec!["xml-text".to_string()]),
        deny: Vec::new(),
    });
    let report = facade.reload();
    assert_eq!(report.registered, vec!["xml-text"]);
    assert!(facade.has("replaceText"));
    assert!(!facade.has("applyTheme"));
    // built-ins are always there
    assert!(facade.has("getTheme"));
}

#[test]
fn test_static_and_instance_calls() {
    let facade = Facade::builtin();
    let (value, produced) = facade
        .call_static("createFromTemplate", &json!({ "major": "Georgia", "minor": "Arial" }))
        .unwrap();
    assert!(!value["parts"].as_array().unwrap().is_empty());
    let mut package = produced.unwrap();
    assert_eq!(package.theme().unwrap().major_font.as_deref(), Some("Georgia"));

    let err = facade
        .call("createFromTemplate", &mut package, &Value::Null)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let applied = facade
        .call(
            "applyTheme",
            &mut package,
            &json!({ "prompt": "Create presentation with https://coolors.co/edd3c4-c8adc0-7765e3-3b60e4-080708 and Merriweather/Inter fonts" }),
        )
        .unwrap();
    assert_eq!(applied["theme"]["minorFont"], json!("Inter"));
}

#[test]
fn test_global_facade_has_builtin_modules() {
    let facade = global().read();
    for name in ["applyTheme", "createFromTemplate", "validatePackage", "replaceText", "exportPackage"] {
        assert!(facade.has(name), "{} missing", name);
    }
}
