//! Shared test helpers for integration tests

use gossamer::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Install the tracing subscriber once per test binary; honours `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// DOM-flavoured native backing the test class hierarchy.
#[derive(Debug, Default)]
#[allow(dead_code)]
pub struct FakeElement {
    pub tag: String,
    pub text: Mutex<String>,
    pub clicks: AtomicU32,
}

impl FakeElement {
    #[allow(dead_code)]
    pub fn new(tag: &str) -> Arc<Self> {
        Arc::new(Self {
            tag: tag.to_string(),
            ..Default::default()
        })
    }

    #[allow(dead_code)]
    pub fn click_count(&self) -> u32 {
        self.clicks.load(Ordering::SeqCst)
    }
}

#[allow(dead_code)]
fn element(native: &NativeHandle) -> gossamer::Result<&FakeElement> {
    gossamer::registry::downcast_native::<FakeElement>(native)
}

/// A registry mirroring a slice of the DOM class hierarchy:
///
/// ```text
/// EventTarget            (prototype-shaped root)
///   └─ Node              (nodeName getter, node-type constants)
///        └─ Element      (textContent, click, read-only tagName)
///             └─ HTMLInputElement   (instance-shaped; value, focus)
/// DOMRect                (exposed as ClientRect on the legacy family)
/// ```
#[allow(dead_code)]
pub fn dom_registry() -> HostClassRegistry {
    let registry = HostClassRegistry::new();

    registry
        .register(
            HostClassDef::new("EventTarget")
                .method("addEventListener", Applicability::all(), |_, _| {
                    Ok(Value::Undefined)
                })
                .method(
                    "attachEvent",
                    Applicability::family(BrowserFamily::InternetExplorer),
                    |_, _| Ok(Value::Undefined),
                ),
        )
        .unwrap();

    registry
        .register(
            HostClassDef::new("Node")
                .parent("EventTarget")
                .getter("nodeName", Applicability::all(), |native| {
                    Ok(Value::from(element(native)?.tag.to_uppercase()))
                })
                .constant("ELEMENT_NODE", Applicability::all(), 1.0)
                .constant("TEXT_NODE", Applicability::all(), 3.0),
        )
        .unwrap();

    registry
        .register(
            HostClassDef::new("Element")
                .parent("Node")
                .getter("tagName", Applicability::all(), |native| {
                    Ok(Value::from(element(native)?.tag.to_uppercase()))
                })
                .getter("textContent", Applicability::all(), |native| {
                    Ok(Value::from(element(native)?.text.lock().unwrap().clone()))
                })
                .text_setter("textContent", Applicability::all(), |native, value| {
                    *element(native)?.text.lock().unwrap() = value.coerce_string();
                    Ok(())
                })
                .method("click", Applicability::all(), |native, _| {
                    element(native)?.clicks.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::Undefined)
                }),
        )
        .unwrap();

    registry
        .register(
            HostClassDef::new("HTMLInputElement")
                .parent("Element")
                .instance_shaped()
                .getter("value", Applicability::all(), |native| {
                    Ok(Value::from(element(native)?.text.lock().unwrap().clone()))
                })
                .text_setter("value", Applicability::all(), |native, value| {
                    *element(native)?.text.lock().unwrap() = value.coerce_string();
                    Ok(())
                })
                .method("focus", Applicability::all(), |_, _| Ok(Value::Undefined)),
        )
        .unwrap();

    registry
        .register(
            HostClassDef::new("DOMRect")
                .alias(
                    "DOMRect",
                    Applicability::family(BrowserFamily::Chrome)
                        .or_family(BrowserFamily::Edge)
                        .or_family(BrowserFamily::Firefox),
                )
                .alias(
                    "ClientRect",
                    Applicability::family(BrowserFamily::InternetExplorer),
                )
                .getter("width", Applicability::all(), |_| Ok(Value::from(0.0))),
        )
        .unwrap();

    registry
}

/// Binder for one element of `class_name` under `profile`.
#[allow(dead_code)]
pub fn bind_element(
    registry: &HostClassRegistry,
    class_name: &str,
    profile: &CapabilityProfile,
    native: Arc<FakeElement>,
) -> HostObjectBinder {
    let binding = registry.binding(class_name, profile).unwrap();
    HostObjectBinder::new(native, binding)
}
