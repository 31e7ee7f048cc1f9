//! Integration tests for script compilation and execution
//!
//! NOTE: companion files cover the other subsystems:
//!   - registry_binding_tests.rs (class exposure and object binding)
//!   - job_manager_tests.rs (timer scheduling and the background executor)

mod common;

use common::{bind_element, dom_registry, init_tracing, FakeElement};
use gossamer::prelude::*;
use std::sync::{Arc, Mutex};

/// Interpreter stand-in executing one directive per line:
///
///   read:NAME         resolve NAME through the scope chain, innermost first
///   write:NAME=TEXT   assign through the first scope knowing NAME
///   call:NAME         invoke NAME through the chain
///   spin:N            N observer chunks of simulated busy work
///   throw:MESSAGE     runtime fault
///
/// Lines starting with `//` are comments; anything else fails to compile.
/// The value of the last directive is the script result. The engine honours
/// the observer abort contract: an observer error ends the run immediately.
struct ScriptedEngine {
    clock: Arc<VirtualClock>,
    tick_ms: u64,
}

#[derive(Debug)]
struct Program {
    directives: Vec<String>,
    source_name: String,
}

/// A scope holding at most one bound host object. The slot is shared
/// across clones, so a binder installed on the context's window scope is
/// visible to every chain built from it.
#[derive(Clone, Default)]
struct BinderScope {
    slot: Arc<Mutex<Option<HostObjectBinder>>>,
}

impl BinderScope {
    fn holding(binder: HostObjectBinder) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(binder))),
        }
    }

    fn install(&self, binder: HostObjectBinder) {
        *self.slot.lock().unwrap() = Some(binder);
    }

    fn binder(&self) -> Option<HostObjectBinder> {
        self.slot.lock().unwrap().clone()
    }
}

const DIRECTIVES: [&str; 5] = ["read:", "write:", "call:", "spin:", "throw:"];

impl Interpreter for ScriptedEngine {
    type Script = Program;
    type Scope = BinderScope;

    fn compile(&self, source: &str, source_name: &str) -> gossamer::Result<Program> {
        let mut directives = Vec::new();
        for line in source.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            if !DIRECTIVES.iter().any(|prefix| line.starts_with(prefix)) {
                return Err(Error::compile(
                    format!("unknown directive '{line}'"),
                    source_name,
                ));
            }
            directives.push(line.to_string());
        }
        Ok(Program {
            directives,
            source_name: source_name.to_string(),
        })
    }

    fn new_scope(&self, _parent: Option<&Self::Scope>) -> Self::Scope {
        BinderScope::default()
    }

    fn execute(
        &self,
        script: &Program,
        scope: &ScopeChain<BinderScope>,
        _this: Option<&Value>,
        observer: &mut dyn FnMut(u64) -> gossamer::Result<()>,
    ) -> gossamer::Result<Value> {
        let binders: Vec<HostObjectBinder> =
            scope.iter().filter_map(BinderScope::binder).collect();
        let mut last = Value::Undefined;
        let mut operations = 0;

        for directive in &script.directives {
            if let Some(name) = directive.strip_prefix("read:") {
                last = Value::Undefined;
                for binder in &binders {
                    let fetched = binder.get(name)?;
                    if !fetched.is_not_found() {
                        last = fetched.into_value().unwrap_or(Value::Undefined);
                        break;
                    }
                }
            } else if let Some(rest) = directive.strip_prefix("write:") {
                let (name, text) = rest.split_once('=').unwrap_or((rest, ""));
                for binder in &binders {
                    if binder.set(name, Value::from(text))? != SetOutcome::NotFound {
                        break;
                    }
                }
                last = Value::Undefined;
            } else if let Some(name) = directive.strip_prefix("call:") {
                last = Value::Undefined;
                for binder in &binders {
                    match binder.invoke(name, &[])? {
                        InvokeOutcome::NotFound => continue,
                        InvokeOutcome::Returned(value) => {
                            last = value;
                            break;
                        }
                        InvokeOutcome::NotCallable => {
                            return Err(Error::script(
                                format!("'{name}' is not a function"),
                                &script.source_name,
                            ));
                        }
                    }
                }
            } else if let Some(chunks) = directive.strip_prefix("spin:") {
                let chunks: u64 = chunks.parse().unwrap_or(1);
                for _ in 0..chunks {
                    self.clock.advance_millis(self.tick_ms);
                    operations += STEP_OBSERVER_THRESHOLD;
                    observer(operations)?;
                }
                last = Value::Undefined;
            } else if let Some(message) = directive.strip_prefix("throw:") {
                return Err(Error::script(message, &script.source_name));
            }
            operations += STEP_OBSERVER_THRESHOLD;
            observer(operations)?;
        }
        Ok(last)
    }
}

/// Context whose window scope holds a bound `<body>` element; returns the
/// backing natives for inspection.
fn scripted_context(
    tick_ms: u64,
) -> (
    ExecutionContext<ScriptedEngine>,
    Arc<VirtualClock>,
    Arc<FakeElement>,
) {
    init_tracing();
    let clock = Arc::new(VirtualClock::new());
    let engine = ScriptedEngine {
        clock: clock.clone(),
        tick_ms,
    };
    let ctx =
        ExecutionContext::new(engine, CapabilityProfile::chrome()).with_clock(clock.clone());

    let registry = dom_registry();
    let body = FakeElement::new("body");
    let binder = bind_element(
        &registry,
        "Element",
        &CapabilityProfile::chrome(),
        body.clone(),
    );
    ctx.window_scope().install(binder);
    (ctx, clock, body)
}

/// An input element scope chained over the context's window scope.
fn input_chain(
    ctx: &ExecutionContext<ScriptedEngine>,
) -> (ScopeChain<BinderScope>, Arc<FakeElement>) {
    let registry = dom_registry();
    let input = FakeElement::new("input");
    let binder = bind_element(
        &registry,
        "HTMLInputElement",
        &CapabilityProfile::chrome(),
        input.clone(),
    );
    (ctx.element_chain(BinderScope::holding(binder)), input)
}

mod compilation {
    use super::*;

    #[test]
    fn test_html_comment_wrapper_is_neutralized() {
        let (ctx, _, _) = scripted_context(0);
        let chain = ctx.window_chain();
        let result = ctx
            .execute_source("<!--\nread:nodeName\n//-->", "inline.js", &chain, None)
            .unwrap();
        assert_eq!(result, Value::from("BODY"));
    }

    #[test]
    fn test_legacy_family_drops_trailing_close_marker() {
        init_tracing();
        let clock = Arc::new(VirtualClock::new());
        let engine = ScriptedEngine {
            clock: clock.clone(),
            tick_ms: 0,
        };
        let ctx = ExecutionContext::new(engine, CapabilityProfile::internet_explorer());
        // The bare close marker is not a directive; only the legacy
        // family's cleanup makes this compile.
        assert!(ctx.compile("read:nodeName\n-->", "inline.js").is_ok());

        let (modern, _, _) = scripted_context(0);
        assert!(modern.compile("read:nodeName\n-->", "inline.js").is_err());
    }

    #[test]
    fn test_preprocessor_rewrites_source_before_compilation() {
        let (ctx, _, _) = scripted_context(0);
        let ctx = ctx.with_preprocessor(Box::new(|source, _name| {
            source.replace("LEGACY_READ", "read:nodeName")
        }));
        let chain = ctx.window_chain();
        let result = ctx
            .execute_source("LEGACY_READ", "inline.js", &chain, None)
            .unwrap();
        assert_eq!(result, Value::from("BODY"));
    }

    #[test]
    fn test_compile_error_carries_source_name() {
        let (ctx, _, _) = scripted_context(0);
        let err = ctx.compile("definitely not a directive", "page.js").unwrap_err();
        assert!(err.is_script_fault());
        assert!(err.to_string().contains("page.js"));
    }
}

mod scope_resolution {
    use super::*;

    #[test]
    fn test_element_scope_shadows_window_scope() {
        let (ctx, _, _body) = scripted_context(0);
        let (chain, _input) = input_chain(&ctx);
        // Both scopes expose nodeName; the element wins.
        let result = ctx
            .execute_source("read:nodeName", "handler.js", &chain, None)
            .unwrap();
        assert_eq!(result, Value::from("INPUT"));
    }

    #[test]
    fn test_unknown_element_names_fall_back_to_window() {
        let (ctx, _, _) = scripted_context(0);
        let registry = dom_registry();
        registry
            .register(HostClassDef::new("Window").getter(
                "innerWidth",
                Applicability::all(),
                |_| Ok(Value::from(1024.0)),
            ))
            .unwrap();
        let binding = registry
            .binding("Window", &CapabilityProfile::chrome())
            .unwrap();
        ctx.window_scope()
            .install(HostObjectBinder::new(FakeElement::new("window"), binding));

        let (chain, _input) = input_chain(&ctx);
        // The input knows no innerWidth; the window scope answers.
        let result = ctx
            .execute_source("read:innerWidth", "handler.js", &chain, None)
            .unwrap();
        assert_eq!(result, Value::Number(1024.0));
    }

    #[test]
    fn test_missing_name_resolves_undefined_not_error() {
        let (ctx, _, _) = scripted_context(0);
        let chain = ctx.window_chain();
        let result = ctx
            .execute_source("read:totallyUnknown", "page.js", &chain, None)
            .unwrap();
        assert_eq!(result, Value::Undefined);
    }

    #[test]
    fn test_write_lands_on_innermost_scope_with_the_member() {
        let (ctx, _, body) = scripted_context(0);
        let (chain, input) = input_chain(&ctx);

        ctx.execute_source("write:value=draft text", "handler.js", &chain, None)
            .unwrap();
        assert_eq!(*input.text.lock().unwrap(), "draft text");
        assert_eq!(*body.text.lock().unwrap(), "");
    }

    #[test]
    fn test_read_only_write_is_swallowed_silently() {
        let (ctx, _, body) = scripted_context(0);
        let chain = ctx.window_chain();
        ctx.execute_source("write:tagName=bogus", "page.js", &chain, None)
            .unwrap();
        let result = ctx
            .execute_source("read:tagName", "page.js", &chain, None)
            .unwrap();
        assert_eq!(result, Value::from("BODY"));
        assert_eq!(body.tag, "body");
    }

    #[test]
    fn test_calls_dispatch_against_the_owning_scope_receiver() {
        let (ctx, _, body) = scripted_context(0);
        let (chain, input) = input_chain(&ctx);

        ctx.execute_source("call:click", "handler.js", &chain, None)
            .unwrap();
        assert_eq!(input.click_count(), 1);
        assert_eq!(body.click_count(), 0);
    }
}

mod timeouts {
    use super::*;

    #[test]
    fn test_runaway_script_raises_exactly_one_timeout_and_context_recovers() {
        let (ctx, _, _) = scripted_context(20);
        let ctx = ctx.with_timeout_millis(50);
        let chain = ctx.window_chain();

        let err = ctx
            .execute_source("spin:10", "busy.js", &chain, None)
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("exceeds"));
        assert!(!ctx.is_script_running());

        // Unrelated scripts on the same context run normally afterwards.
        let result = ctx
            .execute_source("read:nodeName", "after.js", &chain, None)
            .unwrap();
        assert_eq!(result, Value::from("BODY"));
    }

    #[test]
    fn test_nonpositive_timeout_disables_the_limit() {
        let (ctx, _, _) = scripted_context(20);
        let ctx = ctx.with_timeout_millis(0);
        let chain = ctx.window_chain();
        let result = ctx.execute_source("spin:200", "busy.js", &chain, None);
        assert!(result.is_ok());
    }

    #[test]
    fn test_timeout_is_not_swallowed_by_log_only_policy() {
        let (ctx, _, _) = scripted_context(20);
        let ctx = ctx
            .with_timeout_millis(50)
            .with_error_policy(ScriptErrorPolicy::LogOnly);
        let chain = ctx.window_chain();
        let err = ctx
            .execute_source("spin:10", "busy.js", &chain, None)
            .unwrap_err();
        assert!(err.is_timeout());
    }
}

mod error_policy {
    use super::*;

    #[test]
    fn test_propagate_policy_returns_script_faults() {
        let (ctx, _, _) = scripted_context(0);
        let chain = ctx.window_chain();
        let err = ctx
            .execute_source("throw:boom", "page.js", &chain, None)
            .unwrap_err();
        assert!(err.is_script_fault());
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_log_only_policy_swallows_runtime_and_compile_faults() {
        let (ctx, _, _) = scripted_context(0);
        let ctx = ctx.with_error_policy(ScriptErrorPolicy::LogOnly);
        let chain = ctx.window_chain();

        let result = ctx
            .execute_source("throw:boom", "page.js", &chain, None)
            .unwrap();
        assert_eq!(result, Value::Undefined);

        let result = ctx
            .execute_source("not a directive", "page.js", &chain, None)
            .unwrap();
        assert_eq!(result, Value::Undefined);
    }

    #[test]
    fn test_invoking_a_property_is_a_script_fault() {
        let (ctx, _, _) = scripted_context(0);
        let chain = ctx.window_chain();
        let err = ctx
            .execute_source("call:textContent", "page.js", &chain, None)
            .unwrap_err();
        assert!(err.is_script_fault());
        assert!(err.to_string().contains("not a function"));
    }
}
