//! Per-page script compilation and execution.
//!
//! An [`ExecutionContext`] owns one interpreter handle and one root window
//! scope. Scripts compile against a source name (for diagnostics), execute
//! against a scope chain of optional element scope over the window scope,
//! and run under a cooperative wall-clock timeout: the interpreter reports
//! its dispatched-operation count through an observer callback at least
//! every [`STEP_OBSERVER_THRESHOLD`] operations, and an exceeded deadline
//! surfaces as an uncatchable [`Error::Timeout`] that is fatal to the
//! triggering top-level call only. The context stays reusable afterwards.
//!
//! The interpreter itself is an opaque service behind the [`Interpreter`]
//! trait; its parser, compiler and collector are none of this crate's
//! business.

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::profile::{BrowserFamily, CapabilityProfile};
use crate::value::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// The interpreter must invoke the step observer at least once per this many
/// dispatched operations while a script runs.
pub const STEP_OBSERVER_THRESHOLD: u64 = 10_000;

// ---------------------------------------------------------------------------
// Interpreter – the opaque engine seam
// ---------------------------------------------------------------------------

/// The engine surface the context drives.
///
/// Contract for `execute`: the engine calls `observer` with its running
/// operation count at least every [`STEP_OBSERVER_THRESHOLD`] operations.
/// When the observer returns an error the engine MUST abort the current
/// top-level call, unwinding past every script-level handler (no `catch` or
/// `finally` may swallow it), and return that error.
pub trait Interpreter {
    /// Compiled form of one script.
    type Script;
    /// A scope handle; cloning must be cheap (engines hand out references).
    type Scope: Clone;

    /// Compile `source`, reporting failures against `source_name`.
    fn compile(&self, source: &str, source_name: &str) -> Result<Self::Script>;

    /// Create a scope, optionally chained under `parent`.
    fn new_scope(&self, parent: Option<&Self::Scope>) -> Self::Scope;

    /// Run a compiled script against `scope` with an optional `this`
    /// binding, reporting operation counts through `observer`.
    fn execute(
        &self,
        script: &Self::Script,
        scope: &ScopeChain<Self::Scope>,
        this: Option<&Value>,
        observer: &mut dyn FnMut(u64) -> Result<()>,
    ) -> Result<Value>;
}

/// Embedder hook rewriting script source before compilation.
pub type ScriptPreProcessor = Box<dyn Fn(&str, &str) -> String + Send + Sync>;

// ---------------------------------------------------------------------------
// ScopeChain
// ---------------------------------------------------------------------------

/// The scope chain a script executes in: an optional element scope resolved
/// first, then the window scope.
#[derive(Debug, Clone)]
pub struct ScopeChain<S> {
    element: Option<S>,
    window: S,
}

impl<S> ScopeChain<S> {
    /// A chain of just the window scope.
    pub fn window(window: S) -> Self {
        Self {
            element: None,
            window,
        }
    }

    /// An element scope resolved before the window scope.
    pub fn element(element: S, window: S) -> Self {
        Self {
            element: Some(element),
            window,
        }
    }

    /// The element scope, if one is chained.
    pub fn element_scope(&self) -> Option<&S> {
        self.element.as_ref()
    }

    /// The window scope at the chain's root.
    pub fn window_scope(&self) -> &S {
        &self.window
    }

    /// Scopes innermost-first.
    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.element.iter().chain(std::iter::once(&self.window))
    }
}

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// What to do with compile and runtime script faults.
///
/// Timeouts are exempt: they are always fatal to the triggering call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptErrorPolicy {
    /// Return the fault to the caller.
    #[default]
    Propagate,
    /// Log the fault and report `undefined` as the script result.
    LogOnly,
}

/// One page's script execution environment.
pub struct ExecutionContext<I: Interpreter> {
    interpreter: I,
    window_scope: I::Scope,
    profile: CapabilityProfile,
    timeout: Option<Duration>,
    policy: ScriptErrorPolicy,
    clock: Arc<dyn Clock>,
    preprocessor: Option<ScriptPreProcessor>,
    running: AtomicBool,
    started_at: Mutex<Option<Instant>>,
}

impl<I: Interpreter> ExecutionContext<I> {
    /// Create a context for `profile`, with a fresh window scope, no timeout
    /// and the propagate error policy.
    pub fn new(interpreter: I, profile: CapabilityProfile) -> Self {
        let window_scope = interpreter.new_scope(None);
        Self {
            interpreter,
            window_scope,
            profile,
            timeout: None,
            policy: ScriptErrorPolicy::default(),
            clock: Arc::new(SystemClock),
            preprocessor: None,
            running: AtomicBool::new(false),
            started_at: Mutex::new(None),
        }
    }

    /// Set the script timeout in milliseconds; zero or negative disables it.
    pub fn with_timeout_millis(mut self, millis: i64) -> Self {
        self.timeout = if millis > 0 {
            Some(Duration::from_millis(millis as u64))
        } else {
            None
        };
        self
    }

    /// Set the fault policy for compile and runtime script errors.
    pub fn with_error_policy(mut self, policy: ScriptErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the time source (deterministic tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Install a source pre-processor applied before compilation.
    pub fn with_preprocessor(mut self, preprocessor: ScriptPreProcessor) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }

    /// The configured timeout, if enabled.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The configured fault policy.
    pub fn error_policy(&self) -> ScriptErrorPolicy {
        self.policy
    }

    /// The simulated browser this context executes for.
    pub fn profile(&self) -> &CapabilityProfile {
        &self.profile
    }

    /// The interpreter handle.
    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }

    /// The root window scope.
    pub fn window_scope(&self) -> &I::Scope {
        &self.window_scope
    }

    /// True while a top-level execution is in flight. Collaborators use
    /// this to defer side effects that must not run inside script.
    pub fn is_script_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// A chain of just this context's window scope.
    pub fn window_chain(&self) -> ScopeChain<I::Scope> {
        ScopeChain::window(self.window_scope.clone())
    }

    /// A fresh element scope chained under the window scope.
    pub fn new_element_scope(&self) -> I::Scope {
        self.interpreter.new_scope(Some(&self.window_scope))
    }

    /// An element-over-window chain for event-handler style execution.
    pub fn element_chain(&self, element: I::Scope) -> ScopeChain<I::Scope> {
        ScopeChain::element(element, self.window_scope.clone())
    }

    /// Compile `source` under `source_name`, after pre-processing and
    /// legacy inline-comment cleanup.
    pub fn compile(&self, source: &str, source_name: &str) -> Result<I::Script> {
        let source = match &self.preprocessor {
            Some(preprocessor) => preprocessor(source, source_name),
            None => source.to_string(),
        };
        let source = self.clean_inline_wrapper(&source);
        self.interpreter.compile(&source, source_name)
    }

    /// Inline scripts historically arrive wrapped in HTML comments. The
    /// leading `<!--` becomes a line comment; the legacy family also drops
    /// a trailing line holding an uncommented `-->`.
    fn clean_inline_wrapper(&self, source: &str) -> String {
        let trimmed = source.trim();
        let mut cleaned = if trimmed.starts_with("<!--") {
            source.replacen("<!--", "// <!--", 1)
        } else {
            source.to_string()
        };
        if self.profile.family() == BrowserFamily::InternetExplorer && trimmed.ends_with("-->") {
            let last_comment = cleaned.rfind("//").map(|i| i as isize).unwrap_or(-1);
            let last_newline = cleaned
                .rfind(['\n', '\r'])
                .map(|i| i as isize)
                .unwrap_or(-1);
            if last_newline > last_comment {
                cleaned.truncate(last_newline as usize);
            }
        }
        cleaned
    }

    /// Execute a compiled script. Nested calls (a native reached from the
    /// running script executing more script) share the outer call's
    /// deadline; the clock starts only at the top-level entry.
    pub fn execute(
        &self,
        script: &I::Script,
        scope: &ScopeChain<I::Scope>,
        this: Option<&Value>,
    ) -> Result<Value> {
        let top_level = !self.running.swap(true, Ordering::SeqCst);
        if top_level {
            *self.started_at.lock().unwrap() = Some(self.clock.now());
        }
        let result = self.run_observed(script, scope, this);
        if top_level {
            self.running.store(false, Ordering::SeqCst);
            *self.started_at.lock().unwrap() = None;
        }
        self.apply_policy(result)
    }

    /// Compile and execute in one step.
    pub fn execute_source(
        &self,
        source: &str,
        source_name: &str,
        scope: &ScopeChain<I::Scope>,
        this: Option<&Value>,
    ) -> Result<Value> {
        match self.compile(source, source_name) {
            Ok(script) => self.execute(&script, scope, this),
            Err(err) => self.apply_policy(Err(err)),
        }
    }

    fn run_observed(
        &self,
        script: &I::Script,
        scope: &ScopeChain<I::Scope>,
        this: Option<&Value>,
    ) -> Result<Value> {
        let limit = self.timeout;
        let clock = self.clock.clone();
        let started_at = self
            .started_at
            .lock()
            .unwrap()
            .unwrap_or_else(|| clock.now());
        let mut observer = move |_operations: u64| -> Result<()> {
            if let Some(limit) = limit {
                let elapsed = clock.now().saturating_duration_since(started_at);
                if elapsed > limit {
                    return Err(Error::timeout(
                        elapsed.as_millis() as u64,
                        limit.as_millis() as u64,
                    ));
                }
            }
            Ok(())
        };
        self.interpreter.execute(script, scope, this, &mut observer)
    }

    fn apply_policy(&self, result: Result<Value>) -> Result<Value> {
        match result {
            Err(err) if err.is_timeout() => {
                tracing::warn!(error = %err, "script terminated by timeout");
                Err(err)
            }
            Err(err) if err.is_script_fault() => match self.policy {
                ScriptErrorPolicy::Propagate => Err(err),
                ScriptErrorPolicy::LogOnly => {
                    tracing::warn!(error = %err, "script error swallowed by policy");
                    Ok(Value::Undefined)
                }
            },
            other => other,
        }
    }
}
