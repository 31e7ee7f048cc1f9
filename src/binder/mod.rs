//! Dynamic dispatch over resolved class bindings.
//!
//! A [`HostObjectBinder`] pairs one native host value with its
//! [`ClassBinding`] and answers the three questions an interpreter asks of a
//! host object: read a name, write a name, call a name. Resolution walks the
//! binding's parent chain iteratively; dispatch always happens against the
//! original receiver's native, so an ancestor's getter reads the child
//! object it was reached through.
//!
//! Lookup misses are sentinels, never errors: the embedding layer translates
//! [`Fetched::NotFound`] into its own absent-property value. The binder
//! performs no I/O of its own; every side effect lives in the registered
//! native callables.

use crate::error::Result;
use crate::registry::{
    ClassBinding, Coercion, MemberRef, MethodFn, NativeHandle, StaticFn, StaticMemberRef,
};
use crate::value::Value;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Dispatch outcomes
// ---------------------------------------------------------------------------

/// Result of a name read.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    /// A property or constant value.
    Value(Value),
    /// An instance method handle, dispatchable through `invoke` or wrapped
    /// by the embedder as a first-class function.
    Method(MethodFn),
    /// A class-level callable handle.
    StaticCallable(StaticFn),
    /// The name resolves nowhere on the chain. Not an error.
    NotFound,
}

impl Fetched {
    /// The carried value, treating non-values as absent.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Fetched::Value(value) => Some(value),
            _ => None,
        }
    }

    /// True for the miss sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Fetched::NotFound)
    }
}

/// Result of a name write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The setter ran.
    Assigned,
    /// The name is a getter-only property or a constant: the write was
    /// silently ignored. Permissive host semantics.
    ReadOnly,
    /// No such member anywhere on the chain. The embedder's dynamic layer
    /// may store an expando; the binder holds no dynamic state.
    NotFound,
}

/// Result of a name invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeOutcome {
    /// The callee ran and returned this value.
    Returned(Value),
    /// No such member anywhere on the chain.
    NotFound,
    /// The name resolves to a data member, not a callable.
    NotCallable,
}

// ---------------------------------------------------------------------------
// HostObjectBinder – instance-side dispatch
// ---------------------------------------------------------------------------

/// Dynamic get/set/invoke adapter for one native host value.
#[derive(Clone)]
pub struct HostObjectBinder {
    native: NativeHandle,
    binding: Arc<ClassBinding>,
}

impl HostObjectBinder {
    /// Wrap `native` with its resolved binding.
    pub fn new(native: NativeHandle, binding: Arc<ClassBinding>) -> Self {
        Self { native, binding }
    }

    /// The wrapped native value.
    pub fn native(&self) -> &NativeHandle {
        &self.native
    }

    /// The binder's own (most-derived) binding.
    pub fn binding(&self) -> &Arc<ClassBinding> {
        &self.binding
    }

    /// The script-facing class name of the wrapped value.
    pub fn exposed_name(&self) -> &str {
        self.binding.exposed_name()
    }

    /// Resolve `name` along the parent chain, nearest declaration first.
    fn resolve(&self, name: &str) -> Option<MemberRef<'_>> {
        let mut binding: Option<&ClassBinding> = Some(&self.binding);
        while let Some(current) = binding {
            if let Some(member) = current.member(name) {
                return Some(member);
            }
            binding = current.parent().map(Arc::as_ref);
        }
        None
    }

    /// Read `name`. A miss is `Fetched::NotFound`, never an error; a getter
    /// fault propagates.
    pub fn get(&self, name: &str) -> Result<Fetched> {
        match self.resolve(name) {
            Some(MemberRef::Property(property)) => {
                Ok(Fetched::Value(property.getter().call(&self.native)?))
            }
            Some(MemberRef::Method(method)) => Ok(Fetched::Method(method.clone())),
            Some(MemberRef::Constant(value)) => Ok(Fetched::Value(value.clone())),
            None => Ok(Fetched::NotFound),
        }
    }

    /// Write `name`. Getter-only properties and constants swallow the write
    /// and report [`SetOutcome::ReadOnly`]; a method name reports
    /// [`SetOutcome::NotFound`] (shadowing a function slot is the embedder's
    /// dynamic layer, not the binder's).
    pub fn set(&self, name: &str, value: Value) -> Result<SetOutcome> {
        match self.resolve(name) {
            Some(MemberRef::Property(property)) => match property.setter() {
                Some(setter) => {
                    let value = match property.coercion() {
                        Coercion::Text => Value::Text(value.coerce_string()),
                        Coercion::None => value,
                    };
                    setter.call(&self.native, value)?;
                    Ok(SetOutcome::Assigned)
                }
                None => {
                    tracing::debug!(
                        class = %self.binding.exposed_name(),
                        property = %name,
                        "ignoring write to getter-only property"
                    );
                    Ok(SetOutcome::ReadOnly)
                }
            },
            Some(MemberRef::Constant(_)) => {
                tracing::debug!(
                    class = %self.binding.exposed_name(),
                    property = %name,
                    "ignoring write to constant"
                );
                Ok(SetOutcome::ReadOnly)
            }
            Some(MemberRef::Method(_)) => Ok(SetOutcome::NotFound),
            None => Ok(SetOutcome::NotFound),
        }
    }

    /// Call `name` with `args`. Resolution follows the same chain as `get`;
    /// arity is the callee's concern and is never validated here.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<InvokeOutcome> {
        match self.resolve(name) {
            Some(MemberRef::Method(method)) => {
                Ok(InvokeOutcome::Returned(method.call(&self.native, args)?))
            }
            Some(_) => Ok(InvokeOutcome::NotCallable),
            None => Ok(InvokeOutcome::NotFound),
        }
    }

    /// True when `name` resolves anywhere on the chain.
    pub fn has_member(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Sorted union of member names across the chain (for enumeration).
    pub fn member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut binding: Option<&ClassBinding> = Some(&self.binding);
        while let Some(current) = binding {
            for name in current.member_names() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
            binding = current.parent().map(Arc::as_ref);
        }
        names.sort_unstable();
        names
    }
}

// ---------------------------------------------------------------------------
// HostClassObject – class-object-side dispatch
// ---------------------------------------------------------------------------

/// Dispatch adapter for the class object itself: constants, class-level
/// getters and callables, and construction. Statics do not inherit, so no
/// chain walk happens here.
#[derive(Clone)]
pub struct HostClassObject {
    binding: Arc<ClassBinding>,
}

impl HostClassObject {
    /// Wrap a resolved binding's class-object side.
    pub fn new(binding: Arc<ClassBinding>) -> Self {
        Self { binding }
    }

    /// The underlying binding.
    pub fn binding(&self) -> &Arc<ClassBinding> {
        &self.binding
    }

    /// The script-facing class name.
    pub fn exposed_name(&self) -> &str {
        self.binding.exposed_name()
    }

    /// Read `name` off the class object.
    pub fn get(&self, name: &str) -> Result<Fetched> {
        match self.binding.static_member(name) {
            Some(StaticMemberRef::Getter(getter)) => Ok(Fetched::Value(getter.call()?)),
            Some(StaticMemberRef::Callable(callable)) => {
                Ok(Fetched::StaticCallable(callable.clone()))
            }
            Some(StaticMemberRef::Constant(value)) => Ok(Fetched::Value(value.clone())),
            None => Ok(Fetched::NotFound),
        }
    }

    /// Call the class-level callable `name`.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<InvokeOutcome> {
        match self.binding.static_member(name) {
            Some(StaticMemberRef::Callable(callable)) => {
                Ok(InvokeOutcome::Returned(callable.call(args)?))
            }
            Some(_) => Ok(InvokeOutcome::NotCallable),
            None => Ok(InvokeOutcome::NotFound),
        }
    }

    /// Run the constructor, producing a fresh native for the embedder to
    /// wrap. `Ok(None)` when the class has no applicable constructor.
    pub fn construct(&self, args: &[Value]) -> Result<Option<NativeHandle>> {
        match self.binding.constructor() {
            Some(ctor) => Ok(Some(ctor.call(args)?)),
            None => Ok(None),
        }
    }
}
