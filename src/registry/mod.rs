//! Host-class descriptor tables and capability-filtered bindings.
//!
//! Embedders declare, per native host class, an ordered table of member
//! descriptors (getters, setters, methods, statics, constants, an optional
//! constructor and optional alternate exposed names), each carrying an
//! [`Applicability`] declaration. The [`HostClassRegistry`] turns one such
//! table plus a [`CapabilityProfile`] into a [`ClassBinding`]: the resolved,
//! profile-specific member map the dynamic dispatch layer works from.
//!
//! Bindings are pure functions of (class, profile) and are cached per that
//! pair for the registry's lifetime. Concurrent first builds may race; the
//! last finished build wins the cache slot and the results are identical
//! either way.

use crate::error::{messages, Error, Result};
use crate::profile::{Applicability, CapabilityProfile};
use crate::value::Value;
use rustc_hash::FxHashMap as HashMap;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock};
use string_interner::{DefaultStringInterner, DefaultSymbol};
use unicode_xid::UnicodeXID;

// ---------------------------------------------------------------------------
// Native handles – erased host values and member callables
// ---------------------------------------------------------------------------

/// An erased, shareable native host value (a DOM node, a window, ...).
pub type NativeHandle = Arc<dyn Any + Send + Sync>;

/// Downcast a native handle to its concrete type, with a typed host error
/// instead of a panic on mismatch.
pub fn downcast_native<T: 'static>(native: &NativeHandle) -> Result<&T> {
    native
        .downcast_ref::<T>()
        .ok_or_else(|| Error::host(format!("native value is not a {}", std::any::type_name::<T>())))
}

macro_rules! callable_handle {
    ($(#[$doc:meta])* $name:ident, ($($arg:ident: $ty:ty),*) -> $ret:ty) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub struct $name(Arc<dyn Fn($($ty),*) -> $ret + Send + Sync>);

        impl $name {
            /// Wrap a native implementation.
            pub fn new(f: impl Fn($($ty),*) -> $ret + Send + Sync + 'static) -> Self {
                Self(Arc::new(f))
            }

            /// Invoke the native implementation.
            pub fn call(&self, $($arg: $ty),*) -> $ret {
                (self.0)($($arg),*)
            }

            /// Pointer identity: true when both handles wrap the same
            /// registered implementation.
            pub fn ptr_eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0)
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.ptr_eq(other)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "(..)"))
            }
        }
    };
}

callable_handle!(
    /// Instance property getter: reads a value off a native.
    GetterFn, (native: &NativeHandle) -> Result<Value>
);
callable_handle!(
    /// Instance property setter: writes a (possibly coerced) value.
    SetterFn, (native: &NativeHandle, value: Value) -> Result<()>
);
callable_handle!(
    /// Instance method: invoked with the receiver's native and arguments.
    MethodFn, (native: &NativeHandle, args: &[Value]) -> Result<Value>
);
callable_handle!(
    /// Class-level getter: no receiver.
    StaticGetterFn, () -> Result<Value>
);
callable_handle!(
    /// Class-level callable: no receiver.
    StaticFn, (args: &[Value]) -> Result<Value>
);
callable_handle!(
    /// Constructor: produces a fresh native for the embedder to wrap.
    ConstructorFn, (args: &[Value]) -> Result<NativeHandle>
);

// ---------------------------------------------------------------------------
// Member descriptors
// ---------------------------------------------------------------------------

/// Conversion applied to an incoming value before a setter runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coercion {
    /// Pass the value through unchanged.
    #[default]
    None,
    /// Apply script-style textual conversion (`Value::coerce_string`).
    Text,
}

/// The declared role of one member descriptor.
///
/// `StaticMethod` and `StaticFunction` are two accepted spellings for a
/// class-level callable and resolve identically; a name declared under both
/// is still a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Constructor,
    Getter,
    Setter,
    Method,
    StaticMethod,
    StaticGetter,
    StaticFunction,
    Constant,
}

#[derive(Debug, Clone)]
pub(crate) enum MemberTarget {
    Getter(GetterFn),
    Setter(SetterFn, Coercion),
    Method(MethodFn),
    StaticGetter(StaticGetterFn),
    StaticCallable(StaticFn),
    Constant(Value),
    Constructor(ConstructorFn),
}

/// One declared member of a host class.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    name: String,
    kind: MemberKind,
    target: MemberTarget,
    applicability: Applicability,
}

impl MemberDescriptor {
    /// The exposed member name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared member kind.
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// The declared applicability ranges.
    pub fn applicability(&self) -> &Applicability {
        &self.applicability
    }
}

/// An alternate script-facing name for a class, gated by profile.
#[derive(Debug, Clone)]
pub struct ExposedName {
    pub name: String,
    pub applicability: Applicability,
}

// ---------------------------------------------------------------------------
// Host class definitions
// ---------------------------------------------------------------------------

/// How member enumeration treats the parent chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassShape {
    /// Own declarations only; lookup falls back through the parent binding
    /// at dispatch time. The normal shape for prototype objects.
    #[default]
    Prototype,
    /// Own + full ancestor chain flattened into one binding (child
    /// declarations shadow ancestors). Used for global-like objects that
    /// carry their whole inheritance inline.
    Instance,
}

/// The declarative table for one host class.
///
/// Built once at startup through the builder methods and registered with a
/// [`HostClassRegistry`]; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct HostClassDef {
    name: String,
    shape: ClassShape,
    parent: Option<String>,
    members: Vec<MemberDescriptor>,
    alternate_names: Vec<ExposedName>,
}

impl HostClassDef {
    /// Start a definition for the class registered under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: ClassShape::Prototype,
            parent: None,
            members: Vec::new(),
            alternate_names: Vec::new(),
        }
    }

    /// Flatten the full ancestor chain into this class's binding.
    pub fn instance_shaped(mut self) -> Self {
        self.shape = ClassShape::Instance;
        self
    }

    /// Name the parent class (prototype link / flattening source).
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Declare a property getter.
    pub fn getter(
        mut self,
        name: impl Into<String>,
        applicability: Applicability,
        f: impl Fn(&NativeHandle) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.members.push(MemberDescriptor {
            name: name.into(),
            kind: MemberKind::Getter,
            target: MemberTarget::Getter(GetterFn::new(f)),
            applicability,
        });
        self
    }

    /// Declare a property setter taking the raw incoming value.
    pub fn setter(
        self,
        name: impl Into<String>,
        applicability: Applicability,
        f: impl Fn(&NativeHandle, Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.push_setter(name.into(), applicability, Coercion::None, f)
    }

    /// Declare a property setter whose parameter is textual: incoming values
    /// are converted with `Value::coerce_string` before the call.
    pub fn text_setter(
        self,
        name: impl Into<String>,
        applicability: Applicability,
        f: impl Fn(&NativeHandle, Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.push_setter(name.into(), applicability, Coercion::Text, f)
    }

    fn push_setter(
        mut self,
        name: String,
        applicability: Applicability,
        coercion: Coercion,
        f: impl Fn(&NativeHandle, Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.members.push(MemberDescriptor {
            name,
            kind: MemberKind::Setter,
            target: MemberTarget::Setter(SetterFn::new(f), coercion),
            applicability,
        });
        self
    }

    /// Declare an instance method.
    pub fn method(
        mut self,
        name: impl Into<String>,
        applicability: Applicability,
        f: impl Fn(&NativeHandle, &[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.members.push(MemberDescriptor {
            name: name.into(),
            kind: MemberKind::Method,
            target: MemberTarget::Method(MethodFn::new(f)),
            applicability,
        });
        self
    }

    /// Declare a constant, visible through instances and the class object.
    pub fn constant(
        mut self,
        name: impl Into<String>,
        applicability: Applicability,
        value: impl Into<Value>,
    ) -> Self {
        self.members.push(MemberDescriptor {
            name: name.into(),
            kind: MemberKind::Constant,
            target: MemberTarget::Constant(value.into()),
            applicability,
        });
        self
    }

    /// Declare a class-level getter.
    pub fn static_getter(
        mut self,
        name: impl Into<String>,
        applicability: Applicability,
        f: impl Fn() -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.members.push(MemberDescriptor {
            name: name.into(),
            kind: MemberKind::StaticGetter,
            target: MemberTarget::StaticGetter(StaticGetterFn::new(f)),
            applicability,
        });
        self
    }

    /// Declare a class-level callable under the `StaticMethod` spelling.
    pub fn static_method(
        self,
        name: impl Into<String>,
        applicability: Applicability,
        f: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.push_static(name.into(), MemberKind::StaticMethod, applicability, f)
    }

    /// Declare a class-level callable under the `StaticFunction` spelling.
    pub fn static_function(
        self,
        name: impl Into<String>,
        applicability: Applicability,
        f: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.push_static(name.into(), MemberKind::StaticFunction, applicability, f)
    }

    fn push_static(
        mut self,
        name: String,
        kind: MemberKind,
        applicability: Applicability,
        f: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.members.push(MemberDescriptor {
            name,
            kind,
            target: MemberTarget::StaticCallable(StaticFn::new(f)),
            applicability,
        });
        self
    }

    /// Declare the constructor.
    pub fn constructor(
        mut self,
        applicability: Applicability,
        f: impl Fn(&[Value]) -> Result<NativeHandle> + Send + Sync + 'static,
    ) -> Self {
        self.members.push(MemberDescriptor {
            name: "constructor".to_string(),
            kind: MemberKind::Constructor,
            target: MemberTarget::Constructor(ConstructorFn::new(f)),
            applicability,
        });
        self
    }

    /// Declare an alternate exposed name. Once any alternate is declared,
    /// exactly one must be applicable per profile; the canonical name no
    /// longer applies by default.
    pub fn alias(mut self, name: impl Into<String>, applicability: Applicability) -> Self {
        self.alternate_names.push(ExposedName {
            name: name.into(),
            applicability,
        });
        self
    }

    /// The canonical (registration) class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared shape.
    pub fn shape(&self) -> ClassShape {
        self.shape
    }

    /// The declared parent class name, if any.
    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// The ordered member descriptors.
    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    fn validate(&self) -> Result<()> {
        if !is_valid_identifier(&self.name) {
            return Err(Error::configuration(
                &self.name,
                messages::invalid_identifier(&self.name),
            ));
        }
        for member in &self.members {
            if member.kind != MemberKind::Constructor && !is_valid_identifier(&member.name) {
                return Err(Error::configuration(
                    &self.name,
                    messages::invalid_identifier(&member.name),
                ));
            }
        }
        for alternate in &self.alternate_names {
            if !is_valid_identifier(&alternate.name) {
                return Err(Error::configuration(
                    &self.name,
                    messages::invalid_identifier(&alternate.name),
                ));
            }
        }
        Ok(())
    }
}

/// Script identifier check: XID start/continue plus `$` and leading `_`.
fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '$' || c == '_' || UnicodeXID::is_xid_start(c) => {}
        _ => return false,
    }
    chars.all(|c| c == '$' || UnicodeXID::is_xid_continue(c))
}

// ---------------------------------------------------------------------------
// Resolved bindings
// ---------------------------------------------------------------------------

/// Interned identity of a registered host class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(DefaultSymbol);

/// A merged getter/setter pair. A missing setter makes the property
/// read-only; writes to it are silently ignored at dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProperty {
    getter: GetterFn,
    setter: Option<SetterFn>,
    coercion: Coercion,
}

impl ResolvedProperty {
    /// The property's getter.
    pub fn getter(&self) -> &GetterFn {
        &self.getter
    }

    /// The property's setter, absent for read-only properties.
    pub fn setter(&self) -> Option<&SetterFn> {
        self.setter.as_ref()
    }

    /// The setter's declared incoming-value conversion.
    pub fn coercion(&self) -> Coercion {
        self.coercion
    }

    /// True when no setter was declared.
    pub fn is_read_only(&self) -> bool {
        self.setter.is_none()
    }
}

/// An instance-side member resolved on a binding.
#[derive(Debug, Clone, Copy)]
pub enum MemberRef<'a> {
    Property(&'a ResolvedProperty),
    Method(&'a MethodFn),
    Constant(&'a Value),
}

/// A class-object-side member resolved on a binding.
#[derive(Debug, Clone, Copy)]
pub enum StaticMemberRef<'a> {
    Getter(&'a StaticGetterFn),
    Callable(&'a StaticFn),
    Constant(&'a Value),
}

/// The resolved, profile-specific member map of one host class.
#[derive(Debug)]
pub struct ClassBinding {
    class_id: ClassId,
    class_name: String,
    exposed_name: String,
    shape: ClassShape,
    properties: HashMap<String, ResolvedProperty>,
    methods: HashMap<String, MethodFn>,
    constants: HashMap<String, Value>,
    static_getters: HashMap<String, StaticGetterFn>,
    static_callables: HashMap<String, StaticFn>,
    constructor: Option<ConstructorFn>,
    parent: Option<Arc<ClassBinding>>,
}

impl ClassBinding {
    /// The interned class identity.
    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    /// The canonical (registration) class name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The script-facing name selected for the profile.
    pub fn exposed_name(&self) -> &str {
        &self.exposed_name
    }

    /// The declared shape.
    pub fn shape(&self) -> ClassShape {
        self.shape
    }

    /// The parent binding, when this class links into a prototype chain.
    pub fn parent(&self) -> Option<&Arc<ClassBinding>> {
        self.parent.as_ref()
    }

    /// Look up an instance-side member declared on this binding (no chain
    /// walk; dispatch handles the chain).
    pub fn member(&self, name: &str) -> Option<MemberRef<'_>> {
        if let Some(property) = self.properties.get(name) {
            return Some(MemberRef::Property(property));
        }
        if let Some(method) = self.methods.get(name) {
            return Some(MemberRef::Method(method));
        }
        self.constants.get(name).map(MemberRef::Constant)
    }

    /// Look up a class-object-side member (statics and constants).
    pub fn static_member(&self, name: &str) -> Option<StaticMemberRef<'_>> {
        if let Some(getter) = self.static_getters.get(name) {
            return Some(StaticMemberRef::Getter(getter));
        }
        if let Some(callable) = self.static_callables.get(name) {
            return Some(StaticMemberRef::Callable(callable));
        }
        self.constants.get(name).map(StaticMemberRef::Constant)
    }

    /// The merged property for `name`, if one resolved.
    pub fn property(&self, name: &str) -> Option<&ResolvedProperty> {
        self.properties.get(name)
    }

    /// The method for `name`, if one resolved.
    pub fn method(&self, name: &str) -> Option<&MethodFn> {
        self.methods.get(name)
    }

    /// The constant for `name`, if one resolved.
    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    /// The constructor binding, if one is applicable.
    pub fn constructor(&self) -> Option<&ConstructorFn> {
        self.constructor.as_ref()
    }

    /// True when `name` resolves to an instance-side member on this binding.
    pub fn has_member(&self, name: &str) -> bool {
        self.member(name).is_some()
    }

    /// Sorted instance-side member names declared on this binding.
    pub fn member_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .properties
            .keys()
            .chain(self.methods.keys())
            .chain(self.constants.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Eq, Hash)]
struct BindingKey {
    class: ClassId,
    profile: CapabilityProfile,
}

struct RegistryInner {
    interner: DefaultStringInterner,
    classes: HashMap<ClassId, Arc<HostClassDef>>,
    cache: HashMap<BindingKey, Arc<ClassBinding>>,
}

/// Builds and caches [`ClassBinding`]s per (class, profile) pair.
///
/// Registration happens once at startup; `binding` is then callable from any
/// thread. The cache lives as long as the registry.
pub struct HostClassRegistry {
    inner: RwLock<RegistryInner>,
}

impl HostClassRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                interner: DefaultStringInterner::new(),
                classes: HashMap::default(),
                cache: HashMap::default(),
            }),
        }
    }

    /// Register one host-class table. Rejects malformed names and duplicate
    /// registrations.
    pub fn register(&self, def: HostClassDef) -> Result<()> {
        def.validate()?;
        let mut inner = self.inner.write().unwrap();
        let id = ClassId(inner.interner.get_or_intern(&def.name));
        if inner.classes.contains_key(&id) {
            return Err(Error::configuration(&def.name, messages::ALREADY_REGISTERED));
        }
        tracing::debug!(class = %def.name, members = def.members.len(), "registered host class");
        inner.classes.insert(id, Arc::new(def));
        Ok(())
    }

    /// True when `name` is a registered class.
    pub fn contains(&self, name: &str) -> bool {
        let inner = self.inner.read().unwrap();
        inner
            .interner
            .get(name)
            .is_some_and(|sym| inner.classes.contains_key(&ClassId(sym)))
    }

    /// Sorted canonical names of every registered class.
    pub fn class_names(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        let mut names: Vec<String> = inner
            .classes
            .values()
            .map(|def| def.name.clone())
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().classes.len()
    }

    /// True when no class is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The binding for (`class_name`, `profile`), built on first use and
    /// cached afterwards.
    pub fn binding(
        &self,
        class_name: &str,
        profile: &CapabilityProfile,
    ) -> Result<Arc<ClassBinding>> {
        let id = {
            let inner = self.inner.read().unwrap();
            let id = inner
                .interner
                .get(class_name)
                .map(ClassId)
                .filter(|id| inner.classes.contains_key(id))
                .ok_or_else(|| {
                    Error::configuration(class_name, "is not a registered host class")
                })?;
            let key = BindingKey {
                class: id,
                profile: profile.clone(),
            };
            if let Some(hit) = inner.cache.get(&key) {
                return Ok(hit.clone());
            }
            id
        };

        // Build outside the cache's write lock; the computation is pure, so
        // a racing builder produces identical content and the later insert
        // simply wins the slot.
        let built = {
            let inner = self.inner.read().unwrap();
            let mut visiting = Vec::new();
            build_binding(&inner, id, profile, &mut visiting)?
        };

        let mut inner = self.inner.write().unwrap();
        let mut link = Some(&built);
        while let Some(binding) = link {
            inner.cache.insert(
                BindingKey {
                    class: binding.class_id,
                    profile: profile.clone(),
                },
                binding.clone(),
            );
            link = binding.parent.as_ref();
        }
        Ok(built)
    }
}

impl Default for HostClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn build_binding(
    inner: &RegistryInner,
    id: ClassId,
    profile: &CapabilityProfile,
    visiting: &mut Vec<ClassId>,
) -> Result<Arc<ClassBinding>> {
    let key = BindingKey {
        class: id,
        profile: profile.clone(),
    };
    if let Some(hit) = inner.cache.get(&key) {
        return Ok(hit.clone());
    }
    let def = inner
        .classes
        .get(&id)
        .cloned()
        .ok_or_else(|| Error::configuration("?", "is not a registered host class"))?;
    if visiting.contains(&id) {
        return Err(Error::configuration(&def.name, messages::PARENT_CYCLE));
    }
    visiting.push(id);

    let parent = match def.parent.as_deref() {
        Some(parent_name) => {
            let parent_id = inner
                .interner
                .get(parent_name)
                .map(ClassId)
                .filter(|pid| inner.classes.contains_key(pid))
                .ok_or_else(|| {
                    Error::configuration(&def.name, messages::unknown_parent(parent_name))
                })?;
            Some(build_binding(inner, parent_id, profile, visiting)?)
        }
        None => None,
    };

    let exposed_name = select_exposed_name(&def, profile)?;

    let mut members = match (def.shape, &parent) {
        // Instance shape starts from the flattened ancestor view and lets
        // own declarations shadow it.
        (ClassShape::Instance, Some(parent)) => MemberTables::inherited(parent),
        _ => MemberTables::default(),
    };
    let own = MemberTables::from_def(&def, profile)?;
    members.absorb(own);
    let MemberTables {
        properties,
        methods,
        constants,
        static_getters,
        static_callables,
        constructor,
    } = members;

    // Instance-shaped bindings carry their whole chain inline and need no
    // parent link for dispatch.
    let parent = match def.shape {
        ClassShape::Instance => None,
        ClassShape::Prototype => parent,
    };

    tracing::debug!(
        class = %def.name,
        exposed = %exposed_name,
        profile = %profile,
        properties = properties.len(),
        methods = methods.len(),
        constants = constants.len(),
        "built class binding"
    );

    visiting.pop();
    Ok(Arc::new(ClassBinding {
        class_id: id,
        class_name: def.name.clone(),
        exposed_name,
        shape: def.shape,
        properties,
        methods,
        constants,
        static_getters,
        static_callables,
        constructor,
        parent,
    }))
}

fn select_exposed_name(def: &HostClassDef, profile: &CapabilityProfile) -> Result<String> {
    if def.alternate_names.is_empty() {
        return Ok(def.name.clone());
    }
    let mut selected: Option<&ExposedName> = None;
    for alternate in &def.alternate_names {
        if !alternate.applicability.is_applicable(profile) {
            continue;
        }
        if let Some(first) = selected {
            return Err(Error::configuration(
                &def.name,
                messages::ambiguous_name(&first.name, &alternate.name),
            ));
        }
        selected = Some(alternate);
    }
    match selected {
        Some(alternate) => Ok(alternate.name.clone()),
        None => Err(Error::configuration(&def.name, messages::NO_APPLICABLE_NAME)),
    }
}

/// Working tables for one binding build.
#[derive(Default)]
struct MemberTables {
    properties: HashMap<String, ResolvedProperty>,
    methods: HashMap<String, MethodFn>,
    constants: HashMap<String, Value>,
    static_getters: HashMap<String, StaticGetterFn>,
    static_callables: HashMap<String, StaticFn>,
    constructor: Option<ConstructorFn>,
}

impl MemberTables {
    /// Flatten the parent's whole chain into starting tables, root level
    /// first so nearer levels shadow. Constructors never flatten; a class
    /// constructs only through its own declaration.
    fn inherited(parent: &ClassBinding) -> Self {
        let mut chain: Vec<&ClassBinding> = Vec::new();
        let mut current = Some(parent);
        while let Some(binding) = current {
            chain.push(binding);
            current = binding.parent().map(Arc::as_ref);
        }
        let mut tables = MemberTables::default();
        for level in chain.into_iter().rev() {
            tables.absorb(MemberTables::from_binding(level));
        }
        tables
    }

    fn from_binding(binding: &ClassBinding) -> Self {
        Self {
            properties: binding.properties.clone(),
            methods: binding.methods.clone(),
            constants: binding.constants.clone(),
            static_getters: binding.static_getters.clone(),
            static_callables: binding.static_callables.clone(),
            constructor: None,
        }
    }

    /// Filter and merge one definition level. Duplicate applicable
    /// descriptors for one exposed name are fatal here; shadowing across
    /// levels is handled by `absorb`.
    fn from_def(def: &HostClassDef, profile: &CapabilityProfile) -> Result<Self> {
        let class = &def.name;
        let mut getters: HashMap<String, GetterFn> = HashMap::default();
        let mut setters: HashMap<String, (SetterFn, Coercion)> = HashMap::default();
        let mut methods: HashMap<String, MethodFn> = HashMap::default();
        let mut constants: HashMap<String, Value> = HashMap::default();
        let mut static_getters: HashMap<String, StaticGetterFn> = HashMap::default();
        let mut static_callables: HashMap<String, StaticFn> = HashMap::default();
        let mut constructor: Option<ConstructorFn> = None;

        let duplicate =
            |name: &str| Error::configuration(class, messages::duplicate_member(name));

        for member in &def.members {
            if !member.applicability.is_applicable(profile) {
                continue;
            }
            match &member.target {
                MemberTarget::Getter(getter) => {
                    if getters.insert(member.name.clone(), getter.clone()).is_some() {
                        return Err(duplicate(&member.name));
                    }
                }
                MemberTarget::Setter(setter, coercion) => {
                    if setters
                        .insert(member.name.clone(), (setter.clone(), *coercion))
                        .is_some()
                    {
                        return Err(duplicate(&member.name));
                    }
                }
                MemberTarget::Method(method) => {
                    if methods.insert(member.name.clone(), method.clone()).is_some() {
                        return Err(duplicate(&member.name));
                    }
                }
                MemberTarget::Constant(value) => {
                    if constants
                        .insert(member.name.clone(), value.clone())
                        .is_some()
                    {
                        return Err(duplicate(&member.name));
                    }
                }
                MemberTarget::StaticGetter(getter) => {
                    if static_getters
                        .insert(member.name.clone(), getter.clone())
                        .is_some()
                    {
                        return Err(duplicate(&member.name));
                    }
                }
                MemberTarget::StaticCallable(callable) => {
                    if static_callables
                        .insert(member.name.clone(), callable.clone())
                        .is_some()
                    {
                        return Err(duplicate(&member.name));
                    }
                }
                MemberTarget::Constructor(ctor) => {
                    if constructor.replace(ctor.clone()).is_some() {
                        return Err(duplicate("constructor"));
                    }
                }
            }
        }

        // One instance-side namespace: a name may be a property (getter and
        // setter together), a method or a constant, never two of those.
        for name in getters.keys().chain(setters.keys()) {
            if methods.contains_key(name) || constants.contains_key(name) {
                return Err(duplicate(name));
            }
        }
        for name in methods.keys() {
            if constants.contains_key(name) {
                return Err(duplicate(name));
            }
        }
        // Same rule for the class-object namespace.
        for name in static_getters.keys() {
            if static_callables.contains_key(name) {
                return Err(duplicate(name));
            }
        }

        let mut properties: HashMap<String, ResolvedProperty> = HashMap::default();
        for (name, getter) in getters {
            let (setter, coercion) = match setters.remove(&name) {
                Some((setter, coercion)) => (Some(setter), coercion),
                None => (None, Coercion::None),
            };
            properties.insert(
                name,
                ResolvedProperty {
                    getter,
                    setter,
                    coercion,
                },
            );
        }
        // A setter with no getter at its own declaration level never
        // becomes visible. Permissive-host behavior, kept on purpose.
        for name in setters.keys() {
            tracing::debug!(class = %class, property = %name, "dropping setter without getter");
        }

        Ok(Self {
            properties,
            methods,
            constants,
            static_getters,
            static_callables,
            constructor,
        })
    }

    /// Overlay `other` (a more-derived level); its entries shadow ours.
    fn absorb(&mut self, other: MemberTables) {
        self.properties.extend(other.properties);
        self.methods.extend(other.methods);
        self.constants.extend(other.constants);
        self.static_getters.extend(other.static_getters);
        self.static_callables.extend(other.static_callables);
        if other.constructor.is_some() {
            self.constructor = other.constructor;
        }
    }
}
