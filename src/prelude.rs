//! Prelude module for convenient imports
//!
//! This module provides the most commonly used types and traits for working
//! with Gossamer. Import everything from this module for quick access:
//!
//! ```no_run
//! use gossamer::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let registry = HostClassRegistry::new();
//!     registry.register(
//!         HostClassDef::new("Navigator")
//!             .getter("userAgent", Applicability::all(), |_| Ok(Value::from("Gossamer"))),
//!     )?;
//!     let binding = registry.binding("Navigator", &CapabilityProfile::firefox())?;
//!     println!("{}", binding.exposed_name());
//!     Ok(())
//! }
//! ```

// Browser capability profiles
pub use crate::profile::{
    Applicability, ApplicableRange, BrowserFamily, BrowserFeatures, CapabilityProfile,
};

// Class declaration and binding
pub use crate::registry::{
    ClassBinding, ClassShape, Coercion, GetterFn, HostClassDef, HostClassRegistry, MethodFn,
    NativeHandle, SetterFn,
};

// Object dispatch
pub use crate::binder::{Fetched, HostClassObject, HostObjectBinder, InvokeOutcome, SetOutcome};

// Script execution
pub use crate::context::{
    ExecutionContext, Interpreter, ScopeChain, ScriptErrorPolicy, ScriptPreProcessor,
    STEP_OBSERVER_THRESHOLD,
};

// Background jobs
pub use crate::jobs::executor::JobExecutor;
pub use crate::jobs::{JobCallback, JobId, JobManager, JobManagerStats, JobSpec, JobView};

// Host model
pub use crate::clock::{Clock, SystemClock, VirtualClock};
pub use crate::window::{HostWindow, PageId, Window, WindowId};

// Script values
pub use crate::value::Value;

// Error handling
pub use crate::error::{Error, Result, SourceLocation};

// Version constant
pub use crate::VERSION;
