//! Gossamer: host-object binding and script scheduling for a headless browser runtime.
//!
//! Gossamer is the glue layer between a DOM implementation and an embedded
//! JavaScript interpreter. It decides which host classes and members a
//! simulated browser exposes, binds native objects behind prototype chains,
//! drives script execution under wall-clock timeouts, and schedules the
//! timer jobs page scripts spawn. It deliberately contains no parser, no
//! DOM and no network stack; those live on either side of this crate.
//!
//! # Quick start
//!
//! ```no_run
//! use gossamer::prelude::*;
//! use std::sync::Arc;
//!
//! struct Document;
//!
//! fn main() -> gossamer::Result<()> {
//!     let registry = HostClassRegistry::new();
//!     registry.register(
//!         HostClassDef::new("Document")
//!             .getter("title", Applicability::all(), |_| Ok(Value::from("Home"))),
//!     )?;
//!
//!     let profile = CapabilityProfile::chrome();
//!     let binding = registry.binding("Document", &profile)?;
//!     let document = HostObjectBinder::new(Arc::new(Document), binding);
//!     let title = document.get("title")?.into_value();
//!     println!("{title:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Module overview
//!
//! Exposure flows: class declarations → [`registry`] filtered by a
//! [`profile`] → per-object [`binder`] dispatch → scripts run in a
//! [`context`] while [`jobs`] covers their timers.
//!
//! | Category | Modules |
//! |----------|---------|
//! | **Exposure** | [`profile`], [`registry`] |
//! | **Dispatch** | [`binder`], [`value`] |
//! | **Execution** | [`context`], [`jobs`] |
//! | **Host model** | [`window`], [`clock`], [`error`](Error) |

pub mod binder;
pub mod clock;
pub mod context;
pub mod jobs;
pub mod prelude;
pub mod profile;
pub mod registry;
pub mod value;
pub mod window;

mod error;

pub use binder::{Fetched, HostClassObject, HostObjectBinder, InvokeOutcome, SetOutcome};
pub use error::{Error, Result, SourceLocation};
pub use profile::{Applicability, BrowserFamily, BrowserFeatures, CapabilityProfile};
pub use registry::{ClassBinding, ClassShape, HostClassDef, HostClassRegistry};
pub use value::Value;

/// Gossamer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
