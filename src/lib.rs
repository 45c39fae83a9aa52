//! dotnet-bridge - call into a hosted .NET runtime without generated bindings
//!
//! Design: the bridge is layered leaves-first.
//! - `host`: loads hostfxr, initializes a runtime context, resolves entry points
//! - `marshal`: type-driven conversion between Rust values and wire values
//! - `function`: typed binders over raw function pointers
//! - `adapter`: process-wide facade over the glue component's entry points
//! - `object`: reference-counted managed object handles and typed wrappers
//! - `safe`: exception-capturing calls surfaced as `Result`
//! - `bridge`: events, interface callbacks and interface proxies
//!
//! Every cross-boundary call funnels through [`adapter::Adapter`]. Handles
//! ([`ObjectRef`]) own exactly one GC reference in the hosted runtime and must
//! not outlive it.

pub mod adapter;
pub mod bridge;
pub mod config;
pub mod error;
pub mod function;
pub mod host;
pub mod logging;
pub mod marshal;
pub mod object;
pub mod safe;

pub use adapter::{adapter, Adapter, EntryPointResolver, GlueNames, Stats};
pub use bridge::{
    Callback, CallbackDelegate, EventHandler, EventQueue, EventSubscription, InterfaceProxy,
    QueuedEvent,
};
pub use config::BridgeConfig;
pub use error::{Error, HostError, Result};
pub use function::Function;
pub use host::{Host, RuntimeConfig};
pub use marshal::{AsArg, Inbound, Null, Outbound, Parameter, Parameters, TypeOf, UnmanagedType};
pub use object::{
    DotNetArray, DotNetException, DotNetObject, DotNetType, ManagedObject, ObjectRef,
    TypeDescriptor,
};
pub use safe::{SafeMethod, SafeReturn};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
