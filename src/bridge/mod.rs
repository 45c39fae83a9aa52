//! Bridge - managed code calling back into Rust
//!
//! Design: three shapes of callback share one context registry:
//! - [`EventSubscription`]: a managed event forwarded to an [`EventHandler`]
//! - [`Callback`]: a Rust closure behind one method of an interface
//! - [`InterfaceProxy`]: a managed object whose methods are such callbacks
//!
//! Contexts handed to the glue component are registry keys. Whoever registered
//! one unregisters it on drop, after which calls carrying it are logged and
//! ignored.

mod callback;
mod events;
mod interface;
mod registry;

pub use callback::{Callback, CallbackDelegate};
pub use events::{EventHandler, EventQueue, EventSubscription, QueuedEvent};
pub use interface::InterfaceProxy;
pub use registry::live_contexts;
