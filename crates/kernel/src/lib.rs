pub mod module;
pub mod registry;
pub mod settings;
pub mod source;

pub use module::{InitCtx, Module};
pub use registry::ModuleRegistry;
pub use source::{KeyValueSource, SharedSource};
