// S2 Runtime Library Entry Point
// Layers collect one style layer's declarations; a Context folds an ordered
// stack of them into the namespace compiled style programs run against.

pub mod builtin;
pub mod context;
pub mod error;
pub mod layer;
pub mod loader;
pub mod manifest;
pub mod stdlib;
pub mod value;

// Re-export commonly used types
pub use builtin::{BuiltinFn, Builtins};
pub use context::{Context, CustomizePropGroup, PrintFn};
pub use error::{RuntimeError, RuntimeResult};
pub use layer::{make_function, Attributes, Function, Layer, PropGroup, PropMeta};
pub use loader::LayerLoader;
pub use manifest::LayerManifest;
pub use value::{Object, Value};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn make_layer() -> Layer {
    Layer::new()
}

pub fn make_context(layers: Vec<Layer>) -> Context {
    Context::new(layers)
}

/// Get version string
pub fn version() -> String {
    format!("s2runtime v{}", VERSION)
}
