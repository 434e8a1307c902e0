//! Transport layer: TCP stream setup.

mod tcp;

pub use tcp::RenderListener;
