mod builtin;
pub mod pe;
mod registry;
mod scanner;
mod signature;

pub use builtin::*;
pub use registry::*;
pub use scanner::*;
pub use signature::*;
