mod handles;
mod state;
mod tracking;

pub use handles::*;
pub use state::*;
pub use tracking::*;
