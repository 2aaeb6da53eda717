mod scheduler;
mod selection;
mod state;
mod toolbar;
mod types;

pub use scheduler::*;
pub use selection::*;
pub use state::*;
pub use toolbar::*;
pub use types::*;
