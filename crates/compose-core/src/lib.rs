mod commands;
mod core;
mod html;
mod input;
mod ops;
mod palette;
mod plugin;
mod text;
mod value;

pub use crate::commands::*;
pub use crate::core::*;
pub use crate::html::*;
pub use crate::input::*;
pub use crate::ops::*;
pub use crate::palette::*;
pub use crate::plugin::*;
pub use crate::value::*;
