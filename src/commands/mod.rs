mod control;
mod deps;
mod list;

pub use control::control;
pub use deps::{add, check, list as list_deps, remove};
pub use list::list;
