//! App layer - the facade a front end drives

mod workbench;

pub use workbench::Workbench;
