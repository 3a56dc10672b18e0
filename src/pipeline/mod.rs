pub mod element;
pub mod filters;
pub mod lookups;

pub use element::*;
