mod params;
mod parse;
mod predicate;

pub use params::{KindFilter, SearchParams};
pub use parse::SearchRequest;
pub use predicate::{Predicate, matches};
