//! Registry search engine: term model, exact-lookup index, criterion
//! evaluation, match aggregation and the walk orchestrator.

pub mod find;
pub(crate) mod index;
pub(crate) mod matcher;
pub mod matches;
pub mod term;
pub(crate) mod wide;
