//! Version-control access for the merge commands.
//!
//! Only reading is done here: the ancestor text of a notes file is fetched
//! from a revision so it can be diffed against the working copy.
pub mod retrieve;

pub use retrieve::{GitFileRetriever, RetrieveFile};
