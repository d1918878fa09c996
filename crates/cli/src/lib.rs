//! Library half of the `graphlink` binary, split out so command logic is
//! unit-testable.

pub mod cli;
