//! Expectation nodes and the scope tree they live in.
//!
//! ## Module Structure
//!
//! - `quantifier`: `[min, max]` occurrence constraint with its counter
//! - `node`: a single declared expectation and its pass/fail evaluation
//! - `tree`: arena of nodes with the current-scope cursor

mod node;
mod quantifier;
mod tree;

pub use node::{ExpectationId, ExpectationNode};
pub use quantifier::Quantifier;
pub use tree::{ExpectationTree, LiveChain};
