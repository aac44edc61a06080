//! Most-probable hidden-state decoding and sequence sampling for discrete
//! hidden Markov models.
//!
//! A [`Model`] bundles validated initial, transition and emission tables.
//! [`Viterbi`] recovers the maximum joint-probability state path for an
//! observation sequence, and [`SequenceGenerator`] samples state walks and
//! their emissions.

pub mod error;
pub mod generator;
pub mod hmm;
pub mod utils;
pub mod viterbi_solver;

pub use error::{HmmError, Result};
pub use generator::{categorical, SequenceGenerator};
pub use hmm::{Model, StateId, Symbol};
pub use viterbi_solver::exhaustive::ExhaustiveSearch;
pub use viterbi_solver::viterbi::Viterbi;
pub use viterbi_solver::{infer, infer_in, DecodedResult, Decoder, Domain};
