//! Stochastic sampling of state and observation sequences from a [`Model`].
//!
//! Every sampled element costs exactly one uniform `f64` draw from the
//! caller's random source, so a seeded source reproduces the same sequences.

use ndarray::ArrayView1;
use rand::Rng;
use tracing::debug;

use crate::error::{HmmError, Result};
use crate::hmm::{Model, StateId, Symbol};

/// Draws an index with probability proportional to its weight.
///
/// Weights must be finite and non-negative with a positive sum; they need
/// not be normalized. One uniform value in `[0, total)` is compared against
/// the running cumulative weight and the first index whose cumulative weight
/// exceeds it is returned. Zero-weight indices are never returned.
pub fn categorical<R: Rng + ?Sized>(weights: ArrayView1<f64>, rng: &mut R) -> Result<usize> {
    let mut total = 0.0;
    for w in weights.iter() {
        if !w.is_finite() || *w < 0.0 {
            return Err(HmmError::input(format!("categorical weight {} is not a finite non-negative value", w)));
        }
        total += w;
    }
    if total <= 0.0 || !total.is_finite() {
        return Err(HmmError::input(format!("categorical weights sum to {}", total)));
    }

    let u = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    let mut last_positive = 0;
    for (i, w) in weights.iter().enumerate() {
        if *w > 0.0 {
            cumulative += w;
            last_positive = i;
            if u < cumulative {
                return Ok(i);
            }
        }
    }
    // Rounding can leave u at or just above the final cumulative sum.
    Ok(last_positive)
}

/// Samples hidden-state walks and their emissions.
pub struct SequenceGenerator<'a> {
    model: &'a Model,
}

impl<'a> SequenceGenerator<'a> {

    pub fn new(model: &'a Model) -> Self {
        Self { model }
    }

    /// Walks the transition chain for `length` steps starting at `start`.
    /// The start state is fixed and consumes no randomness.
    pub fn sample_states<R: Rng + ?Sized>(&self, length: usize, start: StateId, rng: &mut R) -> Result<Vec<StateId>> {
        if length < 1 {
            return Err(HmmError::input("requested sequence length must be at least 1"));
        }
        self.model.check_state(start)?;

        let mut sequence = Vec::with_capacity(length);
        sequence.push(start);
        let mut current = start;
        for _ in 1..length {
            let next = categorical(self.model.transitions_from(current.0), rng)?;
            current = StateId(next);
            sequence.push(current);
        }
        debug!(length, start = start.0, "sampled state sequence");
        Ok(sequence)
    }

    /// Emits one symbol per state in `states`.
    pub fn sample_observations<R: Rng + ?Sized>(&self, states: &[StateId], rng: &mut R) -> Result<Vec<Symbol>> {
        for state in states {
            self.model.check_state(*state)?;
        }
        let observations = states.iter()
            .map(|state| categorical(self.model.emissions(state.0), rng).map(Symbol))
            .collect::<Result<Vec<Symbol>>>()?;
        debug!(length = observations.len(), "sampled observation sequence");
        Ok(observations)
    }

    /// Samples a state walk and the observations it emits.
    pub fn sample<R: Rng + ?Sized>(&self, length: usize, start: StateId, rng: &mut R) -> Result<(Vec<StateId>, Vec<Symbol>)> {
        let states = self.sample_states(length, start, rng)?;
        let observations = self.sample_observations(&states, rng)?;
        Ok((states, observations))
    }
}
