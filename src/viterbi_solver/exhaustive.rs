use tracing::debug;

use super::{check_observations, DecodedResult, Decoder, Domain};
use crate::error::{HmmError, Result};
use crate::hmm::{Model, StateId, Symbol};

/// Upper bound on the number of paths the search will enumerate.
pub const MAX_PATHS: usize = 1 << 20;

/// Scores every state path and keeps the best one.
///
/// Paths are enumerated with the first time step varying fastest, so among
/// paths with equal scores the one kept is the smallest when compared from
/// the last step backwards. That is the path Viterbi's backtracking picks.
pub struct ExhaustiveSearch<'a> {
    model: &'a Model,
    domain: Domain,
    explored_paths: usize,
}

impl<'a> ExhaustiveSearch<'a> {

    pub fn new(model: &'a Model, domain: Domain) -> Self {
        Self { model, domain, explored_paths: 0 }
    }

    pub fn get_explored_paths(&self) -> usize { self.explored_paths }

    fn score(&self, path: &[usize], sequence: &[Symbol]) -> f64 {
        let d = self.domain;
        let mut v = d.combine(d.encode(self.model.initial()[path[0]]), d.encode(self.model.emit_prob(path[0], sequence[0].0)));
        for t in 1..path.len() {
            let trans = d.encode(self.model.transition_prob(path[t-1], path[t]));
            let emit = d.encode(self.model.emit_prob(path[t], sequence[t].0));
            v = d.combine(d.combine(v, trans), emit);
        }
        v
    }

    /// Advances `path` to the next assignment; false once every path was seen.
    fn next_path(path: &mut [usize], nstates: usize) -> bool {
        for t in 0..path.len() {
            path[t] += 1;
            if path[t] < nstates {
                return true;
            }
            path[t] = 0;
        }
        false
    }
}

impl<'a> Decoder for ExhaustiveSearch<'a> {

    fn decode(&mut self, observations: &[Symbol]) -> Result<DecodedResult> {
        check_observations(self.model, observations)?;
        let nstates = self.model.nstates();
        let npaths = u32::try_from(observations.len()).ok()
            .and_then(|len| nstates.checked_pow(len))
            .filter(|n| *n <= MAX_PATHS)
            .ok_or_else(|| HmmError::input(format!(
                "{} states over {} steps exceed the {} path search limit",
                nstates, observations.len(), MAX_PATHS
            )))?;

        let mut path = vec![0; observations.len()];
        let mut best_path = path.clone();
        let mut best = self.score(&path, observations);
        self.explored_paths = 1;
        while ExhaustiveSearch::next_path(&mut path, nstates) {
            self.explored_paths += 1;
            let v = self.score(&path, observations);
            if v > best {
                best = v;
                best_path.copy_from_slice(&path);
            }
        }
        debug_assert_eq!(self.explored_paths, npaths);
        debug!(paths = npaths, score = best, "exhaustive search finished");
        let predicted = best_path.into_iter().map(StateId).collect();
        Ok(DecodedResult::new(predicted, best, self.domain, None))
    }

    fn name(&self) -> String { String::from("exhaustive") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::weather::{self, DAMP, DRY, SUNNY, WET};

    #[test]
    fn matches_weather_golden_path() {
        let model = weather::model().unwrap();
        let mut search = ExhaustiveSearch::new(&model, Domain::Linear);
        let result = search.decode(&[DRY, DAMP, WET, DAMP, DRY]).unwrap();
        assert_eq!(result.path(), &[SUNNY; 5]);
        assert!((result.probability() - 0.000388962).abs() < 1e-15);
        assert_eq!(search.get_explored_paths(), 243);
    }

    #[test]
    fn refuses_oversized_search() {
        let model = weather::model().unwrap();
        let mut search = ExhaustiveSearch::new(&model, Domain::Linear);
        assert!(matches!(search.decode(&[DRY; 40]), Err(HmmError::InvalidInput { .. })));
    }
}
