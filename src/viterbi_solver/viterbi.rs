use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use ndarray_stats::QuantileExt;
use tracing::{debug, trace, warn};

use super::{check_observations, DecodedResult, Decoder, Domain};
use crate::error::{HmmError, Result};
use crate::hmm::{Model, StateId, Symbol};

/// View over the lattice of the last decoded sequence.
///
/// `best_prob[[t, s]]` is the best score of a path of length `t + 1` ending in
/// `s`; `best_prev[[t, s]]` is the predecessor on that path. Row 0 of
/// `best_prev` has no meaning and holds zeros.
#[derive(Debug)]
pub struct Lattice<'a> {
    pub best_prob: ArrayView2<'a, f64>,
    pub best_prev: ArrayView2<'a, usize>,
}

/// Viterbi decoder over a borrowed model.
///
/// The lattice buffers are reused across calls and grow to the longest
/// sequence seen.
pub struct Viterbi<'a> {
    model: &'a Model,
    domain: Domain,
    pi: Array1<f64>,
    a: Array2<f64>,
    b: Array2<f64>,
    viterbi_array: Array2<f64>,
    viterbi_bt: Array2<usize>,
    last_len: usize,
}

impl<'a> Viterbi<'a> {

    pub fn new(model: &'a Model, domain: Domain) -> Self {
        let pi = model.initial().map(|p| domain.encode(*p));
        let a = model.transition_table().map(|p| domain.encode(*p));
        let b = model.emission_table().map(|p| domain.encode(*p));
        let viterbi_array: Array2<f64> = Array2::zeros((0, model.nstates()));
        let viterbi_bt: Array2<usize> = Array2::zeros((0, model.nstates()));
        Self { model, domain, pi, a, b, viterbi_array, viterbi_bt, last_len: 0 }
    }

    pub fn lattice(&self) -> Lattice<'_> {
        Lattice {
            best_prob: self.viterbi_array.slice(s![..self.last_len, ..]),
            best_prev: self.viterbi_bt.slice(s![..self.last_len, ..]),
        }
    }

    fn reserve(&mut self, len: usize) {
        if self.viterbi_array.nrows() < len {
            let nstates = self.model.nstates();
            self.viterbi_array = Array2::zeros((len, nstates));
            self.viterbi_bt = Array2::zeros((len, nstates));
        }
    }

    /// A linear-domain product whose factors are all non-zero but whose
    /// value is not a normal float has lost precision.
    fn underflowed(&self, factors: &[f64], value: f64) -> bool {
        self.domain == Domain::Linear
            && value < f64::MIN_POSITIVE
            && factors.iter().all(|f| *f > 0.0)
    }

    fn argmax(row: &Array1<f64>) -> Result<usize> {
        // First maximal index wins, which gives the enumeration-order tie-break.
        row.argmax()
            .map_err(|e| HmmError::input(format!("lattice row has no maximum: {}", e)))
    }

    pub fn solve(&mut self, sequence: &[Symbol]) -> Result<DecodedResult> {
        check_observations(self.model, sequence)?;
        let nstates = self.model.nstates();
        let len = sequence.len();
        self.reserve(len);
        self.last_len = len;
        let mut degraded_at: Option<usize> = None;

        let first = sequence[0].0;
        for state in 0..nstates {
            let v = self.domain.combine(self.pi[state], self.b[[state, first]]);
            if degraded_at.is_none() && self.underflowed(&[self.pi[state], self.b[[state, first]]], v) {
                degraded_at = Some(0);
            }
            self.viterbi_array[[0, state]] = v;
            self.viterbi_bt[[0, state]] = 0;
        }

        let mut probs = Array1::zeros(nstates);
        for t in 1..len {
            let obs = sequence[t].0;
            for state_to in 0..nstates {
                let emit_prob = self.b[[state_to, obs]];
                let mut lost = false;
                for state_from in 0..nstates {
                    let prev = self.viterbi_array[[t-1, state_from]];
                    let trans = self.a[[state_from, state_to]];
                    let v = self.domain.combine(self.domain.combine(prev, trans), emit_prob);
                    lost |= self.underflowed(&[prev, trans, emit_prob], v);
                    probs[state_from] = v;
                }
                let state_from = Viterbi::argmax(&probs)?;
                let best = probs[state_from];
                if degraded_at.is_none() && lost && best < f64::MIN_POSITIVE {
                    degraded_at = Some(t);
                }
                self.viterbi_array[[t, state_to]] = best;
                self.viterbi_bt[[t, state_to]] = state_from;
            }
            trace!(t, row = ?self.viterbi_array.row(t), "lattice step");
        }

        let last_row = self.viterbi_array.index_axis(Axis(0), len-1).to_owned();
        let mut end_state = Viterbi::argmax(&last_row)?;
        let score = last_row[end_state];
        let mut predicted = vec![StateId(0); len];
        predicted[len-1] = StateId(end_state);
        for t in (0..len-1).rev() {
            end_state = self.viterbi_bt[[t+1, end_state]];
            predicted[t] = StateId(end_state);
        }

        if let Some(step) = degraded_at {
            warn!(step, len, "linear-domain probabilities underflowed; consider the log domain");
        }
        debug!(len, score, domain = %self.domain, "decoded observation sequence");
        Ok(DecodedResult::new(predicted, score, self.domain, degraded_at))
    }
}

impl<'a> Decoder for Viterbi<'a> {

    fn decode(&mut self, observations: &[Symbol]) -> Result<DecodedResult> {
        self.solve(observations)
    }

    fn name(&self) -> String {
        String::from("viterbi")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::weather::{self, CLOUDY, DAMP, DRY, RAINY, SUNNY, WET};
    use ndarray::{array, s};

    #[test]
    fn weather_golden_path() {
        let model = weather::model().unwrap();
        let mut viterbi = Viterbi::new(&model, Domain::Linear);
        let result = viterbi.solve(&[DRY, DAMP, WET, DAMP, DRY]).unwrap();
        assert_eq!(result.path(), &[SUNNY, SUNNY, SUNNY, SUNNY, SUNNY]);
        assert!((result.probability() - 0.000388962).abs() < 1e-15);
        assert_eq!(result.degraded_at(), None);
    }

    #[test]
    fn lattice_holds_intermediate_scores() {
        let model = weather::model().unwrap();
        let mut viterbi = Viterbi::new(&model, Domain::Linear);
        viterbi.solve(&[DRY, DAMP, WET]).unwrap();
        let lattice = viterbi.lattice();
        assert_eq!(lattice.best_prob.dim(), (3, 3));
        assert!((lattice.best_prob[[0, SUNNY.0]] - 0.3).abs() < 1e-12);
        assert!((lattice.best_prob[[1, SUNNY.0]] - 0.063).abs() < 1e-12);
        // Rainy leads locally at t = 2 but is not on the global optimum.
        assert!((lattice.best_prob[[2, RAINY.0]] - 0.0063).abs() < 1e-12);
        assert_eq!(lattice.best_prev[[2, RAINY.0]], SUNNY.0);
        assert_eq!(lattice.best_prev[[1, CLOUDY.0]], SUNNY.0);
    }

    #[test]
    fn buffers_grow_and_shrink_view() {
        let model = weather::model().unwrap();
        let mut viterbi = Viterbi::new(&model, Domain::Linear);
        viterbi.solve(&[DRY; 8]).unwrap();
        viterbi.solve(&[WET, WET]).unwrap();
        assert_eq!(viterbi.lattice().best_prob.nrows(), 2);
    }

    #[test]
    fn tied_predecessors_pick_first_state() {
        // Every path has probability 2^-T, so every choice is a tie.
        let model = Model::new(
            vec!["a", "b"],
            vec!["x", "y"],
            array![0.5, 0.5],
            array![[0.5, 0.5], [0.5, 0.5]],
            array![[1.0, 0.0], [1.0, 0.0]],
        ).unwrap();
        let mut viterbi = Viterbi::new(&model, Domain::Linear);
        let result = viterbi.solve(&[Symbol(0); 4]).unwrap();
        assert_eq!(result.path(), &[StateId(0); 4]);
        assert_eq!(result.probability(), 0.0625);
        let lattice = viterbi.lattice();
        assert!(lattice.best_prev.slice(s![1.., ..]).iter().all(|p| *p == 0));
    }

    #[test]
    fn tied_later_states_pick_lowest_ordinal() {
        // State 0 is unreachable; states 1 and 2 tie at every step.
        let model = Model::new(
            vec!["a", "b", "c"],
            vec!["x"],
            array![0.0, 0.5, 0.5],
            array![[0.0, 0.5, 0.5], [0.0, 0.5, 0.5], [0.0, 0.5, 0.5]],
            array![[1.0], [1.0], [1.0]],
        ).unwrap();
        for domain in [Domain::Linear, Domain::Log] {
            let mut viterbi = Viterbi::new(&model, domain);
            let result = viterbi.solve(&[Symbol(0); 4]).unwrap();
            assert_eq!(result.path(), &[StateId(1); 4]);
            assert!((result.probability() - 0.0625).abs() < 1e-12);
            assert_eq!(result.degraded_at(), None);
            let lattice = viterbi.lattice();
            assert!(lattice.best_prev.slice(s![1.., 1..]).iter().all(|p| *p == 1));
        }
    }

    #[test]
    fn impossible_observation_scores_zero() {
        let model = Model::new(
            vec!["a", "b"],
            vec!["x", "y"],
            array![1.0, 0.0],
            array![[1.0, 0.0], [0.0, 1.0]],
            array![[1.0, 0.0], [0.0, 1.0]],
        ).unwrap();
        let result = Viterbi::new(&model, Domain::Linear).solve(&[Symbol(0), Symbol(1)]).unwrap();
        assert_eq!(result.probability(), 0.0);
        assert_eq!(result.degraded_at(), None);
        let logd = Viterbi::new(&model, Domain::Log).solve(&[Symbol(0), Symbol(1)]).unwrap();
        assert_eq!(logd.score(), f64::NEG_INFINITY);
        assert_eq!(logd.path(), result.path());
    }

    #[test]
    fn long_sequence_underflow_is_reported() {
        let model = weather::model().unwrap();
        let sequence = vec![WET; 1000];
        let linear = Viterbi::new(&model, Domain::Linear).solve(&sequence).unwrap();
        assert!(linear.degraded_at().is_some());
        assert!(linear.ensure_precise().is_err());

        let logd = Viterbi::new(&model, Domain::Log).solve(&sequence).unwrap();
        assert_eq!(logd.degraded_at(), None);
        assert!(logd.score().is_finite());
        assert_eq!(logd.len(), 1000);
    }

    #[test]
    fn rejects_empty_and_unknown_observations() {
        let model = weather::model().unwrap();
        let mut viterbi = Viterbi::new(&model, Domain::Linear);
        assert!(matches!(viterbi.solve(&[]), Err(HmmError::InvalidInput { .. })));
        assert!(matches!(viterbi.solve(&[DRY, Symbol(3)]), Err(HmmError::InvalidInput { .. })));
    }
}
