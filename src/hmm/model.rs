use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::error::{HmmError, Result};

/// Maximum deviation from 1 allowed when summing a probability row.
pub const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// Ordinal of a hidden state in the model's state enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StateId(pub usize);

/// Ordinal of an observation symbol in the model's symbol enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Symbol(pub usize);

/// Discrete hidden Markov model with fixed parameters.
///
/// `a[[from, to]]` is the transition probability, `b[[state, symbol]]` the
/// emission probability and `pi[state]` the initial probability. Tables are
/// dense, so every (state, state) and (state, symbol) pair has an entry. A
/// `Model` is validated once in its constructor and is immutable afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Model {
    states: Vec<String>,
    symbols: Vec<String>,
    pi: Array1<f64>,
    a: Array2<f64>,
    b: Array2<f64>,
}

fn check_alphabet(kind: &str, names: &[String]) -> Result<()> {
    if names.is_empty() {
        return Err(HmmError::model(format!("the {} set is empty", kind)));
    }
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(HmmError::model(format!("duplicate {} {:?}", kind, name)));
        }
    }
    Ok(())
}

fn check_distribution(table: &str, row: ArrayView1<f64>) -> Result<()> {
    for p in row.iter() {
        if !p.is_finite() || *p < 0.0 || *p > 1.0 {
            return Err(HmmError::model(format!("{} holds {} outside [0, 1]", table, p)));
        }
    }
    let d = row.sum() - 1.0;
    if d.abs() > ROW_SUM_TOLERANCE {
        return Err(HmmError::model(format!("{} sums to {} instead of 1", table, row.sum())));
    }
    Ok(())
}

fn lookup(table: &str, row: &HashMap<String, f64>, key: &str) -> Result<f64> {
    row.get(key)
        .copied()
        .ok_or_else(|| HmmError::model(format!("{} has no entry for {:?}", table, key)))
}

fn reject_unknown_keys<'k, V>(table: &str, keys: impl Iterator<Item = (&'k String, V)>, known: &[String]) -> Result<()> {
    for (key, _) in keys {
        if !known.contains(key) {
            return Err(HmmError::model(format!("{} names unknown entry {:?}", table, key)));
        }
    }
    Ok(())
}

impl Model {

    pub fn new<S: Into<String>>(states: Vec<S>, symbols: Vec<S>, pi: Array1<f64>, a: Array2<f64>, b: Array2<f64>) -> Result<Self> {
        let states: Vec<String> = states.into_iter().map(Into::into).collect();
        let symbols: Vec<String> = symbols.into_iter().map(Into::into).collect();
        check_alphabet("state", &states)?;
        check_alphabet("symbol", &symbols)?;

        let nstates = states.len();
        let nobs = symbols.len();
        if pi.len() != nstates {
            return Err(HmmError::model(format!("initial table has {} entries for {} states", pi.len(), nstates)));
        }
        if a.dim() != (nstates, nstates) {
            return Err(HmmError::model(format!("transition table is {:?}, expected {:?}", a.dim(), (nstates, nstates))));
        }
        if b.dim() != (nstates, nobs) {
            return Err(HmmError::model(format!("emission table is {:?}, expected {:?}", b.dim(), (nstates, nobs))));
        }

        check_distribution("initial table", pi.view())?;
        for state in 0..nstates {
            check_distribution(&format!("transition row {:?}", states[state]), a.row(state))?;
            check_distribution(&format!("emission row {:?}", states[state]), b.row(state))?;
        }
        Ok(Self { states, symbols, pi, a, b })
    }

    /// Builds a model from tables keyed by state and symbol names.
    ///
    /// Every state must appear in `initial`, every (state, state) pair in
    /// `transition` and every (state, symbol) pair in `emission`. Missing or
    /// unknown keys are rejected.
    pub fn from_named_tables<S: AsRef<str>>(
        states: &[S],
        symbols: &[S],
        initial: &HashMap<String, f64>,
        transition: &HashMap<String, HashMap<String, f64>>,
        emission: &HashMap<String, HashMap<String, f64>>,
    ) -> Result<Self> {
        let states: Vec<String> = states.iter().map(|s| s.as_ref().to_string()).collect();
        let symbols: Vec<String> = symbols.iter().map(|s| s.as_ref().to_string()).collect();
        check_alphabet("state", &states)?;
        check_alphabet("symbol", &symbols)?;
        reject_unknown_keys("initial table", initial.iter(), &states)?;
        reject_unknown_keys("transition table", transition.iter(), &states)?;
        reject_unknown_keys("emission table", emission.iter(), &states)?;

        let nstates = states.len();
        let nobs = symbols.len();
        let mut pi = Array1::zeros(nstates);
        let mut a = Array2::zeros((nstates, nstates));
        let mut b = Array2::zeros((nstates, nobs));
        for (i, from) in states.iter().enumerate() {
            pi[i] = lookup("initial table", initial, from)?;

            let row = transition.get(from)
                .ok_or_else(|| HmmError::model(format!("transition table has no row for {:?}", from)))?;
            reject_unknown_keys("transition table", row.iter(), &states)?;
            for (j, to) in states.iter().enumerate() {
                a[[i, j]] = lookup(&format!("transition row {:?}", from), row, to)?;
            }

            let row = emission.get(from)
                .ok_or_else(|| HmmError::model(format!("emission table has no row for {:?}", from)))?;
            reject_unknown_keys("emission table", row.iter(), &symbols)?;
            for (k, obs) in symbols.iter().enumerate() {
                b[[i, k]] = lookup(&format!("emission row {:?}", from), row, obs)?;
            }
        }
        Model::new(states, symbols, pi, a, b)
    }

    pub fn nstates(&self) -> usize {
        self.a.nrows()
    }

    pub fn nobs(&self) -> usize {
        self.b.ncols()
    }

    pub fn state_ids(&self) -> impl Iterator<Item = StateId> {
        (0..self.nstates()).map(StateId)
    }

    pub fn check_state(&self, state: StateId) -> Result<()> {
        if state.0 < self.nstates() {
            Ok(())
        } else {
            Err(HmmError::input(format!("state {} is not one of the {} model states", state.0, self.nstates())))
        }
    }

    pub fn check_symbol(&self, obs: Symbol) -> Result<()> {
        if obs.0 < self.nobs() {
            Ok(())
        } else {
            Err(HmmError::input(format!("symbol {} is not one of the {} model symbols", obs.0, self.nobs())))
        }
    }

    pub fn state_id(&self, name: &str) -> Result<StateId> {
        self.states.iter()
            .position(|s| s == name)
            .map(StateId)
            .ok_or_else(|| HmmError::input(format!("unknown state {:?}", name)))
    }

    pub fn symbol(&self, name: &str) -> Result<Symbol> {
        self.symbols.iter()
            .position(|s| s == name)
            .map(Symbol)
            .ok_or_else(|| HmmError::input(format!("unknown observation symbol {:?}", name)))
    }

    pub fn parse_symbols<I, S>(&self, names: I) -> Result<Vec<Symbol>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().map(|name| self.symbol(name.as_ref())).collect()
    }

    pub fn state_name(&self, state: StateId) -> Result<&str> {
        self.check_state(state)?;
        Ok(&self.states[state.0])
    }

    pub fn symbol_name(&self, obs: Symbol) -> Result<&str> {
        self.check_symbol(obs)?;
        Ok(&self.symbols[obs.0])
    }

    pub fn initial(&self) -> ArrayView1<'_, f64> {
        self.pi.view()
    }

    pub fn transition_table(&self) -> ArrayView2<'_, f64> {
        self.a.view()
    }

    pub fn emission_table(&self) -> ArrayView2<'_, f64> {
        self.b.view()
    }

    /// `pi[s] * b[s, obs]` for every state.
    pub fn init_prob(&self, obs: Symbol) -> Result<Array1<f64>> {
        self.check_symbol(obs)?;
        Ok(&self.pi * &self.b.slice(s![.., obs.0]))
    }

    /// Row of the transition table: distribution of the successor of `state_from`.
    pub(crate) fn transitions_from(&self, state_from: usize) -> ArrayView1<'_, f64> {
        self.a.row(state_from)
    }

    /// Row of the emission table for `state`.
    pub(crate) fn emissions(&self, state: usize) -> ArrayView1<'_, f64> {
        self.b.row(state)
    }

    pub(crate) fn transition_prob(&self, state_from: usize, state_to: usize) -> f64 {
        self.a[[state_from, state_to]]
    }

    pub(crate) fn emit_prob(&self, state: usize, obs: usize) -> f64 {
        self.b[[state, obs]]
    }

    /// Joint probability of emitting `observations` along `states`.
    pub fn path_probability(&self, states: &[StateId], observations: &[Symbol]) -> Result<f64> {
        if states.is_empty() {
            return Err(HmmError::input("empty state sequence"));
        }
        if states.len() != observations.len() {
            return Err(HmmError::input(format!(
                "{} states for {} observations", states.len(), observations.len()
            )));
        }
        for (state, obs) in states.iter().zip(observations) {
            self.check_state(*state)?;
            self.check_symbol(*obs)?;
        }
        let mut p = self.pi[states[0].0] * self.emit_prob(states[0].0, observations[0].0);
        for t in 1..states.len() {
            p = p * self.transition_prob(states[t-1].0, states[t].0) * self.emit_prob(states[t].0, observations[t].0);
        }
        Ok(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_state() -> Result<Model> {
        Model::new(
            vec!["hot", "cold"],
            vec!["one", "two"],
            array![0.6, 0.4],
            array![[0.7, 0.3], [0.4, 0.6]],
            array![[0.2, 0.8], [0.5, 0.5]],
        )
    }

    #[test]
    fn accepts_valid_tables() {
        let model = two_state().unwrap();
        assert_eq!(model.nstates(), 2);
        assert_eq!(model.nobs(), 2);
        assert_eq!(model.state_id("cold").unwrap(), StateId(1));
        assert_eq!(model.symbol_name(Symbol(0)).unwrap(), "one");
    }

    #[test]
    fn row_sum_within_tolerance_is_accepted() {
        let model = Model::new(
            vec!["x", "y"],
            vec!["o"],
            array![0.5 + 5e-7, 0.5],
            array![[0.5, 0.5], [1.0, 0.0]],
            array![[1.0], [1.0]],
        );
        assert!(model.is_ok());
    }

    #[test]
    fn row_sum_outside_tolerance_is_rejected() {
        let model = Model::new(
            vec!["x", "y"],
            vec!["o"],
            array![0.5, 0.5],
            array![[0.5, 0.5 + 1e-5], [1.0, 0.0]],
            array![[1.0], [1.0]],
        );
        assert!(matches!(model, Err(HmmError::InvalidModel { .. })));
    }

    #[test]
    fn rejects_negative_and_nan_entries() {
        let negative = Model::new(
            vec!["x", "y"],
            vec!["o"],
            array![1.5, -0.5],
            array![[0.5, 0.5], [0.5, 0.5]],
            array![[1.0], [1.0]],
        );
        assert!(matches!(negative, Err(HmmError::InvalidModel { .. })));

        let nan = Model::new(
            vec!["x"],
            vec!["o"],
            array![1.0],
            array![[f64::NAN]],
            array![[1.0]],
        );
        assert!(matches!(nan, Err(HmmError::InvalidModel { .. })));
    }

    #[test]
    fn rejects_mismatched_shapes() {
        let model = Model::new(
            vec!["x", "y"],
            vec!["o", "p"],
            array![0.5, 0.5],
            array![[0.5, 0.5], [0.5, 0.5]],
            array![[1.0], [1.0]],
        );
        assert!(matches!(model, Err(HmmError::InvalidModel { .. })));
    }

    #[test]
    fn rejects_duplicate_and_empty_alphabets() {
        let duplicate = Model::new(
            vec!["x", "x"],
            vec!["o"],
            array![0.5, 0.5],
            array![[0.5, 0.5], [0.5, 0.5]],
            array![[1.0], [1.0]],
        );
        assert!(matches!(duplicate, Err(HmmError::InvalidModel { .. })));

        let empty = Model::new(
            Vec::<String>::new(),
            vec!["o".to_string()],
            Array1::zeros(0),
            Array2::zeros((0, 0)),
            Array2::zeros((0, 1)),
        );
        assert!(matches!(empty, Err(HmmError::InvalidModel { .. })));
    }

    #[test]
    fn init_prob_multiplies_pi_and_emission() {
        let model = two_state().unwrap();
        let p = model.init_prob(Symbol(1)).unwrap();
        assert!((p[0] - 0.6 * 0.8).abs() < 1e-12);
        assert!((p[1] - 0.4 * 0.5).abs() < 1e-12);
    }

    #[test]
    fn table_views_borrow_model_tables() {
        let model = two_state().unwrap();
        assert_eq!(model.initial(), array![0.6, 0.4]);
        assert_eq!(model.transition_table().dim(), (2, 2));
        assert_eq!(model.emission_table().row(0), array![0.2, 0.8]);
        assert_eq!(model.transitions_from(1), array![0.4, 0.6]);
        assert_eq!(model.emissions(1), array![0.5, 0.5]);
        assert_eq!(model.transition_prob(0, 1), 0.3);
        assert_eq!(model.emit_prob(1, 0), 0.5);
    }

    #[test]
    fn init_prob_rejects_unknown_symbol() {
        let model = two_state().unwrap();
        assert!(matches!(model.init_prob(Symbol(2)), Err(HmmError::InvalidInput { .. })));
    }

    #[test]
    fn unknown_names_are_invalid_input() {
        let model = two_state().unwrap();
        assert!(matches!(model.symbol("three"), Err(HmmError::InvalidInput { .. })));
        assert!(matches!(model.state_name(StateId(2)), Err(HmmError::InvalidInput { .. })));
    }

    #[test]
    fn path_probability_is_product_of_factors() {
        let model = two_state().unwrap();
        let p = model.path_probability(&[StateId(0), StateId(1)], &[Symbol(0), Symbol(1)]).unwrap();
        assert!((p - 0.6 * 0.2 * 0.3 * 0.5).abs() < 1e-12);
        assert!(model.path_probability(&[StateId(0)], &[Symbol(0), Symbol(1)]).is_err());
    }
}
