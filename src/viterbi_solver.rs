use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{HmmError, Result};
use crate::hmm::{Model, StateId, Symbol};

pub mod exhaustive;
pub mod viterbi;

/// Numeric representation of path probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Plain products of probabilities.
    #[default]
    Linear,
    /// Sums of natural logarithms; immune to underflow.
    Log,
}

impl Domain {
    pub(crate) fn encode(&self, p: f64) -> f64 {
        match self {
            Domain::Linear => p,
            Domain::Log => log(p),
        }
    }

    pub(crate) fn combine(&self, x: f64, y: f64) -> f64 {
        match self {
            Domain::Linear => x * y,
            Domain::Log => x + y,
        }
    }
}

impl FromStr for Domain {
    type Err = HmmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(Domain::Linear),
            "log" => Ok(Domain::Log),
            _ => Err(HmmError::config(format!("unknown probability domain {:?}", s))),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Linear => write!(f, "linear"),
            Domain::Log => write!(f, "log"),
        }
    }
}

fn log(p: f64) -> f64 {
    if p == 0.0 {
        f64::NEG_INFINITY
    } else {
        p.ln()
    }
}

/// Most probable hidden-state path for an observation sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedResult {
    path: Vec<StateId>,
    score: f64,
    domain: Domain,
    degraded_at: Option<usize>,
}

impl DecodedResult {

    pub(crate) fn new(path: Vec<StateId>, score: f64, domain: Domain, degraded_at: Option<usize>) -> Self {
        Self { path, score, domain, degraded_at }
    }

    pub fn path(&self) -> &[StateId] {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Score in the decoder's own domain.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Joint probability of the path and the observations. In the log domain
    /// this is `exp(score)` and may round to zero.
    pub fn probability(&self) -> f64 {
        match self.domain {
            Domain::Linear => self.score,
            Domain::Log => self.score.exp(),
        }
    }

    pub fn log_probability(&self) -> f64 {
        match self.domain {
            Domain::Linear => log(self.score),
            Domain::Log => self.score,
        }
    }

    /// First time step where a linear-domain product underflowed, if any.
    pub fn degraded_at(&self) -> Option<usize> {
        self.degraded_at
    }

    pub fn ensure_precise(&self) -> Result<()> {
        match self.degraded_at {
            Some(step) => Err(HmmError::NumericDegradation { step }),
            None => Ok(()),
        }
    }

    pub fn state_names<'m>(&self, model: &'m Model) -> Result<Vec<&'m str>> {
        self.path.iter().map(|s| model.state_name(*s)).collect()
    }
}

pub trait Decoder {
    fn decode(&mut self, observations: &[Symbol]) -> Result<DecodedResult>;
    fn name(&self) -> String;
}

pub(crate) fn check_observations(model: &Model, observations: &[Symbol]) -> Result<()> {
    if observations.is_empty() {
        return Err(HmmError::input("empty observation sequence"));
    }
    for obs in observations {
        model.check_symbol(*obs)?;
    }
    Ok(())
}

/// Decodes `observations` with a linear-domain Viterbi pass.
pub fn infer(observations: &[Symbol], model: &Model) -> Result<DecodedResult> {
    viterbi::Viterbi::new(model, Domain::Linear).decode(observations)
}

/// Same as [`infer`] with a chosen probability domain.
pub fn infer_in(observations: &[Symbol], model: &Model, domain: Domain) -> Result<DecodedResult> {
    viterbi::Viterbi::new(model, domain).decode(observations)
}
