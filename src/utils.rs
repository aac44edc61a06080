use serde::Serialize;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use crate::error::{HmmError, Result};
use crate::hmm::StateId;
use crate::viterbi_solver::Domain;

/// Fraction of positions where `predictions` and `truth` disagree.
pub fn error_rate(predictions: &[StateId], truth: &[StateId]) -> Result<f64> {
    if predictions.len() != truth.len() {
        return Err(HmmError::input(format!(
            "{} predictions for {} reference states", predictions.len(), truth.len()
        )));
    }
    if truth.is_empty() {
        return Err(HmmError::input("cannot score an empty sequence"));
    }
    let errors = predictions.iter().zip(truth).filter(|(p, t)| p != t).count();
    Ok(errors as f64 / truth.len() as f64)
}

/// Decoder selected by the `method` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Viterbi,
    Exhaustive,
}

impl FromStr for Method {
    type Err = HmmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "viterbi" => Ok(Method::Viterbi),
            "exhaustive" => Ok(Method::Exhaustive),
            _ => Err(HmmError::config(format!("unknown method {:?}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = HmmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(HmmError::config(format!("unknown output format {:?}", s))),
        }
    }
}

/// Options of a decode-and-sample run.
///
/// A config file holds one `option=value` per line; blank lines and lines
/// starting with `#` are skipped. `observations` takes symbol names separated
/// by commas or spaces.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub method: Method,
    pub observations: Vec<String>,
    pub length: usize,
    pub start: String,
    pub seed: Option<u64>,
    pub domain: Domain,
    pub format: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        let observations = ["Dry", "Damp", "Wet", "Damp", "Dry"].iter().map(|s| s.to_string()).collect();
        Self {
            method: Method::Viterbi,
            observations,
            length: 10,
            start: String::from("Sunny"),
            seed: None,
            domain: Domain::Linear,
            format: OutputFormat::Text,
        }
    }
}

fn parse_value<T: FromStr>(option: &str, value: &str) -> Result<T> {
    value.parse::<T>()
        .map_err(|_| HmmError::config(format!("can not parse {:?} for option {}", value, option)))
}

impl Config {

    pub fn from_config_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut instance = Config::default();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (option, value) = line.split_once('=')
                .ok_or_else(|| HmmError::config(format!("line {} is not option=value: {:?}", number + 1, line)))?;
            instance.set(option.trim(), value.trim())?;
        }
        Ok(instance)
    }

    /// Sets one option from its textual value.
    pub fn set(&mut self, option: &str, value: &str) -> Result<()> {
        match option {
            "method" => self.method = value.parse()?,
            "observations" => {
                self.observations = value
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            }
            "length" => self.length = parse_value(option, value)?,
            "start" => self.start = value.to_string(),
            "seed" => self.seed = Some(parse_value(option, value)?),
            "domain" => self.domain = value.parse()?,
            "format" => self.format = value.parse()?,
            _ => return Err(HmmError::config(format!("unknown option {:?}", option))),
        };
        Ok(())
    }
}

/// Output of one run, rendered as text or JSON by the binary.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub method: Method,
    pub domain: Domain,
    pub observations: Vec<String>,
    pub most_likely: Vec<String>,
    pub probability: f64,
    pub log_probability: f64,
    pub degraded_at: Option<usize>,
    pub generated_states: Vec<String>,
    pub generated_observations: Vec<String>,
    pub decoded_generated: Vec<String>,
    pub error_rate: f64,
}

impl Report {

    pub fn to_text(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("Most Likely Weather Sequence: {:?}\n", self.most_likely));
        s.push_str(&format!("Probability of this sequence: {:.5}\n", self.probability));
        if let Some(step) = self.degraded_at {
            s.push_str(&format!("Warning: probabilities underflowed from step {}\n", step));
        }
        s.push_str(&format!("Generated Weather Sequence: {:?}\n", self.generated_states));
        s.push_str(&format!("Generated Observation Sequence: {:?}\n", self.generated_observations));
        s.push_str(&format!("Decoded Generated Sequence: {:?}\n", self.decoded_generated));
        s.push_str(&format!("Error rate {:.5}\n", self.error_rate));
        s
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
