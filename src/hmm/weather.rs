//! Reference weather model: three weather conditions observed through the
//! dampness of the ground.

use ndarray::array;

use super::model::{Model, StateId, Symbol};
use crate::error::Result;

pub const SUNNY: StateId = StateId(0);
pub const RAINY: StateId = StateId(1);
pub const CLOUDY: StateId = StateId(2);

pub const DRY: Symbol = Symbol(0);
pub const DAMP: Symbol = Symbol(1);
pub const WET: Symbol = Symbol(2);

pub const STATES: [&str; 3] = ["Sunny", "Rainy", "Cloudy"];
pub const SYMBOLS: [&str; 3] = ["Dry", "Damp", "Wet"];

/// Builds the weather model.
pub fn model() -> Result<Model> {
    Model::new(
        STATES.to_vec(),
        SYMBOLS.to_vec(),
        array![0.5, 0.3, 0.2],
        array![
            [0.7, 0.2, 0.1],
            [0.3, 0.5, 0.2],
            [0.4, 0.3, 0.3],
        ],
        array![
            [0.6, 0.3, 0.1],
            [0.1, 0.4, 0.5],
            [0.3, 0.5, 0.2],
        ],
    )
}
