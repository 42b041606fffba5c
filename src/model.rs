use crate::config::grid_side;
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};

/// Health status of a human, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Susceptible,
    Infected,
    Immune,
    Dead,
}

/// Human agent of the simulation.
///
/// Coordinates are fixed at creation on a square grid spanning `0..100`.
/// There is no stored dead flag: see [`Human::status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Human {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub infected: bool,
    pub immune: bool,
    pub days_infected: u32,
}

impl Human {
    /// Create a susceptible human at the given position.
    pub fn new(id: usize, x: f64, y: f64) -> Self {
        Self {
            id,
            x,
            y,
            infected: false,
            immune: false,
            days_infected: 0,
        }
    }

    /// Compute the status of the human.
    ///
    /// A human that is neither infected nor immune and has been infected for
    /// more than `threshold` rounds is dead.
    pub fn status(&self, threshold: u32) -> Status {
        if self.infected {
            Status::Infected
        } else if self.immune {
            Status::Immune
        } else if self.days_infected > threshold {
            Status::Dead
        } else {
            Status::Susceptible
        }
    }
}

/// Vector agent of the simulation. Vectors are permanently infectious.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub id: usize,
}

impl Vector {
    pub fn new(id: usize) -> Self {
        Self { id }
    }

    pub fn infected(&self) -> bool {
        true
    }
}

/// Create `n_humans` humans laid out on a square grid with one random patient zero.
pub fn create_population<R: Rng>(n_humans: usize, rng: &mut R) -> Result<Vec<Human>> {
    if n_humans == 0 {
        bail!("population must contain at least one human");
    }
    let side = grid_side(n_humans)
        .with_context(|| format!("population size must be a perfect square, but is {n_humans}"))?;

    let mut humans: Vec<_> = (0..n_humans)
        .map(|id| {
            let x = 100.0 * (id % side) as f64 / side as f64;
            let y = 100.0 * (id / side) as f64 / side as f64;
            Human::new(id, x, y)
        })
        .collect();

    let zero_dist = Uniform::new(0, n_humans)?;
    let i_zero = zero_dist.sample(rng);
    humans[i_zero].infected = true;
    log::debug!("patient zero is human {i_zero}");

    Ok(humans)
}

/// Create `n_vectors` vectors.
pub fn create_vectors(n_vectors: usize) -> Vec<Vector> {
    (0..n_vectors).map(Vector::new).collect()
}
