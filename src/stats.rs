use crate::model::{Human, Status};
use anyhow::{Result, bail};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Counts of each status at the end of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: usize,
    pub infected: usize,
    pub immune: usize,
    pub dead: usize,
    pub susceptible: usize,
}

impl RoundRecord {
    pub fn get(&self, stat: TrackedStat) -> usize {
        match stat {
            TrackedStat::Infected => self.infected,
            TrackedStat::Immune => self.immune,
            TrackedStat::Dead => self.dead,
        }
    }
}

/// Reduce a population snapshot to a [`RoundRecord`].
pub fn compute_statistics(humans: &[Human], round: usize, threshold: u32) -> RoundRecord {
    let mut record = RoundRecord {
        round,
        infected: 0,
        immune: 0,
        dead: 0,
        susceptible: 0,
    };
    for human in humans {
        match human.status(threshold) {
            Status::Infected => record.infected += 1,
            Status::Immune => record.immune += 1,
            Status::Dead => record.dead += 1,
            Status::Susceptible => record.susceptible += 1,
        }
    }
    record
}

/// Series that can be selected from the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TrackedStat {
    Infected,
    Immune,
    Dead,
}

impl TrackedStat {
    pub const ALL: [TrackedStat; 3] = [Self::Infected, Self::Immune, Self::Dead];

    pub fn name(self) -> &'static str {
        match self {
            Self::Infected => "infected",
            Self::Immune => "immune",
            Self::Dead => "dead",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Infected => "Total Infected",
            Self::Immune => "Total Immune",
            Self::Dead => "Total Dead",
        }
    }
}

impl fmt::Display for TrackedStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TrackedStat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match Self::ALL.into_iter().find(|stat| stat.name() == s) {
            Some(stat) => Ok(stat),
            None => bail!("unknown statistic {s:?}"),
        }
    }
}

/// Append-only history of round records.
#[derive(Debug, Default, Clone)]
pub struct History {
    records: Vec<RoundRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: RoundRecord) {
        self.records.push(record);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[RoundRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&RoundRecord> {
        self.records.last()
    }

    /// `(round, count)` pairs of one tracked statistic.
    pub fn series(&self, stat: TrackedStat) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.records.iter().map(move |rec| (rec.round, rec.get(stat)))
    }

    /// Earliest record with the largest value of `stat`.
    pub fn peak(&self, stat: TrackedStat) -> Option<&RoundRecord> {
        self.records
            .iter()
            .rev()
            .max_by_key(|rec| rec.get(stat))
    }
}

/// Online mean and variance accumulator.
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            mean: if self.n_vals > 0 { self.mean } else { f64::NAN },
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}
