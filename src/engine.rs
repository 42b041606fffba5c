use crate::config::{Config, ModelConfig};
use crate::model::{Human, Status, Vector, create_population, create_vectors};
use crate::stats::{History, RoundRecord, compute_statistics};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Bernoulli, Uniform};

/// Probability that an exposure is attributed to vectors rather than humans.
const PROB_VECTOR_SOURCE: f64 = 0.5;
/// Probability that a vector exposure results in an infection.
const PROB_VECTOR_TRANSMISSION: f64 = 0.5;

/// Advance the population by one round.
///
/// Every human of the returned population is a copy of the corresponding
/// human of `humans`, updated independently. Human-to-human transmission only
/// reads `humans`, so infections produced during this round do not spread
/// further until the next one.
pub fn update_population<R: Rng>(
    humans: &[Human],
    vectors: &[Vector],
    params: &ModelConfig,
    rng: &mut R,
) -> Result<Vec<Human>> {
    let threshold = params.recovery_threshold_days;

    let exp_dist = Bernoulli::new(params.infection_rate)?;
    let imm_dist = Bernoulli::new(params.immunity_rate)?;
    let dth_dist = Bernoulli::new(params.death_rate)?;
    let src_dist = Bernoulli::new(PROB_VECTOR_SOURCE)?;
    let vec_dist = Bernoulli::new(PROB_VECTOR_TRANSMISSION)?;

    // Neighbors are drawn among the other humans.
    let nbr_dist = match humans.len() {
        0 | 1 => None,
        n_humans => Some(Uniform::new(0, n_humans - 1)?),
    };

    let mut new_humans = Vec::with_capacity(humans.len());

    for (i_hum, human) in humans.iter().enumerate() {
        let mut new_human = human.clone();

        match human.status(threshold) {
            Status::Infected => {
                new_human.days_infected += 1;
                if new_human.days_infected > threshold {
                    if imm_dist.sample(rng) {
                        new_human.immune = true;
                        new_human.infected = false;
                    } else if dth_dist.sample(rng) {
                        new_human.infected = false;
                    }
                }
            }
            Status::Susceptible => {
                if exp_dist.sample(rng) {
                    new_human.infected = if src_dist.sample(rng) {
                        !vectors.is_empty() && vec_dist.sample(rng)
                    } else {
                        match &nbr_dist {
                            Some(nbr_dist) => {
                                let mut i_nbr = nbr_dist.sample(rng);
                                if i_nbr >= i_hum {
                                    i_nbr += 1;
                                }
                                humans[i_nbr].infected
                            }
                            None => false,
                        }
                    };
                }
            }
            Status::Immune | Status::Dead => {}
        }

        new_humans.push(new_human);
    }

    Ok(new_humans)
}

/// Simulation engine.
///
/// Holds the configuration, current population and vectors, the round
/// history, and the random number generator, and provides methods to reset
/// and advance the simulation.
pub struct Engine {
    cfg: Config,
    humans: Vec<Human>,
    vectors: Vec<Vector>,
    history: History,
    seed: u64,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Create a new `Engine` with the given configuration.
    ///
    /// Without a seed, one is drawn from the operating system and logged.
    pub fn new(cfg: Config, seed: Option<u64>) -> Result<Self> {
        cfg.validate().context("failed to validate config")?;

        let seed = match seed {
            Some(seed) => seed,
            None => ChaCha12Rng::try_from_os_rng()?.random(),
        };
        log::debug!("seed = {seed}");

        let mut engine = Self {
            cfg,
            humans: Vec::new(),
            vectors: Vec::new(),
            history: History::new(),
            seed,
            rng: ChaCha12Rng::seed_from_u64(seed),
        };
        engine.reset().context("failed to generate initial condition")?;

        Ok(engine)
    }

    /// Replace the population and vectors from the current configuration and clear the history.
    pub fn reset(&mut self) -> Result<()> {
        self.humans = create_population(self.cfg.init.n_humans, &mut self.rng)
            .context("failed to create population")?;
        self.vectors = create_vectors(self.cfg.init.n_vectors);
        self.history.clear();
        log::debug!(
            "reset with {} humans and {} vectors",
            self.humans.len(),
            self.vectors.len()
        );
        Ok(())
    }

    /// Validate a new configuration, install it, and reset.
    pub fn reconfigure(&mut self, cfg: Config) -> Result<()> {
        cfg.validate().context("failed to validate config")?;
        self.cfg = cfg;
        self.reset()
    }

    /// Perform one round and append its record to the history.
    pub fn step(&mut self) -> Result<RoundRecord> {
        self.humans = update_population(&self.humans, &self.vectors, &self.cfg.model, &mut self.rng)
            .context("failed to update population")?;

        let record = compute_statistics(
            &self.humans,
            self.history.len(),
            self.cfg.model.recovery_threshold_days,
        );
        self.history.push(record);
        log::debug!("{record:?}");

        Ok(record)
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn humans(&self) -> &[Human] {
        &self.humans
    }

    pub fn vectors(&self) -> &[Vector] {
        &self.vectors
    }

    pub fn history(&self) -> &History {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(infection_rate: f64, death_rate: f64, immunity_rate: f64) -> ModelConfig {
        ModelConfig {
            infection_rate,
            death_rate,
            immunity_rate,
            recovery_threshold_days: 10,
        }
    }

    fn grid(n_humans: usize, infected: &[usize]) -> Vec<Human> {
        (0..n_humans)
            .map(|id| Human {
                infected: infected.contains(&id),
                ..Human::new(id, 0.0, 0.0)
            })
            .collect()
    }

    fn config(n_humans: usize, n_vectors: usize) -> Config {
        let mut cfg = Config::default();
        cfg.init.n_humans = n_humans;
        cfg.init.n_vectors = n_vectors;
        cfg
    }

    #[test]
    fn round_preserves_population() {
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let mut humans = create_population(100, &mut rng).unwrap();
        let vectors = create_vectors(100);
        let params = params(0.5, 0.45, 0.1);

        for _ in 0..50 {
            let new_humans = update_population(&humans, &vectors, &params, &mut rng).unwrap();
            assert_eq!(new_humans.len(), humans.len());
            for (old, new) in humans.iter().zip(&new_humans) {
                assert_eq!(old.id, new.id);
                assert_eq!((old.x, old.y), (new.x, new.y));
                assert!(!(new.infected && new.immune));
                if old.infected {
                    assert_eq!(new.days_infected, old.days_infected + 1);
                } else {
                    assert_eq!(new.days_infected, old.days_infected);
                }
            }
            humans = new_humans;
        }
    }

    #[test]
    fn counts_partition_population() {
        let mut engine = Engine::new(config(400, 250), Some(11)).unwrap();
        for _ in 0..60 {
            let rec = engine.step().unwrap();
            assert_eq!(rec.infected + rec.immune + rec.dead + rec.susceptible, 400);
        }
    }

    #[test]
    fn same_seed_gives_same_history() {
        let run = |seed| {
            let mut engine = Engine::new(config(225, 120), Some(seed)).unwrap();
            for _ in 0..40 {
                engine.step().unwrap();
            }
            engine.history().records().to_vec()
        };
        assert_eq!(run(5), run(5));
    }

    #[test]
    fn single_human_becomes_immune() {
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let mut humans = grid(1, &[0]);
        let params = params(0.1, 0.0, 1.0);

        for _ in 0..=params.recovery_threshold_days {
            humans = update_population(&humans, &[], &params, &mut rng).unwrap();
        }

        assert!(humans[0].immune);
        assert!(!humans[0].infected);
        assert_eq!(humans[0].days_infected, 11);
    }

    #[test]
    fn infected_past_threshold_dies_and_stays_dead() {
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let mut humans = grid(4, &[0, 1, 2, 3]);
        humans[0].days_infected = 10;
        let vectors = create_vectors(500);

        humans = update_population(&humans, &vectors, &params(1.0, 1.0, 0.0), &mut rng).unwrap();
        assert_eq!(humans[0].status(10), Status::Dead);
        assert_eq!(humans[0].days_infected, 11);

        for _ in 0..20 {
            humans =
                update_population(&humans, &vectors, &params(1.0, 1.0, 0.0), &mut rng).unwrap();
            assert_eq!(humans[0].status(10), Status::Dead);
            assert_eq!(humans[0].days_infected, 11);
        }
    }

    #[test]
    fn unresolved_infection_keeps_accruing_days() {
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let mut humans = grid(1, &[0]);
        let params = params(0.0, 0.0, 0.0);

        for _ in 0..25 {
            humans = update_population(&humans, &[], &params, &mut rng).unwrap();
        }

        assert!(humans[0].infected);
        assert_eq!(humans[0].days_infected, 25);
    }

    #[test]
    fn immune_humans_are_never_reinfected() {
        let mut rng = ChaCha12Rng::seed_from_u64(9);
        let mut humans = grid(9, &[1, 2, 3, 4, 5, 6, 7, 8]);
        humans[0].immune = true;
        humans[0].days_infected = 11;
        let vectors = create_vectors(500);
        let params = params(1.0, 0.0, 0.0);

        for _ in 0..50 {
            humans = update_population(&humans, &vectors, &params, &mut rng).unwrap();
            assert_eq!(humans[0].status(10), Status::Immune);
        }
    }

    #[test]
    fn without_vectors_only_humans_transmit() {
        let mut rng = ChaCha12Rng::seed_from_u64(2);
        let mut humans = grid(16, &[]);
        let params = params(1.0, 0.45, 0.1);

        for _ in 0..100 {
            humans = update_population(&humans, &[], &params, &mut rng).unwrap();
        }

        assert!(humans.iter().all(|h| h.status(10) == Status::Susceptible));
    }

    #[test]
    fn vectors_infect_without_infected_humans() {
        let mut rng = ChaCha12Rng::seed_from_u64(2);
        let humans = grid(16, &[]);
        let vectors = create_vectors(10);
        let params = params(1.0, 0.45, 0.1);

        let mut humans = humans;
        for _ in 0..10 {
            humans = update_population(&humans, &vectors, &params, &mut rng).unwrap();
        }

        assert!(humans.iter().any(|h| h.infected));
    }

    #[test]
    fn patient_zero_infects_neighbors() {
        let mut n_spread = 0;
        for seed in 0..100 {
            let mut rng = ChaCha12Rng::seed_from_u64(seed);
            let humans = grid(4, &[0]);
            let new_humans = update_population(&humans, &[], &params(1.0, 0.0, 0.0), &mut rng)
                .unwrap();

            assert!(new_humans[0].infected);
            if new_humans[1..].iter().any(|h| h.infected) {
                n_spread += 1;
            }

            let mut rng = ChaCha12Rng::seed_from_u64(seed);
            let again = update_population(&humans, &[], &params(1.0, 0.0, 0.0), &mut rng).unwrap();
            assert_eq!(new_humans, again);
        }
        assert!(n_spread > 0);
    }

    #[test]
    fn previous_snapshot_is_untouched() {
        let mut rng = ChaCha12Rng::seed_from_u64(17);
        let humans = grid(9, &[0]);
        let before = humans.clone();
        let vectors = create_vectors(100);

        let new_humans =
            update_population(&humans, &vectors, &params(1.0, 0.0, 0.0), &mut rng).unwrap();

        assert_eq!(humans, before);
        assert_eq!(new_humans[0].days_infected, 1);
        assert!(new_humans[1..].iter().all(|h| h.days_infected == 0));
    }

    #[test]
    fn empty_population_is_a_no_op() {
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let humans = update_population(&[], &create_vectors(5), &params(1.0, 0.5, 0.5), &mut rng)
            .unwrap();
        assert!(humans.is_empty());
    }

    #[test]
    fn rounds_are_indexed_from_zero() {
        let mut engine = Engine::new(config(25, 50), Some(1)).unwrap();
        for _ in 0..5 {
            engine.step().unwrap();
        }
        let rounds: Vec<_> = engine.history().records().iter().map(|r| r.round).collect();
        assert_eq!(rounds, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn reset_replaces_state_and_clears_history() {
        let mut engine = Engine::new(config(25, 50), Some(1)).unwrap();
        for _ in 0..5 {
            engine.step().unwrap();
        }

        engine.reconfigure(config(36, 10)).unwrap();

        assert!(engine.history().is_empty());
        assert_eq!(engine.humans().len(), 36);
        assert_eq!(engine.vectors().len(), 10);
        assert_eq!(engine.humans().iter().filter(|h| h.infected).count(), 1);
        assert!(engine.humans().iter().all(|h| h.days_infected == 0));
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(Engine::new(config(10, 50), Some(0)).is_err());

        let mut engine = Engine::new(config(25, 50), Some(0)).unwrap();
        let mut cfg = config(25, 50);
        cfg.model.immunity_rate = -0.1;
        assert!(engine.reconfigure(cfg).is_err());
        assert_eq!(engine.config().model.immunity_rate, 0.1);
    }
}
