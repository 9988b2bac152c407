//! Search configuration for the skyline engines.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use super::error::SearchError;

/// How candidate successors are weighted when drawn at random.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Heuristic {
    /// Every candidate is equally likely.
    Uniform,
    /// Weight by the trips between each earlier path station and the
    /// candidate, as the PBS baseline does.
    Flow,
    /// Weight by the criteria estimators' predicted gains.
    #[default]
    Estimation,
}

impl Heuristic {
    pub fn as_str(self) -> &'static str {
        match self {
            Heuristic::Uniform => "uniform",
            Heuristic::Flow => "flow",
            Heuristic::Estimation => "estimation",
        }
    }
}

/// Parsing never fails: unknown names select [`Heuristic::Uniform`].
impl FromStr for Heuristic {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "pbs" | "flow" => Heuristic::Flow,
            "estimation" => Heuristic::Estimation,
            _ => Heuristic::Uniform,
        })
    }
}

impl fmt::Display for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of one MCTS skyline search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Subtree roots kept in the pool after the first round.
    pub initial_pool_size: usize,

    /// The pool never decays below this size.
    pub min_pool_size: usize,

    /// Multiplicative pool decay per round, in (0, 1].
    pub pool_decay: f64,

    /// Exploration steps per pool member in the first round.
    pub initial_iterations: usize,

    /// The per-member budget never decays below this.
    pub min_iterations: usize,

    /// Multiplicative iteration decay per round, in (0, 1].
    pub iteration_decay: f64,

    /// UCT exploration constant `c`.
    pub exploration_constant: f64,

    /// Number of rounds.
    pub rounds: usize,

    pub heuristic: Heuristic,

    /// Exponent sharpening (> 1) or flattening (< 1) estimation weights.
    pub bias_exponent: f64,

    /// Seed for reproducible runs. `None` seeds from entropy.
    pub seed: Option<u64>,

    /// Base interval, in exploration steps, between tree snapshots. Round
    /// `k` publishes every `sample_interval * (k + 1)` steps.
    pub sample_interval: usize,
}

impl SearchConfig {
    /// Create a configuration with the given pool and iteration schedule.
    pub fn new(
        initial_pool_size: usize,
        min_pool_size: usize,
        pool_decay: f64,
        initial_iterations: usize,
        min_iterations: usize,
        iteration_decay: f64,
    ) -> Self {
        Self {
            initial_pool_size,
            min_pool_size,
            pool_decay,
            initial_iterations,
            min_iterations,
            iteration_decay,
            ..Self::default()
        }
    }

    pub fn with_exploration_constant(mut self, c: f64) -> Self {
        self.exploration_constant = c;
        self
    }

    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn with_heuristic(mut self, heuristic: Heuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn with_bias_exponent(mut self, bias_exponent: f64) -> Self {
        self.bias_exponent = bias_exponent;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_sample_interval(mut self, sample_interval: usize) -> Self {
        self.sample_interval = sample_interval;
        self
    }

    /// Reject parameter combinations the schedule cannot run with.
    pub fn validate(&self) -> Result<(), SearchError> {
        let invalid = |reason: &str| Err(SearchError::InvalidConfig(reason.to_string()));

        if self.rounds == 0 {
            return invalid("at least one round is required");
        }
        if self.initial_pool_size == 0 {
            return invalid("initial pool size must be positive");
        }
        if self.min_pool_size > self.initial_pool_size {
            return invalid("minimum pool size exceeds the initial pool size");
        }
        if self.min_iterations > self.initial_iterations {
            return invalid("minimum iterations exceed the initial iterations");
        }
        for (name, decay) in [("pool", self.pool_decay), ("iteration", self.iteration_decay)] {
            if !(decay > 0.0 && decay <= 1.0) {
                return Err(SearchError::InvalidConfig(format!(
                    "{name} decay {decay} is outside (0, 1]"
                )));
            }
        }
        if !(self.exploration_constant >= 0.0 && self.exploration_constant.is_finite()) {
            return invalid("exploration constant must be finite and non-negative");
        }
        if !self.bias_exponent.is_finite() {
            return invalid("bias exponent must be finite");
        }
        if self.sample_interval == 0 {
            return invalid("sample interval must be positive");
        }
        Ok(())
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            initial_pool_size: 8,
            min_pool_size: 8,
            pool_decay: 1.0,
            initial_iterations: 8192,
            min_iterations: 256,
            iteration_decay: 0.5,
            exploration_constant: 0.05,
            rounds: 5,
            heuristic: Heuristic::Estimation,
            bias_exponent: 5.0,
            seed: None,
            sample_interval: 512,
        }
    }
}

/// Parameters of the PBS random-walk baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct PbsConfig {
    /// Stop once this many completed walks have been offered to the
    /// frontier. At most ten times as many rounds are attempted.
    pub target_insertions: usize,

    /// Also walk the edge-reversed graph each round.
    pub bidirectional: bool,

    pub seed: Option<u64>,

    /// Admission-gate capacity of the parallel variant.
    pub max_concurrent: usize,
}

impl PbsConfig {
    pub fn new(target_insertions: usize) -> Self {
        Self {
            target_insertions,
            ..Self::default()
        }
    }

    pub fn bidirectional(mut self) -> Self {
        self.bidirectional = true;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }
}

impl Default for PbsConfig {
    fn default() -> Self {
        Self {
            target_insertions: 1000,
            bidirectional: false,
            seed: None,
            max_concurrent: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SearchConfig::default();

        assert_eq!(config.initial_pool_size, 8);
        assert_eq!(config.min_pool_size, 8);
        assert_eq!(config.pool_decay, 1.0);
        assert_eq!(config.initial_iterations, 8192);
        assert_eq!(config.min_iterations, 256);
        assert_eq!(config.iteration_decay, 0.5);
        assert_eq!(config.rounds, 5);
        assert_eq!(config.heuristic, Heuristic::Estimation);
        assert_eq!(config.sample_interval, 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn custom_config() {
        let config = SearchConfig::new(4, 2, 0.5, 100, 10, 0.7)
            .with_rounds(3)
            .with_heuristic(Heuristic::Uniform)
            .with_seed(7);

        assert_eq!(config.initial_pool_size, 4);
        assert_eq!(config.min_iterations, 10);
        assert_eq!(config.rounds, 3);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.exploration_constant, 0.05);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_failures() {
        let cases = [
            SearchConfig::default().with_rounds(0),
            SearchConfig::new(4, 8, 1.0, 100, 10, 0.5),
            SearchConfig::new(8, 8, 1.0, 10, 100, 0.5),
            SearchConfig::new(8, 8, 0.0, 100, 10, 0.5),
            SearchConfig::new(8, 8, 1.0, 100, 10, 1.5),
            SearchConfig::default().with_exploration_constant(-1.0),
            SearchConfig::default().with_bias_exponent(f64::NAN),
            SearchConfig::default().with_sample_interval(0),
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(SearchError::InvalidConfig(_))),
                "{config:?}"
            );
        }
    }

    #[test]
    fn heuristic_names() {
        assert_eq!("pbs".parse::<Heuristic>(), Ok(Heuristic::Flow));
        assert_eq!("flow".parse::<Heuristic>(), Ok(Heuristic::Flow));
        assert_eq!("Estimation".parse::<Heuristic>(), Ok(Heuristic::Estimation));
        assert_eq!("uniform".parse::<Heuristic>(), Ok(Heuristic::Uniform));
        assert_eq!("anything".parse::<Heuristic>(), Ok(Heuristic::Uniform));
        assert_eq!(Heuristic::Flow.to_string(), "flow");
    }

    #[test]
    fn pbs_builder() {
        let config = PbsConfig::new(50).bidirectional().with_seed(3).with_max_concurrent(4);
        assert_eq!(config.target_insertions, 50);
        assert!(config.bidirectional);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.max_concurrent, 4);
    }
}
