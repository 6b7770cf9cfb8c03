//! Noise parameters and the injectable distributions that turn them into
//! sampled fidelities and latencies.
//!
//! Every random draw in the simulator goes through a [`ClampedDistribution`]
//! so generated fidelities stay in `[0, 1]` and latencies stay non-negative
//! whatever the parameters. A [`LinkModel`] decides how two nodes' noise
//! parameters combine into link-generation behaviour; [`GaussianLinkModel`]
//! is the default.

use rand::Rng;
use rand_distr::{Distribution as _, Exp, Normal, Uniform};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{NetError, NetResult};

/// Per-node (or per-link) noise parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseParams {
    /// Fidelity lost per operation touching the node, in `[0, 1]`.
    #[serde(default = "default_fidelity_loss_rate")]
    pub fidelity_loss_rate: f64,
    /// Channel noise, in `[0, 1]`. Drives both the failure probability of a
    /// link-generation attempt and the spread of sampled values.
    #[serde(default = "default_channel_noise")]
    pub channel_noise: f64,
    /// Mean seconds per link-generation attempt.
    #[serde(default = "default_mean_link_latency")]
    pub mean_link_latency: f64,
}

fn default_fidelity_loss_rate() -> f64 {
    0.01
}

fn default_channel_noise() -> f64 {
    0.05
}

fn default_mean_link_latency() -> f64 {
    0.15
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            fidelity_loss_rate: default_fidelity_loss_rate(),
            channel_noise: default_channel_noise(),
            mean_link_latency: default_mean_link_latency(),
        }
    }
}

impl NoiseParams {
    /// Noise-free parameters with a fixed link latency.
    pub fn noiseless(mean_link_latency: f64) -> Self {
        Self {
            fidelity_loss_rate: 0.0,
            channel_noise: 0.0,
            mean_link_latency,
        }
    }

    /// Check that rates are probabilities and latency is non-negative.
    pub fn validate(&self) -> NetResult<()> {
        check_probability("fidelity_loss_rate", self.fidelity_loss_rate)?;
        check_probability("channel_noise", self.channel_noise)?;
        if !self.mean_link_latency.is_finite() || self.mean_link_latency < 0.0 {
            return Err(NetError::InvalidConfig(format!(
                "mean_link_latency must be a non-negative number of seconds, got {}",
                self.mean_link_latency
            )));
        }
        Ok(())
    }
}

pub(crate) fn check_probability(name: &str, value: f64) -> NetResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(NetError::InvalidConfig(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

/// A parameterised real-valued distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Distribution {
    /// Always the same value.
    Constant {
        /// The value.
        value: f64,
    },
    /// Gaussian.
    Normal {
        /// Mean.
        mean: f64,
        /// Standard deviation, strictly positive.
        std_dev: f64,
    },
    /// Uniform over `[low, high)`.
    Uniform {
        /// Lower bound.
        low: f64,
        /// Upper bound, strictly greater than `low`.
        high: f64,
    },
    /// Exponential with the given rate.
    Exponential {
        /// Rate (inverse mean), strictly positive.
        rate: f64,
    },
}

impl Distribution {
    /// A constant distribution.
    pub fn constant(value: f64) -> Self {
        Distribution::Constant { value }
    }

    /// A normal distribution; zero spread collapses to a constant.
    pub fn normal(mean: f64, std_dev: f64) -> Self {
        if std_dev > 0.0 {
            Distribution::Normal { mean, std_dev }
        } else {
            Distribution::Constant { value: mean }
        }
    }

    /// A uniform distribution; an empty range collapses to a constant.
    pub fn uniform(low: f64, high: f64) -> Self {
        if high > low {
            Distribution::Uniform { low, high }
        } else {
            Distribution::Constant { value: low }
        }
    }

    /// An exponential distribution with the given mean.
    pub fn exponential_with_mean(mean: f64) -> Self {
        if mean > 0.0 {
            Distribution::Exponential { rate: 1.0 / mean }
        } else {
            Distribution::Constant { value: 0.0 }
        }
    }

    /// Check the parameters can be sampled.
    pub fn validate(&self) -> NetResult<()> {
        let ok = match *self {
            Distribution::Constant { value } => value.is_finite(),
            Distribution::Normal { mean, std_dev } => {
                mean.is_finite() && std_dev.is_finite() && std_dev > 0.0
            }
            Distribution::Uniform { low, high } => low.is_finite() && high.is_finite() && high > low,
            Distribution::Exponential { rate } => rate.is_finite() && rate > 0.0,
        };
        if ok {
            Ok(())
        } else {
            Err(NetError::InvalidDistribution(format!("{self}")))
        }
    }

    /// Expected value.
    pub fn mean(&self) -> f64 {
        match *self {
            Distribution::Constant { value } => value,
            Distribution::Normal { mean, .. } => mean,
            Distribution::Uniform { low, high } => (low + high) / 2.0,
            Distribution::Exponential { rate } => 1.0 / rate,
        }
    }

    /// Whether sampling consumes randomness.
    pub fn is_deterministic(&self) -> bool {
        matches!(self, Distribution::Constant { .. })
    }

    /// Draw one value. Unsampleable parameters fall back to the mean.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Distribution::Constant { value } => value,
            Distribution::Normal { mean, std_dev } => match Normal::new(mean, std_dev) {
                Ok(normal) => normal.sample(rng),
                Err(_) => mean,
            },
            Distribution::Uniform { low, high } => {
                if high > low && (high - low).is_finite() {
                    Uniform::new(low, high).sample(rng)
                } else {
                    low
                }
            }
            Distribution::Exponential { rate } => match Exp::new(rate) {
                Ok(exp) => exp.sample(rng),
                Err(_) => self.mean(),
            },
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Constant { value } => write!(f, "constant({value})"),
            Distribution::Normal { mean, std_dev } => write!(f, "normal({mean}, {std_dev})"),
            Distribution::Uniform { low, high } => write!(f, "uniform({low}, {high})"),
            Distribution::Exponential { rate } => write!(f, "exponential({rate})"),
        }
    }
}

/// A distribution whose samples are clamped into `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClampedDistribution {
    /// Underlying distribution.
    pub distribution: Distribution,
    /// Lower clamp.
    pub min: f64,
    /// Upper clamp.
    pub max: f64,
}

impl ClampedDistribution {
    /// Clamp into `[0, 1]`, for fidelities and probabilities.
    pub fn unit_interval(distribution: Distribution) -> Self {
        Self {
            distribution,
            min: 0.0,
            max: 1.0,
        }
    }

    /// Clamp into `[0, inf)`, for latencies.
    pub fn non_negative(distribution: Distribution) -> Self {
        Self {
            distribution,
            min: 0.0,
            max: f64::INFINITY,
        }
    }

    /// Draw one value within the bounds. NaN maps to `min`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let value = self.distribution.sample(rng);
        if value.is_nan() {
            self.min
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

/// Turns two nodes' noise parameters into link-generation behaviour.
pub trait LinkModel: Send + Sync + fmt::Debug {
    /// Probability that a single generation attempt succeeds.
    fn success_probability(&self, a: &NoiseParams, b: &NoiseParams) -> f64;

    /// Fidelity of a successfully generated link.
    fn fidelity(&self, a: &NoiseParams, b: &NoiseParams) -> ClampedDistribution;

    /// Seconds taken by one generation attempt, successful or not.
    fn latency(&self, a: &NoiseParams, b: &NoiseParams) -> ClampedDistribution;
}

/// Gaussian fidelity and latency around the nodes' declared means.
///
/// - success probability is `(1 - noise_a)(1 - noise_b)`
/// - fidelity is centred on `base_fidelity - (loss_a + loss_b) / 2` with a
///   spread of `fidelity_spread` times the mean channel noise
/// - latency is centred on the mean of both nodes' link latencies with a
///   relative spread of `latency_spread` times the mean channel noise
///
/// Zero channel noise yields constant distributions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianLinkModel {
    /// Fidelity of a link between perfect nodes.
    #[serde(default = "default_base_fidelity")]
    pub base_fidelity: f64,
    /// Fidelity standard deviation per unit of channel noise.
    #[serde(default = "default_fidelity_spread")]
    pub fidelity_spread: f64,
    /// Relative latency standard deviation per unit of channel noise.
    #[serde(default = "default_latency_spread")]
    pub latency_spread: f64,
}

fn default_base_fidelity() -> f64 {
    0.985
}

fn default_fidelity_spread() -> f64 {
    0.2
}

fn default_latency_spread() -> f64 {
    0.5
}

impl Default for GaussianLinkModel {
    fn default() -> Self {
        Self {
            base_fidelity: default_base_fidelity(),
            fidelity_spread: default_fidelity_spread(),
            latency_spread: default_latency_spread(),
        }
    }
}

impl GaussianLinkModel {
    /// Model with a custom base fidelity and default spreads.
    pub fn with_base_fidelity(base_fidelity: f64) -> Self {
        Self {
            base_fidelity,
            ..Self::default()
        }
    }

    /// Check the parameters.
    pub fn validate(&self) -> NetResult<()> {
        check_probability("base_fidelity", self.base_fidelity)?;
        if self.fidelity_spread < 0.0 || self.latency_spread < 0.0 {
            return Err(NetError::InvalidConfig(
                "distribution spreads must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

impl LinkModel for GaussianLinkModel {
    fn success_probability(&self, a: &NoiseParams, b: &NoiseParams) -> f64 {
        ((1.0 - a.channel_noise) * (1.0 - b.channel_noise)).clamp(0.0, 1.0)
    }

    fn fidelity(&self, a: &NoiseParams, b: &NoiseParams) -> ClampedDistribution {
        let penalty = (a.fidelity_loss_rate + b.fidelity_loss_rate) / 2.0;
        let noise = (a.channel_noise + b.channel_noise) / 2.0;
        ClampedDistribution::unit_interval(Distribution::normal(
            self.base_fidelity - penalty,
            self.fidelity_spread * noise,
        ))
    }

    fn latency(&self, a: &NoiseParams, b: &NoiseParams) -> ClampedDistribution {
        let mean = (a.mean_link_latency + b.mean_link_latency) / 2.0;
        let noise = (a.channel_noise + b.channel_noise) / 2.0;
        ClampedDistribution::non_negative(Distribution::normal(
            mean,
            mean * self.latency_spread * noise,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_zero_spread_is_constant() {
        assert!(Distribution::normal(0.5, 0.0).is_deterministic());
        assert!(Distribution::uniform(1.0, 1.0).is_deterministic());
        assert!(Distribution::exponential_with_mean(0.0).is_deterministic());
    }

    #[test]
    fn test_validate() {
        assert!(Distribution::normal(0.5, 0.1).validate().is_ok());
        assert!(Distribution::Normal { mean: 0.5, std_dev: -1.0 }.validate().is_err());
        assert!(Distribution::Uniform { low: 2.0, high: 1.0 }.validate().is_err());
        assert!(Distribution::Exponential { rate: 0.0 }.validate().is_err());
    }

    #[test]
    fn test_unsampleable_falls_back() {
        let mut rng = StdRng::seed_from_u64(1);
        let d = Distribution::Uniform { low: 3.0, high: 3.0 };
        assert_eq!(d.sample(&mut rng), 3.0);
    }

    #[test]
    fn test_clamping() {
        let mut rng = StdRng::seed_from_u64(7);
        let wide = ClampedDistribution::unit_interval(Distribution::normal(0.5, 10.0));
        for _ in 0..1000 {
            let v = wide.sample(&mut rng);
            assert!((0.0..=1.0).contains(&v));
        }
        let latency = ClampedDistribution::non_negative(Distribution::normal(0.0, 1.0));
        for _ in 0..1000 {
            assert!(latency.sample(&mut rng) >= 0.0);
        }
    }

    #[test]
    fn test_gaussian_model_noiseless() {
        let model = GaussianLinkModel::default();
        let quiet = NoiseParams::noiseless(0.15);
        let mut rng = StdRng::seed_from_u64(42);

        assert_eq!(model.success_probability(&quiet, &quiet), 1.0);
        assert_eq!(model.latency(&quiet, &quiet).sample(&mut rng), 0.15);
        assert_eq!(model.fidelity(&quiet, &quiet).sample(&mut rng), 0.985);
    }

    #[test]
    fn test_gaussian_model_penalises_noise() {
        let model = GaussianLinkModel::default();
        let quiet = NoiseParams::noiseless(0.15);
        let noisy = NoiseParams {
            fidelity_loss_rate: 0.1,
            channel_noise: 0.3,
            mean_link_latency: 0.15,
        };
        assert!(model.success_probability(&noisy, &noisy) < model.success_probability(&quiet, &quiet));
        assert!(
            model.fidelity(&noisy, &noisy).distribution.mean()
                < model.fidelity(&quiet, &quiet).distribution.mean()
        );
    }

    #[test]
    fn test_noise_params_validate() {
        assert!(NoiseParams::default().validate().is_ok());
        let bad = NoiseParams {
            channel_noise: 1.5,
            ..NoiseParams::default()
        };
        assert!(bad.validate().is_err());
        assert!(NoiseParams::noiseless(-0.1).validate().is_err());
    }
}
