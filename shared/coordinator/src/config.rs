use fedsim_core::{linspace_f64, linspace_i64, round4};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("axis {field}: a sweep descriptor must be [lo, hi, count], got {len} elements")]
    RangeArity { field: &'static str, len: usize },
    #[error("axis {field}: sweep count must be a positive integer")]
    RangeCount { field: &'static str },
}

/// A hyperparameter axis: either a single value or a 3-element sweep
/// descriptor `[lo, hi, count]` expanded into `count` linearly spaced
/// points. Non-numeric sweep elements are rejected at deserialization.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Axis<T> {
    Scalar(T),
    Range(Vec<T>),
}

impl Axis<u32> {
    fn expand(&self, field: &'static str) -> Result<Vec<u32>, ConfigError> {
        match self {
            Axis::Scalar(v) => Ok(vec![*v]),
            Axis::Range(r) => {
                let [lo, hi, count] = check_arity(field, r)?;
                if count == 0 {
                    return Err(ConfigError::RangeCount { field });
                }
                Ok(linspace_i64(lo as i64, hi as i64, count as usize)
                    .into_iter()
                    .map(|v| v.max(0) as u32)
                    .collect())
            }
        }
    }
}

impl Axis<f64> {
    fn expand(&self, field: &'static str) -> Result<Vec<f64>, ConfigError> {
        match self {
            Axis::Scalar(v) => Ok(vec![*v]),
            Axis::Range(r) => {
                let [lo, hi, count] = check_arity(field, r)?;
                if count.fract() != 0.0 || count < 1.0 {
                    return Err(ConfigError::RangeCount { field });
                }
                Ok(linspace_f64(lo, hi, count as usize)
                    .into_iter()
                    .map(round4)
                    .collect())
            }
        }
    }
}

fn check_arity<T: Copy>(field: &'static str, r: &[T]) -> Result<[T; 3], ConfigError> {
    match r {
        &[lo, hi, count] => Ok([lo, hi, count]),
        _ => Err(ConfigError::RangeArity {
            field,
            len: r.len(),
        }),
    }
}

/// Experiment file shape: `algo` and `data` are fixed per experiment, every
/// numeric hyperparameter may be swept. Field names follow the conventional
/// federated-averaging notation (R rounds, C client fraction, K clients,
/// E local epochs, B batch size, eta learning rate).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExperimentSpec {
    pub algo: String,
    pub data: String,
    #[serde(rename = "R")]
    pub rounds: Axis<u32>,
    #[serde(rename = "C")]
    pub client_fraction: Axis<f64>,
    #[serde(rename = "K")]
    pub num_clients: Axis<u32>,
    #[serde(rename = "E")]
    pub local_epochs: Axis<u32>,
    #[serde(rename = "B")]
    pub batch_size: Axis<u32>,
    pub eta: Axis<f64>,
    /// Weights each selected client prunes per round (0 disables pruning).
    #[serde(default)]
    pub prune: u32,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_seed() -> u64 {
    42
}

/// One fully scalar run produced by experiment expansion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub algo: String,
    pub data: String,
    pub rounds: u32,
    pub client_fraction: f64,
    pub num_clients: u32,
    pub local_epochs: u32,
    pub batch_size: u32,
    pub learning_rate: f64,
    pub prune_amount: u32,
    pub seed: u64,
}

impl RunConfig {
    pub fn check(&self) -> bool {
        self.rounds != 0
            && self.num_clients != 0
            && self.local_epochs != 0
            && self.batch_size != 0
            && self.client_fraction > 0.0
            && self.client_fraction <= 1.0
            && self.learning_rate > 0.0
    }
}

/// Cartesian product of all sweep axes, iterated in the fixed nested order
/// algo, data, R, C, K, E, B, eta (eta varies fastest). Deterministic.
pub fn expand_experiment(spec: &ExperimentSpec) -> Result<Vec<RunConfig>, ConfigError> {
    let rounds = spec.rounds.expand("R")?;
    let fractions = spec.client_fraction.expand("C")?;
    let clients = spec.num_clients.expand("K")?;
    let epochs = spec.local_epochs.expand("E")?;
    let batches = spec.batch_size.expand("B")?;
    let etas = spec.eta.expand("eta")?;

    let mut runs = Vec::new();
    for &r in &rounds {
        for &c in &fractions {
            for &k in &clients {
                for &e in &epochs {
                    for &b in &batches {
                        for &eta in &etas {
                            runs.push(RunConfig {
                                algo: spec.algo.clone(),
                                data: spec.data.clone(),
                                rounds: r,
                                client_fraction: c,
                                num_clients: k,
                                local_epochs: e,
                                batch_size: b,
                                learning_rate: eta,
                                prune_amount: spec.prune,
                                seed: spec.seed,
                            });
                        }
                    }
                }
            }
        }
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EXPERIMENT: &str = r#"{
        "algo": "FedAvg",
        "data": "synth_iid",
        "R": 2,
        "C": [0.3, 0.9, 3],
        "K": [2, 6, 3],
        "E": 10,
        "B": 64,
        "eta": 0.01
    }"#;

    #[test]
    fn expansion_is_a_cartesian_product() {
        let spec: ExperimentSpec = serde_json::from_str(EXPERIMENT).unwrap();
        let runs = expand_experiment(&spec).unwrap();
        assert_eq!(runs.len(), 9);

        // C is the outer swept axis, K the inner one
        let pairs: Vec<(f64, u32)> = runs
            .iter()
            .map(|run| (run.client_fraction, run.num_clients))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (0.3, 2),
                (0.3, 4),
                (0.3, 6),
                (0.6, 2),
                (0.6, 4),
                (0.6, 6),
                (0.9, 2),
                (0.9, 4),
                (0.9, 6),
            ]
        );

        for run in &runs {
            assert_eq!(run.rounds, 2);
            assert_eq!(run.local_epochs, 10);
            assert_eq!(run.batch_size, 64);
            assert_eq!(run.learning_rate, 0.01);
            assert_eq!(run.seed, 42);
            assert!(run.check());
        }
    }

    #[test]
    fn expansion_is_deterministic() {
        let spec: ExperimentSpec = serde_json::from_str(EXPERIMENT).unwrap();
        assert_eq!(
            expand_experiment(&spec).unwrap(),
            expand_experiment(&spec).unwrap()
        );
    }

    #[test]
    fn scalar_axes_expand_to_one_point() {
        let spec: ExperimentSpec = serde_json::from_str(
            r#"{"algo":"FedAvg","data":"synth_small","R":1,"C":0.5,"K":4,"E":1,"B":8,"eta":0.1}"#,
        )
        .unwrap();
        let runs = expand_experiment(&spec).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].client_fraction, 0.5);
    }

    #[test]
    fn single_point_sweep() {
        let spec: ExperimentSpec = serde_json::from_str(
            r#"{"algo":"FedAvg","data":"synth_small","R":1,"C":[0.5,0.9,1],"K":4,"E":1,"B":8,"eta":0.1}"#,
        )
        .unwrap();
        let runs = expand_experiment(&spec).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].client_fraction, 0.5);
    }

    #[test]
    fn integer_sweeps_truncate_toward_zero() {
        let spec: ExperimentSpec = serde_json::from_str(
            r#"{"algo":"FedAvg","data":"synth_small","R":1,"C":0.5,"K":4,"E":[1,2,3],"B":8,"eta":0.1}"#,
        )
        .unwrap();
        let epochs: Vec<u32> = expand_experiment(&spec)
            .unwrap()
            .iter()
            .map(|run| run.local_epochs)
            .collect();
        assert_eq!(epochs, vec![1, 1, 2]);
    }

    #[test]
    fn malformed_sweep_is_an_error() {
        let spec: ExperimentSpec = serde_json::from_str(
            r#"{"algo":"FedAvg","data":"synth_small","R":1,"C":[0.5,0.9],"K":4,"E":1,"B":8,"eta":0.1}"#,
        )
        .unwrap();
        assert!(matches!(
            expand_experiment(&spec),
            Err(ConfigError::RangeArity { field: "C", len: 2 })
        ));
    }

    #[test]
    fn non_numeric_sweep_fails_to_parse() {
        let result: Result<ExperimentSpec, _> = serde_json::from_str(
            r#"{"algo":"FedAvg","data":"synth_small","R":1,"C":["a","b","c"],"K":4,"E":1,"B":8,"eta":0.1}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn float_sweeps_round_to_four_places() {
        let spec: ExperimentSpec = serde_json::from_str(
            r#"{"algo":"FedAvg","data":"synth_small","R":1,"C":0.5,"K":4,"E":1,"B":8,"eta":[0.0001,0.001,3]}"#,
        )
        .unwrap();
        let etas: Vec<f64> = expand_experiment(&spec)
            .unwrap()
            .iter()
            .map(|run| run.learning_rate)
            .collect();
        assert_eq!(etas, vec![0.0001, 0.0006, 0.001]);
    }

    #[test]
    fn bad_configs_fail_check() {
        let spec: ExperimentSpec = serde_json::from_str(
            r#"{"algo":"FedAvg","data":"synth_small","R":1,"C":1.5,"K":4,"E":1,"B":8,"eta":0.1}"#,
        )
        .unwrap();
        assert!(!expand_experiment(&spec).unwrap()[0].check());
    }
}
