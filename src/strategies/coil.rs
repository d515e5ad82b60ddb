//! coil.rs
//! Analytical search-coil formulas. Each is a stateless strategy whose declared
//! dependencies list every parameter and node it reads.

use crate::compute::strategy::{Dependencies, DependencyList, Strategy, StrategyError};
use crate::store::{ParameterStore, ResultEnvelope};
use smallvec::smallvec;
use std::f64::consts::PI;

pub(super) const MU_0: f64 = 4.0 * PI * 1e-7;

/// Upper bound on the length of a frequency sweep.
pub const MAX_SWEEP_POINTS: usize = 1_000_000;

pub(super) fn deps(names: &[&str]) -> DependencyList {
    names.iter().map(|n| n.to_string()).collect()
}

pub(super) fn checked_div(num: f64, den: f64, what: &str) -> Result<f64, StrategyError> {
    if den == 0.0 {
        return Err(StrategyError::Numeric(format!("division by zero computing {what}")));
    }
    Ok(num / den)
}

/// Log-spaced frequency sweep, endpoints included.
pub struct FrequencyVector;

impl Strategy for FrequencyVector {
    fn dependencies(&self) -> DependencyList {
        deps(&["f_start", "f_stop", "nb_points_per_decade"])
    }

    fn calculate(&self, _: &Dependencies, parameters: &ParameterStore) -> Result<ResultEnvelope, StrategyError> {
        let f_start = parameters.scalar("f_start")?;
        let f_stop = parameters.scalar("f_stop")?;
        let per_decade = parameters.scalar("nb_points_per_decade")?;
        if f_start <= 0.0 || f_stop <= f_start {
            return Err(StrategyError::InvalidInput {
                name: "f_stop".into(),
                reason: format!("expected 0 < f_start < f_stop, got {f_start} and {f_stop}"),
            });
        }

        if !per_decade.is_finite() || per_decade <= 0.0 {
            return Err(StrategyError::InvalidInput {
                name: "nb_points_per_decade".into(),
                reason: format!("expected a positive finite density, got {per_decade}"),
            });
        }

        let (lo, hi) = (f_start.log10(), f_stop.log10());
        let points = ((hi - lo) * per_decade).round();
        if !points.is_finite() || points > MAX_SWEEP_POINTS as f64 {
            return Err(StrategyError::InvalidInput {
                name: "nb_points_per_decade".into(),
                reason: format!("sweep would exceed {MAX_SWEEP_POINTS} points"),
            });
        }
        let values = match points as usize {
            0 => {
                return Err(StrategyError::InvalidInput {
                    name: "nb_points_per_decade".into(),
                    reason: "sweep would contain no points".into(),
                })
            }
            1 => vec![f_start],
            n => {
                let step = (hi - lo) / (n - 1) as f64;
                (0..n).map(|i| 10f64.powf(lo + step * i as f64)).collect()
            }
        };
        Ok(ResultEnvelope::series(values, "Frequency", "Hz"))
    }

    fn name(&self) -> &str { "FrequencyVector" }
}

/// DC resistance of the winding: N * 2πr * ρ.
pub struct Resistance;

impl Strategy for Resistance {
    fn dependencies(&self) -> DependencyList {
        deps(&["nb_spire", "ray_spire", "rho_wire"])
    }

    fn calculate(&self, _: &Dependencies, parameters: &ParameterStore) -> Result<ResultEnvelope, StrategyError> {
        let turns = parameters.scalar("nb_spire")?;
        let radius = parameters.scalar("ray_spire")?;
        let rho = parameters.scalar("rho_wire")?;
        Ok(ResultEnvelope::scalar(turns * 2.0 * PI * radius * rho, "Resistance", "Ohm"))
    }

    fn name(&self) -> &str { "Resistance" }
}

/// Demagnetizing factor of a cylindrical core.
pub struct DemagnetizingFactor;

impl Strategy for DemagnetizingFactor {
    fn dependencies(&self) -> DependencyList {
        deps(&["diam_core", "len_core"])
    }

    fn calculate(&self, _: &Dependencies, parameters: &ParameterStore) -> Result<ResultEnvelope, StrategyError> {
        let diam = parameters.scalar("diam_core")?;
        let len = parameters.scalar("len_core")?;
        let nz = checked_div(diam, 2.0 * len + diam, "Nz")?;
        Ok(ResultEnvelope::scalar(nz, "Nz", ""))
    }

    fn name(&self) -> &str { "DemagnetizingFactor" }
}

pub struct ApparentPermeability;

impl Strategy for ApparentPermeability {
    fn dependencies(&self) -> DependencyList {
        deps(&["mu_r", "Nz"])
    }

    fn calculate(&self, dependencies: &Dependencies, parameters: &ParameterStore) -> Result<ResultEnvelope, StrategyError> {
        let mu_r = parameters.scalar("mu_r")?;
        let nz = dependencies.scalar("Nz")?;
        let mu_app = checked_div(mu_r, 1.0 + nz * (mu_r - 1.0), "mu_app")?;
        Ok(ResultEnvelope::scalar(mu_app, "mu_app", ""))
    }

    fn name(&self) -> &str { "ApparentPermeability" }
}

/// Coil-to-core length correction, (l_coil / l_core)^(-2/5).
pub struct LengthRatio;

impl Strategy for LengthRatio {
    fn dependencies(&self) -> DependencyList {
        deps(&["len_coil", "len_core"])
    }

    fn calculate(&self, _: &Dependencies, parameters: &ParameterStore) -> Result<ResultEnvelope, StrategyError> {
        let ratio = checked_div(parameters.scalar("len_coil")?, parameters.scalar("len_core")?, "lambda")?;
        Ok(ResultEnvelope::scalar(ratio.powf(-0.4), "lambda", ""))
    }

    fn name(&self) -> &str { "LengthRatio" }
}

pub struct Inductance;

impl Strategy for Inductance {
    fn dependencies(&self) -> DependencyList {
        smallvec![
            "nb_spire".to_string(),
            "ray_spire".to_string(),
            "len_coil".to_string(),
            "lambda_param".to_string(),
            "mu_app".to_string(),
        ]
    }

    fn calculate(&self, dependencies: &Dependencies, parameters: &ParameterStore) -> Result<ResultEnvelope, StrategyError> {
        let turns = parameters.scalar("nb_spire")?;
        let diam = 2.0 * parameters.scalar("ray_spire")?;
        let len_coil = parameters.scalar("len_coil")?;
        let lambda = dependencies.scalar("lambda_param")?;
        let mu_app = dependencies.scalar("mu_app")?;

        let area = PI * diam * diam / 4.0;
        let l = checked_div(MU_0 * mu_app * turns * turns * area * lambda, len_coil, "inductance")?;
        Ok(ResultEnvelope::scalar(l, "Inductance", "H"))
    }

    fn name(&self) -> &str { "Inductance" }
}

/// |Z(f)| of the coil modelled as R + jωL in parallel with C.
/// Produces a table whose index column is the frequency sweep.
pub struct Impedance;

impl Strategy for Impedance {
    fn dependencies(&self) -> DependencyList {
        deps(&["resistance", "inductance", "capacitance", "frequency_vector"])
    }

    fn calculate(&self, dependencies: &Dependencies, _: &ParameterStore) -> Result<ResultEnvelope, StrategyError> {
        let r = dependencies.scalar("resistance")?;
        let l = dependencies.scalar("inductance")?;
        let c = dependencies.scalar("capacitance")?;
        let freqs = dependencies.series("frequency_vector")?;

        let magnitudes = freqs
            .iter()
            .map(|&f| {
                let w = 2.0 * PI * f;
                let num = r * r + (l * w).powi(2);
                let den = (1.0 - l * c * w * w).powi(2) + (r * c * w).powi(2);
                checked_div(num, den, "impedance").map(f64::sqrt)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResultEnvelope::table(
            vec![freqs.to_vec(), magnitudes],
            vec!["Impedance".into()],
            vec!["Ohm".into()],
        ))
    }

    fn name(&self) -> &str { "Impedance" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::engine::Engine;
    use crate::compute::ledger::EngineError;
    use crate::config::EngineConfig;
    use crate::strategies::StrategyRegistry;
    use crate::store::Value;
    use rstest::rstest;

    fn coil_parameters() -> ParameterStore {
        ParameterStore::new()
            .with("f_start", 1.0)
            .with("f_stop", 1000.0)
            .with("nb_points_per_decade", 10.0)
            .with("nb_spire", 12000.0)
            .with("ray_spire", 0.005)
            .with("rho_wire", 1.6)
            .with("diam_core", 0.0032)
            .with("len_core", 0.20)
            .with("len_coil", 0.155)
            .with("mu_r", 100_000.0)
            .with("capacitance", 1e-10)
    }

    fn engine() -> Engine {
        Engine::with_registry(EngineConfig::default(), &StrategyRegistry::coil_model()).unwrap()
    }

    #[test]
    fn test_frequency_sweep_includes_both_endpoints() {
        let env = FrequencyVector.calculate(&Dependencies::new(), &coil_parameters()).unwrap();
        let f = env.as_series().unwrap();
        assert_eq!(f.len(), 30);
        assert!((f[0] - 1.0).abs() < 1e-12);
        assert!((f[29] - 1000.0).abs() < 1e-9);
        assert!(f.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_frequency_sweep_rejects_inverted_bounds() {
        let params = coil_parameters().with("f_stop", 0.5);
        let err = FrequencyVector.calculate(&Dependencies::new(), &params).unwrap_err();
        assert!(matches!(err, StrategyError::InvalidInput { .. }));
    }

    #[rstest]
    #[case(1e300)]
    #[case(f64::INFINITY)]
    #[case(f64::NAN)]
    #[case(-10.0)]
    fn test_unbounded_sweep_density_is_rejected(#[case] per_decade: f64) {
        let params = coil_parameters().with("nb_points_per_decade", per_decade);
        let err = FrequencyVector.calculate(&Dependencies::new(), &params).unwrap_err();
        assert!(matches!(err, StrategyError::InvalidInput { ref name, .. } if name == "nb_points_per_decade"));

        let mut engine = engine();
        match engine.update_parameters(params).unwrap_err() {
            EngineError::StrategyComputation { node, .. } => assert_eq!(node, "frequency_vector"),
            other => panic!("Wrong error type: {other:?}"),
        }
    }

    #[test]
    fn test_coil_model_end_to_end() {
        let mut engine = engine();
        engine.update_parameters(coil_parameters()).unwrap();
        let results = engine.get_current_results();

        let r = results.scalar("resistance").unwrap();
        assert!((r - 12000.0 * 2.0 * PI * 0.005 * 1.6).abs() < 1e-9);

        let impedance = results.get("impedance").unwrap();
        match &impedance.data {
            Value::Table(cols) => {
                assert_eq!(cols.len(), 2);
                assert_eq!(cols[0].len(), 30);
                assert!(cols[1].iter().all(|z| z.is_finite() && *z > 0.0));
            }
            other => panic!("expected a table, got {other:?}"),
        }
        assert!(impedance.shape_error().is_none());
    }

    #[test]
    fn test_permeability_change_leaves_resistance_alone() {
        let mut engine = engine();
        engine.update_parameters(coil_parameters()).unwrap();
        let resistance_before = engine.get_current_results().get("resistance").unwrap().clone();

        let report = engine.update_parameters(coil_parameters().with("mu_r", 50_000.0)).unwrap();
        for name in ["mu_r", "mu_app", "inductance", "impedance"] {
            assert!(report.was_recomputed(name), "{name} should be recomputed");
        }
        for name in ["resistance", "Nz", "lambda_param", "frequency_vector"] {
            assert!(!report.was_recomputed(name), "{name} should be carried forward");
        }
        let resistance_after = engine.get_current_results().get("resistance").unwrap();
        assert!(std::sync::Arc::ptr_eq(&resistance_before, resistance_after));
    }

    #[test]
    fn test_degenerate_core_reports_the_failing_node() {
        let mut engine = engine();
        let params = coil_parameters().with("diam_core", 0.0).with("len_core", 0.0);
        match engine.update_parameters(params).unwrap_err() {
            EngineError::StrategyComputation { node, source } => {
                assert!(["Nz", "lambda_param"].contains(&node.as_str()));
                assert!(matches!(source, StrategyError::Numeric(_)));
            }
            other => panic!("Wrong error type: {other:?}"),
        }
        assert!(engine.get_current_results().is_empty());
    }
}
