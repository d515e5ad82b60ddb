//! noise.rs
//! Thermal noise densities of the feedback resistor and of the coil winding,
//! in V/sqrt(Hz), as frequency tables.

use super::coil::{checked_div, deps};
use super::front_end::{frequency_table, gain_column, STAGE_1};
use crate::compute::strategy::{Dependencies, DependencyList, Strategy, StrategyError};
use crate::store::{ParameterStore, ResultEnvelope};
use std::f64::consts::PI;

const BOLTZMANN: f64 = 1.380_649e-23;

/// Johnson noise of the feedback resistor, flat over the sweep.
pub struct FeedbackResistorNoise;

impl Strategy for FeedbackResistorNoise {
    fn dependencies(&self) -> DependencyList {
        deps(&["temperature", "feedback_resistance", "frequency_vector"])
    }

    fn calculate(&self, dependencies: &Dependencies, parameters: &ParameterStore) -> Result<ResultEnvelope, StrategyError> {
        let temperature = parameters.scalar("temperature")?;
        let resistance = parameters.scalar("feedback_resistance")?;
        let freqs = dependencies.series("frequency_vector")?;

        let density = (4.0 * BOLTZMANN * temperature * resistance).sqrt();
        Ok(frequency_table(freqs, vec![density; freqs.len()], "PSD_R_cr", "V/sqrt(Hz)"))
    }

    fn name(&self) -> &str { "FeedbackResistorNoise" }
}

/// Johnson noise of the winding resistance seen through the first stage and
/// the feedback loop.
pub struct CoilNoise;

impl Strategy for CoilNoise {
    fn dependencies(&self) -> DependencyList {
        deps(&[
            "temperature",
            "frequency_vector",
            STAGE_1,
            "inductance",
            "capacitance",
            "resistance",
            "mutual_inductance",
            "feedback_resistance",
        ])
    }

    fn calculate(&self, dependencies: &Dependencies, parameters: &ParameterStore) -> Result<ResultEnvelope, StrategyError> {
        let temperature = parameters.scalar("temperature")?;
        let mutual = parameters.scalar("mutual_inductance")?;
        let feedback = parameters.scalar("feedback_resistance")?;
        let l = dependencies.scalar("inductance")?;
        let c = dependencies.scalar("capacitance")?;
        let r = dependencies.scalar("resistance")?;
        let freqs = dependencies.series("frequency_vector")?;
        let stage_1 = gain_column(dependencies, STAGE_1, freqs.len())?;
        let coupling = checked_div(mutual, feedback, "coil noise")?;

        let values = freqs
            .iter()
            .zip(stage_1)
            .map(|(&f, &g)| {
                let w = 2.0 * PI * f;
                let num = 4.0 * BOLTZMANN * temperature * r * g * g;
                let den = (1.0 - l * c * w * w).powi(2) + (r * c * w + g * coupling * w).powi(2);
                checked_div(num, den, "coil noise").map(f64::sqrt)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(frequency_table(freqs, values, "PSD_R_Coil", "V/sqrt(Hz)"))
    }

    fn name(&self) -> &str { "CoilNoise" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::engine::Engine;
    use crate::config::EngineConfig;
    use crate::strategies::{front_end_parameters, StrategyRegistry};

    #[test]
    fn test_feedback_resistor_noise_is_flat() {
        let mut engine = Engine::with_registry(EngineConfig::default(), &StrategyRegistry::front_end_model()).unwrap();
        engine.update_parameters(front_end_parameters()).unwrap();

        let table = engine.get_current_results().get("PSD_R_cr").unwrap();
        let cols = table.data.as_table().unwrap();
        let expected = (4.0 * BOLTZMANN * 300.0 * 10_000.0).sqrt();
        assert!(cols[1].iter().all(|v| (v - expected).abs() < 1e-15));
        assert_eq!(table.units, vec!["V/sqrt(Hz)".to_string()]);

        let filtered = engine.get_current_results().get("PSD_R_cr_filtered").unwrap();
        assert_eq!(filtered.labels, table.labels);
        assert!(filtered.data.as_table().unwrap()[1][0] > expected);
    }

    #[test]
    fn test_temperature_only_touches_noise_nodes() {
        let mut engine = Engine::with_registry(EngineConfig::default(), &StrategyRegistry::front_end_model()).unwrap();
        engine.update_parameters(front_end_parameters()).unwrap();

        let report = engine.update_parameters(front_end_parameters().with("temperature", 77.0)).unwrap();
        let mut recomputed = report.recomputed.clone();
        recomputed.sort();
        assert_eq!(recomputed, vec!["PSD_R_Coil", "PSD_R_Coil_filtered", "PSD_R_cr", "PSD_R_cr_filtered", "temperature"]);
    }
}
