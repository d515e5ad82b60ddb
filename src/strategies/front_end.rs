//! front_end.rs
//! ASIC amplifier stages and the open/closed loop transfer functions of the
//! coil + amplifier chain. Every result is a two-column table indexed by the
//! frequency sweep.

use super::coil::{checked_div, deps, MU_0};
use crate::compute::strategy::{Dependencies, DependencyList, Strategy, StrategyError};
use crate::store::{ParameterStore, ResultEnvelope};
use std::f64::consts::PI;

pub const STAGE_1: &str = "TF_ASIC_Stage_1_linear";
pub const STAGE_2: &str = "TF_ASIC_Stage_2_linear";
pub const OPEN_LOOP: &str = "OLTF_Non_filtered";
pub const CLOSED_LOOP: &str = "CLTF_Non_filtered";

pub(super) fn frequency_table(freqs: &[f64], values: Vec<f64>, label: &str, unit: &str) -> ResultEnvelope {
    ResultEnvelope::table(vec![freqs.to_vec(), values], vec![label.to_string()], vec![unit.to_string()])
}

/// Gain column of `name`, checked against the length of the sweep.
pub(super) fn gain_column<'a>(dependencies: &'a Dependencies, name: &str, len: usize) -> Result<&'a [f64], StrategyError> {
    let column = dependencies.column(name, 1)?;
    if column.len() != len {
        return Err(StrategyError::InvalidInput {
            name: name.to_string(),
            reason: format!("expected {len} points, got {}", column.len()),
        });
    }
    Ok(column)
}

/// First-order low-pass amplifier stage: G / sqrt(1 + (f / fc)^2).
pub struct AmplifierStage {
    gain: &'static str,
    cutoff: &'static str,
}

impl AmplifierStage {
    pub fn first() -> Self { Self { gain: "gain_1_linear", cutoff: "stage_1_cutting_freq" } }
    pub fn second() -> Self { Self { gain: "gain_2_linear", cutoff: "stage_2_cutting_freq" } }
}

impl Strategy for AmplifierStage {
    fn dependencies(&self) -> DependencyList {
        deps(&[self.gain, self.cutoff, "frequency_vector"])
    }

    fn calculate(&self, dependencies: &Dependencies, parameters: &ParameterStore) -> Result<ResultEnvelope, StrategyError> {
        let gain = parameters.scalar(self.gain)?;
        let cutoff = parameters.scalar(self.cutoff)?;
        let freqs = dependencies.series("frequency_vector")?;

        let values = freqs
            .iter()
            .map(|&f| checked_div(f, cutoff, self.cutoff).map(|r| gain / (1.0 + r * r).sqrt()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(frequency_table(freqs, values, "Gain", ""))
    }

    fn name(&self) -> &str { "AmplifierStage" }
}

/// Product of both amplifier stages.
pub struct AmplifierChain;

impl Strategy for AmplifierChain {
    fn dependencies(&self) -> DependencyList {
        deps(&[STAGE_1, STAGE_2, "frequency_vector"])
    }

    fn calculate(&self, dependencies: &Dependencies, _: &ParameterStore) -> Result<ResultEnvelope, StrategyError> {
        let freqs = dependencies.series("frequency_vector")?;
        let first = gain_column(dependencies, STAGE_1, freqs.len())?;
        let second = gain_column(dependencies, STAGE_2, freqs.len())?;
        let values = first.iter().zip(second).map(|(a, b)| a * b).collect();
        Ok(frequency_table(freqs, values, "Gain", ""))
    }

    fn name(&self) -> &str { "AmplifierChain" }
}

/// Inputs shared by the open and closed loop formulas.
struct LoopInputs<'a> {
    sensitivity: f64,
    l: f64,
    c: f64,
    r: f64,
    freqs: &'a [f64],
    stage_1: &'a [f64],
}

impl<'a> LoopInputs<'a> {
    fn read(dependencies: &'a Dependencies, parameters: &ParameterStore) -> Result<Self, StrategyError> {
        let turns = parameters.scalar("nb_spire")?;
        let radius = parameters.scalar("ray_spire")?;
        let mu_app = dependencies.scalar("mu_app")?;
        let freqs = dependencies.series("frequency_vector")?;
        Ok(Self {
            sensitivity: turns * PI * radius * radius * mu_app * MU_0,
            l: dependencies.scalar("inductance")?,
            c: dependencies.scalar("capacitance")?,
            r: dependencies.scalar("resistance")?,
            freqs,
            stage_1: gain_column(dependencies, STAGE_1, freqs.len())?,
        })
    }

    /// Evaluates `magnitude(w, stage_1_gain)` at every sweep point.
    fn sweep(&self, what: &str, magnitude: impl Fn(f64, f64) -> (f64, f64)) -> Result<Vec<f64>, StrategyError> {
        self.freqs
            .iter()
            .zip(self.stage_1)
            .map(|(&f, &g)| {
                let (num, den) = magnitude(2.0 * PI * f, g);
                checked_div(num, den, what)
            })
            .collect()
    }
}

const LOOP_DEPENDENCIES: [&str; 8] =
    ["nb_spire", "ray_spire", "mu_app", "frequency_vector", STAGE_1, "inductance", "capacitance", "resistance"];

/// Open loop gain of the coil followed by the first amplifier stage.
pub struct OpenLoop;

impl Strategy for OpenLoop {
    fn dependencies(&self) -> DependencyList {
        deps(&LOOP_DEPENDENCIES)
    }

    fn calculate(&self, dependencies: &Dependencies, parameters: &ParameterStore) -> Result<ResultEnvelope, StrategyError> {
        let inputs = LoopInputs::read(dependencies, parameters)?;
        let values = inputs.sweep("open loop gain", |w, g| {
            let num = inputs.sensitivity * g * w;
            let den = ((1.0 - inputs.l * inputs.c * w * w).powi(2) + (inputs.r * inputs.c * w).powi(2)).sqrt();
            (num, den)
        })?;
        Ok(frequency_table(inputs.freqs, values, "Gain", ""))
    }

    fn name(&self) -> &str { "OpenLoop" }
}

/// Closed loop gain with flux feedback through `mutual_inductance` and
/// `feedback_resistance`.
pub struct ClosedLoop;

impl Strategy for ClosedLoop {
    fn dependencies(&self) -> DependencyList {
        let mut list = deps(&LOOP_DEPENDENCIES);
        list.extend(["mutual_inductance".to_string(), "feedback_resistance".to_string()]);
        list
    }

    fn calculate(&self, dependencies: &Dependencies, parameters: &ParameterStore) -> Result<ResultEnvelope, StrategyError> {
        let inputs = LoopInputs::read(dependencies, parameters)?;
        let mutual = parameters.scalar("mutual_inductance")?;
        let feedback = parameters.scalar("feedback_resistance")?;
        let coupling = checked_div(mutual, feedback, "closed loop gain")?;

        let values = inputs.sweep("closed loop gain", |w, g| {
            let num = inputs.sensitivity * g * w;
            let damping = inputs.r * inputs.c * w + g * coupling * w;
            let den = ((1.0 - inputs.l * inputs.c * w * w).powi(2) + damping * damping).sqrt();
            (num, den)
        })?;
        Ok(frequency_table(inputs.freqs, values, "Gain", ""))
    }

    fn name(&self) -> &str { "ClosedLoop" }
}

/// Any frequency table passed through the second amplifier stage.
pub struct SecondStageFiltered {
    source: &'static str,
}

impl SecondStageFiltered {
    pub fn of(source: &'static str) -> Self { Self { source } }
}

impl Strategy for SecondStageFiltered {
    fn dependencies(&self) -> DependencyList {
        deps(&[self.source, STAGE_2])
    }

    fn calculate(&self, dependencies: &Dependencies, _: &ParameterStore) -> Result<ResultEnvelope, StrategyError> {
        let source = dependencies.get(self.source)?;
        let freqs = dependencies.column(self.source, 0)?;
        let values = gain_column(dependencies, self.source, freqs.len())?;
        let stage_2 = gain_column(dependencies, STAGE_2, freqs.len())?;

        Ok(ResultEnvelope::table(
            vec![freqs.to_vec(), values.iter().zip(stage_2).map(|(v, g)| v * g).collect()],
            source.labels.clone(),
            source.units.clone(),
        ))
    }

    fn name(&self) -> &str { "SecondStageFiltered" }
}
