//! Strategy registry and the built-in search-coil formulas.
//!
//! The registry is an explicit value assembled once by the caller and handed
//! to `Engine::with_registry`; there is no global table.

pub mod coil;
pub mod front_end;
pub mod noise;

use crate::compute::strategy::Strategy;
use std::sync::Arc;

/// Ordered node name -> strategy bindings.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    entries: Vec<(String, Arc<dyn Strategy>)>,
}

impl StrategyRegistry {
    pub fn new() -> Self { Self::default() }

    /// Binds `strategy` to `name`, replacing any earlier binding in place.
    pub fn register(mut self, name: impl Into<String>, strategy: Arc<dyn Strategy>) -> Self {
        self.insert(name, strategy);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, strategy: Arc<dyn Strategy>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = strategy,
            None => self.entries.push((name, strategy)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Strategy>> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Strategy>)> {
        self.entries.iter().map(|(n, s)| (n.as_str(), s))
    }

    /// The analytical search-coil front end: frequency sweep, coil
    /// resistance, demagnetizing factor, apparent permeability, inductance
    /// and impedance.
    pub fn coil_model() -> Self {
        Self::new()
            .register("frequency_vector", Arc::new(coil::FrequencyVector))
            .register("resistance", Arc::new(coil::Resistance))
            .register("Nz", Arc::new(coil::DemagnetizingFactor))
            .register("mu_app", Arc::new(coil::ApparentPermeability))
            .register("lambda_param", Arc::new(coil::LengthRatio))
            .register("inductance", Arc::new(coil::Inductance))
            .register("impedance", Arc::new(coil::Impedance))
    }

    /// The coil model extended with the two-stage amplifier, the open and
    /// closed loop transfer functions and the thermal noise densities.
    pub fn front_end_model() -> Self {
        use front_end::{SecondStageFiltered, CLOSED_LOOP, OPEN_LOOP, STAGE_1, STAGE_2};

        Self::coil_model()
            .register(STAGE_1, Arc::new(front_end::AmplifierStage::first()))
            .register(STAGE_2, Arc::new(front_end::AmplifierStage::second()))
            .register("TF_ASIC_linear", Arc::new(front_end::AmplifierChain))
            .register(OPEN_LOOP, Arc::new(front_end::OpenLoop))
            .register("OLTF_Filtered", Arc::new(SecondStageFiltered::of(OPEN_LOOP)))
            .register(CLOSED_LOOP, Arc::new(front_end::ClosedLoop))
            .register("CLTF_Filtered", Arc::new(SecondStageFiltered::of(CLOSED_LOOP)))
            .register("PSD_R_cr", Arc::new(noise::FeedbackResistorNoise))
            .register("PSD_R_cr_filtered", Arc::new(SecondStageFiltered::of("PSD_R_cr")))
            .register("PSD_R_Coil", Arc::new(noise::CoilNoise))
            .register("PSD_R_Coil_filtered", Arc::new(SecondStageFiltered::of("PSD_R_Coil")))
    }
}

/// Parameter set exercising every node of `front_end_model`.
#[cfg(test)]
pub(crate) fn front_end_parameters() -> crate::store::ParameterStore {
    crate::store::ParameterStore::new()
        .with("f_start", 1.0)
        .with("f_stop", 100_000.0)
        .with("nb_points_per_decade", 10.0)
        .with("nb_spire", 12000.0)
        .with("ray_spire", 0.005)
        .with("rho_wire", 1.6)
        .with("diam_core", 0.0032)
        .with("len_core", 0.20)
        .with("len_coil", 0.155)
        .with("mu_r", 100_000.0)
        .with("capacitance", 1e-10)
        .with("gain_1_linear", 100.0)
        .with("stage_1_cutting_freq", 10_000.0)
        .with("gain_2_linear", 10.0)
        .with("stage_2_cutting_freq", 50_000.0)
        .with("mutual_inductance", 1e-4)
        .with("feedback_resistance", 10_000.0)
        .with("temperature", 300.0)
}
