//! Fixed-size set of caller-managed baseline snapshots.

use super::ledger::{EngineError, Result, Snapshot};

#[derive(Debug, Clone)]
pub struct Baselines {
    slots: Vec<Snapshot>,
}

impl Baselines {
    pub fn new(count: usize) -> Self {
        Self { slots: vec![Snapshot::new(); count] }
    }

    pub fn len(&self) -> usize { self.slots.len() }
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    pub fn get(&self, index: usize) -> Option<&Snapshot> { self.slots.get(index) }

    /// Stores a copy of `snapshot` in slot `index`.
    pub fn save(&mut self, index: usize, snapshot: &Snapshot) -> Result<()> {
        let count = self.slots.len();
        let slot = self.slots.get_mut(index).ok_or_else(|| {
            EngineError::Configuration(format!("baseline slot {index} out of range (0..{count})"))
        })?;
        *slot = snapshot.clone();
        Ok(())
    }

    pub fn clear_all(&mut self) {
        for slot in &mut self.slots {
            *slot = Snapshot::new();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ResultEnvelope;
    use std::sync::Arc;

    fn populated() -> Snapshot {
        let mut snap = Snapshot::new().next_generation(3);
        snap.insert("D", Arc::new(ResultEnvelope::scalar(20.0, "D", "")));
        snap
    }

    #[test]
    fn test_save_and_clear() {
        let mut b = Baselines::new(3);
        b.save(1, &populated()).unwrap();
        assert_eq!(b.get(1).unwrap().scalar("D"), Some(20.0));
        assert!(b.get(0).unwrap().is_empty());

        b.clear_all();
        assert!((0..3).all(|i| b.get(i).unwrap().is_empty()));
        assert_eq!(b.get(1).unwrap().generation(), 0);
    }

    #[test]
    fn test_save_out_of_range_is_a_configuration_error() {
        let mut b = Baselines::new(2);
        let err = b.save(2, &populated()).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(msg) if msg.contains("out of range")));
    }
}
