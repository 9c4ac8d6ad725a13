use crate::data::{DataStore, StepRange};

/// What the viewer currently shows. Owned by one window; never shared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    step: i64,
    dataset: String,
    range: StepRange,
    names: Vec<String>,
}

impl Selection {
    pub fn new(store: &DataStore) -> Self {
        let range = store.step_range();
        Self {
            step: range.min,
            dataset: store.default_dataset().name.clone(),
            range,
            names: store.dataset_names().map(str::to_string).collect(),
        }
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn range(&self) -> StepRange {
        self.range
    }

    /// Whether the dataset selector is worth showing.
    pub fn has_choice(&self) -> bool {
        self.names.len() > 1
    }

    pub fn key(&self) -> (i64, &str) {
        (self.step, &self.dataset)
    }

    /// Clamps into the step domain. Returns whether the step changed.
    pub fn set_step(&mut self, step: i64) -> bool {
        let step = self.range.clamp(step);
        let changed = step != self.step;
        self.step = step;
        changed
    }

    /// Only loaded dataset names are accepted.
    pub fn set_dataset(&mut self, name: &str) -> bool {
        if !self.names.iter().any(|n| n == name) {
            return false;
        }
        if self.dataset != name {
            self.dataset = name.to_string();
        }
        true
    }

    /// Moves by `delta` steps. With `wrap`, running off one end re-enters at
    /// the other; otherwise the step stops at the end.
    pub fn advance(&mut self, delta: i64, wrap: bool) -> bool {
        let next = i128::from(self.step) + i128::from(delta);
        let (min, max) = (i128::from(self.range.min), i128::from(self.range.max));
        if wrap && !(min..=max).contains(&next) {
            let wrapped = min + (next - min).rem_euclid(max - min + 1);
            return self.set_step(wrapped as i64);
        }
        self.set_step(next.clamp(min, max) as i64)
    }
}
