use anyhow::{Context, Result};
use camino::Utf8Path;
use chrono::NaiveDate;
use pipeline_utils::atomic_write::write_string_atomic;
use serde::{Deserialize, Serialize};

/// The per-day token/cost ceiling for the external large-model endpoint.
/// Tracks consumed units against a calendar-day-scoped ceiling and persists
/// across restarts under the Shared Work Store, rather than resetting with
/// every process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    day: NaiveDate,
    consumed_units: u64,
    ceiling_units: u64,
}

impl Budget {
    #[must_use]
    fn fresh(day: NaiveDate, ceiling_units: u64) -> Self {
        Self {
            day,
            consumed_units: 0,
            ceiling_units,
        }
    }

    /// Loads the persisted budget for `today`, rolling over to a fresh one
    /// if the file is missing or stamped for an earlier day.
    pub fn load_or_init(path: &Utf8Path, today: NaiveDate, ceiling_units: u64) -> Result<Self> {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Ok(Self::fresh(today, ceiling_units));
        };
        let mut budget: Self =
            serde_json::from_str(&content).with_context(|| format!("invalid budget file: {path}"))?;
        if budget.day < today {
            budget = Self::fresh(today, ceiling_units);
        }
        budget.ceiling_units = ceiling_units;
        Ok(budget)
    }

    pub fn persist(&self, path: &Utf8Path) -> Result<()> {
        let content = serde_json::to_string(self)?;
        write_string_atomic(path, &content)?;
        Ok(())
    }

    /// Whether `units` more can be spent today without exceeding the ceiling.
    /// Checked before the external-model call, not after (REDESIGN FLAGS).
    #[must_use]
    pub fn can_afford(&self, units: u64) -> bool {
        self.consumed_units.saturating_add(units) <= self.ceiling_units
    }

    /// Records a spend. Callers must have checked [`Self::can_afford`] first;
    /// this does not itself refuse to go over the ceiling, since the spend
    /// being recorded already happened.
    pub fn record_spend(&mut self, units: u64) {
        self.consumed_units = self.consumed_units.saturating_add(units);
    }

    #[must_use]
    pub fn remaining_units(&self) -> u64 {
        self.ceiling_units.saturating_sub(self.consumed_units)
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use tempfile::tempdir;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn fresh_budget_has_full_ceiling() {
        let budget = Budget::fresh(date(2026, 1, 1), 1000);
        assert!(budget.can_afford(1000));
        assert!(!budget.can_afford(1001));
    }

    #[test]
    fn persists_and_reloads_same_day() {
        let dir = tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("budget.json")).unwrap();

        let mut budget = Budget::fresh(date(2026, 1, 1), 1000);
        budget.record_spend(400);
        budget.persist(&path).unwrap();

        let reloaded = Budget::load_or_init(&path, date(2026, 1, 1), 1000).unwrap();
        assert_eq!(reloaded.remaining_units(), 600);
    }

    #[test]
    fn rolls_over_on_a_new_day() {
        let dir = tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("budget.json")).unwrap();

        let mut budget = Budget::fresh(date(2026, 1, 1), 1000);
        budget.record_spend(999);
        budget.persist(&path).unwrap();

        let reloaded = Budget::load_or_init(&path, date(2026, 1, 2), 1000).unwrap();
        assert_eq!(reloaded.remaining_units(), 1000);
    }

    #[test]
    fn missing_file_yields_fresh_budget() {
        let dir = tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("missing.json")).unwrap();
        let budget = Budget::load_or_init(&path, date(2026, 1, 1), 500).unwrap();
        assert_eq!(budget.remaining_units(), 500);
    }
}
