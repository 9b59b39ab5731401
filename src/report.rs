use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::db::SchemaOutcome;
use crate::factorize::Factorized;

pub struct StepTracker {
    run_id: String,
    started_at: DateTime<Utc>,
    steps: Vec<StepCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepCount {
    pub step: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Every version is linked; transient keys were cleared.
    Complete,
    /// Some versions could not be linked by any key.
    Unresolved { remaining: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub schema: SchemaOutcome,
    pub steps: Vec<StepCount>,
    pub factorized: Factorized,
    pub deleted: usize,
    pub outcome: Outcome,
}

impl StepTracker {
    pub fn new() -> Self {
        let started_at = Utc::now();
        StepTracker {
            run_id: format!("run-{}", started_at.format("%Y%m%dT%H%M%S")),
            started_at,
            steps: Vec::new(),
        }
    }

    pub fn record(&mut self, step: impl Into<String>, rows: usize) -> usize {
        let step = step.into();
        info!(run_id = %self.run_id, step = %step, rows, "step done");
        self.steps.push(StepCount { step, rows });
        rows
    }

    pub fn finish(
        self,
        schema: SchemaOutcome,
        factorized: Factorized,
        deleted: usize,
        outcome: Outcome,
    ) -> RunReport {
        RunReport {
            run_id: self.run_id,
            started_at: self.started_at,
            schema,
            steps: self.steps,
            factorized,
            deleted,
            outcome,
        }
    }
}

impl Default for StepTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    /// Rows changed by all steps together; zero on a run with nothing left to do.
    pub fn total_changes(&self) -> usize {
        self.steps.iter().map(|s| s.rows).sum()
    }

    #[cfg(test)]
    pub fn rows_for(&self, step: &str) -> Option<usize> {
        self.steps.iter().find(|s| s.step == step).map(|s| s.rows)
    }

    pub fn print(&self) {
        println!("{:<44} | {:>8}", "Step", "Rows");
        println!("{}", "-".repeat(55));
        for s in &self.steps {
            println!("{:<44} | {:>8}", s.step, s.rows);
        }
        println!();
        println!(
            "Factorized {} duplicates into {} uniques ({} versions repointed).",
            self.factorized.absorbed, self.factorized.groups, self.factorized.repointed
        );
        match self.outcome {
            Outcome::Complete => println!("All versions linked."),
            Outcome::Unresolved { remaining } => {
                println!("Fail: {} rows haven't been connected.", remaining)
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
