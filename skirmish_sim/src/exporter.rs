//! JSON episode trace exporter.
//!
//! Captures one frame per step so two runs of the same seed can be
//! compared byte for byte, and so external tooling can replay an episode.

use serde::{Deserialize, Serialize};
use skirmish_core::{HostEvent, Phase};
use std::fs::File;
use std::io::Write;

/// One agent's resolved action within a frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub agent: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

/// A single step of episode data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFrame {
    /// One-based step number
    pub step: u64,

    /// Phase in effect while the step resolved
    pub phase: Phase,

    /// Whether this step crossed a phase boundary
    pub phase_advanced: bool,

    /// Step reward summed over all agents
    pub reward: f64,

    /// Resolved actions, in execution order
    pub actions: Vec<ActionRecord>,

    /// Detector-visible events drained after the step
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub events: Vec<HostEvent>,
}

/// Complete episode trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// All frames
    pub frames: Vec<StepFrame>,

    /// Total reward over the episode
    pub total_reward: f64,
}

impl EpisodeExport {
    /// Creates an empty trace.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            frames: Vec::new(),
            total_reward: 0.0,
        }
    }

    /// Appends a frame.
    pub fn add_frame(&mut self, frame: StepFrame) {
        self.total_reward += frame.reward;
        self.frames.push(frame);
    }

    /// Writes the trace to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_reward_accumulates() {
        let mut export = EpisodeExport::new("enterprise", 42);
        for step in 1..=3 {
            export.add_frame(StepFrame {
                step,
                phase: Phase::Preplanning,
                phase_advanced: false,
                reward: -1.5,
                actions: vec![],
                events: vec![],
            });
        }
        assert_eq!(export.frames.len(), 3);
        assert!((export.total_reward + 4.5).abs() < 1e-9);
    }
}
