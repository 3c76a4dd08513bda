//! Episode runner: resolves every agent's action each step, advances the
//! mission phase, and scores the step.
//!
//! One runner invocation is one episode. All randomness comes from a
//! single stream derived from the master seed, so the same seed and
//! scenario replay the same episode exactly.

use crate::access_service::AccessService;
use crate::action::{Action, Sleep};
use crate::exporter::{ActionRecord, EpisodeExport, StepFrame};
use crate::impact::Impact;
use crate::local_work::LocalWork;
use crate::reward::{RewardEngine, RewardTable, StepOutcome};
use crate::scenarios::ScenarioId;

use skirmish_core::{AgentKind, Phase, RandomSource, SimError, SimState};
use tracing::{debug, info};

/// Stream tag for the action-selection and action-execution draws.
const ACTION_STREAM: u64 = 1;

/// Results of one episode.
#[derive(Debug)]
pub struct EpisodeResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Steps executed
    pub steps: u64,

    /// Phase the episode ended in
    pub final_phase: Phase,

    /// Reward per step
    pub step_rewards: Vec<f64>,

    /// Sum over all steps
    pub total_reward: f64,

    /// Full trace for export and replay comparison
    pub export: EpisodeExport,

    /// Engine state at episode end
    pub final_state: SimState,
}

/// Runs turn-based episodes against a scenario preset.
pub struct EpisodeRunner {
    seed: u64,
    scenario: ScenarioId,
    steps: Option<u64>,
    fp_detection_rate: f64,
    phishing_error_rate: f64,
    red_impact_rate: f64,
}

impl EpisodeRunner {
    /// Creates a runner for the given seed and preset.
    pub fn new(seed: u64, scenario: ScenarioId) -> Self {
        Self {
            seed,
            scenario,
            steps: None,
            fp_detection_rate: 0.05,
            phishing_error_rate: 0.02,
            red_impact_rate: 0.25,
        }
    }

    /// Overrides the step count. Defaults to the scenario's full phase
    /// schedule.
    pub fn with_steps(mut self, steps: u64) -> Self {
        self.steps = Some(steps);
        self
    }

    /// Overrides the green side-effect rates. Values are validated when
    /// the actions are constructed.
    pub fn with_rates(mut self, fp_detection_rate: f64, phishing_error_rate: f64) -> Self {
        self.fp_detection_rate = fp_detection_rate;
        self.phishing_error_rate = phishing_error_rate;
        self
    }

    /// Overrides how eagerly the scripted attacker probes.
    pub fn with_red_impact_rate(mut self, rate: f64) -> Self {
        self.red_impact_rate = rate;
        self
    }

    /// Runs the episode to completion.
    pub fn run(&self) -> Result<EpisodeResult, SimError> {
        let scenario = self.scenario.build();
        let mut state = SimState::from_scenario(&scenario)?;
        let steps = self
            .steps
            .unwrap_or_else(|| scenario.phase_steps.last().copied().unwrap_or(0));

        let master = RandomSource::new(self.seed);
        let mut rng = master.derive(ACTION_STREAM);
        let engine = RewardEngine::new(RewardTable::default());

        let greens: Vec<String> = state
            .agents_of_kind(AgentKind::Green)
            .into_iter()
            .map(str::to_string)
            .collect();
        let reds: Vec<String> = state
            .agents_of_kind(AgentKind::Red)
            .into_iter()
            .map(str::to_string)
            .collect();

        info!(
            scenario = self.scenario.name(),
            seed = self.seed,
            steps,
            greens = greens.len(),
            reds = reds.len(),
            "episode starting"
        );

        let mut export = EpisodeExport::new(self.scenario.name(), self.seed);
        let mut step_rewards = Vec::with_capacity(steps as usize);

        for step in 1..=steps {
            let phase_advanced = state.check_next_phase(step)?;
            let phase = state.phase();

            let mut outcomes: Vec<StepOutcome> = Vec::new();
            for agent in &greens {
                let action = self.pick_green_action(&state, agent, &mut rng)?;
                let observation = action.execute(&mut state, &mut rng);
                outcomes.push(StepOutcome {
                    agent: agent.clone(),
                    action,
                    observation,
                });
            }
            for agent in &reds {
                let action = self.pick_red_action(&state, agent, &mut rng);
                let observation = action.execute(&mut state, &mut rng);
                outcomes.push(StepOutcome {
                    agent: agent.clone(),
                    action,
                    observation,
                });
            }

            let reward = engine.score_step(&state, &outcomes, phase);
            step_rewards.push(reward);

            // Consume this step's detector-visible events, acting as the
            // external observer boundary.
            let hostnames: Vec<String> =
                state.hostnames().iter().map(|s| s.to_string()).collect();
            let mut events = Vec::new();
            for hostname in &hostnames {
                events.extend(state.drain_events(hostname));
            }

            debug!(step, %phase, reward, events = events.len(), "step resolved");
            export.add_frame(StepFrame {
                step,
                phase,
                phase_advanced,
                reward,
                actions: outcomes
                    .iter()
                    .map(|outcome| ActionRecord {
                        agent: outcome.agent.clone(),
                        action: outcome.action.name().to_string(),
                        success: outcome.observation.success,
                    })
                    .collect(),
                events,
            });
        }

        info!(
            scenario = self.scenario.name(),
            seed = self.seed,
            total_reward = export.total_reward,
            "episode complete"
        );
        Ok(EpisodeResult {
            scenario: self.scenario,
            seed: self.seed,
            steps,
            final_phase: state.phase(),
            step_rewards,
            total_reward: export.total_reward,
            export,
            final_state: state,
        })
    }

    /// Uniform choice over the green agent's legal action set.
    fn pick_green_action(
        &self,
        state: &SimState,
        agent: &str,
        rng: &mut RandomSource,
    ) -> Result<Action, SimError> {
        let sessions = state.sessions_of(agent);
        let Some(session) = sessions.first() else {
            return Ok(Action::Sleep(Sleep));
        };
        let session_id = session.id;
        let hostname = session.hostname.clone();
        let Some(ip) = state.ip_of(&hostname) else {
            return Ok(Action::Sleep(Sleep));
        };

        match rng.pick_index(3) {
            Some(0) => Ok(Action::Sleep(Sleep)),
            Some(1) => Ok(Action::LocalWork(LocalWork::new(
                agent,
                session_id,
                ip,
                self.fp_detection_rate,
                self.phishing_error_rate,
            )?)),
            _ => Ok(Action::AccessService(AccessService::new(
                agent,
                ip,
                self.fp_detection_rate,
            )?)),
        }
    }

    /// Scripted attacker: occasionally probes a uniformly chosen server.
    fn pick_red_action(&self, state: &SimState, agent: &str, rng: &mut RandomSource) -> Action {
        if !rng.chance(self.red_impact_rate) {
            return Action::Sleep(Sleep);
        }
        let servers: Vec<String> = state
            .hostnames()
            .iter()
            .filter(|hostname| state.host(hostname).is_some_and(|host| host.is_server))
            .map(|hostname| hostname.to_string())
            .collect();
        match rng.pick(&servers).cloned() {
            Some(target) => Action::Impact(Impact::new(agent, target)),
            None => Action::Sleep(Sleep),
        }
    }
}
