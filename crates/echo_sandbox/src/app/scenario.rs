use std::collections::HashMap;
use std::fs;
use std::path::Path;

use affliction::Vec2;
use serde::Deserialize;

use super::SandboxError;

/// Reproduces the reference timeline: three stacks at tick 0, first decay at
/// tick 60, and a 50-damage echo queued at tick 10 landing at tick 35. A second
/// dummy despawns while its echo is pending.
pub(crate) const BUILTIN_SCENARIO_JSON: &str = r#"{
    "ticks": 180,
    "actions": [
        { "at_tick": 0, "action": { "kind": "spawn", "name": "e1", "position": { "x": 0.0, "y": 0.0 }, "health": 1000 } },
        { "at_tick": 0, "action": { "kind": "spawn", "name": "e2", "position": { "x": 4.0, "y": 0.0 }, "health": 1000 } },
        { "at_tick": 0, "action": { "kind": "add_stack", "target": "e1", "amount": 3 } },
        { "at_tick": 10, "action": { "kind": "queue_echo", "target": "e1", "damage": 50, "delay_ticks": 25, "origin": { "x": -2.0, "y": 1.0 }, "visual_scale": 1.0 } },
        { "at_tick": 10, "action": { "kind": "queue_echo", "target": "e2", "damage": 50, "delay_ticks": 25 } },
        { "at_tick": 20, "action": { "kind": "despawn", "target": "e2" } }
    ]
}"#;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    pub(crate) ticks: u64,
    #[serde(default)]
    pub(crate) actions: Vec<ScriptedAction>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScriptedAction {
    pub(crate) at_tick: u64,
    pub(crate) action: Action,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum Action {
    Spawn {
        name: String,
        #[serde(default)]
        position: Vec2,
        health: u32,
    },
    AddStack {
        target: String,
        amount: u32,
    },
    QueueEcho {
        target: String,
        damage: u32,
        delay_ticks: u64,
        #[serde(default)]
        origin: Vec2,
        #[serde(default = "default_visual_scale")]
        visual_scale: f32,
    },
    Despawn {
        target: String,
    },
}

fn default_visual_scale() -> f32 {
    1.0
}

impl Action {
    pub(crate) fn target(&self) -> Option<&str> {
        match self {
            Self::Spawn { .. } => None,
            Self::AddStack { target, .. }
            | Self::QueueEcho { target, .. }
            | Self::Despawn { target } => Some(target),
        }
    }
}

impl Scenario {
    pub(crate) fn builtin() -> Result<Self, SandboxError> {
        Self::from_json_str(BUILTIN_SCENARIO_JSON)
    }

    pub(crate) fn from_json_file(path: &Path) -> Result<Self, SandboxError> {
        let raw = fs::read_to_string(path).map_err(|source| SandboxError::ReadScenario {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub(crate) fn from_json_str(raw: &str) -> Result<Self, SandboxError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let scenario = match serde_path_to_error::deserialize::<_, Self>(&mut deserializer) {
            Ok(scenario) => scenario,
            Err(error) => {
                let path = error.path().to_string();
                let source = error.into_inner();
                return Err(SandboxError::ParseScenario {
                    path: if path.is_empty() { ".".to_string() } else { path },
                    message: source.to_string(),
                });
            }
        };
        scenario.validate()?;
        Ok(scenario)
    }

    /// Checks every action fits inside the run, only names dummies spawned
    /// before it, and never spawns a name that is still live. A despawn frees
    /// its name from the next tick on, matching the deferred removal in the
    /// arena.
    pub(crate) fn validate(&self) -> Result<(), SandboxError> {
        let mut order: Vec<(usize, &ScriptedAction)> = self.actions.iter().enumerate().collect();
        order.sort_by_key(|(index, scripted)| (scripted.at_tick, *index));

        let mut despawned_at: HashMap<&str, Option<u64>> = HashMap::new();
        for (index, scripted) in order {
            let tick = scripted.at_tick;
            if tick > self.ticks {
                return Err(SandboxError::InvalidScenario {
                    path: format!("actions[{index}].at_tick"),
                    reason: format!("tick {tick} is past the end of the run"),
                });
            }
            match &scripted.action {
                Action::Spawn { name, .. } => {
                    let live = despawned_at
                        .get(name.as_str())
                        .is_some_and(|freed| freed.map_or(true, |at| at >= tick));
                    if live {
                        return Err(SandboxError::InvalidScenario {
                            path: format!("actions[{index}].action.name"),
                            reason: format!("'{name}' is still live at tick {tick}"),
                        });
                    }
                    despawned_at.insert(name.as_str(), None);
                }
                Action::QueueEcho { visual_scale, .. }
                    if !visual_scale.is_finite() || *visual_scale < 0.0 =>
                {
                    return Err(SandboxError::InvalidScenario {
                        path: format!("actions[{index}].action.visual_scale"),
                        reason: "must be finite and non-negative".to_string(),
                    });
                }
                _ => {}
            }
            let Some(target) = scripted.action.target() else {
                continue;
            };
            if !despawned_at.contains_key(target) {
                return Err(SandboxError::InvalidScenario {
                    path: format!("actions[{index}].action.target"),
                    reason: format!("'{target}' is not spawned before tick {tick}"),
                });
            }
            if matches!(scripted.action, Action::Despawn { .. }) {
                if let Some(freed) = despawned_at.get_mut(target) {
                    freed.get_or_insert(tick);
                }
            }
        }
        Ok(())
    }
}
