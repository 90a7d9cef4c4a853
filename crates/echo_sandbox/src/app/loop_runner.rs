use std::collections::BTreeMap;
use std::process::ExitCode;

use affliction::{AfflictionConfig, CombatSession, EchoOutcome, Tick};
use tracing::{debug, info};

use super::arena::ArenaWorld;
use super::bootstrap::AppWiring;
use super::scenario::{Action, Scenario};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub(crate) ticks_run: u64,
    pub(crate) echoes_queued: u32,
    pub(crate) echoes_fired: u32,
    pub(crate) echoes_dropped: u32,
    pub(crate) hits_landed: usize,
    pub(crate) damage_by_name: BTreeMap<String, u64>,
    pub(crate) final_stacks: BTreeMap<String, u32>,
    pub(crate) survivors: usize,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let summary = run_scenario(app.config, &app.scenario);
    info!(
        ticks = summary.ticks_run,
        echoes_queued = summary.echoes_queued,
        echoes_fired = summary.echoes_fired,
        echoes_dropped = summary.echoes_dropped,
        hits_landed = summary.hits_landed,
        survivors = summary.survivors,
        "run_complete"
    );
    for (name, total) in &summary.damage_by_name {
        info!(name = %name, total, "damage_dealt");
    }
    for (name, stacks) in &summary.final_stacks {
        info!(name = %name, stacks, "final_stacks");
    }
    ExitCode::SUCCESS
}

pub(crate) fn run_scenario(config: AfflictionConfig, scenario: &Scenario) -> RunSummary {
    let mut session = CombatSession::new(config, ArenaWorld::default());
    let mut summary = RunSummary::default();
    let end = Tick(scenario.ticks);

    loop {
        let now = session.current_tick();
        for scripted in scenario
            .actions
            .iter()
            .filter(|scripted| scripted.at_tick == now.0)
        {
            apply_action(&mut session, &scripted.action, &mut summary);
        }
        session.host_mut().apply_pending();
        if now >= end {
            break;
        }

        let report = session.step();
        for outcome in session.last_tick_outcomes() {
            log_outcome(session.host(), outcome);
        }
        session.host_mut().apply_pending();
        summary.echoes_fired = summary.echoes_fired.saturating_add(report.echoes_fired);
        summary.echoes_dropped = summary.echoes_dropped.saturating_add(report.echoes_dropped);
    }

    summary.ticks_run = session.current_tick().0;
    summary.hits_landed = session.host().damage_log().len();
    summary.damage_by_name = session.host().damage_by_name();
    summary.survivors = session.host().live_count();
    for scripted in &scenario.actions {
        let Action::Spawn { name, .. } = &scripted.action else {
            continue;
        };
        let stacks = session
            .host()
            .id_by_name(name)
            .map_or(0, |id| session.get_stacks(id));
        summary.final_stacks.insert(name.clone(), stacks);
    }
    summary
}

fn apply_action(
    session: &mut CombatSession<ArenaWorld>,
    action: &Action,
    summary: &mut RunSummary,
) {
    if let Action::Spawn {
        name,
        position,
        health,
    } = action
    {
        if session.host_mut().spawn(name, *position, *health).is_none() {
            debug!(name = %name, "scripted_spawn_refused");
        }
        return;
    }

    let Some(target_name) = action.target() else {
        return;
    };
    let Some(target) = session.host().id_by_name(target_name) else {
        debug!(entity = target_name, "scripted_target_gone");
        return;
    };
    match action {
        Action::AddStack { amount, .. } => session.add_stack(target, *amount),
        Action::QueueEcho {
            damage,
            delay_ticks,
            origin,
            visual_scale,
            ..
        } => {
            if session
                .queue_echo(target, *damage, *delay_ticks, *origin, *visual_scale)
                .is_some()
            {
                summary.echoes_queued = summary.echoes_queued.saturating_add(1);
            }
        }
        Action::Despawn { .. } => {
            session.host_mut().despawn(target);
        }
        Action::Spawn { .. } => {}
    }
}

fn log_outcome(world: &ArenaWorld, outcome: &EchoOutcome) {
    match outcome {
        EchoOutcome::Fired {
            echo_id,
            target,
            damage,
            visual_scale,
            ..
        } => {
            let health = world.dummy(target.id).map(|dummy| dummy.health);
            debug!(
                echo = echo_id.0,
                entity = target.id.0,
                damage,
                visual_scale,
                ?health,
                "echo_landed"
            );
        }
        EchoOutcome::Dropped {
            echo_id,
            target,
            reason,
        } => {
            debug!(echo = echo_id.0, entity = target.id.0, ?reason, "echo_lost");
        }
    }
}
