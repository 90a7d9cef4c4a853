use tracing::{debug, info};

use crate::applicator::DamageApplicator;
use crate::config::AfflictionConfig;
use crate::echo::{EchoId, EchoOutcome, EchoScheduler};
use crate::entity::{EngineHost, EntityHandleRegistry, EntityId, Tick, Vec2};
use crate::ledger::{AfflictionLedger, LedgerTickStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSystemId {
    AfflictionDecay,
    EchoFiring,
}

impl SessionSystemId {
    pub fn name(self) -> &'static str {
        match self {
            Self::AfflictionDecay => "AfflictionDecay",
            Self::EchoFiring => "EchoFiring",
        }
    }
}

/// Decay runs before firing so an echo landing on a decay tick sees the
/// already-decayed count.
pub const SESSION_SYSTEM_ORDER: [SessionSystemId; 2] =
    [SessionSystemId::AfflictionDecay, SessionSystemId::EchoFiring];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: Tick,
    pub stacks_decayed: u32,
    pub records_expired: u32,
    pub records_evicted: u32,
    pub echoes_fired: u32,
    pub echoes_dropped: u32,
}

impl TickReport {
    fn from_parts(tick: Tick, ledger: LedgerTickStats, outcomes: &[EchoOutcome]) -> Self {
        let mut report = Self {
            tick,
            stacks_decayed: ledger.stacks_decayed,
            records_expired: ledger.records_expired,
            records_evicted: ledger.records_evicted,
            ..Self::default()
        };
        for outcome in outcomes {
            if outcome.is_fired() {
                report.echoes_fired = report.echoes_fired.saturating_add(1);
            } else {
                report.echoes_dropped = report.echoes_dropped.saturating_add(1);
            }
        }
        report
    }

    pub fn is_quiet(&self) -> bool {
        self.stacks_decayed == 0
            && self.records_expired == 0
            && self.records_evicted == 0
            && self.echoes_fired == 0
            && self.echoes_dropped == 0
    }
}

/// One game session's affliction and echo state, plus the host it acts on.
///
/// Weapon behaviors call `add_stack` and `queue_echo` on hit; the engine calls
/// `step` once per simulation tick.
pub struct CombatSession<H: EngineHost> {
    config: AfflictionConfig,
    host: H,
    ledger: AfflictionLedger,
    scheduler: EchoScheduler,
    applicator: DamageApplicator,
    now: Tick,
    last_tick_report: TickReport,
    last_tick_outcomes: Vec<EchoOutcome>,
}

impl<H: EngineHost> CombatSession<H> {
    pub fn new(config: AfflictionConfig, host: H) -> Self {
        let ledger = AfflictionLedger::new(config.max_stacks, config.decay_window_ticks);
        let applicator = DamageApplicator::new(config.restack_on_echo, config.echo_restack_amount);
        Self {
            config,
            host,
            ledger,
            scheduler: EchoScheduler::new(),
            applicator,
            now: Tick::default(),
            last_tick_report: TickReport::default(),
            last_tick_outcomes: Vec::new(),
        }
    }

    pub fn config(&self) -> &AfflictionConfig {
        &self.config
    }

    pub fn current_tick(&self) -> Tick {
        self.now
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn ledger(&self) -> &AfflictionLedger {
        &self.ledger
    }

    pub fn scheduler(&self) -> &EchoScheduler {
        &self.scheduler
    }

    pub fn add_stack(&mut self, target: EntityId, amount: u32) {
        let registry = EntityHandleRegistry::new(&self.host);
        self.ledger.add_stack(&registry, target, amount, self.now);
    }

    pub fn get_stacks(&self, target: EntityId) -> u32 {
        self.ledger
            .get_stacks(&EntityHandleRegistry::new(&self.host), target)
    }

    pub fn queue_echo(
        &mut self,
        target: EntityId,
        damage: u32,
        delay_ticks: u64,
        origin_position: Vec2,
        visual_scale: f32,
    ) -> Option<EchoId> {
        let registry = EntityHandleRegistry::new(&self.host);
        self.scheduler.queue_echo(
            &registry,
            target,
            damage,
            delay_ticks,
            origin_position,
            visual_scale,
            self.now,
        )
    }

    pub fn step(&mut self) -> TickReport {
        self.now = self.now.after(1);
        let now = self.now;

        let mut ledger_stats = LedgerTickStats::default();
        let mut outcomes = Vec::new();
        for system_id in SESSION_SYSTEM_ORDER {
            match system_id {
                SessionSystemId::AfflictionDecay => {
                    let registry = EntityHandleRegistry::new(&self.host);
                    ledger_stats = self.ledger.tick(&registry, now);
                }
                SessionSystemId::EchoFiring => {
                    outcomes = self.scheduler.tick(
                        now,
                        &mut self.host,
                        &mut self.ledger,
                        &self.applicator,
                    );
                }
            }
        }

        let report = TickReport::from_parts(now, ledger_stats, &outcomes);
        if !report.is_quiet() {
            debug!(
                tick = now.0,
                stacks_decayed = report.stacks_decayed,
                records_expired = report.records_expired,
                records_evicted = report.records_evicted,
                echoes_fired = report.echoes_fired,
                echoes_dropped = report.echoes_dropped,
                "session_tick"
            );
        }
        self.last_tick_report = report;
        self.last_tick_outcomes = outcomes;
        report
    }

    /// Steps until `target` is reached and returns the report of the final step.
    /// Returns the previous report unchanged if `target` is not in the future.
    pub fn step_until(&mut self, target: Tick) -> TickReport {
        while self.now < target {
            self.step();
        }
        self.last_tick_report
    }

    pub fn last_tick_report(&self) -> TickReport {
        self.last_tick_report
    }

    pub fn last_tick_outcomes(&self) -> &[EchoOutcome] {
        &self.last_tick_outcomes
    }

    pub fn reset(&mut self) {
        self.ledger.clear();
        self.scheduler.clear();
        self.now = Tick::default();
        self.last_tick_report = TickReport::default();
        self.last_tick_outcomes.clear();
        info!("session_reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::test_support::FakeHost;

    fn session() -> CombatSession<FakeHost> {
        CombatSession::new(AfflictionConfig::default(), FakeHost::default())
    }

    fn step_to(session: &mut CombatSession<FakeHost>, tick: u64) {
        while session.current_tick() < Tick(tick) {
            session.step();
        }
    }

    #[test]
    fn system_order_is_decay_then_echo() {
        let names = SESSION_SYSTEM_ORDER
            .iter()
            .map(|id| id.name())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["AfflictionDecay", "EchoFiring"]);
    }

    #[test]
    fn worked_example_timeline() {
        let mut session = session();
        let pos = Vec2 { x: 4.0, y: 8.0 };
        let e1 = session.host_mut().spawn(1, Vec2::default());

        session.add_stack(e1, 3);
        step_to(&mut session, 1);
        assert_eq!(session.get_stacks(e1), 3);

        step_to(&mut session, 10);
        session
            .queue_echo(e1, 50, 25, pos, 1.0)
            .expect("echo queued");

        step_to(&mut session, 34);
        assert_eq!(session.get_stacks(e1), 3);
        assert!(session.host().damage_calls.is_empty());

        step_to(&mut session, 35);
        assert_eq!(session.host().damage_calls.len(), 1);
        let call = &session.host().damage_calls[0];
        assert_eq!(call.target, e1);
        assert_eq!(call.amount, 50);
        assert_eq!(call.source_position, pos);
        assert_eq!(session.get_stacks(e1), 4);
        assert_eq!(session.last_tick_report().echoes_fired, 1);
    }

    #[test]
    fn first_decay_lands_on_window_boundary() {
        let mut session = session();
        let e1 = session.host_mut().spawn(1, Vec2::default());
        session.add_stack(e1, 3);
        step_to(&mut session, 59);
        assert_eq!(session.get_stacks(e1), 3);
        step_to(&mut session, 60);
        assert_eq!(session.get_stacks(e1), 2);
    }

    #[test]
    fn echo_on_decay_tick_sees_decayed_count() {
        let config = AfflictionConfig {
            decay_window_ticks: 10,
            ..AfflictionConfig::default()
        };
        let mut session = CombatSession::new(config, FakeHost::default());
        let e1 = session.host_mut().spawn(1, Vec2::default());
        session.add_stack(e1, 1);
        session.queue_echo(e1, 5, 10, Vec2::default(), 1.0);

        let report = session.step_until(Tick(10));
        assert_eq!(report.records_expired, 1);
        assert_eq!(report.echoes_fired, 1);
        // Decay removed the single stack first; the echo then re-afflicted.
        assert_eq!(session.get_stacks(e1), 1);
        let record = session.ledger().record(e1).expect("record");
        assert_eq!(record.last_refresh_tick, Tick(10));
    }

    #[test]
    fn despawn_before_fire_never_deals_damage() {
        let mut session = session();
        let e1 = session.host_mut().spawn(1, Vec2::default());
        session.add_stack(e1, 2);
        session.queue_echo(e1, 50, 5, Vec2::default(), 1.0);
        step_to(&mut session, 4);
        session.host_mut().despawn(e1);

        let report = session.step();
        assert_eq!(report.echoes_dropped, 1);
        assert_eq!(report.records_evicted, 1);
        assert!(session.host().damage_calls.is_empty());
        assert_eq!(session.get_stacks(e1), 0);
        assert!(session.ledger().is_empty());
    }

    #[test]
    fn fired_echoes_leave_queue_empty() {
        let mut session = session();
        let e1 = session.host_mut().spawn(1, Vec2::default());
        for delay in 1..=4 {
            session.queue_echo(e1, 1, delay, Vec2::default(), 1.0);
        }
        let mut max_len = session.scheduler().len();
        for _ in 0..6 {
            session.step();
            max_len = max_len.max(session.scheduler().len());
        }
        assert_eq!(max_len, 4);
        assert!(session.scheduler().is_empty());
        assert_eq!(session.host().damage_calls.len(), 4);
    }

    #[test]
    fn outcomes_of_last_tick_are_exposed_in_order() {
        let mut session = session();
        let e1 = session.host_mut().spawn(1, Vec2::default());
        let first = session
            .queue_echo(e1, 1, 1, Vec2::default(), 1.0)
            .expect("first");
        let second = session
            .queue_echo(e1, 2, 1, Vec2::default(), 3.0)
            .expect("second");
        session.step();
        let ids = session
            .last_tick_outcomes()
            .iter()
            .map(EchoOutcome::echo_id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![first, second]);
        session.step();
        assert!(session.last_tick_outcomes().is_empty());
    }

    #[test]
    fn reset_discards_ephemeral_state() {
        let mut session = session();
        let e1 = session.host_mut().spawn(1, Vec2::default());
        session.add_stack(e1, 5);
        session.queue_echo(e1, 1, 10, Vec2::default(), 1.0);
        session.step();

        session.reset();

        assert_eq!(session.current_tick(), Tick(0));
        assert_eq!(session.get_stacks(e1), 0);
        assert!(session.scheduler().is_empty());
        assert_eq!(session.last_tick_report(), TickReport::default());
    }
}
