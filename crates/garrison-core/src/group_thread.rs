//! Group Processing Context
//!
//! A [`GroupThread`] owns a set of groups and advances them, independently
//! of the contexts that own their garrisons. It is the single writer of every
//! group it holds: other contexts reach those groups only through
//! [`GroupHandle`]s, whose calls the thread runs at the start of each pass.
//!
//! A pass ([`GroupThread::step`]):
//! 1. Drain the thread's own control mailbox (group spawns and dissolves)
//! 2. For every group: drain its mailbox, then run its brain
//!
//! [`GroupThread::run`] repeats passes on a timer until shut down.

use garrison_model::{AgentId, GroupId};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use std::time::Duration;

use crate::agent::{process_tree, Subagents};
use crate::config::EngineConfig;
use crate::error::GarrisonError;
use crate::group::{Group, GroupHandle};
use crate::mailbox::{Mailbox, MailboxError, MailboxOwner, Postbox};

/// Outcome of one processing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepReport {
    /// Groups owned after the pass
    pub groups: usize,
    /// Control calls executed (spawns, dissolves)
    pub control: usize,
    /// Group calls executed across all groups
    pub calls: usize,
}

pub struct GroupThread {
    groups: Subagents<Group>,
    mailbox: Mailbox<GroupThread>,
    tick_interval: Duration,
    backlog_warning: usize,
    passes: u64,
}

impl GroupThread {
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        let mut mailbox = Mailbox::new();
        mailbox.set_backlog_warning(config.mailbox.backlog_warning);
        Self {
            groups: Subagents::new(),
            mailbox,
            tick_interval: config.group_thread.tick_interval(),
            backlog_warning: config.mailbox.backlog_warning,
            passes: 0,
        }
    }

    /// Returns a handle other contexts can use to spawn groups here.
    pub fn handle(&self) -> GroupThreadHandle {
        GroupThreadHandle {
            postbox: self.mailbox.postbox(),
        }
    }

    /// Spawns a group from the thread's own context.
    pub fn spawn_local(&mut self, group: Group) -> Result<GroupHandle, GarrisonError> {
        let id = group.id();
        let group_type = group.group_type();
        let postbox = group.postbox();
        self.adopt(group)?;
        Ok(GroupHandle::new(id, group_type, postbox, self.mailbox.postbox()))
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(AgentId::Group(id))
    }

    pub fn contains(&self, id: GroupId) -> bool {
        self.groups.contains(AgentId::Group(id))
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of completed passes.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Runs one processing pass.
    pub fn step(&mut self) -> StepReport {
        let control = self.drain_mailbox();
        let mut calls = 0;
        for group in self.groups.iter_mut() {
            calls += process_tree(group);
            group.advance();
        }
        self.passes += 1;

        StepReport {
            groups: self.groups.len(),
            control,
            calls,
        }
    }

    /// Runs passes every tick interval until `shutdown` turns true or its
    /// sender goes away, then runs one final pass and returns the thread.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Self {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            groups = self.groups.len(),
            interval_ms = self.tick_interval.as_millis() as u64,
            "group thread started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.step();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.step();
        tracing::info!(passes = self.passes, groups = self.groups.len(), "group thread stopped");
        self
    }

    fn adopt(&mut self, mut group: Group) -> Result<(), GarrisonError> {
        group.set_backlog_warning(self.backlog_warning);
        let id = group.id();
        self.groups.adopt(group)?;
        tracing::debug!(group = %id, "group spawned");
        Ok(())
    }

    /// Destroys a group whose handle was dropped, after running its queued calls.
    pub(crate) fn dissolve(&mut self, id: GroupId, postbox: &Postbox<Group>) {
        let agent = AgentId::Group(id);
        // Only the handle that spawned this group may dissolve it.
        let owned = self
            .groups
            .get(agent)
            .is_some_and(|group| group.postbox().same_mailbox(postbox));
        if !owned {
            return;
        }

        if let Some(mut group) = self.groups.release(agent) {
            let pending = process_tree(&mut group);
            tracing::debug!(group = %id, pending, units = group.unit_count(), "group dissolved");
        }
    }
}

impl Default for GroupThread {
    fn default() -> Self {
        Self::new()
    }
}

impl MailboxOwner for GroupThread {
    fn mailbox_mut(&mut self) -> &mut Mailbox<Self> {
        &mut self.mailbox
    }
}

/// Cloneable handle for spawning groups on a [`GroupThread`] from any context.
#[derive(Debug, Clone)]
pub struct GroupThreadHandle {
    postbox: Postbox<GroupThread>,
}

impl GroupThreadHandle {
    /// Hands `group` to the thread. The group is adopted on the thread's
    /// next pass; calls made through the returned handle before then queue
    /// up in the group's mailbox and run once it is adopted.
    pub fn spawn(&self, group: Group) -> Result<GroupHandle, MailboxError> {
        let id = group.id();
        let group_type = group.group_type();
        let postbox = group.postbox();
        self.postbox.post(move |thread| {
            if let Err(e) = thread.adopt(group) {
                tracing::warn!(group = %id, error = %e, "rejected group spawn");
            }
        })?;
        Ok(GroupHandle::new(id, group_type, postbox, self.postbox.clone()))
    }

    pub fn is_closed(&self) -> bool {
        self.postbox.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garrison_model::{GroupType, Side, Unit, UnitKind};

    #[test]
    fn test_spawn_local_and_query() {
        let mut thread = GroupThread::new();
        let handle = thread
            .spawn_local(Group::new(Side::West, GroupType::Patrol))
            .unwrap();
        assert!(thread.contains(handle.id()));

        let unit = Unit::spawn(UnitKind::Infantry);
        let mut added = handle.add_unit(unit).unwrap();
        let mut units = handle.units().unwrap();

        let report = thread.step();
        assert_eq!(report.groups, 1);
        assert_eq!(report.calls, 2);
        assert_eq!(added.try_take().unwrap(), Ok(()));

        let units = units.try_take().unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].group, Some(handle.id()));
    }

    #[test]
    fn test_remote_spawn_adopted_on_next_step() {
        let mut thread = GroupThread::new();
        let spawner = thread.handle();

        let handle = spawner
            .spawn(Group::new(Side::East, GroupType::Static))
            .unwrap();
        let mut side = handle.side().unwrap();
        assert!(!thread.contains(handle.id()));

        let report = thread.step();
        assert_eq!(report.control, 1);
        assert!(thread.contains(handle.id()));
        assert_eq!(side.try_take(), Ok(Side::East));
    }

    #[test]
    fn test_dropping_handle_dissolves_after_pending_calls() {
        let mut thread = GroupThread::new();
        let handle = thread
            .spawn_local(Group::new(Side::West, GroupType::Idle))
            .unwrap();
        let id = handle.id();

        let mut added = handle.add_unit(Unit::spawn(UnitKind::Infantry)).unwrap();
        drop(handle);

        thread.step();
        assert!(!thread.contains(id));
        // The call queued before the drop still ran
        assert_eq!(added.try_take().unwrap(), Ok(()));
    }

    #[test]
    fn test_duplicate_spawn_does_not_dissolve_original() {
        let mut thread = GroupThread::new();
        let original = Group::new(Side::West, GroupType::Idle);
        let id = original.id();
        let _keep = thread.spawn_local(original).unwrap();

        let duplicate = Group::with_id(id, Side::East, GroupType::Patrol);
        let err = thread.spawn_local(duplicate).unwrap_err();
        assert_eq!(err, GarrisonError::DuplicateAgent(AgentId::Group(id)));

        let remote = thread
            .handle()
            .spawn(Group::with_id(id, Side::East, GroupType::Patrol))
            .unwrap();
        thread.step();
        drop(remote);
        thread.step();

        assert!(thread.contains(id));
        assert_eq!(thread.group(id).unwrap().side(), Side::West);
    }

    #[test]
    fn test_calls_fail_once_thread_is_gone() {
        let mut thread = GroupThread::new();
        let handle = thread
            .spawn_local(Group::new(Side::West, GroupType::Idle))
            .unwrap();
        drop(thread);

        assert!(handle.is_closed());
        assert_eq!(handle.units().err(), Some(MailboxError::Closed));
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let config = EngineConfig::from_str("[group_thread]\ntick_interval_ms = 5").unwrap();
        let thread = GroupThread::with_config(&config);
        let spawner = thread.handle();
        let (stop, shutdown) = watch::channel(false);
        let task = tokio::spawn(thread.run(shutdown));

        let handle = spawner
            .spawn(Group::new(Side::Independent, GroupType::Patrol))
            .unwrap();
        handle
            .add_unit(Unit::spawn(UnitKind::Infantry))
            .unwrap()
            .await
            .unwrap()
            .unwrap();
        let units = handle.units().unwrap().await.unwrap();
        assert_eq!(units.len(), 1);

        stop.send(true).unwrap();
        let thread = task.await.unwrap();
        assert!(thread.passes() >= 1);
        assert!(thread.contains(handle.id()));
    }
}
