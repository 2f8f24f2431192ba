//! Groups
//!
//! A [`Group`] is a same-side collection of units advanced by a
//! [`GroupThread`](crate::GroupThread). Once spawned, the group's state is
//! only reachable from that thread; every other context talks to it through
//! its [`GroupHandle`], whose operations are marshalled through the group's
//! mailbox.

use std::collections::BTreeMap;
use std::fmt;

use garrison_model::{
    AgentId, GarrisonId, GroupId, GroupSnapshot, GroupType, Side, Unit, UnitId,
};

use crate::agent::Agent;
use crate::error::GarrisonError;
use crate::group_thread::GroupThread;
use crate::mailbox::{Mailbox, MailboxError, MailboxOwner, Postbox, Reply};

/// Domain logic that decides what a group does each processing pass.
///
/// The engine calls [`GroupBrain::advance`] once per pass, after the group's
/// mailbox has been drained. Changes the brain wants to make to the group
/// should be posted to `group.postbox()` and take effect on the next pass.
pub trait GroupBrain: Send {
    fn advance(&mut self, group: &Group);
}

pub struct Group {
    id: GroupId,
    side: Side,
    group_type: GroupType,
    /// Back-reference to the owning garrison
    garrison: Option<GarrisonId>,
    units: BTreeMap<UnitId, Unit>,
    brain: Option<Box<dyn GroupBrain>>,
    mailbox: Mailbox<Group>,
}

impl Group {
    /// Create an empty, free-standing group.
    pub fn new(side: Side, group_type: GroupType) -> Self {
        Self::with_id(GroupId::new(), side, group_type)
    }

    pub fn with_id(id: GroupId, side: Side, group_type: GroupType) -> Self {
        Self {
            id,
            side,
            group_type,
            garrison: None,
            units: BTreeMap::new(),
            brain: None,
            mailbox: Mailbox::new(),
        }
    }

    pub fn with_brain(mut self, brain: impl GroupBrain + 'static) -> Self {
        self.brain = Some(Box::new(brain));
        self
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn group_type(&self) -> GroupType {
        self.group_type
    }

    pub fn garrison(&self) -> Option<GarrisonId> {
        self.garrison
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.units.keys().copied().collect()
    }

    pub fn contains_unit(&self, unit: UnitId) -> bool {
        self.units.contains_key(&unit)
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn postbox(&self) -> Postbox<Group> {
        self.mailbox.postbox()
    }

    /// Adds a unit to this group and points its back-reference here.
    ///
    /// Fails with `AlreadyGrouped` if the unit belongs to a different group.
    /// Re-adding a member is a no-op.
    pub fn add_unit(&mut self, mut unit: Unit) -> Result<(), GarrisonError> {
        match unit.group {
            Some(other) if other != self.id => {
                return Err(GarrisonError::AlreadyGrouped {
                    unit: unit.id,
                    group: other,
                });
            }
            _ => {}
        }

        unit.group = Some(self.id);
        if self.units.insert(unit.id, unit).is_none() {
            tracing::debug!(group = %self.id, unit = %unit.id, "unit joined group");
        }
        Ok(())
    }

    /// Removes a member and returns it ungrouped.
    pub fn remove_unit(&mut self, unit: UnitId) -> Result<Unit, GarrisonError> {
        let mut removed = self
            .units
            .remove(&unit)
            .ok_or_else(|| GarrisonError::unit_not_member(unit, self.id))?;
        removed.group = None;
        tracing::debug!(group = %self.id, unit = %unit, "unit left group");
        Ok(removed)
    }

    pub fn snapshot(&self) -> GroupSnapshot {
        GroupSnapshot {
            group_id: self.id,
            side: self.side,
            group_type: self.group_type,
            garrison: self.garrison,
            units: self.units.values().copied().collect(),
        }
    }

    /// Records the new owner and adopts its side.
    pub(crate) fn attach(&mut self, garrison: GarrisonId, side: Side) {
        if self.side != side {
            tracing::debug!(group = %self.id, from = %self.side, to = %side, "group changed side");
        }
        self.garrison = Some(garrison);
        self.side = side;
    }

    pub(crate) fn detach(&mut self) {
        self.garrison = None;
    }

    pub(crate) fn set_backlog_warning(&mut self, calls: usize) {
        self.mailbox.set_backlog_warning(calls);
    }

    /// Runs the brain, if any, for one processing pass.
    pub(crate) fn advance(&mut self) {
        if let Some(mut brain) = self.brain.take() {
            brain.advance(self);
            self.brain = Some(brain);
        }
    }
}

impl MailboxOwner for Group {
    fn mailbox_mut(&mut self) -> &mut Mailbox<Self> {
        &mut self.mailbox
    }
}

impl Agent for Group {
    fn agent_id(&self) -> AgentId {
        AgentId::Group(self.id)
    }

    fn process_messages(&mut self) -> usize {
        self.drain_mailbox()
    }

    /// Units are advanced as part of their group, not as agents.
    fn subagents(&mut self) -> Vec<&mut dyn Agent> {
        Vec::new()
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("id", &self.id)
            .field("side", &self.side)
            .field("group_type", &self.group_type)
            .field("garrison", &self.garrison)
            .field("units", &self.units.len())
            .field("has_brain", &self.brain.is_some())
            .finish()
    }
}

/// Unique ownership token for a spawned group.
///
/// Not `Clone`: whoever holds the handle owns the group, so a group can
/// never be in two garrisons at once. Dropping the handle dissolves the
/// group; its thread drains any calls still queued for it and destroys it.
pub struct GroupHandle {
    id: GroupId,
    group_type: GroupType,
    postbox: Postbox<Group>,
    thread: Postbox<GroupThread>,
}

impl GroupHandle {
    pub(crate) fn new(
        id: GroupId,
        group_type: GroupType,
        postbox: Postbox<Group>,
        thread: Postbox<GroupThread>,
    ) -> Self {
        Self {
            id,
            group_type,
            postbox,
            thread,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn group_type(&self) -> GroupType {
        self.group_type
    }

    pub fn postbox(&self) -> &Postbox<Group> {
        &self.postbox
    }

    /// Returns true once the group's thread has gone away.
    pub fn is_closed(&self) -> bool {
        self.postbox.is_closed()
    }

    pub fn add_unit(&self, unit: Unit) -> Result<Reply<Result<(), GarrisonError>>, MailboxError> {
        self.postbox.request(move |group| group.add_unit(unit))
    }

    pub fn remove_unit(
        &self,
        unit: UnitId,
    ) -> Result<Reply<Result<Unit, GarrisonError>>, MailboxError> {
        self.postbox.request(move |group| group.remove_unit(unit))
    }

    pub fn units(&self) -> Result<Reply<Vec<Unit>>, MailboxError> {
        self.postbox
            .request(|group| group.units().copied().collect())
    }

    pub fn side(&self) -> Result<Reply<Side>, MailboxError> {
        self.postbox.request(|group| group.side())
    }

    pub fn garrison(&self) -> Result<Reply<Option<GarrisonId>>, MailboxError> {
        self.postbox.request(|group| group.garrison())
    }

    pub fn snapshot(&self) -> Result<Reply<GroupSnapshot>, MailboxError> {
        self.postbox.request(|group| group.snapshot())
    }

    pub(crate) fn attach(&self, garrison: GarrisonId, side: Side) -> Result<(), MailboxError> {
        self.postbox.post(move |group| group.attach(garrison, side))
    }

    pub(crate) fn detach(&self) -> Result<(), MailboxError> {
        self.postbox.post(|group| group.detach())
    }
}

impl Drop for GroupHandle {
    fn drop(&mut self) {
        let id = self.id;
        let postbox = self.postbox.clone();
        if self
            .thread
            .post(move |thread| thread.dissolve(id, &postbox))
            .is_err()
        {
            tracing::debug!(group = %id, "group thread already gone");
        }
    }
}

impl fmt::Debug for GroupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupHandle")
            .field("id", &self.id)
            .field("group_type", &self.group_type)
            .finish_non_exhaustive()
    }
}
