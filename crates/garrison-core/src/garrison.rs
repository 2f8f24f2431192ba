//! Garrisons
//!
//! A [`Garrison`] is the top-level agent. It holds a side, an optional
//! location, the groups it owns and the units it holds directly (vehicles
//! and anything else outside a group's membership).
//!
//! The garrison's own collections are changed synchronously by whoever
//! holds the garrison. Anything that touches a group's membership is posted
//! to that group's mailbox and runs on the group's thread. Queries that need
//! group state ([`Garrison::get_all_units`], [`Garrison::snapshot`]) are
//! requests that complete once each group's thread has answered.

use std::collections::{BTreeMap, BTreeSet};

use garrison_model::{
    AgentId, GarrisonId, GarrisonSnapshot, GroupId, GroupSnapshot, GroupType, LocationId, Side,
    Unit, UnitId,
};

use crate::agent::Agent;
use crate::error::GarrisonError;
use crate::group::GroupHandle;
use crate::mailbox::{Mailbox, MailboxError, MailboxOwner, Postbox, Reply};

pub struct Garrison {
    id: GarrisonId,
    side: Side,
    /// Weak binding; the location service owns locations
    location: Option<LocationId>,
    groups: BTreeMap<GroupId, GroupHandle>,
    /// Units held directly, outside any group
    units: BTreeMap<UnitId, Unit>,
    /// Vehicle -> units that entered it
    crews: BTreeMap<UnitId, BTreeSet<UnitId>>,
    mailbox: Mailbox<Garrison>,
}

impl Garrison {
    pub fn new(side: Side) -> Self {
        Self {
            id: GarrisonId::new(),
            side,
            location: None,
            groups: BTreeMap::new(),
            units: BTreeMap::new(),
            crews: BTreeMap::new(),
            mailbox: Mailbox::new(),
        }
    }

    /// Create a garrison from a numeric side code.
    pub fn with_side_code(code: u8) -> Result<Self, GarrisonError> {
        Ok(Self::new(Side::try_from(code)?))
    }

    /// Create a garrison from a side name such as `"west"` or `"opfor"`.
    pub fn with_side_name(name: &str) -> Result<Self, GarrisonError> {
        Ok(Self::new(name.parse()?))
    }

    pub fn id(&self) -> GarrisonId {
        self.id
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn location(&self) -> Option<LocationId> {
        self.location
    }

    pub fn set_location(&mut self, location: Option<LocationId>) {
        self.location = location;
    }

    pub fn postbox(&self) -> Postbox<Garrison> {
        self.mailbox.postbox()
    }

    /// Ids of the groups owned right now.
    pub fn get_groups(&self) -> Vec<GroupId> {
        self.groups.keys().copied().collect()
    }

    pub fn group(&self, id: GroupId) -> Option<&GroupHandle> {
        self.groups.get(&id)
    }

    pub fn contains_group(&self, id: GroupId) -> bool {
        self.groups.contains_key(&id)
    }

    /// Groups whose type tag equals `group_type`.
    pub fn find_groups_by_type(&self, group_type: GroupType) -> Vec<GroupId> {
        self.groups
            .values()
            .filter(|g| g.group_type() == group_type)
            .map(|g| g.id())
            .collect()
    }

    pub fn direct_units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    pub fn holds_unit(&self, unit: UnitId) -> bool {
        self.units.contains_key(&unit)
    }

    /// Units recorded as having entered `vehicle`.
    pub fn crew(&self, vehicle: UnitId) -> Option<&BTreeSet<UnitId>> {
        self.crews.get(&vehicle)
    }

    /// Requests every unit of this garrison: the directly held ones plus the
    /// members of each group, as seen by each group's own thread.
    pub fn get_all_units(&self) -> Result<PendingUnits, GarrisonError> {
        let groups = self
            .groups
            .values()
            .map(|g| g.units())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PendingUnits {
            direct: self.units.values().copied().collect(),
            groups,
        })
    }

    /// Requests a snapshot of the garrison and all of its groups.
    pub fn snapshot(&self) -> Result<PendingSnapshot, GarrisonError> {
        let groups = self
            .groups
            .values()
            .map(|g| g.snapshot())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PendingSnapshot {
            base: GarrisonSnapshot {
                garrison_id: self.id,
                side: self.side,
                location: self.location,
                units: self.units.values().copied().collect(),
                crews: self.crews.clone(),
                groups: Vec::new(),
            },
            groups,
        })
    }

    /// Adds an ungrouped unit to this garrison.
    ///
    /// Grouped units move with their group, so a unit with a group fails with
    /// `AlreadyGrouped`. Use this for vehicles and other loose units.
    pub fn add_unit(&mut self, unit: Unit) -> Result<(), GarrisonError> {
        if let Some(group) = unit.group {
            return Err(GarrisonError::AlreadyGrouped {
                unit: unit.id,
                group,
            });
        }
        if self.units.insert(unit.id, unit).is_none() {
            tracing::debug!(garrison = %self.id, unit = %unit.id, "unit added");
        }
        Ok(())
    }

    /// Removes a directly held unit. Only reachable through the garrison's
    /// mailbox, see [`Postbox<Garrison>::remove_unit`].
    fn remove_unit(&mut self, unit: UnitId) -> Result<Unit, GarrisonError> {
        let removed = self.take_unit(unit)?;
        tracing::debug!(garrison = %self.id, unit = %unit, "unit removed");
        Ok(removed)
    }

    pub(crate) fn take_unit(&mut self, unit: UnitId) -> Result<Unit, GarrisonError> {
        let removed = self
            .units
            .remove(&unit)
            .ok_or_else(|| GarrisonError::unit_not_member(unit, self.id))?;
        self.forget_crew(unit);
        Ok(removed)
    }

    /// Takes ownership of a group that no garrison owns, and gives it this
    /// garrison's side.
    ///
    /// To move a group that another garrison owns, use
    /// [`Garrison::add_group_from`] or
    /// [`GarrisonRegistry::add_group`](crate::GarrisonRegistry::add_group).
    pub fn add_group(&mut self, group: GroupHandle) -> Result<(), GarrisonError> {
        let id = group.id();
        if self.groups.contains_key(&id) {
            return Err(GarrisonError::DuplicateAgent(AgentId::Group(id)));
        }
        group.attach(self.id, self.side)?;
        self.groups.insert(id, group);
        tracing::debug!(garrison = %self.id, group = %id, side = %self.side, "group attached");
        Ok(())
    }

    /// Moves a group owned by `source` into this garrison in one step.
    pub fn add_group_from(
        &mut self,
        source: &mut Garrison,
        group: GroupId,
    ) -> Result<(), GarrisonError> {
        if !source.groups.contains_key(&group) {
            return Err(GarrisonError::group_not_member(group, source.id));
        }
        if self.groups.contains_key(&group) {
            return Err(GarrisonError::DuplicateAgent(AgentId::Group(group)));
        }

        // Queue the attach first; a group whose thread is gone stays with `source`.
        source
            .group(group)
            .ok_or_else(|| GarrisonError::group_not_member(group, source.id))?
            .attach(self.id, self.side)?;

        let handle = source.take_group(group)?;
        self.groups.insert(group, handle);
        tracing::info!(group = %group, from = %source.id, to = %self.id, side = %self.side, "group moved");
        Ok(())
    }

    /// Detaches a group and hands back its ownership token.
    ///
    /// Moves between garrisons go through [`Garrison::add_group_from`] or the
    /// registry; call this directly only when tearing down. The returned
    /// handle owns the group now; dropping it destroys the group.
    pub fn remove_group(&mut self, group: GroupId) -> Result<GroupHandle, GarrisonError> {
        let handle = self.take_group(group)?;
        if handle.detach().is_err() {
            tracing::debug!(group = %group, "detached group has no thread");
        }
        tracing::debug!(garrison = %self.id, group = %group, "group detached");
        Ok(handle)
    }

    pub(crate) fn take_group(&mut self, group: GroupId) -> Result<GroupHandle, GarrisonError> {
        self.groups
            .remove(&group)
            .ok_or_else(|| GarrisonError::group_not_member(group, self.id))
    }

    /// Drops every crew association involving `unit`.
    pub(crate) fn forget_crew(&mut self, unit: UnitId) {
        self.crews.remove(&unit);
        self.crews.retain(|_, crew| {
            crew.remove(&unit);
            !crew.is_empty()
        });
    }

    pub(crate) fn set_backlog_warning(&mut self, calls: usize) {
        self.mailbox.set_backlog_warning(calls);
    }
}

impl Postbox<Garrison> {
    /// Removes a directly held unit inside the garrison's own context.
    ///
    /// Fails with `NotMember`, through the reply, if the garrison does not
    /// hold the unit when the call runs.
    pub fn remove_unit(
        &self,
        unit: UnitId,
    ) -> Result<Reply<Result<Unit, GarrisonError>>, MailboxError> {
        self.request(move |garrison| garrison.remove_unit(unit))
    }
}

impl MailboxOwner for Garrison {
    fn mailbox_mut(&mut self) -> &mut Mailbox<Self> {
        &mut self.mailbox
    }
}

impl Agent for Garrison {
    fn agent_id(&self) -> AgentId {
        AgentId::Garrison(self.id)
    }

    fn process_messages(&mut self) -> usize {
        self.drain_mailbox()
    }

    /// Always empty: a garrison's groups are advanced by a `GroupThread`,
    /// never by a walk of the garrison.
    fn subagents(&mut self) -> Vec<&mut dyn Agent> {
        Vec::new()
    }

    /// Removes the unit from whichever collection holds it. Killing a unit
    /// this garrison does not hold is a no-op.
    fn on_killed(&mut self, unit: &Unit) -> Result<(), GarrisonError> {
        self.forget_crew(unit.id);

        if self.units.remove(&unit.id).is_some() {
            tracing::info!(garrison = %self.id, unit = %unit.id, "held unit killed");
            return Ok(());
        }

        let Some(handle) = unit.group.and_then(|group| self.groups.get(&group)) else {
            return Ok(());
        };
        let (garrison, killed) = (self.id, unit.id);
        handle.postbox().post(move |group| {
            if group.remove_unit(killed).is_ok() {
                tracing::info!(%garrison, group = %group.id(), unit = %killed, "group member killed");
            }
        })?;
        Ok(())
    }

    /// Records `entity` as crew of `vehicle`, which this garrison must hold.
    /// An ungrouped entity the garrison does not hold yet is added to it.
    fn on_vehicle_entered(&mut self, vehicle: &Unit, entity: &Unit) -> Result<(), GarrisonError> {
        if !self.units.contains_key(&vehicle.id) {
            return Err(GarrisonError::unit_not_member(vehicle.id, self.id));
        }
        if !entity.is_grouped() && !self.units.contains_key(&entity.id) {
            self.add_unit(*entity)?;
        }

        self.crews.entry(vehicle.id).or_default().insert(entity.id);
        tracing::debug!(garrison = %self.id, vehicle = %vehicle.id, entity = %entity.id, "vehicle entered");
        Ok(())
    }
}

impl std::fmt::Debug for Garrison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Garrison")
            .field("id", &self.id)
            .field("side", &self.side)
            .field("location", &self.location)
            .field("groups", &self.groups.len())
            .field("units", &self.units.len())
            .finish()
    }
}

/// Pending answer to [`Garrison::get_all_units`].
#[derive(Debug)]
pub struct PendingUnits {
    direct: Vec<Unit>,
    groups: Vec<Reply<Vec<Unit>>>,
}

impl PendingUnits {
    /// Waits for every group and returns the union, ordered by unit id.
    pub async fn collect(self) -> Result<Vec<Unit>, GarrisonError> {
        let mut all = index(self.direct);
        for reply in self.groups {
            merge(&mut all, reply.await?);
        }
        Ok(all.into_values().collect())
    }

    /// Like [`PendingUnits::collect`], for callers that drive the group
    /// threads themselves. Fails with `Pending` if any group has not answered.
    pub fn try_collect(self) -> Result<Vec<Unit>, GarrisonError> {
        let mut all = index(self.direct);
        for mut reply in self.groups {
            merge(&mut all, reply.try_take()?);
        }
        Ok(all.into_values().collect())
    }
}

/// Pending answer to [`Garrison::snapshot`].
#[derive(Debug)]
pub struct PendingSnapshot {
    base: GarrisonSnapshot,
    groups: Vec<Reply<GroupSnapshot>>,
}

impl PendingSnapshot {
    pub async fn collect(mut self) -> Result<GarrisonSnapshot, GarrisonError> {
        for reply in self.groups {
            self.base.groups.push(reply.await?);
        }
        Ok(self.base)
    }

    pub fn try_collect(mut self) -> Result<GarrisonSnapshot, GarrisonError> {
        for mut reply in self.groups {
            self.base.groups.push(reply.try_take()?);
        }
        Ok(self.base)
    }
}

fn index(units: Vec<Unit>) -> BTreeMap<UnitId, Unit> {
    units.into_iter().map(|u| (u.id, u)).collect()
}

fn merge(all: &mut BTreeMap<UnitId, Unit>, units: Vec<Unit>) {
    for unit in units {
        all.entry(unit.id).or_insert(unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::Group;
    use crate::group_thread::GroupThread;
    use garrison_model::UnitKind;

    fn grouped_unit(group: GroupId) -> Unit {
        let mut unit = Unit::spawn(UnitKind::Infantry);
        unit.group = Some(group);
        unit
    }

    #[test]
    fn test_construct_rejects_unknown_side() {
        assert_eq!(Garrison::with_side_code(2).unwrap().side(), Side::East);
        assert_eq!(Garrison::with_side_name("blufor").unwrap().side(), Side::West);

        let err = Garrison::with_side_code(42).unwrap_err();
        assert!(matches!(err, GarrisonError::InvalidSide(_)));
        assert!(Garrison::with_side_name("martians").is_err());
    }

    #[test]
    fn test_location_binding() {
        let mut garrison = Garrison::new(Side::West);
        assert_eq!(garrison.location(), None);

        let location = LocationId::new();
        garrison.set_location(Some(location));
        assert_eq!(garrison.location(), Some(location));

        garrison.set_location(None);
        assert_eq!(garrison.location(), None);
    }

    #[test]
    fn test_add_grouped_unit_fails_and_changes_nothing() {
        let mut garrison = Garrison::new(Side::West);
        let vehicle = Unit::spawn(UnitKind::Vehicle);
        garrison.add_unit(vehicle).unwrap();

        let group = GroupId::new();
        let soldier = grouped_unit(group);
        let err = garrison.add_unit(soldier).unwrap_err();

        assert_eq!(err, GarrisonError::AlreadyGrouped { unit: soldier.id, group });
        assert_eq!(garrison.direct_units().count(), 1);
        assert!(!garrison.holds_unit(soldier.id));
    }

    #[test]
    fn test_remove_unit_through_mailbox() {
        let mut garrison = Garrison::new(Side::East);
        let vehicle = Unit::spawn(UnitKind::Vehicle);
        garrison.add_unit(vehicle).unwrap();

        let postbox = garrison.postbox();
        let mut first = postbox.remove_unit(vehicle.id).unwrap();
        let mut second = postbox.remove_unit(vehicle.id).unwrap();
        assert!(garrison.holds_unit(vehicle.id));

        assert_eq!(garrison.process_messages(), 2);
        assert_eq!(first.try_take().unwrap(), Ok(vehicle));
        assert!(second.try_take().unwrap().unwrap_err().is_not_member());
        assert!(!garrison.holds_unit(vehicle.id));
    }

    #[test]
    fn test_find_groups_by_type() {
        let mut thread = GroupThread::new();
        let mut garrison = Garrison::new(Side::West);

        let patrol = thread.spawn_local(Group::new(Side::West, GroupType::Patrol)).unwrap();
        let patrol_id = patrol.id();
        garrison.add_group(patrol).unwrap();
        garrison
            .add_group(thread.spawn_local(Group::new(Side::West, GroupType::Static)).unwrap())
            .unwrap();

        assert_eq!(garrison.find_groups_by_type(GroupType::Patrol), vec![patrol_id]);
        assert!(garrison.find_groups_by_type(GroupType::VehicleStatic).is_empty());
    }

    #[test]
    fn test_garrison_hides_groups_from_tree_walk() {
        let mut thread = GroupThread::new();
        let mut garrison = Garrison::new(Side::West);
        let handle = thread.spawn_local(Group::new(Side::West, GroupType::Idle)).unwrap();
        let mut units = handle.units().unwrap();
        garrison.add_group(handle).unwrap();

        assert!(garrison.subagents().is_empty());
        crate::agent::process_tree(&mut garrison);
        // The group's queue is untouched until its own thread runs
        assert_eq!(units.try_take(), Err(MailboxError::Pending));

        thread.step();
        assert_eq!(units.try_take(), Ok(Vec::new()));
    }

    #[test]
    fn test_remove_group_detaches() {
        let mut thread = GroupThread::new();
        let mut garrison = Garrison::new(Side::West);
        let handle = thread.spawn_local(Group::new(Side::West, GroupType::Patrol)).unwrap();
        let group = handle.id();
        garrison.add_group(handle).unwrap();
        thread.step();
        assert_eq!(thread.group(group).unwrap().garrison(), Some(garrison.id()));

        let handle = garrison.remove_group(group).unwrap();
        assert_eq!(handle.id(), group);
        assert!(garrison.get_groups().is_empty());

        thread.step();
        assert_eq!(thread.group(group).unwrap().garrison(), None);

        let err = garrison.remove_group(group).unwrap_err();
        assert_eq!(err, GarrisonError::group_not_member(group, garrison.id()));

        // The caller now owns the group; dropping the handle destroys it
        drop(handle);
        thread.step();
        assert!(!thread.contains(group));
    }

    #[test]
    fn test_add_group_from_requires_source_ownership() {
        let mut thread = GroupThread::new();
        let mut source = Garrison::new(Side::West);
        let mut dest = Garrison::new(Side::East);
        let handle = thread.spawn_local(Group::new(Side::West, GroupType::Idle)).unwrap();
        let group = handle.id();
        dest.add_group(handle).unwrap();

        let err = dest.add_group_from(&mut source, group).unwrap_err();
        assert!(err.is_not_member());
        assert_eq!(dest.get_groups(), vec![group]);
    }

    #[test]
    fn test_add_group_from_rejects_group_already_owned() {
        let mut thread = GroupThread::new();
        let mut source = Garrison::new(Side::West);
        let mut dest = Garrison::new(Side::East);
        let id = GroupId::new();

        let owned = thread.spawn_local(Group::with_id(id, Side::East, GroupType::Static)).unwrap();
        dest.add_group(owned).unwrap();
        // Same id handed out again; the thread refuses the copy when it runs
        let copy = thread.handle().spawn(Group::with_id(id, Side::West, GroupType::Static)).unwrap();
        source.add_group(copy).unwrap();

        let err = dest.add_group_from(&mut source, id).unwrap_err();
        assert_eq!(err, GarrisonError::DuplicateAgent(AgentId::Group(id)));
        assert_eq!(source.get_groups(), vec![id]);
        assert_eq!(dest.get_groups(), vec![id]);
    }

    #[test]
    fn test_failed_move_keeps_group_with_source() {
        let mut thread = GroupThread::new();
        let mut source = Garrison::new(Side::West);
        let mut dest = Garrison::new(Side::East);
        let handle = thread.spawn_local(Group::new(Side::West, GroupType::Patrol)).unwrap();
        let group = handle.id();
        source.add_group(handle).unwrap();

        drop(thread);
        let err = dest.add_group_from(&mut source, group).unwrap_err();

        assert_eq!(err, GarrisonError::Mailbox(MailboxError::Closed));
        assert_eq!(source.get_groups(), vec![group]);
        assert!(dest.get_groups().is_empty());
    }

    #[test]
    fn test_vehicle_entered_records_crew() {
        let mut garrison = Garrison::new(Side::West);
        let vehicle = Unit::spawn(UnitKind::Vehicle);
        let driver = Unit::spawn(UnitKind::Infantry);
        let passenger = grouped_unit(GroupId::new());
        garrison.add_unit(vehicle).unwrap();

        garrison.on_vehicle_entered(&vehicle, &driver).unwrap();
        garrison.on_vehicle_entered(&vehicle, &passenger).unwrap();

        let crew = garrison.crew(vehicle.id).unwrap();
        assert!(crew.contains(&driver.id) && crew.contains(&passenger.id));
        // The loose driver joins the garrison, the grouped passenger does not
        assert!(garrison.holds_unit(driver.id));
        assert!(!garrison.holds_unit(passenger.id));
    }

    #[test]
    fn test_vehicle_entered_requires_held_vehicle() {
        let mut garrison = Garrison::new(Side::West);
        let vehicle = Unit::spawn(UnitKind::Vehicle);
        let driver = Unit::spawn(UnitKind::Infantry);

        let err = garrison.on_vehicle_entered(&vehicle, &driver).unwrap_err();
        assert!(err.is_not_member());
        assert!(!garrison.holds_unit(driver.id));
    }

    #[test]
    fn test_killed_vehicle_clears_crew() {
        let mut garrison = Garrison::new(Side::West);
        let vehicle = Unit::spawn(UnitKind::Vehicle);
        let driver = Unit::spawn(UnitKind::Infantry);
        garrison.add_unit(vehicle).unwrap();
        garrison.on_vehicle_entered(&vehicle, &driver).unwrap();

        garrison.on_killed(&driver).unwrap();
        assert!(garrison.crew(vehicle.id).is_none());

        garrison.on_killed(&vehicle).unwrap();
        garrison.on_killed(&vehicle).unwrap();
        assert_eq!(garrison.direct_units().count(), 0);
    }

    #[test]
    fn test_snapshot_gathers_groups() {
        let mut thread = GroupThread::new();
        let mut garrison = Garrison::new(Side::East);
        let location = LocationId::new();
        garrison.set_location(Some(location));

        let mut group = Group::new(Side::West, GroupType::Patrol);
        group.add_unit(Unit::spawn(UnitKind::Infantry)).unwrap();
        let handle = thread.spawn_local(group).unwrap();
        let group_id = handle.id();
        garrison.add_group(handle).unwrap();

        let pending = garrison.snapshot().unwrap();
        thread.step();
        let snapshot = pending.try_collect().unwrap();

        assert_eq!(snapshot.location, Some(location));
        let group = snapshot.group(group_id).unwrap();
        assert_eq!(group.side, Side::East);
        assert_eq!(group.garrison, Some(garrison.id()));
        assert_eq!(snapshot.all_unit_ids().len(), 1);
    }

    #[test]
    fn test_pending_units_not_ready() {
        let mut thread = GroupThread::new();
        let mut garrison = Garrison::new(Side::East);
        garrison
            .add_group(thread.spawn_local(Group::new(Side::East, GroupType::Idle)).unwrap())
            .unwrap();

        let pending = garrison.get_all_units().unwrap();
        let err = pending.try_collect().unwrap_err();
        assert_eq!(err, GarrisonError::Mailbox(MailboxError::Pending));
    }
}
