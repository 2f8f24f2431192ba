//! Garrison Registry
//!
//! The registry owns every live garrison of one owning context. It is the
//! lookup table the host uses to route lifecycle events and to move groups
//! and units between garrisons. Because it holds all garrisons mutably, a
//! move removes from the source and inserts into the destination without
//! any other context observing the state in between.

use garrison_model::{AgentId, GarrisonId, GroupId, LifecycleEvent, Unit, UnitId};

use crate::agent::{process_tree, Agent, Subagents};
use crate::config::{EngineConfig, DEFAULT_BACKLOG_WARNING};
use crate::error::GarrisonError;
use crate::garrison::Garrison;
use crate::group::GroupHandle;

#[derive(Debug)]
pub struct GarrisonRegistry {
    garrisons: Subagents<Garrison>,
    backlog_warning: usize,
}

impl GarrisonRegistry {
    pub fn new() -> Self {
        Self {
            garrisons: Subagents::new(),
            backlog_warning: DEFAULT_BACKLOG_WARNING,
        }
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            garrisons: Subagents::new(),
            backlog_warning: config.mailbox.backlog_warning,
        }
    }

    /// Register a garrison, returning its id.
    pub fn register(&mut self, mut garrison: Garrison) -> Result<GarrisonId, GarrisonError> {
        garrison.set_backlog_warning(self.backlog_warning);
        let id = garrison.id();
        let side = garrison.side();
        self.garrisons.adopt(garrison)?;
        tracing::info!(garrison = %id, %side, "garrison registered");
        Ok(id)
    }

    pub fn get(&self, id: GarrisonId) -> Option<&Garrison> {
        self.garrisons.get(AgentId::Garrison(id))
    }

    pub fn get_mut(&mut self, id: GarrisonId) -> Option<&mut Garrison> {
        self.garrisons.get_mut(AgentId::Garrison(id))
    }

    /// Unregister a garrison. Dropping the returned garrison dissolves its groups.
    pub fn remove(&mut self, id: GarrisonId) -> Option<Garrison> {
        let garrison = self.garrisons.release(AgentId::Garrison(id))?;
        tracing::info!(garrison = %id, "garrison unregistered");
        Some(garrison)
    }

    pub fn ids(&self) -> Vec<GarrisonId> {
        self.garrisons.iter().map(|g| g.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.garrisons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.garrisons.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Garrison> {
        self.garrisons.iter()
    }

    /// The garrison that owns `group` right now.
    pub fn owner_of_group(&self, group: GroupId) -> Option<GarrisonId> {
        self.iter().find(|g| g.contains_group(group)).map(|g| g.id())
    }

    /// The garrison that holds `unit` directly, outside any group.
    pub fn holder_of_unit(&self, unit: UnitId) -> Option<GarrisonId> {
        self.iter().find(|g| g.holds_unit(unit)).map(|g| g.id())
    }

    /// Moves `group` into `dest` from whichever garrison owns it.
    ///
    /// Afterwards the group is listed by `dest` only, and its side is
    /// `dest`'s side once the group's thread runs the queued attach.
    /// Moving a group into the garrison that already owns it does nothing.
    pub fn add_group(&mut self, dest: GarrisonId, group: GroupId) -> Result<(), GarrisonError> {
        if self.get(dest).is_none() {
            return Err(GarrisonError::UnknownGarrison(dest));
        }
        let source = self
            .owner_of_group(group)
            .ok_or(GarrisonError::UnknownGroup(group))?;
        if source == dest {
            return Ok(());
        }

        let mut source = self
            .garrisons
            .release(AgentId::Garrison(source))
            .ok_or(GarrisonError::UnknownGarrison(source))?;
        let moved = match self.get_mut(dest) {
            Some(dest) => dest.add_group_from(&mut source, group),
            None => Err(GarrisonError::UnknownGarrison(dest)),
        };
        self.garrisons.adopt(source)?;
        moved
    }

    /// Gives a group no garrison owns yet to `dest`.
    pub fn attach_group(
        &mut self,
        dest: GarrisonId,
        group: GroupHandle,
    ) -> Result<(), GarrisonError> {
        self.get_mut(dest)
            .ok_or(GarrisonError::UnknownGarrison(dest))?
            .add_group(group)
    }

    /// Adds an ungrouped unit to `dest`, taking it from any other garrison
    /// that holds it.
    pub fn add_unit(&mut self, dest: GarrisonId, unit: Unit) -> Result<(), GarrisonError> {
        if let Some(group) = unit.group {
            return Err(GarrisonError::AlreadyGrouped {
                unit: unit.id,
                group,
            });
        }
        if self.get(dest).is_none() {
            return Err(GarrisonError::UnknownGarrison(dest));
        }

        if let Some(holder) = self.holder_of_unit(unit.id).filter(|&h| h != dest) {
            if let Some(holder) = self.get_mut(holder) {
                holder.take_unit(unit.id)?;
            }
            tracing::debug!(unit = %unit.id, from = %holder, to = %dest, "moving unit");
        }
        self.get_mut(dest)
            .ok_or(GarrisonError::UnknownGarrison(dest))?
            .add_unit(unit)
    }

    /// Routes a lifecycle event to the garrison it concerns.
    ///
    /// Events about units no registered garrison knows are ignored.
    pub fn dispatch(&mut self, event: &LifecycleEvent) -> Result<(), GarrisonError> {
        match event {
            LifecycleEvent::UnitKilled { unit } => {
                for garrison in self.garrisons.iter_mut() {
                    garrison.forget_crew(unit.id);
                }

                let target = unit
                    .group
                    .and_then(|group| self.owner_of_group(group))
                    .or_else(|| self.holder_of_unit(unit.id));
                match target.and_then(|id| self.get_mut(id)) {
                    Some(garrison) => garrison.on_killed(unit),
                    None => {
                        tracing::debug!(unit = %unit.id, "killed unit has no garrison");
                        Ok(())
                    }
                }
            }
            LifecycleEvent::VehicleEntered { vehicle, entity } => {
                let Some(dest) = self.holder_of_unit(vehicle.id) else {
                    tracing::debug!(vehicle = %vehicle.id, "entered vehicle has no garrison");
                    return Ok(());
                };
                if !entity.is_grouped() {
                    if let Some(holder) = self.holder_of_unit(entity.id).filter(|&h| h != dest) {
                        if let Some(holder) = self.get_mut(holder) {
                            holder.take_unit(entity.id)?;
                        }
                    }
                }
                match self.get_mut(dest) {
                    Some(garrison) => garrison.on_vehicle_entered(vehicle, entity),
                    None => Err(GarrisonError::UnknownGarrison(dest)),
                }
            }
        }
    }

    /// Dispatches every event in order, stopping at the first failure.
    pub fn dispatch_all<'a>(
        &mut self,
        events: impl IntoIterator<Item = &'a LifecycleEvent>,
    ) -> Result<usize, GarrisonError> {
        let mut dispatched = 0;
        for event in events {
            self.dispatch(event)?;
            dispatched += 1;
        }
        Ok(dispatched)
    }

    /// Runs one processing pass over every garrison, returning the number of
    /// calls executed. Groups are not touched; their thread advances them.
    pub fn process(&mut self) -> usize {
        self.garrisons
            .iter_mut()
            .map(|garrison| process_tree(garrison))
            .sum()
    }
}

impl Default for GarrisonRegistry {
    fn default() -> Self {
        Self::new()
    }
}
