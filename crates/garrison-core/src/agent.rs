//! Agent Hierarchy
//!
//! Every mailbox-owning entity implements [`Agent`]. The generic walk,
//! [`process_tree`], drains an agent and then each of its sub-agents on the
//! calling context. It therefore only sees children that are owned
//! synchronously; agents whose children live in another execution context
//! report no sub-agents even though they own them.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use garrison_model::{AgentId, Unit};

use crate::error::GarrisonError;

pub trait Agent: Send {
    fn agent_id(&self) -> AgentId;

    /// Drains this agent's mailbox on the calling context.
    fn process_messages(&mut self) -> usize;

    /// Children that are processed synchronously with this agent.
    fn subagents(&mut self) -> Vec<&mut dyn Agent>;

    /// Called when a unit has been killed.
    fn on_killed(&mut self, _unit: &Unit) -> Result<(), GarrisonError> {
        Ok(())
    }

    /// Called when `entity` enters `vehicle`.
    fn on_vehicle_entered(&mut self, _vehicle: &Unit, _entity: &Unit) -> Result<(), GarrisonError> {
        Ok(())
    }
}

/// Drains `agent`, then every sub-agent depth-first, parents before children.
///
/// Returns the total number of calls executed.
pub fn process_tree(agent: &mut dyn Agent) -> usize {
    let mut executed = agent.process_messages();
    for child in agent.subagents() {
        executed += process_tree(child);
    }
    executed
}

/// Exclusive ownership of a set of sub-agents, keyed by agent id.
///
/// An agent leaves the set only through [`Subagents::release`], which hands
/// it back to the caller.
#[derive(Debug)]
pub struct Subagents<A> {
    agents: BTreeMap<AgentId, A>,
}

impl<A: Agent> Subagents<A> {
    pub fn new() -> Self {
        Self {
            agents: BTreeMap::new(),
        }
    }

    /// Takes ownership of `agent`. Fails if an agent with the same id is already owned.
    pub fn adopt(&mut self, agent: A) -> Result<&mut A, GarrisonError> {
        let id = agent.agent_id();
        match self.agents.entry(id) {
            Entry::Occupied(_) => Err(GarrisonError::DuplicateAgent(id)),
            Entry::Vacant(slot) => Ok(slot.insert(agent)),
        }
    }

    /// Transfers ownership of an agent out of the set.
    pub fn release(&mut self, id: AgentId) -> Option<A> {
        self.agents.remove(&id)
    }

    pub fn get(&self, id: AgentId) -> Option<&A> {
        self.agents.get(&id)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut A> {
        self.agents.get_mut(&id)
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &A> {
        self.agents.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut A> {
        self.agents.values_mut()
    }

    /// The owned agents as trait objects, for [`Agent::subagents`] implementations.
    pub fn as_dyn_mut(&mut self) -> Vec<&mut dyn Agent> {
        self.agents
            .values_mut()
            .map(|agent| agent as &mut dyn Agent)
            .collect()
    }
}

impl<A: Agent> Default for Subagents<A> {
    fn default() -> Self {
        Self::new()
    }
}
