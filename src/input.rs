use std::collections::HashMap;

/// One-shot ability slots a client can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilitySlot {
    First,
    Second,
}

impl AbilitySlot {
    /// Maps the wire name of an ability slot; unknown names are ignored upstream.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "first" => Some(AbilitySlot::First),
            "second" => Some(AbilitySlot::Second),
            _ => None,
        }
    }
}

/// Current input intent for one connection, pushed to the engine every tick.
///
/// Movement keys and `shift` are level-triggered: they hold whatever the last
/// key event set. Ability flags are one-shot: the scheduler clears them after
/// the tick that observes them. Mouse fields are overwritten wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub shift: bool,
    pub mouse_enable: bool,
    pub mouse_pos_x: f64,
    pub mouse_pos_y: f64,
    pub first_ability: bool,
    pub second_ability: bool,
}

impl InputState {
    pub fn set_left(&mut self, val: bool) {
        self.left = val;
    }

    pub fn set_right(&mut self, val: bool) {
        self.right = val;
    }

    pub fn set_up(&mut self, val: bool) {
        self.up = val;
    }

    pub fn set_down(&mut self, val: bool) {
        self.down = val;
    }

    pub fn set_shift(&mut self, val: bool) {
        self.shift = val;
    }

    pub fn set_mouse_enable(&mut self, val: bool) {
        self.mouse_enable = val;
    }

    pub fn set_mouse_pos_x(&mut self, val: f64) {
        self.mouse_pos_x = val;
    }

    pub fn set_mouse_pos_y(&mut self, val: f64) {
        self.mouse_pos_y = val;
    }

    pub fn set_ability(&mut self, slot: AbilitySlot, val: bool) {
        match slot {
            AbilitySlot::First => self.first_ability = val,
            AbilitySlot::Second => self.second_ability = val,
        }
    }

    /// Clears the one-shot flags after a tick has read them.
    pub fn clear_abilities(&mut self) {
        self.first_ability = false;
        self.second_ability = false;
    }
}

/// Input records keyed by connection identity. Pure data; the session holds
/// the lock.
#[derive(Debug, Default)]
pub struct InputRegistry {
    states: HashMap<u64, InputState>,
}

impl InputRegistry {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
        }
    }

    /// Allocates a zeroed record for a new connection.
    pub fn create(&mut self, id: u64) {
        self.states.insert(id, InputState::default());
    }

    /// Mutable access for dispatch; `None` means the connection is already gone.
    pub fn get_mut(&mut self, id: u64) -> Option<&mut InputState> {
        self.states.get_mut(&id)
    }

    /// Removes the record; returns whether it existed.
    pub fn remove(&mut self, id: u64) -> bool {
        self.states.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Clones every record for the current tick and consumes the one-shot
    /// ability flags, so a press reaches the engine exactly once.
    pub fn snapshot_for_tick(&mut self) -> Vec<(u64, InputState)> {
        let mut snapshots = Vec::with_capacity(self.states.len());
        for (id, state) in self.states.iter_mut() {
            snapshots.push((*id, state.clone()));
            state.clear_abilities();
        }
        snapshots
    }
}
