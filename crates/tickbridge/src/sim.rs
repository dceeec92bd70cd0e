//! Simulation state handed to the writer each tick.
//!
//! These types are the boundary to the simulation: the host fills them from
//! its own object model and the writer never looks further.

use std::collections::HashMap;

use crate::classes::ClassId;
use crate::layout::SLOT_COUNT;

/// Amounts held per inventory class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    amounts: HashMap<ClassId, i32>,
}

impl Inventory {
    /// Empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the amount of a class. Zero or less removes it.
    pub fn set(&mut self, class: ClassId, amount: i32) {
        if amount > 0 {
            self.amounts.insert(class, amount);
        } else {
            self.amounts.remove(&class);
        }
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, class: ClassId, amount: i32) -> Self {
        self.set(class, amount);
        self
    }

    /// Amount held, 0 if the class is not present.
    pub fn amount(&self, class: ClassId) -> i32 {
        self.amounts.get(&class).copied().unwrap_or(0).max(0)
    }

    /// Whether any amount is held.
    pub fn contains(&self, class: ClassId) -> bool {
        self.amount(class) > 0
    }
}

/// The object a player controls in the world.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    /// Actor health
    pub health: i32,
    /// Items carried by the actor
    pub inventory: Inventory,
}

impl Actor {
    /// Actor with the given health and an empty inventory.
    pub fn new(health: i32) -> Self {
        Self {
            health,
            inventory: Inventory::new(),
        }
    }
}

/// Weapon classes grouped by slot number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeaponSlots {
    slots: [Vec<ClassId>; SLOT_COUNT],
}

impl WeaponSlots {
    /// Append a weapon to a slot. Out of range slots are ignored.
    pub fn push(&mut self, slot: usize, weapon: ClassId) {
        if let Some(list) = self.slots.get_mut(slot) {
            list.push(weapon);
        }
    }

    /// Weapons in a slot, in assignment order. Empty for out of range slots.
    pub fn slot(&self, slot: usize) -> &[ClassId] {
        self.slots.get(slot).map_or(&[], Vec::as_slice)
    }

    /// Slot number of the first slot containing `weapon`.
    pub fn find(&self, weapon: ClassId) -> Option<usize> {
        self.slots.iter().position(|slot| slot.contains(&weapon))
    }
}

/// Player life cycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayerStatus {
    /// Playing
    #[default]
    Alive,
    /// Dead, not yet respawning
    Dead,
    /// Dead and waiting to respawn
    Reborn,
}

/// One player slot of the simulation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Player {
    /// Display name
    pub name: String,
    /// Slot is occupied
    pub in_game: bool,
    /// Life cycle state
    pub status: PlayerStatus,
    /// Player-level health, used when there is no actor
    pub health: i32,
    /// Controlled actor, if any
    pub actor: Option<Actor>,
    /// Weapon currently raised
    pub ready_weapon: Option<ClassId>,
    /// Slot assignment of this player
    pub weapon_slots: WeaponSlots,
    /// Monsters killed
    pub kill_count: i32,
    /// Items picked up
    pub item_count: i32,
    /// Secrets found
    pub secret_count: i32,
    /// Frags
    pub frag_count: i32,
    /// Primary attack available
    pub weapon_ready: bool,
    /// Secondary attack available
    pub alt_weapon_ready: bool,
    /// Standing on the ground
    pub on_ground: bool,
    /// Player controls game settings
    pub settings_controller: bool,
}

impl Player {
    /// In-game player with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            in_game: true,
            ..Self::default()
        }
    }

    /// Attach an actor.
    #[must_use]
    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Use a slot assignment.
    #[must_use]
    pub fn with_slots(mut self, slots: WeaponSlots) -> Self {
        self.weapon_slots = slots;
        self
    }
}

/// Game phase. Codes are published as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u32)]
pub enum GamePhase {
    /// Playing a map
    #[default]
    Level = 0,
    /// Between maps
    Intermission = 1,
    /// End of episode text
    Finale = 2,
    /// Title or demo loop
    DemoScreen = 3,
    /// Console covering the screen
    FullConsole = 4,
    /// Console being hidden
    HideConsole = 5,
    /// Engine starting up
    Startup = 6,
    /// Title map running
    TitleLevel = 7,
}

impl GamePhase {
    /// Published code.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Phase for a published code.
    pub const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::Level,
            1 => Self::Intermission,
            2 => Self::Finale,
            3 => Self::DemoScreen,
            4 => Self::FullConsole,
            5 => Self::HideConsole,
            6 => Self::Startup,
            7 => Self::TitleLevel,
            _ => return None,
        })
    }
}

/// Global clock and session flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clock {
    /// Global tick counter
    pub tick: u32,
    /// Current phase
    pub phase: GamePhase,
    /// Pending game action code
    pub game_action: u32,
    /// Static RNG seed
    pub static_seed: u32,
    /// Networked game
    pub netgame: bool,
    /// Multiplayer game
    pub multiplayer: bool,
    /// Demo being recorded
    pub demo_recording: bool,
    /// Demo being played back
    pub demo_playback: bool,
}

/// Current map counters and script globals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Level<'a> {
    /// Tick the map started at
    pub start_tick: u32,
    /// Ticks spent on the map
    pub map_tick: u32,
    /// Monsters killed
    pub killed: i32,
    /// Items found
    pub items: i32,
    /// Secrets found
    pub secrets: i32,
    /// Script globals; index 0 is the reward, 1..=60 the user variables.
    /// Missing entries read as 0.
    pub globals: &'a [i32],
}

impl Level<'_> {
    /// Global variable, 0 if not provided.
    pub fn global(&self, index: usize) -> i32 {
        self.globals.get(index).copied().unwrap_or(0)
    }
}

/// A visible object reported by the labeling subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledSprite {
    /// Object id
    pub object_id: u32,
    /// Class name of the object
    pub type_name: String,
    /// Label value
    pub label: u8,
    /// Whether a label was assigned
    pub labeled: bool,
}

impl LabeledSprite {
    /// Labeled sprite.
    pub fn new(object_id: u32, type_name: &str, label: u8) -> Self {
        Self {
            object_id,
            type_name: type_name.to_string(),
            label,
            labeled: true,
        }
    }

    /// Sprite with no label assigned.
    pub fn unlabeled(object_id: u32, type_name: &str, label: u8) -> Self {
        Self {
            labeled: false,
            ..Self::new(object_id, type_name, label)
        }
    }
}

/// Everything the writer samples for one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput<'a> {
    /// Clock and session flags
    pub clock: Clock,
    /// Current map
    pub level: Level<'a>,
    /// All player slots, indexed by player number
    pub players: &'a [Player],
    /// Player number being tracked
    pub console_player: usize,
    /// Labeled sprites, `None` when labeling is off
    pub labels: Option<&'a [LabeledSprite]>,
}
