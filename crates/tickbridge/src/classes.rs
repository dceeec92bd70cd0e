//! Class registry: inventory item and weapon classes known at load time.
//!
//! The registry is built once from a [`ClassTable`] and never changes
//! afterwards. It resolves names to [`ClassId`]s and holds the weapon to
//! ammo map used by the slot ammo queries, so no weapon object ever has to
//! be instantiated to find out what it fires.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SessionError};
use crate::layout::SLOT_COUNT;
use crate::sim::WeaponSlots;

/// Identity of an item or weapon class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(u32);

impl ClassId {
    /// Raw registry index.
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// A weapon class and the ammo class it consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponDef {
    /// Weapon class name
    pub name: String,
    /// Primary ammo class name, `None` for melee weapons
    #[serde(default)]
    pub ammo: Option<String>,
}

/// Serializable description of the classes a game defines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassTable {
    /// Non-weapon inventory classes (ammo, armor, keys, ...)
    #[serde(default)]
    pub items: Vec<String>,
    /// Weapon classes
    #[serde(default)]
    pub weapons: Vec<WeaponDef>,
    /// Default slot assignment, outer index is the slot number
    #[serde(default)]
    pub slots: Vec<Vec<String>>,
}

impl ClassTable {
    /// Built-in table for the stock Doom classes.
    pub fn doom() -> Self {
        Self::default()
            .with_items(["Clip", "Shell", "RocketAmmo", "Cell", "BasicArmor", "Backpack"])
            .with_weapon("Fist", None)
            .with_weapon("Chainsaw", None)
            .with_weapon("Pistol", Some("Clip"))
            .with_weapon("Shotgun", Some("Shell"))
            .with_weapon("SuperShotgun", Some("Shell"))
            .with_weapon("Chaingun", Some("Clip"))
            .with_weapon("RocketLauncher", Some("RocketAmmo"))
            .with_weapon("PlasmaRifle", Some("Cell"))
            .with_weapon("BFG9000", Some("Cell"))
            .with_slot(1, ["Fist", "Chainsaw"])
            .with_slot(2, ["Pistol"])
            .with_slot(3, ["Shotgun", "SuperShotgun"])
            .with_slot(4, ["Chaingun"])
            .with_slot(5, ["RocketLauncher"])
            .with_slot(6, ["PlasmaRifle"])
            .with_slot(7, ["BFG9000"])
    }

    /// Load a table from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Add item classes.
    #[must_use]
    pub fn with_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.items.extend(items.into_iter().map(Into::into));
        self
    }

    /// Add a weapon class.
    #[must_use]
    pub fn with_weapon(mut self, name: &str, ammo: Option<&str>) -> Self {
        self.weapons.push(WeaponDef {
            name: name.to_string(),
            ammo: ammo.map(str::to_string),
        });
        self
    }

    /// Append weapons to a slot.
    #[must_use]
    pub fn with_slot<I, S>(mut self, slot: usize, weapons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.slots.len() <= slot {
            self.slots.resize_with(slot + 1, Vec::new);
        }
        self.slots[slot].extend(weapons.into_iter().map(Into::into));
        self
    }
}

/// Resolved class table.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    names: Vec<String>,
    by_name: HashMap<String, ClassId>,
    weapon_ammo: HashMap<ClassId, Option<ClassId>>,
    default_slots: WeaponSlots,
}

impl ClassRegistry {
    /// Resolve a class table.
    ///
    /// Weapon ammo must name a declared class and slots must name declared
    /// weapons. Slots past the tenth are rejected.
    pub fn from_table(table: &ClassTable) -> Result<Self> {
        let mut registry = Self::default();

        for item in &table.items {
            registry.intern(item);
        }
        for weapon in &table.weapons {
            let id = registry.intern(&weapon.name);
            registry.weapon_ammo.insert(id, None);
        }
        for weapon in &table.weapons {
            if let Some(ammo) = &weapon.ammo {
                let ammo_id = registry.require(ammo)?;
                let id = registry.require(&weapon.name)?;
                registry.weapon_ammo.insert(id, Some(ammo_id));
            }
        }

        if table.slots.len() > SLOT_COUNT {
            return Err(SessionError::Config(format!(
                "class table defines {} weapon slots, at most {SLOT_COUNT} are supported",
                table.slots.len()
            )));
        }
        for (slot, weapons) in table.slots.iter().enumerate() {
            for name in weapons {
                let id = registry.require(name)?;
                if !registry.is_weapon(id) {
                    return Err(SessionError::Config(format!(
                        "slot {slot} lists '{name}', which is not a weapon"
                    )));
                }
                registry.default_slots.push(slot, id);
            }
        }

        debug!(
            "Class registry: {} classes, {} weapons",
            registry.names.len(),
            registry.weapon_ammo.len()
        );
        Ok(registry)
    }

    /// Registry for the stock Doom classes.
    pub fn doom() -> Self {
        // The built-in table is consistent by construction.
        Self::from_table(&ClassTable::doom()).unwrap_or_default()
    }

    fn intern(&mut self, name: &str) -> ClassId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = ClassId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        id
    }

    fn require(&self, name: &str) -> Result<ClassId> {
        self.id(name)
            .ok_or_else(|| SessionError::UnknownClass(name.to_string()))
    }

    /// Look up a class by name.
    pub fn id(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    /// Name of a class.
    pub fn name(&self, id: ClassId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    /// Whether the class is a weapon.
    pub fn is_weapon(&self, id: ClassId) -> bool {
        self.weapon_ammo.contains_key(&id)
    }

    /// Primary ammo class of a weapon. `None` for melee weapons and
    /// non-weapons.
    pub fn ammo_for(&self, weapon: ClassId) -> Option<ClassId> {
        self.weapon_ammo.get(&weapon).copied().flatten()
    }

    /// Slot assignment from the class table.
    pub fn default_slots(&self) -> &WeaponSlots {
        &self.default_slots
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True if no classes are registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
