//! Inventory and weapon queries against the tracked player.
//!
//! Every query degrades instead of failing: a missing actor, an unknown
//! class or an out of range slot reads as 0, or -1 where the published
//! field uses -1 for "none".

use crate::classes::{ClassId, ClassRegistry};
use crate::layout::SLOT_COUNT;
use crate::sim::{Actor, Player};

/// Read-only queries over one player's inventory and weapons.
#[derive(Debug, Clone, Copy)]
pub struct InventoryQuery<'a> {
    registry: &'a ClassRegistry,
    player: &'a Player,
}

impl<'a> InventoryQuery<'a> {
    /// Queries for `player`, resolving classes through `registry`.
    pub const fn new(registry: &'a ClassRegistry, player: &'a Player) -> Self {
        Self { registry, player }
    }

    fn actor(&self) -> Option<&'a Actor> {
        self.player.actor.as_ref()
    }

    /// Amount of `class` held by the controlled actor.
    pub fn check_item(&self, class: ClassId) -> i32 {
        self.actor()
            .map_or(0, |actor| actor.inventory.amount(class))
    }

    /// Amount of the class called `name`; 0 for unknown names.
    pub fn check_item_named(&self, name: &str) -> i32 {
        self.registry
            .id(name)
            .map_or(0, |class| self.check_item(class))
    }

    /// Ammo available for `weapon`.
    ///
    /// -1 when no weapon is given, 0 when it uses no ammo.
    pub fn check_weapon_ammo(&self, weapon: Option<ClassId>) -> i32 {
        let Some(weapon) = weapon else {
            return -1;
        };
        self.registry
            .ammo_for(weapon)
            .map_or(0, |ammo| self.check_item(ammo))
    }

    /// Slot number of the ready weapon, or -1.
    ///
    /// Slots are scanned in order and weapons in assignment order; the first
    /// slot holding the ready weapon's class wins.
    pub fn check_selected_weapon(&self) -> i32 {
        if self.actor().is_none() {
            return -1;
        }
        self.player
            .ready_weapon
            .and_then(|weapon| self.player.weapon_slots.find(weapon))
            .map_or(-1, |slot| slot as i32)
    }

    /// Ammo of the ready weapon, or -1 without an actor or weapon.
    pub fn check_selected_weapon_ammo(&self) -> i32 {
        if self.actor().is_none() {
            return -1;
        }
        self.check_weapon_ammo(self.player.ready_weapon)
    }

    /// Ammo of the first weapon assigned to `slot`.
    ///
    /// 0 for empty or out of range slots.
    pub fn check_slot_ammo(&self, slot: usize) -> i32 {
        self.player
            .weapon_slots
            .slot(slot)
            .first()
            .map_or(0, |weapon| self.check_weapon_ammo(Some(*weapon)))
    }

    /// Total amount held of every weapon assigned to `slot`.
    pub fn check_slot_weapons(&self, slot: usize) -> i32 {
        self.player
            .weapon_slots
            .slot(slot)
            .iter()
            .fold(0i32, |sum, weapon| sum.saturating_add(self.check_item(*weapon)))
    }

    /// [`check_slot_ammo`](Self::check_slot_ammo) for every slot.
    pub fn slot_ammo(&self) -> [i32; SLOT_COUNT] {
        std::array::from_fn(|slot| self.check_slot_ammo(slot))
    }

    /// [`check_slot_weapons`](Self::check_slot_weapons) for every slot.
    pub fn slot_weapons(&self) -> [i32; SLOT_COUNT] {
        std::array::from_fn(|slot| self.check_slot_weapons(slot))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::sim::Inventory;

    struct Fixture {
        registry: ClassRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: ClassRegistry::doom(),
            }
        }

        fn id(&self, name: &str) -> ClassId {
            self.registry.id(name).expect("known class")
        }

        fn armed_player(&self) -> Player {
            let inventory = Inventory::new()
                .with(self.id("Pistol"), 1)
                .with(self.id("Shotgun"), 1)
                .with(self.id("SuperShotgun"), 1)
                .with(self.id("Clip"), 50)
                .with(self.id("Shell"), 8)
                .with(self.id("BasicArmor"), 75);
            let mut player = Player::new("player1")
                .with_actor(Actor {
                    health: 100,
                    inventory,
                })
                .with_slots(self.registry.default_slots().clone());
            player.ready_weapon = Some(self.id("SuperShotgun"));
            player
        }
    }

    #[test]
    fn test_no_actor_defaults() {
        let fx = Fixture::new();
        let mut player = Player::new("ghost").with_slots(fx.registry.default_slots().clone());
        player.ready_weapon = Some(fx.id("Pistol"));
        let query = InventoryQuery::new(&fx.registry, &player);

        assert_eq!(query.check_item(fx.id("Clip")), 0);
        assert_eq!(query.check_item_named("BasicArmor"), 0);
        assert_eq!(query.check_selected_weapon(), -1);
        assert_eq!(query.check_selected_weapon_ammo(), -1);
        assert_eq!(query.slot_ammo(), [0; SLOT_COUNT]);
        assert_eq!(query.slot_weapons(), [0; SLOT_COUNT]);
    }

    #[test]
    fn test_weapon_ammo() {
        let fx = Fixture::new();
        let player = fx.armed_player();
        let query = InventoryQuery::new(&fx.registry, &player);

        assert_eq!(query.check_weapon_ammo(None), -1);
        assert_eq!(query.check_weapon_ammo(Some(fx.id("Fist"))), 0);
        assert_eq!(query.check_weapon_ammo(Some(fx.id("Shotgun"))), 8);
        assert_eq!(query.check_weapon_ammo(Some(fx.id("Chaingun"))), 50);
        assert_eq!(query.check_weapon_ammo(Some(fx.id("PlasmaRifle"))), 0);
    }

    #[test]
    fn test_selected_weapon() {
        let fx = Fixture::new();
        let mut player = fx.armed_player();
        let query = InventoryQuery::new(&fx.registry, &player);
        assert_eq!(query.check_selected_weapon(), 3);
        assert_eq!(query.check_selected_weapon_ammo(), 8);

        player.ready_weapon = None;
        let query = InventoryQuery::new(&fx.registry, &player);
        assert_eq!(query.check_selected_weapon(), -1);
        assert_eq!(query.check_selected_weapon_ammo(), -1);
    }

    #[test]
    fn test_selected_weapon_not_in_any_slot() {
        let fx = Fixture::new();
        let mut player = fx.armed_player();
        player.weapon_slots = crate::sim::WeaponSlots::default();
        let query = InventoryQuery::new(&fx.registry, &player);
        assert_eq!(query.check_selected_weapon(), -1);
    }

    #[test]
    fn test_slot_queries() {
        let fx = Fixture::new();
        let player = fx.armed_player();
        let query = InventoryQuery::new(&fx.registry, &player);

        // slot 1: Fist, Chainsaw; no ammo
        assert_eq!(query.check_slot_ammo(1), 0);
        assert_eq!(query.check_slot_ammo(2), 50);
        assert_eq!(query.check_slot_ammo(3), 8);
        assert_eq!(query.check_slot_ammo(4), 50);
        assert_eq!(query.check_slot_ammo(0), 0);
        assert_eq!(query.check_slot_ammo(99), 0);

        assert_eq!(query.check_slot_weapons(2), 1);
        assert_eq!(query.check_slot_weapons(3), 2);
        assert_eq!(query.check_slot_weapons(5), 0);
        assert_eq!(query.check_slot_weapons(99), 0);
    }

    #[test]
    fn test_named_lookup() {
        let fx = Fixture::new();
        let player = fx.armed_player();
        let query = InventoryQuery::new(&fx.registry, &player);
        assert_eq!(query.check_item_named("BasicArmor"), 75);
        assert_eq!(query.check_item_named("NoSuchThing"), 0);
    }
}
