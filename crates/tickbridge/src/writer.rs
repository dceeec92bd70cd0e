//! Per-tick snapshot writer.
//!
//! A [`Session`] owns the region directory, the class registry and the
//! previous tick's snapshot. Each call to [`Session::write_tick`] composes a
//! complete [`SnapshotBody`] from the tick input and publishes it into the
//! game state region between two generation bumps:
//!
//! 1. generation becomes odd (write in progress)
//! 2. total size and body are written
//! 3. generation becomes even (write complete)
//!
//! Readers that observe the same even generation before and after copying
//! have a consistent snapshot.

use std::sync::atomic::{Ordering, fence};

use tickbridge_shmem::{
    MappedRegion, REGION_COUNT, RegionDescriptor, RegionDirectory, RegionKind,
};
use tracing::{debug, error, info, warn};

use crate::classes::{ClassId, ClassRegistry};
use crate::config::{BufferSettings, SessionConfig};
use crate::error::{Result, SessionError};
use crate::labels::{LabelOrder, copy_labels};
use crate::layout::{
    BufferGeometry, GENERATION_OFFSET, HEADER_SIZE, MAX_PLAYERS, MapProgress, PlayerState, Roster,
    RosterSlot, SNAPSHOT_SIZE, SimClock, SnapshotBody, SnapshotHeader, USER_VAR_COUNT, fixed_str,
    write_total_size,
};
use crate::query::InventoryQuery;
use crate::sim::{GamePhase, Player, PlayerStatus, TickInput};

/// Everything besides the tick input that shapes one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ComposeContext<'a> {
    /// Class registry for inventory lookups
    pub registry: &'a ClassRegistry,
    /// Class published as armor
    pub armor: Option<ClassId>,
    /// Screen geometry and buffer flags
    pub buffers: &'a BufferSettings,
    /// Label copy order
    pub label_order: LabelOrder,
    /// Region table as it stands this tick
    pub regions: [RegionDescriptor; REGION_COUNT],
}

impl ComposeContext<'_> {
    fn region_live(&self, kind: RegionKind) -> bool {
        self.regions[kind.index()].is_live()
    }
}

/// Build the snapshot for one tick.
///
/// `previous` is the snapshot published on the tick before; only its death
/// flag and death counter are carried forward.
pub fn compose_snapshot(
    previous: &SnapshotBody,
    input: &TickInput<'_>,
    ctx: &ComposeContext<'_>,
) -> SnapshotBody {
    let fallback = Player::default();
    let player = input.players.get(input.console_player).unwrap_or(&fallback);
    let map_end = input.clock.phase != GamePhase::Level;

    let mut body = SnapshotBody {
        geometry: compose_geometry(ctx),
        clock: compose_clock(input, player),
        map: compose_map(input, map_end),
        player: compose_player(previous, input, player, map_end, ctx),
        roster: compose_roster(input.players),
        ..SnapshotBody::default()
    };
    copy_labels(input.labels, ctx.label_order, &mut body.labels);
    body
}

fn compose_geometry(ctx: &ComposeContext<'_>) -> BufferGeometry {
    let b = ctx.buffers;
    BufferGeometry {
        screen_width: b.screen_width,
        screen_height: b.screen_height,
        screen_pitch: b.screen_pitch,
        screen_size: b.screen_size,
        screen_format: b.screen_format,
        depth_buffer: b.depth && ctx.region_live(RegionKind::Depth),
        labels: b.labels && ctx.region_live(RegionKind::Labels),
        automap: b.automap,
        region_count: ctx.regions.iter().filter(|r| r.is_live()).count() as u32,
        regions: ctx.regions.map(Into::into),
    }
}

fn compose_clock(input: &TickInput<'_>, player: &Player) -> SimClock {
    let clock = &input.clock;
    SimClock {
        tick: clock.tick,
        game_state: clock.phase.code(),
        game_action: clock.game_action,
        static_seed: clock.static_seed,
        settings_controller: player.settings_controller,
        netgame: clock.netgame,
        multiplayer: clock.multiplayer,
        demo_recording: clock.demo_recording,
        demo_playback: clock.demo_playback,
        map_start_tick: input.level.start_tick,
        map_tick: input.level.map_tick,
    }
}

fn compose_map(input: &TickInput<'_>, map_end: bool) -> MapProgress {
    let level = &input.level;
    let mut user_vars = [0; USER_VAR_COUNT];
    for (i, var) in user_vars.iter_mut().enumerate() {
        *var = level.global(i + 1);
    }
    MapProgress {
        kill_count: level.killed,
        item_count: level.items,
        secret_count: level.secrets,
        user_vars,
        reward: level.global(0),
        map_end,
    }
}

fn compose_player(
    previous: &SnapshotBody,
    input: &TickInput<'_>,
    player: &Player,
    map_end: bool,
    ctx: &ComposeContext<'_>,
) -> PlayerState {
    let query = InventoryQuery::new(ctx.registry, player);

    let dead = player.actor.as_ref().is_none_or(|actor| {
        player.status == PlayerStatus::Dead || actor.health <= 0
    });

    let mut death_count = if map_end {
        0
    } else {
        previous.player.death_count
    };
    if dead && !previous.player.dead {
        death_count = death_count.wrapping_add(1);
        debug!("Player {} died (death {})", input.console_player, death_count);
    }

    let health = player
        .actor
        .as_ref()
        .map_or(player.health, |actor| actor.health);

    PlayerState {
        number: input.console_player as u32,
        has_actor: player.actor.is_some(),
        dead,
        ready_to_respawn: player.status == PlayerStatus::Reborn,
        death_count,
        name: fixed_str(&player.name),
        kill_count: player.kill_count,
        item_count: player.item_count,
        secret_count: player.secret_count,
        frag_count: player.frag_count,
        attack_ready: player.weapon_ready,
        alt_attack_ready: player.alt_weapon_ready,
        on_ground: player.on_ground,
        health,
        armor: ctx.armor.map_or(0, |armor| query.check_item(armor)),
        selected_weapon: query.check_selected_weapon(),
        selected_weapon_ammo: query.check_selected_weapon_ammo(),
        ammo: query.slot_ammo(),
        weapons: query.slot_weapons(),
    }
}

fn compose_roster(players: &[Player]) -> Roster {
    let slots: [RosterSlot; MAX_PLAYERS] = std::array::from_fn(|i| {
        players.get(i).map_or_else(RosterSlot::default, |p| RosterSlot {
            in_game: p.in_game,
            name: fixed_str(&p.name),
            frag_count: if p.in_game { p.frag_count } else { 0 },
        })
    });
    let player_count = slots.iter().filter(|s| s.in_game).count() as u32;
    Roster {
        player_count,
        slots,
    }
}

/// A writing session: one shared segment, one snapshot per tick.
#[derive(Debug)]
pub struct Session {
    directory: RegionDirectory,
    registry: ClassRegistry,
    config: SessionConfig,
    armor: Option<ClassId>,
    previous: SnapshotBody,
    generation: u32,
}

impl Session {
    /// Create the segment and the game state region and write the header.
    ///
    /// Fails if the configuration is invalid or the segment cannot be
    /// created, including when a segment with the same name already exists.
    pub fn start(config: SessionConfig, registry: ClassRegistry) -> Result<Self> {
        config.validate()?;

        let armor = registry.id(&config.armor_class);
        if armor.is_none() {
            warn!(
                "Armor class '{}' is not registered, armor will read 0",
                config.armor_class
            );
        }

        let mut directory =
            RegionDirectory::create(&config.segment.location, &config.segment.name)?;
        let desc = directory.create_region(RegionKind::GameState, false, SNAPSHOT_SIZE as u64)?;
        let total_size = directory.total_size();

        let region = directory
            .region_mut(RegionKind::GameState)
            .ok_or(SessionError::RegionTooSmall {
                kind: RegionKind::GameState,
                required: SNAPSHOT_SIZE as u64,
                actual: 0,
            })?;
        check_capacity(region)?;
        SnapshotHeader::current(total_size).to_mapped(region.as_mut_slice());

        info!(
            "Started session on {} (snapshot {} bytes at offset {:#x})",
            directory.segment_name(),
            SNAPSHOT_SIZE,
            desc.offset
        );

        Ok(Self {
            directory,
            registry,
            config,
            armor,
            previous: SnapshotBody::default(),
            generation: 0,
        })
    }

    /// Map an additional region.
    pub fn create_region(
        &mut self,
        kind: RegionKind,
        writable: bool,
        size: u64,
    ) -> Result<RegionDescriptor> {
        Ok(self.directory.create_region(kind, writable, size)?)
    }

    /// Map the screen region and every plane enabled in the buffer
    /// settings that is not mapped yet.
    pub fn create_buffer_regions(&mut self) -> Result<()> {
        let buffers = self.config.buffers.clone();
        let plane = buffers.plane_size();
        let wanted = [
            (RegionKind::Screen, true, buffers.screen_size),
            (RegionKind::Depth, buffers.depth, plane),
            (RegionKind::Labels, buffers.labels, plane),
            (RegionKind::Automap, buffers.automap, buffers.screen_size),
        ];
        for (kind, enabled, size) in wanted {
            if enabled && !self.directory.is_live(kind) {
                self.directory.create_region(kind, false, size)?;
            }
        }
        Ok(())
    }

    /// Release a region. The game state region lives as long as the
    /// session and is never released here.
    pub fn release_region(&mut self, kind: RegionKind) -> bool {
        if kind == RegionKind::GameState {
            warn!("Refusing to release the game state region of a live session");
            return false;
        }
        self.directory.release_region(kind)
    }

    /// Replace the buffer settings published from the next tick on.
    pub fn set_buffers(&mut self, buffers: BufferSettings) {
        self.config.buffers = buffers;
    }

    /// Compose and publish the snapshot for one tick.
    ///
    /// Never fails; returns the generation published.
    pub fn write_tick(&mut self, input: &TickInput<'_>) -> u32 {
        let ctx = ComposeContext {
            registry: &self.registry,
            armor: self.armor,
            buffers: &self.config.buffers,
            label_order: self.config.label_order,
            regions: self.directory.descriptors(),
        };
        let body = compose_snapshot(&self.previous, input, &ctx);
        let total_size = self.directory.total_size();

        debug!(
            "Tick {}: phase {:?}, players {}, labels {}",
            input.clock.tick, input.clock.phase, body.roster.player_count, body.labels.label_count
        );

        match self.directory.region_mut(RegionKind::GameState) {
            Some(region) => {
                self.generation = publish(region, total_size, &body, self.generation);
            }
            None => error!("Game state region is gone, tick {} not published", input.clock.tick),
        }

        self.previous = body;
        self.generation
    }

    /// Snapshot published by the last tick.
    pub const fn last_snapshot(&self) -> &SnapshotBody {
        &self.previous
    }

    /// Generation published by the last tick.
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Region directory of this session.
    pub const fn directory(&self) -> &RegionDirectory {
        &self.directory
    }

    /// Borrow a region for producers that fill it (screen, depth, ...).
    pub fn region_mut(&mut self, kind: RegionKind) -> Option<&mut MappedRegion> {
        if kind == RegionKind::GameState {
            return None;
        }
        self.directory.region_mut(kind)
    }

    /// Class registry used for inventory lookups.
    pub const fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Configuration this session was started with.
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        info!(
            "Closing session on {} after generation {}",
            self.directory.segment_name(),
            self.generation
        );
    }
}

fn check_capacity(region: &MappedRegion) -> Result<()> {
    let actual = region.as_slice().len() as u64;
    if actual < SNAPSHOT_SIZE as u64 {
        return Err(SessionError::RegionTooSmall {
            kind: region.kind(),
            required: SNAPSHOT_SIZE as u64,
            actual,
        });
    }
    Ok(())
}

/// Write `body` between two generation bumps and return the new, even
/// generation.
fn publish(region: &mut MappedRegion, total_size: u64, body: &SnapshotBody, last: u32) -> u32 {
    let begin = last.wrapping_add(1) | 1;
    let end = begin.wrapping_add(1);

    match region.atomic_u32_mut(GENERATION_OFFSET) {
        Some(generation) => generation.store(begin, Ordering::Relaxed),
        None => {
            error!("Generation counter is not addressable, snapshot not published");
            return last;
        }
    }
    fence(Ordering::Release);

    let bytes = region.as_mut_slice();
    write_total_size(bytes, total_size);
    if let Err(e) = body.encode_into(&mut bytes[HEADER_SIZE..SNAPSHOT_SIZE]) {
        error!("Failed to encode snapshot: {e}");
    }

    if let Some(generation) = region.atomic_u32_mut(GENERATION_OFFSET) {
        generation.store(end, Ordering::Release);
    }
    end
}
