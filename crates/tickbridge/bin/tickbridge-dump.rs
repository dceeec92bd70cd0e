//! tickbridge-dump binary entry point.
//!
//! Attaches to a running session's segment and prints the published
//! snapshot:
//! 1. Parses command-line arguments
//! 2. Initializes logging
//! 3. Attaches a reader
//! 4. Prints once, or every time the generation changes with `--watch`

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tickbridge::layout::LABEL_SENTINEL;
use tickbridge::{
    GamePhase, PublishedSnapshot, RegionKind, SegmentLocation, SessionConfig, SnapshotReader,
};

/// Print the snapshot published by a tickbridge session.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tickbridge-dump",
    about = "Print the game state snapshot published by a tickbridge session",
    version
)]
struct DumpArgs {
    /// Segment name
    #[arg(long, env = "TICKBRIDGE_NAME", required_unless_present = "config")]
    name: Option<String>,

    /// Directory holding a file-backed segment (POSIX shm when omitted)
    #[arg(long, env = "TICKBRIDGE_DIR")]
    dir: Option<PathBuf>,

    /// Session configuration JSON; segment and attempts are taken from it
    #[arg(long, env = "TICKBRIDGE_CONFIG", conflicts_with_all = ["name", "dir"])]
    config: Option<PathBuf>,

    /// Poll interval in milliseconds; prints every new generation
    #[arg(long, env = "TICKBRIDGE_WATCH")]
    watch: Option<u64>,

    /// Read attempts before giving up on a torn snapshot
    #[arg(long, env = "TICKBRIDGE_ATTEMPTS", default_value_t = 64)]
    attempts: u32,

    /// Also print every label entry
    #[arg(long)]
    labels: bool,
}

impl DumpArgs {
    fn attach(&self) -> Result<SnapshotReader> {
        if let Some(path) = &self.config {
            let config = SessionConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?;
            return Ok(SnapshotReader::from_config(&config)?);
        }

        let name = self.name.as_deref().context("--name is required")?;
        let location = self
            .dir
            .clone()
            .map_or(SegmentLocation::Posix, SegmentLocation::Directory);
        SnapshotReader::attach(&location, name, self.attempts)
            .with_context(|| format!("attaching to segment '{name}'"))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = DumpArgs::parse();
    let reader = args.attach()?;
    tracing::info!("Attached to {}", reader.segment_name());

    let Some(interval) = args.watch else {
        let snapshot = reader.read()?;
        print_snapshot(&reader, &snapshot, args.labels);
        return Ok(());
    };

    let interval = Duration::from_millis(interval.max(1));
    let mut last = None;
    loop {
        let generation = reader.generation()?;
        if last != Some(generation) && generation % 2 == 0 {
            match reader.read() {
                Ok(snapshot) => {
                    last = Some(snapshot.header.generation);
                    print_snapshot(&reader, &snapshot, args.labels);
                }
                Err(e) => tracing::warn!("{e}"),
            }
        }
        std::thread::sleep(interval);
    }
}

fn flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn print_snapshot(reader: &SnapshotReader, snapshot: &PublishedSnapshot, show_labels: bool) {
    let header = &snapshot.header;
    let body = &snapshot.body;
    let geometry = &body.geometry;
    let clock = &body.clock;
    let player = &body.player;

    println!("Segment: {}", reader.segment_name());
    println!(
        "  Version:     {} ('{}')",
        header.version,
        header.version_string()
    );
    println!("  Generation:  {}", header.generation);
    println!("  Total size:  {} bytes", header.total_size);

    println!("  --- Buffers ---");
    println!(
        "    Screen:  {}x{} pitch {} size {} format {}",
        geometry.screen_width,
        geometry.screen_height,
        geometry.screen_pitch,
        geometry.screen_size,
        geometry.screen_format
    );
    println!(
        "    Depth: {}  Labels: {}  Automap: {}",
        flag(geometry.depth_buffer),
        flag(geometry.labels),
        flag(geometry.automap)
    );
    println!("    Regions: {} live", geometry.region_count);
    for kind in RegionKind::ALL {
        let entry = &geometry.regions[kind.index()];
        if entry.size == 0 {
            continue;
        }
        let mapped = if reader.region_bytes(snapshot, kind).is_some() {
            ""
        } else {
            " (not mapped, reattach)"
        };
        println!(
            "      {:<10} offset={:#010x} size={:<10} writable={}{mapped}",
            kind.name(),
            entry.offset,
            entry.size,
            flag(entry.writable)
        );
    }

    println!("  --- Clock ---");
    let phase = GamePhase::from_code(clock.game_state)
        .map_or_else(|| format!("unknown ({})", clock.game_state), |p| format!("{p:?}"));
    println!("    Tick {}  phase {}  action {}", clock.tick, phase, clock.game_action);
    println!(
        "    Map tick {} (started at {})  seed {}",
        clock.map_tick, clock.map_start_tick, clock.static_seed
    );
    println!(
        "    Net: {}  Multiplayer: {}  Recording: {}  Playback: {}",
        flag(clock.netgame),
        flag(clock.multiplayer),
        flag(clock.demo_recording),
        flag(clock.demo_playback)
    );

    println!("  --- Map ---");
    println!(
        "    Kills {}  Items {}  Secrets {}  Reward {}  End: {}",
        body.map.kill_count,
        body.map.item_count,
        body.map.secret_count,
        body.map.reward,
        flag(body.map.map_end)
    );
    let set_vars: Vec<_> = body
        .map
        .user_vars
        .iter()
        .enumerate()
        .filter(|(_, v)| **v != 0)
        .map(|(i, v)| format!("{}={v}", i + 1))
        .collect();
    if !set_vars.is_empty() {
        println!("    User vars: {}", set_vars.join(" "));
    }

    println!("  --- Player {} '{}' ---", player.number, player.name_str());
    println!(
        "    Actor: {}  Dead: {}  Respawn: {}  Deaths: {}",
        flag(player.has_actor),
        flag(player.dead),
        flag(player.ready_to_respawn),
        player.death_count
    );
    println!(
        "    Health {}  Armor {}  Weapon slot {}  Ammo {}",
        player.health, player.armor, player.selected_weapon, player.selected_weapon_ammo
    );
    println!("    Slot ammo:    {:?}", player.ammo);
    println!("    Slot weapons: {:?}", player.weapons);

    println!("  --- Roster ({} in game) ---", body.roster.player_count);
    for (i, slot) in body.roster.slots.iter().enumerate() {
        if slot.in_game {
            println!("    {i:>2}: {:<20} frags={}", slot.name_str(), slot.frag_count);
        }
    }

    println!("  --- Labels ({}) ---", body.labels.label_count);
    if show_labels {
        for entry in body.labels.active() {
            let marker = if entry.value == LABEL_SENTINEL { " (last)" } else { "" };
            println!(
                "    {:>3} object={:<8} {}{marker}",
                entry.value,
                entry.object_id,
                entry.object_name_str()
            );
        }
    }
    println!();
}
