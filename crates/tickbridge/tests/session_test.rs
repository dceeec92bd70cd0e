//! End-to-end tests: a writing session and a reader attached to the same
//! file-backed segment.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tickbridge::layout::{HEADER_SIZE, SNAPSHOT_SIZE};
use tickbridge::{
    Actor, BufferSettings, ClassRegistry, Clock, GamePhase, Inventory, LabelOrder, LabeledSprite,
    Level, Player, RegionDescriptor, RegionKind, SegmentLocation, Session, SessionConfig,
    SessionError, SnapshotReader, TickInput,
};
use tickbridge_shmem::ShmemError;

fn file_config(dir: &TempDir, name: &str) -> SessionConfig {
    SessionConfig::new(name).with_location(SegmentLocation::Directory(dir.path().to_path_buf()))
}

fn attach(dir: &TempDir, name: &str) -> SnapshotReader {
    SnapshotReader::attach(
        &SegmentLocation::Directory(dir.path().to_path_buf()),
        name,
        8,
    )
    .expect("attach reader")
}

#[test]
fn fresh_session_publishes_game_state_region() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::start(file_config(&dir, "fresh"), ClassRegistry::doom()).unwrap();

    let players = [Player::new("player1").with_actor(Actor::new(100))];
    let generation = session.write_tick(&TickInput {
        players: &players,
        ..TickInput::default()
    });
    assert_eq!(generation, 2);

    let reader = attach(&dir, "fresh");
    let snapshot = reader.read().unwrap();
    let geometry = &snapshot.body.geometry;

    assert_eq!(geometry.region_count, 1);
    assert_eq!(geometry.regions[0].offset, 0);
    assert_eq!(geometry.regions[0].size, SNAPSHOT_SIZE as u64);
    assert!(!geometry.regions[0].writable);
    assert_eq!(snapshot.header.generation, 2);
    assert_eq!(snapshot.header.total_size, SNAPSHOT_SIZE as u64);
    assert_eq!(snapshot.header.version_string(), env!("CARGO_PKG_VERSION"));

    let player = &snapshot.body.player;
    assert_eq!(player.health, 100);
    assert!(player.has_actor);
    assert!(!player.dead);
}

#[test]
fn region_table_is_stable_for_session_lifetime() {
    let dir = tempfile::tempdir().unwrap();
    let buffers = BufferSettings::rgb24(160, 120).with_depth(true);
    let config = file_config(&dir, "stable").with_buffers(buffers);
    let mut session = Session::start(config, ClassRegistry::doom()).unwrap();

    let input = session
        .create_region(RegionKind::Input, true, 256)
        .unwrap();
    session.create_buffer_regions().unwrap();
    let created: Vec<(RegionKind, RegionDescriptor)> = RegionKind::ALL
        .into_iter()
        .filter_map(|kind| session.directory().descriptor(kind).map(|d| (kind, d)))
        .collect();
    assert_eq!(created.len(), 4);
    assert!(input.writable);

    for tick in 0..5 {
        session.write_tick(&TickInput {
            clock: Clock {
                tick,
                ..Clock::default()
            },
            ..TickInput::default()
        });

        let snapshot = attach(&dir, "stable").read().unwrap();
        for (kind, desc) in &created {
            let entry = snapshot.body.geometry.regions[kind.index()];
            assert_eq!(entry.offset, desc.offset, "{kind} offset");
            assert_eq!(entry.size, desc.size, "{kind} size");
            assert_eq!(entry.writable, desc.writable, "{kind} writable");
        }
        assert_eq!(snapshot.body.geometry.region_count, 4);
        assert!(snapshot.body.geometry.depth_buffer);
        assert!(!snapshot.body.geometry.labels);
        assert_eq!(snapshot.header.total_size, session.directory().total_size());
    }
}

#[test]
fn released_region_publishes_zeros() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::start(file_config(&dir, "release"), ClassRegistry::doom()).unwrap();
    session.create_region(RegionKind::Audio, false, 1024).unwrap();

    assert!(session.release_region(RegionKind::Audio));
    assert!(!session.release_region(RegionKind::Audio));
    assert!(!session.release_region(RegionKind::Depth));
    assert!(!session.release_region(RegionKind::GameState));

    session.write_tick(&TickInput::default());
    let snapshot = attach(&dir, "release").read().unwrap();
    let entry = snapshot.body.geometry.regions[RegionKind::Audio.index()];
    assert_eq!(entry.offset, 0);
    assert_eq!(entry.size, 0);
    assert!(!entry.writable);
    assert_eq!(snapshot.body.geometry.region_count, 1);
}

#[test]
fn stale_segment_name_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("stale"), b"left over").unwrap();

    let err = Session::start(file_config(&dir, "stale"), ClassRegistry::doom()).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Shmem(ShmemError::SegmentExists { .. })
    ));
}

#[test]
fn second_session_with_same_name_fails_until_first_ends() {
    let dir = tempfile::tempdir().unwrap();
    let first = Session::start(file_config(&dir, "twice"), ClassRegistry::doom()).unwrap();
    assert!(Session::start(file_config(&dir, "twice"), ClassRegistry::doom()).is_err());

    drop(first);
    assert!(!dir.path().join("twice").exists());
    assert!(Session::start(file_config(&dir, "twice"), ClassRegistry::doom()).is_ok());
}

#[test]
fn death_counter_across_ticks() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::start(file_config(&dir, "deaths"), ClassRegistry::doom()).unwrap();
    let reader = attach(&dir, "deaths");

    let healths = [100, 50, 0, 0, 0, 100, 0];
    let expected = [0, 0, 1, 1, 1, 1, 2];
    for (health, expected) in healths.into_iter().zip(expected) {
        let players = [Player::new("p").with_actor(Actor::new(health))];
        session.write_tick(&TickInput {
            players: &players,
            ..TickInput::default()
        });
        assert_eq!(reader.read().unwrap().body.player.death_count, expected);
    }

    // map end resets
    let players = [Player::new("p").with_actor(Actor::new(0))];
    session.write_tick(&TickInput {
        clock: Clock {
            phase: GamePhase::Intermission,
            ..Clock::default()
        },
        players: &players,
        ..TickInput::default()
    });
    let snapshot = reader.read().unwrap();
    assert!(snapshot.body.map.map_end);
    assert_eq!(snapshot.body.player.death_count, 0);
}

#[test]
fn full_tick_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir, "full")
        .with_buffers(BufferSettings::rgb24(64, 48).with_labels(true))
        .with_label_order(LabelOrder::ValueAscending);
    let registry = ClassRegistry::doom();
    let id = |name: &str| registry.id(name).unwrap();

    let inventory = Inventory::new()
        .with(id("Shotgun"), 1)
        .with(id("Shell"), 12)
        .with(id("BasicArmor"), 100);
    let mut me = Player::new("marine")
        .with_actor(Actor {
            health: 75,
            inventory,
        })
        .with_slots(registry.default_slots().clone());
    me.ready_weapon = Some(id("Shotgun"));
    me.frag_count = 3;
    me.on_ground = true;

    let other = Player {
        frag_count: 1,
        ..Player::new("rival")
    };
    let players = [other, me];
    let globals: Vec<i32> = std::iter::once(9).chain(1..=60).collect();
    let sprites = [
        LabeledSprite::new(101, "Imp", 3),
        LabeledSprite::new(102, "DoomImp", 1),
        LabeledSprite::unlabeled(103, "Clip", 2),
    ];

    let mut session = Session::start(config, registry.clone()).unwrap();
    session.create_buffer_regions().unwrap();
    session.write_tick(&TickInput {
        clock: Clock {
            tick: 1000,
            multiplayer: true,
            ..Clock::default()
        },
        level: Level {
            start_tick: 10,
            map_tick: 990,
            killed: 7,
            items: 2,
            secrets: 1,
            globals: &globals,
        },
        players: &players,
        console_player: 1,
        labels: Some(sprites.as_slice()),
    });

    let reader = attach(&dir, "full");
    let snapshot = reader.read().unwrap();
    let body = &snapshot.body;

    assert_eq!(body, session.last_snapshot());
    assert_eq!(body.clock.tick, 1000);
    assert_eq!(body.map.reward, 9);
    assert_eq!(body.map.user_vars[59], 60);
    assert_eq!(body.map.kill_count, 7);

    assert_eq!(body.player.number, 1);
    assert_eq!(body.player.name_str(), "marine");
    assert_eq!(body.player.health, 75);
    assert_eq!(body.player.armor, 100);
    assert_eq!(body.player.selected_weapon, 3);
    assert_eq!(body.player.selected_weapon_ammo, 12);
    assert_eq!(body.player.ammo[3], 12);
    assert_eq!(body.player.weapons[3], 1);
    assert!(body.player.on_ground);

    assert_eq!(body.roster.player_count, 2);
    assert_eq!(body.roster.slots[0].name_str(), "rival");
    assert_eq!(body.roster.slots[1].frag_count, 3);

    assert!(body.geometry.labels);
    let labels: Vec<(u32, u8)> = body
        .labels
        .active()
        .iter()
        .map(|e| (e.object_id, e.value))
        .collect();
    assert_eq!(labels, vec![(102, 1), (101, 3)]);

    let screen = reader.region_bytes(&snapshot, RegionKind::Screen).unwrap();
    assert_eq!(screen.len(), 64 * 3 * 48);
    assert!(reader.region_bytes(&snapshot, RegionKind::Depth).is_none());
}

#[test]
fn producer_writes_are_visible_to_reader() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::start(file_config(&dir, "pixels"), ClassRegistry::doom()).unwrap();
    session.create_buffer_regions().unwrap();

    let screen = session.region_mut(RegionKind::Screen).unwrap();
    screen.as_mut_slice()[..3].copy_from_slice(&[255, 128, 0]);
    assert!(session.region_mut(RegionKind::GameState).is_none());
    session.write_tick(&TickInput::default());

    let reader = attach(&dir, "pixels");
    let snapshot = reader.read().unwrap();
    let pixels = reader.region_bytes(&snapshot, RegionKind::Screen).unwrap();
    assert_eq!(&pixels[..3], &[255, 128, 0]);
}

#[test]
fn reader_rejects_other_protocol_version() {
    let dir = tempfile::tempdir().unwrap();
    let _session = Session::start(file_config(&dir, "version"), ClassRegistry::doom()).unwrap();

    // A second process with a different protocol would see this word change.
    let path = dir.path().join("version");
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] = 0xEE;
    let copy = dir.path().join("version_copy");
    std::fs::write(&copy, &bytes).unwrap();

    let err = SnapshotReader::attach(
        &SegmentLocation::Directory(dir.path().to_path_buf()),
        "version_copy",
        4,
    )
    .unwrap_err();
    assert!(matches!(err, SessionError::IncompatibleVersion { .. }));
}

#[test]
fn reader_sees_latest_generation() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::start(file_config(&dir, "latest"), ClassRegistry::doom()).unwrap();
    let reader = attach(&dir, "latest");
    assert_eq!(reader.generation().unwrap(), 0);

    for tick in 1..=10u32 {
        let generation = session.write_tick(&TickInput {
            clock: Clock {
                tick,
                ..Clock::default()
            },
            ..TickInput::default()
        });
        let snapshot = reader.read().unwrap();
        assert_eq!(snapshot.header.generation, generation);
        assert_eq!(snapshot.body.clock.tick, tick);
        assert_eq!(generation, tick * 2);
    }
}

#[test]
fn header_is_written_at_start() {
    let dir = tempfile::tempdir().unwrap();
    let _session = Session::start(file_config(&dir, "header"), ClassRegistry::doom()).unwrap();

    let bytes = std::fs::read(dir.path().join("header")).unwrap();
    assert_eq!(bytes.len(), SNAPSHOT_SIZE);
    assert_eq!(&bytes[0..4], &tickbridge::PROTOCOL_VERSION.to_le_bytes());
    assert_eq!(&bytes[0x14..HEADER_SIZE], &[0, 0, 0, 0]);
}
