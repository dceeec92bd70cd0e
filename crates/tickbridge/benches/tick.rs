//! Per-tick cost of composing and publishing a snapshot.
//!
//! Run with:
//! ```bash
//! cargo bench --bench tick
//! ```

#![allow(clippy::expect_used)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tickbridge::{
    Actor, BufferSettings, ClassRegistry, Clock, ComposeContext, Inventory, LabelOrder,
    LabeledSprite, Level, Player, RegionDescriptor, SegmentLocation, Session, SessionConfig,
    SnapshotBody, SnapshotReader, TickInput, compose_snapshot,
};

fn players(registry: &ClassRegistry) -> Vec<Player> {
    let id = |name: &str| registry.id(name).expect("class registered");
    (0..16)
        .map(|i| {
            let inventory = Inventory::new()
                .with(id("Pistol"), 1)
                .with(id("Shotgun"), 1)
                .with(id("Clip"), 50 + i)
                .with(id("Shell"), 8)
                .with(id("BasicArmor"), 25);
            let mut player = Player::new(&format!("player{i}"))
                .with_actor(Actor {
                    health: 100 - i,
                    inventory,
                })
                .with_slots(registry.default_slots().clone());
            player.ready_weapon = Some(id("Shotgun"));
            player.frag_count = i;
            player
        })
        .collect()
}

fn sprites(count: u32) -> Vec<LabeledSprite> {
    (0..count)
        .map(|i| LabeledSprite::new(i, "DoomImp", (i * 7 % 254) as u8 + 1))
        .collect()
}

fn bench_compose(c: &mut Criterion) {
    let registry = ClassRegistry::doom();
    let players = players(&registry);
    let globals = vec![3; 64];
    let buffers = BufferSettings::default().with_labels(true);
    let previous = SnapshotBody::default();

    let mut group = c.benchmark_group("compose_snapshot");
    for count in [0u32, 64, 300] {
        let sprites = sprites(count);
        for order in [LabelOrder::Provider, LabelOrder::ValueAscending] {
            let ctx = ComposeContext {
                registry: &registry,
                armor: registry.id("BasicArmor"),
                buffers: &buffers,
                label_order: order,
                regions: [RegionDescriptor::default(); 7],
            };
            let input = TickInput {
                clock: Clock::default(),
                level: Level {
                    globals: &globals,
                    ..Level::default()
                },
                players: &players,
                console_player: 3,
                labels: Some(sprites.as_slice()),
            };
            group.bench_with_input(
                BenchmarkId::new(format!("{order:?}"), count),
                &input,
                |b, input| b.iter(|| compose_snapshot(black_box(&previous), input, &ctx)),
            );
        }
    }
    group.finish();
}

fn bench_publish(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = SessionConfig::new("bench")
        .with_location(SegmentLocation::Directory(dir.path().to_path_buf()));
    let registry = ClassRegistry::doom();
    let players = players(&registry);
    let sprites = sprites(300);
    let mut session = Session::start(config, registry).expect("start session");

    let mut tick = 0;
    c.bench_function("write_tick", |b| {
        b.iter(|| {
            tick += 1;
            let input = TickInput {
                clock: Clock {
                    tick,
                    ..Clock::default()
                },
                players: &players,
                labels: Some(sprites.as_slice()),
                ..TickInput::default()
            };
            black_box(session.write_tick(&input))
        });
    });

    let reader = SnapshotReader::attach(
        &SegmentLocation::Directory(dir.path().to_path_buf()),
        "bench",
        64,
    )
    .expect("attach reader");
    c.bench_function("read_snapshot", |b| {
        b.iter(|| black_box(reader.read().expect("read")));
    });
}

criterion_group!(benches, bench_compose, bench_publish);
criterion_main!(benches);
