//! Game state snapshot layout.
//!
//! The snapshot occupies the start of the game state region. All fields are
//! little-endian and packed with no padding.
//!
//! Header (hand-encoded, 24 bytes):
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00 | 4 | Protocol version |
//! | 0x04 | 8 | Version string (NUL padded) |
//! | 0x0C | 8 | Total segment size |
//! | 0x14 | 4 | Generation counter (odd while a write is in progress) |
//!
//! Body (binrw, 36874 bytes), in order:
//!
//! | Block | Size |
//! |-------|------|
//! | [`BufferGeometry`] | 150 |
//! | [`SimClock`] | 29 |
//! | [`MapProgress`] | 257 |
//! | [`PlayerState`] | 254 |
//! | [`Roster`] | 2132 |
//! | [`LabelList`] | 34052 |

use std::io::Cursor;

use binrw::{BinRead, BinResult, BinWrite};
use tickbridge_shmem::{REGION_COUNT, RegionDescriptor};

/// Snapshot protocol version. Bumped whenever the layout changes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Length of the version string field.
pub const VERSION_STR_LEN: usize = 8;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 0x18;

/// Offset of the protocol version.
pub const VERSION_OFFSET: usize = 0x00;

/// Offset of the version string.
pub const VERSION_STR_OFFSET: usize = 0x04;

/// Offset of the total segment size.
pub const TOTAL_SIZE_OFFSET: usize = 0x0C;

/// Offset of the generation counter.
pub const GENERATION_OFFSET: usize = 0x14;

/// Roster capacity.
pub const MAX_PLAYERS: usize = 16;

/// Label list capacity.
pub const MAX_LABELS: usize = 256;

/// Label value that ends the label list.
pub const LABEL_SENTINEL: u8 = (MAX_LABELS - 1) as u8;

/// Byte capacity of player and object names.
pub const NAME_LEN: usize = 128;

/// Number of user variables published per map.
pub const USER_VAR_COUNT: usize = 60;

/// Number of weapon slots.
pub const SLOT_COUNT: usize = 10;

/// Encoded size of one [`RegionEntry`].
pub const REGION_ENTRY_SIZE: usize = 17;

/// Encoded size of [`BufferGeometry`].
pub const GEOMETRY_SIZE: usize = 4 * 3 + 8 + 4 + 3 + 4 + REGION_COUNT * REGION_ENTRY_SIZE;

/// Encoded size of [`SimClock`].
pub const CLOCK_SIZE: usize = 4 * 4 + 5 + 4 * 2;

/// Encoded size of [`MapProgress`].
pub const MAP_SIZE: usize = 4 * 3 + 4 * USER_VAR_COUNT + 4 + 1;

/// Encoded size of [`PlayerState`].
pub const PLAYER_SIZE: usize = 4 + 3 + 4 + NAME_LEN + 4 * 4 + 3 + 4 * 4 + 4 * SLOT_COUNT * 2;

/// Encoded size of one [`RosterSlot`].
pub const ROSTER_SLOT_SIZE: usize = 1 + NAME_LEN + 4;

/// Encoded size of [`Roster`].
pub const ROSTER_SIZE: usize = 4 + MAX_PLAYERS * ROSTER_SLOT_SIZE;

/// Encoded size of one [`LabelEntry`].
pub const LABEL_ENTRY_SIZE: usize = 4 + NAME_LEN + 1;

/// Encoded size of [`LabelList`].
pub const LABELS_SIZE: usize = MAX_LABELS * LABEL_ENTRY_SIZE + 4;

/// Encoded size of [`SnapshotBody`].
pub const BODY_SIZE: usize =
    GEOMETRY_SIZE + CLOCK_SIZE + MAP_SIZE + PLAYER_SIZE + ROSTER_SIZE + LABELS_SIZE;

/// Bytes the game state region must hold.
pub const SNAPSHOT_SIZE: usize = HEADER_SIZE + BODY_SIZE;

#[allow(clippy::trivially_copy_pass_by_ref)]
fn to_flag(flag: &bool) -> u8 {
    u8::from(*flag)
}

fn from_flag(byte: u8) -> bool {
    byte != 0
}

/// Copy `s` into a zero padded array, cut at the last UTF-8 character
/// boundary that fits.
pub fn fixed_str<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let mut end = s.len().min(N);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    out[..end].copy_from_slice(&s.as_bytes()[..end]);
    out
}

/// Text of a fixed field up to the first NUL.
pub fn str_from_fixed(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Snapshot header.
///
/// Version fields are written once per session. The total size is refreshed
/// every tick. The generation word is only touched atomically by the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Protocol version
    pub version: u32,
    /// Version string, NUL padded
    pub version_str: [u8; VERSION_STR_LEN],
    /// Size of the whole shared segment
    pub total_size: u64,
    /// Generation counter
    pub generation: u32,
}

impl SnapshotHeader {
    /// Header for this build of the protocol.
    pub fn current(total_size: u64) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            version_str: fixed_str(env!("CARGO_PKG_VERSION")),
            total_size,
            generation: 0,
        }
    }

    /// Parse from mapped memory. Returns `None` if `data` is too short.
    pub fn from_mapped(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_SIZE {
            return None;
        }

        let version = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let mut version_str = [0u8; VERSION_STR_LEN];
        version_str.copy_from_slice(&data[VERSION_STR_OFFSET..TOTAL_SIZE_OFFSET]);
        let total_size = u64::from_le_bytes([
            data[12], data[13], data[14], data[15], data[16], data[17], data[18], data[19],
        ]);
        let generation = u32::from_le_bytes([data[20], data[21], data[22], data[23]]);

        Some(Self {
            version,
            version_str,
            total_size,
            generation,
        })
    }

    /// Write every header field into mapped memory.
    ///
    /// Only valid while no reader can observe the region (session start).
    pub fn to_mapped(&self, data: &mut [u8]) {
        if data.len() < HEADER_SIZE {
            return;
        }
        data[VERSION_OFFSET..VERSION_STR_OFFSET].copy_from_slice(&self.version.to_le_bytes());
        data[VERSION_STR_OFFSET..TOTAL_SIZE_OFFSET].copy_from_slice(&self.version_str);
        write_total_size(data, self.total_size);
        data[GENERATION_OFFSET..HEADER_SIZE].copy_from_slice(&self.generation.to_le_bytes());
    }

    /// Version string as text.
    pub fn version_string(&self) -> String {
        str_from_fixed(&self.version_str)
    }

    /// True while the writer is in the middle of a tick.
    pub const fn is_writing(&self) -> bool {
        self.generation % 2 == 1
    }
}

/// Overwrite only the total size field.
pub fn write_total_size(data: &mut [u8], total_size: u64) {
    if data.len() >= GENERATION_OFFSET {
        data[TOTAL_SIZE_OFFSET..GENERATION_OFFSET].copy_from_slice(&total_size.to_le_bytes());
    }
}

/// One published region directory entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct RegionEntry {
    /// Offset inside the segment
    pub offset: u64,
    /// Size in bytes
    pub size: u64,
    /// Whether the reader may write the region
    #[br(map = from_flag)]
    #[bw(map = to_flag)]
    pub writable: bool,
}

impl From<RegionDescriptor> for RegionEntry {
    fn from(desc: RegionDescriptor) -> Self {
        Self {
            offset: desc.offset,
            size: desc.size,
            writable: desc.writable,
        }
    }
}

/// Screen geometry, buffer flags and the region directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct BufferGeometry {
    /// Screen width in pixels
    pub screen_width: u32,
    /// Screen height in pixels
    pub screen_height: u32,
    /// Bytes per screen row
    pub screen_pitch: u32,
    /// Screen buffer size in bytes
    pub screen_size: u64,
    /// Pixel format code
    pub screen_format: u32,
    /// Depth buffer published
    #[br(map = from_flag)]
    #[bw(map = to_flag)]
    pub depth_buffer: bool,
    /// Label buffer published
    #[br(map = from_flag)]
    #[bw(map = to_flag)]
    pub labels: bool,
    /// Automap buffer published
    #[br(map = from_flag)]
    #[bw(map = to_flag)]
    pub automap: bool,
    /// Number of live regions
    pub region_count: u32,
    /// Region table indexed by region kind
    pub regions: [RegionEntry; REGION_COUNT],
}

/// Simulation clock and session flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct SimClock {
    /// Global tick counter
    pub tick: u32,
    /// Game phase code
    pub game_state: u32,
    /// Pending game action code
    pub game_action: u32,
    /// Static RNG seed
    pub static_seed: u32,
    /// Tracked player controls game settings
    #[br(map = from_flag)]
    #[bw(map = to_flag)]
    pub settings_controller: bool,
    /// Networked game
    #[br(map = from_flag)]
    #[bw(map = to_flag)]
    pub netgame: bool,
    /// Multiplayer game
    #[br(map = from_flag)]
    #[bw(map = to_flag)]
    pub multiplayer: bool,
    /// Demo being recorded
    #[br(map = from_flag)]
    #[bw(map = to_flag)]
    pub demo_recording: bool,
    /// Demo being played back
    #[br(map = from_flag)]
    #[bw(map = to_flag)]
    pub demo_playback: bool,
    /// Tick the map started at
    pub map_start_tick: u32,
    /// Ticks spent on the current map
    pub map_tick: u32,
}

/// Map counters and user variables.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct MapProgress {
    /// Monsters killed
    pub kill_count: i32,
    /// Items picked up
    pub item_count: i32,
    /// Secrets found
    pub secret_count: i32,
    /// Script user variables 1..=60
    pub user_vars: [i32; USER_VAR_COUNT],
    /// Script reward (global variable 0)
    pub reward: i32,
    /// Outside the level phase
    #[br(map = from_flag)]
    #[bw(map = to_flag)]
    pub map_end: bool,
}

impl Default for MapProgress {
    fn default() -> Self {
        Self {
            kill_count: 0,
            item_count: 0,
            secret_count: 0,
            user_vars: [0; USER_VAR_COUNT],
            reward: 0,
            map_end: false,
        }
    }
}

/// State of the tracked player.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct PlayerState {
    /// Player index
    pub number: u32,
    /// A controlled actor exists
    #[br(map = from_flag)]
    #[bw(map = to_flag)]
    pub has_actor: bool,
    /// Player is dead
    #[br(map = from_flag)]
    #[bw(map = to_flag)]
    pub dead: bool,
    /// Player is waiting to respawn
    #[br(map = from_flag)]
    #[bw(map = to_flag)]
    pub ready_to_respawn: bool,
    /// Deaths on the current map
    pub death_count: u32,
    /// Player name, NUL padded
    pub name: [u8; NAME_LEN],
    /// Monsters killed
    pub kill_count: i32,
    /// Items picked up
    pub item_count: i32,
    /// Secrets found
    pub secret_count: i32,
    /// Frags
    pub frag_count: i32,
    /// Primary attack available
    #[br(map = from_flag)]
    #[bw(map = to_flag)]
    pub attack_ready: bool,
    /// Secondary attack available
    #[br(map = from_flag)]
    #[bw(map = to_flag)]
    pub alt_attack_ready: bool,
    /// Standing on the ground
    #[br(map = from_flag)]
    #[bw(map = to_flag)]
    pub on_ground: bool,
    /// Health
    pub health: i32,
    /// Armor amount
    pub armor: i32,
    /// Slot of the ready weapon, or -1
    pub selected_weapon: i32,
    /// Ammo of the ready weapon, or -1
    pub selected_weapon_ammo: i32,
    /// Ammo of the first weapon in each slot
    pub ammo: [i32; SLOT_COUNT],
    /// Weapons held in each slot
    pub weapons: [i32; SLOT_COUNT],
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            number: 0,
            has_actor: false,
            dead: false,
            ready_to_respawn: false,
            death_count: 0,
            name: [0; NAME_LEN],
            kill_count: 0,
            item_count: 0,
            secret_count: 0,
            frag_count: 0,
            attack_ready: false,
            alt_attack_ready: false,
            on_ground: false,
            health: 0,
            armor: 0,
            selected_weapon: -1,
            selected_weapon_ammo: -1,
            ammo: [0; SLOT_COUNT],
            weapons: [0; SLOT_COUNT],
        }
    }
}

impl PlayerState {
    /// Player name as text.
    pub fn name_str(&self) -> String {
        str_from_fixed(&self.name)
    }
}

/// One multiplayer roster slot.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct RosterSlot {
    /// Slot is occupied
    #[br(map = from_flag)]
    #[bw(map = to_flag)]
    pub in_game: bool,
    /// Player name, NUL padded
    pub name: [u8; NAME_LEN],
    /// Frags (0 for absent players)
    pub frag_count: i32,
}

impl Default for RosterSlot {
    fn default() -> Self {
        Self {
            in_game: false,
            name: [0; NAME_LEN],
            frag_count: 0,
        }
    }
}

impl RosterSlot {
    /// Player name as text.
    pub fn name_str(&self) -> String {
        str_from_fixed(&self.name)
    }
}

/// Multiplayer roster.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct Roster {
    /// Number of slots with `in_game` set
    pub player_count: u32,
    /// Slots indexed by player number
    pub slots: [RosterSlot; MAX_PLAYERS],
}

impl Default for Roster {
    fn default() -> Self {
        Self {
            player_count: 0,
            slots: std::array::from_fn(|_| RosterSlot::default()),
        }
    }
}

/// One labeled object.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct LabelEntry {
    /// Object id assigned by the labeling subsystem
    pub object_id: u32,
    /// Class name, NUL padded
    pub object_name: [u8; NAME_LEN],
    /// Label value written into the label buffer
    pub value: u8,
}

impl Default for LabelEntry {
    fn default() -> Self {
        Self {
            object_id: 0,
            object_name: [0; NAME_LEN],
            value: 0,
        }
    }
}

impl LabelEntry {
    /// Class name as text.
    pub fn object_name_str(&self) -> String {
        str_from_fixed(&self.object_name)
    }
}

/// Label list with a trailing count.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct LabelList {
    /// Entry storage; only the first `label_count` entries are meaningful
    pub entries: [LabelEntry; MAX_LABELS],
    /// Number of entries written this tick
    pub label_count: u32,
}

impl Default for LabelList {
    fn default() -> Self {
        Self {
            entries: std::array::from_fn(|_| LabelEntry::default()),
            label_count: 0,
        }
    }
}

impl LabelList {
    /// The entries written this tick.
    pub fn active(&self) -> &[LabelEntry] {
        let count = (self.label_count as usize).min(MAX_LABELS);
        &self.entries[..count]
    }
}

/// Everything after the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct SnapshotBody {
    /// Buffer geometry and region table
    pub geometry: BufferGeometry,
    /// Simulation clock
    pub clock: SimClock,
    /// Map progress
    pub map: MapProgress,
    /// Tracked player
    pub player: PlayerState,
    /// Multiplayer roster
    pub roster: Roster,
    /// Labeled objects
    pub labels: LabelList,
}

impl SnapshotBody {
    /// Encode into `out`, which must hold at least [`BODY_SIZE`] bytes.
    pub fn encode_into(&self, out: &mut [u8]) -> BinResult<()> {
        let mut cursor = Cursor::new(out);
        self.write(&mut cursor)
    }

    /// Encode into a new buffer.
    pub fn to_bytes(&self) -> BinResult<Vec<u8>> {
        let mut out = vec![0u8; BODY_SIZE];
        self.encode_into(&mut out)?;
        Ok(out)
    }

    /// Decode from the bytes following the header.
    pub fn decode(data: &[u8]) -> BinResult<Self> {
        Self::read(&mut Cursor::new(data))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use binrw::BinWriterExt;
    use proptest::prelude::*;

    fn encoded_len<T>(value: &T) -> usize
    where
        T: for<'a> BinWrite<Args<'a> = ()>,
    {
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_le(value).expect("encode");
        cursor.into_inner().len()
    }

    #[test]
    fn test_block_sizes() {
        assert_eq!(encoded_len(&RegionEntry::default()), REGION_ENTRY_SIZE);
        assert_eq!(encoded_len(&BufferGeometry::default()), GEOMETRY_SIZE);
        assert_eq!(GEOMETRY_SIZE, 150);
        assert_eq!(encoded_len(&SimClock::default()), CLOCK_SIZE);
        assert_eq!(CLOCK_SIZE, 29);
        assert_eq!(encoded_len(&MapProgress::default()), MAP_SIZE);
        assert_eq!(MAP_SIZE, 257);
        assert_eq!(encoded_len(&PlayerState::default()), PLAYER_SIZE);
        assert_eq!(PLAYER_SIZE, 254);
        assert_eq!(encoded_len(&Roster::default()), ROSTER_SIZE);
        assert_eq!(ROSTER_SIZE, 2132);
        assert_eq!(encoded_len(&LabelList::default()), LABELS_SIZE);
        assert_eq!(LABELS_SIZE, 34052);
        assert_eq!(encoded_len(&SnapshotBody::default()), BODY_SIZE);
        assert_eq!(SNAPSHOT_SIZE, 36898);
    }

    #[test]
    fn test_header_offsets() {
        let header = SnapshotHeader {
            version: 0x0102_0304,
            version_str: fixed_str("1.2.3"),
            total_size: 0x1122_3344_5566_7788,
            generation: 9,
        };
        let mut data = [0u8; HEADER_SIZE];
        header.to_mapped(&mut data);

        assert_eq!(&data[0..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&data[4..9], b"1.2.3");
        assert_eq!(data[0x0C], 0x88);
        assert_eq!(data[0x13], 0x11);
        assert_eq!(data[0x14], 9);

        let parsed = SnapshotHeader::from_mapped(&data).expect("header");
        assert_eq!(parsed, header);
        assert_eq!(parsed.version_string(), "1.2.3");
        assert!(parsed.is_writing());
        assert!(SnapshotHeader::from_mapped(&data[..10]).is_none());
    }

    #[test]
    fn test_current_header() {
        let header = SnapshotHeader::current(4096);
        assert_eq!(header.version, PROTOCOL_VERSION);
        assert_eq!(header.version_string(), env!("CARGO_PKG_VERSION"));
        assert_eq!(header.generation, 0);
    }

    #[test]
    fn test_fixed_str_truncates_on_char_boundary() {
        let out: [u8; 4] = fixed_str("abcdef");
        assert_eq!(&out, b"abcd");

        // 'é' is two bytes; it must not be split
        let out: [u8; 4] = fixed_str("abcé");
        assert_eq!(&out, b"abc\0");
        assert_eq!(str_from_fixed(&out), "abc");

        let out: [u8; 8] = fixed_str("");
        assert_eq!(out, [0; 8]);
    }

    #[test]
    fn test_region_entry_layout() {
        let entry = RegionEntry {
            offset: 4096,
            size: 64,
            writable: true,
        };
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_le(&entry).expect("encode");
        let bytes = cursor.into_inner();
        assert_eq!(&bytes[0..8], &4096u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &64u64.to_le_bytes());
        assert_eq!(bytes[16], 1);
    }

    #[test]
    fn test_body_decode_matches_encode() {
        let mut body = SnapshotBody::default();
        body.clock.tick = 35;
        body.player.name = fixed_str("player1");
        body.player.dead = true;
        body.roster.player_count = 1;
        body.roster.slots[3].in_game = true;
        body.labels.entries[0].value = 7;
        body.labels.label_count = 1;

        let bytes = body.to_bytes().expect("encode");
        assert_eq!(bytes.len(), BODY_SIZE);
        let decoded = SnapshotBody::decode(&bytes).expect("decode");
        assert_eq!(decoded, body);
        assert_eq!(decoded.player.name_str(), "player1");
        assert_eq!(decoded.labels.active().len(), 1);
    }

    #[test]
    fn test_encode_into_short_buffer_fails() {
        let mut small = vec![0u8; BODY_SIZE - 1];
        assert!(SnapshotBody::default().encode_into(&mut small).is_err());
    }

    #[test]
    fn test_active_labels_clamped() {
        let list = LabelList {
            label_count: 10_000,
            ..LabelList::default()
        };
        assert_eq!(list.active().len(), MAX_LABELS);
    }

    proptest! {
        #[test]
        fn fixed_str_is_valid_prefix(s in "\\PC{0,80}") {
            let out: [u8; 32] = fixed_str(&s);
            let text = str_from_fixed(&out);
            prop_assert!(s.starts_with(&text));
            prop_assert!(text.len() <= 32);
            if s.len() <= 32 && !s.contains('\0') {
                prop_assert_eq!(text, s);
            }
        }
    }
}
