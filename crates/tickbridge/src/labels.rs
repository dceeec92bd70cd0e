//! Copies the labeling subsystem's output into the snapshot label list.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::layout::{LABEL_SENTINEL, LabelList, MAX_LABELS, fixed_str};
use crate::sim::LabeledSprite;

/// Order in which sprites are copied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelOrder {
    /// Keep the order the labeling subsystem reported
    #[default]
    Provider,
    /// Stable sort by label value
    ValueAscending,
}

/// Fill `out` from `sprites` and return the number of entries written.
///
/// Unlabeled sprites are skipped. The walk stops after a sprite carrying
/// [`LABEL_SENTINEL`], whether or not it was labeled, or once the list is
/// full. `None` means labeling is off and leaves an empty list.
pub fn copy_labels(sprites: Option<&[LabeledSprite]>, order: LabelOrder, out: &mut LabelList) -> u32 {
    out.label_count = 0;
    let Some(sprites) = sprites else {
        return 0;
    };

    let mut sorted;
    let ordered: &[LabeledSprite] = match order {
        LabelOrder::Provider => sprites,
        LabelOrder::ValueAscending => {
            sorted = sprites.to_vec();
            sorted.sort_by_key(|sprite| sprite.label);
            &sorted
        }
    };

    let mut count = 0usize;
    for sprite in ordered {
        if sprite.labeled {
            let entry = &mut out.entries[count];
            entry.object_id = sprite.object_id;
            entry.object_name = fixed_str(&sprite.type_name);
            entry.value = sprite.label;
            count += 1;

            debug!(
                "label {}: object {} '{}' value {}",
                count, sprite.object_id, sprite.type_name, sprite.label
            );
        }
        if sprite.label == LABEL_SENTINEL || count >= MAX_LABELS {
            break;
        }
    }

    out.label_count = count as u32;
    out.label_count
}
