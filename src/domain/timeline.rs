use crate::domain::models::{Entry, EntryKey, Task};
use crate::domain::time_of_day::{format_minutes, parse_minutes};

pub const DEFAULT_PX_PER_MINUTE: u32 = 6;
pub const DEFAULT_MIN_BLOCK_HEIGHT_PX: u32 = 44;

const DEFAULT_BOUNDS_START: i32 = 360;
const DEFAULT_BOUNDS_END: i32 = 1320;
const BOUNDS_PADDING_MINUTES: i32 = 30;
const MIN_SPAN_MINUTES: i32 = 240;
const DAY_END_MINUTES: i32 = 1440;

/// Layout knobs for the rendered day view. Density is vertical pixels per
/// minute; the height floor keeps very short tasks legible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelinePolicy {
    pub px_per_minute: u32,
    pub min_block_height_px: u32,
}

impl Default for TimelinePolicy {
    fn default() -> Self {
        TimelinePolicy {
            px_per_minute: DEFAULT_PX_PER_MINUTE,
            min_block_height_px: DEFAULT_MIN_BLOCK_HEIGHT_PX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineBounds {
    pub start: i32,
    pub end: i32,
}

impl TimelineBounds {
    pub fn span(&self) -> i32 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourMark {
    pub minute: i32,
    pub offset_px: u32,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineBlock {
    pub key: EntryKey,
    pub title: String,
    pub start_minutes: i32,
    pub end_minutes: i32,
    pub duration_minutes: i32,
    pub start_label: String,
    pub completed: bool,
    pub top_px: u32,
    pub height_px: u32,
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineLayout {
    pub bounds: TimelineBounds,
    pub total_height_px: u32,
    pub hour_marks: Vec<HourMark>,
    pub blocks: Vec<TimelineBlock>,
    pub now_minutes: i32,
    pub now_offset_px: u32,
    pub current: Option<EntryKey>,
}

/// Derives a laid-out day schedule from a task collection and the current
/// minute of day.
///
/// Only tasks with a parsable start time and a positive duration take part;
/// everything else is silently excluded. Overlapping tasks are not
/// collision-packed — they overlap visually, which the views accept.
#[derive(Debug, Clone, Default)]
pub struct TimelineEngine {
    policy: TimelinePolicy,
}

struct EligibleSlot {
    index: usize,
    start: i32,
    duration: i32,
    end: i32,
}

impl TimelineEngine {
    pub fn new(policy: TimelinePolicy) -> Self {
        TimelineEngine { policy }
    }

    pub fn policy(&self) -> TimelinePolicy {
        self.policy
    }

    pub fn lay_out(&self, entries: &[Entry<Task>], now_minutes: u16) -> TimelineLayout {
        let now = i32::from(now_minutes);
        let eligible = eligible_slots(entries);
        let bounds = view_bounds(&eligible);
        let density = self.policy.px_per_minute;
        let total_height_px = scaled_px(i64::from(bounds.span()), density);

        let current = eligible
            .iter()
            .find(|slot| slot.start <= now && now < slot.end)
            .map(|slot| entries[slot.index].key);

        let blocks = eligible
            .iter()
            .map(|slot| {
                let entry = &entries[slot.index];
                let is_current = current == Some(entry.key);
                TimelineBlock {
                    key: entry.key,
                    title: entry.value.title.clone(),
                    start_minutes: slot.start,
                    end_minutes: slot.end,
                    duration_minutes: slot.duration,
                    start_label: format_minutes(slot.start as u16),
                    completed: entry.value.completed(),
                    top_px: scaled_px(i64::from(slot.start - bounds.start), density),
                    height_px: scaled_px(i64::from(slot.duration), density)
                        .max(self.policy.min_block_height_px),
                    is_current,
                }
            })
            .collect();

        let now_offset_px =
            scaled_px(i64::from(now - bounds.start), density).min(total_height_px);

        TimelineLayout {
            bounds,
            total_height_px,
            hour_marks: hour_marks(bounds, density),
            blocks,
            now_minutes: now,
            now_offset_px,
            current,
        }
    }
}

fn eligible_slots(entries: &[Entry<Task>]) -> Vec<EligibleSlot> {
    let mut slots: Vec<EligibleSlot> = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let start = entry
                .value
                .start_time
                .as_deref()
                .and_then(parse_minutes)
                .map(i32::from)?;
            let duration = entry.value.duration.unwrap_or(0).max(0);
            if duration == 0 {
                return None;
            }
            Some(EligibleSlot {
                index,
                start,
                duration,
                end: start.saturating_add(duration),
            })
        })
        .collect();
    // Stable, so equal starts keep their collection order.
    slots.sort_by_key(|slot| slot.start);
    slots
}

fn view_bounds(eligible: &[EligibleSlot]) -> TimelineBounds {
    if eligible.is_empty() {
        return TimelineBounds {
            start: DEFAULT_BOUNDS_START,
            end: DEFAULT_BOUNDS_END,
        };
    }

    let min_start = eligible.iter().map(|slot| slot.start).min().unwrap_or(0);
    let max_end = eligible.iter().map(|slot| slot.end).max().unwrap_or(0);
    let start = (min_start - BOUNDS_PADDING_MINUTES).max(0);
    let end = (max_end + BOUNDS_PADDING_MINUTES).min(DAY_END_MINUTES);

    if end - start >= MIN_SPAN_MINUTES {
        return TimelineBounds { start, end };
    }

    // Too narrow a window looks cramped; widen around the midpoint and let
    // the day edges truncate it if they must.
    let midpoint = (start + end) / 2;
    let half = MIN_SPAN_MINUTES / 2;
    TimelineBounds {
        start: (midpoint - half).clamp(0, DAY_END_MINUTES),
        end: (midpoint + half).clamp(0, DAY_END_MINUTES),
    }
}

fn hour_marks(bounds: TimelineBounds, density: u32) -> Vec<HourMark> {
    let mut marks = Vec::new();
    let first_hour = bounds.start.div_euclid(60) * 60;
    let first_hour = if first_hour < bounds.start {
        first_hour + 60
    } else {
        first_hour
    };

    let mut minute = first_hour;
    while minute <= bounds.end {
        marks.push(HourMark {
            minute,
            offset_px: scaled_px(i64::from(minute - bounds.start), density),
            label: format_minutes(minute as u16),
        });
        minute += 60;
    }
    marks
}

fn scaled_px(minutes: i64, density: u32) -> u32 {
    (minutes * i64::from(density)).clamp(0, i64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn timed_task(id: i64, title: &str, start: Option<&str>, duration: Option<i32>) -> Entry<Task> {
        Entry::confirmed(
            id,
            Task {
                task_id: id,
                routine_id: Some(1),
                title: title.to_string(),
                description: None,
                task_type: None,
                start_time: start.map(ToOwned::to_owned),
                duration,
                priority: None,
                is_completed: Some(false),
                position: None,
                created_at: None,
            },
        )
    }

    fn engine() -> TimelineEngine {
        TimelineEngine::new(TimelinePolicy::default())
    }

    #[test]
    fn empty_collection_uses_default_bounds() {
        let layout = engine().lay_out(&[], 555);
        assert_eq!(layout.bounds, TimelineBounds { start: 360, end: 1320 });
        assert!(layout.blocks.is_empty());
        assert_eq!(layout.current, None);
        assert_eq!(layout.total_height_px, 960 * 6);
    }

    #[test]
    fn narrow_window_recenters_to_minimum_span() {
        let entries = vec![
            timed_task(1, "Standup", Some("09:00:00"), Some(30)),
            timed_task(2, "Review", Some("09:45:00"), Some(15)),
        ];
        let layout = engine().lay_out(&entries, 555);
        // raw bounds [510, 570] span 60, recentered on 540
        assert_eq!(layout.bounds, TimelineBounds { start: 420, end: 660 });
    }

    #[test]
    fn gap_between_tasks_has_no_current_item() {
        let entries = vec![
            timed_task(1, "Standup", Some("09:00:00"), Some(30)),
            timed_task(2, "Review", Some("09:45:00"), Some(15)),
        ];
        let layout = engine().lay_out(&entries, 555);
        assert_eq!(layout.current, None);
        assert!(layout.blocks.iter().all(|block| !block.is_current));
    }

    #[test]
    fn current_item_uses_half_open_interval() {
        let entries = vec![
            timed_task(1, "Standup", Some("09:00:00"), Some(30)),
            timed_task(2, "Review", Some("09:45:00"), Some(15)),
        ];
        let eng = engine();
        assert_eq!(
            eng.lay_out(&entries, 540).current,
            Some(EntryKey::Confirmed(1))
        );
        assert_eq!(
            eng.lay_out(&entries, 569).current,
            Some(EntryKey::Confirmed(1))
        );
        // end is exclusive
        assert_eq!(eng.lay_out(&entries, 570).current, None);
        assert_eq!(
            eng.lay_out(&entries, 585).current,
            Some(EntryKey::Confirmed(2))
        );
    }

    #[test]
    fn ineligible_tasks_are_excluded_not_errored() {
        let entries = vec![
            timed_task(1, "No start", None, Some(30)),
            timed_task(2, "Zero duration", Some("09:00:00"), Some(0)),
            timed_task(3, "Negative duration", Some("09:00:00"), Some(-10)),
            timed_task(4, "Garbled", Some("whenever"), Some(30)),
            timed_task(5, "Kept", Some("09:00:00"), Some(30)),
        ];
        let layout = engine().lay_out(&entries, 0);
        assert_eq!(layout.blocks.len(), 1);
        assert_eq!(layout.blocks[0].key, EntryKey::Confirmed(5));
    }

    #[test]
    fn equal_starts_keep_collection_order() {
        let entries = vec![
            timed_task(9, "First listed", Some("08:00:00"), Some(20)),
            timed_task(4, "Second listed", Some("08:00:00"), Some(20)),
        ];
        let layout = engine().lay_out(&entries, 480);
        assert_eq!(layout.blocks[0].key, EntryKey::Confirmed(9));
        assert_eq!(layout.blocks[1].key, EntryKey::Confirmed(4));
        // first in sorted order wins the current slot
        assert_eq!(layout.current, Some(EntryKey::Confirmed(9)));
    }

    #[test]
    fn layout_offsets_match_density() {
        let entries = vec![
            timed_task(1, "Standup", Some("09:00:00"), Some(30)),
            timed_task(2, "Review", Some("09:45:00"), Some(15)),
        ];
        let layout = engine().lay_out(&entries, 555);
        // bounds start 420
        assert_eq!(layout.blocks[0].top_px, (540 - 420) * 6);
        assert_eq!(layout.blocks[0].height_px, 30 * 6);
        assert_eq!(layout.blocks[1].top_px, (585 - 420) * 6);
        assert_eq!(layout.blocks[1].height_px, 15 * 6);
    }

    #[test]
    fn short_blocks_get_the_height_floor() {
        let entries = vec![timed_task(1, "Blink", Some("09:00:00"), Some(5))];
        let layout = engine().lay_out(&entries, 0);
        assert_eq!(layout.blocks[0].height_px, DEFAULT_MIN_BLOCK_HEIGHT_PX);
    }

    #[test]
    fn hour_marks_cover_the_bounds() {
        let entries = vec![
            timed_task(1, "Standup", Some("09:00:00"), Some(30)),
            timed_task(2, "Review", Some("09:45:00"), Some(15)),
        ];
        let layout = engine().lay_out(&entries, 555);
        let minutes: Vec<i32> = layout.hour_marks.iter().map(|mark| mark.minute).collect();
        assert_eq!(minutes, vec![420, 480, 540, 600, 660]);
        assert_eq!(layout.hour_marks[0].offset_px, 0);
        assert_eq!(layout.hour_marks[0].label, "07:00");
        assert_eq!(layout.hour_marks[4].label, "11:00");
    }

    #[test]
    fn now_indicator_is_clamped_to_the_view() {
        let entries = vec![timed_task(1, "Deep work", Some("12:00:00"), Some(300))];
        let eng = engine();
        let layout = eng.lay_out(&entries, 0);
        assert_eq!(layout.now_offset_px, 0);
        let layout = eng.lay_out(&entries, 1439);
        assert_eq!(layout.now_offset_px, layout.total_height_px);
    }

    #[test]
    fn recentered_bounds_truncate_at_the_day_start() {
        let entries = vec![timed_task(1, "Early", Some("00:10:00"), Some(30))];
        let layout = engine().lay_out(&entries, 0);
        // raw [0, 70], midpoint 35, widened window truncated at midnight
        assert_eq!(layout.bounds, TimelineBounds { start: 0, end: 155 });
    }

    #[test]
    fn start_labels_are_formatted() {
        let entries = vec![timed_task(1, "Standup", Some("09:05:00"), Some(30))];
        let layout = engine().lay_out(&entries, 0);
        assert_eq!(layout.blocks[0].start_label, "09:05");
    }

    fn start_time_text() -> impl Strategy<Value = String> {
        (0u32..24u32, 0u32..60u32).prop_map(|(hour, minute)| format!("{hour:02}:{minute:02}:00"))
    }

    proptest! {
        #[test]
        fn bounds_stay_inside_the_day(
            specs in proptest::collection::vec((start_time_text(), 1i32..600i32), 0..12)
        ) {
            let entries: Vec<Entry<Task>> = specs
                .iter()
                .enumerate()
                .map(|(index, (start, duration))| {
                    timed_task(index as i64 + 1, "t", Some(start), Some(*duration))
                })
                .collect();
            let layout = engine().lay_out(&entries, 720);

            prop_assert!(layout.bounds.start >= 0);
            prop_assert!(layout.bounds.end <= 1440);
            prop_assert!(layout.bounds.start <= layout.bounds.end);
            for block in &layout.blocks {
                prop_assert!(block.start_minutes >= layout.bounds.start);
                prop_assert!(block.height_px >= DEFAULT_MIN_BLOCK_HEIGHT_PX.min(block.duration_minutes as u32 * 6));
            }
        }

        #[test]
        fn current_block_always_contains_now(
            specs in proptest::collection::vec((start_time_text(), 1i32..600i32), 1..12),
            now in 0u16..1440u16
        ) {
            let entries: Vec<Entry<Task>> = specs
                .iter()
                .enumerate()
                .map(|(index, (start, duration))| {
                    timed_task(index as i64 + 1, "t", Some(start), Some(*duration))
                })
                .collect();
            let layout = engine().lay_out(&entries, now);

            if let Some(current) = layout.current {
                let block = layout
                    .blocks
                    .iter()
                    .find(|block| block.key == current)
                    .expect("current block present");
                prop_assert!(block.start_minutes <= i32::from(now));
                prop_assert!(i32::from(now) < block.end_minutes);
            } else {
                for block in &layout.blocks {
                    let inside = block.start_minutes <= i32::from(now)
                        && i32::from(now) < block.end_minutes;
                    prop_assert!(!inside);
                }
            }
        }
    }
}
