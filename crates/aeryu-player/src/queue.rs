//! Playback ordering: original vs. active order, shuffle and repeat.
//!
//! The queue keeps two parallel sequences over the same tracks:
//! - `original`: exactly what the caller loaded, never reordered
//! - `active`: what playback consumes; equals `original` unless shuffled
//!
//! The cursor always indexes into `active`.

use std::sync::Arc;

use aeryu_types::{QueuePosition, Track};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::PlayerError;

/// Result of moving the cursor forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Cursor moved to the next entry.
    Moved,
    /// Cursor ran past the end and wrapped to 0 because repeat is on.
    Wrapped,
    /// Cursor is parked on the last entry; nothing further should play.
    Exhausted,
}

/// Result of a "previous" request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retreat {
    /// Enough of the track has played; restart it in place.
    RestartCurrent,
    /// Cursor moved to the previous entry.
    Moved,
    /// Already at the first entry; nothing changes.
    AtStart,
}

pub struct QueueManager {
    original: Vec<Arc<Track>>,
    active: Vec<Arc<Track>>,
    cursor: Option<usize>,
    single_track: bool,
    shuffled: bool,
    repeating: bool,
    restart_threshold_ms: u64,
    rng: StdRng,
}

impl QueueManager {
    /// Create an empty queue with an entropy-seeded shuffle source.
    pub fn new(restart_threshold_ms: u64) -> Self {
        Self::with_rng(restart_threshold_ms, StdRng::from_entropy())
    }

    /// Create an empty queue with a fixed seed (deterministic shuffles).
    pub fn with_seed(restart_threshold_ms: u64, seed: u64) -> Self {
        Self::with_rng(restart_threshold_ms, StdRng::seed_from_u64(seed))
    }

    fn with_rng(restart_threshold_ms: u64, rng: StdRng) -> Self {
        Self {
            original: Vec::new(),
            active: Vec::new(),
            cursor: None,
            single_track: false,
            shuffled: false,
            repeating: false,
            restart_threshold_ms,
            rng,
        }
    }

    /// Replace the queue and point the cursor at `start_index`.
    ///
    /// When shuffle is on (and the queue has more than one track) the active order is
    /// regenerated with the start track pinned first.
    pub fn load(&mut self, tracks: Vec<Track>, start_index: usize) -> Result<(), PlayerError> {
        if tracks.is_empty() {
            return Err(PlayerError::InvalidArgument("queue must not be empty".to_string()));
        }
        if start_index >= tracks.len() {
            return Err(PlayerError::InvalidArgument(format!(
                "start index {start_index} out of range for {} tracks",
                tracks.len()
            )));
        }

        self.original = tracks.into_iter().map(Arc::new).collect();
        self.active = self.original.clone();
        self.single_track = self.original.len() == 1;
        self.cursor = Some(start_index);

        if self.shuffled && !self.single_track {
            self.regenerate_shuffle(start_index);
        }

        tracing::debug!(
            len = self.original.len(),
            start_index,
            shuffled = self.shuffled,
            "queue loaded"
        );
        Ok(())
    }

    /// Step forward in the active order.
    pub fn advance(&mut self) -> Advance {
        let Some(cursor) = self.cursor else {
            return Advance::Exhausted;
        };
        let next = cursor + 1;
        if next < self.active.len() {
            self.cursor = Some(next);
            return Advance::Moved;
        }

        if self.repeating {
            if self.shuffled && !self.single_track {
                self.regenerate_shuffle(0);
            }
            self.cursor = Some(0);
            Advance::Wrapped
        } else {
            self.cursor = Some(self.active.len().saturating_sub(1));
            Advance::Exhausted
        }
    }

    /// Step backward, or ask for a restart once the track has played long enough.
    pub fn retreat(&mut self, elapsed_ms: u64) -> Retreat {
        let Some(cursor) = self.cursor else {
            return Retreat::AtStart;
        };
        if elapsed_ms > self.restart_threshold_ms {
            return Retreat::RestartCurrent;
        }
        if cursor == 0 {
            return Retreat::AtStart;
        }
        self.cursor = Some(cursor - 1);
        Retreat::Moved
    }

    /// Flip repeat; ordering is untouched.
    pub fn toggle_repeat(&mut self) -> bool {
        self.repeating = !self.repeating;
        self.repeating
    }

    /// Flip shuffle. Single-track queues ignore the request.
    ///
    /// Enabling pins the current track at position 0; disabling restores the original order
    /// and relocates the cursor onto the same track.
    pub fn toggle_shuffle(&mut self) -> bool {
        if self.single_track {
            return self.shuffled;
        }
        self.shuffled = !self.shuffled;
        if self.active.is_empty() {
            return self.shuffled;
        }

        if self.shuffled {
            let pin = self.cursor.unwrap_or(0);
            self.regenerate_shuffle(pin);
        } else {
            let current_id = self.current_track().map(|t| t.id);
            self.active = self.original.clone();
            self.cursor = current_id
                .and_then(|id| self.original.iter().position(|t| t.id == id))
                .or(self.cursor.map(|_| 0));
        }
        self.shuffled
    }

    /// Track under the cursor.
    pub fn current_track(&self) -> Option<&Arc<Track>> {
        self.cursor.and_then(|idx| self.active.get(idx))
    }

    /// `true` when `advance` would produce another track.
    pub fn has_next(&self) -> bool {
        match self.cursor {
            Some(idx) => idx + 1 < self.active.len() || self.repeating,
            None => false,
        }
    }

    /// `true` when `retreat` could move the cursor back.
    pub fn has_previous(&self) -> bool {
        matches!(self.cursor, Some(idx) if idx > 0)
    }

    pub fn position_info(&self) -> QueuePosition {
        QueuePosition {
            index: self.cursor,
            len: self.active.len(),
            is_shuffled: self.shuffled,
            is_repeating: self.repeating,
            is_single_track: self.single_track,
        }
    }

    pub fn is_single_track(&self) -> bool {
        self.single_track
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled
    }

    pub fn is_repeating(&self) -> bool {
        self.repeating
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn original_order(&self) -> &[Arc<Track>] {
        &self.original
    }

    pub fn active_order(&self) -> &[Arc<Track>] {
        &self.active
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    fn regenerate_shuffle(&mut self, pin: usize) {
        self.active = pinned_shuffle(&self.original, pin, &mut self.rng);
        self.cursor = Some(0);
    }
}

/// Shuffle `items` with `items[pin]` moved to the front.
///
/// Walks `i` from `n - 1` down to 2 and swaps with a partner drawn from `[1, i - 1]`.
/// Position 0 never moves and the partner range excludes `i` itself, so the result is
/// not uniform over all permutations. Playback parity depends on this exact walk.
pub fn pinned_shuffle<T: Clone, R: Rng + ?Sized>(items: &[T], pin: usize, rng: &mut R) -> Vec<T> {
    let mut shuffled = items.to_vec();
    if pin > 0 && pin < shuffled.len() {
        let pinned = shuffled.remove(pin);
        shuffled.insert(0, pinned);
    }

    let mut i = shuffled.len().saturating_sub(1);
    while i > 1 {
        let j = rng.gen_range(1..i);
        shuffled.swap(i, j);
        i -= 1;
    }
    shuffled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tracks;
    use std::collections::HashSet;

    fn ids(order: &[Arc<Track>]) -> Vec<i64> {
        order.iter().map(|t| t.id).collect()
    }

    fn sorted(mut v: Vec<i64>) -> Vec<i64> {
        v.sort_unstable();
        v
    }

    #[test]
    fn load_points_at_start_track() {
        let mut queue = QueueManager::with_seed(3_000, 1);
        for start in 0..4 {
            queue.load(tracks(&[10, 11, 12, 13]), start).unwrap();
            assert_eq!(queue.current_track().unwrap().id, 10 + start as i64);
        }
    }

    #[test]
    fn load_rejects_empty_and_out_of_range() {
        let mut queue = QueueManager::with_seed(3_000, 1);
        assert!(matches!(
            queue.load(Vec::new(), 0),
            Err(PlayerError::InvalidArgument(_))
        ));
        assert!(matches!(
            queue.load(tracks(&[1, 2]), 2),
            Err(PlayerError::InvalidArgument(_))
        ));
        assert!(queue.is_empty());
        assert_eq!(queue.cursor(), None);
    }

    #[test]
    fn load_while_shuffled_pins_start_track() {
        let mut queue = QueueManager::with_seed(3_000, 7);
        queue.load(tracks(&[1, 2]), 0).unwrap();
        queue.toggle_shuffle();

        queue.load(tracks(&[1, 2, 3, 4, 5]), 3).unwrap();

        assert_eq!(queue.cursor(), Some(0));
        assert_eq!(queue.current_track().unwrap().id, 4);
        assert_eq!(sorted(ids(queue.active_order())), vec![1, 2, 3, 4, 5]);
        assert_eq!(ids(queue.original_order()), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn shuffle_pins_current_and_keeps_multiset() {
        for seed in 0..50 {
            let mut queue = QueueManager::with_seed(3_000, seed);
            queue.load(tracks(&[1, 2, 3, 4, 5, 6]), 2).unwrap();

            assert!(queue.toggle_shuffle());

            assert_eq!(queue.active_order()[0].id, 3);
            assert_eq!(queue.cursor(), Some(0));
            assert_eq!(sorted(ids(queue.active_order())), vec![1, 2, 3, 4, 5, 6]);
            assert_eq!(ids(queue.original_order()), vec![1, 2, 3, 4, 5, 6]);
        }
    }

    #[test]
    fn unshuffle_restores_original_and_relocates_cursor() {
        let mut queue = QueueManager::with_seed(3_000, 3);
        queue.load(tracks(&[1, 2, 3, 4, 5]), 1).unwrap();
        queue.toggle_shuffle();
        queue.advance();
        queue.advance();
        let playing = queue.current_track().unwrap().id;

        assert!(!queue.toggle_shuffle());

        assert_eq!(ids(queue.active_order()), vec![1, 2, 3, 4, 5]);
        assert_eq!(queue.current_track().unwrap().id, playing);
    }

    #[test]
    fn three_track_shuffle_always_swaps_the_tail() {
        // With n = 3 the only draw is j in [1, 1], so the walk is fully determined.
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            assert_eq!(pinned_shuffle(&[1, 2, 3], 0, &mut rng), vec![1, 3, 2]);
            assert_eq!(pinned_shuffle(&[1, 2, 3], 2, &mut rng), vec![3, 2, 1]);
        }
    }

    #[test]
    fn four_track_shuffle_reaches_only_two_orders() {
        let mut seen = HashSet::new();
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            seen.insert(pinned_shuffle(&[1, 2, 3, 4], 0, &mut rng));
        }
        let expected: HashSet<Vec<i32>> = [vec![1, 3, 4, 2], vec![1, 4, 2, 3]].into_iter().collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn shuffle_of_two_only_moves_pin() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(pinned_shuffle(&[1, 2], 1, &mut rng), vec![2, 1]);
        assert_eq!(pinned_shuffle(&[1, 2], 0, &mut rng), vec![1, 2]);
    }

    #[test]
    fn advance_past_end_without_repeat_parks_on_last() {
        let mut queue = QueueManager::with_seed(3_000, 1);
        queue.load(tracks(&[1, 2, 3]), 1).unwrap();

        assert_eq!(queue.advance(), Advance::Moved);
        assert_eq!(queue.advance(), Advance::Exhausted);
        assert_eq!(queue.advance(), Advance::Exhausted);
        assert_eq!(queue.cursor(), Some(2));
        assert!(!queue.has_next());
    }

    #[test]
    fn advance_past_end_with_repeat_wraps() {
        let mut queue = QueueManager::with_seed(3_000, 1);
        queue.load(tracks(&[1, 2, 3]), 2).unwrap();
        queue.toggle_repeat();

        assert!(queue.has_next());
        assert_eq!(queue.advance(), Advance::Wrapped);
        assert_eq!(queue.cursor(), Some(0));
        assert_eq!(queue.current_track().unwrap().id, 1);
    }

    #[test]
    fn repeat_wrap_while_shuffled_regenerates_from_first_original() {
        for seed in 0..20 {
            let mut queue = QueueManager::with_seed(3_000, seed);
            queue.load(tracks(&[1, 2, 3, 4, 5]), 3).unwrap();
            queue.toggle_repeat();
            queue.toggle_shuffle();
            while queue.advance() == Advance::Moved {}

            assert_eq!(queue.cursor(), Some(0));
            assert_eq!(queue.active_order()[0].id, 1);
            assert_eq!(sorted(ids(queue.active_order())), vec![1, 2, 3, 4, 5]);
        }
    }

    #[test]
    fn retreat_restarts_after_threshold() {
        let mut queue = QueueManager::with_seed(3_000, 1);
        queue.load(tracks(&[1, 2, 3]), 2).unwrap();

        assert_eq!(queue.retreat(3_001), Retreat::RestartCurrent);
        assert_eq!(queue.cursor(), Some(2));
        assert_eq!(queue.retreat(3_000), Retreat::Moved);
        assert_eq!(queue.cursor(), Some(1));
    }

    #[test]
    fn retreat_at_first_track_does_not_wrap() {
        let mut queue = QueueManager::with_seed(3_000, 1);
        queue.load(tracks(&[1, 2, 3]), 0).unwrap();
        queue.toggle_repeat();

        assert_eq!(queue.retreat(0), Retreat::AtStart);
        assert_eq!(queue.cursor(), Some(0));
        assert!(!queue.has_previous());
    }

    #[test]
    fn single_track_ignores_shuffle() {
        let mut queue = QueueManager::with_seed(3_000, 1);
        queue.load(tracks(&[9]), 0).unwrap();

        assert!(queue.is_single_track());
        assert!(!queue.toggle_shuffle());
        assert!(!queue.is_shuffled());
        assert_eq!(ids(queue.active_order()), vec![9]);
    }

    #[test]
    fn toggle_repeat_leaves_order_alone() {
        let mut queue = QueueManager::with_seed(3_000, 1);
        queue.load(tracks(&[1, 2, 3]), 1).unwrap();
        assert!(queue.toggle_repeat());
        assert!(!queue.toggle_repeat());
        assert_eq!(ids(queue.active_order()), vec![1, 2, 3]);
        assert_eq!(queue.cursor(), Some(1));
    }

    #[test]
    fn scenario_shuffle_mid_queue_then_restore() {
        let mut queue = QueueManager::with_seed(3_000, 11);
        queue.load(tracks(&[1, 2, 3]), 0).unwrap();
        assert_eq!(queue.advance(), Advance::Moved);
        assert_eq!(queue.current_track().unwrap().id, 2);

        queue.toggle_shuffle();
        assert_eq!(queue.active_order()[0].id, 2);
        assert_eq!(queue.advance(), Advance::Moved);
        assert_eq!(queue.current_track().unwrap().id, 3);

        queue.toggle_shuffle();
        assert_eq!(ids(queue.active_order()), vec![1, 2, 3]);
        assert_eq!(queue.cursor(), Some(2));
    }

    #[test]
    fn position_info_reports_flags() {
        let mut queue = QueueManager::with_seed(3_000, 1);
        assert_eq!(queue.position_info(), QueuePosition::default());

        queue.load(tracks(&[1, 2]), 1).unwrap();
        queue.toggle_repeat();
        let info = queue.position_info();
        assert_eq!(info.index, Some(1));
        assert_eq!(info.len, 2);
        assert!(info.is_repeating);
        assert!(!info.is_single_track);
    }
}
