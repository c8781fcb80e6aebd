//! Low/okay threshold tracking.

/// Crossing reported by [`ThresholdWatcher::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdEvent {
    /// Level fell to or below the low mark.
    Low,
    /// Level recovered to or above the okay mark after a low.
    Okay,
}

/// Emits one `Low` when the level drops to the low mark and one `Okay`
/// once it climbs back to the okay mark, which is kept above the low mark.
#[derive(Debug, Clone)]
pub struct ThresholdWatcher {
    low_level: i32,
    okay_level: i32,
    is_low: bool,
}

impl ThresholdWatcher {
    pub fn new(low_level: i32, okay_level: i32) -> Self {
        Self {
            low_level,
            okay_level: okay_level.max(low_level.saturating_add(1)),
            is_low: false,
        }
    }

    pub fn is_low(&self) -> bool {
        self.is_low
    }

    /// Feed a normalized 0-100 level.
    pub fn observe(&mut self, level: i32) -> Option<ThresholdEvent> {
        if !self.is_low && level <= self.low_level {
            self.is_low = true;
            return Some(ThresholdEvent::Low);
        }
        if self.is_low && level >= self.okay_level {
            self.is_low = false;
            return Some(ThresholdEvent::Okay);
        }
        None
    }
}
