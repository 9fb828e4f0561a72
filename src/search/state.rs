//! Bracketing state of the interpolation search.
//!
//! Positions count CRF steps from the low-quality end of the range:
//! `position = crf_min - crf`. Measured scores are assumed to grow with the
//! position, so the target is bracketed by `scores[low] <= target <= scores[high]`.

/// Scores by position plus the current bracket
#[derive(Debug, Clone, PartialEq)]
pub struct SearchState {
    crf_min: i32,
    low: i32,
    high: i32,
    scores: Vec<Option<f64>>,
    last_position: Option<i32>,
}

impl SearchState {
    /// Empty state over `crf_min` (position 0) down to `crf_max`
    pub fn new(crf_min: i32, crf_max: i32) -> Self {
        let span = (crf_min - crf_max).max(0);
        Self {
            crf_min,
            low: 0,
            high: span,
            scores: vec![None; span as usize + 1],
            last_position: None,
        }
    }

    /// Highest position, the high-quality end of the range
    pub fn span(&self) -> i32 {
        self.scores.len() as i32 - 1
    }

    pub fn crf_at(&self, position: i32) -> i32 {
        self.crf_min - position
    }

    pub fn position_of(&self, crf: i32) -> Option<i32> {
        let position = self.crf_min - crf;
        (0..=self.span()).contains(&position).then_some(position)
    }

    pub fn score_at(&self, position: i32) -> Option<f64> {
        usize::try_from(position)
            .ok()
            .and_then(|p| self.scores.get(p).copied().flatten())
    }

    pub fn low(&self) -> i32 {
        self.low
    }

    pub fn high(&self) -> i32 {
        self.high
    }

    /// Store a score without moving the bracket
    pub fn record(&mut self, position: i32, score: f64) {
        if let Ok(p) = usize::try_from(position)
            && let Some(slot) = self.scores.get_mut(p)
        {
            *slot = Some(score);
        }
    }

    /// Store an interpolated trial and narrow the bracket around `target`
    pub fn observe(&mut self, position: i32, score: f64, target: f64) {
        self.record(position, score);
        self.last_position = Some(position);
        if score > target {
            self.high = position;
        } else {
            self.low = position;
        }
    }

    /// Next position to probe, or `None` when the search cannot make progress:
    /// the bracket no longer holds the target, its scores do not increase, or
    /// the interpolated position was already measured.
    pub fn next_position(&self, target: f64) -> Option<i32> {
        if self.low > self.high {
            return None;
        }
        let low_score = self.score_at(self.low)?;
        let high_score = self.score_at(self.high)?;
        if target < low_score || target > high_score {
            return None;
        }

        let denominator = high_score - low_score;
        if denominator <= 0.0 {
            return None;
        }

        let offset = ((target - low_score) * f64::from(self.high - self.low) / denominator).round();
        let position = self.low + offset as i32;

        if self.last_position == Some(position) || self.score_at(position).is_some() {
            return None;
        }
        Some(position)
    }
}
