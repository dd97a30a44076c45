use std::ops::Range;

pub const DEFAULT_OVERSCAN: usize = 5;

/// Row positions for a windowed list. Heights start from a uniform
/// estimate and can be corrected by post-render measurement; offsets are
/// prefix sums rebuilt lazily from the first changed row, so re-measuring
/// row `i` never re-derives positions of rows before `i`.
#[derive(Debug, Clone)]
pub struct RowLayout {
    estimate: u64,
    heights: Vec<u64>,
    offsets: Vec<u64>,
    clean: usize,
}

impl RowLayout {
    pub fn new(estimate: u64) -> Self {
        RowLayout {
            estimate: estimate.max(1),
            heights: Vec::new(),
            offsets: vec![0],
            clean: 0,
        }
    }

    /// Grows or shrinks the row set; new rows take the estimate, existing
    /// measurements are kept.
    pub fn set_count(&mut self, count: usize) {
        if count < self.heights.len() {
            self.clean = self.clean.min(count);
        }
        self.heights.resize(count, self.estimate);
    }

    pub fn measure(&mut self, index: usize, height: u64) {
        let Some(slot) = self.heights.get_mut(index) else {
            return;
        };
        let height = height.max(1);
        if *slot != height {
            *slot = height;
            self.clean = self.clean.min(index);
        }
    }

    pub fn height_of(&self, index: usize) -> u64 {
        self.heights.get(index).copied().unwrap_or(self.estimate)
    }

    pub fn offset_of(&mut self, index: usize) -> u64 {
        self.rebuild();
        self.offsets[index.min(self.heights.len())]
    }

    pub fn total_extent(&mut self) -> u64 {
        self.rebuild();
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Minimal index range covering `[scroll, scroll + viewport)` plus
    /// `overscan` rows of margin on each side, clamped to the row set.
    /// Purely a function of the arguments and current heights; growth
    /// alone never moves the window.
    pub fn window(&mut self, scroll: u64, viewport: u64, overscan: usize) -> Range<usize> {
        self.rebuild();
        let count = self.heights.len();
        if count == 0 {
            return 0..0;
        }
        let first = self.offsets[1..=count].partition_point(|&bottom| bottom <= scroll);
        let stop = self.offsets[..count]
            .partition_point(|&top| top < scroll.saturating_add(viewport));
        let lo = first.saturating_sub(overscan);
        let hi = (stop + overscan).min(count);
        lo..hi
    }

    /// Largest scroll offset that still fills the viewport; used for
    /// clamping and for pinning to the bottom.
    pub fn max_scroll(&mut self, viewport: u64) -> u64 {
        self.total_extent().saturating_sub(viewport)
    }

    fn rebuild(&mut self) {
        let count = self.heights.len();
        self.offsets.resize(count + 1, 0);
        for i in self.clean..count {
            self.offsets[i + 1] = self.offsets[i] + self.heights[i];
        }
        self.clean = count;
    }
}
