#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: usize,
    pub length: usize,
}

impl ByteRange {
    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn contains(&self, position: usize) -> bool {
        position >= self.start && position < self.end()
    }

    pub fn intersects(&self, start: usize, length: usize) -> bool {
        length > 0 && start < self.end() && self.start < start + length
    }
}

/// Which byte range is currently highlighted. Written by tree-field clicks
/// and hex-grid drags, read by every view that renders highlight state.
/// The drag anchor stays at the drag's starting byte, so extending past it
/// in either direction grows the range from that fixed point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    range: Option<ByteRange>,
    drag_anchor: Option<usize>,
}

impl Selection {
    pub fn new() -> Self {
        Selection::default()
    }

    pub fn range(&self) -> Option<ByteRange> {
        self.range
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_anchor.is_some()
    }

    pub fn select_field(&mut self, offset: usize, length: usize) {
        if length == 0 {
            return;
        }
        self.range = Some(ByteRange {
            start: offset,
            length,
        });
        self.drag_anchor = None;
    }

    pub fn begin_drag(&mut self, position: usize) {
        self.drag_anchor = Some(position);
        self.range = Some(ByteRange {
            start: position,
            length: 1,
        });
    }

    pub fn extend_drag(&mut self, position: usize) {
        let Some(anchor) = self.drag_anchor else {
            return;
        };
        self.range = Some(ByteRange {
            start: anchor.min(position),
            length: anchor.abs_diff(position) + 1,
        });
    }

    pub fn end_drag(&mut self) {
        self.drag_anchor = None;
    }

    pub fn clear(&mut self) {
        self.range = None;
        self.drag_anchor = None;
    }

    pub fn is_highlighted(&self, position: usize) -> bool {
        self.range.is_some_and(|range| range.contains(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_selection_bounds() {
        let mut selection = Selection::new();
        selection.select_field(4, 2);

        assert_eq!(
            selection.range(),
            Some(ByteRange {
                start: 4,
                length: 2
            })
        );
        assert!(selection.is_highlighted(4));
        assert!(selection.is_highlighted(5));
        assert!(!selection.is_highlighted(3));
        assert!(!selection.is_highlighted(6));
    }

    #[test]
    fn test_zero_length_field_is_ignored() {
        let mut selection = Selection::new();
        selection.select_field(4, 2);
        selection.select_field(9, 0);

        assert_eq!(
            selection.range(),
            Some(ByteRange {
                start: 4,
                length: 2
            })
        );
    }

    #[test]
    fn test_field_selection_replaces_whole_range() {
        let mut selection = Selection::new();
        selection.select_field(0, 10);
        selection.select_field(20, 1);

        assert_eq!(
            selection.range(),
            Some(ByteRange {
                start: 20,
                length: 1
            })
        );
        assert!(!selection.is_highlighted(5));
    }

    #[test]
    fn test_drag_starts_with_single_byte() {
        let mut selection = Selection::new();
        selection.begin_drag(10);

        assert!(selection.is_dragging());
        assert_eq!(
            selection.range(),
            Some(ByteRange {
                start: 10,
                length: 1
            })
        );
    }

    #[test]
    fn test_drag_backwards_keeps_anchor() {
        let mut selection = Selection::new();
        selection.begin_drag(10);
        selection.extend_drag(5);

        assert_eq!(
            selection.range(),
            Some(ByteRange {
                start: 5,
                length: 6
            })
        );
    }

    #[test]
    fn test_drag_direction_reversal() {
        let mut selection = Selection::new();
        selection.begin_drag(10);
        selection.extend_drag(14);
        selection.extend_drag(5);

        assert_eq!(
            selection.range(),
            Some(ByteRange {
                start: 5,
                length: 6
            })
        );

        selection.extend_drag(10);
        assert_eq!(
            selection.range(),
            Some(ByteRange {
                start: 10,
                length: 1
            })
        );
    }

    #[test]
    fn test_end_drag_retains_selection() {
        let mut selection = Selection::new();
        selection.begin_drag(2);
        selection.extend_drag(6);
        selection.end_drag();

        assert!(!selection.is_dragging());
        assert_eq!(
            selection.range(),
            Some(ByteRange {
                start: 2,
                length: 5
            })
        );

        // extending after release must not move anything
        selection.extend_drag(30);
        assert_eq!(
            selection.range(),
            Some(ByteRange {
                start: 2,
                length: 5
            })
        );
    }

    #[test]
    fn test_clear() {
        let mut selection = Selection::new();
        selection.begin_drag(3);
        selection.clear();

        assert!(!selection.is_dragging());
        assert_eq!(selection.range(), None);
        assert!(!selection.is_highlighted(3));
    }

    #[test]
    fn test_range_intersection() {
        let range = ByteRange {
            start: 4,
            length: 4,
        };
        assert!(range.intersects(0, 5));
        assert!(range.intersects(7, 10));
        assert!(range.intersects(5, 1));
        assert!(!range.intersects(0, 4));
        assert!(!range.intersects(8, 2));
        assert!(!range.intersects(5, 0));
    }
}
