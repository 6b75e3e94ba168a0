use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum DropPosition {
    Before,
    After,
}

/// Upper half of the target means "before", lower half "after".
pub(crate) fn position_for_pointer(y: f64, top: f64, height: f64) -> DropPosition {
    if y < top + height / 2.0 {
        DropPosition::Before
    } else {
        DropPosition::After
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct DropZone {
    pub anchor_id: i64,
    pub position: DropPosition,
}

/// A move the backend should apply. Ids are global document ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct MoveRequest {
    pub subject_id: i64,
    pub anchor_id: i64,
    pub position: DropPosition,
}

/// Decide whether dropping `dragged` on `zone` changes anything.
///
/// `visible_ids` is the current page in display order. When the dragged item
/// is not on it (cross-page drag) the move always goes through.
pub(crate) fn compute_move(visible_ids: &[i64], dragged: i64, zone: DropZone) -> Option<MoveRequest> {
    if zone.anchor_id == dragged {
        return None;
    }

    let dragged_at = visible_ids.iter().position(|id| *id == dragged);
    let anchor_at = visible_ids.iter().position(|id| *id == zone.anchor_id);
    if let (Some(d), Some(a)) = (dragged_at, anchor_at) {
        let unchanged = match zone.position {
            DropPosition::Before => a == d + 1,
            DropPosition::After => a + 1 == d,
        };
        if unchanged {
            return None;
        }
    }

    Some(MoveRequest {
        subject_id: dragged,
        anchor_id: zone.anchor_id,
        position: zone.position,
    })
}

/// Drop target for a page button: after the last item of that page.
pub(crate) fn page_drop_zone(page_ids: &[i64]) -> Option<DropZone> {
    page_ids.last().map(|last| DropZone {
        anchor_id: *last,
        position: DropPosition::After,
    })
}

/// Hover-to-switch-page while dragging. Fires once per hover, and only
/// after the pointer stayed on the same page control for `dwell_ms`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PageDwell {
    dwell_ms: i64,
    target: Option<(u32, i64)>,
    fired: bool,
}

impl PageDwell {
    pub fn new(dwell_ms: u32) -> Self {
        Self {
            dwell_ms: dwell_ms as i64,
            target: None,
            fired: false,
        }
    }

    pub fn enter(&mut self, page: u32, now_ms: i64) {
        if self.target.map(|(p, _)| p) == Some(page) {
            return;
        }
        self.target = Some((page, now_ms));
        self.fired = false;
    }

    pub fn leave(&mut self) {
        self.target = None;
        self.fired = false;
    }

    pub fn hovered(&self) -> Option<u32> {
        self.target.map(|(p, _)| p)
    }

    pub fn fire_if_due(&mut self, now_ms: i64) -> Option<u32> {
        let (page, since) = self.target?;
        if self.fired || now_ms - since < self.dwell_ms {
            return None;
        }
        self.fired = true;
        Some(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(anchor_id: i64, position: DropPosition) -> DropZone {
        DropZone {
            anchor_id,
            position,
        }
    }

    #[test]
    fn test_pointer_halves() {
        assert_eq!(position_for_pointer(10.0, 0.0, 40.0), DropPosition::Before);
        assert_eq!(position_for_pointer(20.0, 0.0, 40.0), DropPosition::After);
        assert_eq!(position_for_pointer(39.0, 0.0, 40.0), DropPosition::After);
    }

    #[test]
    fn test_drop_on_self_is_noop() {
        let ids = [1, 2, 3];
        for pos in [DropPosition::Before, DropPosition::After] {
            assert_eq!(compute_move(&ids, 2, zone(2, pos)), None);
        }
    }

    #[test]
    fn test_adjacent_drops_are_noops() {
        let ids = [10, 20, 30, 40];
        for (i, &dragged) in ids.iter().enumerate() {
            // Before the next item: already there.
            if let Some(&next) = ids.get(i + 1) {
                assert_eq!(compute_move(&ids, dragged, zone(next, DropPosition::Before)), None);
                assert!(compute_move(&ids, dragged, zone(next, DropPosition::After)).is_some());
            }
            // After the previous item: already there.
            if i > 0 {
                let prev = ids[i - 1];
                assert_eq!(compute_move(&ids, dragged, zone(prev, DropPosition::After)), None);
                assert!(compute_move(&ids, dragged, zone(prev, DropPosition::Before)).is_some());
            }
        }
    }

    #[test]
    fn test_real_move() {
        let ids = [1, 2, 3, 4];
        assert_eq!(
            compute_move(&ids, 1, zone(4, DropPosition::After)),
            Some(MoveRequest {
                subject_id: 1,
                anchor_id: 4,
                position: DropPosition::After
            })
        );
    }

    #[test]
    fn test_cross_page_move_always_sent() {
        // Dragged item lives on another page.
        let page_two = [5, 6, 7];
        let z = page_drop_zone(&page_two).expect("non-empty page");
        assert_eq!(z, zone(7, DropPosition::After));
        assert!(compute_move(&page_two, 2, z).is_some());
        assert!(page_drop_zone(&[]).is_none());
    }

    #[test]
    fn test_page_drop_on_own_last_item_is_noop() {
        let page = [5, 6, 7];
        let z = page_drop_zone(&page).expect("non-empty page");
        assert_eq!(compute_move(&page, 7, z), None);
    }

    #[test]
    fn test_dwell_fires_once_after_threshold() {
        let mut d = PageDwell::new(600);
        d.enter(3, 1_000);
        assert_eq!(d.fire_if_due(1_300), None);
        // Re-entering the same page does not restart the clock.
        d.enter(3, 1_500);
        assert_eq!(d.fire_if_due(1_600), Some(3));
        assert_eq!(d.fire_if_due(2_000), None);
    }

    #[test]
    fn test_dwell_cancelled_by_leave() {
        let mut d = PageDwell::new(600);
        d.enter(2, 0);
        d.leave();
        assert_eq!(d.fire_if_due(10_000), None);

        d.enter(4, 100);
        d.enter(5, 500);
        assert_eq!(d.fire_if_due(800), None);
        assert_eq!(d.fire_if_due(1_100), Some(5));
    }
}
