//! Per-mirror hysteresis state machine

use crate::models::{MirrorEvent, MirrorStatus};

/// Apply one probe result to a mirror's status
///
/// A mirror flips only after `threshold` consecutive results that disagree
/// with its current state. Returns the event when a flip happens.
pub fn apply(status: &mut MirrorStatus, reachable: bool, threshold: u32) -> Option<MirrorEvent> {
    if reachable {
        status.ok_count += 1;
    } else {
        status.error_count += 1;
    }

    if reachable == status.online {
        status.hysteresis = 0;
        return None;
    }

    status.hysteresis += 1;
    if status.hysteresis < threshold.max(1) {
        return None;
    }

    status.online = reachable;
    status.hysteresis = 0;
    Some(MirrorEvent::from_online(reachable))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_with_threshold_two() {
        let inputs = [true, false, false, false, true, false, true, true];
        let expected = [
            (0, true),
            (1, true),
            (0, false),
            (0, false),
            (1, false),
            (0, false),
            (1, false),
            (0, true),
        ];

        let mut status = MirrorStatus::default();
        let mut events = Vec::new();
        for (reachable, want) in inputs.iter().zip(expected) {
            if let Some(event) = apply(&mut status, *reachable, 2) {
                events.push(event);
            }
            assert_eq!((status.hysteresis, status.online), want);
        }

        assert_eq!(events, vec![MirrorEvent::Down, MirrorEvent::Up]);
        assert_eq!(status.ok_count, 4);
        assert_eq!(status.error_count, 4);
    }

    #[test]
    fn test_threshold_one_flips_immediately() {
        let mut status = MirrorStatus::default();
        assert_eq!(apply(&mut status, false, 1), Some(MirrorEvent::Down));
        assert!(!status.online);
        assert_eq!(apply(&mut status, true, 1), Some(MirrorEvent::Up));
        assert!(status.online);
    }

    #[test]
    fn test_agreeing_result_resets_counter() {
        let mut status = MirrorStatus::default();
        apply(&mut status, false, 3);
        apply(&mut status, false, 3);
        assert_eq!(status.hysteresis, 2);

        assert_eq!(apply(&mut status, true, 3), None);
        assert_eq!(status.hysteresis, 0);
        assert!(status.online);
    }
}
