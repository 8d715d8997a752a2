//! Round scheduling decision.

/// What the coordinator should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    /// A round is in progress.
    Busy,
    /// Drain the accumulation buffer into a synthetic batch.
    FlushBuffer,
    /// Pop the head of the batch queue.
    NextBatch,
    Idle,
}

/// Pure scheduling rule over `(busy, queued batches, buffered demands)`.
///
/// A full buffer jumps ahead of queued batches; an empty queue lets any
/// buffered demand through.
pub(crate) fn decide(busy: bool, queued: usize, buffered: usize, threshold: usize) -> Decision {
    if busy {
        Decision::Busy
    } else if buffered > 0 && buffered >= threshold {
        Decision::FlushBuffer
    } else if queued == 0 && buffered > 0 {
        Decision::FlushBuffer
    } else if queued > 0 {
        Decision::NextBatch
    } else {
        Decision::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_wins_over_everything() {
        assert_eq!(decide(true, 3, 10, 6), Decision::Busy);
    }

    #[test]
    fn full_buffer_flushes_before_queue() {
        assert_eq!(decide(false, 2, 6, 6), Decision::FlushBuffer);
        assert_eq!(decide(false, 2, 5, 6), Decision::NextBatch);
    }

    #[test]
    fn leftovers_flush_when_queue_is_empty() {
        assert_eq!(decide(false, 0, 1, 6), Decision::FlushBuffer);
        assert_eq!(decide(false, 0, 0, 6), Decision::Idle);
    }

    #[test]
    fn zero_threshold_never_flushes_an_empty_buffer() {
        assert_eq!(decide(false, 1, 0, 0), Decision::NextBatch);
    }
}
