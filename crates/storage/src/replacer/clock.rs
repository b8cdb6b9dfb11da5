use burrowdb_error::Error;

use crate::frame::PageFrame;
use crate::typedef::FrameId;
use crate::Result;

/// CLOCK replacement over the frame table.
///
/// The replacer only *selects* a victim. Write-back, page-table removal, and
/// descriptor reset stay with the buffer pool manager, so selection has no
/// side effects beyond reference bits and the hand itself.
#[derive(Debug)]
pub(crate) struct ClockReplacer {
    hand: FrameId,
    num_frames: usize,
}

impl ClockReplacer {
    /// The hand starts on the last frame so that the first advance inspects
    /// frame 0.
    pub(crate) fn new(num_frames: usize) -> Self {
        Self {
            hand: num_frames.saturating_sub(1),
            num_frames,
        }
    }

    fn advance(&mut self) {
        self.hand = (self.hand + 1) % self.num_frames;
    }

    /// Selects the frame the next page should be admitted into, leaving the
    /// hand parked on it.
    ///
    /// Fails with `PoolExhausted` once `2N + 1` advances prove that every
    /// frame is pinned. A single sweep is not enough: clearing a reference
    /// bit only makes that frame selectable the next time the hand comes
    /// around.
    pub(crate) fn pick_victim(&mut self, frames: &mut [PageFrame]) -> Result<FrameId> {
        if self.num_frames == 0 {
            return Err(Error::PoolExhausted);
        }

        for _ in 0..=2 * self.num_frames {
            self.advance();
            let frame = &mut frames[self.hand];
            if !frame.is_valid() {
                return Ok(self.hand);
            }
            if frame.refbit() {
                // Second chance. Pinned frames lose their bit too.
                frame.set_refbit(false);
                continue;
            }
            if frame.pin_count() > 0 {
                continue;
            }
            return Ok(self.hand);
        }

        Err(Error::PoolExhausted)
    }

    #[cfg(test)]
    pub(crate) fn hand(&self) -> FrameId {
        self.hand
    }
}
