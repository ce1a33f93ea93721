//! Playback cursor shared between the foreground loop and the annotation job
//!
//! The index and the follow flag are packed into one `AtomicU64` so a reader
//! can never observe a fresh index with a stale flag or the other way round.
//! Bit 0 holds the follow flag, the remaining bits hold the index.

use std::sync::atomic::{AtomicU64, Ordering};

/// Decoded view of the cursor at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorState {
    pub index: usize,
    /// When set, the cursor tracks the newest annotated frame
    pub follow: bool,
}

impl CursorState {
    fn pack(self) -> u64 {
        ((self.index as u64) << 1) | self.follow as u64
    }

    fn unpack(bits: u64) -> Self {
        Self {
            index: (bits >> 1) as usize,
            follow: bits & 1 == 1,
        }
    }
}

#[derive(Debug)]
pub struct PlaybackCursor {
    state: AtomicU64,
}

impl PlaybackCursor {
    /// Starts at index 0 in follow mode
    pub fn new() -> Self {
        Self::with_state(CursorState {
            index: 0,
            follow: true,
        })
    }

    pub fn with_state(state: CursorState) -> Self {
        Self {
            state: AtomicU64::new(state.pack()),
        }
    }

    pub fn load(&self) -> CursorState {
        CursorState::unpack(self.state.load(Ordering::Acquire))
    }

    pub fn store(&self, state: CursorState) {
        self.state.store(state.pack(), Ordering::Release);
    }

    /// Operator picked an index: freeze the cursor there
    pub fn seek_manual(&self, index: usize) {
        self.store(CursorState {
            index,
            follow: false,
        });
    }

    /// Flip follow mode, keeping the index. Returns the new state.
    pub fn toggle_follow(&self) -> CursorState {
        let previous = self.state.fetch_xor(1, Ordering::AcqRel);
        CursorState::unpack(previous ^ 1)
    }

    /// Advance to `index` only if follow mode is on at the moment of the swap.
    ///
    /// Returns whether the cursor moved. A concurrent switch to manual mode
    /// always wins over the annotator.
    pub fn follow_to(&self, index: usize) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current & 1 == 0 {
                return false;
            }
            let next = CursorState {
                index,
                follow: true,
            }
            .pack();
            match self
                .state
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for PlaybackCursor {
    fn default() -> Self {
        Self::new()
    }
}
