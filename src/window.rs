//! Window definitions.
//!
//! A [`WindowDefinition`] is either a sliding window (tumbling is the special case
//! where the slide equals the frame length) or a session window. The planner
//! dispatches on [`WindowKind`]: tumbling and sliding windows share one physical
//! shape, session windows have their own.
//!
//! Sliding windows are executed frame by frame. [`SlidingWindowPolicy`] describes
//! the frame grid: frames are `slide_by` long, and a window spans
//! `frame_length / slide_by` consecutive frames.

use crate::error::CompileError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds since UNIX epoch (UTC).
pub type TimestampMs = i64;

/// Window shape requested by a windowed aggregation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowDefinition {
    /// Windows of `frame_length` ms starting every `slide_by` ms.
    Sliding { frame_length: i64, slide_by: i64 },
    /// Windows that close after `inactivity_gap` ms without events for a key.
    Session { inactivity_gap: i64 },
}

/// Classification used for expansion dispatch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WindowKind {
    Tumbling,
    Sliding,
    Session,
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WindowKind::Tumbling => "tumbling",
            WindowKind::Sliding => "sliding",
            WindowKind::Session => "session",
        })
    }
}

impl WindowDefinition {
    #[must_use]
    pub fn tumbling(size: i64) -> Self {
        WindowDefinition::Sliding {
            frame_length: size,
            slide_by: size,
        }
    }

    #[must_use]
    pub fn sliding(frame_length: i64, slide_by: i64) -> Self {
        WindowDefinition::Sliding {
            frame_length,
            slide_by,
        }
    }

    #[must_use]
    pub fn session(inactivity_gap: i64) -> Self {
        WindowDefinition::Session { inactivity_gap }
    }

    #[must_use]
    pub fn kind(&self) -> WindowKind {
        match *self {
            WindowDefinition::Sliding {
                frame_length,
                slide_by,
            } if frame_length == slide_by => WindowKind::Tumbling,
            WindowDefinition::Sliding { .. } => WindowKind::Sliding,
            WindowDefinition::Session { .. } => WindowKind::Session,
        }
    }

    /// Reject definitions the runtime could not execute.
    ///
    /// # Errors
    ///
    /// [`CompileError::InvalidWindow`] for non-positive lengths or a slide that
    /// does not evenly divide the frame length.
    pub fn validate(&self) -> Result<(), CompileError> {
        match *self {
            WindowDefinition::Sliding {
                frame_length,
                slide_by,
            } => {
                if frame_length <= 0 || slide_by <= 0 {
                    return Err(CompileError::InvalidWindow {
                        reason: format!(
                            "frame length ({frame_length}) and slide ({slide_by}) must be positive"
                        ),
                    });
                }
                if frame_length % slide_by != 0 {
                    return Err(CompileError::InvalidWindow {
                        reason: format!(
                            "slide ({slide_by}) must evenly divide frame length ({frame_length})"
                        ),
                    });
                }
                Ok(())
            }
            WindowDefinition::Session { inactivity_gap } if inactivity_gap <= 0 => {
                Err(CompileError::InvalidWindow {
                    reason: format!("session gap ({inactivity_gap}) must be positive"),
                })
            }
            WindowDefinition::Session { .. } => Ok(()),
        }
    }

    /// Frame policy for sliding and tumbling windows; `None` for sessions and
    /// for sliding definitions with non-positive lengths.
    #[must_use]
    pub fn sliding_policy(&self) -> Option<SlidingWindowPolicy> {
        match *self {
            WindowDefinition::Sliding {
                frame_length,
                slide_by,
            } if frame_length > 0 && slide_by > 0 => {
                Some(SlidingWindowPolicy::new(slide_by, 0, frame_length / slide_by))
            }
            WindowDefinition::Sliding { .. } | WindowDefinition::Session { .. } => None,
        }
    }
}

/// Frame grid of a sliding window.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlidingWindowPolicy {
    frame_size: i64,
    frame_offset: i64,
    frames_per_window: i64,
}

impl SlidingWindowPolicy {
    #[must_use]
    pub fn new(frame_size: i64, frame_offset: i64, frames_per_window: i64) -> Self {
        debug_assert!(frame_size > 0 && frames_per_window > 0);
        Self {
            frame_size,
            frame_offset: frame_offset.rem_euclid(frame_size),
            frames_per_window,
        }
    }

    #[must_use]
    pub fn frame_size(&self) -> i64 {
        self.frame_size
    }

    #[must_use]
    pub fn window_size(&self) -> i64 {
        self.frame_size * self.frames_per_window
    }

    #[must_use]
    pub fn is_tumbling(&self) -> bool {
        self.frames_per_window == 1
    }

    /// Start of the frame containing `ts`.
    #[inline]
    #[must_use]
    pub fn floor_frame_ts(&self, ts: TimestampMs) -> TimestampMs {
        div_floor(ts - self.frame_offset, self.frame_size) * self.frame_size + self.frame_offset
    }

    /// End of the frame containing `ts`, which is where the frame is keyed.
    #[inline]
    #[must_use]
    pub fn higher_frame_ts(&self, ts: TimestampMs) -> TimestampMs {
        self.floor_frame_ts(ts) + self.frame_size
    }

    /// The window ending at `frame_end`, as `[start, end)`.
    #[must_use]
    pub fn window_ending_at(&self, frame_end: TimestampMs) -> (TimestampMs, TimestampMs) {
        (frame_end - self.window_size(), frame_end)
    }
}

impl fmt::Display for SlidingWindowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame={}ms, window={}ms",
            self.frame_size,
            self.window_size()
        )
    }
}

/// Floor division for i64 (unlike `/` which truncates toward zero).
#[inline]
fn div_floor(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if (r != 0) && ((r > 0) != (b > 0)) { q - 1 } else { q }
}
