//! Allocation backtrace capture.
//!
//! Records where a pooled allocation was made so dumps and leak reports
//! can point at more than the immediate call site.

use std::fmt;

/// A backtrace captured when an allocation was made.
#[derive(Clone)]
pub struct AllocationTrace {
    backtrace: backtrace::Backtrace,
}

impl AllocationTrace {
    /// Capture the current stack, resolving symbols lazily.
    pub fn capture() -> Self {
        Self {
            backtrace: backtrace::Backtrace::new_unresolved(),
        }
    }

    /// Resolved frames formatted for a dump.
    pub fn render(&self) -> String {
        let mut backtrace = self.backtrace.clone();
        backtrace.resolve();
        format!("{:?}", backtrace)
    }

    /// Number of captured frames.
    pub fn depth(&self) -> usize {
        self.backtrace.frames().len()
    }
}

impl fmt::Debug for AllocationTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocationTrace")
            .field("frames", &self.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_has_frames() {
        let trace = AllocationTrace::capture();
        assert!(trace.depth() > 0);
        assert!(format!("{:?}", trace).contains("frames"));
    }
}
