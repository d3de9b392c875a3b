/// Coarse progress for one job.
///
/// Starts at the initial value once the operation is accepted and grows by a
/// fixed step per unfinished poll up to a cap below 100. The jump to 100 on
/// completion and the reset to 0 on failure belong to [`JobPatch`].
///
/// [`JobPatch`]: crate::job::JobPatch
#[derive(Debug, Clone, Copy)]
pub struct ProgressTracker {
    initial: u8,
    step: u8,
    cap: u8,
    current: u8,
}

pub const DEFAULT_INITIAL_PROGRESS: u8 = 10;
pub const PROGRESS_STEP: u8 = 5;
pub const PROGRESS_CAP: u8 = 90;

impl ProgressTracker {
    pub fn new(initial: u8) -> Self {
        Self::with_step(initial, PROGRESS_STEP, PROGRESS_CAP)
    }

    pub fn with_step(initial: u8, step: u8, cap: u8) -> Self {
        let cap = cap.min(99);
        Self {
            initial: initial.min(cap),
            step,
            cap,
            current: 0,
        }
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    /// The operation was accepted.
    pub fn start(&mut self) -> u8 {
        self.current = self.current.max(self.initial);
        self.current
    }

    /// A poll returned without the operation being done.
    pub fn advance(&mut self) -> u8 {
        self.current = self.current.saturating_add(self.step).min(self.cap).max(self.current);
        self.current
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_PROGRESS)
    }
}
