// Foreground lifecycle policy: which events create and which tear down the engine

/// Platform version at or below which the engine is released on pause and
/// recreated on resume.
pub const LEGACY_PLATFORM_CUTOVER: u32 = 23;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForegroundEvent {
    Start,
    Resume,
    Pause,
    Stop,
}

/// What the controller should do for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Create the engine if there is none
    Create,
    /// Release the engine if there is one
    Release,
    Nothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Create on start and release on stop, keeping the engine alive while
    /// the app is visible but paused. When false the engine follows
    /// resume/pause instead.
    pub eager_foreground_recreate: bool,
}

impl LifecyclePolicy {
    pub const EAGER: LifecyclePolicy = LifecyclePolicy {
        eager_foreground_recreate: true,
    };

    pub const LEGACY: LifecyclePolicy = LifecyclePolicy {
        eager_foreground_recreate: false,
    };

    pub fn from_platform_version(version: u32, cutover: u32) -> Self {
        LifecyclePolicy {
            eager_foreground_recreate: version > cutover,
        }
    }

    pub fn action(self, event: ForegroundEvent) -> LifecycleAction {
        match (event, self.eager_foreground_recreate) {
            (ForegroundEvent::Start, true) => LifecycleAction::Create,
            (ForegroundEvent::Start, false) => LifecycleAction::Nothing,
            // Resume always makes sure an engine exists
            (ForegroundEvent::Resume, _) => LifecycleAction::Create,
            (ForegroundEvent::Pause, true) => LifecycleAction::Nothing,
            (ForegroundEvent::Pause, false) => LifecycleAction::Release,
            (ForegroundEvent::Stop, true) => LifecycleAction::Release,
            (ForegroundEvent::Stop, false) => LifecycleAction::Nothing,
        }
    }
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self::EAGER
    }
}
