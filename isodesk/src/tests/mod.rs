mod executor_tests;
mod resolver_tests;
mod session_tests;

use crate::clock::ManualClock;
use crate::config::{CapabilityFlags, EngineConfig};
use crate::humanize::{Humanizer, JitterConfig};
use crate::platforms::memory::{MemoryElement, MemoryPlatform, MemoryUIElement};
use crate::platforms::Platform;
use crate::types::{Rect, WindowHandle};
use crate::{Engine, UIElement};
use std::sync::Arc;

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_test_writer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}

/// An engine over a fresh in-memory desktop, virtual time and no jitter.
pub struct Harness {
    pub platform: MemoryPlatform,
    pub clock: Arc<ManualClock>,
    pub engine: Engine,
}

impl Harness {
    pub fn new(flags: CapabilityFlags) -> Self {
        init_tracing();
        let platform = MemoryPlatform::new();
        let clock = Arc::new(ManualClock::new());
        let config = EngineConfig {
            flags,
            ..EngineConfig::default()
        };
        let engine = Engine::with_platform(config, Platform::from_backend(Arc::new(platform.clone())))
            .with_clock(clock.clone())
            .with_humanizer(Humanizer::seeded(JitterConfig::none(), 7));
        Self {
            platform,
            clock,
            engine,
        }
    }

    pub fn desktop_name(&self) -> String {
        self.engine.config().desktop_name.clone()
    }

    /// Create the session desktop and put a window owned by `pid` on it.
    pub fn session_window(&self, pid: u32, title: &str, root: MemoryElement) -> WindowHandle {
        self.engine
            .sessions()
            .ensure(&self.desktop_name())
            .expect("session desktop");
        self.platform.add_window(
            Some(&self.desktop_name()),
            pid,
            title,
            Rect::new(0, 0, 800, 600),
            root,
        )
    }
}

/// The in-memory node behind a resolved element.
pub fn memory_node(element: &UIElement) -> MemoryElement {
    element
        .as_any()
        .downcast_ref::<MemoryUIElement>()
        .expect("in-memory element")
        .element()
        .clone()
}

pub fn window_root() -> MemoryElement {
    MemoryElement::new("Window")
        .name("Form")
        .bounds(Rect::new(0, 0, 800, 600))
}
