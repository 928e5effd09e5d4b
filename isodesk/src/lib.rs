//! Desktop automation inside an isolated, named desktop session.
//!
//! The engine discovers windows, resolves elements in their accessibility
//! trees and drives them through accessibility capabilities, with raw window
//! messages as an opt-in fallback. It is built to be invoked once per command
//! (see [`dispatch`]); nothing but the named desktop survives between
//! invocations.

use std::sync::Arc;

pub mod clock;
pub mod config;
pub mod coords;
pub mod dispatch;
pub mod element;
pub mod errors;
pub mod executor;
pub mod humanize;
pub mod keys;
pub mod locator;
pub mod platforms;
pub mod resolver;
pub mod selector;
pub mod session;
#[cfg(test)]
mod tests;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CapabilityFlags, CoordinateMode, EngineConfig};
pub use coords::CoordinateTransform;
pub use dispatch::{CommandError, CommandInvocation, CommandOutcome};
pub use element::{SerializableUIElement, UIElement, UIElementImpl};
pub use errors::AutomationError;
pub use executor::legacy::{LegacyInput, PathPoint};
pub use executor::{Action, ActionExecutor, ActionStrategy, CapabilityChain, NotSupported};
pub use humanize::{Humanizer, JitterConfig};
pub use locator::ElementLocator;
pub use platforms::Platform;
pub use resolver::WindowResolver;
pub use selector::Query;
pub use session::{SessionHandle, SessionManager};
pub use types::{Capability, Point, Rect, WindowHandle, WindowRef, WindowScope};

/// Wires configuration, platform seams, randomness and time together and
/// hands out the components a command needs.
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    platform: Platform,
    humanizer: Arc<Humanizer>,
    clock: Arc<dyn Clock>,
    locator: ElementLocator,
}

impl Engine {
    /// Engine on the native platform of this OS.
    pub fn new(config: EngineConfig) -> Result<Self, AutomationError> {
        Ok(Self::with_platform(config, platforms::create_platform()?))
    }

    pub fn with_platform(config: EngineConfig, platform: Platform) -> Self {
        Self {
            config,
            platform,
            humanizer: Arc::new(Humanizer::default()),
            clock: Arc::new(SystemClock),
            locator: ElementLocator::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_humanizer(mut self, humanizer: Humanizer) -> Self {
        self.humanizer = Arc::new(humanizer);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn locator(&self) -> ElementLocator {
        self.locator
    }

    pub fn sessions(&self) -> SessionManager {
        SessionManager::new(self.platform.desktops.clone())
    }

    /// Reopen the configured session if it exists and move this thread into it.
    pub fn enter_session(&self) -> Result<Option<SessionHandle>, AutomationError> {
        let Some(mut session) = self.sessions().open_existing(&self.config.desktop_name)? else {
            return Ok(None);
        };
        session.switch_in()?;
        Ok(Some(session))
    }

    pub fn resolver(&self, session: Option<&SessionHandle>) -> WindowResolver {
        WindowResolver::new(
            self.platform.desktops.clone(),
            self.platform.accessibility.clone(),
            self.clock.clone(),
            self.config.flags,
            self.config.poll_interval,
        )
        .with_session(session.map(SessionHandle::desktop))
    }

    pub fn transform(&self) -> CoordinateTransform {
        CoordinateTransform::new(
            self.platform.desktops.clone(),
            self.config.coordinate_mode,
            self.humanizer.clone(),
        )
    }

    pub fn legacy_input(&self) -> LegacyInput {
        LegacyInput::new(
            self.platform.input.clone(),
            self.transform(),
            self.humanizer.clone(),
            self.clock.clone(),
            self.config.flags,
        )
    }

    pub fn executor(&self, session: Option<&SessionHandle>) -> ActionExecutor {
        ActionExecutor::new(
            self.resolver(session),
            self.locator,
            self.transform(),
            self.legacy_input(),
            self.platform.accessibility.clone(),
        )
    }
}

/// Log to stderr so stdout stays reserved for the command payload.
///
/// The level comes from `LOG_LEVEL` (`error`, `warn`, `info`, `debug`);
/// `RUST_LOG` directives are honoured on top of it.
pub fn init_logging() {
    use tracing::Level;
    use tracing_subscriber::EnvFilter;

    let log_level = std::env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            "trace" => Level::TRACE,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
