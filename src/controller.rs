//! Deck controller and event loop
//!
//! Owns the device session and one [`KeySurface`] per key. Key transitions
//! arrive through the event channel and are handled one at a time; a press
//! highlights the key and pressing the highest-index key ends the session.
//!
//! The session is released (reset + close) on every exit path: the exit key,
//! device loss, a failed initialization, or dropping the controller.

use std::sync::Arc;

use embassy_time::with_timeout;
use embedded_graphics::pixelcolor::Rgb888;
use heapless::Vec;
use log::{debug, error, info, warn};

use crate::buttons::KeyStates;
use crate::channels::{DeckEventChannel, KeyEventSender};
use crate::config::{DeckConfig, MAX_KEYS};
use crate::device::{select_single, DeckDevice, DeviceError, DeviceManager};
use crate::error::DeckError;
use crate::surface::KeySurface;
use crate::types::{check_key_count, ControllerState, DeckEvent, KeyEvent, APP_VERSION};

pub struct DeckController<D: DeckDevice> {
    device: D,
    config: DeckConfig,
    surfaces: Vec<KeySurface, MAX_KEYS>,
    key_states: KeyStates,
    events: Arc<DeckEventChannel>,
    state: ControllerState,
    /// Device opened and not yet closed
    session_open: bool,
}

impl<D: DeckDevice> DeckController<D> {
    /// Idle controller; nothing is sent to the device until [`Self::init`].
    pub fn new(device: D, config: DeckConfig) -> Self {
        Self {
            device,
            config,
            surfaces: Vec::new(),
            key_states: KeyStates::new(0),
            events: Arc::new(DeckEventChannel::new()),
            state: ControllerState::Idle,
            session_open: false,
        }
    }

    /// Open and prepare `device`, returning an initialized controller
    pub async fn initialize(device: D, config: DeckConfig) -> Result<Self, DeckError> {
        let mut controller = Self::new(device, config);
        controller.init().await?;
        Ok(controller)
    }

    /// Enumerate through `manager` and initialize the only deck found
    pub async fn initialize_from<M>(manager: &mut M, config: DeckConfig) -> Result<Self, DeckError>
    where
        M: DeviceManager<Device = D>,
    {
        let device = select_single(manager.enumerate())?;
        Self::initialize(device, config).await
    }

    /// Idle -> Initialized: open, reset, set brightness, build surfaces.
    pub async fn init(&mut self) -> Result<(), DeckError> {
        if self.state != ControllerState::Idle {
            return Err(self.invalid_state("initialize"));
        }
        self.config.validate()?;

        info!("Opening deck '{}'", self.device.name());
        match with_timeout(self.config.io_timeout(), self.device.open()).await {
            Ok(Ok(())) => self.session_open = true,
            Ok(Err(e)) => {
                self.state = ControllerState::Terminated;
                return Err(DeckError::DeviceUnavailable(format!("{}: {}", self.device.name(), e)));
            }
            Err(_) => {
                self.state = ControllerState::Terminated;
                return Err(DeckError::DeviceTimeout {
                    operation: "open",
                    timeout_ms: self.config.io_timeout_ms,
                });
            }
        }

        if let Err(e) = self.prepare_session() {
            error!("Deck setup failed: {}", e);
            if let Err(cleanup) = self.shutdown() {
                error!("Cleanup after failed setup: {}", cleanup);
            }
            return Err(e);
        }

        self.state = ControllerState::Initialized;
        self.print_startup_banner();
        Ok(())
    }

    fn prepare_session(&mut self) -> Result<(), DeckError> {
        self.device.reset().map_err(|source| DeckError::Device {
            operation: "reset",
            source,
        })?;
        self.device
            .set_brightness(self.config.brightness)
            .map_err(|source| DeckError::Device {
                operation: "set_brightness",
                source,
            })?;

        let key_count = self.device.key_count();
        check_key_count(key_count)?;
        let format = self.device.key_image_format();
        format.validate()?;

        self.surfaces.clear();
        for index in 0..key_count {
            let mut surface = KeySurface::new(index as u8, format, self.config.label)?;
            surface.clear();
            self.surfaces
                .push(surface)
                .map_err(|_| DeckError::InvalidFormat("device reports more keys than supported"))?;
        }
        self.key_states = KeyStates::new(key_count);
        self.device
            .register_key_callback(KeyEventSender::new(self.events.clone()));
        Ok(())
    }

    fn print_startup_banner(&self) {
        let format = self.device.key_image_format();
        info!("========================================");
        info!("KeyDeck v{}", APP_VERSION);
        info!("Deck: {}", self.device.name());
        info!("Keys: {}", self.surfaces.len());
        info!(
            "Key image: {}x{} {:?} {:?}",
            format.width,
            format.height,
            format.order.channels(),
            format.layout
        );
        info!("Brightness: {}%", self.config.brightness);
        info!("========================================");
        info!("Press key {} to exit.", self.exit_key());
    }

    /// Initialized -> Running; serve events until the session ends.
    ///
    /// Returns `Ok` after the exit key, an error after device loss or if
    /// releasing the device failed.
    pub async fn run(&mut self) -> Result<(), DeckError> {
        if self.state != ControllerState::Initialized {
            return Err(self.invalid_state("run"));
        }
        self.state = ControllerState::Running;
        info!("Controller running");

        let events = self.events.clone();
        while self.state == ControllerState::Running {
            match events.receive().await {
                DeckEvent::Key(event) => self.on_key_event(event).await?,
                DeckEvent::Disconnected => {
                    error!("Connection to '{}' lost", self.device.name());
                    if let Err(e) = self.shutdown() {
                        error!("Releasing lost device: {}", e);
                    }
                    return Err(DeckError::Device {
                        operation: "run",
                        source: DeviceError::Disconnected,
                    });
                }
            }
        }

        info!("Controller stopped");
        Ok(())
    }

    /// Handle one key transition.
    ///
    /// Only a failure while releasing the device on exit is returned; redraw
    /// failures are logged and the key is simply left stale.
    pub async fn on_key_event(&mut self, event: KeyEvent) -> Result<(), DeckError> {
        if self.state == ControllerState::Terminated {
            debug!("Session ended, ignoring {:?}", event);
            return Ok(());
        }

        let key = event.key as usize;
        if key >= self.surfaces.len() {
            warn!("Event for unknown key {} ignored", event.key);
            return Ok(());
        }

        info!(
            "Deck {} Key {} = {}",
            self.device.name(),
            event.key,
            if event.pressed { "pressed" } else { "released" }
        );
        if !self.key_states.set(key, event.pressed) {
            debug!("Key {} reported the same state twice", event.key);
        }
        debug!(
            "{} of {} keys held",
            self.key_states.pressed_count(),
            self.key_states.active_count()
        );

        if !event.pressed {
            return Ok(());
        }

        let surface = &mut self.surfaces[key];
        surface.fill(self.config.highlight_color());
        surface.set_label(Some(&self.config.press_marker));
        if let Err(e) = self.refresh(event.key).await {
            warn!("Redraw of key {} failed: {}", event.key, e);
        }

        if key == self.exit_key() {
            info!("Exit key {} pressed, shutting down", event.key);
            return self.shutdown();
        }
        Ok(())
    }

    /// Render a key and transfer it to the device
    pub async fn refresh(&mut self, key: u8) -> Result<(), DeckError> {
        self.ensure_live("refresh")?;
        let image = self
            .surfaces
            .get(key as usize)
            .ok_or(DeckError::UnknownKey(key))?
            .render();

        match with_timeout(self.config.io_timeout(), self.device.set_key_image(key, &image)).await {
            Ok(Ok(())) => {
                debug!("Key {} image sent ({} bytes)", key, image.len());
                Ok(())
            }
            Ok(Err(source)) => Err(DeckError::Device {
                operation: "set_key_image",
                source,
            }),
            Err(_) => Err(DeckError::DeviceTimeout {
                operation: "set_key_image",
                timeout_ms: self.config.io_timeout_ms,
            }),
        }
    }

    /// Fill a key with `color` and push it to the device
    pub async fn set_key_color(&mut self, key: u8, color: Rgb888) -> Result<(), DeckError> {
        self.live_surface_mut(key)?.fill(color);
        self.refresh(key).await
    }

    /// Set or remove a key's label and push it to the device
    pub async fn set_key_label(&mut self, key: u8, text: Option<&str>) -> Result<(), DeckError> {
        self.live_surface_mut(key)?.set_label(text);
        self.refresh(key).await
    }

    /// Blank a key and push it to the device
    pub async fn clear_key(&mut self, key: u8) -> Result<(), DeckError> {
        self.live_surface_mut(key)?.clear();
        self.refresh(key).await
    }

    /// Reset and close the device, ending the session.
    ///
    /// Close is attempted even if reset fails; the first failure is returned.
    /// Calling this again after the session ended does nothing.
    pub fn shutdown(&mut self) -> Result<(), DeckError> {
        self.state = ControllerState::Terminated;
        if !self.session_open {
            return Ok(());
        }
        self.session_open = false;

        let reset = self.device.reset().map_err(|source| DeckError::Device {
            operation: "reset",
            source,
        });
        let close = self.device.close().map_err(|source| DeckError::Device {
            operation: "close",
            source,
        });

        for result in [&reset, &close] {
            if let Err(e) = result {
                error!("Shutdown of '{}': {}", self.device.name(), e);
            }
        }
        info!("Deck '{}' released", self.device.name());
        reset.and(close)
    }

    /// Sender the device collaborator reports through; usable from any thread
    pub fn event_sender(&self) -> KeyEventSender {
        KeyEventSender::new(self.events.clone())
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ControllerState::Running
    }

    pub fn key_count(&self) -> usize {
        self.surfaces.len()
    }

    /// Highest-index key, whose press ends the session
    pub fn exit_key(&self) -> usize {
        self.surfaces.len().saturating_sub(1)
    }

    pub fn surfaces(&self) -> &[KeySurface] {
        &self.surfaces
    }

    pub fn surface(&self, key: u8) -> Option<&KeySurface> {
        self.surfaces.get(key as usize)
    }

    /// Mutable access for pre-seeding; call [`Self::refresh`] to transfer.
    pub fn surface_mut(&mut self, key: u8) -> Option<&mut KeySurface> {
        self.surfaces.get_mut(key as usize)
    }

    pub fn key_states(&self) -> &KeyStates {
        &self.key_states
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn config(&self) -> &DeckConfig {
        &self.config
    }

    fn live_surface_mut(&mut self, key: u8) -> Result<&mut KeySurface, DeckError> {
        self.ensure_live("update keys")?;
        self.surfaces.get_mut(key as usize).ok_or(DeckError::UnknownKey(key))
    }

    fn ensure_live(&self, operation: &'static str) -> Result<(), DeckError> {
        match self.state {
            ControllerState::Initialized | ControllerState::Running => Ok(()),
            _ => Err(self.invalid_state(operation)),
        }
    }

    fn invalid_state(&self, operation: &'static str) -> DeckError {
        DeckError::InvalidState {
            operation,
            state: self.state,
        }
    }
}

impl<D: DeckDevice> Drop for DeckController<D> {
    fn drop(&mut self) {
        if self.session_open {
            warn!("Controller dropped with '{}' still open", self.device.name());
            if let Err(e) = self.shutdown() {
                error!("Release on drop failed: {}", e);
            }
        }
    }
}
