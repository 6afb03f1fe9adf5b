//! KeyDeck - key image composition and event loop for StreamDeck style decks
//!
//! Renders a solid color and optional text label onto each key, converts the
//! result into the byte layout the deck firmware expects, and redraws keys as
//! they are pressed.
//!
//! ## Architecture
//! - **Surfaces**: one [`surface::KeySurface`] per key owns its pixel buffer
//! - **Pipeline**: label blend, horizontal mirror, channel reorder ([`display`])
//! - **Controller**: [`controller::DeckController`] owns the surfaces and the
//!   device session and serves key events one at a time
//! - **Channels**: the device driver reports transitions through a bounded
//!   queue from any thread
//! - **Device Abstraction**: transport and enumeration stay behind the
//!   [`device::DeckDevice`] and [`device::DeviceManager`] traits
//!
//! ## Example
//!
//! ```no_run
//! use embedded_graphics::pixelcolor::Rgb888;
//! use keydeck::config::DeckConfig;
//! use keydeck::controller::DeckController;
//! use keydeck::device::{DeckModel, SimulatedDeck, SimulatedManager};
//!
//! # fn main() -> Result<(), keydeck::error::DeckError> {
//! let mut manager = SimulatedManager::new(vec![SimulatedDeck::new(DeckModel::Original)]);
//! futures::executor::block_on(async {
//!     let mut deck = DeckController::initialize_from(&mut manager, DeckConfig::default()).await?;
//!     deck.set_key_color(2, Rgb888::new(0, 0, 255)).await?;
//!     deck.set_key_label(2, Some("tomten")).await?;
//!     deck.run().await
//! })
//! # }
//! ```

pub mod buttons;
pub mod channels;
pub mod config;
pub mod controller;
pub mod device;
pub mod display;
pub mod error;
pub mod surface;
pub mod types;

pub use controller::DeckController;
pub use error::{DeckError, RenderError};
pub use surface::KeySurface;
