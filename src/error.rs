//! Error types

use thiserror::Error;

use crate::device::DeviceError;

/// Errors surfaced by the controller and its setup path
#[derive(Debug, Error)]
pub enum DeckError {
    /// Device reported an image format or key count we cannot drive
    #[error("invalid key image format: {0}")]
    InvalidFormat(&'static str),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    /// More than one candidate device; the operator must pick one
    #[error("{count} candidate devices found, refusing to guess")]
    DeviceBusy { count: usize },
    #[error("device {operation} timed out after {timeout_ms} ms")]
    DeviceTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },
    #[error("device error during {operation}: {source}")]
    Device {
        operation: &'static str,
        #[source]
        source: DeviceError,
    },
    #[error("no key {0} on this device")]
    UnknownKey(u8),
    #[error("controller cannot {operation} while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: crate::types::ControllerState,
    },
    #[error("configuration error: {0}")]
    Config(String),
}

/// Label rasterization failures, recovered inside render
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("label font has no glyph for {0:?}")]
    MissingGlyph(char),
}
