//! Virtual keyboard implementations.
//!
//! The uinput keyboard is compiled only on Linux via `#[cfg(target_os = ...)]`;
//! the logging and recording keyboards work everywhere.

pub mod logging;
pub mod recording;

#[cfg(target_os = "linux")]
pub mod uinput;

use std::sync::Arc;

pub use logging::LoggingKeyboard;
pub use recording::RecordingKeyboard;
#[cfg(target_os = "linux")]
pub use uinput::UinputKeyboard;

use crate::application::{DeviceError, KeyDevice};
use crate::domain::DeviceKind;

/// Opens the keyboard selected by `kind`.
///
/// # Errors
///
/// Returns [`DeviceError::Init`] if the uinput device cannot be created, or
/// [`DeviceError::Unsupported`] for `uinput` on a non-Linux build.
pub fn open_device(kind: DeviceKind, name: &str) -> Result<Arc<dyn KeyDevice>, DeviceError> {
    match kind {
        DeviceKind::Log => Ok(Arc::new(LoggingKeyboard::new(name))),
        #[cfg(target_os = "linux")]
        DeviceKind::Uinput => Ok(Arc::new(UinputKeyboard::new(name)?)),
        #[cfg(not(target_os = "linux"))]
        DeviceKind::Uinput => Err(DeviceError::Unsupported(kind.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use padlink_core::KeyId;

    #[test]
    fn test_open_log_device_accepts_any_key() {
        let device = open_device(DeviceKind::Log, "test").unwrap();
        assert!(device.set_key_state(&KeyId::from("ArrowUp"), true).is_ok());
        assert!(device.set_key_state(&KeyId::from("Hyperdrive"), false).is_ok());
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn test_uinput_is_unsupported_off_linux() {
        assert!(matches!(
            open_device(DeviceKind::Uinput, "test"),
            Err(DeviceError::Unsupported(_))
        ));
    }
}
