//! The `utils` module provides definitions shared across `devicehub`:
//! the error taxonomy and logging initialisation.

pub mod error;
pub mod logging;

pub use error::{InternalError, RegistryError, RelayError, RouteError, TransportError};

#[cfg(test)]
mod tests {
    use super::error::{InternalError, RegistryError, RelayError};
    use super::logging;

    #[test]
    fn test_parse_level() {
        use tracing::level_filters::LevelFilter;

        assert_eq!(logging::parse_level("DEBUG"), LevelFilter::DEBUG);
        assert_eq!(logging::parse_level(" warning "), LevelFilter::WARN);
        assert_eq!(logging::parse_level("off"), LevelFilter::OFF);
        assert_eq!(logging::parse_level("bogus"), LevelFilter::INFO);
    }

    #[test]
    fn test_logging_init_is_repeatable() {
        assert_eq!(logging::init("debug"), tracing::level_filters::LevelFilter::DEBUG);
        logging::init("info");
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::NotFound("device 'x'".into());
        assert_eq!(err.to_string(), "not found: device 'x'");

        let err = RegistryError::from(InternalError::Timeout);
        assert_eq!(err.to_string(), "internal error: persistence deadline exceeded");
    }

    #[test]
    fn test_relay_error_display() {
        assert_eq!(RelayError::BufferFull.to_string(), "buffer full");
    }
}
