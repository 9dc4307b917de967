/// Serde helper functions for custom serialization/deserialization
use serde::{Deserialize, Deserializer, Serializer};

/// Serialize a signal by its name ("SIGSEGV") rather than its number
pub mod signal_name {
    use super::*;
    use nix::sys::signal::Signal;
    use std::str::FromStr;

    pub fn serialize<S>(signal: &Signal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(signal.as_str())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Signal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Signal::from_str(&name).map_err(serde::de::Error::custom)
    }
}

/// Serialize Duration as fractional seconds
pub mod duration_secs {
    use super::*;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Skip serializing if value is default (for use with skip_serializing_if)
pub fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    value == &T::default()
}

/// Skip serializing if Option is None
pub fn is_none<T>(value: &Option<T>) -> bool {
    value.is_none()
}

/// Skip serializing if bool is false
pub fn is_false(value: &bool) -> bool {
    !value
}
