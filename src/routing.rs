//! Size-based routing between direct storage and the relay process

use crate::config::Settings;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Store through the intake process
    Direct,
    /// Hand off to the relay process
    Relay,
}

/// `Direct` up to and including the ceiling, `Relay` above it
pub fn decide(size_bytes: u64, direct_size_ceiling: u64) -> Route {
    if size_bytes <= direct_size_ceiling {
        Route::Direct
    } else {
        Route::Relay
    }
}

/// Why an inbound file was turned away before routing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntakeRejection {
    #[error("File of {size} bytes exceeds the transport ceiling of {ceiling} bytes")]
    OversizeForTransport { size: u64, ceiling: u64 },

    #[error("File type not allowed: {0}")]
    InvalidFileType(String),
}

#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    direct_size_ceiling: u64,
    transport_ceiling: u64,
    allowed_extensions: Vec<String>,
}

impl RoutingPolicy {
    pub fn new(
        direct_size_ceiling: u64,
        transport_ceiling: u64,
        allowed_extensions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            direct_size_ceiling,
            transport_ceiling,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| {
                    let ext: String = ext.into();
                    ext.trim_start_matches('.').to_lowercase()
                })
                .collect(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.direct_size_ceiling_bytes,
            settings.transport_ceiling_bytes,
            settings.allowed_extensions.iter().cloned(),
        )
    }

    pub fn direct_size_ceiling(&self) -> u64 {
        self.direct_size_ceiling
    }

    pub fn transport_ceiling(&self) -> u64 {
        self.transport_ceiling
    }

    pub fn decide(&self, size_bytes: u64) -> Route {
        decide(size_bytes, self.direct_size_ceiling)
    }

    pub fn is_allowed_type(&self, file_name: &str) -> bool {
        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .is_some_and(|ext| self.allowed_extensions.contains(&ext))
    }

    /// Transport ceiling, then file type, then the size decision
    pub fn admit(&self, file_name: &str, size_bytes: u64) -> Result<Route, IntakeRejection> {
        if size_bytes > self.transport_ceiling {
            return Err(IntakeRejection::OversizeForTransport {
                size: size_bytes,
                ceiling: self.transport_ceiling,
            });
        }

        if !self.is_allowed_type(file_name) {
            return Err(IntakeRejection::InvalidFileType(file_name.to_string()));
        }

        Ok(self.decide(size_bytes))
    }
}
