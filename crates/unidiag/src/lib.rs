//! Command-line front end for Unicode transport diagnostics.

use tracing_subscriber as _;

/// Human-readable and JSON report rendering.
pub mod render;
/// Transports fetching subject contents locally or from a device.
pub mod transport;
/// Directory walking with raw file-name bytes.
pub mod walk;
