//! config-rs/lib.rs
//! Shared configuration utilities for consistent service configuration
//! Provides standardized functions for port/address management

use std::env;
use std::net::SocketAddr;

/// Get service port from environment variables with proper fallback
///
/// # Arguments
/// * `service_name` - The name of the service (e.g., "DIAGNOSTICS", "NOTIFIER")
/// * `default_port` - The default port to use if not specified in environment
///
/// # Returns
/// The port number to use for the service
pub fn get_service_port(service_name: &str, default_port: u16) -> u16 {
    let var_name = format!("{}_SERVICE_PORT", service_name.to_uppercase());
    env::var(&var_name)
        .unwrap_or_else(|_| default_port.to_string())
        .parse::<u16>()
        .unwrap_or_else(|_| {
            log::warn!("Invalid port in {}, using default {}", var_name, default_port);
            default_port
        })
}

/// Create a SocketAddr for binding a service
///
/// # Arguments
/// * `service_name` - The name of the service (e.g., "DIAGNOSTICS", "NOTIFIER")
/// * `default_port` - The default port to use if not specified in environment
///
/// # Returns
/// A SocketAddr configured with the appropriate bind address and port
pub fn get_bind_address(service_name: &str, default_port: u16) -> SocketAddr {
    let var_name = format!("{}_SERVICE_ADDR", service_name.to_uppercase());

    // Check if there's a full address override
    if let Ok(addr_str) = env::var(&var_name) {
        if let Ok(addr) = addr_str.parse::<SocketAddr>() {
            return addr;
        } else {
            // Check if it's in http://host:port format
            if addr_str.starts_with("http://") || addr_str.starts_with("https://") {
                let addr_parts = addr_str.split("://").collect::<Vec<&str>>();
                if addr_parts.len() > 1 {
                    if let Ok(addr) = addr_parts[1].parse::<SocketAddr>() {
                        return addr;
                    }
                }
            }
            log::warn!("Invalid address format in {}, using default", var_name);
        }
    }

    // Use the port from environment or default
    let port = get_service_port(service_name, default_port);
    format!("0.0.0.0:{}", port).parse().unwrap()
}

/// Get client connection address for connecting to a service
///
/// # Arguments
/// * `service_name` - The name of the service (e.g., "DIAGNOSTICS", "NOTIFIER")
/// * `default_port` - The default port to use if not specified in environment
/// * `host` - Optional host to use if not specified in environment (default: "localhost")
///
/// # Returns
/// A connection string for the client to connect to the service
pub fn get_client_address(service_name: &str, default_port: u16, host: Option<&str>) -> String {
    let addr_var_name = format!("{}_SERVICE_ADDR", service_name.to_uppercase());
    let port_var_name = format!("{}_SERVICE_PORT", service_name.to_uppercase());

    // First check if there's a full address override
    if let Ok(addr) = env::var(&addr_var_name) {
        return addr;
    }

    // Then check for port override
    let port = env::var(&port_var_name)
        .unwrap_or_else(|_| default_port.to_string())
        .parse::<u16>()
        .unwrap_or(default_port);

    // Build the address with the host (default to localhost if not provided)
    let host = host.unwrap_or("localhost");
    format!("http://{}:{}", host, port)
}

/// Get service name for logging and monitoring
pub fn get_formatted_service_name(service_name: &str) -> String {
    match service_name {
        "DIAGNOSTICS" => "diagnostics-service".to_string(),
        "NOTIFIER" => "notifier-service".to_string(),
        _ => format!("{}-service", service_name.to_lowercase()),
    }
}

/// Get default port for a specific service
pub fn get_default_port(service_name: &str) -> u16 {
    match service_name.to_uppercase().as_str() {
        "DIAGNOSTICS" => 8089,
        "NOTIFIER" => 8088,
        _ => 8100, // Unknown services start at 8100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_service_port() {
        // Test with environment variable
        std::env::set_var("ANALYZER_SERVICE_PORT", "9000");
        assert_eq!(get_service_port("ANALYZER", 8000), 9000);

        // Test with default
        std::env::remove_var("UNKNOWN_SERVICE_PORT");
        assert_eq!(get_service_port("UNKNOWN", 8000), 8000);
    }

    #[test]
    fn test_get_client_address() {
        // Test with full address override
        std::env::set_var("OBSERVER_SERVICE_ADDR", "http://example.com:9000");
        assert_eq!(get_client_address("OBSERVER", 8000, None), "http://example.com:9000");

        // Test with port override
        std::env::remove_var("OBSERVER_SERVICE_ADDR");
        std::env::set_var("OBSERVER_SERVICE_PORT", "9000");
        assert_eq!(get_client_address("OBSERVER", 8000, None), "http://localhost:9000");

        // Test with default
        std::env::remove_var("MISSING_SERVICE_ADDR");
        std::env::remove_var("MISSING_SERVICE_PORT");
        assert_eq!(get_client_address("MISSING", 8000, None), "http://localhost:8000");

        // Test with custom host
        assert_eq!(get_client_address("MISSING", 8000, Some("service.local")), "http://service.local:8000");
    }

    #[test]
    fn test_get_default_port() {
        assert_eq!(get_default_port("DIAGNOSTICS"), 8089);
        assert_eq!(get_default_port("notifier"), 8088);
        assert_eq!(get_default_port("SOMETHING_ELSE"), 8100);
    }

    #[test]
    fn test_get_formatted_service_name() {
        assert_eq!(get_formatted_service_name("DIAGNOSTICS"), "diagnostics-service");
        assert_eq!(get_formatted_service_name("EXTRA"), "extra-service");
    }
}
