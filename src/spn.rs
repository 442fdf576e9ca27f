use crate::error::{HandshakeError, Result};

/// Builds the service principal name of the peer.
///
/// Without a service class the host name is used as is. Otherwise the name has the
/// `ServiceClass/hostname` form, e.g. `HTTP/gateway.example.com`.
pub fn make_spn(service_class: Option<&str>, hostname: &str) -> Result<String> {
    if hostname.is_empty() {
        return Err(HandshakeError::InvalidTargetName(String::from("host name is empty")));
    }

    let Some(service_class) = service_class else {
        return Ok(hostname.to_owned());
    };

    if service_class.is_empty() || service_class.contains('/') {
        return Err(HandshakeError::InvalidTargetName(format!(
            "invalid service class: {:?}",
            service_class
        )));
    }

    Ok(format!("{}/{}", service_class, hostname))
}
