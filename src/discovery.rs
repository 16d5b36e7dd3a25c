//! Server connection discovery.
//!
//! When the page never issued a metadata request we could observe, the
//! server's address comes from the plex.tv resource directory. Both the
//! v2 (`<resource>`/`<connection>`) and the older
//! (`<Device>`/`<Connection>`) response shapes are accepted.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::metadata::{attributes, MetadataError};
use crate::models::ServerCacheEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Connection {
    scheme: String,
    host: String,
    port: u16,
    local: bool,
    relay: bool,
}

impl Connection {
    fn from_attributes(mut attrs: std::collections::HashMap<String, String>) -> Option<Self> {
        let flag = |v: Option<String>| matches!(v.as_deref(), Some("1") | Some("true"));
        let local = flag(attrs.remove("local"));
        let relay = flag(attrs.remove("relay"));

        // Prefer the uri: plex.direct hostnames are what the TLS cert covers.
        if let Some(uri) = attrs.get("uri").and_then(|u| url::Url::parse(u).ok()) {
            if let (Some(host), Some(port)) = (uri.host_str(), uri.port_or_known_default()) {
                return Some(Self {
                    scheme: uri.scheme().to_string(),
                    host: host.to_string(),
                    port,
                    local,
                    relay,
                });
            }
        }

        Some(Self {
            scheme: attrs.remove("protocol").unwrap_or_else(|| "https".to_string()),
            host: attrs.remove("address").filter(|a| !a.is_empty())?,
            port: attrs.remove("port")?.parse().ok()?,
            local,
            relay,
        })
    }
}

fn is_device(name: &[u8]) -> bool {
    matches!(name, b"resource" | b"Device")
}

fn is_connection(name: &[u8]) -> bool {
    matches!(name, b"connection" | b"Connection")
}

/// Find `server_id` in a directory response and pick its connection:
/// the first remote, non-relay connection, else the first one listed.
///
/// Returns `Ok(None)` when the server is not listed or has no usable
/// connection.
pub fn parse_resources(
    xml: &str,
    server_id: &str,
    timestamp: i64,
) -> Result<Option<ServerCacheEntry>, MetadataError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_target = false;
    let mut server_name: Option<String> = None;
    let mut connections: Vec<Connection> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if is_device(e.local_name().as_ref()) => {
                if in_target {
                    break;
                }
                let mut attrs = attributes(&e);
                if attrs.get("clientIdentifier").map(String::as_str) == Some(server_id) {
                    in_target = true;
                    server_name = attrs.remove("name");
                }
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if in_target && is_connection(e.local_name().as_ref()) =>
            {
                connections.extend(Connection::from_attributes(attributes(&e)));
            }
            Ok(Event::End(e)) if in_target && is_device(e.local_name().as_ref()) => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(MetadataError::Malformed(e.to_string())),
            _ => {}
        }
    }

    let chosen = connections
        .iter()
        .find(|c| !c.local && !c.relay)
        .or_else(|| connections.first());

    Ok(chosen.map(|c| {
        let local: Vec<String> = connections
            .iter()
            .filter(|c| c.local)
            .map(|c| c.host.clone())
            .collect();
        ServerCacheEntry {
            address: c.host.clone(),
            port: c.port,
            scheme: c.scheme.clone(),
            local_addresses: (!local.is_empty()).then_some(local),
            server_name: server_name.clone(),
            timestamp,
        }
    }))
}

/// Connection details from a server URL seen on an intercepted request.
pub fn entry_from_server_url(server_url: &str, timestamp: i64) -> Option<ServerCacheEntry> {
    let parsed = url::Url::parse(server_url).ok()?;
    Some(ServerCacheEntry {
        address: parsed.host_str()?.to_string(),
        port: parsed.port_or_known_default()?,
        scheme: parsed.scheme().to_string(),
        local_addresses: None,
        server_name: None,
        timestamp,
    })
}
