//! Internet socket table from `/proc/net`

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tracing::debug;

use crate::proc_info::ProcessInspector;
use crate::snapshot::NetworkConnection;

/// `(table name, family, socket type)`
const TABLES: &[(&str, &str, &str)] = &[
    ("tcp", "inet", "tcp"),
    ("tcp6", "inet6", "tcp"),
    ("udp", "inet", "udp"),
    ("udp6", "inet6", "udp"),
];

/// All inet sockets with their owning pid where it can be resolved
pub fn capture_connections(processes: &dyn ProcessInspector) -> Vec<NetworkConnection> {
    let owners = socket_owners(processes);
    let mut connections = Vec::new();
    for (table, family, kind) in TABLES {
        let Some(contents) = processes.net_table(table) else {
            debug!(table, "Socket table unavailable");
            continue;
        };
        for mut connection in parse_table(&contents, family, kind) {
            connection.pid = owners.get(&connection.inode).copied();
            connections.push(connection);
        }
    }
    connections
}

/// Socket inode → pid, from every readable fd directory
fn socket_owners(processes: &dyn ProcessInspector) -> HashMap<u64, u32> {
    let mut owners = HashMap::new();
    for pid in processes.pids() {
        let Ok(inodes) = processes.socket_inodes(pid) else {
            continue;
        };
        for inode in inodes {
            owners.entry(inode).or_insert(pid);
        }
    }
    owners
}

/// Parse one `/proc/net/{tcp,udp}[6]` table, skipping the header and any
/// line that doesn't fit the layout
pub fn parse_table(contents: &str, family: &str, kind: &str) -> Vec<NetworkConnection> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 {
                return None;
            }
            let local = parse_socket_addr(fields[1])?;
            let remote = parse_socket_addr(fields[2])?;
            let state = u8::from_str_radix(fields[3], 16).ok()?;
            let inode = fields[9].parse().ok()?;
            Some(NetworkConnection {
                family: family.to_string(),
                kind: kind.to_string(),
                laddr: local.to_string(),
                raddr: (!remote.ip().is_unspecified() || remote.port() != 0).then(|| remote.to_string()),
                status: if kind == "tcp" { tcp_state(state) } else { "NONE" }.to_string(),
                inode,
                pid: None,
            })
        })
        .collect()
}

/// `0100007F:0277` → 127.0.0.1:631
///
/// Addresses are 32-bit words in host byte order; ports are plain hex.
fn parse_socket_addr(field: &str) -> Option<SocketAddr> {
    let (addr, port) = field.split_once(':')?;
    let port = u16::from_str_radix(port, 16).ok()?;
    let ip = match addr.len() {
        8 => IpAddr::V4(Ipv4Addr::from(parse_word(addr)?)),
        32 => {
            let mut octets = [0u8; 16];
            for (i, chunk) in octets.chunks_mut(4).enumerate() {
                chunk.copy_from_slice(&parse_word(&addr[i * 8..(i + 1) * 8])?);
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => return None,
    };
    Some(SocketAddr::new(ip, port))
}

fn parse_word(hex: &str) -> Option<[u8; 4]> {
    u32::from_str_radix(hex, 16).ok().map(u32::to_ne_bytes)
}

fn tcp_state(code: u8) -> &'static str {
    match code {
        0x01 => "ESTABLISHED",
        0x02 => "SYN_SENT",
        0x03 => "SYN_RECV",
        0x04 => "FIN_WAIT1",
        0x05 => "FIN_WAIT2",
        0x06 => "TIME_WAIT",
        0x07 => "CLOSE",
        0x08 => "CLOSE_WAIT",
        0x09 => "LAST_ACK",
        0x0A => "LISTEN",
        0x0B => "CLOSING",
        0x0C => "NEW_SYN_RECV",
        _ => "UNKNOWN",
    }
}
