use std::net::{Ipv4Addr, TcpListener};

/// Ports dev servers commonly bind to.
pub const COMMON_DEV_PORTS: [u16; 8] = [3000, 3001, 4200, 5173, 8080, 8000, 8888, 9000];

/// True when something already listens on `port` (we cannot bind it).
pub fn is_in_use(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_err()
}

/// The subset of `ports` currently in use, in input order.
pub fn scan(ports: &[u16]) -> Vec<u16> {
    ports.iter().copied().filter(|port| is_in_use(*port)).collect()
}

pub fn scan_common() -> Vec<u16> {
    scan(&COMMON_DEV_PORTS)
}
