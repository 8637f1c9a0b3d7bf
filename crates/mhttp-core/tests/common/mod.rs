#![allow(dead_code)]

pub mod media_server;

use mhttp_core::config::{HttpConfig, RetryConfig};

/// Deterministic body: byte `i` is `(i * 31 + i / 251) % 256`.
pub fn media_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 256) as u8).collect()
}

/// Config with short waits and no backoff so failure paths finish quickly.
pub fn test_config() -> HttpConfig {
    HttpConfig {
        read_wait_max_ms: 300,
        header_wait_ms: 2_000,
        connect_timeout_ms: 2_000,
        retry: Some(RetryConfig {
            base_delay_secs: 0.0,
            max_delay_secs: 0,
            ..RetryConfig::default()
        }),
        ..HttpConfig::default()
    }
}

pub fn read_to_end(session: &mut mhttp_core::Session) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; 8 * 1024];
    loop {
        let n = session.read(&mut buf).expect("read");
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}
