//! Integration tests: open, read, seek and link reuse against a local server.

mod common;

use std::io::{Read, Seek, SeekFrom};

use common::media_server::{self, ServerOptions};
use mhttp_core::pool::PoolKey;
use mhttp_core::session::{ConnState, SeekCapability};
use mhttp_core::transport::LinkFlags;
use mhttp_core::{HttpClient, HttpError, OpenOptions, Whence};

#[test]
fn open_reports_size_and_reads_advance_offset() {
    let body = common::media_body(64 * 1024);
    let server = media_server::start(body.clone());
    let client = HttpClient::new(common::test_config());

    let mut s = client.open(&server.url("/media.ts")).expect("open");
    assert_eq!(s.size(), Some(body.len() as u64));
    assert_eq!(s.last_status(), Some(200));
    assert_eq!(s.state(), ConnState::Ready);
    assert!(s.is_seekable());

    let mut buf = vec![0u8; 512];
    let mut got = 0;
    while got < 512 {
        let n = s.read(&mut buf[got..]).unwrap();
        assert!(n > 0);
        got += n;
    }
    assert_eq!(s.offset(), 512);
    assert_eq!(&buf[..], &body[..512]);

    let reqs = server.requests();
    assert_eq!(reqs.len(), 1);
    assert!(reqs[0].starts_with("GET /media.ts HTTP/1.1\r\n"));
    assert!(reqs[0].contains("Connection: keep-alive\r\n"));
    assert!(!reqs[0].contains("Range:"));
}

#[test]
fn seek_sends_range_and_reads_from_target() {
    let body = common::media_body(64 * 1024);
    let server = media_server::start(body.clone());
    let client = HttpClient::new(common::test_config());

    let mut s = client.open(&server.url("/media.ts")).unwrap();
    assert_eq!(s.seek(40_000, Whence::Set).unwrap(), 40_000);
    let rest = common::read_to_end(&mut s);
    assert_eq!(rest, &body[40_000..]);
    assert_eq!(s.offset(), body.len() as u64);
    assert_eq!(s.capability(), SeekCapability::Ranged);

    let reqs = server.requests();
    assert!(reqs.last().unwrap().contains("Range: bytes=40000-\r\n"));
}

#[test]
fn seek_back_to_zero_matches_fresh_open() {
    let body = common::media_body(20_000);
    let server = media_server::start(body.clone());
    let client = HttpClient::new(common::test_config());

    let mut s = client.open(&server.url("/media.ts")).unwrap();
    let mut head = vec![0u8; 1000];
    s.read(&mut head).unwrap();
    assert_eq!(s.seek(0, Whence::Set).unwrap(), 0);
    assert_eq!(common::read_to_end(&mut s), body);
}

#[test]
fn seek_relative_and_size_queries() {
    let body = common::media_body(10_000);
    let server = media_server::start(body.clone());
    let client = HttpClient::new(common::test_config());

    let mut s = client.open(&server.url("/media.ts")).unwrap();
    assert_eq!(s.seek(0, Whence::Size).unwrap(), 10_000);
    assert_eq!(s.seek(0, Whence::Current).unwrap(), 0);
    assert_eq!(s.seek(-100, Whence::End).unwrap(), 9_900);
    assert_eq!(common::read_to_end(&mut s), &body[9_900..]);
    assert_eq!(s.seek(-500, Whence::Current).unwrap(), 9_500);
    assert_eq!(common::read_to_end(&mut s), &body[9_500..]);
}

#[test]
fn seek_outside_resource_is_out_of_range() {
    let body = common::media_body(4_096);
    let server = media_server::start(body);
    let client = HttpClient::new(common::test_config());

    let mut s = client.open(&server.url("/media.ts")).unwrap();
    let requests_before = server.requests().len();
    let err = s.seek(4_096, Whence::Set).unwrap_err();
    assert!(err.is_out_of_range(), "got {err:?}");
    assert!(s.seek(-1, Whence::Set).unwrap_err().is_out_of_range());
    assert!(s.seek(1, Whence::End).unwrap_err().is_out_of_range());
    assert_eq!(s.offset(), 0);
    assert_eq!(server.requests().len(), requests_before);
}

#[test]
fn ignored_range_falls_back_to_read_and_discard() {
    let body = common::media_body(50_000);
    let opts = ServerOptions {
        support_ranges: false,
        ..ServerOptions::default()
    };
    let server = media_server::start_with_options(body.clone(), opts);
    let client = HttpClient::new(common::test_config());

    let mut s = client
        .open_with(
            &server.url("/media.ts"),
            OpenOptions {
                offset: 30_000,
                ..OpenOptions::default()
            },
        )
        .unwrap();
    assert_eq!(s.capability(), SeekCapability::Discard);
    let mut buf = vec![0u8; 1_000];
    let mut got = 0;
    while got < buf.len() {
        got += s.read(&mut buf[got..]).unwrap();
    }
    assert_eq!(&buf[..], &body[30_000..31_000]);
    assert_eq!(s.offset(), 31_000);

    assert!(server.requests()[0].contains("Range: bytes=30000-\r\n"));

    // A later seek still lands on the right byte.
    s.seek(10, Whence::Set).unwrap();
    let mut small = [0u8; 10];
    let mut got = 0;
    while got < small.len() {
        got += s.read(&mut small[got..]).unwrap();
    }
    assert_eq!(&small[..], &body[10..20]);
}

#[test]
fn chunked_body_reads_fully_and_is_not_seekable() {
    let body = common::media_body(12_345);
    let opts = ServerOptions {
        chunked: true,
        ..ServerOptions::default()
    };
    let server = media_server::start_with_options(body.clone(), opts);
    let client = HttpClient::new(common::test_config());

    let mut s = client.open(&server.url("/media.ts")).unwrap();
    assert_eq!(s.size(), None);
    assert!(!s.is_seekable());
    assert!(matches!(s.seek(100, Whence::Set), Err(HttpError::NotSeekable)));
    assert!(matches!(s.seek(0, Whence::Size), Err(HttpError::NotSeekable)));
    assert_eq!(common::read_to_end(&mut s), body);
    assert_eq!(s.offset(), body.len() as u64);
}

#[test]
fn gzip_body_is_decoded() {
    let body = common::media_body(40_000);
    let opts = ServerOptions {
        gzip: true,
        ..ServerOptions::default()
    };
    let server = media_server::start_with_options(body.clone(), opts);
    let client = HttpClient::new(common::test_config());

    let mut s = client.open(&server.url("/media.ts")).unwrap();
    assert!(!s.is_seekable());
    assert_eq!(common::read_to_end(&mut s), body);
    assert_eq!(s.offset(), body.len() as u64);
}

#[test]
fn gzip_over_chunked_is_decoded() {
    let body = common::media_body(25_000);
    let opts = ServerOptions {
        gzip: true,
        chunked: true,
        ..ServerOptions::default()
    };
    let server = media_server::start_with_options(body.clone(), opts);
    let client = HttpClient::new(common::test_config());

    let mut s = client.open(&server.url("/media.ts")).unwrap();
    assert_eq!(common::read_to_end(&mut s), body);
}

#[test]
fn finished_session_returns_link_to_pool() {
    let body = common::media_body(8_000);
    let server = media_server::start(body.clone());
    let client = HttpClient::new(common::test_config());

    let mut first = client.open(&server.url("/media.ts")).unwrap();
    assert_eq!(common::read_to_end(&mut first), body);
    first.close();
    assert_eq!(first.state(), ConnState::Idle);
    drop(first);
    let key = PoolKey::from_url(&server.url("/"), LinkFlags {
        less_wait: true,
        via_proxy: false,
    })
    .unwrap();
    assert_eq!(client.pool().idle_count(&key), 1);

    let mut second = client.open(&server.url("/media.ts")).unwrap();
    assert_eq!(common::read_to_end(&mut second), body);
    assert_eq!(server.connections(), 1);
    assert_eq!(server.requests().len(), 2);
}

#[test]
fn request_rebinds_session_on_the_same_link() {
    let body = common::media_body(3_000);
    let server = media_server::start(body.clone());
    let client = HttpClient::new(common::test_config());

    let mut s = client.open(&server.url("/a.ts")).unwrap();
    assert_eq!(common::read_to_end(&mut s), body);
    s.request(&server.url("/b.ts")).unwrap();
    assert_eq!(s.offset(), 0);
    assert!(s.location().ends_with("/b.ts"));
    assert_eq!(common::read_to_end(&mut s), body);
    assert_eq!(server.connections(), 1);
}

#[test]
fn half_read_session_does_not_return_link() {
    let body = common::media_body(100_000);
    let server = media_server::start(body);
    let client = HttpClient::new(common::test_config());

    let mut s = client.open(&server.url("/media.ts")).unwrap();
    let mut buf = [0u8; 100];
    s.read(&mut buf).unwrap();
    drop(s);
    let key = PoolKey::from_url(&server.url("/media.ts"), LinkFlags {
        less_wait: true,
        via_proxy: false,
    })
    .unwrap();
    assert_eq!(client.pool().idle_count(&key), 0);

    let _again = client.open(&server.url("/media.ts")).unwrap();
    assert_eq!(server.connections(), 2);
}

#[test]
fn custom_headers_are_sent_and_defaults_not_duplicated() {
    let body = common::media_body(100);
    let server = media_server::start(body);
    let client = HttpClient::new(common::test_config());

    let opts = OpenOptions {
        headers: "X-Client: test\r\nUser-Agent: custom/1.0".to_string(),
        ..OpenOptions::default()
    };
    let _s = client.open_with(&server.url("/media.ts"), opts).unwrap();
    let req = &server.requests()[0];
    assert!(req.contains("X-Client: test\r\n"));
    assert!(req.contains("User-Agent: custom/1.0\r\n"));
    assert_eq!(req.matches("User-Agent:").count(), 1);
}

#[test]
fn std_io_traits_read_and_seek() {
    let body = common::media_body(9_000);
    let server = media_server::start(body.clone());
    let client = HttpClient::new(common::test_config());

    let mut s = client.open(&server.url("/media.ts")).unwrap();
    assert_eq!(Seek::seek(&mut s, SeekFrom::Start(1_000)).unwrap(), 1_000);
    let mut buf = vec![0u8; 2_000];
    s.read_exact(&mut buf).unwrap();
    assert_eq!(&buf[..], &body[1_000..3_000]);

    let err = Seek::seek(&mut s, SeekFrom::End(0)).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);

    let mut rest = Vec::new();
    s.read_to_end(&mut rest).unwrap();
    assert_eq!(&rest[..], &body[3_000..]);
}
