//! Integration tests for the shared cookie store.

use ssochain_core::{ChainRequest, Cookie, CookieStore};
use std::sync::Arc;
use std::thread;
use url::Url;

#[test]
fn test_store_shared_between_requests() {
    let store = Arc::new(CookieStore::new());
    let first = ChainRequest::parse_get("http://127.0.0.1:8088/start", Arc::clone(&store)).unwrap();
    let second = ChainRequest::parse_get("http://127.0.0.1:8088/next", Arc::clone(&store)).unwrap();

    first
        .cookie_store
        .parse("session=abc; Path=/", &first.url)
        .unwrap();

    assert!(Arc::ptr_eq(&first.cookie_store, &second.cookie_store));
    assert_eq!(
        second.cookie_store.header_for(&second.url).as_deref(),
        Some("session=abc")
    );
}

#[test]
fn test_concurrent_inserts_are_not_lost() {
    let store = Arc::new(CookieStore::new());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let url = Url::parse("http://example.com/").unwrap();
                for j in 0..50 {
                    store.parse(&format!("c{i}_{j}=v; Path=/"), &url).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.len(), 400);
    let url = Url::parse("http://example.com/").unwrap();
    assert_eq!(store.cookies_for(&url).len(), 400);
}

#[test]
fn test_cookie_serialization_roundtrip() {
    let store = CookieStore::new();
    let url = Url::parse("https://example.com/app/login").unwrap();
    let cookie = store
        .parse("sid=v; Domain=example.com; Path=/app; Secure; Max-Age=3600", &url)
        .unwrap();
    assert!(cookie.secure);
    assert!(!cookie.host_only);
    assert!(cookie.expires.is_some());
    let json = serde_json::to_string(&cookie).unwrap();
    let parsed: Cookie = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, cookie);
}

#[test]
fn test_cookie_set_by_ip_host_not_sent_to_other_ip() {
    let store = CookieStore::new();
    let origin = Url::parse("http://127.0.0.1/").unwrap();

    assert!(store.parse("a=1; Domain=0.0.1", &origin).is_err());
    store.parse("b=2", &origin).unwrap();

    assert_eq!(store.header_for(&origin).as_deref(), Some("b=2"));
    assert!(store
        .header_for(&Url::parse("http://10.0.0.1/").unwrap())
        .is_none());
}
