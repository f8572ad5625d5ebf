//! Robustness tests for edge cases and error conditions.
//!
//! These verify that list parsing and validation handle hostile or
//! unusual input gracefully.

use std::io::Cursor;

use listsync::ipset::AddressFamily;
use listsync::parser::{extract_token, tokens};
use listsync::validation::validate_token;

/// Large lists are streamed without trouble
#[test]
fn test_large_list_streaming() {
    let mut content = String::with_capacity(2_000_000);
    for i in 0..100_000u32 {
        let a = (i % 223 + 1) as u8;
        let b = ((i / 223) % 256) as u8;
        content.push_str(&format!("{}.{}.0.0/16\t# entry {}\n", a, b, i));
    }

    let count = tokens(Cursor::new(content.as_bytes()))
        .map(|t| t.unwrap())
        .filter(|t| validate_token(t, AddressFamily::Inet).is_ok())
        .count();

    assert_eq!(count, 100_000);
}

/// Unicode look-alikes never validate
#[test]
fn test_unicode_handling() {
    assert!(validate_token("１２３.０.０.１", AddressFamily::Inet).is_err()); // Full-width digits
    assert!(validate_token("192．168．1．1", AddressFamily::Inet).is_err()); // Full-width periods
    assert!(validate_token("192.168.1.1\u{200B}", AddressFamily::Inet).is_err()); // Zero-width space
}

/// A BOM at the start of a list spoils only the first line
#[test]
fn test_byte_order_mark() {
    let content = "\u{FEFF}1.0.1.0/24\n1.0.2.0/23\n";
    let all: Vec<String> = tokens(Cursor::new(content.as_bytes()))
        .map(|t| t.unwrap())
        .collect();
    assert_eq!(all.len(), 2);
    assert!(validate_token(&all[0], AddressFamily::Inet).is_err());
    assert!(validate_token(&all[1], AddressFamily::Inet).is_ok());
}

/// Lines that look like shell or ipset options stay inert tokens
#[test]
fn test_injection_like_lines() {
    assert_eq!(extract_token("-exist"), Some("-exist"));
    assert!(validate_token("-exist", AddressFamily::Inet).is_err());
    assert_eq!(extract_token("1.1.1.1;rm -rf /"), Some("1.1.1.1"));
    assert_eq!(extract_token("$(reboot)"), Some("$(reboot)"));
    assert!(validate_token("$(reboot)", AddressFamily::Inet).is_err());
}

/// Empty and whitespace inputs produce nothing
#[test]
fn test_empty_and_whitespace() {
    assert_eq!(extract_token(""), None);
    assert_eq!(extract_token(" \t "), None);
    assert_eq!(tokens(Cursor::new(b"\n\n\r\n   \n")).count(), 0);
}

/// Very long lines do not break the reader
#[test]
fn test_very_long_line() {
    let long = format!("1.0.1.0/24 {}\n2.0.0.0/8\n", "x".repeat(1_000_000));
    let all: Vec<String> = tokens(Cursor::new(long.as_bytes()))
        .map(|t| t.unwrap())
        .collect();
    assert_eq!(all, vec!["1.0.1.0/24", "2.0.0.0/8"]);
}
