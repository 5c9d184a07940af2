//! Raw HTTP/1.1 wire rendering

use std::fmt::Write;

use crate::constants::UNKNOWN_HOST;
use crate::resolve::EffectiveRequest;

/// Request line, `Host`, resolved headers, `Content-Length` when a body is
/// present, a blank line, then the body. Every line ends in CRLF.
pub fn render(effective: &EffectiveRequest) -> String {
    let mut out = String::new();
    let host = if effective.host.is_empty() {
        UNKNOWN_HOST
    } else {
        effective.host.as_str()
    };

    let _ = write!(out, "{} {} HTTP/1.1\r\n", effective.method, effective.target);
    let _ = write!(out, "Host: {}\r\n", host);
    for header in &effective.headers {
        let _ = write!(out, "{}: {}\r\n", header.name, header.value);
    }

    let body = effective.body.as_str();
    if !body.is_empty() {
        let _ = write!(out, "Content-Length: {}\r\n", body.len());
    }
    out.push_str("\r\n");
    out.push_str(body);
    out
}
