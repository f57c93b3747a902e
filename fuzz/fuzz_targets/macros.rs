#![no_main]

use std::net::{IpAddr, Ipv6Addr};

use libfuzzer_sys::fuzz_target;
use spf_policy::{EvaluationContext, expand};

fuzz_target!(|data: &[u8]| {
    if let Ok(template) = std::str::from_utf8(data) {
        let context = EvaluationContext::new(
            IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0xcb01)),
            "email.example.com",
            Some("strong-bad@email.example.com"),
        );
        let _ = expand(template, &context, "email.example.com");
    }
});
