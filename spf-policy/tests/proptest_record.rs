//! Property-based tests for record parsing and macro expansion
//!
//! These tests generate random directives and templates and verify that
//! parsing and expansion are robust and consistent.

use std::net::{IpAddr, Ipv4Addr};

use proptest::prelude::*;
use spf_policy::{
    Directive, EvaluationContext, Mechanism, Qualifier, expand, parse_record, record_unparse,
};

fn qualifier_strategy() -> impl Strategy<Value = Qualifier> {
    prop_oneof![
        Just(Qualifier::Pass),
        Just(Qualifier::Fail),
        Just(Qualifier::SoftFail),
        Just(Qualifier::Neutral),
    ]
}

/// Strategy to generate valid domain names
#[allow(
    clippy::expect_used,
    reason = "compile-time constant regex should be valid"
)]
fn domain_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{3,10}\\.[a-z]{2,5}").expect("domain regex should be valid")
}

/// Strategy to generate directives whose argument (if any) is valid for
/// the mechanism
fn directive_strategy() -> impl Strategy<Value = Directive> {
    let mechanism = prop_oneof![
        Just(Mechanism::A),
        Just(Mechanism::Mx),
        Just(Mechanism::Ptr),
        Just(Mechanism::Exists),
        Just(Mechanism::Include),
    ];
    let named = (mechanism, qualifier_strategy(), proptest::option::of(domain_strategy()))
        .prop_map(|(mechanism, qualifier, argument)| {
            let argument = argument.or_else(|| {
                (!mechanism.defaults_to_domain()).then(|| "example.com".to_string())
            });
            Directive::new(mechanism, qualifier, argument)
        });

    let ip4 = (qualifier_strategy(), any::<[u8; 4]>(), 0u8..=32).prop_map(
        |(qualifier, octets, prefix)| {
            let network = format!("{}/{prefix}", Ipv4Addr::from(octets));
            Directive::new(Mechanism::Ip4, qualifier, Some(network))
        },
    );

    let all = qualifier_strategy().prop_map(|qualifier| Directive::new(Mechanism::All, qualifier, None));

    prop_oneof![named, ip4, all]
}

fn context() -> EvaluationContext {
    EvaluationContext::new(
        IpAddr::V4(Ipv4Addr::new(192, 0, 2, 3)),
        "example.com",
        Some("strong-bad@email.example.com"),
    )
}

proptest! {
    /// A directive rendered back to text parses to the same directive
    #[test]
    fn test_directive_unparse_parses_back(directive in directive_strategy()) {
        let text = record_unparse(&directive);
        let parsed: Directive = text.parse().unwrap();
        prop_assert_eq!(parsed, directive);
    }

    /// A record made of valid directives parses and renders unchanged
    #[test]
    fn test_record_display_is_stable(directives in prop::collection::vec(directive_strategy(), 1..8)) {
        let body: Vec<String> = directives.iter().map(record_unparse).collect();
        let raw = format!("v=spf1 {}", body.join(" "));

        let record = parse_record(&raw).unwrap();
        prop_assert_eq!(record.to_string(), raw);
        prop_assert_eq!(record.directives().count(), directives.len());
    }

    /// Text without `%` is never changed by expansion
    #[test]
    fn test_expand_without_macros_is_identity(template in "[^%]{0,64}") {
        let expanded = expand(&template, &context(), "example.com").unwrap();
        prop_assert_eq!(expanded, template);
    }

    /// Parsing arbitrary input never panics
    #[test]
    fn test_parse_record_never_panics(raw in "v=spf1 [ -~]{0,128}") {
        let _ = parse_record(&raw);
    }

    /// Expanding arbitrary input never panics
    #[test]
    fn test_expand_never_panics(template in "[ -~]{0,64}") {
        let _ = expand(&template, &context(), "example.com");
    }
}
