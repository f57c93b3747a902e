//! Macro expansion, RFC 7208 section 7.
//!
//! Arguments of `a`, `mx`, `ptr`, `exists`, `include` and the `redirect`
//! modifier may contain `%{...}` macros which are replaced using the
//! evaluation context before the argument is used.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::{
    EvaluationContext, SpfError,
    context::{dotted_ip, ip_version_label},
};

/// `%{<letter><digits><r><delimiter>}`
static MACRO_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used, reason = "compile-time constant regex should be valid")]
    let regex =
        Regex::new(r"%\{([A-Za-z])(\d*)([rR]?)(.?)\}").expect("macro regex should be valid");
    regex
});

const ESCAPES: [(&str, &str); 3] = [("%%", "%"), ("%-", "%20"), ("%_", " ")];

/// Variables a macro may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroVariable {
    /// `s`: the sender address
    Sender,
    /// `l`: local part of the sender
    LocalPart,
    /// `o`: domain part of the sender
    SenderDomain,
    /// `d`: the domain currently being evaluated
    Domain,
    /// `i`: the client IP in dotted form
    Ip,
    /// `v`: `in-addr` or `ip6`
    IpVersion,
    /// `h`: the HELO domain
    Helo,
}

impl TryFrom<char> for MacroVariable {
    type Error = SpfError;

    /// Letters are case-insensitive. `p` (validated domain name) is not
    /// supported.
    fn try_from(letter: char) -> Result<Self, Self::Error> {
        match letter.to_ascii_lowercase() {
            's' => Ok(Self::Sender),
            'l' => Ok(Self::LocalPart),
            'o' => Ok(Self::SenderDomain),
            'd' => Ok(Self::Domain),
            'i' => Ok(Self::Ip),
            'v' => Ok(Self::IpVersion),
            'h' => Ok(Self::Helo),
            _ => Err(SpfError::perm(format!("unsupported macro type: '{letter}'"))),
        }
    }
}

impl MacroVariable {
    fn value(self, context: &EvaluationContext, domain: &str) -> String {
        match self {
            Self::Sender => context.sender().to_string(),
            Self::LocalPart => context.local_part().to_string(),
            Self::SenderDomain => context.sender_domain().to_string(),
            Self::Domain => domain.to_string(),
            Self::Ip => dotted_ip(context.ip()),
            Self::IpVersion => ip_version_label(context.ip()).to_string(),
            Self::Helo => context.helo_domain().to_string(),
        }
    }
}

/// Expands every macro in `template`.
///
/// `domain` is the domain whose record is being evaluated, which is what
/// `%{d}` refers to. Literal escapes (`%%`, `%-`, `%_`) are replaced first,
/// then each macro is transformed: its value is split on the delimiter
/// (default `.`), optionally reversed, truncated to the last N parts and
/// joined with `.`.
///
/// # Errors
///
/// Returns `PermError` for an unknown macro letter or a zero/oversized
/// digit transformer.
pub fn expand(
    template: &str,
    context: &EvaluationContext,
    domain: &str,
) -> Result<String, SpfError> {
    let value = unescape(template);

    let mut result = String::with_capacity(value.len());
    let mut end = 0;
    for captures in MACRO_REGEX.captures_iter(&value) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        result.push_str(&value[end..whole.start()]);
        result.push_str(&expand_one(&captures, context, domain)?);
        end = whole.end();
    }
    result.push_str(&value[end..]);

    Ok(result)
}

/// Checks the syntax of every macro in `template` without expanding it.
///
/// # Errors
///
/// Returns the `PermError` [`expand`] would return for the same template.
pub fn validate(template: &str) -> Result<(), SpfError> {
    let value = unescape(template);
    for captures in MACRO_REGEX.captures_iter(&value) {
        transformer(&captures)?;
    }
    Ok(())
}

fn unescape(template: &str) -> String {
    ESCAPES
        .iter()
        .fold(template.to_string(), |value, (escape, replacement)| {
            value.replace(escape, replacement)
        })
}

/// The variable and digit count of one macro.
fn transformer(captures: &Captures<'_>) -> Result<(MacroVariable, Option<usize>), SpfError> {
    let letter = captures
        .get(1)
        .and_then(|m| m.as_str().chars().next())
        .ok_or_else(|| SpfError::perm("failed to parse macro"))?;
    let variable = MacroVariable::try_from(letter)?;

    let digits = match captures.get(2).map(|m| m.as_str()) {
        None | Some("") => None,
        Some(digits) => match digits.parse::<usize>() {
            Ok(0) | Err(_) => {
                return Err(SpfError::perm(format!(
                    "invalid macro digit transformer: '{digits}'"
                )));
            }
            Ok(n) => Some(n),
        },
    };
    Ok((variable, digits))
}

fn expand_one(
    captures: &Captures<'_>,
    context: &EvaluationContext,
    domain: &str,
) -> Result<String, SpfError> {
    let (variable, digits) = transformer(captures)?;
    let reverse = captures.get(3).is_some_and(|m| !m.as_str().is_empty());
    let delimiter = captures
        .get(4)
        .and_then(|m| m.as_str().chars().next())
        .unwrap_or('.');

    let value = variable.value(context, domain);
    let mut parts: Vec<&str> = value.split(delimiter).collect();
    if reverse {
        parts.reverse();
    }
    if let Some(keep) = digits {
        let skip = parts.len().saturating_sub(keep);
        parts.drain(..skip);
    }

    Ok(parts.join("."))
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use pretty_assertions::assert_eq;

    use super::*;

    fn context() -> EvaluationContext {
        EvaluationContext::new(
            IpAddr::V4(Ipv4Addr::new(192, 0, 2, 3)),
            "email.example.com",
            Some("strong-bad@email.example.com"),
        )
    }

    fn expand_macro(template: &str) -> String {
        expand(template, &context(), "email.example.com").unwrap()
    }

    #[test]
    fn test_rfc7208_variables() {
        assert_eq!(expand_macro("%{s}"), "strong-bad@email.example.com");
        assert_eq!(expand_macro("%{o}"), "email.example.com");
        assert_eq!(expand_macro("%{d}"), "email.example.com");
        assert_eq!(expand_macro("%{l}"), "strong-bad");
        assert_eq!(expand_macro("%{i}"), "192.0.2.3");
        assert_eq!(expand_macro("%{v}"), "in-addr");
        assert_eq!(expand_macro("%{h}"), "unknown");
    }

    #[test]
    fn test_rfc7208_transformers() {
        assert_eq!(expand_macro("%{d4}"), "email.example.com");
        assert_eq!(expand_macro("%{d3}"), "email.example.com");
        assert_eq!(expand_macro("%{d2}"), "example.com");
        assert_eq!(expand_macro("%{d1}"), "com");
        assert_eq!(expand_macro("%{dr}"), "com.example.email");
        assert_eq!(expand_macro("%{d2r}"), "example.email");
        assert_eq!(expand_macro("%{l-}"), "strong.bad");
        assert_eq!(expand_macro("%{lr}"), "strong-bad");
        assert_eq!(expand_macro("%{lr-}"), "bad.strong");
        assert_eq!(expand_macro("%{l1r-}"), "strong");
    }

    #[test]
    fn test_rfc7208_compound_templates() {
        assert_eq!(
            expand_macro("%{ir}.%{v}._spf.%{d2}"),
            "3.2.0.192.in-addr._spf.example.com"
        );
        assert_eq!(
            expand_macro("%{lr-}.lp._spf.%{d2}"),
            "bad.strong.lp._spf.example.com"
        );
        assert_eq!(
            expand_macro("%{lr-}.lp.%{ir}.%{v}._spf.%{d2}"),
            "bad.strong.lp.3.2.0.192.in-addr._spf.example.com"
        );
        assert_eq!(
            expand_macro("%{ir}.%{v}.%{l1r-}.lp._spf.%{d2}"),
            "3.2.0.192.in-addr.strong.lp._spf.example.com"
        );
        assert_eq!(
            expand_macro("%{d2}.trusted-domains.example.net"),
            "example.com.trusted-domains.example.net"
        );
    }

    #[test]
    fn test_escapes() {
        assert_eq!(expand_macro("100%%"), "100%");
        assert_eq!(expand_macro("a%-b"), "a%20b");
        assert_eq!(expand_macro("a%_b"), "a b");
    }

    #[test]
    fn test_uses_current_domain() {
        let expanded = expand("%{d}", &context(), "_spf.example.net").unwrap();
        assert_eq!(expanded, "_spf.example.net");
    }

    #[test]
    fn test_ipv6_ip_macro() {
        let context = EvaluationContext::new(
            IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0xcb01)),
            "example.com",
            None,
        );
        assert_eq!(
            expand("%{ir}.%{v}", &context, "example.com").unwrap(),
            "1.0.b.c.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.8.b.d.0.1.0.0.2.ip6"
        );
    }

    #[test]
    fn test_unsupported_macro_is_permerror() {
        let error = expand("%{p}", &context(), "example.com").unwrap_err();
        assert!(error.is_permanent());

        let error = expand("%{x}.example.com", &context(), "example.com").unwrap_err();
        assert_eq!(error.reason(), "unsupported macro type: 'x'");
    }

    #[test]
    fn test_zero_digit_is_permerror() {
        assert!(expand("%{d0}", &context(), "example.com").is_err());
    }

    #[test]
    fn test_uppercase_letter() {
        assert_eq!(expand_macro("%{D2}"), "example.com");
    }

    #[test]
    fn test_validate() {
        assert!(validate("%{ir}.%{v}._spf.%{d2}").is_ok());
        assert!(validate("plain.example.com").is_ok());
        assert!(validate("%%{x}").is_err());
        assert_eq!(
            validate("%{x}.example.com").unwrap_err().reason(),
            "unsupported macro type: 'x'"
        );
        assert!(validate("%{d0}").unwrap_err().is_permanent());
    }
}
