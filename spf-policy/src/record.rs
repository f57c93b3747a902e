//! SPF record parsing and rendering.
//!
//! A record is the text `v=spf1` followed by space separated terms. Each term
//! is either a directive (an optional qualifier and a mechanism with an
//! optional `:argument`) or a `name=value` modifier.

use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};

use crate::{PolicyOutcome, SpfError, macros, mechanism::parse_network};

/// Version tag every SPF record starts with, including the separating space.
pub const SPF_VERSION_PREFIX: &str = "v=spf1 ";

/// Returns `true` if `text` carries the SPF version tag.
#[must_use]
pub fn is_spf_record(text: &str) -> bool {
    text.get(..SPF_VERSION_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(SPF_VERSION_PREFIX))
}

/// Prefix deciding the outcome when a directive matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Qualifier {
    /// `+`, the default when no qualifier is written
    #[default]
    Pass,
    /// `-`
    Fail,
    /// `~`
    SoftFail,
    /// `?`
    Neutral,
}

impl Qualifier {
    #[must_use]
    pub const fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '+' => Some(Self::Pass),
            '-' => Some(Self::Fail),
            '~' => Some(Self::SoftFail),
            '?' => Some(Self::Neutral),
            _ => None,
        }
    }

    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Self::Pass => '+',
            Self::Fail => '-',
            Self::SoftFail => '~',
            Self::Neutral => '?',
        }
    }

    /// The outcome a matching directive with this qualifier produces.
    #[must_use]
    pub const fn outcome(self) -> PolicyOutcome {
        match self {
            Self::Pass => PolicyOutcome::Pass,
            Self::Fail => PolicyOutcome::Fail,
            Self::SoftFail => PolicyOutcome::SoftFail,
            Self::Neutral => PolicyOutcome::Neutral,
        }
    }
}

/// The mechanisms defined by RFC 7208 section 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mechanism {
    A,
    All,
    Exists,
    Include,
    Ip4,
    Ip6,
    Mx,
    Ptr,
}

impl Mechanism {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::All => "all",
            Self::Exists => "exists",
            Self::Include => "include",
            Self::Ip4 => "ip4",
            Self::Ip6 => "ip6",
            Self::Mx => "mx",
            Self::Ptr => "ptr",
        }
    }

    /// Mechanisms that fall back to the current domain without an argument.
    #[must_use]
    pub const fn defaults_to_domain(self) -> bool {
        matches!(self, Self::A | Self::Mx | Self::Ptr)
    }
}

impl FromStr for Mechanism {
    type Err = SpfError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "a" => Ok(Self::A),
            "all" => Ok(Self::All),
            "exists" => Ok(Self::Exists),
            "include" => Ok(Self::Include),
            "ip4" => Ok(Self::Ip4),
            "ip6" => Ok(Self::Ip6),
            "mx" => Ok(Self::Mx),
            "ptr" => Ok(Self::Ptr),
            _ => Err(SpfError::perm(format!("unknown mechanism type: '{name}'"))),
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A qualified mechanism, e.g. `-ip4:192.0.2.0/24`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Directive {
    pub mechanism: Mechanism,
    pub qualifier: Qualifier,
    /// The raw, unexpanded argument after `:`
    pub argument: Option<String>,
}

impl Directive {
    #[must_use]
    pub const fn new(mechanism: Mechanism, qualifier: Qualifier, argument: Option<String>) -> Self {
        Self {
            mechanism,
            qualifier,
            argument,
        }
    }
}

/// Macros in the argument must be well formed, and an `ip4`/`ip6` network
/// without macros must parse, so both fail with the rest of the record.
impl FromStr for Directive {
    type Err = SpfError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let (name, argument) = match token.split_once(':') {
            Some((name, argument)) => (name, Some(argument)),
            None => (token, None),
        };

        let mut chars = name.chars();
        let (qualifier, name) = match chars.next().and_then(Qualifier::from_symbol) {
            Some(qualifier) => (qualifier, chars.as_str()),
            None => (Qualifier::default(), name),
        };
        let mechanism = name.parse::<Mechanism>()?;

        let argument = match argument {
            Some("") => {
                return Err(SpfError::perm(format!(
                    "missing argument for mechanism: '{token}'"
                )));
            }
            Some(_) if mechanism == Mechanism::All => {
                return Err(SpfError::perm(format!(
                    "unexpected argument for mechanism: '{token}'"
                )));
            }
            Some(argument) => {
                macros::validate(argument)?;
                if matches!(mechanism, Mechanism::Ip4 | Mechanism::Ip6) && !argument.contains('%') {
                    parse_network(mechanism, argument)?;
                }
                Some(argument.to_string())
            }
            None => None,
        };

        Ok(Self::new(mechanism, qualifier, argument))
    }
}

/// Renders the directive as it appears in a record, omitting `+`.
impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.qualifier != Qualifier::Pass {
            write!(f, "{}", self.qualifier.symbol())?;
        }
        write!(f, "{}", self.mechanism)?;
        if let Some(argument) = &self.argument {
            write!(f, ":{argument}")?;
        }
        Ok(())
    }
}

impl Serialize for Directive {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Renders a directive back to its textual form.
#[must_use]
pub fn record_unparse(directive: &Directive) -> String {
    directive.to_string()
}

/// One space separated term of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Directive(Directive),
    /// `redirect=<domain-spec>`
    Redirect(String),
    /// Any other modifier, `exp=` included. Kept for display only.
    Modifier { name: String, value: String },
}

impl Term {
    /// Parses one term.
    ///
    /// A term is a modifier when it has an `=` before any `:` or `/`.
    ///
    /// # Errors
    ///
    /// Returns `PermError` for an unknown mechanism, a malformed directive
    /// or macro, or an empty `redirect=` target.
    pub fn parse(token: &str) -> Result<Self, SpfError> {
        let modifier = token.find('=').filter(|&equals| {
            !token[..equals].contains([':', '/']) && equals > 0
        });

        let Some(equals) = modifier else {
            return token.parse().map(Self::Directive);
        };

        let (name, value) = (&token[..equals], &token[equals + 1..]);
        if name.eq_ignore_ascii_case("redirect") {
            if value.is_empty() {
                return Err(SpfError::perm("redirect modifier without a target"));
            }
            macros::validate(value)?;
            return Ok(Self::Redirect(value.to_string()));
        }

        Ok(Self::Modifier {
            name: name.to_ascii_lowercase(),
            value: value.to_string(),
        })
    }

    #[must_use]
    pub const fn as_directive(&self) -> Option<&Directive> {
        match self {
            Self::Directive(directive) => Some(directive),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directive(directive) => write!(f, "{directive}"),
            Self::Redirect(target) => write!(f, "redirect={target}"),
            Self::Modifier { name, value } => write!(f, "{name}={value}"),
        }
    }
}

/// A parsed SPF record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    terms: Vec<Term>,
}

impl Record {
    #[must_use]
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// The directives of the record, in order.
    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.terms.iter().filter_map(Term::as_directive)
    }

    /// The `redirect=` target, if the record has one.
    #[must_use]
    pub fn redirect(&self) -> Option<&str> {
        self.terms.iter().find_map(|term| match term {
            Term::Redirect(target) => Some(target.as_str()),
            _ => None,
        })
    }

    /// Returns `true` if any directive is an `all` mechanism.
    ///
    /// RFC 7208 section 6.1: `redirect` is ignored when `all` is present.
    #[must_use]
    pub fn has_all(&self) -> bool {
        self.directives()
            .any(|directive| directive.mechanism == Mechanism::All)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(SPF_VERSION_PREFIX.trim_end())?;
        for term in &self.terms {
            write!(f, " {term}")?;
        }
        Ok(())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Splits the body of a record into its raw tokens, dropping empty ones.
///
/// # Errors
///
/// Returns `PermError` if the version tag is missing or no tokens follow it.
pub fn tokenize(raw: &str) -> Result<Vec<&str>, SpfError> {
    if !is_spf_record(raw) {
        return Err(SpfError::perm("failed to parse spf data"));
    }

    let tokens: Vec<&str> = raw[SPF_VERSION_PREFIX.len()..]
        .split(' ')
        .filter(|token| !token.is_empty())
        .collect();

    if tokens.is_empty() {
        return Err(SpfError::perm("failed to parse spf record"));
    }
    Ok(tokens)
}

/// Parses a complete record. Every term is parsed, so a syntax error
/// anywhere in the record fails the whole record, as does a repeated
/// `redirect` or `exp` modifier.
///
/// # Errors
///
/// Returns `PermError` if the record or any of its terms is malformed.
pub fn parse_record(raw: &str) -> Result<Record, SpfError> {
    let terms = tokenize(raw)?
        .into_iter()
        .map(Term::parse)
        .collect::<Result<Vec<_>, _>>()?;

    // RFC 7208 section 6: each of these may appear at most once.
    let redirects = terms
        .iter()
        .filter(|term| matches!(term, Term::Redirect(_)))
        .count();
    let explanations = terms
        .iter()
        .filter(|term| matches!(term, Term::Modifier { name, .. } if name == "exp"))
        .count();
    if redirects > 1 || explanations > 1 {
        return Err(SpfError::perm("duplicate modifier in spf record"));
    }

    Ok(Record { terms })
}
