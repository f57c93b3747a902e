//! The policy evaluator: RFC 7208 `check_host()`.
//!
//! Fetches a domain's SPF record, evaluates its directives left to right
//! and follows `include` and `redirect` into other domains' records. One
//! [`SenderPolicy`] represents one question ("may this IP send for this
//! domain?") and remembers its answer.

use std::{
    net::{IpAddr, Ipv4Addr},
    sync::Arc,
};

use futures_util::{FutureExt, future::BoxFuture};
use tracing::{debug, instrument, warn};

use crate::{
    EvaluationContext, PolicyOutcome, SpfConfig, SpfError,
    audit::{AuditTrail, Diagnostics, DirectiveMatch},
    budget::QueryBudget,
    dns::{DnsError, QueryType, Resolver, TxtRecord},
    macros,
    record::{self, Mechanism, Record, Term},
};

/// How a record lookup was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookup {
    /// The domain the caller asked about
    Initial,
    /// The target of a `redirect=` modifier
    Redirect,
    /// The target of an `include:` mechanism
    Include,
}

/// State of one top-level evaluation, threaded through the recursion.
pub(crate) struct Evaluation<'a> {
    resolver: &'a dyn Resolver,
    pub(crate) context: &'a EvaluationContext,
    budget: QueryBudget,
    /// Domains whose records are being evaluated, outermost first
    active: Vec<String>,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Evaluation<'a> {
    pub(crate) fn new(
        resolver: &'a dyn Resolver,
        context: &'a EvaluationContext,
        query_limit: u32,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            resolver,
            context,
            budget: QueryBudget::new(query_limit),
            active: Vec::new(),
            diagnostics,
        }
    }

    /// Evaluates the SPF record of `domain`.
    ///
    /// Boxed because `include` and `redirect` recurse back into it.
    pub(crate) fn check_record(
        &mut self,
        domain: String,
        top_level: bool,
        lookup: Lookup,
    ) -> BoxFuture<'_, Result<PolicyOutcome, SpfError>> {
        async move {
            let domain = domain.trim_end_matches('.').to_string();
            if self
                .active
                .iter()
                .any(|active| active.eq_ignore_ascii_case(&domain))
            {
                return Err(SpfError::perm(format!("include loop detected at '{domain}'")));
            }

            let Some(record) = self.fetch_record(&domain, lookup).await? else {
                return match lookup {
                    Lookup::Initial => {
                        debug!("no spf record found for domain: {domain}");
                        Ok(PolicyOutcome::None)
                    }
                    Lookup::Include => Err(SpfError::perm(format!(
                        "no spf record found for included domain: '{domain}'"
                    ))),
                    Lookup::Redirect => Err(SpfError::perm(format!(
                        "no spf record found for redirect target: '{domain}'"
                    ))),
                };
            };

            self.active.push(domain.clone());
            let result = self.evaluate_record(&domain, &record, top_level).await;
            self.active.pop();
            result
        }
        .boxed()
    }

    async fn fetch_record(
        &mut self,
        domain: &str,
        lookup: Lookup,
    ) -> Result<Option<Record>, SpfError> {
        let answers = match self.lookup_txt(domain).await {
            Ok(answers) => answers,
            Err(err) if err.is_temporary() && lookup == Lookup::Initial => {
                warn!("treating {domain} as publishing no policy after: {err}");
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        let mut spf_records = answers
            .into_iter()
            .filter(|txt| txt.first().is_some_and(record::is_spf_record));
        let Some(txt) = spf_records.next() else {
            return Ok(None);
        };
        if spf_records.next().is_some() {
            warn!("multiple spf records published for {domain}, using the first");
        }

        let parsed = record::parse_record(&txt.concat())?;
        debug!(
            "parsing {} terms for domain: {domain}",
            parsed.terms().len()
        );
        self.diagnostics
            .records
            .push((domain.to_string(), parsed.clone()));
        Ok(Some(parsed))
    }

    async fn evaluate_record(
        &mut self,
        domain: &str,
        record: &Record,
        top_level: bool,
    ) -> Result<PolicyOutcome, SpfError> {
        if top_level {
            self.diagnostics
                .trail
                .begin(domain, record.directives().cloned().collect());
        }

        let mut index = 0;
        for term in record.terms() {
            let directive = match term {
                Term::Directive(directive) => directive,
                Term::Modifier { name, .. } => {
                    debug!("ignoring unsupported modifier '{name}' in record for {domain}");
                    continue;
                }
                Term::Redirect(target) => {
                    if record.has_all() {
                        warn!(
                            "ignoring redirect modifier to: {target} due to an existing 'all' mechanism"
                        );
                        continue;
                    }
                    let target = macros::expand(target, self.context, domain)?;
                    debug!("following redirect modifier to: {target}");

                    // A redirect ahead of every directive simply replaces the
                    // top-level record.
                    let fresh_top_level = top_level && index == 0;
                    if top_level && !fresh_top_level {
                        self.diagnostics.trail.set_domain(&target);
                    }
                    return self
                        .check_record(target, fresh_top_level, Lookup::Redirect)
                        .await;
                }
            };

            let mark = self.diagnostics.matches.len();
            let matched = self
                .evaluate(domain, directive.mechanism, directive.argument.as_deref())
                .await?;
            if !matched {
                self.diagnostics.matches.truncate(mark);
                index += 1;
                continue;
            }

            self.diagnostics.matches.insert(
                mark,
                DirectiveMatch {
                    domain: domain.to_string(),
                    directive: directive.clone(),
                },
            );
            if top_level {
                self.diagnostics.trail.set_matched(index);
            }
            debug!(
                "{} check found matching spf directive: '{directive}'",
                if top_level { "top" } else { "recursive" }
            );
            return Ok(directive.qualifier.outcome());
        }

        // RFC 7208 section 4.7
        debug!("no directives matched, returning default policy of neutral");
        Ok(PolicyOutcome::Neutral)
    }

    async fn lookup_txt(&mut self, name: &str) -> Result<Vec<TxtRecord>, SpfError> {
        self.budget.consume(QueryType::Txt, name)?;
        answer(self.resolver.txt_lookup(name).await)
    }

    pub(crate) async fn lookup_a(
        &mut self,
        name: &str,
    ) -> Result<Vec<Ipv4Addr>, SpfError> {
        self.budget.consume(QueryType::A, name)?;
        answer(self.resolver.ipv4_lookup(name).await)
    }

    /// A or AAAA records of `name`, matching the family of the client IP.
    pub(crate) async fn lookup_ips(&mut self, name: &str) -> Result<Vec<IpAddr>, SpfError> {
        if self.context.ip().is_ipv4() {
            let addrs = self.lookup_a(name).await?;
            return Ok(addrs.into_iter().map(IpAddr::V4).collect());
        }

        self.budget.consume(QueryType::Aaaa, name)?;
        let addrs = answer(self.resolver.ipv6_lookup(name).await)?;
        Ok(addrs.into_iter().map(IpAddr::V6).collect())
    }

    pub(crate) async fn lookup_mx(&mut self, name: &str) -> Result<Vec<String>, SpfError> {
        self.budget.consume(QueryType::Mx, name)?;
        answer(self.resolver.mx_lookup(name).await)
    }

    pub(crate) async fn lookup_ptr(&mut self, name: &str) -> Result<Vec<String>, SpfError> {
        self.budget.consume(QueryType::Ptr, name)?;
        answer(self.resolver.ptr_lookup(name).await)
    }
}

/// A name with nothing there is an empty answer; anything else is a `TempError`.
fn answer<T>(result: Result<Vec<T>, DnsError>) -> Result<Vec<T>, SpfError> {
    match result {
        Ok(records) => Ok(records),
        Err(err) if err.is_not_found() => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

/// Sender Policy Framework check for one (ip, domain, sender) identity.
///
/// The `exp` modifier defined in section 6.2 of RFC 7208 is not supported.
/// Use one instance per message: the result of [`Self::check_host`] is
/// computed once and cached.
#[derive(Debug)]
pub struct SenderPolicy {
    resolver: Arc<dyn Resolver>,
    context: EvaluationContext,
    config: SpfConfig,
    explicit_helo: bool,
    outcome: Option<Result<PolicyOutcome, SpfError>>,
    diagnostics: Diagnostics,
}

impl SenderPolicy {
    /// Creates a policy check.
    ///
    /// `sender` is the "MAIL FROM" identity; see [`EvaluationContext::new`]
    /// for how a missing or partial sender is completed.
    #[must_use]
    pub fn new(resolver: Arc<dyn Resolver>, ip: IpAddr, domain: &str, sender: Option<&str>) -> Self {
        Self {
            resolver,
            context: EvaluationContext::new(ip, domain, sender),
            config: SpfConfig::default(),
            explicit_helo: false,
            outcome: None,
            diagnostics: Diagnostics::default(),
        }
    }

    /// Applies evaluation settings.
    ///
    /// The configured HELO domain is used unless [`Self::with_helo_domain`]
    /// supplies one, in either order.
    #[must_use]
    pub fn with_config(mut self, config: SpfConfig) -> Self {
        if !self.explicit_helo {
            self.context = self.context.with_helo_domain(&config.helo_domain);
        }
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_helo_domain(mut self, helo_domain: &str) -> Self {
        self.context = self.context.with_helo_domain(helo_domain);
        self.explicit_helo = true;
        self
    }

    #[must_use]
    pub const fn context(&self) -> &EvaluationContext {
        &self.context
    }

    /// Checks the policy, querying DNS on the first call only.
    ///
    /// # Errors
    ///
    /// Returns `PermError` if the published policy is invalid and
    /// `TempError` if DNS failed while evaluating it.
    #[instrument(skip_all, fields(ip = %self.context.ip(), domain = %self.context.domain()))]
    pub async fn check_host(&mut self) -> Result<PolicyOutcome, SpfError> {
        if let Some(outcome) = &self.outcome {
            debug!("returning cached spf result");
            return outcome.clone();
        }

        let mut diagnostics = Diagnostics::default();
        let result = {
            let mut evaluation = Evaluation::new(
                self.resolver.as_ref(),
                &self.context,
                self.config.query_limit,
                &mut diagnostics,
            );
            let check =
                evaluation.check_record(self.context.domain().to_string(), true, Lookup::Initial);

            match self.config.timeout() {
                Some(limit) => tokio::time::timeout(limit, check)
                    .await
                    .unwrap_or_else(|_| {
                        Err(SpfError::temp(format!(
                            "evaluation timed out after {}s",
                            limit.as_secs()
                        )))
                    }),
                None => check.await,
            }
        };

        match &result {
            Ok(outcome) => debug!("spf policy result: {outcome}"),
            Err(err) => warn!("spf check failed: {err}"),
        }
        self.diagnostics = diagnostics;
        self.outcome = Some(result.clone());
        result
    }

    /// The cached result, if [`Self::check_host`] has run.
    #[must_use]
    pub const fn outcome(&self) -> Option<&Result<PolicyOutcome, SpfError>> {
        self.outcome.as_ref()
    }

    /// Evaluates a single mechanism against this identity's domain, with a
    /// fresh query budget.
    ///
    /// # Errors
    ///
    /// Returns `PermError` for an unknown mechanism or a malformed argument,
    /// and `TempError` if DNS fails.
    pub async fn evaluate_mechanism(
        &self,
        mechanism: &str,
        argument: Option<&str>,
    ) -> Result<bool, SpfError> {
        let mechanism = mechanism.parse::<Mechanism>()?;
        let mut diagnostics = Diagnostics::default();
        let mut evaluation = Evaluation::new(
            self.resolver.as_ref(),
            &self.context,
            self.config.query_limit,
            &mut diagnostics,
        );
        evaluation
            .evaluate(self.context.domain(), mechanism, argument)
            .await
    }

    /// Expands macros in `template` against this identity.
    ///
    /// # Errors
    ///
    /// Returns `PermError` for an unsupported macro.
    pub fn expand_macros(&self, template: &str) -> Result<String, SpfError> {
        macros::expand(template, &self.context, self.context.domain())
    }

    /// Top-level directives and which one matched.
    #[must_use]
    pub const fn audit(&self) -> &AuditTrail {
        &self.diagnostics.trail
    }

    /// Every record fetched, including those reached through `include`.
    #[must_use]
    pub fn records(&self) -> &[(String, Record)] {
        &self.diagnostics.records
    }

    /// The path of matching directives from the top-level record down to
    /// the record that decided the result.
    #[must_use]
    pub fn matches(&self) -> &[DirectiveMatch] {
        &self.diagnostics.matches
    }

    /// The directive that decided the result.
    #[must_use]
    pub fn matched(&self) -> Option<&DirectiveMatch> {
        self.diagnostics.matches.last()
    }
}
