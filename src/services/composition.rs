//! Composition gate: validates pattern pairings before dispatch.
//!
//! The gate is authoritative: the dispatcher refuses to enter a composed
//! pattern whose pairing fails validation.

use crate::domain::models::{
    CompositionReport, CompositionRequest, PatternKind, ScopeOperator, SequenceOperator,
};

/// Validates pattern compositions under scope and sequencing operators.
pub struct CompositionGate;

impl CompositionGate {
    /// Validate a pairing. Errors make the composition invalid; warnings
    /// accompany a valid verdict.
    pub fn validate(request: &CompositionRequest) -> CompositionReport {
        let CompositionRequest { first, second, scope, sequence } = *request;

        let mut report = CompositionReport {
            valid: true,
            ..Default::default()
        };
        report.scope_trace.push(format!(
            "{} {} {} under {}",
            first.as_str(),
            sequence.as_str(),
            second.as_str(),
            scope.as_str(),
        ));

        // Nested hierarchical coordination cycles through parent links.
        if first == PatternKind::Hierarchical && second == PatternKind::Hierarchical {
            return report.reject(
                "hierarchical cannot nest inside hierarchical: parent/child links would cycle",
            );
        }

        // A breaker wraps anything downstream of it.
        if first == PatternKind::CircuitBreaker && sequence == SequenceOperator::Sequential {
            report
                .scope_trace
                .push("circuit_breaker governs the downstream pattern".to_string());
            return report;
        }

        // Sequential pipelines chain naturally when artifacts are handed off.
        if first == PatternKind::Pipeline
            && second == PatternKind::Pipeline
            && sequence == SequenceOperator::Sequential
        {
            return match scope {
                ScopeOperator::Handoff => {
                    report
                        .scope_trace
                        .push("stage artifacts of the first feed stage 0 of the second".to_string());
                    report
                }
                ScopeOperator::Shared => report.reject(
                    "pipeline ; pipeline requires handoff scope: shared artifacts would \
                     collide on stage indices",
                ),
            };
        }

        // Two concurrent fan-out patterns compete for the same agent pool.
        if first.is_fan_out() && second.is_fan_out() && sequence == SequenceOperator::Parallel {
            report = report.warn(format!(
                "{} || {} contend for the agent pool; expect admission advisories",
                first.as_str(),
                second.as_str(),
            ));
        }

        // Sharing one group id between two swarm-counted patterns breaks the
        // distinct-sender completion metric.
        if scope == ScopeOperator::Shared
            && first.is_fan_out()
            && second.is_fan_out()
            && first != second
        {
            report = report.warn(
                "shared scope merges both groups' done-counting; completion may fire early",
            );
        }

        report
    }
}
