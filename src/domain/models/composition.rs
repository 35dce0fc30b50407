//! Pattern kinds and composition operators.

use serde::{Deserialize, Serialize};

/// The named coordination strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Swarm,
    Pipeline,
    CircuitBreaker,
    GeneratorCritic,
    Hierarchical,
    MapReduce,
    Jury,
    ChainOfResponsibility,
    Adversarial,
    EventDriven,
}

impl PatternKind {
    pub const ALL: [Self; 10] = [
        Self::Swarm,
        Self::Pipeline,
        Self::CircuitBreaker,
        Self::GeneratorCritic,
        Self::Hierarchical,
        Self::MapReduce,
        Self::Jury,
        Self::ChainOfResponsibility,
        Self::Adversarial,
        Self::EventDriven,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Swarm => "swarm",
            Self::Pipeline => "pipeline",
            Self::CircuitBreaker => "circuit_breaker",
            Self::GeneratorCritic => "generator_critic",
            Self::Hierarchical => "hierarchical",
            Self::MapReduce => "map_reduce",
            Self::Jury => "jury",
            Self::ChainOfResponsibility => "chain_of_responsibility",
            Self::Adversarial => "adversarial",
            Self::EventDriven => "event_driven",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "swarm" => Some(Self::Swarm),
            "pipeline" => Some(Self::Pipeline),
            "circuit_breaker" => Some(Self::CircuitBreaker),
            "generator_critic" => Some(Self::GeneratorCritic),
            "hierarchical" => Some(Self::Hierarchical),
            "map_reduce" => Some(Self::MapReduce),
            "jury" => Some(Self::Jury),
            "chain_of_responsibility" => Some(Self::ChainOfResponsibility),
            "adversarial" => Some(Self::Adversarial),
            "event_driven" => Some(Self::EventDriven),
            _ => None,
        }
    }

    /// Patterns that fan agents out and compete for the agent pool.
    pub fn is_fan_out(&self) -> bool {
        matches!(self, Self::Swarm | Self::MapReduce | Self::Adversarial)
    }
}

/// How two composed patterns share state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeOperator {
    /// The first pattern's output is handed to the second
    Handoff,
    /// Both patterns read and write the same group state
    Shared,
}

impl ScopeOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Handoff => "handoff",
            Self::Shared => "shared",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "handoff" => Some(Self::Handoff),
            "shared" => Some(Self::Shared),
            _ => None,
        }
    }
}

/// How two composed patterns are sequenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceOperator {
    /// `;` - the second starts after the first completes
    Sequential,
    /// `||` - both run concurrently
    Parallel,
}

impl SequenceOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => ";",
            Self::Parallel => "||",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            ";" | "seq" | "sequential" => Some(Self::Sequential),
            "||" | "par" | "parallel" => Some(Self::Parallel),
            _ => None,
        }
    }
}

/// A requested pairing of two patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositionRequest {
    pub first: PatternKind,
    pub second: PatternKind,
    pub scope: ScopeOperator,
    pub sequence: SequenceOperator,
}

/// Verdict of the composition gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompositionReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub scope_trace: Vec<String>,
}

impl CompositionReport {
    pub fn reject(mut self, error: impl Into<String>) -> Self {
        self.valid = false;
        self.errors.push(error.into());
        self
    }

    pub fn warn(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_round_trip() {
        for kind in PatternKind::ALL {
            assert_eq!(PatternKind::parse_str(kind.as_str()), Some(kind));
        }
        assert_eq!(PatternKind::parse_str("CIRCUIT-BREAKER"), Some(PatternKind::CircuitBreaker));
        assert_eq!(PatternKind::parse_str("nope"), None);
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!(ScopeOperator::parse_str("handoff"), Some(ScopeOperator::Handoff));
        assert_eq!(SequenceOperator::parse_str(";"), Some(SequenceOperator::Sequential));
        assert_eq!(SequenceOperator::parse_str("||"), Some(SequenceOperator::Parallel));
        assert_eq!(SequenceOperator::parse_str("&"), None);
    }

    #[test]
    fn test_fan_out_patterns() {
        assert!(PatternKind::Swarm.is_fan_out());
        assert!(PatternKind::MapReduce.is_fan_out());
        assert!(!PatternKind::Pipeline.is_fan_out());
    }
}
