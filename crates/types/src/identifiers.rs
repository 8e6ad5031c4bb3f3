//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An isolated key-management execution environment.
///
/// Each level owns an independent key pool and receives independent CSR batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    /// Trusted execution environment (TEE) backed keys.
    TrustedEnvironment,
    /// Discrete secure element backed keys.
    StrongBox,
}

impl SecurityLevel {
    /// All known levels, in canonical order.
    pub const ALL: [SecurityLevel; 2] = [SecurityLevel::TrustedEnvironment, SecurityLevel::StrongBox];

    /// Short stable name, used for logging and persisted keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityLevel::TrustedEnvironment => "tee",
            SecurityLevel::StrongBox => "strongbox",
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Elliptic curve a level uses for its CSR endorsement chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EcCurve {
    P256,
    Curve25519,
}

impl fmt::Display for EcCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcCurve::P256 => f.write_str("P-256"),
            EcCurve::Curve25519 => f.write_str("Curve25519"),
        }
    }
}

/// One implementation (security level) exposed by the key store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImplInfo {
    pub security_level: SecurityLevel,
    pub supported_curve: EcCurve,
}

impl ImplInfo {
    pub fn new(security_level: SecurityLevel, supported_curve: EcCurve) -> Self {
        Self {
            security_level,
            supported_curve,
        }
    }
}

/// Persisted provisioning run identifier.
///
/// Incremented once per run start and carried through the run's logs and report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl RunId {
    /// Get the next run identifier.
    pub fn next(self) -> Self {
        RunId(self.0.wrapping_add(1))
    }

    /// Get the raw value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_level_names() {
        assert_eq!(SecurityLevel::TrustedEnvironment.to_string(), "tee");
        assert_eq!(SecurityLevel::StrongBox.to_string(), "strongbox");
    }

    #[test]
    fn test_security_level_serde_names() {
        let json = serde_json::to_string(&SecurityLevel::StrongBox).unwrap();
        assert_eq!(json, "\"strong_box\"");
        let parsed: SecurityLevel = serde_json::from_str("\"trusted_environment\"").unwrap();
        assert_eq!(parsed, SecurityLevel::TrustedEnvironment);
    }

    #[test]
    fn test_run_id_next() {
        assert_eq!(RunId(0).next(), RunId(1));
        assert_eq!(RunId(u64::MAX).next(), RunId(0));
        assert_eq!(RunId(7).to_string(), "run-7");
    }
}
