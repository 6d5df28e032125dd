//! Middleware stages.
//!
//! Builders are registered into one of nine fixed stages and contribute
//! frames in stage order; within a stage, insertion order decides. The
//! stage list itself is closed: user code picks a slot, it never invents
//! one.

/// One slot in the fixed ordering of middleware contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum MiddlewareStage {
    /// Context preamble.
    Setup = 1,
    /// Caller identity establishment.
    Authentication = 2,
    /// Permission checks on the established identity.
    Authorisation = 3,
    /// Payload validation.
    Validation = 4,
    /// Build-time operation audits.
    OperationChecks = 5,
    /// Last frames before the handler calls.
    PreExecute = 6,
    /// Handler invocation; produces the result variable.
    Execution = 7,
    /// Read-only observation of the result.
    PostExecute = 8,
    /// Scope completion.
    Teardown = 9,
}

impl MiddlewareStage {
    /// Returns all stages in pipeline order.
    #[must_use]
    pub const fn all() -> [MiddlewareStage; 9] {
        [
            Self::Setup,
            Self::Authentication,
            Self::Authorisation,
            Self::Validation,
            Self::OperationChecks,
            Self::PreExecute,
            Self::Execution,
            Self::PostExecute,
            Self::Teardown,
        ]
    }

    /// Returns the stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Authentication => "authentication",
            Self::Authorisation => "authorisation",
            Self::Validation => "validation",
            Self::OperationChecks => "operation_checks",
            Self::PreExecute => "pre_execute",
            Self::Execution => "execution",
            Self::PostExecute => "post_execute",
            Self::Teardown => "teardown",
        }
    }

    /// Returns `true` if this stage runs before handler invocation.
    #[must_use]
    pub const fn is_pre_execution(self) -> bool {
        (self as u8) < (Self::Execution as u8)
    }
}

impl std::fmt::Display for MiddlewareStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordering() {
        assert!(MiddlewareStage::Setup < MiddlewareStage::Authentication);
        assert!(MiddlewareStage::Authentication < MiddlewareStage::Authorisation);
        assert!(MiddlewareStage::Authorisation < MiddlewareStage::Validation);
        assert!(MiddlewareStage::Validation < MiddlewareStage::OperationChecks);
        assert!(MiddlewareStage::OperationChecks < MiddlewareStage::PreExecute);
        assert!(MiddlewareStage::PreExecute < MiddlewareStage::Execution);
        assert!(MiddlewareStage::Execution < MiddlewareStage::PostExecute);
        assert!(MiddlewareStage::PostExecute < MiddlewareStage::Teardown);
    }

    #[test]
    fn test_all_is_in_order() {
        let all = MiddlewareStage::all();
        assert_eq!(all.len(), 9);
        for pair in all.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_pre_execution_split() {
        assert!(MiddlewareStage::Validation.is_pre_execution());
        assert!(!MiddlewareStage::Execution.is_pre_execution());
        assert!(!MiddlewareStage::PostExecute.is_pre_execution());
    }

    #[test]
    fn test_names() {
        assert_eq!(MiddlewareStage::Setup.name(), "setup");
        assert_eq!(MiddlewareStage::Authorisation.name(), "authorisation");
        assert_eq!(MiddlewareStage::Teardown.name(), "teardown");
    }
}
