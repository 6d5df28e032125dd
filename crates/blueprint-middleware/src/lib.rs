//! # Blueprint Middleware
//!
//! The middleware composition model feeding Blueprint's code generator.
//!
//! Per operation, the [`composer::PipelineComposer`] walks nine fixed
//! stages and lets each matching [`builder::MiddlewareBuilder`] append
//! frames to the executor method:
//!
//! | Stage | Built-in builder | Contribution |
//! |-------|------------------|--------------|
//! | Setup | `SetupStageBuilder` | request id / operation trace preamble |
//! | Authentication | `AuthenticationBuilder` | identity presence check |
//! | Authorisation | `AuthorisationBuilder` | role check from the feature bag |
//! | Validation | `ValidationStageBuilder` | rule loop + short-circuit |
//! | OperationChecks | `OperationChecksBuilder` | build-time response audit |
//! | PreExecute | (none) | host extension point |
//! | Execution | `ExecutionStageBuilder` | awaited handler calls, result variable |
//! | PostExecute | `PostExecuteTelemetryBuilder` | read-only result telemetry |
//! | Teardown | `TeardownStageBuilder` | scope completion trace |
//!
//! The [`provider::InstanceFrameProvider`] is the DI seam: singleton
//! services hoist to constructor-injected fields, everything else
//! resolves from the dispatch scope inside the generated body.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod builder;
pub mod builders;
pub mod composer;
pub mod handlers;
pub mod provider;
pub mod stage;

pub use builder::{MiddlewareBuilder, MiddlewareBuilderContext};
pub use builders::{
    AuthenticationBuilder, AuthorisationBuilder, ExceptionHandlerFrame, ExecutionStageBuilder,
    OperationChecksBuilder, PostExecuteTelemetryBuilder, SetupStageBuilder, TeardownStageBuilder,
    ValidationStageBuilder, EXCEPTION_LOCAL,
};
pub use composer::PipelineComposer;
pub use handlers::{HandlerFn, HandlerRegistry, OperationHandler};
pub use provider::{GetRequiredServiceFrame, InstanceFrameProvider};
pub use stage::MiddlewareStage;
