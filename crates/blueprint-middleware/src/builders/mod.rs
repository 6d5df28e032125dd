//! Built-in middleware builders, one module per stage.

mod auth;
mod checks;
mod exception;
mod execution;
mod setup;
mod teardown;
mod telemetry;
mod validation;

pub use auth::{AuthenticationBuilder, AuthorisationBuilder};
pub use checks::OperationChecksBuilder;
pub use exception::{ExceptionHandlerFrame, EXCEPTION_LOCAL};
pub use execution::ExecutionStageBuilder;
pub use setup::SetupStageBuilder;
pub use teardown::TeardownStageBuilder;
pub use telemetry::PostExecuteTelemetryBuilder;
pub use validation::ValidationStageBuilder;
