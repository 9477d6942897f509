pub mod context;
pub mod correlation;
pub mod executor;
pub mod metadata;
pub mod orchestrator;
pub mod policy;
pub mod resolver;

pub use context::{MigrationContext, Phase};
pub use correlation::CorrelationMap;
pub use executor::{MigrationExecutor, StepOutcome};
pub use orchestrator::{MigrationOrchestrator, MigrationReport, MigrationState, StepReport};
pub use policy::{GenericPolicy, PolicyRegistry, TransformationPolicy};
pub use resolver::MappingResolver;
