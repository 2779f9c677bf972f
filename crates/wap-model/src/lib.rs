pub mod audit;
pub mod config;
pub mod context;
pub mod error;
pub mod relation;
pub mod rules;
pub mod run;
pub mod table;
pub mod time;

pub use audit::{AuditReport, CheckResult};
pub use config::{
    DeletionMode, PipelineConfig, ScheduleConfig, StagingDescriptor, WarehouseConfig,
};
pub use context::RunContext;
pub use error::{BoxError, ConfigError, FailureKind, Result, WapError};
pub use relation::{Layer, RelationRef};
pub use rules::{
    ColumnFilter, EventCatalogJoin, JoinProjection, JoinSide, MatchPair, Projection, RankedDedup,
    SurrogateIdentity, TimeParts, TransformRule,
};
pub use run::{RunFailure, RunRecord, RunStatus};
pub use table::{
    CheckKind, LoadStrategy, QualityCheck, QualityCheckSpec, TableDescriptor, TableRole,
    TransformScope,
};
