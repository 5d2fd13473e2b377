pub mod config;
pub mod domain;
pub mod errors;
pub mod planning;

pub use domain::item::{ItemKey, PlanningItem};
pub use domain::scenario::{Assumptions, ScenarioName};
pub use domain::status::DecisionStatus;
pub use domain::value::{FieldValue, ScenarioValue};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use planning::{
    aggregate, reconcile, AggregationRules, ExportTable, FieldOutcome, ImportReport, ImportRow,
    NumericPolicy, PlanningSession, PlanningTable, ScreenKind, ScreenProfile, Snapshot, Totals,
    VersionStore,
};
