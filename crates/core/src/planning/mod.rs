pub mod aggregate;
pub mod coerce;
pub mod export;
pub mod outcome;
pub mod profiles;
pub mod reconcile;
pub mod session;
pub mod status_policy;
pub mod table;
pub mod versions;

pub use aggregate::{
    aggregate, aggregate_all, AggregationRules, BandScheme, BandTally, Dimension, DimensionSource,
    MetricSource, RatioMetric, Totals, WeightedMetric,
};
pub use coerce::{coerce_numeric, NumericPolicy};
pub use export::{export_rows, ExportTable};
pub use outcome::{FieldOutcome, FieldSkipReason};
pub use profiles::{ScreenKind, ScreenProfile};
pub use reconcile::{reconcile, ImportReport, ImportRow, RowSkipReason};
pub use session::{PlanningSession, ResolvedItem, SessionView};
pub use status_policy::{StatusCascade, StatusPolicy};
pub use table::{FieldKind, FieldSpec, PlanningTable, TableLayout};
pub use versions::{Snapshot, SnapshotId, VersionComparison, VersionStore};
