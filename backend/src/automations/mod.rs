// Automation Rule Execution Engine
//
// Tenant-scoped rule execution for the Cadence platform: declarative
// conditions evaluated against an event payload, an ordered list of
// side-effecting actions, and a full run/step audit trail with dry-run
// simulation and idempotent replay.

pub mod actions;
pub mod conditions;
pub mod dispatch;
pub mod engine;
pub mod ledger;
pub mod stores;

pub use actions::AllowedTable;
pub use dispatch::{ActionDispatcher, ActionOutcome, DispatchError};
pub use engine::{AutomationEngine, ExecuteParams, ExecutionOutcome, RunDetail};
pub use ledger::{CreatedRun, NewRun, NewStep, PgRunLedger, RunLedger};
pub use stores::{
    NewNotification, NewTask, Notifier, PgNotifier, PgRecordStatusStore, PgRuleStore, PgTaskStore,
    PgTenantDirectory, RecordStatusStore, RuleStore, StoreError, TaskStore, TenantDirectory,
};
