//! appspec-form — the client form model and its reconciliation.
//!
//! The form model carries, for every leaf, whether the declarative source
//! owns it. Reconciliation keeps user edits to editable leaves, refreshes
//! locked leaves from the newest specification, and drops entries the
//! specification no longer has.

pub mod adapter;
pub mod error;
pub mod locks;
pub mod model;
pub mod provenance;
pub mod reconcile;

pub use adapter::{from_client_model, to_client_model};
pub use error::{FormError, FormResult};
pub use locks::{FieldLocks, LeafValue};
pub use model::{
    ClientAppModel, ClientAutoscaling, ClientHealthCheck, ClientJobConfig, ClientServiceConfig, ClientServiceModel,
    ClientSource, ClientWebConfig, ClientWorkerConfig, ServiceOrigin,
};
pub use provenance::{FieldLocked, FieldProvenance};
pub use reconcile::{ReconcileSummary, apply_source, apply_validated};
