//! Provisioning domain - the request a run starts from and the record it produces

mod request;
mod result;

pub use request::{ProvisionRequest, DEFAULT_INGESTION_TIMEOUT};
pub use result::{
    IngestionOutcome, IngestionOutcomeStatus, OverallStatus, ProvisioningFailure,
    ProvisioningResult,
};
