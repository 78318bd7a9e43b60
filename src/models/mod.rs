//! Shared record types for the corpus pipeline.

mod case;
mod gas;

pub use case::{
    insert_last_stop_tag, Algorithm, CaseInvariant, CaseKey, Conservatism, DiveTestCase,
    LastStop, SourceArtifact, Stop,
};
pub use gas::{bottom_spec, deco_spec, from_name_token, GasMixture, GasRole};
