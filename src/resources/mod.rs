pub mod common;
pub mod pod;
pub mod rbac;

pub use common::{
    API_VERSION, FIELD_MANAGER, KIND, MANAGED_BY_LABEL, OWNED_BY_LABEL,
    PAUSED_REPLICAS_ANNOTATION, owner_reference, standard_labels,
};
