//! External data sources.

pub mod ibge {
    pub use crate::ibge::*;
}

pub mod ibge_models {
    pub use crate::ibge_models::*;
}
