// Listing logic and shared errors/models
pub mod filters {
    pub use crate::filters::*;
}

pub mod pagination {
    pub use crate::pagination::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
