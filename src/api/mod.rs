// Thin namespace wrapper for HTTP-layer components
pub mod routes {
    pub use crate::routes::*;
}

pub mod handlers {
    pub use crate::handlers::*;
}

pub mod web {
    pub use crate::web::*;
}

pub mod auth {
    pub use crate::auth::*;
}

pub mod openapi {
    pub use crate::openapi::*;
}
