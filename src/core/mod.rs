// Domain-layer modules and shared errors/models
pub mod billing {
    pub use crate::billing::*;
}

pub mod education {
    pub use crate::education::*;
}

pub mod targeting {
    pub use crate::targeting::*;
}

pub mod ledger {
    pub use crate::ledger::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
