//! Unrecoverable provisioning errors

use crate::services::status::{StatusCode, StatusContext};
use log::error;
use std::{convert::Infallible, fmt};

/// Error that ends the provisioning pass
pub struct Fatal {
    pub code: StatusCode,
    pub error: anyhow::Error,
}

impl Fatal {
    pub fn new(code: StatusCode, error: anyhow::Error) -> Self {
        Self { code, error }
    }
}

impl fmt::Debug for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {:#}", self.code, self.code.blinks(), self.error)
    }
}

/// Signal `fatal` on the status LED and halt for good
pub async fn escalate(status: StatusContext, fatal: Fatal) -> Infallible {
    error!("provisioning failed: {fatal:?}");
    status.halt(fatal.code).await
}
