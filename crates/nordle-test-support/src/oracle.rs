//! Test oracle gateways.

use std::sync::Mutex;

use async_trait::async_trait;
use nordle_core::error::DomainError;
use nordle_core::ids::RequestId;
use nordle_core::oracle::{OracleGateway, OracleRequest};

/// Issues `req-1`, `req-2`, ... and records every request it was handed.
#[derive(Debug, Default)]
pub struct SequentialOracleGateway {
    issued: Mutex<Vec<OracleRequest>>,
}

impl SequentialOracleGateway {
    /// Creates a gateway with no issued requests.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the requests issued so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn issued(&self) -> Vec<OracleRequest> {
        self.issued.lock().unwrap().clone()
    }
}

#[async_trait]
impl OracleGateway for SequentialOracleGateway {
    async fn issue(&self, request: &OracleRequest) -> Result<RequestId, DomainError> {
        let mut issued = self.issued.lock().unwrap();
        issued.push(request.clone());
        Ok(RequestId::new(format!("req-{}", issued.len())))
    }
}

/// A gateway whose oracle network is unreachable.
#[derive(Debug)]
pub struct FailingOracleGateway;

#[async_trait]
impl OracleGateway for FailingOracleGateway {
    async fn issue(&self, _request: &OracleRequest) -> Result<RequestId, DomainError> {
        Err(DomainError::Infrastructure("oracle unreachable".into()))
    }
}
