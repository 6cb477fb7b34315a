//! Primary-then-fallback composition of the two persistence paths.

use crate::error::StoreError;
use crate::pg::PgStore;
use crate::rest::RestStore;
use crate::store::Store;
use crate::write::{PersistOutcome, PipelineWrite};
use async_trait::async_trait;
use ordersieve_core::monitor::ErrorMonitor;
use std::sync::Arc;

/// Routes writes to the pooled Postgres path and falls back to the
/// tabular HTTP path when the primary is unusable.
///
/// Either path may be absent: a deployment without direct database
/// credentials runs fallback-only, and a deployment without a tabular
/// endpoint runs primary-only. With neither, persistence is refused at
/// startup.
pub struct FallbackStore {
    primary: Option<PgStore>,
    fallback: Option<RestStore>,
    monitor: Arc<ErrorMonitor>,
}

impl FallbackStore {
    /// Compose the configured paths.
    pub fn new(
        primary: Option<PgStore>,
        fallback: Option<RestStore>,
        monitor: Arc<ErrorMonitor>,
    ) -> Result<Self, StoreError> {
        if primary.is_none() && fallback.is_none() {
            return Err(StoreError::Unavailable);
        }
        Ok(Self {
            primary,
            fallback,
            monitor,
        })
    }

    /// The pooled store, when configured. Read queries and admin
    /// operations go straight to it.
    pub fn primary(&self) -> Option<&PgStore> {
        self.primary.as_ref()
    }

    /// Close whatever is open, primary first.
    pub async fn close(&self) {
        if let Some(pg) = &self.primary {
            pg.close().await;
        }
    }
}

#[async_trait]
impl Store for FallbackStore {
    async fn persist(&self, write: &PipelineWrite) -> Result<PersistOutcome, StoreError> {
        if let Some(primary) = &self.primary {
            match primary.persist(write).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    self.monitor.record("persist", "database");
                    tracing::warn!(
                        message_id = %write.message.external_id,
                        %err,
                        "primary persistence failed, trying tabular fallback"
                    );
                }
            }
        }

        match &self.fallback {
            Some(fallback) => match fallback.persist(write).await {
                Ok(outcome) => Ok(outcome),
                Err(err) => {
                    self.monitor.record("persist", "tabular-api");
                    Err(err)
                }
            },
            None => Err(StoreError::Unavailable),
        }
    }

    async fn health_check(&self) -> bool {
        if let Some(primary) = &self.primary {
            if primary.health_check().await {
                return true;
            }
        }
        match &self.fallback {
            Some(fallback) => fallback.health_check().await,
            None => false,
        }
    }
}
