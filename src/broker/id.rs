//! Subscriber identity
//!
//! The broker mints ids through an [`IdGenerator`] so tests and embedders can
//! plug in their own source.

use uuid::Uuid;

use crate::broker::topic::SubscriberId;
use crate::utils::error::IdError;

pub trait IdGenerator: Send + Sync {
    fn new_id(&self) -> Result<SubscriberId, IdError>;
}

/// Eight random bytes rendered as `XXXXXXXX-XXXXXXXX`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn new_id(&self) -> Result<SubscriberId, IdError> {
        let uuid = Uuid::new_v4();
        let bytes = uuid.as_bytes();
        let (high, low) = bytes[..8].split_at(4);
        Ok(format!("{}-{}", hex_upper(high), hex_upper(low)))
    }
}

fn hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

impl<F> IdGenerator for F
where
    F: Fn() -> Result<SubscriberId, IdError> + Send + Sync,
{
    fn new_id(&self) -> Result<SubscriberId, IdError> {
        self()
    }
}
