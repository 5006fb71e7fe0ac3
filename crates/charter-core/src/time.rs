use charter_canonical::Timestamp;

/// Trusted time source for `authority_timestamp`.
pub trait TimeAuthority: Send + Sync {
    /// Current authority time.
    fn authority_now(&self) -> Timestamp;
}

/// Uses the host clock; suitable when the host clock is the trusted source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeAuthority;

impl TimeAuthority for SystemTimeAuthority {
    fn authority_now(&self) -> Timestamp {
        Timestamp::now()
    }
}
