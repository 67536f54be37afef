use std::sync::atomic::{AtomicU64, Ordering};

/// `f64` accumulator that several worker threads can add into.
///
/// Stored as raw bits in an `AtomicU64`; additions retry until the
/// compare-exchange succeeds. The summation order, and so the last bits of
/// the result, depend on thread scheduling.
#[derive(Debug, Default)]
pub struct AtomicReal(AtomicU64);

impl AtomicReal {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    pub fn add(&self, delta: f64) {
        // The closure always returns `Some`, so the update cannot fail.
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + delta).to_bits())
            });
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}
