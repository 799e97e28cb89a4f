use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SAMPLE_ID: AtomicU64 = AtomicU64::new(0);
static NEXT_CAPTURE_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SampleId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CaptureId(pub u64);

// Atomic counters so ids can be allocated from any thread without locking.
pub fn next_sample_id() -> SampleId {
    SampleId(NEXT_SAMPLE_ID.fetch_add(1, Ordering::Relaxed))
}

pub fn next_capture_id() -> CaptureId {
    CaptureId(NEXT_CAPTURE_ID.fetch_add(1, Ordering::Relaxed))
}
