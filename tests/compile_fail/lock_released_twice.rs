// ABOUTME: Compile-fail test verifying a lock handle cannot be released twice.
// ABOUTME: release() consumes the handle, so a second call uses a moved value.

use shipwright::backend::ReleaseReason;
use shipwright::release::LockHandle;

async fn release_twice(handle: LockHandle) {
    let _ = handle.release(ReleaseReason::Completed).await;
    let _ = handle.release(ReleaseReason::Abandoned).await; // ERROR: use of moved value
}

fn main() {
    let _ = release_twice;
}
