// ABOUTME: Compile-fail test verifying LockId and DeploymentId are not interchangeable.
// ABOUTME: This test should fail to compile, validating type safety.

use shipwright::types::{DeploymentId, LockId};

fn takes_lock_id(_id: LockId) {}

fn main() {
    let deployment_id = DeploymentId::generate();
    takes_lock_id(deployment_id); // ERROR: expected LockId, found DeploymentId
}
