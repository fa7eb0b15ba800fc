// Managers Module
//
// Service-layer pieces that sit between callers and the core:
// - InstanceCache / ExpiringInstanceCache: warm instance cache contract
// - InstanceManager: train/save/cache and load/classify orchestration

pub mod cache;
pub mod instance_manager;

pub use cache::{ExpiringInstanceCache, InstanceCache};
pub use instance_manager::{InstanceManager, LearnOutcome};
