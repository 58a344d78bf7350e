//! Error types for strata-memory
//!
//! Uses thiserror for clean, idiomatic Rust error definitions. Constructors
//! log at the point the error is raised, through the [`Subsystem`] that owns
//! the failing operation, so each subsystem's threshold also gates its
//! diagnostics. Freed-state errors are not logged: operating on a pool or
//! list that was already released is an expected outcome of cascade frees.

use strata_log::{Subsystem, sub_error, sub_warn};
use thiserror::Error;

use crate::logging::{CLEANUP, POOL};
use crate::pool::PoolId;

// ============================================================================
// Main Error Type
// ============================================================================

/// Memory management errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    // --- Pool Errors ---
    #[error("pool {pool} has been freed")]
    PoolFreed { pool: PoolId },

    #[error("invalid pool handle {pool}: {reason}")]
    InvalidHandle { pool: PoolId, reason: String },

    #[error("address {addr:#x} is not tracked by pool {pool}")]
    NotTracked { pool: PoolId, addr: usize },

    // --- Allocation Errors ---
    #[error("Memory allocation failed: {size} bytes with {align} byte alignment")]
    AllocationFailed { size: usize, align: usize },

    #[error("Size overflow during operation: {operation}")]
    SizeOverflow { operation: String },

    // --- List Errors ---
    #[error("list has been destroyed")]
    ListFreed,

    #[error("Invalid operation: {reason}")]
    InvalidOperation { reason: String },

    // --- Configuration Errors ---
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // --- Cleanup Errors ---
    #[error("{what} is full (capacity: {capacity})")]
    CapacityExceeded { what: &'static str, capacity: usize },

    // --- Feature Support Errors ---
    #[error("Feature not supported: {feature}")]
    NotSupported { feature: &'static str },
}

impl MemoryError {
    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PoolFreed { .. } => "MEM:POOL:FREED",
            Self::InvalidHandle { .. } => "MEM:POOL:HANDLE",
            Self::NotTracked { .. } => "MEM:POOL:UNTRACKED",
            Self::AllocationFailed { .. } => "MEM:ALLOC:FAILED",
            Self::SizeOverflow { .. } => "MEM:ALLOC:OVERFLOW",
            Self::ListFreed => "MEM:LIST:FREED",
            Self::InvalidOperation { .. } => "MEM:INVALID_OP",
            Self::InvalidConfig { .. } => "MEM:CONFIG:INVALID",
            Self::CapacityExceeded { .. } => "MEM:CLEANUP:FULL",
            Self::NotSupported { .. } => "MEM:FEATURE:UNSUPPORTED",
        }
    }

    /// Whether the target object was already released
    #[must_use]
    pub fn is_freed(&self) -> bool {
        matches!(self, Self::PoolFreed { .. } | Self::ListFreed)
    }

    // ============================================================================
    // Convenience Constructors - Pool Errors
    // ============================================================================

    /// Pool already released (not logged)
    pub fn pool_freed(pool: PoolId) -> Self {
        Self::PoolFreed { pool }
    }

    /// Handle that never named a pool in its registry
    pub fn invalid_handle(pool: PoolId, reason: &str) -> Self {
        sub_error!(POOL, %pool, reason, "invalid pool handle");

        Self::InvalidHandle {
            pool,
            reason: reason.to_string(),
        }
    }

    /// Address not owned by the pool (or its subtree, for reallocation)
    pub fn not_tracked(pool: PoolId, addr: usize) -> Self {
        sub_warn!(POOL, %pool, addr = format_args!("{addr:#x}"), "address not tracked by pool");

        Self::NotTracked { pool, addr }
    }

    // ============================================================================
    // Convenience Constructors - Allocation Errors
    // ============================================================================

    /// Create allocation failed error
    pub fn allocation_failed(size: usize, align: usize) -> Self {
        sub_error!(
            POOL,
            "Memory allocation failed: {} bytes with {} alignment",
            size,
            align
        );

        Self::AllocationFailed { size, align }
    }

    /// Create size overflow error, logged on `sub`
    pub fn size_overflow(sub: &Subsystem, operation: &str) -> Self {
        sub_error!(*sub, operation, "size overflow");

        Self::SizeOverflow {
            operation: operation.to_string(),
        }
    }

    // ============================================================================
    // Convenience Constructors - List and Config Errors
    // ============================================================================

    /// List already destroyed (not logged)
    pub fn list_freed() -> Self {
        Self::ListFreed
    }

    /// Create invalid operation error, logged on `sub`
    pub fn invalid_operation(sub: &Subsystem, reason: &str) -> Self {
        sub_warn!(*sub, reason, "invalid operation");

        Self::InvalidOperation {
            reason: reason.to_string(),
        }
    }

    /// Create invalid config error, logged on `sub`
    pub fn invalid_config(sub: &Subsystem, reason: &str) -> Self {
        sub_error!(*sub, reason, "invalid configuration");

        Self::InvalidConfig {
            reason: reason.to_string(),
        }
    }

    /// Create capacity exceeded error
    pub fn capacity_exceeded(what: &'static str, capacity: usize) -> Self {
        sub_error!(CLEANUP, what, capacity, "capacity exceeded");

        Self::CapacityExceeded { what, capacity }
    }

    /// Create not supported error
    #[must_use]
    pub fn not_supported(feature: &'static str) -> Self {
        Self::NotSupported { feature }
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result type for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

// ============================================================================
// Tests
// ============================================================================
