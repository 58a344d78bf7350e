//! Shutdown callbacks
//!
//! A [`CleanupRegistry`] collects actions and runs them once, newest first.
//! The process-wide registry behind [`global`] is what the interrupt handler
//! drains before exiting:
//!
//! ```
//! use strata_memory::cleanup::CleanupRegistry;
//! use strata_memory::pool::PoolRegistry;
//!
//! let cleanup = CleanupRegistry::new();
//! let pool = PoolRegistry::new().create_root()?;
//! cleanup.push_pool(pool.clone())?;
//! cleanup.push(|| println!("pools released"))?;
//!
//! assert_eq!(cleanup.run(), 2);
//! assert!(!pool.is_valid());
//! # Ok::<(), strata_memory::MemoryError>(())
//! ```

mod signal;

use std::any::Any;
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use strata_log::{sub_debug, sub_info, sub_trace};

pub use signal::install_interrupt_handler;

use crate::error::{MemoryError, MemoryResult};
use crate::logging::CLEANUP;
use crate::pool::Pool;

type Payload = Box<dyn Any + Send>;

/// A registered shutdown step
pub enum CleanupAction {
    /// Call with no argument
    Call(Box<dyn FnOnce() + Send>),
    /// Call with the payload stored at registration
    CallWith {
        action: Box<dyn FnOnce(Payload) + Send>,
        payload: Payload,
    },
}

impl CleanupAction {
    fn invoke(self) {
        match self {
            Self::Call(action) => action(),
            Self::CallWith { action, payload } => action(payload),
        }
    }
}

impl fmt::Debug for CleanupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call(_) => f.write_str("Call"),
            Self::CallWith { .. } => f.write_str("CallWith"),
        }
    }
}

/// LIFO set of actions run at most once
pub struct CleanupRegistry {
    actions: Mutex<Vec<CleanupAction>>,
    capacity: Option<usize>,
    ran: AtomicBool,
}

impl CleanupRegistry {
    /// Unbounded registry
    pub fn new() -> Self {
        Self {
            actions: Mutex::new(Vec::new()),
            capacity: None,
            ran: AtomicBool::new(false),
        }
    }

    /// Registry refusing more than `capacity` actions
    pub fn bounded(capacity: usize) -> Self {
        Self {
            actions: Mutex::new(Vec::with_capacity(capacity)),
            capacity: Some(capacity),
            ran: AtomicBool::new(false),
        }
    }

    fn register(&self, action: CleanupAction) -> MemoryResult<()> {
        let mut actions = self.actions.lock();
        if self.has_run() {
            return Err(MemoryError::invalid_operation(
                &CLEANUP,
                "cleanup registry has already run",
            ));
        }
        if let Some(capacity) = self.capacity.filter(|&c| actions.len() >= c) {
            return Err(MemoryError::capacity_exceeded("cleanup registry", capacity));
        }
        sub_trace!(CLEANUP, action = ?action, position = actions.len(), "cleanup registered");
        actions.push(action);
        Ok(())
    }

    /// Register a no-argument action
    pub fn push(&self, action: impl FnOnce() + Send + 'static) -> MemoryResult<()> {
        self.register(CleanupAction::Call(Box::new(action)))
    }

    /// Register an action that receives `payload` when run
    pub fn push_with<T: Send + 'static>(
        &self,
        payload: T,
        action: impl FnOnce(T) + Send + 'static,
    ) -> MemoryResult<()> {
        self.register(CleanupAction::CallWith {
            action: Box::new(move |payload: Payload| {
                if let Ok(payload) = payload.downcast::<T>() {
                    action(*payload);
                }
            }),
            payload: Box::new(payload),
        })
    }

    /// Register freeing `pool` and everything below it
    pub fn push_pool(&self, pool: Pool) -> MemoryResult<()> {
        self.push_with(pool, |pool| pool.free())
    }

    /// Run every action, newest first, and return how many ran
    ///
    /// Only the first call does anything. Actions run outside the registry
    /// lock and may not register further actions.
    pub fn run(&self) -> usize {
        if self.has_run() {
            return 0;
        }
        let actions = {
            let mut actions = self.actions.lock();
            if self.ran.swap(true, Ordering::AcqRel) {
                return 0;
            }
            std::mem::take(&mut *actions)
        };

        let count = actions.len();
        sub_info!(CLEANUP, actions = count, "running cleanup");
        for action in actions.into_iter().rev() {
            action.invoke();
        }
        sub_debug!(CLEANUP, actions = count, "cleanup finished");
        count
    }

    pub fn has_run(&self) -> bool {
        self.ran.load(Ordering::Acquire)
    }

    /// Actions waiting to run
    pub fn len(&self) -> usize {
        self.actions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CleanupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CleanupRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupRegistry")
            .field("pending", &self.len())
            .field("capacity", &self.capacity)
            .field("ran", &self.has_run())
            .finish()
    }
}

static GLOBAL: LazyLock<CleanupRegistry> = LazyLock::new(CleanupRegistry::new);

/// Process-wide registry, drained by the interrupt handler
pub fn global() -> &'static CleanupRegistry {
    &GLOBAL
}

/// Register on the process-wide registry
pub fn push(action: impl FnOnce() + Send + 'static) -> MemoryResult<()> {
    global().push(action)
}

/// Register on the process-wide registry with a payload
pub fn push_with<T: Send + 'static>(
    payload: T,
    action: impl FnOnce(T) + Send + 'static,
) -> MemoryResult<()> {
    global().push_with(payload, action)
}

/// Register freeing `pool` on the process-wide registry
pub fn push_pool(pool: Pool) -> MemoryResult<()> {
    global().push_pool(pool)
}

/// Run the process-wide registry
pub fn run() -> usize {
    global().run()
}
