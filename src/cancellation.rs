//! Cancellation framework: CancellationToken + generation guard.
//! Each quiz load (or language switch) advances the generation and cancels the
//! previous load, so a stale translation cannot write into the caches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

/// Manages load generations. Each new load advances the generation,
/// cancels all prior loads, and issues a fresh CancellationToken.
pub struct TaskGeneration {
    current_token: RwLock<CancellationToken>,
    generation: Arc<AtomicU64>,
}

impl TaskGeneration {
    pub fn new() -> Self {
        Self {
            current_token: RwLock::new(CancellationToken::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cancel all current loads, advance generation, return a guard for the new one.
    pub fn cancel_and_advance(&self) -> GenerationGuard {
        let mut token_guard = self.current_token.write();
        token_guard.cancel();
        let new_root = CancellationToken::new();
        let child = new_root.child_token();
        *token_guard = new_root;
        let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        GenerationGuard {
            generation: Arc::clone(&self.generation),
            my_generation: gen,
            token: child,
        }
    }

    /// Guard for the current generation without cancelling anything.
    pub fn guard(&self) -> GenerationGuard {
        let token_guard = self.current_token.read();
        GenerationGuard {
            generation: Arc::clone(&self.generation),
            my_generation: self.generation.load(Ordering::SeqCst),
            token: token_guard.child_token(),
        }
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cancel all current loads without advancing generation.
    pub fn cancel_all(&self) {
        self.current_token.read().cancel();
    }
}

impl Default for TaskGeneration {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard a load checks before publishing results.
/// If the generation has advanced past `my_generation`, the load is stale.
#[derive(Clone)]
pub struct GenerationGuard {
    generation: Arc<AtomicU64>,
    my_generation: u64,
    token: CancellationToken,
}

impl GenerationGuard {
    #[inline]
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.my_generation
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True if the load should continue (not cancelled and still current).
    #[inline]
    pub fn should_continue(&self) -> bool {
        !self.is_cancelled() && self.is_current()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn my_generation(&self) -> u64 {
        self.my_generation
    }
}
