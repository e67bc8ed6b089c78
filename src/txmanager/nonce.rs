//! Process-local nonce sequencing for a single signer.

use std::future::Future;

use tokio::sync::Mutex;

/// What the cache knows about the signer's next nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceState {
    /// Must be fetched from the chain before the next use.
    Unknown,
    /// Last nonce handed out.
    Known(u64),
}

/// Serialized, gap-free nonce allocation.
///
/// The first allocation fetches the chain's value; every later one returns
/// the previous value plus one. The lock is held across the fetch so two
/// concurrent first calls cannot both hit the chain.
#[derive(Debug)]
pub struct NonceCache {
    state: Mutex<NonceState>,
}

impl NonceCache {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(NonceState::Unknown),
        }
    }

    /// Hand out the next nonce, calling `fetch` only when the state is unknown.
    ///
    /// A failed fetch leaves the state unknown.
    pub async fn next<F, Fut, E>(&self, fetch: F) -> Result<u64, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<u64, E>>,
    {
        self.next_with(fetch, |nonce| async move { Ok(nonce) }).await
    }

    /// Run `apply` with the next nonce and commit it only if `apply` succeeds.
    ///
    /// The lock is held across `apply`, so keep it short (signing, not
    /// broadcasting). On failure the same nonce is handed out again.
    pub async fn next_with<F, Fut, A, AFut, T, E>(&self, fetch: F, apply: A) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<u64, E>>,
        A: FnOnce(u64) -> AFut,
        AFut: Future<Output = Result<T, E>>,
    {
        let mut state = self.state.lock().await;
        let nonce = match *state {
            NonceState::Unknown => fetch().await?,
            NonceState::Known(last) => last + 1,
        };
        let value = apply(nonce).await?;
        *state = NonceState::Known(nonce);
        Ok(value)
    }

    /// Forget the cached value; the next allocation re-fetches.
    pub async fn reset(&self) {
        *self.state.lock().await = NonceState::Unknown;
    }

    pub async fn state(&self) -> NonceState {
        *self.state.lock().await
    }
}

impl Default for NonceCache {
    fn default() -> Self {
        Self::new()
    }
}
