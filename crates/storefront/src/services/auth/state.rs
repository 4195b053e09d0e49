//! The single authoritative session cell.
//!
//! Every mutation takes the cell lock, updates the phase, mirrors it to
//! storage and publishes a snapshot before releasing the lock, so observers
//! never see a half-applied change. The lock is never held across `.await`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use secrecy::SecretString;
use tokio::sync::watch;

use super::SessionError;
use crate::models::{ProfileUpdate, Session, UserProfile};
use crate::pipeline::{SessionHandle, SessionTicket};
use crate::storage::SessionStorage;

enum Phase {
    Empty,
    Verifying {
        token: SecretString,
    },
    Active {
        token: SecretString,
        identity: UserProfile,
    },
}

struct SessionCell {
    phase: Phase,
    /// Advanced whenever the session is replaced or ended. Responses to
    /// requests started under an older generation must not be applied.
    generation: u64,
}

impl SessionCell {
    fn snapshot(&self) -> Session {
        match &self.phase {
            Phase::Empty => Session::anonymous(),
            Phase::Verifying { .. } => Session::verifying(),
            Phase::Active { token, identity } => {
                Session::authenticated(token.clone(), identity.clone())
            }
        }
    }
}

/// Process-wide session state shared by the store and the pipeline.
pub struct SessionState {
    cell: Mutex<SessionCell>,
    storage: SessionStorage,
    updates: watch::Sender<Session>,
}

impl SessionState {
    /// Create an empty session backed by `storage`.
    #[must_use]
    pub fn new(storage: SessionStorage) -> Self {
        let (updates, _) = watch::channel(Session::anonymous());
        Self {
            cell: Mutex::new(SessionCell {
                phase: Phase::Empty,
                generation: 0,
            }),
            storage,
            updates,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionCell> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, cell: &SessionCell) {
        self.updates.send_replace(cell.snapshot());
    }

    pub(crate) fn storage(&self) -> &SessionStorage {
        &self.storage
    }

    /// Immutable snapshot of the current session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.lock().snapshot()
    }

    /// Receiver that sees a new snapshot after every mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.updates.subscribe()
    }

    /// Generation of the active session, if one is active.
    pub(crate) fn active_generation(&self) -> Option<u64> {
        let cell = self.lock();
        matches!(cell.phase, Phase::Active { .. }).then_some(cell.generation)
    }

    /// Enter the verifying phase with a stored token. Only valid from empty.
    pub(crate) fn begin_verification(&self, token: SecretString) -> Option<u64> {
        let mut cell = self.lock();
        if !matches!(cell.phase, Phase::Empty) {
            return None;
        }
        cell.generation += 1;
        cell.phase = Phase::Verifying { token };
        self.publish(&cell);
        Some(cell.generation)
    }

    /// Replace whatever session exists with a freshly authenticated one.
    pub(crate) fn establish(&self, token: SecretString, identity: UserProfile) {
        let mut cell = self.lock();
        if let Err(e) = self.storage.save(&token, &identity) {
            tracing::warn!(error = %e, "Failed to persist session; continuing in memory");
        }
        cell.generation += 1;
        cell.phase = Phase::Active { token, identity };
        self.publish(&cell);
    }

    /// Apply a fetched profile, but only if the session it was fetched for is
    /// still the current one and has not been ended.
    pub(crate) fn apply_fetched_identity(
        &self,
        generation: u64,
        identity: UserProfile,
    ) -> Result<UserProfile, SessionError> {
        let mut cell = self.lock();
        if cell.generation != generation {
            return Err(SessionError::Superseded);
        }
        let token = match &cell.phase {
            Phase::Empty => return Err(SessionError::NoActiveSession),
            Phase::Verifying { token } | Phase::Active { token, .. } => token.clone(),
        };
        if let Err(e) = self.storage.save(&token, &identity) {
            tracing::warn!(error = %e, "Failed to persist profile; continuing in memory");
        }
        cell.phase = Phase::Active {
            token,
            identity: identity.clone(),
        };
        self.publish(&cell);
        Ok(identity)
    }

    /// Merge a partial update into the active identity.
    pub(crate) fn update_identity(
        &self,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, SessionError> {
        let mut cell = self.lock();
        let Phase::Active { identity, .. } = &mut cell.phase else {
            return Err(SessionError::NoActiveSession);
        };
        identity.apply(update);
        let updated = identity.clone();
        if let Err(e) = self.storage.save_profile(&updated) {
            tracing::warn!(error = %e, "Failed to persist profile; continuing in memory");
        }
        self.publish(&cell);
        Ok(updated)
    }

    /// End the session unconditionally, wiping persisted state.
    pub(crate) fn clear(&self, reason: &'static str) {
        let mut cell = self.lock();
        self.clear_locked(&mut cell, reason);
    }

    /// End a verification attempt if it is still the current phase.
    pub(crate) fn abandon_verification(&self, generation: u64) {
        let mut cell = self.lock();
        if cell.generation == generation && matches!(cell.phase, Phase::Verifying { .. }) {
            self.clear_locked(&mut cell, "verification failed");
        }
    }

    fn clear_locked(&self, cell: &mut SessionCell, reason: &'static str) {
        if let Err(e) = self.storage.clear() {
            tracing::warn!(error = %e, "Failed to clear persisted session");
        }
        cell.generation += 1;
        cell.phase = Phase::Empty;
        self.publish(cell);
        tracing::info!(reason, generation = cell.generation, "Session cleared");
    }
}

impl SessionHandle for SessionState {
    fn ticket(&self) -> SessionTicket {
        let cell = self.lock();
        let token = match &cell.phase {
            Phase::Empty => None,
            Phase::Verifying { token } | Phase::Active { token, .. } => Some(token.clone()),
        };
        SessionTicket {
            generation: cell.generation,
            token,
        }
    }

    fn invalidate(&self, generation: u64) {
        let mut cell = self.lock();
        if cell.generation != generation {
            tracing::debug!(
                generation,
                current = cell.generation,
                "Ignoring unauthorized response for a previous session"
            );
            return;
        }
        if matches!(cell.phase, Phase::Empty) {
            return;
        }
        self.clear_locked(&mut cell, "unauthorized");
    }
}
