//! Session management for wizard users
//!
//! A [`Session`] records how far one user has got through the three-step
//! wizard. Sessions live in a [`SessionStore`] keyed by user id and expire
//! after a configurable idle period. Expiry is checked lazily on every access,
//! so a background sweep is only needed to reclaim memory.

use crate::error::{LeverageError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Where a session is in the wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WizardState {
    AwaitingEntry,
    AwaitingStop,
    AwaitingMargin,
    Complete,
}

impl WizardState {
    /// The field this state is waiting for, if any
    pub fn expected_field(self) -> Option<SessionField> {
        match self {
            WizardState::AwaitingEntry => Some(SessionField::EntryPrice),
            WizardState::AwaitingStop => Some(SessionField::StopPrice),
            WizardState::AwaitingMargin => Some(SessionField::Margin),
            WizardState::Complete => None,
        }
    }

    /// State reached after the expected field has been stored
    pub fn next(self) -> Self {
        match self {
            WizardState::AwaitingEntry => WizardState::AwaitingStop,
            WizardState::AwaitingStop => WizardState::AwaitingMargin,
            WizardState::AwaitingMargin | WizardState::Complete => WizardState::Complete,
        }
    }
}

impl std::fmt::Display for WizardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.expected_field() {
            Some(field) => write!(f, "awaiting {field}"),
            None => write!(f, "complete"),
        }
    }
}

/// One of the three values collected by the wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionField {
    EntryPrice,
    StopPrice,
    Margin,
}

impl std::fmt::Display for SessionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionField::EntryPrice => write!(f, "entry price"),
            SessionField::StopPrice => write!(f, "stop price"),
            SessionField::Margin => write!(f, "margin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub state: WizardState,
    pub entry_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub margin: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            state: WizardState::AwaitingEntry,
            entry_price: None,
            stop_price: None,
            margin: None,
            created_at: now,
            last_activity: now,
        }
    }

    /// Store `value` for `field` and advance, if `field` is the one expected next
    pub fn record(&mut self, field: SessionField, value: f64, now: DateTime<Utc>) -> Result<()> {
        if self.state.expected_field() != Some(field) {
            return Err(LeverageError::StateMismatch {
                state: self.state,
                attempted: field,
            });
        }

        let slot = match field {
            SessionField::EntryPrice => &mut self.entry_price,
            SessionField::StopPrice => &mut self.stop_price,
            SessionField::Margin => &mut self.margin,
        };
        *slot = Some(value);

        self.state = self.state.next();
        self.last_activity = now;
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        is_expired(now, self.last_activity, timeout)
    }

    /// All three values, once the wizard is complete
    pub fn inputs(&self) -> Option<(f64, f64, f64)> {
        Some((self.entry_price?, self.stop_price?, self.margin?))
    }
}

/// Whether a session last touched at `last_activity` has outlived `timeout`
pub fn is_expired(now: DateTime<Utc>, last_activity: DateTime<Utc>, timeout: Duration) -> bool {
    now - last_activity > timeout
}

/// Result of looking up a user's session
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// A live session existed
    Existing(Session),
    /// No session existed; a fresh one was created
    Created(Session),
    /// The previous session had expired and was replaced by a fresh one
    Expired(Session),
}

impl Lookup {
    pub fn session(&self) -> &Session {
        match self {
            Lookup::Existing(s) | Lookup::Created(s) | Lookup::Expired(s) => s,
        }
    }

    pub fn into_session(self) -> Session {
        match self {
            Lookup::Existing(s) | Lookup::Created(s) | Lookup::Expired(s) => s,
        }
    }
}

/// Process-wide, in-memory store of wizard sessions
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: std::time::Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout: Duration::from_std(idle_timeout).unwrap_or(Duration::MAX),
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Lock the store for a sequence of operations that must not interleave
    /// with another message from the same user
    pub fn lock(&self) -> Result<SessionTable<'_>> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|e| LeverageError::SessionLock(e.to_string()))?;
        Ok(SessionTable {
            sessions,
            idle_timeout: self.idle_timeout,
        })
    }

    pub fn get_or_create(&self, user_id: &str) -> Result<Session> {
        Ok(self.lock()?.get_or_create(user_id, Utc::now()).into_session())
    }

    pub fn update(&self, user_id: &str, field: SessionField, value: f64) -> Result<Session> {
        self.lock()?.update(user_id, field, value, Utc::now())
    }

    pub fn restart(&self, user_id: &str) -> Result<Session> {
        Ok(self.lock()?.restart(user_id, Utc::now()))
    }

    pub fn delete(&self, user_id: &str) -> Result<bool> {
        Ok(self.lock()?.delete(user_id))
    }

    pub fn purge_expired(&self) -> Result<usize> {
        Ok(self.lock()?.purge_expired(Utc::now()))
    }

    /// Number of live sessions; expired ones are purged first
    pub fn active_count(&self) -> Result<usize> {
        let mut table = self.lock()?;
        table.purge_expired(Utc::now());
        Ok(table.len())
    }

    /// Drop every session, e.g. at shutdown
    pub fn clear(&self) -> Result<()> {
        self.lock()?.sessions.clear();
        Ok(())
    }
}

/// Exclusive view of the session map, obtained from [`SessionStore::lock`]
pub struct SessionTable<'a> {
    sessions: MutexGuard<'a, HashMap<String, Session>>,
    idle_timeout: Duration,
}

impl SessionTable<'_> {
    /// Live session for `user_id`, creating one when absent or expired
    pub fn get_or_create(&mut self, user_id: &str, now: DateTime<Utc>) -> Lookup {
        let expired = match self.sessions.get(user_id) {
            Some(session) if !session.is_expired(now, self.idle_timeout) => {
                return Lookup::Existing(session.clone());
            }
            Some(_) => true,
            None => false,
        };

        let session = self.insert_fresh(user_id, now);
        if expired {
            tracing::info!(user_id, "Session expired, starting over");
            Lookup::Expired(session)
        } else {
            Lookup::Created(session)
        }
    }

    /// Store `value` for `field` in the user's live session
    pub fn update(
        &mut self,
        user_id: &str,
        field: SessionField,
        value: f64,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        let timeout = self.idle_timeout;
        let live = self
            .sessions
            .get(user_id)
            .is_some_and(|session| !session.is_expired(now, timeout));

        if !live {
            // An absent or expired session behaves like a fresh one, which only accepts an entry.
            self.sessions.remove(user_id);
            if field != SessionField::EntryPrice {
                return Err(LeverageError::StateMismatch {
                    state: WizardState::AwaitingEntry,
                    attempted: field,
                });
            }
        }

        let session = self
            .sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Session::new(user_id, now));
        session.record(field, value, now)?;
        Ok(session.clone())
    }

    /// Discard any session for `user_id` and start a new one
    pub fn restart(&mut self, user_id: &str, now: DateTime<Utc>) -> Session {
        self.insert_fresh(user_id, now)
    }

    pub fn delete(&mut self, user_id: &str) -> bool {
        self.sessions.remove(user_id).is_some()
    }

    /// Remove the user's session, returning `true` only if it was still live
    pub fn delete_live(&mut self, user_id: &str, now: DateTime<Utc>) -> bool {
        let timeout = self.idle_timeout;
        self.sessions
            .remove(user_id)
            .is_some_and(|session| !session.is_expired(now, timeout))
    }

    /// Remove every expired session, returning how many were dropped
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let timeout = self.idle_timeout;
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| !session.is_expired(now, timeout));
        before - self.sessions.len()
    }

    pub fn get(&self, user_id: &str) -> Option<&Session> {
        self.sessions.get(user_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn insert_fresh(&mut self, user_id: &str, now: DateTime<Utc>) -> Session {
        let session = Session::new(user_id, now);
        self.sessions.insert(user_id.to_string(), session.clone());
        session
    }
}
