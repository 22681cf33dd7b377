use crate::error::{Result, StepcastError};
use crate::kv::KvStore;
use crate::model::{RecordingSession, RecordingStatus, SessionState, Step, TabId};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Logical key the canonical session is persisted under.
const SESSION_KEY: &str = "recording_session";

/// Where a state lookup found its answer.
///
/// The three-stage fallback (memory, then persisted storage, then idle) is
/// the mechanism that lets recording survive a privileged-process restart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionStage {
    Memory,
    Persisted,
    Default,
}

/// Single source of truth for "is a recording happening, and what has it
/// captured so far".
///
/// The manager owns the canonical session: page agents only send intents and
/// never mutate it directly. Every mutation is persisted to the key-value
/// collaborator before it is acknowledged, so a fresh manager instance can
/// reconstruct the session after a process restart. Step order assignment is
/// serialized through this single owner, which is what keeps order values
/// strictly increasing under rapid consecutive captures.
pub struct SessionManager {
    kv: Arc<dyn KvStore>,
    current: Mutex<Option<RecordingSession>>,
}

impl SessionManager {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            current: Mutex::new(None),
        }
    }

    /// Starts a recording session pinned to `tab_id`.
    ///
    /// Idempotent: if a session already exists (for this tab or another), its
    /// current status is returned unchanged instead of erroring, so repeated
    /// UI clicks and out-of-order popup messages stay harmless.
    pub fn start_recording(&self, tab_id: Option<TabId>) -> Result<RecordingStatus> {
        let mut guard = self.current.lock();
        self.rehydrate(&mut guard)?;
        if let Some(existing) = guard.as_ref() {
            debug!(tab_id = ?existing.tab_id, "start ignored, session already active");
            return Ok(RecordingStatus::of(existing));
        }

        let session = RecordingSession::new(tab_id);
        self.persist(&session)?;
        info!(flow_id = %session.flow_id.0, ?tab_id, "recording started");
        let status = RecordingStatus::of(&session);
        *guard = Some(session);
        Ok(status)
    }

    /// Accepts a captured step, assigning its authoritative order.
    ///
    /// Rejected with `NoActiveSession` when nothing is recording; a stray
    /// late message from a torn-down page must not corrupt or create a
    /// session. The assigned order equals the current step count, so accepted
    /// steps are numbered exactly `0..n` in acceptance order.
    pub fn add_step(&self, mut step: Step) -> Result<u32> {
        let mut guard = self.current.lock();
        self.rehydrate(&mut guard)?;
        let session = match guard.as_mut() {
            Some(session) if session.accepts_steps() => session,
            _ => {
                debug!("step rejected, no active recording session");
                return Err(StepcastError::NoActiveSession);
            }
        };

        let order = session.steps.len() as u32;
        step.order = order;
        session.steps.push(step);
        session.current_step_index = order;
        self.persist(session)?;
        Ok(order)
    }

    /// Moves a recording session to paused. No-op while idle.
    pub fn pause_recording(&self) -> Result<RecordingStatus> {
        self.transition(SessionState::Recording, SessionState::Paused)
    }

    /// Moves a paused session back to recording. No-op while idle.
    pub fn resume_recording(&self) -> Result<RecordingStatus> {
        self.transition(SessionState::Paused, SessionState::Recording)
    }

    /// Removes the most recently accepted step, if any.
    pub fn undo_last_step(&self) -> Result<Option<Step>> {
        let mut guard = self.current.lock();
        self.rehydrate(&mut guard)?;
        let Some(session) = guard.as_mut() else {
            return Ok(None);
        };
        let popped = session.steps.pop();
        if popped.is_some() {
            session.current_step_index = session.steps.len().saturating_sub(1) as u32;
            self.persist(session)?;
        }
        Ok(popped)
    }

    /// Ends the session and returns the accumulated steps.
    ///
    /// The manager is the sole authority over the step list: copies the page
    /// agent may have kept locally are never merged in. The cleared session
    /// is also removed from persisted storage.
    pub fn stop_recording(&self) -> Result<Vec<Step>> {
        let mut guard = self.current.lock();
        self.rehydrate(&mut guard)?;
        match guard.take() {
            Some(session) => {
                self.kv.delete(SESSION_KEY)?;
                info!(
                    flow_id = %session.flow_id.0,
                    steps = session.steps.len(),
                    "recording stopped"
                );
                Ok(session.steps)
            }
            None => {
                debug!("stop ignored, no active recording session");
                Ok(Vec::new())
            }
        }
    }

    /// Discards the session without handing its steps off.
    pub fn cancel_recording(&self) -> Result<()> {
        let mut guard = self.current.lock();
        *guard = None;
        self.kv.delete(SESSION_KEY)?;
        info!("recording cancelled");
        Ok(())
    }

    /// Reports the current recording status.
    pub fn status(&self) -> Result<RecordingStatus> {
        Ok(self.resolved_status()?.0)
    }

    /// Reports the current status along with the resolution stage that
    /// produced it: in-memory session, session reloaded from persisted
    /// storage (the just-restarted-process case), or the idle default.
    pub fn resolved_status(&self) -> Result<(RecordingStatus, ResolutionStage)> {
        let mut guard = self.current.lock();
        if let Some(session) = guard.as_ref() {
            return Ok((RecordingStatus::of(session), ResolutionStage::Memory));
        }
        if let Some(session) = self.load_persisted()? {
            let status = RecordingStatus::of(&session);
            *guard = Some(session);
            return Ok((status, ResolutionStage::Persisted));
        }
        Ok((RecordingStatus::idle(), ResolutionStage::Default))
    }

    fn transition(&self, from: SessionState, to: SessionState) -> Result<RecordingStatus> {
        let mut guard = self.current.lock();
        self.rehydrate(&mut guard)?;
        match guard.as_mut() {
            Some(session) => {
                if session.state == from {
                    session.state = to;
                    self.persist(session)?;
                    info!(state = ?session.state, "recording state changed");
                }
                Ok(RecordingStatus::of(session))
            }
            None => {
                debug!("state change ignored, no active recording session");
                Ok(RecordingStatus::idle())
            }
        }
    }

    /// Reloads a persisted session into the empty in-memory slot.
    fn rehydrate(&self, guard: &mut Option<RecordingSession>) -> Result<()> {
        if guard.is_none() {
            *guard = self.load_persisted()?;
        }
        Ok(())
    }

    fn load_persisted(&self) -> Result<Option<RecordingSession>> {
        match self.kv.get(SESSION_KEY)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn persist(&self, session: &RecordingSession) -> Result<()> {
        self.kv.set(SESSION_KEY, serde_json::to_value(session)?)
    }
}
