//! RSVP View-Model
//!
//! Holds the form, submits one confirmation per guest and keeps the list of
//! confirmations (newest first) for the guest book.

use super::{LiveCollection, LoadPhase, Lifecycle};
use crate::backend::Backend;
use crate::core::{ErrorKind, SyncError};
use crate::dtos::CreateConfirmationDTO;
use crate::entities::{Attendance, AttendanceSummary, Confirmation, Table};
use crate::repositories::{ConfirmationRepository, Create, ReadAll};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use validator::Validate;

pub const NAME_REQUIRED: &str = "Please enter your name";
pub const ATTENDANCE_REQUIRED: &str = "Please select whether you will attend";
pub const ALREADY_CONFIRMED: &str =
    "You have already confirmed your attendance. Thank you!";

/// Raw form inputs, as typed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RsvpForm {
    pub name: String,
    pub attendance: String,
    pub message: String,
}

/// Banner shown under the form; success and error never coexist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RsvpState {
    pub form: RsvpForm,
    pub submitting: bool,
    pub notice: Option<Notice>,
    pub phase: LoadPhase,
    pub confirmations: Vec<Confirmation>,
    pub list_error: Option<String>,
}

impl RsvpState {
    pub fn summary(&self) -> AttendanceSummary {
        AttendanceSummary::from_confirmations(&self.confirmations)
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.notice {
            Some(Notice::Error(msg)) => Some(msg),
            _ => None,
        }
    }

    pub fn success_message(&self) -> Option<&str> {
        match &self.notice {
            Some(Notice::Success(msg)) => Some(msg),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Confirmed(Confirmation),
    /// Failed local validation, nothing was sent
    Invalid(String),
    AlreadyConfirmed,
    Failed(ErrorKind),
    Detached,
}

pub struct Rsvp<B: Backend> {
    repo: ConfirmationRepository<B>,
    state: watch::Sender<RsvpState>,
    lifecycle: Lifecycle,
}

impl<B: Backend> Rsvp<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let (state, _) = watch::channel(RsvpState::default());
        Self {
            repo: ConfirmationRepository::new(backend),
            state,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn snapshot(&self) -> RsvpState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<RsvpState> {
        self.state.subscribe()
    }

    pub fn summary(&self) -> AttendanceSummary {
        self.state.borrow().summary()
    }

    pub fn detach(&self) {
        self.lifecycle.detach();
    }

    pub fn set_name(&self, name: &str) {
        self.state.send_modify(|s| s.form.name = name.to_string());
    }

    pub fn set_attendance(&self, attendance: &str) {
        self.state
            .send_modify(|s| s.form.attendance = attendance.to_string());
    }

    pub fn set_message(&self, message: &str) {
        self.state.send_modify(|s| s.form.message = message.to_string());
    }

    /// Submits what is currently in the form
    pub async fn submit_form(&self) -> SubmitOutcome {
        let form = self.state.borrow().form.clone();
        self.submit(&form.name, &form.attendance, Some(&form.message))
            .await
    }

    /// Sends an RSVP.
    ///
    /// Validation failures set an error notice without touching the backend.
    /// A unique violation means this guest already answered.
    #[instrument(skip(self, message))]
    pub async fn submit(&self, name: &str, attendance: &str, message: Option<&str>) -> SubmitOutcome {
        if !self.lifecycle.is_attached() {
            return SubmitOutcome::Detached;
        }
        self.state.send_modify(|s| s.notice = None);

        let dto = match validate(name, attendance, message) {
            Ok(dto) => dto,
            Err(msg) => {
                debug!(reason = %msg, "RSVP rejected by validation");
                self.state
                    .send_modify(|s| s.notice = Some(Notice::Error(msg.clone())));
                return SubmitOutcome::Invalid(msg);
            }
        };

        self.state.send_modify(|s| s.submitting = true);
        info!(guest = %dto.name, attendance = %dto.attendance, "Submitting RSVP");

        let result = self.repo.create(&dto).await;

        if !self.lifecycle.is_attached() {
            return SubmitOutcome::Detached;
        }
        match result {
            Ok(confirmation) => {
                info!(confirmation_id = confirmation.id, "RSVP received");
                let thanks = format!(
                    "Thank you, {}! Your RSVP has been received.",
                    confirmation.name
                );
                self.state.send_modify(|s| {
                    s.submitting = false;
                    s.form = RsvpForm::default();
                    s.notice = Some(Notice::Success(thanks));
                });
                self.fetch_all().await;
                SubmitOutcome::Confirmed(confirmation)
            }
            Err(e) if e.kind() == ErrorKind::UniqueViolation => {
                warn!(guest = %dto.name, "Duplicate RSVP");
                self.state.send_modify(|s| {
                    s.submitting = false;
                    s.notice = Some(Notice::Error(ALREADY_CONFIRMED.to_string()));
                });
                SubmitOutcome::AlreadyConfirmed
            }
            Err(e) => {
                error!(error = %e, "Error submitting RSVP");
                self.state.send_modify(|s| {
                    s.submitting = false;
                    s.notice = Some(Notice::Error(format!(
                        "Could not send your RSVP, please try again: {}",
                        e.message
                    )));
                });
                SubmitOutcome::Failed(e.kind())
            }
        }
    }

    /// Reloads the confirmations, newest first
    #[instrument(skip(self))]
    pub async fn fetch_all(&self) {
        if !self.lifecycle.is_attached() {
            return;
        }
        let generation = self.lifecycle.next_generation();
        self.state.send_modify(|s| {
            s.phase = LoadPhase::Loading;
            s.list_error = None;
        });

        let result = self.repo.read_all().await;

        if !self.lifecycle.is_current(generation) {
            debug!(generation, "Discarding stale confirmation fetch");
            return;
        }
        match result {
            Ok(confirmations) => {
                info!(count = confirmations.len(), "Confirmations fetched");
                self.state.send_modify(|s| {
                    s.confirmations = confirmations;
                    s.phase = LoadPhase::Loaded;
                });
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch confirmations");
                self.state.send_modify(|s| {
                    s.phase = LoadPhase::Failed;
                    s.list_error = Some(format!("Database error: {}", e.message));
                });
            }
        }
    }
}

impl<B: Backend> LiveCollection for Rsvp<B> {
    const TABLE: Table = Table::Confirmations;

    fn refetch(&self) -> impl Future<Output = ()> + Send {
        self.fetch_all()
    }

    fn detach(&self) {
        self.lifecycle.detach();
    }
}

fn validate(
    name: &str,
    attendance: &str,
    message: Option<&str>,
) -> Result<CreateConfirmationDTO, String> {
    if name.trim().is_empty() {
        return Err(NAME_REQUIRED.to_string());
    }
    let attendance = attendance
        .parse::<Attendance>()
        .map_err(|_| ATTENDANCE_REQUIRED.to_string())?;
    let dto = CreateConfirmationDTO::new(name, attendance, message);
    dto.validate()
        .map_err(|e| SyncError::from(e).user_message().to_string())?;
    Ok(dto)
}
