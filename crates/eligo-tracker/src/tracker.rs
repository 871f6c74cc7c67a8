// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The assembled tracking context: provider, stores, and scheduler.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use eligo_core::{
    EligibilityRequest, EligoError, HistoryStore, NewHistoryRecord, TaskMetadata, TaskStatus,
    VerificationProvider,
};
use eligo_storage::MetadataStore;

use crate::policy::PollPolicy;
use crate::scheduler::PollingScheduler;

/// A verification to submit, with the patient context it is filed under.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub request: EligibilityRequest,
    pub clinic_id: String,
    /// Stable person identifier, usually the MPI.
    pub subject_id: String,
    pub patient_id: String,
    pub national_id: Option<String>,
    pub member_id: Option<String>,
    pub date_of_birth: Option<String>,
}

impl Submission {
    fn metadata(&self, task_id: &str, now: DateTime<Utc>) -> TaskMetadata {
        TaskMetadata {
            task_id: task_id.to_string(),
            subject_id: self.subject_id.clone(),
            patient_id: self.patient_id.clone(),
            patient_name: self.request.patient_name.clone(),
            national_id: self.national_id.clone(),
            member_id: self.member_id.clone(),
            provider_code: self.request.tpa_name.clone(),
            id_type: self.request.id_type,
            visit_type: self.request.visit_type,
            scheduling_id: self.request.appointment_id.map(|id| id.to_string()),
            status: TaskStatus::Pending,
            created_at: now,
            completed_at: None,
        }
    }

    fn history_record(&self, task_id: &str) -> NewHistoryRecord {
        NewHistoryRecord {
            clinic_id: self.clinic_id.clone(),
            task_id: task_id.to_string(),
            patient_id: self.patient_id.clone(),
            patient_name: self.request.patient_name.clone(),
            patient_mpi: self.request.mpi.clone(),
            date_of_birth: self.date_of_birth.clone(),
            insurance_payer: Some(self.request.tpa_name.clone()),
            appointment_id: self.request.appointment_id,
            encounter_id: self.request.encounter_id,
        }
    }
}

/// Identifiers assigned to a submitted verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTask {
    pub task_id: String,
    /// History record id. `None` when the record could not be created, in
    /// which case the task is indexed but not polled.
    pub record_id: Option<String>,
}

/// Everything needed to submit and follow verifications. Built once at
/// startup and shared by `Arc`.
pub struct Tracker {
    provider: Arc<dyn VerificationProvider>,
    history: Arc<dyn HistoryStore>,
    metadata: MetadataStore,
    scheduler: PollingScheduler,
}

impl Tracker {
    pub fn new(
        provider: Arc<dyn VerificationProvider>,
        history: Arc<dyn HistoryStore>,
        metadata: MetadataStore,
        policy: PollPolicy,
    ) -> Self {
        let scheduler = PollingScheduler::new(
            Arc::clone(&provider),
            Arc::clone(&history),
            Some(metadata.clone()),
            policy,
        );
        Self {
            provider,
            history,
            metadata,
            scheduler,
        }
    }

    pub fn provider(&self) -> &Arc<dyn VerificationProvider> {
        &self.provider
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn scheduler(&self) -> &PollingScheduler {
        &self.scheduler
    }

    /// Submit a verification, index it, open its history record, and hand
    /// it to the scheduler.
    ///
    /// Only a rejected submission is an error. Indexing and history failures
    /// are logged; the provider already accepted the task at that point.
    pub async fn submit(&self, submission: Submission) -> Result<SubmittedTask, EligoError> {
        let task_id = self.provider.submit(&submission.request).await?;
        info!(
            task_id = %task_id,
            provider = self.provider.name(),
            tpa = %submission.request.tpa_name,
            "verification submitted"
        );

        if let Err(err) = self
            .metadata
            .record(&submission.metadata(&task_id, Utc::now()))
            .await
        {
            warn!(task_id = %task_id, error = %err, "failed to index task metadata");
        }

        let record_id = match self.history.create(submission.history_record(&task_id)).await {
            Ok(record_id) => {
                self.scheduler.add_task(&task_id, &record_id);
                Some(record_id)
            }
            Err(err) => {
                error!(task_id = %task_id, error = %err, "failed to create history record, task will not be polled");
                None
            }
        };

        Ok(SubmittedTask { task_id, record_id })
    }
}
