// SPDX-FileCopyrightText: 2026 Eligo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The intake pass: turn today's appointments into tracked verifications.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use eligo_config::model::IntakeConfig;
use eligo_core::appointment::non_blank;
use eligo_core::{
    Appointment, AppointmentSource, EligibilityRequest, EligoError, IdType, TpaConfigSource,
};
use eligo_storage::{AppointmentTracker, Database};
use eligo_tracker::{Submission, Tracker};

use crate::identity::determine_identity;
use crate::tpa::{ALL_TPAS, TpaNameCache, TpaResolver, is_valid_tpa_code};
use crate::visit_type::determine_visit_type;

/// Counters for one intake pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntakeMetrics {
    pub fetched: usize,
    pub processed: usize,
    pub created: usize,
    pub errors: usize,
    pub skipped_no_insurance: usize,
    pub skipped_already_processed: usize,
    pub skipped_no_tpa: usize,
    pub skipped_no_id: usize,
}

impl IntakeMetrics {
    fn log(&self) {
        info!(
            fetched = self.fetched,
            processed = self.processed,
            created = self.created,
            errors = self.errors,
            skipped_no_insurance = self.skipped_no_insurance,
            skipped_already_processed = self.skipped_already_processed,
            skipped_no_tpa = self.skipped_no_tpa,
            skipped_no_id = self.skipped_no_id,
            "appointment intake pass finished"
        );
    }
}

/// Why a claimed appointment produced no verification.
enum Rejection {
    NoTpa,
    NoIdentifier,
    Submit(EligoError),
}

impl Rejection {
    fn message(&self) -> String {
        match self {
            Rejection::NoTpa => "no valid TPA code found".to_string(),
            Rejection::NoIdentifier => "no usable patient identifier".to_string(),
            Rejection::Submit(err) => format!("failed to create verification task: {err}"),
        }
    }
}

/// Submits eligibility checks for scheduled appointments.
pub struct AutoChecker {
    tracker: Arc<Tracker>,
    source: Arc<dyn AppointmentSource>,
    marks: AppointmentTracker,
    resolver: TpaResolver,
    config: IntakeConfig,
}

impl AutoChecker {
    pub fn new(
        tracker: Arc<Tracker>,
        source: Arc<dyn AppointmentSource>,
        marks: AppointmentTracker,
        resolver: TpaResolver,
        config: IntakeConfig,
    ) -> Self {
        Self {
            tracker,
            source,
            marks,
            resolver,
            config,
        }
    }

    /// Wire a checker from configuration, keeping appointment marks in `db`.
    pub fn from_config(
        tracker: Arc<Tracker>,
        source: Arc<dyn AppointmentSource>,
        tpa_configs: Arc<dyn TpaConfigSource>,
        db: Database,
        config: &IntakeConfig,
    ) -> Self {
        let marks = AppointmentTracker::with_ttls(db, config.processed_ttl(), config.error_ttl());
        let resolver = TpaResolver::new(
            TpaNameCache::new(tpa_configs, config.tpa_cache_ttl()),
            config.tpa_fallbacks.clone(),
        );
        Self::new(tracker, source, marks, resolver, config.clone())
    }

    pub fn marks(&self) -> &AppointmentTracker {
        &self.marks
    }

    pub fn resolver(&self) -> &TpaResolver {
        &self.resolver
    }

    /// Process today's appointments once.
    pub async fn run_once(&self) -> Result<IntakeMetrics, EligoError> {
        self.run_for(Local::now().date_naive()).await
    }

    /// Process the appointments scheduled on `date`.
    pub async fn run_for(&self, date: NaiveDate) -> Result<IntakeMetrics, EligoError> {
        let appointments = self
            .source
            .fetch(date, date, self.config.customer_site_id)
            .await?;
        let mut metrics = IntakeMetrics {
            fetched: appointments.len(),
            ..IntakeMetrics::default()
        };
        debug!(%date, fetched = metrics.fetched, "appointments fetched");

        for appointment in &appointments {
            self.process(appointment, &mut metrics).await;
        }
        metrics.log();
        Ok(metrics)
    }

    /// Run a pass every `interval_secs` until `cancel` fires. Failed passes
    /// are logged and the loop carries on.
    pub async fn run_continuous(&self, cancel: CancellationToken) {
        let period = self.config.interval().max(Duration::from_secs(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = period.as_secs(), "appointment intake started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("appointment intake stopped");
                    return;
                }
                _ = interval.tick() => {}
            }
            if let Err(err) = self.run_once().await {
                error!(error = %err, "appointment intake pass failed");
            }
        }
    }

    async fn process(&self, appointment: &Appointment, metrics: &mut IntakeMetrics) {
        let Some(appointment_id) = appointment.appointment_id else {
            warn!("appointment without an id, skipping");
            metrics.errors += 1;
            return;
        };

        match self.marks.should_process(appointment_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(appointment_id, "appointment already handled");
                metrics.skipped_already_processed += 1;
                return;
            }
            Err(err) => {
                error!(appointment_id, error = %err, "failed to read appointment mark");
                metrics.errors += 1;
                return;
            }
        }

        let has_insurance = appointment.has_insurance_info();
        if !has_insurance && !appointment.has_national_id() {
            debug!(appointment_id, "no insurance details and no national ID, skipping");
            metrics.skipped_no_insurance += 1;
            return;
        }

        match self.marks.mark_processing(appointment_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(appointment_id, "appointment claimed elsewhere");
                metrics.skipped_already_processed += 1;
                return;
            }
            Err(err) => {
                error!(appointment_id, error = %err, "failed to claim appointment");
                metrics.errors += 1;
                return;
            }
        }

        match self.submit(appointment, appointment_id, has_insurance).await {
            Ok(task_id) => {
                if let Err(err) = self.marks.mark_completed(appointment_id, &task_id).await {
                    error!(appointment_id, task_id = %task_id, error = %err, "failed to mark appointment completed");
                }
                metrics.processed += 1;
                metrics.created += 1;
            }
            Err(rejection) => {
                match &rejection {
                    Rejection::NoTpa => metrics.skipped_no_tpa += 1,
                    Rejection::NoIdentifier => metrics.skipped_no_id += 1,
                    Rejection::Submit(_) => metrics.errors += 1,
                }
                if let Err(err) = self
                    .marks
                    .mark_error(appointment_id, &rejection.message(), None)
                    .await
                {
                    error!(appointment_id, error = %err, "failed to mark appointment error");
                }
            }
        }
    }

    async fn submit(
        &self,
        appointment: &Appointment,
        appointment_id: i64,
        has_insurance: bool,
    ) -> Result<String, Rejection> {
        let tpa_code = if has_insurance {
            self.resolver
                .resolve(appointment, &self.config.clinic_id)
                .await
                .filter(|code| is_valid_tpa_code(code))
                .ok_or(Rejection::NoTpa)?
        } else {
            info!(appointment_id, "no insurance details, searching all TPAs by national ID");
            ALL_TPAS.to_string()
        };

        let (id_type, id_value) = determine_identity(appointment).ok_or(Rejection::NoIdentifier)?;
        let patient_id = appointment
            .history_patient_id()
            .ok_or(Rejection::NoIdentifier)?
            .to_string();
        let mpi = non_blank(&appointment.mpi).map(str::to_string);

        let member_id = (id_type != IdType::EmiratesId).then(|| id_value.clone());
        let submission = Submission {
            request: EligibilityRequest {
                id_value,
                id_type,
                tpa_name: tpa_code,
                visit_type: determine_visit_type(appointment),
                mpi: mpi.clone(),
                patient_id: non_blank(&appointment.patient_id).map(str::to_string),
                patient_name: non_blank(&appointment.full_name).map(str::to_string),
                appointment_id: Some(appointment_id),
                encounter_id: appointment.encounter_id,
            },
            clinic_id: self.config.clinic_id.clone(),
            subject_id: mpi.unwrap_or_else(|| patient_id.clone()),
            patient_id,
            national_id: appointment.national_id().map(str::to_string),
            member_id,
            date_of_birth: non_blank(&appointment.dob).map(str::to_string),
        };

        let submitted = self
            .tracker
            .submit(submission)
            .await
            .map_err(Rejection::Submit)?;
        info!(appointment_id, task_id = %submitted.task_id, "eligibility check created for appointment");
        Ok(submitted.task_id)
    }
}
