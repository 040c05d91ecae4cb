//! Weekly check-in scheduler.
//!
//! Evaluated on every dashboard read. For each active config, in ascending
//! id order, the scheduler resolves the instance in force today, applies the
//! distribution allow-list and skips instances the user already completed.
//! The first remaining config is returned, and its availability row is
//! created on first sight.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use fitledger_core::{
    is_distributed_to, latest_in_window, ActionKey, AwardOutcome, CheckinAvailability,
    CheckinConfig, CheckinConfigId, CheckinQuestion, CheckinResponse, CheckinState, CheckinWindow,
    ContextId, EngineError, LedgerKey, QuestionResponse, ResponseId, Result, UserId,
};
use fitledger_store::Transaction;

use crate::ledger::award_in;
use crate::Engine;

/// A check-in the user should answer now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableCheckin {
    /// Config id.
    pub id: CheckinConfigId,
    /// Display name.
    pub name: String,
    /// Instance anchor.
    pub week_date: NaiveDate,
    /// Questions by position.
    pub questions: Vec<CheckinQuestion>,
}

/// Result of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    /// Points granted by this submission.
    pub points_awarded: i64,
    /// Balance after the submission.
    pub new_total_points: i64,
    /// Whether this submission completed the instance for the first time.
    /// Drives the congratulation message.
    pub fresh_award: bool,
    /// Instance anchor the submission was recorded against.
    pub week_date: NaiveDate,
}

/// Saved answers of the instance in force.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinProgress {
    /// Instance anchor, or `None` if nothing has opened yet.
    pub week_date: Option<NaiveDate>,
    /// Latest answer per question, by question id.
    pub responses: Vec<CheckinResponse>,
}

/// State of the instance in force for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekStatus {
    /// Config id.
    pub config_id: CheckinConfigId,
    /// Instance anchor, or `None` if nothing has opened yet.
    pub week_date: Option<NaiveDate>,
    /// State of that instance.
    pub state: CheckinState,
}

/// The check-in scheduler of an [`Engine`].
#[derive(Clone, Copy)]
pub struct CheckinScheduler<'e> {
    engine: &'e Engine,
}

impl<'e> CheckinScheduler<'e> {
    pub(crate) const fn new(engine: &'e Engine) -> Self {
        Self { engine }
    }

    /// The check-in the user should see now, if any.
    ///
    /// # Errors
    ///
    /// Returns a storage error (nothing committed).
    pub fn available(&self, user_id: UserId) -> Result<Option<AvailableCheckin>> {
        let now = self.engine.now();
        let today = self.engine.today_at(now);
        let mut tx = self.engine.begin()?;

        let memberships = tx.memberships(user_id)?;
        let configs = tx.checkin_configs()?;
        for config in configs.into_iter().filter(|c| c.is_active) {
            let Some(window) = config.window_at(today) else {
                continue;
            };
            let distributions = tx.checkin_distributions(config.id)?;
            if !is_distributed_to(&distributions, user_id, &memberships) {
                continue;
            }

            match tx.availability_for_update(config.id, user_id, window.week_date)? {
                Some(row) if row.is_completed => continue,
                Some(mut row) => {
                    if !row.is_available {
                        row.mark_available(now);
                        tx.put_availability(&row)?;
                    }
                }
                None => {
                    let row =
                        CheckinAvailability::opened(config.id, user_id, window.week_date, now);
                    tx.put_availability(&row)?;
                    tracing::info!(
                        config_id = %config.id,
                        user_id = %user_id,
                        week_date = %window.week_date,
                        "Check-in opened"
                    );
                }
            }

            let questions = tx.checkin_questions(config.id)?;
            tx.commit()?;
            return Ok(Some(AvailableCheckin {
                id: config.id,
                name: config.name,
                week_date: window.week_date,
                questions,
            }));
        }

        Ok(None)
    }

    /// Submit answers and complete the instance in force.
    ///
    /// The `CHECKIN_COMPLETE` ledger entry for the instance anchor decides
    /// whether points are granted; a resubmission is acknowledged with no
    /// points and `fresh_award = false`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` for an empty submission or foreign
    /// question ids, `NotFound` for unknown or undistributed configs,
    /// `CheckinInactive`, `CheckinNotOpen`, or a storage error (nothing
    /// committed).
    pub fn submit(
        &self,
        config_id: CheckinConfigId,
        user_id: UserId,
        responses: &[QuestionResponse],
    ) -> Result<SubmitOutcome> {
        if responses.is_empty() {
            return Err(EngineError::InvalidInput(
                "a submission needs at least one response".into(),
            ));
        }
        let now = self.engine.now();
        let today = self.engine.today_at(now);
        let mut tx = self.engine.begin()?;

        let (config, window) = open_instance(&mut tx, config_id, user_id, today)?;
        store_responses(&mut tx, &config, user_id, window, responses, now)?;

        let mut row = tx
            .availability_for_update(config.id, user_id, window.week_date)?
            .unwrap_or_else(|| {
                CheckinAvailability::opened(config.id, user_id, window.week_date, now)
            });

        let config_settings = self.engine.config();
        let award = if config_settings.award_checkin_points {
            let key = LedgerKey::new(
                user_id,
                ActionKey::checkin_complete(),
                ContextId::checkin(config.id),
                window.week_date,
            );
            award_in(&mut tx, key, config_settings.points_checkin_complete, now)?
        } else {
            let balance = tx.user_points(user_id)?.map_or(0, |p| p.points);
            AwardOutcome {
                points_awarded: 0,
                new_total_points: balance,
            }
        };
        let fresh_award = if config_settings.award_checkin_points {
            !award.already_awarded()
        } else {
            !row.is_completed
        };

        row.mark_completed(now, fresh_award);
        tx.put_availability(&row)?;
        tx.commit()?;

        tracing::info!(
            config_id = %config.id,
            user_id = %user_id,
            week_date = %window.week_date,
            answers = responses.len(),
            fresh_award,
            points = award.points_awarded,
            "Check-in submitted"
        );

        Ok(SubmitOutcome {
            points_awarded: award.points_awarded,
            new_total_points: award.new_total_points,
            fresh_award,
            week_date: window.week_date,
        })
    }

    /// The latest saved answer per question for the instance in force.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown configs or a storage error.
    pub fn load_progress(
        &self,
        config_id: CheckinConfigId,
        user_id: UserId,
    ) -> Result<CheckinProgress> {
        let today = self.engine.today_at(self.engine.now());
        let mut tx = self.engine.begin()?;
        let config = require_config(&mut tx, config_id)?;

        let Some(window) = config.window_at(today) else {
            return Ok(CheckinProgress {
                week_date: None,
                responses: Vec::new(),
            });
        };
        let rows = tx.checkin_responses(config_id, user_id)?;
        Ok(CheckinProgress {
            week_date: Some(window.week_date),
            responses: latest_in_window(rows, &window),
        })
    }

    /// Autosave answers for the instance in force. Never completes the
    /// instance and never awards points.
    ///
    /// # Errors
    ///
    /// Same validation as [`submit`](Self::submit).
    pub fn save_progress(
        &self,
        config_id: CheckinConfigId,
        user_id: UserId,
        responses: &[QuestionResponse],
    ) -> Result<CheckinProgress> {
        if responses.is_empty() {
            return Err(EngineError::InvalidInput(
                "nothing to save: no responses given".into(),
            ));
        }
        let now = self.engine.now();
        let today = self.engine.today_at(now);
        let mut tx = self.engine.begin()?;

        let (config, window) = open_instance(&mut tx, config_id, user_id, today)?;
        store_responses(&mut tx, &config, user_id, window, responses, now)?;
        let rows = tx.checkin_responses(config_id, user_id)?;
        tx.commit()?;

        tracing::debug!(
            config_id = %config_id,
            user_id = %user_id,
            week_date = %window.week_date,
            answers = responses.len(),
            "Check-in progress saved"
        );

        Ok(CheckinProgress {
            week_date: Some(window.week_date),
            responses: latest_in_window(rows, &window),
        })
    }

    /// State of the instance in force.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown configs or a storage error.
    pub fn week_status(&self, config_id: CheckinConfigId, user_id: UserId) -> Result<WeekStatus> {
        let today = self.engine.today_at(self.engine.now());
        let mut tx = self.engine.begin()?;
        let config = require_config(&mut tx, config_id)?;

        let Some(window) = config.window_at(today) else {
            return Ok(WeekStatus {
                config_id,
                week_date: None,
                state: CheckinState::NotYetOpen,
            });
        };
        let state = tx
            .availability(config_id, user_id, window.week_date)?
            .map_or(CheckinState::Open, |row| row.state());
        Ok(WeekStatus {
            config_id,
            week_date: Some(window.week_date),
            state,
        })
    }
}

fn require_config(tx: &mut Transaction<'_>, config_id: CheckinConfigId) -> Result<CheckinConfig> {
    tx.checkin_config(config_id)?
        .ok_or_else(|| EngineError::NotFound {
            entity: "checkin",
            id: config_id.to_string(),
        })
}

/// Resolve a config the user may answer right now.
fn open_instance(
    tx: &mut Transaction<'_>,
    config_id: CheckinConfigId,
    user_id: UserId,
    today: NaiveDate,
) -> Result<(CheckinConfig, CheckinWindow)> {
    let config = require_config(tx, config_id)?;
    if !config.is_active {
        return Err(EngineError::CheckinInactive {
            config_id: config_id.to_string(),
        });
    }

    let distributions = tx.checkin_distributions(config_id)?;
    if !distributions.is_empty() {
        let memberships = tx.memberships(user_id)?;
        if !is_distributed_to(&distributions, user_id, &memberships) {
            // Undistributed configs are indistinguishable from missing ones.
            return Err(EngineError::NotFound {
                entity: "checkin",
                id: config_id.to_string(),
            });
        }
    }

    let window = config
        .window_at(today)
        .ok_or_else(|| EngineError::CheckinNotOpen {
            config_id: config_id.to_string(),
        })?;
    Ok((config, window))
}

/// Validate and upsert answers against the instance anchor.
fn store_responses(
    tx: &mut Transaction<'_>,
    config: &CheckinConfig,
    user_id: UserId,
    window: CheckinWindow,
    responses: &[QuestionResponse],
    now: DateTime<Utc>,
) -> Result<()> {
    let kinds: HashMap<_, _> = tx
        .checkin_questions(config.id)?
        .into_iter()
        .map(|q| (q.id, q.kind))
        .collect();

    for response in responses {
        let Some(kind) = kinds.get(&response.question_id) else {
            return Err(EngineError::InvalidInput(format!(
                "question {} does not belong to check-in {}",
                response.question_id, config.id
            )));
        };
        response.answer.validate(*kind)?;
    }

    for response in responses {
        tx.put_checkin_response(&CheckinResponse {
            id: ResponseId::generate(),
            config_id: config.id,
            user_id,
            week_date: window.week_date,
            question_id: response.question_id,
            answer: response.answer.clone(),
            submitted_at: now,
        })?;
    }
    Ok(())
}
