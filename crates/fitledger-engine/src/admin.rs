//! Admin-authored data: check-in definitions, exercise metadata and group
//! memberships.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use fitledger_core::{
    CheckinConfig, CheckinConfigId, CheckinDistribution, CheckinQuestion, DistributionTarget,
    EngineError, GroupId, GroupKind, Result, RoutineItem, UserId,
};

use crate::Engine;

/// A check-in with its questions and allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinDefinition {
    /// The config.
    pub config: CheckinConfig,
    /// Its questions.
    pub questions: Vec<CheckinQuestion>,
    /// Allow-list; empty means every user.
    pub distributions: Vec<DistributionTarget>,
}

impl CheckinDefinition {
    fn validate(&self) -> Result<()> {
        if self.config.name.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "check-in name must not be empty".into(),
            ));
        }
        let mut seen = HashSet::new();
        for question in &self.questions {
            if question.config_id != self.config.id {
                return Err(EngineError::InvalidInput(format!(
                    "question {} belongs to check-in {}, not {}",
                    question.id, question.config_id, self.config.id
                )));
            }
            if !seen.insert(question.id) {
                return Err(EngineError::InvalidInput(format!(
                    "question {} listed twice",
                    question.id
                )));
            }
            if question.prompt.trim().is_empty() {
                return Err(EngineError::InvalidInput(format!(
                    "question {} has an empty prompt",
                    question.id
                )));
            }
        }
        Ok(())
    }
}

/// Admin operations of an [`Engine`].
#[derive(Clone, Copy)]
pub struct Admin<'e> {
    engine: &'e Engine,
}

impl<'e> Admin<'e> {
    pub(crate) const fn new(engine: &'e Engine) -> Self {
        Self { engine }
    }

    /// Insert or replace a check-in with its questions and allow-list, and
    /// return the definition as stored.
    ///
    /// Without an explicit `starts_on`, a replaced config keeps its stored
    /// first date and a new config starts today, so a check-in created
    /// mid-week does not open with last week's instance.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` for an empty name, empty prompts,
    /// duplicate questions or questions of another config, or a storage
    /// error (nothing committed).
    pub fn upsert_checkin(&self, definition: &CheckinDefinition) -> Result<CheckinDefinition> {
        definition.validate()?;
        let mut stored = definition.clone();
        let config_id = stored.config.id;
        let distributions: Vec<CheckinDistribution> = stored
            .distributions
            .iter()
            .map(|target| CheckinDistribution {
                config_id,
                target: *target,
            })
            .collect();

        let mut tx = self.engine.begin()?;
        if stored.config.starts_on.is_none() {
            let previous = tx.checkin_config(config_id)?.and_then(|c| c.starts_on);
            stored.config.starts_on =
                Some(previous.unwrap_or_else(|| self.engine.today_at(self.engine.now())));
        }
        tx.put_checkin_config(&stored.config)?;
        tx.replace_checkin_questions(config_id, &stored.questions)?;
        tx.replace_checkin_distributions(config_id, &distributions)?;
        tx.commit()?;

        tracing::info!(
            config_id = %config_id,
            day_of_week = stored.config.day_of_week.offset(),
            is_active = stored.config.is_active,
            starts_on = ?stored.config.starts_on,
            questions = stored.questions.len(),
            distributions = distributions.len(),
            "Check-in definition stored"
        );
        Ok(stored)
    }

    /// A stored check-in definition.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` for unknown configs or a storage error.
    pub fn checkin(&self, config_id: CheckinConfigId) -> Result<CheckinDefinition> {
        let mut tx = self.engine.begin()?;
        let config = tx
            .checkin_config(config_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "checkin",
                id: config_id.to_string(),
            })?;
        let questions = tx.checkin_questions(config_id)?;
        let distributions = tx
            .checkin_distributions(config_id)?
            .into_iter()
            .map(|row| row.target)
            .collect();
        Ok(CheckinDefinition {
            config,
            questions,
            distributions,
        })
    }

    /// Insert or replace exercise metadata.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` for an empty exercise name, or a
    /// storage error.
    pub fn put_routine_item(&self, item: &RoutineItem) -> Result<()> {
        if item.exercise_name.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "exercise name must not be empty".into(),
            ));
        }
        let mut tx = self.engine.begin()?;
        tx.put_routine_item(item)?;
        tx.commit()?;
        tracing::debug!(
            routine_item_id = %item.id,
            category = ?item.category(),
            "Routine item stored"
        );
        Ok(())
    }

    /// Replace the group and challenge-group memberships of a user.
    ///
    /// # Errors
    ///
    /// Returns a storage error (nothing committed).
    pub fn replace_memberships(
        &self,
        user_id: UserId,
        memberships: &[(GroupKind, GroupId)],
    ) -> Result<()> {
        let mut tx = self.engine.begin()?;
        tx.replace_memberships(user_id, memberships)?;
        tx.commit()?;
        tracing::debug!(user_id = %user_id, groups = memberships.len(), "Memberships replaced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{day, engine_at, noon, user};
    use fitledger_core::{DayOfWeek, QuestionId, QuestionKind, RoutineItemId};

    fn definition(targets: Vec<DistributionTarget>) -> CheckinDefinition {
        let config_id = CheckinConfigId::new(3).unwrap();
        CheckinDefinition {
            config: CheckinConfig {
                id: config_id,
                name: "Check-in semanal".into(),
                day_of_week: DayOfWeek::THURSDAY,
                is_active: true,
                starts_on: None,
            },
            questions: vec![CheckinQuestion {
                id: QuestionId::new(31).unwrap(),
                config_id,
                position: 1,
                prompt: "Como foi sua semana?".into(),
                kind: QuestionKind::Text,
            }],
            distributions: targets,
        }
    }

    #[test]
    fn upsert_then_read_back() {
        let (engine, _clock) = engine_at(noon("2024-03-07"));
        let stored = engine
            .admin()
            .upsert_checkin(&definition(vec![DistributionTarget::User(user(9))]))
            .unwrap();
        assert_eq!(stored.config.starts_on, Some(day("2024-03-07")));

        let loaded = engine
            .admin()
            .checkin(CheckinConfigId::new(3).unwrap())
            .unwrap();
        assert_eq!(loaded, stored);

        // Replacing drops the allow-list, opening the check-in to everyone.
        engine.admin().upsert_checkin(&definition(Vec::new())).unwrap();
        let available = engine.scheduler().available(user(1)).unwrap().unwrap();
        assert_eq!(available.week_date, day("2024-03-03"));
    }

    #[test]
    fn new_checkin_starts_on_creation_day() {
        // Created on the Wednesday before its first Thursday.
        let (engine, clock) = engine_at(noon("2024-03-06"));
        engine.admin().upsert_checkin(&definition(Vec::new())).unwrap();
        assert_eq!(engine.scheduler().available(user(1)).unwrap(), None);

        // A later replacement keeps the original first date.
        clock.set(noon("2024-03-20"));
        let replaced = engine.admin().upsert_checkin(&definition(Vec::new())).unwrap();
        assert_eq!(replaced.config.starts_on, Some(day("2024-03-06")));

        clock.set(noon("2024-03-07"));
        let available = engine.scheduler().available(user(1)).unwrap().unwrap();
        assert_eq!(available.week_date, day("2024-03-03"));
    }

    #[test]
    fn foreign_question_rejected() {
        let (engine, _clock) = engine_at(noon("2024-03-07"));
        let mut bad = definition(Vec::new());
        bad.questions[0].config_id = CheckinConfigId::new(4).unwrap();
        assert!(matches!(
            engine.admin().upsert_checkin(&bad),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.admin().checkin(CheckinConfigId::new(3).unwrap()),
            Err(EngineError::NotFound { .. })
        ));
    }

    #[test]
    fn routine_item_requires_name() {
        let (engine, _clock) = engine_at(noon("2024-03-07"));
        let item = RoutineItem {
            id: RoutineItemId::new(1).unwrap(),
            exercise_name: "  ".into(),
            exercise_type: None,
        };
        assert!(engine.admin().put_routine_item(&item).is_err());
    }
}
