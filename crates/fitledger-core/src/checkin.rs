//! Weekly check-in types.
//!
//! A [`CheckinConfig`] opens once a week on its configured weekday. Each
//! (config, user, week anchor) pair has at most one [`CheckinAvailability`]
//! row, which moves Not Yet Open -> Open -> Completed. There is no closed
//! state: an unanswered instance stays open until the next week's instance
//! supersedes it.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::{week_start, DayOfWeek};
use crate::error::{EngineError, Result};
use crate::{CheckinConfigId, GroupId, QuestionId, ResponseId, UserId};

/// Longest accepted free-text answer, in bytes.
pub const MAX_RESPONSE_TEXT_LEN: usize = 4096;

/// Lowest answer on a scale question.
pub const SCALE_MIN: f64 = 0.0;

/// Highest answer on a scale question.
pub const SCALE_MAX: f64 = 10.0;

/// Admin-authored weekly survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinConfig {
    /// Config id. Lower ids win when several check-ins are open.
    pub id: CheckinConfigId,
    /// Display name.
    pub name: String,
    /// Weekday the check-in opens.
    pub day_of_week: DayOfWeek,
    /// Switched-off configs never open.
    pub is_active: bool,
    /// First date an instance may open, if bounded.
    ///
    /// When unset, the instance of the previous week carries over, so a
    /// Thursday check-in is already open on the Wednesday before. Admin
    /// upserts fill this in with the creation date.
    #[serde(default)]
    pub starts_on: Option<NaiveDate>,
}

impl CheckinConfig {
    /// The instance in force on `today`, if any has opened yet.
    #[must_use]
    pub fn window_at(&self, today: NaiveDate) -> Option<CheckinWindow> {
        CheckinWindow::current(self.day_of_week, self.starts_on, today)
    }
}

/// One week's instance of a check-in.
///
/// The instance of the current week opens on its check-in day. Before that
/// day the previous week's instance is still in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinWindow {
    /// Sunday anchoring the instance (`week_date`).
    pub week_date: NaiveDate,
    /// Day the instance opened.
    pub opens_on: NaiveDate,
}

impl CheckinWindow {
    /// Resolve the instance in force on `today`.
    ///
    /// Returns `None` when the resolved instance would open before
    /// `starts_on`, i.e. nothing has opened yet.
    #[must_use]
    pub fn current(
        day_of_week: DayOfWeek,
        starts_on: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Option<Self> {
        let this_week = week_start(today);
        let checkin_date = day_of_week.in_week(this_week);
        let window = if today >= checkin_date {
            Self {
                week_date: this_week,
                opens_on: checkin_date,
            }
        } else {
            Self {
                week_date: this_week - Days::new(7),
                opens_on: checkin_date - Days::new(7),
            }
        };
        match starts_on {
            Some(first) if window.opens_on < first => None,
            _ => Some(window),
        }
    }
}

/// Answer format of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Free text.
    Text,
    /// Numeric scale.
    Scale,
}

/// One question of a check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinQuestion {
    /// Question id.
    pub id: QuestionId,
    /// Owning config.
    pub config_id: CheckinConfigId,
    /// Display order.
    pub position: u32,
    /// Question text.
    pub prompt: String,
    /// Answer format.
    pub kind: QuestionKind,
}

/// Who a check-in is distributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "target_type", content = "target_id", rename_all = "snake_case")]
pub enum DistributionTarget {
    /// One user.
    User(UserId),
    /// Members of a group.
    Group(GroupId),
    /// Members of a challenge group.
    ChallengeGroup(GroupId),
}

impl DistributionTarget {
    /// Decode an admin row. Challenge groups are stored with a negative
    /// `target_id`; a `group` row with a negative id is a challenge group.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` for unknown target types or ids
    /// that cannot be valid for the type.
    pub fn from_raw(target_type: &str, target_id: i64) -> Result<Self> {
        let invalid = || {
            EngineError::InvalidInput(format!(
                "invalid distribution target {target_type}:{target_id}"
            ))
        };
        let magnitude = GroupId::new(target_id.checked_abs().ok_or_else(invalid)?)
            .map_err(|_| invalid())?;
        match target_type.trim().to_ascii_lowercase().as_str() {
            "user" => UserId::new(target_id).map(Self::User).map_err(|_| invalid()),
            "group" if target_id < 0 => Ok(Self::ChallengeGroup(magnitude)),
            "group" => Ok(Self::Group(magnitude)),
            "challenge_group" => Ok(Self::ChallengeGroup(magnitude)),
            _ => Err(invalid()),
        }
    }

    /// Encode as an admin row (`target_type`, `target_id`).
    #[must_use]
    pub fn to_raw(self) -> (&'static str, i64) {
        match self {
            Self::User(user) => ("user", user.get()),
            Self::Group(group) => ("group", group.get()),
            Self::ChallengeGroup(group) => ("challenge_group", -group.get()),
        }
    }
}

/// Allow-list row attaching a config to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinDistribution {
    /// The config being distributed.
    pub config_id: CheckinConfigId,
    /// Who may see it.
    pub target: DistributionTarget,
}

/// Kind of group a user belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    /// A regular user group.
    Group,
    /// A challenge group.
    ChallengeGroup,
}

/// Group memberships of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memberships {
    groups: HashSet<GroupId>,
    challenge_groups: HashSet<GroupId>,
}

impl Memberships {
    /// Build from `(kind, group)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (GroupKind, GroupId)>) -> Self {
        let mut memberships = Self::default();
        for (kind, group) in pairs {
            match kind {
                GroupKind::Group => memberships.groups.insert(group),
                GroupKind::ChallengeGroup => memberships.challenge_groups.insert(group),
            };
        }
        memberships
    }

    /// Whether `user_id` with these memberships matches `target`.
    #[must_use]
    pub fn matches(&self, user_id: UserId, target: DistributionTarget) -> bool {
        match target {
            DistributionTarget::User(target_user) => target_user == user_id,
            DistributionTarget::Group(group) => self.groups.contains(&group),
            DistributionTarget::ChallengeGroup(group) => self.challenge_groups.contains(&group),
        }
    }
}

/// Access check: a config without distribution rows is open to everyone,
/// otherwise the user must match at least one row.
#[must_use]
pub fn is_distributed_to(
    distributions: &[CheckinDistribution],
    user_id: UserId,
    memberships: &Memberships,
) -> bool {
    distributions.is_empty()
        || distributions
            .iter()
            .any(|row| memberships.matches(user_id, row.target))
}

/// Weekly state of a check-in for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckinState {
    /// The first instance has not opened yet.
    NotYetOpen,
    /// Open and unanswered.
    Open,
    /// Completed for the instance in force.
    Completed,
}

/// Per (config, user, week) state row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinAvailability {
    /// Config.
    pub config_id: CheckinConfigId,
    /// User.
    pub user_id: UserId,
    /// Sunday anchor of the instance.
    pub week_date: NaiveDate,
    /// The instance has been surfaced to the user.
    pub is_available: bool,
    /// The user submitted the instance.
    pub is_completed: bool,
    /// A celebratory message was shown for this instance.
    pub congrats_shown: bool,
    /// When the instance was first surfaced.
    pub available_at: Option<DateTime<Utc>>,
    /// When the instance was completed.
    pub completed_at: Option<DateTime<Utc>>,
}

impl CheckinAvailability {
    /// A freshly surfaced instance.
    #[must_use]
    pub const fn opened(
        config_id: CheckinConfigId,
        user_id: UserId,
        week_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            config_id,
            user_id,
            week_date,
            is_available: true,
            is_completed: false,
            congrats_shown: false,
            available_at: Some(now),
            completed_at: None,
        }
    }

    /// Mark as surfaced, keeping the first `available_at`.
    pub fn mark_available(&mut self, now: DateTime<Utc>) {
        self.is_available = true;
        if self.available_at.is_none() {
            self.available_at = Some(now);
        }
    }

    /// Mark as completed. `fresh_award` records whether this submission
    /// earned the points, which is when the congrats signal fires.
    pub fn mark_completed(&mut self, now: DateTime<Utc>, fresh_award: bool) {
        self.mark_available(now);
        if !self.is_completed {
            self.is_completed = true;
            self.completed_at = Some(now);
        }
        if fresh_award {
            self.congrats_shown = true;
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> CheckinState {
        if self.is_completed {
            CheckinState::Completed
        } else {
            CheckinState::Open
        }
    }
}

/// A check-in answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseAnswer {
    /// `response_text`.
    Text(String),
    /// `response_value`.
    Value(f64),
}

impl ResponseAnswer {
    /// Validate the answer against the kind of question it answers.
    ///
    /// Text questions take bounded text; scale questions take a value in
    /// `SCALE_MIN..=SCALE_MAX`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` for an answer of the wrong kind,
    /// oversized text or an out-of-range value.
    pub fn validate(&self, kind: QuestionKind) -> Result<()> {
        match (kind, self) {
            (QuestionKind::Text, Self::Text(text)) if text.len() > MAX_RESPONSE_TEXT_LEN => Err(
                EngineError::InvalidInput(format!("response exceeds {MAX_RESPONSE_TEXT_LEN} bytes")),
            ),
            (QuestionKind::Text, Self::Text(_)) => Ok(()),
            (QuestionKind::Scale, Self::Value(value))
                if value.is_finite() && (SCALE_MIN..=SCALE_MAX).contains(value) =>
            {
                Ok(())
            }
            (QuestionKind::Scale, Self::Value(_)) => Err(EngineError::InvalidInput(format!(
                "scale answers must be between {SCALE_MIN} and {SCALE_MAX}"
            ))),
            (QuestionKind::Text, Self::Value(_)) => Err(EngineError::InvalidInput(
                "text questions take response_text".into(),
            )),
            (QuestionKind::Scale, Self::Text(_)) => Err(EngineError::InvalidInput(
                "scale questions take response_value".into(),
            )),
        }
    }
}

/// One answer submitted by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResponse {
    /// The question answered.
    pub question_id: QuestionId,
    /// The answer.
    pub answer: ResponseAnswer,
}

/// A stored answer. Rows from earlier weeks are retained for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinResponse {
    /// Row id.
    pub id: ResponseId,
    /// Config.
    pub config_id: CheckinConfigId,
    /// User.
    pub user_id: UserId,
    /// Instance the answer belongs to.
    pub week_date: NaiveDate,
    /// Question answered.
    pub question_id: QuestionId,
    /// The answer.
    pub answer: ResponseAnswer,
    /// When the answer was last written.
    pub submitted_at: DateTime<Utc>,
}

/// Keep the most recent answer per question among rows recorded against
/// `window`, ordered by question id.
#[must_use]
pub fn latest_in_window(
    responses: impl IntoIterator<Item = CheckinResponse>,
    window: &CheckinWindow,
) -> Vec<CheckinResponse> {
    let mut latest: BTreeMap<QuestionId, CheckinResponse> = BTreeMap::new();
    for response in responses {
        if response.week_date != window.week_date {
            continue;
        }
        match latest.get(&response.question_id) {
            Some(existing) if existing.submitted_at > response.submitted_at => {}
            _ => {
                latest.insert(response.question_id, response);
            }
        }
    }
    latest.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::parse_date;
    use chrono::TimeZone;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn user(id: i64) -> UserId {
        UserId::new(id).unwrap()
    }

    fn group(id: i64) -> GroupId {
        GroupId::new(id).unwrap()
    }

    fn config_id() -> CheckinConfigId {
        CheckinConfigId::new(1).unwrap()
    }

    #[test]
    fn open_from_checkin_day_through_following_week() {
        // Thursday 2024-03-07 opens the instance anchored at 2024-03-03.
        let thursday = CheckinWindow::current(DayOfWeek::THURSDAY, None, date("2024-03-07"));
        assert_eq!(
            thursday,
            Some(CheckinWindow {
                week_date: date("2024-03-03"),
                opens_on: date("2024-03-07"),
            })
        );

        // The following Tuesday still shows that instance.
        let tuesday = CheckinWindow::current(DayOfWeek::THURSDAY, None, date("2024-03-12"));
        assert_eq!(tuesday.map(|w| w.week_date), Some(date("2024-03-03")));

        // The next Thursday supersedes it.
        let next = CheckinWindow::current(DayOfWeek::THURSDAY, None, date("2024-03-14"));
        assert_eq!(next.map(|w| w.week_date), Some(date("2024-03-10")));
    }

    #[test]
    fn not_open_before_first_checkin_day() {
        let starts_on = Some(date("2024-03-03"));
        // Wednesday before the first Thursday.
        assert_eq!(
            CheckinWindow::current(DayOfWeek::THURSDAY, starts_on, date("2024-03-06")),
            None
        );
        assert!(CheckinWindow::current(DayOfWeek::THURSDAY, starts_on, date("2024-03-07")).is_some());
    }

    #[test]
    fn sunday_checkin_opens_on_anchor() {
        let window = CheckinWindow::current(DayOfWeek::SUNDAY, None, date("2024-03-10")).unwrap();
        assert_eq!(window.week_date, date("2024-03-10"));
        assert_eq!(window.opens_on, date("2024-03-10"));
    }

    #[test]
    fn raw_targets_decode() {
        assert_eq!(
            DistributionTarget::from_raw("user", 5).unwrap(),
            DistributionTarget::User(user(5))
        );
        assert_eq!(
            DistributionTarget::from_raw("group", 8).unwrap(),
            DistributionTarget::Group(group(8))
        );
        assert_eq!(
            DistributionTarget::from_raw("group", -8).unwrap(),
            DistributionTarget::ChallengeGroup(group(8))
        );
        assert_eq!(
            DistributionTarget::from_raw("challenge_group", -8).unwrap(),
            DistributionTarget::ChallengeGroup(group(8))
        );
        assert_eq!(
            DistributionTarget::ChallengeGroup(group(8)).to_raw(),
            ("challenge_group", -8)
        );
        assert!(DistributionTarget::from_raw("user", -5).is_err());
        assert!(DistributionTarget::from_raw("team", 5).is_err());
        assert!(DistributionTarget::from_raw("group", 0).is_err());
    }

    #[test]
    fn empty_distribution_is_open_to_all() {
        assert!(is_distributed_to(&[], user(1), &Memberships::default()));
    }

    #[test]
    fn distribution_requires_a_match() {
        let rows = [
            CheckinDistribution {
                config_id: config_id(),
                target: DistributionTarget::User(user(2)),
            },
            CheckinDistribution {
                config_id: config_id(),
                target: DistributionTarget::Group(group(10)),
            },
            CheckinDistribution {
                config_id: config_id(),
                target: DistributionTarget::ChallengeGroup(group(20)),
            },
        ];
        let none = Memberships::default();
        assert!(is_distributed_to(&rows, user(2), &none));
        assert!(!is_distributed_to(&rows, user(3), &none));

        let in_group = Memberships::from_pairs([(GroupKind::Group, group(10))]);
        assert!(is_distributed_to(&rows, user(3), &in_group));

        // Group 20 as a plain group is not challenge group 20.
        let wrong_kind = Memberships::from_pairs([(GroupKind::Group, group(20))]);
        assert!(!is_distributed_to(&rows, user(3), &wrong_kind));

        let in_challenge = Memberships::from_pairs([(GroupKind::ChallengeGroup, group(20))]);
        assert!(is_distributed_to(&rows, user(3), &in_challenge));
    }

    #[test]
    fn completion_sets_congrats_only_for_fresh_award() {
        let now = Utc::now();
        let mut row = CheckinAvailability::opened(config_id(), user(1), date("2024-03-03"), now);
        row.mark_completed(now, false);
        assert!(row.is_completed);
        assert!(!row.congrats_shown);
        assert_eq!(row.state(), CheckinState::Completed);

        let mut fresh = CheckinAvailability::opened(config_id(), user(1), date("2024-03-03"), now);
        fresh.mark_completed(now, true);
        assert!(fresh.congrats_shown);
        assert_eq!(fresh.completed_at, Some(now));
    }

    #[test]
    fn latest_answer_per_question_inside_window() {
        let window = CheckinWindow {
            week_date: date("2024-03-03"),
            opens_on: date("2024-03-07"),
        };
        let at = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap();
        let response = |q: i64, text: &str, when: DateTime<Utc>| CheckinResponse {
            id: ResponseId::generate(),
            config_id: config_id(),
            user_id: user(1),
            week_date: week_start(when.date_naive()),
            question_id: QuestionId::new(q).unwrap(),
            answer: ResponseAnswer::Text(text.into()),
            submitted_at: when,
        };

        let mut carried = response(3, "previous instance", at(5, 9));
        carried.week_date = date("2024-02-25");
        let rows = vec![
            response(1, "last week", at(1, 9)),
            response(1, "draft", at(7, 9)),
            response(1, "final", at(7, 10)),
            response(2, "old only", at(2, 9)),
            carried,
        ];
        let latest = latest_in_window(rows, &window);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].answer, ResponseAnswer::Text("final".into()));
    }

    #[test]
    fn oversized_text_rejected() {
        let answer = ResponseAnswer::Text("x".repeat(MAX_RESPONSE_TEXT_LEN + 1));
        assert!(answer.validate(QuestionKind::Text).is_err());
        assert!(ResponseAnswer::Text("ok".into())
            .validate(QuestionKind::Text)
            .is_ok());
    }

    #[test]
    fn answers_must_match_question_kind() {
        assert!(ResponseAnswer::Value(4.0).validate(QuestionKind::Scale).is_ok());
        assert!(ResponseAnswer::Value(SCALE_MIN).validate(QuestionKind::Scale).is_ok());
        assert!(ResponseAnswer::Value(SCALE_MAX).validate(QuestionKind::Scale).is_ok());

        for bad in [-5000.0, -0.5, 10.5, f64::INFINITY, f64::NAN] {
            assert!(
                ResponseAnswer::Value(bad).validate(QuestionKind::Scale).is_err(),
                "{bad} accepted on a scale question"
            );
        }
        assert!(ResponseAnswer::Text("banana".into())
            .validate(QuestionKind::Scale)
            .is_err());
        assert!(ResponseAnswer::Value(3.0).validate(QuestionKind::Text).is_err());
    }
}
