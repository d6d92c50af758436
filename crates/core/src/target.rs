//! Target status derivation: hospital classification, online inference,
//! medding detection, and roster ordering.
//!
//! Everything here is a pure function of the upstream member record, the
//! previous snapshot's entry for the same target, a capture timestamp, and a
//! [`StatusPolicy`]. The cache layer calls [`derive_targets`] once per refresh.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::types::{EpochSecs, PlayerId};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Remaining hospital time at or below which a target is "about to exit".
pub const DEFAULT_ABOUT_TO_EXIT_SECS: i64 = 30;

/// Last action younger than this means the target is probably online.
pub const DEFAULT_ONLINE_WINDOW_SECS: i64 = 120;

/// Last action younger than this (but not online) means idle.
pub const DEFAULT_IDLE_WINDOW_SECS: i64 = 300;

/// How far ahead of the predicted release a target must leave hospital to
/// be flagged as medding.
pub const DEFAULT_MEDDING_MIN_EARLY_SECS: i64 = 60;

/// How long a medding flag stays up after the early exit was observed.
pub const DEFAULT_MEDDING_HOLD_SECS: i64 = 60;

/// Correction subtracted from the upstream hospital `until` timestamp.
///
/// The upstream API reports release times exactly one hour after the time
/// shown in-game.
pub const DEFAULT_HOSPITAL_UNTIL_OFFSET_SECS: i64 = 3600;

/// Upstream status states that mean the player is away travelling.
const TRAVEL_STATES: [&str; 2] = ["Traveling", "Abroad"];

/// Upstream status state for hospitalized players.
const HOSPITAL_STATE: &str = "Hospital";

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Tunable thresholds for the derived status fields.
///
/// These are heuristics without a hard derivation; every value is
/// configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPolicy {
    pub about_to_exit_secs: i64,
    pub online_window_secs: i64,
    pub idle_window_secs: i64,
    pub medding_min_early_secs: i64,
    pub medding_hold_secs: i64,
    pub hospital_until_offset_secs: i64,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            about_to_exit_secs: DEFAULT_ABOUT_TO_EXIT_SECS,
            online_window_secs: DEFAULT_ONLINE_WINDOW_SECS,
            idle_window_secs: DEFAULT_IDLE_WINDOW_SECS,
            medding_min_early_secs: DEFAULT_MEDDING_MIN_EARLY_SECS,
            medding_hold_secs: DEFAULT_MEDDING_HOLD_SECS,
            hospital_until_offset_secs: DEFAULT_HOSPITAL_UNTIL_OFFSET_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Hospital state of a target at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HospitalStatus {
    InHospital,
    AboutToExit,
    Out,
}

impl HospitalStatus {
    pub fn is_hospitalized(self) -> bool {
        !matches!(self, HospitalStatus::Out)
    }

    /// Sort rank: about-to-exit first, then hospitalized, then out.
    fn rank(self) -> u8 {
        match self {
            HospitalStatus::AboutToExit => 0,
            HospitalStatus::InHospital => 1,
            HospitalStatus::Out => 2,
        }
    }
}

/// Online state inferred from the last action timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnlineStatus {
    Online,
    Idle,
    Offline,
    Unknown,
}

/// One faction member as reported by the upstream API, before derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub user_id: PlayerId,
    pub name: String,
    pub level: i32,
    /// Upstream status state, e.g. `"Okay"`, `"Hospital"`, `"Traveling"`.
    pub state: String,
    pub description: String,
    /// Raw upstream `until` timestamp (0 when absent).
    pub until: EpochSecs,
    pub last_action_ts: Option<EpochSecs>,
    pub last_action_relative: String,
}

/// Derived status of one target at capture time.
///
/// Rebuilt from scratch on every refresh; never mutated after capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetStatus {
    pub user_id: PlayerId,
    pub name: String,
    pub level: i32,

    pub hospital_until: Option<EpochSecs>,
    pub hospital_remaining: i64,
    pub hospital_status: HospitalStatus,
    pub hospital_reason: String,
    /// Capture time at which the target was first seen entering hospital.
    pub hospitalized_at: Option<EpochSecs>,

    pub traveling: bool,
    pub travel_destination: String,
    pub travel_until: Option<EpochSecs>,

    pub last_action_ts: Option<EpochSecs>,
    pub last_action_relative: String,
    pub estimated_online: OnlineStatus,

    pub medding: bool,
    pub medded_at: Option<EpochSecs>,

    pub last_updated: EpochSecs,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Apply the upstream offset correction to a raw hospital `until` value.
///
/// Returns `None` when upstream reported no release time.
pub fn corrected_hospital_until(raw_until: EpochSecs, policy: &StatusPolicy) -> Option<EpochSecs> {
    (raw_until > 0).then(|| raw_until - policy.hospital_until_offset_secs)
}

/// Classify the hospital state from the upstream state and corrected release time.
pub fn classify_hospital(
    state: &str,
    hospital_until: Option<EpochSecs>,
    now: EpochSecs,
    policy: &StatusPolicy,
) -> HospitalStatus {
    match hospital_until {
        Some(until) if state == HOSPITAL_STATE && until > now => {
            if until - now <= policy.about_to_exit_secs {
                HospitalStatus::AboutToExit
            } else {
                HospitalStatus::InHospital
            }
        }
        _ => HospitalStatus::Out,
    }
}

/// Bucket the time since the last action into an online estimate.
///
/// Upstream "online" indicators are deliberately ignored.
pub fn infer_online(
    last_action_ts: Option<EpochSecs>,
    now: EpochSecs,
    policy: &StatusPolicy,
) -> OnlineStatus {
    let Some(ts) = last_action_ts.filter(|ts| *ts > 0) else {
        return OnlineStatus::Unknown;
    };
    let seconds_ago = now - ts;
    if seconds_ago < policy.online_window_secs {
        OnlineStatus::Online
    } else if seconds_ago < policy.idle_window_secs {
        OnlineStatus::Idle
    } else {
        OnlineStatus::Offline
    }
}

/// Whether `prev` → `now_status` looks like an early exit from hospital.
///
/// True when the previous capture had the target hospitalized, the current
/// capture has it out, and the previously predicted release was more than
/// `medding_min_early_secs` in the future. A heuristic: attack-triggered
/// early exits also match.
pub fn detect_medding(
    prev: &TargetStatus,
    now_status: HospitalStatus,
    now: EpochSecs,
    policy: &StatusPolicy,
) -> bool {
    if !prev.hospital_status.is_hospitalized() || now_status.is_hospitalized() {
        return false;
    }
    prev.hospital_until
        .is_some_and(|until| until - now > policy.medding_min_early_secs)
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Derive one target's status from its upstream record and its previous entry.
pub fn derive_target(
    record: &MemberRecord,
    prev: Option<&TargetStatus>,
    now: EpochSecs,
    policy: &StatusPolicy,
) -> TargetStatus {
    let corrected_until = corrected_hospital_until(record.until, policy);
    let hospital_status = classify_hospital(&record.state, corrected_until, now, policy);
    let hospitalized = hospital_status.is_hospitalized();

    let (hospital_until, hospital_remaining, hospital_reason) = match corrected_until {
        Some(until) if hospitalized => (Some(until), (until - now).max(0), record.description.clone()),
        _ => (None, 0, String::new()),
    };

    let hospitalized_at = if hospitalized {
        match prev {
            Some(p) if p.hospital_status.is_hospitalized() => p.hospitalized_at.or(Some(now)),
            _ => Some(now),
        }
    } else {
        None
    };

    let medded_at = match prev {
        Some(p) if detect_medding(p, hospital_status, now, policy) => Some(now),
        Some(p) if !hospitalized => p
            .medded_at
            .filter(|at| now - at < policy.medding_hold_secs),
        _ => None,
    };

    let traveling = TRAVEL_STATES.contains(&record.state.as_str());
    let (travel_destination, travel_until) = if traveling {
        (record.description.clone(), (record.until > 0).then_some(record.until))
    } else {
        (String::new(), None)
    };

    TargetStatus {
        user_id: record.user_id,
        name: record.name.clone(),
        level: record.level,
        hospital_until,
        hospital_remaining,
        hospital_status,
        hospital_reason,
        hospitalized_at,
        traveling,
        travel_destination,
        travel_until,
        last_action_ts: record.last_action_ts.filter(|ts| *ts > 0),
        last_action_relative: record.last_action_relative.clone(),
        estimated_online: infer_online(record.last_action_ts, now, policy),
        medding: medded_at.is_some(),
        medded_at,
        last_updated: now,
    }
}

/// Derive the full target roster for one capture.
///
/// Duplicate ids keep their first occurrence. The result is ordered with
/// [`roster_order`].
pub fn derive_targets(
    records: &[MemberRecord],
    previous: &[TargetStatus],
    now: EpochSecs,
    policy: &StatusPolicy,
) -> Vec<TargetStatus> {
    let prev_by_id: HashMap<PlayerId, &TargetStatus> =
        previous.iter().map(|t| (t.user_id, t)).collect();
    let mut seen = HashSet::with_capacity(records.len());

    let mut targets: Vec<TargetStatus> = records
        .iter()
        .filter(|r| seen.insert(r.user_id))
        .map(|r| derive_target(r, prev_by_id.get(&r.user_id).copied(), now, policy))
        .collect();

    targets.sort_by(roster_order);
    targets
}

/// Roster ordering: about-to-exit first, then hospitalized, then out;
/// shortest remaining hospital time first; online targets before others;
/// finally by id for a stable order.
pub fn roster_order(a: &TargetStatus, b: &TargetStatus) -> Ordering {
    let remaining = |t: &TargetStatus| {
        if t.hospital_remaining > 0 {
            t.hospital_remaining
        } else {
            i64::MAX
        }
    };
    let online_rank = |t: &TargetStatus| u8::from(t.estimated_online != OnlineStatus::Online);

    a.hospital_status
        .rank()
        .cmp(&b.hospital_status.rank())
        .then_with(|| remaining(a).cmp(&remaining(b)))
        .then_with(|| online_rank(a).cmp(&online_rank(b)))
        .then_with(|| a.user_id.cmp(&b.user_id))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: EpochSecs = 1_700_000_000;

    fn policy() -> StatusPolicy {
        StatusPolicy {
            hospital_until_offset_secs: 0,
            ..StatusPolicy::default()
        }
    }

    fn member(id: PlayerId, state: &str, until: EpochSecs) -> MemberRecord {
        MemberRecord {
            user_id: id,
            name: format!("Target{id}"),
            level: 50,
            state: state.to_string(),
            description: "In hospital for 3 mins".to_string(),
            until,
            last_action_ts: Some(NOW - 30),
            last_action_relative: "30 seconds ago".to_string(),
        }
    }

    // -- classify_hospital ----------------------------------------------------

    #[test]
    fn hospital_with_future_release_is_in_hospital() {
        let p = policy();
        assert_eq!(
            classify_hospital("Hospital", Some(NOW + 600), NOW, &p),
            HospitalStatus::InHospital
        );
    }

    #[test]
    fn hospital_near_release_is_about_to_exit() {
        let p = policy();
        assert_eq!(
            classify_hospital("Hospital", Some(NOW + 30), NOW, &p),
            HospitalStatus::AboutToExit
        );
        assert_eq!(
            classify_hospital("Hospital", Some(NOW + 31), NOW, &p),
            HospitalStatus::InHospital
        );
    }

    #[test]
    fn hospital_with_past_release_is_out() {
        let p = policy();
        assert_eq!(classify_hospital("Hospital", Some(NOW), NOW, &p), HospitalStatus::Out);
        assert_eq!(classify_hospital("Hospital", None, NOW, &p), HospitalStatus::Out);
    }

    #[test]
    fn non_hospital_state_is_out() {
        let p = policy();
        assert_eq!(
            classify_hospital("Traveling", Some(NOW + 600), NOW, &p),
            HospitalStatus::Out
        );
    }

    #[test]
    fn offset_is_subtracted_from_raw_until() {
        let p = StatusPolicy::default();
        assert_eq!(corrected_hospital_until(NOW + 3_700, &p), Some(NOW + 100));
        assert_eq!(corrected_hospital_until(0, &p), None);
    }

    // -- infer_online ---------------------------------------------------------

    #[test]
    fn online_buckets() {
        let p = policy();
        assert_eq!(infer_online(Some(NOW - 10), NOW, &p), OnlineStatus::Online);
        assert_eq!(infer_online(Some(NOW - 119), NOW, &p), OnlineStatus::Online);
        assert_eq!(infer_online(Some(NOW - 120), NOW, &p), OnlineStatus::Idle);
        assert_eq!(infer_online(Some(NOW - 299), NOW, &p), OnlineStatus::Idle);
        assert_eq!(infer_online(Some(NOW - 300), NOW, &p), OnlineStatus::Offline);
    }

    #[test]
    fn missing_last_action_is_unknown() {
        let p = policy();
        assert_eq!(infer_online(None, NOW, &p), OnlineStatus::Unknown);
        assert_eq!(infer_online(Some(0), NOW, &p), OnlineStatus::Unknown);
    }

    #[test]
    fn online_buckets_follow_policy() {
        let p = StatusPolicy {
            online_window_secs: 300,
            idle_window_secs: 900,
            ..policy()
        };
        assert_eq!(infer_online(Some(NOW - 200), NOW, &p), OnlineStatus::Online);
        assert_eq!(infer_online(Some(NOW - 600), NOW, &p), OnlineStatus::Idle);
    }

    // -- detect_medding / derive_target ---------------------------------------

    #[test]
    fn early_exit_is_flagged_as_medding() {
        let p = policy();
        let prev = derive_target(&member(1, "Hospital", NOW + 600), None, NOW, &p);
        assert_eq!(prev.hospital_status, HospitalStatus::InHospital);

        let later = NOW + 10;
        let now_out = derive_target(&member(1, "Okay", 0), Some(&prev), later, &p);
        assert!(now_out.medding);
        assert_eq!(now_out.medded_at, Some(later));
    }

    #[test]
    fn natural_release_is_not_medding() {
        let p = policy();
        let prev = derive_target(&member(1, "Hospital", NOW + 20), None, NOW, &p);
        let now_out = derive_target(&member(1, "Okay", 0), Some(&prev), NOW + 25, &p);
        assert!(!now_out.medding);
    }

    #[test]
    fn medding_flag_held_then_cleared() {
        let p = policy();
        let prev = derive_target(&member(1, "Hospital", NOW + 600), None, NOW, &p);
        let flagged = derive_target(&member(1, "Okay", 0), Some(&prev), NOW + 5, &p);
        assert!(flagged.medding);

        let held = derive_target(&member(1, "Okay", 0), Some(&flagged), NOW + 30, &p);
        assert!(held.medding);

        let cleared = derive_target(&member(1, "Okay", 0), Some(&held), NOW + 70, &p);
        assert!(!cleared.medding);
        assert_eq!(cleared.medded_at, None);
    }

    #[test]
    fn no_previous_entry_never_medding() {
        let p = policy();
        let t = derive_target(&member(1, "Okay", 0), None, NOW, &p);
        assert!(!t.medding);
    }

    #[test]
    fn hospitalized_at_carried_while_in_hospital() {
        let p = policy();
        let first = derive_target(&member(1, "Hospital", NOW + 600), None, NOW, &p);
        assert_eq!(first.hospitalized_at, Some(NOW));

        let second = derive_target(&member(1, "Hospital", NOW + 600), Some(&first), NOW + 4, &p);
        assert_eq!(second.hospitalized_at, Some(NOW));

        let out = derive_target(&member(1, "Okay", 0), Some(&second), NOW + 700, &p);
        assert_eq!(out.hospitalized_at, None);

        let back_in = derive_target(&member(1, "Hospital", NOW + 2_000), Some(&out), NOW + 800, &p);
        assert_eq!(back_in.hospitalized_at, Some(NOW + 800));
    }

    #[test]
    fn travel_fields_populated_when_traveling() {
        let p = policy();
        let mut record = member(1, "Traveling", NOW + 900);
        record.description = "Traveling to Mexico".to_string();
        let t = derive_target(&record, None, NOW, &p);

        assert!(t.traveling);
        assert_eq!(t.travel_destination, "Traveling to Mexico");
        assert_eq!(t.travel_until, Some(NOW + 900));
        assert_eq!(t.hospital_status, HospitalStatus::Out);
        assert_eq!(t.hospital_reason, "");
    }

    // -- derive_targets / roster_order ----------------------------------------

    #[test]
    fn roster_sorted_by_hospital_state_then_remaining() {
        let p = policy();
        let records = vec![
            member(1, "Okay", 0),
            member(2, "Hospital", NOW + 900),
            member(3, "Hospital", NOW + 20),
            member(4, "Hospital", NOW + 300),
        ];
        let ids: Vec<_> = derive_targets(&records, &[], NOW, &p)
            .iter()
            .map(|t| t.user_id)
            .collect();
        assert_eq!(ids, vec![3, 4, 2, 1]);
    }

    #[test]
    fn duplicate_records_keep_first() {
        let p = policy();
        let mut dup = member(1, "Okay", 0);
        dup.name = "Impostor".to_string();
        let targets = derive_targets(&[member(1, "Okay", 0), dup], &[], NOW, &p);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "Target1");
    }
}
