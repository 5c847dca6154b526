//! Enrollment Ledger - which users are enrolled in which courses, and since when
//!
//! Membership (`enrollments`) and registration metadata (`enrollmentMeta`) are
//! persisted under separate keys but always change together: every membership
//! entry has metadata and every metadata entry has membership.

use chrono::{DateTime, Duration, Local, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// userId -> course ids in enrollment order
pub type Membership = BTreeMap<String, Vec<String>>;

/// userId -> courseId -> metadata
pub type EnrollmentMetaMap = BTreeMap<String, BTreeMap<String, EnrollmentMeta>>;

/// Metadata recorded when a user enrolls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentMeta {
    /// `None` when the stored value was missing or unparsable
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        serialize_with = "iso_timestamp"
    )]
    pub registered_at: Option<DateTime<Utc>>,
}

impl EnrollmentMeta {
    pub fn at(registered_at: DateTime<Utc>) -> Self {
        Self {
            registered_at: Some(registered_at),
        }
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        serde_json::Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }))
}

fn iso_timestamp<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(dt) => serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => serializer.serialize_none(),
    }
}

/// Start of the current local day, expressed in UTC
pub fn local_midnight() -> DateTime<Utc> {
    Local::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// Synthetic registration dates for enrollments that have none.
///
/// A user's course at index `n` is dated `n` days before `today`, so ordering
/// among default enrollments is deterministic.
pub fn synthetic_meta(membership: &Membership, today: DateTime<Utc>) -> EnrollmentMetaMap {
    membership
        .iter()
        .map(|(user_id, course_ids)| {
            let user_meta = course_ids
                .iter()
                .enumerate()
                .map(|(index, course_id)| {
                    let offset = Duration::days(index as i64);
                    (course_id.clone(), EnrollmentMeta::at(today - offset))
                })
                .collect();
            (user_id.clone(), user_meta)
        })
        .collect()
}

/// Many-to-many relation between users and courses
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrollmentLedger {
    membership: Membership,
    meta: EnrollmentMetaMap,
}

impl EnrollmentLedger {
    pub fn from_parts(membership: Membership, meta: EnrollmentMetaMap) -> Self {
        Self { membership, meta }
    }

    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    pub fn meta(&self) -> &EnrollmentMetaMap {
        &self.meta
    }

    pub fn is_enrolled(&self, user_id: &str, course_id: &str) -> bool {
        self.membership
            .get(user_id)
            .is_some_and(|ids| ids.iter().any(|id| id == course_id))
    }

    /// Course ids of a user in enrollment order
    pub fn courses_of(&self, user_id: &str) -> &[String] {
        self.membership
            .get(user_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All users whose membership contains the course
    pub fn students_of(&self, course_id: &str) -> Vec<String> {
        self.membership
            .iter()
            .filter(|(_, ids)| ids.iter().any(|id| id == course_id))
            .map(|(user_id, _)| user_id.clone())
            .collect()
    }

    pub fn registered_at(&self, user_id: &str, course_id: &str) -> Option<DateTime<Utc>> {
        self.meta
            .get(user_id)
            .and_then(|m| m.get(course_id))
            .and_then(|m| m.registered_at)
    }

    /// Insert membership and metadata together. Idempotent: an existing
    /// enrollment keeps its original registration date.
    pub fn enroll(&mut self, user_id: &str, course_id: &str, at: DateTime<Utc>) -> bool {
        if self.is_enrolled(user_id, course_id) {
            return false;
        }

        self.membership
            .entry(user_id.to_string())
            .or_default()
            .push(course_id.to_string());
        self.meta
            .entry(user_id.to_string())
            .or_default()
            .insert(course_id.to_string(), EnrollmentMeta::at(at));

        debug!("Enrolled {} in {}", user_id, course_id);
        true
    }

    /// Remove membership and metadata together. Returns false if the user was
    /// never enrolled.
    pub fn unenroll(&mut self, user_id: &str, course_id: &str) -> bool {
        let Some(ids) = self.membership.get_mut(user_id) else {
            return false;
        };
        let before = ids.len();
        ids.retain(|id| id != course_id);
        if ids.len() == before {
            return false;
        }

        if let Some(user_meta) = self.meta.get_mut(user_id) {
            user_meta.remove(course_id);
        }

        debug!("Unenrolled {} from {}", user_id, course_id);
        true
    }

    /// Drop a course from every user. Returns (membership changed, metadata changed).
    pub fn drop_course(&mut self, course_id: &str) -> (bool, bool) {
        let mut membership_changed = false;
        for ids in self.membership.values_mut() {
            let before = ids.len();
            ids.retain(|id| id != course_id);
            membership_changed |= ids.len() != before;
        }

        let mut meta_changed = false;
        for user_meta in self.meta.values_mut() {
            meta_changed |= user_meta.remove(course_id).is_some();
        }

        (membership_changed, meta_changed)
    }

    /// Keep only users in `valid`. Returns true if anything was removed.
    pub fn retain_users(&mut self, valid: &HashSet<&str>) -> bool {
        let before = (self.membership.len(), self.meta.len());
        self.membership.retain(|user_id, _| valid.contains(user_id.as_str()));
        self.meta.retain(|user_id, _| valid.contains(user_id.as_str()));
        (self.membership.len(), self.meta.len()) != before
    }

    /// Restore the membership/metadata pairing after loading from storage.
    ///
    /// Membership without metadata gets a synthetic date; metadata without
    /// membership is dropped. Returns true if the metadata changed.
    pub fn reconcile(&mut self, today: DateTime<Utc>) -> bool {
        let mut changed = false;

        for (user_id, course_ids) in &self.membership {
            for (index, course_id) in course_ids.iter().enumerate() {
                let user_meta = self.meta.entry(user_id.clone()).or_default();
                if !user_meta.contains_key(course_id) {
                    let offset = Duration::days(index as i64);
                    user_meta.insert(course_id.clone(), EnrollmentMeta::at(today - offset));
                    changed = true;
                }
            }
        }

        let membership = &self.membership;
        for (user_id, user_meta) in self.meta.iter_mut() {
            let enrolled = membership.get(user_id).map(Vec::as_slice).unwrap_or(&[]);
            let before = user_meta.len();
            user_meta.retain(|course_id, _| enrolled.contains(course_id));
            changed |= user_meta.len() != before;
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(days_ago: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap() - Duration::days(days_ago)
    }

    #[test]
    fn test_enroll_is_idempotent_and_keeps_date() {
        let mut ledger = EnrollmentLedger::default();
        assert!(ledger.enroll("u2", "c1", ts(5)));
        assert!(!ledger.enroll("u2", "c1", ts(0)));

        assert_eq!(ledger.courses_of("u2"), ["c1".to_string()]);
        assert_eq!(ledger.registered_at("u2", "c1"), Some(ts(5)));
    }

    #[test]
    fn test_unenroll_removes_both_sides() {
        let mut ledger = EnrollmentLedger::default();
        ledger.enroll("u2", "c1", ts(1));
        ledger.enroll("u2", "c2", ts(0));

        assert!(ledger.unenroll("u2", "c1"));
        assert!(!ledger.unenroll("u2", "c1"));
        assert!(!ledger.unenroll("u9", "c1"));

        assert_eq!(ledger.courses_of("u2"), ["c2".to_string()]);
        assert!(ledger.registered_at("u2", "c1").is_none());
        assert!(ledger.meta()["u2"].contains_key("c2"));
    }

    #[test]
    fn test_students_of_course() {
        let mut ledger = EnrollmentLedger::default();
        ledger.enroll("u2", "c1", ts(0));
        ledger.enroll("u3", "c1", ts(0));
        ledger.enroll("u3", "c2", ts(0));

        assert_eq!(ledger.students_of("c1"), vec!["u2".to_string(), "u3".to_string()]);
        assert_eq!(ledger.students_of("c2"), vec!["u3".to_string()]);
        assert!(ledger.students_of("c3").is_empty());
    }

    #[test]
    fn test_retain_users_reports_changes() {
        let mut ledger = EnrollmentLedger::default();
        ledger.enroll("u2", "c1", ts(0));
        ledger.enroll("ghost", "c1", ts(0));

        let valid: HashSet<&str> = ["u1", "u2"].into_iter().collect();
        assert!(ledger.retain_users(&valid));
        assert!(!ledger.retain_users(&valid));
        assert!(!ledger.membership().contains_key("ghost"));
        assert!(!ledger.meta().contains_key("ghost"));
    }

    #[test]
    fn test_synthetic_meta_offsets_by_index() {
        let mut membership = Membership::new();
        membership.insert(
            "u2".to_string(),
            vec!["c1".to_string(), "c2".to_string(), "c3".to_string()],
        );
        let meta = synthetic_meta(&membership, ts(0));

        assert_eq!(meta["u2"]["c1"].registered_at, Some(ts(0)));
        assert_eq!(meta["u2"]["c2"].registered_at, Some(ts(1)));
        assert_eq!(meta["u2"]["c3"].registered_at, Some(ts(2)));
    }

    #[test]
    fn test_reconcile_restores_pairing() {
        let mut membership = Membership::new();
        membership.insert("u2".to_string(), vec!["c1".to_string(), "c2".to_string()]);
        let mut meta = EnrollmentMetaMap::new();
        let mut u2_meta = BTreeMap::new();
        u2_meta.insert("c1".to_string(), EnrollmentMeta::at(ts(9)));
        u2_meta.insert("c9".to_string(), EnrollmentMeta::at(ts(9)));
        meta.insert("u2".to_string(), u2_meta);

        let mut ledger = EnrollmentLedger::from_parts(membership, meta);
        assert!(ledger.reconcile(ts(0)));

        assert_eq!(ledger.registered_at("u2", "c1"), Some(ts(9)));
        assert_eq!(ledger.registered_at("u2", "c2"), Some(ts(1)));
        assert!(!ledger.meta()["u2"].contains_key("c9"));
        assert!(!ledger.reconcile(ts(0)));
    }

    #[test]
    fn test_meta_json_is_lenient() {
        let json = r#"{"u2":{"c1":{"registeredAt":"2026-02-01T00:00:00.000Z"},
            "c2":{"registeredAt":"not a date"},"c3":{}}}"#;
        let meta: EnrollmentMetaMap = serde_json::from_str(json).unwrap();

        assert_eq!(
            meta["u2"]["c1"].registered_at,
            Some(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap())
        );
        assert!(meta["u2"]["c2"].registered_at.is_none());
        assert!(meta["u2"]["c3"].registered_at.is_none());

        let out = serde_json::to_string(&meta["u2"]["c1"]).unwrap();
        assert_eq!(out, r#"{"registeredAt":"2026-02-01T00:00:00.000Z"}"#);
    }
}
