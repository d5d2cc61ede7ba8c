//! Alerts and the notifications they fan out to.
//!
//! A production [`Alert`] is raised about one cow and delivered as one
//! [`NewNotification`] per manager of that cow, looked up through a
//! [`ManagerDirectory`]. An expired batch may hold milk from several cows; its
//! alerts reach each manager once, naming all of their cows in the batch.
//! Delivery itself (push, sockets) is not handled here.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::Batch;
use crate::policy::ProductionRange;
use crate::summary::DailySummary;
use crate::types::{BatchId, CowId, NotificationId, UserId, ValidationError};

/// Kind of alert, stored as the notification type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowProduction,
    HighProduction,
    MilkExpiry,
}

impl AlertKind {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LowProduction => "low_production",
            Self::HighProduction => "high_production",
            Self::MilkExpiry => "milk_expiry",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AlertKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low_production" => Ok(Self::LowProduction),
            "high_production" => Ok(Self::HighProduction),
            "milk_expiry" => Ok(Self::MilkExpiry),
            _ => Err(ValidationError::InvalidAlertKind {
                value: s.to_string(),
            }),
        }
    }
}

/// Looks up who should hear about a cow.
///
/// This allows alerting to work with different directory backends
/// (e.g., the `SQLite` herd tables, or test fixtures).
pub trait ManagerDirectory {
    type Error;

    /// Users who manage the cow. Empty when nobody does.
    fn managers_of(&self, cow_id: CowId) -> Result<BTreeSet<UserId>, Self::Error>;

    /// Display name of the cow, if it is known.
    fn cow_name(&self, cow_id: CowId) -> Result<Option<String>, Self::Error>;
}

/// An alert about one cow, with its resolved recipients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub cow_id: CowId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
    pub message: String,
    pub recipients: BTreeSet<UserId>,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    /// Checks a daily summary against the range. `None` when production is normal.
    pub fn for_summary<D: ManagerDirectory>(
        directory: &D,
        summary: &DailySummary,
        range: &ProductionRange,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, D::Error> {
        let Some(kind) = range.classify(summary.total) else {
            return Ok(None);
        };
        let cow = cow_label(directory, summary.cow_id)?;
        let message = match kind {
            AlertKind::LowProduction => format!(
                "Low milk production: {cow} produced {} L on {}, below the {} L standard",
                summary.total, summary.date, range.low
            ),
            _ => format!(
                "High milk production: {cow} produced {} L on {}, above the {} L standard",
                summary.total, summary.date, range.high
            ),
        };
        Ok(Some(Self {
            kind,
            cow_id: summary.cow_id,
            batch_id: None,
            message,
            recipients: directory.managers_of(summary.cow_id)?,
            raised_at: now,
        }))
    }

    /// Builds the expiry alerts for `batch`, which holds milk from `cows`.
    ///
    /// Every manager is a recipient of exactly one alert. Managers whose cows in
    /// the batch are the same share that alert. Cows nobody manages get an alert
    /// with no recipients. The alert's `cow_id` is the lowest cow it names.
    pub fn for_expired_batch<D: ManagerDirectory>(
        directory: &D,
        batch: &Batch,
        cows: &[CowId],
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, D::Error> {
        let mut by_manager: BTreeMap<UserId, BTreeSet<CowId>> = BTreeMap::new();
        let mut unmanaged = BTreeSet::new();
        for &cow_id in cows {
            let managers = directory.managers_of(cow_id)?;
            if managers.is_empty() {
                unmanaged.insert(cow_id);
            }
            for user_id in managers {
                by_manager.entry(user_id).or_default().insert(cow_id);
            }
        }

        let mut groups: BTreeMap<BTreeSet<CowId>, BTreeSet<UserId>> = BTreeMap::new();
        for (user_id, their_cows) in by_manager {
            groups.entry(their_cows).or_default().insert(user_id);
        }
        if !unmanaged.is_empty() {
            groups.insert(unmanaged, BTreeSet::new());
        }

        let mut alerts = Vec::with_capacity(groups.len());
        for (group, recipients) in groups {
            let Some(&cow_id) = group.first() else {
                continue;
            };
            let mut labels = Vec::with_capacity(group.len());
            for &cow in &group {
                labels.push(cow_label(directory, cow)?);
            }
            let message = format!(
                "Milk batch {} from {} expired at {} ({} L, produced {})",
                batch.batch_number,
                labels.join(", "),
                batch.expiry_time.format("%Y-%m-%d %H:%M UTC"),
                batch.total_volume,
                batch.production_time.format("%Y-%m-%d %H:%M UTC"),
            );
            alerts.push(Self {
                kind: AlertKind::MilkExpiry,
                cow_id,
                batch_id: Some(batch.id),
                message,
                recipients,
                raised_at: now,
            });
        }
        Ok(alerts)
    }

    /// One notification per recipient.
    pub fn notifications(&self) -> impl Iterator<Item = NewNotification> + '_ {
        self.recipients.iter().map(|user_id| NewNotification {
            user_id: *user_id,
            cow_id: self.cow_id,
            batch_id: self.batch_id,
            kind: self.kind,
            message: self.message.clone(),
            created_at: self.raised_at,
        })
    }
}

/// A notification ready to be handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: UserId,
    pub cow_id: CowId,
    pub batch_id: Option<BatchId>,
    pub kind: AlertKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// A stored notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub cow_id: CowId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
    pub kind: AlertKind,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

fn cow_label<D: ManagerDirectory>(directory: &D, cow_id: CowId) -> Result<String, D::Error> {
    Ok(match directory.cow_name(cow_id)? {
        Some(name) => format!("cow #{cow_id} ({name})"),
        None => format!("cow #{cow_id}"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::convert::Infallible;

    use chrono::{NaiveDate, TimeZone};

    use super::*;
    use crate::batch::BatchStatus;
    use crate::bucket::TimeBucket;
    use crate::summary::SummaryKey;
    use crate::types::Volume;

    #[derive(Default)]
    struct FakeDirectory {
        names: HashMap<CowId, String>,
        managers: HashMap<CowId, BTreeSet<UserId>>,
    }

    impl ManagerDirectory for FakeDirectory {
        type Error = Infallible;

        fn managers_of(&self, cow_id: CowId) -> Result<BTreeSet<UserId>, Self::Error> {
            Ok(self.managers.get(&cow_id).cloned().unwrap_or_default())
        }

        fn cow_name(&self, cow_id: CowId) -> Result<Option<String>, Self::Error> {
            Ok(self.names.get(&cow_id).cloned())
        }
    }

    fn directory() -> FakeDirectory {
        let mut dir = FakeDirectory::default();
        dir.names.insert(CowId::new(1), "Bessie".to_string());
        dir.managers.insert(
            CowId::new(1),
            [UserId::new(10), UserId::new(11)].into_iter().collect(),
        );
        dir
    }

    fn summary_with(total_liters: i64) -> DailySummary {
        let mut summary = DailySummary::empty(SummaryKey {
            cow_id: CowId::new(1),
            date: NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
        });
        summary
            .credit(TimeBucket::Morning, Volume::from_liters(total_liters))
            .unwrap();
        summary
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, 20, 0, 0).unwrap()
    }

    #[test]
    fn normal_production_raises_nothing() {
        let alert = Alert::for_summary(
            &directory(),
            &summary_with(18),
            &ProductionRange::default(),
            now(),
        )
        .unwrap();
        assert!(alert.is_none());
    }

    #[test]
    fn high_production_fans_out_to_every_manager() {
        let alert = Alert::for_summary(
            &directory(),
            &summary_with(30),
            &ProductionRange::default(),
            now(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(alert.kind, AlertKind::HighProduction);
        assert_eq!(
            alert.message,
            "High milk production: cow #1 (Bessie) produced 30 L on 2025-03-04, above the 25 L standard"
        );
        let notifications: Vec<_> = alert.notifications().collect();
        assert_eq!(notifications.len(), 2);
        assert!(notifications.iter().all(|n| n.kind == AlertKind::HighProduction));
        assert_eq!(notifications[0].user_id, UserId::new(10));
        assert_eq!(notifications[1].user_id, UserId::new(11));
    }

    #[test]
    fn low_production_for_unknown_cow_has_no_recipients() {
        let mut summary = summary_with(5);
        summary.cow_id = CowId::new(99);
        let alert = Alert::for_summary(&directory(), &summary, &ProductionRange::default(), now())
            .unwrap()
            .unwrap();
        assert_eq!(alert.kind, AlertKind::LowProduction);
        assert!(alert.message.starts_with("Low milk production: cow #99 produced 5 L"));
        assert_eq!(alert.notifications().count(), 0);
    }

    fn expired_batch() -> Batch {
        Batch {
            id: BatchId::new(4),
            batch_number: "BATCH-20250304080000-0f3a9c21".to_string(),
            total_volume: Volume::from_milliliters(10_500),
            status: BatchStatus::Fresh,
            production_time: Utc.with_ymd_and_hms(2025, 3, 4, 8, 0, 0).unwrap(),
            expiry_time: Utc.with_ymd_and_hms(2025, 3, 4, 16, 0, 0).unwrap(),
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn expiry_alert_names_the_batch() {
        let alerts =
            Alert::for_expired_batch(&directory(), &expired_batch(), &[CowId::new(1)], now())
                .unwrap();
        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.batch_id, Some(BatchId::new(4)));
        assert_eq!(
            alert.message,
            "Milk batch BATCH-20250304080000-0f3a9c21 from cow #1 (Bessie) expired at 2025-03-04 16:00 UTC (10.5 L, produced 2025-03-04 08:00 UTC)"
        );
        assert_eq!(alert.notifications().count(), 2);
        assert!(alert.notifications().all(|n| n.batch_id == Some(BatchId::new(4))));
    }

    #[test]
    fn expiry_reaches_each_manager_once_per_batch() {
        let mut dir = directory();
        dir.names.insert(CowId::new(2), "Daisy".to_string());
        dir.managers
            .insert(CowId::new(2), [UserId::new(10)].into_iter().collect::<BTreeSet<_>>());
        let cows = [CowId::new(1), CowId::new(2), CowId::new(3)];

        let alerts = Alert::for_expired_batch(&dir, &expired_batch(), &cows, now()).unwrap();

        let mut recipients: Vec<UserId> = alerts
            .iter()
            .flat_map(|a| a.notifications().map(|n| n.user_id))
            .collect();
        recipients.sort_unstable();
        assert_eq!(recipients, vec![UserId::new(10), UserId::new(11)]);

        // Ordered by the cows each alert names.
        assert_eq!(alerts.len(), 3);
        assert!(alerts[0].message.contains("from cow #1 (Bessie) expired"));
        assert_eq!(alerts[0].recipients, [UserId::new(11)].into_iter().collect::<BTreeSet<_>>());
        assert!(alerts[1].message.contains("from cow #1 (Bessie), cow #2 (Daisy) expired"));
        assert_eq!(alerts[1].recipients, [UserId::new(10)].into_iter().collect::<BTreeSet<_>>());
        assert_eq!(alerts[2].cow_id, CowId::new(3));
        assert!(alerts[2].message.contains("from cow #3 expired"));
        assert!(alerts[2].recipients.is_empty());
    }

    #[test]
    fn alert_kind_roundtrip() {
        for kind in [
            AlertKind::LowProduction,
            AlertKind::HighProduction,
            AlertKind::MilkExpiry,
        ] {
            assert_eq!(kind.as_str().parse::<AlertKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
