//! The notification sink: alerts are appended here, one row per recipient.

use mt_core::{Alert, BatchId, Notification, NotificationId, UserId};
use rusqlite::{Connection, params};

use crate::Database;
use crate::error::{DbError, Result};
use crate::helpers::{NOTIFICATION_COLUMNS, NotificationRow, format_timestamp};

/// Appends one notification per recipient of the alert.
///
/// Expiry notifications are unique per (batch, user); a repeat is ignored.
/// Returns the number of rows written.
pub(crate) fn deliver(conn: &Connection, alert: &Alert) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "
        INSERT OR IGNORE INTO notifications
            (user_id, cow_id, batch_id, kind, message, is_read, created_at)
        VALUES (?, ?, ?, ?, ?, 0, ?)
        ",
    )?;
    let mut written = 0;
    for notification in alert.notifications() {
        written += stmt.execute(params![
            notification.user_id.get(),
            notification.cow_id.get(),
            notification.batch_id.map(BatchId::get),
            notification.kind.as_str(),
            notification.message,
            format_timestamp(notification.created_at),
        ])?;
    }
    Ok(written)
}

impl Database {
    /// Lists a user's notifications, newest first.
    pub fn list_notifications(
        &self,
        user_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>> {
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0)
            ORDER BY created_at DESC, id DESC
            "
        ))?;
        let rows = stmt.query_map(
            params![user_id.get(), unread_only],
            NotificationRow::from_row,
        )?;
        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?.into_notification()?);
        }
        Ok(notifications)
    }

    /// Marks a notification read. Marking it twice is fine.
    pub fn mark_notification_read(&mut self, id: NotificationId) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?",
            params![id.get()],
        )?;
        if changed == 0 {
            return Err(DbError::not_found("notification", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{TimeZone, Utc};
    use mt_core::{AlertKind, CowId};

    use super::*;

    fn alert(kind: AlertKind, batch_id: Option<BatchId>, recipients: &[UserId]) -> Alert {
        Alert {
            kind,
            cow_id: CowId::new(1),
            batch_id,
            message: format!("{kind} for cow #1"),
            recipients: recipients.iter().copied().collect::<BTreeSet<_>>(),
            raised_at: Utc.with_ymd_and_hms(2025, 3, 4, 20, 0, 0).unwrap(),
        }
    }

    fn setup() -> (Database, UserId, UserId) {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        db.add_cow("Bessie").unwrap();
        db.add_cow("Daisy").unwrap();
        let ana = db.add_user("Ana").unwrap();
        let ben = db.add_user("Ben").unwrap();
        (db, ana, ben)
    }

    #[test]
    fn production_alerts_append() {
        let (db, ana, ben) = setup();
        let high = alert(AlertKind::HighProduction, None, &[ana, ben]);
        assert_eq!(deliver(&db.conn, &high).unwrap(), 2);
        assert_eq!(deliver(&db.conn, &high).unwrap(), 2);
        assert_eq!(db.list_notifications(ana, false).unwrap().len(), 2);
    }

    #[test]
    fn expiry_alerts_are_written_once() {
        let (db, ana, _) = setup();
        db.conn
            .execute(
                "
                INSERT INTO batches
                    (id, batch_number, total_volume_ml, status, production_time, expiry_time,
                     created_at, updated_at)
                VALUES (7, 'BATCH-1', 0, 'expired', 'x', 'x', 'x', 'x')
                ",
                [],
            )
            .unwrap();
        let expiry = alert(AlertKind::MilkExpiry, Some(BatchId::new(7)), &[ana]);
        assert_eq!(deliver(&db.conn, &expiry).unwrap(), 1);
        assert_eq!(deliver(&db.conn, &expiry).unwrap(), 0);

        let other_cow = Alert {
            cow_id: CowId::new(2),
            ..expiry.clone()
        };
        assert_eq!(deliver(&db.conn, &other_cow).unwrap(), 0);

        let stored = db.list_notifications(ana, false).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].kind, AlertKind::MilkExpiry);
        assert_eq!(stored[0].batch_id, Some(BatchId::new(7)));
        assert!(!stored[0].is_read);
    }

    #[test]
    fn mark_read_filters_unread() {
        let (mut db, ana, ben) = setup();
        deliver(&db.conn, &alert(AlertKind::LowProduction, None, &[ana, ben])).unwrap();

        let id = db.list_notifications(ana, true).unwrap()[0].id;
        db.mark_notification_read(id).unwrap();
        db.mark_notification_read(id).unwrap();

        assert!(db.list_notifications(ana, true).unwrap().is_empty());
        assert_eq!(db.list_notifications(ana, false).unwrap().len(), 1);
        assert_eq!(db.list_notifications(ben, true).unwrap().len(), 1);

        assert!(matches!(
            db.mark_notification_read(NotificationId::new(999)),
            Err(DbError::NotFound { entity: "notification", .. })
        ));
    }
}
