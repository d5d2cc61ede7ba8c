//! Notification inbox commands.

use std::io::Write;

use anyhow::Result;
use mt_core::{NotificationId, UserId};
use mt_db::Database;

use super::util::write_json;

pub fn list<W: Write>(
    writer: &mut W,
    db: &Database,
    user_id: UserId,
    unread_only: bool,
    json: bool,
) -> Result<()> {
    let notifications = db.list_notifications(user_id, unread_only)?;
    if json {
        return write_json(writer, &notifications);
    }

    if notifications.is_empty() {
        let which = if unread_only { "unread " } else { "" };
        writeln!(writer, "No {which}notifications for user {user_id}.")?;
        return Ok(());
    }
    for notification in &notifications {
        let marker = if notification.is_read { ' ' } else { '*' };
        writeln!(
            writer,
            "{marker} #{:<4} {}  [{}] {}",
            notification.id.get(),
            notification.created_at.format("%Y-%m-%d %H:%M UTC"),
            notification.kind,
            notification.message
        )?;
    }
    Ok(())
}

pub fn mark_read<W: Write>(writer: &mut W, db: &mut Database, id: NotificationId) -> Result<()> {
    db.mark_notification_read(id)?;
    writeln!(writer, "Marked notification {id} read")?;
    Ok(())
}
