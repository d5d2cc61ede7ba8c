//! Evaluate command: checks one day's production against the configured range.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDate;
use mt_db::Database;

use super::util::{write_alerts, write_json};

pub fn run<W: Write>(writer: &mut W, db: &mut Database, date: NaiveDate, json: bool) -> Result<()> {
    let alerts = db.evaluate_production(date)?;
    if json {
        return write_json(writer, &alerts);
    }

    let range = db.policy().production_range;
    writeln!(
        writer,
        "Production on {date} (range {} L to {} L): {} alert(s)",
        range.low,
        range.high,
        alerts.len()
    )?;
    write_alerts(writer, &alerts)
}

#[cfg(test)]
mod tests {
    use super::*;

    use mt_core::{AlertKind, NewMilking};

    use insta::assert_snapshot;

    fn setup() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        let bessie = db.add_cow("Bessie").unwrap();
        let daisy = db.add_cow("Daisy").unwrap();
        let clover = db.add_cow("Clover").unwrap();
        let ana = db.add_user("Ana").unwrap();
        let ben = db.add_user("Ben").unwrap();
        db.assign_manager(bessie, ana).unwrap();
        db.assign_manager(bessie, ben).unwrap();
        db.assign_manager(daisy, ben).unwrap();
        for (cow, liters, at) in [
            (bessie, "12.5", "2025-03-04T08:00:00+00:00"),
            (daisy, "26", "2025-03-04T08:00:00+00:00"),
            (clover, "20", "2025-03-04T08:00:00+00:00"),
        ] {
            db.record(&NewMilking::parse(cow, ana, liters, at).unwrap())
                .unwrap();
        }
        db
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()
    }

    #[test]
    fn evaluate_reports_out_of_range_cows() {
        let mut db = setup();
        let mut output = Vec::new();
        run(&mut output, &mut db, date(), false).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Production on 2025-03-04 (range 15 L to 25 L): 2 alert(s)
        - [low_production] Low milk production: cow #1 (Bessie) produced 12.5 L on 2025-03-04, below the 15 L standard -> users 1, 2
        - [high_production] High milk production: cow #2 (Daisy) produced 26 L on 2025-03-04, above the 25 L standard -> users 2
        ");
    }

    #[test]
    fn evaluate_as_json() {
        let mut db = setup();
        let mut output = Vec::new();
        run(&mut output, &mut db, date(), true).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        let alerts = value.as_array().unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0]["kind"], AlertKind::LowProduction.as_str());
        assert_eq!(alerts[1]["recipients"], serde_json::json!([2]));
    }

    #[test]
    fn evaluate_quiet_day() {
        let mut db = setup();
        let mut output = Vec::new();
        let other_day = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        run(&mut output, &mut db, other_day, false).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Production on 2025-03-05 (range 15 L to 25 L): 0 alert(s)\n"
        );
    }
}
