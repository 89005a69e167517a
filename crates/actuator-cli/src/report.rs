//! Text output for the command line.

use actuator_common::address::SlaveAddress;
use actuator_fieldbus::PollReport;
use actuator_protocol::product::Product;
use actuator_protocol::status::{ActuatorState, ActuatorStatus};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Column header matching [`status_line`].
pub const STATUS_HEADER: &str = " tick  slave  state     position  torque  flags";

/// One row of status output.
pub fn status_line(tick: u64, slave: SlaveAddress, status: &ActuatorStatus) -> String {
    let mut flags = status.alarms.active();
    if status.setup_mode {
        flags.push("setup");
    }
    format!(
        "{tick:>5}  {slave:>5}  {state:<8}  {position:>7.1}%  {torque:>5.1}%  {flags}",
        slave = slave.get(),
        state = status.state().to_string(),
        position = status.position,
        torque = status.torque,
        flags = flags.join(","),
    )
}

/// Catalog listing.
pub fn product_table() -> String {
    let mut out = String::from("  id  model     type    name\n");
    for product in Product::catalog() {
        let _ = writeln!(
            out,
            "{:>4}  {:<8}  {:<6}  {}",
            product.id,
            product.model,
            product.kind.to_string(),
            product.name
        );
    }
    out
}

/// Per-slave poll outcome counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlaveTally {
    /// Successful polls.
    pub ok: u64,
    /// Failed polls.
    pub failed: u64,
    /// Most recent decoded state.
    pub last_state: Option<ActuatorState>,
    /// Most recent failure message.
    pub last_error: Option<String>,
}

/// Running summary of poller output.
#[derive(Debug, Default)]
pub struct PollSummary {
    slaves: BTreeMap<SlaveAddress, SlaveTally>,
}

impl PollSummary {
    /// Fold in one report.
    pub fn record(&mut self, report: &PollReport) {
        let tally = self.slaves.entry(report.slave).or_default();
        match &report.result {
            Ok(status) => {
                tally.ok += 1;
                tally.last_state = Some(status.state());
            }
            Err(e) => {
                tally.failed += 1;
                tally.last_error = Some(e.to_string());
            }
        }
    }

    /// Tally for one slave.
    pub fn tally(&self, slave: SlaveAddress) -> Option<&SlaveTally> {
        self.slaves.get(&slave)
    }

    /// Render as a table.
    pub fn render(&self) -> String {
        let mut out = String::from("slave     ok  failed  last\n");
        for (slave, tally) in &self.slaves {
            let last = match (&tally.last_error, tally.last_state) {
                (Some(error), _) if tally.ok == 0 => error.clone(),
                (_, Some(state)) => state.to_string(),
                (Some(error), None) => error.clone(),
                (None, None) => String::from("-"),
            };
            let _ = writeln!(
                out,
                "{:>5}  {:>5}  {:>6}  {last}",
                slave.get(),
                tally.ok,
                tally.failed
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actuator_common::error::ActuatorError;

    fn addr(n: u8) -> SlaveAddress {
        SlaveAddress::new(n).unwrap()
    }

    #[test]
    fn test_status_line_columns() {
        let status = ActuatorStatus {
            position: 42.5,
            torque: 48.0,
            moving: true,
            setup_mode: true,
            ..ActuatorStatus::default()
        };
        let line = status_line(7, addr(3), &status);
        assert!(line.contains("CLOSING"));
        assert!(line.contains("42.5%"));
        assert!(line.contains("48.0%"));
        assert!(line.ends_with("setup"));
    }

    #[test]
    fn test_product_table_lists_catalog() {
        let table = product_table();
        assert_eq!(table.lines().count(), Product::catalog().len() + 1);
        assert!(table.contains("LT-200"));
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = PollSummary::default();
        summary.record(&PollReport {
            slave: addr(1),
            round: 0,
            result: Ok(ActuatorStatus {
                close_limit: true,
                ..ActuatorStatus::default()
            }),
        });
        summary.record(&PollReport {
            slave: addr(2),
            round: 0,
            result: Err(ActuatorError::NotFound { slave: 2 }),
        });

        let first = summary.tally(addr(1)).unwrap();
        assert_eq!(first.ok, 1);
        assert_eq!(first.last_state, Some(ActuatorState::Closed));
        assert_eq!(summary.tally(addr(2)).unwrap().failed, 1);

        let table = summary.render();
        assert!(table.contains("CLOSED"));
        assert!(table.contains("device not found"));
    }
}
