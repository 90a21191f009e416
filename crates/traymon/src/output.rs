use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use traymon_frame::{to_line, Snapshot};
use traymon_pipeline::RankedCandidate;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_snapshot(snapshot: &Snapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(snapshot),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TIME", "CPU LOAD", "CPU TEMP", "VOLUME"])
                .add_row(vec![
                    snapshot.time.clone(),
                    format!("{}%", snapshot.cpu_load),
                    temperature_label(snapshot),
                    format!("{}%", snapshot.volume),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", pretty_line(snapshot)),
        OutputFormat::Raw => match to_line(snapshot) {
            Ok(line) => print_raw(line.as_bytes()),
            Err(err) => tracing::warn!(error = %err, "failed to encode record"),
        },
    }
}

pub fn print_ports(ports: &[RankedCandidate], format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => print_json(&ports),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PATH", "USB ID", "DESCRIPTION", "MATCH"]);
            for port in ports {
                table.add_row(port_row(port));
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for port in ports {
                println!("{}", port_row(port).join("  "));
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn pretty_line(snapshot: &Snapshot) -> String {
    format!(
        "{} cpu={}% temp={} volume={}%",
        snapshot.time,
        snapshot.cpu_load,
        temperature_label(snapshot),
        snapshot.volume
    )
}

fn temperature_label(snapshot: &Snapshot) -> String {
    if snapshot.has_temperature() {
        format!("{}°C", snapshot.cpu_temp)
    } else {
        "n/a".to_string()
    }
}

fn port_row(port: &RankedCandidate) -> Vec<String> {
    vec![
        port.candidate.path.clone(),
        port.candidate
            .usb
            .map(|usb| usb.to_string())
            .unwrap_or_else(|| "-".to_string()),
        port.candidate
            .description
            .clone()
            .unwrap_or_else(|| "-".to_string()),
        port.rank
            .map(|rank| format!("{rank} ({})", rank.score()))
            .unwrap_or_else(|| "ignored".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use traymon_pipeline::{DeviceCandidate, MatchRank, UsbId};

    use super::*;

    #[test]
    fn pretty_line_marks_missing_temperature() {
        let snapshot = Snapshot::new("14:05", 37, 60, 0);
        assert_eq!(pretty_line(&snapshot), "14:05 cpu=37% temp=n/a volume=60%");
    }

    #[test]
    fn port_row_shows_identity_and_rank() {
        let port = RankedCandidate {
            candidate: DeviceCandidate::new("COM3").with_usb(UsbId::new(0x303A, 0x1001)),
            rank: Some(MatchRank::Identity),
        };
        assert_eq!(
            port_row(&port),
            vec!["COM3", "303A:1001", "-", "identity (3)"]
        );
    }
}
