use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rtbuffer_core::{Event, Header};
use rtbuffer_server::WaitReply;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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

fn print_json(value: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
    let _ = std::io::stdout().flush();
}

fn print_table(header: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
}

#[derive(Serialize)]
struct ListeningOutput<'a> {
    event: &'static str,
    endpoint: &'a str,
}

/// Announce the bound endpoint. Always flushed so scripts can wait on it.
pub fn print_listening(endpoint: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ListeningOutput {
            event: "listening",
            endpoint,
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("listening on {endpoint}");
            let _ = std::io::stdout().flush();
        }
    }
}

#[derive(Serialize)]
struct HeaderOutput<'a> {
    endpoint: &'a str,
    #[serde(flatten)]
    header: &'a Header,
    chunks_len: usize,
}

pub fn print_header(header: &Header, endpoint: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&HeaderOutput {
            endpoint,
            header,
            chunks_len: header.chunks.len(),
        }),
        OutputFormat::Table => print_table(
            &[
                "DATATYPE", "CHANNELS", "RATE", "SAMPLES", "EVENTS", "GENERATION",
            ],
            vec![vec![
                header.datatype.to_string(),
                header.channel_count.to_string(),
                header.sample_rate.to_string(),
                header.sample_count.to_string(),
                header.event_count.to_string(),
                header.generation.to_string(),
            ]],
        ),
        OutputFormat::Pretty => println!(
            "datatype={} channels={} rate={} samples={} events={} generation={}",
            header.datatype,
            header.channel_count,
            header.sample_rate,
            header.sample_count,
            header.event_count,
            header.generation
        ),
    }
}

#[derive(Serialize)]
struct WaitOutput {
    outcome: &'static str,
    samples: u64,
    events: u64,
    elapsed_ms: f64,
}

pub fn print_wait(reply: &WaitReply, elapsed_ms: f64, format: OutputFormat) {
    let out = WaitOutput {
        outcome: reply.outcome.name(),
        samples: reply.samples,
        events: reply.events,
        elapsed_ms: (elapsed_ms * 100.0).round() / 100.0,
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            &["OUTCOME", "SAMPLES", "EVENTS", "ELAPSED MS"],
            vec![vec![
                out.outcome.to_string(),
                out.samples.to_string(),
                out.events.to_string(),
                out.elapsed_ms.to_string(),
            ]],
        ),
        OutputFormat::Pretty => println!(
            "outcome={} samples={} events={} elapsed_ms={}",
            out.outcome, out.samples, out.events, out.elapsed_ms
        ),
    }
}

#[derive(Serialize)]
struct EventOutput {
    index: u64,
    sample: u64,
    offset: i32,
    duration: i32,
    #[serde(rename = "type")]
    event_type: String,
    value: String,
    payload_size: usize,
}

fn event_output(index: u64, event: &Event) -> EventOutput {
    EventOutput {
        index,
        sample: event.sample,
        offset: event.offset,
        duration: event.duration,
        event_type: event.event_type.to_string(),
        value: event.event_value.to_string(),
        payload_size: event.payload.len(),
    }
}

pub fn print_events(first: u64, events: &[Event], format: OutputFormat) {
    let rows: Vec<EventOutput> = events
        .iter()
        .zip(first..)
        .map(|(event, index)| event_output(index, event))
        .collect();
    match format {
        OutputFormat::Json => {
            for row in &rows {
                print_json(row);
            }
        }
        OutputFormat::Table => print_table(
            &["#", "SAMPLE", "OFFSET", "DURATION", "TYPE", "VALUE"],
            rows.into_iter()
                .map(|row| {
                    vec![
                        row.index.to_string(),
                        row.sample.to_string(),
                        row.offset.to_string(),
                        row.duration.to_string(),
                        row.event_type,
                        row.value,
                    ]
                })
                .collect(),
        ),
        OutputFormat::Pretty => {
            for row in rows {
                println!(
                    "#{} sample={} offset={} duration={} type={} value={}",
                    row.index, row.sample, row.offset, row.duration, row.event_type, row.value
                );
            }
        }
    }
}
