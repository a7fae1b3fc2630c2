use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use pulselink_proto::{LimitFrame, StatusFrame, StrengthFrame};

#[derive(Clone, Debug, Copy, ValueEnum)]
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

/// Any decoded device frame, tagged for display.
#[derive(Debug, Serialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum DecodedFrame {
    Strength(StrengthFrame),
    Limit(LimitFrame),
    Status(StatusFrame),
}

pub fn print_decoded(frame: &DecodedFrame, hex: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct Output<'a> {
                hex: &'a str,
                #[serde(flatten)]
                frame: &'a DecodedFrame,
            }
            let out = Output { hex, frame };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in frame_fields(frame) {
                table.add_row(vec![field, value]);
            }
            table.add_row(vec!["hex".to_string(), hex.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let fields: Vec<String> = frame_fields(frame)
                .into_iter()
                .map(|(field, value)| format!("{field}={value}"))
                .collect();
            println!("{}", fields.join(" "));
        }
        OutputFormat::Raw => {
            println!("{hex}");
        }
    }
}

fn frame_fields(frame: &DecodedFrame) -> Vec<(String, String)> {
    match frame {
        DecodedFrame::Strength(frame) => vec![
            ("frame".into(), "strength".into()),
            ("sequence_no".into(), frame.sequence_no.to_string()),
            ("method_a".into(), format!("{:?}", frame.method_a)),
            ("method_b".into(), format!("{:?}", frame.method_b)),
            ("strength_a".into(), frame.strength_a.to_string()),
            ("strength_b".into(), frame.strength_b.to_string()),
            ("pulse_freq_a".into(), format!("{:?}", frame.pulse_a.frequency)),
            ("pulse_str_a".into(), format!("{:?}", frame.pulse_a.strength)),
            ("pulse_freq_b".into(), format!("{:?}", frame.pulse_b.frequency)),
            ("pulse_str_b".into(), format!("{:?}", frame.pulse_b.strength)),
        ],
        DecodedFrame::Limit(frame) => vec![
            ("frame".into(), "limit".into()),
            ("limit_a".into(), frame.limit_a.to_string()),
            ("limit_b".into(), frame.limit_b.to_string()),
            ("freq_balance_a".into(), frame.freq_balance_a.to_string()),
            ("freq_balance_b".into(), frame.freq_balance_b.to_string()),
            (
                "strength_balance_a".into(),
                frame.strength_balance_a.to_string(),
            ),
            (
                "strength_balance_b".into(),
                frame.strength_balance_b.to_string(),
            ),
        ],
        DecodedFrame::Status(frame) => vec![
            ("frame".into(), "status".into()),
            ("sequence_no".into(), frame.sequence_no.to_string()),
            ("strength_a".into(), frame.strength_a.to_string()),
            ("strength_b".into(), frame.strength_b.to_string()),
        ],
    }
}

pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|byte| format!("{byte:02X}")).collect()
}

pub fn from_hex(input: &str) -> Option<Vec<u8>> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.len() % 2 != 0 {
        return None;
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&cleaned[i..i + 2], 16).ok())
        .collect()
}
