use std::io::IsTerminal;
use std::path::Path;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use lc3serial_image::ObjectImage;
use lc3serial_redirect::{SessionReport, TaskExit};
use serde::Serialize;

/// Words per hex dump line.
const DUMP_WIDTH: usize = 8;

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

#[derive(Serialize)]
struct ImageOutput<'a> {
    path: String,
    format: &'a str,
    byte_order: &'a str,
    word_count: u16,
    destination_offset: String,
    end_address: String,
    byte_len: usize,
}

impl<'a> ImageOutput<'a> {
    fn new(path: &Path, format: &'a str, image: &'a ObjectImage) -> Self {
        // An empty payload reports its origin as the end address.
        let last = u32::from(image.destination_offset()) + u32::from(image.word_count().max(1));
        Self {
            path: path.display().to_string(),
            format,
            byte_order: image.source_order().as_str(),
            word_count: image.word_count(),
            destination_offset: format!("x{:04X}", image.destination_offset()),
            end_address: format!("x{:04X}", last.saturating_sub(1)),
            byte_len: image.byte_len(),
        }
    }
}

pub fn print_image(path: &Path, format_name: &str, image: &ObjectImage, format: OutputFormat) {
    let out = ImageOutput::new(path, format_name, image);
    match format {
        OutputFormat::Json => {
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
                .set_header(vec!["FIELD", "VALUE"])
                .add_row(vec!["path".to_string(), out.path.clone()])
                .add_row(vec!["format".to_string(), out.format.to_string()])
                .add_row(vec!["byte order".to_string(), out.byte_order.to_string()])
                .add_row(vec!["words".to_string(), out.word_count.to_string()])
                .add_row(vec!["origin".to_string(), out.destination_offset.clone()])
                .add_row(vec!["end".to_string(), out.end_address.clone()])
                .add_row(vec!["bytes".to_string(), out.byte_len.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} ({}, {}-endian): {} words at {}..{}, {} bytes",
                out.path,
                out.format,
                out.byte_order,
                out.word_count,
                out.destination_offset,
                out.end_address,
                out.byte_len
            );
        }
    }
}

pub fn print_report(report: &SessionReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["RECORDS", "SENT", "RECEIVED", "WRITER", "READER"])
                .add_row(vec![
                    report.records_sent.to_string(),
                    report.bytes_sent.to_string(),
                    report.bytes_received.to_string(),
                    exit_label(&report.writer_exit),
                    exit_label(&report.reader_exit),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "records={} sent={} received={} writer={} reader={}",
                report.records_sent,
                report.bytes_sent,
                report.bytes_received,
                exit_label(&report.writer_exit),
                exit_label(&report.reader_exit)
            );
        }
    }
}

fn exit_label(exit: &TaskExit) -> String {
    match exit {
        TaskExit::EndOfInput => "end-of-input".to_string(),
        TaskExit::Drained => "drained".to_string(),
        TaskExit::Cancelled => "cancelled".to_string(),
        TaskExit::Failed(reason) => format!("failed: {reason}"),
    }
}

/// Render the payload as hex dump lines, addressed from the load origin.
///
/// Runs of identical lines collapse into a single `*`. The last line is
/// always shown, zero-padded to full width.
pub fn hex_dump(image: &ObjectImage) -> Vec<String> {
    let mut lines = Vec::new();
    let mut previous: Option<[u16; DUMP_WIDTH]> = None;
    let mut collapsed = false;
    let mut address = u32::from(image.destination_offset());

    let rows: Vec<[u16; DUMP_WIDTH]> = image
        .payload()
        .chunks(DUMP_WIDTH)
        .map(|chunk| {
            let mut row = [0u16; DUMP_WIDTH];
            row[..chunk.len()].copy_from_slice(chunk);
            row
        })
        .collect();
    let last = rows.len().saturating_sub(1);

    for (index, row) in rows.iter().enumerate() {
        if previous.as_ref() == Some(row) && index != last {
            collapsed = true;
        } else {
            if collapsed {
                lines.push("*".to_string());
                collapsed = false;
            }
            lines.push(dump_line(address, row));
            previous = Some(*row);
        }
        address += DUMP_WIDTH as u32;
    }

    lines
}

fn dump_line(address: u32, row: &[u16; DUMP_WIDTH]) -> String {
    let (left, right) = row.split_at(DUMP_WIDTH / 2);
    let join = |words: &[u16]| {
        words
            .iter()
            .map(|word| format!("{word:04x}"))
            .collect::<Vec<_>>()
            .join(" ")
    };
    format!("{address:04x}:  {}  {}", join(left), join(right))
}

#[cfg(test)]
mod tests {
    use lc3serial_image::ByteOrder;

    use super::*;

    fn image(offset: u16, payload: Vec<u16>) -> ObjectImage {
        ObjectImage::from_parts(offset, payload, ByteOrder::Big).expect("image should build")
    }

    #[test]
    fn dump_pads_the_last_line() {
        let lines = hex_dump(&image(0x3000, vec![0xE002, 0xF022, 0xF025]));
        assert_eq!(
            lines,
            vec!["3000:  e002 f022 f025 0000  0000 0000 0000 0000".to_string()]
        );
    }

    #[test]
    fn dump_collapses_repeated_lines() {
        let mut payload = vec![0u16; 32];
        payload.push(0x1234);
        let lines = hex_dump(&image(0x4000, payload));
        assert_eq!(
            lines,
            vec![
                "4000:  0000 0000 0000 0000  0000 0000 0000 0000".to_string(),
                "*".to_string(),
                "4020:  1234 0000 0000 0000  0000 0000 0000 0000".to_string(),
            ]
        );
    }

    #[test]
    fn dump_always_shows_the_final_line() {
        let lines = hex_dump(&image(0x3000, vec![7u16; 24]));
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "3000:  0007 0007 0007 0007  0007 0007 0007 0007");
        assert_eq!(lines[1], "*");
        assert_eq!(lines[2], "3010:  0007 0007 0007 0007  0007 0007 0007 0007");
    }

    #[test]
    fn image_output_reports_range() {
        let image = image(0x3000, vec![1, 2, 3]);
        let out = ImageOutput::new(Path::new("prog.ser"), "ser", &image);
        assert_eq!(out.destination_offset, "x3000");
        assert_eq!(out.end_address, "x3002");
        assert_eq!(out.byte_len, 10);

        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["word_count"], 3);
        assert_eq!(json["byte_order"], "big");
    }

    #[test]
    fn empty_image_ends_at_its_origin() {
        let image = image(0x3000, Vec::new());
        let out = ImageOutput::new(Path::new("bare.obj"), "obj", &image);
        assert_eq!(out.end_address, "x3000");
        assert!(hex_dump(&image).is_empty());
    }

    #[test]
    fn exit_labels() {
        assert_eq!(exit_label(&TaskExit::Drained), "drained");
        assert_eq!(
            exit_label(&TaskExit::Failed("boom".to_string())),
            "failed: boom"
        );
    }
}
