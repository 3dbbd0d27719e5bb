//! Terminal cards for analysis results and the history feed.

use adlaw_core::{
    CanonicalDetection, FrameSize, HistoryEntry, primary_index, project,
};
use chrono::{DateTime, Utc};

use crate::analyze::FileAnalysis;

// ── Analysis cards ──

/// Print one analysed image as a vertical card.
pub fn print_analysis(file: &FileAnalysis) {
    println!("=== {} ===", file.filename);
    if let Some(secs) = file.processing_time {
        println!("processed in {secs:.2}s");
    }
    if let Some(id) = &file.record_id {
        println!("saved as record {id}");
    }
    println!();

    if file.detections.is_empty() {
        println!("  No panel defects detected.");
        println!();
        return;
    }

    for (i, det) in file.detections.iter().enumerate() {
        let marker = if file.primary == Some(i) { "*" } else { " " };
        let b = project(det.bbox, FrameSize::MODEL);
        println!(
            "{} {:<22} {:>5.1}%  left {:.2}% top {:.2}% size {:.2}% x {:.2}%",
            marker,
            det.display_class,
            det.confidence * 100.0,
            b.left,
            b.top,
            b.width,
            b.height,
        );
    }
    println!();

    if let Some(primary) = file.primary.and_then(|i| file.detections.get(i)) {
        print_primary_detail(primary);
    }
}

fn print_primary_detail(det: &CanonicalDetection) {
    println!("Primary defect: {}", det.display_class);
    print_field("priority", det.priority.as_deref());
    print_field("power loss", det.power_loss.as_deref());
    print_field("category", det.category.as_deref());
    print_field("description", det.description.as_deref());
    print_list("stress factors", det.stress_factors.as_deref());
    print_list("recommendations", det.recommendations.as_deref());
    println!();
}

fn print_field(name: &str, value: Option<&str>) {
    println!("  {:<26} {}", name, value.unwrap_or("not specified"));
}

fn print_list(name: &str, values: Option<&[String]>) {
    match values {
        Some(items) if !items.is_empty() => {
            println!("  {name}");
            for item in items {
                println!("    - {item}");
            }
        }
        _ => println!("  {:<26} not specified", name),
    }
}

// ── History feed ──

pub fn print_history(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("No inspection history yet.");
        return;
    }

    println!("{} entries, newest first", entries.len());
    println!();
    for entry in entries {
        match entry {
            HistoryEntry::Defect(d) => {
                println!("=== {} ===", format_ts(d.timestamp));
                println!("  {:<14} defect record", "type");
                println!("  {:<14} {}", "defect", d.defect_type);
                println!(
                    "  {:<14} {}",
                    "severity",
                    d.severity.as_deref().unwrap_or("not specified")
                );
                println!("  {:<14} {}", "image", d.image_ref);
            }
            HistoryEntry::Analysis(a) => {
                println!("=== {} ===", format_ts(a.timestamp));
                println!("  {:<14} analysis", "type");
                println!("  {:<14} {}", "status", a.status);
                println!("  {:<14} {}", "defects found", a.detections.len());
                if let Some(idx) = primary_index(&a.detections) {
                    println!("  {:<14} {}", "primary", a.detections[idx].display_class);
                }
                println!("  {:<14} {}", "image", a.image_ref);
            }
        }
        println!();
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
