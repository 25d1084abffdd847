use crate::audio::device::DeviceInfo;
use crate::audio::pipeline::{EndReason, SessionReport};
use crate::error::{ErrorSeverity, PlayerError};
use crate::models::{PlaybackState, StreamDescriptor};

/// Status display formatter for the CLI
pub struct StatusDisplay;

impl StatusDisplay {
    /// Summary of a finished playback session.
    pub fn display_report(report: &SessionReport) {
        println!("┌─ Session ───────────────────────────────────────────────┐");
        println!("│ Input: {}", Self::truncate(&report.url, 50));
        println!("│ Result: {}", Self::end_description(report));
        println!("│ States: {}", Self::format_transitions(&report.transitions));

        if let Some(format) = &report.output_format {
            println!("│ Output: {} Hz, {}, {}",
                format.sample_rate,
                format.channel_layout.describe(),
                format.sample_format.name()
            );
        }

        let stats = &report.stats;
        println!("│");
        println!("│ Packets: {} read, {} decoded, {} other streams",
            stats.packets_read, stats.packets_decoded, stats.packets_skipped);
        if stats.empty_decodes > 0 {
            println!("│   {} decodes produced no samples", stats.empty_decodes);
        }
        if stats.decode_errors_skipped > 0 {
            println!("│   {} corrupt packets skipped", stats.decode_errors_skipped);
        }
        println!("│ Frames filtered: {}", stats.frames_filtered);
        println!("│ Writes: {} ({})", stats.writes, Self::format_bytes(stats.bytes_written));
        if stats.short_writes > 0 {
            println!("│   {} short writes", stats.short_writes);
        }
        if report.underruns > 0 {
            println!("│ Device underruns: {}", report.underruns);
        }
        println!("└─────────────────────────────────────────────────────────┘");
    }

    /// Stream table of a probed input, marking the stream playback would use.
    pub fn display_streams(url: &str, streams: &[StreamDescriptor], selected: Option<usize>) {
        println!("┌─ Streams ───────────────────────────────────────────────┐");
        println!("│ Input: {}", Self::truncate(url, 50));
        if streams.is_empty() {
            println!("│ No streams found");
        }
        for stream in streams {
            let marker = if selected == Some(stream.stream_index) { "▶" } else { " " };
            println!("│ {} {}", marker, Self::truncate(&stream.summary(), 54));
        }
        println!("│");
        match selected {
            Some(index) => println!("│ Selected audio stream: #{}", index),
            None => println!("│ No playable audio stream"),
        }
        println!("└─────────────────────────────────────────────────────────┘");
    }

    pub fn display_devices(host: &str, devices: &[DeviceInfo]) {
        println!("┌─ Output Devices ({}) ───────────────────────────────────┐", host);
        if devices.is_empty() {
            println!("│ No output devices found");
        }
        for device in devices {
            let marker = if device.is_default { "*" } else { " " };
            println!("│ {} {}", marker, Self::truncate(&device.name, 52));

            let mut details = Vec::new();
            if let Some(rate) = device.default_sample_rate {
                details.push(format!("{} Hz", rate));
            }
            if let Some(format) = &device.default_sample_format {
                details.push(format.clone());
            }
            if device.max_channels > 0 {
                details.push(format!("up to {} channels", device.max_channels));
            }
            if !details.is_empty() {
                println!("│     {}", details.join(", "));
            }
        }
        println!("└─────────────────────────────────────────────────────────┘");
    }

    /// Display error with user message and suggestions
    pub fn display_error(error: &PlayerError) {
        let severity = error.severity();
        let severity_icon = match severity {
            ErrorSeverity::Info => "ℹ",
            ErrorSeverity::Warning => "⚠",
            ErrorSeverity::Error => "✗",
            ErrorSeverity::Critical => "🔥",
        };

        eprintln!("┌─ {} {} ─────────────────────────────────────────────────┐",
            severity_icon, severity.as_str());

        for line in Self::wrap_text(&error.user_message(), 55) {
            eprintln!("│ {}", line);
        }

        let suggestions = error.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!("│");
            eprintln!("│ Suggestions:");
            for suggestion in suggestions.iter().take(3) {
                for line in Self::wrap_text(&format!("• {}", suggestion), 53) {
                    eprintln!("│   {}", line);
                }
            }
        }
        eprintln!("└─────────────────────────────────────────────────────────┘");
    }

    pub fn end_description(report: &SessionReport) -> String {
        match &report.end {
            Ok(EndReason::Exhausted) => "played to end".to_string(),
            Ok(EndReason::Cancelled) => "stopped by user".to_string(),
            Err(err) => format!("failed: {}", err),
        }
    }

    /// `IDLE → OPENING → ...`
    pub fn format_transitions(states: &[PlaybackState]) -> String {
        states
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" → ")
    }

    pub fn format_bytes(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
        let mut size_f = size as f64;
        let mut unit_index = 0;

        while size_f >= 1024.0 && unit_index < UNITS.len() - 1 {
            size_f /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size, UNITS[unit_index])
        } else {
            format!("{:.1} {}", size_f, UNITS[unit_index])
        }
    }

    /// Truncate to `max_len` characters, ending in "..." when cut.
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len || max_len <= 3 {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len - 3).collect();
            format!("{}...", kept)
        }
    }

    fn wrap_text(text: &str, width: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current_line = String::new();

        for word in text.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.len() + word.len() + 1 <= width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(current_line);
                current_line = word.to_string();
            }
        }

        if !current_line.is_empty() {
            lines.push(current_line);
        }
        lines
    }
}
