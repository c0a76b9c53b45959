// SPDX-License-Identifier: GPL-3.0-only

//! Terminal viewfinder
//!
//! Drives the pipeline controller at the tick rate and renders each
//! display buffer to the terminal using Unicode half-block characters for
//! improved vertical resolution.

use crate::backends::camera::{CaptureSource, DisplayFrame, V4l2Source};
use crate::config::Config;
use crate::constants::{timing, zoom};
use crate::pipelines::video::GstRecorderBackend;
use crate::pipelines::viewfinder::ZoomLevel;
use crate::pipelines::{CaptureStatus, Controls, PipelineController, PipelineEvent};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, stdout};
use std::time::Instant;
use tracing::{error, info};

/// Run the terminal viewfinder
pub fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let source = V4l2Source::open(
        config.camera_index,
        config.capture_width,
        config.capture_height,
    )?;
    info!(resolution = ?source.native_resolution(), "Camera opened");

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = run_app(&mut terminal, source, &config);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    source: V4l2Source,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let recorder = GstRecorderBackend::new(config.bitrate_preset);
    let mut controller = PipelineController::new(source, recorder, config);
    let mut controls = Controls::from_config(config);

    let mut frame_widget = FrameWidget::default();
    let mut last_event: Option<String> = None;

    loop {
        let tick_started = Instant::now();
        let output = controller.tick(&controls);
        controls.action_triggered = false;

        if let Some(display) = output.display {
            frame_widget.frame = Some(display);
        }
        if let Some(event) = output.events.last() {
            last_event = Some(describe_event(event));
        }

        let status_message = build_status_message(
            &controls,
            controller.is_recording(),
            output.status,
            last_event.as_deref(),
        );

        terminal.draw(|f| {
            let area = f.area();

            // Reserve bottom line for status
            let camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };

            f.render_widget(&frame_widget, camera_area);

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };

            let status = StatusBar {
                message: &status_message,
                recording: controller.is_recording(),
            };
            f.render_widget(status, status_area);
        })?;

        // Wait out the rest of the tick, handling keys as they arrive
        let mut quit = false;
        while let Some(remaining) = timing::TICK_INTERVAL.checked_sub(tick_started.elapsed()) {
            if !event::poll(remaining)? {
                break;
            }
            if let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
                {
                    quit = true;
                    break;
                }
                match key.code {
                    KeyCode::Char('q') => {
                        quit = true;
                        break;
                    }
                    KeyCode::Char(' ') => controls.action_triggered = true,
                    KeyCode::Char('m') => controls.video_mode = !controls.video_mode,
                    KeyCode::Char('s') => {
                        controls.stabilization_enabled = !controls.stabilization_enabled
                    }
                    KeyCode::Char('+') | KeyCode::Char('=') => {
                        controls.zoom = ZoomLevel::new(controls.zoom).step(zoom::STEP).value()
                    }
                    KeyCode::Char('-') => {
                        controls.zoom = ZoomLevel::new(controls.zoom).step(-zoom::STEP).value()
                    }
                    _ => {}
                }
            }
        }
        if quit {
            break;
        }
    }

    // Never leave a recording without its index
    match controller.stop_recording() {
        Ok(Some(path)) => info!(path = %path.display(), "Recording saved on exit"),
        Ok(None) => {}
        Err(e) => error!(error = %e, "Failed to finalize recording on exit"),
    }

    Ok(())
}

fn describe_event(event: &PipelineEvent) -> String {
    match event {
        PipelineEvent::PhotoSaved(path) => format!("Saved: {}", path.display()),
        PipelineEvent::PhotoSkipped => "No frame for photo".to_string(),
        PipelineEvent::RecordingStarted(path) => format!("Recording: {}", path.display()),
        PipelineEvent::RecordingStopped(path) => format!("Saved: {}", path.display()),
        PipelineEvent::ActionFailed(reason) => format!("Error: {}", reason),
        PipelineEvent::FrameDropped(e) => format!("Dropped frame: {}", e),
    }
}

fn build_status_message(
    controls: &Controls,
    recording: bool,
    status: CaptureStatus,
    last_event: Option<&str>,
) -> String {
    let mode = match (controls.video_mode, recording) {
        (false, _) => "PHOTO",
        (true, false) => "VIDEO",
        (true, true) => "REC",
    };
    let mut msg = format!(
        "{} | zoom {:.1}x | stab {}",
        mode,
        ZoomLevel::new(controls.zoom).value(),
        if controls.stabilization_enabled { "on" } else { "off" }
    );
    if status.is_persistent() {
        msg.push_str(" | camera unavailable");
    }
    if let Some(event) = last_event {
        msg.push_str(" | ");
        msg.push_str(event);
    }
    msg.push_str(" | space action | m mode | s stab | +/- zoom | q quit");
    msg
}

/// Widget that renders a display buffer using half-block characters
#[derive(Default)]
struct FrameWidget {
    frame: Option<DisplayFrame>,
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame.as_ref().filter(|f| f.width > 0 && f.height > 0) else {
            // No frame yet - show placeholder
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };

        // Each terminal cell displays 2 vertical pixels using half-block characters
        let frame_aspect = frame.width as f64 / frame.height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            // Terminal is wider - fit to height
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            // Terminal is taller - fit to width
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = frame.width as f64 / display_width as f64;
        let y_scale = frame.height as f64 / (display_height * 2) as f64;

        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let top_color = sample_pixel(frame, src_x, src_y_top);
                let bottom_color = sample_pixel(frame, src_x, src_y_bottom);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top_color);
                    cell.set_bg(bottom_color);
                }
            }
        }
    }
}

fn sample_pixel(frame: &DisplayFrame, x: u32, y: u32) -> Color {
    let x = x.min(frame.width - 1);
    let y = y.min(frame.height - 1);
    let [r, g, b] = frame.pixel(x, y).unwrap_or([0, 0, 0]);
    Color::Rgb(r, g, b)
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
    recording: bool,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bg = if self.recording {
            Color::Red
        } else {
            Color::DarkGray
        };

        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(bg);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default().fg(Color::White).bg(bg),
        );
    }
}
