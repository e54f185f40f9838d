use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::session::SessionDisplayState;

#[derive(Clone, Copy, Debug)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    /// Terminal panel for one proctoring session.
    pub fn session_panel(&self) -> SessionPanel {
        let use_pretty = self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            };

        if use_pretty {
            let bar = ProgressBar::new(100);
            bar.set_draw_target(ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template("{bar:30} {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            SessionPanel {
                bar: Some(bar),
                last_line: None,
            }
        } else {
            SessionPanel {
                bar: None,
                last_line: None,
            }
        }
    }
}

pub struct SessionPanel {
    bar: Option<ProgressBar>,
    last_line: Option<String>,
}

impl SessionPanel {
    pub fn render(&mut self, display: &SessionDisplayState) {
        let line = format!(
            "{} left | camera {} | {} alert{} | {} focus switch{}",
            display.remaining,
            display.camera.label(),
            display.violation_count,
            if display.violation_count == 1 { "" } else { "s" },
            display.focus_switches,
            if display.focus_switches == 1 { "" } else { "es" },
        );

        if let Some(bar) = &self.bar {
            bar.set_position(u64::from(display.progress_percent));
            bar.set_message(line);
        } else if self.last_line.as_deref() != Some(&line) {
            eprintln!("==> {}", line);
            self.last_line = Some(line);
        }
    }

    pub fn finish(self, display: &SessionDisplayState) {
        let message = format!(
            "session over: {} alert(s), camera {}",
            display.violation_count,
            display.camera.label()
        );
        if let Some(bar) = self.bar {
            bar.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}
