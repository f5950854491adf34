//! The clock loop
//!
//! Once per second: compose the line (local time, optional battery
//! percentage), wipe the text band, redraw at the current drift
//! position, advance the drift, sleep. Runs until the shutdown flag is
//! observed at the top of an iteration, then drops the surface, which
//! unmaps the device.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::Local;

use crate::fb::{render, Surface, FONT_HEIGHT, MAX_TEXT_LEN};
use crate::power;
use crate::shutdown::ShutdownFlag;

/// asctime(3)-style timestamp: "Mon Aug 25 12:00:00 2026".
const TIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Substituted when the formatter fails; the loop never aborts on a
/// time error.
const TIME_ERROR_TEXT: &str = "Error getting time!";

/// Back-and-forth horizontal drift bounds, pixels. The line wanders
/// across `[MIN, MAX]` one pixel per tick so no glyph burns into the
/// panel.
const DRIFT_MIN: i32 = 6;
const DRIFT_MAX: i32 = 20;

/// Horizontal anti-burn-in wander: one pixel per tick, reflecting at
/// the bounds.
struct Drift {
    x: i32,
    dx: i32,
}

impl Drift {
    fn new() -> Self {
        // Starts one short of the lower bound; the first step moves
        // into range and every later position stays inside it.
        Drift { x: 5, dx: 1 }
    }

    fn advance(&mut self) {
        self.x += self.dx;
        if self.x > DRIFT_MAX || self.x < DRIFT_MIN {
            self.dx = -self.dx;
            self.x += 2 * self.dx;
        }
    }
}

/// Owns the surface for the whole run; dropping the `Clock` is what
/// releases the device.
pub struct Clock {
    surface: Surface,
    capacity: Option<PathBuf>,
    drift: Drift,
    /// Fixed text row: two pixels above the bottom edge.
    y: usize,
}

impl Clock {
    pub fn new(surface: Surface, capacity: Option<PathBuf>) -> Self {
        let y = surface.geometry().yres.saturating_sub(FONT_HEIGHT + 2);
        Clock {
            surface,
            capacity,
            drift: Drift::new(),
            y,
        }
    }

    /// One iteration: compose, clear, draw, advance.
    fn tick(&mut self) {
        let text = compose_line(self.capacity.as_deref());
        let x = self.drift.x as usize;
        let y = self.y;
        let geo = *self.surface.geometry();
        let frame = self.surface.frame_mut();

        render::clear_line(frame, &geo, y);
        render::draw_line(frame, &geo, x, y, &text);

        self.drift.advance();
    }

    /// Run until shutdown is requested, then tear the surface down.
    ///
    /// The flag is checked at the top of every iteration; the tick
    /// sleep returns early on signal delivery, so shutdown is observed
    /// within one tick boundary.
    pub fn run(mut self, shutdown: ShutdownFlag) {
        log::info!("clock loop running, text row {}", self.y);

        while !shutdown.is_set() {
            self.tick();
            sleep_tick();
        }

        log::info!("shutdown requested, releasing framebuffer");
        // Surface dropped here: munmap + close, exactly once.
    }
}

/// Compose the tick's text: timestamp, then `" - N%"` when a capacity
/// file is configured and readable. Capped below [`MAX_TEXT_LEN`];
/// glyphs that would not fit the scan line are dropped by the renderer.
fn compose_line(capacity: Option<&std::path::Path>) -> String {
    let mut text = timestamp();

    if let Some(path) = capacity {
        if let Some(pct) = power::read_capacity(path) {
            let _ = write!(text, " - {pct}%");
        }
    }

    text.truncate(MAX_TEXT_LEN - 1);
    text
}

fn timestamp() -> String {
    let mut text = String::with_capacity(MAX_TEXT_LEN);
    match write!(text, "{}", Local::now().format(TIME_FORMAT)) {
        Ok(()) => text,
        Err(_) => TIME_ERROR_TEXT.to_owned(),
    }
}

/// Coarse one-second tick. No drift compensation; the next wake is
/// "now + 1s" from sleep entry. EINTR is deliberately not retried so a
/// shutdown signal wakes the loop immediately.
fn sleep_tick() {
    let tick = libc::timespec {
        tv_sec: 1,
        tv_nsec: 0,
    };
    // SAFETY: tick is a valid timespec; the remainder out-param is
    // unused and may be null.
    unsafe {
        libc::nanosleep(&tick, std::ptr::null_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fb::Geometry;
    use std::sync::atomic::AtomicBool;

    fn geometry() -> Geometry {
        Geometry {
            xres: 480,
            yres: 1080,
            bits_per_pixel: 32,
            line_length: 1920,
            mem_len: 1920 * 1080,
        }
    }

    #[test]
    fn drift_stays_in_bounds_after_first_move() {
        let mut drift = Drift::new();
        let mut positions = Vec::new();
        for _ in 0..100 {
            drift.advance();
            positions.push(drift.x);
        }
        assert!(positions.iter().all(|x| (DRIFT_MIN..=DRIFT_MAX).contains(x)));
        // Up from the start, then bounce off the top.
        assert_eq!(&positions[..15], &(6..=20).collect::<Vec<_>>()[..]);
        assert_eq!(positions[15], 19);
    }

    #[test]
    fn drift_bounces_off_lower_bound() {
        let mut drift = Drift::new();
        // 15 steps to 20, 14 more back down to 6.
        for _ in 0..29 {
            drift.advance();
        }
        assert_eq!(drift.x, 6);
        drift.advance();
        assert_eq!(drift.x, 7);
    }

    #[test]
    fn text_row_sits_two_pixels_above_bottom() {
        let clock = Clock::new(Surface::offscreen(geometry()), None);
        assert_eq!(clock.y, 1070);
    }

    #[test]
    fn compose_line_without_capacity_is_bare_timestamp() {
        let text = compose_line(None);
        assert!(!text.contains('%'));
        assert!(text.len() < MAX_TEXT_LEN);
        // "Mon Aug 25 12:00:00 2026" shape: weekday first, year last.
        assert_eq!(text.split_whitespace().count(), 5);
    }

    #[test]
    fn compose_line_appends_battery_suffix() {
        let path = std::env::temp_dir().join(format!("fbclock-{}-cap", std::process::id()));
        std::fs::write(&path, "87\n").unwrap();
        let text = compose_line(Some(&path));
        assert!(text.ends_with("- 87%"), "unexpected line: {text}");
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn compose_line_skips_unreadable_capacity() {
        let text = compose_line(Some(std::path::Path::new("/nonexistent/capacity")));
        assert!(!text.contains('%'));
    }

    #[test]
    fn tick_draws_into_the_text_band_only() {
        let mut clock = Clock::new(Surface::offscreen(geometry()), None);
        clock.tick();

        let geo = geometry();
        let frame = clock.surface.frame_mut();
        let band_start = 1070 * geo.line_length;
        assert!(frame[band_start..].iter().any(|b| *b == 0xFF));
        assert!(frame[..band_start].iter().all(|b| *b == 0));
    }

    #[test]
    fn tick_erases_the_previous_position() {
        let mut clock = Clock::new(Surface::offscreen(geometry()), None);
        clock.tick();
        let first: Vec<u8> = clock.surface.frame_mut().to_vec();
        clock.tick();

        // Drift moved from x=5 to x=6, so pixel column 5 held the
        // leading edge of the first glyph and is outside every cell of
        // the redraw. The clear must have wiped it.
        let geo = geometry();
        let second = clock.surface.frame_mut();
        let bpp = geo.bytes_per_pixel();
        let column = |frame: &[u8], x: usize| -> Vec<u8> {
            (0..FONT_HEIGHT)
                .flat_map(|row| {
                    let base = (1070 + row) * geo.line_length + x * bpp;
                    frame[base..base + bpp].to_vec()
                })
                .collect()
        };
        assert!(column(&first, 5).iter().any(|b| *b != 0));
        assert!(column(second, 5).iter().all(|b| *b == 0));
    }

    #[test]
    fn preset_flag_stops_before_the_first_tick() {
        static STOP: AtomicBool = AtomicBool::new(true);
        let flag = ShutdownFlag::new(&STOP);
        let clock = Clock::new(Surface::offscreen(geometry()), None);
        let started = std::time::Instant::now();
        clock.run(flag);
        assert!(started.elapsed() < std::time::Duration::from_millis(500));
    }

    #[test]
    fn flag_during_sleep_exits_within_one_tick() {
        static STOP: AtomicBool = AtomicBool::new(false);
        let flag = ShutdownFlag::new(&STOP);
        let clock = Clock::new(Surface::offscreen(geometry()), None);

        let setter = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(100));
            flag.request();
        });

        let started = std::time::Instant::now();
        clock.run(flag);
        setter.join().unwrap();
        // One full sleep at most after the flag is raised.
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }
}
