//! Progress chart: word count over time as a standalone SVG.

use chrono::{DateTime, NaiveDate, Utc};

use crate::CommitRecord;

const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 480.0;
const LEFT: f64 = 80.0;
const RIGHT: f64 = WIDTH - 24.0;
const TOP: f64 = 48.0;
const BOTTOM: f64 = HEIGHT - 84.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

const FONT_STACK: &str = "-apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif, 'Apple Color Emoji', 'Segoe UI Emoji'";
const LINE_COLOR: &str = "#1f77b4";
const GOAL_COLOR: &str = "green";
const DUE_COLOR: &str = "red";

/// Data behind the progress chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressChart {
    /// `(time, words)`, oldest first.
    pub points: Vec<(DateTime<Utc>, u64)>,
    /// Horizontal goal line.
    pub goal: Option<u64>,
    /// Vertical due-date line.
    pub due: Option<NaiveDate>,
}

impl ProgressChart {
    /// Chart from saved history (newest first, as git lists it) plus the
    /// current count at `now`.
    pub fn from_history(
        records: &[CommitRecord],
        current: u64,
        now: DateTime<Utc>,
        goal: Option<u64>,
        due: Option<NaiveDate>,
    ) -> Self {
        let mut points: Vec<(DateTime<Utc>, u64)> = records
            .iter()
            .rev()
            .filter_map(|r| DateTime::from_timestamp(r.timestamp, 0).map(|t| (t, r.word_count())))
            .collect();
        points.push((now, current));
        Self { points, goal, due }
    }

    /// Render as an SVG document.
    pub fn render_svg(&self) -> String {
        let scale = Scale::fit(self);
        let mut svg = String::new();

        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="{FONT_STACK}" font-size="12">"#
        ));
        svg.push('\n');
        svg.push_str(&format!(
            r#"<rect width="{WIDTH}" height="{HEIGHT}" fill="white"/>"#
        ));
        svg.push('\n');
        svg.push_str(&format!(
            r#"<text x="{:.1}" y="28" font-size="16" text-anchor="middle">Progress</text>"#,
            (LEFT + RIGHT) / 2.0
        ));
        svg.push('\n');
        svg.push_str(&format!(
            r#"<text transform="translate(22 {:.1}) rotate(-90)" text-anchor="middle">Word Count</text>"#,
            (TOP + BOTTOM) / 2.0
        ));
        svg.push('\n');

        for tick in y_ticks(scale.y_max, self.goal) {
            let y = scale.y(tick as f64);
            svg.push_str(&format!(
                r#"<line x1="{:.2}" y1="{y:.2}" x2="{LEFT:.2}" y2="{y:.2}" stroke="black"/>"#,
                LEFT - 4.0
            ));
            svg.push_str(&format!(
                r#"<text x="{:.2}" y="{:.2}" text-anchor="end">{tick}</text>"#,
                LEFT - 7.0,
                y + 4.0
            ));
            svg.push('\n');
        }

        let due_day = self.due.map(day_of);
        for tick in x_ticks(scale.x_min, scale.x_max, due_day) {
            let x = scale.x(tick);
            svg.push_str(&format!(
                r#"<line x1="{x:.2}" y1="{BOTTOM:.2}" x2="{x:.2}" y2="{:.2}" stroke="black"/>"#,
                BOTTOM + 4.0
            ));
            svg.push_str(&date_label(x, tick));
            svg.push('\n');
        }

        let polyline: Vec<String> = self
            .points
            .iter()
            .map(|(t, words)| format!("{:.2},{:.2}", scale.x(day_of_time(t)), scale.y(*words as f64)))
            .collect();
        svg.push_str(&format!(
            r#"<polyline points="{}" fill="none" stroke="{LINE_COLOR}" stroke-width="1.5"/>"#,
            polyline.join(" ")
        ));
        svg.push('\n');

        if let Some(goal) = self.goal {
            let y = scale.y(goal as f64);
            svg.push_str(&format!(
                r#"<line x1="{LEFT:.2}" y1="{y:.2}" x2="{RIGHT:.2}" y2="{y:.2}" stroke="{GOAL_COLOR}"/>"#
            ));
            svg.push('\n');
        }
        if let Some(day) = due_day {
            let x = scale.x(day);
            svg.push_str(&format!(
                r#"<line x1="{x:.2}" y1="{TOP:.2}" x2="{x:.2}" y2="{BOTTOM:.2}" stroke="{DUE_COLOR}"/>"#
            ));
            svg.push('\n');
        }

        svg.push_str(&format!(
            r#"<rect x="{LEFT}" y="{TOP}" width="{:.2}" height="{:.2}" fill="none" stroke="black"/>"#,
            RIGHT - LEFT,
            BOTTOM - TOP
        ));
        svg.push_str("\n</svg>\n");
        svg
    }
}

/// Parse a due date as written in `data.date`.
pub fn parse_due_date(text: &str) -> Option<NaiveDate> {
    const FORMATS: [&str; 4] = ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%m/%d/%Y"];
    let text = text.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

// ---------------------------------------------------------------------------
// Axes
// ---------------------------------------------------------------------------

/// Data-to-pixel mapping. The x axis is measured in days since the epoch.
struct Scale {
    x_min: f64,
    x_max: f64,
    y_max: f64,
}

impl Scale {
    fn fit(chart: &ProgressChart) -> Self {
        let days: Vec<f64> = chart.points.iter().map(|(t, _)| day_of_time(t)).collect();
        let first = days.iter().copied().fold(f64::INFINITY, f64::min);
        let last = days.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (first, last) = if first.is_finite() {
            (first, last)
        } else {
            let today = day_of_time(&Utc::now());
            (today, today)
        };

        let x_min = first - 1.0;
        let x_end = chart.due.map(day_of).map_or(last, |due| last.max(due));
        let x_max = x_end + ((x_end - x_min) * 0.05).max(2.0);

        let highest = chart
            .points
            .iter()
            .map(|(_, w)| *w)
            .chain(chart.goal)
            .max()
            .unwrap_or(0) as f64;
        let y_max = match chart.goal {
            Some(goal) => highest + (goal as f64 * 0.05).max(100.0),
            None => (highest * 1.1).max(100.0),
        };

        Self { x_min, x_max, y_max }
    }

    fn x(&self, day: f64) -> f64 {
        LEFT + (day - self.x_min) / (self.x_max - self.x_min) * (RIGHT - LEFT)
    }

    fn y(&self, words: f64) -> f64 {
        BOTTOM - words / self.y_max * (BOTTOM - TOP)
    }
}

fn day_of_time(t: &DateTime<Utc>) -> f64 {
    t.timestamp() as f64 / SECONDS_PER_DAY
}

fn day_of(date: NaiveDate) -> f64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp() as f64 / SECONDS_PER_DAY)
        .unwrap_or_default()
}

/// Round tick values from zero, plus the goal when it is not already one.
fn y_ticks(y_max: f64, goal: Option<u64>) -> Vec<u64> {
    let step = nice_step(y_max / 5.0);
    let mut ticks: Vec<u64> = (0..)
        .map(|i| i * step)
        .take_while(|v| (*v as f64) <= y_max)
        .collect();
    if let Some(goal) = goal {
        if !ticks.contains(&goal) {
            ticks.push(goal);
            ticks.sort_unstable();
        }
    }
    ticks
}

fn nice_step(raw: f64) -> u64 {
    if raw <= 1.0 {
        return 1;
    }
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    let factor = if normalized <= 1.0 {
        1.0
    } else if normalized <= 2.0 {
        2.0
    } else if normalized <= 5.0 {
        5.0
    } else {
        10.0
    };
    (factor * magnitude) as u64
}

/// Whole-day ticks at a readable spacing. The due date replaces any tick
/// that would crowd it.
fn x_ticks(x_min: f64, x_max: f64, due: Option<f64>) -> Vec<f64> {
    const STEPS: [f64; 8] = [1.0, 2.0, 7.0, 14.0, 30.0, 61.0, 91.0, 182.0];
    let span = x_max - x_min;
    let step = STEPS
        .iter()
        .copied()
        .find(|s| span / s <= 6.0)
        .unwrap_or(365.0);

    let mut ticks = Vec::new();
    let mut day = x_min.ceil();
    while day <= x_max {
        ticks.push(day);
        day += step;
    }

    if let Some(due) = due {
        ticks.retain(|t| (t - due).abs() >= step / 2.0);
        ticks.push(due);
        ticks.sort_by(f64::total_cmp);
    }
    ticks
}

fn date_label(x: f64, day: f64) -> String {
    let Some(date) = DateTime::from_timestamp((day * SECONDS_PER_DAY).round() as i64, 0) else {
        return String::new();
    };
    let lines = [
        date.format("%b").to_string(),
        date.format("%d").to_string(),
        date.format("%Y").to_string(),
    ];
    let mut label = format!(r#"<text x="{x:.2}" y="{:.2}" text-anchor="middle">"#, BOTTOM + 18.0);
    for (i, line) in lines.iter().enumerate() {
        let dy = if i == 0 { "0" } else { "1.2em" };
        label.push_str(&format!(r#"<tspan x="{x:.2}" dy="{dy}">{line}</tspan>"#));
    }
    label.push_str("</text>");
    label
}
