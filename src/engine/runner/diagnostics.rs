use std::collections::HashMap;
use std::fmt::{Display, Formatter, Write};

use petgraph::graph::NodeIndex;

use crate::blueprint::Website;
use crate::engine::{TaskExecution, TaskState};

/// Build diagnostics and performance metrics.
///
/// This struct is returned by [`Website::build`] and contains information about
/// the execution of tasks, such as their final state, duration and start times.
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// A map of task node indices to their execution metrics.
    pub execution_times: HashMap<NodeIndex, TaskExecution>,
    /// Final state of every selected task.
    pub states: HashMap<NodeIndex, TaskState>,
}

impl Diagnostics {
    /// Final state of a task, `None` if it wasn't selected for this run.
    pub fn state(&self, index: NodeIndex) -> Option<TaskState> {
        self.states.get(&index).copied()
    }

    /// Renders the task graph as a Mermaid diagram, color-coded by outcome.
    ///
    /// * **Green**: Done
    /// * **Red**: Failed
    /// * **Grey**: Skipped or not selected
    pub fn render_mermaid<G>(&self, site: &Website<G>) -> String
    where
        G: Send + Sync,
    {
        let mut f = String::new();
        let _ = self.write_mermaid(&mut f, site);
        f
    }

    /// Renders the outcome graph as a Mermaid file.
    pub fn render_mermaid_to_file<G>(
        &self,
        site: &Website<G>,
        path: impl AsRef<std::path::Path>,
    ) -> Result<(), std::io::Error>
    where
        G: Send + Sync,
    {
        std::fs::write(path, self.render_mermaid(site))
    }

    fn write_mermaid<G>(&self, f: &mut String, site: &Website<G>) -> std::fmt::Result
    where
        G: Send + Sync,
    {
        writeln!(f, "graph LR")?;

        for index in site.graph.node_indices() {
            let name = site.graph[index].get_name().replace('"', "\\\"");

            let (label, color) = match (self.state(index), self.execution_times.get(&index)) {
                (Some(TaskState::Done), Some(exec)) => (format!("{:.2?}", exec.duration), "#90EE90"),
                (Some(TaskState::Failed), _) => ("Failed".to_string(), "#F08080"),
                (Some(TaskState::Skipped), _) => ("Skipped".to_string(), "#D3D3D3"),
                _ => ("Not selected".to_string(), "#D3D3D3"),
            };

            writeln!(f, "    {:?}[\"{}\\n{}\"]", index.index(), name, label)?;
            writeln!(f, "    style {:?} fill:{}", index.index(), color)?;
        }

        for edge in site.graph.raw_edges() {
            writeln!(
                f,
                "    {:?} --> {:?}",
                edge.source().index(),
                edge.target().index()
            )?;
        }

        Ok(())
    }
}

// WATERFALL

struct XmlSafe<'a>(&'a str);

impl<'a> Display for XmlSafe<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for c in self.0.chars() {
            match c {
                '<' => f.write_str("&lt;")?,
                '>' => f.write_str("&gt;")?,
                '&' => f.write_str("&amp;")?,
                '"' => f.write_str("&quot;")?,
                '\'' => f.write_str("&apos;")?,
                _ => f.write_char(c)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct WaterfallLayout {
    row_height: u32,
    label_width: u32,
    chart_width: u32,
    padding: u32,
    header_height: u32,
    text_space: u32,
}

impl Default for WaterfallLayout {
    fn default() -> Self {
        Self {
            row_height: 30,
            label_width: 200,
            chart_width: 800,
            padding: 10,
            header_height: 30,
            text_space: 80,
        }
    }
}

impl WaterfallLayout {
    fn total_width(&self) -> u32 {
        self.label_width + self.chart_width + (self.padding * 3) + self.text_space
    }

    fn total_height(&self, task_count: usize) -> u32 {
        self.header_height + (task_count as u32 * self.row_height) + self.padding
    }
}

struct TimelineStats {
    global_start: std::time::Instant,
    total_micros: f64,
}

impl TimelineStats {
    fn from_tasks(tasks: &[(NodeIndex, &TaskExecution)]) -> Option<Self> {
        let global_start = tasks.iter().map(|(_, t)| t.start).min()?;
        let global_end = tasks.iter().map(|(_, t)| t.start + t.duration).max()?;

        let total_duration = global_end.duration_since(global_start);
        let total_micros = total_duration.as_micros().max(1) as f64;

        Some(Self {
            global_start,
            total_micros,
        })
    }

    fn format_duration(micros: f64) -> String {
        if micros < 1000.0 {
            format!("{:.0}µs", micros)
        } else {
            format!("{:.2}ms", micros / 1000.0)
        }
    }
}

impl Diagnostics {
    /// Renders a waterfall chart of task execution as an SVG file.
    pub fn render_waterfall_to_file<G>(
        &self,
        site: &Website<G>,
        path: impl AsRef<std::path::Path>,
    ) -> Result<(), std::io::Error>
    where
        G: Send + Sync,
    {
        std::fs::write(path, self.render_waterfall(site))
    }

    /// Renders a waterfall chart of task execution as an SVG string.
    pub fn render_waterfall<G>(&self, site: &Website<G>) -> String
    where
        G: Send + Sync,
    {
        let mut ran_tasks: Vec<(NodeIndex, &TaskExecution)> =
            self.execution_times.iter().map(|(k, v)| (*k, v)).collect();

        let Some(stats) = TimelineStats::from_tasks(&ran_tasks) else {
            return r#"<svg width="200" height="50" xmlns="http://www.w3.org/2000/svg"><text x="10" y="30" font-family="sans-serif">No tasks ran</text></svg>"#
                .to_string();
        };

        ran_tasks.sort_by_key(|(_, t)| t.start);

        let layout = WaterfallLayout::default();
        let mut svg = String::with_capacity(ran_tasks.len() * 500);

        let _ = self.write_svg_header(&mut svg, &layout, ran_tasks.len());
        let _ = self.write_grid(&mut svg, &layout, &stats);
        let _ = self.write_tasks(&mut svg, &layout, &stats, &ran_tasks, site);

        svg.push_str("</svg>");
        svg
    }

    fn write_svg_header(
        &self,
        buf: &mut String,
        layout: &WaterfallLayout,
        task_count: usize,
    ) -> std::fmt::Result {
        let css = r#"
        text { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Helvetica, Arial, sans-serif; font-size: 12px; }
        .row { fill: #ffffff; }
        .bar { fill: #3b82f6; rx: 4; }
        .bar.failed { fill: #ef4444; }
        .label { fill: #333; }
        .time { fill: #666; font-size: 11px; }
        .grid-line { stroke: #e5e7eb; stroke-width: 1; }
        .axis-label { fill: #9ca3af; font-size: 10px; }"#;

        write!(
            buf,
            r#"<svg width="{}" height="{}" xmlns="http://www.w3.org/2000/svg"><style>{}</style><rect width="100%" height="100%" fill="white" />"#,
            layout.total_width(),
            layout.total_height(task_count),
            css
        )
    }

    fn write_grid(
        &self,
        buf: &mut String,
        layout: &WaterfallLayout,
        stats: &TimelineStats,
    ) -> std::fmt::Result {
        let steps = 5;
        for i in 0..=steps {
            let pct = i as f64 / steps as f64;
            let label = TimelineStats::format_duration(stats.total_micros * pct);

            let x = layout.label_width as f64
                + layout.padding as f64
                + (layout.chart_width as f64 * pct);

            write!(
                buf,
                r#"<line x1="{x:.1}" y1="{y1}" x2="{x:.1}" y2="100%" class="grid-line" /><text x="{x:.1}" y="{y_text}" text-anchor="middle" class="axis-label">{label}</text>"#,
                y1 = layout.header_height,
                y_text = layout.header_height - 5,
            )?;
        }

        Ok(())
    }

    fn write_tasks<G>(
        &self,
        buf: &mut String,
        layout: &WaterfallLayout,
        stats: &TimelineStats,
        tasks: &[(NodeIndex, &TaskExecution)],
        site: &Website<G>,
    ) -> std::fmt::Result
    where
        G: Send + Sync,
    {
        for (i, (index, exec)) in tasks.iter().enumerate() {
            let raw_name = site.graph[*index].get_name();
            let name = XmlSafe(&raw_name);
            let class = match self.state(*index) {
                Some(TaskState::Failed) => "bar failed",
                _ => "bar",
            };

            let y_pos = layout.header_height + (i as u32 * layout.row_height);
            let y_center = y_pos + (layout.row_height / 2);

            write!(
                buf,
                r#"<rect x="0" y="{}" width="100%" height="{}" class="row" />"#,
                y_pos, layout.row_height
            )?;

            write!(
                buf,
                r#"<text x="{}" y="{}" class="label" dominant-baseline="middle">{}</text>"#,
                layout.padding, y_center, name
            )?;

            let offset_micros = exec.start.duration_since(stats.global_start).as_micros() as f64;
            let duration_micros = exec.duration.as_micros() as f64;

            let bar_x = layout.label_width as f64
                + layout.padding as f64
                + (offset_micros / stats.total_micros * layout.chart_width as f64);

            let bar_w = (duration_micros / stats.total_micros * layout.chart_width as f64).max(1.0);

            write!(
                buf,
                r#"<rect x="{x:.1}" y="{y}" width="{w:.1}" height="{h}" class="{class}"><title>{name}: {dur:.2?}</title></rect>"#,
                x = bar_x,
                y = y_pos + 5,
                w = bar_w,
                h = layout.row_height - 10,
                dur = exec.duration
            )?;

            write!(
                buf,
                r#"<text x="{x:.1}" y="{y}" class="time" dominant-baseline="middle">{text}</text>"#,
                x = bar_x + bar_w + 5.0,
                y = y_center,
                text = TimelineStats::format_duration(duration_micros)
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::Blueprint;

    fn website() -> (Website<()>, NodeIndex, NodeIndex) {
        let mut blueprint = Blueprint::<()>::new();
        let a = blueprint.task().name("config").run(|_| Ok(()));
        let b = blueprint.task().name("html").depends_on(a).run(|_, _| Ok(()));
        (blueprint.finish(), a.index(), b.index())
    }

    #[test]
    fn test_mermaid_marks_states() {
        let (site, a, b) = website();
        let mut diagnostics = Diagnostics::default();
        diagnostics.states.insert(a, TaskState::Failed);
        diagnostics.states.insert(b, TaskState::Skipped);

        let mermaid = diagnostics.render_mermaid(&site);

        assert!(mermaid.starts_with("graph LR"));
        assert!(mermaid.contains(r#"0["config\nFailed"]"#));
        assert!(mermaid.contains(r#"1["html\nSkipped"]"#));
        assert!(mermaid.contains("0 --> 1"));
    }

    #[test]
    fn test_waterfall_escapes_names() {
        let mut blueprint = Blueprint::<()>::new();
        let a = blueprint.task().name("<script>").run(|_| Ok(()));
        let site = blueprint.finish();

        let mut diagnostics = Diagnostics::default();
        diagnostics.states.insert(a.index(), TaskState::Done);
        diagnostics.execution_times.insert(
            a.index(),
            TaskExecution {
                start: Instant::now(),
                duration: Duration::from_millis(3),
            },
        );

        let svg = diagnostics.render_waterfall(&site);

        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("&lt;script&gt;"));
        assert!(svg.contains("3.00ms"));
    }

    #[test]
    fn test_waterfall_empty() {
        let (site, _, _) = website();
        let svg = Diagnostics::default().render_waterfall(&site);
        assert!(svg.contains("No tasks ran"));
    }
}
