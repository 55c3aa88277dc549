use core::{fmt::Display, time::Duration};
use hashbrown::HashMap;

/// Accumulates durations under a name and renders them as a table.
#[derive(Debug, Default, Clone)]
pub struct Profiled {
    durations: HashMap<String, ProfileItem>,
}

#[derive(Debug, Default, Clone)]
struct ProfileItem {
    total_duration: Duration,
    num_runs: usize,
}

impl ProfileItem {
    fn update(&mut self, duration: Duration) {
        self.total_duration += duration;
        self.num_runs += 1;
    }
}

impl Profiled {
    /// If nothing was profiled.
    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Record one run of `name`. Only the first line of the name is kept.
    pub fn update(&mut self, name: &str, duration: Duration) {
        let name = name.lines().next().unwrap_or(name);

        match self.durations.get_mut(name) {
            Some(item) => item.update(duration),
            None => {
                self.durations.insert(
                    name.to_string(),
                    ProfileItem {
                        total_duration: duration,
                        num_runs: 1,
                    },
                );
            }
        }
    }

    /// Total duration recorded under `name`.
    pub fn total(&self, name: &str) -> Option<Duration> {
        self.durations.get(name).map(|item| item.total_duration)
    }

    /// Number of runs recorded under `name`.
    pub fn runs(&self, name: &str) -> usize {
        self.durations.get(name).map_or(0, |item| item.num_runs)
    }
}

impl Display for Profiled {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let header_name = "Name";
        let header_total = "Total";
        let header_runs = "Runs";
        let header_mean = "Mean";
        let header_ratio = "Ratio";

        let total_duration: Duration = self.durations.values().map(|i| i.total_duration).sum();
        let total_runs: usize = self.durations.values().map(|i| i.num_runs).sum();

        let ratio = |duration: Duration| match total_duration.is_zero() {
            true => "0 %".to_string(),
            false => format!(
                "{} %",
                (100 * duration.as_micros()) / total_duration.as_micros().max(1)
            ),
        };
        let mean = |duration: Duration, runs: usize| match runs {
            0 => Duration::ZERO,
            runs => duration / runs as u32,
        };

        let mut rows: Vec<[String; 5]> = Vec::with_capacity(self.durations.len());
        let mut sorted: Vec<_> = self.durations.iter().collect();
        sorted.sort_by(|(_, a), (_, b)| b.total_duration.cmp(&a.total_duration));

        for (name, item) in sorted {
            rows.push([
                name.clone(),
                format!("{:?}", item.total_duration),
                item.num_runs.to_string(),
                format!("{:?}", mean(item.total_duration, item.num_runs)),
                ratio(item.total_duration),
            ]);
        }

        let total_row = [
            "Total".to_string(),
            format!("{total_duration:?}"),
            total_runs.to_string(),
            format!("{:?}", mean(total_duration, total_runs)),
            "100 %".to_string(),
        ];

        let mut widths = [
            header_name.len(),
            header_total.len(),
            header_runs.len(),
            header_mean.len(),
            header_ratio.len(),
        ];
        for row in rows.iter().chain(core::iter::once(&total_row)) {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let line_length = widths.iter().sum::<usize>() + 3 * widths.len() + 1;
        let write_line = |char: &str, f: &mut core::fmt::Formatter<'_>| {
            writeln!(f, "{}", char.repeat(line_length))
        };
        let write_row = |cells: [&str; 5], f: &mut core::fmt::Formatter<'_>| {
            write!(f, "|")?;
            for (cell, width) in cells.iter().zip(widths) {
                write!(f, " {cell:<width$} |")?;
            }
            writeln!(f)
        };

        write_line("-", f)?;
        write_row(
            [header_name, header_total, header_runs, header_mean, header_ratio],
            f,
        )?;
        write_line("-", f)?;

        for row in rows.iter() {
            write_row([&row[0], &row[1], &row[2], &row[3], &row[4]], f)?;
        }

        write_line("-", f)?;
        write_row(
            [
                &total_row[0],
                &total_row[1],
                &total_row[2],
                &total_row[3],
                &total_row[4],
            ],
            f,
        )?;
        write_line("-", f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updates_accumulate_per_name() {
        let mut profiled = Profiled::default();
        profiled.update("case 1", Duration::from_millis(3));
        profiled.update("case 1\nwith details", Duration::from_millis(2));
        profiled.update("case 2", Duration::from_millis(5));

        assert_eq!(profiled.total("case 1"), Some(Duration::from_millis(5)));
        assert_eq!(profiled.runs("case 1"), 2);
        assert_eq!(profiled.runs("missing"), 0);
    }

    #[test]
    fn table_lists_every_name_and_the_total() {
        let mut profiled = Profiled::default();
        profiled.update("slow", Duration::from_millis(30));
        profiled.update("fast", Duration::from_millis(10));

        let table = profiled.to_string();
        let slow = table.find("slow").unwrap();
        let fast = table.find("fast").unwrap();

        assert!(slow < fast);
        assert!(table.lines().any(|line| line.starts_with("| Total ")));
        assert!(table.contains("75 %"));
    }

    #[test]
    fn empty_table_renders() {
        let table = Profiled::default().to_string();

        assert!(Profiled::default().is_empty());
        assert!(table.lines().any(|line| line.starts_with("| Total ")));
    }
}
