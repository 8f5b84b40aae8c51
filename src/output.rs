use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

use crate::error::Result;
use crate::sankey::legend_items;
use crate::types::{LegendRow, SankeyData, SankeyLayout, TreemapHierarchy};
use crate::util::{format_clp, format_percent};

pub fn write_csv<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    fs::write(path, s)?;
    Ok(())
}

/// Legend as display rows: letter, name, CLP amount, share and overpricing.
pub fn legend_rows(data: &SankeyData) -> Vec<LegendRow> {
    legend_items(data)
        .into_iter()
        .zip(data.targets())
        .map(|(item, node)| LegendRow {
            letter: item.letter,
            name: item.name,
            amount: format_clp(item.value),
            share: format_percent(item.percentage),
            overpricing: node
                .overpricing_rate
                .map(|r| format_percent(r * 100.0))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect()
}

/// Markdown table of the first `max_rows` rows, or `(no rows)`.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("\n{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    println!("{}\n", render_table(rows, max_rows));
    if rows.len() > max_rows {
        println!("(+{} more rows)\n", rows.len() - max_rows);
    }
}

/// Files written by [`export_snapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedFiles {
    pub treemap: PathBuf,
    pub layout: PathBuf,
    pub legend: PathBuf,
}

/// Write the displayed level as `<stem>_treemap.json`, the computed diagram
/// as `<stem>_sankey.json` and its legend as `<stem>_legend.csv` in `dir`.
pub fn export_snapshot(
    dir: impl AsRef<Path>,
    stem: &str,
    hierarchy: &TreemapHierarchy,
    data: &SankeyData,
    layout: &SankeyLayout,
) -> Result<ExportedFiles> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let files = ExportedFiles {
        treemap: dir.join(format!("{stem}_treemap.json")),
        layout: dir.join(format!("{stem}_sankey.json")),
        legend: dir.join(format!("{stem}_legend.csv")),
    };
    write_json(&files.treemap, hierarchy)?;
    write_json(&files.layout, layout)?;
    write_csv(&files.legend, &legend_rows(data))?;
    info!(dir = %dir.display(), stem, "snapshot exported");
    Ok(files)
}

/// File-name-safe form of a label: lowercase ASCII alphanumerics joined by `_`.
pub fn file_stem(label: &str) -> String {
    let normalized = crate::geo::normalize_name(label);
    let stem = normalized
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if stem.is_empty() {
        "snapshot".to_string()
    } else {
        stem
    }
}
