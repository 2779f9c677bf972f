//! Terminal tables for run reports, failures and the run ledger.

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table, Width,
};

use wap_core::{BackfillReport, RunReport};
use wap_model::{CheckResult, PipelineConfig, RunRecord, RunStatus, WapError};

pub fn print_run_report(report: &RunReport) {
    println!(
        "Run: {} ({}, attempt {})",
        report.record.run_id, report.record.status, report.record.attempts
    );
    println!("{}", staging_table(report));
    println!("{}", run_table(report));
}

pub fn print_failure(error: &WapError) {
    eprintln!("error: {error}");
    if let Some(report) = error.audit_report() {
        let failures: Vec<CheckResult> = report.failures().cloned().collect();
        eprintln!();
        eprintln!("Failed checks on audit.{}:", report.table);
        eprintln!("{}", check_table(&failures));
    }
}

pub fn print_backfill(report: &BackfillReport) {
    if !report.runs.is_empty() {
        let records: Vec<RunRecord> = report.runs.iter().map(|run| run.record.clone()).collect();
        println!("{}", history_table(&records));
    }
    if let Some(error) = &report.error {
        print_failure(error);
    }
}

/// Rows each staging relation received.
pub fn staging_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Staging"),
        header_cell("Files"),
        header_cell("Deleted"),
        header_cell("Loaded"),
    ]);
    apply_table_style(&mut table);
    for column in 1..4 {
        align_column(&mut table, column, CellAlignment::Right);
    }
    for summary in &report.staging {
        table.add_row(vec![
            relation_cell(format!("staging.{}", summary.table)),
            Cell::new(summary.files),
            count_cell(summary.rows_deleted, Color::Yellow),
            Cell::new(summary.rows_loaded),
        ]);
    }
    table
}

/// One row per WAP unit, in publication order, with a total.
pub fn run_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Table"),
        header_cell("Strategy"),
        header_cell("Written"),
        header_cell("Checks"),
        header_cell("Deleted"),
        header_cell("Inserted"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Center);
    align_column(&mut table, 4, CellAlignment::Right);
    align_column(&mut table, 5, CellAlignment::Right);

    let mut total_written = 0usize;
    let mut total_deleted = 0usize;
    let mut total_inserted = 0usize;
    for unit in &report.units {
        total_written += unit.rows_written;
        total_deleted += unit.promotion.rows_deleted;
        total_inserted += unit.promotion.rows_inserted;
        table.add_row(vec![
            relation_cell(format!("prod.{}", unit.table)),
            Cell::new(unit.promotion.strategy),
            Cell::new(unit.rows_written),
            Cell::new(format!(
                "{}/{}",
                unit.audit.results.len() - unit.audit.failure_count(),
                unit.audit.results.len()
            ))
            .fg(Color::Green),
            count_cell(unit.promotion.rows_deleted, Color::Yellow),
            Cell::new(unit.promotion.rows_inserted),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        dim_cell("-"),
        Cell::new(total_written).add_attribute(Attribute::Bold),
        dim_cell("-"),
        count_cell(total_deleted, Color::Yellow).add_attribute(Attribute::Bold),
        Cell::new(total_inserted).add_attribute(Attribute::Bold),
    ]);
    table
}

/// Failed checks with their violation counts.
pub fn check_table(results: &[CheckResult]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Check"),
        header_cell("Column"),
        header_cell("Violations"),
        header_cell("Detail"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    for result in results {
        table.add_row(vec![
            Cell::new(result.kind.to_string()),
            Cell::new(&result.column),
            count_cell(usize::try_from(result.violations).unwrap_or(usize::MAX), Color::Red),
            match &result.detail {
                Some(detail) => Cell::new(detail),
                None => dim_cell("-"),
            },
        ]);
    }
    table
}

/// The run ledger, one row per run.
pub fn history_table(records: &[RunRecord]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Run"),
        header_cell("Status"),
        header_cell("Attempts"),
        header_cell("Units"),
        header_cell("Started"),
        header_cell("Finished"),
        header_cell("Failure"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Center);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    for record in records {
        table.add_row(vec![
            Cell::new(&record.run_id),
            status_cell(record.status),
            Cell::new(record.attempts),
            Cell::new(record.completed_units.len()),
            Cell::new(record.started_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            match record.finished_at {
                Some(at) => Cell::new(at.format("%Y-%m-%d %H:%M:%S").to_string()),
                None => dim_cell("-"),
            },
            match &record.failure {
                Some(failure) => Cell::new(&failure.message).fg(Color::Red),
                None => dim_cell("-"),
            },
        ]);
    }
    table
}

/// Configured destination tables in WAP unit order.
pub fn tables_table(config: &PipelineConfig) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("#"),
        header_cell("Table"),
        header_cell("Role"),
        header_cell("Strategy"),
        header_cell("Key"),
        header_cell("Checks"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    align_column(&mut table, 5, CellAlignment::Right);
    for (position, descriptor) in config.wap_units().into_iter().enumerate() {
        let key = if descriptor.primary_key_columns.is_empty() {
            dim_cell("-")
        } else {
            Cell::new(descriptor.primary_key_columns.join(", "))
        };
        table.add_row(vec![
            Cell::new(position + 1),
            relation_cell(descriptor.name.clone()),
            Cell::new(descriptor.role.to_string()),
            Cell::new(descriptor.load_strategy.to_string()),
            key,
            Cell::new(descriptor.quality_checks.checks.len()),
        ]);
    }
    table
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(120);
    if table.column_count() >= 6 {
        table.set_constraints(vec![
            ColumnConstraint::UpperBoundary(Width::Percentage(35)),
            ColumnConstraint::UpperBoundary(Width::Fixed(20)),
            ColumnConstraint::LowerBoundary(Width::Fixed(7)),
            ColumnConstraint::LowerBoundary(Width::Fixed(6)),
            ColumnConstraint::LowerBoundary(Width::Fixed(7)),
            ColumnConstraint::LowerBoundary(Width::Fixed(8)),
        ]);
    }
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn status_cell(status: RunStatus) -> Cell {
    let cell = Cell::new(status.as_str());
    match status {
        RunStatus::Succeeded => cell.fg(Color::Green).add_attribute(Attribute::Bold),
        RunStatus::Failed => cell.fg(Color::Red).add_attribute(Attribute::Bold),
        _ => cell.fg(Color::Yellow),
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn relation_cell(name: String) -> Cell {
    Cell::new(name)
        .fg(Color::Blue)
        .add_attribute(Attribute::Bold)
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
