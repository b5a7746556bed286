use eframe::egui::Ui;
use egui_extras::{Column as TableColumn, TableBuilder};
use listing_explorer::data::aggregate::PERCENTILES;
use listing_explorer::{Aggregate, GroupValue, ShareTable};

const ROW_HEIGHT: f32 = 18.0;

// ---------------------------------------------------------------------------
// Generic text table
// ---------------------------------------------------------------------------

/// Render `rows` under `headers` as a striped table.
pub fn text_table(ui: &mut Ui, id: &str, headers: &[String], rows: &[Vec<String>]) {
    if rows.is_empty() {
        ui.label("No matching rows.");
        return;
    }
    ui.push_id(id, |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .max_scroll_height(260.0)
            .columns(TableColumn::auto().at_least(60.0), headers.len())
            .header(ROW_HEIGHT + 2.0, |mut header| {
                for h in headers {
                    header.col(|ui: &mut Ui| {
                        ui.strong(h);
                    });
                }
            })
            .body(|body| {
                body.rows(ROW_HEIGHT, rows.len(), |mut row| {
                    let cells = &rows[row.index()];
                    for cell in cells {
                        row.col(|ui: &mut Ui| {
                            ui.label(cell);
                        });
                    }
                });
            });
    });
}

// ---------------------------------------------------------------------------
// Aggregate tables
// ---------------------------------------------------------------------------

/// One row per group: label and formatted metric value.
pub fn aggregate_table(ui: &mut Ui, id: &str, aggregate: &Aggregate, value_header: &str) {
    let headers = vec![aggregate.group_key.label().to_string(), value_header.to_string()];
    let rows: Vec<Vec<String>> = aggregate
        .groups
        .iter()
        .map(|g| vec![g.label.clone(), format_value(&g.value)])
        .collect();
    text_table(ui, id, &headers, &rows);
}

/// Describe-style table: count, mean, std, min, percentiles, max per group.
pub fn describe_table(ui: &mut Ui, id: &str, aggregate: &Aggregate) {
    let mut headers = vec![
        aggregate.group_key.label().to_string(),
        "count".to_string(),
        "mean".to_string(),
        "std".to_string(),
        "min".to_string(),
    ];
    headers.extend(PERCENTILES.iter().map(|p| format!("{}%", (p * 100.0).round())));
    headers.push("max".to_string());

    let rows: Vec<Vec<String>> = aggregate
        .groups
        .iter()
        .filter_map(|g| match &g.value {
            GroupValue::Describe(d) => {
                let mut row = vec![
                    g.label.clone(),
                    d.count.to_string(),
                    format!("{:.2}", d.mean),
                    d.std.map_or_else(|| "-".to_string(), |s| format!("{s:.2}")),
                    format!("{:.1}", d.min),
                ];
                row.extend(d.percentiles.iter().map(|v| format!("{v:.1}")));
                row.push(format!("{:.1}", d.max));
                Some(row)
            }
            _ => None,
        })
        .collect();
    text_table(ui, id, &headers, &rows);
}

/// Quantity and percentage of each inner group within its outer group.
pub fn share_table(ui: &mut Ui, id: &str, table: &ShareTable) {
    let headers = vec![
        table.outer_key.label().to_string(),
        table.inner_key.label().to_string(),
        "quantity".to_string(),
        "percentage".to_string(),
    ];
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|r| {
            vec![
                r.outer.clone(),
                r.inner.clone(),
                r.count.to_string(),
                format!("{:.2}%", r.percentage),
            ]
        })
        .collect();
    text_table(ui, id, &headers, &rows);
}

pub fn format_value(value: &GroupValue) -> String {
    match value {
        GroupValue::Count(n) => n.to_string(),
        GroupValue::Mean(v) | GroupValue::Sum(v) => format!("{v:.2}"),
        GroupValue::Describe(d) => format!("median {:.2}", d.median()),
    }
}
