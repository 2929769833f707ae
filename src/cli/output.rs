//! CLI output: error mapping and text/JSON rendering for command results.

use crate::controller::{NavigationView, RenderedNavigation, RestoreOutcome};
use crate::navigation::ResolvedNavItem;
use crate::routes::Route;
use crate::sync::{SyncOutcome, SyncReport};
use crate::types::{ContentBlock, Page};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::{json, Value};

/// Map command errors to a string for CLI output, including the cause chain.
pub fn map_error(e: &anyhow::Error) -> String {
    format!("Error: {:#}", e)
}

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn format_routes_text(routes: &[Route]) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Routes"));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Path", "Slug", "Core"]);
    for route in routes {
        table.add_row(vec![
            route.path.clone(),
            route.slug.clone(),
            if route.core { "yes" } else { "no" }.to_string(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

pub fn format_sync_outcome(outcome: &SyncOutcome) -> String {
    let report = outcome.report();
    let mut out = format_report(report);
    if let Some(error) = outcome.error() {
        out.push_str(&format!("\n{} {}\n", "Sync failed:".red(), error));
    }
    out
}

fn format_report(report: &SyncReport) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Sync"));
    out.push_str(&format!("  Pages created: {}\n", report.pages_created.len()));
    for slug in &report.pages_created {
        out.push_str(&format!("    + {}\n", slug));
    }
    out.push_str(&format!("  Pages existing: {}\n", report.pages_existing));
    if report.nav_items_seeded > 0 {
        out.push_str(&format!("  Nav items seeded: {}\n", report.nav_items_seeded));
    }
    out
}

pub fn format_restore_outcome(outcome: &RestoreOutcome, view: &NavigationView) -> String {
    let line = match outcome {
        RestoreOutcome::Restored => format!("{}", "Navigation restored".green()),
        RestoreOutcome::StillDegraded => format!("{}", "Navigation still degraded".yellow()),
        RestoreOutcome::Rejected(reason) => format!("Restore not run: {}", reason),
    };
    format!("{}\n\n{}", line, format_navigation_text(view))
}

pub fn format_navigation_text(view: &NavigationView) -> String {
    let mut out = format!(
        "{} ({})\n\n",
        format_section_heading("Navigation"),
        view.mode.as_str()
    );
    match &view.items {
        RenderedNavigation::Pending => out.push_str("  Navigation is still loading.\n"),
        RenderedNavigation::Cms(navigation) => {
            out.push_str(&format!("{}\n", nav_table(&navigation.main_items)));
            for (group, items) in &navigation.dropdowns {
                out.push_str(&format!("\n{}\n\n", format_section_heading(group)));
                if items.is_empty() {
                    out.push_str("  (no visible items)\n");
                } else {
                    out.push_str(&format!("{}\n", nav_table(items)));
                }
            }
        }
        RenderedNavigation::Fallback(links) => {
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(vec!["Label", "Path"]);
            for link in links.iter() {
                table.add_row(vec![link.label, link.path]);
            }
            out.push_str(&format!("{}\n", table));
        }
    }
    if let Some(notice) = view.notice {
        out.push_str(&format!("\n{}\n", notice.yellow()));
    }
    if view.restore_enabled {
        out.push_str("\nRun `sitenav bootstrap` to restore navigation.\n");
    }
    out
}

fn nav_table(items: &[ResolvedNavItem]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Order", "Label", "Link"]);
    for item in items {
        table.add_row(vec![
            item.item.order_index.to_string(),
            item.item.label.clone(),
            item.href(),
        ]);
    }
    table
}

pub fn navigation_json(view: &NavigationView) -> Value {
    let items = match &view.items {
        RenderedNavigation::Pending => Value::Null,
        RenderedNavigation::Cms(navigation) => json!(navigation.as_ref()),
        RenderedNavigation::Fallback(links) => json!({ "fallback": links }),
    };
    json!({
        "mode": view.mode,
        "restore_enabled": view.restore_enabled,
        "notice": view.notice,
        "navigation": items,
    })
}

pub fn format_pages_text(pages: &[Page]) -> String {
    let mut out = format!("{}\n\n", format_section_heading("Pages"));
    if pages.is_empty() {
        out.push_str("No pages stored. Run `sitenav sync` first.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Id", "Slug", "Title", "Updated"]);
    for page in pages {
        table.add_row(vec![
            page.id.to_string(),
            page.slug.clone(),
            page.title.clone(),
            page.updated_at.to_rfc3339(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

pub fn format_blocks_text(slug: &str, blocks: &[ContentBlock]) -> String {
    let mut out = format!(
        "{}\n\n",
        format_section_heading(&format!("Blocks on {}", slug))
    );
    if blocks.is_empty() {
        out.push_str("No content blocks.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Index", "Id", "Type"]);
    for block in blocks {
        table.add_row(vec![
            block.order_index.to_string(),
            block.id.to_string(),
            block.block_type.clone(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    out
}
