use chrono::{DateTime, Local, NaiveDateTime};
use egui::{Color32, RichText, Sense, Stroke, StrokeKind};
use egui_extras::{Column, TableBuilder};
use image::DynamicImage;
use tracing::{error, info, warn};

use crate::annotator::{CanvasProps, ImageAnnotator};
use crate::api::HttpDefectApi;
use crate::catalog::{
    category_name, format_enum_label, parse_hex_color, Severity, DEFECT_CATEGORIES,
    DEFECT_COLORS,
};
use crate::config::AppConfig;
use crate::drawing::DrawingTool;
use crate::export;
use crate::worker::ApiWorker;
use crate::workflow::{DefectWorkflow, Mode, Outcome, MAX_DESCRIPTION_LEN};

const MISSING: &str = "—";

/// `created_at` for display in local time. Unparsable values are shown as
/// they came.
pub fn format_timestamp(value: Option<&str>) -> String {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return MISSING.to_string();
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string();
    }
    // Naive timestamps from the server are UTC.
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => naive
            .and_utc()
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

fn severity_color(severity: &str) -> Color32 {
    match Severity::parse(severity) {
        Some(Severity::Low) => Color32::from_rgb(34, 197, 94),
        Some(Severity::Medium) => Color32::from_rgb(234, 179, 8),
        Some(Severity::High) => Color32::from_rgb(249, 115, 22),
        Some(Severity::Critical) => Color32::from_rgb(239, 68, 68),
        None => Color32::GRAY,
    }
}

/// A row of the defect list, captured before any button can mutate the
/// workflow.
struct DefectRow {
    id: i64,
    category: &'static str,
    severity: String,
    description: String,
    created: String,
    annotation_count: usize,
}

enum ListAction {
    Preview(i64),
    Edit(i64),
    Delete(i64),
}

pub struct QcApp {
    workflow: DefectWorkflow,
    annotator: ImageAnnotator,
    worker: ApiWorker,
    photo_image: Option<DynamicImage>,
    image_error: Option<String>,
    status: Option<String>,
    readonly: bool,
}

impl QcApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: &AppConfig, photo_id: i64, readonly: bool) -> Self {
        let api = HttpDefectApi::new(&config.api_base_url, config.timeout());
        let ctx = cc.egui_ctx.clone();
        let worker = ApiWorker::spawn(Box::new(api), move || ctx.request_repaint());
        info!(
            "Opening photo #{} against {}{}",
            photo_id,
            config.api_base_url,
            if readonly { " (read-only)" } else { "" }
        );

        let mut app = Self {
            workflow: DefectWorkflow::new(photo_id),
            annotator: ImageAnnotator::new(config.max_canvas_width),
            worker,
            photo_image: None,
            image_error: None,
            status: None,
            readonly,
        };
        app.flush_requests();
        app
    }

    fn flush_requests(&mut self) {
        for request in self.workflow.take_requests() {
            self.worker.submit(request);
        }
    }

    fn apply_outcomes(&mut self, ctx: &egui::Context) {
        for outcome in self.worker.drain() {
            match outcome {
                Outcome::Image(Ok(bytes)) => match image::load_from_memory(&bytes) {
                    Ok(img) => {
                        self.annotator.set_image(ctx, &img);
                        self.photo_image = Some(img);
                        self.image_error = None;
                    }
                    Err(e) => {
                        warn!("Failed to decode photo: {}", e);
                        self.annotator.clear_image();
                        self.photo_image = None;
                        self.image_error = Some(format!("Failed to decode photo: {e}"));
                    }
                },
                Outcome::Image(Err(e)) => {
                    warn!("Failed to load photo image: {}", e);
                    self.annotator.clear_image();
                    self.photo_image = None;
                    self.image_error = Some(e.to_string());
                }
                other => self.workflow.apply(other),
            }
        }
    }

    fn export(&mut self) {
        let Some(ref photo) = self.photo_image else {
            self.status = Some("Nothing to export: the photo is not loaded.".to_string());
            return;
        };
        let annotations = self.workflow.displayed_annotations();
        match export::save_with_dialog(photo, &annotations, self.workflow.photo_id()) {
            Ok(Some(path)) => self.status = Some(format!("Exported to {}", path.display())),
            Ok(None) => {}
            Err(e) => {
                error!("Export failed: {}", e);
                self.status = Some(format!("Export failed: {e}"));
            }
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let (save, escape) = ctx.input(|i| {
            (
                i.modifiers.command && i.key_pressed(egui::Key::S),
                i.key_pressed(egui::Key::Escape),
            )
        });
        if save {
            self.export();
        }
        if escape {
            match self.workflow.mode() {
                Mode::Creating => self.workflow.cancel_create(),
                Mode::Editing { .. } => self.workflow.close_edit(),
                Mode::Browse => self.workflow.cancel_delete(),
            }
        }
    }

    // ── Panels ──────────────────────────────────────────────────────────────

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let title = match self.workflow.photo().and_then(|p| p.test_id) {
                Some(test_id) => format!("Photo #{} · Test #{}", self.workflow.photo_id(), test_id),
                None => format!("Photo #{}", self.workflow.photo_id()),
            };
            ui.heading(title);
            ui.separator();

            if self.workflow.accepts_new_shapes() {
                let mut tool = self.workflow.current_tool();
                for candidate in DrawingTool::TOOLBAR {
                    ui.selectable_value(&mut tool, candidate, candidate.label());
                }
                if tool != self.workflow.current_tool() {
                    self.workflow.set_tool(tool);
                }
                ui.separator();
            }

            if matches!(self.workflow.mode(), Mode::Editing { .. }) {
                let saving = self.workflow.is_saving();
                let label = if self.workflow.has_unsaved_changes() { "Save" } else { "Done" };
                if ui.add_enabled(!saving, egui::Button::new(label)).clicked() {
                    self.workflow.finish_edit();
                }
            }
            if !self.readonly && self.workflow.mode() != Mode::Creating {
                let label = if self.workflow.is_move_mode() { "✋ Moving" } else { "✋ Move" };
                if ui.selectable_label(self.workflow.is_move_mode(), label).clicked() {
                    self.workflow.toggle_move();
                }
            }
            if self.workflow.previewing().is_some() && ui.button("Show all").clicked() {
                self.workflow.show_all();
            }
            if ui.button("⟳ Reload").clicked() {
                self.workflow.reload();
            }
            if ui
                .add_enabled(self.photo_image.is_some(), egui::Button::new("Export PNG"))
                .on_hover_text("Ctrl+S")
                .clicked()
            {
                self.export();
            }
            if self.workflow.is_loading() {
                ui.spinner();
            }
        });
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        if let Some(err) = self.workflow.action_error() {
            ui.colored_label(Color32::from_rgb(220, 38, 38), err);
            ui.separator();
        }
        match self.workflow.mode() {
            Mode::Creating => {
                ui.heading("New defect");
                self.defect_form(ui);
                ui.horizontal(|ui| {
                    let saving = self.workflow.is_saving();
                    let label = if saving { "Saving…" } else { "Create defect" };
                    if ui.add_enabled(!saving, egui::Button::new(label)).clicked() {
                        self.workflow.create();
                    }
                    if ui.button("Cancel").clicked() {
                        self.workflow.cancel_create();
                    }
                });
            }
            Mode::Editing { defect_id } => {
                ui.heading(format!("Edit defect #{defect_id}"));
                if let Some(defect) = self.workflow.editing_defect() {
                    ui.small(format!(
                        "{} saved annotation(s) · created {}",
                        defect.annotations.len(),
                        format_timestamp(defect.created_at.as_deref())
                    ));
                }
                self.defect_form(ui);
                ui.horizontal(|ui| {
                    let drawing = self.workflow.is_drawing_mode();
                    if ui
                        .selectable_label(drawing, if drawing { "✏ Drawing" } else { "✏ Draw" })
                        .clicked()
                    {
                        self.workflow.toggle_drawing();
                    }
                    let saving = self.workflow.is_saving();
                    let label = if saving { "Saving…" } else { "Save" };
                    if ui.add_enabled(!saving, egui::Button::new(label)).clicked() {
                        self.workflow.update();
                    }
                    if ui.button("Cancel").clicked() {
                        self.workflow.close_edit();
                    }
                });
            }
            Mode::Browse => {
                ui.horizontal(|ui| {
                    ui.heading(format!("Defects ({})", self.workflow.defects().len()));
                    if !self.readonly && ui.button("+ Add defect").clicked() {
                        self.workflow.open_create();
                    }
                });
                if let Some(err) = self.workflow.load_error() {
                    ui.colored_label(Color32::from_rgb(220, 38, 38), err);
                }
                self.defect_list(ui);
            }
        }
    }

    fn defect_form(&mut self, ui: &mut egui::Ui) {
        let form = &mut self.workflow.form;
        egui::Grid::new("defect_form")
            .num_columns(2)
            .spacing([8.0, 6.0])
            .show(ui, |ui| {
                ui.label("Category");
                egui::ComboBox::from_id_salt("category")
                    .selected_text(category_name(form.category_id))
                    .show_ui(ui, |ui| {
                        for category in DEFECT_CATEGORIES {
                            ui.selectable_value(&mut form.category_id, category.id, category.name);
                        }
                    });
                ui.end_row();

                ui.label("Severity");
                egui::ComboBox::from_id_salt("severity")
                    .selected_text(format_enum_label(form.severity.as_str()))
                    .show_ui(ui, |ui| {
                        for severity in Severity::ALL {
                            ui.selectable_value(
                                &mut form.severity,
                                severity,
                                format_enum_label(severity.as_str()),
                            );
                        }
                    });
                ui.end_row();

                ui.label("Color");
                ui.horizontal(|ui| {
                    for swatch in DEFECT_COLORS {
                        let fill = parse_hex_color(swatch.value).unwrap_or(Color32::GRAY);
                        let (rect, response) =
                            ui.allocate_exact_size(egui::vec2(20.0, 20.0), Sense::click());
                        ui.painter().rect_filled(rect, 4.0, fill);
                        if form.color == swatch.value {
                            ui.painter().rect_stroke(
                                rect.expand(2.0),
                                5.0,
                                Stroke::new(2.0, ui.visuals().strong_text_color()),
                                StrokeKind::Outside,
                            );
                        }
                        if response.on_hover_text(swatch.label).clicked() {
                            form.color = swatch.value.to_string();
                        }
                    }
                });
                ui.end_row();
            });

        ui.label("Description");
        ui.add(
            egui::TextEdit::multiline(&mut form.description)
                .char_limit(MAX_DESCRIPTION_LEN)
                .desired_rows(3)
                .hint_text("Optional"),
        );
        ui.small(format!(
            "{}/{}",
            form.description.chars().count(),
            MAX_DESCRIPTION_LEN
        ));

        let count = form.drafts.len();
        ui.label(match count {
            0 => "Draw on the photo to mark the defect.".to_string(),
            1 => "1 new annotation".to_string(),
            n => format!("{n} new annotations"),
        });
        ui.separator();
    }

    fn defect_list(&mut self, ui: &mut egui::Ui) {
        let rows: Vec<DefectRow> = self
            .workflow
            .defects()
            .iter()
            .map(|d| DefectRow {
                id: d.id,
                category: d
                    .annotations
                    .first()
                    .map(|a| category_name(a.category_id))
                    .unwrap_or("Unknown"),
                severity: d.severity.clone(),
                description: d.description.clone().unwrap_or_else(|| MISSING.to_string()),
                created: format_timestamp(d.created_at.as_deref()),
                annotation_count: d.annotations.len(),
            })
            .collect();
        if rows.is_empty() {
            if !self.workflow.is_loading() {
                ui.label("No defects recorded for this photo.");
            }
            return;
        }

        let previewing = self.workflow.previewing().map(|d| d.id);
        let readonly = self.readonly;
        let mut action = None;
        TableBuilder::new(ui)
            .striped(true)
            .column(Column::auto())
            .column(Column::remainder().at_least(140.0).clip(true))
            .column(Column::auto())
            .header(20.0, |mut header| {
                header.col(|ui| {
                    ui.strong("#");
                });
                header.col(|ui| {
                    ui.strong("Defect");
                });
                header.col(|ui| {
                    ui.strong("");
                });
            })
            .body(|mut body| {
                for row in &rows {
                    body.row(56.0, |mut table_row| {
                        table_row.col(|ui| {
                            ui.label(row.id.to_string());
                        });
                        table_row.col(|ui| {
                            ui.vertical(|ui| {
                                ui.horizontal(|ui| {
                                    ui.strong(row.category);
                                    ui.colored_label(
                                        severity_color(&row.severity),
                                        format_enum_label(&row.severity),
                                    );
                                    ui.small(format!("{} ann.", row.annotation_count));
                                });
                                ui.label(&row.description);
                                ui.small(&row.created);
                            });
                        });
                        table_row.col(|ui| {
                            ui.horizontal(|ui| {
                                let eye = if previewing == Some(row.id) { "Hide" } else { "Preview" };
                                if ui.small_button(eye).clicked() {
                                    action = Some(ListAction::Preview(row.id));
                                }
                                if !readonly {
                                    if ui.small_button("Edit").clicked() {
                                        action = Some(ListAction::Edit(row.id));
                                    }
                                    if ui.small_button("Delete").clicked() {
                                        action = Some(ListAction::Delete(row.id));
                                    }
                                }
                            });
                        });
                    });
                }
            });

        match action {
            Some(ListAction::Preview(id)) => self.workflow.toggle_preview(id),
            Some(ListAction::Edit(id)) => self.workflow.open_edit(id),
            Some(ListAction::Delete(id)) => self.workflow.request_delete(id),
            None => {}
        }
    }

    fn confirm_delete_window(&mut self, ctx: &egui::Context) {
        let Some(defect) = self.workflow.deleting() else {
            return;
        };
        let prompt = format!(
            "Delete defect #{} and its {} annotation(s)? This cannot be undone.",
            defect.id,
            defect.annotations.len()
        );
        let saving = self.workflow.is_saving();
        let mut confirm = false;
        let mut cancel = false;
        egui::Window::new("Delete defect")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(prompt);
                ui.horizontal(|ui| {
                    let label = if saving { "Deleting…" } else { "Delete" };
                    confirm = ui
                        .add_enabled(
                            !saving,
                            egui::Button::new(RichText::new(label).color(Color32::WHITE))
                                .fill(Color32::from_rgb(220, 38, 38)),
                        )
                        .clicked();
                    cancel = ui.button("Cancel").clicked();
                });
            });
        if confirm {
            self.workflow.confirm_delete();
        } else if cancel {
            self.workflow.cancel_delete();
        }
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        if let Some(ref err) = self.image_error {
            ui.colored_label(Color32::from_rgb(220, 38, 38), format!("Photo unavailable: {err}"));
        }
        if let Some(defect) = self.workflow.previewing() {
            ui.label(format!(
                "Previewing defect #{} ({} annotation(s))",
                defect.id,
                defect.annotations.len()
            ));
        }

        let annotations = self.workflow.displayed_annotations();
        let props = CanvasProps {
            annotations: &annotations,
            tool: self.workflow.canvas_tool(),
            selected: self.workflow.selected(),
            readonly: self.readonly,
            enable_move: self.workflow.enable_move(),
        };
        let events = egui::ScrollArea::both()
            .show(ui, |ui| self.annotator.show(ui, &props))
            .inner;
        for event in events {
            self.workflow.handle_event(event);
        }
    }
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for QcApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.apply_outcomes(ctx);
        self.handle_shortcuts(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));

        if let Some(status) = self.status.clone() {
            egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(status);
                    if ui.small_button("✕").clicked() {
                        self.status = None;
                    }
                });
            });
        }

        egui::SidePanel::right("defects")
            .resizable(true)
            .default_width(360.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.side_panel(ui));
            });

        egui::CentralPanel::default().show(ctx, |ui| self.canvas(ui));

        self.confirm_delete_window(ctx);
        self.flush_requests();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_timestamp() {
        assert_eq!(format_timestamp(None), "—");
        assert_eq!(format_timestamp(Some("  ")), "—");
    }

    #[test]
    fn test_unparsable_timestamp_is_shown_raw() {
        assert_eq!(format_timestamp(Some("yesterday")), "yesterday");
    }

    #[test]
    fn test_parsed_timestamps_are_formatted() {
        for raw in ["2025-03-01T10:15:00Z", "2025-03-01T10:15:00.123456"] {
            let shown = format_timestamp(Some(raw));
            assert_ne!(shown, raw);
            assert_eq!(shown.len(), "2025-03-01 10:15".len());
        }
    }

    #[test]
    fn test_severity_colors() {
        assert_eq!(severity_color("critical"), Color32::from_rgb(239, 68, 68));
        assert_eq!(severity_color("nope"), Color32::GRAY);
    }
}
