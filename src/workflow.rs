//! Defect editing workflow for one photo.
//!
//! Holds the defects loaded from the server, the form being filled in, and
//! the draft annotations drawn for it. Network work is never done here:
//! operations queue [`Request`]s, a worker runs them, and the results come
//! back as [`Outcome`]s through [`DefectWorkflow::apply`].

use tracing::{debug, info, warn};

use crate::annotator::AnnotatorEvent;
use crate::api::{
    AnnotationPayload, DefectApi, DefectPayload, DefectRecord, NewAnnotation, PhotoRecord,
};
use crate::catalog::{Severity, DEFECT_CATEGORIES, DEFECT_COLORS};
use crate::drawing::DrawingTool;
use crate::error::ApiError;
use crate::geometry::{draft_id, draft_index, Annotation, AnnotationGeometry};

pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const NO_ANNOTATIONS_ERROR: &str = "Please draw at least one annotation on the photo.";
const LOAD_FAILED: &str = "Failed to load defects.";

// ── Requests and outcomes ───────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    LoadPhoto {
        photo_id: i64,
    },
    LoadImage {
        photo_id: i64,
    },
    LoadDefects {
        photo_id: i64,
    },
    CreateDefect {
        photo_id: i64,
        payload: DefectPayload,
    },
    UpdateDefect {
        photo_id: i64,
        defect_id: i64,
        payload: DefectPayload,
    },
    DeleteDefect {
        photo_id: i64,
        defect_id: i64,
    },
    UpdateAnnotation {
        photo_id: i64,
        annotation_id: i64,
        geometry: AnnotationGeometry,
    },
    DeleteAnnotation {
        photo_id: i64,
        annotation_id: i64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveAction {
    CreateDefect,
    UpdateDefect,
    DeleteDefect { defect_id: i64 },
    UpdateAnnotation,
    DeleteAnnotation,
}

impl SaveAction {
    fn failure_message(&self) -> &'static str {
        match self {
            SaveAction::CreateDefect => "Failed to create defect.",
            SaveAction::UpdateDefect => "Failed to update defect.",
            SaveAction::DeleteDefect { .. } => "Failed to delete defect.",
            SaveAction::UpdateAnnotation => "Failed to update annotation.",
            SaveAction::DeleteAnnotation => "Failed to delete annotation.",
        }
    }

    fn is_annotation_edit(&self) -> bool {
        matches!(
            self,
            SaveAction::UpdateAnnotation | SaveAction::DeleteAnnotation
        )
    }
}

#[derive(Debug)]
pub enum Outcome {
    Photo(Result<PhotoRecord, ApiError>),
    Image(Result<Vec<u8>, ApiError>),
    Defects(Result<Vec<DefectRecord>, ApiError>),
    Saved {
        action: SaveAction,
        result: Result<(), ApiError>,
    },
}

/// Run one request against the API. A successful mutation is followed by a
/// fresh defect list so the caller always ends up with server-confirmed ids.
pub fn execute(api: &dyn DefectApi, request: Request) -> Vec<Outcome> {
    let (photo_id, action, result) = match request {
        Request::LoadPhoto { photo_id } => return vec![Outcome::Photo(api.get_photo(photo_id))],
        Request::LoadImage { photo_id } => {
            return vec![Outcome::Image(api.get_photo_image(photo_id))]
        }
        Request::LoadDefects { photo_id } => {
            return vec![Outcome::Defects(api.get_defects_by_photo(photo_id))]
        }
        Request::CreateDefect { photo_id, payload } => (
            photo_id,
            SaveAction::CreateDefect,
            api.create_defect(photo_id, &payload).map(|defect| {
                info!(
                    "Created defect #{} with {} annotation(s)",
                    defect.id,
                    defect.annotations.len()
                );
            }),
        ),
        Request::UpdateDefect {
            photo_id,
            defect_id,
            payload,
        } => (
            photo_id,
            SaveAction::UpdateDefect,
            api.update_defect(defect_id, &payload)
                .map(|_| info!("Updated defect #{}", defect_id)),
        ),
        Request::DeleteDefect {
            photo_id,
            defect_id,
        } => (
            photo_id,
            SaveAction::DeleteDefect { defect_id },
            api.delete_defect(defect_id)
                .map(|_| info!("Deleted defect #{}", defect_id)),
        ),
        Request::UpdateAnnotation {
            photo_id,
            annotation_id,
            geometry,
        } => {
            let payload = AnnotationPayload {
                geometry: Some(geometry),
                ..Default::default()
            };
            (
                photo_id,
                SaveAction::UpdateAnnotation,
                api.update_annotation(annotation_id, &payload)
                    .map(|_| info!("Updated annotation #{}", annotation_id)),
            )
        }
        Request::DeleteAnnotation {
            photo_id,
            annotation_id,
        } => (
            photo_id,
            SaveAction::DeleteAnnotation,
            api.delete_annotation(annotation_id)
                .map(|_| info!("Deleted annotation #{}", annotation_id)),
        ),
    };

    match result {
        Ok(()) => vec![
            Outcome::Saved {
                action,
                result: Ok(()),
            },
            Outcome::Defects(api.get_defects_by_photo(photo_id)),
        ],
        Err(e) => vec![Outcome::Saved {
            action,
            result: Err(e),
        }],
    }
}

fn describe(error: &ApiError, fallback: &str) -> String {
    let message = error.to_string();
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

// ── Form ────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct DefectForm {
    pub category_id: i64,
    pub severity: Severity,
    pub description: String,
    pub color: String,
    pub drafts: Vec<AnnotationGeometry>,
}

impl Default for DefectForm {
    fn default() -> Self {
        Self {
            category_id: DEFECT_CATEGORIES[0].id,
            severity: Severity::default(),
            description: String::new(),
            color: DEFECT_COLORS[0].value.to_string(),
            drafts: Vec::new(),
        }
    }
}

impl DefectForm {
    /// Pre-fill from an existing defect; category and color come from its
    /// first annotation.
    pub fn from_defect(defect: &DefectRecord) -> Self {
        let first = defect.annotations.first();
        Self {
            category_id: first
                .map(|a| a.category_id)
                .unwrap_or(DEFECT_CATEGORIES[0].id),
            severity: Severity::parse(&defect.severity).unwrap_or_default(),
            description: defect.description.clone().unwrap_or_default(),
            color: first
                .and_then(|a| a.color.clone())
                .unwrap_or_else(|| DEFECT_COLORS[0].value.to_string()),
            drafts: Vec::new(),
        }
    }

    fn description_value(&self) -> Option<String> {
        let trimmed = self.description.trim();
        (!trimmed.is_empty()).then(|| trimmed.chars().take(MAX_DESCRIPTION_LEN).collect())
    }

    pub fn payload(&self) -> DefectPayload {
        DefectPayload {
            category_id: self.category_id,
            severity: self.severity,
            description: self.description_value(),
            color: Some(self.color.clone()),
            annotations: self
                .drafts
                .iter()
                .map(|geometry| NewAnnotation {
                    category_id: self.category_id,
                    geometry: geometry.clone(),
                    color: Some(self.color.clone()),
                })
                .collect(),
        }
    }

    fn draft_annotations(&self, defect_id: i64) -> impl Iterator<Item = Annotation> + '_ {
        self.drafts
            .iter()
            .enumerate()
            .map(move |(i, geometry)| Annotation {
                id: draft_id(i),
                defect_id,
                category_id: self.category_id,
                geometry: geometry.clone(),
                color: Some(self.color.clone()),
                created_at: None,
            })
    }
}

// ── Workflow ────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Browse,
    Creating,
    Editing {
        defect_id: i64,
    },
}

pub struct DefectWorkflow {
    photo_id: i64,
    photo: Option<PhotoRecord>,
    defects: Vec<DefectRecord>,
    pub form: DefectForm,
    mode: Mode,
    drawing_mode: bool,
    move_mode: bool,
    current_tool: DrawingTool,
    selected: Option<i64>,
    previewing: Option<i64>,
    deleting: Option<i64>,
    is_loading: bool,
    is_saving: bool,
    load_error: Option<String>,
    action_error: Option<String>,
    outbox: Vec<Request>,
}

impl DefectWorkflow {
    pub fn new(photo_id: i64) -> Self {
        Self {
            photo_id,
            photo: None,
            defects: Vec::new(),
            form: DefectForm::default(),
            mode: Mode::Browse,
            drawing_mode: false,
            move_mode: false,
            current_tool: DrawingTool::Select,
            selected: None,
            previewing: None,
            deleting: None,
            is_loading: true,
            is_saving: false,
            load_error: None,
            action_error: None,
            outbox: vec![
                Request::LoadDefects { photo_id },
                Request::LoadPhoto { photo_id },
                Request::LoadImage { photo_id },
            ],
        }
    }

    pub fn take_requests(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.outbox)
    }

    pub fn photo_id(&self) -> i64 {
        self.photo_id
    }

    pub fn photo(&self) -> Option<&PhotoRecord> {
        self.photo.as_ref()
    }

    pub fn defects(&self) -> &[DefectRecord] {
        &self.defects
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn editing_defect(&self) -> Option<&DefectRecord> {
        match self.mode {
            Mode::Editing { defect_id } => self.find_defect(defect_id),
            _ => None,
        }
    }

    pub fn previewing(&self) -> Option<&DefectRecord> {
        self.previewing.and_then(|id| self.find_defect(id))
    }

    pub fn deleting(&self) -> Option<&DefectRecord> {
        self.deleting.and_then(|id| self.find_defect(id))
    }

    pub fn is_drawing_mode(&self) -> bool {
        self.drawing_mode
    }

    pub fn is_move_mode(&self) -> bool {
        self.move_mode
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_saving(&self) -> bool {
        self.is_saving
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn action_error(&self) -> Option<&str> {
        self.action_error.as_deref()
    }

    pub fn selected(&self) -> Option<i64> {
        self.selected
    }

    pub fn current_tool(&self) -> DrawingTool {
        self.current_tool
    }

    fn find_defect(&self, defect_id: i64) -> Option<&DefectRecord> {
        self.defects.iter().find(|d| d.id == defect_id)
    }

    // ── Canvas wiring ───────────────────────────────────────────────────────

    pub fn accepts_new_shapes(&self) -> bool {
        self.mode == Mode::Creating || self.drawing_mode
    }

    /// Tool the canvas should use; outside of drawing it is always select.
    pub fn canvas_tool(&self) -> DrawingTool {
        if self.accepts_new_shapes() {
            self.current_tool
        } else {
            DrawingTool::Select
        }
    }

    pub fn enable_move(&self) -> bool {
        !self.accepts_new_shapes() && self.move_mode
    }

    /// Annotations the canvas shows: drafts while creating, the edited
    /// defect plus drafts while editing, otherwise the previewed defect or
    /// every defect on the photo.
    pub fn displayed_annotations(&self) -> Vec<Annotation> {
        match self.mode {
            Mode::Creating => self.form.draft_annotations(-1).collect(),
            Mode::Editing { defect_id } => self
                .find_defect(defect_id)
                .map(|d| d.annotations.clone())
                .unwrap_or_default()
                .into_iter()
                .chain(self.form.draft_annotations(defect_id))
                .collect(),
            Mode::Browse => match self.previewing() {
                Some(defect) => defect.annotations.clone(),
                None => self
                    .defects
                    .iter()
                    .flat_map(|d| d.annotations.iter().cloned())
                    .collect(),
            },
        }
    }

    pub fn handle_event(&mut self, event: AnnotatorEvent) {
        match event {
            AnnotatorEvent::Created(geometry) => {
                if !self.accepts_new_shapes() {
                    debug!("Ignoring {} drawn outside drawing mode", geometry.kind_name());
                    return;
                }
                self.form.drafts.push(geometry);
                self.current_tool = DrawingTool::Select;
            }
            AnnotatorEvent::Selected(id) => self.selected = id,
            AnnotatorEvent::Updated { id, geometry } => match draft_index(id) {
                Some(index) => {
                    if let Some(slot) = self.form.drafts.get_mut(index) {
                        *slot = geometry;
                    }
                }
                None => {
                    self.replace_local_geometry(id, &geometry);
                    self.action_error = None;
                    self.outbox.push(Request::UpdateAnnotation {
                        photo_id: self.photo_id,
                        annotation_id: id,
                        geometry,
                    });
                }
            },
            AnnotatorEvent::Deleted(id) => {
                self.selected = None;
                match draft_index(id) {
                    Some(index) if index < self.form.drafts.len() => {
                        self.form.drafts.remove(index);
                    }
                    Some(_) => {}
                    None => {
                        self.action_error = None;
                        self.outbox.push(Request::DeleteAnnotation {
                            photo_id: self.photo_id,
                            annotation_id: id,
                        });
                    }
                }
            }
        }
    }

    /// Show a moved annotation in its new place until the reload confirms it.
    fn replace_local_geometry(&mut self, annotation_id: i64, geometry: &AnnotationGeometry) {
        let annotation = self
            .defects
            .iter_mut()
            .flat_map(|d| d.annotations.iter_mut())
            .find(|a| a.id == annotation_id);
        if let Some(annotation) = annotation {
            annotation.geometry = geometry.clone();
        }
    }

    // ── Operations ──────────────────────────────────────────────────────────

    pub fn reload(&mut self) {
        self.is_loading = true;
        self.load_error = None;
        self.outbox.push(Request::LoadDefects {
            photo_id: self.photo_id,
        });
    }

    pub fn set_tool(&mut self, tool: DrawingTool) {
        self.current_tool = tool;
    }

    fn reset_form(&mut self) {
        self.form = DefectForm::default();
        self.current_tool = DrawingTool::Select;
        self.selected = None;
    }

    pub fn open_create(&mut self) {
        self.reset_form();
        self.action_error = None;
        self.previewing = None;
        self.deleting = None;
        self.drawing_mode = false;
        self.move_mode = false;
        self.mode = Mode::Creating;
        self.current_tool = DrawingTool::Rect;
    }

    pub fn cancel_create(&mut self) {
        self.mode = Mode::Browse;
        self.reset_form();
    }

    pub fn open_edit(&mut self, defect_id: i64) {
        let Some(defect) = self.find_defect(defect_id) else {
            warn!("Cannot edit unknown defect #{}", defect_id);
            return;
        };
        self.form = DefectForm::from_defect(defect);
        self.action_error = None;
        self.previewing = None;
        self.drawing_mode = false;
        self.move_mode = false;
        self.selected = None;
        self.current_tool = DrawingTool::Select;
        self.mode = Mode::Editing { defect_id };
    }

    pub fn close_edit(&mut self) {
        self.mode = Mode::Browse;
        self.drawing_mode = false;
        self.move_mode = false;
        self.reset_form();
    }

    /// True when the form or its drafts differ from the defect being edited.
    pub fn has_unsaved_changes(&self) -> bool {
        self.editing_defect()
            .is_some_and(|defect| self.form != DefectForm::from_defect(defect))
    }

    /// Save when anything changed, otherwise just leave edit mode.
    pub fn finish_edit(&mut self) {
        if self.has_unsaved_changes() {
            self.update();
        } else {
            self.close_edit();
        }
    }

    pub fn toggle_drawing(&mut self) {
        if !matches!(self.mode, Mode::Editing { .. }) {
            return;
        }
        self.drawing_mode = !self.drawing_mode;
        self.move_mode = false;
        self.current_tool = if self.drawing_mode {
            DrawingTool::Rect
        } else {
            DrawingTool::Select
        };
    }

    pub fn toggle_move(&mut self) {
        if self.mode == Mode::Creating {
            return;
        }
        self.move_mode = !self.move_mode;
        self.drawing_mode = false;
        self.current_tool = DrawingTool::Select;
    }

    pub fn toggle_preview(&mut self, defect_id: i64) {
        self.previewing = if self.previewing == Some(defect_id) {
            None
        } else {
            Some(defect_id)
        };
        self.selected = None;
    }

    pub fn show_all(&mut self) {
        self.previewing = None;
    }

    pub fn request_delete(&mut self, defect_id: i64) {
        self.deleting = Some(defect_id);
    }

    pub fn cancel_delete(&mut self) {
        self.deleting = None;
    }

    pub fn create(&mut self) {
        if self.is_saving || self.mode != Mode::Creating {
            return;
        }
        if self.form.drafts.is_empty() {
            self.action_error = Some(NO_ANNOTATIONS_ERROR.to_string());
            return;
        }
        self.is_saving = true;
        self.action_error = None;
        let payload = self.form.payload();
        debug!(
            "Creating defect with {} annotation(s)",
            payload.annotations.len()
        );
        self.outbox.push(Request::CreateDefect {
            photo_id: self.photo_id,
            payload,
        });
    }

    pub fn update(&mut self) {
        let Mode::Editing { defect_id } = self.mode else {
            return;
        };
        if self.is_saving {
            return;
        }
        self.is_saving = true;
        self.action_error = None;
        self.outbox.push(Request::UpdateDefect {
            photo_id: self.photo_id,
            defect_id,
            payload: self.form.payload(),
        });
    }

    pub fn confirm_delete(&mut self) {
        let Some(defect_id) = self.deleting else {
            return;
        };
        if self.is_saving {
            return;
        }
        self.is_saving = true;
        self.action_error = None;
        self.outbox.push(Request::DeleteDefect {
            photo_id: self.photo_id,
            defect_id,
        });
    }

    // ── Outcomes ────────────────────────────────────────────────────────────

    pub fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Photo(Ok(photo)) => self.photo = Some(photo),
            Outcome::Photo(Err(e)) => {
                warn!("Failed to load photo #{}: {}", self.photo_id, e);
                self.photo = None;
            }
            // The canvas owns the image.
            Outcome::Image(_) => {}
            Outcome::Defects(Ok(defects)) => {
                self.is_loading = false;
                self.load_error = None;
                self.defects = defects;
                self.prune_stale_references();
            }
            Outcome::Defects(Err(e)) => {
                self.is_loading = false;
                self.load_error = Some(describe(&e, LOAD_FAILED));
            }
            Outcome::Saved { action, result } => self.apply_saved(action, result),
        }
    }

    fn apply_saved(&mut self, action: SaveAction, result: Result<(), ApiError>) {
        if !action.is_annotation_edit() {
            self.is_saving = false;
        }
        match result {
            Ok(()) => {
                self.is_loading = true;
                match action {
                    SaveAction::CreateDefect => {
                        self.mode = Mode::Browse;
                        self.reset_form();
                    }
                    SaveAction::UpdateDefect => self.close_edit(),
                    SaveAction::DeleteDefect { defect_id } => {
                        self.deleting = None;
                        if self.previewing == Some(defect_id) {
                            self.previewing = None;
                        }
                        if self.mode == (Mode::Editing { defect_id }) {
                            self.close_edit();
                        }
                    }
                    SaveAction::UpdateAnnotation | SaveAction::DeleteAnnotation => {}
                }
            }
            Err(e) => {
                match &e {
                    ApiError::Status { status, .. } => {
                        warn!("{:?} failed with HTTP {}: {}", action, status, e)
                    }
                    _ => warn!("{:?} failed: {}", action, e),
                }
                self.action_error = Some(describe(&e, action.failure_message()));
                if action.is_annotation_edit() {
                    // Local geometry may have been moved optimistically.
                    self.reload();
                }
            }
        }
    }

    /// Drop references to defects or annotations that no longer exist.
    fn prune_stale_references(&mut self) {
        if let Some(id) = self.previewing {
            if self.find_defect(id).is_none() {
                self.previewing = None;
            }
        }
        if let Mode::Editing { defect_id } = self.mode {
            if self.find_defect(defect_id).is_none() {
                warn!("Defect #{} disappeared while editing", defect_id);
                self.close_edit();
            }
        }
        if let Some(id) = self.selected {
            if !self.displayed_annotations().iter().any(|a| a.id == id) {
                self.selected = None;
            }
        }
    }
}
