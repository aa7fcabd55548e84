//! Bounded add / edit / delete editor for list-of-records fields.
//!
//! Records are addressed by position only. At most one record is open for
//! editing and deletes are refused while it is open, so an edit can never
//! land on an index that shifted underneath it.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::RecordEditorError;
use crate::form::FieldValue;

/// A structured record stored inside a list field.
pub trait SubRecord: Clone + Default + Serialize + DeserializeOwned {
    /// Labels of required sub-fields that are still empty.
    fn missing_required(&self) -> Vec<&'static str>;
}

#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum EditMode {
    /// Editing the record at this index.
    Edit(usize),
    /// Appending; the target index is the list length at open time.
    Append(usize),
}

impl EditMode {
    pub fn target(&self) -> usize {
        match self {
            EditMode::Edit(index) | EditMode::Append(index) => *index,
        }
    }
}

#[derive(Debug, Clone)]
struct OpenEditor<R> {
    mode: EditMode,
    draft: R,
}

#[derive(Debug, Clone)]
pub struct RecordListEditor<R: SubRecord> {
    records: Vec<R>,
    open: Option<OpenEditor<R>>,
}

impl<R: SubRecord> Default for RecordListEditor<R> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<R: SubRecord> RecordListEditor<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self {
            records,
            open: None,
        }
    }

    /// Reads records out of a list field; `Null` or an absent value is an empty list.
    pub fn from_field_value(value: Option<&FieldValue>) -> Result<Self, RecordEditorError> {
        match value {
            None | Some(FieldValue::Null) => Ok(Self::default()),
            Some(value) => serde_json::from_value::<Vec<R>>(value.to_json())
                .map(Self::new)
                .map_err(|err| RecordEditorError::Decode(err.to_string())),
        }
    }

    /// Committed records as a list field value.
    pub fn to_field_value(&self) -> Result<FieldValue, RecordEditorError> {
        serde_json::to_value(&self.records)
            .map(FieldValue::from_json)
            .map_err(|err| {
                tracing::warn!(error = %err, records = self.records.len(), "record list not encoded");
                RecordEditorError::Encode(err.to_string())
            })
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_editing(&self) -> bool {
        self.open.is_some()
    }

    pub fn mode(&self) -> Option<EditMode> {
        self.open.as_ref().map(|open| open.mode)
    }

    /// Opens the append-mode editor with default values.
    pub fn start_add(&mut self) -> Result<&mut R, RecordEditorError> {
        self.ensure_closed()?;
        let editor = self.open.insert(OpenEditor {
            mode: EditMode::Append(self.records.len()),
            draft: R::default(),
        });
        Ok(&mut editor.draft)
    }

    /// Opens the editor on a copy of the record at `index`.
    pub fn start_edit(&mut self, index: usize) -> Result<&mut R, RecordEditorError> {
        self.ensure_closed()?;
        let record = self
            .records
            .get(index)
            .cloned()
            .ok_or(RecordEditorError::OutOfRange {
                index,
                len: self.records.len(),
            })?;
        let editor = self.open.insert(OpenEditor {
            mode: EditMode::Edit(index),
            draft: record,
        });
        Ok(&mut editor.draft)
    }

    pub fn draft(&self) -> Option<&R> {
        self.open.as_ref().map(|open| &open.draft)
    }

    pub fn draft_mut(&mut self) -> Option<&mut R> {
        self.open.as_mut().map(|open| &mut open.draft)
    }

    /// Validates the open record and writes it back. Returns the index it
    /// now occupies. On failure the editor stays open with the draft intact.
    pub fn save(&mut self) -> Result<usize, RecordEditorError> {
        let open = self.open.as_ref().ok_or(RecordEditorError::NoActiveEditor)?;
        let missing = open.draft.missing_required();
        if !missing.is_empty() {
            return Err(RecordEditorError::MissingFields(
                missing.into_iter().map(str::to_string).collect(),
            ));
        }
        let Some(OpenEditor { mode, draft }) = self.open.take() else {
            return Err(RecordEditorError::NoActiveEditor);
        };
        let index = match mode {
            EditMode::Edit(index) if index < self.records.len() => {
                self.records[index] = draft;
                index
            }
            EditMode::Edit(_) | EditMode::Append(_) => {
                self.records.push(draft);
                self.records.len() - 1
            }
        };
        tracing::debug!(index, ?mode, "sub-record saved");
        Ok(index)
    }

    /// Discards the open draft without touching the list.
    pub fn cancel(&mut self) {
        self.open = None;
    }

    /// Removes the record at `index` immediately.
    pub fn delete(&mut self, index: usize) -> Result<R, RecordEditorError> {
        self.ensure_closed()?;
        if index >= self.records.len() {
            return Err(RecordEditorError::OutOfRange {
                index,
                len: self.records.len(),
            });
        }
        Ok(self.records.remove(index))
    }

    fn ensure_closed(&self) -> Result<(), RecordEditorError> {
        if self.open.is_some() {
            Err(RecordEditorError::EditorOpen)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::IntegrationConnection;

    fn link(source: &str, target: &str) -> IntegrationConnection {
        IntegrationConnection {
            source_system: source.into(),
            target_system: target.into(),
            data_objects: "Invoices".into(),
            integration_methods: vec!["api".into()],
            frequency: "daily".into(),
            ..IntegrationConnection::default()
        }
    }

    #[derive(Debug, Clone, Default, serde::Deserialize)]
    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("no wire form"))
        }
    }

    impl SubRecord for Unencodable {
        fn missing_required(&self) -> Vec<&'static str> {
            Vec::new()
        }
    }

    #[test]
    fn encoding_failure_is_reported() {
        let editor = RecordListEditor::new(vec![Unencodable]);
        assert!(matches!(
            editor.to_field_value(),
            Err(RecordEditorError::Encode(message)) if message.contains("no wire form")
        ));
        assert!(matches!(
            RecordListEditor::<Unencodable>::default().to_field_value(),
            Ok(FieldValue::List(items)) if items.is_empty()
        ));
    }

    #[test]
    fn add_appends_after_validation() {
        let mut editor: RecordListEditor<IntegrationConnection> = RecordListEditor::default();
        editor.start_add().expect("editor closed");
        assert_eq!(editor.mode(), Some(EditMode::Append(0)));
        assert!(matches!(
            editor.save(),
            Err(RecordEditorError::MissingFields(_))
        ));
        assert!(editor.is_editing());

        *editor.draft_mut().expect("open") = link("ERP", "CRM");
        assert_eq!(editor.save().expect("valid"), 0);
        assert_eq!(editor.len(), 1);
        assert!(!editor.is_editing());
    }

    #[test]
    fn edit_replaces_in_place_and_cancel_discards() {
        let mut editor = RecordListEditor::new(vec![link("ERP", "CRM"), link("HR", "Payroll")]);
        editor.start_edit(1).expect("in range").notes = Some("nightly batch".into());
        assert_eq!(editor.save().expect("valid"), 1);
        assert_eq!(editor.records()[1].notes.as_deref(), Some("nightly batch"));

        editor.start_edit(0).expect("in range").source_system = "Changed".into();
        editor.cancel();
        assert_eq!(editor.records()[0].source_system, "ERP");
    }

    #[test]
    fn only_one_editor_at_a_time() {
        let mut editor = RecordListEditor::new(vec![link("ERP", "CRM")]);
        editor.start_edit(0).expect("in range");
        assert_eq!(editor.start_add().err(), Some(RecordEditorError::EditorOpen));
        assert_eq!(editor.delete(0).err(), Some(RecordEditorError::EditorOpen));
    }

    #[test]
    fn delete_shifts_positions() {
        let mut editor = RecordListEditor::new(vec![
            link("A", "B"),
            link("C", "D"),
            link("E", "F"),
        ]);
        editor.delete(0).expect("in range");
        assert_eq!(editor.records()[0].source_system, "C");
        assert!(matches!(
            editor.start_edit(2),
            Err(RecordEditorError::OutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn converts_through_field_values() {
        let editor = RecordListEditor::new(vec![link("ERP", "CRM")]);
        let value = editor.to_field_value().expect("encodes");
        let restored =
            RecordListEditor::<IntegrationConnection>::from_field_value(Some(&value)).expect("decodes");
        assert_eq!(restored.records(), editor.records());
        assert!(RecordListEditor::<IntegrationConnection>::from_field_value(None)
            .expect("empty")
            .is_empty());
    }
}
