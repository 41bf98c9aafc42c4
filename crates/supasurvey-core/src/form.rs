//! Response forms.
//!
//! [`bind`] turns a [`QuestionSet`] plus its submitted instances into a
//! [`BoundFormSet`]: one [`ResponseForm`] per instance, each holding a typed
//! [`Field`] per answer. Forms validate, render through a
//! [`FieldRenderer`], and score their own data.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, SurveyError, ValidationFailure};
use crate::field::{self, Field, FieldArgs, FieldKind, OTHER_CHOICE};
use crate::model::{Answer, AnswerType, QuestionSet};
use crate::traits::{Attrs, FieldRenderer, FileChanges, FileStorage};
use crate::value::{Cleaned, FormData, RawValue};

/// Key of an answer's field within submitted data.
pub fn field_key(questionset: u32, answer: u32) -> String {
    format!("questionset_{questionset}__answer_{answer}")
}

/// Key holding the free text of an open choice.
pub fn other_key(key: &str) -> String {
    format!("{key}_other")
}

/// What to do with an answer whose type has no field builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownTypePolicy {
    /// Fail the bind.
    Strict,
    /// Omit the field and record a [`Diagnostic`].
    #[default]
    Lenient,
}

impl fmt::Display for UnknownTypePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnknownTypePolicy::Strict => "strict",
            UnknownTypePolicy::Lenient => "lenient",
        })
    }
}

impl FromStr for UnknownTypePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(UnknownTypePolicy::Strict),
            "lenient" => Ok(UnknownTypePolicy::Lenient),
            other => Err(format!("unknown type policy {other:?}, expected strict or lenient")),
        }
    }
}

/// A field left out of a form under the lenient policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub key: String,
    pub answer_type: Option<AnswerType>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Outcome of validating one form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormValidation {
    pub cleaned: IndexMap<String, Cleaned>,
    pub errors: IndexMap<String, ValidationFailure>,
}

impl FormValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// One instance of a question set bound to its data.
#[derive(Debug, Clone)]
pub struct ResponseForm {
    questionset: u32,
    prefix: Option<String>,
    fields: IndexMap<String, Field>,
    data: FormData,
    diagnostics: Vec<Diagnostic>,
}

impl ResponseForm {
    /// Build a form with a field for every answer of `questionset`.
    pub fn new(
        questionset: &QuestionSet,
        data: FormData,
        policy: UnknownTypePolicy,
    ) -> Result<Self, SurveyError> {
        let mut form = Self {
            questionset: questionset.id,
            prefix: None,
            fields: IndexMap::new(),
            data,
            diagnostics: Vec::new(),
        };
        for answer in questionset.answers.values() {
            form.add_field(answer, policy)?;
        }
        Ok(form)
    }

    /// Name prefix used when rendering, for repeated instances.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Build and register the field for `answer`.
    ///
    /// Returns `Ok(None)` when the field was omitted under the lenient
    /// policy.
    pub fn add_field(
        &mut self,
        answer: &Answer,
        policy: UnknownTypePolicy,
    ) -> Result<Option<&Field>, SurveyError> {
        let key = field_key(self.questionset, answer.id);

        let Some(answer_type) = answer.kind else {
            if policy == UnknownTypePolicy::Strict {
                return Err(SurveyError::MissingAnswerType { key });
            }
            self.omit(key, None, "answer has no type".into());
            return Ok(None);
        };

        let args = FieldArgs::from_answer(answer).map_err(|_| SurveyError::InvalidScoreTable {
            key: key.clone(),
            value: answer.scoring.clone().unwrap_or_default(),
        })?;

        let mut field = match field::build(answer_type, args) {
            Ok(field) => field,
            Err(source) if policy == UnknownTypePolicy::Strict => {
                return Err(SurveyError::Unsupported { key, source });
            }
            Err(source) => {
                self.omit(key, Some(answer_type), source.to_string());
                return Ok(None);
            }
        };

        field.initial = self
            .data
            .get(&key)
            .map(|recorded| field.decompose(recorded))
            .filter(|v| !v.is_blank());

        self.fields.insert(key.clone(), field);
        Ok(self.fields.get(&key))
    }

    fn omit(&mut self, key: String, answer_type: Option<AnswerType>, message: String) {
        tracing::warn!(%key, answer_type = ?answer_type, %message, "field omitted from form");
        self.diagnostics.push(Diagnostic {
            key,
            answer_type,
            message,
        });
    }

    pub fn questionset(&self) -> u32 {
        self.questionset
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, f)| (k.as_str(), f))
    }

    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.get(key)
    }

    pub fn data(&self) -> &FormData {
        &self.data
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Always true, so an untouched instance is still saved as a draft.
    pub fn has_changed(&self) -> bool {
        true
    }

    pub fn has_files(&self) -> bool {
        self.fields.values().any(Field::is_file)
    }

    /// The submitted value for `key`, read through its field's widget.
    pub fn value(&self, key: &str) -> RawValue {
        match self.fields.get(key) {
            Some(field) => value_from_data(field, key, &self.data),
            None => self.data.get(key).cloned().unwrap_or_default(),
        }
    }

    /// Clean every field, collecting values and failures separately.
    pub fn validate(&self) -> FormValidation {
        let mut outcome = FormValidation::default();
        for (key, field) in &self.fields {
            match field.clean(&self.value(key)) {
                Ok(cleaned) => {
                    outcome.cleaned.insert(key.clone(), cleaned);
                }
                Err(failure) => {
                    outcome.errors.insert(key.clone(), failure);
                }
            }
        }
        outcome
    }

    /// Cleaned values in persistable shape; invalid fields keep their raw
    /// submission.
    pub fn to_instance(&self) -> FormData {
        self.fields
            .iter()
            .map(|(key, field)| {
                let raw = self.value(key);
                let stored = match field.clean(&raw) {
                    Ok(cleaned) => cleaned.to_raw(),
                    Err(_) => raw,
                };
                (key.clone(), stored)
            })
            .collect()
    }

    /// Render every field, in schema order, keyed by field key.
    pub fn render(&self, renderer: &dyn FieldRenderer) -> IndexMap<String, String> {
        self.fields
            .iter()
            .map(|(key, field)| {
                let name = match &self.prefix {
                    Some(prefix) => format!("{prefix}-{key}"),
                    None => key.clone(),
                };
                let value = field.decompose(&self.value(key));
                let value = (!value.is_blank()).then_some(value).or_else(|| field.initial.clone());
                let markup = renderer.render(&name, value.as_ref(), &render_attrs(&name, field));
                (key.clone(), markup)
            })
            .collect()
    }

    /// Apply add/remove deltas to the file list stored under `key`.
    ///
    /// Returns the new list of file ids, which also replaces the form's data
    /// for `key`.
    pub fn apply_file_changes(
        &mut self,
        storage: &mut dyn FileStorage,
        key: &str,
        changes: &FileChanges,
    ) -> Result<Vec<String>, SurveyError> {
        let current = match self.value(key) {
            RawValue::List(ids) => ids,
            RawValue::Text(id) if !id.trim().is_empty() => vec![id],
            _ => Vec::new(),
        };
        let ids = apply_file_changes(storage, &current, changes)?;
        self.data.insert(key.to_string(), RawValue::List(ids.clone()));
        Ok(ids)
    }

    /// Sum of field scores for this instance.
    pub fn get_score(&self) -> Decimal {
        self.field_scores().values().copied().sum()
    }

    /// Sum of effective field maximums.
    pub fn get_max_score(&self) -> Decimal {
        self.fields.values().map(Field::max_score).sum()
    }

    /// Score of every scorable field, keyed by field key.
    pub fn field_scores(&self) -> IndexMap<String, Decimal> {
        self.fields
            .iter()
            .filter(|(_, f)| f.is_scorable())
            .map(|(key, f)| (key.clone(), f.score(&self.value(key))))
            .collect()
    }

    /// Keys of scorable fields holding a valid, non-empty value.
    pub fn answered(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, f)| f.is_scorable())
            .filter(|(key, f)| f.clean(&self.value(key)).is_ok_and(|c| !c.is_empty()))
            .map(|(key, _)| key.as_str())
    }

    /// Number of scorable fields.
    pub fn scorable_count(&self) -> usize {
        self.fields.values().filter(|f| f.is_scorable()).count()
    }
}

/// Read a field's value out of flat submitted data.
///
/// An open choice submitted as the "other" marker takes its text from the
/// companion `<key>_other` entry.
pub fn value_from_data(field: &Field, key: &str, data: &FormData) -> RawValue {
    let value = data.get(key).cloned().unwrap_or_default();
    match (&field.kind, &value) {
        (FieldKind::Choice { open: true, .. }, RawValue::Text(s))
            if s.trim().eq_ignore_ascii_case(OTHER_CHOICE) =>
        {
            let other = match data.get(&other_key(key)) {
                Some(RawValue::Text(text)) => Some(text.clone()),
                _ => None,
            };
            RawValue::Choice {
                selection: OTHER_CHOICE.to_string(),
                other,
            }
        }
        _ => value,
    }
}

/// Apply add/remove deltas to a list of stored file ids.
///
/// Uploads are saved before anything is deleted. When a save fails, the
/// uploads already saved by this call are deleted again and nothing listed
/// in `remove` is touched.
pub fn apply_file_changes(
    storage: &mut dyn FileStorage,
    current: &[String],
    changes: &FileChanges,
) -> Result<Vec<String>, StoreError> {
    let mut saved = Vec::with_capacity(changes.add.len());
    for upload in &changes.add {
        match storage.save(upload) {
            Ok(id) => saved.push(id),
            Err(e) => {
                for id in &saved {
                    if let Err(cleanup) = storage.delete(id) {
                        tracing::warn!(file = %id, error = %cleanup, "failed to discard saved upload");
                    }
                }
                return Err(e);
            }
        }
    }

    for id in changes.remove.iter().filter(|id| current.contains(id)) {
        storage.delete(id)?;
    }

    let mut ids: Vec<String> = current
        .iter()
        .filter(|id| !changes.remove.contains(id))
        .cloned()
        .collect();
    ids.extend(saved);
    tracing::debug!(
        added = changes.add.len(),
        removed = current.len() + changes.add.len() - ids.len(),
        "applied file changes"
    );
    Ok(ids)
}

fn render_attrs(name: &str, field: &Field) -> Attrs {
    let mut attrs = Attrs::new();
    attrs.insert("id".into(), format!("id_{name}"));
    attrs.insert("widget".into(), field.widget.as_str().into());
    attrs.insert("label".into(), field.label.clone());
    if field.required {
        attrs.insert("required".into(), "required".into());
    }
    let choices = field.kind.choices();
    if !choices.is_empty() {
        attrs.insert("choices".into(), choices.join("|"));
    }
    attrs
}

/// The forms bound for one question set.
#[derive(Debug, Clone)]
pub struct BoundFormSet {
    questionset: u32,
    repeater: bool,
    forms: Vec<ResponseForm>,
}

/// Bind `questionset` to its submitted instances.
///
/// A repeater gets one form per instance, or a single blank form when there
/// are none. Any other question set gets exactly one form, from the first
/// instance.
pub fn bind(
    questionset: &QuestionSet,
    mut submitted: Vec<FormData>,
    policy: UnknownTypePolicy,
) -> Result<BoundFormSet, SurveyError> {
    if submitted.is_empty() {
        submitted.push(FormData::new());
    }
    if !questionset.repeater && submitted.len() > 1 {
        tracing::warn!(
            questionset = questionset.id,
            instances = submitted.len(),
            "extra instances ignored for a non-repeating question set"
        );
        submitted.truncate(1);
    }

    let forms = submitted
        .into_iter()
        .enumerate()
        .map(|(index, data)| {
            let form = ResponseForm::new(questionset, data, policy)?;
            Ok(if questionset.repeater {
                form.with_prefix(index.to_string())
            } else {
                form
            })
        })
        .collect::<Result<Vec<_>, SurveyError>>()?;

    tracing::debug!(questionset = questionset.id, forms = forms.len(), "bound form set");
    Ok(BoundFormSet {
        questionset: questionset.id,
        repeater: questionset.repeater,
        forms,
    })
}

impl BoundFormSet {
    pub fn questionset(&self) -> u32 {
        self.questionset
    }

    pub fn is_repeater(&self) -> bool {
        self.repeater
    }

    pub fn forms(&self) -> &[ResponseForm] {
        &self.forms
    }

    pub fn forms_mut(&mut self) -> &mut [ResponseForm] {
        &mut self.forms
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    /// Always true, matching [`ResponseForm::has_changed`].
    pub fn has_changed(&self) -> bool {
        true
    }

    pub fn has_files(&self) -> bool {
        self.forms.iter().any(ResponseForm::has_files)
    }

    /// Fields omitted while building, reported once per answer.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self.forms.first() {
            Some(form) => form.diagnostics(),
            None => &[],
        }
    }

    pub fn validate(&self) -> Vec<FormValidation> {
        self.forms.iter().map(ResponseForm::validate).collect()
    }

    pub fn is_valid(&self) -> bool {
        self.forms.iter().all(|f| f.validate().is_valid())
    }

    /// Persistable data for every instance.
    pub fn to_instances(&self) -> Vec<FormData> {
        self.forms.iter().map(ResponseForm::to_instance).collect()
    }

    pub fn get_score(&self) -> Decimal {
        self.forms.iter().map(ResponseForm::get_score).sum()
    }

    pub fn get_max_score(&self) -> Decimal {
        self.forms.iter().map(ResponseForm::get_max_score).sum()
    }

    pub fn field_scores(&self) -> Vec<IndexMap<String, Decimal>> {
        self.forms.iter().map(ResponseForm::field_scores).collect()
    }
}
