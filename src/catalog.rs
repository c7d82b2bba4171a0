//! Workflow catalog: which steps exist, in what order, for which formula.
//!
//! The catalog is a two-tier lookup. The built-in defaults live in a lazily
//! built static map that is only ever borrowed; operator edits go to an
//! override map that replaces a formula's step list wholesale. Reads always
//! prefer the override.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::error::WorkflowError;
use crate::fields::*;
use crate::task::{FormulaSteps, StepPatch, TaskTemplate};

/// Formula used when a project has none or names one nobody knows.
pub const FALLBACK_FORMULA: &str = "Photo + Film long";

/// Legacy formula names still found on older projects.
const FORMULA_ALIASES: &[(&str, &str)] = &[
    ("Photo + Film", "Photo + Film long"),
    ("Photo & Film long", "Photo + Film long"),
    ("Photo + Film + Teaser", "Photo + Film long + Teaser"),
    ("Full package", "Photo + Film long + Teaser"),
    ("Photo", "Photo only"),
    ("Film", "Film only"),
];

const LEAD_PHOTOGRAPHER: &str = "Lead photographer";
const PHOTO_EDITOR: &str = "Photo editor";
const VIDEO_EDITOR: &str = "Video editor";
const ALBUM_DESIGNER: &str = "Album designer";
const STUDIO_MANAGER: &str = "Studio manager";

fn photo_steps() -> Vec<TaskTemplate> {
    vec![
        TaskTemplate::new("photo-culling", "Photo culling", 10, PHOTO_EDITOR, Pole::Photo),
        TaskTemplate::new("photo-grading", "Photo colour grading", 15, PHOTO_EDITOR, Pole::Photo),
        TaskTemplate::new("photo-gallery-upload", "Client gallery upload", 24, LEAD_PHOTOGRAPHER, Pole::Photo),
        TaskTemplate::new("photo-gallery-email", "Gallery delivery email", 25, STUDIO_MANAGER, Pole::Photo),
        TaskTemplate::new("photo-album-selection", "Album selection reminder", 38, STUDIO_MANAGER, Pole::Photo),
    ]
}

fn long_film_steps() -> Vec<TaskTemplate> {
    vec![
        TaskTemplate::new("film-backup", "Footage backup and sync", 2, VIDEO_EDITOR, Pole::Film),
        TaskTemplate::new("film-rough-cut", "Film rough cut", 30, VIDEO_EDITOR, Pole::Film),
        TaskTemplate::new("film-grading", "Film colour grading", 45, VIDEO_EDITOR, Pole::Film),
        TaskTemplate::new("film-export", "Film final export", 55, VIDEO_EDITOR, Pole::Film),
        TaskTemplate::new("film-delivery", "Film delivery", 70, STUDIO_MANAGER, Pole::Film),
    ]
}

fn short_film_steps() -> Vec<TaskTemplate> {
    vec![
        TaskTemplate::new("film-backup", "Footage backup and sync", 2, VIDEO_EDITOR, Pole::Film),
        TaskTemplate::new("film-short-edit", "Short film edit", 25, VIDEO_EDITOR, Pole::Film),
        TaskTemplate::new("film-delivery", "Film delivery", 40, STUDIO_MANAGER, Pole::Film),
    ]
}

fn teaser_steps() -> Vec<TaskTemplate> {
    vec![
        TaskTemplate::new("film-teaser", "Teaser edit", 14, VIDEO_EDITOR, Pole::Film),
        TaskTemplate::new("com-teaser-post", "Teaser publication", 21, STUDIO_MANAGER, Pole::Com),
    ]
}

fn album_steps() -> Vec<TaskTemplate> {
    vec![
        TaskTemplate::new("dvd-album-design", "Album design", 50, ALBUM_DESIGNER, Pole::Dvd),
        TaskTemplate::new("dvd-album-validation", "Album client validation", 65, STUDIO_MANAGER, Pole::Dvd),
        TaskTemplate::new("dvd-print-order", "Album print order", 75, ALBUM_DESIGNER, Pole::Dvd),
        TaskTemplate::new("dvd-shipping", "Album and USB shipping", 90, STUDIO_MANAGER, Pole::Dvd),
    ]
}

fn com_steps() -> Vec<TaskTemplate> {
    vec![
        TaskTemplate::new("com-prewedding-call", "Pre-wedding call", -30, LEAD_PHOTOGRAPHER, Pole::Com),
        TaskTemplate::new("com-questionnaire", "Planning questionnaire", -14, STUDIO_MANAGER, Pole::Com),
        TaskTemplate::new("com-thank-you", "Thank-you message", 2, STUDIO_MANAGER, Pole::Com),
        TaskTemplate::new("com-sneak-peek", "Social media sneak peek", 7, STUDIO_MANAGER, Pole::Com),
        TaskTemplate::new("com-review-request", "Review request", 100, STUDIO_MANAGER, Pole::Com),
    ]
}

static DEFAULT_FORMULAS: LazyLock<BTreeMap<&'static str, Vec<TaskTemplate>>> = LazyLock::new(|| {
    let mut map = BTreeMap::new();
    map.insert(
        "Photo + Film long",
        [photo_steps(), long_film_steps(), album_steps(), com_steps()].concat(),
    );
    map.insert(
        "Photo + Film long + Teaser",
        [photo_steps(), long_film_steps(), teaser_steps(), album_steps(), com_steps()].concat(),
    );
    map.insert(
        "Photo + Film short",
        [photo_steps(), short_film_steps(), album_steps(), com_steps()].concat(),
    );
    map.insert("Photo only", [photo_steps(), album_steps(), com_steps()].concat());
    map.insert("Film only", [long_film_steps(), com_steps()].concat());
    map
});

/// Canonical name behind a legacy alias, or `formula` itself.
fn canonical(formula: &str) -> &str {
    FORMULA_ALIASES
        .iter()
        .find(|(alias, _)| *alias == formula)
        .map(|(_, target)| *target)
        .unwrap_or(formula)
}

/// Built-in step list for `formula`, following legacy aliases.
fn builtin(formula: &str) -> Option<&'static [TaskTemplate]> {
    DEFAULT_FORMULAS.get(canonical(formula)).map(|steps| steps.as_slice())
}

fn fallback() -> &'static [TaskTemplate] {
    DEFAULT_FORMULAS
        .get(FALLBACK_FORMULA)
        .map(|steps| steps.as_slice())
        .unwrap_or(&[])
}

/// Default catalog plus operator overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowCatalog {
    overrides: BTreeMap<String, Vec<TaskTemplate>>,
}

impl WorkflowCatalog {
    /// A catalog with no overrides.
    pub fn new() -> Self {
        WorkflowCatalog::default()
    }

    /// Build a catalog from a persisted override payload. Later entries for
    /// the same formula win.
    pub fn with_overrides(payload: Vec<FormulaSteps>) -> Self {
        let overrides = payload
            .into_iter()
            .map(|entry| (entry.formula.trim().to_string(), entry.steps))
            .collect();
        WorkflowCatalog { overrides }
    }

    /// Name `formula` is stored under: itself when it has an override of its
    /// own, else the canonical name behind a legacy alias.
    fn resolve<'a>(&self, formula: &'a str) -> &'a str {
        let name = formula.trim();
        if self.overrides.contains_key(name) {
            name
        } else {
            canonical(name)
        }
    }

    /// Steps for `formula`: the override when present, else the built-in list,
    /// else the fallback formula's list. Aliases see their canonical formula's
    /// override.
    pub fn templates(&self, formula: &str) -> &[TaskTemplate] {
        let name = self.resolve(formula);
        if let Some(steps) = self.overrides.get(name) {
            return steps;
        }
        builtin(name).unwrap_or_else(fallback)
    }

    /// Steps of one pole, ordered by day offset. Ties keep catalog order.
    pub fn steps_for_pole(&self, formula: &str, pole: Pole) -> Vec<&TaskTemplate> {
        let mut steps: Vec<&TaskTemplate> =
            self.templates(formula).iter().filter(|t| t.pole == pole).collect();
        steps.sort_by_key(|t| t.day_offset);
        steps
    }

    /// Number of steps a pole has under `formula`.
    pub fn step_count(&self, formula: &str, pole: Pole) -> u32 {
        self.templates(formula).iter().filter(|t| t.pole == pole).count() as u32
    }

    /// 1-indexed step number of a step within its pole. The template key is
    /// tried first; records without a key (or whose key is gone) fall back to
    /// title matching.
    pub fn step_number(&self, formula: &str, pole: Pole, key: Option<&str>, title: &str) -> Option<u32> {
        let steps = self.steps_for_pole(formula, pole);
        let by_key = key.and_then(|k| steps.iter().position(|t| t.key.as_deref() == Some(k)));
        by_key
            .or_else(|| steps.iter().position(|t| t.matches_title(title)))
            .map(|idx| idx as u32 + 1)
    }

    /// Template for `(title, pole)` under `formula`, if any.
    pub fn find_template(&self, formula: &str, title: &str, pole: Pole) -> Option<&TaskTemplate> {
        self.templates(formula).iter().find(|t| t.pole == pole && t.matches_title(title))
    }

    /// Whether `name` resolves without falling back.
    pub fn is_known(&self, name: &str) -> bool {
        let name = self.resolve(name);
        self.overrides.contains_key(name) || builtin(name).is_some()
    }

    pub fn has_override(&self, name: &str) -> bool {
        self.overrides.contains_key(self.resolve(name))
    }

    /// Canonical default names, aliases and override names, sorted and deduplicated.
    pub fn formula_names(&self) -> Vec<String> {
        let mut names: Vec<String> = DEFAULT_FORMULAS
            .keys()
            .map(|k| k.to_string())
            .chain(FORMULA_ALIASES.iter().map(|(alias, _)| alias.to_string()))
            .chain(self.overrides.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Canonical defaults overlaid with overrides. Aliases are not repeated.
    pub fn effective_map(&self) -> BTreeMap<String, Vec<TaskTemplate>> {
        let mut map: BTreeMap<String, Vec<TaskTemplate>> = DEFAULT_FORMULAS
            .iter()
            .map(|(name, steps)| (name.to_string(), steps.clone()))
            .collect();
        for (name, steps) in &self.overrides {
            map.insert(name.clone(), steps.clone());
        }
        map
    }

    /// Replace the override entry for `name`.
    pub fn upsert_formula(&mut self, name: &str, steps: Vec<TaskTemplate>) {
        self.overrides.insert(name.trim().to_string(), steps);
    }

    /// Override list for `formula`, copied from the effective list on first write.
    fn override_entry(&mut self, formula: &str) -> &mut Vec<TaskTemplate> {
        let name = self.resolve(formula).to_string();
        if !self.overrides.contains_key(&name) {
            let seed = self.templates(&name).to_vec();
            self.overrides.insert(name.clone(), seed);
        }
        self.overrides.entry(name).or_default()
    }

    fn check_index(&self, formula: &str, index: usize) -> Result<(), WorkflowError> {
        let len = self.templates(formula).len();
        if index >= len {
            return Err(WorkflowError::StepOutOfRange { formula: formula.trim().to_string(), index, len });
        }
        Ok(())
    }

    /// Append a step to the end of `formula`'s list.
    pub fn add_step(&mut self, formula: &str, step: TaskTemplate) {
        self.override_entry(formula).push(step);
    }

    /// Shallow-merge `patch` into the step at `index`.
    pub fn update_step(&mut self, formula: &str, index: usize, patch: &StepPatch) -> Result<(), WorkflowError> {
        self.check_index(formula, index)?;
        let steps = self.override_entry(formula);
        patch.apply(&mut steps[index]);
        Ok(())
    }

    /// Remove and return the step at `index`.
    pub fn remove_step(&mut self, formula: &str, index: usize) -> Result<TaskTemplate, WorkflowError> {
        self.check_index(formula, index)?;
        Ok(self.override_entry(formula).remove(index))
    }

    /// A key no step of `formula` uses yet.
    pub fn next_step_key(&self, formula: &str) -> String {
        let prefix = format!("{}-step-", slugify(self.resolve(formula)));
        let highest = self
            .templates(formula)
            .iter()
            .filter_map(|t| t.key.as_deref())
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("{}{}", prefix, highest + 1)
    }

    /// Overrides in the shape persisted to the cache and the store.
    pub fn override_payload(&self) -> Vec<FormulaSteps> {
        self.overrides
            .iter()
            .map(|(formula, steps)| FormulaSteps { formula: formula.clone(), steps: steps.clone() })
            .collect()
    }
}

/// Lowercase, dash-separated form of a name, used to mint template keys.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsets(steps: &[&TaskTemplate]) -> Vec<i32> {
        steps.iter().map(|t| t.day_offset).collect()
    }

    #[test]
    fn test_unknown_formula_falls_back() {
        let catalog = WorkflowCatalog::new();
        assert_eq!(catalog.templates("unknown formula"), catalog.templates(FALLBACK_FORMULA));
        assert!(!catalog.templates("").is_empty());
        assert!(!catalog.is_known("unknown formula"));
    }

    #[test]
    fn test_alias_resolves_to_same_list() {
        let catalog = WorkflowCatalog::new();
        assert_eq!(catalog.templates("Photo + Film"), catalog.templates("Photo + Film long"));
        assert_eq!(catalog.templates("Full package"), catalog.templates("Photo + Film long + Teaser"));
        assert!(catalog.is_known("Photo"));
    }

    #[test]
    fn test_photo_sequence_of_long_formula() {
        let catalog = WorkflowCatalog::new();
        let steps = catalog.steps_for_pole("Photo + Film long", Pole::Photo);
        assert_eq!(offsets(&steps), vec![10, 15, 24, 25, 38]);
        assert_eq!(catalog.step_count("Photo + Film long", Pole::Photo), 5);
    }

    #[test]
    fn test_steps_for_pole_sorts_with_stable_ties() {
        let mut catalog = WorkflowCatalog::new();
        catalog.upsert_formula(
            "Custom",
            vec![
                TaskTemplate::new("c", "Late", 30, "x", Pole::Film),
                TaskTemplate::new("a", "First tie", 5, "x", Pole::Film),
                TaskTemplate::new("p", "Other pole", 1, "x", Pole::Photo),
                TaskTemplate::new("b", "Second tie", 5, "x", Pole::Film),
            ],
        );
        let titles: Vec<&str> =
            catalog.steps_for_pole("Custom", Pole::Film).iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["First tie", "Second tie", "Late"]);
        assert_eq!(catalog.step_number("Custom", Pole::Film, None, "second TIE "), Some(2));
    }

    #[test]
    fn test_step_number_prefers_key_over_title() {
        let mut catalog = WorkflowCatalog::new();
        let patch = StepPatch { title: Some("Culling and backup".into()), ..Default::default() };
        catalog.update_step("Photo + Film long", 0, &patch).unwrap();

        // Renamed step is still found through its key.
        assert_eq!(
            catalog.step_number("Photo + Film long", Pole::Photo, Some("photo-culling"), "Photo culling"),
            Some(1)
        );
        // A legacy record without a key matching the old title is orphaned.
        assert_eq!(catalog.step_number("Photo + Film long", Pole::Photo, None, "Photo culling"), None);
    }

    #[test]
    fn test_mutations_never_touch_defaults() {
        let mut catalog = WorkflowCatalog::new();
        let before = WorkflowCatalog::new().templates("Photo only").to_vec();
        catalog.remove_step("Photo only", 0).unwrap();

        assert!(catalog.has_override("Photo only"));
        assert_eq!(catalog.templates("Photo only").len(), before.len() - 1);
        assert_eq!(WorkflowCatalog::new().templates("Photo only"), before.as_slice());
    }

    #[test]
    fn test_out_of_range_index_is_rejected_without_override() {
        let mut catalog = WorkflowCatalog::new();
        let err = catalog.remove_step("Film only", 99).unwrap_err();
        assert!(matches!(err, WorkflowError::StepOutOfRange { index: 99, .. }));
        assert!(!catalog.has_override("Film only"));
    }

    #[test]
    fn test_override_replaces_wholesale() {
        let mut catalog = WorkflowCatalog::new();
        catalog.upsert_formula(
            "Photo + Film long",
            vec![TaskTemplate::new("only", "Only step", 3, "x", Pole::Dvd)],
        );
        assert_eq!(catalog.templates("Photo + Film long").len(), 1);
        assert!(catalog.steps_for_pole("Photo + Film long", Pole::Photo).is_empty());
        assert_eq!(catalog.templates("Photo + Film").len(), 1);
    }

    #[test]
    fn test_alias_edits_land_on_canonical_formula() {
        let mut catalog = WorkflowCatalog::new();
        let patch = StepPatch { title: Some("Culling v2".to_string()), ..Default::default() };
        catalog.update_step("Photo + Film", 0, &patch).unwrap();

        assert!(catalog.has_override("Photo + Film long"));
        assert!(catalog.has_override("Photo + Film"));
        assert_eq!(catalog.override_payload().len(), 1);
        assert_eq!(catalog.templates("Photo + Film long")[0].title, "Culling v2");
        assert_eq!(catalog.templates("Photo & Film long")[0].title, "Culling v2");
        assert_eq!(catalog.next_step_key("Photo + Film"), catalog.next_step_key("Photo + Film long"));
    }

    #[test]
    fn test_next_step_key_is_unique() {
        let mut catalog = WorkflowCatalog::new();
        let first = catalog.next_step_key("Photo only");
        assert_eq!(first, "photo-only-step-1");
        catalog.add_step("Photo only", TaskTemplate::new(&first, "New step", 0, "", Pole::Photo));
        assert_eq!(catalog.next_step_key("Photo only"), "photo-only-step-2");
    }

    #[test]
    fn test_payload_round_trips_overrides() {
        let mut catalog = WorkflowCatalog::new();
        catalog.remove_step("Film only", 0).unwrap();
        let reloaded = WorkflowCatalog::with_overrides(catalog.override_payload());
        assert_eq!(reloaded, catalog);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Photo + Film long"), "photo-film-long");
        assert_eq!(slugify("  Été 2025 "), "été-2025");
    }
}
