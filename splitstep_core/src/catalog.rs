//! Built-in exercise library and read-only loading of user definitions.
//!
//! Definitions are never edited here; a session takes its own copy when it
//! starts.

use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Cached default library - built once and reused across all operations
static DEFAULT_LIBRARY: Lazy<ExerciseLibrary> = Lazy::new(build_default_library);

/// Get a reference to the cached default library
pub fn get_default_library() -> &'static ExerciseLibrary {
    &DEFAULT_LIBRARY
}

/// Builds the default library with one or more drills of each subtype
pub fn build_default_library() -> ExerciseLibrary {
    let mut library = ExerciseLibrary::default();

    library.insert(ExerciseDefinition {
        id: "push_ups".into(),
        name: "Push-ups".into(),
        favorite: true,
        sets: 3,
        rest_duration_seconds: 60,
        kind: ExerciseKind::Reps { reps: 15 },
    });

    library.insert(ExerciseDefinition {
        id: "lunges".into(),
        name: "Walking Lunges".into(),
        favorite: false,
        sets: 3,
        rest_duration_seconds: 0,
        kind: ExerciseKind::Reps { reps: 12 },
    });

    library.insert(ExerciseDefinition {
        id: "wall_sit".into(),
        name: "Wall Sit".into(),
        favorite: false,
        sets: 3,
        rest_duration_seconds: 45,
        kind: ExerciseKind::TimedSets {
            set_duration_seconds: 60,
        },
    });

    library.insert(ExerciseDefinition {
        id: "plank".into(),
        name: "Plank".into(),
        favorite: true,
        sets: 2,
        rest_duration_seconds: 30,
        kind: ExerciseKind::TimedSets {
            set_duration_seconds: 45,
        },
    });

    library.insert(ExerciseDefinition {
        id: "split_step_cones".into(),
        name: "Split-step Cone Reaction".into(),
        favorite: false,
        sets: 4,
        rest_duration_seconds: 40,
        kind: ExerciseKind::Reaction {
            reps: 8,
            cones: 4,
            rep_duration_seconds: 3,
        },
    });

    library
}

/// On-disk format: a list of `[[exercise]]` tables
#[derive(Debug, Deserialize)]
struct LibraryFile {
    #[serde(default)]
    exercise: Vec<ExerciseDefinition>,
}

impl ExerciseLibrary {
    /// Add or replace a definition under its own id.
    pub fn insert(&mut self, definition: ExerciseDefinition) {
        self.exercises.insert(definition.id.clone(), definition);
    }

    /// Look up a definition by id.
    pub fn get(&self, id: &str) -> Result<&ExerciseDefinition> {
        self.exercises
            .get(id)
            .ok_or_else(|| Error::UnknownExercise(id.to_string()))
    }

    /// Definitions sorted by id, favorites first.
    pub fn sorted(&self) -> Vec<&ExerciseDefinition> {
        let mut defs: Vec<_> = self.exercises.values().collect();
        defs.sort_by(|a, b| b.favorite.cmp(&a.favorite).then_with(|| a.id.cmp(&b.id)));
        defs
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    /// Load definitions from a TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let file: LibraryFile = toml::from_str(&contents)?;

        let mut library = ExerciseLibrary::default();
        for def in file.exercise {
            if library.exercises.contains_key(&def.id) {
                return Err(Error::InvalidDefinition(format!(
                    "duplicate exercise id '{}' in {:?}",
                    def.id, path
                )));
            }
            library.insert(def);
        }

        tracing::info!("Loaded {} exercises from {:?}", library.len(), path);
        Ok(library)
    }

    /// Overlay `other` on top of this library; its ids win.
    pub fn merge(&mut self, other: ExerciseLibrary) {
        for (_, def) in other.exercises {
            self.insert(def);
        }
    }

    /// Validate every definition, returning a list of problems
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (id, def) in &self.exercises {
            if id != &def.id {
                errors.push(format!(
                    "Exercise key '{}' doesn't match definition.id '{}'",
                    id, def.id
                ));
            }
            errors.extend(def.problems());
        }

        errors
    }
}
