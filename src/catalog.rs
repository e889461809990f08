//! Workout catalog - the 30-day calisthenics plan
//!
//! The plan is written down as static tables and validated once when the
//! catalog is built. Malformed entries are rejected there, never at render time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of days in the program
pub const PROGRAM_DAYS: u8 = 30;

/// Rest seconds used when an exercise doesn't specify its own
pub const DEFAULT_REST_SECS: u32 = 60;

/// Days with no exercises, only a confirmation
pub const REST_DAYS: &[u8] = &[4, 7, 11, 14, 18, 21, 28];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("day {day}: standard workout has no exercises")]
    NoExercises { day: u8 },

    #[error("day {day}: exercise '{exercise}' has zero sets")]
    ZeroSets { day: u8, exercise: String },

    #[error("day {day}: exercise '{exercise}' has an empty work target")]
    ZeroWork { day: u8, exercise: String },

    #[error("day {day}: exercise '{exercise}' has zero rest")]
    ZeroRest { day: u8, exercise: String },

    #[error("day {day}: exercise has an empty name")]
    EmptyName { day: u8 },

    #[error("day {day} is listed more than once")]
    DuplicateDay { day: u8 },

    #[error("day {day} has no plan")]
    MissingDay { day: u8 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlanKind {
    Rest,
    Standard,
}

/// What one set of an exercise asks for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkUnit {
    RepsTarget(u32),
    TimedHold(u32), // seconds
}

impl WorkUnit {
    /// Short label, e.g. "12" or "30s"
    pub fn label(&self) -> String {
        match self {
            WorkUnit::RepsTarget(reps) => reps.to_string(),
            WorkUnit::TimedHold(secs) => format!("{}s", secs),
        }
    }

    fn amount(&self) -> u32 {
        match self {
            WorkUnit::RepsTarget(n) | WorkUnit::TimedHold(n) => *n,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Exercise {
    pub name: String,
    pub set_count: u32,
    pub work: WorkUnit,
    pub rest_secs: u32,
    pub tip: Option<String>,
}

/// One day of the program. Built only through [`WorkoutPlan::rest`] and
/// [`WorkoutPlan::standard`], so a standard plan always has exercises.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkoutPlan {
    title: String,
    kind: PlanKind,
    description: Option<String>,
    exercises: Vec<Exercise>,
}

impl WorkoutPlan {
    pub fn rest(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            kind: PlanKind::Rest,
            description: None,
            exercises: Vec::new(),
        }
    }

    pub fn standard(
        day: u8,
        title: impl Into<String>,
        description: Option<String>,
        exercises: Vec<Exercise>,
    ) -> Result<Self, CatalogError> {
        if exercises.is_empty() {
            return Err(CatalogError::NoExercises { day });
        }
        for ex in &exercises {
            if ex.name.trim().is_empty() {
                return Err(CatalogError::EmptyName { day });
            }
            if ex.set_count == 0 {
                return Err(CatalogError::ZeroSets { day, exercise: ex.name.clone() });
            }
            if ex.work.amount() == 0 {
                return Err(CatalogError::ZeroWork { day, exercise: ex.name.clone() });
            }
            if ex.rest_secs == 0 {
                return Err(CatalogError::ZeroRest { day, exercise: ex.name.clone() });
            }
        }
        Ok(Self {
            title: title.into(),
            kind: PlanKind::Standard,
            description,
            exercises,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> PlanKind {
        self.kind
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn exercises(&self) -> &[Exercise] {
        &self.exercises
    }

    pub fn is_rest(&self) -> bool {
        self.kind == PlanKind::Rest
    }

    /// Total number of sets across all exercises
    pub fn total_sets(&self) -> u32 {
        self.exercises.iter().map(|e| e.set_count).sum()
    }

    #[cfg(test)]
    pub(crate) fn clear_exercises_for_test(&mut self) {
        self.exercises.clear();
    }
}

// ---------------------------------------------------------------------------
// Static plan tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct ExerciseDef {
    name: &'static str,
    sets: u32,
    work: WorkUnit,
    rest: Option<u32>,
    tip: Option<&'static str>,
}

#[derive(Debug, Clone, Copy)]
enum PlanDef {
    Rest,
    Standard {
        title: &'static str,
        description: Option<&'static str>,
        exercises: &'static [ExerciseDef],
    },
}

const fn reps(name: &'static str, sets: u32, count: u32, rest: Option<u32>, tip: Option<&'static str>) -> ExerciseDef {
    ExerciseDef { name, sets, work: WorkUnit::RepsTarget(count), rest, tip }
}

const fn hold(name: &'static str, sets: u32, secs: u32, rest: Option<u32>, tip: Option<&'static str>) -> ExerciseDef {
    ExerciseDef { name, sets, work: WorkUnit::TimedHold(secs), rest, tip }
}

// Phase 1: Foundation (days 1-7). Only day 1 carries per-exercise rest and
// coaching tips; every other day uses the default rest and has no tips.
const DAY_1: &[ExerciseDef] = &[
    reps("Push-ups", 3, 12, Some(60), Some("Keep body straight. Chest to floor.")),
    reps("Squats", 3, 15, Some(60), Some("Weight on heels. Go deep.")),
    hold("Plank", 3, 30, Some(45), Some("Squeeze glutes. Don't sag.")),
    reps("Lunges", 3, 10, Some(60), Some("10 reps per leg. Back knee low.")),
];

const DAY_2: &[ExerciseDef] = &[
    hold("Mountain Climbers", 3, 30, None, None),
    reps("Bicycle Crunches", 3, 30, None, None), // 15 per side
    reps("Leg Raises", 3, 10, None, None),
];

const DAY_3: &[ExerciseDef] = &[
    reps("Wide-Grip Push-ups", 3, 10, None, None),
    reps("Tricep Dips", 3, 10, None, None),
    reps("Pike Push-ups", 3, 8, None, None),
    reps("Superman Hold", 3, 10, None, None),
];

const DAY_5: &[ExerciseDef] = &[
    reps("Sumo Squats", 3, 15, None, None),
    reps("Glute Bridges", 3, 15, None, None),
    reps("Calf Raises", 3, 20, None, None),
    hold("Wall Sit", 3, 45, None, None),
];

const DAY_6: &[ExerciseDef] = &[
    reps("Push-ups", 4, 10, None, None),
    reps("Squats", 4, 10, None, None),
    reps("Sit-ups", 4, 10, None, None),
    reps("Jumping Jacks", 4, 20, None, None),
];

// Phase 2: Intensity (days 8-14)
const DAY_8: &[ExerciseDef] = &[
    reps("Diamond Push-ups", 4, 8, None, None),
    reps("Decline Push-ups", 4, 8, None, None),
    reps("Doorframe Rows", 4, 12, None, None),
];

const INTENSITY: &[ExerciseDef] = &[
    reps("Burpees", 3, 10, None, None),
    hold("High Knees", 3, 45, None, None),
    hold("Squat Pulses", 3, 30, None, None),
];

// Phases 3 and 4 (days 15-30)
const BEAST_MODE: &[ExerciseDef] = &[
    reps("Push-ups", 5, 20, None, None),
    reps("Jump Squats", 5, 15, None, None),
    hold("Plank", 4, 60, None, None),
];

fn plan_def(day: u8) -> PlanDef {
    if REST_DAYS.contains(&day) {
        return PlanDef::Rest;
    }

    match day {
        1 => PlanDef::Standard {
            title: "Full Body Basics",
            description: Some("Focus on strict form. Quality over quantity."),
            exercises: DAY_1,
        },
        2 => PlanDef::Standard { title: "Core & Cardio", description: None, exercises: DAY_2 },
        3 => PlanDef::Standard { title: "Upper Body Focus", description: None, exercises: DAY_3 },
        5 => PlanDef::Standard { title: "Lower Body Power", description: None, exercises: DAY_5 },
        6 => PlanDef::Standard {
            title: "Mini Circuit",
            description: Some("Perform 4 rounds. Rest 90s between rounds."),
            exercises: DAY_6,
        },
        8 => PlanDef::Standard { title: "Upper Body Overload", description: None, exercises: DAY_8 },
        9..=14 => PlanDef::Standard {
            title: "Intensity Phase",
            description: Some("Keep the heart rate up."),
            exercises: INTENSITY,
        },
        _ => PlanDef::Standard { title: "Beast Mode", description: None, exercises: BEAST_MODE },
    }
}

fn build_plan(day: u8, def: PlanDef) -> Result<WorkoutPlan, CatalogError> {
    match def {
        PlanDef::Rest => Ok(WorkoutPlan::rest(format!("Day {}: Rest & Recovery", day))),
        PlanDef::Standard { title, description, exercises } => {
            let exercises = exercises
                .iter()
                .map(|d| Exercise {
                    name: d.name.to_string(),
                    set_count: d.sets,
                    work: d.work,
                    rest_secs: d.rest.unwrap_or(DEFAULT_REST_SECS),
                    tip: d.tip.map(str::to_string),
                })
                .collect();
            WorkoutPlan::standard(
                day,
                format!("Day {}: {}", day, title),
                description.map(str::to_string),
                exercises,
            )
        }
    }
}

/// Validated plans for every day of the program
#[derive(Debug, Clone)]
pub struct Catalog {
    plans: Vec<WorkoutPlan>,
}

impl Catalog {
    /// Build the built-in 30-day program
    pub fn load() -> Result<Self, CatalogError> {
        let plans = (1..=PROGRAM_DAYS)
            .map(|day| build_plan(day, plan_def(day)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { plans })
    }

    /// Build a catalog from explicit `(day, plan)` entries. Every day 1..=30
    /// must appear exactly once.
    pub fn from_plans(entries: Vec<(u8, WorkoutPlan)>) -> Result<Self, CatalogError> {
        let mut slots: Vec<Option<WorkoutPlan>> = vec![None; PROGRAM_DAYS as usize];
        for (day, plan) in entries {
            if !(1..=PROGRAM_DAYS).contains(&day) {
                continue;
            }
            let slot = &mut slots[(day - 1) as usize];
            if slot.is_some() {
                return Err(CatalogError::DuplicateDay { day });
            }
            *slot = Some(plan);
        }
        let plans = slots
            .into_iter()
            .enumerate()
            .map(|(i, p)| p.ok_or(CatalogError::MissingDay { day: i as u8 + 1 }))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { plans })
    }

    /// Plan for a day in 1..=30, `None` outside the program
    pub fn workout_for_day(&self, day: u8) -> Option<&WorkoutPlan> {
        if day == 0 {
            return None;
        }
        self.plans.get((day - 1) as usize)
    }

    pub fn is_rest_day(&self, day: u8) -> bool {
        self.workout_for_day(day).is_some_and(WorkoutPlan::is_rest)
    }
}
