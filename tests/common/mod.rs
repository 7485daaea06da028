//! Shared fixtures: a synthetic student performance dataset whose math score
//! is a linear function of the other columns plus bounded noise.

#![allow(dead_code)]

use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use score_predictor::data::write_csv;
use score_predictor::training::{Candidate, ModelKind, ParamGrid, Roster};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

pub const GENDERS: [&str; 2] = ["female", "male"];
pub const GROUPS: [&str; 5] = ["group A", "group B", "group C", "group D", "group E"];
pub const EDUCATION: [&str; 4] = ["high school", "some college", "bachelor's degree", "master's degree"];
pub const LUNCH: [&str; 2] = ["free/reduced", "standard"];
pub const PREP: [&str; 2] = ["completed", "none"];

/// Noise-free math score for one student.
pub fn true_score(gender: &str, lunch: &str, prep: &str, reading: f64, writing: f64) -> f64 {
    let mut score = 0.5 * reading + 0.4 * writing;
    if gender == "male" {
        score += 4.0;
    }
    if lunch == "standard" {
        score += 6.0;
    }
    if prep == "completed" {
        score += 3.0;
    }
    score
}

/// `n` students with the seven feature columns and `math_score`.
pub fn student_frame(n: usize, seed: u64) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut gender = Vec::with_capacity(n);
    let mut race = Vec::with_capacity(n);
    let mut education = Vec::with_capacity(n);
    let mut lunch = Vec::with_capacity(n);
    let mut prep = Vec::with_capacity(n);
    let mut reading = Vec::with_capacity(n);
    let mut writing = Vec::with_capacity(n);
    let mut math = Vec::with_capacity(n);

    for _ in 0..n {
        let g = *GENDERS.choose(&mut rng).unwrap();
        let l = *LUNCH.choose(&mut rng).unwrap();
        let p = *PREP.choose(&mut rng).unwrap();
        let r = rng.gen_range(20..100) as f64;
        let w = (r + rng.gen_range(-10..=10) as f64).clamp(10.0, 100.0);
        let noise: f64 = rng.gen_range(-2.0..2.0);

        gender.push(g);
        race.push(*GROUPS.choose(&mut rng).unwrap());
        education.push(*EDUCATION.choose(&mut rng).unwrap());
        lunch.push(l);
        prep.push(p);
        reading.push(r);
        writing.push(w);
        math.push(true_score(g, l, p, r, w) + noise);
    }

    df! {
        "gender" => gender,
        "race_ethnicity" => race,
        "parental_level_of_education" => education,
        "lunch" => lunch,
        "test_preparation_course" => prep,
        "reading_score" => reading,
        "writing_score" => writing,
        "math_score" => math,
    }
    .unwrap()
}

/// Write a 1000-row dataset to `<dir>/stud.csv`.
pub fn write_dataset(dir: &Path) -> PathBuf {
    let path = dir.join("stud.csv");
    let mut df = student_frame(1000, 7);
    write_csv(&mut df, &path).unwrap();
    path
}

/// Depth-1 tree first, then OLS.
pub fn quick_roster() -> Roster {
    Roster::new(vec![
        Candidate::new(
            "Decision Tree",
            ModelKind::DecisionTree,
            ParamGrid::new().param("max_depth", [1i64]),
        ),
        Candidate::new("Linear Regression", ModelKind::LinearRegression, ParamGrid::new()),
    ])
    .unwrap()
}

/// One request body for the prediction API.
pub fn student_json(gender: &str, lunch: &str, prep: &str, reading: f64, writing: f64) -> Value {
    json!({
        "gender": gender,
        "race_ethnicity": "group C",
        "parental_level_of_education": "some college",
        "lunch": lunch,
        "test_preparation_course": prep,
        "reading_score": reading,
        "writing_score": writing,
    })
}
