//! Built-in course used when no catalog file is configured.
//!
//! Small on purpose: two blocks, a checkpoint on the first, enough to play the
//! whole progression path (problem → level → checkpoint → block → end).

use crate::domain::{Block, Checkpoint, Equation, InstructorNote, Level, Problem, ProblemBank, Values};

fn eq(parts: &[&str], equals: f64) -> Equation {
  Equation { parts: parts.iter().map(|s| s.to_string()).collect(), equals }
}

fn problem(id: &str, title: &str, equations: Vec<Equation>, solution: &[(&str, f64)], hints: &[&str]) -> Problem {
  let solution: Values = solution.iter().map(|(k, v)| (k.to_string(), *v)).collect();
  Problem {
    id: id.into(),
    title: Some(title.into()),
    equations,
    unknowns: solution.keys().cloned().collect(),
    solution,
    hints: hints.iter().map(|s| s.to_string()).collect(),
    checkpoint: false,
  }
}

pub fn seed_problem_bank() -> ProblemBank {
  ProblemBank {
    app_name: "VisuEquation".into(),
    app_description: "Solve shape equations, one step at a time.".into(),
    blocks: vec![
      Block {
        id: 1,
        title: "Shapes Have Values".into(),
        rationale: "Build the idea that a shape stands for one fixed number.".into(),
        levels: vec![
          Level {
            id: 1,
            title: "Twins".into(),
            focus: "Repeated shapes".into(),
            main_skill: "Single variable isolation".into(),
            mental_sentence: "If two shapes are the same, they have the same value.".into(),
            instructor_note: InstructorNote {
              common_errors: vec!["Adds the shapes instead of splitting the total.".into()],
              guiding_questions: vec!["How many stars make the total?".into()],
              intervention: "Cover one shape and ask what is left.".into(),
              limit_line: None,
            },
            problems: vec![
              problem(
                "1.1",
                "Star and circle",
                vec![eq(&["star", "star"], 6.0), eq(&["star", "circle"], 8.0)],
                &[("star", 3.0), ("circle", 5.0)],
                &["Two stars make 6.", "Once you know the star, look at the second line."],
              ),
              problem(
                "1.2",
                "Three triangles",
                vec![eq(&["triangle", "triangle", "triangle"], 12.0)],
                &[("triangle", 4.0)],
                &["Share 12 fairly between three triangles."],
              ),
            ],
          },
          Level {
            id: 2,
            title: "Chains".into(),
            focus: "Using one answer in the next line".into(),
            main_skill: "Cross-equation reasoning".into(),
            mental_sentence: "A value found in one line can be used in every line.".into(),
            instructor_note: InstructorNote {
              common_errors: vec!["Solves each line on its own.".into()],
              guiding_questions: vec!["Which line has only one kind of shape?".into()],
              intervention: "Start from the line with a single shape kind.".into(),
              limit_line: None,
            },
            problems: vec![
              problem(
                "1.3",
                "Square steps",
                vec![eq(&["square", "square"], 10.0), eq(&["square", "star"], 7.0)],
                &[("square", 5.0), ("star", 2.0)],
                &["Find the square first.", "Then take the square away from 7."],
              ),
              problem(
                "1.4",
                "Circle ladder",
                vec![
                  eq(&["circle", "circle"], 4.0),
                  eq(&["circle", "triangle"], 9.0),
                  eq(&["triangle", "square"], 8.0),
                ],
                &[("circle", 2.0), ("triangle", 7.0), ("square", 1.0)],
                &["Two circles make 4.", "Use the circle in the middle line."],
              ),
            ],
          },
        ],
        checkpoint: Some(Checkpoint {
          title: "Block 1 checkpoint".into(),
          problem: Problem {
            checkpoint: true,
            ..problem(
              "CP1",
              "Show what you know",
              vec![eq(&["star", "star", "star"], 9.0), eq(&["star", "circle"], 10.0)],
              &[("star", 3.0), ("circle", 7.0)],
              &[],
            )
          },
          pass_condition: "Solved without hints.".into(),
          fail_condition: "Repeat level 2.".into(),
        }),
      },
      Block {
        id: 2,
        title: "Balancing".into(),
        rationale: "Compare two sides that share shapes.".into(),
        levels: vec![Level {
          id: 1,
          title: "Differences".into(),
          focus: "Subtracting a shared shape".into(),
          main_skill: "Difference reasoning".into(),
          mental_sentence: "What changes between two lines tells you the value of the change.".into(),
          instructor_note: InstructorNote::default(),
          problems: vec![
            problem(
              "2.1",
              "One more circle",
              vec![eq(&["star", "circle"], 9.0), eq(&["star", "circle", "circle"], 13.0)],
              &[("star", 5.0), ("circle", 4.0)],
              &["Compare the two lines: what is different?"],
            ),
            problem(
              "2.2",
              "Square swap",
              vec![eq(&["square", "triangle"], 11.0), eq(&["square", "square", "triangle"], 17.0)],
              &[("square", 6.0), ("triangle", 5.0)],
              &["The second line has one extra square."],
            ),
          ],
        }],
        checkpoint: None,
      },
    ],
  }
}
