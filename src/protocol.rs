//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.
//!
//! Problem views never carry the solution.

use serde::{Deserialize, Serialize};

use crate::assist::{AssistReply, ReportReply};
use crate::catalog::Catalog;
use crate::domain::{Equation, Problem};
use crate::evaluation::RawValues;
use crate::session::{HintOutcome, Phase, ProgressState, SubmitOutcome, Transition};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GetCatalog,
    GetSession {
        #[serde(rename = "studentId")]
        student_id: String,
    },
    SubmitAnswer {
        #[serde(rename = "studentId")]
        student_id: String,
        values: RawValues,
    },
    Hint {
        #[serde(rename = "studentId")]
        student_id: String,
    },
    Advance {
        #[serde(rename = "studentId")]
        student_id: String,
    },
    Select {
        #[serde(rename = "studentId")]
        student_id: String,
        #[serde(rename = "blockId")]
        block_id: u32,
        #[serde(rename = "levelId")]
        level_id: u32,
        #[serde(rename = "problemId")]
        problem_id: String,
    },
    Reset {
        #[serde(rename = "studentId")]
        student_id: String,
    },
    Assist {
        #[serde(rename = "studentId")]
        student_id: String,
    },
    Report {
        #[serde(rename = "studentId")]
        student_id: String,
        #[serde(rename = "studentName", default)]
        student_name: Option<String>,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Catalog {
        catalog: CatalogOut,
    },
    Session {
        session: SessionOut,
    },
    AnswerResult(CommandOut<SubmitOutcome>),
    Hint(CommandOut<HintOutcome>),
    Advanced(CommandOut<Transition>),
    Selected(CommandOut<()>),
    Reset(CommandOut<()>),
    Assist {
        reply: AssistReply,
    },
    Report {
        reply: ReportReply,
    },
    Error {
        message: String,
    },
}

/// Public rendering of a problem.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemOut {
    pub id: String,
    pub title: Option<String>,
    pub equations: Vec<Equation>,
    pub unknowns: Vec<String>,
    pub hint_count: usize,
    pub checkpoint: bool,
}

pub fn problem_view(p: &Problem, on_checkpoint: bool) -> ProblemOut {
    ProblemOut {
        id: p.id.clone(),
        title: p.title.clone(),
        equations: p.equations.clone(),
        unknowns: p.unknowns.clone(),
        hint_count: if on_checkpoint { 0 } else { p.hints.len() },
        checkpoint: on_checkpoint,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub student_id: String,
    pub phase: Phase,
    pub progress: ProgressState,
    /// None once the course is complete.
    pub problem: Option<ProblemOut>,
}

/// Result of a mutating command: its value, non-fatal warnings, and the session after it.
#[derive(Debug, Serialize)]
pub struct CommandOut<T> {
    pub result: T,
    pub warnings: Vec<String>,
    pub session: SessionOut,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogOut {
    pub app_name: String,
    pub app_description: String,
    pub blocks: Vec<BlockOut>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockOut {
    pub id: u32,
    pub title: String,
    pub rationale: String,
    pub levels: Vec<LevelOut>,
    pub checkpoint: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelOut {
    pub id: u32,
    pub title: String,
    pub focus: String,
    pub main_skill: String,
    pub mental_sentence: String,
    pub problems: Vec<String>,
}

/// Course outline for navigation sidebars.
pub fn catalog_outline(catalog: &Catalog) -> CatalogOut {
    CatalogOut {
        app_name: catalog.app_name().to_string(),
        app_description: catalog.app_description().to_string(),
        blocks: catalog
            .blocks()
            .iter()
            .map(|b| BlockOut {
                id: b.id,
                title: b.title.clone(),
                rationale: b.rationale.clone(),
                levels: b
                    .levels
                    .iter()
                    .map(|l| LevelOut {
                        id: l.id,
                        title: l.title.clone(),
                        focus: l.focus.clone(),
                        main_skill: l.main_skill.clone(),
                        mental_sentence: l.mental_sentence.clone(),
                        problems: l.problem_ids().map(str::to_string).collect(),
                    })
                    .collect(),
                checkpoint: b.checkpoint.as_ref().map(|c| c.problem.id.clone()),
            })
            .collect(),
    }
}

//
// HTTP request DTOs
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentQuery {
    pub student_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub student_id: String,
    #[serde(default)]
    pub student_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentIn {
    pub student_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerIn {
    pub student_id: String,
    pub values: RawValues,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectIn {
    pub student_id: String,
    pub block_id: u32,
    pub level_id: u32,
    pub problem_id: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub coach: &'static str,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeds::seed_problem_bank;

    #[test]
    fn ws_messages_use_camel_case_fields() {
        let msg: ClientWsMessage = serde_json::from_str(
            r#"{ "type": "select", "studentId": "s1", "blockId": 1, "levelId": 2, "problemId": "1.3" }"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientWsMessage::Select { level_id: 2, .. }));

        let msg: ClientWsMessage =
            serde_json::from_str(r#"{ "type": "submit_answer", "studentId": "s1", "values": { "star": "3" } }"#).unwrap();
        assert!(matches!(msg, ClientWsMessage::SubmitAnswer { values, .. } if values.len() == 1));
    }

    #[test]
    fn problem_view_hides_the_solution() {
        let bank = seed_problem_bank();
        let p = &bank.blocks[0].levels[0].problems[0];
        let json = serde_json::to_value(problem_view(p, false)).unwrap();
        assert!(json.get("solution").is_none());
        assert_eq!(json["hintCount"], p.hints.len());
    }

    #[test]
    fn outline_lists_checkpoints() {
        let catalog = Catalog::new(seed_problem_bank()).unwrap();
        let out = catalog_outline(&catalog);
        assert_eq!(out.blocks.len(), 2);
        assert_eq!(out.blocks[0].checkpoint.as_deref(), Some("CP1"));
        assert!(out.blocks[1].checkpoint.is_none());
    }

    #[test]
    fn error_reply_shape() {
        let out = serde_json::to_value(ServerWsMessage::Error { message: "nope".into() }).unwrap();
        assert_eq!(out, serde_json::json!({ "type": "error", "message": "nope" }));
    }
}
