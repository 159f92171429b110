use std::collections::BTreeMap;
use std::sync::Arc;

use lp_core::{
    Difficulty, ModuleId, ProgressionEngine, StaticStats, TopicId, export_json, import_json,
};
use lp_store::Store;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct LpServer {
    engine: Arc<Mutex<ProgressionEngine<Store>>>,
    tool_router: ToolRouter<Self>,
}

impl LpServer {
    pub fn new(engine: ProgressionEngine<Store>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            tool_router: Self::tool_router(),
        }
    }
}

fn topic_param(raw: &str) -> Result<TopicId, McpError> {
    TopicId::new(raw).map_err(|e| McpError::invalid_params(format!("topic: {e}"), None))
}

fn difficulty_param(raw: &str) -> Result<Difficulty, McpError> {
    raw.parse::<Difficulty>()
        .map_err(|e| McpError::invalid_params(e.to_string(), None))
}

fn saved<T>(result: lp_core::Result<T>) -> Result<T, McpError> {
    result.map_err(|e| McpError::internal_error(e.to_string(), None))
}

fn json_result(value: &impl serde::Serialize) -> CallToolResult {
    CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(value).unwrap_or_default(),
    )])
}

// --- Tool parameter types ---

#[derive(Debug, Deserialize, JsonSchema)]
struct RecordAnswerRequest {
    /// Topic the question belongs to
    topic: String,
    /// Stable question identifier
    question_id: String,
    /// "easy", "medium" or "hard"
    difficulty: String,
    correct: bool,
    /// Seconds the learner took to answer
    response_time: f64,
    /// Tries needed, defaults to 1
    attempts: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UpdateTopicRequest {
    topic: String,
    /// Difficulty of the finished run
    difficulty: String,
    /// Whether the run was played to the end
    completed: bool,
    /// Run accuracy, 0 to 1
    accuracy: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct EvaluateUnlocksRequest {
    topic: String,
    /// Correct answers in the session
    score: u32,
    /// Mean response time in seconds
    avg_response_time: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct EvaluateModulesRequest {
    /// Overall accuracy, 0 to 1. Omit all fields to use this profile's own figures.
    accuracy: Option<f64>,
    level: Option<u32>,
    /// Mastery per module id, 0 to 1
    mastery: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct TopicRequest {
    topic: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ProgressRequest {
    /// Omit for every topic
    topic: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AccessRequest {
    topic: String,
    difficulty: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ImportRequest {
    /// Profile snapshot as produced by lp_export
    snapshot: serde_json::Value,
}

#[tool_router]
impl LpServer {
    #[tool(
        description = "Record one answer. Reschedules the question for review and counts the answer toward an open session on the same topic."
    )]
    async fn lp_record_answer(
        &self,
        Parameters(req): Parameters<RecordAnswerRequest>,
    ) -> Result<CallToolResult, McpError> {
        let topic = topic_param(&req.topic)?;
        let difficulty = difficulty_param(&req.difficulty)?;
        let mut engine = self.engine.lock().await;
        let state = saved(engine.record_answer(
            &topic,
            &req.question_id,
            difficulty,
            req.correct,
            req.response_time,
            req.attempts.unwrap_or(1),
        ))?;

        let mut result = serde_json::to_value(&state).unwrap_or_default();
        result["dueAt"] = serde_json::json!(state.due_at());
        Ok(json_result(&result))
    }

    #[tool(
        description = "Report a finished run on a topic at one difficulty. Updates mastery and, if accuracy met the threshold, completes the difficulty and advances the level."
    )]
    async fn lp_update_topic(
        &self,
        Parameters(req): Parameters<UpdateTopicRequest>,
    ) -> Result<CallToolResult, McpError> {
        let topic = topic_param(&req.topic)?;
        let difficulty = difficulty_param(&req.difficulty)?;
        let mut engine = self.engine.lock().await;
        let update = saved(engine.update_topic_progress(
            &topic,
            difficulty,
            req.completed,
            req.accuracy,
        ))?;

        Ok(json_result(&serde_json::json!({
            "update": update,
            "progress": engine.topic_progress(&topic),
        })))
    }

    #[tool(
        description = "Evaluate score/speed unlocks for a topic. Returns newly unlocked difficulties. Unlocks are never revoked."
    )]
    async fn lp_evaluate_unlocks(
        &self,
        Parameters(req): Parameters<EvaluateUnlocksRequest>,
    ) -> Result<CallToolResult, McpError> {
        let topic = topic_param(&req.topic)?;
        let mut engine = self.engine.lock().await;
        let newly = saved(engine.evaluate_difficulty_unlocks(
            &topic,
            req.score,
            req.avg_response_time,
        ))?;

        Ok(json_result(&serde_json::json!({
            "newlyUnlocked": newly,
            "unlocked": engine.unlocked_levels(&topic),
        })))
    }

    #[tool(
        description = "Evaluate module unlocks, either from supplied learner figures or, with no arguments, from this profile's own progress."
    )]
    async fn lp_evaluate_modules(
        &self,
        Parameters(req): Parameters<EvaluateModulesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut engine = self.engine.lock().await;
        let evaluation = if req.accuracy.is_none() && req.level.is_none() && req.mastery.is_none()
        {
            saved(engine.evaluate_module_unlocks_derived())?
        } else {
            let mut mastery = BTreeMap::new();
            for (raw, value) in req.mastery.unwrap_or_default() {
                let id = ModuleId::new(&raw)
                    .map_err(|e| McpError::invalid_params(format!("module: {e}"), None))?;
                mastery.insert(id, value);
            }
            let stats = StaticStats {
                accuracy: req.accuracy.unwrap_or(0.0),
                level: req.level.unwrap_or(0),
                mastery,
            };
            saved(engine.evaluate_module_unlocks(&stats))?
        };

        let modules: BTreeMap<String, bool> = engine
            .modules()
            .into_iter()
            .map(|m| {
                let open = engine.is_module_unlocked(&m);
                (m.to_string(), open)
            })
            .collect();
        Ok(json_result(&serde_json::json!({
            "gatePassed": evaluation.gate_passed,
            "newlyUnlocked": evaluation.newly_unlocked,
            "modules": modules,
        })))
    }

    #[tool(description = "Start a play session on a topic. Replaces any open session.")]
    async fn lp_begin_session(
        &self,
        Parameters(req): Parameters<TopicRequest>,
    ) -> Result<CallToolResult, McpError> {
        let topic = topic_param(&req.topic)?;
        self.engine.lock().await.begin_session(&topic);
        Ok(json_result(&serde_json::json!({ "session": topic })))
    }

    #[tool(
        description = "End the open session and evaluate score/speed unlocks from it. Returns null if no session was open."
    )]
    async fn lp_end_session(&self) -> Result<CallToolResult, McpError> {
        let mut engine = self.engine.lock().await;
        let summary = saved(engine.end_session())?;
        Ok(json_result(&summary))
    }

    #[tool(
        description = "Progress for one topic (level, completion flags, mastery, unlocked difficulties), or for every topic plus overall progress when no topic is given."
    )]
    async fn lp_progress(
        &self,
        Parameters(req): Parameters<ProgressRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut engine = self.engine.lock().await;
        let topics: Vec<TopicId> = match req.topic {
            Some(raw) => vec![topic_param(&raw)?],
            None => engine.topics().map(|p| p.topic.clone()).collect(),
        };

        let mut entries = Vec::with_capacity(topics.len());
        for topic in &topics {
            let summary = engine.topic_progress(topic);
            entries.push(serde_json::json!({
                "progress": summary,
                "unlocked": engine.unlocked_levels(topic),
                "mastered": engine.is_topic_mastered(topic),
            }));
        }

        Ok(json_result(&serde_json::json!({
            "topics": entries,
            "overallProgress": engine.overall_progress(),
        })))
    }

    #[tool(
        description = "Whether a difficulty of a topic is playable, with both underlying checks: completion flags and the score/speed ledger."
    )]
    async fn lp_access(
        &self,
        Parameters(req): Parameters<AccessRequest>,
    ) -> Result<CallToolResult, McpError> {
        let topic = topic_param(&req.topic)?;
        let difficulty = difficulty_param(&req.difficulty)?;
        let engine = self.engine.lock().await;
        Ok(json_result(&serde_json::json!({
            "canAccessLevel": engine.can_access_level(&topic, difficulty),
            "isUnlocked": engine.is_unlocked(&topic, difficulty),
            "canPlay": engine.can_play(&topic, difficulty),
        })))
    }

    #[tool(description = "Questions of a topic due for review now, most overdue first.")]
    async fn lp_due(
        &self,
        Parameters(req): Parameters<TopicRequest>,
    ) -> Result<CallToolResult, McpError> {
        let topic = topic_param(&req.topic)?;
        let engine = self.engine.lock().await;
        Ok(json_result(&engine.due_reviews(&topic)))
    }

    #[tool(description = "Clear every difficulty and module unlock. Topic progress is kept.")]
    async fn lp_lock_all(&self) -> Result<CallToolResult, McpError> {
        saved(self.engine.lock().await.lock_all())?;
        Ok(json_result(&serde_json::json!({ "locked": true })))
    }

    #[tool(
        description = "Unlock every difficulty of every known topic and every configured module. Topic progress is kept."
    )]
    async fn lp_unlock_all(&self) -> Result<CallToolResult, McpError> {
        saved(self.engine.lock().await.unlock_all())?;
        Ok(json_result(&serde_json::json!({ "unlocked": true })))
    }

    #[tool(description = "Export the whole profile as a JSON snapshot.")]
    async fn lp_export(&self) -> Result<CallToolResult, McpError> {
        let engine = self.engine.lock().await;
        let json = export_json(&engine.snapshot())
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Replace the whole profile with a JSON snapshot from lp_export.")]
    async fn lp_import(
        &self,
        Parameters(req): Parameters<ImportRequest>,
    ) -> Result<CallToolResult, McpError> {
        let json = serde_json::to_string(&req.snapshot)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        let snapshot = import_json(&json)
            .map_err(|e| McpError::invalid_params(format!("invalid snapshot: {e}"), None))?;

        let mut engine = self.engine.lock().await;
        saved(engine.import_snapshot(snapshot))?;
        Ok(json_result(&serde_json::json!({
            "imported": true,
            "topics": engine.topics().count(),
        })))
    }
}

#[tool_handler]
impl ServerHandler for LpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Learning progression engine for one learner profile.\n\n\
                 FLOW:\n\
                 1. Call lp_begin_session when the learner starts a topic.\n\
                 2. Call lp_record_answer for every answer.\n\
                 3. Call lp_update_topic when a run at one difficulty finishes.\n\
                 4. Call lp_end_session to evaluate score/speed unlocks.\n\
                 5. Before offering a difficulty, check lp_access (canPlay).\n\n\
                 Locked difficulties and unknown topics are not errors; they read as false or as defaults."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lp_core::{EngineConfig, ModuleConfig, ModuleDef};

    fn make_server() -> LpServer {
        let config = EngineConfig {
            modules: ModuleConfig {
                modules: vec![ModuleDef {
                    id: ModuleId::new("basics").unwrap(),
                    topics: vec![TopicId::new("verbs").unwrap()],
                }],
                ..ModuleConfig::default()
            },
            ..EngineConfig::default()
        };
        LpServer::new(ProgressionEngine::open(Store::open_in_memory().unwrap(), config))
    }

    fn text_from_result(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|c| match &c.raw {
                RawContent::Text(t) => Some(t.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    fn parse_result(result: &CallToolResult) -> serde_json::Value {
        let text = text_from_result(result);
        serde_json::from_str(&text).expect("handler should return valid JSON")
    }

    fn access(topic: &str, difficulty: &str) -> Parameters<AccessRequest> {
        Parameters(AccessRequest {
            topic: topic.to_string(),
            difficulty: difficulty.to_string(),
        })
    }

    #[tokio::test]
    async fn test_progress_of_fresh_topic() {
        let server = make_server();
        let json = parse_result(
            &server
                .lp_progress(Parameters(ProgressRequest {
                    topic: Some("Verbs".to_string()),
                }))
                .await
                .unwrap(),
        );

        let progress = &json["topics"][0]["progress"];
        assert_eq!(progress["topic"], "verbs");
        assert_eq!(progress["currentLevel"], "easy");
        assert_eq!(progress["isEasyCompleted"], false);
        assert_eq!(json["topics"][0]["unlocked"][0], "easy");
    }

    #[tokio::test]
    async fn test_record_answer_schedules() {
        let server = make_server();
        let json = parse_result(
            &server
                .lp_record_answer(Parameters(RecordAnswerRequest {
                    topic: "verbs".to_string(),
                    question_id: "v-1".to_string(),
                    difficulty: "easy".to_string(),
                    correct: true,
                    response_time: 2.0,
                    attempts: None,
                }))
                .await
                .unwrap(),
        );

        assert_eq!(json["repetitions"], 1);
        assert_eq!(json["intervalDays"], 1);
        assert!((json["easeFactor"].as_f64().unwrap() - 2.36).abs() < 1e-9);
        assert!(json["dueAt"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_update_topic_opens_medium() {
        let server = make_server();
        let before = parse_result(&server.lp_access(access("verbs", "medium")).await.unwrap());
        assert_eq!(before["canPlay"], false);

        let json = parse_result(
            &server
                .lp_update_topic(Parameters(UpdateTopicRequest {
                    topic: "verbs".to_string(),
                    difficulty: "easy".to_string(),
                    completed: true,
                    accuracy: 0.9,
                }))
                .await
                .unwrap(),
        );
        assert_eq!(json["update"]["newlyCompleted"], "easy");
        assert_eq!(json["progress"]["currentLevel"], "medium");

        let after = parse_result(&server.lp_access(access("verbs", "medium")).await.unwrap());
        assert_eq!(after["canAccessLevel"], true);
        assert_eq!(after["isUnlocked"], false);
        assert_eq!(after["canPlay"], true);
    }

    #[tokio::test]
    async fn test_session_unlocks_medium() {
        let server = make_server();
        server
            .lp_begin_session(Parameters(TopicRequest {
                topic: "verbs".to_string(),
            }))
            .await
            .unwrap();
        for i in 0..5 {
            server
                .lp_record_answer(Parameters(RecordAnswerRequest {
                    topic: "verbs".to_string(),
                    question_id: format!("v-{i}"),
                    difficulty: "easy".to_string(),
                    correct: true,
                    response_time: 4.0,
                    attempts: Some(1),
                }))
                .await
                .unwrap();
        }

        let json = parse_result(&server.lp_end_session().await.unwrap());
        assert_eq!(json["stats"]["correct"], 5);
        assert_eq!(json["newlyUnlocked"][1], "medium");

        let none = parse_result(&server.lp_end_session().await.unwrap());
        assert!(none.is_null());
    }

    #[tokio::test]
    async fn test_evaluate_unlocks_scenario() {
        let server = make_server();
        let json = parse_result(
            &server
                .lp_evaluate_unlocks(Parameters(EvaluateUnlocksRequest {
                    topic: "verbs".to_string(),
                    score: 6,
                    avg_response_time: 5.0,
                }))
                .await
                .unwrap(),
        );
        assert_eq!(json["newlyUnlocked"], serde_json::json!(["easy", "medium"]));
        assert_eq!(json["unlocked"], serde_json::json!(["easy", "medium"]));
    }

    #[tokio::test]
    async fn test_evaluate_modules_with_figures() {
        let server = make_server();
        let json = parse_result(
            &server
                .lp_evaluate_modules(Parameters(EvaluateModulesRequest {
                    accuracy: Some(0.9),
                    level: Some(5),
                    mastery: Some([("basics".to_string(), 0.85)].into_iter().collect()),
                }))
                .await
                .unwrap(),
        );
        assert_eq!(json["gatePassed"], true);
        assert_eq!(json["newlyUnlocked"][0], "basics");
        assert_eq!(json["modules"]["basics"], true);
    }

    #[tokio::test]
    async fn test_evaluate_modules_derived_on_empty_profile() {
        let server = make_server();
        let json = parse_result(
            &server
                .lp_evaluate_modules(Parameters(EvaluateModulesRequest {
                    accuracy: None,
                    level: None,
                    mastery: None,
                }))
                .await
                .unwrap(),
        );
        assert_eq!(json["gatePassed"], false);
        assert_eq!(json["modules"]["basics"], false);
    }

    #[tokio::test]
    async fn test_invalid_params_rejected() {
        let server = make_server();
        assert!(server.lp_access(access("no spaces?", "easy")).await.is_err());
        assert!(server.lp_access(access("verbs", "legendary")).await.is_err());
    }

    #[tokio::test]
    async fn test_unlock_all_then_lock_all() {
        let server = make_server();
        server
            .lp_progress(Parameters(ProgressRequest {
                topic: Some("verbs".to_string()),
            }))
            .await
            .unwrap();
        server.lp_unlock_all().await.unwrap();
        let json = parse_result(&server.lp_access(access("verbs", "hard")).await.unwrap());
        assert_eq!(json["isUnlocked"], true);

        server.lp_lock_all().await.unwrap();
        let json = parse_result(&server.lp_access(access("verbs", "hard")).await.unwrap());
        assert_eq!(json["isUnlocked"], false);
    }

    #[tokio::test]
    async fn test_export_import_roundtrip() {
        let server = make_server();
        server
            .lp_update_topic(Parameters(UpdateTopicRequest {
                topic: "verbs".to_string(),
                difficulty: "easy".to_string(),
                completed: true,
                accuracy: 1.0,
            }))
            .await
            .unwrap();
        let exported = parse_result(&server.lp_export().await.unwrap());
        assert_eq!(exported["version"], lp_core::SNAPSHOT_VERSION);

        let other = make_server();
        let json = parse_result(
            &other
                .lp_import(Parameters(ImportRequest { snapshot: exported }))
                .await
                .unwrap(),
        );
        assert_eq!(json["topics"], 1);
        let opened = parse_result(&other.lp_access(access("verbs", "medium")).await.unwrap());
        assert_eq!(opened["canAccessLevel"], true);
    }

    #[tokio::test]
    async fn test_import_rejects_garbage() {
        let server = make_server();
        let result = server
            .lp_import(Parameters(ImportRequest {
                snapshot: serde_json::json!({"topics": "nope"}),
            }))
            .await;
        assert!(result.is_err());
    }
}
