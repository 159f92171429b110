use std::path::Path;

use rusqlite::{Connection, params};

use lp_core::{
    Difficulty, DifficultyLedger, ModuleId, ModuleLedger, ProfileSnapshot, ProgressStore,
    QuestionReviewState, TopicId, TopicMap, TopicProgress, UnixSecs,
};

use crate::error::{Result, StoreError};
use crate::schema;

pub struct Store {
    conn: Connection,
}

type TopicRow = (String, String, bool, bool, bool, f64, Option<i64>);

struct ReviewRow {
    topic: String,
    question_id: String,
    difficulty: String,
    last_correct: bool,
    last_response_time: f64,
    attempts: i64,
    repetitions: i64,
    ease_factor: f64,
    interval_days: i64,
    last_reviewed: i64,
    review_count: i64,
    lapses: i64,
}

impl ReviewRow {
    fn into_state(self) -> std::result::Result<QuestionReviewState, String> {
        let count = |column: &str, value: i64| {
            u32::try_from(value).map_err(|_| format!("{column} out of range: {value}"))
        };
        Ok(QuestionReviewState {
            difficulty: self.difficulty.parse::<Difficulty>().map_err(|e| e.to_string())?,
            last_correct: self.last_correct,
            last_response_time: self.last_response_time,
            attempts: count("attempts", self.attempts)?,
            repetitions: count("repetitions", self.repetitions)?,
            ease_factor: self.ease_factor,
            interval_days: count("interval_days", self.interval_days)?,
            last_reviewed: from_sql_secs(self.last_reviewed),
            review_count: count("review_count", self.review_count)?,
            lapses: count("lapses", self.lapses)?,
            question_id: self.question_id,
        })
    }
}

/// Keep the rows SQLite could decode; log and drop the rest.
fn readable<T>(rows: impl Iterator<Item = rusqlite::Result<T>>, table: &str) -> Vec<T> {
    rows.filter_map(|row| match row {
        Ok(row) => Some(row),
        Err(e) => {
            tracing::warn!(table, "skipping unreadable row: {e}");
            None
        }
    })
    .collect()
}

fn to_sql_secs(ts: UnixSecs) -> i64 {
    i64::try_from(ts).unwrap_or(i64::MAX)
}

fn from_sql_secs(ts: i64) -> UnixSecs {
    u64::try_from(ts).unwrap_or(0)
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Save ---

    fn save_topic_on(&self, conn: &Connection, progress: &TopicProgress) -> Result<()> {
        let topic = progress.topic.as_str();
        conn.execute("DELETE FROM review_history WHERE topic = ?1", [topic])?;
        conn.execute("DELETE FROM topic_progress WHERE topic = ?1", [topic])?;
        conn.execute(
            "INSERT INTO topic_progress (topic, current_level, is_easy_completed, is_medium_completed,
                                         is_hard_completed, mastery_score, last_played)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                topic,
                progress.current_level.as_str(),
                progress.is_easy_completed,
                progress.is_medium_completed,
                progress.is_hard_completed,
                progress.mastery_score,
                progress.last_played.map(to_sql_secs),
            ],
        )?;

        let mut stmt = conn.prepare(
            "INSERT INTO review_history (topic, position, question_id, difficulty, last_correct,
                                         last_response_time, attempts, repetitions, ease_factor,
                                         interval_days, last_reviewed, review_count, lapses)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )?;
        for (position, r) in progress.history.iter().enumerate() {
            stmt.execute(params![
                topic,
                position as i64,
                r.question_id,
                r.difficulty.as_str(),
                r.last_correct,
                r.last_response_time,
                r.attempts,
                r.repetitions,
                r.ease_factor,
                r.interval_days,
                to_sql_secs(r.last_reviewed),
                r.review_count,
                r.lapses,
            ])?;
        }
        Ok(())
    }

    fn save_topics_on(&self, conn: &Connection, topics: &TopicMap) -> Result<()> {
        conn.execute_batch("DELETE FROM review_history; DELETE FROM topic_progress;")?;
        for progress in topics.values() {
            self.save_topic_on(conn, progress)?;
        }
        Ok(())
    }

    fn save_difficulty_ledger_on(&self, conn: &Connection, ledger: &DifficultyLedger) -> Result<()> {
        conn.execute("DELETE FROM difficulty_unlocks", [])?;
        let mut stmt =
            conn.prepare("INSERT INTO difficulty_unlocks (topic, difficulty) VALUES (?1, ?2)")?;
        for (topic, levels) in ledger {
            for level in levels {
                stmt.execute(params![topic.as_str(), level.as_str()])?;
            }
        }
        Ok(())
    }

    fn save_module_ledger_on(&self, conn: &Connection, ledger: &ModuleLedger) -> Result<()> {
        conn.execute("DELETE FROM module_unlocks", [])?;
        let mut stmt = conn.prepare("INSERT INTO module_unlocks (module) VALUES (?1)")?;
        for module in ledger {
            stmt.execute([module.as_str()])?;
        }
        Ok(())
    }

    // --- Load ---

    pub fn load_topics(&self) -> Result<TopicMap> {
        let mut stmt = self.conn.prepare(
            "SELECT topic, current_level, is_easy_completed, is_medium_completed,
                    is_hard_completed, mastery_score, last_played
             FROM topic_progress ORDER BY topic",
        )?;
        let rows: Vec<TopicRow> = readable(
            stmt.query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?,
            "topic_progress",
        );

        let mut topics = TopicMap::new();
        for (topic, level, easy, medium, hard, mastery, last_played) in rows {
            let Some(topic) = parse_topic(&topic) else {
                continue;
            };
            let Ok(current_level) = level.parse::<Difficulty>() else {
                tracing::warn!(%topic, %level, "skipping topic with unknown level");
                continue;
            };
            let progress = TopicProgress {
                topic: topic.clone(),
                current_level,
                is_easy_completed: easy,
                is_medium_completed: medium,
                is_hard_completed: hard,
                mastery_score: mastery,
                last_played: last_played.map(from_sql_secs),
                history: Vec::new(),
            };
            topics.insert(topic, progress);
        }

        for row in self.load_review_rows()? {
            let Ok(topic) = TopicId::new(&row.topic) else {
                continue;
            };
            let Some(progress) = topics.get_mut(&topic) else {
                continue;
            };
            let question_id = row.question_id.clone();
            match row.into_state() {
                Ok(state) => progress.history.push(state),
                Err(e) => tracing::warn!(%topic, %question_id, "skipping review: {e}"),
            }
        }

        Ok(topics)
    }

    fn load_review_rows(&self) -> Result<Vec<ReviewRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT topic, question_id, difficulty, last_correct, last_response_time, attempts,
                    repetitions, ease_factor, interval_days, last_reviewed, review_count, lapses
             FROM review_history ORDER BY topic, position",
        )?;
        let rows = readable(
            stmt.query_map([], |row| {
                Ok(ReviewRow {
                    topic: row.get(0)?,
                    question_id: row.get(1)?,
                    difficulty: row.get(2)?,
                    last_correct: row.get(3)?,
                    last_response_time: row.get(4)?,
                    attempts: row.get(5)?,
                    repetitions: row.get(6)?,
                    ease_factor: row.get(7)?,
                    interval_days: row.get(8)?,
                    last_reviewed: row.get(9)?,
                    review_count: row.get(10)?,
                    lapses: row.get(11)?,
                })
            })?,
            "review_history",
        );
        Ok(rows)
    }

    pub fn load_difficulty_ledger(&self) -> Result<DifficultyLedger> {
        let mut stmt = self
            .conn
            .prepare("SELECT topic, difficulty FROM difficulty_unlocks")?;
        let rows: Vec<(String, String)> = readable(
            stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?,
            "difficulty_unlocks",
        );

        let mut ledger = DifficultyLedger::new();
        for (topic, level) in rows {
            let Some(topic) = parse_topic(&topic) else {
                continue;
            };
            match level.parse::<Difficulty>() {
                Ok(level) => {
                    ledger.entry(topic).or_default().insert(level);
                }
                Err(e) => tracing::warn!(%topic, "skipping ledger entry: {e}"),
            }
        }
        Ok(ledger)
    }

    pub fn load_module_ledger(&self) -> Result<ModuleLedger> {
        let mut stmt = self.conn.prepare("SELECT module FROM module_unlocks")?;
        let rows: Vec<String> = readable(stmt.query_map([], |row| row.get(0))?, "module_unlocks");

        Ok(rows
            .iter()
            .filter_map(|m| match ModuleId::new(m) {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!(module = %m, "skipping module unlock: {e}");
                    None
                }
            })
            .collect())
    }

    /// The whole profile, as stored.
    pub fn load_snapshot(&self, exported_at: UnixSecs) -> Result<ProfileSnapshot> {
        Ok(ProfileSnapshot::new(
            &self.load_topics()?,
            &self.load_difficulty_ledger()?,
            &self.load_module_ledger()?,
            exported_at,
        ))
    }

    /// Replace both ledgers in one transaction. Topic rows are not touched.
    pub fn save_ledgers(
        &self,
        difficulty: &DifficultyLedger,
        modules: &ModuleLedger,
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        self.save_difficulty_ledger_on(&tx, difficulty)?;
        self.save_module_ledger_on(&tx, modules)?;
        tx.commit()?;
        Ok(())
    }

    /// Replace the whole profile in one transaction.
    pub fn save_snapshot(&self, snapshot: &ProfileSnapshot) -> Result<()> {
        let (topics, difficulty, modules) = snapshot.clone().into_parts();
        let tx = self.conn.unchecked_transaction()?;
        self.save_topics_on(&tx, &topics)?;
        self.save_difficulty_ledger_on(&tx, &difficulty)?;
        self.save_module_ledger_on(&tx, &modules)?;
        tx.commit()?;
        Ok(())
    }

    pub fn topic_count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM topic_progress", [], |row| row.get(0))?;
        usize::try_from(n).map_err(|_| StoreError::InvalidData(format!("bad row count {n}")))
    }
}

fn parse_topic(raw: &str) -> Option<TopicId> {
    match TopicId::new(raw) {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(topic = raw, "skipping stored row: {e}");
            None
        }
    }
}

impl ProgressStore for Store {
    type Error = StoreError;

    fn load_topics(&self) -> Result<TopicMap> {
        Store::load_topics(self)
    }

    fn save_topics(&self, topics: &TopicMap) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        self.save_topics_on(&tx, topics)?;
        tx.commit()?;
        Ok(())
    }

    fn save_topic(&self, progress: &TopicProgress) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        self.save_topic_on(&tx, progress)?;
        tx.commit()?;
        Ok(())
    }

    fn load_difficulty_ledger(&self) -> Result<DifficultyLedger> {
        Store::load_difficulty_ledger(self)
    }

    fn save_difficulty_ledger(&self, ledger: &DifficultyLedger) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        self.save_difficulty_ledger_on(&tx, ledger)?;
        tx.commit()?;
        Ok(())
    }

    fn load_module_ledger(&self) -> Result<ModuleLedger> {
        Store::load_module_ledger(self)
    }

    fn save_module_ledger(&self, ledger: &ModuleLedger) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        self.save_module_ledger_on(&tx, ledger)?;
        tx.commit()?;
        Ok(())
    }

    fn save_ledgers(
        &self,
        difficulty: &DifficultyLedger,
        modules: &ModuleLedger,
    ) -> Result<()> {
        Store::save_ledgers(self, difficulty, modules)
    }

    fn save_snapshot(&self, snapshot: &ProfileSnapshot) -> Result<()> {
        Store::save_snapshot(self, snapshot)
    }
}
