//! User prompt log. `prompt_length` records the pre-truncation size;
//! `word_count` is computed over the stored (post-truncation) text.

use rusqlite::params;

use super::SessionStore;
use super::TRUNCATE_LIMIT;
use super::now_ts;
use crate::error::Result;
use crate::output_scan::truncate_chars;

#[derive(Debug, Clone, PartialEq)]
pub struct UserPromptStats {
    pub total_prompts: i64,
    pub avg_length: f64,
    pub avg_word_count: f64,
    pub longest_prompt: i64,
}

impl SessionStore {
    pub fn insert_user_prompt(
        &self,
        session_id: Option<&str>,
        prompt: &str,
        cwd: Option<&str>,
    ) -> Result<i64> {
        let original_length = prompt.chars().count() as i64;
        let stored = truncate_chars(prompt, TRUNCATE_LIMIT);
        let word_count = stored.split_whitespace().count() as i64;

        let conn = self.conn();
        conn.execute(
            "INSERT INTO user_prompts (session_id, timestamp, prompt_text, prompt_length, word_count, cwd)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![session_id, now_ts(), stored, original_length, word_count, cwd],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_user_prompt_stats(&self) -> Result<UserPromptStats> {
        let conn = self.conn();
        conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(AVG(prompt_length), 0),
                    COALESCE(AVG(word_count), 0),
                    COALESCE(MAX(prompt_length), 0)
             FROM user_prompts",
            [],
            |row| {
                Ok(UserPromptStats {
                    total_prompts: row.get(0)?,
                    avg_length: row.get(1)?,
                    avg_word_count: row.get(2)?,
                    longest_prompt: row.get(3)?,
                })
            },
        )
        .map_err(Into::into)
    }
}
