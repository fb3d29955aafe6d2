//! `comments` plugin: comments and comment likes attached to record tokens.
//!
//! Write commands (`newcomment`, `likecomment`, `censorcomment`) are applied
//! together with the write path's reply, which supplies the comment id, the
//! server receipt and the timestamp. A user's likes on one comment fold into a
//! single vote: repeating the same action withdraws it.

use rusqlite::{params, OptionalExtension, Row, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use vellum_core::{Column, Index, TableSchema};

use crate::error::{CacheError, CacheResult};
use crate::plugin::{Plugin, PluginDriver};
use crate::plugins::parse;

pub const COMMENTS_PLUGIN_ID: &str = "comments";

pub const CMD_NEW_COMMENT: &str = "newcomment";
pub const CMD_GET_COMMENT: &str = "getcomment";
pub const CMD_GET_COMMENTS: &str = "getcomments";
pub const CMD_LIKE_COMMENT: &str = "likecomment";
pub const CMD_CENSOR_COMMENT: &str = "censorcomment";
pub const CMD_GET_LIKE_COUNTS: &str = "getlikecounts";

/// Setting: maximum comment length in characters.
pub const SETTING_MAX_COMMENT_LENGTH: &str = "maxcommentlength";

const COMMENTS_TABLE: TableSchema = TableSchema {
    name: "comments",
    columns: &[
        Column::text("key").primary_key(),
        Column::text("token").not_null(),
        Column::text("parentid").not_null(),
        Column::text("comment").not_null(),
        Column::text("signature").not_null(),
        Column::text("publickey").not_null(),
        Column::text("commentid").not_null(),
        Column::text("receipt").not_null(),
        Column::integer("timestamp").not_null(),
        Column::integer("censored").not_null(),
    ],
    indexes: &[Index {
        name: "idx_comments_token",
        columns: &["token"],
    }],
};

const LIKES_TABLE: TableSchema = TableSchema {
    name: "comment_likes",
    columns: &[
        Column::text("token").not_null(),
        Column::text("commentid").not_null(),
        Column::text("action").not_null(),
        Column::text("signature").not_null(),
        Column::text("publickey").not_null(),
        Column::text("receipt").not_null(),
        Column::integer("timestamp").not_null(),
    ],
    indexes: &[Index {
        name: "idx_comment_likes_comment",
        columns: &["token", "commentid"],
    }],
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub token: String,
    #[serde(rename = "parentid", default)]
    pub parent_id: String,
    pub comment: String,
    pub signature: String,
    #[serde(rename = "publickey")]
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommentReply {
    #[serde(rename = "commentid")]
    pub comment_id: String,
    pub receipt: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub token: String,
    #[serde(rename = "parentid")]
    pub parent_id: String,
    pub comment: String,
    pub signature: String,
    #[serde(rename = "publickey")]
    pub public_key: String,
    #[serde(rename = "commentid")]
    pub comment_id: String,
    pub receipt: String,
    pub timestamp: i64,
    #[serde(rename = "totalvotes", default)]
    pub total_votes: u64,
    #[serde(rename = "resultvotes", default)]
    pub result_votes: i64,
    #[serde(default)]
    pub censored: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeComment {
    pub token: String,
    #[serde(rename = "commentid")]
    pub comment_id: String,
    /// "1" upvote, "-1" downvote.
    pub action: String,
    pub signature: String,
    #[serde(rename = "publickey")]
    pub public_key: String,
    #[serde(default)]
    pub receipt: String,
    #[serde(default)]
    pub timestamp: i64,
}

/// Write-path confirmation for likes and censorship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReceipt {
    pub receipt: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CensorComment {
    pub token: String,
    #[serde(rename = "commentid")]
    pub comment_id: String,
    #[serde(default)]
    pub reason: String,
    pub signature: String,
    #[serde(rename = "publickey")]
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRef {
    pub token: String,
    #[serde(rename = "commentid")]
    pub comment_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRef {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCommentsReply {
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeCounts {
    pub upvotes: u64,
    pub downvotes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeCommentReply {
    pub total: u64,
    pub result: i64,
}

/// Full history replayed by `PluginBuild`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentsJournal {
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub likes: Vec<LikeComment>,
}

#[derive(Debug, Clone, Default)]
pub struct CommentsPlugin {
    max_comment_length: Option<usize>,
}

fn comment_key(token: &str, comment_id: &str) -> String {
    format!("{token}{comment_id}")
}

fn action_value(action: &str) -> CacheResult<i64> {
    match action.trim() {
        "1" => Ok(1),
        "-1" => Ok(-1),
        other => Err(CacheError::Plugin(format!("invalid like action {other:?}"))),
    }
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        token: row.get(0)?,
        parent_id: row.get(1)?,
        comment: row.get(2)?,
        signature: row.get(3)?,
        public_key: row.get(4)?,
        comment_id: row.get(5)?,
        receipt: row.get(6)?,
        timestamp: row.get(7)?,
        total_votes: 0,
        result_votes: 0,
        censored: row.get::<_, i64>(8)? != 0,
    })
}

const COMMENT_COLUMNS: &str =
    "token, parentid, comment, signature, publickey, commentid, receipt, timestamp, censored";

impl CommentsPlugin {
    pub fn from_plugin(plugin: &Plugin) -> CacheResult<Self> {
        let max_comment_length = match plugin.setting(SETTING_MAX_COMMENT_LENGTH) {
            Some(v) => Some(v.trim().parse::<usize>().map_err(|_| {
                CacheError::Plugin(format!("{SETTING_MAX_COMMENT_LENGTH} must be an integer, got {v:?}"))
            })?),
            None => None,
        };
        Ok(Self { max_comment_length })
    }

    fn insert_comment(tx: &Transaction<'_>, c: &Comment) -> CacheResult<()> {
        tx.execute(
            "INSERT INTO comments (key, token, parentid, comment, signature, publickey, commentid, receipt, timestamp, censored)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                comment_key(&c.token, &c.comment_id),
                c.token,
                c.parent_id,
                c.comment,
                c.signature,
                c.public_key,
                c.comment_id,
                c.receipt,
                c.timestamp,
                c.censored as i64,
            ],
        )?;
        Ok(())
    }

    fn insert_like(tx: &Transaction<'_>, l: &LikeComment) -> CacheResult<()> {
        tx.execute(
            "INSERT INTO comment_likes (token, commentid, action, signature, publickey, receipt, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![l.token, l.comment_id, l.action, l.signature, l.public_key, l.receipt, l.timestamp],
        )?;
        Ok(())
    }

    fn find_comment(tx: &Transaction<'_>, token: &str, comment_id: &str) -> CacheResult<Option<Comment>> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE key = ?1");
        Ok(tx
            .query_row(&sql, params![comment_key(token, comment_id)], comment_from_row)
            .optional()?)
    }

    fn require_comment(tx: &Transaction<'_>, token: &str, comment_id: &str) -> CacheResult<Comment> {
        Self::find_comment(tx, token, comment_id)?
            .ok_or_else(|| CacheError::Plugin(format!("comment {comment_id} not found on {token}")))
    }

    fn like_counts(tx: &Transaction<'_>, token: &str, comment_id: &str) -> CacheResult<LikeCounts> {
        let mut stmt = tx.prepare(
            "SELECT publickey, action FROM comment_likes
             WHERE token = ?1 AND commentid = ?2 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![token, comment_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut votes: HashMap<String, i64> = HashMap::new();
        for row in rows {
            let (public_key, action) = row?;
            let action = action_value(&action)?;
            let current = votes.entry(public_key).or_insert(0);
            *current = if *current == action { 0 } else { action };
        }
        let mut counts = LikeCounts::default();
        for v in votes.values() {
            match v {
                1 => counts.upvotes += 1,
                -1 => counts.downvotes += 1,
                _ => {}
            }
        }
        Ok(counts)
    }

    fn with_votes(tx: &Transaction<'_>, mut c: Comment) -> CacheResult<Comment> {
        let counts = Self::like_counts(tx, &c.token, &c.comment_id)?;
        c.total_votes = counts.upvotes + counts.downvotes;
        c.result_votes = counts.upvotes as i64 - counts.downvotes as i64;
        Ok(c)
    }

    fn new_comment(&self, tx: &Transaction<'_>, payload: &str, reply: &str) -> CacheResult<String> {
        let nc: NewComment = parse(CMD_NEW_COMMENT, payload)?;
        let ncr: NewCommentReply = parse("newcomment reply", reply)?;
        if ncr.comment_id.is_empty() {
            return Err(CacheError::Plugin("reply carries no comment id".into()));
        }
        if let Some(max) = self.max_comment_length {
            if nc.comment.chars().count() > max {
                return Err(CacheError::Plugin(format!("comment exceeds {max} characters")));
            }
        }
        if !nc.parent_id.is_empty() && nc.parent_id != "0" {
            Self::require_comment(tx, &nc.token, &nc.parent_id)?;
        }
        if Self::find_comment(tx, &nc.token, &ncr.comment_id)?.is_some() {
            return Err(CacheError::Plugin(format!(
                "comment {} already exists on {}",
                ncr.comment_id, nc.token
            )));
        }

        let comment = Comment {
            token: nc.token,
            parent_id: nc.parent_id,
            comment: nc.comment,
            signature: nc.signature,
            public_key: nc.public_key,
            comment_id: ncr.comment_id,
            receipt: ncr.receipt,
            timestamp: ncr.timestamp,
            total_votes: 0,
            result_votes: 0,
            censored: false,
        };
        Self::insert_comment(tx, &comment)?;
        tracing::debug!(
            target: "vellum::plugin",
            token = %comment.token,
            comment_id = %comment.comment_id,
            "comment stored"
        );
        Ok(serde_json::to_string(&comment)?)
    }

    fn like_comment(&self, tx: &Transaction<'_>, payload: &str, reply: &str) -> CacheResult<String> {
        let mut like: LikeComment = parse(CMD_LIKE_COMMENT, payload)?;
        let receipt: WriteReceipt = parse("likecomment reply", reply)?;
        action_value(&like.action)?;
        let target = Self::require_comment(tx, &like.token, &like.comment_id)?;
        if target.censored {
            return Err(CacheError::Plugin("cannot like a censored comment".into()));
        }
        like.receipt = receipt.receipt;
        like.timestamp = receipt.timestamp;
        Self::insert_like(tx, &like)?;

        let counts = Self::like_counts(tx, &like.token, &like.comment_id)?;
        Ok(serde_json::to_string(&LikeCommentReply {
            total: counts.upvotes + counts.downvotes,
            result: counts.upvotes as i64 - counts.downvotes as i64,
        })?)
    }

    fn censor_comment(&self, tx: &Transaction<'_>, payload: &str, reply: &str) -> CacheResult<String> {
        let cc: CensorComment = parse(CMD_CENSOR_COMMENT, payload)?;
        let receipt: WriteReceipt = parse("censorcomment reply", reply)?;
        Self::require_comment(tx, &cc.token, &cc.comment_id)?;
        tx.execute(
            "UPDATE comments SET censored = 1, comment = '' WHERE key = ?1",
            params![comment_key(&cc.token, &cc.comment_id)],
        )?;
        tracing::info!(
            target: "vellum::plugin",
            token = %cc.token,
            comment_id = %cc.comment_id,
            receipt = %receipt.receipt,
            "comment censored"
        );
        Ok(String::new())
    }

    fn get_comment(&self, tx: &Transaction<'_>, payload: &str) -> CacheResult<String> {
        let r: CommentRef = parse(CMD_GET_COMMENT, payload)?;
        let c = Self::with_votes(tx, Self::require_comment(tx, &r.token, &r.comment_id)?)?;
        Ok(serde_json::to_string(&c)?)
    }

    fn get_comments(&self, tx: &Transaction<'_>, payload: &str) -> CacheResult<String> {
        let r: TokenRef = parse(CMD_GET_COMMENTS, payload)?;
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE token = ?1 ORDER BY timestamp, commentid");
        let raw: Vec<Comment> = {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map(params![r.token], comment_from_row)?;
            rows.collect::<rusqlite::Result<_>>()?
        };
        let comments = raw
            .into_iter()
            .map(|c| Self::with_votes(tx, c))
            .collect::<CacheResult<Vec<_>>>()?;
        Ok(serde_json::to_string(&GetCommentsReply { comments })?)
    }

    fn get_like_counts(&self, tx: &Transaction<'_>, payload: &str) -> CacheResult<String> {
        let r: CommentRef = parse(CMD_GET_LIKE_COUNTS, payload)?;
        Self::require_comment(tx, &r.token, &r.comment_id)?;
        Ok(serde_json::to_string(&Self::like_counts(tx, &r.token, &r.comment_id)?)?)
    }
}

impl PluginDriver for CommentsPlugin {
    fn setup(&self, tx: &Transaction<'_>) -> CacheResult<()> {
        COMMENTS_TABLE.create(tx)?;
        LIKES_TABLE.create(tx)?;
        Ok(())
    }

    fn build(&self, tx: &Transaction<'_>, payload: &str) -> CacheResult<()> {
        let journal: CommentsJournal = parse("comments journal", payload)?;
        tx.execute_batch(&format!("{};{};", COMMENTS_TABLE.drop_sql(), LIKES_TABLE.drop_sql()))?;
        self.setup(tx)?;
        for c in &journal.comments {
            Self::insert_comment(tx, c)?;
        }
        for l in &journal.likes {
            action_value(&l.action)?;
            Self::insert_like(tx, l)?;
        }
        tracing::info!(
            target: "vellum::plugin",
            comments = journal.comments.len(),
            likes = journal.likes.len(),
            "comments plugin rebuilt"
        );
        Ok(())
    }

    fn exec(
        &self,
        tx: &Transaction<'_>,
        command: &str,
        command_payload: &str,
        reply_payload: &str,
    ) -> CacheResult<String> {
        match command {
            CMD_NEW_COMMENT => self.new_comment(tx, command_payload, reply_payload),
            CMD_GET_COMMENT => self.get_comment(tx, command_payload),
            CMD_GET_COMMENTS => self.get_comments(tx, command_payload),
            CMD_LIKE_COMMENT => self.like_comment(tx, command_payload, reply_payload),
            CMD_CENSOR_COMMENT => self.censor_comment(tx, command_payload, reply_payload),
            CMD_GET_LIKE_COUNTS => self.get_like_counts(tx, command_payload),
            _ => Err(CacheError::InvalidPluginCmd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn plugin() -> CommentsPlugin {
        CommentsPlugin::from_plugin(
            &Plugin::new(COMMENTS_PLUGIN_ID, "1").with_setting(SETTING_MAX_COMMENT_LENGTH, "20"),
        )
        .unwrap()
    }

    fn new_comment(p: &CommentsPlugin, tx: &Transaction<'_>, id: &str, parent: &str, body: &str) -> CacheResult<String> {
        let cmd = serde_json::json!({
            "token": "abc", "parentid": parent, "comment": body,
            "signature": "sig", "publickey": "pk",
        });
        let reply = serde_json::json!({ "commentid": id, "receipt": "r", "timestamp": 100 });
        p.exec(tx, CMD_NEW_COMMENT, &cmd.to_string(), &reply.to_string())
    }

    fn like(p: &CommentsPlugin, tx: &Transaction<'_>, pk: &str, action: &str) -> LikeCommentReply {
        let cmd = serde_json::json!({
            "token": "abc", "commentid": "1", "action": action,
            "signature": "s", "publickey": pk,
        });
        let reply = serde_json::json!({ "receipt": "r", "timestamp": 5 });
        let out = p
            .exec(tx, CMD_LIKE_COMMENT, &cmd.to_string(), &reply.to_string())
            .unwrap();
        serde_json::from_str(&out).unwrap()
    }

    #[test]
    fn comment_lifecycle() {
        let mut conn = Connection::open_in_memory().unwrap();
        let tx = conn.transaction().unwrap();
        let p = plugin();
        p.setup(&tx).unwrap();
        p.setup(&tx).unwrap();

        new_comment(&p, &tx, "1", "0", "hello").unwrap();
        new_comment(&p, &tx, "2", "1", "reply").unwrap();
        assert!(matches!(new_comment(&p, &tx, "3", "99", "orphan"), Err(CacheError::Plugin(_))));
        assert!(matches!(
            new_comment(&p, &tx, "4", "0", "this comment is far too long"),
            Err(CacheError::Plugin(_))
        ));

        let out = p.exec(&tx, CMD_GET_COMMENTS, r#"{"token":"abc"}"#, "").unwrap();
        let reply: GetCommentsReply = serde_json::from_str(&out).unwrap();
        assert_eq!(reply.comments.len(), 2);

        p.exec(
            &tx,
            CMD_CENSOR_COMMENT,
            r#"{"token":"abc","commentid":"2","reason":"spam","signature":"s","publickey":"admin"}"#,
            r#"{"receipt":"r2","timestamp":9}"#,
        )
        .unwrap();
        let out = p.exec(&tx, CMD_GET_COMMENT, r#"{"token":"abc","commentid":"2"}"#, "").unwrap();
        let censored: Comment = serde_json::from_str(&out).unwrap();
        assert!(censored.censored);
        assert_eq!(censored.comment, "");
    }

    #[test]
    fn repeated_like_withdraws_vote() {
        let mut conn = Connection::open_in_memory().unwrap();
        let tx = conn.transaction().unwrap();
        let p = plugin();
        p.setup(&tx).unwrap();
        new_comment(&p, &tx, "1", "", "hi").unwrap();

        assert_eq!(like(&p, &tx, "alice", "1"), LikeCommentReply { total: 1, result: 1 });
        assert_eq!(like(&p, &tx, "bob", "-1"), LikeCommentReply { total: 2, result: 0 });
        assert_eq!(like(&p, &tx, "alice", "1"), LikeCommentReply { total: 1, result: -1 });
        assert_eq!(like(&p, &tx, "alice", "-1"), LikeCommentReply { total: 2, result: -2 });

        let out = p.exec(&tx, CMD_GET_LIKE_COUNTS, r#"{"token":"abc","commentid":"1"}"#, "").unwrap();
        let counts: LikeCounts = serde_json::from_str(&out).unwrap();
        assert_eq!(counts, LikeCounts { upvotes: 0, downvotes: 2 });
    }

    #[test]
    fn unknown_command_and_bad_setting() {
        let mut conn = Connection::open_in_memory().unwrap();
        let tx = conn.transaction().unwrap();
        let p = plugin();
        p.setup(&tx).unwrap();
        assert!(matches!(p.exec(&tx, "startvote", "{}", ""), Err(CacheError::InvalidPluginCmd)));
        assert!(matches!(
            CommentsPlugin::from_plugin(&Plugin::new("comments", "1").with_setting("maxcommentlength", "lots")),
            Err(CacheError::Plugin(_))
        ));
    }
}
