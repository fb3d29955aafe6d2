//! `votes` plugin: vote authorizations, vote starts and cast votes per token.
//!
//! A record owner authorizes (or revokes) a vote, an admin starts it with a set of
//! options and an eligible ticket list, and tickets cast one vote each. Write
//! commands are applied together with the write path's reply, which carries the
//! receipt, the block heights or the server signature.

use rusqlite::{params, OptionalExtension, Row, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use vellum_core::{Column, Index, TableSchema};

use crate::error::{CacheError, CacheResult};
use crate::plugin::PluginDriver;
use crate::plugins::comments::{TokenRef, WriteReceipt};
use crate::plugins::parse;

pub const VOTES_PLUGIN_ID: &str = "votes";

pub const CMD_AUTHORIZE_VOTE: &str = "authorizevote";
pub const CMD_START_VOTE: &str = "startvote";
pub const CMD_CAST_VOTE: &str = "castvote";
pub const CMD_VOTE_RESULTS: &str = "voteresults";

pub const ACTION_AUTHORIZE: &str = "authorize";
pub const ACTION_REVOKE: &str = "revoke";

const AUTHORIZE_VOTES_TABLE: TableSchema = TableSchema {
    name: "authorize_votes",
    columns: &[
        Column::text("token").primary_key(),
        Column::text("action").not_null(),
        Column::text("signature").not_null(),
        Column::text("publickey").not_null(),
        Column::text("receipt").not_null(),
        Column::integer("timestamp").not_null(),
    ],
    indexes: &[],
};

const START_VOTES_TABLE: TableSchema = TableSchema {
    name: "start_votes",
    columns: &[
        Column::text("token").primary_key(),
        Column::integer("mask").not_null(),
        Column::integer("duration").not_null(),
        Column::integer("quorumpercentage").not_null(),
        Column::integer("passpercentage").not_null(),
        Column::text("publickey").not_null(),
        Column::text("signature").not_null(),
        Column::integer("startblockheight").not_null(),
        Column::text("startblockhash").not_null(),
        Column::integer("endheight").not_null(),
        // Comma separated.
        Column::text("eligibletickets").not_null(),
    ],
    indexes: &[],
};

const VOTE_OPTIONS_TABLE: TableSchema = TableSchema {
    name: "vote_options",
    columns: &[
        Column::text("token").primary_key(),
        Column::text("optionid").primary_key(),
        Column::text("description").not_null(),
        Column::integer("bits").not_null(),
    ],
    indexes: &[],
};

const CAST_VOTES_TABLE: TableSchema = TableSchema {
    name: "cast_votes",
    columns: &[
        Column::text("token").primary_key(),
        Column::text("ticket").primary_key(),
        Column::text("votebit").not_null(),
        Column::text("signature").not_null(),
        Column::text("receipt").not_null(),
    ],
    indexes: &[Index {
        name: "idx_cast_votes_token",
        columns: &["token"],
    }],
};

const TABLES: [TableSchema; 4] = [
    AUTHORIZE_VOTES_TABLE,
    START_VOTES_TABLE,
    VOTE_OPTIONS_TABLE,
    CAST_VOTES_TABLE,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeVote {
    /// [`ACTION_AUTHORIZE`] or [`ACTION_REVOKE`].
    pub action: String,
    pub token: String,
    pub signature: String,
    #[serde(rename = "publickey")]
    pub public_key: String,
    #[serde(default)]
    pub receipt: String,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOption {
    pub id: String,
    pub description: String,
    pub bits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub token: String,
    pub mask: u64,
    /// Length of the vote in blocks.
    pub duration: u32,
    #[serde(rename = "quorumpercentage")]
    pub quorum_percentage: u32,
    #[serde(rename = "passpercentage")]
    pub pass_percentage: u32,
    pub options: Vec<VoteOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartVote {
    #[serde(rename = "publickey")]
    pub public_key: String,
    pub vote: Vote,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartVoteReply {
    #[serde(rename = "startblockheight")]
    pub start_block_height: u32,
    #[serde(rename = "startblockhash")]
    pub start_block_hash: String,
    #[serde(rename = "endheight")]
    pub end_height: u32,
    #[serde(rename = "eligibletickets")]
    pub eligible_tickets: Vec<String>,
}

/// A started vote as stored: the request plus the write path's reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedVote {
    #[serde(rename = "startvote")]
    pub start: StartVote,
    pub reply: StartVoteReply,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastVote {
    pub token: String,
    pub ticket: String,
    /// Hex-encoded option bits.
    #[serde(rename = "votebit")]
    pub vote_bit: String,
    pub signature: String,
    #[serde(default)]
    pub receipt: String,
}

/// Write-path confirmation of a cast vote. A non-empty `error` means the vote
/// was refused upstream and must not be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastVoteReply {
    #[serde(rename = "clientsignature")]
    pub client_signature: String,
    pub signature: String,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionResult {
    pub option: VoteOption,
    pub votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResultsReply {
    pub authorization: Option<AuthorizeVote>,
    #[serde(rename = "startvote")]
    pub started: Option<StartedVote>,
    #[serde(rename = "totalvotes")]
    pub total_votes: u64,
    pub results: Vec<OptionResult>,
}

/// Full history replayed by `PluginBuild`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotesJournal {
    #[serde(default)]
    pub authorizations: Vec<AuthorizeVote>,
    #[serde(default, rename = "startvotes")]
    pub started: Vec<StartedVote>,
    #[serde(default, rename = "castvotes")]
    pub cast: Vec<CastVote>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VotesPlugin;

fn vote_bits(vote_bit: &str) -> CacheResult<u64> {
    let digits = vote_bit.trim().trim_start_matches("0x");
    u64::from_str_radix(digits, 16)
        .map_err(|_| CacheError::Plugin(format!("invalid vote bit {vote_bit:?}")))
}

fn authorization_from_row(row: &Row<'_>) -> rusqlite::Result<AuthorizeVote> {
    Ok(AuthorizeVote {
        token: row.get(0)?,
        action: row.get(1)?,
        signature: row.get(2)?,
        public_key: row.get(3)?,
        receipt: row.get(4)?,
        timestamp: row.get(5)?,
    })
}

impl VotesPlugin {
    fn find_authorization(tx: &Transaction<'_>, token: &str) -> CacheResult<Option<AuthorizeVote>> {
        Ok(tx
            .query_row(
                "SELECT token, action, signature, publickey, receipt, timestamp
                 FROM authorize_votes WHERE token = ?1",
                params![token],
                authorization_from_row,
            )
            .optional()?)
    }

    fn find_started(tx: &Transaction<'_>, token: &str) -> CacheResult<Option<StartedVote>> {
        let head = tx
            .query_row(
                "SELECT mask, duration, quorumpercentage, passpercentage, publickey, signature,
                        startblockheight, startblockhash, endheight, eligibletickets
                 FROM start_votes WHERE token = ?1",
                params![token],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, u32>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, u32>(8)?,
                        row.get::<_, String>(9)?,
                    ))
                },
            )
            .optional()?;
        let Some((mask, duration, quorum, pass, public_key, signature, start_height, start_hash, end_height, tickets)) =
            head
        else {
            return Ok(None);
        };

        let options = {
            let mut stmt = tx.prepare(
                "SELECT optionid, description, bits FROM vote_options
                 WHERE token = ?1 ORDER BY bits",
            )?;
            let rows = stmt.query_map(params![token], |row| {
                Ok(VoteOption {
                    id: row.get(0)?,
                    description: row.get(1)?,
                    bits: row.get::<_, i64>(2)? as u64,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let eligible_tickets = if tickets.is_empty() {
            Vec::new()
        } else {
            tickets.split(',').map(str::to_string).collect()
        };
        Ok(Some(StartedVote {
            start: StartVote {
                public_key,
                vote: Vote {
                    token: token.to_string(),
                    mask: mask as u64,
                    duration,
                    quorum_percentage: quorum,
                    pass_percentage: pass,
                    options,
                },
                signature,
            },
            reply: StartVoteReply {
                start_block_height: start_height,
                start_block_hash: start_hash,
                end_height,
                eligible_tickets,
            },
        }))
    }

    fn has_cast(tx: &Transaction<'_>, token: &str, ticket: &str) -> CacheResult<bool> {
        Ok(tx
            .query_row(
                "SELECT 1 FROM cast_votes WHERE token = ?1 AND ticket = ?2",
                params![token, ticket],
                |_| Ok(()),
            )
            .optional()?
            .is_some())
    }

    fn upsert_authorization(tx: &Transaction<'_>, av: &AuthorizeVote) -> CacheResult<()> {
        tx.execute(
            "INSERT INTO authorize_votes (token, action, signature, publickey, receipt, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(token) DO UPDATE SET
                action = excluded.action, signature = excluded.signature,
                publickey = excluded.publickey, receipt = excluded.receipt,
                timestamp = excluded.timestamp",
            params![av.token, av.action, av.signature, av.public_key, av.receipt, av.timestamp],
        )?;
        Ok(())
    }

    fn insert_started(tx: &Transaction<'_>, sv: &StartedVote) -> CacheResult<()> {
        let vote = &sv.start.vote;
        tx.execute(
            "INSERT INTO start_votes (token, mask, duration, quorumpercentage, passpercentage,
                publickey, signature, startblockheight, startblockhash, endheight, eligibletickets)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                vote.token,
                vote.mask as i64,
                vote.duration,
                vote.quorum_percentage,
                vote.pass_percentage,
                sv.start.public_key,
                sv.start.signature,
                sv.reply.start_block_height,
                sv.reply.start_block_hash,
                sv.reply.end_height,
                sv.reply.eligible_tickets.join(","),
            ],
        )?;
        for opt in &vote.options {
            tx.execute(
                "INSERT INTO vote_options (token, optionid, description, bits) VALUES (?1, ?2, ?3, ?4)",
                params![vote.token, opt.id, opt.description, opt.bits as i64],
            )?;
        }
        Ok(())
    }

    fn insert_cast(tx: &Transaction<'_>, cv: &CastVote) -> CacheResult<()> {
        tx.execute(
            "INSERT INTO cast_votes (token, ticket, votebit, signature, receipt) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![cv.token, cv.ticket, cv.vote_bit, cv.signature, cv.receipt],
        )?;
        Ok(())
    }

    fn validate_vote(vote: &Vote) -> CacheResult<()> {
        if vote.options.is_empty() {
            return Err(CacheError::Plugin("vote has no options".into()));
        }
        if vote.quorum_percentage > 100 || vote.pass_percentage > 100 {
            return Err(CacheError::Plugin("vote percentages must be at most 100".into()));
        }
        let mut ids = HashSet::new();
        let mut bits = HashSet::new();
        for opt in &vote.options {
            if opt.bits == 0 || opt.bits & !vote.mask != 0 {
                return Err(CacheError::Plugin(format!(
                    "option {} bits {:#x} do not fit mask {:#x}",
                    opt.id, opt.bits, vote.mask
                )));
            }
            if !ids.insert(opt.id.as_str()) || !bits.insert(opt.bits) {
                return Err(CacheError::Plugin(format!("duplicate vote option {}", opt.id)));
            }
        }
        Ok(())
    }

    /// Rejects tickets outside the eligible list and bits that match no option.
    fn check_cast(started: &StartedVote, cv: &CastVote) -> CacheResult<()> {
        if !started.reply.eligible_tickets.iter().any(|t| t == &cv.ticket) {
            return Err(CacheError::Plugin(format!("ticket {} is not eligible", cv.ticket)));
        }
        let bits = vote_bits(&cv.vote_bit)?;
        if !started.start.vote.options.iter().any(|o| o.bits == bits) {
            return Err(CacheError::Plugin(format!("vote bit {} matches no option", cv.vote_bit)));
        }
        Ok(())
    }

    fn authorize_vote(&self, tx: &Transaction<'_>, payload: &str, reply: &str) -> CacheResult<String> {
        let mut av: AuthorizeVote = parse(CMD_AUTHORIZE_VOTE, payload)?;
        let receipt: WriteReceipt = parse("authorizevote reply", reply)?;
        if Self::find_started(tx, &av.token)?.is_some() {
            return Err(CacheError::Plugin(format!("vote on {} already started", av.token)));
        }
        let authorized = Self::find_authorization(tx, &av.token)?
            .is_some_and(|prev| prev.action == ACTION_AUTHORIZE);
        match (av.action.as_str(), authorized) {
            (ACTION_AUTHORIZE, false) | (ACTION_REVOKE, true) => {}
            (ACTION_AUTHORIZE, true) => {
                return Err(CacheError::Plugin(format!("vote on {} already authorized", av.token)))
            }
            (ACTION_REVOKE, false) => {
                return Err(CacheError::Plugin(format!("vote on {} is not authorized", av.token)))
            }
            (other, _) => return Err(CacheError::Plugin(format!("invalid authorize action {other:?}"))),
        }

        av.receipt = receipt.receipt;
        av.timestamp = receipt.timestamp;
        Self::upsert_authorization(tx, &av)?;
        tracing::info!(
            target: "vellum::plugin",
            token = %av.token,
            action = %av.action,
            "vote authorization recorded"
        );
        Ok(serde_json::to_string(&av)?)
    }

    fn start_vote(&self, tx: &Transaction<'_>, payload: &str, reply: &str) -> CacheResult<String> {
        let start: StartVote = parse(CMD_START_VOTE, payload)?;
        let reply: StartVoteReply = parse("startvote reply", reply)?;
        let token = start.vote.token.clone();

        let authorized = Self::find_authorization(tx, &token)?
            .is_some_and(|av| av.action == ACTION_AUTHORIZE);
        if !authorized {
            return Err(CacheError::Plugin(format!("vote on {token} is not authorized")));
        }
        if Self::find_started(tx, &token)?.is_some() {
            return Err(CacheError::Plugin(format!("vote on {token} already started")));
        }
        Self::validate_vote(&start.vote)?;
        if reply.end_height <= reply.start_block_height {
            return Err(CacheError::Plugin("vote ends before it starts".into()));
        }

        let started = StartedVote { start, reply };
        Self::insert_started(tx, &started)?;
        tracing::info!(
            target: "vellum::plugin",
            token = %token,
            options = started.start.vote.options.len(),
            eligible = started.reply.eligible_tickets.len(),
            "vote started"
        );
        Ok(serde_json::to_string(&started)?)
    }

    fn cast_vote(&self, tx: &Transaction<'_>, payload: &str, reply: &str) -> CacheResult<String> {
        let mut cv: CastVote = parse(CMD_CAST_VOTE, payload)?;
        let reply: CastVoteReply = parse("castvote reply", reply)?;
        if !reply.error.is_empty() {
            return Err(CacheError::Plugin(format!("vote refused: {}", reply.error)));
        }
        let started = Self::find_started(tx, &cv.token)?
            .ok_or_else(|| CacheError::Plugin(format!("vote on {} has not started", cv.token)))?;
        Self::check_cast(&started, &cv)?;
        if Self::has_cast(tx, &cv.token, &cv.ticket)? {
            return Err(CacheError::Plugin(format!("ticket {} already voted", cv.ticket)));
        }

        cv.receipt = reply.signature;
        Self::insert_cast(tx, &cv)?;
        tracing::debug!(target: "vellum::plugin", token = %cv.token, ticket = %cv.ticket, "vote cast");
        Ok(serde_json::to_string(&cv)?)
    }

    fn vote_results(&self, tx: &Transaction<'_>, payload: &str) -> CacheResult<String> {
        let r: TokenRef = parse(CMD_VOTE_RESULTS, payload)?;
        let authorization = Self::find_authorization(tx, &r.token)?;
        let started = Self::find_started(tx, &r.token)?;

        let cast: Vec<String> = {
            let mut stmt = tx.prepare("SELECT votebit FROM cast_votes WHERE token = ?1")?;
            let rows = stmt.query_map(params![r.token], |row| row.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let mut results: Vec<OptionResult> = started
            .as_ref()
            .map(|sv| {
                sv.start
                    .vote
                    .options
                    .iter()
                    .map(|o| OptionResult { option: o.clone(), votes: 0 })
                    .collect()
            })
            .unwrap_or_default();
        for vote_bit in &cast {
            let bits = vote_bits(vote_bit)?;
            if let Some(slot) = results.iter_mut().find(|res| res.option.bits == bits) {
                slot.votes += 1;
            }
        }

        Ok(serde_json::to_string(&VoteResultsReply {
            authorization,
            started,
            total_votes: cast.len() as u64,
            results,
        })?)
    }
}

impl PluginDriver for VotesPlugin {
    fn setup(&self, tx: &Transaction<'_>) -> CacheResult<()> {
        for table in &TABLES {
            table.create(tx)?;
        }
        Ok(())
    }

    fn build(&self, tx: &Transaction<'_>, payload: &str) -> CacheResult<()> {
        let journal: VotesJournal = parse("votes journal", payload)?;
        for table in &TABLES {
            tx.execute_batch(&table.drop_sql())?;
        }
        self.setup(tx)?;

        for av in &journal.authorizations {
            Self::upsert_authorization(tx, av)?;
        }
        for sv in &journal.started {
            Self::validate_vote(&sv.start.vote)?;
            Self::insert_started(tx, sv)?;
        }
        for cv in &journal.cast {
            let started = Self::find_started(tx, &cv.token)?.ok_or_else(|| {
                CacheError::Plugin(format!("journal casts a vote on unstarted {}", cv.token))
            })?;
            Self::check_cast(&started, cv)?;
            Self::insert_cast(tx, cv)?;
        }
        tracing::info!(
            target: "vellum::plugin",
            authorizations = journal.authorizations.len(),
            started = journal.started.len(),
            cast = journal.cast.len(),
            "votes plugin rebuilt"
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
            CMD_AUTHORIZE_VOTE => self.authorize_vote(tx, command_payload, reply_payload),
            CMD_START_VOTE => self.start_vote(tx, command_payload, reply_payload),
            CMD_CAST_VOTE => self.cast_vote(tx, command_payload, reply_payload),
            CMD_VOTE_RESULTS => self.vote_results(tx, command_payload),
            _ => Err(CacheError::InvalidPluginCmd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use serde_json::json;

    fn authorize(tx: &Transaction<'_>, action: &str) -> CacheResult<String> {
        let cmd = json!({ "action": action, "token": "abc", "signature": "s", "publickey": "owner" });
        VotesPlugin.exec(tx, CMD_AUTHORIZE_VOTE, &cmd.to_string(), r#"{"receipt":"r","timestamp":1}"#)
    }

    fn start(tx: &Transaction<'_>) -> CacheResult<String> {
        let cmd = json!({
            "publickey": "admin", "signature": "s",
            "vote": {
                "token": "abc", "mask": 3, "duration": 2016,
                "quorumpercentage": 20, "passpercentage": 60,
                "options": [
                    { "id": "no", "description": "Don't approve", "bits": 1 },
                    { "id": "yes", "description": "Approve", "bits": 2 },
                ],
            },
        });
        let reply = json!({
            "startblockheight": 100, "startblockhash": "h", "endheight": 2116,
            "eligibletickets": ["t1", "t2", "t3"],
        });
        VotesPlugin.exec(tx, CMD_START_VOTE, &cmd.to_string(), &reply.to_string())
    }

    fn cast(tx: &Transaction<'_>, ticket: &str, bit: &str) -> CacheResult<String> {
        let cmd = json!({ "token": "abc", "ticket": ticket, "votebit": bit, "signature": "cs" });
        let reply = json!({ "clientsignature": "cs", "signature": "server" });
        VotesPlugin.exec(tx, CMD_CAST_VOTE, &cmd.to_string(), &reply.to_string())
    }

    #[test]
    fn authorization_gates_start() {
        let mut conn = Connection::open_in_memory().unwrap();
        let tx = conn.transaction().unwrap();
        VotesPlugin.setup(&tx).unwrap();
        VotesPlugin.setup(&tx).unwrap();

        assert!(matches!(start(&tx), Err(CacheError::Plugin(_))));
        assert!(matches!(authorize(&tx, ACTION_REVOKE), Err(CacheError::Plugin(_))));
        authorize(&tx, ACTION_AUTHORIZE).unwrap();
        assert!(matches!(authorize(&tx, ACTION_AUTHORIZE), Err(CacheError::Plugin(_))));
        authorize(&tx, ACTION_REVOKE).unwrap();
        assert!(matches!(start(&tx), Err(CacheError::Plugin(_))));
        assert!(matches!(authorize(&tx, "maybe"), Err(CacheError::Plugin(_))));

        authorize(&tx, ACTION_AUTHORIZE).unwrap();
        start(&tx).unwrap();
        assert!(matches!(start(&tx), Err(CacheError::Plugin(_))));
        assert!(matches!(authorize(&tx, ACTION_REVOKE), Err(CacheError::Plugin(_))));
    }

    #[test]
    fn one_vote_per_eligible_ticket() {
        let mut conn = Connection::open_in_memory().unwrap();
        let tx = conn.transaction().unwrap();
        VotesPlugin.setup(&tx).unwrap();
        assert!(matches!(cast(&tx, "t1", "2"), Err(CacheError::Plugin(_))));

        authorize(&tx, ACTION_AUTHORIZE).unwrap();
        start(&tx).unwrap();
        cast(&tx, "t1", "2").unwrap();
        cast(&tx, "t2", "0x1").unwrap();
        assert!(matches!(cast(&tx, "t1", "1"), Err(CacheError::Plugin(_))));
        assert!(matches!(cast(&tx, "t9", "1"), Err(CacheError::Plugin(_))));
        assert!(matches!(cast(&tx, "t3", "4"), Err(CacheError::Plugin(_))));

        let out = VotesPlugin.exec(&tx, CMD_VOTE_RESULTS, r#"{"token":"abc"}"#, "").unwrap();
        let results: VoteResultsReply = serde_json::from_str(&out).unwrap();
        assert_eq!(results.total_votes, 2);
        let tally: Vec<(&str, u64)> = results
            .results
            .iter()
            .map(|r| (r.option.id.as_str(), r.votes))
            .collect();
        assert_eq!(tally, vec![("no", 1), ("yes", 1)]);
        let started = results.started.unwrap();
        assert_eq!(started.reply.eligible_tickets, vec!["t1", "t2", "t3"]);
        assert_eq!(started.start.vote.mask, 3);
    }

    #[test]
    fn refused_cast_is_not_recorded() {
        let mut conn = Connection::open_in_memory().unwrap();
        let tx = conn.transaction().unwrap();
        VotesPlugin.setup(&tx).unwrap();
        authorize(&tx, ACTION_AUTHORIZE).unwrap();
        start(&tx).unwrap();

        let cmd = json!({ "token": "abc", "ticket": "t1", "votebit": "1", "signature": "cs" });
        let reply = json!({ "clientsignature": "cs", "signature": "", "error": "ticket spent" });
        assert!(matches!(
            VotesPlugin.exec(&tx, CMD_CAST_VOTE, &cmd.to_string(), &reply.to_string()),
            Err(CacheError::Plugin(_))
        ));
        cast(&tx, "t1", "1").unwrap();
    }

    #[test]
    fn options_must_fit_mask() {
        let vote = Vote {
            token: "abc".into(),
            mask: 1,
            duration: 10,
            quorum_percentage: 10,
            pass_percentage: 50,
            options: vec![VoteOption { id: "yes".into(), description: "y".into(), bits: 2 }],
        };
        assert!(matches!(VotesPlugin::validate_vote(&vote), Err(CacheError::Plugin(_))));
        assert!(matches!(vote_bits("zz"), Err(CacheError::Plugin(_))));
        assert_eq!(vote_bits("0x10").unwrap(), 16);
    }
}
