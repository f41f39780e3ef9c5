//! Projection of raw indexer records into display-shaped records.
//!
//! A resolver copies or derives exactly the fields its caller asked for;
//! nothing outside the field set appears in the output.

use serde_json::{Map, Value, json};

use crate::chains::ChainConfig;
use crate::prices::PriceMap;

/// Field selection for [`proposal_resolver`]. Only flagged fields appear in
/// the projected record.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposalFields {
    pub status: bool,
    pub title: bool,
    pub description: bool,
    pub link: bool,
    pub hash: bool,
    pub proposal_type: bool,
    pub activity_feed: bool,
}

impl ProposalFields {
    /// Selection used by the single-dao activity aggregator.
    pub const ACTIVITY: Self = Self {
        status: true,
        title: true,
        description: true,
        link: true,
        hash: true,
        proposal_type: true,
        activity_feed: false,
    };

    /// Selection used by the hub orchestrator's per-record projection.
    pub const HUB: Self = Self {
        status: false,
        title: true,
        description: true,
        link: false,
        hash: false,
        proposal_type: true,
        activity_feed: true,
    };
}

pub fn proposal_resolver(raw: &Value, fields: &ProposalFields) -> Value {
    let details = parsed_details(raw);
    let mut out = Map::new();

    if fields.status {
        out.insert("status".to_string(), json!(proposal_status(raw)));
    }
    if fields.title {
        out.insert("title".to_string(), detail_or(raw, &details, "title"));
    }
    if fields.description {
        out.insert(
            "description".to_string(),
            detail_or(raw, &details, "description"),
        );
    }
    if fields.link {
        out.insert("link".to_string(), detail_or(raw, &details, "link"));
    }
    if fields.hash {
        out.insert("hash".to_string(), detail_or(raw, &details, "hash"));
    }
    if fields.proposal_type {
        out.insert("proposalType".to_string(), json!(proposal_type(raw)));
    }
    if fields.activity_feed {
        out.insert(
            "activityFeed".to_string(),
            json!({ "message": activity_message(raw) }),
        );
    }

    Value::Object(out)
}

/// Normalizes one explore-listing record and prices its guild bank in USD
/// from the injected price map.
pub fn dao_resolver(raw: &Value, prices: &PriceMap, chain: &ChainConfig) -> Value {
    let member_count = raw
        .get("members")
        .and_then(Value::as_array)
        .map(|members| members.len())
        .unwrap_or(0);

    let guild_bank_value: f64 = raw
        .get("tokenBalances")
        .and_then(Value::as_array)
        .map(|balances| balances.iter().map(|b| token_balance_usd(b, prices)).sum())
        .unwrap_or(0.0);

    json!({
        "id": raw.get("id").cloned().unwrap_or(Value::Null),
        "title": raw.get("title").cloned().unwrap_or(Value::Null),
        "version": raw.get("version").cloned().unwrap_or(Value::Null),
        "summoner": raw.get("summoner").cloned().unwrap_or(Value::Null),
        "summoningTime": raw.get("summoningTime").cloned().unwrap_or(Value::Null),
        "totalShares": raw.get("totalShares").cloned().unwrap_or(Value::Null),
        "totalLoot": raw.get("totalLoot").cloned().unwrap_or(Value::Null),
        "memberCount": member_count,
        "guildBankValue": guild_bank_value,
        "networkId": chain.chain_id,
        "chainName": chain.name,
    })
}

/// Moloch proposal `details` is a JSON-encoded string; a record with broken
/// or absent details falls back to top-level fields.
fn parsed_details(raw: &Value) -> Option<Value> {
    raw.get("details")
        .and_then(Value::as_str)
        .and_then(|details| serde_json::from_str(details).ok())
}

fn detail_or(raw: &Value, details: &Option<Value>, key: &str) -> Value {
    details
        .as_ref()
        .and_then(|d| d.get(key))
        .filter(|v| !v.is_null())
        .or_else(|| raw.get(key).filter(|v| !v.is_null()))
        .cloned()
        .unwrap_or(Value::Null)
}

fn flag(raw: &Value, key: &str) -> bool {
    raw.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn proposal_status(raw: &Value) -> &'static str {
    if flag(raw, "cancelled") || flag(raw, "aborted") {
        "Cancelled"
    } else if flag(raw, "processed") && flag(raw, "didPass") {
        "Passed"
    } else if flag(raw, "processed") {
        "Failed"
    } else if flag(raw, "sponsored") {
        "VotingPeriod"
    } else {
        "Unsponsored"
    }
}

fn proposal_type(raw: &Value) -> &'static str {
    if flag(raw, "whitelist") {
        "Whitelist Token Proposal"
    } else if flag(raw, "guildkick") {
        "Guild Kick Proposal"
    } else if flag(raw, "trade") {
        "Trade Proposal"
    } else if flag(raw, "newMember") {
        "Member Proposal"
    } else {
        "Funding Proposal"
    }
}

fn activity_message(raw: &Value) -> String {
    match proposal_status(raw) {
        "Passed" => "proposal passed".to_string(),
        "Failed" => "proposal failed".to_string(),
        "Cancelled" => "proposal cancelled".to_string(),
        "VotingPeriod" => "proposal in voting".to_string(),
        _ => "proposal needs a sponsor".to_string(),
    }
}

fn token_balance_usd(balance: &Value, prices: &PriceMap) -> f64 {
    let address = balance
        .pointer("/token/tokenAddress")
        .and_then(Value::as_str)
        .map(str::to_lowercase);
    let Some(address) = address else { return 0.0 };
    let Some(price) = prices.get(&address) else {
        return 0.0;
    };
    let decimals = balance
        .pointer("/token/decimals")
        .and_then(as_f64_lenient)
        .unwrap_or(18.0);
    let raw_balance = balance
        .get("tokenBalance")
        .and_then(as_f64_lenient)
        .unwrap_or(0.0);
    raw_balance / 10f64.powf(decimals) * price.price
}

// Subgraph numerics arrive as strings.
fn as_f64_lenient(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
