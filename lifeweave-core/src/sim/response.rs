//! Parsing of generation responses.
//!
//! Responses are free text expected to hold one JSON object. Parsing runs in
//! three tiers: extract and parse, repair and parse again, then fall back to
//! a synthetic quiet year. Nothing in here returns an error to the engine.

use crate::author_arc::AuthorDirection;
use crate::model::{
    CharacterId, Imprint, ImprintKind, Importance, Memory, NarrativeEvent, Season,
};
use crate::npc::NpcInteraction;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, warn};

pub const FALLBACK_TITLE: &str = "A quiet year";
pub const FALLBACK_TAG: &str = "uneventful";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no JSON object found in response")]
    NoObject,

    #[error("invalid JSON: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Which tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseTier {
    Direct,
    Repaired,
    Fallback,
}

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"```(?:[A-Za-z]+)?[ \t]*\r?\n?([\s\S]*?)```").ok())
        .as_ref()
}

/// The fenced block if one holds an object, else the outermost brace span.
pub fn extract_candidate(text: &str) -> Option<&str> {
    let fenced = fence_regex().and_then(|fence| {
        fence
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .find(|body| body.starts_with('{'))
    });
    if let Some(body) = fenced {
        return Some(body);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn is_key_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '-'
}

/// Mechanical fixes: drop trailing commas, quote bare object keys.
/// String contents are never touched.
pub fn repair(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut containers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut expecting_key = false;
    let mut i = 0;

    let next_significant = |from: usize| chars[from..].iter().copied().find(|c| !c.is_whitespace());

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                expecting_key = false;
                out.push(c);
            }
            '{' | '[' => {
                containers.push(c);
                expecting_key = c == '{';
                out.push(c);
            }
            '}' | ']' => {
                containers.pop();
                expecting_key = false;
                out.push(c);
            }
            ',' => {
                if matches!(next_significant(i + 1), Some('}') | Some(']')) {
                    i += 1;
                    continue;
                }
                expecting_key = containers.last() == Some(&'{');
                out.push(c);
            }
            c if c.is_whitespace() => out.push(c),
            c if expecting_key && is_key_start(c) => {
                let start = i;
                while i < chars.len() && is_key_char(chars[i]) {
                    i += 1;
                }
                let key: String = chars[start..i].iter().collect();
                if next_significant(i) == Some(':') {
                    out.push('"');
                    out.push_str(&key);
                    out.push('"');
                } else {
                    out.push_str(&key);
                }
                expecting_key = false;
                continue;
            }
            _ => {
                expecting_key = false;
                out.push(c);
            }
        }
        i += 1;
    }
    out
}

/// Tiers one and two: the parsed object, or why it could not be had.
pub fn parse_object(text: &str) -> Result<(Value, ParseTier), ParseError> {
    let candidate = extract_candidate(text).ok_or(ParseError::NoObject)?;
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) if value.is_object() => Ok((value, ParseTier::Direct)),
        Ok(_) => Err(ParseError::NoObject),
        Err(first) => {
            debug!(error = %first, "direct parse failed, attempting repair");
            let value: Value = serde_json::from_str(&repair(candidate))?;
            if value.is_object() {
                Ok((value, ParseTier::Repaired))
            } else {
                Err(ParseError::NoObject)
            }
        }
    }
}

// ============================================================================
// Wire schema
// ============================================================================

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// An explicit `null` reads as the field's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_stats<'de, D>(deserializer: D) -> Result<BTreeMap<String, i32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Object(map) = value else {
        return Ok(BTreeMap::new());
    };
    Ok(map
        .into_iter()
        .filter_map(|(k, v)| v.as_f64().map(|n| (k, n.round() as i32)))
        .collect())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawEvent {
    year: Option<i32>,
    season: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    title: String,
    #[serde(deserialize_with = "null_as_default")]
    summary: String,
    importance: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    tags: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    related_characters: Vec<String>,
    emotional_shift: Option<String>,
    #[serde(deserialize_with = "lenient_stats")]
    stats_change: BTreeMap<String, i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawImprint {
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    kind: String,
    #[serde(deserialize_with = "null_as_default")]
    content: String,
    #[serde(deserialize_with = "lenient_number")]
    intensity: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    source: String,
    appearance_change: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawMemory {
    event_index: Option<usize>,
    #[serde(deserialize_with = "null_as_default")]
    content: String,
    #[serde(deserialize_with = "null_as_default")]
    imprints: Vec<RawImprint>,
    #[serde(deserialize_with = "lenient_number")]
    emotional_weight: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawResponse {
    #[serde(deserialize_with = "null_as_default")]
    events: Vec<RawEvent>,
    year_end_status: Option<Value>,
    #[serde(deserialize_with = "null_as_default")]
    memories: Vec<RawMemory>,
    #[serde(deserialize_with = "null_as_default")]
    npc_interactions: Vec<NpcInteraction>,
    author_direction: Option<AuthorDirection>,
}

// ============================================================================
// Validated output
// ============================================================================

/// What one character's step is being parsed for.
#[derive(Debug, Clone)]
pub struct ResponseContext {
    pub character_id: CharacterId,
    pub start_year: i32,
    /// Last year covered by the step. Equal to `start_year` outside blocks.
    pub end_year: i32,
    /// Drop placeholder events.
    pub meaningful_only: bool,
}

impl ResponseContext {
    pub fn new(character_id: CharacterId, year: i32) -> Self {
        Self {
            character_id,
            start_year: year,
            end_year: year,
            meaningful_only: false,
        }
    }

    pub fn spanning(mut self, end_year: i32) -> Self {
        self.end_year = end_year.max(self.start_year);
        self
    }

    pub fn meaningful_only(mut self, meaningful_only: bool) -> Self {
        self.meaningful_only = meaningful_only;
        self
    }
}

/// One character's validated share of a response.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub character_id: CharacterId,
    pub events: Vec<NarrativeEvent>,
    pub memories: Vec<Memory>,
    /// Event indices refer to `events`.
    pub npc_interactions: Vec<NpcInteraction>,
    pub author_direction: Option<AuthorDirection>,
    pub year_end_status: Option<String>,
    pub tier: ParseTier,
}

impl StepOutput {
    /// The designated fallback: one quiet placeholder event, no memories.
    /// Under `meaningful_only` the placeholder is dropped and nothing remains.
    pub fn fallback(ctx: &ResponseContext) -> Self {
        let events = if ctx.meaningful_only {
            Vec::new()
        } else {
            vec![NarrativeEvent::new(
                ctx.character_id.clone(),
                ctx.start_year,
                Season::Spring,
                FALLBACK_TITLE,
                Importance::Minor,
            )
            .with_summary("Nothing of note happened.")
            .with_tag(FALLBACK_TAG)]
        };
        Self {
            character_id: ctx.character_id.clone(),
            events,
            memories: Vec::new(),
            npc_interactions: Vec::new(),
            author_direction: None,
            year_end_status: None,
            tier: ParseTier::Fallback,
        }
    }

    fn from_raw(raw: RawResponse, ctx: &ResponseContext, tier: ParseTier) -> Self {
        let all_events: Vec<NarrativeEvent> = raw
            .events
            .into_iter()
            .enumerate()
            .map(|(index, e)| build_event(e, index, ctx))
            .collect();

        let memories = raw
            .memories
            .into_iter()
            .filter_map(|m| build_memory(m, &all_events, ctx))
            .collect();

        let mut remap: HashMap<usize, usize> = HashMap::new();
        let mut events = Vec::with_capacity(all_events.len());
        for (index, event) in all_events.into_iter().enumerate() {
            if ctx.meaningful_only && event.is_placeholder() {
                continue;
            }
            remap.insert(index, events.len());
            events.push(event);
        }

        let npc_interactions = raw
            .npc_interactions
            .into_iter()
            .map(|mut interaction| {
                interaction.event_index = interaction.event_index.and_then(|i| remap.get(&i).copied());
                interaction
            })
            .collect();

        let year_end_status = raw.year_end_status.and_then(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        });

        Self {
            character_id: ctx.character_id.clone(),
            events,
            memories,
            npc_interactions,
            author_direction: raw.author_direction,
            year_end_status,
            tier,
        }
    }
}

fn build_event(raw: RawEvent, index: usize, ctx: &ResponseContext) -> NarrativeEvent {
    let year = raw
        .year
        .map(|y| y.clamp(ctx.start_year, ctx.end_year))
        .unwrap_or(ctx.start_year);
    let season = raw
        .season
        .as_deref()
        .and_then(Season::parse)
        .unwrap_or(Season::ALL[index % Season::ALL.len()]);
    let importance = raw
        .importance
        .as_deref()
        .and_then(Importance::parse)
        .unwrap_or(Importance::Minor);
    let title = match raw.title.trim() {
        "" => FALLBACK_TITLE.to_string(),
        title => title.to_string(),
    };

    let mut event = NarrativeEvent::new(ctx.character_id.clone(), year, season, title, importance)
        .with_summary(raw.summary.trim());
    event.tags = raw.tags;
    event.related_characters = raw
        .related_characters
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty() && *c != ctx.character_id.as_str())
        .map(CharacterId::new)
        .collect();
    event.emotional_shift = raw.emotional_shift.filter(|s| !s.trim().is_empty());
    event.stats_change = raw.stats_change;
    event
}

fn build_memory(raw: RawMemory, events: &[NarrativeEvent], ctx: &ResponseContext) -> Option<Memory> {
    let imprints: Vec<Imprint> = raw
        .imprints
        .into_iter()
        .filter_map(|i| {
            let kind = ImprintKind::parse(&i.kind)?;
            if i.content.trim().is_empty() {
                return None;
            }
            let intensity = i.intensity.unwrap_or(50.0).clamp(0.0, 100.0).round() as u8;
            let mut imprint = Imprint::new(kind, i.content.trim(), intensity);
            if !i.source.trim().is_empty() {
                imprint = imprint.with_source(i.source.trim());
            }
            if let Some(change) = i.appearance_change.filter(|c| !c.trim().is_empty()) {
                imprint = imprint.with_appearance_change(change);
            }
            Some(imprint)
        })
        .collect();

    let anchor = raw.event_index.and_then(|i| events.get(i));
    let (year, season) = anchor
        .map(|e| (e.year, e.season))
        .unwrap_or((ctx.start_year, Season::Spring));
    let weight = raw.emotional_weight.unwrap_or(0.0).clamp(0.0, 100.0).round() as u8;

    Memory::new(ctx.character_id.clone(), year, season, raw.content.trim(), imprints)
        .map(|m| m.with_weight(weight).with_tags(raw.tags))
}

fn decode(value: Value, ctx: &ResponseContext, tier: ParseTier) -> StepOutput {
    match serde_json::from_value::<RawResponse>(value) {
        Ok(raw) => StepOutput::from_raw(raw, ctx, tier),
        Err(error) => {
            warn!(character = %ctx.character_id, %error, "response did not match schema, using fallback");
            StepOutput::fallback(ctx)
        }
    }
}

/// Parse a single-character response. Never fails.
pub fn parse_step(text: &str, ctx: &ResponseContext) -> StepOutput {
    match parse_object(text) {
        Ok((value, tier)) => {
            if tier == ParseTier::Repaired {
                warn!(character = %ctx.character_id, "response needed repair");
            }
            decode(value, ctx, tier)
        }
        Err(error) => {
            warn!(character = %ctx.character_id, %error, "unparseable response, using fallback");
            StepOutput::fallback(ctx)
        }
    }
}

/// Parse a batched response keyed by character id under `characters`.
/// Characters missing from the response get the fallback.
pub fn parse_batched(text: &str, contexts: &[ResponseContext]) -> Vec<StepOutput> {
    let parsed = parse_object(text);
    let (mut characters, tier) = match parsed {
        Ok((Value::Object(mut root), tier)) => match root.remove("characters") {
            Some(Value::Object(map)) => (map, tier),
            _ => {
                warn!("batched response has no characters map");
                (serde_json::Map::new(), ParseTier::Fallback)
            }
        },
        Ok(_) => (serde_json::Map::new(), ParseTier::Fallback),
        Err(error) => {
            warn!(%error, "unparseable batched response, using fallback");
            (serde_json::Map::new(), ParseTier::Fallback)
        }
    };

    contexts
        .iter()
        .map(|ctx| match characters.remove(ctx.character_id.as_str()) {
            Some(value) => decode(value, ctx, tier),
            None => {
                if tier != ParseTier::Fallback {
                    warn!(character = %ctx.character_id, "character missing from batched response");
                }
                StepOutput::fallback(ctx)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "events": [{"season": "summer", "title": "The fire", "summary": "The mill burned.",
                    "importance": "turning_point", "tags": ["loss"], "relatedCharacters": ["mara"]}],
        "yearEndStatus": "shaken",
        "memories": [{"eventIndex": 0, "content": "Smoke everywhere",
                      "imprints": [{"type": "trauma", "content": "fear of fire", "intensity": 80, "source": "the fire"}],
                      "emotionalWeight": 90}],
        "npcInteractions": [{"eventIndex": 0, "npcAlias": "the miller", "role": "neighbour",
                             "interaction": "pulled her out", "isNew": true}]
    }"#;

    fn ctx() -> ResponseContext {
        ResponseContext::new(CharacterId::new("lio"), 7)
    }

    #[test]
    fn test_fenced_object() {
        let text = format!("Here you go:\n```json\n{VALID}\n```\nEnjoy.");
        let out = parse_step(&text, &ctx());
        assert_eq!(out.tier, ParseTier::Direct);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].importance, Importance::TurningPoint);
        assert_eq!(out.events[0].season, Season::Summer);
        assert_eq!(out.events[0].related_characters, vec![CharacterId::new("mara")]);
        assert_eq!(out.memories.len(), 1);
        assert_eq!(out.memories[0].year, 7);
        assert_eq!(out.memories[0].emotional_weight, 90);
        assert_eq!(out.npc_interactions[0].event_index, Some(0));
        assert_eq!(out.year_end_status.as_deref(), Some("shaken"));
    }

    #[test]
    fn test_trailing_comma_repaired() {
        let broken = VALID.replace("\"emotionalWeight\": 90}", "\"emotionalWeight\": 90,}");
        let out = parse_step(&broken, &ctx());
        assert_eq!(out.tier, ParseTier::Repaired);
        assert_eq!(out.events[0].title, "The fire");
    }

    #[test]
    fn test_garbage_falls_back() {
        let out = parse_step("I'm sorry, I can't do that.", &ctx());
        assert_eq!(out.tier, ParseTier::Fallback);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].title, FALLBACK_TITLE);
        assert!(out.events[0].has_tag(FALLBACK_TAG));
        assert!(out.memories.is_empty());
    }

    #[test]
    fn test_garbage_under_meaningful_only_yields_nothing() {
        let out = parse_step("no json here", &ctx().meaningful_only(true));
        assert_eq!(out.tier, ParseTier::Fallback);
        assert!(out.events.is_empty());
        assert!(out.memories.is_empty());
    }

    #[test]
    fn test_null_fields_read_as_defaults() {
        let text = r#"{"events": [{"title": null, "summary": null, "tags": null,
                                   "relatedCharacters": null, "importance": "major"},
                                  {"title": "The fair", "summary": "Ribbons."}],
                      "memories": [{"content": "Lanterns", "tags": null,
                                    "imprints": [{"type": "insight", "content": "c", "source": null}]}],
                      "npcInteractions": [{"npcAlias": "the juggler", "role": null, "interaction": null, "isNew": null}]}"#;
        let out = parse_step(text, &ctx());
        assert_eq!(out.tier, ParseTier::Direct);
        assert_eq!(out.events.len(), 2);
        assert_eq!(out.events[0].title, FALLBACK_TITLE);
        assert_eq!(out.events[0].importance, Importance::Major);
        assert!(out.events[0].tags.is_empty());
        assert_eq!(out.events[1].title, "The fair");
        assert_eq!(out.memories.len(), 1);
        assert_eq!(out.npc_interactions[0].npc_alias, "the juggler");
        assert!(out.npc_interactions[0].role.is_empty());
    }

    #[test]
    fn test_repair_quotes_bare_keys_only_outside_strings() {
        let repaired = repair(r#"{title: "a, b: {c}", tags: ["x",], n: 1,}"#);
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["title"], "a, b: {c}");
        assert_eq!(value["tags"][0], "x");
        assert_eq!(value["n"], 1);
    }

    #[test]
    fn test_outermost_braces_without_fence() {
        let text = r#"Sure! {"events": [], "memories": []} Hope that helps {really}"#;
        // Outermost span includes the trailing {really}; repair cannot save it.
        assert!(parse_object(text).is_err());
        let text = r#"Sure! {"events": [], "memories": []} Hope that helps."#;
        assert_eq!(parse_object(text).unwrap().1, ParseTier::Direct);
    }

    #[test]
    fn test_schema_mismatch_falls_back() {
        let out = parse_step(r#"{"events": "none"}"#, &ctx());
        assert_eq!(out.tier, ParseTier::Fallback);
    }

    #[test]
    fn test_lenient_values() {
        let text = r#"{"events": [{"title": "", "importance": "epic", "season": "fall",
                       "statsChange": {"courage": 2.6, "note": "x"}}],
                      "memories": [{"content": "m", "imprints": [{"type": "insight", "content": "c", "intensity": "140"}]},
                                   {"content": "empty", "imprints": [{"type": "unknown", "content": "c"}]}]}"#;
        let out = parse_step(text, &ctx());
        let event = &out.events[0];
        assert_eq!(event.title, FALLBACK_TITLE);
        assert_eq!(event.importance, Importance::Minor);
        assert_eq!(event.season, Season::Autumn);
        assert_eq!(event.stats_change.get("courage"), Some(&3));
        assert_eq!(out.memories.len(), 1);
        assert_eq!(out.memories[0].imprints[0].intensity, 100);
    }

    #[test]
    fn test_block_years_clamped_and_placeholders_filtered() {
        let text = r#"{"events": [
            {"year": 1, "title": "Quiet", "tags": ["uneventful"]},
            {"year": 2, "title": "Swim", "importance": "major"},
            {"year": 9, "title": "Late"}],
            "npcInteractions": [{"eventIndex": 1, "npcAlias": "aunt"}, {"eventIndex": 0, "npcAlias": "cat"}]}"#;
        let ctx = ResponseContext::new(CharacterId::new("lio"), 0)
            .spanning(2)
            .meaningful_only(true);
        let out = parse_step(text, &ctx);
        let years: Vec<i32> = out.events.iter().map(|e| e.year).collect();
        assert_eq!(years, vec![2, 2]);
        assert_eq!(out.npc_interactions[0].event_index, Some(0));
        assert_eq!(out.npc_interactions[1].event_index, None);
    }

    #[test]
    fn test_batched_missing_character_gets_fallback() {
        let text = format!(r#"{{"characters": {{"lio": {VALID}}}}}"#);
        let contexts = vec![ctx(), ResponseContext::new(CharacterId::new("mara"), 7)];
        let outs = parse_batched(&text, &contexts);
        assert_eq!(outs[0].tier, ParseTier::Direct);
        assert_eq!(outs[0].events[0].title, "The fire");
        assert_eq!(outs[1].tier, ParseTier::Fallback);
        assert_eq!(outs[1].character_id, CharacterId::new("mara"));
    }
}
