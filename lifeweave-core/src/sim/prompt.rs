//! Prompt assembly for generation calls.

use crate::grammar::Directive;
use crate::model::{AnchorEvent, Memory, NarrativeEvent, Seed};
use crate::profile::EmergentProfile;

/// Guidance attached to one character's request. Exactly one kind per call.
#[derive(Debug, Clone)]
pub enum Guidance {
    Grammar(Directive),
    Author(String),
    None,
}

/// Everything known about one character going into a request.
#[derive(Debug, Clone)]
pub struct CharacterBrief<'a> {
    pub seed: &'a Seed,
    pub profile: &'a EmergentProfile,
    pub recent: &'a [Memory],
    pub anchors: Vec<&'a AnchorEvent>,
    pub guidance: Guidance,
}

/// The years and density a request covers.
#[derive(Debug, Clone, Copy)]
pub struct StepSpan {
    pub start_year: i32,
    pub end_year: i32,
    pub events_per_year: usize,
}

impl StepSpan {
    pub fn is_block(&self) -> bool {
        self.end_year > self.start_year
    }
}

fn push_section(prompt: &mut String, title: &str) {
    prompt.push_str("\n\n## ");
    prompt.push_str(title);
    prompt.push('\n');
}

fn describe_seed(prompt: &mut String, seed: &Seed) {
    prompt.push_str(&format!("**Id:** {}\n", seed.id));
    prompt.push_str(&format!("**Codename:** {}\n", seed.codename));
    prompt.push_str(&format!("**Born:** year {}\n", seed.birth_year));
    let fields = [
        ("Initial condition", &seed.initial_condition),
        ("Temperament", &seed.temperament),
        ("Latent ability", &seed.latent_ability),
        ("Wound", &seed.wound),
    ];
    for (label, value) in fields {
        if !value.trim().is_empty() {
            prompt.push_str(&format!("**{label}:** {value}\n"));
        }
    }
    if !seed.physical_traits.is_empty() {
        prompt.push_str(&format!("**Appearance:** {}\n", seed.physical_traits.join(", ")));
    }
}

fn describe_profile(prompt: &mut String, profile: &EmergentProfile) {
    prompt.push_str(&format!("**Known as:** {}", profile.display_name));
    if let Some(alias) = &profile.alias {
        prompt.push_str(&format!(" (\"{alias}\")"));
    }
    prompt.push_str(&format!("\n**Life stage:** {}\n", profile.status.name()));

    let traits: Vec<String> = profile
        .dominant_traits(5)
        .iter()
        .map(|t| format!("{} ({})", t.name, t.strength))
        .collect();
    if !traits.is_empty() {
        prompt.push_str(&format!("**Traits:** {}\n", traits.join(", ")));
    }
    for belief in &profile.beliefs {
        let marker = if belief.challenged { " [challenged]" } else { "" };
        prompt.push_str(&format!("- Believes: {} ({}){marker}\n", belief.content, belief.conviction));
    }
    for ability in &profile.abilities {
        prompt.push_str(&format!("- Ability: {} ({:?})\n", ability.name, ability.level));
    }
    for bond in &profile.bonds {
        prompt.push_str(&format!("- Bond: {} ({})\n", bond.with, bond.strength));
    }
    for conflict in &profile.inner_conflicts {
        prompt.push_str(&format!("- Inner conflict: {}\n", conflict.description));
    }
    if !profile.speech_patterns.is_empty() {
        let speech: Vec<&str> = profile.speech_patterns.iter().map(String::as_str).collect();
        prompt.push_str(&format!("**Speech:** {}\n", speech.join("; ")));
    }
}

fn describe_memories(prompt: &mut String, memories: &[Memory]) {
    if memories.is_empty() {
        prompt.push_str("(no memories yet)\n");
        return;
    }
    for memory in memories {
        prompt.push_str(&format!(
            "- Year {} {}: {} (weight {})\n",
            memory.year,
            memory.season.name(),
            memory.content,
            memory.emotional_weight
        ));
    }
}

fn describe_brief(prompt: &mut String, brief: &CharacterBrief<'_>) {
    describe_seed(prompt, brief.seed);
    describe_profile(prompt, brief.profile);
    prompt.push_str("\n### Recent memories\n");
    describe_memories(prompt, brief.recent);

    if !brief.anchors.is_empty() {
        prompt.push_str("\n### World events they must react to\n");
        for anchor in &brief.anchors {
            prompt.push_str(&format!("- Year {}: {}. {}\n", anchor.year, anchor.title, anchor.description));
        }
    }

    match &brief.guidance {
        Guidance::Grammar(directive) => {
            prompt.push_str("\n### Story structure\n");
            prompt.push_str(&directive.to_string());
            prompt.push('\n');
        }
        Guidance::Author(direction) => {
            prompt.push_str("\n### Narrative direction\n");
            prompt.push_str(direction);
            prompt.push('\n');
        }
        Guidance::None => {}
    }
}

fn describe_span(prompt: &mut String, span: StepSpan) {
    if span.is_block() {
        prompt.push_str(&format!(
            "Simulate years {} to {}, about {} events per year. Put the year on every event.\n",
            span.start_year, span.end_year, span.events_per_year
        ));
    } else {
        prompt.push_str(&format!(
            "Simulate year {}, about {} events.\n",
            span.start_year, span.events_per_year
        ));
    }
}

fn push_schema(prompt: &mut String, wants_direction: bool) {
    push_section(prompt, "Response format");
    prompt.push_str(include_str!("prompts/schema.txt"));
    if wants_direction {
        prompt.push('\n');
        prompt.push_str(include_str!("prompts/direction.txt"));
    }
}

/// Request for one character.
pub fn character_prompt(brief: &CharacterBrief<'_>, span: StepSpan, npc_summary: &str) -> String {
    let mut prompt = String::from(include_str!("prompts/year.txt"));
    if span.is_block() {
        prompt.push('\n');
        prompt.push_str(include_str!("prompts/childhood_block.txt"));
    }

    push_section(&mut prompt, "Step");
    describe_span(&mut prompt, span);
    push_section(&mut prompt, "Character");
    describe_brief(&mut prompt, brief);

    if !npc_summary.is_empty() {
        push_section(&mut prompt, "Known people");
        prompt.push_str(npc_summary);
        prompt.push('\n');
    }

    push_schema(&mut prompt, matches!(brief.guidance, Guidance::Author(_)));
    prompt
}

/// One request covering every brief.
pub fn batched_prompt(briefs: &[CharacterBrief<'_>], span: StepSpan, npc_summary: &str) -> String {
    let mut prompt = String::from(include_str!("prompts/year.txt"));
    prompt.push('\n');
    prompt.push_str(include_str!("prompts/batched.txt"));
    if span.is_block() {
        prompt.push('\n');
        prompt.push_str(include_str!("prompts/childhood_block.txt"));
    }

    push_section(&mut prompt, "Step");
    describe_span(&mut prompt, span);
    for brief in briefs {
        push_section(&mut prompt, &format!("Character {}", brief.seed.id));
        describe_brief(&mut prompt, brief);
    }

    if !npc_summary.is_empty() {
        push_section(&mut prompt, "Known people");
        prompt.push_str(npc_summary);
        prompt.push('\n');
    }

    let wants_direction = briefs.iter().any(|b| matches!(b.guidance, Guidance::Author(_)));
    push_schema(&mut prompt, wants_direction);
    prompt.push_str("\nWrap it as {\"characters\": {\"<id>\": <object above>, ...}}.\n");
    prompt
}

/// One-time arc design request.
pub fn arc_design_prompt(seed: &Seed, start_year: i32, end_year: i32) -> String {
    let mut prompt = String::from(include_str!("prompts/arc_design.txt"));
    push_section(&mut prompt, "Span");
    prompt.push_str(&format!(
        "Years {} to {} (ages {} to {}).\n",
        start_year,
        end_year,
        seed.age_at(start_year),
        seed.age_at(end_year)
    ));
    push_section(&mut prompt, "Character");
    describe_seed(&mut prompt, seed);
    prompt
}

/// Scene expansion request for one finished event.
pub fn prose_prompt(event: &NarrativeEvent, profile: &EmergentProfile, seed: &Seed) -> String {
    let mut prompt = String::from(include_str!("prompts/prose.txt"));
    push_section(&mut prompt, "Character");
    describe_seed(&mut prompt, seed);
    describe_profile(&mut prompt, profile);
    push_section(&mut prompt, "Event");
    prompt.push_str(&format!(
        "Year {}, {}: {} ({})\n{}\n",
        event.year,
        event.season.name(),
        event.title,
        event.importance.name(),
        event.summary
    ));
    if let Some(shift) = &event.emotional_shift {
        prompt.push_str(&format!("Emotional shift: {shift}\n"));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::NarrativeGrammar;
    use crate::profile::compute;

    #[test]
    fn test_character_prompt_sections() {
        let seed = Seed::new("lio", "Lio", 0).with_wound("abandoned at the docks");
        let profile = compute(&seed, &[]);
        let anchor = AnchorEvent::new(3, "The flood", "The river rises");
        let mut grammar = NarrativeGrammar::new(0, 20);
        grammar.ensure_arc(&seed.id, 0, 20);
        let directive = grammar.current_directive(&seed.id, 3).unwrap();

        let brief = CharacterBrief {
            seed: &seed,
            profile: &profile,
            recent: &[],
            anchors: vec![&anchor],
            guidance: Guidance::Grammar(directive),
        };
        let span = StepSpan {
            start_year: 3,
            end_year: 3,
            events_per_year: 2,
        };
        let prompt = character_prompt(&brief, span, "- ferryman (encounter, 1 appearances)");
        assert!(prompt.contains("abandoned at the docks"));
        assert!(prompt.contains("The flood"));
        assert!(prompt.contains("Phase: Setup"));
        assert!(prompt.contains("ferryman"));
        assert!(prompt.contains("Simulate year 3"));
        assert!(!prompt.contains("authorDirection"));
    }

    #[test]
    fn test_prose_prompt_carries_event() {
        let seed = Seed::new("lio", "Lio", 0);
        let profile = compute(&seed, &[]);
        let mut event = crate::model::NarrativeEvent::new(
            seed.id.clone(),
            9,
            crate::model::Season::Winter,
            "The ice breaks",
            crate::model::Importance::TurningPoint,
        )
        .with_summary("Lio falls through the harbor ice.");
        event.emotional_shift = Some("fearless to wary".into());

        let prompt = prose_prompt(&event, &profile, &seed);
        assert!(prompt.contains("The ice breaks"));
        assert!(prompt.contains("harbor ice"));
        assert!(prompt.contains("fearless to wary"));
        assert!(prompt.contains("**Known as:** Lio"));
    }

    #[test]
    fn test_author_guidance_requests_direction() {
        let seed = Seed::new("lio", "Lio", 0);
        let profile = compute(&seed, &[]);
        let brief = CharacterBrief {
            seed: &seed,
            profile: &profile,
            recent: &[],
            anchors: vec![],
            guidance: Guidance::Author("Narrative phase 1/3: Roots".into()),
        };
        let span = StepSpan {
            start_year: 0,
            end_year: 2,
            events_per_year: 1,
        };
        let prompt = batched_prompt(&[brief], span, "");
        assert!(prompt.contains("Roots"));
        assert!(prompt.contains("authorDirection"));
        assert!(prompt.contains("years 0 to 2"));
        assert!(prompt.contains("\"characters\""));
    }
}
