//! Prompt builders for every completion call in a turn.
//!
//! Each prompt opens with a `ROLE:` line from [`markers`]. The markers are
//! unique per call site, which lets logs and test doubles tell calls apart.

use chrono::NaiveDate;

/// The opening line of each prompt.
pub mod markers {
    pub const SYNTHESIS: &str = "ROLE: MEMORY SYNTHESIZER";
    pub const TIMEKEEPER: &str = "ROLE: TIMEKEEPER";
    pub const INTERCEPTOR: &str = "ROLE: INTERCEPTOR";
    pub const DIRECTOR_CLASSIFIER: &str = "ROLE: ARCHIVE INTENT CLASSIFIER";
    pub const ARCHIVE_FILTER: &str = "ROLE: ARCHIVE FILTER";
    pub const ARCHIVE_NARRATOR: &str = "ROLE: ARCHIVE NARRATOR";
    pub const IDENTITY_RESOLVER: &str = "ROLE: IDENTITY RESOLVER";
    pub const FACT_JUDGE: &str = "ROLE: FACT JUDGE";
    pub const COMPANION: &str = "ROLE: COMPANION";
    pub const REDUNDANCY_AUDITOR: &str = "ROLE: REDUNDANCY AUDITOR";
    pub const QUESTION_CORRECTOR: &str = "ROLE: QUESTION CORRECTOR";
}

/// Who the memories are about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    pub pronouns: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: "User".into(),
            pronouns: "they/them".into(),
        }
    }
}

/// "Thu, January 30, 2025"
pub fn long_date(date: NaiveDate) -> String {
    date.format("%a, %B %-d, %Y").to_string()
}

// ── Standard pipeline ──────────────────────────────────────────

pub fn synthesis(
    persona: &Persona,
    today: NaiveDate,
    history: &str,
    pending_fact: Option<&str>,
    input: &str,
) -> String {
    let name = &persona.name;
    let pending = match pending_fact {
        Some(fact) => format!(
            "\n*** PENDING UNRESOLVED MEMORY ***\nUser previously stated: \"{fact}\" but was interrupted to ask for a time/date.\nIF the CURRENT INPUT provides that context (even vaguely), MERGE them into one complete fact.\n"
        ),
        None => String::new(),
    };
    format!(
        r#"{marker}
SUBJECT: {name} (pronouns: {pronouns})
CURRENT_DATE: {date}

HISTORY:
{history}
{pending}
CURRENT INPUT: "{input}"

TASKS:
1. RETROACTIVE MERGE: if a pending memory is shown above and the input completes it, emit one merged entry.
2. SEARCH KEYWORDS: list the names, places, and topics worth looking up. Useful categories: Identity, Preference, Location, Relationship, History, Work, Generativity, SocialFitness.
3. ADAPTIVE SPLITTING: one entry per independent fact. Keep a cause and its effect together.
4. DEAD END PROTOCOL: if {name} says they do not know the answer to the last question, store "{name} does not know [Topic]." with importance 2.
5. Write every fact in the third person about {name}. Never write "the user said".
6. Add exactly one energy tag to topics: Energizing, Depleting, or Neutral.
7. IMPORTANCE: 1-3 trivia, 4-6 everyday events and preferences, 7-8 relationships and shared activities, 9-10 life-defining events.
8. SIDE BY SIDE: doing something together with another person is BONDING, importance 7-8.
9. Questions and chit-chat produce no entries.

Return JSON:
{{ "search_keywords": ["..."], "entries": [{{ "fact": "...", "entities": "comma, separated", "topics": "comma, separated", "importance": 5 }}] }}"#,
        marker = markers::SYNTHESIS,
        pronouns = persona.pronouns,
        date = long_date(today),
    )
}

pub fn timekeeper(input: &str, fact: &str, today: NaiveDate) -> String {
    format!(
        r#"{marker}
ORIGINAL_INPUT: "{input}"
FACT: "{fact}"
CURRENT_DATE: {date}

Decide whether FACT can be stored as is.
- Relative time ("yesterday", "last week", "two days ago"): rewrite it to an absolute date or month using CURRENT_DATE. valid = true.
- A specific past episode (a trip, a meeting, an accident) with no date at all: valid = false.
- General traits, preferences, habits, and ongoing states need no date: valid = true, fact unchanged.
- A fact that already carries a date: valid = true, fact unchanged.

Return JSON: {{ "valid": true, "rewritten_fact": "..." }}"#,
        marker = markers::TIMEKEEPER,
        date = long_date(today),
    )
}

pub fn interceptor(input: &str, fact: &str, candidates: &[String]) -> String {
    let records = if candidates.is_empty() {
        "(none)".to_string()
    } else {
        candidates.join("\n")
    };
    format!(
        r#"{marker}
User said: "{input}"
Fact detected: "{fact}"

EXISTING DATABASE RECORDS:
{records}

The fact describes an event but no time was given.
If one of the records looks like the same event, ask whether that is what they mean.
Otherwise ask briefly when it happened ("When did this happen?").
One short question, no preamble.

Return JSON: {{ "response": "..." }}"#,
        marker = markers::INTERCEPTOR,
    )
}

/// Generation rules for interrogation mode.
pub fn interrogation_rules() -> &'static str {
    r#"MODE: INTERROGATION. You are a guarded auditor collecting facts.
RULES:
1. Never ask "what about..." or any other vague continuation.
2. ANTI-NAG: once the user says they do not know, drop that topic for good.
3. REDUNDANCY BAN: never ask for anything the DATABASE RESULTS already answer, including recorded "does not know" entries.
4. If the user seems confused, rephrase the question more simply.
5. NO GHOSTS: only mention people and things named in this turn or the HISTORY, even if the DATABASE RESULTS mention others.
6. Ask exactly one question."#
}

/// Generation rules for standard mode. `audit_triggered` arms protocol D.
pub fn standard_rules(audit_triggered: bool) -> String {
    format!(
        r#"MODE: COMPANION. Pick exactly ONE protocol for this reply.
A. WISER (conflict, frustration, anger): Observe what happened, Interpret it generously, then help them Choose a response.
B. SAVORING (joy, bonding, a good moment): slow down and help them stay in the moment. Ask about a sensory detail.
C. GENERATIVITY (stagnation, feeling stuck): reflect on what they pass on to others, grounded in mentoring or teaching facts from the DATABASE RESULTS.
D. ATTENTION AUDIT (random trigger: {audit_triggered}): only when the trigger is true, gently ask about an important person from the DATABASE RESULTS who has not come up lately.
E. COMPANION (default): short and warm. Answer what was asked. Never volunteer details nobody asked for."#
    )
}

pub fn generation(memory: &str, history: &str, input: &str, rules: &str) -> String {
    format!(
        r#"{marker}
{memory}

HISTORY:
{history}

User input: "{input}"

{rules}

KNOWLEDGE GRAPH:
- At most 3 roots. Each root has branches, each branch has leaves.
- Every label and leaf text is ONE uppercase word copied exactly from the DATABASE RESULTS or HISTORY.
- No synonyms, no verbs, no numbers.
- Every node has its own mood.
- Moods: NEUTRAL, AFFECTIONATE, CRYPTIC, DISLIKE, JOYFUL, CURIOUS, SAD, GLITCH, QUESTION.

Return JSON:
{{ "response": "...", "mood": "NEUTRAL", "roots": [{{ "label": "WORD", "mood": "NEUTRAL", "branches": [{{ "label": "WORD", "mood": "NEUTRAL", "leaves": [{{ "text": "WORD", "mood": "NEUTRAL" }}] }}] }}] }}"#,
        marker = markers::COMPANION,
    )
}

pub fn redundancy(question: &str, memory: &str) -> String {
    format!(
        r#"{marker}
CANDIDATE QUESTION: "{question}"

MEMORY:
{memory}

Is the candidate question redundant?
- KNOWN: the memory already answers it.
- DEAD_END: the memory records that the user does not know.
- REPEAT: the same question was already asked.
- NONE: it asks for something new.

Return JSON: {{ "is_redundant": true, "reason": "KNOWN" }}"#,
        marker = markers::REDUNDANCY_AUDITOR,
    )
}

pub fn correction(question: &str, reason: &str, memory: &str, strategy: &str) -> String {
    format!(
        r#"{marker}
The question "{question}" was rejected ({reason}).

MEMORY:
{memory}

STRATEGY: {strategy}

Write one replacement question.

Return JSON: {{ "response": "...", "mood": "QUESTION" }}"#,
        marker = markers::QUESTION_CORRECTOR,
    )
}

/// Unified duplicate, contradiction, and cleanup check for one fact.
pub fn fact_judge(persona: &Persona, context: &str, fact: &str, entities: &str) -> String {
    let name = &persona.name;
    format!(
        r#"{marker}
EXISTING LOGS:
{context}

NEW FACT: "{fact}"
ENTITIES: "{entities}"

Classify the NEW FACT against the EXISTING LOGS:
- DUPLICATE: the logs already say the same thing.
- CONTRADICTION: the logs say something incompatible. Explain in warning_message.
- META: it is about the conversation itself, not about anyone's life.
- NEW: anything else.

When NEW or CONTRADICTION, also clean it up:
- Replace generic references ("my brother") with the specific name when the logs give it.
- Remove "{name} stated" or "{name} said" framing.
- Remove "{name}" from the entities unless the fact is about {name} alone.
- For a passing feeling about one event, append "(Note: This is a momentary reaction to this specific event)".

Return JSON: {{ "status": "NEW", "better_fact": "...", "better_entities": "...", "warning_message": "" }}"#,
        marker = markers::FACT_JUDGE,
    )
}

// ── Director pipeline ──────────────────────────────────────────

pub fn director_classifier(history: &str, bridge: Option<&str>, input: &str) -> String {
    let bridge = bridge.map(|b| format!("\n{b}\n")).unwrap_or_default();
    format!(
        r#"{marker}
You are the ARCHIVIST of a media and people archive.

HISTORY:
{history}
{bridge}
INPUT: "{input}"

Classify the INPUT:
- STORE: the input states facts about people to remember. Put each fact in "facts" and the person in "entity_name".
- SEARCH: the input asks to see or play footage or media.
- CHAT: the input asks a question about people in the archive.

CONTEXT EXPANSION: words like "actor", "person", or "guy" refer to the entities discussed in HISTORY. Resolve pronouns using HISTORY.
positive_constraints are the names and traits that must match. negative_constraints are names or traits to exclude.

Return JSON:
{{ "intent": "STORE", "facts": ["..."], "entity_name": "...", "positive_constraints": ["..."], "negative_constraints": ["..."], "response": "..." }}"#,
        marker = markers::DIRECTOR_CLASSIFIER,
    )
}

pub fn archive_filter(history: &str, input: &str, facts: &str) -> String {
    format!(
        r#"{marker}
HISTORY:
{history}

QUERY: "{input}"

ARCHIVE FACTS:
{facts}

Return the entities that satisfy EVERY trait in the QUERY.
- AGGREGATE EVIDENCE: facts about one entity may be spread over several rows. Combine them before judging.
- STRICT INTERSECTION: if any trait lacks evidence, exclude the entity.
- Use only the ARCHIVE FACTS. No outside knowledge.

Return JSON: {{ "matches": ["Name"], "reasoning": "..." }}"#,
        marker = markers::ARCHIVE_FILTER,
    )
}

pub fn archive_narrator(history: &str, input: &str, matches: &[String], facts: &str) -> String {
    let names = if matches.is_empty() {
        "(none)".to_string()
    } else {
        matches.join(", ")
    };
    format!(
        r#"{marker}
HISTORY:
{history}

QUERY: "{input}"
MATCHES: {names}

ARCHIVE FACTS:
{facts}

Answer the QUERY using only the MATCHES and the ARCHIVE FACTS.
Never use world knowledge about real people.
If there are no MATCHES, reply exactly: "I couldn't find anyone matching that description in the archive."

Return JSON: {{ "response": "..." }}"#,
        marker = markers::ARCHIVE_NARRATOR,
    )
}

pub fn identity_resolver(input: &str, targets: &[String], database: &str) -> String {
    format!(
        r#"{marker}
INPUT: "{input}"
TARGETS: {targets}

DATABASE:
{database}

Does each target name point to exactly one person in the DATABASE?
- RESOLVED: each target is unambiguous. Put the full names in resolved_names and anything to exclude in resolved_excludes.
- AMBIGUOUS: a target matches more than one person. Ask which one in clarification_question.

Return JSON: {{ "status": "RESOLVED", "clarification_question": "", "resolved_names": ["..."], "resolved_excludes": ["..."] }}"#,
        marker = markers::IDENTITY_RESOLVER,
        targets = targets.join(", "),
    )
}
