//! System prompts for the two analysis stages.

/// Pre-screen: cheap yes/no classification.
pub const PRESCREEN_PROMPT: &str = r#"Determine if this chat message contains information about a REAL OFFLINE EVENT (party, concert, yoga, meetup, sports, masterclass, networking, festival, excursion, meditation, retreat, etc.).

The following are NOT events (return is_event=false):
- Buy/sell posts: "selling bike", "buying iPhone", "used furniture"
- Rent/lease: "villa for rent", "looking for apartment", "bike rental"
- Currency exchange: "USDT exchange", "baht rate", "p2p"
- Services: "massage", "transfer", "cleaning", "nails"
- Questions/discussions: "where is it happening?", "who knows?", "we're going there", casual chat
- Channel/bot ads and online webinars
- CRITICAL: Announcements with NO indication of a physical venue (no direct address, no branded venue name; for example "location in DM" or "join our group" with no venue) — these are NOT events.

IMPORTANT: Messages may be in Russian, English, or mixed. Analyze the CONTENT regardless of language."#;

/// Extraction: full structured record. `{today}` and `{region}` are resolved
/// by [`extract_prompt`].
const EXTRACT_PROMPT: &str = r#"You are an AI assistant for a geo-location event app in {region}.
Extract data about the OFFLINE EVENT from the text.

RULES:
1. Category: one of "Party", "Sport", "Business", "Education", "Chill".
2. Price (price): whole number in local currency units, 0 if free, null if unknown.
3. Location (location_name): exact venue name for a map lookup. IMPORTANT: if no direct address exists but the event has a branded name (e.g. "AUM DAY", "training at Prana", "Osho meditation"), extract the brand ("AUM", "Prana", "Osho") as location_name. Otherwise null.
4. Date: "today" = {today}, "tomorrow" = the next day, in YYYY-MM-DD. Otherwise null. Parse Russian date words: "сегодня"=today, "завтра"=tomorrow.
5. Title: short catchy title, max 30 characters.
6. Summary: one sentence, max 80 characters.
7. Description: attractive event announcement for a listing, 2-4 sentences, max 500 chars. Convey the atmosphere, what will happen and why it's worth attending.
8. EXCLUSIONS: if this is a question ("where is it?"), personal discussion, service offer (massage) OR if location_name is null and cannot be derived from the text — return is_event = false. STRICT RULE: an event without a location (even implied) is not an event.
9. IMPORTANT: extract ONLY ONE object (the nearest/most relevant event).

IMPORTANT: The message text may be in Russian, English, or mixed languages. Analyze content regardless of language."#;

/// Build the extraction system prompt for a given day and region.
pub fn extract_prompt(today: &str, region: &str) -> String {
    EXTRACT_PROMPT
        .replace("{today}", today)
        .replace("{region}", region)
}

/// User prompt shared by both stages: chat context plus truncated text.
pub fn user_prompt(chat_title: &str, text: &str, limit: usize) -> String {
    let truncated: String = text.chars().take(limit).collect();
    format!("Chat: {chat_title}\n\nMessage:\n{truncated}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_prompt_resolves_placeholders() {
        let prompt = extract_prompt("2026-08-04", "Koh Phangan");
        assert!(prompt.contains("\"today\" = 2026-08-04"));
        assert!(prompt.contains("app in Koh Phangan"));
        assert!(!prompt.contains("{today}"));
    }

    #[test]
    fn user_prompt_truncates_by_characters() {
        let prompt = user_prompt("Beach Chat", "абвгдежз", 4);
        assert!(prompt.ends_with("абвг"));
        assert!(prompt.starts_with("Chat: Beach Chat"));
    }
}
